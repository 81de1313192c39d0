//! `nativedecl check` command

use anyhow::{Context, Result};

use crate::cli::CheckArgs;
use nativedecl::util::hash::short;
use nativedecl::util::Config;
use nativedecl::DescriptorKind;

pub fn execute(args: CheckArgs, config: &Config) -> Result<()> {
    let catalog = super::load(&args.source, config)?;

    for module in catalog.modules() {
        let counts = module.counts();
        let count = |kind| counts.get(&kind).copied().unwrap_or(0);
        let version = module
            .module()
            .version
            .as_ref()
            .map(|v| format!(" v{}", v))
            .unwrap_or_default();
        let fingerprint = module
            .fingerprint()
            .with_context(|| format!("failed to fingerprint module `{}`", module.name()))?;

        println!(
            "    Checked {}{} ({} types, {} pointers, {} structs, {} callbacks, {} functions) [{}]",
            module.name(),
            version,
            count(DescriptorKind::Type),
            count(DescriptorKind::Pointer),
            count(DescriptorKind::Struct),
            count(DescriptorKind::Callback),
            count(DescriptorKind::Function),
            short(&fingerprint)
        );
    }

    println!(
        "{} module{} OK",
        catalog.len(),
        if catalog.len() == 1 { "" } else { "s" }
    );

    Ok(())
}
