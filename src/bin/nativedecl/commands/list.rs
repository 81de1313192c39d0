//! `nativedecl list` command

use anyhow::Result;

use crate::cli::ListArgs;
use nativedecl::util::Config;

pub fn execute(args: ListArgs, config: &Config) -> Result<()> {
    let catalog = super::load(&args.source, config)?;

    let modules = match &args.module {
        Some(name) => vec![catalog.module(name)?],
        None => catalog.modules().collect(),
    };

    let mut listed = 0;
    for module in modules {
        for descriptor in module.iter() {
            if args.kind.is_some_and(|k| k != descriptor.kind()) {
                continue;
            }
            println!(
                "{:<9} {}::{}",
                descriptor.kind(),
                module.name(),
                descriptor.name()
            );
            listed += 1;
        }
    }

    if listed == 0 {
        eprintln!("no descriptors match");
    }

    Ok(())
}
