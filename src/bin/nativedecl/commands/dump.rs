//! `nativedecl dump` command

use anyhow::Result;

use crate::cli::DumpArgs;
use nativedecl::ops::dump;
use nativedecl::util::Config;

pub fn execute(args: DumpArgs, config: &Config) -> Result<()> {
    let catalog = super::load(&args.source, config)?;

    let format = args
        .format
        .or_else(|| config.dump_format())
        .unwrap_or_default();

    let rendered = dump(&catalog, format, args.output.as_deref())?;
    if args.output.is_none() {
        print!("{}", rendered);
    }

    Ok(())
}
