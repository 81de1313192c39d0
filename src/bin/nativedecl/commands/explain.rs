//! `nativedecl explain` command

use anyhow::Result;

use crate::cli::ExplainArgs;
use nativedecl::ops::{explain, format_explanation};
use nativedecl::util::Config;

pub fn execute(args: ExplainArgs, config: &Config) -> Result<()> {
    let catalog = super::load(&args.source, config)?;

    let explanation = explain(&catalog, &args.name, args.module.as_deref())?;
    print!("{}", format_explanation(&explanation));

    Ok(())
}
