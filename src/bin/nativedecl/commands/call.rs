//! `nativedecl call` command
//!
//! Completes and checks the arguments of a native call without making it.

use anyhow::Result;

use crate::cli::CallArgs;
use nativedecl::ops::call::{self, check_call};
use nativedecl::util::Config;
use nativedecl::{DeclError, Descriptor};

pub fn execute(args: CallArgs, config: &Config) -> Result<()> {
    let catalog = super::load(&args.source, config)?;

    let module = match &args.module {
        Some(name) => catalog.module(name)?.clone(),
        None => catalog
            .modules()
            .find(|m| matches!(m.get(&args.function), Some(Descriptor::Function(_))))
            .cloned()
            .ok_or_else(|| DeclError::UnknownName {
                module: catalog
                    .modules()
                    .map(|m| m.name())
                    .collect::<Vec<_>>()
                    .join(", "),
                name: args.function.clone(),
            })?,
    };

    let values = args
        .args
        .into_iter()
        .map(|(name, value)| (name, call::ArgValue::Int(value)));
    let buffers = args
        .buffers
        .into_iter()
        .map(|(name, len)| (name, call::ArgValue::Buffer { len }));

    let mut call_args = call::CallArgs::new();
    for (name, value) in values.chain(buffers) {
        if call_args.insert(name.clone(), value).is_some() {
            anyhow::bail!("argument `{}` is passed more than once", name);
        }
    }

    let checked = check_call(&module, &args.function, &call_args)?;

    println!("{}(", checked.native_name);
    for (name, value) in &checked.args {
        if checked.derived.contains(name) {
            println!("    {} = {},  // derived", name, value);
        } else {
            println!("    {} = {},", name, value);
        }
    }
    println!(")");

    for check in &checked.checks {
        println!(
            "    Checked `{}`: {} = {} <= {}",
            check.param, check.expr, check.required, check.len
        );
    }

    Ok(())
}
