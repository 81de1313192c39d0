//! nativedecl CLI - validate and dump native-library binding descriptors

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use nativedecl::ops::LoadError;
use nativedecl::util::config::load_for_project;
use nativedecl::util::diagnostic::emit;
use nativedecl::util::Config;
use nativedecl::DeclError;

fn main() {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("nativedecl=debug")
    } else {
        EnvFilter::new("nativedecl=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let config = match std::env::current_dir().context("failed to determine current directory") {
        Ok(cwd) => load_for_project(&cwd),
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(1);
        }
    };
    let color = !cli.no_color && config.color();

    if let Err(e) = run(cli, &config) {
        report(&e, color);
        std::process::exit(1);
    }
}

fn run(cli: Cli, config: &Config) -> Result<()> {
    match cli.command {
        Commands::Check(args) => commands::check::execute(args, config),
        Commands::List(args) => commands::list::execute(args, config),
        Commands::Explain(args) => commands::explain::execute(args, config),
        Commands::Dump(args) => commands::dump::execute(args, config),
        Commands::Call(args) => commands::call::execute(args, config),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}

/// Print an error, as a full diagnostic when it is a declaration error.
fn report(err: &anyhow::Error, color: bool) {
    if let Some(load) = err.downcast_ref::<LoadError>() {
        emit(&load.source.to_diagnostic().with_location(&load.path), color);
    } else if let Some(decl) = err.downcast_ref::<DeclError>() {
        let mut diag = decl.to_diagnostic();
        let outer = err.to_string();
        if outer != decl.to_string() {
            diag = diag.with_context(outer);
        }
        emit(&diag, color);
    } else {
        eprintln!("error: {:#}", err);
    }
}
