//! Command implementations

pub mod call;
pub mod check;
pub mod completions;
pub mod dump;
pub mod explain;
pub mod list;

use anyhow::{Context, Result};

use crate::cli::SourceArgs;
use nativedecl::ops::load::{discover_files, load_catalog, LoadOptions};
use nativedecl::util::diagnostic::suggestions;
use nativedecl::util::Config;
use nativedecl::Catalog;

/// Load the catalog selected by the command line and config.
pub fn load(source: &SourceArgs, config: &Config) -> Result<Catalog> {
    let mut files = source.files.clone();

    if files.is_empty() && !config.decls.include.is_empty() {
        let cwd = std::env::current_dir().context("failed to determine current directory")?;
        files = discover_files(&cwd, &config.decls.include)?;
        if files.is_empty() {
            anyhow::bail!(
                "`decls.include` matched no descriptor files in {}\n\
                 help: {}",
                cwd.display(),
                suggestions::NO_FILES
            );
        }
    }

    let mut registry = config.registry_options();
    if source.allow_forward_references {
        registry.allow_forward_references = true;
    }

    load_catalog(&LoadOptions { files, registry })
}
