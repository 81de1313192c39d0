//! Loading descriptor files into a catalog.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;

use crate::catalog;
use crate::loader::DeclFile;
use crate::registry::{Catalog, DeclError, FrozenRegistry, RegistryOptions};
use crate::util::diagnostic::suggestions;
use crate::util::fs::display_path;

/// A declaration error, tied to the descriptor file it came from.
#[derive(Debug, Error)]
#[error("while loading module `{module}` from {}", path.display())]
pub struct LoadError {
    pub module: String,
    pub path: PathBuf,
    #[source]
    pub source: DeclError,
}

/// Where the catalog comes from.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Descriptor files; the bundled stb catalog is used when empty
    pub files: Vec<PathBuf>,

    /// Policy for modules that don't set `forward_references`
    pub registry: RegistryOptions,
}

/// Load a catalog from descriptor files, or the bundled one.
pub fn load_catalog(opts: &LoadOptions) -> Result<Catalog> {
    if opts.files.is_empty() {
        tracing::debug!("no descriptor files given, using the bundled stb catalog");
        return Ok(catalog::bundled()?);
    }

    let files = opts
        .files
        .iter()
        .map(|path| DeclFile::load(path))
        .collect::<Result<Vec<_>>>()?;

    build_catalog(files, opts.registry)
}

/// Build parsed descriptor files into a catalog, imports first.
pub fn build_catalog(files: Vec<DeclFile>, defaults: RegistryOptions) -> Result<Catalog> {
    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();

    for (i, file) in files.iter().enumerate() {
        if let Some(&existing) = nodes.get(file.name()) {
            let first = &files[graph[existing]];
            return Err(DeclError::DuplicateModule {
                name: file.name().to_string(),
            })
            .with_context(|| {
                format!(
                    "declared in both {} and {}",
                    display_path(&first.path).display(),
                    display_path(&file.path).display()
                )
            });
        }
        nodes.insert(file.name(), graph.add_node(i));
    }

    // Edge import -> importer, so a topological order puts imports first
    for file in &files {
        let importer = nodes[file.name()];
        for import in &file.imports {
            let Some(&imported) = nodes.get(import.as_str()) else {
                return Err(DeclError::UnknownModule {
                    name: import.clone(),
                })
                .with_context(|| {
                    format!(
                        "module `{}` ({}) imports `{}`, which no descriptor file declares. {}",
                        file.name(),
                        display_path(&file.path).display(),
                        import,
                        suggestions::MISSING_IMPORT
                    )
                });
            };
            graph.add_edge(imported, importer, ());
        }
    }

    let order = toposort(&graph, None).map_err(|cycle| {
        anyhow::anyhow!(
            "import cycle involving module `{}`",
            files[graph[cycle.node_id()]].name()
        )
    })?;

    let mut built: HashMap<String, Arc<FrozenRegistry>> = HashMap::new();
    let mut catalog = Catalog::new();

    for node in order {
        let file = &files[graph[node]];
        let imports = file
            .imports
            .iter()
            .filter_map(|name| built.get(name).cloned())
            .collect();

        let module = file
            .build(imports, defaults)
            .map_err(|source| LoadError {
                module: file.name().to_string(),
                path: display_path(&file.path),
                source,
            })?;

        tracing::info!(
            "loaded module `{}` ({} descriptors) from {}",
            module.name(),
            module.len(),
            display_path(&file.path).display()
        );

        let module = Arc::new(module);
        built.insert(module.name().to_string(), module.clone());
        catalog.insert(module)?;
    }

    Ok(catalog)
}

/// Expand include globs from the project config, relative to `root`.
pub fn discover_files(root: &Path, include: &[String]) -> Result<Vec<PathBuf>> {
    if include.is_empty() {
        return Ok(Vec::new());
    }
    let files = crate::util::fs::glob_files(root, include)?;
    tracing::debug!("`decls.include` matched {} files", files.len());
    Ok(files)
}
