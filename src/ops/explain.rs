//! Explaining a descriptor: what it uses and what uses it.

use std::collections::{HashMap, HashSet};
use std::fmt::{self, Write as _};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::core::Descriptor;
use crate::registry::{Catalog, DeclError};

/// A descriptor name qualified by its defining module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedName {
    pub module: String,
    pub name: String,
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.module, self.name)
    }
}

/// Which descriptors reference which, across every module of a catalog.
///
/// An edge `a -> b` means `a` uses `b` as a type.
#[derive(Debug, Default)]
pub struct ReferenceGraph {
    graph: DiGraph<QualifiedName, ()>,
    nodes: HashMap<QualifiedName, NodeIndex>,
}

impl ReferenceGraph {
    pub fn build(catalog: &Catalog) -> Self {
        let mut refs = ReferenceGraph::default();

        for module in catalog.modules() {
            for descriptor in module.iter() {
                let from = refs.node(module.name(), descriptor.name());
                for name in descriptor.references() {
                    // Validation guarantees every reference resolves
                    if let Some(defining) = module.defining_module(name) {
                        let to = refs.node(defining, name);
                        refs.graph.update_edge(from, to, ());
                    }
                }
            }
        }

        refs
    }

    fn node(&mut self, module: &str, name: &str) -> NodeIndex {
        let key = QualifiedName {
            module: module.to_string(),
            name: name.to_string(),
        };
        if let Some(&idx) = self.nodes.get(&key) {
            return idx;
        }
        let idx = self.graph.add_node(key.clone());
        self.nodes.insert(key, idx);
        idx
    }

    fn neighbors(&self, of: &QualifiedName, dir: Direction) -> Vec<QualifiedName> {
        let Some(&node) = self.nodes.get(of) else {
            return Vec::new();
        };
        let mut out: Vec<_> = self
            .graph
            .neighbors_directed(node, dir)
            .map(|n| self.graph[n].clone())
            .collect();
        out.sort();
        out
    }

    /// Descriptors `of` uses directly.
    pub fn references(&self, of: &QualifiedName) -> Vec<QualifiedName> {
        self.neighbors(of, Direction::Outgoing)
    }

    /// Descriptors that use `of` directly.
    pub fn dependents(&self, of: &QualifiedName) -> Vec<QualifiedName> {
        self.neighbors(of, Direction::Incoming)
    }

    /// Every descriptor that uses `of`, directly or through others.
    pub fn transitive_dependents(&self, of: &QualifiedName) -> Vec<QualifiedName> {
        let Some(&start) = self.nodes.get(of) else {
            return Vec::new();
        };

        let mut visited = HashSet::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            for next in self.graph.neighbors_directed(current, Direction::Incoming) {
                if visited.insert(next) {
                    stack.push(next);
                }
            }
        }

        let mut out: Vec<_> = visited
            .into_iter()
            .filter(|&n| n != start)
            .map(|n| self.graph[n].clone())
            .collect();
        out.sort();
        out
    }
}

/// Everything `explain` reports about one descriptor.
#[derive(Debug, Clone)]
pub struct Explanation {
    pub name: QualifiedName,
    pub descriptor: Descriptor,
    pub references: Vec<QualifiedName>,
    pub dependents: Vec<QualifiedName>,
    /// Indirect dependents only
    pub indirect_dependents: Vec<QualifiedName>,
}

/// Explain `name`, looked up in `module` or in every module.
pub fn explain(
    catalog: &Catalog,
    name: &str,
    module: Option<&str>,
) -> Result<Explanation, DeclError> {
    let (module_name, descriptor) = match module {
        Some(m) => {
            let registry = catalog.module(m)?;
            let descriptor = registry.resolve(name)?;
            let defining = registry.defining_module(name).unwrap_or(m);
            (defining.to_string(), descriptor.clone())
        }
        None => {
            let found = catalog.find(name);
            let Some((registry, descriptor)) = found.first() else {
                return Err(DeclError::UnknownName {
                    module: catalog
                        .modules()
                        .map(|m| m.name())
                        .collect::<Vec<_>>()
                        .join(", "),
                    name: name.to_string(),
                });
            };
            if found.len() > 1 {
                tracing::warn!(
                    "`{}` is declared in {} modules, explaining the one in `{}`",
                    name,
                    found.len(),
                    registry.name()
                );
            }
            (registry.name().to_string(), (*descriptor).clone())
        }
    };

    let graph = ReferenceGraph::build(catalog);
    let qualified = QualifiedName {
        module: module_name,
        name: name.to_string(),
    };

    let dependents = graph.dependents(&qualified);
    let indirect_dependents = graph
        .transitive_dependents(&qualified)
        .into_iter()
        .filter(|d| !dependents.contains(d))
        .collect();

    Ok(Explanation {
        references: graph.references(&qualified),
        dependents,
        indirect_dependents,
        descriptor,
        name: qualified,
    })
}

/// Format an explanation for terminal output.
pub fn format_explanation(e: &Explanation) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} {}", e.descriptor.kind(), e.name);

    match &e.descriptor {
        Descriptor::TypeAlias(alias) => {
            let _ = writeln!(out, "  = {}", alias.primitive);
        }
        Descriptor::Pointer(ptr) => {
            let _ = writeln!(out, "  = {}*", ptr.pointee);
        }
        Descriptor::Struct(s) => {
            let _ = writeln!(out, "  native: {}", s.native_name);
            for field in &s.fields {
                let _ = writeln!(out, "  {}: {}", field.name, field.ty);
            }
        }
        Descriptor::Callback(cb) => {
            if let Some(native) = &cb.native_name {
                let _ = writeln!(out, "  native: {}", native);
            }
            let _ = writeln!(out, "  returns: {}", cb.return_type);
            for p in &cb.params {
                let _ = writeln!(out, "  {} {}: {}", p.direction, p.name, p.ty);
            }
        }
        Descriptor::Function(f) => {
            let _ = writeln!(out, "  native: {}", f.native_name);
            let _ = writeln!(out, "  returns: {}", f.return_type);
            for p in &f.params {
                match &p.annotation {
                    Some(a) => {
                        let _ = writeln!(out, "  {} {}: {} [{}]", p.direction, p.name, p.ty, a);
                    }
                    None => {
                        let _ = writeln!(out, "  {} {}: {}", p.direction, p.name, p.ty);
                    }
                }
            }
        }
    }

    let sections = [
        ("Uses", &e.references),
        ("Used by", &e.dependents),
        ("Indirectly used by", &e.indirect_dependents),
    ];
    for (title, names) in sections {
        if names.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n{}:", title);
        for name in names {
            let _ = writeln!(out, "  → {}", name);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;

    fn q(module: &str, name: &str) -> QualifiedName {
        QualifiedName {
            module: module.into(),
            name: name.into(),
        }
    }

    #[test]
    fn test_struct_dependents_cross_modules() {
        let catalog = catalog::bundled().unwrap();
        let e = explain(&catalog, "STBTTBakedChar", None).unwrap();

        assert_eq!(e.name, q("stb_types", "STBTTBakedChar"));
        assert_eq!(e.dependents, vec![q("stb_types", "stbtt_bakedchar_p")]);
        assert_eq!(
            e.indirect_dependents,
            vec![
                q("stb_truetype", "BakeFontBitmap"),
                q("stb_truetype", "GetBakedQuad")
            ]
        );
    }

    #[test]
    fn test_function_references() {
        let catalog = catalog::bundled().unwrap();
        let e = explain(&catalog, "GetBakedQuad", Some("stb_truetype")).unwrap();
        assert_eq!(
            e.references,
            vec![
                q("stb_types", "stbtt_aligned_quad_p"),
                q("stb_types", "stbtt_bakedchar_p")
            ]
        );
        assert!(e.dependents.is_empty());

        let text = format_explanation(&e);
        assert!(text.starts_with("function stb_truetype::GetBakedQuad"));
        assert!(text.contains("out xpos: float* [check(1)]"));
        assert!(text.contains("Uses:"));
    }

    #[test]
    fn test_lookup_through_module_reports_defining_module() {
        let catalog = catalog::bundled().unwrap();
        let e = explain(&catalog, "stbi_uc", Some("stb_truetype")).unwrap();
        assert_eq!(e.name.module, "stb_types");
        assert_eq!(e.dependents, vec![q("stb_types", "stbi_uc_p")]);
    }

    #[test]
    fn test_unknown_name() {
        let catalog = catalog::bundled().unwrap();
        assert!(matches!(
            explain(&catalog, "stbtt_fontinfo", None),
            Err(DeclError::UnknownName { .. })
        ));
        assert!(matches!(
            explain(&catalog, "stbi_uc", Some("stb_image")),
            Err(DeclError::UnknownModule { .. })
        ));
    }
}
