//! A set of frozen modules, in import order.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::Descriptor;
use crate::util::hash::Fingerprint;

use super::{DeclError, FrozenRegistry};

/// Frozen modules keyed by name.
///
/// Modules are kept in insertion order, which the loader guarantees is an
/// import-respecting order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    modules: Vec<Arc<FrozenRegistry>>,
    index: HashMap<String, usize>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module. Module names are unique within a catalog.
    pub fn insert(&mut self, module: Arc<FrozenRegistry>) -> Result<(), DeclError> {
        let name = module.name().to_string();
        if self.index.contains_key(&name) {
            return Err(DeclError::DuplicateModule { name });
        }
        self.index.insert(name, self.modules.len());
        self.modules.push(module);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<FrozenRegistry>> {
        self.index.get(name).map(|&i| &self.modules[i])
    }

    /// Get a module, or fail with `UnknownModule`.
    pub fn module(&self, name: &str) -> Result<&Arc<FrozenRegistry>, DeclError> {
        self.get(name).ok_or_else(|| DeclError::UnknownModule {
            name: name.to_string(),
        })
    }

    pub fn modules(&self) -> impl Iterator<Item = &Arc<FrozenRegistry>> {
        self.modules.iter()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Resolve `name` as seen from `module`.
    pub fn resolve(&self, module: &str, name: &str) -> Result<&Descriptor, DeclError> {
        self.module(module)?.resolve(name)
    }

    /// Every module declaring `name`, with its declaration.
    pub fn find(&self, name: &str) -> Vec<(&FrozenRegistry, &Descriptor)> {
        self.modules
            .iter()
            .filter_map(|m| m.get(name).map(|d| (m.as_ref(), d)))
            .collect()
    }

    /// Combined fingerprint of all modules, in order.
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        let mut fp = Fingerprint::new();
        for module in &self.modules {
            fp.update_str(module.name())
                .update_str(&module.fingerprint()?);
        }
        Ok(fp.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Primitive, StructDecl, TypeRef};
    use crate::registry::Registry;

    fn two_modules() -> Catalog {
        let mut base = Registry::new("base");
        base.declare_type(Primitive::UChar, "byte").unwrap();
        let base = Arc::new(base.freeze());

        let mut top = Registry::new("top").with_import(base.clone());
        top.declare_struct(StructDecl::new("Pair").field("a", TypeRef::named("byte")))
            .unwrap();

        let mut catalog = Catalog::new();
        catalog.insert(base).unwrap();
        catalog.insert(Arc::new(top.freeze())).unwrap();
        catalog
    }

    #[test]
    fn test_resolve_through_imports() {
        let catalog = two_modules();
        assert!(catalog.resolve("top", "byte").is_ok());
        assert!(catalog.resolve("base", "Pair").is_err());
        assert_eq!(
            catalog.resolve("nope", "byte").unwrap_err(),
            DeclError::UnknownModule {
                name: "nope".into()
            }
        );
    }

    #[test]
    fn test_duplicate_module() {
        let mut catalog = two_modules();
        let again = Arc::new(Registry::new("base").freeze());
        assert!(matches!(
            catalog.insert(again),
            Err(DeclError::DuplicateModule { .. })
        ));
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_find_reports_declaring_module_only() {
        let catalog = two_modules();
        let found = catalog.find("byte");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0.name(), "base");
    }

    #[test]
    fn test_fingerprint_depends_on_order() {
        let catalog = two_modules();
        let mut reversed = Catalog::new();
        let mut modules: Vec<_> = catalog.modules().collect();
        modules.reverse();
        for m in modules {
            reversed.insert(m.clone()).unwrap();
        }
        assert_ne!(
            catalog.fingerprint().unwrap(),
            reversed.fingerprint().unwrap()
        );
    }
}
