//! The descriptor registry.
//!
//! A [`Registry`] is the build phase of one library module: descriptors are
//! declared in order, each one validated against everything declared before
//! it. [`Registry::freeze`] ends the build phase and yields a read-only
//! [`FrozenRegistry`] that generators consume.
//!
//! There is no global registry. Modules that use types from another module
//! import its frozen registry explicitly:
//!
//! ```
//! use std::sync::Arc;
//! use nativedecl::core::{Primitive, StructDecl, TypeRef};
//! use nativedecl::registry::Registry;
//!
//! let mut types = Registry::new("types");
//! types.declare_type(Primitive::UChar, "stbi_uc").unwrap();
//! let types = Arc::new(types.freeze());
//!
//! let mut image = Registry::new("image").with_import(types);
//! image
//!     .declare_struct(StructDecl::new("Pixel").field("v", TypeRef::named("stbi_uc")))
//!     .unwrap();
//! assert!(image.resolve("stbi_uc").is_ok());
//! ```

pub mod catalog;
pub mod errors;
mod validate;

use std::collections::HashMap;
use std::sync::Arc;

use semver::Version;
use serde::{Deserialize, Serialize, Serializer};

use crate::core::{
    CallbackDecl, CallbackSignature, Descriptor, DescriptorKind, FunctionDecl,
    FunctionDescriptor, PointerType, Primitive, StructDecl, StructDescriptor, TypeAlias,
    TypeRef,
};
use crate::util::hash::sha256_str;

pub use catalog::Catalog;
pub use errors::DeclError;

/// Metadata describing a library module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// Module name, unique within a catalog
    pub name: String,

    /// Version of the descriptor set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,

    /// Package or namespace generated bindings live in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Native header declaring the API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,

    /// Prefix of native function symbols (`stbtt_`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    /// Class the generated bindings are emitted into (`STBTruetype`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,

    /// Prefix of native constants, stripped from generated names (`STBTT`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant_prefix: Option<String>,

    /// Source placed verbatim at the top of the generated native glue, such
    /// as the `#define` that pulls in a single-header implementation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_directive: Option<String>,

    /// Module documentation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

impl ModuleInfo {
    pub fn new(name: impl Into<String>) -> Self {
        ModuleInfo {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Validation policy of a registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryOptions {
    /// Let auto-size, check and default expressions name parameters that are
    /// declared later in the same list.
    ///
    /// Some native signatures put a buffer before the parameters sizing it,
    /// and parameter order has to follow the native ABI.
    pub allow_forward_references: bool,
}

/// Descriptors in declaration order, indexed by name.
#[derive(Debug, Clone, Default)]
struct SymbolTable {
    entries: Vec<Descriptor>,
    index: HashMap<String, usize>,
}

impl SymbolTable {
    fn get(&self, name: &str) -> Option<&Descriptor> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    fn insert(&mut self, descriptor: Descriptor) {
        self.index
            .insert(descriptor.name().to_string(), self.entries.len());
        self.entries.push(descriptor);
    }
}

impl Serialize for SymbolTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

/// The build phase of a module's descriptor set.
#[derive(Debug, Clone)]
pub struct Registry {
    module: ModuleInfo,
    options: RegistryOptions,
    imports: Vec<Arc<FrozenRegistry>>,
    symbols: SymbolTable,
}

impl Registry {
    /// Create an empty registry for the named module.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_module(ModuleInfo::new(name))
    }

    /// Create an empty registry with full module metadata.
    pub fn with_module(module: ModuleInfo) -> Self {
        Registry {
            module,
            options: RegistryOptions::default(),
            imports: Vec::new(),
            symbols: SymbolTable::default(),
        }
    }

    /// Set the validation policy.
    pub fn with_options(mut self, options: RegistryOptions) -> Self {
        self.options = options;
        self
    }

    /// Make another module's descriptors resolvable from this one.
    pub fn with_import(mut self, module: Arc<FrozenRegistry>) -> Self {
        self.imports.push(module);
        self
    }

    pub fn name(&self) -> &str {
        &self.module.name
    }

    pub fn module(&self) -> &ModuleInfo {
        &self.module
    }

    pub fn options(&self) -> RegistryOptions {
        self.options
    }

    /// Number of descriptors declared in this module.
    pub fn len(&self) -> usize {
        self.symbols.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.entries.is_empty()
    }

    /// Declare an alias of a primitive type.
    pub fn declare_type(
        &mut self,
        primitive: Primitive,
        alias: impl Into<String>,
    ) -> Result<TypeAlias, DeclError> {
        self.declare_type_with_doc(primitive, alias, None)
    }

    /// Declare an alias of a primitive type, with documentation.
    pub fn declare_type_with_doc(
        &mut self,
        primitive: Primitive,
        alias: impl Into<String>,
        doc: Option<String>,
    ) -> Result<TypeAlias, DeclError> {
        let name = alias.into();
        self.check_new_name(&name)?;

        // Primitive spellings always parse as the primitive, never the alias
        if Primitive::parse(&name).is_some() {
            return Err(self.signature_error(
                &name,
                None,
                format!("`{}` is a primitive type and cannot be an alias name", name),
            ));
        }
        if primitive == Primitive::Void {
            return Err(self.signature_error(
                &name,
                None,
                "`void` has no values, alias `void*` through a pointer type instead",
            ));
        }

        let alias = TypeAlias {
            name,
            primitive,
            doc,
        };
        self.insert(Descriptor::TypeAlias(alias.clone()));
        Ok(alias)
    }

    /// Declare a named pointer to a previously declared type.
    pub fn declare_pointer(
        &mut self,
        name: impl Into<String>,
        pointee: TypeRef,
    ) -> Result<PointerType, DeclError> {
        let name = name.into();
        self.check_new_name(&name)?;
        self.check_type(&name, "pointee", &pointee, true)?;

        let pointer = PointerType { name, pointee };
        self.insert(Descriptor::Pointer(pointer.clone()));
        Ok(pointer)
    }

    /// Declare a struct. Fields keep the order they were declared in.
    pub fn declare_struct(&mut self, decl: StructDecl) -> Result<StructDescriptor, DeclError> {
        self.check_new_name(&decl.name)?;

        if decl.fields.is_empty() {
            return Err(DeclError::EmptyStruct {
                module: self.module.name.clone(),
                name: decl.name,
            });
        }

        let mut seen = std::collections::HashSet::new();
        for field in &decl.fields {
            if !crate::core::is_identifier(&field.name) {
                return Err(self.signature_error(
                    &decl.name,
                    Some(&field.name),
                    format!("`{}` is not a valid field name", field.name),
                ));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(self.signature_error(
                    &decl.name,
                    Some(&field.name),
                    format!("field `{}` is declared twice", field.name),
                ));
            }
            self.check_type(&decl.name, &field.name, &field.ty, false)?;
        }

        let descriptor = StructDescriptor {
            native_name: decl.native_name.unwrap_or_else(|| decl.name.clone()),
            name: decl.name,
            header: decl.header.or_else(|| self.module.header.clone()),
            doc: decl.doc,
            fields: decl.fields,
        };
        self.insert(Descriptor::Struct(descriptor.clone()));
        Ok(descriptor)
    }

    /// Declare a callback (function pointer) signature.
    pub fn declare_callback(
        &mut self,
        decl: CallbackDecl,
    ) -> Result<CallbackSignature, DeclError> {
        self.check_new_name(&decl.name)?;
        let return_type = self.check_return(&decl.name, &decl.returns)?;
        let params = self.check_params(&decl.name, &decl.params)?;

        let descriptor = CallbackSignature {
            name: decl.name,
            native_name: decl.native_name,
            params,
            return_type,
            doc: decl.doc,
        };
        self.insert(Descriptor::Callback(descriptor.clone()));
        Ok(descriptor)
    }

    /// Declare a native function.
    pub fn declare_function(
        &mut self,
        decl: FunctionDecl,
    ) -> Result<FunctionDescriptor, DeclError> {
        self.check_new_name(&decl.name)?;
        let return_type = self.check_return(&decl.name, &decl.returns)?;
        let params = self.check_params(&decl.name, &decl.params)?;

        let native_name = decl.native_name.unwrap_or_else(|| {
            format!("{}{}", self.module.prefix.as_deref().unwrap_or(""), decl.name)
        });

        let descriptor = FunctionDescriptor {
            name: decl.name,
            native_name,
            params,
            return_type,
            summary: decl.summary,
            return_doc: decl.return_doc,
        };
        self.insert(Descriptor::Function(descriptor.clone()));
        Ok(descriptor)
    }

    /// Look up a descriptor declared here or in an imported module.
    pub fn lookup(&self, name: &str) -> Option<&Descriptor> {
        self.symbols
            .get(name)
            .or_else(|| self.imports.iter().find_map(|m| m.get(name)))
    }

    /// Resolve a descriptor by name.
    pub fn resolve(&self, name: &str) -> Result<&Descriptor, DeclError> {
        self.lookup(name).ok_or_else(|| DeclError::UnknownName {
            module: self.module.name.clone(),
            name: name.to_string(),
        })
    }

    /// End the build phase.
    pub fn freeze(self) -> FrozenRegistry {
        tracing::debug!(
            "froze module `{}` with {} descriptors",
            self.module.name,
            self.symbols.entries.len()
        );
        FrozenRegistry {
            module: self.module,
            options: self.options,
            imports: self.imports,
            symbols: self.symbols,
        }
    }

    fn insert(&mut self, descriptor: Descriptor) {
        tracing::debug!(
            "declared {} `{}` in `{}`",
            descriptor.kind(),
            descriptor.name(),
            self.module.name
        );
        self.symbols.insert(descriptor);
    }

    fn check_new_name(&self, name: &str) -> Result<(), DeclError> {
        if let Some(existing) = self.symbols.get(name) {
            return Err(DeclError::DuplicateName {
                module: self.module.name.clone(),
                name: name.to_string(),
                existing: existing.kind(),
            });
        }

        if !crate::core::is_identifier(name) {
            return Err(self.signature_error(
                name,
                None,
                format!("`{}` is not a valid C identifier", name),
            ));
        }

        if let Some(import) = self.imports.iter().find(|m| m.get(name).is_some()) {
            tracing::warn!(
                "`{}` in module `{}` shadows the declaration imported from `{}`",
                name,
                self.module.name,
                import.name()
            );
        }

        Ok(())
    }

    fn signature_error(
        &self,
        descriptor: &str,
        site: Option<&str>,
        reason: impl Into<String>,
    ) -> DeclError {
        DeclError::InvalidSignature {
            module: self.module.name.clone(),
            descriptor: descriptor.to_string(),
            site: site.map(str::to_string),
            reason: reason.into(),
        }
    }
}

fn serialize_import_names<S: Serializer>(
    imports: &[Arc<FrozenRegistry>],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(imports.iter().map(|m| m.name()))
}

/// A read-only module descriptor set.
#[derive(Debug, Clone, Serialize)]
pub struct FrozenRegistry {
    module: ModuleInfo,
    options: RegistryOptions,
    #[serde(serialize_with = "serialize_import_names")]
    imports: Vec<Arc<FrozenRegistry>>,
    #[serde(rename = "descriptors")]
    symbols: SymbolTable,
}

impl FrozenRegistry {
    pub fn name(&self) -> &str {
        &self.module.name
    }

    pub fn module(&self) -> &ModuleInfo {
        &self.module
    }

    pub fn options(&self) -> RegistryOptions {
        self.options
    }

    /// Modules this one imports, in lookup order.
    pub fn imports(&self) -> impl Iterator<Item = &FrozenRegistry> {
        self.imports.iter().map(|m| m.as_ref())
    }

    /// A descriptor declared in this module.
    pub fn get(&self, name: &str) -> Option<&Descriptor> {
        self.symbols.get(name)
    }

    /// A descriptor declared here or in an imported module.
    pub fn lookup(&self, name: &str) -> Option<&Descriptor> {
        self.symbols
            .get(name)
            .or_else(|| self.imports.iter().find_map(|m| m.get(name)))
    }

    /// The module a visible name is declared in.
    pub fn defining_module(&self, name: &str) -> Option<&str> {
        if self.symbols.get(name).is_some() {
            return Some(self.name());
        }
        self.imports
            .iter()
            .find(|m| m.get(name).is_some())
            .map(|m| m.name())
    }

    /// Resolve a descriptor by name.
    pub fn resolve(&self, name: &str) -> Result<&Descriptor, DeclError> {
        self.lookup(name).ok_or_else(|| DeclError::UnknownName {
            module: self.module.name.clone(),
            name: name.to_string(),
        })
    }

    /// Descriptors declared in this module, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.symbols.entries.iter()
    }

    /// Descriptors of one kind, in declaration order.
    pub fn of_kind(&self, kind: DescriptorKind) -> impl Iterator<Item = &Descriptor> {
        self.iter().filter(move |d| d.kind() == kind)
    }

    pub fn len(&self) -> usize {
        self.symbols.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.entries.is_empty()
    }

    /// Count descriptors per kind.
    pub fn counts(&self) -> HashMap<DescriptorKind, usize> {
        let mut counts = HashMap::new();
        for d in self.iter() {
            *counts.entry(d.kind()).or_insert(0) += 1;
        }
        counts
    }

    /// SHA-256 of the canonical JSON form of this module.
    ///
    /// Generators can cache their output on it: two registries with the same
    /// fingerprint describe the same API surface.
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        Ok(sha256_str(&serde_json::to_string(self)?))
    }
}
