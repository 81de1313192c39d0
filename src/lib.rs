//! nativedecl - declarative descriptors for native-library bindings
//!
//! This crate provides the descriptor model, the validating registry that
//! binding generators consume, a TOML descriptor file loader, and the bundled
//! stb_image / stb_truetype descriptor set.

pub mod catalog;
pub mod core;
pub mod loader;
pub mod ops;
pub mod registry;
pub mod util;

pub use core::{Descriptor, DescriptorKind, Primitive, TypeRef};
pub use loader::DeclFile;
pub use registry::{Catalog, DeclError, FrozenRegistry, ModuleInfo, Registry, RegistryOptions};
