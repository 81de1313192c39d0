//! High-level operations.
//!
//! This module contains the implementation of nativedecl commands.

pub mod call;
pub mod dump;
pub mod explain;
pub mod load;

pub use call::{check_call, ArgValue, CallArgs, CallCheckError, CheckedCall};
pub use dump::{dump, CatalogDump, DumpFormat};
pub use explain::{explain, format_explanation, Explanation, ReferenceGraph};
pub use load::{build_catalog, load_catalog, LoadError, LoadOptions};
