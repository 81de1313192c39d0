//! Core descriptor model.
//!
//! Everything here is plain data: the registry in [`crate::registry`] is the
//! only place descriptors are validated and stored.

pub mod ctype;
pub mod descriptor;
pub mod expr;
pub mod param;

use std::sync::LazyLock;

use regex::Regex;

pub use ctype::{ParseTypeError, Primitive, TypeRef};
pub use descriptor::{
    CallbackDecl, CallbackDoc, CallbackSignature, Descriptor, DescriptorKind, Field,
    FunctionDecl, FunctionDescriptor, PointerType, StructDecl, StructDescriptor, TypeAlias,
};
pub use expr::{Bindings, EvalError, Expr, Operand, ParseExprError};
pub use param::{Annotation, AnnotationDecl, Direction, ParamDecl, Parameter};

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Check if a string is a valid C identifier.
pub fn is_identifier(s: &str) -> bool {
    IDENTIFIER.is_match(s)
}
