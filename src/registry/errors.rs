//! Declaration error types and diagnostics.

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::core::DescriptorKind;
use crate::util::diagnostic::{suggestions, Diagnostic};

/// Error raised while declaring or resolving descriptors.
///
/// Every variant is detected eagerly, at the `declare_*` call that introduced
/// the problem, and names the module and descriptor involved.
#[derive(Debug, Clone, PartialEq, Eq, Error, MietteDiagnostic)]
pub enum DeclError {
    #[error("`{name}` is already declared in module `{module}`")]
    #[diagnostic(code(nativedecl::decl::duplicate_name))]
    DuplicateName {
        module: String,
        name: String,
        existing: DescriptorKind,
    },

    #[error("unknown type `{type_name}` in `{descriptor}.{site}`")]
    #[diagnostic(code(nativedecl::decl::unknown_type))]
    UnknownType {
        module: String,
        descriptor: String,
        /// Field or parameter name, `return` for return types
        site: String,
        type_name: String,
    },

    #[error("no descriptor named `{name}` in module `{module}`")]
    #[diagnostic(code(nativedecl::decl::unknown_name))]
    UnknownName { module: String, name: String },

    #[error("invalid expression `{expr}` on `{descriptor}.{param}`: {reason}")]
    #[diagnostic(code(nativedecl::decl::invalid_expression))]
    InvalidExpression {
        module: String,
        descriptor: String,
        param: String,
        expr: String,
        reason: String,
    },

    #[error("invalid signature for `{descriptor}`: {reason}")]
    #[diagnostic(code(nativedecl::decl::invalid_signature))]
    InvalidSignature {
        module: String,
        descriptor: String,
        site: Option<String>,
        reason: String,
    },

    #[error("struct `{name}` in module `{module}` has no fields")]
    #[diagnostic(
        code(nativedecl::decl::empty_struct),
        help("Native structs need at least one member to have a layout")
    )]
    EmptyStruct { module: String, name: String },

    #[error("module `{name}` is already loaded")]
    #[diagnostic(code(nativedecl::catalog::duplicate_module))]
    DuplicateModule { name: String },

    #[error("unknown module `{name}`")]
    #[diagnostic(code(nativedecl::catalog::unknown_module))]
    UnknownModule { name: String },
}

impl DeclError {
    /// The module the error was raised in.
    pub fn module(&self) -> &str {
        match self {
            DeclError::DuplicateName { module, .. }
            | DeclError::UnknownType { module, .. }
            | DeclError::UnknownName { module, .. }
            | DeclError::InvalidExpression { module, .. }
            | DeclError::InvalidSignature { module, .. }
            | DeclError::EmptyStruct { module, .. } => module,
            DeclError::DuplicateModule { name } | DeclError::UnknownModule { name } => name,
        }
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            DeclError::DuplicateName {
                module,
                name,
                existing,
            } => Diagnostic::error(format!("duplicate declaration of `{}`", name))
                .with_context(format!("module `{}` already has a {} named `{}`", module, existing, name))
                .with_suggestion("Rename one of the declarations")
                .with_suggestion("Declarations are never merged, even when identical"),

            DeclError::UnknownType {
                module,
                descriptor,
                site,
                type_name,
            } => Diagnostic::error(format!("unknown type `{}`", type_name))
                .with_context(format!("used by `{}.{}` in module `{}`", descriptor, site, module))
                .with_suggestion(format!(
                    "Declare `{}` before `{}`, or import the module that declares it",
                    type_name, descriptor
                )),

            DeclError::UnknownName { module, name } => {
                Diagnostic::error(format!("no descriptor named `{}`", name))
                    .with_context(format!("searched module `{}` and its imports", module))
                    .with_suggestion(suggestions::LIST_DESCRIPTORS)
            }

            DeclError::InvalidExpression {
                module,
                descriptor,
                param,
                expr,
                reason,
            } => Diagnostic::error(format!("invalid expression `{}`", expr))
                .with_context(format!("on parameter `{}` of `{}` in module `{}`", param, descriptor, module))
                .with_context(reason.clone())
                .with_suggestion(
                    "Expressions may use integers, earlier IN parameters, `length(buffer)` and `*`",
                ),

            DeclError::InvalidSignature {
                module,
                descriptor,
                site,
                reason,
            } => {
                let mut diag =
                    Diagnostic::error(format!("invalid signature for `{}`", descriptor))
                        .with_context(format!("in module `{}`", module));
                if let Some(site) = site {
                    diag = diag.with_context(format!("at `{}`", site));
                }
                diag.with_context(reason.clone())
            }

            DeclError::EmptyStruct { module, name } => {
                Diagnostic::error(format!("struct `{}` has no fields", name))
                    .with_context(format!("in module `{}`", module))
                    .with_suggestion("Declare the fields in native memory order")
            }

            DeclError::DuplicateModule { name } => {
                Diagnostic::error(format!("module `{}` is loaded twice", name))
                    .with_suggestion("Pass each descriptor file only once")
            }

            DeclError::UnknownModule { name } => {
                Diagnostic::error(format!("unknown module `{}`", name))
                    .with_suggestion(suggestions::CHECK_MODULES)
            }
        }
    }
}
