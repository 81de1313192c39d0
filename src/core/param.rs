//! Parameters of callbacks and functions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ctype::TypeRef;
use super::expr::Expr;

/// Data flow direction of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Read by the native code (default)
    #[default]
    In,
    /// Written back to the caller through a pointer
    Out,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::In => write!(f, "in"),
            Direction::Out => write!(f, "out"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "in" => Ok(Direction::In),
            "out" => Ok(Direction::Out),
            other => Err(format!("unknown direction `{}`, expected `in` or `out`", other)),
        }
    }
}

/// An annotation as written, before its expression is parsed and checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationDecl {
    /// Fixed value when a higher-level caller omits the parameter
    Default(String),
    /// Value is the length of the named array parameter
    AutoSize(String),
    /// Required capacity of this buffer parameter
    Check(String),
}

/// A validated parameter annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Annotation {
    Default(Expr),
    AutoSize { target: String },
    Check(Expr),
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Annotation::Default(expr) => write!(f, "default({})", expr),
            Annotation::AutoSize { target } => write!(f, "auto_size({})", target),
            Annotation::Check(expr) => write!(f, "check({})", expr),
        }
    }
}

/// A parameter as passed to `declare_callback` / `declare_function`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDecl {
    pub name: String,
    pub ty: TypeRef,
    pub direction: Direction,
    pub doc: String,
    pub annotation: Option<AnnotationDecl>,
}

impl ParamDecl {
    /// Create an IN parameter.
    pub fn input(name: impl Into<String>, ty: TypeRef) -> Self {
        ParamDecl {
            name: name.into(),
            ty,
            direction: Direction::In,
            doc: String::new(),
            annotation: None,
        }
    }

    /// Create an OUT parameter.
    pub fn output(name: impl Into<String>, ty: TypeRef) -> Self {
        ParamDecl {
            direction: Direction::Out,
            ..ParamDecl::input(name, ty)
        }
    }

    /// Set the documentation.
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    /// Give the parameter a constant-default expression.
    pub fn default_expr(mut self, expr: impl Into<String>) -> Self {
        self.annotation = Some(AnnotationDecl::Default(expr.into()));
        self
    }

    /// Derive the parameter from the length of `target`.
    pub fn auto_size(mut self, target: impl Into<String>) -> Self {
        self.annotation = Some(AnnotationDecl::AutoSize(target.into()));
        self
    }

    /// Require the buffer to hold at least `expr` elements.
    pub fn check(mut self, expr: impl Into<String>) -> Self {
        self.annotation = Some(AnnotationDecl::Check(expr.into()));
        self
    }
}

/// A validated parameter of a declared callback or function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    pub direction: Direction,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub doc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<Annotation>,
}
