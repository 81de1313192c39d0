//! Call-site evaluation of parameter annotations.
//!
//! Given concrete arguments for a function (integers for scalars, element
//! counts for buffers), fill in auto-sized and defaulted parameters and verify
//! every checked buffer is large enough, the way generated glue does before
//! the native call.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::core::{Annotation, Bindings, Descriptor, EvalError, FunctionDescriptor, TypeRef};
use crate::registry::{DeclError, FrozenRegistry};

/// A concrete argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgValue {
    /// Scalar value
    Int(i64),
    /// Buffer, described by its element count
    Buffer { len: i64 },
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Int(v) => write!(f, "{}", v),
            ArgValue::Buffer { len } => write!(f, "buffer[{}]", len),
        }
    }
}

/// Arguments keyed by parameter name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallArgs {
    values: BTreeMap<String, ArgValue>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a scalar argument.
    pub fn int(mut self, name: impl Into<String>, value: i64) -> Self {
        self.values.insert(name.into(), ArgValue::Int(value));
        self
    }

    /// Add a buffer argument with `len` elements.
    pub fn buffer(mut self, name: impl Into<String>, len: i64) -> Self {
        self.values.insert(name.into(), ArgValue::Buffer { len });
        self
    }

    /// Set an argument, returning the value it replaces.
    pub fn insert(&mut self, name: impl Into<String>, value: ArgValue) -> Option<ArgValue> {
        self.values.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<ArgValue> {
        self.values.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ArgValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Bindings for CallArgs {
    fn value(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ArgValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    fn length(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ArgValue::Buffer { len }) => Some(*len),
            _ => None,
        }
    }
}

/// Parse a `name=value` command-line pair.
pub fn parse_assignment(s: &str) -> Result<(String, i64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected `name=value`, found `{}`", s))?;
    let value = i64::from_str(value.trim())
        .map_err(|e| format!("invalid value for `{}`: {}", name.trim(), e))?;
    Ok((name.trim().to_string(), value))
}

/// Error checking a call against a function's annotations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallCheckError {
    #[error(transparent)]
    Decl(#[from] DeclError),

    #[error("`{0}` is not a function")]
    NotAFunction(String),

    #[error("`{function}` has no parameter `{param}`")]
    UnexpectedArgument { function: String, param: String },

    #[error("missing argument `{param}` for `{function}`")]
    MissingArgument { function: String, param: String },

    #[error("`{param}` of `{function}` is a buffer, pass its length")]
    ExpectedBuffer { function: String, param: String },

    #[error("`{param}` of `{function}` is a scalar, pass a value")]
    ExpectedInt { function: String, param: String },

    #[error("buffer `{param}` of `{function}` cannot hold {len} elements")]
    NegativeLength {
        function: String,
        param: String,
        len: i64,
    },

    #[error("`{param}` of `{function}` is the length of `{target}` ({expected}), but {found} was passed")]
    AutoSizeMismatch {
        function: String,
        param: String,
        target: String,
        expected: i64,
        found: i64,
    },

    #[error("buffer `{param}` of `{function}` holds {len} elements, `{expr}` requires {required}")]
    BufferTooSmall {
        function: String,
        param: String,
        expr: String,
        required: i64,
        len: i64,
    },

    #[error("`{expr}` requires {required} elements for buffer `{param}` of `{function}`")]
    NegativeCapacity {
        function: String,
        param: String,
        expr: String,
        required: i64,
    },

    #[error("cannot evaluate `{expr}` for `{function}.{param}`: {source}")]
    Eval {
        function: String,
        param: String,
        expr: String,
        source: EvalError,
    },
}

/// A buffer capacity that was verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityCheck {
    pub param: String,
    pub expr: String,
    pub required: i64,
    pub len: i64,
}

/// Arguments completed and verified for a native call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedCall {
    pub function: String,
    pub native_name: String,
    /// Every argument in parameter order
    pub args: Vec<(String, ArgValue)>,
    /// Parameters whose value was derived rather than passed
    pub derived: Vec<String>,
    pub checks: Vec<CapacityCheck>,
}

/// Resolve `function` in `module` and check a call to it.
pub fn check_call(
    module: &FrozenRegistry,
    function: &str,
    args: &CallArgs,
) -> Result<CheckedCall, CallCheckError> {
    match module.resolve(function)? {
        Descriptor::Function(func) => check_function_call(module, func, args),
        _ => Err(CallCheckError::NotAFunction(function.to_string())),
    }
}

/// Check a call to an already resolved function.
///
/// Auto-size parameters are computed first, then defaults (which may read
/// them), then every check is evaluated against the completed arguments.
pub fn check_function_call(
    module: &FrozenRegistry,
    func: &FunctionDescriptor,
    args: &CallArgs,
) -> Result<CheckedCall, CallCheckError> {
    let fname = || func.name.clone();
    let mut args = args.clone();
    let mut derived = Vec::new();

    for (name, _) in args.iter() {
        if func.param(name).is_none() {
            return Err(CallCheckError::UnexpectedArgument {
                function: fname(),
                param: name.to_string(),
            });
        }
    }

    for p in &func.params {
        let buffer = is_buffer(module, &p.ty);
        match args.get(&p.name) {
            Some(ArgValue::Int(_)) if buffer => {
                return Err(CallCheckError::ExpectedBuffer {
                    function: fname(),
                    param: p.name.clone(),
                })
            }
            Some(ArgValue::Buffer { .. }) if !buffer => {
                return Err(CallCheckError::ExpectedInt {
                    function: fname(),
                    param: p.name.clone(),
                })
            }
            Some(ArgValue::Buffer { len }) if len < 0 => {
                return Err(CallCheckError::NegativeLength {
                    function: fname(),
                    param: p.name.clone(),
                    len,
                })
            }
            _ => {}
        }
    }

    for p in &func.params {
        let Some(Annotation::AutoSize { target }) = &p.annotation else {
            continue;
        };
        let expected = args
            .length(target)
            .ok_or_else(|| CallCheckError::MissingArgument {
                function: fname(),
                param: target.clone(),
            })?;

        match args.value(&p.name) {
            Some(found) if found != expected => {
                return Err(CallCheckError::AutoSizeMismatch {
                    function: fname(),
                    param: p.name.clone(),
                    target: target.clone(),
                    expected,
                    found,
                })
            }
            Some(_) => {}
            None => {
                args.insert(p.name.clone(), ArgValue::Int(expected));
                derived.push(p.name.clone());
            }
        }
    }

    // Defaults may read each other in any order the registry allowed, so
    // evaluate until no more progress is made.
    let mut pending: Vec<_> = func
        .params
        .iter()
        .filter(|p| args.get(&p.name).is_none())
        .filter_map(|p| match &p.annotation {
            Some(Annotation::Default(expr)) => Some((p, expr)),
            _ => None,
        })
        .collect();

    loop {
        let before = pending.len();
        let mut still_pending = Vec::new();
        for (p, expr) in pending {
            match expr.eval(&args) {
                Ok(value) => {
                    args.insert(p.name.clone(), ArgValue::Int(value));
                    derived.push(p.name.clone());
                }
                Err(EvalError::Unbound(_)) => still_pending.push((p, expr)),
                Err(source) => {
                    return Err(CallCheckError::Eval {
                        function: fname(),
                        param: p.name.clone(),
                        expr: expr.to_string(),
                        source,
                    })
                }
            }
        }
        pending = still_pending;
        if pending.is_empty() || pending.len() == before {
            break;
        }
    }

    if let Some((p, expr)) = pending.first() {
        let source = expr
            .eval(&args)
            .err()
            .unwrap_or_else(|| EvalError::Unbound(p.name.clone()));
        return Err(CallCheckError::Eval {
            function: fname(),
            param: p.name.clone(),
            expr: expr.to_string(),
            source,
        });
    }

    let mut completed = Vec::with_capacity(func.params.len());
    for p in &func.params {
        let value = args
            .get(&p.name)
            .ok_or_else(|| CallCheckError::MissingArgument {
                function: fname(),
                param: p.name.clone(),
            })?;
        completed.push((p.name.clone(), value));
    }

    let mut checks = Vec::new();
    for p in &func.params {
        let Some(Annotation::Check(expr)) = &p.annotation else {
            continue;
        };
        let required = expr.eval(&args).map_err(|source| CallCheckError::Eval {
            function: fname(),
            param: p.name.clone(),
            expr: expr.to_string(),
            source,
        })?;
        if required < 0 {
            return Err(CallCheckError::NegativeCapacity {
                function: fname(),
                param: p.name.clone(),
                expr: expr.to_string(),
                required,
            });
        }
        let len = args.length(&p.name).unwrap_or(0);

        if len < required {
            return Err(CallCheckError::BufferTooSmall {
                function: fname(),
                param: p.name.clone(),
                expr: expr.to_string(),
                required,
                len,
            });
        }
        checks.push(CapacityCheck {
            param: p.name.clone(),
            expr: expr.to_string(),
            required,
            len,
        });
    }

    tracing::debug!(
        "call to `{}` passes {} capacity checks",
        func.native_name,
        checks.len()
    );

    Ok(CheckedCall {
        function: func.name.clone(),
        native_name: func.native_name.clone(),
        args: completed,
        derived,
        checks,
    })
}

fn is_buffer(module: &FrozenRegistry, ty: &TypeRef) -> bool {
    match ty {
        TypeRef::Pointer { .. } => true,
        TypeRef::Named(name) => module.lookup(name).is_some_and(Descriptor::is_pointer),
        TypeRef::Primitive(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;

    fn truetype() -> std::sync::Arc<FrozenRegistry> {
        catalog::bundled()
            .unwrap()
            .get("stb_truetype")
            .unwrap()
            .clone()
    }

    fn bake_args() -> CallArgs {
        CallArgs::new()
            .buffer("data", 4096)
            .int("pixel_height", 32)
            .buffer("pixels", 512 * 512)
            .int("pw", 512)
            .int("ph", 512)
            .int("first_char", 32)
            .buffer("chardata", 96)
    }

    #[test]
    fn test_bake_font_bitmap_call() {
        let tt = truetype();
        let call = check_call(&tt, "BakeFontBitmap", &bake_args()).unwrap();

        assert_eq!(call.native_name, "stbtt_BakeFontBitmap");
        assert_eq!(call.args.len(), 9);
        assert_eq!(call.args[1], ("offset".to_string(), ArgValue::Int(0)));
        assert_eq!(call.args[7], ("num_chars".to_string(), ArgValue::Int(96)));
        assert_eq!(call.derived, vec!["num_chars", "offset"]);
        assert_eq!(
            call.checks,
            vec![CapacityCheck {
                param: "pixels".into(),
                expr: "pw * ph".into(),
                required: 512 * 512,
                len: 512 * 512,
            }]
        );
    }

    #[test]
    fn test_undersized_pixels_buffer() {
        let tt = truetype();
        let args = bake_args().buffer("pixels", 512 * 511);
        let err = check_call(&tt, "BakeFontBitmap", &args).unwrap_err();
        assert_eq!(
            err,
            CallCheckError::BufferTooSmall {
                function: "BakeFontBitmap".into(),
                param: "pixels".into(),
                expr: "pw * ph".into(),
                required: 512 * 512,
                len: 512 * 511,
            }
        );
    }

    #[test]
    fn test_auto_size_mismatch() {
        let tt = truetype();
        let args = bake_args().int("num_chars", 95);
        let err = check_call(&tt, "BakeFontBitmap", &args).unwrap_err();
        assert!(matches!(
            err,
            CallCheckError::AutoSizeMismatch {
                expected: 96,
                found: 95,
                ..
            }
        ));

        // Passing the matching value is fine
        let args = bake_args().int("num_chars", 96);
        let call = check_call(&tt, "BakeFontBitmap", &args).unwrap();
        assert_eq!(call.derived, vec!["offset"]);
    }

    #[test]
    fn test_missing_and_mistyped_arguments() {
        let tt = truetype();

        let mut args = bake_args();
        args.values.remove("pw");
        assert!(matches!(
            check_call(&tt, "BakeFontBitmap", &args).unwrap_err(),
            CallCheckError::MissingArgument { param, .. } if param == "pw"
        ));

        let args = bake_args().int("pixels", 3);
        assert!(matches!(
            check_call(&tt, "BakeFontBitmap", &args).unwrap_err(),
            CallCheckError::ExpectedBuffer { .. }
        ));

        let args = bake_args().buffer("pw", 3);
        assert!(matches!(
            check_call(&tt, "BakeFontBitmap", &args).unwrap_err(),
            CallCheckError::ExpectedInt { .. }
        ));

        let args = bake_args().int("bogus", 1);
        assert!(matches!(
            check_call(&tt, "BakeFontBitmap", &args).unwrap_err(),
            CallCheckError::UnexpectedArgument { .. }
        ));
    }

    #[test]
    fn test_constant_checks() {
        let tt = truetype();
        let args = CallArgs::new()
            .buffer("chardata", 96)
            .int("pw", 512)
            .int("ph", 512)
            .int("char_index", 0)
            .buffer("xpos", 0)
            .buffer("ypos", 1)
            .buffer("q", 1)
            .int("opengl_fillrule", 1);
        let err = check_call(&tt, "GetBakedQuad", &args).unwrap_err();
        assert!(matches!(
            err,
            CallCheckError::BufferTooSmall { ref param, required: 1, len: 0, .. } if param == "xpos"
        ));
    }

    #[test]
    fn test_negative_sizes_are_rejected() {
        let tt = truetype();

        let args = bake_args().buffer("chardata", -5);
        assert_eq!(
            check_call(&tt, "BakeFontBitmap", &args).unwrap_err(),
            CallCheckError::NegativeLength {
                function: "BakeFontBitmap".into(),
                param: "chardata".into(),
                len: -5,
            }
        );

        let args = bake_args().int("pw", -1).int("ph", 1).buffer("pixels", 0);
        assert_eq!(
            check_call(&tt, "BakeFontBitmap", &args).unwrap_err(),
            CallCheckError::NegativeCapacity {
                function: "BakeFontBitmap".into(),
                param: "pixels".into(),
                expr: "pw * ph".into(),
                required: -1,
            }
        );
    }

    #[test]
    fn test_overflow_is_reported() {
        let tt = truetype();
        let args = bake_args().int("pw", i64::MAX).int("ph", 2);
        assert!(matches!(
            check_call(&tt, "BakeFontBitmap", &args).unwrap_err(),
            CallCheckError::Eval {
                source: EvalError::Overflow(_),
                ..
            }
        ));
    }

    #[test]
    fn test_not_a_function() {
        let tt = truetype();
        assert_eq!(
            check_call(&tt, "STBTTAlignedQuad", &CallArgs::new()).unwrap_err(),
            CallCheckError::NotAFunction("STBTTAlignedQuad".into())
        );
        assert!(matches!(
            check_call(&tt, "Nope", &CallArgs::new()).unwrap_err(),
            CallCheckError::Decl(DeclError::UnknownName { .. })
        ));
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(parse_assignment("pw=512"), Ok(("pw".to_string(), 512)));
        assert_eq!(parse_assignment(" ph = -1"), Ok(("ph".to_string(), -1)));
        assert!(parse_assignment("pw").is_err());
        assert!(parse_assignment("pw=x").is_err());
    }
}
