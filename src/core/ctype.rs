//! C type references used by descriptor fields, parameters and return types.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::is_identifier;

/// Built-in C primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Primitive {
    Void,
    Bool,

    /// Character types
    Char,
    UChar,

    /// Standard integer types
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,

    /// Fixed-width integer types
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,

    /// Size types
    Size,
    PtrDiff,

    /// Floating point types
    Float,
    Double,
}

impl Primitive {
    /// Parse the C spelling of a primitive (`unsigned char`, `int`, `uint8_t`).
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.split_whitespace().collect::<Vec<_>>().join(" ");

        let (is_unsigned, s) = if let Some(stripped) = s.strip_prefix("unsigned ") {
            (true, stripped)
        } else if s == "unsigned" {
            (true, "int")
        } else {
            (false, s.strip_prefix("signed ").unwrap_or(&s))
        };

        let prim = match s {
            "void" if !is_unsigned => Primitive::Void,
            "bool" | "_Bool" if !is_unsigned => Primitive::Bool,
            "char" if is_unsigned => Primitive::UChar,
            "char" => Primitive::Char,
            "short" | "short int" if is_unsigned => Primitive::UShort,
            "short" | "short int" => Primitive::Short,
            "int" if is_unsigned => Primitive::UInt,
            "int" => Primitive::Int,
            "long" | "long int" if is_unsigned => Primitive::ULong,
            "long" | "long int" => Primitive::Long,
            "long long" | "long long int" if is_unsigned => Primitive::ULongLong,
            "long long" | "long long int" => Primitive::LongLong,
            "float" if !is_unsigned => Primitive::Float,
            "double" if !is_unsigned => Primitive::Double,

            "int8_t" if !is_unsigned => Primitive::Int8,
            "int16_t" if !is_unsigned => Primitive::Int16,
            "int32_t" if !is_unsigned => Primitive::Int32,
            "int64_t" if !is_unsigned => Primitive::Int64,
            "uint8_t" if !is_unsigned => Primitive::UInt8,
            "uint16_t" if !is_unsigned => Primitive::UInt16,
            "uint32_t" if !is_unsigned => Primitive::UInt32,
            "uint64_t" if !is_unsigned => Primitive::UInt64,

            "size_t" if !is_unsigned => Primitive::Size,
            "ptrdiff_t" if !is_unsigned => Primitive::PtrDiff,

            _ => return None,
        };

        Some(prim)
    }

    /// The C spelling of this primitive.
    pub fn c_name(&self) -> &'static str {
        match self {
            Primitive::Void => "void",
            Primitive::Bool => "bool",
            Primitive::Char => "char",
            Primitive::UChar => "unsigned char",
            Primitive::Short => "short",
            Primitive::UShort => "unsigned short",
            Primitive::Int => "int",
            Primitive::UInt => "unsigned int",
            Primitive::Long => "long",
            Primitive::ULong => "unsigned long",
            Primitive::LongLong => "long long",
            Primitive::ULongLong => "unsigned long long",
            Primitive::Int8 => "int8_t",
            Primitive::Int16 => "int16_t",
            Primitive::Int32 => "int32_t",
            Primitive::Int64 => "int64_t",
            Primitive::UInt8 => "uint8_t",
            Primitive::UInt16 => "uint16_t",
            Primitive::UInt32 => "uint32_t",
            Primitive::UInt64 => "uint64_t",
            Primitive::Size => "size_t",
            Primitive::PtrDiff => "ptrdiff_t",
            Primitive::Float => "float",
            Primitive::Double => "double",
        }
    }

    /// Check if this is an integer type (usable for sizes and counts).
    pub fn is_integer(&self) -> bool {
        !matches!(
            self,
            Primitive::Void | Primitive::Bool | Primitive::Float | Primitive::Double
        )
    }

    /// Check if this is the void type.
    pub fn is_void(&self) -> bool {
        matches!(self, Primitive::Void)
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.c_name())
    }
}

impl From<Primitive> for String {
    fn from(prim: Primitive) -> Self {
        prim.c_name().to_string()
    }
}

impl TryFrom<String> for Primitive {
    type Error = ParseTypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Primitive::parse(&s).ok_or(ParseTypeError::NotPrimitive(s))
    }
}

/// Error parsing a type spelling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseTypeError {
    #[error("empty type")]
    Empty,

    #[error("`{0}` is not a primitive type or a valid type name")]
    InvalidName(String),

    #[error("`{0}` is not a primitive type")]
    NotPrimitive(String),
}

/// A reference to a C type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeRef {
    /// Built-in primitive
    Primitive(Primitive),

    /// A declared alias, pointer type, struct or callback
    Named(String),

    /// Anonymous pointer to another type
    Pointer {
        pointee: Box<TypeRef>,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_const: bool,
    },
}

impl TypeRef {
    pub const VOID: TypeRef = TypeRef::Primitive(Primitive::Void);
    pub const INT: TypeRef = TypeRef::Primitive(Primitive::Int);
    pub const FLOAT: TypeRef = TypeRef::Primitive(Primitive::Float);

    /// Reference a declared type by name.
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    /// Wrap this type in a pointer.
    pub fn pointer(self) -> Self {
        TypeRef::Pointer {
            pointee: Box::new(self),
            is_const: false,
        }
    }

    /// Wrap this type in a pointer to const.
    pub fn const_pointer(self) -> Self {
        TypeRef::Pointer {
            pointee: Box::new(self),
            is_const: true,
        }
    }

    /// Parse a C type spelling such as `const unsigned char*` or `stbi_uc`.
    pub fn parse(s: &str) -> Result<Self, ParseTypeError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseTypeError::Empty);
        }

        // Handle pointers
        if let Some(inner) = s.strip_suffix('*') {
            let inner = inner.trim();
            if let Some(stripped) = inner.strip_prefix("const ") {
                return Ok(TypeRef::parse(stripped)?.const_pointer());
            }
            return Ok(TypeRef::parse(inner)?.pointer());
        }

        // A const qualifier on a value type has no ABI effect
        let s = s.strip_prefix("const ").unwrap_or(s).trim();

        if let Some(prim) = Primitive::parse(s) {
            return Ok(TypeRef::Primitive(prim));
        }

        let name = s
            .strip_prefix("struct ")
            .map(str::trim)
            .unwrap_or(s);

        if is_identifier(name) {
            Ok(TypeRef::Named(name.to_string()))
        } else {
            Err(ParseTypeError::InvalidName(s.to_string()))
        }
    }

    /// Check if this is an anonymous pointer type.
    pub fn is_pointer(&self) -> bool {
        matches!(self, TypeRef::Pointer { .. })
    }

    /// Check if this is the void type.
    pub fn is_void(&self) -> bool {
        matches!(self, TypeRef::Primitive(Primitive::Void))
    }

    /// The declared name this type depends on, looking through pointers.
    pub fn referenced_name(&self) -> Option<&str> {
        match self {
            TypeRef::Primitive(_) => None,
            TypeRef::Named(name) => Some(name),
            TypeRef::Pointer { pointee, .. } => pointee.referenced_name(),
        }
    }
}

impl From<Primitive> for TypeRef {
    fn from(prim: Primitive) -> Self {
        TypeRef::Primitive(prim)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Primitive(prim) => write!(f, "{}", prim),
            TypeRef::Named(name) => f.write_str(name),
            TypeRef::Pointer { pointee, is_const } => {
                if *is_const {
                    write!(f, "const {}*", pointee)
                } else {
                    write!(f, "{}*", pointee)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_parse() {
        assert_eq!(Primitive::parse("void"), Some(Primitive::Void));
        assert_eq!(Primitive::parse("int"), Some(Primitive::Int));
        assert_eq!(Primitive::parse("unsigned  char"), Some(Primitive::UChar));
        assert_eq!(Primitive::parse("unsigned"), Some(Primitive::UInt));
        assert_eq!(Primitive::parse("unsigned short"), Some(Primitive::UShort));
        assert_eq!(Primitive::parse("uint8_t"), Some(Primitive::UInt8));
        assert_eq!(Primitive::parse("unsigned float"), None);
        assert_eq!(Primitive::parse("stbi_uc"), None);
    }

    #[test]
    fn test_typeref_parse() {
        assert_eq!(TypeRef::parse("float").unwrap(), TypeRef::FLOAT);
        assert_eq!(
            TypeRef::parse("void*").unwrap(),
            TypeRef::VOID.pointer()
        );
        assert_eq!(
            TypeRef::parse("const unsigned char *").unwrap(),
            TypeRef::Primitive(Primitive::UChar).const_pointer()
        );
        assert_eq!(
            TypeRef::parse("struct stbtt_bakedchar").unwrap(),
            TypeRef::named("stbtt_bakedchar")
        );
        assert_eq!(
            TypeRef::parse("stbi_uc**").unwrap(),
            TypeRef::named("stbi_uc").pointer().pointer()
        );
        assert_eq!(TypeRef::parse("  "), Err(ParseTypeError::Empty));
        assert!(matches!(
            TypeRef::parse("not a type"),
            Err(ParseTypeError::InvalidName(_))
        ));
    }

    #[test]
    fn test_typeref_display_round_trips_c_spelling() {
        let ty = TypeRef::Primitive(Primitive::UChar).const_pointer();
        assert_eq!(ty.to_string(), "const unsigned char*");
        assert_eq!(TypeRef::parse(&ty.to_string()).unwrap(), ty);
    }

    #[test]
    fn test_referenced_name() {
        assert_eq!(TypeRef::FLOAT.referenced_name(), None);
        assert_eq!(
            TypeRef::named("STBTTAlignedQuad").pointer().referenced_name(),
            Some("STBTTAlignedQuad")
        );
    }
}
