//! Descriptor records and the builders used to declare them.
//!
//! The `*Decl` types are registry input. The registry validates them and
//! stores the corresponding descriptor, which is immutable from then on.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ctype::{Primitive, TypeRef};
use super::param::{ParamDecl, Parameter};

/// A renaming of a primitive C type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeAlias {
    pub name: String,
    pub primitive: Primitive,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

/// A named "pointer to T" type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerType {
    pub name: String,
    pub pointee: TypeRef,
}

/// A struct field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        Field {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

/// A native struct layout. Field order is memory order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructDescriptor {
    pub name: String,
    pub native_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(default)]
    pub doc: String,
    pub fields: Vec<Field>,
}

impl StructDescriptor {
    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Documentation attached to a callback signature.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackDoc {
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_doc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    /// Class hosting the single-abstract-method factory for this callback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sam_constructor: Option<String>,
}

/// A native function pointer type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackSignature {
    pub name: String,
    /// The native slot this callback fills, e.g. `stbi_io_callbacks.read`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_name: Option<String>,
    pub params: Vec<Parameter>,
    pub return_type: TypeRef,
    #[serde(default)]
    pub doc: CallbackDoc,
}

/// A native function signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub name: String,
    pub native_name: String,
    pub params: Vec<Parameter>,
    pub return_type: TypeRef,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_doc: Option<String>,
}

impl FunctionDescriptor {
    /// Look up a parameter by name.
    pub fn param(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// Kinds of descriptor, for filtering and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptorKind {
    Type,
    Pointer,
    Struct,
    Callback,
    Function,
}

impl DescriptorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DescriptorKind::Type => "type",
            DescriptorKind::Pointer => "pointer",
            DescriptorKind::Struct => "struct",
            DescriptorKind::Callback => "callback",
            DescriptorKind::Function => "function",
        }
    }
}

impl fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DescriptorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "type" | "alias" => Ok(DescriptorKind::Type),
            "pointer" => Ok(DescriptorKind::Pointer),
            "struct" => Ok(DescriptorKind::Struct),
            "callback" => Ok(DescriptorKind::Callback),
            "function" => Ok(DescriptorKind::Function),
            other => Err(format!(
                "unknown descriptor kind `{}`, expected one of: type, pointer, struct, callback, function",
                other
            )),
        }
    }
}

/// Any registered descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Descriptor {
    #[serde(rename = "type")]
    TypeAlias(TypeAlias),
    Pointer(PointerType),
    Struct(StructDescriptor),
    Callback(CallbackSignature),
    Function(FunctionDescriptor),
}

impl Descriptor {
    pub fn name(&self) -> &str {
        match self {
            Descriptor::TypeAlias(d) => &d.name,
            Descriptor::Pointer(d) => &d.name,
            Descriptor::Struct(d) => &d.name,
            Descriptor::Callback(d) => &d.name,
            Descriptor::Function(d) => &d.name,
        }
    }

    pub fn kind(&self) -> DescriptorKind {
        match self {
            Descriptor::TypeAlias(_) => DescriptorKind::Type,
            Descriptor::Pointer(_) => DescriptorKind::Pointer,
            Descriptor::Struct(_) => DescriptorKind::Struct,
            Descriptor::Callback(_) => DescriptorKind::Callback,
            Descriptor::Function(_) => DescriptorKind::Function,
        }
    }

    /// Whether fields and parameters may use this descriptor as a type.
    pub fn is_type(&self) -> bool {
        !matches!(self, Descriptor::Function(_))
    }

    /// Whether a value of this type is a pointer at the ABI level.
    pub fn is_pointer(&self) -> bool {
        matches!(self, Descriptor::Pointer(_))
    }

    /// The primitive behind an alias.
    pub fn as_primitive(&self) -> Option<Primitive> {
        match self {
            Descriptor::TypeAlias(alias) => Some(alias.primitive),
            _ => None,
        }
    }

    /// Names of the declared types this descriptor refers to, in order.
    pub fn references(&self) -> Vec<&str> {
        let mut names: Vec<&str> = match self {
            Descriptor::TypeAlias(_) => Vec::new(),
            Descriptor::Pointer(p) => p.pointee.referenced_name().into_iter().collect(),
            Descriptor::Struct(s) => s
                .fields
                .iter()
                .filter_map(|f| f.ty.referenced_name())
                .collect(),
            Descriptor::Callback(c) => c
                .params
                .iter()
                .filter_map(|p| p.ty.referenced_name())
                .chain(c.return_type.referenced_name())
                .collect(),
            Descriptor::Function(func) => func
                .params
                .iter()
                .filter_map(|p| p.ty.referenced_name())
                .chain(func.return_type.referenced_name())
                .collect(),
        };
        let mut seen = std::collections::HashSet::new();
        names.retain(|n| seen.insert(*n));
        names
    }
}

/// Input to `declare_struct`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructDecl {
    pub name: String,
    pub native_name: Option<String>,
    pub header: Option<String>,
    pub doc: String,
    pub fields: Vec<Field>,
}

impl StructDecl {
    pub fn new(name: impl Into<String>) -> Self {
        StructDecl {
            name: name.into(),
            native_name: None,
            header: None,
            doc: String::new(),
            fields: Vec::new(),
        }
    }

    /// The C name of the struct, defaults to the binding name.
    pub fn native_name(mut self, native_name: impl Into<String>) -> Self {
        self.native_name = Some(native_name.into());
        self
    }

    /// The header that declares the struct.
    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    /// Append a field. Fields are laid out in the order they are added.
    pub fn field(mut self, name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        self.fields.push(Field::new(name, ty));
        self
    }
}

/// Input to `declare_callback`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackDecl {
    pub name: String,
    pub native_name: Option<String>,
    pub params: Vec<ParamDecl>,
    /// Every `returns` call is kept so the registry can reject more than one
    pub returns: Vec<TypeRef>,
    pub doc: CallbackDoc,
}

impl CallbackDecl {
    pub fn new(name: impl Into<String>) -> Self {
        CallbackDecl {
            name: name.into(),
            native_name: None,
            params: Vec::new(),
            returns: Vec::new(),
            doc: CallbackDoc::default(),
        }
    }

    pub fn native_name(mut self, native_name: impl Into<String>) -> Self {
        self.native_name = Some(native_name.into());
        self
    }

    pub fn param(mut self, param: ParamDecl) -> Self {
        self.params.push(param);
        self
    }

    pub fn returns(mut self, ty: impl Into<TypeRef>) -> Self {
        self.returns.push(ty.into());
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.doc.summary = summary.into();
        self
    }

    pub fn return_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc.return_doc = Some(doc.into());
        self
    }

    pub fn documentation(mut self, doc: impl Into<String>) -> Self {
        self.doc.documentation = Some(doc.into());
        self
    }

    pub fn sam_constructor(mut self, class: impl Into<String>) -> Self {
        self.doc.sam_constructor = Some(class.into());
        self
    }
}

/// Input to `declare_function`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDecl {
    pub name: String,
    pub native_name: Option<String>,
    pub params: Vec<ParamDecl>,
    pub returns: Vec<TypeRef>,
    pub summary: String,
    pub return_doc: Option<String>,
}

impl FunctionDecl {
    pub fn new(name: impl Into<String>) -> Self {
        FunctionDecl {
            name: name.into(),
            native_name: None,
            params: Vec::new(),
            returns: Vec::new(),
            summary: String::new(),
            return_doc: None,
        }
    }

    /// The C symbol, defaults to the module prefix followed by the name.
    pub fn native_name(mut self, native_name: impl Into<String>) -> Self {
        self.native_name = Some(native_name.into());
        self
    }

    pub fn param(mut self, param: ParamDecl) -> Self {
        self.params.push(param);
        self
    }

    pub fn returns(mut self, ty: impl Into<TypeRef>) -> Self {
        self.returns.push(ty.into());
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn return_doc(mut self, doc: impl Into<String>) -> Self {
        self.return_doc = Some(doc.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::param::Direction;

    #[test]
    fn test_descriptor_kind_from_str() {
        assert_eq!("struct".parse::<DescriptorKind>(), Ok(DescriptorKind::Struct));
        assert_eq!("alias".parse::<DescriptorKind>(), Ok(DescriptorKind::Type));
        assert!("enum".parse::<DescriptorKind>().is_err());
    }

    #[test]
    fn test_struct_decl_keeps_field_order() {
        let decl = StructDecl::new("STBTTBakedChar")
            .native_name("stbtt_bakedchar")
            .field("x0", Primitive::UShort)
            .field("y0", Primitive::UShort)
            .field("xoff", Primitive::Float);
        let names: Vec<_> = decl.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["x0", "y0", "xoff"]);
    }

    #[test]
    fn test_references_are_deduplicated() {
        let func = Descriptor::Function(FunctionDescriptor {
            name: "GetBakedQuad".into(),
            native_name: "stbtt_GetBakedQuad".into(),
            params: vec![
                Parameter {
                    name: "chardata".into(),
                    ty: TypeRef::named("STBTTBakedChar").pointer(),
                    direction: Direction::In,
                    doc: String::new(),
                    annotation: None,
                },
                Parameter {
                    name: "other".into(),
                    ty: TypeRef::named("STBTTBakedChar").pointer(),
                    direction: Direction::In,
                    doc: String::new(),
                    annotation: None,
                },
            ],
            return_type: TypeRef::VOID,
            summary: String::new(),
            return_doc: None,
        });
        assert_eq!(func.references(), vec!["STBTTBakedChar"]);
        assert!(!func.is_type());
    }

    #[test]
    fn test_descriptor_serializes_with_kind_tag() {
        let alias = Descriptor::TypeAlias(TypeAlias {
            name: "stbi_uc".into(),
            primitive: Primitive::UChar,
            doc: None,
        });
        let json = serde_json::to_value(&alias).unwrap();
        assert_eq!(json["kind"], "type");
        assert_eq!(json["primitive"], "unsigned char");
    }
}
