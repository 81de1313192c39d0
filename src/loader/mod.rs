//! Descriptor file parsing.
//!
//! A descriptor file declares one module. Declarations are listed in a single
//! `[[decl]]` array so that their order, which is also the registry's
//! declare-before-use order, is the order of the file.
//!
//! ```toml
//! [module]
//! name = "stb_types"
//! version = "0.1.0"
//!
//! [[decl]]
//! kind = "type"
//! name = "stbi_uc"
//! primitive = "unsigned char"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use semver::Version;
use serde::Deserialize;

use crate::core::{
    is_identifier, CallbackDecl, Direction, FunctionDecl, ParamDecl, Primitive, StructDecl,
    TypeRef,
};
use crate::registry::{DeclError, FrozenRegistry, ModuleInfo, Registry, RegistryOptions};

/// Raw descriptor file as deserialized from TOML.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDeclFile {
    module: RawModule,

    #[serde(default, rename = "decl")]
    decls: Vec<RawDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawModule {
    name: String,
    version: Option<Version>,
    namespace: Option<String>,
    header: Option<String>,
    prefix: Option<String>,
    class_name: Option<String>,
    constant_prefix: Option<String>,
    native_directive: Option<String>,
    doc: Option<String>,

    #[serde(default)]
    imports: Vec<String>,

    forward_references: Option<bool>,
}

/// Raw declaration, tagged by `kind`.
///
/// Each variant wraps its own struct so that unknown keys are rejected per
/// kind; a misspelled `params` must not read as an empty parameter list.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum RawDecl {
    Type(RawType),
    Pointer(RawPointer),
    Struct(RawStruct),
    Callback(RawCallback),
    Function(RawFunction),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawType {
    name: String,
    primitive: Primitive,
    doc: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPointer {
    name: String,
    pointee: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStruct {
    name: String,
    native_name: Option<String>,
    header: Option<String>,
    #[serde(default)]
    doc: String,
    #[serde(default)]
    fields: Vec<RawField>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCallback {
    name: String,
    native_name: Option<String>,
    returns: Option<RawReturns>,
    #[serde(default)]
    summary: String,
    return_doc: Option<String>,
    documentation: Option<String>,
    sam_constructor: Option<String>,
    #[serde(default)]
    params: Vec<RawParam>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFunction {
    name: String,
    native_name: Option<String>,
    returns: Option<RawReturns>,
    #[serde(default)]
    summary: String,
    return_doc: Option<String>,
    #[serde(default)]
    params: Vec<RawParam>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawField {
    name: String,
    #[serde(rename = "type")]
    ty: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawParam {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    dir: Direction,
    #[serde(default)]
    doc: String,
    default: Option<RawExpr>,
    auto_size: Option<String>,
    check: Option<RawExpr>,
}

/// An expression written as a string, or as a bare integer for constants.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawExpr {
    Int(i64),
    Text(String),
}

impl RawExpr {
    fn into_source(self) -> String {
        match self {
            RawExpr::Int(v) => v.to_string(),
            RawExpr::Text(s) => s,
        }
    }
}

/// Return type: a single type, or a list the registry will reject if it
/// holds more than one.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawReturns {
    One(String),
    Many(Vec<String>),
}

/// A declaration read from a file, ready to hand to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decl {
    Type {
        name: String,
        primitive: Primitive,
        doc: Option<String>,
    },
    Pointer {
        name: String,
        pointee: TypeRef,
    },
    Struct(StructDecl),
    Callback(CallbackDecl),
    Function(FunctionDecl),
}

impl Decl {
    pub fn name(&self) -> &str {
        match self {
            Decl::Type { name, .. } | Decl::Pointer { name, .. } => name,
            Decl::Struct(d) => &d.name,
            Decl::Callback(d) => &d.name,
            Decl::Function(d) => &d.name,
        }
    }

    fn declare(self, registry: &mut Registry) -> Result<(), DeclError> {
        match self {
            Decl::Type {
                name,
                primitive,
                doc,
            } => registry.declare_type_with_doc(primitive, name, doc).map(drop),
            Decl::Pointer { name, pointee } => registry.declare_pointer(name, pointee).map(drop),
            Decl::Struct(d) => registry.declare_struct(d).map(drop),
            Decl::Callback(d) => registry.declare_callback(d).map(drop),
            Decl::Function(d) => registry.declare_function(d).map(drop),
        }
    }
}

/// A parsed descriptor file.
#[derive(Debug, Clone)]
pub struct DeclFile {
    /// Where the file was read from
    pub path: PathBuf,

    /// Module metadata
    pub module: ModuleInfo,

    /// Modules this one imports, in lookup order
    pub imports: Vec<String>,

    /// Per-module forward-reference policy, overriding the configured default
    pub forward_references: Option<bool>,

    /// Declarations in file order
    pub decls: Vec<Decl>,
}

impl DeclFile {
    /// Load a descriptor file from a path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read descriptor file: {}", path.display()))?;

        Self::parse(&content, path)
    }

    /// Parse descriptor file content.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let raw: RawDeclFile = toml::from_str(content)
            .with_context(|| format!("failed to parse descriptor file: {}", path.display()))?;

        if !is_identifier(&raw.module.name) {
            anyhow::bail!(
                "descriptor file {} declares invalid module name `{}`",
                path.display(),
                raw.module.name
            );
        }

        let decls = raw
            .decls
            .into_iter()
            .map(convert_decl)
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("in module `{}` ({})", raw.module.name, path.display()))?;

        Ok(DeclFile {
            path: path.to_path_buf(),
            module: ModuleInfo {
                name: raw.module.name,
                version: raw.module.version,
                namespace: raw.module.namespace,
                header: raw.module.header,
                prefix: raw.module.prefix,
                class_name: raw.module.class_name,
                constant_prefix: raw.module.constant_prefix,
                native_directive: raw.module.native_directive,
                doc: raw.module.doc,
            },
            imports: raw.module.imports,
            forward_references: raw.module.forward_references,
            decls,
        })
    }

    pub fn name(&self) -> &str {
        &self.module.name
    }

    /// Registry options for this module, given the configured defaults.
    pub fn options(&self, defaults: RegistryOptions) -> RegistryOptions {
        RegistryOptions {
            allow_forward_references: self
                .forward_references
                .unwrap_or(defaults.allow_forward_references),
        }
    }

    /// Declare everything in this file into a fresh registry and freeze it.
    ///
    /// `imports` must hold the frozen modules named by [`DeclFile::imports`],
    /// in the same order.
    pub fn build(
        &self,
        imports: Vec<Arc<FrozenRegistry>>,
        defaults: RegistryOptions,
    ) -> Result<FrozenRegistry, DeclError> {
        let mut registry =
            Registry::with_module(self.module.clone()).with_options(self.options(defaults));
        for import in imports {
            registry = registry.with_import(import);
        }

        for decl in &self.decls {
            decl.clone().declare(&mut registry)?;
        }

        Ok(registry.freeze())
    }
}

fn parse_type(ty: &str, decl: &str, site: &str) -> Result<TypeRef> {
    TypeRef::parse(ty).with_context(|| format!("invalid type `{}` at `{}.{}`", ty, decl, site))
}

fn convert_returns(returns: Option<RawReturns>, decl: &str) -> Result<Vec<TypeRef>> {
    let types = match returns {
        None => Vec::new(),
        Some(RawReturns::One(ty)) => vec![ty],
        Some(RawReturns::Many(types)) => types,
    };
    types
        .iter()
        .map(|ty| parse_type(ty, decl, "return"))
        .collect()
}

fn convert_param(raw: RawParam, decl: &str) -> Result<ParamDecl> {
    let ty = parse_type(&raw.ty, decl, &raw.name)?;
    let annotations = [
        raw.default.is_some(),
        raw.auto_size.is_some(),
        raw.check.is_some(),
    ];
    if annotations.iter().filter(|&&set| set).count() > 1 {
        anyhow::bail!(
            "parameter `{}.{}` may have only one of `default`, `auto_size` and `check`",
            decl,
            raw.name
        );
    }

    let mut param = ParamDecl {
        name: raw.name,
        ty,
        direction: raw.dir,
        doc: raw.doc,
        annotation: None,
    };
    if let Some(expr) = raw.default {
        param = param.default_expr(expr.into_source());
    }
    if let Some(target) = raw.auto_size {
        param = param.auto_size(target);
    }
    if let Some(expr) = raw.check {
        param = param.check(expr.into_source());
    }
    Ok(param)
}

fn convert_decl(raw: RawDecl) -> Result<Decl> {
    let decl = match raw {
        RawDecl::Type(raw) => Decl::Type {
            name: raw.name,
            primitive: raw.primitive,
            doc: raw.doc,
        },

        RawDecl::Pointer(raw) => {
            let pointee = parse_type(&raw.pointee, &raw.name, "pointee")?;
            Decl::Pointer {
                name: raw.name,
                pointee,
            }
        }

        RawDecl::Struct(raw) => {
            let mut decl = StructDecl::new(raw.name.clone()).doc(raw.doc);
            decl.native_name = raw.native_name;
            decl.header = raw.header;
            for field in raw.fields {
                let ty = parse_type(&field.ty, &raw.name, &field.name)?;
                decl = decl.field(field.name, ty);
            }
            Decl::Struct(decl)
        }

        RawDecl::Callback(raw) => {
            let name = raw.name;
            let mut decl = CallbackDecl::new(name.clone()).summary(raw.summary);
            decl.native_name = raw.native_name;
            decl.returns = convert_returns(raw.returns, &name)?;
            decl.doc.return_doc = raw.return_doc;
            decl.doc.documentation = raw.documentation;
            decl.doc.sam_constructor = raw.sam_constructor;
            for p in raw.params {
                decl = decl.param(convert_param(p, &name)?);
            }
            Decl::Callback(decl)
        }

        RawDecl::Function(raw) => {
            let name = raw.name;
            let mut decl = FunctionDecl::new(name.clone()).summary(raw.summary);
            decl.native_name = raw.native_name;
            decl.returns = convert_returns(raw.returns, &name)?;
            decl.return_doc = raw.return_doc;
            for p in raw.params {
                decl = decl.param(convert_param(p, &name)?);
            }
            Decl::Function(decl)
        }
    };
    Ok(decl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AnnotationDecl, Descriptor};
    use tempfile::TempDir;

    const SAMPLE: &str = r##"
[module]
name = "sample"
version = "1.2.0"
prefix = "smp_"
class_name = "Sample"
native_directive = "#define SAMPLE_IMPLEMENTATION\n#include \"sample.h\""

[[decl]]
kind = "type"
name = "byte"
primitive = "unsigned char"

[[decl]]
kind = "pointer"
name = "byte_p"
pointee = "byte"

[[decl]]
kind = "struct"
name = "Span"
fields = [
    { name = "data", type = "byte_p" },
    { name = "len", type = "int" },
]

[[decl]]
kind = "function"
name = "Fill"
returns = "int"
params = [
    { name = "n", type = "int" },
    { name = "out", type = "byte*", dir = "out", check = "n" },
    { name = "flags", type = "int", default = 0 },
]
"##;

    fn sample() -> DeclFile {
        DeclFile::parse(SAMPLE, Path::new("sample.toml")).unwrap()
    }

    #[test]
    fn test_parse_keeps_file_order() {
        let file = sample();
        assert_eq!(file.name(), "sample");
        assert_eq!(file.module.version, Some(Version::new(1, 2, 0)));
        assert_eq!(file.module.class_name.as_deref(), Some("Sample"));
        assert_eq!(file.module.constant_prefix, None);
        assert_eq!(
            file.module.native_directive.as_deref(),
            Some("#define SAMPLE_IMPLEMENTATION\n#include \"sample.h\"")
        );
        let names: Vec<_> = file.decls.iter().map(Decl::name).collect();
        assert_eq!(names, vec!["byte", "byte_p", "Span", "Fill"]);
    }

    #[test]
    fn test_param_annotations() {
        let file = sample();
        let Decl::Function(fill) = &file.decls[3] else {
            panic!("expected a function");
        };
        assert_eq!(fill.params[1].direction, Direction::Out);
        assert_eq!(
            fill.params[1].annotation,
            Some(AnnotationDecl::Check("n".into()))
        );
        assert_eq!(
            fill.params[2].annotation,
            Some(AnnotationDecl::Default("0".into()))
        );
    }

    #[test]
    fn test_build() {
        let module = sample().build(Vec::new(), RegistryOptions::default()).unwrap();
        assert_eq!(module.len(), 4);
        let Descriptor::Function(fill) = module.resolve("Fill").unwrap() else {
            panic!("expected a function");
        };
        assert_eq!(fill.native_name, "smp_Fill");
    }

    #[test]
    fn test_build_reports_decl_errors() {
        let content = r#"
[module]
name = "broken"

[[decl]]
kind = "struct"
name = "S"
fields = [{ name = "x", type = "missing_t" }]
"#;
        let file = DeclFile::parse(content, Path::new("broken.toml")).unwrap();
        let err = file
            .build(Vec::new(), RegistryOptions::default())
            .unwrap_err();
        assert!(matches!(err, DeclError::UnknownType { .. }));
    }

    #[test]
    fn test_multiple_returns_reach_the_registry() {
        let content = r#"
[module]
name = "m"

[[decl]]
kind = "function"
name = "f"
returns = ["int", "float"]
"#;
        let file = DeclFile::parse(content, Path::new("m.toml")).unwrap();
        let err = file
            .build(Vec::new(), RegistryOptions::default())
            .unwrap_err();
        assert!(matches!(err, DeclError::InvalidSignature { .. }));
    }

    #[test]
    fn test_conflicting_annotations() {
        let content = r#"
[module]
name = "m"

[[decl]]
kind = "function"
name = "f"
params = [{ name = "n", type = "int", default = 1, check = "2" }]
"#;
        let err = DeclFile::parse(content, Path::new("m.toml")).unwrap_err();
        assert!(format!("{:#}", err).contains("only one of"));
    }

    #[test]
    fn test_invalid_type_spelling() {
        let content = r#"
[module]
name = "m"

[[decl]]
kind = "pointer"
name = "p"
pointee = "not a type"
"#;
        let err = DeclFile::parse(content, Path::new("m.toml")).unwrap_err();
        assert!(format!("{:#}", err).contains("invalid type `not a type`"));
    }

    #[test]
    fn test_unknown_module_key_is_rejected() {
        let content = "[module]\nname = \"m\"\nprefx = \"x_\"\n";
        assert!(DeclFile::parse(content, Path::new("m.toml")).is_err());
    }

    #[test]
    fn test_misspelled_decl_keys_are_rejected() {
        let decl = |body: &str| format!("[module]\nname = \"m\"\n\n[[decl]]\n{}", body);

        let misspelled = [
            "kind = \"function\"\nname = \"f\"\nparms = [{ name = \"n\", type = \"int\" }]\n",
            "kind = \"function\"\nname = \"f\"\nreturn = \"int\"\n",
            "kind = \"callback\"\nname = \"cb\"\nparam = []\n",
            "kind = \"struct\"\nname = \"S\"\nfeilds = [{ name = \"x\", type = \"int\" }]\n",
            "kind = \"pointer\"\nname = \"p\"\npointee = \"int\"\ndoc = \"x\"\n",
            "kind = \"type\"\nname = \"t\"\nprimitive = \"int\"\nprefix = \"x\"\n",
        ];
        for body in misspelled {
            let err = DeclFile::parse(&decl(body), Path::new("m.toml")).unwrap_err();
            assert!(
                format!("{:#}", err).contains("unknown field"),
                "accepted: {}",
                body
            );
        }

        // The tag itself is not an unknown key
        let ok = decl("kind = \"function\"\nname = \"f\"\nparams = [{ name = \"n\", type = \"int\" }]\n");
        let file = DeclFile::parse(&ok, Path::new("m.toml")).unwrap();
        let Decl::Function(f) = &file.decls[0] else {
            panic!("expected a function");
        };
        assert_eq!(f.params.len(), 1);
    }

    #[test]
    fn test_forward_reference_policy() {
        let mut file = sample();
        let strict = RegistryOptions::default();
        let relaxed = RegistryOptions {
            allow_forward_references: true,
        };
        assert_eq!(file.options(relaxed), relaxed);

        file.forward_references = Some(false);
        assert_eq!(file.options(relaxed), strict);
    }

    #[test]
    fn test_load_from_disk() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sample.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let file = DeclFile::load(&path).unwrap();
        assert_eq!(file.path, path);

        let err = DeclFile::load(&tmp.path().join("missing.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read descriptor file"));
    }
}
