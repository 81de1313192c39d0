//! Font baking functions of stb_truetype.

use std::sync::Arc;

use semver::Version;

use crate::core::{FunctionDecl, ParamDecl, Primitive, TypeRef};
use crate::registry::{DeclError, FrozenRegistry, ModuleInfo, Registry, RegistryOptions};

use super::STB_NAMESPACE;

const MODULE_DOC: &str = "Native bindings to stb_truetype.h from the stb library. \
This library processes TrueType files: it parses files, extracts glyph metrics and shapes, \
and renders glyphs to one-channel bitmaps with antialiasing (box filter).";

const NATIVE_DIRECTIVE: &str = "#define STB_TRUETYPE_IMPLEMENTATION\n#include \"stb_truetype.h\"";

/// Declare the `stb_truetype` module on top of `stb_types`.
///
/// `stbtt_BakeFontBitmap` takes `pixels` before the `pw`/`ph` that size it,
/// so this module allows forward references.
pub fn stb_truetype(types: Arc<FrozenRegistry>) -> Result<FrozenRegistry, DeclError> {
    let mut registry = Registry::with_module(ModuleInfo {
        name: "stb_truetype".to_string(),
        version: Some(Version::new(0, 1, 0)),
        namespace: Some(STB_NAMESPACE.to_string()),
        header: Some("stb_truetype.h".to_string()),
        prefix: Some("stbtt_".to_string()),
        class_name: Some("STBTruetype".to_string()),
        constant_prefix: Some("STBTT".to_string()),
        native_directive: Some(NATIVE_DIRECTIVE.to_string()),
        doc: Some(MODULE_DOC.to_string()),
    })
    .with_options(RegistryOptions {
        allow_forward_references: true,
    })
    .with_import(types);

    let uchar = TypeRef::Primitive(Primitive::UChar);
    let pixel_size = |name: &str, doc: &str| ParamDecl::input(name, TypeRef::INT).doc(doc);

    registry.declare_function(
        FunctionDecl::new("BakeFontBitmap")
            .returns(TypeRef::INT)
            .summary("Bakes a font to a bitmap for use as texture.")
            .param(ParamDecl::input("data", uchar.clone().const_pointer()).doc("the font data"))
            .param(
                ParamDecl::input("offset", TypeRef::INT)
                    .doc("the font data offset, use 0 for plain .ttf files")
                    .default_expr("0"),
            )
            .param(
                ParamDecl::input("pixel_height", TypeRef::FLOAT).doc("the font height, in pixels"),
            )
            .param(
                ParamDecl::output("pixels", uchar.pointer())
                    .doc("a buffer in which to write the font bitmap")
                    .check("pw * ph"),
            )
            .param(pixel_size("pw", "the bitmap width, in pixels"))
            .param(pixel_size("ph", "the bitmap height, in pixels"))
            .param(ParamDecl::input("first_char", TypeRef::INT).doc("the first character to bake"))
            .param(
                ParamDecl::input("num_chars", TypeRef::INT)
                    .doc("the number of characters to bake, starting at `first_char`")
                    .auto_size("chardata"),
            )
            .param(
                ParamDecl::output("chardata", TypeRef::named("stbtt_bakedchar_p"))
                    .doc("an array of STBTTBakedChar structs, it's `num_chars` long"),
            )
            .return_doc(
                "if positive, the first unused row of the bitmap. If negative, returns the \
negative of the number of characters that fit. If 0, no characters fit and no rows were used.",
            ),
    )?;

    registry.declare_function(
        FunctionDecl::new("GetBakedQuad")
            .summary("Computes quad to draw for a given char.")
            .param(ParamDecl::input("chardata", TypeRef::named("stbtt_bakedchar_p")))
            .param(pixel_size("pw", "the bitmap width, in pixels"))
            .param(pixel_size("ph", "the bitmap height, in pixels"))
            .param(
                ParamDecl::input("char_index", TypeRef::INT)
                    .doc("the character index in the `chardata` array"),
            )
            .param(
                ParamDecl::output("xpos", TypeRef::FLOAT.pointer())
                    .doc("the x position")
                    .check("1"),
            )
            .param(
                ParamDecl::output("ypos", TypeRef::FLOAT.pointer())
                    .doc("the y position")
                    .check("1"),
            )
            .param(
                ParamDecl::output("q", TypeRef::named("stbtt_aligned_quad_p"))
                    .doc("an STBTTAlignedQuad struct"),
            )
            .param(
                ParamDecl::input("opengl_fillrule", TypeRef::INT)
                    .doc("1=opengl & d3d10+, 0=d3d9"),
            ),
    )?;

    Ok(registry.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::stb_types;
    use crate::core::{Annotation, Descriptor, Direction, Expr};

    fn truetype() -> FrozenRegistry {
        stb_truetype(Arc::new(stb_types().unwrap())).unwrap()
    }

    #[test]
    fn test_bake_font_bitmap_signature() {
        let tt = truetype();
        let Descriptor::Function(bake) = tt.resolve("BakeFontBitmap").unwrap() else {
            panic!("expected a function");
        };
        assert_eq!(bake.native_name, "stbtt_BakeFontBitmap");
        assert_eq!(bake.return_type, TypeRef::INT);

        let names: Vec<_> = bake.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "data",
                "offset",
                "pixel_height",
                "pixels",
                "pw",
                "ph",
                "first_char",
                "num_chars",
                "chardata"
            ]
        );

        let pixels = bake.param("pixels").unwrap();
        assert_eq!(pixels.direction, Direction::Out);
        assert_eq!(
            pixels.annotation,
            Some(Annotation::Check(Expr::parse("pw * ph").unwrap()))
        );
        assert_eq!(
            bake.param("num_chars").unwrap().annotation,
            Some(Annotation::AutoSize {
                target: "chardata".into()
            })
        );
        assert_eq!(
            bake.param("offset").unwrap().annotation,
            Some(Annotation::Default(Expr::Int(0)))
        );
    }

    #[test]
    fn test_module_carries_generator_metadata() {
        let tt = truetype();
        let info = tt.module();
        assert_eq!(info.class_name.as_deref(), Some("STBTruetype"));
        assert_eq!(info.constant_prefix.as_deref(), Some("STBTT"));
        assert_eq!(info.prefix.as_deref(), Some("stbtt_"));
        assert!(info
            .native_directive
            .as_deref()
            .is_some_and(|d| d.starts_with("#define STB_TRUETYPE_IMPLEMENTATION\n")));
    }

    #[test]
    fn test_get_baked_quad_is_void() {
        let tt = truetype();
        let Descriptor::Function(quad) = tt.resolve("GetBakedQuad").unwrap() else {
            panic!("expected a function");
        };
        assert_eq!(quad.native_name, "stbtt_GetBakedQuad");
        assert!(quad.return_type.is_void());
        assert_eq!(quad.params.len(), 8);
        assert_eq!(quad.param("q").unwrap().direction, Direction::Out);
    }

    #[test]
    fn test_truetype_resolves_imported_structs() {
        let tt = truetype();
        assert!(matches!(
            tt.resolve("STBTTAlignedQuad"),
            Ok(Descriptor::Struct(_))
        ));
        assert_eq!(tt.defining_module("STBTTAlignedQuad"), Some("stb_types"));
        assert_eq!(tt.len(), 2);
    }

    #[test]
    fn test_bake_needs_forward_references() {
        let types = Arc::new(stb_types().unwrap());
        let mut strict = Registry::new("strict").with_import(types);
        let err = strict
            .declare_function(
                FunctionDecl::new("BakeFontBitmap")
                    .param(
                        ParamDecl::output("pixels", TypeRef::Primitive(Primitive::UChar).pointer())
                            .check("pw * ph"),
                    )
                    .param(ParamDecl::input("pw", TypeRef::INT))
                    .param(ParamDecl::input("ph", TypeRef::INT)),
            )
            .unwrap_err();
        assert!(matches!(err, DeclError::InvalidExpression { .. }));
    }
}
