//! Types shared by the stb modules: stb_image IO callbacks and the
//! stb_truetype baking structs.

use semver::Version;

use crate::core::{CallbackDecl, ParamDecl, Primitive, StructDecl, TypeRef};
use crate::registry::{DeclError, FrozenRegistry, ModuleInfo, Registry};

use super::STB_NAMESPACE;

fn user_param() -> ParamDecl {
    ParamDecl::input("user", TypeRef::VOID.pointer()).doc("a pointer to user data")
}

/// Declare the `stb_types` module.
pub fn stb_types() -> Result<FrozenRegistry, DeclError> {
    let mut registry = Registry::with_module(ModuleInfo {
        name: "stb_types".to_string(),
        version: Some(Version::new(0, 1, 0)),
        namespace: Some(STB_NAMESPACE.to_string()),
        header: None,
        prefix: None,
        class_name: None,
        constant_prefix: None,
        native_directive: None,
        doc: Some("Types shared by the stb_image and stb_truetype bindings.".to_string()),
    });

    // stb_image.h

    registry.declare_type(Primitive::UChar, "stbi_uc")?;
    registry.declare_pointer("stbi_uc_p", TypeRef::named("stbi_uc"))?;

    registry.declare_callback(
        CallbackDecl::new("STBIReadCallback")
            .native_name("stbi_io_callbacks.read")
            .returns(TypeRef::INT)
            .param(user_param())
            .param(
                ParamDecl::input("data", TypeRef::Primitive(Primitive::Char).pointer())
                    .doc("the data buffer to fill"),
            )
            .param(ParamDecl::input("size", TypeRef::INT).doc("the number of bytes to read"))
            .summary("The `stbi_io_callbacks.read` callback.")
            .return_doc("the number of bytes actually read")
            .documentation(
                "Instances of this interface may be set to the `read` field of the STBIIOCallbacks struct.",
            )
            .sam_constructor("STBImage"),
    )?;

    registry.declare_callback(
        CallbackDecl::new("STBISkipCallback")
            .native_name("stbi_io_callbacks.skip")
            .returns(TypeRef::INT)
            .param(user_param())
            .param(ParamDecl::input("n", TypeRef::INT).doc(
                "the number of bytes to skip if positive, or unget the last `-n` bytes if negative",
            ))
            .summary("The `stbi_io_callbacks.skip` callback.")
            .documentation(
                "Instances of this interface may be set to the `skip` field of the STBIIOCallbacks struct.",
            )
            .sam_constructor("STBImage"),
    )?;

    registry.declare_callback(
        CallbackDecl::new("STBIEOFCallback")
            .native_name("stbi_io_callbacks.eof")
            .returns(TypeRef::INT)
            .param(user_param())
            .summary("The `stbi_io_callbacks.eof` callback.")
            .return_doc("nonzero if we are at the end of file/data")
            .documentation(
                "Instances of this interface may be set to the `eof` field of the STBIIOCallbacks struct.",
            )
            .sam_constructor("STBImage"),
    )?;

    registry.declare_struct(
        StructDecl::new("STBIIOCallbacks")
            .native_name("stbi_io_callbacks")
            .header("stb_image.h")
            .doc("Image IO callbacks, used by `stbi_load_from_callbacks`.")
            .field("read", TypeRef::named("STBIReadCallback"))
            .field("skip", TypeRef::named("STBISkipCallback"))
            .field("eof", TypeRef::named("STBIEOFCallback")),
    )?;
    registry.declare_pointer("stbi_io_callbacks_p", TypeRef::named("STBIIOCallbacks"))?;

    // stb_truetype.h

    let ushort = TypeRef::Primitive(Primitive::UShort);
    registry.declare_struct(
        StructDecl::new("STBTTBakedChar")
            .native_name("stbtt_bakedchar")
            .header("stb_truetype.h")
            .field("x0", ushort.clone())
            .field("y0", ushort.clone())
            .field("x1", ushort.clone())
            .field("y1", ushort)
            .field("xoff", TypeRef::FLOAT)
            .field("yoff", TypeRef::FLOAT)
            .field("xadvance", TypeRef::FLOAT),
    )?;
    registry.declare_pointer("stbtt_bakedchar_p", TypeRef::named("STBTTBakedChar"))?;

    let quad = ["x0", "y0", "s0", "t0", "x1", "y1", "s1", "t1"]
        .into_iter()
        .fold(
            StructDecl::new("STBTTAlignedQuad")
                .native_name("stbtt_aligned_quad")
                .header("stb_truetype.h"),
            |decl, name| decl.field(name, TypeRef::FLOAT),
        );
    registry.declare_struct(quad)?;
    registry.declare_pointer("stbtt_aligned_quad_p", TypeRef::named("STBTTAlignedQuad"))?;

    Ok(registry.freeze())
}
