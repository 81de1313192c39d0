//! The bundled stb descriptor set.
//!
//! The same modules ship as descriptor files under `decls/`; both renditions
//! describe the same API and fingerprint identically.

mod stb_truetype;
mod stb_types;

use std::sync::Arc;

use crate::registry::{Catalog, DeclError};

pub use stb_truetype::stb_truetype;
pub use stb_types::stb_types;

/// Package of the generated stb bindings.
pub const STB_NAMESPACE: &str = "org.lwjgl.stb";

/// Descriptor file for the `stb_types` module.
pub const STB_TYPES_TOML: &str = include_str!("../../decls/stb_types.toml");

/// Descriptor file for the `stb_truetype` module.
pub const STB_TRUETYPE_TOML: &str = include_str!("../../decls/stb_truetype.toml");

/// Build the bundled catalog: `stb_types` followed by `stb_truetype`.
pub fn bundled() -> Result<Catalog, DeclError> {
    let types = Arc::new(stb_types()?);
    let truetype = Arc::new(stb_truetype(types.clone())?);

    let mut catalog = Catalog::new();
    catalog.insert(types)?;
    catalog.insert(truetype)?;
    Ok(catalog)
}
