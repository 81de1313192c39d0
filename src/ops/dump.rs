//! Serializing a frozen catalog for binding generators.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::registry::{Catalog, FrozenRegistry};
use crate::util::fs::write_atomic;

/// Output format of `dump`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DumpFormat {
    /// JSON (default)
    #[default]
    Json,
    /// TOML
    Toml,
}

impl FromStr for DumpFormat {
    type Err = DumpFormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(DumpFormat::Json),
            "toml" => Ok(DumpFormat::Toml),
            _ => Err(DumpFormatParseError(s.to_string())),
        }
    }
}

impl fmt::Display for DumpFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DumpFormat::Json => write!(f, "json"),
            DumpFormat::Toml => write!(f, "toml"),
        }
    }
}

/// Error parsing dump format option.
#[derive(Debug, Clone)]
pub struct DumpFormatParseError(pub String);

impl fmt::Display for DumpFormatParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid dump format '{}', valid values: json, toml", self.0)
    }
}

impl std::error::Error for DumpFormatParseError {}

/// A module with its fingerprint.
#[derive(Debug, Serialize)]
pub struct ModuleDump<'a> {
    pub fingerprint: String,
    #[serde(flatten)]
    pub module: &'a FrozenRegistry,
}

/// The serialized form of a catalog.
#[derive(Debug, Serialize)]
pub struct CatalogDump<'a> {
    /// Combined fingerprint of every module
    pub fingerprint: String,
    /// Modules, imports first
    pub modules: Vec<ModuleDump<'a>>,
}

impl<'a> CatalogDump<'a> {
    pub fn new(catalog: &'a Catalog) -> Result<Self> {
        let modules = catalog
            .modules()
            .map(|m| {
                Ok(ModuleDump {
                    fingerprint: m.fingerprint()?,
                    module: m.as_ref(),
                })
            })
            .collect::<Result<Vec<_>, serde_json::Error>>()
            .context("failed to fingerprint modules")?;

        Ok(CatalogDump {
            fingerprint: catalog
                .fingerprint()
                .context("failed to fingerprint catalog")?,
            modules,
        })
    }

    /// Render in the given format.
    pub fn render(&self, format: DumpFormat) -> Result<String> {
        match format {
            DumpFormat::Json => {
                let mut out =
                    serde_json::to_string_pretty(self).context("failed to serialize catalog")?;
                out.push('\n');
                Ok(out)
            }
            DumpFormat::Toml => {
                toml::to_string_pretty(self).context("failed to serialize catalog as TOML")
            }
        }
    }
}

/// Render a catalog, writing it to `output` if given.
pub fn dump(catalog: &Catalog, format: DumpFormat, output: Option<&Path>) -> Result<String> {
    let rendered = CatalogDump::new(catalog)?.render(format)?;

    if let Some(path) = output {
        write_atomic(path, &rendered)?;
        tracing::info!("wrote {} dump to {}", format, path.display());
    }

    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use tempfile::TempDir;

    #[test]
    fn test_dump_format_from_str() {
        assert_eq!("JSON".parse::<DumpFormat>().unwrap(), DumpFormat::Json);
        assert_eq!("toml".parse::<DumpFormat>().unwrap(), DumpFormat::Toml);
        let err = "yaml".parse::<DumpFormat>().unwrap_err();
        assert!(err.to_string().contains("valid values: json, toml"));
    }

    #[test]
    fn test_json_dump_shape() {
        let catalog = catalog::bundled().unwrap();
        let text = dump(&catalog, DumpFormat::Json, None).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(json["fingerprint"], catalog.fingerprint().unwrap());
        assert_eq!(json["modules"][0]["module"]["name"], "stb_types");
        assert_eq!(json["modules"][1]["imports"][0], "stb_types");

        let bake = &json["modules"][1]["descriptors"][0];
        assert_eq!(bake["kind"], "function");
        assert_eq!(bake["native_name"], "stbtt_BakeFontBitmap");
        assert_eq!(bake["params"][3]["annotation"]["check"], "pw * ph");
    }

    #[test]
    fn test_toml_dump_parses() {
        let catalog = catalog::bundled().unwrap();
        let text = dump(&catalog, DumpFormat::Toml, None).unwrap();
        let value: toml::Value = toml::from_str(&text).unwrap();
        assert_eq!(
            value["fingerprint"].as_str(),
            Some(catalog.fingerprint().unwrap().as_str())
        );
    }

    #[test]
    fn test_dump_writes_output() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out").join("stb.json");
        let catalog = catalog::bundled().unwrap();

        let text = dump(&catalog, DumpFormat::Json, Some(&path)).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), text);
    }
}
