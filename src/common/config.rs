//! Editor configuration.
//!
//! Every field has a built-in default, so an empty YAML document (or no file
//! at all) yields [`EditorConfig::default`].

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables for a [`PackageEditor`](crate::ooxml::pptx::PackageEditor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Layout target written into the relationships of new slides, relative
    /// to the slide part
    pub default_layout_target: String,
    /// Theme target written into the relationships of new slides
    pub default_theme_target: String,
    /// Substrings of relationship types that always get a fresh id instead of
    /// reusing an identical registered (type, target) pair
    pub transient_reltype_markers: Vec<String>,
    /// Duration of an animation effect when the caller gives none
    pub default_effect_duration_ms: u32,
    /// Refuse to write an archive while validation reports errors
    pub require_valid_before_save: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            default_layout_target: "../slideLayouts/slideLayout1.xml".to_string(),
            default_theme_target: "../theme/theme1.xml".to_string(),
            transient_reltype_markers: vec![
                "relationships/image".to_string(),
                "relationships/media".to_string(),
                "video".to_string(),
                "audio".to_string(),
            ],
            default_effect_duration_ms: 330,
            require_valid_before_save: true,
        }
    }
}

impl EditorConfig {
    /// Parse a configuration from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_saphyr::from_str(yaml)
            .map_err(|e| Error::Configuration(format!("Invalid editor configuration: {}", e)))
    }

    /// Load a configuration file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_saphyr::to_string(self)
            .map_err(|e| Error::Configuration(format!("Failed to serialize configuration: {}", e)))
    }
}
