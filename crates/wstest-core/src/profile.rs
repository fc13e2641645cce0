//! Release build profile.
//!
//! The profile is handed to an external build tool at packaging time; it is
//! never consulted at runtime. This module only loads and checks it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::config::ConfigError;

/// Build action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    Release,
}

/// CSS optimization level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CssOptimize {
    #[default]
    #[serde(rename = "")]
    Off,
    /// Strip comments and whitespace, inline imports.
    #[serde(rename = "comments")]
    Comments,
    /// Strip comments but keep line breaks.
    #[serde(rename = "comments.keepLines")]
    CommentsKeepLines,
}

/// JavaScript minifier selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Minifier {
    #[default]
    #[serde(rename = "")]
    None,
    #[serde(rename = "closure")]
    Closure,
    #[serde(rename = "uglify")]
    Uglify,
    /// Deprecated, but still the tool's default for layers.
    #[serde(rename = "shrinksafe")]
    Shrinksafe,
}

/// Which console calls the build strips.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StripConsole {
    /// Keep every console call.
    None,
    /// Strip everything except `warn` and `error`.
    #[default]
    Normal,
    /// Strip everything except `error`.
    Warn,
    /// Strip every console call.
    All,
}

/// CSS selector engine bundled into the boot layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorEngine {
    #[default]
    Acme,
    Lite,
}

/// One output bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    /// Module ids compiled into the layer, in order.
    #[serde(default)]
    pub include: Vec<String>,
    /// The layer carries the loader itself.
    #[serde(default)]
    pub boot: bool,
    /// Replace the default base modules instead of adding to them.
    #[serde(default)]
    pub custom_base: bool,
}

/// A declarative release build profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildProfile {
    pub base_path: String,
    #[serde(default)]
    pub action: Action,
    #[serde(default)]
    pub css_optimize: CssOptimize,
    /// Leave tests, demos, and template sources out of the release.
    #[serde(default)]
    pub mini: bool,
    #[serde(default)]
    pub optimize: Minifier,
    #[serde(default = "default_layer_optimize")]
    pub layer_optimize: Minifier,
    #[serde(default)]
    pub strip_console: StripConsole,
    #[serde(default)]
    pub selector_engine: SelectorEngine,
    /// 0 or 1.
    #[serde(default)]
    pub insert_abs_mids: u8,
    #[serde(default)]
    pub layers: BTreeMap<String, Layer>,
    /// Has-flag name to 0 or 1.
    #[serde(default, alias = "staticHasFeature")]
    pub static_has_features: BTreeMap<String, u8>,
}

fn default_layer_optimize() -> Minifier {
    Minifier::Shrinksafe
}

impl BuildProfile {
    /// Load a profile from a `.json` or `.toml` file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed. The profile is
    /// not validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let parsed = if is_json {
            serde_json::from_str(&contents).map_err(|e| e.to_string())
        } else {
            toml::from_str(&contents).map_err(|e| e.to_string())
        };

        parsed.map_err(|reason| ConfigError::Parse {
            path: display,
            reason,
        })
    }

    /// Check flags and layers.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_flag("insertAbsMids", self.insert_abs_mids)?;
        for (name, value) in &self.static_has_features {
            check_flag(name, *value)?;
        }

        let mut boot_layers = 0;
        for (name, layer) in &self.layers {
            let invalid = |reason| ConfigError::InvalidLayer {
                name: name.clone(),
                reason,
            };

            if name.is_empty() || name.starts_with('/') || name.ends_with('/') {
                return Err(invalid("layer names are module ids"));
            }
            if layer.include.iter().any(String::is_empty) {
                return Err(invalid("empty module id in include"));
            }
            if layer.custom_base && !layer.boot {
                return Err(invalid("customBase requires boot"));
            }
            if layer.boot {
                boot_layers += 1;
                if boot_layers > 1 {
                    return Err(invalid("only one layer may boot"));
                }
            }
        }

        debug!(
            layers = self.layers.len(),
            has_flags = self.static_has_features.len(),
            "Build profile valid"
        );
        Ok(())
    }

    /// The layer that carries the loader, if any.
    #[must_use]
    pub fn boot_layer(&self) -> Option<(&str, &Layer)> {
        self.layers
            .iter()
            .find(|(_, layer)| layer.boot)
            .map(|(name, layer)| (name.as_str(), layer))
    }

    /// Static value of a has-flag, or `None` when the flag is left dynamic.
    #[must_use]
    pub fn has_feature(&self, flag: &str) -> Option<bool> {
        self.static_has_features.get(flag).map(|v| *v != 0)
    }

    /// Has-flags pinned to 0, whose guarded code the minifier may drop.
    pub fn stripped_features(&self) -> impl Iterator<Item = &str> {
        self.static_has_features
            .iter()
            .filter(|(_, v)| **v == 0)
            .map(|(k, _)| k.as_str())
    }
}

fn check_flag(name: &str, value: u8) -> Result<(), ConfigError> {
    if value > 1 {
        return Err(ConfigError::InvalidFlag {
            name: name.to_string(),
            value,
        });
    }
    Ok(())
}
