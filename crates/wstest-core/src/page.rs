//! Page-level loader configuration.
//!
//! The hosting page declares which packages exist, which modules to load
//! eagerly, and a callback to run once those modules are ready. Here that is
//! a plain record: [`PageConfig::boot`] validates it and hands the resolved
//! module ids to the callback.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::config::ConfigError;

/// Loader configuration read once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageConfig {
    /// Load modules asynchronously.
    #[serde(default = "default_true", rename = "async")]
    pub async_loading: bool,

    /// Base URL modules are resolved against.
    #[serde(default)]
    pub base_url: String,

    /// Whether top-level modules sit next to the toolkit's own package.
    #[serde(default)]
    pub tlm_sibling_of_dojo: bool,

    /// Enable loader debugging.
    #[serde(default)]
    pub is_debug: bool,

    /// Declared package names, in order.
    #[serde(default = "default_packages")]
    pub packages: Vec<String>,

    /// Module ids to load eagerly, in order.
    #[serde(default = "default_deps")]
    pub deps: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_packages() -> Vec<String> {
    ["dojo", "dijit", "dojox", "wstest"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_deps() -> Vec<String> {
    vec!["wstest".to_string()]
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            async_loading: true,
            base_url: String::new(),
            tlm_sibling_of_dojo: false,
            is_debug: false,
            packages: default_packages(),
            deps: default_deps(),
        }
    }
}

impl PageConfig {
    /// Check that package names are unique and non-empty and that every dep
    /// lives in a declared package.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for package in &self.packages {
            if package.is_empty() {
                return Err(ConfigError::EmptyName("package"));
            }
            if !seen.insert(package.as_str()) {
                return Err(ConfigError::DuplicatePackage(package.clone()));
            }
        }

        for dep in &self.deps {
            if dep.is_empty() {
                return Err(ConfigError::EmptyName("module"));
            }
            if !seen.contains(package_of(dep)) {
                return Err(ConfigError::UnknownPackage { dep: dep.clone() });
            }
        }

        Ok(())
    }

    /// Validate, then run `callback` once with the eager module ids.
    ///
    /// # Errors
    ///
    /// Returns a validation error without running the callback.
    pub fn boot<F, T>(&self, callback: F) -> Result<T, ConfigError>
    where
        F: FnOnce(&[String]) -> T,
    {
        self.validate()?;
        debug!(deps = ?self.deps, base_url = %self.base_url, "Page dependencies ready");
        Ok(callback(&self.deps))
    }
}

/// The package a module id belongs to: its first path segment.
#[must_use]
pub fn package_of(module_id: &str) -> &str {
    module_id.split('/').next().unwrap_or(module_id)
}
