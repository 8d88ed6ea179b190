//! Render configuration
//!
//! Stored as JSON next to the host's other settings. Every field has a
//! default, so a partial file (or none at all) is valid.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use rev_core::config::{self, ConfigError};
use rev_core::logging::{log, LogCategory, LogConfig, LogLevel};

use crate::device::MAX_DEVICE_DIMENSION;
use crate::render_backend::BackendKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub backend: BackendKind,
    /// Largest accepted device width/height; capped at [`MAX_DEVICE_DIMENSION`]
    pub max_device_dimension: u32,
    /// Mip level selected when a context is built
    pub mip_map_level: usize,
    /// Global log level name ("off", "error", ... "trace")
    pub log_level: String,
    /// Per-category overrides, category name -> level name
    pub log_categories: HashMap<String, String>,
    /// Messages per second per category before suppression
    pub log_rate_limit: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Software,
            max_device_dimension: MAX_DEVICE_DIMENSION,
            mip_map_level: 0,
            log_level: "off".to_string(),
            log_categories: HashMap::new(),
            log_rate_limit: 60,
        }
    }
}

impl RenderConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        config::load_json(path)
    }

    /// Load from `path`, falling back to defaults when it is missing or invalid
    pub fn load_or_default(path: &Path) -> Self {
        config::load_or_default(path)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        config::save_json(path, self)
    }

    /// Push the logging settings into the global [`LogConfig`]
    ///
    /// Unknown level or category names are skipped with a warning.
    pub fn apply_logging(&self) {
        let cfg = LogConfig::global();
        match LogLevel::from_str(&self.log_level) {
            Some(level) => cfg.set_global_level(level),
            None => eprintln!("Unknown log level '{}', keeping current", self.log_level),
        }

        for (name, level) in &self.log_categories {
            match (LogCategory::from_str(name), LogLevel::from_str(level)) {
                (Some(category), Some(level)) => cfg.set_level(category, level),
                _ => log(LogCategory::Device, LogLevel::Warn, || {
                    format!("Ignoring log override {} = {}", name, level)
                }),
            }
        }

        cfg.set_rate_limit(self.log_rate_limit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = RenderConfig::default();
        assert_eq!(cfg.backend, BackendKind::Software);
        assert_eq!(cfg.max_device_dimension, 2048);
        assert_eq!(cfg.mip_map_level, 0);
        assert_eq!(cfg.log_level, "off");
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let cfg: RenderConfig =
            serde_json::from_str(r#"{ "backend": "opengl", "log_categories": { "texture": "debug" } }"#).unwrap();
        assert_eq!(cfg.backend, BackendKind::OpenGl);
        assert_eq!(cfg.max_device_dimension, 2048);
        assert_eq!(cfg.log_categories.get("texture").map(String::as_str), Some("debug"));
        assert_eq!(cfg.log_rate_limit, 60);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("rev_icb_render_config_{}.json", std::process::id()));
        let cfg = RenderConfig {
            mip_map_level: 3,
            max_device_dimension: 1024,
            ..Default::default()
        };
        cfg.save(&path).unwrap();
        let loaded = RenderConfig::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let cfg = RenderConfig::load_or_default(Path::new("/nonexistent/rev_icb/render.json"));
        assert_eq!(cfg, RenderConfig::default());
    }
}
