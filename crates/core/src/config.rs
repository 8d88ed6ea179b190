//! JSON configuration files
//!
//! Configuration structs derive `Serialize`/`Deserialize` and are stored as
//! pretty-printed JSON. `load_or_default` mirrors how front ends treat their
//! settings file: a missing or malformed file is not fatal.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::logging::{log, LogCategory, LogLevel};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Read and parse a JSON config file
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a config file, falling back to defaults when it is absent or invalid
pub fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match load_json(path) {
        Ok(value) => value,
        Err(ConfigError::Io { .. }) => T::default(),
        Err(e) => {
            log(LogCategory::Device, LogLevel::Warn, || {
                format!("{}. Using defaults.", e)
            });
            T::default()
        }
    }
}

/// Write a config file as pretty-printed JSON
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ConfigError> {
    let contents = serde_json::to_string_pretty(value)?;
    fs::write(path, contents).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Sample {
        width: u32,
        #[serde(default)]
        name: String,
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("rev_core_{}_{}.json", name, std::process::id()))
    }

    #[test]
    fn test_save_then_load() {
        let path = temp_path("roundtrip");
        let value = Sample {
            width: 640,
            name: "stage".to_string(),
        };
        save_json(&path, &value).unwrap();
        let loaded: Sample = load_json(&path).unwrap();
        assert_eq!(loaded, value);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let path = temp_path("missing");
        let err = load_json::<Sample>(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert_eq!(load_or_default::<Sample>(&path), Sample::default());
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let path = temp_path("malformed");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            load_json::<Sample>(&path),
            Err(ConfigError::Parse { .. })
        ));
        assert_eq!(load_or_default::<Sample>(&path), Sample::default());
        let _ = fs::remove_file(&path);
    }
}
