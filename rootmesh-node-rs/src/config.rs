//! Node configuration file

use rootmesh_core::{ConfigError, MeshConfig};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Load protocol settings from a JSON file. Missing keys keep their defaults;
/// with no file at all the defaults are used as they are.
pub fn load(path: Option<&Path>) -> Result<MeshConfig, LoadError> {
    let config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|source| LoadError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            serde_json::from_str::<MeshConfig>(&text).map_err(|source| LoadError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        }
        None => MeshConfig::default(),
    };

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_no_file_gives_defaults() {
        assert_eq!(load(None).unwrap(), MeshConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let f = file(r#"{ "interval_ms": 200, "vote_rounds": 5 }"#);
        let config = load(Some(f.path())).unwrap();

        assert_eq!(config.interval, Duration::from_millis(200));
        assert_eq!(config.vote_rounds, 5);
        assert_eq!(config.search_retries, MeshConfig::default().search_retries);
    }

    #[test]
    fn test_zero_value_rejected() {
        let f = file(r#"{ "queue_capacity": 0 }"#);
        assert!(matches!(load(Some(f.path())), Err(LoadError::Invalid(_))));
    }

    #[test]
    fn test_bad_json_rejected() {
        let f = file("interval_ms = 5");
        assert!(matches!(load(Some(f.path())), Err(LoadError::Parse { .. })));
    }

    #[test]
    fn test_missing_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert!(matches!(load(Some(&path)), Err(LoadError::Read { .. })));
    }
}
