//! Reading and writing the TOML configuration file.
//!
//! # Configuration File Format
//!
//! ```toml
//! [gateway]
//! base_url = "http://127.0.0.1:8765"
//! api_token = "secret"
//! request_timeout_secs = 30
//!
//! [search]
//! platforms = ["arxiv", "semantic_scholar"]
//! max_results = 10
//!
//! [import]
//! batch_size = 15
//! processing_wait_base_secs = 30
//! processing_wait_per_source_secs = 3
//! processing_wait_max_secs = 90
//!
//! [tracking]
//! poll_interval_secs = 3
//! rapid_interval_secs = 2
//! probe_every = 3
//! probe_start = 2
//! timeout_secs = 1800
//!
//! [research]
//! poll_interval_secs = 5
//! max_polls = 120
//! mode = "deep"
//!
//! [video]
//! style = "whiteboard"
//! language = "zh-CN"
//! prompt_file = "video.md"
//!
//! [output]
//! directory = "./output"
//!
//! [logging]
//! level = "info"
//! ```

use std::path::{Path, PathBuf};

use super::Config;

/// A configuration document bound to the file it lives in
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    path: PathBuf,
    pub config: Config,
}

impl ConfigFile {
    /// Load configuration from a TOML file, without environment overrides
    pub fn load(path: &Path) -> Result<Self, ConfigFileError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigFileError::Io(e.to_string()))?;

        let config = toml::from_str(&content).map_err(|e| ConfigFileError::Parse(e.to_string()))?;
        Ok(Self {
            path: path.to_path_buf(),
            config,
        })
    }

    /// Save configuration to its TOML file, creating parent directories
    pub fn save(&self) -> Result<(), ConfigFileError> {
        let content = toml::to_string_pretty(&self.config)
            .map_err(|e| ConfigFileError::Serialize(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigFileError::Io(e.to_string()))?;
        }
        std::fs::write(&self.path, content).map_err(|e| ConfigFileError::Io(e.to_string()))
    }

    /// Default configuration bound to `path`; nothing is written yet
    pub fn create_default(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            config: Config::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),

    #[error("Config error: {0}")]
    Layered(#[from] config::ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notebook::ResearchMode;
    use tempfile::tempdir;

    #[test]
    fn test_config_file_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        std::fs::write(
            &path,
            r#"
[gateway]
base_url = "https://gw.example"
api_token = "tok"

[tracking]
timeout_secs = 600
probe_every = 4

[research]
mode = "fast"

[logging]
level = "debug"
"#,
        )
        .unwrap();

        let file = ConfigFile::load(&path).unwrap();
        let config = &file.config;
        assert_eq!(config.gateway.api_token.as_deref(), Some("tok"));
        assert_eq!(config.tracking.timeout_secs, 600);
        assert_eq!(config.tracking.probe_every, 4);
        assert_eq!(config.tracking.rapid_interval_secs, 2);
        assert_eq!(config.research.mode, ResearchMode::Fast);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(file.path(), path.as_path());
    }

    #[test]
    fn test_config_file_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut file = ConfigFile::create_default(&path);
        file.config.search.platforms = vec!["iacr".to_string()];
        file.config.output.directory = PathBuf::from("/tmp/videos");
        file.save().unwrap();

        let loaded = ConfigFile::load(&path).unwrap();
        assert_eq!(loaded, file);
    }

    #[test]
    fn test_config_file_nonexistent() {
        let result = ConfigFile::load(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigFileError::Io(_))));
    }

    #[test]
    fn test_config_file_invalid_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("invalid.toml");

        std::fs::write(&path, "invalid = toml = content").unwrap();

        let result = ConfigFile::load(&path);
        assert!(matches!(result, Err(ConfigFileError::Parse(_))));
    }
}
