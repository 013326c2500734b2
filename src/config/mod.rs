//! Configuration management.
//!
//! Settings come from an optional TOML file layered under `PAPER_TALKER_*`
//! environment variables (`PAPER_TALKER_TRACKING__TIMEOUT_SECS=600`).
//! Command-line flags override both in `main`.

mod file_config;

pub use file_config::{ConfigFile, ConfigFileError};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::notebook::{ResearchMode, VideoStyle};
use crate::sources::ProviderSettings;
use crate::workflow::{ImportSettings, ResearchSettings, TrackerConfig};

/// File name looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "paper-talker.toml";

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "PAPER_TALKER";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub search: SearchConfig,
    pub import: ImportConfig,
    pub tracking: TrackingConfig,
    pub research: ResearchConfig,
    pub video: VideoConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

/// Where the notebook gateway lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub base_url: String,
    /// Sent as a bearer token when set
    pub api_token: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8765".to_string(),
            api_token: None,
            request_timeout_secs: 30,
        }
    }
}

/// Defaults for the paper search stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub platforms: Vec<String>,
    /// Per provider
    pub max_results: usize,
    pub year: Option<i32>,
    pub semantic_scholar_api_key: Option<String>,
    pub google_scholar_enabled: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            platforms: vec!["arxiv".to_string(), "semantic_scholar".to_string()],
            max_results: 10,
            year: None,
            semantic_scholar_api_key: None,
            google_scholar_enabled: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub batch_size: usize,
    pub processing_wait_base_secs: u64,
    pub processing_wait_per_source_secs: u64,
    pub processing_wait_max_secs: u64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: 15,
            processing_wait_base_secs: 30,
            processing_wait_per_source_secs: 3,
            processing_wait_max_secs: 90,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub poll_interval_secs: u64,
    pub rapid_interval_secs: u64,
    pub probe_every: u32,
    pub probe_start: u32,
    pub timeout_secs: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 3,
            rapid_interval_secs: 2,
            probe_every: 3,
            probe_start: 2,
            timeout_secs: 1800,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    pub poll_interval_secs: u64,
    pub max_polls: u32,
    pub mode: ResearchMode,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            max_polls: 120,
            mode: ResearchMode::Deep,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub style: VideoStyle,
    pub language: String,
    /// Instructions sent with the generation request when none are given
    pub prompt_file: PathBuf,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            style: VideoStyle::Whiteboard,
            language: "zh-CN".to_string(),
            prompt_file: PathBuf::from("video.md"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./output"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl Config {
    pub fn provider_settings(&self) -> ProviderSettings {
        let env = ProviderSettings::from_env();
        ProviderSettings {
            semantic_scholar_api_key: self
                .search
                .semantic_scholar_api_key
                .clone()
                .or(env.semantic_scholar_api_key),
            google_scholar_enabled: self.search.google_scholar_enabled || env.google_scholar_enabled,
        }
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            poll_interval: Duration::from_secs(self.tracking.poll_interval_secs),
            rapid_interval: Duration::from_secs(self.tracking.rapid_interval_secs),
            probe_every: self.tracking.probe_every,
            probe_start: self.tracking.probe_start,
        }
    }

    pub fn import_settings(&self) -> ImportSettings {
        ImportSettings {
            batch_size: self.import.batch_size,
            wait_base: Duration::from_secs(self.import.processing_wait_base_secs),
            wait_per_source: Duration::from_secs(self.import.processing_wait_per_source_secs),
            wait_max: Duration::from_secs(self.import.processing_wait_max_secs),
        }
    }

    pub fn research_settings(&self) -> ResearchSettings {
        ResearchSettings {
            poll_interval: Duration::from_secs(self.research.poll_interval_secs),
            max_polls: self.research.max_polls,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway.request_timeout_secs)
    }
}

/// The user-level config file, `<config_dir>/paper-talker/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("paper-talker").join("config.toml"))
}

/// First existing config file: `./paper-talker.toml`, then the user-level file
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }
    default_config_path().filter(|p| p.is_file())
}

/// Load configuration from `path` (required when given) or from the
/// discovered config file, then apply environment overrides
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigFileError> {
    let file = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config_file(),
    };

    let mut builder = config::Config::builder();
    if let Some(file) = &file {
        tracing::debug!(path = %file.display(), "Loading config file");
        builder = builder.add_source(
            config::File::from(file.as_path())
                .format(config::FileFormat::Toml)
                .required(true),
        );
    }
    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("search.platforms"),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Defaults plus environment overrides, for runs without any config file
pub fn get_config() -> Config {
    load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Ignoring invalid configuration: {}", e);
        Config::default()
    })
}
