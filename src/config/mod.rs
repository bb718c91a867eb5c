//! Configuration loading.
//!
//! Configuration comes from a TOML file (explicit path or the platform
//! config directory), with builder-style overrides for programmatic use and
//! environment variables for secrets.

use crate::llm::LlmHttpConfig;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default number of candidates kept by the similarity stages.
pub const DEFAULT_TOP_K: usize = 10;

/// Burst-grouping similarity threshold for camera photos.
pub const DEFAULT_PHOTO_THRESHOLD: f32 = 0.85;

/// Burst-grouping similarity threshold for screenshots and unknowns.
pub const DEFAULT_SCREENSHOT_THRESHOLD: f32 = 0.95;

/// Similarity score (0-10) at or above which a new fact mention merges into
/// an existing fact.
pub const DEFAULT_FACT_MERGE_THRESHOLD: u8 = 7;

/// Reasoning-provider configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Main model name.
    pub model: String,
    /// Cheaper model for pairwise similarity scoring.
    pub similarity_model: String,
    /// API key; falls back to `OPENAI_API_KEY`.
    pub api_key: Option<String>,
    /// API base URL override.
    pub base_url: Option<String>,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let http = LlmHttpConfig::default();
        Self {
            model: crate::llm::OpenAiClient::DEFAULT_MODEL.to_string(),
            similarity_model: crate::llm::OpenAiClient::DEFAULT_SIMILARITY_MODEL.to_string(),
            api_key: None,
            base_url: None,
            timeout_ms: http.timeout_ms,
            connect_timeout_ms: http.connect_timeout_ms,
        }
    }
}

impl LlmConfig {
    /// HTTP timeouts as an [`LlmHttpConfig`].
    #[must_use]
    pub const fn http_config(&self) -> LlmHttpConfig {
        LlmHttpConfig {
            timeout_ms: self.timeout_ms,
            connect_timeout_ms: self.connect_timeout_ms,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct RecollectConfig {
    /// Directory holding the persisted graphs and embedding caches.
    pub data_dir: PathBuf,
    /// Directory scanned for raw media.
    pub raw_media_dir: PathBuf,
    /// Candidates kept by the similarity stages.
    pub top_k: usize,
    /// Burst-grouping threshold for camera photos.
    pub photo_threshold: f32,
    /// Burst-grouping threshold for screenshots and unknowns.
    pub screenshot_threshold: f32,
    /// Fact-merge similarity threshold (0-10).
    pub fact_merge_threshold: u8,
    /// Reasoning-provider settings.
    pub llm: LlmConfig,
}

impl Default for RecollectConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            raw_media_dir: PathBuf::from("media"),
            top_k: DEFAULT_TOP_K,
            photo_threshold: DEFAULT_PHOTO_THRESHOLD,
            screenshot_threshold: DEFAULT_SCREENSHOT_THRESHOLD,
            fact_merge_threshold: DEFAULT_FACT_MERGE_THRESHOLD,
            llm: LlmConfig::default(),
        }
    }
}

impl RecollectConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from the default location, falling back to
    /// defaults when no file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if a file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load_from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Loads configuration from an explicit TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::service("load_config", format!("cannot read {}: {e}", path.display()))
        })?;
        let file: ConfigFile = toml::from_str(&contents).map_err(|e| {
            Error::parse("load_config", format!("invalid TOML in {}: {e}", path.display()))
        })?;
        tracing::debug!(path = %path.display(), "loaded configuration file");
        Ok(file.into_config())
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Sets the raw media directory.
    #[must_use]
    pub fn with_raw_media_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.raw_media_dir = dir.into();
        self
    }

    /// Sets the top-K candidate count.
    #[must_use]
    pub const fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Resolves the API key from config or environment.
    #[must_use]
    pub fn resolve_api_key(&self) -> Option<String> {
        self.llm
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }
}

/// On-disk TOML shape; every field optional so partial files work.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    raw_media_dir: Option<PathBuf>,
    top_k: Option<usize>,
    photo_threshold: Option<f32>,
    screenshot_threshold: Option<f32>,
    fact_merge_threshold: Option<u8>,
    #[serde(default)]
    llm: LlmFileSection,
}

/// `[llm]` section of the TOML file.
#[derive(Debug, Default, Deserialize)]
struct LlmFileSection {
    model: Option<String>,
    similarity_model: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    timeout_ms: Option<u64>,
    connect_timeout_ms: Option<u64>,
}

impl ConfigFile {
    fn into_config(self) -> RecollectConfig {
        let defaults = RecollectConfig::default();
        let llm_defaults = defaults.llm;
        RecollectConfig {
            data_dir: self.data_dir.unwrap_or(defaults.data_dir),
            raw_media_dir: self.raw_media_dir.unwrap_or(defaults.raw_media_dir),
            top_k: self.top_k.unwrap_or(defaults.top_k),
            photo_threshold: self.photo_threshold.unwrap_or(defaults.photo_threshold),
            screenshot_threshold: self
                .screenshot_threshold
                .unwrap_or(defaults.screenshot_threshold),
            fact_merge_threshold: self
                .fact_merge_threshold
                .unwrap_or(defaults.fact_merge_threshold),
            llm: LlmConfig {
                model: self.llm.model.unwrap_or(llm_defaults.model),
                similarity_model: self
                    .llm
                    .similarity_model
                    .unwrap_or(llm_defaults.similarity_model),
                api_key: self.llm.api_key,
                base_url: self.llm.base_url,
                timeout_ms: self.llm.timeout_ms.unwrap_or(llm_defaults.timeout_ms),
                connect_timeout_ms: self
                    .llm
                    .connect_timeout_ms
                    .unwrap_or(llm_defaults.connect_timeout_ms),
            },
        }
    }
}

/// Platform data directory for the persisted graphs.
fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "recollect")
        .map_or_else(|| PathBuf::from(".recollect"), |dirs| dirs.data_dir().to_path_buf())
}

/// Platform path of the configuration file.
fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "recollect")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
