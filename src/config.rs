use crate::storage::{self, StorageManager};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.yaml";

/// Default sentence-embedding model (384-dim MiniLM)
const DEFAULT_SEMANTIC_MODEL: &str = "all-MiniLM-L6-v2";
/// Default model download timeout in seconds
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;
/// Default number of results for similarity queries
const DEFAULT_TOP_K: usize = 5;

const DEFAULT_SUMMARIZER_ENDPOINT: &str =
    "https://api-inference.huggingface.co/models/facebook/bart-large-cnn";
const DEFAULT_SUMMARIZER_TOKEN_ENV: &str = "HF_TOKEN";
/// The summarization model has a fixed input limit and does not chunk,
/// so longer input is cut to this many characters.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 4000;
const DEFAULT_SUMMARY_MAX_LENGTH: usize = 130;
const DEFAULT_SUMMARY_MIN_LENGTH: usize = 30;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Configuration for embeddings and similarity ranking
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SemanticConfig {
    /// Model name for embeddings (e.g., "all-MiniLM-L6-v2")
    #[serde(default = "default_semantic_model")]
    pub model: String,

    /// Timeout for model download in seconds
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,

    /// Result count used when a caller does not pass one
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            model: default_semantic_model(),
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            default_top_k: DEFAULT_TOP_K,
        }
    }
}

/// Configuration for the summarization inference endpoint
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SummarizerConfig {
    #[serde(default = "default_summarizer_endpoint")]
    pub endpoint: String,

    /// Name of the environment variable holding the bearer token.
    /// The token itself never lands in config.yaml.
    #[serde(default = "default_summarizer_token_env")]
    pub token_env: String,

    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    #[serde(default = "default_summary_max_length")]
    pub default_max_length: usize,

    #[serde(default = "default_summary_min_length")]
    pub default_min_length: usize,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_summarizer_endpoint(),
            token_env: default_summarizer_token_env(),
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            default_max_length: DEFAULT_SUMMARY_MAX_LENGTH,
            default_min_length: DEFAULT_SUMMARY_MIN_LENGTH,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

fn default_semantic_model() -> String {
    DEFAULT_SEMANTIC_MODEL.to_string()
}

fn default_download_timeout_secs() -> u64 {
    DEFAULT_DOWNLOAD_TIMEOUT_SECS
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_summarizer_endpoint() -> String {
    DEFAULT_SUMMARIZER_ENDPOINT.to_string()
}

fn default_summarizer_token_env() -> String {
    DEFAULT_SUMMARIZER_TOKEN_ENV.to_string()
}

fn default_max_input_chars() -> usize {
    DEFAULT_MAX_INPUT_CHARS
}

fn default_summary_max_length() -> usize {
    DEFAULT_SUMMARY_MAX_LENGTH
}

fn default_summary_min_length() -> usize {
    DEFAULT_SUMMARY_MIN_LENGTH
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub semantic: SemanticConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        let sem = &self.semantic;
        if sem.model.trim().is_empty() {
            bail!("semantic.model must not be empty");
        }
        if sem.download_timeout_secs == 0 {
            bail!("semantic.download_timeout_secs must be greater than 0");
        }
        if sem.default_top_k == 0 {
            bail!("semantic.default_top_k must be greater than 0");
        }

        let sum = &self.summarizer;
        if sum.endpoint.trim().is_empty() {
            bail!("summarizer.endpoint must not be empty");
        }
        if sum.max_input_chars == 0 {
            bail!("summarizer.max_input_chars must be greater than 0");
        }
        if sum.default_max_length == 0 {
            bail!("summarizer.default_max_length must be greater than 0");
        }
        if sum.default_min_length > sum.default_max_length {
            bail!(
                "summarizer.default_min_length ({}) exceeds default_max_length ({})",
                sum.default_min_length,
                sum.default_max_length
            );
        }
        if sum.request_timeout_secs == 0 {
            bail!("summarizer.request_timeout_secs must be greater than 0");
        }

        Ok(())
    }

    pub fn load_with(base_path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let base_path = base_path.as_ref();
        let store = storage::BackendLocal::new(base_path)
            .with_context(|| format!("failed to open {}", base_path.display()))?;

        // create new if does not exist
        if !store.exists(CONFIG_FILE) {
            log::info!("Creating default config at {}", base_path.display());
            store.write(CONFIG_FILE, serde_yml::to_string(&Self::default())?.as_bytes())?;
        }

        let config_str = String::from_utf8(store.read(CONFIG_FILE)?)
            .context("config file is not valid utf8")?;
        let mut config: Self = serde_yml::from_str(&config_str).context("config is malformed")?;

        config.base_path = base_path.to_path_buf();
        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let store = storage::BackendLocal::new(&self.base_path)?;

        let config_str = serde_yml::to_string(&self)?;
        store.write(CONFIG_FILE, config_str.as_bytes())?;
        Ok(())
    }

}

#[cfg(test)]
impl Config {
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}
