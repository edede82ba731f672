//! Application configuration for ClientIntel.
//!
//! User config lives at `~/.clientintel/clientintel.toml`.
//! CLI flags override config file values, which override defaults.
//! API keys are never stored in the file; it only names the env vars.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ClientIntelError, Result};
use crate::types::{DEFAULT_LOW_CONFIDENCE_TAG, DEFAULT_TAGS, TagVocabulary};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "clientintel.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".clientintel";

// ---------------------------------------------------------------------------
// Config structs (matching clientintel.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Web search API settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Language model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Query filters and tag vocabulary.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Input column names.
    #[serde(default)]
    pub columns: ColumnsConfig,
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Search API endpoint.
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    /// Name of the env var holding the search API key.
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    /// Name of the env var holding the search scope id (`cx`).
    #[serde(default = "default_engine_id_env")]
    pub engine_id_env: String,

    /// Per-request timeout.
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,

    /// Maximum number of search calls in one run.
    #[serde(default = "default_max_queries")]
    pub max_queries: u32,

    /// Pause after every search call, in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            api_key_env: default_search_key_env(),
            engine_id_env: default_engine_id_env(),
            timeout_secs: default_search_timeout(),
            max_queries: default_max_queries(),
            delay_ms: default_delay_ms(),
        }
    }
}

fn default_search_endpoint() -> String {
    "https://www.googleapis.com/customsearch/v1".into()
}
fn default_search_key_env() -> String {
    "GOOGLE_API_KEY".into()
}
fn default_engine_id_env() -> String {
    "SEARCH_ENGINE_ID".into()
}
fn default_search_timeout() -> u64 {
    10
}
fn default_max_queries() -> u32 {
    100
}
fn default_delay_ms() -> u64 {
    1000
}

/// `[model]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL of an OpenAI-compatible API (`/chat/completions` is appended).
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Name of the env var holding the model API key.
    #[serde(default = "default_model_key_env")]
    pub api_key_env: String,

    /// Model id.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-request timeout.
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key_env: default_model_key_env(),
            model: default_model(),
            temperature: default_temperature(),
            timeout_secs: default_model_timeout(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_model() -> String {
    "gpt-3.5-turbo".into()
}
fn default_temperature() -> f32 {
    0.5
}
fn default_model_timeout() -> u64 {
    30
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Tag labels, in output column order.
    #[serde(default = "default_tag_vocabulary")]
    pub tag_vocabulary: Vec<String>,

    /// Tag raised on low confidence. Empty string disables it.
    #[serde(default = "default_low_confidence_tag")]
    pub low_confidence_tag: String,

    /// Event/role keywords OR-ed into the query.
    #[serde(default = "default_query_keywords")]
    pub query_keywords: Vec<String>,

    /// Sites OR-ed into the query as `site:` restrictions.
    #[serde(default = "default_query_sites")]
    pub query_sites: Vec<String>,

    /// Whether to add the keyword and site groups at all.
    #[serde(default = "default_true")]
    pub use_filters: bool,

    /// Skip the model call when search found nothing.
    #[serde(default = "default_true")]
    pub skip_model_without_evidence: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tag_vocabulary: default_tag_vocabulary(),
            low_confidence_tag: default_low_confidence_tag(),
            query_keywords: default_query_keywords(),
            query_sites: default_query_sites(),
            use_filters: true,
            skip_model_without_evidence: true,
        }
    }
}

fn default_tag_vocabulary() -> Vec<String> {
    DEFAULT_TAGS.iter().map(|t| (*t).to_string()).collect()
}
fn default_low_confidence_tag() -> String {
    DEFAULT_LOW_CONFIDENCE_TAG.into()
}
fn default_query_keywords() -> Vec<String> {
    [
        "obituary",
        "wedding",
        "married",
        "engaged",
        "baby",
        "born",
        "promoted",
        "joined",
        "hired",
        "appointed",
        "retired",
        "moved",
        "relocated",
    ]
    .iter()
    .map(|k| (*k).to_string())
    .collect()
}
fn default_query_sites() -> Vec<String> {
    [
        "linkedin.com",
        "legacy.com",
        "theknot.com",
        "zillow.com",
        "patch.com",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}
fn default_true() -> bool {
    true
}

/// `[columns]` section: header names in the input table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnsConfig {
    #[serde(default = "default_first_name_column")]
    pub first_name: String,
    #[serde(default = "default_last_name_column")]
    pub last_name: String,
    #[serde(default = "default_state_column")]
    pub state: String,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            first_name: default_first_name_column(),
            last_name: default_last_name_column(),
            state: default_state_column(),
        }
    }
}

fn default_first_name_column() -> String {
    "First Name".into()
}
fn default_last_name_column() -> String {
    "Last Name".into()
}
fn default_state_column() -> String {
    "State".into()
}

impl AppConfig {
    /// Build the tag vocabulary from `[pipeline]`.
    pub fn tag_vocabulary(&self) -> Result<TagVocabulary> {
        let low = self.pipeline.low_confidence_tag.trim();
        let low = (!low.is_empty()).then(|| low.to_string());
        TagVocabulary::new(self.pipeline.tag_vocabulary.clone(), low)
    }

    /// Check values that serde cannot: URLs and numeric ranges.
    pub fn validate(&self) -> Result<()> {
        parse_url("search.endpoint", &self.search.endpoint)?;
        parse_url("model.api_base", &self.model.api_base)?;

        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ClientIntelError::config(format!(
                "model.temperature must be between 0 and 2, got {}",
                self.model.temperature
            )));
        }

        self.tag_vocabulary()
            .map_err(|e| ClientIntelError::config(e.to_string()))?;

        Ok(())
    }
}

/// Parse a URL-valued config key.
pub fn parse_url(key: &str, value: &str) -> Result<Url> {
    Url::parse(value).map_err(|e| ClientIntelError::config(format!("{key} '{value}': {e}")))
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Secrets required before a run can start.
#[derive(Clone)]
pub struct Credentials {
    pub search_api_key: String,
    pub search_engine_id: String,
    pub model_api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("search_api_key", &"<redacted>")
            .field("search_engine_id", &"<redacted>")
            .field("model_api_key", &"<redacted>")
            .finish()
    }
}

/// Read all credentials from the environment. Any missing or empty value is
/// an error naming every variable that needs to be set.
pub fn load_credentials(config: &AppConfig) -> Result<Credentials> {
    load_credentials_with(config, |name| std::env::var(name).ok())
}

/// Like [`load_credentials`], with a custom variable lookup.
pub fn load_credentials_with(
    config: &AppConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Credentials> {
    let mut missing = Vec::new();
    let mut fetch = |name: &str| match lookup(name) {
        Some(val) if !val.trim().is_empty() => val,
        _ => {
            missing.push(name.to_string());
            String::new()
        }
    };

    let search_api_key = fetch(&config.search.api_key_env);
    let search_engine_id = fetch(&config.search.engine_id_env);
    let model_api_key = fetch(&config.model.api_key_env);

    if !missing.is_empty() {
        return Err(ClientIntelError::config(format!(
            "credentials not found. Set the {} environment variable(s).",
            missing.join(", ")
        )));
    }

    Ok(Credentials {
        search_api_key,
        search_engine_id,
        model_api_key,
    })
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.clientintel/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ClientIntelError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.clientintel/clientintel.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ClientIntelError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ClientIntelError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ClientIntelError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ClientIntelError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ClientIntelError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
