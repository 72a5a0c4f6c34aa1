//! Application configuration for pdfrag.
//!
//! User config lives at `~/.pdfrag/pdfrag.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PdfRagError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "pdfrag.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".pdfrag";

// ---------------------------------------------------------------------------
// Config structs (matching pdfrag.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// OpenAI-compatible provider settings.
    #[serde(default)]
    pub openai: OpenAiConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Root directory holding one index directory per document id.
    #[serde(default = "default_stores_dir")]
    pub stores_dir: String,

    /// Timeout for downloading the source PDF.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            stores_dir: default_stores_dir(),
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

fn default_stores_dir() -> String {
    "./stores".into()
}
fn default_fetch_timeout() -> u64 {
    10
}

/// `[openai]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL of the OpenAI-compatible API, without trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Embedding model used for both indexing and querying.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Chat model used for answers and history summaries.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            embedding_model: default_embedding_model(),
            chat_model: default_chat_model(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_chat_model() -> String {
    "gpt-4o-mini".into()
}

// ---------------------------------------------------------------------------
// Pipeline config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime pipeline configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root directory for persisted indices.
    pub stores_dir: PathBuf,
    /// Fetch timeout in seconds.
    pub fetch_timeout_secs: u64,
    /// Provider base URL.
    pub base_url: String,
    /// Embedding model id.
    pub embedding_model: String,
    /// Chat model id.
    pub chat_model: String,
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            stores_dir: PathBuf::from(&config.defaults.stores_dir),
            fetch_timeout_secs: config.defaults.fetch_timeout_secs,
            base_url: config.openai.base_url.trim_end_matches('/').to_string(),
            embedding_model: config.openai.embedding_model.clone(),
            chat_model: config.openai.chat_model.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.pdfrag/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PdfRagError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.pdfrag/pdfrag.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| PdfRagError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| PdfRagError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PdfRagError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PdfRagError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PdfRagError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the API key from the env var named in the config.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.openai.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(PdfRagError::config(format!(
            "OpenAI API key not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Check that the API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    resolve_api_key(config).map(|_| ())
}
