//! Application configuration for GrantLens.
//!
//! User config lives at `~/.grantlens/grantlens.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GrantLensError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "grantlens.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".grantlens";

// ---------------------------------------------------------------------------
// Config structs (matching grantlens.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Grants endpoint and paging behavior.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Generative backend settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Terminal listing settings.
    #[serde(default)]
    pub display: DisplayConfig,
}

/// What to do when one page of a multi-page fetch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPolicy {
    /// Fail the whole fetch; no partial list is returned.
    #[default]
    Abort,
    /// Keep grants from successful pages and report the failed ones.
    Partial,
}

/// `[catalog]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Paginated grants list endpoint.
    #[serde(default = "default_base_uri")]
    pub base_uri: String,

    /// Page size used when fetching every page.
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// Per-request timeout in seconds.
    #[serde(default = "default_catalog_timeout")]
    pub request_timeout_secs: u64,

    /// Failure policy for the concurrent page fan-out.
    #[serde(default)]
    pub batch_policy: BatchPolicy,

    /// Maximum in-flight page requests; 0 means unbounded.
    #[serde(default)]
    pub max_concurrency: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_uri: default_base_uri(),
            per_page: default_per_page(),
            request_timeout_secs: default_catalog_timeout(),
            batch_policy: BatchPolicy::default(),
            max_concurrency: 0,
        }
    }
}

fn default_base_uri() -> String {
    "https://api.doge.gov/savings/grants".into()
}
fn default_per_page() -> u32 {
    500
}
fn default_catalog_timeout() -> u64 {
    30
}

/// `[model]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// OpenAI-compatible API root.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature for new sessions.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Top-k sampling for new sessions.
    #[serde(default = "default_top_k")]
    pub top_k: u32,

    /// Maximum description characters embedded in a prompt.
    #[serde(default = "default_description_cap")]
    pub description_cap: usize,

    /// Per-request timeout in seconds.
    #[serde(default = "default_model_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            top_k: default_top_k(),
            description_cap: default_description_cap(),
            request_timeout_secs: default_model_timeout(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model() -> String {
    "openai/gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_top_k() -> u32 {
    3
}
fn default_description_cap() -> usize {
    5000
}
fn default_model_timeout() -> u64 {
    120
}

/// `[display]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Grants shown per listing page.
    #[serde(default = "default_items_per_page")]
    pub items_per_page: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            items_per_page: default_items_per_page(),
        }
    }
}

fn default_items_per_page() -> usize {
    12
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.grantlens/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| GrantLensError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.grantlens/grantlens.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| GrantLensError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| GrantLensError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| GrantLensError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| GrantLensError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| GrantLensError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
