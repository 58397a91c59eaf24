//! Application configuration for docsift.
//!
//! User config lives at `~/.docsift/docsift.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DocsiftError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "docsift.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".docsift";

// ---------------------------------------------------------------------------
// Config structs (matching docsift.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Section detection and chunk packing.
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Document processing stage.
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Retrieval stage (search + fetch).
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

impl AppConfig {
    /// Reject values that would make a stage meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.max_chunk_size == 0 {
            return Err(DocsiftError::config("chunking.max_chunk_size must be positive"));
        }
        if self.processing.concurrency == 0 {
            return Err(DocsiftError::config("processing.concurrency must be at least 1"));
        }
        if self.retrieval.max_search_results == 0 {
            return Err(DocsiftError::config(
                "retrieval.max_search_results must be at least 1",
            ));
        }
        Ok(())
    }
}

/// `[chunking]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Soft cap on chunk length in characters, enforced at paragraph granularity.
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,

    /// A paragraph is a header candidate only with strictly fewer words than this.
    #[serde(default = "default_header_max_words")]
    pub header_max_words: usize,

    /// Header candidates must also be fully upper-case.
    #[serde(default = "default_true")]
    pub header_requires_uppercase: bool,

    /// Section title used before any header is seen.
    #[serde(default = "default_section_title")]
    pub default_section_title: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
            header_max_words: default_header_max_words(),
            header_requires_uppercase: true,
            default_section_title: default_section_title(),
        }
    }
}

fn default_max_chunk_size() -> usize {
    1024
}
fn default_header_max_words() -> usize {
    10
}
fn default_true() -> bool {
    true
}
fn default_section_title() -> String {
    "Main Body".into()
}

/// `[processing]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Documents processed at once; 1 keeps the stage sequential.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Upper bound for a single PDF extraction.
    #[serde(default = "default_pdf_timeout")]
    pub pdf_timeout_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            pdf_timeout_secs: default_pdf_timeout(),
        }
    }
}

fn default_concurrency() -> usize {
    1
}
fn default_pdf_timeout() -> u64 {
    60
}

/// `[retrieval]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Search hits requested for the primary query.
    #[serde(default = "default_max_search_results")]
    pub max_search_results: usize,

    /// HTTP timeout for a single page fetch.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Score assigned when the search provider gives none.
    #[serde(default = "default_relevance_score")]
    pub default_relevance_score: f64,

    /// URL suffixes that are never fetched (case-insensitive).
    #[serde(default = "default_skip_extensions")]
    pub skip_extensions: Vec<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_search_results: default_max_search_results(),
            fetch_timeout_secs: default_fetch_timeout(),
            default_relevance_score: default_relevance_score(),
            skip_extensions: default_skip_extensions(),
        }
    }
}

fn default_max_search_results() -> usize {
    5
}
fn default_fetch_timeout() -> u64 {
    30
}
fn default_relevance_score() -> f64 {
    1.0
}
fn default_skip_extensions() -> Vec<String> {
    vec![".pdf".into(), ".doc".into(), ".docx".into()]
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.docsift/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DocsiftError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.docsift/docsift.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| DocsiftError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        DocsiftError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DocsiftError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| DocsiftError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DocsiftError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
