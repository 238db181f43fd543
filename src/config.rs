//! TOML configuration.
//!
//! Loaded once at startup from `--config` (default `./config/crag.toml`).
//! Every section except `[db]` and `[corpus]` has defaults. Validation
//! happens in [`load_config`]; an invalid file is a fatal error.
//!
//! ```toml
//! [corpus]
//! root = "./data"
//!
//! [db]
//! path = "./index/crag.sqlite"
//!
//! [embedding]
//! provider = "ollama"
//! model = "nomic-embed-text"
//! dims = 768
//!
//! [[sources]]
//! name = "payloads"
//! dir = "payloads"
//! url = "https://github.com/swisskyrepo/PayloadsAllTheThings"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use corpus_rag_core::chunk::{ChunkParams, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};

use crate::extract::Format;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub corpus: CorpusConfig,
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub update: UpdateConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    pub root: PathBuf,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_extensions() -> Vec<String> {
    ["txt", "md", "json", "yaml", "yml", "pdf", "docx", "pptx"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    pub fn params(&self) -> Result<ChunkParams> {
        ChunkParams::new(self.chunk_size, self.overlap).map_err(|e| anyhow::anyhow!("chunking: {}", e))
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            snippet_chars: default_snippet_chars(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_snippet_chars() -> usize {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Environment variable holding the API key. Defaults per provider.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_generation_max_retries")]
    pub max_retries: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: None,
            url: None,
            api_key_env: None,
            timeout_secs: default_generation_timeout_secs(),
            max_retries: default_generation_max_retries(),
        }
    }
}

fn default_generation_provider() -> String {
    "gemini".to_string()
}
fn default_generation_timeout_secs() -> u64 {
    60
}
fn default_generation_max_retries() -> u32 {
    2
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct UpdateConfig {
    #[serde(default)]
    pub metadata_path: Option<PathBuf>,
}

/// A logical data source: a directory under the corpus root that some
/// external process keeps up to date.
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub name: String,
    pub dir: PathBuf,
    #[serde(default)]
    pub url: Option<String>,
}

impl Config {
    /// Where update metadata is persisted.
    pub fn update_metadata_path(&self) -> PathBuf {
        self.update
            .metadata_path
            .clone()
            .unwrap_or_else(|| self.corpus.root.join("update_metadata.json"))
    }

    /// Absolute-or-cwd-relative directory of a source. Relative `dir`
    /// values are resolved against the corpus root.
    pub fn source_dir(&self, source: &SourceConfig) -> PathBuf {
        if source.dir.is_absolute() {
            source.dir.clone()
        } else {
            self.corpus.root.join(&source.dir)
        }
    }

    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    config.chunking.params()?;

    if config.retrieval.top_k == 0 {
        bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.snippet_chars == 0 {
        bail!("retrieval.snippet_chars must be >= 1");
    }

    if config.corpus.extensions.is_empty() {
        bail!("corpus.extensions must not be empty");
    }
    for ext in &config.corpus.extensions {
        if Format::from_extension(ext).is_none() {
            bail!(
                "Unsupported extension in corpus.extensions: '{}'. Supported: txt, md, json, yaml, yml, pdf, docx, pptx",
                ext
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "local" => {}
        "hash" => {
            if config.embedding.dims == Some(0) {
                bail!("embedding.dims must be > 0 when provider is 'hash'");
            }
        }
        "openai" | "ollama" => {
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, hash, openai, ollama, or local.",
            other
        ),
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    match config.generation.provider.as_str() {
        "disabled" | "gemini" | "openai" => {}
        "ollama" => {
            if config.generation.model.is_none() {
                bail!("generation.model must be specified when provider is 'ollama'");
            }
        }
        other => bail!(
            "Unknown generation provider: '{}'. Must be disabled, gemini, openai, or ollama.",
            other
        ),
    }

    let mut names = HashSet::new();
    for source in &config.sources {
        if source.name.trim().is_empty() {
            bail!("sources: every source needs a non-empty name");
        }
        if !names.insert(source.name.as_str()) {
            bail!("sources: duplicate source name '{}'", source.name);
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[corpus]
root = "./data"

[db]
path = "./index/crag.sqlite"
"#;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let cfg = parse_config(MINIMAL).unwrap();
        assert_eq!(cfg.chunking.chunk_size, 1000);
        assert_eq!(cfg.chunking.overlap, 200);
        assert_eq!(cfg.retrieval.top_k, 5);
        assert_eq!(cfg.embedding.provider, "disabled");
        assert_eq!(cfg.generation.provider, "gemini");
        assert_eq!(cfg.corpus.extensions.len(), 8);
        assert_eq!(
            cfg.update_metadata_path(),
            PathBuf::from("./data/update_metadata.json")
        );
    }

    #[test]
    fn test_overlap_not_smaller_than_chunk_size_rejected() {
        let text = format!("{}\n[chunking]\nchunk_size = 100\noverlap = 100\n", MINIMAL);
        let err = parse_config(&text).unwrap_err();
        assert!(format!("{:#}", err).contains("overlap"));
    }

    #[test]
    fn test_openai_requires_model_and_dims() {
        let text = format!("{}\n[embedding]\nprovider = \"openai\"\n", MINIMAL);
        assert!(parse_config(&text).is_err());
        let text = format!(
            "{}\n[embedding]\nprovider = \"openai\"\nmodel = \"text-embedding-3-small\"\ndims = 1536\n",
            MINIMAL
        );
        assert!(parse_config(&text).is_ok());
    }

    #[test]
    fn test_hash_rejects_zero_dims() {
        let text = format!("{}\n[embedding]\nprovider = \"hash\"\ndims = 0\n", MINIMAL);
        let err = parse_config(&text).unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let text = MINIMAL.replace(
            "root = \"./data\"",
            "root = \"./data\"\nextensions = [\"md\", \"exe\"]",
        );
        assert!(parse_config(&text).is_err());
    }

    #[test]
    fn test_sources_resolve_against_corpus_root() {
        let text = format!(
            "{}\n[[sources]]\nname = \"notes\"\ndir = \"notes\"\n\n[[sources]]\nname = \"abs\"\ndir = \"/srv/abs\"\n",
            MINIMAL
        );
        let cfg = parse_config(&text).unwrap();
        let notes = cfg.source("notes").unwrap();
        assert_eq!(cfg.source_dir(notes), PathBuf::from("./data/notes"));
        let abs = cfg.source("abs").unwrap();
        assert_eq!(cfg.source_dir(abs), PathBuf::from("/srv/abs"));
    }

    #[test]
    fn test_duplicate_source_names_rejected() {
        let text = format!(
            "{}\n[[sources]]\nname = \"a\"\ndir = \"a\"\n\n[[sources]]\nname = \"a\"\ndir = \"b\"\n",
            MINIMAL
        );
        assert!(parse_config(&text).is_err());
    }
}
