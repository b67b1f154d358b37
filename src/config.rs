use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root directory holding one subdirectory per session.
    pub root: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Chunk window size in words.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Words shared between consecutive chunks. Must be < chunk_size.
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved per question.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// Gateway kind: `openai` or `ollama`.
    pub provider: String,
    /// Model name (e.g. `text-embedding-3-small`, `nomic-embed-text`).
    pub model: String,
    /// Base URL override. Defaults per provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    /// Gateway kind: `openai` or `ollama`.
    pub provider: String,
    /// Chat model name (e.g. `gpt-4o-mini`, `llama3.2:latest`).
    pub model: String,
    /// Base URL override. Defaults per provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_gen_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_gen_timeout_secs() -> u64 {
    60
}
fn default_temperature() -> f64 {
    0.3
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;

    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }

    if config.chunking.overlap >= config.chunking.chunk_size {
        anyhow::bail!(
            "chunking.overlap ({}) must be < chunking.chunk_size ({})",
            config.chunking.overlap,
            config.chunking.chunk_size
        );
    }

    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    for (section, provider) in [
        ("embedding", config.embedding.provider.as_str()),
        ("generation", config.generation.provider.as_str()),
    ] {
        match provider {
            "openai" | "ollama" => {}
            other => anyhow::bail!(
                "Unknown {} provider: '{}'. Must be openai or ollama.",
                section,
                other
            ),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    const MINIMAL: &str = r#"
[storage]
root = "/tmp/chatdocs"

[embedding]
provider = "ollama"
model = "nomic-embed-text"

[generation]
provider = "ollama"
model = "llama3.2:latest"

[server]
bind = "127.0.0.1:8300"
"#;

    #[test]
    fn minimal_config_applies_defaults() {
        let config = parse(MINIMAL).unwrap();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.overlap, 200);
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.embedding.max_retries, 5);
        assert_eq!(config.generation.timeout_secs, 60);
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let toml_str = format!("{}\n[chunking]\nchunk_size = 100\noverlap = 100\n", MINIMAL);
        assert!(parse(&toml_str).is_err());
    }

    #[test]
    fn unknown_provider_rejected() {
        let bad = MINIMAL.replace("provider = \"ollama\"", "provider = \"faiss\"");
        assert!(parse(&bad).is_err());
    }

    #[test]
    fn zero_top_k_rejected() {
        let toml_str = format!("{}\n[retrieval]\ntop_k = 0\n", MINIMAL);
        assert!(parse(&toml_str).is_err());
    }
}
