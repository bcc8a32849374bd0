use std::path::Path;

use anyhow::Context;
use ragpipe_guard::GuardrailConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub vector: VectorConfig,
    pub memory: MemoryConfig,
    pub guardrails: GuardrailConfig,
    pub document: DocumentConfig,
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            temperature: 0.7,
            max_tokens: 2048,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub url: String,
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8001".into(),
            dimension: 384,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct VectorConfig {
    /// When unset the in-memory backend is used.
    pub qdrant_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub sqlite_path: String,
    pub max_exchanges: usize,
    pub short_term_ttl_secs: u64,
    pub long_term_ttl_secs: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            sqlite_path: "./data/ragpipe.db".into(),
            max_exchanges: 10,
            short_term_ttl_secs: 3600,
            long_term_ttl_secs: 2_592_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    pub max_file_size_mb: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 10,
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub score_threshold: f32,
    /// Turns replayed into the prompt, independent of the storage cap.
    pub history_in_prompt: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            score_threshold: 0.7,
            history_in_prompt: 5,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to full defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("RAGPIPE_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("RAGPIPE_LLM_API_KEY") {
            self.llm.api_key = v;
        }
        if let Ok(v) = std::env::var("RAGPIPE_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("RAGPIPE_EMBEDDING_URL") {
            self.embedding.url = v;
        }
        if let Ok(v) = std::env::var("RAGPIPE_QDRANT_URL") {
            self.vector.qdrant_url = Some(v);
        }
        if let Ok(v) = std::env::var("RAGPIPE_SQLITE_PATH") {
            self.memory.sqlite_path = v;
        }
    }

    #[must_use]
    pub fn max_file_bytes(&self) -> usize {
        self.document.max_file_size_mb * 1024 * 1024
    }
}
