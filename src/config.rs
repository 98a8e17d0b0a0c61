use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::str::FromStr;

use crate::dataset::source::DatasetSource;

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Server bind address
    pub bind_addr: String,
    /// Where the index and record files come from
    pub dataset: DatasetConfig,
    /// Number of nearest neighbours retrieved per query
    pub top_k: usize,
    /// Maximum number of queries answered at the same time
    pub max_concurrent_requests: usize,
    /// Generation model configuration
    pub llm: LlmConfig,
    /// Query embedding configuration
    pub embedding: EmbeddingConfig,
    /// Wording used in the page and in prompts
    pub site: SiteConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetConfig {
    pub source: DatasetSource,
    /// Load at startup instead of on the first query
    pub eager_load: bool,
    /// Reported as `dataset_type` by the status endpoints
    pub label: String,
    /// Total timeout for a single blob download
    pub download_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LlmConfig {
    /// "gemini", "openai" or "ollama"
    pub provider: String,
    /// Base URL for the LLM API
    pub base_url: String,
    /// Model name for answer generation
    pub chat_model: String,
    /// API key (only needed for hosted providers)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingConfig {
    /// "ollama", "openai" or "gemini"
    pub provider: String,
    pub base_url: String,
    /// Must be the model the index vectors were produced with
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteConfig {
    pub title: String,
    /// What the retrieved records describe, e.g. "electrical transmission lines"
    pub topic: String,
    /// What the assistant is willing to talk about without retrieved context
    pub domain: String,
}

const LLM_PROVIDERS: &[&str] = &["gemini", "openai", "ollama"];
const EMBEDDING_PROVIDERS: &[&str] = &["ollama", "openai", "gemini"];

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8002".to_string(),
            dataset: DatasetConfig::default(),
            top_k: 5,
            max_concurrent_requests: 2,
            llm: LlmConfig::default(),
            embedding: EmbeddingConfig::default(),
            site: SiteConfig::default(),
        }
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            source: DatasetSource::Local {
                index_path: PathBuf::from("reduced_electrical_grid_index.faiss"),
                metadata_path: PathBuf::from("reduced_electrical_grid_metadata.json"),
            },
            eager_load: true,
            label: "reduced_dataset".to_string(),
            download_timeout_secs: 300,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            chat_model: "gemini-2.5-flash-lite".to_string(),
            api_key: None,
            temperature: 0.2,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            model: "all-minilm".to_string(),
            api_key: None,
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Clarity Grid Chatbot".to_string(),
            topic: "electrical transmission lines".to_string(),
            domain: "electrical grids, power systems, or related topics".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(port) = lookup("PORT") {
            let port: u16 = parse_var("PORT", &port)?;
            config.bind_addr = format!("0.0.0.0:{port}");
        }
        if let Some(addr) = lookup("GRID_RAG_BIND_ADDR") {
            config.bind_addr = addr;
        }

        // Dataset source: both URLs select blob storage, neither keeps local files
        match (lookup("DATASET_INDEX_URL"), lookup("DATASET_METADATA_URL")) {
            (Some(index_url), Some(metadata_url)) => {
                let cache_dir = lookup("DATASET_CACHE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(std::env::temp_dir);
                config.dataset.source = DatasetSource::Remote {
                    index_url,
                    metadata_url,
                    cache_dir,
                };
                config.dataset.eager_load = false;
            }
            (None, None) => {
                if let DatasetSource::Local {
                    index_path,
                    metadata_path,
                } = &mut config.dataset.source
                {
                    if let Some(path) = lookup("DATASET_INDEX_PATH") {
                        *index_path = PathBuf::from(path);
                    }
                    if let Some(path) = lookup("DATASET_METADATA_PATH") {
                        *metadata_path = PathBuf::from(path);
                    }
                }
            }
            _ => bail!("DATASET_INDEX_URL and DATASET_METADATA_URL must be set together"),
        }
        if let Some(val) = lookup("DATASET_EAGER_LOAD") {
            config.dataset.eager_load = parse_bool("DATASET_EAGER_LOAD", &val)?;
        }
        if let Some(label) = lookup("DATASET_LABEL") {
            config.dataset.label = label;
        }
        if let Some(val) = lookup("DOWNLOAD_TIMEOUT_SECS") {
            config.dataset.download_timeout_secs = parse_var("DOWNLOAD_TIMEOUT_SECS", &val)?;
        }

        if let Some(val) = lookup("RETRIEVAL_TOP_K") {
            config.top_k = parse_var("RETRIEVAL_TOP_K", &val)?;
        }
        if let Some(val) = lookup("MAX_CONCURRENT_REQUESTS") {
            config.max_concurrent_requests = parse_var("MAX_CONCURRENT_REQUESTS", &val)?;
        }

        if let Some(provider) = lookup("LLM_PROVIDER") {
            config.llm.provider = provider.to_lowercase();
        }
        if let Some(url) = lookup("LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Some(model) = lookup("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        config.llm.api_key = lookup("LLM_API_KEY").or_else(|| lookup("GOOGLE_AI_API_KEY"));
        if let Some(val) = lookup("LLM_TEMPERATURE") {
            config.llm.temperature = parse_var("LLM_TEMPERATURE", &val)?;
        }

        if let Some(provider) = lookup("EMBEDDING_PROVIDER") {
            config.embedding.provider = provider.to_lowercase();
        }
        if let Some(url) = lookup("EMBEDDING_BASE_URL") {
            config.embedding.base_url = url;
        }
        if let Some(model) = lookup("EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        config.embedding.api_key = lookup("EMBEDDING_API_KEY").or_else(|| config.llm.api_key.clone());

        if let Some(title) = lookup("APP_TITLE") {
            config.site.title = title;
        }
        if let Some(topic) = lookup("ASSISTANT_TOPIC") {
            config.site.topic = topic;
        }
        if let Some(domain) = lookup("ASSISTANT_DOMAIN") {
            config.site.domain = domain;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !LLM_PROVIDERS.contains(&self.llm.provider.as_str()) {
            bail!("Unknown LLM provider: {}", self.llm.provider);
        }
        if !EMBEDDING_PROVIDERS.contains(&self.embedding.provider.as_str()) {
            bail!("Unknown embedding provider: {}", self.embedding.provider);
        }
        if self.top_k == 0 {
            bail!("RETRIEVAL_TOP_K must be at least 1");
        }
        if self.max_concurrent_requests == 0 {
            bail!("MAX_CONCURRENT_REQUESTS must be at least 1");
        }
        Ok(())
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {name}: {value:?}"))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("Invalid value for {name}: {value:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_use_local_files() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8002");
        assert_eq!(config.top_k, 5);
        assert_eq!(config.max_concurrent_requests, 2);
        assert!(config.dataset.eager_load);
        assert!(matches!(config.dataset.source, DatasetSource::Local { .. }));
        assert!(config.llm.api_key.is_none());
    }

    #[test]
    fn test_port_sets_bind_addr() {
        let config = Config::from_lookup(lookup_from(&[("PORT", "9100")])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9100");
    }

    #[test]
    fn test_invalid_port_is_fatal() {
        let err = Config::from_lookup(lookup_from(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_remote_source_defaults_to_lazy_loading() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATASET_INDEX_URL", "https://blob.example/index.faiss"),
            ("DATASET_METADATA_URL", "https://blob.example/meta.json"),
            ("DATASET_CACHE_DIR", "/var/cache/grid"),
        ]))
        .unwrap();
        assert!(!config.dataset.eager_load);
        match config.dataset.source {
            DatasetSource::Remote { cache_dir, .. } => {
                assert_eq!(cache_dir, PathBuf::from("/var/cache/grid"))
            }
            other => panic!("expected remote source, got {other:?}"),
        }
    }

    #[test]
    fn test_single_dataset_url_is_rejected() {
        let result = Config::from_lookup(lookup_from(&[(
            "DATASET_INDEX_URL",
            "https://blob.example/index.faiss",
        )]));
        assert!(result.is_err());
    }

    #[test]
    fn test_google_key_is_fallback_for_both_clients() {
        let config =
            Config::from_lookup(lookup_from(&[("GOOGLE_AI_API_KEY", "g-key")])).unwrap();
        assert_eq!(config.llm.api_key.as_deref(), Some("g-key"));
        assert_eq!(config.embedding.api_key.as_deref(), Some("g-key"));
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        assert!(Config::from_lookup(lookup_from(&[("LLM_PROVIDER", "palm")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("EMBEDDING_PROVIDER", "faiss")])).is_err());
    }

    #[test]
    fn test_zero_limits_are_rejected() {
        assert!(Config::from_lookup(lookup_from(&[("RETRIEVAL_TOP_K", "0")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("MAX_CONCURRENT_REQUESTS", "0")])).is_err());
    }

    #[test]
    fn test_eager_flag_parsing() {
        let config =
            Config::from_lookup(lookup_from(&[("DATASET_EAGER_LOAD", "off")])).unwrap();
        assert!(!config.dataset.eager_load);
        assert!(Config::from_lookup(lookup_from(&[("DATASET_EAGER_LOAD", "maybe")])).is_err());
    }
}
