//! Configuration management
//!
//! Handles configuration from environment variables and TOML config files
//! with sensible defaults for development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Embedding backend configuration
    pub embedding: EmbeddingConfig,

    /// Vector store configuration
    pub store: StoreConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(provider) = std::env::var("EMBEDDING_PROVIDER") {
            config.embedding.provider = provider.parse()?;
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.embedding.openai_api_key = Some(key);
        }
        if let Ok(url) = std::env::var("OLLAMA_URL") {
            config.embedding.ollama_url = url;
        }
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        if let Ok(size) = std::env::var("EMBEDDING_BATCH_SIZE") {
            config.embedding.batch_size =
                size.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "EMBEDDING_BATCH_SIZE".to_string(),
                    value: size,
                })?;
        }
        if let Ok(rpm) = std::env::var("EMBEDDING_REQUESTS_PER_MINUTE") {
            config.embedding.requests_per_minute =
                rpm.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "EMBEDDING_REQUESTS_PER_MINUTE".to_string(),
                    value: rpm,
                })?;
        }

        if let Ok(url) = std::env::var("QDRANT_URL") {
            config.store.qdrant_url = url;
        }
        if let Ok(name) = std::env::var("RECALL_COLLECTION") {
            config.store.collection = name;
        }
        if let Ok(dim) = std::env::var("VECTOR_DIMENSION") {
            config.store.dimension = dim.parse().map_err(|_| ConfigError::InvalidValue {
                key: "VECTOR_DIMENSION".to_string(),
                value: dim,
            })?;
        }

        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }
}

/// Embedding backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding provider to use
    pub provider: EmbeddingProvider,

    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// Ollama server URL
    pub ollama_url: String,

    /// Embedding model name
    pub model: String,

    /// Items per backend call
    pub batch_size: usize,

    /// External quota: backend calls allowed per minute
    pub requests_per_minute: u32,

    /// Per-call timeout in seconds (0 disables)
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Ollama,
            openai_api_key: None,
            ollama_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            batch_size: 5,
            requests_per_minute: 60,
            timeout_secs: 60,
        }
    }
}

/// Supported embedding providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    OpenAI,
    #[default]
    Ollama,
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ConfigError::InvalidValue {
                key: "EMBEDDING_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Qdrant gRPC URL
    pub qdrant_url: String,

    /// Default collection name
    pub collection: String,

    /// Vector dimension (must match the embedding model)
    pub dimension: usize,

    /// Default similarity threshold for queries
    pub threshold: f32,

    /// Default number of results for queries
    pub top_k: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            qdrant_url: "http://localhost:6334".to_string(),
            collection: "recall_items".to_string(),
            dimension: 768, // nomic-embed-text
            threshold: 0.001,
            top_k: 10,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.store.dimension, 768);
        assert_eq!(config.store.top_k, 10);
        assert!((config.store.threshold - 0.001).abs() < f32::EPSILON);
        assert_eq!(config.embedding.batch_size, 5);
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(
            "openai".parse::<EmbeddingProvider>().unwrap(),
            EmbeddingProvider::OpenAI
        );
        assert_eq!(
            "ollama".parse::<EmbeddingProvider>().unwrap(),
            EmbeddingProvider::Ollama
        );
        assert!("vertex".parse::<EmbeddingProvider>().is_err());
    }
}
