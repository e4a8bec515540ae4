//! Embedding provider clients
//!
//! Supports OpenAI and Ollama embedding APIs. Both providers embed text
//! content; image items are rejected with a backend error since neither
//! API accepts binary input. Multimodal backends plug in through the same
//! [`EmbeddingClient`](crate::EmbeddingClient) trait.
//!
//! Author: hephaex@gmail.com

use crate::EmbeddingClient;
use async_trait::async_trait;
use recall_core::{
    Embedding, EmbeddingConfig, EmbeddingProvider, Item, ItemContent, RecallError, Result,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Extract text content, rejecting binary items
fn text_of(item: &Item) -> Result<&str> {
    match &item.content {
        ItemContent::Text(text) => Ok(text),
        ItemContent::Image(_) => Err(RecallError::Backend(
            "image items are not supported by text-only embedding providers".to_string(),
        )),
    }
}

// ============================================================================
// OpenAI Embedding Client
// ============================================================================

/// OpenAI embedding API client
pub struct OpenAiEmbedding {
    client: Client,
    api_key: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct OpenAiEmbeddingRequest {
    input: Vec<String>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

impl OpenAiEmbedding {
    /// Create a new OpenAI embedding client
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        let dimension = match model.as_str() {
            "text-embedding-3-small" => 1536,
            "text-embedding-3-large" => 3072,
            "text-embedding-ada-002" => 1536,
            _ => 1536, // Default
        };

        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model,
            dimension,
        }
    }

    /// Create from config
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| RecallError::Config("OpenAI API key required".to_string()))?;

        Ok(Self::new(api_key.clone(), config.model.clone()))
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbedding {
    async fn embed(&self, item: &Item) -> Result<Embedding> {
        let results = self.embed_batch(std::slice::from_ref(item)).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| RecallError::Backend("no embedding returned".to_string()))
    }

    async fn embed_batch(&self, items: &[Item]) -> Result<Vec<Embedding>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let input = items
            .iter()
            .map(|item| text_of(item).map(str::to_string))
            .collect::<Result<Vec<String>>>()?;

        let request = OpenAiEmbeddingRequest {
            input,
            model: self.model.clone(),
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| RecallError::Backend(format!("embedding request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RecallError::Backend(format!(
                "OpenAI embedding error: {error_text}"
            )));
        }

        let result: OpenAiEmbeddingResponse = response.json().await.map_err(|e| {
            RecallError::Backend(format!("failed to parse embedding response: {e}"))
        })?;

        // Sort by index so results line up with input order
        let mut data = result.data;
        data.sort_by_key(|e| e.index);

        Ok(data.into_iter().map(|e| Embedding::new(e.embedding)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// ============================================================================
// Ollama Embedding Client
// ============================================================================

/// Ollama embedding API client
pub struct OllamaEmbedding {
    client: Client,
    base_url: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct OllamaEmbeddingRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedding {
    /// Create a new Ollama embedding client
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        let dimension = match model.as_str() {
            "nomic-embed-text" => 768,
            "mxbai-embed-large" => 1024,
            "all-minilm" => 384,
            _ => 768, // Default for most models
        };

        Self {
            client: Client::new(),
            base_url: base_url.into(),
            model,
            dimension,
        }
    }

    /// Create from config
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self::new(config.ollama_url.clone(), config.model.clone())
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbedding {
    async fn embed(&self, item: &Item) -> Result<Embedding> {
        let request = OllamaEmbeddingRequest {
            model: self.model.clone(),
            prompt: text_of(item)?.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| RecallError::Backend(format!("Ollama embedding request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RecallError::Backend(format!(
                "Ollama embedding error: {error_text}"
            )));
        }

        let result: OllamaEmbeddingResponse = response.json().await.map_err(|e| {
            RecallError::Backend(format!("failed to parse embedding response: {e}"))
        })?;

        Ok(Embedding::new(result.embedding))
    }

    async fn embed_batch(&self, items: &[Item]) -> Result<Vec<Embedding>> {
        // Ollama has no native batch endpoint, so items are processed
        // sequentially within the one rate-limited call.
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            results.push(self.embed(item).await?);
        }
        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// ============================================================================
// Factory function
// ============================================================================

/// Create an embedding client from config
pub fn create_embedding_client(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingClient>> {
    match config.provider {
        EmbeddingProvider::OpenAI => Ok(Box::new(OpenAiEmbedding::from_config(config)?)),
        EmbeddingProvider::Ollama => Ok(Box::new(OllamaEmbedding::from_config(config))),
    }
}

// ============================================================================
// Tests
// ============================================================================
