//! Recall Embed - Rate-limited batch embedding
//!
//! Converts raw items into fixed-dimension vectors without exceeding an
//! external quota. The embedding backend is an injected capability behind
//! the [`EmbeddingClient`] trait; [`BatchEmbedder`] groups items into
//! batches, paces backend calls through a [`Pacer`], and flattens results
//! back into per-item vectors in input order.

use async_trait::async_trait;
use recall_core::{Embedding, Item, RecallError, Result};
use std::sync::Arc;
use std::time::Duration;

pub mod cache;
pub mod pacer;
pub mod providers;

pub use cache::{CacheConfig, CacheStatsReport, EmbeddingCache};
pub use pacer::Pacer;
pub use providers::{create_embedding_client, OllamaEmbedding, OpenAiEmbedding};

// ============================================================================
// Embedding Trait
// ============================================================================

/// Trait for embedding generation
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Generate an embedding for a single item
    async fn embed(&self, item: &Item) -> Result<Embedding>;

    /// Generate embeddings for multiple items in one backend call
    ///
    /// Must return exactly one vector per input item, in input order.
    async fn embed_batch(&self, items: &[Item]) -> Result<Vec<Embedding>>;

    /// Embedding dimension produced by this backend
    fn dimension(&self) -> usize;
}

// ============================================================================
// Batch Embedder
// ============================================================================

/// Throttled batch embedder
///
/// Splits items into consecutive chunks of at most `batch_size`, consumes
/// one pacer tick per chunk, and invokes the backend once per chunk. A
/// backend error aborts the whole operation; there is no partial-result
/// recovery.
pub struct BatchEmbedder {
    client: Arc<dyn EmbeddingClient>,
    pacer: Pacer,
    batch_size: usize,
    timeout: Option<Duration>,
    cache: Option<EmbeddingCache>,
}

impl BatchEmbedder {
    /// Create a new batch embedder
    ///
    /// # Panics
    /// Panics if `batch_size` is zero.
    pub fn new(client: Arc<dyn EmbeddingClient>, pacer: Pacer, batch_size: usize) -> Self {
        assert!(batch_size > 0, "batch_size must be positive");
        Self {
            client,
            pacer,
            batch_size,
            timeout: None,
            cache: None,
        }
    }

    /// Bound each backend call with a caller-supplied timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Serve repeated content from a cache instead of spending quota
    pub fn with_cache(mut self, cache: EmbeddingCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Embedding dimension of the underlying backend
    pub fn dimension(&self) -> usize {
        self.client.dimension()
    }

    /// Embed every item, preserving input length and order
    ///
    /// Empty input returns an empty vec without touching the backend or
    /// consuming a pacer tick.
    pub async fn embed(&self, items: &[Item]) -> Result<Vec<Embedding>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let mut slots: Vec<Option<Embedding>> = vec![None; items.len()];

        // Cache pass: only misses go to the backend.
        let mut pending: Vec<usize> = Vec::new();
        if let Some(cache) = &self.cache {
            for (index, item) in items.iter().enumerate() {
                match cache.get(&item.content).await {
                    Some(hit) => slots[index] = Some(hit),
                    None => pending.push(index),
                }
            }
        } else {
            pending = (0..items.len()).collect();
        }

        for chunk in pending.chunks(self.batch_size) {
            self.pacer.tick().await;

            let batch: Vec<Item> = chunk.iter().map(|&i| items[i].clone()).collect();
            tracing::debug!(batch_len = batch.len(), "calling embedding backend");

            let vectors = self.call_backend(&batch).await?;
            if vectors.len() != batch.len() {
                return Err(RecallError::Backend(format!(
                    "backend returned {} vectors for {} items",
                    vectors.len(),
                    batch.len()
                )));
            }

            for (&index, vector) in chunk.iter().zip(vectors) {
                if let Some(cache) = &self.cache {
                    cache.put(&items[index].content, vector.clone()).await;
                }
                slots[index] = Some(vector);
            }
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.ok_or_else(|| {
                    RecallError::Backend("backend left an item without a vector".to_string())
                })
            })
            .collect()
    }

    async fn call_backend(&self, batch: &[Item]) -> Result<Vec<Embedding>> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.client.embed_batch(batch))
                .await
                .map_err(|_| {
                    RecallError::Backend(format!(
                        "embedding call timed out after {}ms",
                        limit.as_millis()
                    ))
                })?,
            None => self.client.embed_batch(batch).await,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
