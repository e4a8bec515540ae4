//! Caching layer for item embeddings
//!
//! Caches computed embeddings so re-ingesting or re-querying the same
//! content does not spend external quota. Uses the moka crate for
//! thread-safe, async-compatible LRU caching with TTL support.
//!
//! Author: hephaex@gmail.com

use moka::future::Cache;
use recall_core::{Embedding, ItemContent};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Cache Configuration
// ============================================================================

/// Configuration for cache behavior
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached embeddings
    pub max_capacity: u64,

    /// Time-to-live for cache entries (in seconds)
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            // 10k embeddings @ ~3KB each (768 floats) = ~30MB
            max_capacity: 10_000,
            // Embeddings are stable for a given model, cache for 1 hour
            ttl_seconds: 3600,
        }
    }
}

// ============================================================================
// Embedding Cache
// ============================================================================

/// Cache for item embeddings keyed by content hash
///
/// Thread-safe and suitable for async contexts.
#[derive(Clone)]
pub struct EmbeddingCache {
    cache: Cache<u64, Embedding>,
    stats: Arc<CacheStats>,
}

impl EmbeddingCache {
    /// Create a new embedding cache with default configuration
    pub fn new() -> Self {
        Self::with_config(&CacheConfig::default())
    }

    /// Create a new embedding cache with custom configuration
    pub fn with_config(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(Duration::from_secs(config.ttl_seconds))
            .build();

        Self {
            cache,
            stats: Arc::new(CacheStats::default()),
        }
    }

    /// Get a cached embedding for an item's content
    pub async fn get(&self, content: &ItemContent) -> Option<Embedding> {
        let key = hash_content(content);
        let result = self.cache.get(&key).await;

        if result.is_some() {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
        }

        result
    }

    /// Store an embedding for an item's content
    pub async fn put(&self, content: &ItemContent, embedding: Embedding) {
        let key = hash_content(content);
        self.cache.insert(key, embedding).await;
        self.stats.writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Clear all cached embeddings
    pub async fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }

    /// Snapshot of hit/miss/write counters
    pub fn stats(&self) -> CacheStatsReport {
        CacheStatsReport {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            writes: self.stats.writes.load(Ordering::Relaxed),
        }
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

/// Point-in-time cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStatsReport {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
}

impl CacheStatsReport {
    /// Hit rate in [0, 1]; 0.0 when no lookups have happened
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

/// Hash item content for cache keying
///
/// Text and image payloads hash into disjoint keyspaces via a
/// discriminant byte.
fn hash_content(content: &ItemContent) -> u64 {
    let mut hasher = DefaultHasher::new();
    match content {
        ItemContent::Text(text) => {
            0u8.hash(&mut hasher);
            text.hash(&mut hasher);
        }
        ItemContent::Image(bytes) => {
            1u8.hash(&mut hasher);
            bytes.hash(&mut hasher);
        }
    }
    hasher.finish()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_get() {
        let cache = EmbeddingCache::new();
        let content = ItemContent::Text("hello".to_string());
        let embedding = Embedding::new(vec![0.1, 0.2]);

        assert!(cache.get(&content).await.is_none());
        cache.put(&content, embedding.clone()).await;
        assert_eq!(cache.get(&content).await, Some(embedding));
    }

    #[tokio::test]
    async fn test_text_and_image_do_not_collide() {
        let cache = EmbeddingCache::new();
        let text = ItemContent::Text("abc".to_string());
        let image = ItemContent::Image(b"abc".to_vec());

        cache.put(&text, Embedding::new(vec![1.0])).await;
        assert!(cache.get(&image).await.is_none());
    }

    #[tokio::test]
    async fn test_stats_track_hits_and_misses() {
        let cache = EmbeddingCache::new();
        let content = ItemContent::Text("tracked".to_string());

        cache.get(&content).await;
        cache.put(&content, Embedding::new(vec![0.5])).await;
        cache.get(&content).await;

        let report = cache.stats();
        assert_eq!(report.hits, 1);
        assert_eq!(report.misses, 1);
        assert_eq!(report.writes, 1);
        assert!((report.hit_rate() - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = EmbeddingCache::new();
        let content = ItemContent::Text("gone".to_string());
        cache.put(&content, Embedding::new(vec![0.5])).await;

        cache.clear().await;
        assert!(cache.get(&content).await.is_none());
    }
}
