//! Recall Store - Vector store abstraction
//!
//! A collection durably holds `(metadata, vector)` records behind a
//! caller-supplied schema and fixed dimension, and answers top-K
//! cosine-similarity queries above a threshold.
//!
//! Two similarity strategies implement the same [`VectorStore`] contract:
//! - [`MemoryStore`](memory::MemoryStore) keeps all candidate vectors in
//!   memory and scores them with a plain dot-product/argsort, suited to
//!   small or precomputed corpora.
//! - [`QdrantStore`](qdrant_store::QdrantStore) pushes distance and
//!   ordering into the storage backend's native vector operator.
//!
//! Ordering, threshold, and top-K behavior are identical either way.

use async_trait::async_trait;
use recall_core::{Embedding, Result, Schema, SimilarityMatch, VectorRecord};

pub mod memory;
pub mod qdrant_store;

pub use memory::MemoryStore;
pub use qdrant_store::QdrantStore;

/// Trait for vector store operations
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a collection, idempotently
    ///
    /// Re-creating with an identical `(name, schema, dimension)` triple is
    /// a no-op; re-creating with a different schema or dimension is a
    /// schema error. Connection failure is `StoreUnavailable`.
    async fn create_collection(&self, name: &str, schema: &Schema, dimension: usize)
        -> Result<()>;

    /// Insert records, normalizing each vector representation
    ///
    /// Accepts vectors as a native sequence, a bracketed string encoding,
    /// or an already-typed embedding; all three store identical values.
    /// Returns the number of rows written.
    async fn insert(&self, name: &str, records: &[VectorRecord]) -> Result<usize>;

    /// Top-K cosine-similarity query
    ///
    /// Keeps records with similarity strictly above `threshold`, sorted
    /// descending, truncated to `top_k`. An empty result set is
    /// `NoMatches`; a query vector of the wrong dimension is a schema
    /// error.
    async fn query(
        &self,
        name: &str,
        query: &Embedding,
        threshold: f32,
        top_k: usize,
    ) -> Result<Vec<SimilarityMatch>>;
}
