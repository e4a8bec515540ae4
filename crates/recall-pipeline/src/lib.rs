//! Recall Pipeline - Ingestion orchestration and query surface
//!
//! [`IngestionPipeline`] is the only component that touches both the
//! embedding side and the storage side: it creates the collection,
//! embeds the corpus through the throttled [`BatchEmbedder`], zips the
//! resulting vectors with caller-supplied metadata, and inserts the
//! records. [`SimilaritySearcher`] is the read path: it embeds a raw
//! query item with a single backend call and delegates to the store's
//! similarity query.
//!
//! Author: hephaex@gmail.com

use recall_core::{Embedding, Item, RecallError, Result, Schema, SimilarityMatch, VectorInput, VectorRecord};
use recall_embed::{BatchEmbedder, EmbeddingClient};
use recall_store::VectorStore;
use std::sync::Arc;
use std::time::{Duration, Instant};

// ============================================================================
// Ingestion
// ============================================================================

/// Outcome of one ingestion run
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub collection: String,
    /// Items converted to vectors
    pub embedded: usize,
    /// Rows written to the store
    pub inserted: usize,
    pub elapsed_ms: u64,
}

/// Orchestrates embed-then-insert for a corpus
///
/// A run that fails partway is safely re-runnable because collection
/// creation is idempotent, but re-running duplicates any rows inserted
/// before the failure; there is no upsert or dedup key.
pub struct IngestionPipeline {
    store: Arc<dyn VectorStore>,
    embedder: BatchEmbedder,
    insert_timeout: Option<Duration>,
}

impl IngestionPipeline {
    pub fn new(store: Arc<dyn VectorStore>, embedder: BatchEmbedder) -> Self {
        Self {
            store,
            embedder,
            insert_timeout: None,
        }
    }

    /// Bound the store insert with a caller-supplied timeout
    ///
    /// Timeouts on the embedding calls themselves are configured on the
    /// [`BatchEmbedder`].
    pub fn with_insert_timeout(mut self, timeout: Duration) -> Self {
        self.insert_timeout = Some(timeout);
        self
    }

    /// Ingest a corpus into a collection
    ///
    /// Steps: idempotent `create_collection`, throttled batch embedding,
    /// zip vectors with item metadata, insert.
    pub async fn ingest(
        &self,
        collection: &str,
        schema: &Schema,
        dimension: usize,
        items: Vec<Item>,
    ) -> Result<IngestReport> {
        let started = Instant::now();
        tracing::info!(collection, items = items.len(), "ingestion started");

        self.store
            .create_collection(collection, schema, dimension)
            .await?;

        let vectors = self.embedder.embed(&items).await?;

        for vector in &vectors {
            if vector.dim() != dimension {
                return Err(RecallError::Schema(format!(
                    "backend produced dimension {}, collection expects {dimension}",
                    vector.dim()
                )));
            }
        }

        let records: Vec<VectorRecord> = items
            .into_iter()
            .zip(vectors)
            .map(|(item, vector)| VectorRecord::new(item.fields, VectorInput::Typed(vector)))
            .collect();

        let embedded = records.len();
        let inserted = match self.insert_timeout {
            Some(limit) => tokio::time::timeout(limit, self.store.insert(collection, &records))
                .await
                .map_err(|_| {
                    RecallError::StoreUnavailable(format!(
                        "insert timed out after {}ms",
                        limit.as_millis()
                    ))
                })??,
            None => self.store.insert(collection, &records).await?,
        };

        let report = IngestReport {
            collection: collection.to_string(),
            embedded,
            inserted,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(
            collection,
            embedded = report.embedded,
            inserted = report.inserted,
            elapsed_ms = report.elapsed_ms,
            "ingestion finished"
        );
        Ok(report)
    }
}

// ============================================================================
// Query surface
// ============================================================================

/// Options for a similarity query
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Minimum similarity a record must strictly exceed
    pub threshold: f32,

    /// Maximum number of matches returned
    pub top_k: usize,

    /// Caller-supplied bound on the embed call and the store query
    pub timeout: Option<Duration>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            threshold: 0.001,
            top_k: 10,
            timeout: None,
        }
    }
}

/// Read path: query item in, ranked matches out
pub struct SimilaritySearcher {
    store: Arc<dyn VectorStore>,
    client: Arc<dyn EmbeddingClient>,
}

impl SimilaritySearcher {
    pub fn new(store: Arc<dyn VectorStore>, client: Arc<dyn EmbeddingClient>) -> Self {
        Self { store, client }
    }

    /// Embed a raw query item and return its ranked matches
    pub async fn search(
        &self,
        collection: &str,
        query: &Item,
        options: &QueryOptions,
    ) -> Result<Vec<SimilarityMatch>> {
        let embedding = match options.timeout {
            Some(limit) => tokio::time::timeout(limit, self.client.embed(query))
                .await
                .map_err(|_| {
                    RecallError::Backend(format!(
                        "query embedding timed out after {}ms",
                        limit.as_millis()
                    ))
                })??,
            None => self.client.embed(query).await?,
        };

        self.search_vector(collection, &embedding, options).await
    }

    /// Query with an already-computed vector
    pub async fn search_vector(
        &self,
        collection: &str,
        query: &Embedding,
        options: &QueryOptions,
    ) -> Result<Vec<SimilarityMatch>> {
        tracing::debug!(
            collection,
            threshold = options.threshold,
            top_k = options.top_k,
            "similarity query"
        );

        match options.timeout {
            Some(limit) => tokio::time::timeout(
                limit,
                self.store
                    .query(collection, query, options.threshold, options.top_k),
            )
            .await
            .map_err(|_| {
                RecallError::StoreUnavailable(format!(
                    "similarity query timed out after {}ms",
                    limit.as_millis()
                ))
            })?,
            None => {
                self.store
                    .query(collection, query, options.threshold, options.top_k)
                    .await
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use recall_core::{FieldType, FieldValue, ItemContent};
    use recall_embed::Pacer;
    use recall_store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic 4-dim backend: vectors depend only on text content,
    /// so identical text embeds identically across ingest and query.
    struct FakeBackend {
        calls: AtomicUsize,
    }

    impl FakeBackend {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }

        fn vector_for(item: &Item) -> Embedding {
            let text = match &item.content {
                ItemContent::Text(text) => text.as_str(),
                ItemContent::Image(_) => "",
            };
            let mut values = [0.0f32; 4];
            for (i, byte) in text.bytes().enumerate() {
                values[i % 4] += byte as f32;
            }
            // Normalize so cosine scores are well conditioned.
            let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt().max(1.0);
            Embedding::new(values.iter().map(|v| v / norm).collect())
        }
    }

    #[async_trait]
    impl EmbeddingClient for FakeBackend {
        async fn embed(&self, item: &Item) -> Result<Embedding> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Self::vector_for(item))
        }

        async fn embed_batch(&self, items: &[Item]) -> Result<Vec<Embedding>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(items.iter().map(Self::vector_for).collect())
        }

        fn dimension(&self) -> usize {
            4
        }
    }

    fn schema() -> Schema {
        Schema::new().field("title", FieldType::String)
    }

    fn corpus() -> Vec<Item> {
        vec![
            Item::text("the quick brown fox").with_field("title", "fox"),
            Item::text("an entirely different topic").with_field("title", "topic"),
            Item::text("vectors and similarity").with_field("title", "vectors"),
        ]
    }

    fn pipeline_with(
        backend: Arc<FakeBackend>,
        store: Arc<MemoryStore>,
    ) -> (IngestionPipeline, SimilaritySearcher) {
        let embedder = BatchEmbedder::new(
            backend.clone(),
            Pacer::new(1_000_000, Duration::from_secs(1)),
            2,
        );
        (
            IngestionPipeline::new(store.clone(), embedder),
            SimilaritySearcher::new(store, backend),
        )
    }

    #[tokio::test]
    async fn test_ingest_then_query_round_trip() {
        let backend = FakeBackend::new();
        let store = Arc::new(MemoryStore::new());
        let (pipeline, searcher) = pipeline_with(backend, store);

        let report = pipeline
            .ingest("docs", &schema(), 4, corpus())
            .await
            .unwrap();
        assert_eq!(report.embedded, 3);
        assert_eq!(report.inserted, 3);

        // Querying with one of the ingested texts returns it as top-1
        // with similarity ~1.0.
        let query = Item::text("the quick brown fox");
        let matches = searcher
            .search("docs", &query, &QueryOptions::default())
            .await
            .unwrap();

        assert_eq!(
            matches[0].fields.get("title"),
            Some(&FieldValue::from("fox"))
        );
        assert!((matches[0].score - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_ingest_empty_corpus() {
        let backend = FakeBackend::new();
        let store = Arc::new(MemoryStore::new());
        let (pipeline, _) = pipeline_with(backend.clone(), store);

        let report = pipeline
            .ingest("docs", &schema(), 4, Vec::new())
            .await
            .unwrap();

        assert_eq!(report.embedded, 0);
        assert_eq!(report.inserted, 0);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rerun_duplicates_rows() {
        let backend = FakeBackend::new();
        let store = Arc::new(MemoryStore::new());
        let (pipeline, _) = pipeline_with(backend, store.clone());

        pipeline.ingest("docs", &schema(), 4, corpus()).await.unwrap();
        pipeline.ingest("docs", &schema(), 4, corpus()).await.unwrap();

        // Insert-only: re-running after the first pass doubles the rows.
        assert_eq!(store.len("docs").await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_detected_before_insert() {
        let backend = FakeBackend::new();
        let store = Arc::new(MemoryStore::new());
        let (pipeline, _) = pipeline_with(backend, store.clone());

        // Collection declared at dimension 8, backend produces 4.
        let err = pipeline
            .ingest("docs", &schema(), 8, corpus())
            .await
            .unwrap_err();
        assert!(matches!(err, RecallError::Schema(_)));
        assert_eq!(store.len("docs").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_query_default_options() {
        let options = QueryOptions::default();
        assert_eq!(options.top_k, 10);
        assert!((options.threshold - 0.001).abs() < f32::EPSILON);
        assert!(options.timeout.is_none());
    }

    #[tokio::test]
    async fn test_no_matches_surfaces_distinctly() {
        let backend = FakeBackend::new();
        let store = Arc::new(MemoryStore::new());
        let (pipeline, searcher) = pipeline_with(backend, store);

        pipeline
            .ingest("docs", &schema(), 4, Vec::new())
            .await
            .unwrap();

        let err = searcher
            .search("docs", &Item::text("anything"), &QueryOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RecallError::NoMatches));
    }

    #[tokio::test]
    async fn test_insert_timeout_applies_to_store() {
        /// Store whose insert never completes
        struct StuckStore;

        #[async_trait]
        impl VectorStore for StuckStore {
            async fn create_collection(
                &self,
                _name: &str,
                _schema: &Schema,
                _dimension: usize,
            ) -> Result<()> {
                Ok(())
            }

            async fn insert(&self, _name: &str, _records: &[VectorRecord]) -> Result<usize> {
                futures::future::pending().await
            }

            async fn query(
                &self,
                _name: &str,
                _query: &Embedding,
                _threshold: f32,
                _top_k: usize,
            ) -> Result<Vec<SimilarityMatch>> {
                Err(RecallError::NoMatches)
            }
        }

        let embedder = BatchEmbedder::new(
            FakeBackend::new(),
            Pacer::new(1_000_000, Duration::from_secs(1)),
            2,
        );
        let pipeline = IngestionPipeline::new(Arc::new(StuckStore), embedder)
            .with_insert_timeout(Duration::from_millis(20));

        let err = pipeline
            .ingest("docs", &schema(), 4, corpus())
            .await
            .unwrap_err();
        assert!(matches!(err, RecallError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn test_search_timeout_applies_to_embedding() {
        /// Backend that never responds
        struct StuckBackend;

        #[async_trait]
        impl EmbeddingClient for StuckBackend {
            async fn embed(&self, _item: &Item) -> Result<Embedding> {
                futures::future::pending().await
            }

            async fn embed_batch(&self, _items: &[Item]) -> Result<Vec<Embedding>> {
                futures::future::pending().await
            }

            fn dimension(&self) -> usize {
                4
            }
        }

        let store = Arc::new(MemoryStore::new());
        store.create_collection("docs", &schema(), 4).await.unwrap();
        let searcher = SimilaritySearcher::new(store, Arc::new(StuckBackend));

        let options = QueryOptions {
            timeout: Some(Duration::from_millis(20)),
            ..Default::default()
        };
        let err = searcher
            .search("docs", &Item::text("q"), &options)
            .await
            .unwrap_err();
        assert!(matches!(err, RecallError::Backend(_)));
    }
}
