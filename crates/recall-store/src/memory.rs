//! In-memory vector store
//!
//! Holds every collection in process memory and answers similarity
//! queries with a brute-force dot-product over the stored vectors. Suited
//! to small or precomputed corpora; the durable counterpart is
//! [`QdrantStore`](crate::qdrant_store::QdrantStore).

use crate::VectorStore;
use async_trait::async_trait;
use recall_core::{
    Embedding, FieldValue, RecallError, Result, Schema, SimilarityMatch, VectorRecord,
};
use std::collections::HashMap;
use tokio::sync::RwLock;

struct StoredCollection {
    schema: Schema,
    dimension: usize,
    rows: Vec<(HashMap<String, FieldValue>, Embedding)>,
}

/// In-memory store with brute-force cosine scoring
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, StoredCollection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently held by a collection
    pub async fn len(&self, name: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(name)
            .ok_or_else(|| RecallError::StoreUnavailable(unknown_collection(name)))?;
        Ok(collection.rows.len())
    }

    /// All-or-nothing insert
    ///
    /// Validates and normalizes every record before committing any of
    /// them, so a bad row leaves the collection untouched. This is an
    /// explicit alternative to the legacy row-at-a-time behavior of
    /// [`insert`](VectorStore::insert), which commits rows as it goes.
    pub async fn insert_atomic(&self, name: &str, records: &[VectorRecord]) -> Result<usize> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| RecallError::StoreUnavailable(unknown_collection(name)))?;

        let mut staged = Vec::with_capacity(records.len());
        for record in records {
            staged.push(validate_row(collection, record)?);
        }

        let count = staged.len();
        collection.rows.extend(staged);
        tracing::debug!(collection = name, rows = count, "atomic insert committed");
        Ok(count)
    }
}

/// Validate a record against the collection schema and dimension
fn validate_row(
    collection: &StoredCollection,
    record: &VectorRecord,
) -> Result<(HashMap<String, FieldValue>, Embedding)> {
    collection.schema.validate(&record.fields)?;
    let embedding = record.vector.normalize()?;
    if embedding.dim() != collection.dimension {
        return Err(RecallError::Schema(format!(
            "vector dimension {} does not match collection dimension {}",
            embedding.dim(),
            collection.dimension
        )));
    }
    Ok((record.fields.clone(), embedding))
}

fn unknown_collection(name: &str) -> String {
    format!("collection '{name}' has not been created")
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn create_collection(
        &self,
        name: &str,
        schema: &Schema,
        dimension: usize,
    ) -> Result<()> {
        let mut collections = self.collections.write().await;

        if let Some(existing) = collections.get(name) {
            if existing.schema != *schema || existing.dimension != dimension {
                return Err(RecallError::Schema(format!(
                    "collection '{name}' already exists with a different schema or dimension"
                )));
            }
            return Ok(());
        }

        collections.insert(
            name.to_string(),
            StoredCollection {
                schema: schema.clone(),
                dimension,
                rows: Vec::new(),
            },
        );
        tracing::info!(collection = name, dimension, "collection created");
        Ok(())
    }

    async fn insert(&self, name: &str, records: &[VectorRecord]) -> Result<usize> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| RecallError::StoreUnavailable(unknown_collection(name)))?;

        // Legacy row-at-a-time behavior: rows committed before a failure
        // stay committed. Callers needing atomicity use `insert_atomic`.
        for (index, record) in records.iter().enumerate() {
            match validate_row(collection, record) {
                Ok(row) => collection.rows.push(row),
                Err(err) => {
                    return Err(RecallError::PartialInsert {
                        inserted: index,
                        total: records.len(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        tracing::debug!(collection = name, rows = records.len(), "insert committed");
        Ok(records.len())
    }

    async fn query(
        &self,
        name: &str,
        query: &Embedding,
        threshold: f32,
        top_k: usize,
    ) -> Result<Vec<SimilarityMatch>> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(name)
            .ok_or_else(|| RecallError::StoreUnavailable(unknown_collection(name)))?;

        if query.dim() != collection.dimension {
            return Err(RecallError::Schema(format!(
                "query dimension {} does not match collection dimension {}",
                query.dim(),
                collection.dimension
            )));
        }

        let mut matches: Vec<SimilarityMatch> = collection
            .rows
            .iter()
            .filter_map(|(fields, vector)| {
                let score = query.cosine_similarity(vector);
                (score > threshold).then(|| SimilarityMatch {
                    fields: fields.clone(),
                    vector: vector.clone(),
                    score,
                })
            })
            .collect();

        if matches.is_empty() {
            return Err(RecallError::NoMatches);
        }

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(top_k);

        tracing::debug!(collection = name, hits = matches.len(), "query served");
        Ok(matches)
    }
}

// ============================================================================
// Tests
// ============================================================================
