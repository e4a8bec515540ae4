//! Qdrant implementation for vector storage
//!
//! Pushes similarity computation into the storage backend's native cosine
//! operator. Collection creation is idempotent; inserts validate every
//! row first and then issue one bulk upsert.
//!
//! Author: hephaex@gmail.com

use crate::VectorStore;
use async_trait::async_trait;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_output::VectorsOptions;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, ScoredPoint, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use recall_core::{
    Embedding, FieldValue, RecallError, Result, Schema, SimilarityMatch, StoreConfig,
    VectorRecord,
};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Qdrant-backed vector store
///
/// Holds one client per store instance; connection pooling is the qdrant
/// client's concern. Collections created through this instance are
/// tracked so inserts and queries can validate schema and dimension
/// before any network round trip.
pub struct QdrantStore {
    client: Qdrant,
    registry: RwLock<HashMap<String, (Schema, usize)>>,
}

impl QdrantStore {
    /// Connect to a Qdrant instance
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let client = Qdrant::from_url(&config.qdrant_url)
            .build()
            .map_err(|e| RecallError::StoreUnavailable(format!("Qdrant connection failed: {e}")))?;

        Ok(Self {
            client,
            registry: RwLock::new(HashMap::new()),
        })
    }

    async fn registered(&self, name: &str) -> Result<(Schema, usize)> {
        let registry = self.registry.read().await;
        registry.get(name).cloned().ok_or_else(|| {
            RecallError::StoreUnavailable(format!(
                "collection '{name}' has not been created through this store"
            ))
        })
    }
}

/// Convert metadata fields to a qdrant payload map
fn to_payload(fields: &HashMap<String, FieldValue>) -> HashMap<String, QdrantValue> {
    fields
        .iter()
        .map(|(name, value)| {
            let converted = match value {
                FieldValue::String(s) => QdrantValue::from(s.clone()),
                FieldValue::Integer(i) => QdrantValue::from(*i),
                FieldValue::Float(f) => QdrantValue::from(*f),
            };
            (name.clone(), converted)
        })
        .collect()
}

/// Decode a qdrant payload back into metadata fields
///
/// Payload kinds outside the schema's primitive types are skipped.
fn from_payload(payload: &HashMap<String, QdrantValue>) -> HashMap<String, FieldValue> {
    payload
        .iter()
        .filter_map(|(name, value)| {
            let decoded = match value.kind.as_ref()? {
                Kind::StringValue(s) => FieldValue::String(s.clone()),
                Kind::IntegerValue(i) => FieldValue::Integer(*i),
                Kind::DoubleValue(d) => FieldValue::Float(*d),
                _ => return None,
            };
            Some((name.clone(), decoded))
        })
        .collect()
}

/// Extract the stored vector from a scored point
fn stored_vector(point: &ScoredPoint) -> Embedding {
    match point
        .vectors
        .as_ref()
        .and_then(|v| v.vectors_options.as_ref())
    {
        Some(VectorsOptions::Vector(vector)) => Embedding::new(vector.data.clone()),
        _ => Embedding::new(Vec::new()),
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn create_collection(
        &self,
        name: &str,
        schema: &Schema,
        dimension: usize,
    ) -> Result<()> {
        {
            let registry = self.registry.read().await;
            if let Some((existing_schema, existing_dim)) = registry.get(name) {
                if existing_schema != schema || *existing_dim != dimension {
                    return Err(RecallError::Schema(format!(
                        "collection '{name}' already exists with a different schema or dimension"
                    )));
                }
                return Ok(());
            }
        }

        let collections = self.client.list_collections().await.map_err(|e| {
            RecallError::StoreUnavailable(format!("failed to list collections: {e}"))
        })?;

        let exists = collections.collections.iter().any(|c| c.name == name);

        if !exists {
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(name).vectors_config(VectorParamsBuilder::new(
                        dimension as u64,
                        Distance::Cosine,
                    )),
                )
                .await
                .map_err(|e| {
                    RecallError::StoreUnavailable(format!("failed to create collection: {e}"))
                })?;
            tracing::info!(collection = name, dimension, "collection created");
        }

        let mut registry = self.registry.write().await;
        registry.insert(name.to_string(), (schema.clone(), dimension));
        Ok(())
    }

    async fn insert(&self, name: &str, records: &[VectorRecord]) -> Result<usize> {
        let (schema, dimension) = self.registered(name).await?;

        // Validate and normalize everything up front, then write one bulk
        // upsert; partial failure cannot leave a half-written batch.
        let mut points = Vec::with_capacity(records.len());
        for record in records {
            schema.validate(&record.fields)?;
            let embedding = record.vector.normalize()?;
            if embedding.dim() != dimension {
                return Err(RecallError::Schema(format!(
                    "vector dimension {} does not match collection dimension {dimension}",
                    embedding.dim()
                )));
            }
            points.push(PointStruct::new(
                Uuid::new_v4().to_string(),
                embedding.into_vec(),
                to_payload(&record.fields),
            ));
        }

        if points.is_empty() {
            return Ok(0);
        }

        let count = points.len();
        self.client
            .upsert_points(UpsertPointsBuilder::new(name, points))
            .await
            .map_err(|e| RecallError::StoreUnavailable(format!("failed to upsert vectors: {e}")))?;

        tracing::debug!(collection = name, rows = count, "bulk upsert committed");
        Ok(count)
    }

    async fn query(
        &self,
        name: &str,
        query: &Embedding,
        threshold: f32,
        top_k: usize,
    ) -> Result<Vec<SimilarityMatch>> {
        let (_, dimension) = self.registered(name).await?;

        if query.dim() != dimension {
            return Err(RecallError::Schema(format!(
                "query dimension {} does not match collection dimension {dimension}",
                query.dim()
            )));
        }

        let results = self
            .client
            .search_points(
                SearchPointsBuilder::new(name, query.as_slice().to_vec(), top_k as u64)
                    .with_payload(true)
                    .with_vectors(true)
                    .score_threshold(threshold),
            )
            .await
            .map_err(|e| RecallError::StoreUnavailable(format!("vector search failed: {e}")))?;

        // The server threshold is inclusive; the contract wants strictly
        // greater, so filter again here.
        let matches: Vec<SimilarityMatch> = results
            .result
            .iter()
            .filter(|point| point.score > threshold)
            .map(|point| SimilarityMatch {
                fields: from_payload(&point.payload),
                vector: stored_vector(point),
                score: point.score,
            })
            .collect();

        if matches.is_empty() {
            return Err(RecallError::NoMatches);
        }

        tracing::debug!(collection = name, hits = matches.len(), "query served");
        Ok(matches)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use recall_core::FieldType;

    #[test]
    fn test_payload_round_trip() {
        let mut fields = HashMap::new();
        fields.insert("title".to_string(), FieldValue::from("doc"));
        fields.insert("page".to_string(), FieldValue::from(12i64));
        fields.insert("confidence".to_string(), FieldValue::from(0.75f64));

        let decoded = from_payload(&to_payload(&fields));
        assert_eq!(decoded, fields);
    }

    #[tokio::test]
    async fn test_insert_requires_created_collection() {
        let store = QdrantStore::new(&StoreConfig::default()).unwrap();
        // The registry miss is detected before any network round trip.
        let err = store.insert("missing", &[]).await.unwrap_err();
        assert!(matches!(err, RecallError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn test_query_requires_created_collection() {
        let store = QdrantStore::new(&StoreConfig::default()).unwrap();
        let err = store
            .query("missing", &Embedding::new(vec![1.0]), 0.0, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, RecallError::StoreUnavailable(_)));
    }

    #[test]
    fn test_schema_registry_types() {
        // Registry entries carry the full declared schema.
        let schema = Schema::new().field("title", FieldType::String);
        assert_eq!(schema.field_type("title"), Some(FieldType::String));
    }
}
