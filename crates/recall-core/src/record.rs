//! Data model for collections, records, and similarity matches
//!
//! A collection is identified by a caller-chosen name, an ordered field
//! schema, and a fixed vector dimension. Records bind metadata fields to
//! exactly one embedding vector; every vector stored in one collection
//! shares the same dimension.

use crate::{RecallError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Schema
// ============================================================================

/// Primitive types for metadata fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Float,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Integer => write!(f, "integer"),
            Self::Float => write!(f, "float"),
        }
    }
}

/// A metadata field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Integer(i64),
    Float(f64),
}

impl FieldValue {
    /// The schema type this value conforms to
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::String(_) => FieldType::String,
            Self::Integer(_) => FieldType::Integer,
            Self::Float(_) => FieldType::Float,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

/// Ordered mapping of field name to primitive type
///
/// Defined once per collection at creation time and immutable thereafter;
/// schema changes require a new collection name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<(String, FieldType)>,
}

impl Schema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Add a field (builder style)
    pub fn field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push((name.into(), field_type));
        self
    }

    /// Declared fields in declaration order
    pub fn fields(&self) -> &[(String, FieldType)] {
        &self.fields
    }

    /// Look up the declared type of a field
    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| *t)
    }

    /// Validate a record's metadata fields against this schema
    ///
    /// Declared fields may be absent (optional metadata); undeclared or
    /// mistyped fields are rejected.
    pub fn validate(&self, fields: &HashMap<String, FieldValue>) -> Result<()> {
        for (name, value) in fields {
            match self.field_type(name) {
                None => {
                    return Err(RecallError::Schema(format!(
                        "field '{name}' is not declared in the collection schema"
                    )));
                }
                Some(expected) if expected != value.field_type() => {
                    return Err(RecallError::Schema(format!(
                        "field '{name}' expects {expected}, got {}",
                        value.field_type()
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

// ============================================================================
// Embedding Vectors
// ============================================================================

/// A fixed-dimension embedding vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    /// Vector dimension
    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.0
    }

    /// Cosine similarity with another vector of the same dimension
    ///
    /// Zero-magnitude vectors score 0.0 rather than dividing by zero.
    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        let dot: f32 = self
            .0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| a * b)
            .sum();
        let norm_a: f32 = self.0.iter().map(|v| v * v).sum::<f32>().sqrt();
        let norm_b: f32 = other.0.iter().map(|v| v * v).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot / (norm_a * norm_b)
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

/// Accepted representations of a vector at insert time
///
/// All three shapes normalize to the same stored values: a native float
/// sequence, a bracketed string encoding like `"[0.1,0.2,0.3]"`, or an
/// already-typed [`Embedding`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VectorInput {
    Raw(Vec<f32>),
    Encoded(String),
    Typed(Embedding),
}

impl VectorInput {
    /// Normalize to the store's native vector type
    pub fn normalize(&self) -> Result<Embedding> {
        match self {
            Self::Raw(values) => Ok(Embedding::new(values.clone())),
            Self::Typed(embedding) => Ok(embedding.clone()),
            Self::Encoded(text) => parse_bracketed(text),
        }
    }
}

/// Parse a bracketed float list such as `"[0.1, 0.2, 0.3]"`
fn parse_bracketed(text: &str) -> Result<Embedding> {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| {
            RecallError::Schema(format!(
                "encoded vector must be a bracketed list, got '{text}'"
            ))
        })?;

    if inner.trim().is_empty() {
        return Ok(Embedding::new(Vec::new()));
    }

    let values = inner
        .split(',')
        .map(|part| {
            part.trim().parse::<f32>().map_err(|_| {
                RecallError::Schema(format!("invalid float '{}' in encoded vector", part.trim()))
            })
        })
        .collect::<Result<Vec<f32>>>()?;

    Ok(Embedding::new(values))
}

// ============================================================================
// Items and Records
// ============================================================================

/// Raw content of an ingestion item
#[derive(Debug, Clone, PartialEq)]
pub enum ItemContent {
    /// Free text
    Text(String),
    /// Binary image or video-frame data
    Image(Vec<u8>),
}

/// A unit of ingestion: raw content plus metadata fields
///
/// Identity is positional within the input batch; callers that need a
/// stable id supply one as a metadata field.
#[derive(Debug, Clone)]
pub struct Item {
    pub content: ItemContent,
    pub fields: HashMap<String, FieldValue>,
}

impl Item {
    /// Create a text item with no metadata
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: ItemContent::Text(content.into()),
            fields: HashMap::new(),
        }
    }

    /// Create an image item with no metadata
    pub fn image(bytes: Vec<u8>) -> Self {
        Self {
            content: ItemContent::Image(bytes),
            fields: HashMap::new(),
        }
    }

    /// Attach a metadata field (builder style)
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// One item's metadata bound to exactly one vector
///
/// Created at ingestion time, written once, never mutated in place.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub fields: HashMap<String, FieldValue>,
    pub vector: VectorInput,
}

impl VectorRecord {
    pub fn new(fields: HashMap<String, FieldValue>, vector: VectorInput) -> Self {
        Self { fields, vector }
    }
}

/// A query-time projection of a stored record plus its similarity score
///
/// Exists only for the duration of one query response.
#[derive(Debug, Clone)]
pub struct SimilarityMatch {
    pub fields: HashMap<String, FieldValue>,
    pub vector: Embedding,
    /// Cosine similarity to the query vector, conventionally in [-1, 1]
    pub score: f32,
}

// ============================================================================
// Tests
// ============================================================================
