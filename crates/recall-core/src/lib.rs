//! Recall Core - Data model, error taxonomy, and configuration
//!
//! This crate defines the shared types used throughout the recall system:
//! - Collection schemas and metadata field types
//! - Embedding vectors and the accepted vector input representations
//! - Records and similarity matches
//! - Common error types
//! - Configuration management
//!
//! Author: hephaex@gmail.com

pub mod config;
pub mod record;

pub use config::{AppConfig, ConfigError, EmbeddingConfig, EmbeddingProvider, StoreConfig};
pub use record::{
    Embedding, FieldType, FieldValue, Item, ItemContent, Schema, SimilarityMatch, VectorInput,
    VectorRecord,
};

use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for recall operations
///
/// All variants surface to the immediate caller; nothing is retried
/// internally. Retry and backoff policy belongs to the caller.
#[derive(Error, Debug)]
pub enum RecallError {
    /// The embedding backend failed or returned an unusable response
    #[error("Embedding backend error: {0}")]
    Backend(String),

    /// The collection or its backing connection cannot be reached
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Dimension or field mismatch against the collection schema
    #[error("Schema error: {0}")]
    Schema(String),

    /// A similarity query cleared no threshold
    ///
    /// Raised instead of returning a silent empty list so callers can
    /// distinguish "nothing relevant found" from "search is down".
    #[error("No records cleared the similarity threshold")]
    NoMatches,

    /// A row-at-a-time insert aborted with earlier rows already committed
    #[error("Partial insert: {inserted} of {total} rows committed before failure: {reason}")]
    PartialInsert {
        inserted: usize,
        total: usize,
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RecallError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_matches_is_distinguishable() {
        let err = RecallError::NoMatches;
        assert!(matches!(err, RecallError::NoMatches));

        let err = RecallError::Backend("timeout".to_string());
        assert!(!matches!(err, RecallError::NoMatches));
    }

    #[test]
    fn test_partial_insert_reports_progress() {
        let err = RecallError::PartialInsert {
            inserted: 3,
            total: 10,
            reason: "dimension mismatch".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("3 of 10"));
        assert!(msg.contains("dimension mismatch"));
    }
}
