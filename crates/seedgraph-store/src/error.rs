//! Error types for the store.

use seedgraph_core::{GraphError, KeyError, KeyTuple, SchemaError};

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Schema lookup error
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Key resolution error
    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    /// Object graph error
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Direct insertion collides with an object holding the same primary key
    #[error("Duplicate primary key {key} for '{entity}'")]
    DuplicateKey { entity: String, key: KeyTuple },

    /// An auto-increment sequence no longer fits its field type
    #[error("Auto-increment sequence for '{entity}.{field}' is exhausted")]
    SequenceExhausted { entity: String, field: String },
}
