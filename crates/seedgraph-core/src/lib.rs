//! Core types for the seedgraph framework.
//!
//! This crate provides the foundational types shared by the graph
//! synthesizer and the in-memory store:
//!
//! - [`ValueType`] - Scalar type universe for entity fields
//! - [`Value`] - Dynamic scalar values
//! - [`Schema`] - Entity descriptors loaded from YAML or built in code
//! - [`KeyTuple`] - Composite primary/foreign key values
//! - [`KeyRegistry`] - Primary/foreign key resolution and validation
//! - [`ObjectGraph`] - Arena of entity instances addressed by [`ObjectId`]
//!
//! # Architecture
//!
//! ```text
//! seedgraph-core (this crate)
//!    │
//!    ├─── seedgraph-generator  (value synthesizer + graph synthesizer)
//!    │
//!    └─── seedgraph-store      (commit / rebinding engine)
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use seedgraph_core::{EntityDef, FieldDef, ObjectGraph, Schema, Value, ValueType};
//!
//! let schema = Schema::new(
//!     vec![EntityDef::new("Person")
//!         .with_field(FieldDef::scalar("Id", ValueType::Int32))
//!         .with_field(FieldDef::scalar("Name", ValueType::Text))],
//!     vec![],
//! )
//! .unwrap();
//!
//! let mut graph = ObjectGraph::new(Arc::new(schema));
//! let person = graph.allocate("Person").unwrap();
//! graph.set_value(person, "Name", "Ada").unwrap();
//! assert_eq!(graph.value(person, "Name").unwrap(), &Value::from("Ada"));
//! ```

pub mod graph;
pub mod key;
pub mod relations;
pub mod schema;
pub mod types;
pub mod values;

// Re-exports for convenience
pub use graph::{GraphError, GraphId, ObjectGraph, ObjectId, Record, Slot};
pub use key::KeyTuple;
pub use relations::{KeyError, KeyFields, KeyRegistry, Relation};
pub use schema::{EntityDef, FieldDef, FieldKind, RelationDef, Schema, SchemaError};
pub use types::ValueType;
pub use values::Value;
