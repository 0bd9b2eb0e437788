//! seedgraph
//!
//! Synthesizes realistic, internally consistent object graphs for tests and
//! keeps them in a relation-consistent in-memory store, so code that walks
//! entities and their relations can be exercised without a database.
//!
//! # Crates
//!
//! - `seedgraph_core` - value types, schema, key tuples, key registry and
//!   the object arena
//! - `seedgraph_generator` - value synthesizer, customizations and the graph
//!   synthesizer
//! - `seedgraph_store` - the store and its commit/rebinding engine
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use seedgraph::{GraphSynthesizer, Schema, Store, SynthesizerConfig};
//!
//! # fn main() -> anyhow::Result<()> {
//! let schema = Arc::new(Schema::from_yaml(seedgraph::testing::schemas::BLOG)?);
//! let mut synth = GraphSynthesizer::new(Arc::clone(&schema), SynthesizerConfig::seeded(7));
//! let mut store = Store::new(schema)?;
//!
//! let blog = synth.create(store.graph_mut(), "Blog")?;
//! store.add(blog);
//! let report = store.commit()?;
//!
//! assert!(report.is_consistent());
//! assert_eq!(store.count_of("Post"), 3);
//! # Ok(())
//! # }
//! ```

pub mod testing;

pub use seedgraph_core::{
    EntityDef, FieldDef, FieldKind, GraphError, KeyError, KeyRegistry, KeyTuple, ObjectGraph,
    ObjectId, RelationDef, Schema, SchemaError, Slot, Value, ValueType,
};
pub use seedgraph_generator::{
    CustomizationConfig, Customizations, GraphSynthesizer, SynthesisError, SynthesizerConfig,
};
pub use seedgraph_store::{CommitReport, InvalidRelation, Store, StoreError};

/// Install a `tracing` subscriber filtered by `RUST_LOG`.
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
