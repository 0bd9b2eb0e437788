//! Relational object graph synthesizer.
//!
//! This crate provides the [`GraphSynthesizer`], which produces fully wired
//! object graphs from a [`seedgraph_core::Schema`]: every scalar receives a
//! random value, every reference points at a related object, and every
//! foreign key equals the primary key of the object it refers to. A seeded
//! RNG keeps runs reproducible (timestamps excepted, which are anchored on
//! the current time).
//!
//! # Architecture
//!
//! ```text
//! Schema + Customizations + SynthesizerConfig
//!        │
//!        ▼
//! ┌──────────────────────┐      ┌────────────────────┐
//! │   GraphSynthesizer   │─────▶│    KeyRegistry     │
//! │                      │      └────────────────────┘
//! │  - plans (per type)  │      ┌────────────────────┐
//! │  - singletons        │─────▶│  ValueSynthesizer  │
//! │  - rng (StdRng)      │      └────────────────────┘
//! └──────────┬───────────┘
//!            │ create(graph, entity)
//!            ▼
//!      ObjectGraph { records }
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use seedgraph_core::Schema;
//! use seedgraph_generator::{GraphSynthesizer, SynthesizerConfig};
//!
//! let schema = Schema::from_yaml(r#"
//! entities:
//!   - name: Blog
//!     fields:
//!       - name: Id
//!         type: int
//!       - name: Posts
//!         collection: Post
//!   - name: Post
//!     fields:
//!       - name: Id
//!         type: int
//!       - name: BlogId
//!         type: int
//!       - name: Blog
//!         reference: Blog
//! "#).unwrap();
//!
//! let mut synth = GraphSynthesizer::new(Arc::new(schema), SynthesizerConfig::seeded(42));
//! let mut graph = synth.new_graph();
//! let blog = synth.create(&mut graph, "Blog").unwrap();
//!
//! for &post in graph.collection(blog, "Posts").unwrap() {
//!     assert_eq!(graph.value(post, "BlogId").unwrap(), graph.value(blog, "Id").unwrap());
//! }
//! ```
//!
//! # Value generators
//!
//! - `bool` - fair coin
//! - integers - uniform in `1..=MAX` of the width
//! - `float32` / `float64` - uniform in a bounded range
//! - `decimal` - scale 2
//! - `text` - field name followed by a random alphanumeric suffix
//! - `uuid` - random v4 UUID drawn from the RNG
//! - `enum` - uniform pick among the declared members
//! - `date_time` / `date_time_offset` - now plus or minus up to one year
//! - `bytes` - no default; register a custom value factory

mod chain;
pub mod config;
pub mod customize;
pub mod generators;
mod plan;
pub mod synthesizer;
pub mod value_synthesizer;

// Re-exports for convenience
pub use config::SynthesizerConfig;
pub use customize::{
    ConstructorFn, CustomizationConfig, Customizations, EntityOptions, FieldOptions, PostCreateFn,
};
pub use generators::ValueCreator;
pub use synthesizer::{CreateMany, GraphSynthesizer, SynthesisError};
pub use value_synthesizer::ValueSynthesizer;
