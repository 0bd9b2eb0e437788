//! Shared fixtures for integration tests and doc examples.
//!
//! - [`schemas`] - ready-to-use entity schemas covering the common relation
//!   shapes (one-to-many, self-reference, shared-key 1:1, singletons)
//! - [`consistency`] - checks that foreign keys, navigations and collections
//!   of an object graph agree

pub mod consistency;
pub mod schemas;

pub use consistency::{collection_mismatches, key_mismatches};
pub use schemas::load;
