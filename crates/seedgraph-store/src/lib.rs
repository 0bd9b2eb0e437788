//! Relation-consistent in-memory store.
//!
//! Mimics the persistence step of a relational layer without a database:
//! staged objects and everything reachable from them become held on commit,
//! auto-increment fields are filled from per-field sequences, and every
//! foreign key, navigation and collection across the held set is made to
//! agree.
//!
//! # Commit pipeline
//!
//! ```text
//! pending ──▶ discovery ──▶ sequence allocation ──▶ relation resolution
//!                                                          │
//!                 (nothing mutated before this point)      ▼
//!                                   held set ◀── rebinding (Pass A + B)
//! ```
//!
//! Orphaned nullable foreign keys are cleared; orphaned required ones are
//! reported in [`CommitReport::invalid_relations`] and left untouched.

mod discovery;
pub mod error;
mod rebind;
pub mod report;
mod sequence;
pub mod store;

pub use error::StoreError;
pub use report::{CommitReport, InvalidRelation};
pub use store::Store;
