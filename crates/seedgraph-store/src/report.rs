//! Commit report types.

use seedgraph_core::{KeyTuple, ObjectId};
use std::time::Duration;

/// A non-nullable foreign key whose target is not held.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidRelation {
    /// Object holding the foreign key.
    pub object: ObjectId,
    /// Entity of the object.
    pub entity: String,
    /// Reference field whose target is missing.
    pub field: String,
    /// Entity the foreign key points at.
    pub target: String,
    /// Foreign-key value that matched nothing.
    pub key: KeyTuple,
}

/// Outcome of a commit.
#[derive(Debug, Clone, Default)]
pub struct CommitReport {
    /// Objects newly added to the held set.
    pub discovered: usize,
    /// Held objects after the commit.
    pub held: usize,
    /// Auto-increment values assigned.
    pub sequence_values: usize,
    /// Navigation links that changed target.
    pub relinked: usize,
    /// Optional foreign keys cleared because their target is gone.
    pub cleared: usize,
    /// Required foreign keys left dangling.
    pub invalid_relations: Vec<InvalidRelation>,
    /// Wall time of the commit.
    pub duration: Duration,
}

impl CommitReport {
    /// Check if every relation of the held set is satisfied.
    pub fn is_consistent(&self) -> bool {
        self.invalid_relations.is_empty()
    }

    /// Get a summary string.
    pub fn summary(&self) -> String {
        format!(
            "{} discovered, {} held, {} relinked, {} cleared, {} invalid in {:?}",
            self.discovered,
            self.held,
            self.relinked,
            self.cleared,
            self.invalid_relations.len(),
            self.duration
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seedgraph_core::{EntityDef, FieldDef, ObjectGraph, Schema, ValueType};
    use std::sync::Arc;

    fn child() -> ObjectId {
        let schema = Schema::new(
            vec![EntityDef::new("Child").with_field(FieldDef::scalar("Id", ValueType::Int32))],
            vec![],
        )
        .unwrap();
        ObjectGraph::new(Arc::new(schema)).allocate("Child").unwrap()
    }

    #[test]
    fn test_consistency_follows_invalid_relations() {
        let mut report = CommitReport::default();
        assert!(report.is_consistent());

        report.invalid_relations.push(InvalidRelation {
            object: child(),
            entity: "Child".to_string(),
            field: "Parent".to_string(),
            target: "Parent".to_string(),
            key: KeyTuple::single(1),
        });
        assert!(!report.is_consistent());
        assert!(report.summary().contains("1 invalid"));
    }
}
