//! Ancestry chain of objects under construction.

use seedgraph_core::ObjectId;
use std::sync::Arc;

/// Stack of (entity, object) pairs from the synthesis root down to the
/// parent of the object currently being built.
#[derive(Debug, Default)]
pub(crate) struct AncestryChain {
    entries: Vec<(Arc<str>, ObjectId)>,
}

impl AncestryChain {
    pub(crate) fn push(&mut self, entity: Arc<str>, id: ObjectId) {
        self.entries.push((entity, id));
    }

    pub(crate) fn pop(&mut self) {
        self.entries.pop();
    }

    pub(crate) fn depth(&self) -> usize {
        self.entries.len()
    }

    /// Find the most recent ancestor of `entity` among the last `lookback`
    /// entries.
    pub(crate) fn find(&self, entity: &str, lookback: usize) -> Option<ObjectId> {
        self.entries
            .iter()
            .rev()
            .take(lookback)
            .find(|(e, _)| &**e == entity)
            .map(|(_, id)| *id)
    }
}
