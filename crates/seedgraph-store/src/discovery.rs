//! Discovery of objects newly reachable from the pending set.

use seedgraph_core::{GraphError, ObjectGraph, ObjectId};
use std::collections::HashSet;

/// Depth-first traversal from every pending object through references and
/// collections, each object visited once by identity.
///
/// Returns the objects not yet held, in visiting order. Held objects are
/// traversed through but never returned. Removed objects are neither
/// returned nor traversed.
pub(crate) fn discover(
    graph: &ObjectGraph,
    held: &HashSet<ObjectId>,
    removed: &HashSet<ObjectId>,
    pending: &[ObjectId],
) -> Result<Vec<ObjectId>, GraphError> {
    let mut visited = HashSet::new();
    let mut discovered = Vec::new();
    let mut stack = Vec::new();

    for &root in pending {
        stack.push(root);
        while let Some(id) = stack.pop() {
            if removed.contains(&id) || !visited.insert(id) {
                continue;
            }
            graph.record(id)?;
            if !held.contains(&id) {
                discovered.push(id);
            }
            // Reverse so neighbours are visited in field order
            stack.extend(graph.neighbours(id).into_iter().rev());
        }
    }

    Ok(discovered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use seedgraph_core::{EntityDef, FieldDef, Schema, ValueType};
    use std::sync::Arc;

    fn graph() -> ObjectGraph {
        let schema = Schema::new(
            vec![EntityDef::new("Node")
                .with_field(FieldDef::scalar("Id", ValueType::Int32))
                .with_field(FieldDef::reference("Next", "Node"))
                .with_field(FieldDef::collection("Children", "Node"))],
            vec![],
        )
        .unwrap();
        ObjectGraph::new(Arc::new(schema))
    }

    #[test]
    fn test_visits_each_object_once() {
        let mut graph = graph();
        let a = graph.allocate("Node").unwrap();
        let b = graph.allocate("Node").unwrap();
        let c = graph.allocate("Node").unwrap();
        graph.set_reference(a, "Next", Some(b)).unwrap();
        graph.set_reference(b, "Next", Some(a)).unwrap();
        graph.push_to_collection(a, "Children", c).unwrap();
        graph.push_to_collection(b, "Children", c).unwrap();

        let found = discover(&graph, &HashSet::new(), &HashSet::new(), &[a, a]).unwrap();
        assert_eq!(found, vec![a, b, c]);
    }

    #[test]
    fn test_held_objects_are_traversed_not_returned() {
        let mut graph = graph();
        let a = graph.allocate("Node").unwrap();
        let b = graph.allocate("Node").unwrap();
        let c = graph.allocate("Node").unwrap();
        graph.set_reference(a, "Next", Some(b)).unwrap();
        graph.set_reference(b, "Next", Some(c)).unwrap();

        let held: HashSet<ObjectId> = [b].into_iter().collect();
        assert_eq!(discover(&graph, &held, &HashSet::new(), &[a]).unwrap(), vec![a, c]);
    }

    #[test]
    fn test_removed_objects_are_not_traversed() {
        let mut graph = graph();
        let a = graph.allocate("Node").unwrap();
        let b = graph.allocate("Node").unwrap();
        let c = graph.allocate("Node").unwrap();
        graph.set_reference(a, "Next", Some(b)).unwrap();
        graph.set_reference(b, "Next", Some(c)).unwrap();

        let removed: HashSet<ObjectId> = [b].into_iter().collect();
        assert_eq!(discover(&graph, &HashSet::new(), &removed, &[a]).unwrap(), vec![a]);
    }

    #[test]
    fn test_unknown_object() {
        let graph = graph();
        let mut other = self::graph();
        let stray = other.allocate("Node").unwrap();

        assert!(matches!(
            discover(&graph, &HashSet::new(), &HashSet::new(), &[stray]),
            Err(GraphError::UnknownObject(_))
        ));
    }
}
