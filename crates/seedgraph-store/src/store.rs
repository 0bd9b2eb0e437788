//! The relation-consistent object store.

use seedgraph_core::{KeyRegistry, KeyTuple, ObjectGraph, ObjectId, Schema};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::discovery::discover;
use crate::error::StoreError;
use crate::rebind::{EntityRelations, Rebinder, RelationMap};
use crate::report::CommitReport;
use crate::sequence::Sequences;

/// In-memory store mimicking a relational persistence layer.
///
/// Objects live in the store's own [`ObjectGraph`]. They are staged with
/// [`Store::add`] and become held on [`Store::commit`], which discovers
/// everything reachable from them, assigns auto-increment keys and rebinds
/// every foreign-key/navigation pair across the held set.
#[derive(Debug)]
pub struct Store {
    graph: ObjectGraph,
    keys: KeyRegistry,
    sequences: Sequences,
    relations: HashMap<String, Arc<EntityRelations>>,
    held: Vec<ObjectId>,
    held_set: HashSet<ObjectId>,
    pending: Vec<ObjectId>,
    /// Removed objects; discovery never reaches them again
    removed: HashSet<ObjectId>,
}

impl Store {
    /// Create an empty store for a schema.
    pub fn new(schema: Arc<Schema>) -> Result<Self, StoreError> {
        Self::from_graph(ObjectGraph::new(schema))
    }

    /// Create a store over an existing arena. Nothing in it is held until
    /// added and committed.
    pub fn from_graph(graph: ObjectGraph) -> Result<Self, StoreError> {
        let schema = Arc::clone(graph.schema());
        Ok(Self {
            sequences: Sequences::from_schema(&schema)?,
            keys: KeyRegistry::new(schema),
            graph,
            relations: HashMap::new(),
            held: Vec::new(),
            held_set: HashSet::new(),
            pending: Vec::new(),
            removed: HashSet::new(),
        })
    }

    /// The arena holding the store's objects.
    pub fn graph(&self) -> &ObjectGraph {
        &self.graph
    }

    /// Mutable access to the arena, e.g. to synthesize objects into it.
    pub fn graph_mut(&mut self) -> &mut ObjectGraph {
        &mut self.graph
    }

    /// The schema of the store.
    pub fn schema(&self) -> &Arc<Schema> {
        self.graph.schema()
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Override the primary key of an entity.
    pub fn register_primary_key<I, S>(&mut self, entity: &str, fields: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relations.clear();
        Ok(self.keys.register_primary_key(entity, fields)?)
    }

    /// Override the foreign key from `source` to `target`.
    pub fn register_foreign_key<I, S>(
        &mut self,
        source: &str,
        target: &str,
        fields: I,
    ) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relations.clear();
        Ok(self.keys.register_foreign_key(source, target, fields)?)
    }

    /// Assign `field` from a per-field sequence to every newly discovered
    /// instance of `entity`.
    pub fn register_auto_increment(&mut self, entity: &str, field: &str) -> Result<(), StoreError> {
        let def = self.graph.schema().require_entity(entity)?;
        Ok(self.sequences.register(def, field)?)
    }

    /// Last auto-increment value handed out for a field, 0 if none.
    pub fn sequence_value(&self, entity: &str, field: &str) -> u64 {
        self.sequences.current(entity, field)
    }

    // =========================================================================
    // Staging
    // =========================================================================

    /// Stage an object for the next commit. Staging a removed object
    /// makes it reachable again.
    pub fn add(&mut self, id: ObjectId) {
        self.removed.remove(&id);
        self.pending.push(id);
    }

    /// Stage an object after checking that no held or pending object of
    /// the same entity has the same primary key.
    ///
    /// Objects whose key is still empty (unassigned) are never duplicates.
    pub fn insert(&mut self, id: ObjectId) -> Result<(), StoreError> {
        let entity = self.graph.entity_of(id)?.to_string();
        let primary_key = self.keys.primary_key(&entity)?;
        let key = self.graph.key(id, &primary_key);

        if !key.is_empty() {
            let clash = self.held.iter().chain(&self.pending).any(|&other| {
                other != id
                    && self.graph.is_instance(other, &entity)
                    && self.graph.key(other, &primary_key) == key
            });
            if clash {
                return Err(StoreError::DuplicateKey { entity, key });
            }
        }

        self.removed.remove(&id);
        self.pending.push(id);
        Ok(())
    }

    /// Remove every held or pending instance of `entity` whose primary key
    /// equals `key`. Returns whether anything was removed.
    ///
    /// Removed objects stay in the arena, and links to them are left as they
    /// are. Later commits do not rediscover them through those links, so
    /// foreign keys pointing at them are treated as orphans.
    pub fn remove(&mut self, entity: &str, key: &KeyTuple) -> Result<bool, StoreError> {
        let primary_key = self.keys.primary_key(entity)?;
        let matched: HashSet<ObjectId> = self
            .held
            .iter()
            .chain(&self.pending)
            .copied()
            .filter(|&id| {
                self.graph.is_instance(id, entity) && self.graph.key(id, &primary_key) == *key
            })
            .collect();
        if matched.is_empty() {
            return Ok(false);
        }

        self.held.retain(|id| !matched.contains(id));
        self.held_set.retain(|id| !matched.contains(id));
        self.pending.retain(|id| !matched.contains(id));
        debug!(entity, key = %key, removed = matched.len(), "Removed objects");
        self.removed.extend(matched);
        Ok(true)
    }

    // =========================================================================
    // Queries over the held set
    // =========================================================================

    /// Find a held instance of `entity` by primary key.
    pub fn get(&mut self, entity: &str, key: &KeyTuple) -> Result<Option<ObjectId>, StoreError> {
        let primary_key = self.keys.primary_key(entity)?;
        Ok(self
            .held
            .iter()
            .copied()
            .find(|&id| self.graph.is_instance(id, entity) && self.graph.key(id, &primary_key) == *key))
    }

    /// Number of held objects.
    pub fn count(&self) -> usize {
        self.held.len()
    }

    /// Number of held instances of `entity`.
    pub fn count_of(&self, entity: &str) -> usize {
        self.enumerate(entity).count()
    }

    /// Held instances of `entity` in the order they became held.
    pub fn enumerate<'a>(&'a self, entity: &'a str) -> impl Iterator<Item = ObjectId> + 'a {
        self.held
            .iter()
            .copied()
            .filter(move |&id| self.graph.is_instance(id, entity))
    }

    /// Check whether an object is held.
    pub fn is_held(&self, id: ObjectId) -> bool {
        self.held_set.contains(&id)
    }

    /// Number of objects awaiting a commit.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    // =========================================================================
    // Commit
    // =========================================================================

    /// Merge pending objects and everything reachable from them into the
    /// held set, then rebind all relations of the held set.
    ///
    /// Every relation is resolved before anything is mutated: on error the
    /// held set, the pending set and the sequences are left untouched.
    pub fn commit(&mut self) -> Result<CommitReport, StoreError> {
        let start = Instant::now();

        let discovered = discover(&self.graph, &self.held_set, &self.removed, &self.pending)?;
        let allocation = self.sequences.allocate(&self.graph, &discovered)?;

        let mut entities = BTreeSet::new();
        for &id in self.held.iter().chain(&discovered) {
            entities.insert(self.graph.entity_of(id)?.to_string());
        }
        let relations = self.resolve_relations(&entities)?;

        // Nothing below can fail
        let mut report = CommitReport {
            discovered: discovered.len(),
            sequence_values: allocation.len(),
            ..Default::default()
        };
        self.sequences.apply(&mut self.graph, allocation);
        self.held_set.extend(discovered.iter().copied());
        self.held.extend(discovered.iter().copied());
        let fresh: HashSet<ObjectId> = discovered.into_iter().collect();

        Rebinder::new(
            &mut self.graph,
            &self.held,
            &self.held_set,
            &fresh,
            &relations,
            &mut report,
        )
        .run();

        self.pending.clear();
        report.held = self.held.len();
        report.duration = start.elapsed();

        info!(
            discovered = report.discovered,
            held = report.held,
            relinked = report.relinked,
            cleared = report.cleared,
            invalid = report.invalid_relations.len(),
            "Commit complete"
        );
        Ok(report)
    }

    fn resolve_relations(&mut self, entities: &BTreeSet<String>) -> Result<RelationMap, StoreError> {
        let mut resolved = RelationMap::new();
        for entity in entities {
            let relations = match self.relations.get(entity) {
                Some(cached) => Arc::clone(cached),
                None => {
                    let relations = Arc::new(EntityRelations::resolve(&mut self.keys, entity)?);
                    self.relations.insert(entity.clone(), Arc::clone(&relations));
                    relations
                }
            };
            resolved.insert(entity.clone(), relations);
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seedgraph_core::{EntityDef, FieldDef, RelationDef, Value, ValueType};

    fn family_schema(nullable_fk: bool) -> Arc<Schema> {
        let parent_id = if nullable_fk {
            FieldDef::nullable("ParentId", ValueType::Int32)
        } else {
            FieldDef::scalar("ParentId", ValueType::Int32)
        };
        Arc::new(
            Schema::new(
                vec![
                    EntityDef::new("Parent")
                        .with_field(FieldDef::scalar("Id", ValueType::Int32))
                        .with_field(FieldDef::collection("Children", "Child")),
                    EntityDef::new("Child")
                        .with_field(FieldDef::scalar("Id", ValueType::Int32))
                        .with_field(parent_id)
                        .with_field(FieldDef::reference("Parent", "Parent")),
                ],
                vec![],
            )
            .unwrap(),
        )
    }

    fn object(store: &mut Store, entity: &str, id: i32) -> ObjectId {
        let graph = store.graph_mut();
        let object = graph.allocate(entity).unwrap();
        graph.set_value(object, "Id", id).unwrap();
        object
    }

    #[test]
    fn test_commit_discovers_reachable_objects() {
        let mut store = Store::new(family_schema(true)).unwrap();
        let parent = object(&mut store, "Parent", 1);
        let child = object(&mut store, "Child", 2);
        store
            .graph_mut()
            .set_reference(child, "Parent", Some(parent))
            .unwrap();

        store.add(child);
        assert_eq!(store.count(), 0);
        let report = store.commit().unwrap();

        assert_eq!(report.discovered, 2);
        assert_eq!(store.count(), 2);
        assert_eq!(store.count_of("Child"), 1);
        assert_eq!(store.pending_count(), 0);
        assert!(store.is_held(parent));

        let graph = store.graph();
        assert_eq!(graph.value(child, "ParentId").unwrap(), &Value::Int32(1));
        assert_eq!(graph.collection(parent, "Children").unwrap(), &[child]);
    }

    #[test]
    fn test_foreign_key_binds_navigation() {
        let mut store = Store::new(family_schema(true)).unwrap();
        let parent = object(&mut store, "Parent", 1);
        store.add(parent);
        store.commit().unwrap();

        let child = object(&mut store, "Child", 2);
        store.graph_mut().set_value(child, "ParentId", 1).unwrap();
        store.add(child);
        let report = store.commit().unwrap();

        assert_eq!(report.relinked, 1);
        assert_eq!(store.graph().reference(child, "Parent").unwrap(), Some(parent));
        assert_eq!(store.graph().collection(parent, "Children").unwrap(), &[child]);
    }

    #[test]
    fn test_orphan_cleared_when_nullable() {
        let mut store = Store::new(family_schema(true)).unwrap();
        let parent = object(&mut store, "Parent", 1);
        let child = object(&mut store, "Child", 2);
        store.graph_mut().set_value(child, "ParentId", 1).unwrap();
        store.add(parent);
        store.add(child);
        store.commit().unwrap();
        assert_eq!(store.graph().reference(child, "Parent").unwrap(), Some(parent));

        assert!(store.remove("Parent", &KeyTuple::single(1)).unwrap());
        let report = store.commit().unwrap();

        assert_eq!(report.cleared, 1);
        assert!(report.is_consistent());
        assert_eq!(store.graph().value(child, "ParentId").unwrap(), &Value::Null);
        assert_eq!(store.graph().reference(child, "Parent").unwrap(), None);
    }

    #[test]
    fn test_removed_object_not_rediscovered_from_neighbour() {
        let mut store = Store::new(family_schema(true)).unwrap();
        store.register_auto_increment("Parent", "Id").unwrap();
        let parent = store.graph_mut().allocate("Parent").unwrap();
        let child = object(&mut store, "Child", 2);
        store
            .graph_mut()
            .set_reference(child, "Parent", Some(parent))
            .unwrap();
        store.add(child);
        store.commit().unwrap();
        assert_eq!(store.graph().value(child, "ParentId").unwrap(), &Value::Int32(1));

        assert!(store.remove("Parent", &KeyTuple::single(1)).unwrap());
        store.add(child);
        let report = store.commit().unwrap();

        assert_eq!(report.discovered, 0);
        assert_eq!(report.cleared, 1);
        assert!(!store.is_held(parent));
        assert_eq!(store.sequence_value("Parent", "Id"), 1);
        assert_eq!(store.graph().value(parent, "Id").unwrap(), &Value::Int32(1));
        assert_eq!(store.graph().value(child, "ParentId").unwrap(), &Value::Null);
        assert_eq!(store.graph().reference(child, "Parent").unwrap(), None);

        // Staging the removed object again brings it back as a new object
        store.add(parent);
        let report = store.commit().unwrap();
        assert_eq!(report.discovered, 1);
        assert!(store.is_held(parent));
        assert_eq!(store.graph().value(parent, "Id").unwrap(), &Value::Int32(2));
        assert!(store.graph().collection(parent, "Children").unwrap().is_empty());
    }

    #[test]
    fn test_orphan_reported_when_required() {
        let mut store = Store::new(family_schema(false)).unwrap();
        let parent = object(&mut store, "Parent", 1);
        let child = object(&mut store, "Child", 2);
        store.graph_mut().set_value(child, "ParentId", 1).unwrap();
        store.add(parent);
        store.add(child);
        store.commit().unwrap();

        store.remove("Parent", &KeyTuple::single(1)).unwrap();
        let report = store.commit().unwrap();

        assert_eq!(report.invalid_relations.len(), 1);
        let invalid = &report.invalid_relations[0];
        assert_eq!(invalid.object, child);
        assert_eq!(invalid.field, "Parent");
        assert_eq!(invalid.key, KeyTuple::single(1));
        assert_eq!(store.graph().value(child, "ParentId").unwrap(), &Value::Int32(1));
    }

    #[test]
    fn test_insert_rejects_duplicate_key() {
        let mut store = Store::new(family_schema(true)).unwrap();
        let first = object(&mut store, "Parent", 7);
        let second = object(&mut store, "Parent", 7);
        let unassigned = object(&mut store, "Parent", 0);
        let also_unassigned = object(&mut store, "Parent", 0);

        store.insert(first).unwrap();
        assert!(matches!(
            store.insert(second),
            Err(StoreError::DuplicateKey { ref entity, .. }) if entity == "Parent"
        ));
        store.insert(unassigned).unwrap();
        store.insert(also_unassigned).unwrap();
        assert_eq!(store.pending_count(), 3);

        store.commit().unwrap();
        // Held duplicates are checked too
        assert!(store.insert(second).is_err());
    }

    #[test]
    fn test_remove_get_and_enumerate() {
        let mut store = Store::new(family_schema(true)).unwrap();
        let a = object(&mut store, "Parent", 1);
        let b = object(&mut store, "Parent", 2);
        store.add(a);
        store.add(b);
        store.commit().unwrap();

        assert_eq!(store.get("Parent", &KeyTuple::single(2)).unwrap(), Some(b));
        assert_eq!(store.enumerate("Parent").collect::<Vec<_>>(), vec![a, b]);

        assert!(store.remove("Parent", &KeyTuple::single(1)).unwrap());
        assert!(!store.remove("Parent", &KeyTuple::single(1)).unwrap());
        assert_eq!(store.get("Parent", &KeyTuple::single(1)).unwrap(), None);
        assert_eq!(store.count(), 1);
        assert!(!store.is_held(a));
    }

    #[test]
    fn test_auto_increment_assigned_once() {
        let schema = Arc::new(
            Schema::new(
                vec![
                    EntityDef::new("Blog")
                        .with_field(FieldDef::scalar("Id", ValueType::Int64))
                        .with_field(FieldDef::collection("Posts", "Post"))
                        .with_auto_increment("Id"),
                    EntityDef::new("Post")
                        .with_field(FieldDef::scalar("Id", ValueType::Int64))
                        .with_field(FieldDef::scalar("BlogId", ValueType::Int64))
                        .with_field(FieldDef::reference("Blog", "Blog")),
                ],
                vec![],
            )
            .unwrap(),
        );
        let mut store = Store::new(schema).unwrap();
        store.register_auto_increment("Post", "Id").unwrap();

        let graph = store.graph_mut();
        let blog = graph.allocate("Blog").unwrap();
        let first = graph.allocate("Post").unwrap();
        let second = graph.allocate("Post").unwrap();
        graph.push_to_collection(blog, "Posts", first).unwrap();
        graph.push_to_collection(blog, "Posts", second).unwrap();

        store.add(blog);
        let report = store.commit().unwrap();
        assert_eq!(report.sequence_values, 3);

        let graph = store.graph();
        assert_eq!(graph.value(blog, "Id").unwrap(), &Value::Int64(1));
        assert_eq!(graph.value(second, "Id").unwrap(), &Value::Int64(2));
        // Back-references seeded from the collection, keys copied from the new blog
        assert_eq!(graph.reference(first, "Blog").unwrap(), Some(blog));
        assert_eq!(graph.value(first, "BlogId").unwrap(), &Value::Int64(1));
        assert_eq!(graph.collection(blog, "Posts").unwrap(), &[first, second]);

        store.add(blog);
        let report = store.commit().unwrap();
        assert_eq!(report.discovered, 0);
        assert_eq!(store.sequence_value("Post", "Id"), 2);
    }

    #[test]
    fn test_failed_commit_leaves_state_untouched() {
        let schema = Arc::new(
            Schema::new(
                vec![
                    EntityDef::new("A")
                        .with_field(FieldDef::scalar("Id", ValueType::Int32))
                        .with_field(FieldDef::reference("B", "B"))
                        .with_auto_increment("Id"),
                    EntityDef::new("B").with_field(FieldDef::scalar("Id", ValueType::Int32)),
                ],
                vec![],
            )
            .unwrap(),
        );
        let mut store = Store::new(schema).unwrap();
        let a = store.graph_mut().allocate("A").unwrap();
        store.add(a);

        assert!(matches!(store.commit(), Err(StoreError::Key(_))));
        assert_eq!(store.count(), 0);
        assert_eq!(store.pending_count(), 1);
        assert_eq!(store.sequence_value("A", "Id"), 0);
        assert_eq!(store.graph().value(a, "Id").unwrap(), &Value::Int32(0));
    }

    #[test]
    fn test_identity_relation_keeps_key_when_orphaned() {
        let schema = Arc::new(
            Schema::new(
                vec![
                    EntityDef::new("User").with_field(FieldDef::scalar("Id", ValueType::Int32)),
                    EntityDef::new("Profile")
                        .with_field(FieldDef::scalar("Id", ValueType::Int32))
                        .with_field(FieldDef::reference("User", "User")),
                ],
                vec![RelationDef::new("Profile", "User", ["Id"])],
            )
            .unwrap(),
        );
        let mut store = Store::new(schema).unwrap();
        let user = object(&mut store, "User", 3);
        let profile = store.graph_mut().allocate("Profile").unwrap();
        store
            .graph_mut()
            .set_reference(profile, "User", Some(user))
            .unwrap();
        store.add(profile);
        store.commit().unwrap();
        assert_eq!(store.graph().value(profile, "Id").unwrap(), &Value::Int32(3));

        store.remove("User", &KeyTuple::single(3)).unwrap();
        let report = store.commit().unwrap();
        assert_eq!(report.cleared, 0);
        assert_eq!(store.graph().reference(profile, "User").unwrap(), None);
        assert_eq!(store.graph().value(profile, "Id").unwrap(), &Value::Int32(3));
    }
}
