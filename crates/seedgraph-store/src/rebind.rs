//! Relation rebinding across the held set.
//!
//! Runs after discovery, once per commit:
//!
//! ```text
//! seed inverse links ──▶ settle identities ──▶ seed collection keys
//!                                                     │
//!        Pass B (collections) ◀── Pass A (references) ◀┘
//! ```
//!
//! Pass A makes every navigation agree with its foreign key and records who
//! points at whom; Pass B rebuilds every collection from that record, so
//! collections always mirror the single-reference side.

use seedgraph_core::{
    FieldKind, KeyError, KeyRegistry, KeyTuple, ObjectGraph, ObjectId, Relation, Slot, Value,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::report::{CommitReport, InvalidRelation};

// ============================================================================
// Resolved relations per entity
// ============================================================================

/// How a single-reference field is keyed.
#[derive(Debug, Clone)]
pub(crate) enum Binding {
    /// The owner holds a foreign key to the target
    Foreign(Arc<Relation>),
    /// Principal side of a shared-key 1:1; the target holds the key
    Principal(Arc<Relation>),
}

#[derive(Debug, Clone)]
pub(crate) struct ReferenceField {
    index: usize,
    name: String,
    binding: Binding,
}

#[derive(Debug, Clone)]
pub(crate) struct CollectionField {
    index: usize,
    element: String,
    /// Index of the element's navigation back to the owner, if any
    back_reference: Option<usize>,
    /// The element's back-reference is keyed, so the collection is derived
    derived: bool,
    /// element -> owner relation for elements without a back-reference
    link: Option<Arc<Relation>>,
}

/// Relations of one entity, resolved before any mutation.
#[derive(Debug, Clone, Default)]
pub(crate) struct EntityRelations {
    references: Vec<ReferenceField>,
    collections: Vec<CollectionField>,
}

impl EntityRelations {
    pub(crate) fn resolve(keys: &mut KeyRegistry, entity: &str) -> Result<Self, KeyError> {
        let schema = Arc::clone(keys.schema());
        let def = schema.require_entity(entity)?;
        let mut relations = Self::default();

        for (index, field) in def.fields.iter().enumerate() {
            match &field.kind {
                FieldKind::Scalar(_) => {}

                FieldKind::Reference(target) => {
                    let binding = match keys.foreign_key(entity, target) {
                        Ok(relation) => Binding::Foreign(relation),
                        Err(err @ KeyError::KeyResolution { .. }) => {
                            match keys.inverse_identity(entity, target)? {
                                Some(relation) => Binding::Principal(relation),
                                None => return Err(err),
                            }
                        }
                        Err(err) => return Err(err),
                    };
                    relations.references.push(ReferenceField {
                        index,
                        name: field.name.clone(),
                        binding,
                    });
                }

                FieldKind::Collection(element) => {
                    let element_def = schema.require_entity(element)?;
                    let back_reference = element_def
                        .reference_fields()
                        .find(|(_, f)| f.related_entity() == Some(entity))
                        .map(|(idx, _)| idx);

                    let relation = match keys.foreign_key(element, entity) {
                        Ok(relation) => Some(relation),
                        Err(KeyError::KeyResolution { .. }) => None,
                        Err(err) => return Err(err),
                    };
                    let derived = back_reference.is_some() && relation.is_some();
                    let link = if back_reference.is_none() { relation } else { None };

                    relations.collections.push(CollectionField {
                        index,
                        element: element.clone(),
                        back_reference,
                        derived,
                        link,
                    });
                }
            }
        }
        Ok(relations)
    }
}

pub(crate) type RelationMap = HashMap<String, Arc<EntityRelations>>;

// ============================================================================
// Rebinding
// ============================================================================

/// Owners pointing at each target, per (owner entity, target entity).
type ReverseIndex = HashMap<(String, String), HashMap<ObjectId, Vec<ObjectId>>>;

/// Primary-key lookup of held objects, per entity.
type KeyIndex = HashMap<String, HashMap<KeyTuple, ObjectId>>;

pub(crate) struct Rebinder<'a> {
    graph: &'a mut ObjectGraph,
    held: &'a [ObjectId],
    held_set: &'a HashSet<ObjectId>,
    fresh: &'a HashSet<ObjectId>,
    relations: &'a RelationMap,
    report: &'a mut CommitReport,
}

impl<'a> Rebinder<'a> {
    pub(crate) fn new(
        graph: &'a mut ObjectGraph,
        held: &'a [ObjectId],
        held_set: &'a HashSet<ObjectId>,
        fresh: &'a HashSet<ObjectId>,
        relations: &'a RelationMap,
        report: &'a mut CommitReport,
    ) -> Self {
        Self {
            graph,
            held,
            held_set,
            fresh,
            relations,
            report,
        }
    }

    pub(crate) fn run(mut self) {
        self.seed_inverse_links();
        self.settle_identities();
        self.seed_collection_keys();
        let index = self.build_key_index();
        let reverse = self.bind_references(&index);
        self.rebuild_collections(&reverse);
    }

    fn relations_of(&self, id: ObjectId) -> Option<(String, Arc<EntityRelations>)> {
        let entity = self.graph.entity_of(id).ok()?;
        let relations = self.relations.get(entity)?;
        Some((entity.to_string(), Arc::clone(relations)))
    }

    fn is_new_pair(&self, owner: ObjectId, linked: ObjectId) -> bool {
        self.held_set.contains(&linked)
            && (self.fresh.contains(&owner) || self.fresh.contains(&linked))
    }

    /// New elements reached through a collection get their unset
    /// back-reference pointed at the owner.
    fn seed_inverse_links(&mut self) {
        for &owner in self.held {
            let Some((_, relations)) = self.relations_of(owner) else {
                continue;
            };
            for field in &relations.collections {
                let Some(back) = field.back_reference else {
                    continue;
                };
                for element in collection_at(self.graph, owner, field.index) {
                    if self.fresh.contains(&element)
                        && self.graph.is_instance(element, &field.element)
                        && matches!(self.graph.slot(element, back), Some(Slot::Reference(None)))
                    {
                        set_reference_at(self.graph, element, back, Some(owner));
                    }
                }
            }
        }
    }

    /// Copy primary keys along shared-key 1:1 relations until nothing
    /// changes, so chains of dependents settle before other keys are copied.
    fn settle_identities(&mut self) {
        for _ in 0..=self.fresh.len() {
            let mut changed = false;
            for &owner in self.held {
                let Some((_, relations)) = self.relations_of(owner) else {
                    continue;
                };
                for field in &relations.references {
                    let Some(linked) = reference_at(self.graph, owner, field.index) else {
                        continue;
                    };
                    if !self.is_new_pair(owner, linked) {
                        continue;
                    }
                    changed |= match &field.binding {
                        Binding::Foreign(relation) if relation.identity => copy_key(
                            self.graph,
                            linked,
                            &relation.target_key.indices,
                            owner,
                            &relation.fk_indices,
                        ),
                        Binding::Principal(relation) => copy_key(
                            self.graph,
                            owner,
                            &relation.target_key.indices,
                            linked,
                            &relation.fk_indices,
                        ),
                        Binding::Foreign(_) => false,
                    };
                }
            }
            if !changed {
                return;
            }
        }
    }

    /// Elements of collections without a back-reference take the owner's
    /// key into their foreign key.
    fn seed_collection_keys(&mut self) {
        for &owner in self.held {
            let Some((_, relations)) = self.relations_of(owner) else {
                continue;
            };
            for field in &relations.collections {
                let Some(relation) = &field.link else {
                    continue;
                };
                for element in collection_at(self.graph, owner, field.index) {
                    if self.is_new_pair(element, owner)
                        && self.graph.is_instance(element, &field.element)
                    {
                        copy_key(
                            self.graph,
                            owner,
                            &relation.target_key.indices,
                            element,
                            &relation.fk_indices,
                        );
                    }
                }
            }
        }
    }

    fn build_key_index(&self) -> KeyIndex {
        let mut wanted: HashMap<&str, &[usize]> = HashMap::new();
        for relations in self.relations.values() {
            for field in &relations.references {
                match &field.binding {
                    Binding::Foreign(relation) => {
                        wanted.insert(&relation.target, &relation.target_key.indices);
                    }
                    Binding::Principal(relation) => {
                        wanted.insert(&relation.source, &relation.fk_indices);
                    }
                }
            }
        }

        let mut index = KeyIndex::new();
        for &id in self.held {
            let Ok(entity) = self.graph.entity_of(id) else {
                continue;
            };
            let Some(indices) = wanted.get(entity) else {
                continue;
            };
            let key = self.graph.key_at(id, indices);
            if key.is_empty() {
                continue;
            }
            // First held object wins on duplicate keys
            index
                .entry(entity.to_string())
                .or_default()
                .entry(key)
                .or_insert(id);
        }
        index
    }

    /// Pass A: make every single reference agree with its key and record the
    /// reverse links.
    fn bind_references(&mut self, index: &KeyIndex) -> ReverseIndex {
        let mut reverse = ReverseIndex::new();

        for &owner in self.held {
            let Some((entity, relations)) = self.relations_of(owner) else {
                continue;
            };
            for field in &relations.references {
                let linked = reference_at(self.graph, owner, field.index);

                let target = match &field.binding {
                    Binding::Foreign(relation) => {
                        self.bind_foreign(owner, &entity, field, relation, linked, index)
                    }
                    Binding::Principal(relation) => match linked {
                        Some(linked) if self.is_new_pair(owner, linked) => Some(linked),
                        _ => {
                            let key = self.graph.key_at(owner, &relation.target_key.indices);
                            lookup(index, &relation.source, &key)
                        }
                    },
                };

                if target != linked {
                    self.report.relinked += 1;
                    set_reference_at(self.graph, owner, field.index, target);
                }

                if let Binding::Foreign(relation) = &field.binding {
                    let owners = reverse
                        .entry((entity.clone(), relation.target.clone()))
                        .or_default();
                    if let Some(target) = target {
                        let list = owners.entry(target).or_default();
                        if list.last() != Some(&owner) {
                            list.push(owner);
                        }
                    }
                }
            }
        }
        reverse
    }

    fn bind_foreign(
        &mut self,
        owner: ObjectId,
        entity: &str,
        field: &ReferenceField,
        relation: &Relation,
        linked: Option<ObjectId>,
        index: &KeyIndex,
    ) -> Option<ObjectId> {
        if let Some(linked) = linked {
            if self.is_new_pair(owner, linked) {
                copy_key(
                    self.graph,
                    linked,
                    &relation.target_key.indices,
                    owner,
                    &relation.fk_indices,
                );
                return Some(linked);
            }
        }

        let key = self.graph.key_at(owner, &relation.fk_indices);
        if let Some(target) = lookup(index, &relation.target, &key) {
            return Some(target);
        }

        // Orphan: the key of a shared-key relation is the owner's identity
        if relation.identity || key.values().iter().all(Value::is_null) {
            return None;
        }
        if relation.optional {
            debug!(
                entity,
                field = %field.name,
                object = %owner,
                key = %key,
                "Cleared orphaned foreign key"
            );
            let nulls = KeyTuple::new(vec![Value::Null; relation.fk_indices.len()]);
            self.graph.set_key_at(owner, &relation.fk_indices, &nulls);
            self.report.cleared += 1;
        } else {
            warn!(
                entity,
                field = %field.name,
                object = %owner,
                key = %key,
                "Required foreign key has no held target"
            );
            self.report.invalid_relations.push(InvalidRelation {
                object: owner,
                entity: entity.to_string(),
                field: field.name.clone(),
                target: relation.target.clone(),
                key,
            });
        }
        None
    }

    /// Pass B: replace each derived collection with exactly the objects
    /// pointing at its owner, in held order.
    fn rebuild_collections(&mut self, reverse: &ReverseIndex) {
        for &owner in self.held {
            let Some((entity, relations)) = self.relations_of(owner) else {
                continue;
            };
            for field in &relations.collections {
                if !field.derived {
                    continue;
                }
                let elements = reverse
                    .get(&(field.element.clone(), entity.clone()))
                    .and_then(|owners| owners.get(&owner))
                    .cloned()
                    .unwrap_or_default();
                if let Some(slot) = self.graph.slot_mut(owner, field.index) {
                    *slot = Slot::Collection(elements);
                }
            }
        }
    }
}

fn lookup(index: &KeyIndex, entity: &str, key: &KeyTuple) -> Option<ObjectId> {
    if key.is_empty() {
        return None;
    }
    index.get(entity).and_then(|keys| keys.get(key)).copied()
}

fn reference_at(graph: &ObjectGraph, id: ObjectId, index: usize) -> Option<ObjectId> {
    match graph.slot(id, index) {
        Some(Slot::Reference(target)) => *target,
        _ => None,
    }
}

fn set_reference_at(graph: &mut ObjectGraph, id: ObjectId, index: usize, target: Option<ObjectId>) {
    if let Some(slot) = graph.slot_mut(id, index) {
        *slot = Slot::Reference(target);
    }
}

fn collection_at(graph: &ObjectGraph, id: ObjectId, index: usize) -> Vec<ObjectId> {
    match graph.slot(id, index) {
        Some(Slot::Collection(items)) => items.clone(),
        _ => Vec::new(),
    }
}

/// Copy the key at `from_indices` of `from` into `to_indices` of `to`.
/// Returns whether anything changed.
fn copy_key(
    graph: &mut ObjectGraph,
    from: ObjectId,
    from_indices: &[usize],
    to: ObjectId,
    to_indices: &[usize],
) -> bool {
    let key = graph.key_at(from, from_indices);
    if graph.key_at(to, to_indices) == key {
        return false;
    }
    graph.set_key_at(to, to_indices, &key);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use seedgraph_core::{EntityDef, FieldDef, RelationDef, Schema, ValueType};

    fn registry(entities: Vec<EntityDef>, relations: Vec<RelationDef>) -> KeyRegistry {
        KeyRegistry::new(Arc::new(Schema::new(entities, relations).unwrap()))
    }

    #[test]
    fn test_collection_with_keyed_back_reference_is_derived() {
        let mut keys = registry(
            vec![
                EntityDef::new("Blog")
                    .with_field(FieldDef::scalar("Id", ValueType::Int32))
                    .with_field(FieldDef::collection("Posts", "Post")),
                EntityDef::new("Post")
                    .with_field(FieldDef::scalar("Id", ValueType::Int32))
                    .with_field(FieldDef::nullable("BlogId", ValueType::Int32))
                    .with_field(FieldDef::reference("Blog", "Blog")),
            ],
            vec![],
        );

        let blog = EntityRelations::resolve(&mut keys, "Blog").unwrap();
        assert!(blog.references.is_empty());
        assert!(blog.collections[0].derived);
        assert_eq!(blog.collections[0].back_reference, Some(2));
        assert!(blog.collections[0].link.is_none());

        let post = EntityRelations::resolve(&mut keys, "Post").unwrap();
        assert!(matches!(post.references[0].binding, Binding::Foreign(_)));
    }

    #[test]
    fn test_collection_without_back_reference_links_keys() {
        let mut keys = registry(
            vec![
                EntityDef::new("Order")
                    .with_field(FieldDef::scalar("Id", ValueType::Int64))
                    .with_field(FieldDef::collection("Lines", "Line")),
                EntityDef::new("Line")
                    .with_field(FieldDef::scalar("Id", ValueType::Int64))
                    .with_field(FieldDef::scalar("OrderId", ValueType::Int64)),
            ],
            vec![],
        );

        let order = EntityRelations::resolve(&mut keys, "Order").unwrap();
        assert!(!order.collections[0].derived);
        assert!(order.collections[0].link.is_some());
    }

    #[test]
    fn test_unresolvable_reference_is_fatal() {
        let mut keys = registry(
            vec![
                EntityDef::new("A")
                    .with_field(FieldDef::scalar("Id", ValueType::Int32))
                    .with_field(FieldDef::reference("B", "B")),
                EntityDef::new("B").with_field(FieldDef::scalar("Id", ValueType::Int32)),
            ],
            vec![],
        );
        assert!(matches!(
            EntityRelations::resolve(&mut keys, "A"),
            Err(KeyError::KeyResolution { .. })
        ));
    }

    #[test]
    fn test_copy_key_reports_change() {
        let schema = Arc::new(
            Schema::new(
                vec![EntityDef::new("A").with_field(FieldDef::scalar("Id", ValueType::Int32))],
                vec![],
            )
            .unwrap(),
        );
        let mut graph = ObjectGraph::new(schema);
        let a = graph.allocate("A").unwrap();
        let b = graph.allocate("A").unwrap();
        graph.set_value(a, "Id", 5).unwrap();

        assert!(copy_key(&mut graph, a, &[0], b, &[0]));
        assert!(!copy_key(&mut graph, a, &[0], b, &[0]));
        assert_eq!(graph.value(b, "Id").unwrap(), &Value::Int32(5));
    }
}
