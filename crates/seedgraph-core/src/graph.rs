//! Object arena holding entity instances.
//!
//! Every instance lives in an [`ObjectGraph`] and is addressed by an
//! [`ObjectId`]. Navigation fields store ids, so reference identity is id
//! equality and cyclic graphs need no shared ownership.
//!
//! Field access goes through the per-entity field table of the schema,
//! either by name (`value`, `set_value`, `reference`, ...) or by field
//! position (`slot`, `slot_mut`) for callers that resolved positions once.

use crate::key::KeyTuple;
use crate::relations::KeyFields;
use crate::schema::{FieldDef, FieldKind, Schema, SchemaError};
use crate::values::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(1);

/// Error type for object access.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Id does not belong to this graph
    #[error("Object {0} does not exist in this graph")]
    UnknownObject(ObjectId),

    /// Reference target has the wrong entity
    #[error("Field '{field}' expects '{expected}' but object {target} is '{actual}'")]
    WrongTarget {
        field: String,
        expected: String,
        actual: String,
        target: ObjectId,
    },

    /// Schema lookup or validation error
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Handle of an object inside an [`ObjectGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(usize);

impl ObjectId {
    /// Position of the object in its arena.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Process-unique identity of an [`ObjectGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphId(u64);

/// Storage of one field of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    /// Scalar value
    Value(Value),
    /// Single navigation link
    Reference(Option<ObjectId>),
    /// Collection of navigation links
    Collection(Vec<ObjectId>),
}

impl Slot {
    fn initial(field: &FieldDef) -> Self {
        match &field.kind {
            FieldKind::Scalar(_) if field.nullable => Self::Value(Value::Null),
            FieldKind::Scalar(ty) => Self::Value(Value::default_for(ty)),
            FieldKind::Reference(_) => Self::Reference(None),
            FieldKind::Collection(_) => Self::Collection(Vec::new()),
        }
    }
}

/// One entity instance.
#[derive(Debug, Clone)]
pub struct Record {
    entity: String,
    slots: Vec<Slot>,
}

impl Record {
    /// Entity name of the instance.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Field storage in schema field order.
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }
}

/// Arena of entity instances sharing one schema.
#[derive(Debug, Clone)]
pub struct ObjectGraph {
    id: GraphId,
    schema: Arc<Schema>,
    records: Vec<Record>,
}

impl ObjectGraph {
    /// Create an empty graph for the given schema.
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            id: GraphId(NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed)),
            schema,
            records: Vec::new(),
        }
    }

    /// Identity of this graph.
    pub fn id(&self) -> GraphId {
        self.id
    }

    /// The schema of every record in this graph.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Number of allocated objects.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if no object was allocated yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over all object ids in allocation order.
    pub fn ids(&self) -> impl Iterator<Item = ObjectId> {
        (0..self.records.len()).map(ObjectId)
    }

    /// Allocate a zero-initialised instance of an entity.
    pub fn allocate(&mut self, entity: &str) -> Result<ObjectId, GraphError> {
        let def = self.schema.require_entity(entity)?;
        let slots = def.fields.iter().map(Slot::initial).collect();
        let id = ObjectId(self.records.len());
        self.records.push(Record {
            entity: def.name.clone(),
            slots,
        });
        Ok(id)
    }

    /// Get a record.
    pub fn record(&self, id: ObjectId) -> Result<&Record, GraphError> {
        self.records.get(id.0).ok_or(GraphError::UnknownObject(id))
    }

    /// Entity name of an object.
    pub fn entity_of(&self, id: ObjectId) -> Result<&str, GraphError> {
        self.record(id).map(Record::entity)
    }

    /// Check whether an object is an instance of `entity`.
    pub fn is_instance(&self, id: ObjectId, entity: &str) -> bool {
        self.records.get(id.0).is_some_and(|r| r.entity == entity)
    }

    /// Field storage by position.
    pub fn slot(&self, id: ObjectId, index: usize) -> Option<&Slot> {
        self.records.get(id.0).and_then(|r| r.slots.get(index))
    }

    /// Mutable field storage by position.
    pub fn slot_mut(&mut self, id: ObjectId, index: usize) -> Option<&mut Slot> {
        self.records.get_mut(id.0).and_then(|r| r.slots.get_mut(index))
    }

    fn locate(&self, id: ObjectId, field: &str) -> Result<(usize, &FieldDef), GraphError> {
        let entity = self.entity_of(id)?;
        let def = self.schema.require_entity(entity)?;
        Ok(def.require_field(field)?)
    }

    fn kind_mismatch(&self, id: ObjectId, field: &str, expected: &'static str) -> GraphError {
        GraphError::Schema(SchemaError::FieldKindMismatch {
            entity: self.entity_of(id).unwrap_or_default().to_string(),
            field: field.to_string(),
            expected,
        })
    }

    /// Get a scalar field value.
    pub fn value(&self, id: ObjectId, field: &str) -> Result<&Value, GraphError> {
        let (idx, _) = self.locate(id, field)?;
        match self.slot(id, idx) {
            Some(Slot::Value(value)) => Ok(value),
            _ => Err(self.kind_mismatch(id, field, "scalar")),
        }
    }

    /// Set a scalar field value, checking it fits the declared type.
    pub fn set_value(
        &mut self,
        id: ObjectId,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<(), GraphError> {
        let value = value.into();
        let (idx, def) = self.locate(id, field)?;
        let fits = match &def.kind {
            FieldKind::Scalar(ty) => value.conforms_to(ty, def.nullable),
            _ => return Err(self.kind_mismatch(id, field, "scalar")),
        };
        if !fits {
            return Err(GraphError::Schema(SchemaError::ValueMismatch {
                entity: self.entity_of(id)?.to_string(),
                field: field.to_string(),
                value: value.to_string(),
            }));
        }
        if let Some(slot) = self.slot_mut(id, idx) {
            *slot = Slot::Value(value);
        }
        Ok(())
    }

    /// Get a single-reference field.
    pub fn reference(&self, id: ObjectId, field: &str) -> Result<Option<ObjectId>, GraphError> {
        let (idx, _) = self.locate(id, field)?;
        match self.slot(id, idx) {
            Some(Slot::Reference(target)) => Ok(*target),
            _ => Err(self.kind_mismatch(id, field, "reference")),
        }
    }

    /// Set a single-reference field.
    pub fn set_reference(
        &mut self,
        id: ObjectId,
        field: &str,
        target: Option<ObjectId>,
    ) -> Result<(), GraphError> {
        let (idx, def) = self.locate(id, field)?;
        let expected = match &def.kind {
            FieldKind::Reference(entity) => entity.clone(),
            _ => return Err(self.kind_mismatch(id, field, "reference")),
        };
        if let Some(target) = target {
            self.check_target(field, &expected, target)?;
        }
        if let Some(slot) = self.slot_mut(id, idx) {
            *slot = Slot::Reference(target);
        }
        Ok(())
    }

    /// Get a collection field.
    pub fn collection(&self, id: ObjectId, field: &str) -> Result<&[ObjectId], GraphError> {
        let (idx, _) = self.locate(id, field)?;
        match self.slot(id, idx) {
            Some(Slot::Collection(items)) => Ok(items),
            _ => Err(self.kind_mismatch(id, field, "collection")),
        }
    }

    /// Append an object to a collection field.
    pub fn push_to_collection(
        &mut self,
        id: ObjectId,
        field: &str,
        target: ObjectId,
    ) -> Result<(), GraphError> {
        let (idx, def) = self.locate(id, field)?;
        let expected = match &def.kind {
            FieldKind::Collection(entity) => entity.clone(),
            _ => return Err(self.kind_mismatch(id, field, "collection")),
        };
        self.check_target(field, &expected, target)?;
        if let Some(Slot::Collection(items)) = self.slot_mut(id, idx) {
            items.push(target);
        }
        Ok(())
    }

    fn check_target(&self, field: &str, expected: &str, target: ObjectId) -> Result<(), GraphError> {
        let actual = self.entity_of(target)?;
        if actual != expected {
            return Err(GraphError::WrongTarget {
                field: field.to_string(),
                expected: expected.to_string(),
                actual: actual.to_string(),
                target,
            });
        }
        Ok(())
    }

    /// Read the values at the given field positions as a key tuple.
    pub fn key_at(&self, id: ObjectId, indices: &[usize]) -> KeyTuple {
        indices
            .iter()
            .map(|&idx| match self.slot(id, idx) {
                Some(Slot::Value(value)) => value.clone(),
                _ => Value::Null,
            })
            .collect::<Vec<_>>()
            .into()
    }

    /// Read the primary key of an object.
    pub fn key(&self, id: ObjectId, key: &KeyFields) -> KeyTuple {
        self.key_at(id, &key.indices)
    }

    /// Write a key tuple into the given field positions.
    pub fn set_key_at(&mut self, id: ObjectId, indices: &[usize], key: &KeyTuple) {
        for (&idx, value) in indices.iter().zip(key.values()) {
            if let Some(slot) = self.slot_mut(id, idx) {
                if matches!(slot, Slot::Value(_)) {
                    *slot = Slot::Value(value.clone());
                }
            }
        }
    }

    /// Objects directly linked from an object through references and
    /// collections, in field order.
    pub fn neighbours(&self, id: ObjectId) -> Vec<ObjectId> {
        let Some(record) = self.records.get(id.0) else {
            return Vec::new();
        };
        record
            .slots
            .iter()
            .flat_map(|slot| match slot {
                Slot::Reference(Some(target)) => vec![*target],
                Slot::Collection(items) => items.clone(),
                _ => Vec::new(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::EntityDef;
    use crate::types::ValueType;

    fn graph() -> ObjectGraph {
        let entities = vec![
            EntityDef::new("Blog")
                .with_field(FieldDef::scalar("Id", ValueType::Int32))
                .with_field(FieldDef::nullable("Title", ValueType::Text))
                .with_field(FieldDef::collection("Posts", "Post")),
            EntityDef::new("Post")
                .with_field(FieldDef::scalar("Id", ValueType::Int32))
                .with_field(FieldDef::reference("Blog", "Blog")),
        ];
        ObjectGraph::new(Arc::new(Schema::new(entities, vec![]).unwrap()))
    }

    #[test]
    fn test_allocate_zero_initialises() {
        let mut graph = graph();
        let blog = graph.allocate("Blog").unwrap();
        assert_eq!(graph.value(blog, "Id").unwrap(), &Value::Int32(0));
        assert_eq!(graph.value(blog, "Title").unwrap(), &Value::Null);
        assert!(graph.collection(blog, "Posts").unwrap().is_empty());
        assert_eq!(graph.entity_of(blog).unwrap(), "Blog");
    }

    #[test]
    fn test_set_value_checks_type() {
        let mut graph = graph();
        let blog = graph.allocate("Blog").unwrap();
        graph.set_value(blog, "Id", 7).unwrap();
        assert_eq!(graph.value(blog, "Id").unwrap(), &Value::Int32(7));
        assert!(graph.set_value(blog, "Id", "seven").is_err());
        assert!(graph.set_value(blog, "Id", Value::Null).is_err());
        assert!(graph.set_value(blog, "Posts", 1).is_err());
    }

    #[test]
    fn test_references_and_collections() {
        let mut graph = graph();
        let blog = graph.allocate("Blog").unwrap();
        let post = graph.allocate("Post").unwrap();

        graph.set_reference(post, "Blog", Some(blog)).unwrap();
        graph.push_to_collection(blog, "Posts", post).unwrap();

        assert_eq!(graph.reference(post, "Blog").unwrap(), Some(blog));
        assert_eq!(graph.collection(blog, "Posts").unwrap(), &[post]);
        assert_eq!(graph.neighbours(blog), vec![post]);
        assert_eq!(graph.neighbours(post), vec![blog]);

        assert!(matches!(
            graph.set_reference(post, "Blog", Some(post)),
            Err(GraphError::WrongTarget { .. })
        ));
    }

    #[test]
    fn test_unknown_object() {
        let graph = graph();
        assert!(matches!(
            graph.entity_of(ObjectId(3)),
            Err(GraphError::UnknownObject(_))
        ));
    }

    #[test]
    fn test_graph_ids_are_unique() {
        assert_ne!(graph().id(), graph().id());
    }
}
