//! Auto-increment sequences.

use seedgraph_core::{EntityDef, ObjectGraph, ObjectId, Schema, SchemaError, Value, ValueType};
use std::collections::HashMap;

use crate::error::StoreError;

#[derive(Debug, Clone)]
struct SequenceField {
    index: usize,
    name: String,
    value_type: ValueType,
}

/// Values computed for newly discovered objects, applied only once the
/// whole commit is known to succeed.
#[derive(Debug)]
pub(crate) struct Allocation {
    values: Vec<(ObjectId, usize, Value)>,
    next: HashMap<(String, String), u64>,
}

impl Allocation {
    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }
}

/// Per (entity, field) monotonically increasing sequences starting at 1.
#[derive(Debug, Clone, Default)]
pub(crate) struct Sequences {
    fields: HashMap<String, Vec<SequenceField>>,
    next: HashMap<(String, String), u64>,
}

impl Sequences {
    /// Register every `auto_increment` field declared in the schema.
    pub(crate) fn from_schema(schema: &Schema) -> Result<Self, SchemaError> {
        let mut sequences = Self::default();
        for def in &schema.entities {
            for field in &def.auto_increment {
                sequences.register(def, field)?;
            }
        }
        Ok(sequences)
    }

    /// Register an integer field for auto-increment. Registering a field
    /// twice is a no-op.
    pub(crate) fn register(&mut self, def: &EntityDef, field: &str) -> Result<(), SchemaError> {
        let (index, field_def) = def.require_scalar(field)?;
        let value_type = field_def.value_type().cloned().unwrap_or(ValueType::Bytes);
        if !value_type.is_integer() {
            return Err(SchemaError::UnsupportedType {
                entity: def.name.clone(),
                field: field.to_string(),
                reason: format!("auto-increment requires an integer type, found {value_type}"),
            });
        }

        let fields = self.fields.entry(def.name.clone()).or_default();
        if fields.iter().all(|f| f.name != field) {
            fields.push(SequenceField {
                index,
                name: field.to_string(),
                value_type,
            });
        }
        Ok(())
    }

    /// Last value handed out for a field, 0 if none.
    pub(crate) fn current(&self, entity: &str, field: &str) -> u64 {
        self.next
            .get(&(entity.to_string(), field.to_string()))
            .map_or(0, |next| next - 1)
    }

    /// Compute the next value of every sequence field for each object,
    /// without advancing the counters.
    pub(crate) fn allocate(
        &self,
        graph: &ObjectGraph,
        objects: &[ObjectId],
    ) -> Result<Allocation, StoreError> {
        let mut next = self.next.clone();
        let mut values = Vec::new();

        for &id in objects {
            let entity = graph.entity_of(id)?;
            let Some(fields) = self.fields.get(entity) else {
                continue;
            };
            for field in fields {
                let counter = next
                    .entry((entity.to_string(), field.name.clone()))
                    .or_insert(1);
                let value = Value::from_sequence(&field.value_type, *counter).ok_or_else(|| {
                    StoreError::SequenceExhausted {
                        entity: entity.to_string(),
                        field: field.name.clone(),
                    }
                })?;
                *counter += 1;
                values.push((id, field.index, value));
            }
        }

        Ok(Allocation { values, next })
    }

    /// Write allocated values and advance the counters.
    pub(crate) fn apply(&mut self, graph: &mut ObjectGraph, allocation: Allocation) {
        for (id, index, value) in allocation.values {
            if let Some(slot) = graph.slot_mut(id, index) {
                *slot = seedgraph_core::Slot::Value(value);
            }
        }
        self.next = allocation.next;
    }
}
