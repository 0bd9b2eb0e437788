//! Key relation registry.
//!
//! Resolves the ordered primary-key fields of an entity and the ordered
//! foreign-key fields of a (source, target) entity pair. Registered
//! overrides win; otherwise naming conventions apply:
//!
//! - primary key: a scalar field literally named `Id` or `id`
//! - foreign key: for the first reference field `Nav` on the source that
//!   points at the target, `NavId` / `nav_id` (single-field key) or
//!   `Nav<KeyField>` per key field (composite key); failing that,
//!   `TargetId` / `target_id`
//!
//! Every resolved relation is validated against the target's primary key
//! and memoized for the registry's lifetime.

use crate::schema::{EntityDef, Schema, SchemaError};
use crate::types::ValueType;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Error type for key resolution.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    /// Primary or foreign key fields cannot be determined
    #[error("Cannot resolve {kind} key for '{entity}': {reason}")]
    KeyResolution {
        kind: &'static str,
        entity: String,
        reason: String,
    },

    /// Foreign-key value types do not line up with the target's primary key
    #[error("Foreign key {fields:?} on '{entity}' does not match the primary key of '{target}': {reason}")]
    RelationMismatch {
        entity: String,
        target: String,
        fields: Vec<String>,
        reason: String,
    },

    /// Schema lookup error
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Resolved primary-key fields of an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyFields {
    /// Owning entity
    pub entity: String,
    /// Field names in key order
    pub names: Vec<String>,
    /// Field positions in key order
    pub indices: Vec<usize>,
    /// (type, nullable) per key field
    pub types: Vec<(ValueType, bool)>,
}

/// A resolved directed relation `source -> target`.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    /// Entity holding the foreign key
    pub source: String,
    /// Entity whose primary key the foreign key mirrors
    pub target: String,
    /// Foreign-key field names on `source`, in target key order
    pub foreign_key: Vec<String>,
    /// Foreign-key field positions on `source`
    pub fk_indices: Vec<usize>,
    /// Primary key of `target`
    pub target_key: Arc<KeyFields>,
    /// The foreign key is the source's own primary key (shared-key 1:1)
    pub identity: bool,
    /// Every foreign-key field is nullable
    pub optional: bool,
}

/// Registry of primary and foreign keys, memoized per entity and pair.
#[derive(Debug)]
pub struct KeyRegistry {
    schema: Arc<Schema>,
    primary_overrides: HashMap<String, Vec<String>>,
    foreign_overrides: HashMap<(String, String), Vec<String>>,
    primary_cache: HashMap<String, Arc<KeyFields>>,
    relation_cache: HashMap<(String, String), Arc<Relation>>,
}

impl KeyRegistry {
    /// Create a registry seeded with the overrides declared in the schema.
    pub fn new(schema: Arc<Schema>) -> Self {
        let primary_overrides = schema
            .entities
            .iter()
            .filter_map(|e| e.primary_key.clone().map(|pk| (e.name.clone(), pk)))
            .collect();
        let foreign_overrides = schema
            .relations
            .iter()
            .map(|r| ((r.source.clone(), r.target.clone()), r.foreign_key.clone()))
            .collect();
        Self {
            schema,
            primary_overrides,
            foreign_overrides,
            primary_cache: HashMap::new(),
            relation_cache: HashMap::new(),
        }
    }

    /// The schema the registry resolves against.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Register a primary-key override.
    pub fn register_primary_key<I, S>(&mut self, entity: &str, fields: I) -> Result<(), KeyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = fields.into_iter().map(Into::into).collect();
        let def = self.schema.require_entity(entity)?;
        build_key_fields(def, &names)?;

        self.primary_overrides.insert(entity.to_string(), names);
        self.primary_cache.remove(entity);
        self.relation_cache
            .retain(|(source, target), _| source != entity && target != entity);
        Ok(())
    }

    /// Register a foreign-key override, validating it immediately.
    pub fn register_foreign_key<I, S>(
        &mut self,
        source: &str,
        target: &str,
        fields: I,
    ) -> Result<(), KeyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = fields.into_iter().map(Into::into).collect();
        let relation = self.build_relation(source, target, names.clone())?;

        self.foreign_overrides
            .insert((source.to_string(), target.to_string()), names);
        self.relation_cache
            .insert((source.to_string(), target.to_string()), Arc::new(relation));
        Ok(())
    }

    /// Resolve the primary-key fields of an entity.
    pub fn primary_key(&mut self, entity: &str) -> Result<Arc<KeyFields>, KeyError> {
        if let Some(cached) = self.primary_cache.get(entity) {
            return Ok(Arc::clone(cached));
        }

        let def = self.schema.require_entity(entity)?;
        let names = match self.primary_overrides.get(entity).cloned() {
            Some(names) => names,
            None => conventional_primary_key(def)?,
        };
        let key = Arc::new(build_key_fields(def, &names)?);

        self.primary_cache
            .insert(entity.to_string(), Arc::clone(&key));
        Ok(key)
    }

    /// Resolve the foreign key from `source` to `target`.
    pub fn foreign_key(&mut self, source: &str, target: &str) -> Result<Arc<Relation>, KeyError> {
        let pair = (source.to_string(), target.to_string());
        if let Some(cached) = self.relation_cache.get(&pair) {
            return Ok(Arc::clone(cached));
        }

        let names = match self.foreign_overrides.get(&pair).cloned() {
            Some(names) => names,
            None => {
                let target_key = self.primary_key(target)?;
                let def = self.schema.require_entity(source)?;
                conventional_foreign_key(def, target, &target_key)?
            }
        };
        let relation = Arc::new(self.build_relation(source, target, names)?);
        debug!(
            source,
            target,
            foreign_key = ?relation.foreign_key,
            identity = relation.identity,
            "Resolved relation"
        );

        self.relation_cache.insert(pair, Arc::clone(&relation));
        Ok(relation)
    }

    /// Resolve the principal side of a shared-key 1:1 relation.
    ///
    /// Returns the `target -> owner` relation when `owner` carries no
    /// foreign key of its own and the reverse relation is identity-equal.
    pub fn inverse_identity(
        &mut self,
        owner: &str,
        target: &str,
    ) -> Result<Option<Arc<Relation>>, KeyError> {
        match self.foreign_key(target, owner) {
            Ok(relation) if relation.identity => Ok(Some(relation)),
            Ok(_) | Err(KeyError::KeyResolution { .. }) => Ok(None),
            Err(other) => Err(other),
        }
    }

    fn build_relation(
        &mut self,
        source: &str,
        target: &str,
        names: Vec<String>,
    ) -> Result<Relation, KeyError> {
        let target_key = self.primary_key(target)?;
        let source_key = self.primary_key(source).ok();
        let def = self.schema.require_entity(source)?;

        let mismatch = |reason: String| KeyError::RelationMismatch {
            entity: source.to_string(),
            target: target.to_string(),
            fields: names.clone(),
            reason,
        };

        if names.len() != target_key.names.len() {
            return Err(mismatch(format!(
                "expected {} fields, found {}",
                target_key.names.len(),
                names.len()
            )));
        }

        let mut fk_indices = Vec::with_capacity(names.len());
        let mut fk_types = Vec::with_capacity(names.len());
        for name in &names {
            let (idx, field) = def.require_scalar(name)?;
            let ty = field.value_type().cloned().unwrap_or(ValueType::Bytes);
            fk_indices.push(idx);
            fk_types.push((ty, field.nullable));
        }

        for ((fk_ty, _), (pk_ty, _)) in fk_types.iter().zip(&target_key.types) {
            if fk_ty != pk_ty {
                return Err(mismatch(format!("type {fk_ty} does not match {pk_ty}")));
            }
        }

        let all_nullable = fk_types.iter().all(|(_, nullable)| *nullable);
        let same_nullability = fk_types
            .iter()
            .zip(&target_key.types)
            .all(|((_, fk_null), (_, pk_null))| fk_null == pk_null);
        if !same_nullability && !all_nullable {
            return Err(mismatch(
                "nullability differs and the foreign key is not wholly optional".to_string(),
            ));
        }

        let identity = source_key.is_some_and(|key| key.names == names);

        Ok(Relation {
            source: source.to_string(),
            target: target.to_string(),
            foreign_key: names,
            fk_indices,
            target_key,
            identity,
            optional: all_nullable,
        })
    }
}

fn build_key_fields(def: &EntityDef, names: &[String]) -> Result<KeyFields, KeyError> {
    if names.is_empty() {
        return Err(KeyError::KeyResolution {
            kind: "primary",
            entity: def.name.clone(),
            reason: "key has no fields".to_string(),
        });
    }

    let mut indices = Vec::with_capacity(names.len());
    let mut types = Vec::with_capacity(names.len());
    for name in names {
        let (idx, field) = def.require_scalar(name)?;
        indices.push(idx);
        types.push((
            field.value_type().cloned().unwrap_or(ValueType::Bytes),
            field.nullable,
        ));
    }
    Ok(KeyFields {
        entity: def.name.clone(),
        names: names.to_vec(),
        indices,
        types,
    })
}

fn conventional_primary_key(def: &EntityDef) -> Result<Vec<String>, KeyError> {
    ["Id", "id"]
        .iter()
        .find(|name| def.field(name).is_some_and(|f| f.value_type().is_some()))
        .map(|name| vec![(*name).to_string()])
        .ok_or_else(|| KeyError::KeyResolution {
            kind: "primary",
            entity: def.name.clone(),
            reason: "no override registered and no scalar 'Id' or 'id' field".to_string(),
        })
}

fn conventional_foreign_key(
    def: &EntityDef,
    target: &str,
    target_key: &KeyFields,
) -> Result<Vec<String>, KeyError> {
    let has_scalar = |name: &str| def.field(name).is_some_and(|f| f.value_type().is_some());

    let mut prefixes: Vec<String> = def
        .reference_fields()
        .filter(|(_, f)| f.related_entity() == Some(target))
        .map(|(_, f)| f.name.clone())
        .take(1)
        .collect();
    prefixes.push(target.to_string());

    for prefix in &prefixes {
        let candidates: Vec<Vec<String>> = if target_key.names.len() == 1 {
            vec![
                vec![format!("{prefix}Id")],
                vec![format!("{}_id", prefix.to_lowercase())],
            ]
        } else {
            vec![target_key
                .names
                .iter()
                .map(|pk| format!("{prefix}{pk}"))
                .collect()]
        };
        if let Some(found) = candidates
            .into_iter()
            .find(|names| names.iter().all(|n| has_scalar(n)))
        {
            return Ok(found);
        }
    }

    Err(KeyError::KeyResolution {
        kind: "foreign",
        entity: def.name.clone(),
        reason: format!("no override registered and no conventional foreign key to '{target}'"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EntityDef, FieldDef, RelationDef};

    fn blog_schema() -> Arc<Schema> {
        let entities = vec![
            EntityDef::new("Blog")
                .with_field(FieldDef::scalar("Id", ValueType::Int32))
                .with_field(FieldDef::collection("Posts", "Post")),
            EntityDef::new("Post")
                .with_field(FieldDef::scalar("Id", ValueType::Int32))
                .with_field(FieldDef::nullable("BlogId", ValueType::Int32))
                .with_field(FieldDef::reference("Blog", "Blog")),
            EntityDef::new("Note")
                .with_field(FieldDef::scalar("id", ValueType::Uuid))
                .with_field(FieldDef::scalar("Text", ValueType::Text)),
        ];
        Arc::new(Schema::new(entities, vec![]).unwrap())
    }

    #[test]
    fn test_conventional_primary_key() {
        let mut registry = KeyRegistry::new(blog_schema());
        let key = registry.primary_key("Blog").unwrap();
        assert_eq!(key.names, vec!["Id".to_string()]);
        assert_eq!(key.indices, vec![0]);

        let key = registry.primary_key("Note").unwrap();
        assert_eq!(key.names, vec!["id".to_string()]);
    }

    #[test]
    fn test_missing_primary_key() {
        let entities =
            vec![EntityDef::new("Log").with_field(FieldDef::scalar("At", ValueType::DateTime))];
        let schema = Arc::new(Schema::new(entities, vec![]).unwrap());
        let mut registry = KeyRegistry::new(schema);
        assert!(matches!(
            registry.primary_key("Log"),
            Err(KeyError::KeyResolution { kind: "primary", .. })
        ));
    }

    #[test]
    fn test_conventional_foreign_key() {
        let mut registry = KeyRegistry::new(blog_schema());
        let relation = registry.foreign_key("Post", "Blog").unwrap();
        assert_eq!(relation.foreign_key, vec!["BlogId".to_string()]);
        assert_eq!(relation.fk_indices, vec![1]);
        assert!(relation.optional);
        assert!(!relation.identity);
    }

    #[test]
    fn test_foreign_key_is_memoized() {
        let mut registry = KeyRegistry::new(blog_schema());
        let first = registry.foreign_key("Post", "Blog").unwrap();
        let second = registry.foreign_key("Post", "Blog").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_unresolvable_foreign_key() {
        let mut registry = KeyRegistry::new(blog_schema());
        assert!(matches!(
            registry.foreign_key("Blog", "Post"),
            Err(KeyError::KeyResolution { kind: "foreign", .. })
        ));
    }

    #[test]
    fn test_type_mismatch_at_registration() {
        let mut registry = KeyRegistry::new(blog_schema());
        // Note's key is a uuid, BlogId is an int
        let result = registry.register_foreign_key("Post", "Note", ["BlogId"]);
        assert!(matches!(result, Err(KeyError::RelationMismatch { .. })));
    }

    #[test]
    fn test_required_foreign_key_against_nullable_key_is_rejected() {
        let entities = vec![
            EntityDef::new("A").with_field(FieldDef::nullable("Id", ValueType::Int32)),
            EntityDef::new("B")
                .with_field(FieldDef::scalar("Id", ValueType::Int32))
                .with_field(FieldDef::scalar("AId", ValueType::Int32))
                .with_field(FieldDef::reference("A", "A")),
        ];
        let schema = Arc::new(Schema::new(entities, vec![]).unwrap());
        let mut registry = KeyRegistry::new(schema);
        assert!(matches!(
            registry.foreign_key("B", "A"),
            Err(KeyError::RelationMismatch { .. })
        ));
    }

    #[test]
    fn test_identity_relation() {
        let entities = vec![
            EntityDef::new("User").with_field(FieldDef::scalar("Id", ValueType::Uuid)),
            EntityDef::new("Profile")
                .with_field(FieldDef::scalar("Id", ValueType::Uuid))
                .with_field(FieldDef::reference("User", "User")),
        ];
        let relations = vec![RelationDef::new("Profile", "User", ["Id"])];
        let schema = Arc::new(Schema::new(entities, relations).unwrap());
        let mut registry = KeyRegistry::new(schema);

        let relation = registry.foreign_key("Profile", "User").unwrap();
        assert!(relation.identity);

        let inverse = registry.inverse_identity("User", "Profile").unwrap();
        assert_eq!(inverse.map(|r| r.source.clone()), Some("Profile".to_string()));
    }

    #[test]
    fn test_composite_conventional_foreign_key() {
        let entities = vec![
            EntityDef::new("Line")
                .with_primary_key(["OrderNo", "LineNo"])
                .with_field(FieldDef::scalar("OrderNo", ValueType::Int64))
                .with_field(FieldDef::scalar("LineNo", ValueType::Int16)),
            EntityDef::new("Shipment")
                .with_field(FieldDef::scalar("Id", ValueType::Int64))
                .with_field(FieldDef::nullable("LineOrderNo", ValueType::Int64))
                .with_field(FieldDef::nullable("LineLineNo", ValueType::Int16))
                .with_field(FieldDef::reference("Line", "Line")),
        ];
        let schema = Arc::new(Schema::new(entities, vec![]).unwrap());
        let mut registry = KeyRegistry::new(schema);
        let relation = registry.foreign_key("Shipment", "Line").unwrap();
        assert_eq!(
            relation.foreign_key,
            vec!["LineOrderNo".to_string(), "LineLineNo".to_string()]
        );
    }
}
