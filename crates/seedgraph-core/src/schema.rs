//! Entity schema definitions.
//!
//! A [`Schema`] is the per-type field table every other component works
//! from: each [`EntityDef`] lists its fields in a stable order, and each
//! [`FieldDef`] is either a scalar, a single reference to another entity,
//! or a collection of another entity.
//!
//! ## YAML Format
//!
//! ```yaml
//! version: 1
//! entities:
//!   - name: Blog
//!     fields:
//!       - name: Id
//!         type: int
//!       - name: Posts
//!         collection: Post
//!   - name: Post
//!     auto_increment: [Id]
//!     fields:
//!       - name: Id
//!         type: int
//!       - name: BlogId
//!         type: int
//!         nullable: true
//!       - name: Blog
//!         reference: Blog
//! relations:
//!   - source: Post
//!     target: Blog
//!     foreign_key: [BlogId]
//! ```

use crate::types::ValueType;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

// ============================================================================
// Error Types
// ============================================================================

/// Error type for schema operations.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Error reading schema file
    #[error("Failed to read schema file: {0}")]
    IoError(#[from] std::io::Error),

    /// Error parsing YAML
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Entity not found in schema
    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    /// Entity declared twice
    #[error("Entity '{0}' is declared more than once")]
    DuplicateEntity(String),

    /// Field not found in entity
    #[error("Field '{field}' not found in entity '{entity}'")]
    FieldNotFound { entity: String, field: String },

    /// Field declared twice in one entity
    #[error("Field '{field}' is declared more than once in entity '{entity}'")]
    DuplicateField { entity: String, field: String },

    /// Field shape the engine cannot model
    #[error("Unsupported field '{field}' in entity '{entity}': {reason}")]
    UnsupportedType {
        entity: String,
        field: String,
        reason: String,
    },

    /// Field accessed as the wrong kind (scalar, reference, collection)
    #[error("Field '{field}' in entity '{entity}' is not a {expected} field")]
    FieldKindMismatch {
        entity: String,
        field: String,
        expected: &'static str,
    },

    /// Value does not fit the declared field type
    #[error("Value {value} does not fit field '{field}' in entity '{entity}'")]
    ValueMismatch {
        entity: String,
        field: String,
        value: String,
    },
}

// ============================================================================
// Fields
// ============================================================================

/// What a field holds.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// A scalar value
    Scalar(ValueType),
    /// A single related entity
    Reference(String),
    /// A collection of related entities
    Collection(String),
}

/// A single field of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFieldDef", into = "RawFieldDef")]
pub struct FieldDef {
    /// Field name
    pub name: String,

    /// Field shape
    pub kind: FieldKind,

    /// Whether the field may be absent (`Null` scalar or unset reference)
    pub nullable: bool,
}

impl FieldDef {
    /// Create a required scalar field.
    pub fn scalar(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Scalar(value_type),
            nullable: false,
        }
    }

    /// Create a nullable scalar field.
    pub fn nullable(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Scalar(value_type),
            nullable: true,
        }
    }

    /// Create a single-reference (navigation) field.
    pub fn reference(name: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Reference(entity.into()),
            nullable: true,
        }
    }

    /// Create a collection field.
    pub fn collection(name: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Collection(entity.into()),
            nullable: false,
        }
    }

    /// The scalar type, if this is a scalar field.
    pub fn value_type(&self) -> Option<&ValueType> {
        match &self.kind {
            FieldKind::Scalar(ty) => Some(ty),
            _ => None,
        }
    }

    /// The related entity, if this is a reference or collection field.
    pub fn related_entity(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Reference(entity) | FieldKind::Collection(entity) => Some(entity),
            FieldKind::Scalar(_) => None,
        }
    }

    /// Check if this is a single-reference field.
    pub fn is_reference(&self) -> bool {
        matches!(self.kind, FieldKind::Reference(_))
    }

    /// Check if this is a collection field.
    pub fn is_collection(&self) -> bool {
        matches!(self.kind, FieldKind::Collection(_))
    }
}

/// Serialized shape of a field: exactly one of `type`, `reference` or
/// `collection` must be present.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawFieldDef {
    name: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    value_type: Option<ValueType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    reference: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    collection: Option<String>,

    #[serde(default)]
    nullable: bool,
}

impl TryFrom<RawFieldDef> for FieldDef {
    type Error = String;

    fn try_from(raw: RawFieldDef) -> Result<Self, Self::Error> {
        let kind = match (raw.value_type, raw.reference, raw.collection) {
            (Some(ty), None, None) => FieldKind::Scalar(ty),
            (None, Some(entity), None) => FieldKind::Reference(entity),
            (None, None, Some(entity)) => FieldKind::Collection(entity),
            _ => {
                return Err(format!(
                    "field '{}' must declare exactly one of 'type', 'reference' or 'collection'",
                    raw.name
                ))
            }
        };
        // References are optional unless stated otherwise
        let nullable = raw.nullable || matches!(kind, FieldKind::Reference(_));
        Ok(Self {
            name: raw.name,
            kind,
            nullable,
        })
    }
}

impl From<FieldDef> for RawFieldDef {
    fn from(field: FieldDef) -> Self {
        let (value_type, reference, collection) = match field.kind {
            FieldKind::Scalar(ty) => (Some(ty), None, None),
            FieldKind::Reference(entity) => (None, Some(entity), None),
            FieldKind::Collection(entity) => (None, None, Some(entity)),
        };
        Self {
            name: field.name,
            value_type,
            reference,
            collection,
            nullable: field.nullable,
        }
    }
}

// ============================================================================
// Entities
// ============================================================================

/// Entity type descriptor: a name and its ordered fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDef {
    /// Entity name
    pub name: String,

    /// Primary key override (field names, in key order)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<Vec<String>>,

    /// Fields filled from a per-field sequence when the store discovers a
    /// new object
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auto_increment: Vec<String>,

    /// Field definitions, in declaration order
    pub fields: Vec<FieldDef>,

    /// Cached field lookup (not serialized)
    #[serde(skip)]
    field_map: HashMap<String, usize>,
}

impl EntityDef {
    /// Create an entity without fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: None,
            auto_increment: Vec::new(),
            fields: Vec::new(),
            field_map: HashMap::new(),
        }
    }

    /// Add a field.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.field_map.insert(field.name.clone(), self.fields.len());
        self.fields.push(field);
        self
    }

    /// Override the primary key.
    pub fn with_primary_key<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Declare an auto-increment field.
    pub fn with_auto_increment(mut self, field: impl Into<String>) -> Self {
        self.auto_increment.push(field.into());
        self
    }

    fn build_field_map(&mut self) {
        self.field_map = self
            .fields
            .iter()
            .enumerate()
            .map(|(idx, field)| (field.name.clone(), idx))
            .collect();
    }

    /// Get the position of a field by name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.field_map.get(name).copied()
    }

    /// Get a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.field_index(name).and_then(|idx| self.fields.get(idx))
    }

    /// Get a field by name or fail with `FieldNotFound`.
    pub fn require_field(&self, name: &str) -> Result<(usize, &FieldDef), SchemaError> {
        self.field_index(name)
            .and_then(|idx| self.fields.get(idx).map(|field| (idx, field)))
            .ok_or_else(|| SchemaError::FieldNotFound {
                entity: self.name.clone(),
                field: name.to_string(),
            })
    }

    /// Get a scalar field by name or fail.
    pub fn require_scalar(&self, name: &str) -> Result<(usize, &FieldDef), SchemaError> {
        let (idx, field) = self.require_field(name)?;
        if field.value_type().is_none() {
            return Err(SchemaError::FieldKindMismatch {
                entity: self.name.clone(),
                field: name.to_string(),
                expected: "scalar",
            });
        }
        Ok((idx, field))
    }

    /// Iterate over single-reference fields with their positions.
    pub fn reference_fields(&self) -> impl Iterator<Item = (usize, &FieldDef)> {
        self.fields.iter().enumerate().filter(|(_, f)| f.is_reference())
    }

    /// Iterate over collection fields with their positions.
    pub fn collection_fields(&self) -> impl Iterator<Item = (usize, &FieldDef)> {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_collection())
    }

    fn validate(&self, entity_names: &HashSet<&str>) -> Result<(), SchemaError> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    entity: self.name.clone(),
                    field: field.name.clone(),
                });
            }
            match &field.kind {
                FieldKind::Reference(target) | FieldKind::Collection(target) => {
                    if !entity_names.contains(target.as_str()) {
                        return Err(SchemaError::EntityNotFound(target.clone()));
                    }
                }
                FieldKind::Scalar(ValueType::Enum { values }) if values.is_empty() => {
                    return Err(SchemaError::UnsupportedType {
                        entity: self.name.clone(),
                        field: field.name.clone(),
                        reason: "enumeration declares no members".to_string(),
                    });
                }
                FieldKind::Scalar(_) => {}
            }
        }

        if let Some(primary_key) = &self.primary_key {
            for name in primary_key {
                self.require_scalar(name)?;
            }
        }

        for name in &self.auto_increment {
            let (_, field) = self.require_scalar(name)?;
            if !field.value_type().is_some_and(ValueType::is_integer) {
                return Err(SchemaError::UnsupportedType {
                    entity: self.name.clone(),
                    field: name.clone(),
                    reason: "auto-increment fields must be integers".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Foreign-key override for a (source, target) entity pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDef {
    /// Entity holding the foreign key
    pub source: String,

    /// Entity whose primary key the foreign key mirrors
    pub target: String,

    /// Foreign-key fields on `source`, in target key order
    pub foreign_key: Vec<String>,
}

impl RelationDef {
    /// Create a relation override.
    pub fn new<I, S>(source: impl Into<String>, target: impl Into<String>, foreign_key: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            source: source.into(),
            target: target.into(),
            foreign_key: foreign_key.into_iter().map(Into::into).collect(),
        }
    }
}

// ============================================================================
// Schema
// ============================================================================

/// The complete set of entity descriptors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    /// Schema version
    #[serde(default = "default_version")]
    pub version: u32,

    /// Entity definitions
    pub entities: Vec<EntityDef>,

    /// Foreign-key overrides
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<RelationDef>,

    /// Cached entity lookup (not serialized)
    #[serde(skip)]
    entity_map: HashMap<String, usize>,
}

fn default_version() -> u32 {
    1
}

impl Schema {
    /// Create a validated schema from entities and relation overrides.
    pub fn new(entities: Vec<EntityDef>, relations: Vec<RelationDef>) -> Result<Self, SchemaError> {
        let mut schema = Self {
            version: default_version(),
            entities,
            relations,
            entity_map: HashMap::new(),
        };
        schema.prepare()?;
        Ok(schema)
    }

    /// Parse a schema from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, SchemaError> {
        let mut schema: Self = serde_yaml::from_str(yaml)?;
        schema.prepare()?;
        Ok(schema)
    }

    /// Load a schema from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Build lookup maps and validate cross references.
    fn prepare(&mut self) -> Result<(), SchemaError> {
        self.entity_map.clear();
        for (idx, entity) in self.entities.iter_mut().enumerate() {
            entity.build_field_map();
            if self.entity_map.insert(entity.name.clone(), idx).is_some() {
                return Err(SchemaError::DuplicateEntity(entity.name.clone()));
            }
        }

        let names: HashSet<&str> = self.entities.iter().map(|e| e.name.as_str()).collect();
        for entity in &self.entities {
            entity.validate(&names)?;
        }

        for relation in &self.relations {
            let source = self.require_entity(&relation.source)?;
            self.require_entity(&relation.target)?;
            for field in &relation.foreign_key {
                source.require_scalar(field)?;
            }
        }
        Ok(())
    }

    /// Get an entity by name.
    pub fn entity(&self, name: &str) -> Option<&EntityDef> {
        self.entity_map
            .get(name)
            .and_then(|&idx| self.entities.get(idx))
    }

    /// Get an entity by name or fail with `EntityNotFound`.
    pub fn require_entity(&self, name: &str) -> Result<&EntityDef, SchemaError> {
        self.entity(name)
            .ok_or_else(|| SchemaError::EntityNotFound(name.to_string()))
    }

    /// Get all entity names in declaration order.
    pub fn entity_names(&self) -> Vec<&str> {
        self.entities.iter().map(|e| e.name.as_str()).collect()
    }

    /// Find the foreign-key override for a (source, target) pair.
    pub fn relation(&self, source: &str, target: &str) -> Option<&RelationDef> {
        self.relations
            .iter()
            .find(|r| r.source == source && r.target == target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOG_YAML: &str = r#"
version: 1
entities:
  - name: Blog
    fields:
      - name: Id
        type: int
      - name: Title
        type: text
      - name: Posts
        collection: Post
  - name: Post
    auto_increment: [Id]
    fields:
      - name: Id
        type: int
      - name: BlogId
        type: int
        nullable: true
      - name: Blog
        reference: Blog
relations:
  - source: Post
    target: Blog
    foreign_key: [BlogId]
"#;

    #[test]
    fn test_parse_schema() {
        let schema = Schema::from_yaml(BLOG_YAML).unwrap();
        assert_eq!(schema.version, 1);
        assert_eq!(schema.entity_names(), vec!["Blog", "Post"]);

        let post = schema.entity("Post").unwrap();
        assert_eq!(post.field_index("BlogId"), Some(1));
        assert_eq!(post.auto_increment, vec!["Id".to_string()]);

        let blog_ref = post.field("Blog").unwrap();
        assert_eq!(blog_ref.kind, FieldKind::Reference("Blog".to_string()));
        assert!(blog_ref.nullable);

        let relation = schema.relation("Post", "Blog").unwrap();
        assert_eq!(relation.foreign_key, vec!["BlogId".to_string()]);
    }

    #[test]
    fn test_field_order_is_stable() {
        let schema = Schema::from_yaml(BLOG_YAML).unwrap();
        let blog = schema.entity("Blog").unwrap();
        let names: Vec<_> = blog.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Id", "Title", "Posts"]);
    }

    #[test]
    fn test_field_needs_exactly_one_kind() {
        let yaml = r#"
entities:
  - name: Broken
    fields:
      - name: Id
        type: int
        reference: Broken
"#;
        assert!(matches!(
            Schema::from_yaml(yaml),
            Err(SchemaError::YamlError(_))
        ));
    }

    #[test]
    fn test_unknown_reference_target() {
        let entities = vec![EntityDef::new("Post")
            .with_field(FieldDef::scalar("Id", ValueType::Int32))
            .with_field(FieldDef::reference("Blog", "Blog"))];
        let result = Schema::new(entities, vec![]);
        assert!(matches!(result, Err(SchemaError::EntityNotFound(name)) if name == "Blog"));
    }

    #[test]
    fn test_auto_increment_must_be_integer() {
        let entities = vec![EntityDef::new("Tag")
            .with_field(FieldDef::scalar("Id", ValueType::Uuid))
            .with_auto_increment("Id")];
        let result = Schema::new(entities, vec![]);
        assert!(matches!(result, Err(SchemaError::UnsupportedType { .. })));
    }

    #[test]
    fn test_duplicate_entity() {
        let entities = vec![
            EntityDef::new("Tag").with_field(FieldDef::scalar("Id", ValueType::Int32)),
            EntityDef::new("Tag").with_field(FieldDef::scalar("Id", ValueType::Int32)),
        ];
        let result = Schema::new(entities, vec![]);
        assert!(matches!(result, Err(SchemaError::DuplicateEntity(_))));
    }

    #[test]
    fn test_relation_fields_must_exist() {
        let entities = vec![
            EntityDef::new("Blog").with_field(FieldDef::scalar("Id", ValueType::Int32)),
            EntityDef::new("Post")
                .with_field(FieldDef::scalar("Id", ValueType::Int32))
                .with_field(FieldDef::reference("Blog", "Blog")),
        ];
        let relations = vec![RelationDef::new("Post", "Blog", ["Missing"])];
        let result = Schema::new(entities, relations);
        assert!(matches!(result, Err(SchemaError::FieldNotFound { .. })));
    }
}
