//! Per-entity and per-field customization of graph synthesis.
//!
//! Declarative options (skip, singleton, lookback, include counts) can be
//! loaded from YAML through [`CustomizationConfig`]:
//!
//! ```yaml
//! entities:
//!   Country:
//!     singleton: true
//!   Blog:
//!     lookback: 2
//!     fields:
//!       Posts:
//!         include_count: 5
//!       Audit:
//!         skip: true
//! ```
//!
//! Closures (custom constructors, value factories, post-create hooks) are
//! registered programmatically on [`Customizations`].

use rand::rngs::StdRng;
use seedgraph_core::{GraphError, ObjectGraph, ObjectId, Schema, SchemaError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::generators::ValueCreator;

/// Builds an entity instance in place of the default construction.
pub type ConstructorFn =
    Arc<dyn Fn(&mut ObjectGraph, &mut StdRng) -> Result<ObjectId, GraphError> + Send + Sync>;

/// Runs after an object has been fully constructed.
pub type PostCreateFn =
    Arc<dyn Fn(&mut ObjectGraph, ObjectId) -> Result<(), GraphError> + Send + Sync>;

/// Declarative options of one field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldOptions {
    /// Leave the field untouched
    pub skip: bool,
    /// Number of elements created for a collection field
    pub include_count: Option<usize>,
    /// Ancestor search depth for this field
    pub lookback: Option<usize>,
}

/// Declarative options of one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EntityOptions {
    /// Never create this entity as a related object
    pub skip: bool,
    /// At most one instance per graph
    pub singleton: bool,
    /// Ancestor search depth for all fields of this entity
    pub lookback: Option<usize>,
    /// Per-field options
    pub fields: HashMap<String, FieldOptions>,
}

/// Declarative customization options, loadable from YAML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CustomizationConfig {
    pub entities: HashMap<String, EntityOptions>,
}

impl CustomizationConfig {
    /// Parse options from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, SchemaError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load options from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}

type FieldKey = (String, String);

fn field_key(entity: &str, field: &str) -> FieldKey {
    (entity.to_string(), field.to_string())
}

/// All customizations applied by a [`crate::GraphSynthesizer`].
///
/// Lookups resolve field override first, then entity override; callers
/// supply the instance default.
#[derive(Clone, Default)]
pub struct Customizations {
    options: CustomizationConfig,
    constructors: HashMap<String, ConstructorFn>,
    values: HashMap<FieldKey, ValueCreator>,
    post_create: HashMap<String, PostCreateFn>,
    field_post_create: HashMap<FieldKey, PostCreateFn>,
}

impl fmt::Debug for Customizations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Customizations")
            .field("options", &self.options)
            .field("constructors", &self.constructors.keys().collect::<Vec<_>>())
            .field("values", &self.values.keys().collect::<Vec<_>>())
            .field("post_create", &self.post_create.keys().collect::<Vec<_>>())
            .field(
                "field_post_create",
                &self.field_post_create.keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Customizations {
    /// Create an empty set of customizations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from declarative options.
    pub fn from_config(options: CustomizationConfig) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    fn entity_options(&mut self, entity: &str) -> &mut EntityOptions {
        self.options.entities.entry(entity.to_string()).or_default()
    }

    fn field_options(&mut self, entity: &str, field: &str) -> &mut FieldOptions {
        self.entity_options(entity)
            .fields
            .entry(field.to_string())
            .or_default()
    }

    // =========================================================================
    // Builders
    // =========================================================================

    /// Never create `entity` as a related object.
    pub fn skip_entity(mut self, entity: &str) -> Self {
        self.entity_options(entity).skip = true;
        self
    }

    /// Leave a field untouched.
    pub fn skip_field(mut self, entity: &str, field: &str) -> Self {
        self.field_options(entity, field).skip = true;
        self
    }

    /// Keep at most one instance of `entity` per graph.
    pub fn singleton(mut self, entity: &str) -> Self {
        self.entity_options(entity).singleton = true;
        self
    }

    /// Set the ancestor search depth for all fields of `entity`.
    pub fn entity_lookback(mut self, entity: &str, lookback: usize) -> Self {
        self.entity_options(entity).lookback = Some(lookback);
        self
    }

    /// Set the ancestor search depth for one field.
    pub fn field_lookback(mut self, entity: &str, field: &str, lookback: usize) -> Self {
        self.field_options(entity, field).lookback = Some(lookback);
        self
    }

    /// Set the number of elements created for a collection field.
    pub fn with_include_count(mut self, entity: &str, field: &str, count: usize) -> Self {
        self.field_options(entity, field).include_count = Some(count);
        self
    }

    /// Replace default construction of `entity`.
    pub fn with_constructor<F>(mut self, entity: &str, constructor: F) -> Self
    where
        F: Fn(&mut ObjectGraph, &mut StdRng) -> Result<ObjectId, GraphError>
            + Send
            + Sync
            + 'static,
    {
        self.constructors
            .insert(entity.to_string(), Arc::new(constructor));
        self
    }

    /// Use a custom value factory for a scalar field.
    pub fn with_value<F>(mut self, entity: &str, field: &str, creator: F) -> Self
    where
        F: Fn(&mut StdRng, &str) -> seedgraph_core::Value + Send + Sync + 'static,
    {
        self.values
            .insert(field_key(entity, field), Arc::new(creator));
        self
    }

    /// Run a hook after every instance of `entity` is constructed.
    pub fn with_post_create<F>(mut self, entity: &str, hook: F) -> Self
    where
        F: Fn(&mut ObjectGraph, ObjectId) -> Result<(), GraphError> + Send + Sync + 'static,
    {
        self.post_create.insert(entity.to_string(), Arc::new(hook));
        self
    }

    /// Run a hook for one field after every instance of `entity` is
    /// constructed. Field hooks run before the entity hook.
    pub fn with_field_post_create<F>(mut self, entity: &str, field: &str, hook: F) -> Self
    where
        F: Fn(&mut ObjectGraph, ObjectId) -> Result<(), GraphError> + Send + Sync + 'static,
    {
        self.field_post_create
            .insert(field_key(entity, field), Arc::new(hook));
        self
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    fn entity(&self, entity: &str) -> Option<&EntityOptions> {
        self.options.entities.get(entity)
    }

    fn field(&self, entity: &str, field: &str) -> Option<&FieldOptions> {
        self.entity(entity).and_then(|e| e.fields.get(field))
    }

    /// Check whether `entity` is skipped.
    pub fn should_skip(&self, entity: &str) -> bool {
        self.entity(entity).is_some_and(|e| e.skip)
    }

    /// Check whether a field is skipped.
    pub fn should_skip_field(&self, entity: &str, field: &str) -> bool {
        self.field(entity, field).is_some_and(|f| f.skip)
    }

    /// Ancestor search depth for a field.
    pub fn lookback(&self, entity: &str, field: &str, default: usize) -> usize {
        self.field(entity, field)
            .and_then(|f| f.lookback)
            .or_else(|| self.entity(entity).and_then(|e| e.lookback))
            .unwrap_or(default)
    }

    /// Configured element count of a collection field.
    pub fn include_count(&self, entity: &str, field: &str) -> Option<usize> {
        self.field(entity, field).and_then(|f| f.include_count)
    }

    /// Check whether `entity` is a singleton.
    pub fn is_singleton(&self, entity: &str) -> bool {
        self.entity(entity).is_some_and(|e| e.singleton)
    }

    /// Custom constructor of `entity`.
    pub fn constructor(&self, entity: &str) -> Option<&ConstructorFn> {
        self.constructors.get(entity)
    }

    /// Custom value factory of a field.
    pub fn custom_value(&self, entity: &str, field: &str) -> Option<&ValueCreator> {
        self.values.get(&field_key(entity, field))
    }

    /// Entity post-create hook.
    pub fn post_create(&self, entity: &str) -> Option<&PostCreateFn> {
        self.post_create.get(entity)
    }

    /// Field post-create hook.
    pub fn field_post_create(&self, entity: &str, field: &str) -> Option<&PostCreateFn> {
        self.field_post_create.get(&field_key(entity, field))
    }

    /// Check that every customized entity and field exists in the schema.
    pub fn validate(&self, schema: &Schema) -> Result<(), SchemaError> {
        let option_fields = self.options.entities.iter().flat_map(|(entity, options)| {
            options.fields.keys().map(move |field| (entity, field))
        });
        let closure_fields = self
            .values
            .keys()
            .chain(self.field_post_create.keys())
            .map(|(entity, field)| (entity, field));

        for entity in self
            .options
            .entities
            .keys()
            .chain(self.constructors.keys())
            .chain(self.post_create.keys())
        {
            schema.require_entity(entity)?;
        }
        for (entity, field) in option_fields.chain(closure_fields) {
            schema.require_entity(entity)?.require_field(field)?;
        }
        Ok(())
    }
}
