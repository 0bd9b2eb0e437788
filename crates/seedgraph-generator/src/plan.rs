//! Per-entity construction plans.
//!
//! A plan is compiled once per entity and records which creator fills each
//! scalar, how each reference is keyed, and how each collection is
//! populated. Foreign-key fields of planned references never receive a
//! random value; they are copied from the referenced object's key.

use seedgraph_core::{FieldKind, KeyError, KeyRegistry, Relation};
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::SynthesizerConfig;
use crate::customize::{ConstructorFn, Customizations, PostCreateFn};
use crate::generators::ValueCreator;
use crate::synthesizer::SynthesisError;
use crate::value_synthesizer::ValueSynthesizer;

pub(crate) struct ScalarStep {
    pub name: String,
    pub creator: ValueCreator,
}

/// How a single reference is keyed.
pub(crate) enum Binding {
    /// The owner holds a foreign key to the related object
    Foreign(Arc<Relation>),
    /// Principal side of a shared-key 1:1: the related object's primary key
    /// mirrors the owner's
    Principal(Arc<Relation>),
}

pub(crate) struct ReferenceStep {
    pub name: String,
    pub target: String,
    pub binding: Binding,
    pub lookback: usize,
    /// May be left unset by a coin flip
    pub optional: bool,
}

pub(crate) struct CollectionStep {
    pub name: String,
    pub element: String,
    pub lookback: usize,
    pub include_count: Option<usize>,
    /// element -> owner relation, set when elements have no navigation back
    /// to the owner and need their foreign key copied explicitly
    pub link: Option<Arc<Relation>>,
}

pub(crate) struct ConstructionPlan {
    pub entity: Arc<str>,
    pub singleton: bool,
    pub constructor: Option<ConstructorFn>,
    pub scalars: Vec<ScalarStep>,
    pub identities: Vec<ReferenceStep>,
    pub references: Vec<ReferenceStep>,
    pub collections: Vec<CollectionStep>,
    pub field_hooks: Vec<PostCreateFn>,
    pub post_create: Option<PostCreateFn>,
}

impl ConstructionPlan {
    pub(crate) fn compile(
        entity: &str,
        keys: &mut KeyRegistry,
        values: &ValueSynthesizer,
        custom: &Customizations,
        config: &SynthesizerConfig,
    ) -> Result<Self, SynthesisError> {
        let schema = Arc::clone(keys.schema());
        let def = schema.require_entity(entity)?;

        let mut excluded = HashSet::new();
        let mut identities = Vec::new();
        let mut references = Vec::new();
        let mut collections = Vec::new();
        let mut field_hooks = Vec::new();

        for (idx, field) in def.fields.iter().enumerate() {
            if let Some(hook) = custom.field_post_create(entity, &field.name) {
                field_hooks.push(Arc::clone(hook));
            }
            if custom.should_skip_field(entity, &field.name) {
                excluded.insert(idx);
                continue;
            }
            let lookback = custom.lookback(entity, &field.name, config.default_lookback);

            match &field.kind {
                FieldKind::Scalar(_) => {}

                FieldKind::Reference(target) => {
                    if custom.should_skip(target) {
                        continue;
                    }
                    let binding = match keys.foreign_key(entity, target) {
                        Ok(relation) => Binding::Foreign(relation),
                        Err(err @ KeyError::KeyResolution { .. }) => {
                            match keys.inverse_identity(entity, target)? {
                                Some(relation) => Binding::Principal(relation),
                                None => return Err(err.into()),
                            }
                        }
                        Err(err) => return Err(err.into()),
                    };

                    let (identity, optional) = match &binding {
                        Binding::Foreign(relation) => {
                            excluded.extend(relation.fk_indices.iter().copied());
                            (relation.identity, relation.optional && !relation.identity)
                        }
                        Binding::Principal(_) => (false, false),
                    };
                    let step = ReferenceStep {
                        name: field.name.clone(),
                        target: target.clone(),
                        binding,
                        lookback,
                        optional,
                    };
                    if identity {
                        identities.push(step);
                    } else {
                        references.push(step);
                    }
                }

                FieldKind::Collection(element) => {
                    if custom.should_skip(element) {
                        continue;
                    }
                    let element_def = schema.require_entity(element)?;
                    let navigates_back = element_def
                        .reference_fields()
                        .any(|(_, f)| f.related_entity() == Some(entity));
                    let link = if navigates_back {
                        None
                    } else {
                        match keys.foreign_key(element, entity) {
                            Ok(relation) => Some(relation),
                            Err(KeyError::KeyResolution { .. }) => None,
                            Err(err) => return Err(err.into()),
                        }
                    };
                    collections.push(CollectionStep {
                        name: field.name.clone(),
                        element: element.clone(),
                        lookback,
                        include_count: custom.include_count(entity, &field.name),
                        link,
                    });
                }
            }
        }

        let mut scalars = Vec::new();
        for (idx, field) in def.fields.iter().enumerate() {
            let FieldKind::Scalar(value_type) = &field.kind else {
                continue;
            };
            if excluded.contains(&idx) {
                continue;
            }
            let creator = match custom.custom_value(entity, &field.name) {
                Some(creator) => Arc::clone(creator),
                None => values.creator(value_type, field.nullable).ok_or_else(|| {
                    SynthesisError::UnsupportedType {
                        entity: entity.to_string(),
                        field: field.name.clone(),
                        value_type: value_type.clone(),
                    }
                })?,
            };
            scalars.push(ScalarStep {
                name: field.name.clone(),
                creator,
            });
        }

        Ok(Self {
            entity: Arc::from(def.name.as_str()),
            singleton: custom.is_singleton(entity),
            constructor: custom.constructor(entity).cloned(),
            scalars,
            identities,
            references,
            collections,
            field_hooks,
            post_create: custom.post_create(entity).cloned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seedgraph_core::{EntityDef, FieldDef, RelationDef, Schema, Value, ValueType};

    fn registry(entities: Vec<EntityDef>, relations: Vec<RelationDef>) -> KeyRegistry {
        KeyRegistry::new(Arc::new(Schema::new(entities, relations).unwrap()))
    }

    fn compile(keys: &mut KeyRegistry, entity: &str, custom: &Customizations) -> ConstructionPlan {
        ConstructionPlan::compile(
            entity,
            keys,
            &ValueSynthesizer::new(),
            custom,
            &SynthesizerConfig::default(),
        )
        .unwrap()
    }

    fn scalar_names(plan: &ConstructionPlan) -> Vec<&str> {
        plan.scalars.iter().map(|s| s.name.as_str()).collect()
    }

    fn blog_entities() -> Vec<EntityDef> {
        vec![
            EntityDef::new("Blog")
                .with_field(FieldDef::scalar("Id", ValueType::Int32))
                .with_field(FieldDef::scalar("Title", ValueType::Text))
                .with_field(FieldDef::collection("Posts", "Post")),
            EntityDef::new("Post")
                .with_field(FieldDef::scalar("Id", ValueType::Int32))
                .with_field(FieldDef::nullable("BlogId", ValueType::Int32))
                .with_field(FieldDef::reference("Blog", "Blog")),
        ]
    }

    #[test]
    fn test_foreign_key_fields_excluded_from_scalars() {
        let mut keys = registry(blog_entities(), vec![]);
        let plan = compile(&mut keys, "Post", &Customizations::new());

        assert_eq!(scalar_names(&plan), vec!["Id"]);
        assert_eq!(plan.references.len(), 1);
        assert!(plan.identities.is_empty());
        assert!(plan.references[0].optional);
        assert!(matches!(plan.references[0].binding, Binding::Foreign(_)));
    }

    #[test]
    fn test_collection_with_back_navigation_needs_no_link() {
        let mut keys = registry(blog_entities(), vec![]);
        let plan = compile(&mut keys, "Blog", &Customizations::new());

        assert_eq!(scalar_names(&plan), vec!["Id", "Title"]);
        assert_eq!(plan.collections.len(), 1);
        assert!(plan.collections[0].link.is_none());
        assert_eq!(plan.collections[0].lookback, 1);
    }

    #[test]
    fn test_collection_without_back_navigation_links_keys() {
        let entities = vec![
            EntityDef::new("Order")
                .with_field(FieldDef::scalar("Id", ValueType::Int64))
                .with_field(FieldDef::collection("Lines", "Line")),
            EntityDef::new("Line")
                .with_field(FieldDef::scalar("Id", ValueType::Int64))
                .with_field(FieldDef::scalar("OrderId", ValueType::Int64)),
        ];
        let mut keys = registry(entities, vec![]);
        let plan = compile(&mut keys, "Order", &Customizations::new());

        let link = plan.collections[0].link.as_ref().unwrap();
        assert_eq!(link.foreign_key, vec!["OrderId".to_string()]);
    }

    #[test]
    fn test_identity_and_principal_bindings() {
        let entities = vec![
            EntityDef::new("User")
                .with_field(FieldDef::scalar("Id", ValueType::Int32))
                .with_field(FieldDef::reference("Profile", "Profile")),
            EntityDef::new("Profile")
                .with_field(FieldDef::scalar("Id", ValueType::Int32))
                .with_field(FieldDef::reference("User", "User")),
        ];
        let relations = vec![RelationDef::new("Profile", "User", ["Id"])];
        let mut keys = registry(entities, relations);

        let profile = compile(&mut keys, "Profile", &Customizations::new());
        assert_eq!(profile.identities.len(), 1);
        assert!(profile.references.is_empty());
        assert!(profile.scalars.is_empty());

        let user = compile(&mut keys, "User", &Customizations::new());
        assert_eq!(scalar_names(&user), vec!["Id"]);
        assert!(matches!(user.references[0].binding, Binding::Principal(_)));
        assert!(!user.references[0].optional);
    }

    #[test]
    fn test_skips_and_overrides() {
        let custom = Customizations::new()
            .skip_field("Blog", "Title")
            .skip_entity("Post")
            .singleton("Blog")
            .with_post_create("Blog", |_, _| Ok(()));
        let mut keys = registry(blog_entities(), vec![]);
        let plan = compile(&mut keys, "Blog", &custom);

        assert_eq!(scalar_names(&plan), vec!["Id"]);
        assert!(plan.collections.is_empty());
        assert!(plan.singleton);
        assert!(plan.post_create.is_some());
    }

    #[test]
    fn test_custom_value_overrides_default() {
        let entities = vec![EntityDef::new("File")
            .with_field(FieldDef::scalar("Id", ValueType::Int32))
            .with_field(FieldDef::scalar("Content", ValueType::Bytes))];
        let mut keys = registry(entities.clone(), vec![]);

        let result = ConstructionPlan::compile(
            "File",
            &mut keys,
            &ValueSynthesizer::new(),
            &Customizations::new(),
            &SynthesizerConfig::default(),
        );
        assert!(matches!(
            result,
            Err(SynthesisError::UnsupportedType { ref field, .. }) if field == "Content"
        ));

        let custom = Customizations::new().with_value("File", "Content", |_, _| {
            Value::Bytes(vec![1, 2, 3])
        });
        let mut keys = registry(entities, vec![]);
        let plan = compile(&mut keys, "File", &custom);
        assert_eq!(scalar_names(&plan), vec!["Id", "Content"]);
    }

    #[test]
    fn test_missing_foreign_key_is_fatal() {
        let entities = vec![
            EntityDef::new("A")
                .with_field(FieldDef::scalar("Id", ValueType::Int32))
                .with_field(FieldDef::reference("B", "B")),
            EntityDef::new("B").with_field(FieldDef::scalar("Id", ValueType::Int32)),
        ];
        let mut keys = registry(entities, vec![]);
        let result = ConstructionPlan::compile(
            "A",
            &mut keys,
            &ValueSynthesizer::new(),
            &Customizations::new(),
            &SynthesizerConfig::default(),
        );
        assert!(matches!(
            result,
            Err(SynthesisError::Key(KeyError::KeyResolution { .. }))
        ));
    }
}
