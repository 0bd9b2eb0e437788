//! Relation consistency checks over an [`ObjectGraph`].
//!
//! Both checks return human-readable descriptions of every violation found,
//! so a failing assertion shows exactly which object and field disagree.

use seedgraph_core::{KeyError, KeyRegistry, ObjectGraph};

/// Find references whose foreign key differs from the primary key of the
/// referenced object.
///
/// The principal side of a shared-key 1:1 carries no foreign key; there the
/// dependent's key is compared with the principal's instead.
pub fn key_mismatches(graph: &ObjectGraph, keys: &mut KeyRegistry) -> anyhow::Result<Vec<String>> {
    let schema = std::sync::Arc::clone(graph.schema());
    let mut mismatches = Vec::new();

    for id in graph.ids() {
        let entity = graph.entity_of(id)?;
        let def = schema.require_entity(entity)?;

        for (_, field) in def.reference_fields() {
            let Some(target) = graph.reference(id, &field.name)? else {
                continue;
            };
            let target_entity = graph.entity_of(target)?;

            let (dependent, principal, relation) = match keys.foreign_key(entity, target_entity) {
                Ok(relation) => (id, target, relation),
                Err(KeyError::KeyResolution { .. }) => {
                    match keys.inverse_identity(entity, target_entity)? {
                        Some(relation) => (target, id, relation),
                        None => continue,
                    }
                }
                Err(err) => return Err(err.into()),
            };

            let foreign = graph.key_at(dependent, &relation.fk_indices);
            let primary = graph.key(principal, &relation.target_key);
            if foreign != primary {
                mismatches.push(format!(
                    "{entity} {id}.{}: foreign key {foreign} != primary key {primary} of {target_entity} {target}",
                    field.name
                ));
            }
        }
    }
    Ok(mismatches)
}

/// Find collection elements whose back-reference does not point at the
/// collection's owner, and back-references missing from the owner's
/// collection.
pub fn collection_mismatches(graph: &ObjectGraph) -> anyhow::Result<Vec<String>> {
    let schema = std::sync::Arc::clone(graph.schema());
    let mut mismatches = Vec::new();

    for owner in graph.ids() {
        let entity = graph.entity_of(owner)?;
        let def = schema.require_entity(entity)?;

        for (_, field) in def.collection_fields() {
            let Some(element_entity) = field.related_entity() else {
                continue;
            };
            let element_def = schema.require_entity(element_entity)?;
            let Some((_, back)) = element_def
                .reference_fields()
                .find(|(_, f)| f.related_entity() == Some(entity))
            else {
                continue;
            };

            let elements = graph.collection(owner, &field.name)?;
            for &element in elements {
                if graph.reference(element, &back.name)? != Some(owner) {
                    mismatches.push(format!(
                        "{entity} {owner}.{} holds {element_entity} {element} whose {} points elsewhere",
                        field.name, back.name
                    ));
                }
            }

            for element in graph.ids() {
                if graph.is_instance(element, element_entity)
                    && graph.reference(element, &back.name)? == Some(owner)
                    && !elements.contains(&element)
                {
                    mismatches.push(format!(
                        "{element_entity} {element}.{} points at {entity} {owner} but is missing from {}",
                        back.name, field.name
                    ));
                }
            }
        }
    }
    Ok(mismatches)
}
