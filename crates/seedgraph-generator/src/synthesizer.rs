//! Graph synthesizer producing fully wired object graphs.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use seedgraph_core::{
    GraphError, GraphId, KeyError, KeyRegistry, KeyTuple, ObjectGraph, ObjectId, Schema,
    SchemaError, Value, ValueType,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::chain::AncestryChain;
use crate::config::SynthesizerConfig;
use crate::customize::Customizations;
use crate::generators::nullable::NULL_PROBABILITY;
use crate::plan::{Binding, CollectionStep, ConstructionPlan, ReferenceStep};
use crate::value_synthesizer::ValueSynthesizer;

/// Error type for graph synthesis.
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    /// Schema lookup error
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Key resolution error
    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    /// Object graph error, including errors raised by custom closures
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// A scalar field has neither a custom nor a default value creator
    #[error("No value creator for '{entity}.{field}' of type {value_type}")]
    UnsupportedType {
        entity: String,
        field: String,
        value_type: ValueType,
    },

    /// A path from the root would hold more objects than allowed
    #[error("Recursion limit of {limit} reached while creating '{entity}'")]
    RecursionLimitExceeded { entity: String, limit: usize },

    /// One synthesis constructed more objects than allowed
    #[error("Object limit of {limit} reached while creating '{entity}'")]
    ObjectLimitExceeded { entity: String, limit: usize },

    /// A reused singleton is already linked to a different object
    #[error(
        "Singleton '{entity}' field '{field}' is linked to {existing} but the chain resolved {resolved}"
    )]
    AmbiguousSingletonBinding {
        entity: String,
        field: String,
        existing: ObjectId,
        resolved: ObjectId,
    },

    /// The target graph was created for a different schema instance
    #[error("Object graph does not share the synthesizer's schema")]
    SchemaMismatch,
}

/// Synthesizes object graphs in which every reference is populated and
/// every foreign key equals the referenced object's primary key.
///
/// Cycles terminate by reusing an ancestor found on the ancestry chain
/// within the configured lookback. Two ceilings bound every synthesis: the
/// chain depth and the number of objects constructed.
pub struct GraphSynthesizer {
    schema: Arc<Schema>,
    config: SynthesizerConfig,
    keys: KeyRegistry,
    values: ValueSynthesizer,
    customizations: Customizations,
    plans: HashMap<String, Arc<ConstructionPlan>>,
    singletons: HashMap<(GraphId, String), ObjectId>,
    rng: StdRng,
    objects_created: usize,
}

impl fmt::Debug for GraphSynthesizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphSynthesizer")
            .field("config", &self.config)
            .field("customizations", &self.customizations)
            .field("plans", &self.plans.keys().collect::<Vec<_>>())
            .field("singletons", &self.singletons)
            .field("objects_created", &self.objects_created)
            .finish()
    }
}

impl GraphSynthesizer {
    /// Create a synthesizer for a schema.
    pub fn new(schema: Arc<Schema>, config: SynthesizerConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            keys: KeyRegistry::new(Arc::clone(&schema)),
            schema,
            config,
            values: ValueSynthesizer::new(),
            customizations: Customizations::new(),
            plans: HashMap::new(),
            singletons: HashMap::new(),
            rng,
            objects_created: 0,
        }
    }

    /// Apply customizations, validating them against the schema.
    pub fn with_customizations(
        mut self,
        customizations: Customizations,
    ) -> Result<Self, SynthesisError> {
        customizations.validate(&self.schema)?;
        self.customizations = customizations;
        self.plans.clear();
        Ok(self)
    }

    /// Override the primary key of an entity.
    pub fn register_primary_key<I, S>(&mut self, entity: &str, fields: I) -> Result<(), KeyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.plans.clear();
        self.keys.register_primary_key(entity, fields)
    }

    /// Override the foreign key from `source` to `target`.
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
        self.plans.clear();
        self.keys.register_foreign_key(source, target, fields)
    }

    /// Create an empty graph sharing this synthesizer's schema.
    pub fn new_graph(&self) -> ObjectGraph {
        ObjectGraph::new(Arc::clone(&self.schema))
    }

    /// The schema objects are synthesized from.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// The active configuration.
    pub fn config(&self) -> &SynthesizerConfig {
        &self.config
    }

    /// Number of objects constructed by the most recent `create`.
    pub fn objects_created(&self) -> usize {
        self.objects_created
    }

    /// The singleton instance of `entity` in `graph`, if one was created.
    pub fn singleton(&self, graph: &ObjectGraph, entity: &str) -> Option<ObjectId> {
        self.singletons
            .get(&(graph.id(), entity.to_string()))
            .copied()
    }

    /// Synthesize one instance of `entity` together with everything it
    /// references.
    pub fn create(
        &mut self,
        graph: &mut ObjectGraph,
        entity: &str,
    ) -> Result<ObjectId, SynthesisError> {
        if !Arc::ptr_eq(graph.schema(), &self.schema) {
            return Err(SynthesisError::SchemaMismatch);
        }

        self.objects_created = 0;
        let mut chain = AncestryChain::default();
        let id = self.build(graph, entity, &mut chain)?;

        debug!(
            entity,
            object = %id,
            objects_created = self.objects_created,
            "Synthesized object graph"
        );
        Ok(id)
    }

    /// Synthesize `count` independent instances of `entity`.
    ///
    /// Returns an iterator that lazily runs one `create` per item.
    pub fn create_many<'a>(
        &'a mut self,
        graph: &'a mut ObjectGraph,
        entity: &str,
        count: usize,
    ) -> CreateMany<'a> {
        CreateMany {
            synthesizer: self,
            graph,
            entity: entity.to_string(),
            remaining: count,
        }
    }

    // =========================================================================
    // Construction
    // =========================================================================

    fn plan(&mut self, entity: &str) -> Result<Arc<ConstructionPlan>, SynthesisError> {
        if let Some(plan) = self.plans.get(entity) {
            return Ok(Arc::clone(plan));
        }

        let plan = Arc::new(ConstructionPlan::compile(
            entity,
            &mut self.keys,
            &self.values,
            &self.customizations,
            &self.config,
        )?);
        debug!(
            entity,
            scalars = plan.scalars.len(),
            identities = plan.identities.len(),
            references = plan.references.len(),
            collections = plan.collections.len(),
            singleton = plan.singleton,
            "Compiled construction plan"
        );

        self.plans.insert(entity.to_string(), Arc::clone(&plan));
        Ok(plan)
    }

    fn build(
        &mut self,
        graph: &mut ObjectGraph,
        entity: &str,
        chain: &mut AncestryChain,
    ) -> Result<ObjectId, SynthesisError> {
        let plan = self.plan(entity)?;

        if plan.singleton {
            if let Some(existing) = self.singleton(graph, entity) {
                debug!(entity, object = %existing, "Reusing singleton");
                self.rebind_singleton(graph, &plan, existing, chain)?;
                return Ok(existing);
            }
        }

        if let Some(constructor) = &plan.constructor {
            let id = constructor(graph, &mut self.rng)?;
            if plan.singleton {
                self.singletons
                    .insert((graph.id(), entity.to_string()), id);
            }
            self.run_hooks(graph, &plan, id)?;
            return Ok(id);
        }

        if chain.depth() >= self.config.recursion_limit {
            warn!(entity, limit = self.config.recursion_limit, "Recursion limit reached");
            return Err(SynthesisError::RecursionLimitExceeded {
                entity: entity.to_string(),
                limit: self.config.recursion_limit,
            });
        }
        if self.objects_created >= self.config.object_limit {
            warn!(entity, limit = self.config.object_limit, "Object limit reached");
            return Err(SynthesisError::ObjectLimitExceeded {
                entity: entity.to_string(),
                limit: self.config.object_limit,
            });
        }

        let id = graph.allocate(entity)?;
        self.objects_created += 1;
        // Registered before wiring so cycles back to this entity reuse it
        if plan.singleton {
            self.singletons
                .insert((graph.id(), entity.to_string()), id);
        }

        for step in &plan.scalars {
            let value = (step.creator)(&mut self.rng, &step.name);
            graph.set_value(id, &step.name, value)?;
        }

        // Identity relations settle the primary key before anything copies it
        for step in &plan.identities {
            self.bind_reference(graph, &plan, id, step, chain)?;
        }
        for step in &plan.references {
            self.bind_reference(graph, &plan, id, step, chain)?;
        }

        let is_root = chain.depth() == 0;
        for step in &plan.collections {
            self.bind_collection(graph, &plan, id, step, chain, is_root)?;
        }

        self.run_hooks(graph, &plan, id)?;
        Ok(id)
    }

    fn build_child(
        &mut self,
        graph: &mut ObjectGraph,
        parent: &ConstructionPlan,
        parent_id: ObjectId,
        entity: &str,
        chain: &mut AncestryChain,
    ) -> Result<ObjectId, SynthesisError> {
        chain.push(Arc::clone(&parent.entity), parent_id);
        let result = self.build(graph, entity, chain);
        chain.pop();
        result
    }

    fn bind_reference(
        &mut self,
        graph: &mut ObjectGraph,
        plan: &ConstructionPlan,
        owner: ObjectId,
        step: &ReferenceStep,
        chain: &mut AncestryChain,
    ) -> Result<(), SynthesisError> {
        let related = match chain.find(&step.target, step.lookback) {
            Some(ancestor) => Some(ancestor),
            None if step.optional && self.rng.random_bool(NULL_PROBABILITY) => None,
            None => Some(self.build_child(graph, plan, owner, &step.target, chain)?),
        };
        link(graph, owner, step, related)
    }

    fn bind_collection(
        &mut self,
        graph: &mut ObjectGraph,
        plan: &ConstructionPlan,
        owner: ObjectId,
        step: &CollectionStep,
        chain: &mut AncestryChain,
        is_root: bool,
    ) -> Result<(), SynthesisError> {
        if let Some(ancestor) = chain.find(&step.element, step.lookback) {
            return add_element(graph, owner, step, ancestor);
        }

        let count = step.include_count.unwrap_or(if is_root {
            self.config.root_include_count
        } else {
            self.config.leaf_include_count
        });
        for _ in 0..count {
            let element = self.build_child(graph, plan, owner, &step.element, chain)?;
            add_element(graph, owner, step, element)?;
        }
        Ok(())
    }

    /// Wire a reused singleton to the objects currently on the chain
    /// without creating anything.
    fn rebind_singleton(
        &self,
        graph: &mut ObjectGraph,
        plan: &ConstructionPlan,
        singleton: ObjectId,
        chain: &AncestryChain,
    ) -> Result<(), SynthesisError> {
        for step in &plan.references {
            let Some(resolved) = chain.find(&step.target, step.lookback) else {
                continue;
            };
            match graph.reference(singleton, &step.name)? {
                Some(existing) if existing == resolved => {}
                Some(existing) => {
                    return Err(SynthesisError::AmbiguousSingletonBinding {
                        entity: plan.entity.to_string(),
                        field: step.name.clone(),
                        existing,
                        resolved,
                    });
                }
                None => link(graph, singleton, step, Some(resolved))?,
            }
        }

        for step in &plan.collections {
            if let Some(ancestor) = chain.find(&step.element, step.lookback) {
                add_element(graph, singleton, step, ancestor)?;
            }
        }
        Ok(())
    }

    fn run_hooks(
        &self,
        graph: &mut ObjectGraph,
        plan: &ConstructionPlan,
        id: ObjectId,
    ) -> Result<(), SynthesisError> {
        for hook in &plan.field_hooks {
            hook(graph, id)?;
        }
        if let Some(hook) = &plan.post_create {
            hook(graph, id)?;
        }
        Ok(())
    }
}

/// Set a reference and copy keys so the foreign key matches the related
/// object's primary key.
fn link(
    graph: &mut ObjectGraph,
    owner: ObjectId,
    step: &ReferenceStep,
    related: Option<ObjectId>,
) -> Result<(), SynthesisError> {
    graph.set_reference(owner, &step.name, related)?;

    match (&step.binding, related) {
        (Binding::Foreign(relation), Some(related)) => {
            let key = graph.key(related, &relation.target_key);
            graph.set_key_at(owner, &relation.fk_indices, &key);
        }
        (Binding::Foreign(relation), None) => {
            let nulls = KeyTuple::new(vec![Value::Null; relation.fk_indices.len()]);
            graph.set_key_at(owner, &relation.fk_indices, &nulls);
        }
        (Binding::Principal(relation), Some(dependent)) => {
            let key = graph.key(owner, &relation.target_key);
            graph.set_key_at(dependent, &relation.fk_indices, &key);
        }
        (Binding::Principal(_), None) => {}
    }
    Ok(())
}

fn add_element(
    graph: &mut ObjectGraph,
    owner: ObjectId,
    step: &CollectionStep,
    element: ObjectId,
) -> Result<(), SynthesisError> {
    if !graph.collection(owner, &step.name)?.contains(&element) {
        graph.push_to_collection(owner, &step.name, element)?;
    }
    if let Some(relation) = &step.link {
        let key = graph.key(owner, &relation.target_key);
        graph.set_key_at(element, &relation.fk_indices, &key);
    }
    Ok(())
}

/// Iterator that lazily synthesizes independent object graphs.
pub struct CreateMany<'a> {
    synthesizer: &'a mut GraphSynthesizer,
    graph: &'a mut ObjectGraph,
    entity: String,
    remaining: usize,
}

impl Iterator for CreateMany<'_> {
    type Item = Result<ObjectId, SynthesisError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        self.remaining -= 1;
        Some(self.synthesizer.create(self.graph, &self.entity))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for CreateMany<'_> {}
