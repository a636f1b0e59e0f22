use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use tracing::debug;

use crate::error::ModelError;
use crate::metric::{names, Metric, MetricValue};
use crate::types::{EntityId, EntityVariant};

/// Edge in the ownership graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Application -> class or function.
    Contains,
    /// Function -> inner declaration, at a position in declaration order.
    Encloses { position: usize },
}

/// A code entity: an application, a class or a function.
///
/// Name, variant and return type are fixed at creation. Metrics can only be
/// added through the owning `CodeModel`.
#[derive(Debug, Clone)]
pub struct CodeEntity {
    name: String,
    variant: EntityVariant,
    return_type: Option<String>,
    metrics: BTreeMap<String, Metric>,
}

impl CodeEntity {
    fn new(name: &str, variant: EntityVariant, return_type: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            variant,
            return_type: return_type.map(str::to_string),
            metrics: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variant(&self) -> EntityVariant {
        self.variant
    }

    /// Declared return type. Only functions carry one.
    pub fn return_type(&self) -> Option<&str> {
        self.return_type.as_deref()
    }

    /// Metrics ordered by name.
    pub fn metrics(&self) -> impl Iterator<Item = &Metric> {
        self.metrics.values()
    }

    pub fn metric(&self, name: &str) -> Option<&Metric> {
        self.metrics.get(name)
    }

    pub fn metric_value(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).map(Metric::value)
    }

    pub fn has_metric(&self, name: &str) -> bool {
        self.metrics.contains_key(name)
    }

    pub fn metric_count(&self) -> usize {
        self.metrics.len()
    }
}

/// Ownership graph of applications, classes and functions with their metrics.
///
/// Populated during ingestion, then only read during analysis. Analysis
/// borrows the model immutably, so nothing can mutate it while a catalog runs.
#[derive(Debug, Clone)]
pub struct CodeModel {
    graph: DiGraph<CodeEntity, Ownership>,
}

impl CodeModel {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
        }
    }

    /// Allocate a new root application with no metrics and no children.
    pub fn create_application(&mut self, name: &str) -> EntityId {
        let idx = self
            .graph
            .add_node(CodeEntity::new(name, EntityVariant::Application, None));
        debug!(application = name, "created application");
        EntityId(idx)
    }

    /// Allocate a class and register it in `owner`'s children.
    pub fn create_class(&mut self, name: &str, owner: EntityId) -> Result<EntityId, ModelError> {
        self.create_child(CodeEntity::new(name, EntityVariant::Class, None), owner)
    }

    /// Allocate a function and register it in `owner`'s children.
    pub fn create_function(
        &mut self,
        name: &str,
        return_type: &str,
        owner: EntityId,
    ) -> Result<EntityId, ModelError> {
        self.create_child(
            CodeEntity::new(name, EntityVariant::Function, Some(return_type)),
            owner,
        )
    }

    fn create_child(&mut self, entity: CodeEntity, owner: EntityId) -> Result<EntityId, ModelError> {
        let owner_entity = self.get(owner)?;
        if owner_entity.variant != EntityVariant::Application {
            return Err(ModelError::InvalidOwner {
                name: entity.name,
                variant: owner_entity.variant,
            });
        }
        let idx = self.graph.add_node(entity);
        self.graph.add_edge(owner.0, idx, Ownership::Contains);
        Ok(EntityId(idx))
    }

    /// Append `nested` to the ordered inner declarations of `function`.
    ///
    /// A nested entity belongs to exactly one enclosing function.
    pub fn add_nested_entity(
        &mut self,
        function: EntityId,
        nested: EntityId,
    ) -> Result<(), ModelError> {
        let function_entity = self.get(function)?;
        let nested_entity = self.get(nested)?;

        if function_entity.variant != EntityVariant::Function {
            return Err(ModelError::NotAFunction {
                name: function_entity.name.clone(),
                variant: function_entity.variant,
            });
        }
        if nested_entity.variant == EntityVariant::Application {
            return Err(ModelError::NestedApplication {
                name: nested_entity.name.clone(),
            });
        }
        if let Some(current) = self.enclosing_function(nested) {
            return Err(ModelError::AlreadyNested {
                nested: nested_entity.name.clone(),
                function: self.graph[current.0].name.clone(),
            });
        }
        // Only Encloses edges leave classes and functions, so any path from
        // `nested` to `function` is a nesting chain.
        if petgraph::algo::has_path_connecting(&self.graph, nested.0, function.0, None) {
            return Err(ModelError::NestingCycle {
                nested: nested_entity.name.clone(),
                function: function_entity.name.clone(),
            });
        }

        let position = self.nested_entities(function).len();
        self.graph
            .add_edge(function.0, nested.0, Ownership::Encloses { position });
        Ok(())
    }

    /// Bind a new metric to `entity`.
    ///
    /// A second metric with the same name on the same entity is rejected with
    /// `ModelError::NamingConflict` and the existing metric is kept.
    pub fn attach_metric(
        &mut self,
        entity: EntityId,
        name: &str,
        value: impl Into<MetricValue>,
    ) -> Result<&Metric, ModelError> {
        let value = value.into().as_f64();
        let node = self
            .graph
            .node_weight_mut(entity.0)
            .ok_or(ModelError::UnknownEntity(entity))?;

        if !value.is_finite() {
            return Err(ModelError::NonFiniteValue {
                entity: node.name.clone(),
                metric: name.to_string(),
                value,
            });
        }

        match node.metrics.entry(name.to_string()) {
            Entry::Occupied(_) => Err(ModelError::NamingConflict {
                entity: node.name.clone(),
                metric: name.to_string(),
            }),
            Entry::Vacant(slot) => Ok(slot.insert(Metric::new(name.to_string(), value, entity))),
        }
    }

    /// Attach `number_of_classes` to an application from its class children.
    pub fn attach_class_count(&mut self, application: EntityId) -> Result<&Metric, ModelError> {
        let app = self.get(application)?;
        if app.variant != EntityVariant::Application {
            return Err(ModelError::InvalidOwner {
                name: app.name.clone(),
                variant: app.variant,
            });
        }
        let count = self
            .children(application)
            .into_iter()
            .filter(|id| self.graph[id.0].variant == EntityVariant::Class)
            .count();
        self.attach_metric(application, names::NUMBER_OF_CLASSES, count)
    }

    /// Diagnostic rendering: one `"<entity> <metric> : <value>"` line per metric.
    pub fn describe(&self, entity: EntityId) -> Result<String, ModelError> {
        let node = self.get(entity)?;
        let lines: Vec<String> = node
            .metrics()
            .map(|m| format!("{} {m}", node.name))
            .collect();
        Ok(lines.join("\n"))
    }

    pub fn entity(&self, id: EntityId) -> Option<&CodeEntity> {
        self.graph.node_weight(id.0)
    }

    fn get(&self, id: EntityId) -> Result<&CodeEntity, ModelError> {
        self.entity(id).ok_or(ModelError::UnknownEntity(id))
    }

    /// All entities of one variant, in creation order.
    pub fn entities(
        &self,
        variant: EntityVariant,
    ) -> impl Iterator<Item = (EntityId, &CodeEntity)> + '_ {
        self.graph
            .node_indices()
            .map(move |idx| (EntityId(idx), &self.graph[idx]))
            .filter(move |(_, entity)| entity.variant == variant)
    }

    pub fn applications(&self) -> Vec<EntityId> {
        self.entities(EntityVariant::Application)
            .map(|(id, _)| id)
            .collect()
    }

    /// Classes and functions contained by an application, in creation order.
    pub fn children(&self, application: EntityId) -> Vec<EntityId> {
        let mut children: Vec<NodeIndex> = self
            .graph
            .edges_directed(application.0, petgraph::Direction::Outgoing)
            .filter(|e| *e.weight() == Ownership::Contains)
            .map(|e| e.target())
            .collect();
        children.sort();
        children.into_iter().map(EntityId).collect()
    }

    /// Inner declarations of a function, in the order they were added.
    pub fn nested_entities(&self, function: EntityId) -> Vec<EntityId> {
        let mut nested: Vec<(usize, NodeIndex)> = self
            .graph
            .edges_directed(function.0, petgraph::Direction::Outgoing)
            .filter_map(|e| match *e.weight() {
                Ownership::Encloses { position } => Some((position, e.target())),
                Ownership::Contains => None,
            })
            .collect();
        nested.sort();
        nested.into_iter().map(|(_, idx)| EntityId(idx)).collect()
    }

    /// The application that contains this entity.
    pub fn owner(&self, id: EntityId) -> Option<EntityId> {
        self.incoming(id, |w| *w == Ownership::Contains)
    }

    /// The function this entity is nested in, if any.
    pub fn enclosing_function(&self, id: EntityId) -> Option<EntityId> {
        self.incoming(id, |w| matches!(w, Ownership::Encloses { .. }))
    }

    fn incoming(&self, id: EntityId, pred: impl Fn(&Ownership) -> bool) -> Option<EntityId> {
        if self.graph.node_weight(id.0).is_none() {
            return None;
        }
        self.graph
            .edges_directed(id.0, petgraph::Direction::Incoming)
            .find(|e| pred(e.weight()))
            .map(|e| EntityId(e.source()))
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn metric_count(&self) -> usize {
        self.graph.node_weights().map(CodeEntity::metric_count).sum()
    }
}

impl Default for CodeModel {
    fn default() -> Self {
        Self::new()
    }
}
