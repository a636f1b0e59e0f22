//! JSON model documents.
//!
//! A document lists applications with their classes and functions. Functions
//! may declare nested classes and functions inline; those are created under
//! the same application and then attached to the enclosing function in
//! declaration order.

use anyhow::{Context, Result};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::Path;
use tracing::debug;

use crate::metric::{names, MetricValue};
use crate::model::CodeModel;
use crate::types::EntityId;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelDocument {
    #[serde(default)]
    pub applications: Vec<ApplicationDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationDocument {
    pub name: String,
    #[serde(default, with = "metric_entries")]
    pub metrics: Vec<(String, MetricValue)>,
    #[serde(default)]
    pub classes: Vec<ClassDocument>,
    #[serde(default)]
    pub functions: Vec<FunctionDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDocument {
    pub name: String,
    #[serde(default, with = "metric_entries")]
    pub metrics: Vec<(String, MetricValue)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDocument {
    pub name: String,
    #[serde(default = "default_return_type")]
    pub return_type: String,
    #[serde(default, with = "metric_entries")]
    pub metrics: Vec<(String, MetricValue)>,
    #[serde(default)]
    pub nested: Vec<NestedDocument>,
}

fn default_return_type() -> String {
    "void".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NestedDocument {
    Class(ClassDocument),
    Function(FunctionDocument),
}

impl ModelDocument {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("failed to parse model document")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read model file '{}'", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse model file '{}'", path.display()))
    }

    /// Build a model. Applications get `number_of_classes` derived from
    /// their classes unless the document sets it.
    pub fn build(&self) -> Result<CodeModel> {
        let mut model = CodeModel::new();
        for app_doc in &self.applications {
            let app = model.create_application(&app_doc.name);
            attach_all(&mut model, app, &app_doc.metrics)
                .with_context(|| format!("in application '{}'", app_doc.name))?;

            for class in &app_doc.classes {
                build_class(&mut model, app, class)
                    .with_context(|| format!("in application '{}'", app_doc.name))?;
            }
            for function in &app_doc.functions {
                build_function(&mut model, app, function)
                    .with_context(|| format!("in application '{}'", app_doc.name))?;
            }

            if !app_doc
                .metrics
                .iter()
                .any(|(name, _)| name == names::NUMBER_OF_CLASSES)
            {
                model.attach_class_count(app)?;
            }
        }
        debug!(
            entities = model.len(),
            metrics = model.metric_count(),
            "built model from document"
        );
        Ok(model)
    }
}

/// Read and build a model file in one step.
pub fn load_model(path: &Path) -> Result<CodeModel> {
    ModelDocument::load(path)?
        .build()
        .with_context(|| format!("invalid model file '{}'", path.display()))
}

fn build_class(model: &mut CodeModel, app: EntityId, doc: &ClassDocument) -> Result<EntityId> {
    let id = model.create_class(&doc.name, app)?;
    attach_all(model, id, &doc.metrics).with_context(|| format!("in class '{}'", doc.name))?;
    Ok(id)
}

fn build_function(
    model: &mut CodeModel,
    app: EntityId,
    doc: &FunctionDocument,
) -> Result<EntityId> {
    let id = model.create_function(&doc.name, &doc.return_type, app)?;
    attach_all(model, id, &doc.metrics).with_context(|| format!("in function '{}'", doc.name))?;

    for nested in &doc.nested {
        let inner = match nested {
            NestedDocument::Class(class) => build_class(model, app, class),
            NestedDocument::Function(function) => build_function(model, app, function),
        }
        .with_context(|| format!("in function '{}'", doc.name))?;
        model.add_nested_entity(id, inner)?;
    }
    Ok(id)
}

fn attach_all(
    model: &mut CodeModel,
    entity: EntityId,
    metrics: &[(String, MetricValue)],
) -> Result<()> {
    for (name, value) in metrics {
        // false flags are simply absent
        if *value == MetricValue::Flag(false) {
            continue;
        }
        model.attach_metric(entity, name, *value)?;
    }
    Ok(())
}

/// Metric objects kept in document order with repeated keys intact, so a
/// duplicate name reaches `attach_metric` and is rejected there.
mod metric_entries {
    use super::*;

    pub fn serialize<S>(entries: &[(String, MetricValue)], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (name, value) in entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<(String, MetricValue)>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(EntriesVisitor)
    }

    struct EntriesVisitor;

    impl<'de> Visitor<'de> for EntriesVisitor {
        type Value = Vec<(String, MetricValue)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of metric names to numbers or booleans")
        }

        fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((name, value)) = access.next_entry::<String, MetricValue>()? {
                entries.push((name, value));
            }
            Ok(entries)
        }
    }
}
