use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::EntityId;

/// Names of the metrics the built-in catalog reads.
pub mod names {
    pub const CLASS_COMPLEXITY: &str = "class_complexity";
    pub const CYCLOMATIC_COMPLEXITY: &str = "cyclomatic_complexity";
    pub const NUMBER_OF_LINES: &str = "number_of_lines";
    pub const NUMBER_OF_METHODS: &str = "number_of_methods";
    pub const NUMBER_OF_ATTRIBUTES: &str = "number_of_attributes";
    pub const NUMBER_OF_CLASSES: &str = "number_of_classes";
    pub const NUMBER_OF_IMPLEMENTED_INTERFACES: &str = "number_of_implemented_interfaces";
    pub const COHESION_AMONG_METHODS_OF_CLASS: &str = "cohesion_among_methods_of_class";

    // Flags, attached only when true.
    pub const IS_INTERFACE: &str = "is_interface";
    pub const IS_GETTER: &str = "is_getter";
    pub const IS_SETTER: &str = "is_setter";
    pub const IS_VIEW_CONTROLLER: &str = "is_view_controller";
}

/// A metric value as it arrives from ingestion, before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Flag(bool),
    Integer(i64),
    Float(f64),
}

impl MetricValue {
    /// Normalize to double precision. Flags become 1.0 / 0.0.
    pub fn as_f64(&self) -> f64 {
        match *self {
            MetricValue::Flag(b) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            }
            MetricValue::Integer(i) => i as f64,
            MetricValue::Float(f) => f,
        }
    }
}

impl From<bool> for MetricValue {
    fn from(value: bool) -> Self {
        MetricValue::Flag(value)
    }
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        MetricValue::Integer(value)
    }
}

impl From<i32> for MetricValue {
    fn from(value: i32) -> Self {
        MetricValue::Integer(i64::from(value))
    }
}

impl From<u32> for MetricValue {
    fn from(value: u32) -> Self {
        MetricValue::Integer(i64::from(value))
    }
}

impl From<usize> for MetricValue {
    fn from(value: usize) -> Self {
        MetricValue::Integer(value as i64)
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::Float(value)
    }
}

/// A named scalar measurement bound to exactly one entity.
///
/// Fields are private: a metric is created by `CodeModel::attach_metric`
/// and can never be rebound to another entity or change value.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    name: String,
    value: f64,
    owner: EntityId,
}

impl Metric {
    pub(crate) fn new(name: String, value: f64, owner: EntityId) -> Self {
        Self { name, value, owner }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn owner(&self) -> EntityId {
        self.owner
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : {}", self.name, self.value)
    }
}
