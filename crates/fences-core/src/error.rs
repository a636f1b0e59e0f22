use thiserror::Error;

use crate::types::{EntityId, EntityVariant};

/// Errors raised while building the entity/metric model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("entity {0} does not exist in this model")]
    UnknownEntity(EntityId),

    #[error("'{entity}' already has a metric named '{metric}'")]
    NamingConflict { entity: String, metric: String },

    #[error("metric '{metric}' on '{entity}' is not a finite number: {value}")]
    NonFiniteValue {
        entity: String,
        metric: String,
        value: f64,
    },

    #[error("'{name}' must be owned by an application, not a {variant}")]
    InvalidOwner { name: String, variant: EntityVariant },

    #[error("nested entities can only be added to functions, '{name}' is a {variant}")]
    NotAFunction { name: String, variant: EntityVariant },

    #[error("application '{name}' cannot be nested inside a function")]
    NestedApplication { name: String },

    #[error("'{nested}' is already nested inside '{function}'")]
    AlreadyNested { nested: String, function: String },

    #[error("nesting '{nested}' inside '{function}' would make it enclose itself")]
    NestingCycle { nested: String, function: String },
}

/// Errors raised while parsing a filter expression.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("invalid filter '{expr}' at offset {offset}: {reason}")]
pub struct PredicateError {
    pub expr: String,
    pub offset: usize,
    pub reason: String,
}

/// Errors raised by a distribution source or while normalizing its rows.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("query for '{analysis}' failed: {message}")]
    Failed { analysis: String, message: String },

    #[error("query for '{analysis}' returned a non-numeric {column} for '{property}': {value}")]
    MalformedValue {
        analysis: String,
        property: String,
        column: &'static str,
        value: String,
    },

    #[error("query for '{analysis}' returned {rows} rows, expected exactly one")]
    UnexpectedRows { analysis: String, rows: usize },

    #[error("query for '{analysis}' returned unordered quartiles Q1={q1}, MED={median}, Q3={q3}")]
    InconsistentQuartiles {
        analysis: String,
        q1: f64,
        median: f64,
        q3: f64,
    },
}

/// Failure of an export sink to persist one threshold set.
#[derive(Error, Debug)]
#[error("failed to export '{label}': {message}")]
pub struct ExportError {
    pub label: String,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ExportError {
    pub fn new(label: &str, message: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        label: &str,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            label: label.to_string(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Errors raised while assembling a report catalog.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("duplicate analysis name '{0}'")]
    DuplicateName(String),

    #[error("analyses '{first}' and '{second}' both write to '{label}'")]
    DuplicateLabel {
        label: String,
        first: String,
        second: String,
    },

    #[error("unknown analysis '{0}'")]
    UnknownAnalysis(String),

    #[error("analysis '{name}' has an invalid filter: {source}")]
    InvalidFilter {
        name: String,
        #[source]
        source: PredicateError,
    },
}

/// Failure of a single catalog entry.
#[derive(Error, Debug)]
pub enum EntryError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Export(#[from] ExportError),
}
