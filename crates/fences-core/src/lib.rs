pub mod catalog;
pub mod config;
pub mod distribution;
pub mod document;
pub mod error;
pub mod export;
pub mod metric;
pub mod model;
pub mod predicate;
pub mod stats;
pub mod store;
pub mod threshold;
pub mod types;

pub use catalog::{AnalysisEntry, BatchPolicy, BatchReport, EntryOutcome, ReportCatalog};
pub use config::Config;
pub use distribution::{Distribution, DistributionQuery, DistributionSource, Quartiles};
pub use error::{CatalogError, EntryError, ExportError, ModelError, PredicateError, QueryError};
pub use export::{ExportSink, MemorySink};
pub use model::{CodeEntity, CodeModel};
pub use predicate::Predicate;
pub use store::ModelStore;
pub use threshold::{compute_thresholds, Fences, ThresholdOutcome, ThresholdSet};
pub use types::*;
