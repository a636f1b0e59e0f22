use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::catalog::{AnalysisEntry, BatchPolicy, ReportCatalog};
use crate::error::CatalogError;
use crate::predicate::Predicate;
use crate::types::{Direction, EntityVariant};

pub const CONFIG_FILE: &str = ".fences.toml";

/// Top-level configuration from `.fences.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Where stat files are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    /// Prepended to every output label. Defaults to the model file stem.
    #[serde(default)]
    pub prefix: Option<String>,
}

fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            prefix: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default)]
    pub on_error: BatchPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_true")]
    pub include_builtin: bool,
    #[serde(default)]
    pub skip: Vec<String>,
    #[serde(default)]
    pub analyses: Vec<AnalysisConfig>,
}

fn default_true() -> bool {
    true
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            include_builtin: true,
            skip: Vec::new(),
            analyses: Vec::new(),
        }
    }
}

/// A user-defined analysis row. The filter stays a string until the
/// catalog is built so parse errors can name the analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub name: String,
    pub variant: EntityVariant,
    pub property: String,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default = "default_direction")]
    pub direction: Direction,
    pub output: String,
}

fn default_direction() -> Direction {
    Direction::HighIsBad
}

impl AnalysisConfig {
    pub fn to_entry(&self) -> Result<AnalysisEntry, CatalogError> {
        let filter = match self.filter.as_deref() {
            Some(expr) => Predicate::parse(expr).map_err(|source| CatalogError::InvalidFilter {
                name: self.name.clone(),
                source,
            })?,
            None => Predicate::Always,
        };
        Ok(AnalysisEntry {
            name: self.name.clone(),
            variant: self.variant,
            property: self.property.clone(),
            filter,
            direction: self.direction,
            output: self.output.clone(),
        })
    }
}

impl Config {
    /// Load configuration from a `.fences.toml` file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        let config: Config = toml::from_str(&content).with_context(|| {
            format!(
                "failed to parse '{}'. Run `fences init` to create a valid config file",
                path.display()
            )
        })?;
        Ok(config)
    }

    /// Load from `.fences.toml` in the given directory or any ancestor, or return defaults.
    pub fn load_or_default(dir: &Path) -> Self {
        let start = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        for current in start.ancestors() {
            let config_path = current.join(CONFIG_FILE);
            if config_path.exists() {
                return match Self::load(&config_path) {
                    Ok(config) => config,
                    Err(e) => {
                        warn!(
                            path = %config_path.display(),
                            error = format!("{e:#}").as_str(),
                            "failed to load config, using defaults"
                        );
                        Self::default()
                    }
                };
            }
        }
        Self::default()
    }

    /// The effective catalog: built-ins (unless disabled) minus skipped
    /// entries, plus configured analyses.
    pub fn catalog(&self) -> Result<ReportCatalog, CatalogError> {
        let base = if self.catalog.include_builtin {
            ReportCatalog::builtin()
        } else {
            ReportCatalog::new(Vec::new())?
        };
        let extra = self
            .catalog
            .analyses
            .iter()
            .map(AnalysisConfig::to_entry)
            .collect::<Result<Vec<_>, _>>()?;
        // Skipped names may refer to configured analyses too.
        let combined = base.extended(extra)?;
        combined.without(&self.catalog.skip)
    }

    /// Generate default TOML content for `fences init`.
    pub fn default_toml() -> String {
        r#"# Fences - outlier threshold configuration

[output]
# Directory that receives the _STAT_*.csv files
directory = "."
# Prepended to every file name; defaults to the model file stem
# prefix = "myapp"

[batch]
# "continue" runs every analysis; "abort" skips the rest after a failure
on_error = "continue"

[catalog]
include_builtin = true
# skip = ["view_controller_lines"]

# Extra analyses. Filters use: and, or, not, has(name), comparisons.
# [[catalog.analyses]]
# name = "long_getters"
# variant = "function"
# property = "number_of_lines"
# filter = "has(is_getter) and number_of_lines > 0"
# direction = "high-is-bad"
# output = "_STAT_NB_GETTER_LINES.csv"
"#
        .to_string()
    }
}
