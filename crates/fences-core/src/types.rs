use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle to an entity inside one `CodeModel`.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct EntityId(pub(crate) NodeIndex);

impl EntityId {
    pub fn index(&self) -> usize {
        self.0.index()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0.index())
    }
}

/// Kind of code entity in the analyzed model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityVariant {
    #[serde(alias = "app")]
    Application,
    Class,
    #[serde(alias = "method")]
    Function,
}

impl EntityVariant {
    pub fn all() -> &'static [EntityVariant] {
        &[
            EntityVariant::Application,
            EntityVariant::Class,
            EntityVariant::Function,
        ]
    }
}

impl fmt::Display for EntityVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityVariant::Application => write!(f, "application"),
            EntityVariant::Class => write!(f, "class"),
            EntityVariant::Function => write!(f, "function"),
        }
    }
}

impl std::str::FromStr for EntityVariant {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "application" | "app" => Ok(EntityVariant::Application),
            "class" => Ok(EntityVariant::Class),
            "function" | "method" => Ok(EntityVariant::Function),
            _ => Err(anyhow::anyhow!("unknown entity variant: {s}")),
        }
    }
}

/// Which end of a metric's distribution indicates poor structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    HighIsBad,
    LowIsBad,
}

impl Direction {
    /// Column keys of a threshold set in this direction, in output order.
    pub fn columns(&self) -> [&'static str; 5] {
        match self {
            Direction::HighIsBad => ["Q1", "MED", "Q3", "HIGH", "VERY_HIGH"],
            Direction::LowIsBad => ["Q1", "MED", "Q3", "LOW", "VERY_LOW"],
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::HighIsBad => write!(f, "high-is-bad"),
            Direction::LowIsBad => write!(f, "low-is-bad"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "high-is-bad" | "high" => Ok(Direction::HighIsBad),
            "low-is-bad" | "low" => Ok(Direction::LowIsBad),
            _ => Err(anyhow::anyhow!("unknown direction: {s}")),
        }
    }
}
