use super::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Column name → value for one physical row.
pub type Row = IndexMap<String, Value>;

/// Provenance of a piece of configuration.
///
/// Ordered from weakest to strongest so a plain comparison decides whether a
/// write may replace what is already stored.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ConfigurationSource {
    Convention,
    DataAnnotation,
    #[default]
    Explicit,
}

impl ConfigurationSource {
    /// True when a write from `self` may replace a value stored from `existing`.
    pub fn overrides(self, existing: Option<Self>) -> bool {
        existing.is_none_or(|current| self >= current)
    }

    pub fn strongest(self, other: Option<Self>) -> Self {
        match other {
            Some(other) if other > self => other,
            _ => self,
        }
    }
}

impl fmt::Display for ConfigurationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Convention => write!(f, "convention"),
            Self::DataAnnotation => write!(f, "data annotation"),
            Self::Explicit => write!(f, "explicit"),
        }
    }
}

/// When the store generates a value for a column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueGeneration {
    #[default]
    Never,
    OnAdd,
    OnAddOrUpdate,
}

impl fmt::Display for ValueGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Never => write!(f, "never"),
            Self::OnAdd => write!(f, "on add"),
            Self::OnAddOrUpdate => write!(f, "on add or update"),
        }
    }
}
