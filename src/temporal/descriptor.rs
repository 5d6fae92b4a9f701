use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Period columns and history table of a temporal table once every
/// property-to-column mapping is final.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedTemporal {
    pub period_start_column: String,
    pub period_end_column: String,
    pub history_table: String,
}

impl fmt::Display for ResolvedTemporal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PERIOD ({}, {}) HISTORY {}",
            self.period_start_column, self.period_end_column, self.history_table
        )
    }
}

/// Temporal-table configuration of an entity type.
///
/// `Transient` is what the user declared: property names that still have to
/// be mapped to columns. `Resolved` is produced once, for the hierarchy root,
/// during finalization and then shared by every marked derived type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemporalTableDescriptor {
    Transient {
        period_start: String,
        period_end: String,
        history_table: Option<String>,
    },
    Resolved(Arc<ResolvedTemporal>),
}

impl TemporalTableDescriptor {
    pub fn transient(
        period_start: impl Into<String>,
        period_end: impl Into<String>,
        history_table: Option<String>,
    ) -> Self {
        Self::Transient {
            period_start: period_start.into(),
            period_end: period_end.into(),
            history_table,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    pub fn resolved(&self) -> Option<&Arc<ResolvedTemporal>> {
        match self {
            Self::Resolved(resolved) => Some(resolved),
            Self::Transient { .. } => None,
        }
    }

    /// Declared period property names, if still transient.
    pub fn period_properties(&self) -> Option<(&str, &str)> {
        match self {
            Self::Transient {
                period_start,
                period_end,
                ..
            } => Some((period_start, period_end)),
            Self::Resolved(_) => None,
        }
    }
}
