use crate::core::{Row, Value};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;

static NULL: Value = Value::Null;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryState {
    Added,
    Modified,
    Deleted,
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "Added"),
            Self::Modified => write!(f, "Modified"),
            Self::Deleted => write!(f, "Deleted"),
        }
    }
}

/// A tracked entity instance handed to the save planner.
///
/// `values` and `original_values` are keyed by property name. Deleted entries
/// only need their original values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityEntry {
    pub entity_type: String,
    pub state: EntryState,
    pub values: Row,
    #[serde(default)]
    pub original_values: Row,
    #[serde(default)]
    pub modified: IndexSet<String>,
}

impl EntityEntry {
    pub fn added(entity_type: impl Into<String>, values: Row) -> Self {
        Self {
            entity_type: entity_type.into(),
            state: EntryState::Added,
            values,
            original_values: Row::new(),
            modified: IndexSet::new(),
        }
    }

    /// A modified entry; properties whose value differs from the original
    /// are marked modified.
    pub fn modified(entity_type: impl Into<String>, values: Row, original_values: Row) -> Self {
        let modified = values
            .iter()
            .filter(|(property, value)| original_values.get(*property) != Some(*value))
            .map(|(property, _)| property.clone())
            .collect();

        Self {
            entity_type: entity_type.into(),
            state: EntryState::Modified,
            values,
            original_values,
            modified,
        }
    }

    pub fn deleted(entity_type: impl Into<String>, original_values: Row) -> Self {
        Self {
            entity_type: entity_type.into(),
            state: EntryState::Deleted,
            values: original_values.clone(),
            original_values,
            modified: IndexSet::new(),
        }
    }

    /// Marks a property modified even if its value did not change.
    pub fn mark_modified(mut self, property: &str) -> Self {
        self.modified.insert(property.to_string());
        self
    }

    pub fn is_modified(&self, property: &str) -> bool {
        match self.state {
            EntryState::Added => true,
            EntryState::Modified => self.modified.contains(property),
            EntryState::Deleted => false,
        }
    }

    pub fn current(&self, property: &str) -> &Value {
        self.values.get(property).unwrap_or(&NULL)
    }

    /// The value the store holds now: the original when known.
    pub fn original(&self, property: &str) -> &Value {
        self.original_values
            .get(property)
            .or_else(|| self.values.get(property))
            .unwrap_or(&NULL)
    }
}
