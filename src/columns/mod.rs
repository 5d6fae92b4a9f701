// ============================================================================
// Column Catalog
// ============================================================================
//
// One reconciled definition per physical (table, column), built from every
// property that maps to it, plus the presence rule of each optional
// dependent sharing a row.
//
// ============================================================================

pub mod reconcile;

pub use reconcile::SharedColumnReconciliation;

use crate::core::{Row, ValueGeneration};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A property contributing to a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// Entity type that declares the property.
    pub entity: String,
    pub property: String,
    /// Root of the declaring type's hierarchy.
    pub hierarchy: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub table: String,
    pub name: String,
    pub nullable: bool,
    pub concurrency_token: bool,
    pub value_generation: ValueGeneration,
    pub key: bool,
    pub mappings: Vec<ColumnMapping>,
}

impl ColumnDefinition {
    /// Mapped by more than one hierarchy sharing the table.
    pub fn is_shared(&self) -> bool {
        self.mappings
            .iter()
            .any(|mapping| mapping.hierarchy != self.mappings[0].hierarchy)
    }

    /// Only the given hierarchy maps this column.
    pub fn is_owned_by(&self, hierarchy: &str) -> bool {
        !self.mappings.is_empty() && self.mappings.iter().all(|m| m.hierarchy == hierarchy)
    }

    pub fn is_mapped_by(&self, entity: &str, property: &str) -> bool {
        self.mappings
            .iter()
            .any(|mapping| mapping.entity == entity && mapping.property == property)
    }
}

/// Decides whether an optional dependent exists in a fetched row.
///
/// With required owned columns, the dependent is present only when all of
/// them are non-null. When every owned column is optional, any non-null one
/// is enough. A dependent without owned columns cannot be told apart from
/// its absence and is always considered present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRule {
    pub required_columns: Vec<String>,
    pub optional_columns: Vec<String>,
}

impl PresenceRule {
    pub fn is_present(&self, row: &Row) -> bool {
        let non_null = |column: &String| row.get(column).is_some_and(|value| !value.is_null());

        if !self.required_columns.is_empty() {
            return self.required_columns.iter().all(non_null);
        }
        if !self.optional_columns.is_empty() {
            return self.optional_columns.iter().any(non_null);
        }
        true
    }

    pub fn columns(&self) -> impl Iterator<Item = &String> {
        self.required_columns.iter().chain(&self.optional_columns)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnCatalog {
    tables: IndexMap<String, IndexMap<String, ColumnDefinition>>,
    /// Keyed by dependent entity type.
    presence: IndexMap<String, PresenceRule>,
}

impl ColumnCatalog {
    pub fn column(&self, table: &str, column: &str) -> Option<&ColumnDefinition> {
        self.tables.get(table).and_then(|columns| columns.get(column))
    }

    pub fn columns(&self, table: &str) -> impl Iterator<Item = &ColumnDefinition> {
        self.tables
            .get(table)
            .into_iter()
            .flat_map(|columns| columns.values())
    }

    pub fn presence_rule(&self, dependent: &str) -> Option<&PresenceRule> {
        self.presence.get(dependent)
    }

    pub(crate) fn insert(&mut self, definition: ColumnDefinition) {
        self.tables
            .entry(definition.table.clone())
            .or_default()
            .insert(definition.name.clone(), definition);
    }

    pub(crate) fn column_mut(&mut self, table: &str, column: &str) -> Option<&mut ColumnDefinition> {
        self.tables.get_mut(table).and_then(|columns| columns.get_mut(column))
    }

    pub(crate) fn insert_presence(&mut self, dependent: &str, rule: PresenceRule) {
        self.presence.insert(dependent.to_string(), rule);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(column, value)| (column.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn test_required_columns_must_all_be_set() {
        let rule = PresenceRule {
            required_columns: vec!["Capacity".into(), "Fuel".into()],
            optional_columns: vec!["Notes".into()],
        };
        assert!(rule.is_present(&row(&[
            ("Capacity", Value::Integer(60)),
            ("Fuel", "diesel".into()),
            ("Notes", Value::Null),
        ])));
        assert!(!rule.is_present(&row(&[("Capacity", Value::Integer(60)), ("Fuel", Value::Null)])));
        assert!(!rule.is_present(&row(&[("Capacity", Value::Integer(60))])));
    }

    #[test]
    fn test_optional_only_needs_one_value() {
        let rule = PresenceRule {
            required_columns: vec![],
            optional_columns: vec!["A".into(), "B".into()],
        };
        assert!(rule.is_present(&row(&[("A", Value::Null), ("B", Value::Integer(1))])));
        assert!(!rule.is_present(&row(&[("A", Value::Null), ("B", Value::Null)])));
    }

    #[test]
    fn test_empty_rule_is_always_present() {
        assert!(PresenceRule::default().is_present(&Row::new()));
    }
}
