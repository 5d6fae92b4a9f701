use crate::core::Row;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    Insert,
    Update,
    Delete,
}

/// One write against one physical row, combining every entry that maps to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowCommand {
    pub table: String,
    pub kind: CommandKind,
    /// Key column values identifying the row.
    pub key: Row,
    /// Columns to write. Empty for deletes.
    pub values: Row,
    /// Columns that must still hold these values: the key and every
    /// concurrency token. Empty for inserts.
    pub conditions: Row,
    /// Entity types whose entries were folded into this command.
    pub entries: Vec<String>,
}

impl RowCommand {
    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn is_insert(&self) -> bool {
        self.kind == CommandKind::Insert
    }

    pub fn is_update(&self) -> bool {
        self.kind == CommandKind::Update
    }

    pub fn is_delete(&self) -> bool {
        self.kind == CommandKind::Delete
    }
}

impl fmt::Display for RowCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs = |row: &Row| {
            row.iter()
                .map(|(column, value)| format!("{} = {}", column, value))
                .collect::<Vec<_>>()
                .join(", ")
        };

        match self.kind {
            CommandKind::Insert => write!(f, "INSERT {} ({})", self.table, pairs(&self.values)),
            CommandKind::Update => write!(
                f,
                "UPDATE {} SET {} WHERE {}",
                self.table,
                pairs(&self.values),
                pairs(&self.conditions)
            ),
            CommandKind::Delete => write!(f, "DELETE {} WHERE {}", self.table, pairs(&self.conditions)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;

    #[test]
    fn test_display() {
        let mut key = Row::new();
        key.insert("Id".into(), Value::Integer(1));
        let command = RowCommand {
            table: "Vehicles".into(),
            kind: CommandKind::Delete,
            key: key.clone(),
            values: Row::new(),
            conditions: key,
            entries: vec!["Vehicle".into()],
        };
        assert!(command.is_delete());
        assert_eq!(command.table_name(), "Vehicles");
        assert_eq!(command.to_string(), "DELETE Vehicles WHERE Id = 1");
    }
}
