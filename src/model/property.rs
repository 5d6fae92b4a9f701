use crate::core::ValueGeneration;
use serde::{Deserialize, Serialize};

/// A mapped property of an entity type.
///
/// The physical column it maps to lives in the owning entity's annotation
/// store (`ColumnName`), so renames go through source precedence like any
/// other configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub value_generation: ValueGeneration,
    #[serde(default)]
    pub concurrency_token: bool,
    #[serde(default)]
    pub key: bool,
    /// No backing field on the entity; exists only in the mapping.
    #[serde(default)]
    pub shadow: bool,
}

fn default_nullable() -> bool {
    true
}

impl Property {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nullable: true,
            value_generation: ValueGeneration::Never,
            concurrency_token: false,
            key: false,
            shadow: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Marks the property as part of the primary key; keys are never null.
    pub fn key(mut self) -> Self {
        self.key = true;
        self.nullable = false;
        self
    }

    pub fn concurrency_token(mut self) -> Self {
        self.concurrency_token = true;
        self
    }

    pub fn generated(mut self, value_generation: ValueGeneration) -> Self {
        self.value_generation = value_generation;
        self
    }

    pub fn shadow(mut self) -> Self {
        self.shadow = true;
        self
    }
}
