use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipKind {
    OneToOne,
    ManyToOne,
}

/// A foreign key from `dependent` to `principal`.
///
/// A one-to-one relationship between two types mapped to the same table is a
/// shared-row link: the dependent lives in the principal's row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub principal: String,
    pub dependent: String,
    pub kind: RelationshipKind,
    /// Foreign-key properties on the dependent. Empty means the dependent's
    /// key properties.
    #[serde(default)]
    pub foreign_key: Vec<String>,
    /// Whether the dependent must exist whenever the principal does.
    #[serde(default)]
    pub required: bool,
}

impl Relationship {
    pub fn one_to_one(principal: impl Into<String>, dependent: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            dependent: dependent.into(),
            kind: RelationshipKind::OneToOne,
            foreign_key: Vec::new(),
            required: false,
        }
    }

    pub fn many_to_one(
        dependent: impl Into<String>,
        principal: impl Into<String>,
        foreign_key: &[&str],
    ) -> Self {
        Self {
            principal: principal.into(),
            dependent: dependent.into(),
            kind: RelationshipKind::ManyToOne,
            foreign_key: foreign_key.iter().map(|s| s.to_string()).collect(),
            required: false,
        }
    }

    pub fn required(&mut self) -> &mut Self {
        self.required = true;
        self
    }

    pub fn with_foreign_key(&mut self, properties: &[&str]) -> &mut Self {
        self.foreign_key = properties.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn is_one_to_one(&self) -> bool {
        self.kind == RelationshipKind::OneToOne
    }
}
