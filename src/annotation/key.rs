use crate::core::ConfigurationSource;
use crate::temporal::TemporalTableDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Known annotation kinds, plus `Custom` as the open extension point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnnotationKey {
    TableName,
    /// Column mapped by the named property.
    ColumnName(String),
    Temporal,
    MemoryOptimized,
    Custom(String),
}

impl fmt::Display for AnnotationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TableName => write!(f, "Relational:TableName"),
            Self::ColumnName(property) => write!(f, "Relational:ColumnName({})", property),
            Self::Temporal => write!(f, "Relational:IsTemporal"),
            Self::MemoryOptimized => write!(f, "Relational:MemoryOptimized"),
            Self::Custom(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnotationValue {
    Text(String),
    Flag(bool),
    /// The entity is temporal but carries no period configuration of its own.
    TemporalMarker,
    Temporal(TemporalTableDescriptor),
    Custom(serde_json::Value),
}

impl AnnotationValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_temporal(&self) -> Option<&TemporalTableDescriptor> {
        match self {
            Self::Temporal(descriptor) => Some(descriptor),
            _ => None,
        }
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, Self::TemporalMarker | Self::Temporal(_))
    }
}

/// A stored value together with the source that wrote it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub value: AnnotationValue,
    pub source: ConfigurationSource,
}

impl Annotation {
    pub fn new(value: AnnotationValue, source: ConfigurationSource) -> Self {
        Self { value, source }
    }
}
