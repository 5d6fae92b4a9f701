// ============================================================================
// tablesplit Library
// ============================================================================
//
// Relational mapping metadata for entity types that share physical tables:
// annotation precedence, table splitting, temporal table finalization,
// shared-column reconciliation, and save planning over shared rows.
//
// ============================================================================

pub mod annotation;
pub mod columns;
pub mod config;
pub mod core;
pub mod finalize;
pub mod grouping;
pub mod model;
pub mod save;
pub mod temporal;

// Re-export main types for convenience
pub use annotation::{Annotation, AnnotationKey, AnnotationStore, AnnotationValue};
pub use config::FinalizeConfig;
pub use core::{ConfigurationSource, ModelError, Result, Row, Value, ValueGeneration};
pub use finalize::{FinalizeContext, FinalizePass, Pipeline};
pub use model::{
    EntityTypeBuilder, FinalizedModel, Model, ModelBuilder, ModelDeclaration, Property,
    Relationship, RelationshipKind,
};
pub use save::{CommandKind, EntityEntry, EntryState, RowCommand};
pub use temporal::{ResolvedTemporal, TemporalTableDescriptor};
