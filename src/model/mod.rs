// ============================================================================
// Entity Model
// ============================================================================
//
// Entity types, their properties and relationships, the builder used to
// declare them, and the frozen result of finalization.
//
// ============================================================================

mod builder;
mod declaration;
mod entity;
mod finalized;
#[allow(clippy::module_inception)]
mod model;
mod property;
mod relationship;

pub use builder::{EntityTypeBuilder, ModelBuilder};
pub use declaration::{EntityDeclaration, ModelDeclaration, TemporalDeclaration};
pub use entity::EntityType;
pub use finalized::{ColumnSummary, FinalizedModel, ModelSummary, TableSummary};
pub use model::Model;
pub use property::Property;
pub use relationship::{Relationship, RelationshipKind};
