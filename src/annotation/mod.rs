// ============================================================================
// Annotation Store
// ============================================================================
//
// Per-entity-type metadata with configuration-source tracking. Every write
// is arbitrated by ConfigurationSource precedence; nothing relies on call
// order.
//
// ============================================================================

pub mod key;
pub mod store;

pub use key::{Annotation, AnnotationKey, AnnotationValue};
pub use store::AnnotationStore;
