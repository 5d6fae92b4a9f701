// ============================================================================
// Temporal Tables
// ============================================================================
//
// Lifecycle per hierarchy root:
//
//   Untouched  -> no temporal annotation, nothing to do
//   Marker     -> resolved with the default period properties
//   Transient  -> period properties looked up, forced to OnAddOrUpdate,
//                 Resolved descriptor written back to the root
//   Resolved   -> terminal, re-running finalization leaves it alone
//
// Marked derived types then receive the root's Resolved descriptor verbatim.
//
// ============================================================================

pub mod convention;
pub mod descriptor;

pub use convention::{SharedTableTemporalValidation, TemporalConvention};
pub use descriptor::{ResolvedTemporal, TemporalTableDescriptor};
