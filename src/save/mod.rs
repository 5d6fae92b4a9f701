// ============================================================================
// Save Planning & Materialization
// ============================================================================
//
// Rows shared by several entity types are read and written as one unit:
//
//   read  -> presence rules decide which optional dependents exist in a row
//   write -> entries for the same (table, key) fold into one RowCommand
//
// ============================================================================

pub mod change;
pub mod command;
pub mod materialize;
pub mod plan;

pub use change::{EntityEntry, EntryState};
pub use command::{CommandKind, RowCommand};
pub use materialize::{is_dependent_present, materialize};
pub use plan::plan_save;
