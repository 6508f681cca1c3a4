// ============================================================================
// spark-tracked - Reactive Collections
// Map, Set, Vec and Record with fine-grained cells
// ============================================================================
//
// Each collection carries two levels of reactivity:
//
// 1. Existence cells: one per present key, bumped when that key's value
//    changes or the key is removed
// 2. Size cell: the entry count, also the dependency of lookups for absent
//    keys and of whole-collection reads
//
// The vector swaps these for positional cells and a length cell. The record
// keeps a value cell per field, present or not, and a shape cell.
// ============================================================================

mod map;
mod record;
mod set;
mod vec;

pub use map::{tracked_map, ReactiveMap};
pub use record::{tracked_record, ReactiveRecord};
pub use set::{tracked_set, ReactiveSet, SetOperand};
pub use vec::{tracked_vec, ReactiveVec};
