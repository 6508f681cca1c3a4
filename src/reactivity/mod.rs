// ============================================================================
// spark-tracked - Reactivity Module
// Dependency tracking, scheduling, and equality
// ============================================================================

pub mod equality;
pub mod scheduling;
pub mod tracking;

// Re-export main tracking functions
pub use tracking::{is_dirty, mark_reactions, notify_write, peek, track_read, untrack};

// Re-export scheduling functions
pub use scheduling::{
    flush_sync, flush_sync_with, has_pending_work, queue_microtask, tick, SchedulerMode,
    TaskHandle,
};
