// ============================================================================
// spark-tracked - Primitives Module
// Tracked and derived cells, the block tree, ambient scope
// ============================================================================

pub mod block;
pub mod derived;
pub mod scope;
pub mod tracked;

// Re-export for convenience
pub use block::{
    active_block, branch, effect, effect_tracking, effect_with_cleanup, render,
    render_with_cleanup, root, Block, BlockInner, BlockKind,
};
pub use derived::{derived, derived_with, Derived, DerivedInner, DerivedOptions, ReadHook, WriteHook};
pub use scope::{on_teardown, safe_scope, scope, with_scope};
pub use tracked::{get, increment, set, tracked, Readable, Tracked, TrackedInner};
