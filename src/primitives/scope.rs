// ============================================================================
// spark-tracked - Ambient Scope
// Which block owns what is being created right now
// ============================================================================
//
// Resolution order, first match wins:
// 1. the scope installed by `with_scope` (push/pop, restored on unwind)
// 2. the block whose function is running
// 3. a per-thread ambient root, created on first use
//
// A block run hides any outer `with_scope` scope: what the run creates
// belongs to the block.
// ============================================================================

use std::rc::Rc;

use crate::core::context::with_context;
use crate::primitives::block::{ambient_root, Block, BlockInner};

// =============================================================================
// WITH SCOPE
// =============================================================================

struct ScopeGuard {
    prev: Option<Rc<BlockInner>>,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        let prev = self.prev.take();
        with_context(|ctx| ctx.set_active_scope(prev));
    }
}

/// Run `f` with `block` as the ambient scope.
///
/// Cells, collections and blocks created inside `f` are owned by `block`.
///
/// # Example
///
/// ```
/// use spark_tracked::{root, scope, with_scope, Tracked};
///
/// let owner = root(|| {});
/// let cell = with_scope(&owner, || {
///     assert!(scope().is_some_and(|s| s.ptr_eq(&owner)));
///     Tracked::new(0)
/// });
/// assert!(cell.block().is_some_and(|b| b.ptr_eq(&owner)));
/// ```
pub fn with_scope<R>(block: &Block, f: impl FnOnce() -> R) -> R {
    let prev = with_context(|ctx| ctx.set_active_scope(Some(block.inner().clone())));
    let _guard = ScopeGuard { prev };
    f()
}

/// The current owner, if code is running inside a scope or a block.
pub fn scope() -> Option<Block> {
    with_context(|ctx| ctx.get_active_scope().or_else(|| ctx.get_active_block())).map(Block::from_inner)
}

/// The current owner, falling back to the thread's ambient root.
///
/// Never fails: constructors called from plain code (outside any block) get
/// a long-lived root that is never disposed.
pub fn safe_scope() -> Block {
    if let Some(block) = scope() {
        return block;
    }

    let inner = with_context(|ctx| {
        let mut slot = ctx.ambient_root.borrow_mut();
        match slot.as_ref() {
            Some(root) => root.clone(),
            None => {
                tracing::debug!("creating ambient root block");
                let root = ambient_root();
                *slot = Some(root.clone());
                root
            }
        }
    });
    Block::from_inner(inner)
}

/// Register `f` to run when the current owner is disposed.
///
/// Outside any block or scope the owner is the ambient root, so `f` only
/// runs if that root is disposed explicitly.
pub fn on_teardown(f: impl FnOnce() + 'static) {
    safe_scope().on_teardown(f);
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::block::{effect, root};
    use crate::primitives::tracked::Tracked;
    use crate::reactivity::scheduling::flush_sync;
    use std::cell::Cell;

    #[test]
    fn safe_scope_falls_back_to_one_ambient_root() {
        assert!(scope().is_none());
        let a = safe_scope();
        let b = safe_scope();
        assert!(a.ptr_eq(&b));
        assert!(a.parent().is_none());
    }

    #[test]
    fn with_scope_restores_previous_scope() {
        let outer = root(|| {});
        let inner = root(|| {});
        with_scope(&outer, || {
            with_scope(&inner, || {
                assert!(scope().is_some_and(|s| s.ptr_eq(&inner)));
            });
            assert!(scope().is_some_and(|s| s.ptr_eq(&outer)));
        });
        assert!(scope().is_none());
    }

    #[test]
    fn with_scope_restores_after_panic() {
        let owner = root(|| {});
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            with_scope(&owner, || panic!("inside scope"));
        }));
        assert!(result.is_err());
        assert!(scope().is_none());
    }

    #[test]
    fn effects_created_in_scope_are_owned_by_it() {
        let runs = Rc::new(Cell::new(0));
        let owner = root(|| {});
        let cell = Tracked::new(0);
        let (c, r) = (cell.clone(), runs.clone());
        let e = with_scope(&owner, || {
            effect(move || {
                let _ = c.get();
                r.set(r.get() + 1);
            })
        });
        assert!(e.parent().is_some_and(|p| p.ptr_eq(&owner)));

        flush_sync();
        owner.dispose();
        assert!(e.is_destroyed());

        cell.set(1);
        flush_sync();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn on_teardown_attaches_to_current_owner() {
        let fired = Rc::new(Cell::new(false));
        let f = fired.clone();
        let owner = root(|| {});
        with_scope(&owner, || on_teardown(move || f.set(true)));
        assert!(!fired.get());
        owner.dispose();
        assert!(fired.get());
    }
}
