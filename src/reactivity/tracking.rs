// ============================================================================
// spark-tracked - Dependency Tracking
// Recording reads, propagating writes, and checking staleness
// ============================================================================
//
// Edges are versioned: a reaction remembers the clock stamp each source had
// when it was read. A write advances the clock, stamps the source, and marks
// the blocks that can observe it. Whether they actually re-run is decided
// later by comparing stamps, so a derived that recomputes to an equal value
// stops the propagation.
//
// RefCell borrows are never held across calls into other graph nodes:
// reaction lists are collected into a Vec first, then acted on.
// ============================================================================

use std::rc::Rc;

use crate::core::context::with_context;
use crate::core::types::{AnyReaction, AnySource, Dependency};
use crate::primitives::block::BlockInner;

// =============================================================================
// TRACK READ - Register dependency when reading a cell
// =============================================================================

/// Record a read of `source` if a tracking computation is running.
///
/// The caller must have brought the source up to date first, so the stamp
/// recorded here is the one the value was produced at.
pub fn track_read(source: Rc<dyn AnySource>) {
    with_context(|ctx| {
        if !ctx.is_tracking() {
            return;
        }
        let version = source.version();
        ctx.add_new_dep(Dependency { source, version });
    });
}

// =============================================================================
// NOTIFY WRITE - Called after a source was stamped with a new version
// =============================================================================

/// Propagate a change of `source` to everything that can observe it.
pub fn notify_write(source: Rc<dyn AnySource>) {
    mark_reactions(source);
}

/// Walk the reaction graph below `source`, scheduling every reachable block.
///
/// Deriveds are passed through (their own reactions are visited); blocks are
/// queued for the next flush. Iterative, with a visited list so diamonds are
/// walked once.
pub fn mark_reactions(source: Rc<dyn AnySource>) {
    let mut to_schedule: Vec<Rc<dyn AnyReaction>> = Vec::new();
    let mut visited: Vec<*const ()> = vec![Rc::as_ptr(&source) as *const ()];
    let mut stack: Vec<Rc<dyn AnySource>> = vec![source];

    while let Some(current) = stack.pop() {
        // Collect first; the list borrow is released before we recurse
        let reactions = current.live_reactions();

        for reaction in reactions {
            match reaction.as_derived_source() {
                Some(derived) => {
                    let ptr = Rc::as_ptr(&derived) as *const ();
                    if !visited.contains(&ptr) {
                        visited.push(ptr);
                        stack.push(derived);
                    }
                }
                None => to_schedule.push(reaction),
            }
        }
    }

    for reaction in to_schedule {
        reaction.schedule();
    }
}

// =============================================================================
// DIRTY CHECK
// =============================================================================

/// A computation is dirty when any dependency moved past the recorded stamp.
///
/// Derived dependencies are refreshed on the way, so a derived that
/// recomputed to an equal value does not count as a change.
pub fn is_dirty(deps: &[Dependency]) -> bool {
    deps.iter().any(Dependency::is_stale)
}

// =============================================================================
// EDGE INSTALLATION
// =============================================================================

/// Replace the back-edges of `reaction`: drop it from `old` sources, add it
/// to `new` ones.
pub fn install_dependencies(reaction: &Rc<dyn AnyReaction>, old: &[Dependency], new: &[Dependency]) {
    remove_reactions(reaction, old);
    let weak = Rc::downgrade(reaction);
    for dep in new {
        dep.source.add_reaction(weak.clone());
    }
}

/// Sever the back-edges from each source in `deps` to `reaction`.
pub fn remove_reactions(reaction: &Rc<dyn AnyReaction>, deps: &[Dependency]) {
    for dep in deps {
        dep.source.remove_reaction(reaction);
    }
}

// =============================================================================
// COMPUTATION SCOPE
// =============================================================================

/// Context for one run of a derived or block function.
///
/// Entering swaps in a fresh dependency collector, the new active block and
/// the tracking mode. `finish` hands back the collected dependencies; if the
/// computation panics instead, `Drop` restores the outer context and the
/// partial collection is discarded.
pub(crate) struct ComputationScope {
    prev_block: Option<Option<Rc<BlockInner>>>,
    prev_scope: Option<Option<Rc<BlockInner>>>,
    prev_tracking: bool,
    prev_deps: Option<Vec<Dependency>>,
}

impl ComputationScope {
    /// `Some(b)` installs `b` as the active block for the run and hides any
    /// ambient scope (the block owns what the run creates). `None` keeps the
    /// current ownership.
    pub fn enter(block: Option<Option<Rc<BlockInner>>>, tracking: bool) -> Self {
        with_context(|ctx| {
            let prev_scope = block.as_ref().map(|_| ctx.set_active_scope(None));
            let prev_block = block.map(|b| ctx.set_active_block(b));
            let prev_tracking = ctx.set_tracking(tracking);
            let prev_deps = Some(ctx.swap_new_deps(Vec::new()));
            Self {
                prev_block,
                prev_scope,
                prev_tracking,
                prev_deps,
            }
        })
    }

    /// Restore the outer context and return what this run read.
    pub fn finish(mut self) -> Vec<Dependency> {
        self.restore().unwrap_or_default()
    }

    fn restore(&mut self) -> Option<Vec<Dependency>> {
        let prev_deps = self.prev_deps.take()?;
        let prev_block = self.prev_block.take();
        let prev_scope = self.prev_scope.take();
        let prev_tracking = self.prev_tracking;
        with_context(|ctx| {
            if let Some(block) = prev_block {
                ctx.set_active_block(block);
            }
            if let Some(scope) = prev_scope {
                ctx.set_active_scope(scope);
            }
            ctx.set_tracking(prev_tracking);
            Some(ctx.swap_new_deps(prev_deps))
        })
    }
}

impl Drop for ComputationScope {
    fn drop(&mut self) {
        self.restore();
    }
}

// =============================================================================
// UNTRACK
// =============================================================================

struct UntrackGuard {
    prev: bool,
}

impl Drop for UntrackGuard {
    fn drop(&mut self) {
        with_context(|ctx| ctx.set_tracking(self.prev));
    }
}

/// Run `f` without registering any of its reads as dependencies.
///
/// # Example
///
/// ```
/// use spark_tracked::{root, effect, flush_sync, untrack, Tracked};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let runs = Rc::new(Cell::new(0));
/// let a = Tracked::new(1);
/// let b = Tracked::new(10);
///
/// let (a2, b2, r) = (a.clone(), b.clone(), runs.clone());
/// let _root = root(move || {
///     effect(move || {
///         let _ = a2.get();
///         let _ = untrack(|| b2.get());
///         r.set(r.get() + 1);
///     });
/// });
/// flush_sync();
/// assert_eq!(runs.get(), 1);
///
/// b.set(20);
/// flush_sync();
/// assert_eq!(runs.get(), 1);
///
/// a.set(2);
/// flush_sync();
/// assert_eq!(runs.get(), 2);
/// ```
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    let prev = with_context(|ctx| ctx.set_tracking(false));
    let _guard = UntrackGuard { prev };
    f()
}

/// Alias for [`untrack`], reads the way call sites use it for single values.
pub fn peek<T>(f: impl FnOnce() -> T) -> T {
    untrack(f)
}

// =============================================================================
// TESTS
// =============================================================================
