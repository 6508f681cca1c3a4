// ============================================================================
// spark-tracked - Scheduling
// Root-block queue, deferred task queue, flush_sync and tick
// ============================================================================
//
// A write never runs user code directly. It marks the path from every
// affected block up to its root and queues the root. The queued trees are
// walked later:
// - flush_sync() walks them right now, until nothing is queued
// - tick() first drains deferred tasks (see queue_microtask), then walks
//
// A walk only enters marked blocks. Render blocks re-run inline when their
// dependencies moved; effect blocks are collected and run after the walk of
// their root.
// ============================================================================

use std::cell::Cell;
use std::rc::Rc;

use crate::core::constants::*;
use crate::core::context::{try_with_context, with_context};
use crate::primitives::block::{is_block_dirty, run_block, BlockInner};

// =============================================================================
// MODE & TASKS
// =============================================================================

/// How a newly scheduled update gets flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerMode {
    /// Updates wait for the next `tick()`
    Microtask,
    /// Inside `flush_sync`: updates are picked up by its loop
    Sync,
}

/// A deferred task in the queue drained by [`tick`].
pub struct Microtask {
    task: Box<dyn FnOnce()>,
    cancelled: Rc<Cell<bool>>,
}

/// Handle to a task queued with [`queue_microtask`].
#[derive(Debug, Clone)]
pub struct TaskHandle {
    cancelled: Rc<Cell<bool>>,
}

impl TaskHandle {
    /// Prevent the task from running. No effect once it ran.
    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

/// Queue `f` to run at the next [`tick`], after the current synchronous
/// work and before pending blocks are flushed.
pub fn queue_microtask(f: impl FnOnce() + 'static) -> TaskHandle {
    let cancelled = Rc::new(Cell::new(false));
    let handle = TaskHandle {
        cancelled: cancelled.clone(),
    };
    let queued = try_with_context(|ctx| {
        ctx.push_microtask(Microtask {
            task: Box::new(f),
            cancelled,
        });
        ctx.flush_pending.set(true);
    });
    // Thread is exiting: nothing will ever drain the queue
    if queued.is_none() {
        handle.cancel();
    }
    handle
}

// =============================================================================
// SCHEDULE UPDATE
// =============================================================================

/// Mark `block` and all its ancestors as containing an update and queue the
/// root of its tree.
pub fn schedule_update(block: &Rc<BlockInner>) {
    let mut current = block.clone();
    loop {
        let flags = current.flags();
        current.set_flags(flags | CONTAINS_UPDATE);
        match current.parent() {
            Some(parent) if flags & ROOT_BLOCK == 0 => current = parent,
            _ => break,
        }
    }

    with_context(|ctx| {
        ctx.queue_root_block(current);
        if ctx.get_scheduler_mode() == SchedulerMode::Microtask {
            ctx.flush_pending.set(true);
        }
    });
}

// =============================================================================
// FLUSH
// =============================================================================

/// Walk one tree, running what is dirty.
fn flush_updates(root: &Rc<BlockInner>) {
    for effect in walk_updates(root) {
        if effect.flags() & (PAUSED | DESTROYED) == 0 && is_block_dirty(&effect) {
            run_block(&effect);
        }
    }
}

/// Visit the marked paths of one tree: re-run dirty render blocks inline
/// and collect the scheduled effects, in tree order.
///
/// Every block that can be dirty was scheduled, which marked it and its
/// ancestors, so unmarked subtrees are skipped whole.
fn walk_updates(root: &Rc<BlockInner>) -> Vec<Rc<BlockInner>> {
    let mut current = Some(root.clone());
    let mut effects: Vec<Rc<BlockInner>> = Vec::new();

    while let Some(block) = current {
        let flags = block.flags();

        if flags & CONTAINS_UPDATE != 0 {
            block.set_flags(flags & !CONTAINS_UPDATE);

            if flags & (PAUSED | DESTROYED) == 0 {
                if flags & EFFECT_BLOCK != 0 {
                    effects.push(block.clone());
                } else if is_block_dirty(&block) {
                    run_block(&block);
                }

                if let Some(child) = block.first_child() {
                    current = Some(child);
                    continue;
                }
            }
        }

        current = next_in_walk(&block, root);
    }

    effects
}

/// Next block in depth-first order, never leaving the subtree of `root`.
fn next_in_walk(block: &Rc<BlockInner>, root: &Rc<BlockInner>) -> Option<Rc<BlockInner>> {
    let mut current = block.clone();
    loop {
        if Rc::ptr_eq(&current, root) {
            return None;
        }
        if let Some(next) = current.next_sibling() {
            return Some(next);
        }
        current = current.parent()?;
    }
}

fn flush_queued_root_blocks(roots: Vec<Rc<BlockInner>>) {
    tracing::trace!(roots = roots.len(), "flushing queued roots");
    for root in roots {
        if root.flags() & DESTROYED == 0 {
            flush_updates(&root);
        }
    }
}

/// Count a flush pass; too many in a row means an update loop.
fn bump_flush_count() {
    let exceeded = with_context(|ctx| {
        let count = ctx.flush_count.get() + 1;
        ctx.flush_count.set(count);
        if count > MAX_FLUSH_COUNT {
            ctx.flush_count.set(0);
            ctx.take_queued_root_blocks();
            ctx.take_microtasks();
            ctx.flush_pending.set(false);
            true
        } else {
            false
        }
    });

    if exceeded {
        tracing::error!(limit = MAX_FLUSH_COUNT, "update loop detected");
        panic!(
            "Maximum update depth exceeded. This can happen when an effect \
             continuously writes a cell it depends on."
        );
    }
}

/// Restores the scheduler mode when a flush returns or unwinds.
struct ModeGuard {
    prev: SchedulerMode,
}

impl Drop for ModeGuard {
    fn drop(&mut self) {
        with_context(|ctx| {
            ctx.set_scheduler_mode(self.prev);
            if self.prev == SchedulerMode::Microtask {
                ctx.flush_count.set(0);
            }
        });
    }
}

fn drain_root_queue() {
    loop {
        let roots = with_context(|ctx| ctx.take_queued_root_blocks());
        if roots.is_empty() {
            break;
        }
        bump_flush_count();
        flush_queued_root_blocks(roots);
    }
}

/// Synchronously run every pending block update.
///
/// Effects scheduled by the effects it runs are picked up too, until the
/// graph is quiet. Deferred tasks stay queued for [`tick`].
///
/// # Example
///
/// ```
/// use spark_tracked::{root, effect, flush_sync, Tracked};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let seen = Rc::new(Cell::new(0));
/// let count = Tracked::new(1);
///
/// let (c, s) = (count.clone(), seen.clone());
/// let _root = root(move || {
///     effect(move || s.set(c.get()));
/// });
///
/// flush_sync();
/// assert_eq!(seen.get(), 1);
///
/// count.set(7);
/// assert_eq!(seen.get(), 1); // deferred
/// flush_sync();
/// assert_eq!(seen.get(), 7);
/// ```
pub fn flush_sync() {
    flush_sync_with(|| ());
}

/// Flush, run `f`, then flush whatever `f` scheduled. Returns `f`'s result.
pub fn flush_sync_with<T>(f: impl FnOnce() -> T) -> T {
    let prev = with_context(|ctx| ctx.set_scheduler_mode(SchedulerMode::Sync));
    let _guard = ModeGuard { prev };

    drain_root_queue();
    let result = f();
    drain_root_queue();
    result
}

/// Run deferred tasks and pending updates until nothing is left.
///
/// This is the "next tick" of the scheduler: unsubscription debounces,
/// effects created since the last flush, and effects invalidated by writes
/// all settle here.
pub fn tick() {
    let _guard = ModeGuard {
        prev: with_context(|ctx| ctx.get_scheduler_mode()),
    };

    loop {
        let (tasks, roots) = with_context(|ctx| {
            ctx.flush_pending.set(false);
            (ctx.take_microtasks(), ctx.take_queued_root_blocks())
        });
        if tasks.is_empty() && roots.is_empty() {
            break;
        }
        bump_flush_count();

        for task in tasks {
            if !task.cancelled.get() {
                (task.task)();
            }
        }

        let mut roots = roots;
        roots.extend(with_context(|ctx| ctx.take_queued_root_blocks()));
        flush_queued_root_blocks(roots);
    }
}

/// Whether a deferred flush or task is waiting for [`tick`].
pub fn has_pending_work() -> bool {
    with_context(|ctx| ctx.has_pending_work())
}

// =============================================================================
// TESTS
// =============================================================================
