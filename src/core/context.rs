// ============================================================================
// spark-tracked - Reactive Context
// Thread-local state: active block, dependency collection, clock, queues
// ============================================================================

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use super::types::Dependency;
use crate::primitives::block::BlockInner;
use crate::reactivity::scheduling::{Microtask, SchedulerMode};

// =============================================================================
// REACTIVE CONTEXT
// =============================================================================

/// Thread-local reactive context holding all global state for reactivity.
pub struct ReactiveContext {
    // =========================================================================
    // OWNERSHIP
    // =========================================================================
    /// Block whose function is currently executing. New blocks attach here.
    pub active_block: RefCell<Option<Rc<BlockInner>>>,

    /// Ambient scope installed by `with_scope`
    pub active_scope: RefCell<Option<Rc<BlockInner>>>,

    /// Lazily created root for code running outside any block or scope
    pub ambient_root: RefCell<Option<Rc<BlockInner>>>,

    // =========================================================================
    // DEPENDENCY TRACKING
    // =========================================================================
    /// Whether reads currently register dependencies
    pub tracking: Cell<bool>,

    /// Dependencies collected during the current computation
    pub new_deps: RefCell<Vec<Dependency>>,

    /// Global clock, advanced on every observable write
    pub clock: Cell<u64>,

    // =========================================================================
    // SCHEDULING
    // =========================================================================
    /// Microtask (deferred) or sync flushing
    pub scheduler_mode: Cell<SchedulerMode>,

    /// A deferred flush has been requested and not yet run
    pub flush_pending: Cell<bool>,

    /// Roots with pending updates
    pub queued_root_blocks: RefCell<Vec<Rc<BlockInner>>>,

    /// Deferred tasks, run in FIFO order by `tick`
    pub queued_microtasks: RefCell<VecDeque<Microtask>>,

    /// Consecutive flush passes, for update-loop detection
    pub flush_count: Cell<u32>,
}

impl ReactiveContext {
    /// Create a new reactive context with default values
    pub fn new() -> Self {
        Self {
            active_block: RefCell::new(None),
            active_scope: RefCell::new(None),
            ambient_root: RefCell::new(None),
            tracking: Cell::new(false),
            new_deps: RefCell::new(Vec::new()),
            clock: Cell::new(0),
            scheduler_mode: Cell::new(SchedulerMode::Microtask),
            flush_pending: Cell::new(false),
            queued_root_blocks: RefCell::new(Vec::new()),
            queued_microtasks: RefCell::new(VecDeque::new()),
            flush_count: Cell::new(0),
        }
    }

    // =========================================================================
    // OWNERSHIP
    // =========================================================================

    /// Set the active block, returning the previous one
    pub fn set_active_block(&self, block: Option<Rc<BlockInner>>) -> Option<Rc<BlockInner>> {
        self.active_block.replace(block)
    }

    /// Get the active block
    pub fn get_active_block(&self) -> Option<Rc<BlockInner>> {
        self.active_block.borrow().clone()
    }

    /// Set the ambient scope, returning the previous one
    pub fn set_active_scope(&self, block: Option<Rc<BlockInner>>) -> Option<Rc<BlockInner>> {
        self.active_scope.replace(block)
    }

    /// Get the ambient scope
    pub fn get_active_scope(&self) -> Option<Rc<BlockInner>> {
        self.active_scope.borrow().clone()
    }

    // =========================================================================
    // DEPENDENCY TRACKING
    // =========================================================================

    /// Set tracking mode, returning the previous value
    pub fn set_tracking(&self, value: bool) -> bool {
        self.tracking.replace(value)
    }

    /// Check if reads currently register dependencies
    pub fn is_tracking(&self) -> bool {
        self.tracking.get()
    }

    /// Swap out the dependency collector, returning the old one
    pub fn swap_new_deps(&self, deps: Vec<Dependency>) -> Vec<Dependency> {
        self.new_deps.replace(deps)
    }

    /// Record a read. Repeated reads of one source keep a single edge with
    /// the latest stamp.
    pub fn add_new_dep(&self, dep: Dependency) {
        let mut deps = self.new_deps.borrow_mut();
        let ptr = Rc::as_ptr(&dep.source) as *const ();
        match deps
            .iter_mut()
            .find(|d| Rc::as_ptr(&d.source) as *const () == ptr)
        {
            Some(existing) => existing.version = dep.version,
            None => deps.push(dep),
        }
    }

    // =========================================================================
    // CLOCK
    // =========================================================================

    /// Advance the clock and return the new stamp
    pub fn increment_clock(&self) -> u64 {
        let v = self.clock.get() + 1;
        self.clock.set(v);
        v
    }

    /// Current clock value
    pub fn get_clock(&self) -> u64 {
        self.clock.get()
    }

    // =========================================================================
    // SCHEDULING
    // =========================================================================

    /// Queue a root block, once
    pub fn queue_root_block(&self, root: Rc<BlockInner>) {
        let mut queued = self.queued_root_blocks.borrow_mut();
        if !queued.iter().any(|b| Rc::ptr_eq(b, &root)) {
            queued.push(root);
        }
    }

    /// Take all queued roots
    pub fn take_queued_root_blocks(&self) -> Vec<Rc<BlockInner>> {
        self.queued_root_blocks.replace(Vec::new())
    }

    /// Whether any root is waiting for a flush
    pub fn has_queued_root_blocks(&self) -> bool {
        !self.queued_root_blocks.borrow().is_empty()
    }

    /// Set scheduler mode, returning the previous one
    pub fn set_scheduler_mode(&self, mode: SchedulerMode) -> SchedulerMode {
        self.scheduler_mode.replace(mode)
    }

    /// Current scheduler mode
    pub fn get_scheduler_mode(&self) -> SchedulerMode {
        self.scheduler_mode.get()
    }

    /// Push a deferred task
    pub fn push_microtask(&self, task: Microtask) {
        self.queued_microtasks.borrow_mut().push_back(task);
    }

    /// Take all deferred tasks
    pub fn take_microtasks(&self) -> VecDeque<Microtask> {
        self.queued_microtasks.replace(VecDeque::new())
    }

    /// Whether any deferred work is outstanding
    pub fn has_pending_work(&self) -> bool {
        self.flush_pending.get()
            || !self.queued_microtasks.borrow().is_empty()
            || self.has_queued_root_blocks()
    }
}

impl Default for ReactiveContext {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// THREAD-LOCAL ACCESS
// =============================================================================

thread_local! {
    /// The thread-local reactive context
    static CONTEXT: ReactiveContext = ReactiveContext::new();
}

/// Access the thread-local reactive context.
///
/// # Example
///
/// ```ignore
/// with_context(|ctx| {
///     ctx.increment_clock();
/// });
/// ```
pub fn with_context<R>(f: impl FnOnce(&ReactiveContext) -> R) -> R {
    CONTEXT.with(f)
}

/// Like [`with_context`], but returns `None` once the thread-local has been
/// torn down (teardowns that outlive the context during thread exit).
pub fn try_with_context<R>(f: impl FnOnce(&ReactiveContext) -> R) -> Option<R> {
    CONTEXT.try_with(f).ok()
}

// =============================================================================
// CONVENIENCE FUNCTIONS
// =============================================================================

/// Check if reads currently register dependencies
pub fn is_tracking() -> bool {
    with_context(|ctx| ctx.is_tracking())
}

/// Current clock value
pub fn clock() -> u64 {
    with_context(|ctx| ctx.get_clock())
}

// =============================================================================
// TESTS
// =============================================================================
