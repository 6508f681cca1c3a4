// ============================================================================
// spark-tracked - Derived Cell
// Lazily computed, cached values
// ============================================================================
//
// A derived is both a source (it can be read and depended on) and a
// reaction (it reads other cells). It is pulled, never pushed: a write
// upstream only marks the blocks below it, and the derived recomputes the
// next time someone reads it and finds a dependency stamp newer than the
// one recorded. A recompute that yields an equal value keeps the old stamp,
// so readers further down stay clean.
//
// Blocks created while computing (subscriptions of the values it reads)
// live in a branch of their own under the owner. They are disposed before
// every recompute, and on the tick after the last reader lets go.
// ============================================================================

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::core::constants::*;
use crate::core::context::with_context;
use crate::core::types::{default_equals, AnyReaction, AnySource, Dependency, EqualsFn, ReactionList};
use crate::primitives::block::{computation_block, destroy_children, Block, BlockInner};
use crate::primitives::scope::safe_scope;
use crate::primitives::tracked::Readable;
use crate::reactivity::scheduling::queue_microtask;
use crate::reactivity::tracking::{
    install_dependencies, is_dirty, notify_write, track_read, untrack, ComputationScope,
};

/// Hook run on every read of a derived, in the reader's context.
pub type ReadHook = Rc<dyn Fn()>;

/// Hook intercepting writes to a derived: `(new, &previous) -> stored`.
pub type WriteHook<T> = Rc<dyn Fn(T, &T) -> T>;

// =============================================================================
// DERIVED INNER
// =============================================================================

/// The graph node behind a [`Derived`].
pub struct DerivedInner<T> {
    flags: Cell<u32>,
    func: Box<dyn Fn() -> T>,
    /// `None` until the first computation succeeds
    value: RefCell<Option<T>>,
    version: Cell<u64>,
    deps: RefCell<Vec<Dependency>>,
    reactions: ReactionList,
    equals: EqualsFn<T>,
    block: Option<Weak<BlockInner>>,
    /// Parent of the blocks the computation creates, made on first use
    children: RefCell<Option<Rc<BlockInner>>>,
    disconnect_queued: Cell<bool>,
    on_read: Option<ReadHook>,
    on_write: Option<WriteHook<T>>,
    self_weak: Weak<DerivedInner<T>>,
}

/// Clears COMPUTING when a computation ends, returned or unwound.
struct ComputingFlag<'a>(&'a Cell<u32>);

impl Drop for ComputingFlag<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() & !COMPUTING);
    }
}

impl<T: 'static> DerivedInner<T> {
    fn new(
        func: Box<dyn Fn() -> T>,
        options: DerivedOptions<T>,
        block: Option<Weak<BlockInner>>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|self_weak| Self {
            flags: Cell::new(DERIVED | DIRTY),
            func,
            value: RefCell::new(None),
            version: Cell::new(0),
            deps: RefCell::new(Vec::new()),
            reactions: ReactionList::new(),
            equals: options.equals,
            block,
            children: RefCell::new(None),
            disconnect_queued: Cell::new(false),
            on_read: options.on_read,
            on_write: options.on_write,
            self_weak: self_weak.clone(),
        })
    }

    fn owner(&self) -> Option<Rc<BlockInner>> {
        self.block.as_ref().and_then(Weak::upgrade)
    }

    /// The live block computations run under, created on demand.
    fn computation_owner(&self) -> Rc<BlockInner> {
        let mut slot = self.children.borrow_mut();
        match slot.as_ref() {
            Some(block) if block.flags() & DESTROYED == 0 => block.clone(),
            _ => {
                let block = computation_block(self.owner());
                *slot = Some(block.clone());
                block
            }
        }
    }

    fn holds_blocks(&self) -> bool {
        self.children
            .borrow()
            .as_ref()
            .is_some_and(|block| block.first_child().is_some())
    }

    /// Once nobody reads this derived, drop what its computation created on
    /// the next tick. Re-reading in between keeps everything.
    fn queue_disconnect(&self) {
        if self.disconnect_queued.get() || !self.holds_blocks() {
            return;
        }
        self.disconnect_queued.set(true);
        let weak = self.self_weak.clone();
        queue_microtask(move || {
            if let Some(this) = weak.upgrade() {
                this.disconnect();
            }
        });
    }

    fn disconnect(&self) {
        self.disconnect_queued.set(false);
        if !self.reactions.is_empty() {
            return;
        }
        let block = self.children.borrow().clone();
        if let Some(block) = block {
            if block.first_child().is_some() {
                tracing::trace!("derived lost its readers, disposing its blocks");
                destroy_children(&block);
                // Recreated by the next read
                self.flags.set(self.flags.get() | DIRTY);
            }
        }
    }

    fn needs_update(&self) -> bool {
        if self.flags.get() & DIRTY != 0 || self.value.borrow().is_none() {
            return true;
        }
        let deps = self.deps.borrow().clone();
        is_dirty(&deps)
    }

    /// Recompute if stale. Blocks created by the previous computation are
    /// disposed first; the function runs with a branch of the owning block
    /// active, so the blocks it creates are kept apart.
    ///
    /// DIRTY is raised before the function runs and cleared only after it
    /// returns: a panicking computation leaves the cell dirty and the next
    /// read tries again.
    pub fn update(&self) {
        if self.flags.get() & COMPUTING != 0 {
            panic!("Cycle detected: a derived read itself while computing");
        }
        if !self.needs_update() {
            return;
        }

        self.flags.set(self.flags.get() | DIRTY | COMPUTING);
        let computing = ComputingFlag(&self.flags);
        let owner = self.computation_owner();
        destroy_children(&owner);
        let scope = ComputationScope::enter(Some(Some(owner)), true);
        let next = (self.func)();
        let deps = scope.finish();
        drop(computing);

        let changed = match self.value.borrow().as_ref() {
            Some(prev) => !(self.equals)(prev, &next),
            None => true,
        };
        if changed {
            *self.value.borrow_mut() = Some(next);
            self.version.set(with_context(|ctx| ctx.increment_clock()));
        }
        self.flags.set(self.flags.get() & !DIRTY);

        let old = std::mem::replace(&mut *self.deps.borrow_mut(), deps.clone());
        if let Some(this) = self.self_weak.upgrade() {
            let reaction: Rc<dyn AnyReaction> = this;
            install_dependencies(&reaction, &old, &deps);
        }

        // Read from outside any tracking block: nothing will keep it alive
        if self.reactions.is_empty() {
            self.queue_disconnect();
        }
    }

    /// Whether a value has been computed successfully
    pub fn is_initialized(&self) -> bool {
        self.value.borrow().is_some()
    }

    /// Number of sources read by the last computation
    pub fn dep_count(&self) -> usize {
        self.deps.borrow().len()
    }
}

impl<T: 'static> AnySource for DerivedInner<T> {
    fn flags(&self) -> u32 {
        self.flags.get()
    }

    fn set_flags(&self, flags: u32) {
        self.flags.set(flags);
    }

    fn version(&self) -> u64 {
        self.version.get()
    }

    fn refresh(&self) {
        self.update();
    }

    fn add_reaction(&self, reaction: Weak<dyn AnyReaction>) {
        self.reactions.add(reaction);
    }

    fn remove_reaction(&self, reaction: &Rc<dyn AnyReaction>) {
        self.reactions.remove(reaction);
        if self.reactions.is_empty() {
            self.queue_disconnect();
        }
    }

    fn live_reactions(&self) -> Vec<Rc<dyn AnyReaction>> {
        self.reactions.live()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<T: 'static> AnyReaction for DerivedInner<T> {
    fn flags(&self) -> u32 {
        self.flags.get()
    }

    fn set_flags(&self, flags: u32) {
        self.flags.set(flags);
    }

    fn as_derived_source(&self) -> Option<Rc<dyn AnySource>> {
        self.self_weak
            .upgrade()
            .map(|rc| rc as Rc<dyn AnySource>)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// OPTIONS
// =============================================================================

/// Equality and interception hooks for a derived.
///
/// # Example
///
/// ```
/// use spark_tracked::{derived_with, root, DerivedOptions};
///
/// let block = root(|| {});
/// // Read-only projection: writes keep the previous value
/// let fixed = derived_with(
///     || 42,
///     &block,
///     DerivedOptions::default().on_write(|_new, prev: &i32| *prev),
/// );
/// fixed.set(7);
/// assert_eq!(fixed.get(), 42);
/// ```
pub struct DerivedOptions<T> {
    equals: EqualsFn<T>,
    on_read: Option<ReadHook>,
    on_write: Option<WriteHook<T>>,
}

impl<T: PartialEq> Default for DerivedOptions<T> {
    fn default() -> Self {
        Self::with_equals(default_equals)
    }
}

impl<T> DerivedOptions<T> {
    /// Options with a custom equality and no hooks
    pub fn with_equals(equals: EqualsFn<T>) -> Self {
        Self {
            equals,
            on_read: None,
            on_write: None,
        }
    }

    /// Run `hook` on every read, before the value is produced.
    pub fn on_read(mut self, hook: impl Fn() + 'static) -> Self {
        self.on_read = Some(Rc::new(hook));
        self
    }

    /// Intercept writes: the hook receives the new value and the current
    /// one and returns what gets stored.
    pub fn on_write(mut self, hook: impl Fn(T, &T) -> T + 'static) -> Self {
        self.on_write = Some(Rc::new(hook));
        self
    }
}

// =============================================================================
// DERIVED<T> - Public handle
// =============================================================================

/// A lazily computed value, cached until something it read changes.
///
/// # Example
///
/// ```
/// use spark_tracked::{Derived, Tracked};
///
/// let count = Tracked::new(1);
/// let c = count.clone();
/// let doubled = Derived::new(move || c.get() * 2);
///
/// assert_eq!(doubled.get(), 2);
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Derived<T> {
    inner: Rc<DerivedInner<T>>,
}

impl<T> Clone for Derived<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: PartialEq + 'static> Derived<T> {
    /// Create a derived owned by the ambient scope.
    pub fn new(f: impl Fn() -> T + 'static) -> Self {
        Self::new_in(f, &safe_scope())
    }

    /// Create a derived owned by `block`.
    pub fn new_in(f: impl Fn() -> T + 'static, block: &Block) -> Self {
        Self::with_options(f, block, DerivedOptions::default())
    }
}

impl<T: 'static> Derived<T> {
    /// Create a derived with custom equality and hooks, owned by `block`.
    pub fn with_options(f: impl Fn() -> T + 'static, block: &Block, options: DerivedOptions<T>) -> Self {
        Self::with_owner(f, options, Some(block.downgrade_inner()))
    }

    pub(crate) fn with_owner(
        f: impl Fn() -> T + 'static,
        options: DerivedOptions<T>,
        block: Option<Weak<BlockInner>>,
    ) -> Self {
        Self {
            inner: DerivedInner::new(Box::new(f), options, block),
        }
    }

    /// Read the value, computing it if stale, and register a dependency.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    /// Access the value by reference, computing it if stale.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        if let Some(hook) = &self.inner.on_read {
            hook();
        }
        self.inner.update();
        track_read(self.inner.clone() as Rc<dyn AnySource>);
        let value = self.inner.value.borrow();
        match value.as_ref() {
            Some(v) => f(v),
            None => unreachable!("derived value is present after a successful update"),
        }
    }

    /// Read without registering a dependency (hooks still run).
    pub fn peek(&self) -> T
    where
        T: Clone,
    {
        untrack(|| self.get())
    }

    /// Overwrite the cached value.
    ///
    /// Without a write hook the value stands until a dependency changes and
    /// the derived recomputes. With one, the hook decides what is stored.
    /// Returns true if the stored value changed.
    pub fn set(&self, value: T) -> bool {
        untrack(|| self.inner.update());

        let next = match (&self.inner.on_write, self.inner.value.borrow().as_ref()) {
            (Some(hook), Some(prev)) => hook(value, prev),
            _ => value,
        };

        let changed = match self.inner.value.borrow().as_ref() {
            Some(prev) => !(self.inner.equals)(prev, &next),
            None => true,
        };
        if changed {
            *self.inner.value.borrow_mut() = Some(next);
            self.inner
                .version
                .set(with_context(|ctx| ctx.increment_clock()));
            notify_write(self.inner.clone() as Rc<dyn AnySource>);
        }
        changed
    }

    /// Clock stamp of the last observable change
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Block that owns this derived, if it is still alive.
    pub fn block(&self) -> Option<Block> {
        self.inner.owner().map(Block::from_inner)
    }

    /// Get a reference to the inner node (for advanced use).
    pub fn inner(&self) -> &Rc<DerivedInner<T>> {
        &self.inner
    }

    /// Type-erased graph node
    pub fn as_any_source(&self) -> Rc<dyn AnySource> {
        self.inner.clone()
    }
}

impl<T: fmt::Debug> fmt::Debug for Derived<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Derived")
            .field("value", &*self.inner.value.borrow())
            .field("version", &self.inner.version.get())
            .finish()
    }
}

impl<T: Clone + 'static> Readable for Derived<T> {
    type Value = T;

    fn read(&self) -> T {
        self.get()
    }
}

// =============================================================================
// FREE FUNCTIONS
// =============================================================================

/// Create a derived owned by `block`.
pub fn derived<T: PartialEq + 'static>(f: impl Fn() -> T + 'static, block: &Block) -> Derived<T> {
    Derived::new_in(f, block)
}

/// Create a derived owned by `block` with custom equality and hooks.
pub fn derived_with<T: 'static>(
    f: impl Fn() -> T + 'static,
    block: &Block,
    options: DerivedOptions<T>,
) -> Derived<T> {
    Derived::with_options(f, block, options)
}

// =============================================================================
// TESTS
// =============================================================================
