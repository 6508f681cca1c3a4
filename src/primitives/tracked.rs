// ============================================================================
// spark-tracked - Tracked Cell
// The writable, versioned reactive cell
// ============================================================================

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::core::constants::*;
use crate::core::context::with_context;
use crate::core::types::{default_equals, AnyReaction, AnySource, EqualsFn, ReactionList};
use crate::primitives::block::{Block, BlockInner};
use crate::primitives::scope::safe_scope;
use crate::reactivity::tracking::{notify_write, track_read};

// =============================================================================
// TRACKED INNER - Graph node
// =============================================================================

/// Storage behind a [`Tracked`] handle.
pub struct TrackedInner<T> {
    flags: Cell<u32>,
    value: RefCell<T>,
    /// Clock stamp of the last observable change (0 = never written)
    version: Cell<u64>,
    reactions: ReactionList,
    equals: EqualsFn<T>,
    /// Owning block. Weak: the block tree never keeps its cells alive and
    /// cells never keep a disposed tree alive.
    block: Option<Weak<BlockInner>>,
}

impl<T: PartialEq> TrackedInner<T> {
    pub fn new(value: T, block: Option<Weak<BlockInner>>) -> Self {
        Self::new_with_equals(value, default_equals, block)
    }
}

impl<T> TrackedInner<T> {
    pub fn new_with_equals(value: T, equals: EqualsFn<T>, block: Option<Weak<BlockInner>>) -> Self {
        Self {
            flags: Cell::new(TRACKED),
            value: RefCell::new(value),
            version: Cell::new(0),
            reactions: ReactionList::new(),
            equals,
            block,
        }
    }

    /// Store `value` if it differs from the current one. Returns whether it
    /// was stored.
    fn replace(&self, value: T) -> bool {
        let changed = !(self.equals)(&self.value.borrow(), &value);
        if changed {
            *self.value.borrow_mut() = value;
        }
        changed
    }

    /// Number of live reactions reading this cell
    pub fn reaction_count(&self) -> usize {
        self.reactions.len()
    }
}

impl<T: 'static> AnySource for TrackedInner<T> {
    fn flags(&self) -> u32 {
        self.flags.get()
    }

    fn set_flags(&self, flags: u32) {
        self.flags.set(flags);
    }

    fn version(&self) -> u64 {
        self.version.get()
    }

    fn add_reaction(&self, reaction: Weak<dyn AnyReaction>) {
        self.reactions.add(reaction);
    }

    fn remove_reaction(&self, reaction: &Rc<dyn AnyReaction>) {
        self.reactions.remove(reaction);
    }

    fn live_reactions(&self) -> Vec<Rc<dyn AnyReaction>> {
        self.reactions.live()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// TRACKED<T> - Public handle
// =============================================================================

/// A versioned cell holding a value of type `T`.
///
/// Reading inside a tracking computation (an effect, a render block or a
/// derived) records a dependency. Writing a value that compares equal to the
/// current one is a no-op; any other write stamps the cell with a new clock
/// value and schedules the blocks that read it.
///
/// # Example
///
/// ```
/// use spark_tracked::Tracked;
///
/// let count = Tracked::new(0);
/// assert_eq!(count.get(), 0);
///
/// assert!(count.set(5));
/// assert!(!count.set(5)); // equal value: nothing happens
/// assert_eq!(count.get(), 5);
/// ```
pub struct Tracked<T> {
    inner: Rc<TrackedInner<T>>,
}

impl<T> Clone for Tracked<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: PartialEq + 'static> Tracked<T> {
    /// Create a cell owned by the ambient scope (see [`safe_scope`]).
    pub fn new(value: T) -> Self {
        Self::new_in(value, &safe_scope())
    }

    /// Create a cell owned by `block`.
    pub fn new_in(value: T, block: &Block) -> Self {
        Self::new_with_equals_in(value, default_equals, block)
    }
}

impl<T: 'static> Tracked<T> {
    /// Create a cell with a custom equality policy, owned by the ambient scope.
    pub fn new_with_equals(value: T, equals: EqualsFn<T>) -> Self {
        Self::new_with_equals_in(value, equals, &safe_scope())
    }

    /// Create a cell with a custom equality policy, owned by `block`.
    pub fn new_with_equals_in(value: T, equals: EqualsFn<T>, block: &Block) -> Self {
        Self::with_owner(value, equals, Some(block.downgrade_inner()))
    }

    pub(crate) fn with_owner(value: T, equals: EqualsFn<T>, block: Option<Weak<BlockInner>>) -> Self {
        Self {
            inner: Rc::new(TrackedInner::new_with_equals(value, equals, block)),
        }
    }

    /// Get the current value (cloning), registering a dependency.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.track();
        self.inner.value.borrow().clone()
    }

    /// Access the current value by reference, registering a dependency.
    ///
    /// # Example
    ///
    /// ```
    /// use spark_tracked::Tracked;
    ///
    /// let items = Tracked::new(vec![1, 2, 3]);
    /// assert_eq!(items.with(|v| v.iter().sum::<i32>()), 6);
    /// ```
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&self.inner.value.borrow())
    }

    /// Get the current value without registering a dependency.
    pub fn peek(&self) -> T
    where
        T: Clone,
    {
        self.inner.value.borrow().clone()
    }

    /// Register a dependency on this cell without reading its value.
    pub fn track(&self) {
        track_read(self.inner.clone() as Rc<dyn AnySource>);
    }

    /// Write a value. Returns true if it differed from the current one.
    pub fn set(&self, value: T) -> bool {
        let changed = self.inner.replace(value);
        if changed {
            self.mark_changed();
        }
        changed
    }

    /// Mutate the value in place. Always counts as a change, since the
    /// previous value is not kept around to compare with.
    ///
    /// # Example
    ///
    /// ```
    /// use spark_tracked::Tracked;
    ///
    /// let list = Tracked::new(vec![1]);
    /// list.update(|v| v.push(2));
    /// assert_eq!(list.get(), vec![1, 2]);
    /// ```
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.inner.value.borrow_mut());
        self.mark_changed();
    }

    /// Force a version bump without touching the value.
    ///
    /// Readers re-run as if the value changed. Used when the fact of a
    /// mutation matters more than the value (a key was deleted, an entry was
    /// overwritten).
    pub fn increment(&self) {
        self.mark_changed();
    }

    fn mark_changed(&self) {
        let stamp = with_context(|ctx| ctx.increment_clock());
        self.inner.version.set(stamp);
        notify_write(self.inner.clone() as Rc<dyn AnySource>);
    }

    /// Clock stamp of the last observable change
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Block that owns this cell, if it is still alive.
    pub fn block(&self) -> Option<Block> {
        self.inner
            .block
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Block::from_inner)
    }

    /// Get a reference to the inner node (for advanced use).
    pub fn inner(&self) -> &Rc<TrackedInner<T>> {
        &self.inner
    }

    /// Type-erased graph node
    pub fn as_any_source(&self) -> Rc<dyn AnySource> {
        self.inner.clone()
    }
}

impl<T: fmt::Debug> fmt::Debug for Tracked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracked")
            .field("value", &*self.inner.value.borrow())
            .field("version", &self.inner.version.get())
            .finish()
    }
}

// =============================================================================
// READABLE - anything `get` accepts
// =============================================================================

/// A reactive value that can be read with [`get`].
pub trait Readable {
    type Value;

    /// Read the current value, registering a dependency.
    fn read(&self) -> Self::Value;
}

impl<T: Clone + 'static> Readable for Tracked<T> {
    type Value = T;

    fn read(&self) -> T {
        self.get()
    }
}

// =============================================================================
// FREE FUNCTIONS
// =============================================================================

/// Create a cell owned by `block`.
///
/// # Example
///
/// ```
/// use spark_tracked::{get, root, set, tracked};
///
/// let block = root(|| {});
/// let cell = tracked(1, &block);
/// set(&cell, 2);
/// assert_eq!(get(&cell), 2);
/// ```
pub fn tracked<T: PartialEq + 'static>(value: T, block: &Block) -> Tracked<T> {
    Tracked::new_in(value, block)
}

/// Read a tracked or derived cell.
pub fn get<R: Readable>(cell: &R) -> R::Value {
    cell.read()
}

/// Write a tracked cell. Equal values are ignored.
pub fn set<T: 'static>(cell: &Tracked<T>, value: T) -> bool {
    cell.set(value)
}

/// Force a version bump on a tracked cell.
pub fn increment<T: 'static>(cell: &Tracked<T>) {
    cell.increment()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::block::root;
    use crate::reactivity::equality::never_equals;

    #[test]
    fn equal_write_does_not_bump_version() {
        let cell = Tracked::new(3);
        let v0 = cell.version();

        assert!(!cell.set(3));
        assert_eq!(cell.version(), v0);

        assert!(cell.set(4));
        assert!(cell.version() > v0);
    }

    #[test]
    fn increment_bumps_without_changing_value() {
        let cell = Tracked::new(String::from("same"));
        let v0 = cell.version();
        cell.increment();
        assert!(cell.version() > v0);
        assert_eq!(cell.peek(), "same");
    }

    #[test]
    fn custom_equality_is_honoured() {
        let cell = Tracked::new_with_equals(1, never_equals);
        let v0 = cell.version();
        assert!(cell.set(1));
        assert!(cell.version() > v0);
    }

    #[test]
    fn owner_block_is_recorded() {
        let block = root(|| {});
        let cell = tracked(0u8, &block);
        assert!(cell.block().is_some_and(|b| b.ptr_eq(&block)));

        block.dispose();
        drop(block);
        assert!(cell.block().is_none());
    }

    #[test]
    fn free_functions_route_to_cell() {
        let block = root(|| {});
        let cell = tracked(10, &block);
        assert!(set(&cell, 11));
        assert_eq!(get(&cell), 11);
        let v = cell.version();
        increment(&cell);
        assert!(cell.version() > v);
    }

    #[test]
    fn update_mutates_in_place() {
        let cell = Tracked::new(vec![1]);
        let v0 = cell.version();
        cell.update(|v| v.push(2));
        assert_eq!(cell.peek(), vec![1, 2]);
        assert!(cell.version() > v0);
    }
}
