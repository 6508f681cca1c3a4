// ============================================================================
// spark-tracked - ReactiveVec
// A Vec with per-index cells and a length cell
// ============================================================================
//
// Reading one index depends on that index's cell, or on the length when the
// index is past the end. Whole-vec reads (iteration, search, snapshots)
// depend on the length and on every index cell.
//
// Cells are positional. A write that moves elements (insert, remove,
// splice, sort) bumps every index from the first one that moved, and the
// cell list is then trimmed or grown to the new length. Storage is updated
// before any cell is bumped.
// ============================================================================

use std::cell::RefCell;
use std::fmt;
use std::ops::Range;
use std::rc::{Rc, Weak};

use crate::core::types::{default_equals, EqualsFn};
use crate::error::{Error, Result};
use crate::primitives::block::{Block, BlockInner};
use crate::primitives::scope::safe_scope;
use crate::primitives::tracked::Tracked;

struct VecInner<T> {
    data: RefCell<Vec<T>>,
    items: RefCell<Vec<Tracked<()>>>,
    length: Tracked<usize>,
    equals: EqualsFn<T>,
    block: Option<Weak<BlockInner>>,
}

// =============================================================================
// REACTIVE VEC
// =============================================================================

/// A reactive vector with per-index granularity.
///
/// # Example
///
/// ```
/// use spark_tracked::{effect, flush_sync, root, ReactiveVec};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let todos: ReactiveVec<&str> = ["write", "test"].into_iter().collect();
/// let seen = Rc::new(RefCell::new(Vec::new()));
///
/// let (t, s) = (todos.clone(), seen.clone());
/// let _tree = root(move || {
///     effect(move || s.borrow_mut().push(t.get(0)));
/// });
/// flush_sync();
///
/// todos.push("ship"); // index 0 untouched: the effect stays clean
/// flush_sync();
/// todos.set(0, "plan").unwrap();
/// flush_sync();
/// assert_eq!(*seen.borrow(), vec![Some("write"), Some("plan")]);
/// ```
pub struct ReactiveVec<T> {
    inner: Rc<VecInner<T>>,
}

impl<T> Clone for ReactiveVec<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: PartialEq + 'static> ReactiveVec<T> {
    /// Create an empty vector owned by the ambient scope.
    pub fn new() -> Self {
        Self::new_in(&safe_scope())
    }

    /// Create an empty vector owned by `block`.
    pub fn new_in(block: &Block) -> Self {
        Self::from_iter_in(std::iter::empty(), block)
    }

    /// Create a vector owned by `block` holding the items of `iter`.
    pub fn from_iter_in(iter: impl IntoIterator<Item = T>, block: &Block) -> Self {
        Self::with_equals_in(iter, default_equals, block)
    }
}

impl<T: 'static> ReactiveVec<T> {
    /// Create an empty vector whose element comparison is `equals`.
    pub fn with_equals(equals: EqualsFn<T>) -> Self {
        Self::with_equals_in(std::iter::empty(), equals, &safe_scope())
    }

    /// Create a vector owned by `block` with a custom element comparison.
    ///
    /// The comparison decides whether overwriting an index notifies its
    /// readers.
    pub fn with_equals_in(iter: impl IntoIterator<Item = T>, equals: EqualsFn<T>, block: &Block) -> Self {
        let owner = Some(block.downgrade_inner());
        let data: Vec<T> = iter.into_iter().collect();
        let items = (0..data.len()).map(|_| Self::index_cell(&owner)).collect();
        let length = Tracked::with_owner(data.len(), default_equals, owner.clone());

        Self {
            inner: Rc::new(VecInner {
                data: RefCell::new(data),
                items: RefCell::new(items),
                length,
                equals,
                block: owner,
            }),
        }
    }

    fn index_cell(owner: &Option<Weak<BlockInner>>) -> Tracked<()> {
        Tracked::with_owner((), default_equals, owner.clone())
    }

    /// Read the cell of `index`, or the length if it is past the end.
    fn track_index(&self, index: usize) {
        let cell = self.inner.items.borrow().get(index).cloned();
        match cell {
            Some(cell) => cell.track(),
            None => self.inner.length.track(),
        }
    }

    /// Read the length and every index cell.
    fn track_all(&self) {
        self.inner.length.track();
        let cells: Vec<Tracked<()>> = self.inner.items.borrow().clone();
        for cell in cells {
            cell.track();
        }
    }

    /// Bump every index from `start`, then match the cells and the length
    /// to the storage.
    fn moved_from(&self, start: usize) {
        let len = self.inner.data.borrow().len();
        let bumped = {
            let mut items = self.inner.items.borrow_mut();
            let bumped: Vec<Tracked<()>> = items.get(start..).map(<[_]>::to_vec).unwrap_or_default();
            items.truncate(len);
            while items.len() < len {
                items.push(Self::index_cell(&self.inner.block));
            }
            bumped
        };
        for cell in bumped {
            cell.increment();
        }
        self.inner.length.set(len);
    }

    fn out_of_bounds(&self, index: usize) -> Error {
        Error::IndexOutOfBounds {
            index,
            len: self.inner.data.borrow().len(),
        }
    }

    // =========================================================================
    // LENGTH
    // =========================================================================

    /// Number of elements. Depends on the length only.
    pub fn len(&self) -> usize {
        self.inner.length.get()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // =========================================================================
    // LOOKUP
    // =========================================================================

    /// Get a clone of the element at `index`.
    ///
    /// Depends on that index's cell, or on the length if `index` is past the
    /// end (a push reaching it changes the length).
    pub fn get(&self, index: usize) -> Option<T>
    where
        T: Clone,
    {
        self.with(index, |value| value.cloned())
    }

    /// Borrow the element at `index`. Same dependency as [`get`](Self::get).
    pub fn with<R>(&self, index: usize, f: impl FnOnce(Option<&T>) -> R) -> R {
        self.track_index(index);
        f(self.inner.data.borrow().get(index))
    }

    pub fn first(&self) -> Option<T>
    where
        T: Clone,
    {
        self.get(0)
    }

    /// The last element. Depends on the length and on the last index.
    pub fn last(&self) -> Option<T>
    where
        T: Clone,
    {
        match self.len() {
            0 => None,
            len => self.get(len - 1),
        }
    }

    // =========================================================================
    // INTROSPECTION
    // =========================================================================

    /// Whether some element equals `value`. Depends on the whole vector.
    pub fn contains(&self, value: &T) -> bool
    where
        T: PartialEq,
    {
        self.track_all();
        self.inner.data.borrow().contains(value)
    }

    /// Index of the first element matching `pred`. Depends on the whole
    /// vector.
    pub fn position(&self, pred: impl FnMut(&T) -> bool) -> Option<usize> {
        self.track_all();
        self.inner.data.borrow().iter().position(pred)
    }

    /// Run `f` over the elements as a slice. Depends on the whole vector.
    ///
    /// `f` must not mutate this vector.
    pub fn with_slice<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        self.track_all();
        f(&self.inner.data.borrow())
    }

    /// Call `f` for each element, in order.
    pub fn for_each(&self, mut f: impl FnMut(usize, &T)) {
        self.track_all();
        for (index, value) in self.inner.data.borrow().iter().enumerate() {
            f(index, value);
        }
    }

    /// Snapshot of the elements. Depends on the whole vector.
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.with_slice(<[T]>::to_vec)
    }

    /// Iterate over a snapshot of the elements.
    pub fn iter(&self) -> std::vec::IntoIter<T>
    where
        T: Clone,
    {
        self.to_vec().into_iter()
    }

    // =========================================================================
    // MUTATION
    // =========================================================================

    /// Overwrite the element at `index`, returning the previous one.
    ///
    /// Bumps that index only, and only if the value differs.
    pub fn set(&self, index: usize, value: T) -> Result<T> {
        let changed = match self.inner.data.borrow().get(index) {
            Some(prev) => !(self.inner.equals)(prev, &value),
            None => return Err(self.out_of_bounds(index)),
        };

        let prev = std::mem::replace(&mut self.inner.data.borrow_mut()[index], value);
        if changed {
            let cell = self.inner.items.borrow().get(index).cloned();
            if let Some(cell) = cell {
                cell.increment();
            }
        }
        Ok(prev)
    }

    /// Mutate the element at `index` in place. Always bumps that index.
    pub fn update(&self, index: usize, f: impl FnOnce(&mut T)) -> Result<()> {
        {
            let mut data = self.inner.data.borrow_mut();
            let len = data.len();
            match data.get_mut(index) {
                Some(value) => f(value),
                None => return Err(Error::IndexOutOfBounds { index, len }),
            }
        }
        let cell = self.inner.items.borrow().get(index).cloned();
        if let Some(cell) = cell {
            cell.increment();
        }
        Ok(())
    }

    /// Append an element. Existing indices are untouched.
    pub fn push(&self, value: T) {
        let start = {
            let mut data = self.inner.data.borrow_mut();
            data.push(value);
            data.len() - 1
        };
        self.moved_from(start);
    }

    /// Append every item of `iter` in one step.
    pub fn extend(&self, iter: impl IntoIterator<Item = T>) {
        let start = {
            let mut data = self.inner.data.borrow_mut();
            let start = data.len();
            data.extend(iter);
            start
        };
        self.moved_from(start);
    }

    /// Remove and return the last element.
    pub fn pop(&self) -> Option<T> {
        let (value, len) = {
            let mut data = self.inner.data.borrow_mut();
            let value = data.pop()?;
            (value, data.len())
        };
        self.moved_from(len);
        Some(value)
    }

    /// Insert at `index`, shifting later elements up.
    pub fn insert(&self, index: usize, value: T) -> Result<()> {
        {
            let mut data = self.inner.data.borrow_mut();
            if index > data.len() {
                let len = data.len();
                return Err(Error::IndexOutOfBounds { index, len });
            }
            data.insert(index, value);
        }
        self.moved_from(index);
        Ok(())
    }

    /// Remove the element at `index`, shifting later elements down.
    pub fn remove(&self, index: usize) -> Result<T> {
        let value = {
            let mut data = self.inner.data.borrow_mut();
            if index >= data.len() {
                let len = data.len();
                return Err(Error::IndexOutOfBounds { index, len });
            }
            data.remove(index)
        };
        self.moved_from(index);
        Ok(value)
    }

    /// Replace `range` with the items of `replace_with`, returning the
    /// removed elements.
    pub fn splice(&self, range: Range<usize>, replace_with: impl IntoIterator<Item = T>) -> Result<Vec<T>> {
        let removed = {
            let mut data = self.inner.data.borrow_mut();
            if range.start > range.end || range.end > data.len() {
                let len = data.len();
                return Err(Error::IndexOutOfBounds { index: range.end, len });
            }
            data.splice(range.clone(), replace_with).collect()
        };
        self.moved_from(range.start);
        Ok(removed)
    }

    /// Shorten to `len` elements. No effect if already shorter.
    pub fn truncate(&self, len: usize) {
        let shortened = {
            let mut data = self.inner.data.borrow_mut();
            let shortened = len < data.len();
            data.truncate(len);
            shortened
        };
        if shortened {
            self.moved_from(len);
        }
    }

    /// Grow or shrink to `len`, filling new slots with clones of `value`.
    pub fn resize(&self, len: usize, value: T)
    where
        T: Clone,
    {
        let start = {
            let mut data = self.inner.data.borrow_mut();
            let start = data.len().min(len);
            data.resize(len, value);
            start
        };
        self.moved_from(start);
    }

    /// Remove every element in one step.
    pub fn clear(&self) {
        if self.inner.data.borrow().is_empty() {
            return;
        }
        self.inner.data.borrow_mut().clear();
        self.moved_from(0);
    }

    /// Overwrite every element with a clone of `value`. Bumps the indices
    /// whose value changed.
    pub fn fill(&self, value: T)
    where
        T: Clone,
    {
        let changed: Vec<usize> = {
            let mut data = self.inner.data.borrow_mut();
            let mut changed = Vec::new();
            for (index, slot) in data.iter_mut().enumerate() {
                if !(self.inner.equals)(slot, &value) {
                    *slot = value.clone();
                    changed.push(index);
                }
            }
            changed
        };
        let cells: Vec<Tracked<()>> = {
            let items = self.inner.items.borrow();
            changed.iter().filter_map(|&index| items.get(index).cloned()).collect()
        };
        for cell in cells {
            cell.increment();
        }
    }

    /// Reverse in place. Bumps every index.
    pub fn reverse(&self) {
        self.inner.data.borrow_mut().reverse();
        self.moved_from(0);
    }

    /// Sort in place. Bumps every index.
    pub fn sort(&self)
    where
        T: Ord,
    {
        self.inner.data.borrow_mut().sort();
        self.moved_from(0);
    }

    /// Sort in place with a comparator. Bumps every index.
    pub fn sort_by(&self, compare: impl FnMut(&T, &T) -> std::cmp::Ordering) {
        self.inner.data.borrow_mut().sort_by(compare);
        self.moved_from(0);
    }

    /// Block that owns this vector's cells, if it is still alive.
    pub fn block(&self) -> Option<Block> {
        self.inner
            .block
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Block::from_inner)
    }
}

impl<T: PartialEq + 'static> Default for ReactiveVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PartialEq + 'static> FromIterator<T> for ReactiveVec<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_iter_in(iter, &safe_scope())
    }
}

impl<T: PartialEq + 'static> From<Vec<T>> for ReactiveVec<T> {
    fn from(data: Vec<T>) -> Self {
        data.into_iter().collect()
    }
}

impl<T: fmt::Debug> fmt::Debug for ReactiveVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.inner.data.borrow().iter()).finish()
    }
}

#[cfg(feature = "serde")]
impl<T: serde::Serialize + 'static> serde::Serialize for ReactiveVec<T> {
    /// Serializes as a sequence and depends on the whole vector.
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.track_all();
        serializer.collect_seq(self.inner.data.borrow().iter())
    }
}

/// Create a vector owned by `block`.
pub fn tracked_vec<T: PartialEq + 'static>(block: &Block, iter: impl IntoIterator<Item = T>) -> ReactiveVec<T> {
    ReactiveVec::from_iter_in(iter, block)
}

// =============================================================================
// TESTS
// =============================================================================
