// ============================================================================
// spark-tracked - ReactiveSet
// An insertion-ordered set with per-item existence cells
// ============================================================================
//
// Membership checks depend on the item's existence cell (or on the size when
// the item is absent). Everything else, iteration included, depends on the
// size alone: items carry no content, so a set only changes by changing size.
// ============================================================================

use std::cell::RefCell;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::rc::{Rc, Weak};

use indexmap::{IndexMap, IndexSet};

use crate::core::types::default_equals;
use crate::primitives::block::{Block, BlockInner};
use crate::primitives::scope::safe_scope;
use crate::primitives::tracked::Tracked;

struct SetInner<T> {
    data: RefCell<IndexSet<T>>,
    items: RefCell<IndexMap<T, Tracked<()>>>,
    size: Tracked<usize>,
    block: Option<Weak<BlockInner>>,
}

// =============================================================================
// REACTIVE SET
// =============================================================================

/// A reactive set with per-item granularity.
///
/// # Example
///
/// ```
/// use spark_tracked::ReactiveSet;
///
/// let s: ReactiveSet<i32> = [1, 2].into_iter().collect();
/// let d: ReactiveSet<i32> = [2, 3].into_iter().collect();
///
/// let u = s.union(&d);
/// assert_eq!(u.to_vec(), vec![1, 2, 3]);
/// assert_eq!(s.len(), 2); // operands untouched
/// ```
pub struct ReactiveSet<T> {
    inner: Rc<SetInner<T>>,
}

impl<T> Clone for ReactiveSet<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Eq + Hash + Clone + 'static> ReactiveSet<T> {
    /// Create an empty set owned by the ambient scope.
    pub fn new() -> Self {
        Self::new_in(&safe_scope())
    }

    /// Create an empty set owned by `block`.
    pub fn new_in(block: &Block) -> Self {
        Self::from_iter_in(std::iter::empty(), block)
    }

    /// Create a set owned by `block` holding the items of `iter`.
    pub fn from_iter_in(iter: impl IntoIterator<Item = T>, block: &Block) -> Self {
        let owner = Some(block.downgrade_inner());
        let mut data = IndexSet::new();
        let mut items = IndexMap::new();
        for item in iter {
            if data.insert(item.clone()) {
                items.insert(item, Self::existence_cell(&owner));
            }
        }
        let size = Tracked::with_owner(data.len(), default_equals, owner.clone());

        Self {
            inner: Rc::new(SetInner {
                data: RefCell::new(data),
                items: RefCell::new(items),
                size,
                block: owner,
            }),
        }
    }

    fn existence_cell(owner: &Option<Weak<BlockInner>>) -> Tracked<()> {
        Tracked::with_owner((), default_equals, owner.clone())
    }

    // =========================================================================
    // SIZE AND MEMBERSHIP
    // =========================================================================

    /// Number of items.
    pub fn len(&self) -> usize {
        self.inner.size.get()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `item` is present.
    ///
    /// Depends on the item's existence cell, or on the size if it is absent.
    pub fn contains(&self, item: &T) -> bool {
        let cell = self.inner.items.borrow().get(item).cloned();
        match cell {
            Some(cell) => cell.track(),
            None => self.inner.size.track(),
        }
        self.inner.data.borrow().contains(item)
    }

    // =========================================================================
    // MUTATION
    // =========================================================================

    /// Add `item`. Returns false (and notifies nobody) if it was present.
    pub fn insert(&self, item: T) -> bool {
        let len = {
            let mut data = self.inner.data.borrow_mut();
            if !data.insert(item.clone()) {
                return false;
            }
            data.len()
        };
        let cell = Self::existence_cell(&self.inner.block);
        self.inner.items.borrow_mut().insert(item, cell);
        self.inner.size.set(len);
        true
    }

    /// Remove `item`. Returns false if it was absent.
    pub fn remove(&self, item: &T) -> bool {
        let len = {
            let mut data = self.inner.data.borrow_mut();
            if !data.shift_remove(item) {
                return false;
            }
            data.len()
        };
        let cell = self.inner.items.borrow_mut().shift_remove(item);
        if let Some(cell) = cell {
            cell.increment();
        }
        self.inner.size.set(len);
        true
    }

    /// Remove every item in one step.
    pub fn clear(&self) {
        if self.inner.data.borrow().is_empty() {
            return;
        }

        self.inner.data.borrow_mut().clear();
        let cells = std::mem::take(&mut *self.inner.items.borrow_mut());
        for cell in cells.values() {
            cell.increment();
        }
        self.inner.size.set(0);
    }

    // =========================================================================
    // ITERATION (size only)
    // =========================================================================

    /// Items in insertion order.
    pub fn to_vec(&self) -> Vec<T> {
        self.inner.size.track();
        self.inner.data.borrow().iter().cloned().collect()
    }

    /// Iterate over a snapshot of the items.
    pub fn iter(&self) -> std::vec::IntoIter<T> {
        self.to_vec().into_iter()
    }

    /// Same as [`to_vec`](Self::to_vec).
    pub fn values(&self) -> Vec<T> {
        self.to_vec()
    }

    /// Same as [`to_vec`](Self::to_vec); a set's keys are its values.
    pub fn keys(&self) -> Vec<T> {
        self.to_vec()
    }

    /// Each item paired with itself.
    pub fn entries(&self) -> Vec<(T, T)> {
        self.iter().map(|item| (item.clone(), item)).collect()
    }

    /// Call `f` for each item, in insertion order. `f` must not mutate this
    /// set.
    pub fn for_each(&self, mut f: impl FnMut(&T)) {
        self.inner.size.track();
        for item in self.inner.data.borrow().iter() {
            f(item);
        }
    }

    // =========================================================================
    // COMPARISON (both sizes)
    // =========================================================================

    /// Every item of this set is in `other`.
    pub fn is_subset(&self, other: &impl SetOperand<T>) -> bool {
        self.inner.size.track();
        other.track();
        self.inner.data.borrow().iter().all(|item| other.contains_item(item))
    }

    /// Every item of `other` is in this set.
    pub fn is_superset(&self, other: &impl SetOperand<T>) -> bool {
        self.inner.size.track();
        other.track();
        let data = self.inner.data.borrow();
        other.items().iter().all(|item| data.contains(item))
    }

    /// No item is in both sets.
    pub fn is_disjoint(&self, other: &impl SetOperand<T>) -> bool {
        self.inner.size.track();
        other.track();
        !self.inner.data.borrow().iter().any(|item| other.contains_item(item))
    }

    // =========================================================================
    // ALGEBRA (new sets, owned by the ambient scope)
    // =========================================================================

    fn derive(&self, other: &impl SetOperand<T>, build: impl FnOnce(&IndexSet<T>, Vec<T>) -> Vec<T>) -> Self {
        self.inner.size.track();
        other.track();
        let items = build(&self.inner.data.borrow(), other.items());
        Self::from_iter_in(items, &safe_scope())
    }

    /// Items of this set followed by the items of `other` not already in it.
    pub fn union(&self, other: &impl SetOperand<T>) -> Self {
        self.derive(other, |data, other| data.iter().cloned().chain(other).collect())
    }

    /// Items of this set that are also in `other`.
    pub fn intersection(&self, other: &impl SetOperand<T>) -> Self {
        self.derive(other, |data, other| {
            let other: HashSet<T> = other.into_iter().collect();
            data.iter().filter(|item| other.contains(*item)).cloned().collect()
        })
    }

    /// Items of this set that are not in `other`.
    pub fn difference(&self, other: &impl SetOperand<T>) -> Self {
        self.derive(other, |data, other| {
            let other: HashSet<T> = other.into_iter().collect();
            data.iter().filter(|item| !other.contains(*item)).cloned().collect()
        })
    }

    /// Items in exactly one of the two sets: this set's first, then the
    /// other's.
    pub fn symmetric_difference(&self, other: &impl SetOperand<T>) -> Self {
        self.derive(other, |data, other| {
            let in_other: HashSet<&T> = other.iter().collect();
            let mut out: Vec<T> = data.iter().filter(|item| !in_other.contains(item)).cloned().collect();
            out.extend(other.iter().filter(|item| !data.contains(*item)).cloned());
            out
        })
    }

    /// Block that owns this set's cells, if it is still alive.
    pub fn block(&self) -> Option<Block> {
        self.inner
            .block
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Block::from_inner)
    }
}

impl<T: Eq + Hash + Clone + 'static> Default for ReactiveSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Eq + Hash + Clone + 'static> FromIterator<T> for ReactiveSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_iter_in(iter, &safe_scope())
    }
}

impl<T: fmt::Debug> fmt::Debug for ReactiveSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.inner.data.borrow().iter()).finish()
    }
}

#[cfg(feature = "serde")]
impl<T> serde::Serialize for ReactiveSet<T>
where
    T: Eq + Hash + Clone + serde::Serialize + 'static,
{
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeSeq;

        self.inner.size.track();
        let data = self.inner.data.borrow();
        let mut seq = serializer.serialize_seq(Some(data.len()))?;
        for item in data.iter() {
            seq.serialize_element(item)?;
        }
        seq.end()
    }
}

// =============================================================================
// SET OPERAND - the "other" side of comparisons and algebra
// =============================================================================

/// Anything a [`ReactiveSet`] can be compared or combined with.
///
/// Reactive operands register a dependency on their size; plain sets do not.
pub trait SetOperand<T> {
    /// Register the operand's dependency, if it has one.
    fn track(&self) {}

    fn contains_item(&self, item: &T) -> bool;

    /// Items in iteration order.
    fn items(&self) -> Vec<T>;
}

impl<T: Eq + Hash + Clone + 'static> SetOperand<T> for ReactiveSet<T> {
    fn track(&self) {
        self.inner.size.track();
    }

    fn contains_item(&self, item: &T) -> bool {
        self.inner.data.borrow().contains(item)
    }

    fn items(&self) -> Vec<T> {
        self.inner.data.borrow().iter().cloned().collect()
    }
}

impl<T: Eq + Hash + Clone, S: BuildHasher> SetOperand<T> for HashSet<T, S> {
    fn contains_item(&self, item: &T) -> bool {
        self.contains(item)
    }

    fn items(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

impl<T: Ord + Clone> SetOperand<T> for BTreeSet<T> {
    fn contains_item(&self, item: &T) -> bool {
        self.contains(item)
    }

    fn items(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

impl<T: Eq + Hash + Clone, S: BuildHasher> SetOperand<T> for IndexSet<T, S> {
    fn contains_item(&self, item: &T) -> bool {
        self.contains(item)
    }

    fn items(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

/// Create a set owned by `block`.
pub fn tracked_set<T: Eq + Hash + Clone + 'static>(block: &Block, iter: impl IntoIterator<Item = T>) -> ReactiveSet<T> {
    ReactiveSet::from_iter_in(iter, block)
}

// =============================================================================
// TESTS
// =============================================================================
