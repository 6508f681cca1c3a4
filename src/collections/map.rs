// ============================================================================
// spark-tracked - ReactiveMap
// An insertion-ordered map with per-key existence cells
// ============================================================================
//
// Two kinds of cells back the map:
//
// 1. Size cell: holds the entry count. Read by `len`, by lookups of absent
//    keys (so they notice a later insert) and by every whole-map read.
// 2. Existence cells: one content-less cell per present key, bumped when the
//    key's value changes or the key goes away. Created on insert, dropped on
//    remove, so absent keys never allocate.
//
// Overwriting a key with an equal value touches nothing.
// ============================================================================

use std::borrow::Borrow;
use std::cell::RefCell;
use std::fmt;
use std::hash::Hash;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::core::types::{default_equals, EqualsFn};
use crate::primitives::block::{Block, BlockInner};
use crate::primitives::scope::safe_scope;
use crate::primitives::tracked::Tracked;

struct MapInner<K, V> {
    data: RefCell<IndexMap<K, V>>,
    items: RefCell<IndexMap<K, Tracked<()>>>,
    size: Tracked<usize>,
    equals: EqualsFn<V>,
    block: Option<Weak<BlockInner>>,
}

// =============================================================================
// REACTIVE MAP
// =============================================================================

/// A reactive map with per-key granularity.
///
/// Handles are cheap to clone and share the same storage.
///
/// # Example
///
/// ```
/// use spark_tracked::{effect, flush_sync, root, ReactiveMap};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let users: ReactiveMap<&str, u32> = ReactiveMap::new();
/// users.insert("alice", 25);
///
/// let seen = Rc::new(Cell::new(0));
/// let (u, s) = (users.clone(), seen.clone());
/// let _root = root(move || {
///     effect(move || s.set(u.get("alice").unwrap_or(0)));
/// });
/// flush_sync();
/// assert_eq!(seen.get(), 25);
///
/// users.insert("bob", 30); // different key: the effect stays clean
/// users.insert("alice", 26);
/// flush_sync();
/// assert_eq!(seen.get(), 26);
/// ```
pub struct ReactiveMap<K, V> {
    inner: Rc<MapInner<K, V>>,
}

impl<K, V> Clone for ReactiveMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V> ReactiveMap<K, V>
where
    K: Eq + Hash + Clone + 'static,
    V: PartialEq + 'static,
{
    /// Create an empty map owned by the ambient scope.
    pub fn new() -> Self {
        Self::new_in(&safe_scope())
    }

    /// Create an empty map owned by `block`.
    pub fn new_in(block: &Block) -> Self {
        Self::from_iter_in(std::iter::empty(), block)
    }

    /// Create a map owned by `block` holding the pairs of `iter`.
    pub fn from_iter_in(iter: impl IntoIterator<Item = (K, V)>, block: &Block) -> Self {
        Self::with_equals_in(iter, default_equals, block)
    }
}

impl<K, V> ReactiveMap<K, V>
where
    K: Eq + Hash + Clone + 'static,
    V: 'static,
{
    /// Create an empty map whose value comparison is `equals`.
    ///
    /// The comparison decides whether overwriting a key notifies readers;
    /// pass [`never_equals`](crate::never_equals) to notify on every write.
    pub fn with_equals(equals: EqualsFn<V>) -> Self {
        Self::with_equals_in(std::iter::empty(), equals, &safe_scope())
    }

    /// Create a map owned by `block` with a custom value comparison.
    pub fn with_equals_in(
        iter: impl IntoIterator<Item = (K, V)>,
        equals: EqualsFn<V>,
        block: &Block,
    ) -> Self {
        let owner = Some(block.downgrade_inner());
        let mut data = IndexMap::new();
        let mut items = IndexMap::new();
        for (key, value) in iter {
            if !items.contains_key(&key) {
                items.insert(key.clone(), Self::existence_cell(&owner));
            }
            data.insert(key, value);
        }
        let size = Tracked::with_owner(data.len(), default_equals, owner.clone());

        Self {
            inner: Rc::new(MapInner {
                data: RefCell::new(data),
                items: RefCell::new(items),
                size,
                equals,
                block: owner,
            }),
        }
    }

    fn existence_cell(owner: &Option<Weak<BlockInner>>) -> Tracked<()> {
        Tracked::with_owner((), default_equals, owner.clone())
    }

    /// Read the existence cell of `key`, or the size cell if it is absent.
    fn track_key<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let cell = self.inner.items.borrow().get(key).cloned();
        match cell {
            Some(cell) => cell.track(),
            None => self.inner.size.track(),
        }
    }

    /// Read the size cell and every existence cell.
    fn track_all(&self) {
        self.inner.size.track();
        let cells: Vec<Tracked<()>> = self.inner.items.borrow().values().cloned().collect();
        for cell in cells {
            cell.track();
        }
    }

    // =========================================================================
    // SIZE
    // =========================================================================

    /// Number of entries. The only read that depends on the count alone.
    pub fn len(&self) -> usize {
        self.inner.size.get()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // =========================================================================
    // LOOKUP
    // =========================================================================

    /// Get a clone of the value for `key`.
    ///
    /// Depends on the key's existence cell, or on the size if the key is
    /// absent (an insert of that key changes the size).
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.with(key, |value| value.cloned())
    }

    /// Borrow the value for `key`. Same dependency as [`get`](Self::get).
    pub fn with<Q, R>(&self, key: &Q, f: impl FnOnce(Option<&V>) -> R) -> R
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.track_key(key);
        f(self.inner.data.borrow().get(key))
    }

    /// Whether `key` is present. Same dependency as [`get`](Self::get).
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.track_key(key);
        self.inner.data.borrow().contains_key(key)
    }

    // =========================================================================
    // MUTATION
    // =========================================================================

    /// Insert or overwrite. Returns the previous value.
    ///
    /// A new key gets an existence cell and bumps the size. An existing key
    /// bumps its existence cell only if the value differs.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        let changed = self
            .inner
            .data
            .borrow()
            .get(&key)
            .map_or(true, |prev| !(self.inner.equals)(prev, &value));

        let (prev, len) = {
            let mut data = self.inner.data.borrow_mut();
            let prev = data.insert(key.clone(), value);
            (prev, data.len())
        };

        let cell = self.inner.items.borrow().get(&key).cloned();
        match cell {
            None => {
                let cell = Self::existence_cell(&self.inner.block);
                self.inner.items.borrow_mut().insert(key, cell);
                self.inner.size.set(len);
            }
            Some(cell) if changed => cell.increment(),
            Some(_) => {}
        }
        prev
    }

    /// Remove `key`, keeping the order of the remaining entries.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let (removed, len) = {
            let mut data = self.inner.data.borrow_mut();
            let removed = data.shift_remove(key);
            (removed, data.len())
        };

        let cell = self.inner.items.borrow_mut().shift_remove(key);
        if let Some(cell) = cell {
            cell.increment();
            self.inner.size.set(len);
        }
        removed
    }

    /// Remove every entry in one step: storage is emptied before any cell is
    /// bumped, so no reader can observe a half-cleared map.
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
    // INTROSPECTION
    // =========================================================================

    /// Keys in insertion order. Depends on the size only: a value change
    /// under an existing key leaves the key list alone.
    pub fn keys(&self) -> Vec<K> {
        self.inner.size.track();
        self.inner.data.borrow().keys().cloned().collect()
    }

    /// Values in insertion order. Depends on the size and every key.
    pub fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.track_all();
        self.inner.data.borrow().values().cloned().collect()
    }

    /// Entries in insertion order. Depends on the size and every key.
    pub fn entries(&self) -> Vec<(K, V)>
    where
        V: Clone,
    {
        self.track_all();
        self.inner
            .data
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Iterate over a snapshot of the entries.
    pub fn iter(&self) -> std::vec::IntoIter<(K, V)>
    where
        V: Clone,
    {
        self.entries().into_iter()
    }

    /// Call `f` for each entry, in insertion order.
    ///
    /// `f` must not mutate this map.
    pub fn for_each(&self, mut f: impl FnMut(&K, &V)) {
        self.track_all();
        for (k, v) in self.inner.data.borrow().iter() {
            f(k, v);
        }
    }

    /// Entries as pairs, for serialization.
    pub fn to_vec(&self) -> Vec<(K, V)>
    where
        V: Clone,
    {
        self.entries()
    }

    /// Block that owns this map's cells, if it is still alive.
    pub fn block(&self) -> Option<Block> {
        self.inner
            .block
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Block::from_inner)
    }
}

impl<K, V> Default for ReactiveMap<K, V>
where
    K: Eq + Hash + Clone + 'static,
    V: PartialEq + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> FromIterator<(K, V)> for ReactiveMap<K, V>
where
    K: Eq + Hash + Clone + 'static,
    V: PartialEq + 'static,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_iter_in(iter, &safe_scope())
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for ReactiveMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.inner.data.borrow().iter()).finish()
    }
}

#[cfg(feature = "serde")]
impl<K, V> serde::Serialize for ReactiveMap<K, V>
where
    K: Eq + Hash + Clone + serde::Serialize + 'static,
    V: serde::Serialize + 'static,
{
    /// Serializes as a sequence of `[key, value]` pairs and depends on the
    /// whole map.
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeSeq;

        self.track_all();
        let data = self.inner.data.borrow();
        let mut seq = serializer.serialize_seq(Some(data.len()))?;
        for pair in data.iter() {
            seq.serialize_element(&pair)?;
        }
        seq.end()
    }
}

/// Create a map owned by `block`.
///
/// # Example
///
/// ```
/// use spark_tracked::{root, tracked_map};
///
/// let owner = root(|| {});
/// let m = tracked_map(&owner, [("a", 1), ("b", 2)]);
/// assert_eq!(m.keys(), vec!["a", "b"]);
/// ```
pub fn tracked_map<K, V>(block: &Block, iter: impl IntoIterator<Item = (K, V)>) -> ReactiveMap<K, V>
where
    K: Eq + Hash + Clone + 'static,
    V: PartialEq + 'static,
{
    ReactiveMap::from_iter_in(iter, block)
}

// =============================================================================
// TESTS
// =============================================================================
