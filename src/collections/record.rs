// ============================================================================
// spark-tracked - ReactiveRecord
// A keyed record with one value cell per field
// ============================================================================
//
// Every field read goes through the field's own cell. Reading a field that
// does not exist yet creates an empty cell for it, so the reader wakes when
// that field is first written and not on unrelated ones. Removing a field
// empties its cell rather than dropping it.
//
// The field list (keys, iteration) depends on a shape cell holding the
// number of present fields, moved only when a field appears or goes away.
// ============================================================================

use std::borrow::Borrow;
use std::cell::RefCell;
use std::fmt;
use std::hash::Hash;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::core::types::default_equals;
use crate::primitives::block::{Block, BlockInner};
use crate::primitives::scope::safe_scope;
use crate::primitives::tracked::Tracked;

struct RecordInner<K, V> {
    /// Present fields in insertion order, then fields only read so far
    fields: RefCell<IndexMap<K, Tracked<Option<V>>>>,
    shape: Tracked<usize>,
    block: Option<Weak<BlockInner>>,
}

// =============================================================================
// REACTIVE RECORD
// =============================================================================

/// A reactive record: named fields, each with its own cell.
///
/// Where [`ReactiveMap`](crate::ReactiveMap) treats a missing key like any
/// other size change, a record gives missing fields a cell of their own.
///
/// # Example
///
/// ```
/// use spark_tracked::{effect, flush_sync, root, ReactiveRecord};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let user: ReactiveRecord<String, String> = ReactiveRecord::new();
/// user.insert("name".to_string(), "ada".to_string());
///
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let (u, s) = (user.clone(), seen.clone());
/// let _tree = root(move || {
///     effect(move || s.borrow_mut().push(u.get("email")));
/// });
/// flush_sync();
///
/// user.insert("role".to_string(), "admin".to_string()); // another field
/// flush_sync();
/// user.insert("email".to_string(), "ada@example.com".to_string());
/// flush_sync();
/// assert_eq!(*seen.borrow(), vec![None, Some("ada@example.com".to_string())]);
/// ```
pub struct ReactiveRecord<K, V> {
    inner: Rc<RecordInner<K, V>>,
}

impl<K, V> Clone for ReactiveRecord<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V> ReactiveRecord<K, V>
where
    K: Eq + Hash + Clone + 'static,
    V: Clone + PartialEq + 'static,
{
    /// Create an empty record owned by the ambient scope.
    pub fn new() -> Self {
        Self::new_in(&safe_scope())
    }

    /// Create an empty record owned by `block`.
    pub fn new_in(block: &Block) -> Self {
        Self::from_iter_in(std::iter::empty(), block)
    }

    /// Create a record owned by `block` with the fields of `iter`.
    pub fn from_iter_in(iter: impl IntoIterator<Item = (K, V)>, block: &Block) -> Self {
        let owner = Some(block.downgrade_inner());
        let mut fields = IndexMap::new();
        for (key, value) in iter {
            fields.insert(key, Self::field_cell(Some(value), &owner));
        }
        let shape = Tracked::with_owner(fields.len(), default_equals, owner.clone());

        Self {
            inner: Rc::new(RecordInner {
                fields: RefCell::new(fields),
                shape,
                block: owner,
            }),
        }
    }

    fn field_cell(value: Option<V>, owner: &Option<Weak<BlockInner>>) -> Tracked<Option<V>> {
        Tracked::with_owner(value, default_equals, owner.clone())
    }

    /// The cell of `field`, created empty if the field was never seen.
    fn field<Q>(&self, field: &Q) -> Tracked<Option<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        let existing = self.inner.fields.borrow().get(field).cloned();
        if let Some(cell) = existing {
            return cell;
        }
        let cell = Self::field_cell(None, &self.inner.block);
        self.inner.fields.borrow_mut().insert(field.to_owned(), cell.clone());
        cell
    }

    /// Present cells in field order, untracked.
    fn present(&self) -> Vec<(K, Tracked<Option<V>>)> {
        self.inner
            .fields
            .borrow()
            .iter()
            .filter(|(_, cell)| cell.peek().is_some())
            .map(|(key, cell)| (key.clone(), cell.clone()))
            .collect()
    }

    // =========================================================================
    // FIELDS
    // =========================================================================

    /// Get a clone of `field`. Depends on that field's cell only.
    pub fn get<Q>(&self, field: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        self.field(field).get()
    }

    /// Borrow `field`. Same dependency as [`get`](Self::get).
    pub fn with<Q, R>(&self, field: &Q, f: impl FnOnce(Option<&V>) -> R) -> R
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        self.field(field).with(|value| f(value.as_ref()))
    }

    /// Whether `field` is present. Same dependency as [`get`](Self::get).
    pub fn contains_key<Q>(&self, field: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        self.field(field).with(Option::is_some)
    }

    /// Write `field`, returning its previous value.
    ///
    /// An equal value touches nothing. A field that appears moves to the end
    /// of the field order and changes the shape.
    pub fn insert(&self, field: K, value: V) -> Option<V> {
        let existing = self.inner.fields.borrow().get(&field).cloned();
        let cell = match existing {
            Some(cell) => cell,
            None => {
                let cell = Self::field_cell(None, &self.inner.block);
                self.inner.fields.borrow_mut().insert(field.clone(), cell.clone());
                cell
            }
        };

        let prev = cell.peek();
        if prev.is_none() {
            // Read-only cells sit wherever they were first read
            let mut fields = self.inner.fields.borrow_mut();
            if let Some(index) = fields.get_index_of(&field) {
                let last = fields.len() - 1;
                fields.move_index(index, last);
            }
        }
        cell.set(Some(value));
        if prev.is_none() {
            self.inner.shape.set(self.inner.shape.peek() + 1);
        }
        prev
    }

    /// Remove `field`, returning its value. Readers of the field wake.
    pub fn remove<Q>(&self, field: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let cell = self.inner.fields.borrow().get(field).cloned()?;
        let prev = cell.peek();
        if prev.is_some() {
            cell.set(None);
            self.inner.shape.set(self.inner.shape.peek().saturating_sub(1));
        }
        prev
    }

    // =========================================================================
    // INTROSPECTION
    // =========================================================================

    /// Number of present fields. Depends on the shape only.
    pub fn len(&self) -> usize {
        self.inner.shape.get()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Present field names in order. Depends on the shape only.
    pub fn keys(&self) -> Vec<K> {
        self.inner.shape.track();
        self.present().into_iter().map(|(key, _)| key).collect()
    }

    /// Present values in field order. Depends on the shape and every field.
    pub fn values(&self) -> Vec<V> {
        self.entries().into_iter().map(|(_, value)| value).collect()
    }

    /// Present fields in order. Depends on the shape and every field.
    pub fn entries(&self) -> Vec<(K, V)> {
        self.inner.shape.track();
        self.present()
            .into_iter()
            .filter_map(|(key, cell)| cell.get().map(|value| (key, value)))
            .collect()
    }

    /// Iterate over a snapshot of the present fields.
    pub fn iter(&self) -> std::vec::IntoIter<(K, V)> {
        self.entries().into_iter()
    }

    /// Block that owns this record's cells, if it is still alive.
    pub fn block(&self) -> Option<Block> {
        self.inner
            .block
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Block::from_inner)
    }
}

impl<K, V> Default for ReactiveRecord<K, V>
where
    K: Eq + Hash + Clone + 'static,
    V: Clone + PartialEq + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> FromIterator<(K, V)> for ReactiveRecord<K, V>
where
    K: Eq + Hash + Clone + 'static,
    V: Clone + PartialEq + 'static,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_iter_in(iter, &safe_scope())
    }
}

impl<K: fmt::Debug, V: fmt::Debug + Clone + 'static> fmt::Debug for ReactiveRecord<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self.inner.fields.borrow();
        let present = fields
            .iter()
            .filter_map(|(key, cell)| cell.peek().map(|value| (key, value)));
        f.debug_map().entries(present).finish()
    }
}

#[cfg(feature = "serde")]
impl<K, V> serde::Serialize for ReactiveRecord<K, V>
where
    K: Eq + Hash + Clone + serde::Serialize + 'static,
    V: Clone + PartialEq + serde::Serialize + 'static,
{
    /// Serializes as a map of the present fields and depends on all of them.
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries())
    }
}

/// Create a record owned by `block`.
pub fn tracked_record<K, V>(block: &Block, iter: impl IntoIterator<Item = (K, V)>) -> ReactiveRecord<K, V>
where
    K: Eq + Hash + Clone + 'static,
    V: Clone + PartialEq + 'static,
{
    ReactiveRecord::from_iter_in(iter, block)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::block::{effect, root};
    use crate::reactivity::scheduling::flush_sync;
    use std::cell::Cell;

    fn watch(f: impl Fn() + 'static) -> (Block, Rc<Cell<u32>>) {
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        let block = root(move || {
            effect(move || {
                f();
                r.set(r.get() + 1);
            });
        });
        flush_sync();
        (block, runs)
    }

    fn record(pairs: &[(&str, i32)]) -> ReactiveRecord<String, i32> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn missing_field_reader_ignores_other_fields() {
        let rec = record(&[("a", 1)]);
        let r = rec.clone();
        let (_b, runs) = watch(move || {
            let _ = r.get("b");
        });

        rec.insert("a".into(), 2);
        rec.insert("c".into(), 3);
        flush_sync();
        assert_eq!(runs.get(), 1);

        rec.insert("b".into(), 1);
        flush_sync();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn equal_write_is_silent() {
        let rec = record(&[("a", 1)]);
        let r = rec.clone();
        let (_b, runs) = watch(move || {
            let _ = r.entries();
        });

        assert_eq!(rec.insert("a".into(), 1), Some(1));
        flush_sync();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn keys_follow_the_shape_only() {
        let rec = record(&[("a", 1)]);
        let r = rec.clone();
        let (_b, runs) = watch(move || {
            let _ = r.keys();
        });

        rec.insert("a".into(), 5);
        flush_sync();
        assert_eq!(runs.get(), 1);

        rec.insert("b".into(), 1);
        flush_sync();
        assert_eq!(runs.get(), 2);

        assert_eq!(rec.remove("a"), Some(5));
        flush_sync();
        assert_eq!(runs.get(), 3);
        assert_eq!(rec.keys(), vec!["b".to_string()]);
    }

    #[test]
    fn removed_field_reads_as_missing() {
        let rec = record(&[("a", 1)]);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let (r, s) = (rec.clone(), seen.clone());
        let _b = root(move || {
            effect(move || s.borrow_mut().push(r.contains_key("a")));
        });
        flush_sync();

        rec.remove("a");
        flush_sync();
        assert_eq!(rec.remove("a"), None);
        flush_sync();
        assert_eq!(*RefCell::borrow(&seen), vec![true, false]);
        assert!(rec.is_empty());
    }

    #[test]
    fn order_is_insertion_order_of_present_fields() {
        let rec: ReactiveRecord<String, i32> = ReactiveRecord::new();
        // Read first: the cell exists before the field does
        assert_eq!(rec.get("z"), None);
        rec.insert("a".into(), 1);
        rec.insert("z".into(), 2);
        assert_eq!(rec.entries(), vec![("a".to_string(), 1), ("z".to_string(), 2)]);
        assert_eq!(rec.len(), 2);
    }

    #[test]
    fn owner_is_recorded() {
        let owner = root(|| {});
        let rec = tracked_record(&owner, [("k", 1)]);
        assert!(rec.block().is_some_and(|b| b.ptr_eq(&owner)));
    }
}
