// ============================================================================
// spark-tracked - ReactiveSearchParams
// Query-string pairs behind one version cell, optionally bound to a URL
// ============================================================================
//
// Every read depends on the version cell; every effective mutation bumps it.
// A bound instance writes its serialization back into the owning URL's
// search component, and the URL pushes its search back in here when it
// changes. `SyncState` keeps the two directions from feeding each other.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use url::form_urlencoded;

use crate::core::types::default_equals;
use crate::primitives::block::{Block, BlockInner};
use crate::primitives::scope::safe_scope;
use crate::primitives::tracked::Tracked;

use super::url::UrlInner;

/// Which synchronization, if any, is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Idle,
    /// The URL's search changed and the pairs are being replaced
    SyncingFromUrl,
    /// The pairs changed and the URL's search is being rewritten
    SyncingFromParams,
}

pub(crate) struct ParamsInner {
    entries: RefCell<Vec<(String, String)>>,
    version: Tracked<()>,
    url: Option<Weak<UrlInner>>,
    state: Cell<SyncState>,
}

/// Reactive `application/x-www-form-urlencoded` pairs.
///
/// # Example
///
/// ```
/// use spark_tracked::ReactiveSearchParams;
///
/// let params = ReactiveSearchParams::new("?a=1&b=2&a=3");
/// assert_eq!(params.get_all("a"), vec!["1", "3"]);
///
/// params.set("a", "9");
/// assert_eq!(params.to_string(), "a=9&b=2");
/// ```
pub struct ReactiveSearchParams {
    inner: Rc<ParamsInner>,
}

impl Clone for ReactiveSearchParams {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    let query = query.strip_prefix('?').unwrap_or(query);
    form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

impl ReactiveSearchParams {
    /// Parse a query string (a leading `?` is ignored), owned by the ambient
    /// scope.
    pub fn new(query: &str) -> Self {
        Self::new_in(&safe_scope(), query)
    }

    /// Parse a query string, owned by `block`.
    pub fn new_in(block: &Block, query: &str) -> Self {
        Self::with_parts(parse_query(query), Some(block.downgrade_inner()), None)
    }

    /// Build from name/value pairs, owned by the ambient scope.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let entries = pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self::with_parts(entries, Some(safe_scope().downgrade_inner()), None)
    }

    pub(crate) fn bound(query: &str, block: Option<Weak<BlockInner>>, url: Weak<UrlInner>) -> Self {
        Self::with_parts(parse_query(query), block, Some(url))
    }

    fn with_parts(
        entries: Vec<(String, String)>,
        block: Option<Weak<BlockInner>>,
        url: Option<Weak<UrlInner>>,
    ) -> Self {
        Self {
            inner: Rc::new(ParamsInner {
                entries: RefCell::new(entries),
                version: Tracked::with_owner((), default_equals, block),
                url,
                state: Cell::new(SyncState::Idle),
            }),
        }
    }

    /// Current synchronization state.
    pub fn sync_state(&self) -> SyncState {
        self.inner.state.get()
    }

    // =========================================================================
    // READS (all depend on the version cell)
    // =========================================================================

    fn read<R>(&self, f: impl FnOnce(&[(String, String)]) -> R) -> R {
        self.inner.version.track();
        f(&self.inner.entries.borrow())
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<String> {
        self.read(|entries| entries.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone()))
    }

    /// Every value for `name`, in order.
    pub fn get_all(&self, name: &str) -> Vec<String> {
        self.read(|entries| {
            entries
                .iter()
                .filter(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
                .collect()
        })
    }

    pub fn has(&self, name: &str) -> bool {
        self.read(|entries| entries.iter().any(|(k, _)| k == name))
    }

    /// Whether the exact pair is present.
    pub fn has_value(&self, name: &str, value: &str) -> bool {
        self.read(|entries| entries.iter().any(|(k, v)| k == name && v == value))
    }

    /// Names in order, repeated names included.
    pub fn keys(&self) -> Vec<String> {
        self.read(|entries| entries.iter().map(|(k, _)| k.clone()).collect())
    }

    pub fn values(&self) -> Vec<String> {
        self.read(|entries| entries.iter().map(|(_, v)| v.clone()).collect())
    }

    pub fn entries(&self) -> Vec<(String, String)> {
        self.read(<[(String, String)]>::to_vec)
    }

    /// Call `f` with each pair. `f` must not mutate these params.
    pub fn for_each(&self, mut f: impl FnMut(&str, &str)) {
        self.read(|entries| {
            for (k, v) in entries {
                f(k, v);
            }
        });
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.read(<[(String, String)]>::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn serialize(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.inner.entries.borrow().iter())
            .finish()
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    fn changed(&self) {
        self.update_url();
        self.inner.version.increment();
    }

    /// Add a pair at the end.
    pub fn append(&self, name: &str, value: &str) {
        self.inner
            .entries
            .borrow_mut()
            .push((name.to_string(), value.to_string()));
        self.changed();
    }

    /// Remove every pair named `name`. No-op if there is none.
    pub fn delete(&self, name: &str) {
        if self.remove_where(|k, _| k == name) {
            self.changed();
        }
    }

    /// Remove every `name=value` pair. No-op if there is none.
    pub fn delete_value(&self, name: &str, value: &str) {
        if self.remove_where(|k, v| k == name && v == value) {
            self.changed();
        }
    }

    fn remove_where(&self, matches: impl Fn(&str, &str) -> bool) -> bool {
        let mut entries = self.inner.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(k, v)| !matches(k, v));
        entries.len() != before
    }

    /// Replace the first `name` pair's value and drop the other `name`
    /// pairs, or append if there is none.
    ///
    /// Notifies only if the joined values for `name` differ afterwards.
    /// Exact-pair presence is not enough: for `a=1&b=2&a=3`, setting `a` to
    /// `1` removes `a=3` although `a=1` was already there.
    pub fn set(&self, name: &str, value: &str) {
        let changed = {
            let mut entries = self.inner.entries.borrow_mut();
            let joined = |entries: &[(String, String)]| -> String {
                entries
                    .iter()
                    .filter(|(k, _)| k == name)
                    .map(|(_, v)| v.as_str())
                    .collect()
            };
            let previous = joined(&entries);

            match entries.iter().position(|(k, _)| k == name) {
                Some(first) => {
                    entries[first].1 = value.to_string();
                    let mut index = 0;
                    entries.retain(|(k, _)| {
                        let keep = index <= first || k != name;
                        index += 1;
                        keep
                    });
                }
                None => entries.push((name.to_string(), value.to_string())),
            }
            previous != joined(&entries)
        };
        if changed {
            self.changed();
        }
    }

    /// Stable sort by name, comparing UTF-16 code units.
    pub fn sort(&self) {
        self.inner
            .entries
            .borrow_mut()
            .sort_by(|(a, _), (b, _)| a.encode_utf16().cmp(b.encode_utf16()));
        self.changed();
    }

    // =========================================================================
    // URL SYNC
    // =========================================================================

    /// Rewrite the bound URL's search from these pairs.
    fn update_url(&self) {
        if self.inner.state.get() != SyncState::Idle {
            return;
        }
        let Some(url) = self.inner.url.as_ref().and_then(Weak::upgrade) else {
            return;
        };

        self.inner.state.set(SyncState::SyncingFromParams);
        let query = self.serialize();
        let search = if query.is_empty() {
            String::new()
        } else {
            format!("?{query}")
        };
        tracing::trace!(%search, "writing search params back to url");
        url.write_search(&search);
        self.inner.state.set(SyncState::Idle);
    }

    /// Replace every pair with the ones in `search`, after the bound URL's
    /// search changed.
    pub(crate) fn replace_from_url(&self, search: &str) {
        if self.inner.state.get() != SyncState::Idle {
            return;
        }
        self.inner.state.set(SyncState::SyncingFromUrl);
        tracing::trace!(%search, "replacing search params from url");
        *self.inner.entries.borrow_mut() = parse_query(search);
        self.inner.version.increment();
        self.inner.state.set(SyncState::Idle);
    }
}

impl fmt::Display for ReactiveSearchParams {
    /// The serialized query, without a leading `?`. Depends on the version.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.version.track();
        f.write_str(&self.serialize())
    }
}

impl fmt::Debug for ReactiveSearchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveSearchParams")
            .field("entries", &*self.inner.entries.borrow())
            .field("state", &self.inner.state.get())
            .finish()
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ReactiveSearchParams {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entries())
    }
}

// =============================================================================
// TESTS
// =============================================================================
