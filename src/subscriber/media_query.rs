// ============================================================================
// spark-tracked - MediaQuery
// A boolean that follows a media query while something reads it
// ============================================================================
//
// The platform is reached through a per-thread `MediaMatcher`. Hosts
// install one with `set_media_matcher`; without one every query reports its
// fallback and never changes.
// ============================================================================

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::primitives::block::Block;
use crate::primitives::scope::safe_scope;
use crate::primitives::tracked::{Readable, Tracked};

use super::events::{on, EventTarget, ListenerOptions};
use super::reactive_value::ReactiveValue;

/// Keywords that make a query valid without surrounding parentheses
const NON_PARENTHESIZED_KEYWORDS: [&str; 7] = ["all", "print", "screen", "and", "or", "not", "only"];

/// The platform's answer for one query. Fires `"change"` when `matches`
/// flips.
pub trait MediaQueryList: EventTarget {
    fn matches(&self) -> bool;

    /// The query as the platform understood it.
    fn media(&self) -> String;
}

/// Evaluates media queries (the host's `matchMedia`).
pub trait MediaMatcher {
    fn match_media(&self, query: &str) -> Rc<dyn MediaQueryList>;
}

thread_local! {
    static MEDIA_MATCHER: RefCell<Option<Rc<dyn MediaMatcher>>> = const { RefCell::new(None) };
}

/// Install the matcher used by [`MediaQuery`]s created on this thread.
/// Returns the previous one.
pub fn set_media_matcher(matcher: Option<Rc<dyn MediaMatcher>>) -> Option<Rc<dyn MediaMatcher>> {
    MEDIA_MATCHER.with(|slot| std::mem::replace(&mut *slot.borrow_mut(), matcher))
}

fn media_matcher() -> Option<Rc<dyn MediaMatcher>> {
    MEDIA_MATCHER.with(|slot| slot.borrow().clone())
}

/// Wrap a bare feature in parentheses: `"min-width: 600px"` becomes
/// `"(min-width: 600px)"`. Queries that already hold a parenthesized
/// feature or a media type/operator keyword are kept as written.
pub fn normalize_query(query: &str) -> String {
    let has_feature = query
        .find('(')
        .is_some_and(|open| query[open + 1..].rfind(')').is_some_and(|close| close > 0));
    let has_keyword = query
        .split(|c: char| c.is_whitespace() || c == ',')
        .any(|keyword| NON_PARENTHESIZED_KEYWORDS.contains(&keyword.trim()));

    if has_feature || has_keyword {
        query.to_string()
    } else {
        format!("({query})")
    }
}

/// A reactive media query.
///
/// # Example
///
/// ```
/// use spark_tracked::MediaQuery;
///
/// // No matcher installed: the fallback is served
/// let wide = MediaQuery::new("min-width: 1024px", true);
/// assert_eq!(wide.query(), "(min-width: 1024px)");
/// assert!(wide.current());
/// ```
pub struct MediaQuery {
    query: String,
    value: ReactiveValue<bool>,
}

impl MediaQuery {
    /// Follow `query`, owned by the ambient scope. `fallback` is reported
    /// when no matcher is installed.
    pub fn new(query: &str, fallback: bool) -> Self {
        Self::new_in(&safe_scope(), query, fallback)
    }

    /// Follow `query`, owned by `block`.
    pub fn new_in(block: &Block, query: &str, fallback: bool) -> Self {
        let query = normalize_query(query);

        let Some(matcher) = media_matcher() else {
            let matches = Tracked::new_in(fallback, block);
            let value = ReactiveValue::new_in(block, move || matches.get(), || None);
            return Self { query, value };
        };

        let list = matcher.match_media(&query);
        let matches = Tracked::new_in(list.matches(), block);
        let reader = matches.clone();

        // The query owns its list; the listener only points back at it
        let start = move || {
            let weak: Weak<dyn MediaQueryList> = Rc::downgrade(&list);
            let matches = matches.clone();
            Some(on(
                list.clone(),
                "change",
                move |_event: &str| {
                    if let Some(list) = weak.upgrade() {
                        // Listener runs outside any block: a plain write
                        matches.set(list.matches());
                    }
                },
                ListenerOptions::default(),
            ))
        };

        Self {
            query,
            value: ReactiveValue::new_in(block, move || reader.get(), start),
        }
    }

    /// Whether the query matches. Subscribes the reading block.
    pub fn current(&self) -> bool {
        self.value.get()
    }

    /// The normalized query.
    pub fn query(&self) -> &str {
        &self.query
    }
}

impl Readable for MediaQuery {
    type Value = bool;

    fn read(&self) -> bool {
        self.current()
    }
}

impl fmt::Debug for MediaQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaQuery")
            .field("query", &self.query)
            .field("matches", &self.value.peek())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::block::{effect, root};
    use crate::reactivity::scheduling::{flush_sync, tick};
    use crate::subscriber::events::{EventHandler, ListenerId};
    use std::cell::Cell;

    #[derive(Default)]
    struct FakeList {
        media: String,
        matches: Cell<bool>,
        listeners: RefCell<Vec<(ListenerId, EventHandler)>>,
        next: Cell<u64>,
    }

    impl FakeList {
        fn flip(&self, value: bool) {
            self.matches.set(value);
            let handlers: Vec<EventHandler> = self.listeners.borrow().iter().map(|(_, h)| h.clone()).collect();
            for handler in handlers {
                handler("change");
            }
        }
    }

    impl EventTarget for FakeList {
        fn add_event_listener(&self, _: &str, handler: EventHandler, _: ListenerOptions) -> ListenerId {
            let id = ListenerId(self.next.get());
            self.next.set(id.0 + 1);
            self.listeners.borrow_mut().push((id, handler));
            id
        }

        fn remove_event_listener(&self, _: &str, id: ListenerId, _: ListenerOptions) {
            self.listeners.borrow_mut().retain(|(l, _)| *l != id);
        }
    }

    impl MediaQueryList for FakeList {
        fn matches(&self) -> bool {
            self.matches.get()
        }

        fn media(&self) -> String {
            self.media.clone()
        }
    }

    struct FakeMatcher {
        list: Rc<FakeList>,
    }

    impl MediaMatcher for FakeMatcher {
        fn match_media(&self, _query: &str) -> Rc<dyn MediaQueryList> {
            self.list.clone()
        }
    }

    #[test]
    fn normalization() {
        assert_eq!(normalize_query("min-width: 600px"), "(min-width: 600px)");
        assert_eq!(normalize_query("(min-width: 600px)"), "(min-width: 600px)");
        assert_eq!(normalize_query("screen and (color)"), "screen and (color)");
        assert_eq!(normalize_query("print"), "print");
        assert_eq!(normalize_query("random,screen"), "random,screen");
        assert_eq!(normalize_query("()"), "(())");
    }

    #[test]
    fn follows_platform_while_observed() {
        let list = Rc::new(FakeList {
            media: "(prefers-color-scheme: dark)".into(),
            ..Default::default()
        });
        let previous = set_media_matcher(Some(Rc::new(FakeMatcher { list: list.clone() })));

        let dark = MediaQuery::new("prefers-color-scheme: dark", false);
        assert_eq!(dark.query(), "(prefers-color-scheme: dark)");

        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let dark = Rc::new(dark);
        let d = dark.clone();
        let tree = root(move || {
            effect(move || s.borrow_mut().push(d.current()));
        });
        flush_sync();
        assert_eq!(list.listeners.borrow().len(), 1);

        list.flip(true);
        flush_sync();
        assert_eq!(*seen.borrow(), vec![false, true]);

        tree.dispose();
        tick();
        assert!(list.listeners.borrow().is_empty());

        set_media_matcher(previous);
    }

    #[test]
    fn fallback_without_matcher() {
        let previous = set_media_matcher(None);
        let q = MediaQuery::new("(hover: hover)", false);
        assert!(!q.current());
        assert_eq!(q.query(), "(hover: hover)");
        set_media_matcher(previous);
    }
}
