// ============================================================================
// spark-tracked - Fine-grained Tracked State for Rust
// ============================================================================
//
// Versioned cells, lazily computed deriveds, an ownership tree of blocks that
// re-run when what they read changes, and reactive collection, Date and URL wrappers
// built on top of them. Single-threaded: all state lives in thread-locals and
// `Rc` graphs.
// ============================================================================

//! Fine-grained tracked state.
//!
//! ```
//! use spark_tracked::{effect, flush_sync, root, ReactiveMap};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let m: ReactiveMap<&str, i32> = [("a", 1)].into_iter().collect();
//! let log = Rc::new(RefCell::new(Vec::new()));
//!
//! let (m2, l) = (m.clone(), log.clone());
//! let _tree = root(move || {
//!     effect(move || l.borrow_mut().push(m2.get("a")));
//! });
//! flush_sync();
//!
//! m.insert("a", 1); // equal value: nothing to do
//! flush_sync();
//! m.insert("a", 2);
//! flush_sync();
//! assert_eq!(*log.borrow(), vec![Some(1), Some(2)]);
//! ```

#[macro_use]
mod macros;

pub mod builtins;
pub mod collections;
pub mod core;
pub mod error;
pub mod primitives;
pub mod reactivity;
pub mod subscriber;

// Re-export core items at crate root
pub use self::core::constants;
pub use self::core::context::{clock, is_tracking, with_context, ReactiveContext};
pub use self::core::types::{default_equals, AnyReaction, AnySource, CleanupFn, Dependency, EqualsFn};

pub use error::{Error, Result};

// Primitives
pub use primitives::block::{
    active_block, branch, effect, effect_tracking, effect_with_cleanup, render,
    render_with_cleanup, root, Block, BlockKind,
};
pub use primitives::derived::{derived, derived_with, Derived, DerivedOptions};
pub use primitives::scope::{on_teardown, safe_scope, scope, with_scope};
pub use primitives::tracked::{get, increment, set, tracked, Readable, Tracked};

// Reactivity
pub use reactivity::equality::{
    always_equals, equals, never_equals, ptr_equals, same_value_f64, same_value_option_f64,
};
pub use reactivity::scheduling::{
    flush_sync, flush_sync_with, has_pending_work, queue_microtask, tick, TaskHandle,
};
pub use reactivity::tracking::{peek, untrack};

// Wrappers
pub use builtins::{DateMethod, DateValue, ReactiveDate, ReactiveSearchParams, ReactiveUrl, SyncState};
pub use collections::{
    tracked_map, tracked_record, tracked_set, tracked_vec, ReactiveMap, ReactiveRecord, ReactiveSet,
    ReactiveVec, SetOperand,
};
pub use subscriber::{
    create_subscriber, on, set_media_matcher, EventTarget, ListenerOptions, MediaMatcher,
    MediaQuery, MediaQueryList, ReactiveValue, Subscriber,
};

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn block_kinds_and_state_flags_are_distinct() {
        let kinds = [
            constants::ROOT_BLOCK,
            constants::RENDER_BLOCK,
            constants::EFFECT_BLOCK,
            constants::BRANCH_BLOCK,
        ];
        let states = [
            constants::CONTAINS_UPDATE,
            constants::BLOCK_HAS_RUN,
            constants::PAUSED,
            constants::DESTROYED,
        ];
        let all: Vec<u32> = kinds.iter().chain(states.iter()).copied().collect();
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_eq!(a & b, 0);
            }
        }
        assert_eq!(kinds.iter().fold(0, |acc, k| acc | k), constants::BLOCK_KIND_MASK);
    }

    #[test]
    fn heterogeneous_sources_share_one_trait() {
        let number = Tracked::new(1);
        let text = Tracked::new(String::from("x"));
        let n = number.clone();
        let doubled = Derived::new(move || n.get() * 2);

        let sources: Vec<Rc<dyn AnySource>> = vec![
            number.as_any_source(),
            text.as_any_source(),
            doubled.as_any_source(),
        ];
        assert_eq!(sources.iter().filter(|s| s.is_derived()).count(), 1);
    }

    #[test]
    fn map_effect_logs_once_per_distinct_value() {
        let m: ReactiveMap<&str, i32> = [("a", 1)].into_iter().collect();
        let log = Rc::new(RefCell::new(Vec::new()));
        let _tree = root(cloned!(m, log => move || {
            effect(cloned!(m, log => move || log.borrow_mut().push(m.get("a"))));
        }));
        flush_sync();

        m.insert("a", 1);
        flush_sync();
        assert_eq!(*log.borrow(), vec![Some(1)]);

        m.insert("a", 2);
        flush_sync();
        assert_eq!(*log.borrow(), vec![Some(1), Some(2)]);
    }

    #[test]
    fn set_union_is_a_new_instance() {
        let s: ReactiveSet<i32> = [1, 2].into_iter().collect();
        let d: ReactiveSet<i32> = [2, 3].into_iter().collect();
        let d2 = s.union(&d);

        assert_eq!(d2.to_vec(), vec![1, 2, 3]);
        d2.insert(4);
        assert!(!s.contains(&4) && !d.contains(&4));
    }

    #[test]
    fn macros_compose() {
        let a = Tracked::new(2);
        let b = Tracked::new(3);
        let product = derived!(a, b => a.get() * b.get());
        assert_eq!(product.get(), 6);

        let seen = Rc::new(Cell::new(0));
        let _tree = root(cloned!(product, seen => move || {
            effect!(product, seen => seen.set(product.get()));
        }));
        flush_sync();
        b.set(4);
        flush_sync();
        assert_eq!(seen.get(), 8);
    }

    #[test]
    fn everything_owned_by_a_root_goes_with_it() {
        let runs = Rc::new(Cell::new(0));
        let source = Tracked::new(0);
        let tree = root(cloned!(source, runs => move || {
            let url = ReactiveUrl::parse("https://example.com/").unwrap();
            effect(cloned!(source, runs => move || {
                let _ = source.get();
                let _ = url.href();
                runs.set(runs.get() + 1);
            }));
        }));
        flush_sync();
        tree.dispose();
        assert!(tree.is_destroyed());

        source.set(1);
        flush_sync();
        assert_eq!(runs.get(), 1);
    }
}
