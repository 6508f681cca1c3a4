// ============================================================================
// spark-tracked - Subscriber
// Refcounted, lazily started connection to an external source
// ============================================================================
//
// Every tracking read of a subscriber creates a small effect under the
// reader. The first live effect calls `start`; when the last one goes away
// the `stop` that `start` returned is called.
//
// Releases are deferred to a microtask. A reader that re-runs tears down its
// old subscription effect and creates a new one within the same flush; the
// new effect cancels the pending release instead of incrementing, so the
// count never touches zero and the source is not restarted.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::core::types::CleanupFn;
use crate::primitives::block::{effect_tracking, effect_with_cleanup};
use crate::reactivity::scheduling::{queue_microtask, TaskHandle};
use crate::reactivity::tracking::untrack;

type StartFn = Box<dyn Fn() -> Option<CleanupFn>>;

struct SubscriberState {
    start: StartFn,
    subscribers: Cell<usize>,
    stop: RefCell<Option<CleanupFn>>,
    /// Releases queued but not yet run, keyed so a release can drop itself
    pending: RefCell<Vec<(u64, TaskHandle)>>,
    next_release: Cell<u64>,
}

impl SubscriberState {
    fn acquire(&self) {
        let pending = self.pending.borrow_mut().pop();
        if let Some((_, release)) = pending {
            release.cancel();
            return;
        }

        if self.subscribers.get() == 0 {
            tracing::debug!("first subscriber, starting source");
            let stop = untrack(|| (self.start)());
            *self.stop.borrow_mut() = stop;
        }
        self.subscribers.set(self.subscribers.get() + 1);
    }

    fn release(&self, id: u64) {
        self.pending.borrow_mut().retain(|(pending, _)| *pending != id);

        let remaining = self.subscribers.get().saturating_sub(1);
        self.subscribers.set(remaining);
        if remaining == 0 {
            let stop = self.stop.borrow_mut().take();
            if let Some(stop) = stop {
                tracing::debug!("last subscriber gone, stopping source");
                stop();
            }
        }
    }

    fn queue_release(self: &Rc<Self>) {
        let id = self.next_release.get();
        self.next_release.set(id + 1);

        let state = self.clone();
        let handle = queue_microtask(move || state.release(id));
        self.pending.borrow_mut().push((id, handle));
    }
}

/// Handle returned by [`create_subscriber`]. Cloning shares the count.
#[derive(Clone)]
pub struct Subscriber {
    state: Rc<SubscriberState>,
}

impl Subscriber {
    /// Register the current tracking block as a consumer.
    ///
    /// No-op outside a tracking block: untracked reads never start the
    /// source.
    pub fn subscribe(&self) {
        if !effect_tracking() {
            return;
        }

        let state = self.state.clone();
        effect_with_cleanup(move || {
            state.acquire();
            let state = state.clone();
            Some(Box::new(move || state.queue_release()) as CleanupFn)
        });
    }

    /// Number of live consumers.
    pub fn subscriber_count(&self) -> usize {
        self.state.subscribers.get()
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("subscribers", &self.state.subscribers.get())
            .field("pending_releases", &self.state.pending.borrow().len())
            .finish()
    }
}

/// Wrap an external event source so it runs only while something reads it.
///
/// `start` is called, untracked, when the first consumer subscribes; the
/// cleanup it returns is called after the last consumer is disposed.
///
/// # Example
///
/// ```
/// use spark_tracked::{create_subscriber, effect, flush_sync, root, tick, CleanupFn};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let active = Rc::new(Cell::new(false));
/// let a = active.clone();
/// let subscriber = create_subscriber(move || {
///     a.set(true);
///     let a = a.clone();
///     Some(Box::new(move || a.set(false)) as CleanupFn)
/// });
///
/// let s = subscriber.clone();
/// let tree = root(move || {
///     effect(move || s.subscribe());
/// });
/// flush_sync();
/// assert!(active.get());
///
/// tree.dispose();
/// tick();
/// assert!(!active.get());
/// ```
pub fn create_subscriber(start: impl Fn() -> Option<CleanupFn> + 'static) -> Subscriber {
    Subscriber {
        state: Rc::new(SubscriberState {
            start: Box::new(start),
            subscribers: Cell::new(0),
            stop: RefCell::new(None),
            pending: RefCell::new(Vec::new()),
            next_release: Cell::new(0),
        }),
    }
}

// =============================================================================
// TESTS
// =============================================================================
