// ============================================================================
// spark-tracked - ReactiveValue
// A read-only derived fed by an external source
// ============================================================================

use std::fmt;

use crate::core::types::CleanupFn;
use crate::primitives::block::Block;
use crate::primitives::derived::{derived_with, Derived, DerivedOptions};
use crate::primitives::scope::safe_scope;
use crate::primitives::tracked::Readable;

use super::create_subscriber::{create_subscriber, Subscriber};

/// A value computed by `f` whose source is only connected while read.
///
/// Every read subscribes the reading block (see [`create_subscriber`]);
/// `start` runs when the first reader appears and its cleanup after the last
/// one is gone. Writes are ignored.
///
/// # Example
///
/// ```
/// use spark_tracked::{ReactiveValue, Tracked};
///
/// let celsius = Tracked::new(20.0_f64);
/// let c = celsius.clone();
/// let fahrenheit = ReactiveValue::new(move || c.get() * 9.0 / 5.0 + 32.0, || None);
///
/// assert_eq!(fahrenheit.get(), 68.0);
/// celsius.set(100.0);
/// assert_eq!(fahrenheit.get(), 212.0);
/// ```
pub struct ReactiveValue<T> {
    derived: Derived<T>,
    subscriber: Subscriber,
}

impl<T> Clone for ReactiveValue<T> {
    fn clone(&self) -> Self {
        Self {
            derived: self.derived.clone(),
            subscriber: self.subscriber.clone(),
        }
    }
}

impl<T: Clone + PartialEq + 'static> ReactiveValue<T> {
    /// Create a value owned by the ambient scope.
    pub fn new(f: impl Fn() -> T + 'static, start: impl Fn() -> Option<CleanupFn> + 'static) -> Self {
        Self::new_in(&safe_scope(), f, start)
    }

    /// Create a value owned by `block`.
    pub fn new_in(
        block: &Block,
        f: impl Fn() -> T + 'static,
        start: impl Fn() -> Option<CleanupFn> + 'static,
    ) -> Self {
        let subscriber = create_subscriber(start);
        let s = subscriber.clone();
        let options = DerivedOptions::default()
            .on_read(move || s.subscribe())
            .on_write(|_next, prev: &T| prev.clone());

        Self {
            derived: derived_with(f, block, options),
            subscriber,
        }
    }

    /// Read the value, subscribing the current block.
    pub fn get(&self) -> T {
        self.derived.get()
    }

    /// Read without registering a dependency or subscribing.
    pub fn peek(&self) -> T {
        self.derived.peek()
    }

    /// Number of blocks currently subscribed.
    pub fn subscriber_count(&self) -> usize {
        self.subscriber.subscriber_count()
    }
}

impl<T: Clone + PartialEq + 'static> Readable for ReactiveValue<T> {
    type Value = T;

    fn read(&self) -> T {
        self.get()
    }
}

impl<T: fmt::Debug> fmt::Debug for ReactiveValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveValue")
            .field("derived", &self.derived)
            .field("subscriber", &self.subscriber)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::block::{effect, root};
    use crate::primitives::tracked::Tracked;
    use crate::reactivity::scheduling::{flush_sync, tick};
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn writes_are_ignored() {
        let value = ReactiveValue::new(|| 5, || None);
        assert!(!value.derived.set(9));
        assert_eq!(value.get(), 5);
    }

    #[test]
    fn source_runs_while_read_by_effect() {
        let running = Rc::new(Cell::new(false));
        let r = running.clone();
        let reading = Tracked::new(1);
        let rd = reading.clone();
        let value = ReactiveValue::new(
            move || rd.get(),
            move || {
                r.set(true);
                let r = r.clone();
                Some(Box::new(move || r.set(false)) as CleanupFn)
            },
        );

        // Plain reads do not start the source
        assert_eq!(value.get(), 1);
        assert!(!running.get());

        let seen = Rc::new(Cell::new(0));
        let (v, s) = (value.clone(), seen.clone());
        let tree = root(move || {
            effect(move || s.set(v.get()));
        });
        flush_sync();
        assert!(running.get());
        assert_eq!(value.subscriber_count(), 1);

        reading.set(2);
        flush_sync();
        assert_eq!(seen.get(), 2);

        tree.dispose();
        tick();
        assert!(!running.get());
    }
}
