// ============================================================================
// spark-tracked - Ergonomic Macros
// ============================================================================

/// Clone variables into a move closure.
///
/// Handles (`Tracked`, `Derived`, `ReactiveMap`, ...) are cheap `Rc` clones;
/// this saves the `let x2 = x.clone();` lines before every closure.
///
/// # Usage
///
/// ```rust
/// use spark_tracked::{cloned, Derived, Tracked};
///
/// let a = Tracked::new(1);
/// let b = Tracked::new(2);
///
/// let sum = Derived::new(cloned!(a, b => move || a.get() + b.get()));
/// assert_eq!(sum.get(), 3);
/// a.set(10); // `a` is still usable here
/// ```
#[macro_export]
macro_rules! cloned {
    ($($n:ident),+ => $e:expr) => {
        {
            $( let $n = $n.clone(); )+
            $e
        }
    };
}

/// Create a derived in the ambient scope, cloning the listed handles.
///
/// Wraps `Derived::new(cloned!(... => move || ...))`.
///
/// # Usage
///
/// ```rust
/// use spark_tracked::{derived, Tracked};
///
/// let a = Tracked::new(1);
/// let b = Tracked::new(2);
///
/// let sum = derived!(a, b => a.get() + b.get());
/// assert_eq!(sum.get(), 3);
/// ```
#[macro_export]
macro_rules! derived {
    ($($deps:ident),+ => $body:expr) => {
        $crate::Derived::new($crate::cloned!($($deps),+ => move || $body))
    };
    ($body:expr) => {
        $crate::Derived::new(move || $body)
    };
}

/// Create an effect, cloning the listed handles.
///
/// Wraps `effect(cloned!(... => move || { ...; }))`. The body's value is
/// discarded.
///
/// # Usage
///
/// ```rust
/// use spark_tracked::{effect, flush_sync, root, Tracked};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let count = Tracked::new(1);
/// let seen = Rc::new(Cell::new(0));
///
/// let _tree = root({
///     let (count, seen) = (count.clone(), seen.clone());
///     move || {
///         effect!(count, seen => seen.set(count.get()));
///     }
/// });
/// flush_sync();
/// assert_eq!(seen.get(), 1);
/// ```
#[macro_export]
macro_rules! effect {
    ($($deps:ident),+ => $body:expr) => {
        $crate::effect($crate::cloned!($($deps),+ => move || { $body; }))
    };
    ($body:expr) => {
        $crate::effect(move || { $body; })
    };
}
