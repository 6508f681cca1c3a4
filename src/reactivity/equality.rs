// ============================================================================
// spark-tracked - Equality Functions
// Comparators deciding whether a write is observable
// ============================================================================
//
// Every cell carries one of these. A write whose new value compares equal
// to the stored one is a no-op: no version bump, nothing scheduled.
// ============================================================================

use std::rc::Rc;

use crate::core::types::EqualsFn;

// =============================================================================
// STRUCTURAL EQUALITY (Default)
// =============================================================================

/// Default structural equality using PartialEq.
///
/// # Example
/// ```
/// use spark_tracked::reactivity::equality::equals;
///
/// assert!(equals(&42, &42));
/// assert!(!equals(&"a", &"b"));
/// ```
pub fn equals<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b
}

// =============================================================================
// SAME-VALUE EQUALITY (floats)
// =============================================================================

/// Same-value comparison for f64: NaN equals NaN, and +0 differs from -0.
///
/// With plain `==`, writing NaN over NaN would count as a change every time.
///
/// # Example
/// ```
/// use spark_tracked::reactivity::equality::same_value_f64;
///
/// assert!(same_value_f64(&f64::NAN, &f64::NAN));
/// assert!(!same_value_f64(&0.0, &-0.0));
/// assert!(same_value_f64(&1.5, &1.5));
/// ```
pub fn same_value_f64(a: &f64, b: &f64) -> bool {
    if a.is_nan() {
        return b.is_nan();
    }
    a.to_bits() == b.to_bits()
}

/// [`same_value_f64`] lifted over `Option`.
pub fn same_value_option_f64(a: &Option<f64>, b: &Option<f64>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => same_value_f64(a, b),
        (None, None) => true,
        _ => false,
    }
}

// =============================================================================
// IDENTITY EQUALITY
// =============================================================================

/// Identity of shared values: two `Rc`s are equal only if they point to the
/// same allocation, whatever their contents.
///
/// # Example
/// ```
/// use std::rc::Rc;
/// use spark_tracked::reactivity::equality::ptr_equals;
///
/// let a = Rc::new(vec![1]);
/// let b = Rc::new(vec![1]);
/// assert!(ptr_equals(&a, &a.clone()));
/// assert!(!ptr_equals(&a, &b));
/// ```
pub fn ptr_equals<T: ?Sized>(a: &Rc<T>, b: &Rc<T>) -> bool {
    Rc::ptr_eq(a, b)
}

// =============================================================================
// ALWAYS / NEVER
// =============================================================================

/// Every write counts as a change.
///
/// For values mutated in place where equality says nothing useful.
pub fn never_equals<T>(_a: &T, _b: &T) -> bool {
    false
}

/// No write ever counts as a change. The value can still be replaced, but
/// nothing is notified.
pub fn always_equals<T>(_a: &T, _b: &T) -> bool {
    true
}

// =============================================================================
// EQUALS FN CONSTRUCTORS
// =============================================================================

/// [`equals`] as an [`EqualsFn`]
pub fn default_equals_fn<T: PartialEq + 'static>() -> EqualsFn<T> {
    equals::<T>
}

/// [`never_equals`] as an [`EqualsFn`]
pub fn never_equals_fn<T: 'static>() -> EqualsFn<T> {
    never_equals::<T>
}

/// [`ptr_equals`] as an [`EqualsFn`]
pub fn ptr_equals_fn<T: 'static>() -> EqualsFn<Rc<T>> {
    ptr_equals::<T>
}

// =============================================================================
// TESTS
// =============================================================================
