// ============================================================================
// spark-tracked - Type Definitions
// Type-erased traits and base types for the dependency graph
// ============================================================================

use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::constants::*;

// =============================================================================
// TYPE-ERASED TRAITS
// =============================================================================
//
// Graph operations (stamp comparison, edge bookkeeping, marking) never need
// the value type T, so the graph stores:
// - Vec<Dependency> (strong edges reaction -> source, with the stamp seen)
// - Vec<Weak<dyn AnyReaction>> (weak edges source -> reaction)
//
// Tracked<T>, Derived<T> and Block carry the typed state and implement
// these traits for the graph.
// =============================================================================

/// Type-erased source: something a computation can read and depend on.
pub trait AnySource: Any {
    /// Get the flags bitmask
    fn flags(&self) -> u32;

    /// Set the flags bitmask
    fn set_flags(&self, flags: u32);

    /// Clock stamp of the last observable change
    fn version(&self) -> u64;

    /// Bring the value up to date before its version is inspected.
    ///
    /// Plain cells are always current. Deriveds recompute here when stale.
    fn refresh(&self) {}

    /// Register a reaction to be marked when this source changes
    fn add_reaction(&self, reaction: Weak<dyn AnyReaction>);

    /// Drop a reaction edge (pointer identity)
    fn remove_reaction(&self, reaction: &Rc<dyn AnyReaction>);

    /// Live reactions, dead weak entries are pruned on the way
    fn live_reactions(&self) -> Vec<Rc<dyn AnyReaction>>;

    /// Check if this is a derived
    fn is_derived(&self) -> bool {
        self.flags() & DERIVED != 0
    }

    /// Upcast to Any for downcasting
    fn as_any(&self) -> &dyn Any;
}

/// Type-erased reaction: a derived or a block that re-evaluates when its
/// dependencies change.
pub trait AnyReaction: Any {
    /// Get the flags bitmask
    fn flags(&self) -> u32;

    /// Set the flags bitmask
    fn set_flags(&self, flags: u32);

    /// If this reaction is a derived, return it as a source so marking can
    /// continue through it to its own reactions.
    fn as_derived_source(&self) -> Option<Rc<dyn AnySource>> {
        None
    }

    /// Queue the reaction for the next flush. Deriveds are pulled, not
    /// scheduled, so the default does nothing.
    fn schedule(&self) {}

    /// Upcast to Any for downcasting
    fn as_any(&self) -> &dyn Any;
}

// =============================================================================
// DEPENDENCY EDGE
// =============================================================================

/// A dependency edge from a reaction to a source, stamped with the source
/// version observed when the read happened.
#[derive(Clone)]
pub struct Dependency {
    pub source: Rc<dyn AnySource>,
    pub version: u64,
}

impl Dependency {
    /// Whether the source changed since this edge was recorded.
    pub fn is_stale(&self) -> bool {
        self.source.refresh();
        self.source.version() > self.version
    }
}

impl std::fmt::Debug for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dependency")
            .field("version", &self.version)
            .field("current", &self.source.version())
            .finish()
    }
}

// =============================================================================
// REACTION LIST
// =============================================================================

/// Weak back-edges from a source to the reactions reading it.
#[derive(Default)]
pub struct ReactionList {
    entries: RefCell<Vec<Weak<dyn AnyReaction>>>,
}

impl ReactionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, reaction: Weak<dyn AnyReaction>) {
        let mut entries = self.entries.borrow_mut();
        let ptr = reaction.as_ptr() as *const ();
        if !entries.iter().any(|w| w.as_ptr() as *const () == ptr) {
            entries.push(reaction);
        }
    }

    pub fn remove(&self, reaction: &Rc<dyn AnyReaction>) {
        let ptr = Rc::as_ptr(reaction) as *const ();
        self.entries
            .borrow_mut()
            .retain(|w| w.as_ptr() as *const () != ptr && w.strong_count() > 0);
    }

    /// Collect live reactions. The borrow is released before the caller acts
    /// on them, so marking can re-enter the list.
    pub fn live(&self) -> Vec<Rc<dyn AnyReaction>> {
        let mut entries = self.entries.borrow_mut();
        entries.retain(|w| w.strong_count() > 0);
        entries.iter().filter_map(Weak::upgrade).collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// FUNCTION TYPES
// =============================================================================

/// Equality function: true when two values are observably the same, in
/// which case a write is a no-op.
pub type EqualsFn<T> = fn(&T, &T) -> bool;

/// Default equality using PartialEq
pub fn default_equals<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b
}

/// Cleanup returned by a block function, run before re-run and on disposal
pub type CleanupFn = Box<dyn FnOnce()>;

/// Body of a block
pub type BlockFn = Box<dyn FnMut() -> Option<CleanupFn>>;
