// ============================================================================
// spark-tracked - Event Targets
// The listener seam between reactive values and the platform
// ============================================================================

use std::rc::Rc;

use crate::core::types::CleanupFn;

/// Listener callback. Receives the event type it fired for.
pub type EventHandler = Rc<dyn Fn(&str)>;

/// Identifies a registered listener for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Registration flags, passed through to the target unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    pub capture: bool,
    pub passive: bool,
    pub once: bool,
}

/// Something that dispatches named events to listeners.
pub trait EventTarget {
    fn add_event_listener(&self, event_type: &str, handler: EventHandler, options: ListenerOptions) -> ListenerId;

    fn remove_event_listener(&self, event_type: &str, id: ListenerId, options: ListenerOptions);
}

/// Listen for `event_type` on `target`; the returned cleanup removes the
/// listener. Event types are matched lowercase.
pub fn on<T>(target: Rc<T>, event_type: &str, handler: impl Fn(&str) + 'static, options: ListenerOptions) -> CleanupFn
where
    T: EventTarget + ?Sized + 'static,
{
    let event_type = event_type.to_lowercase();
    let id = target.add_event_listener(&event_type, Rc::new(handler), options);
    Box::new(move || target.remove_event_listener(&event_type, id, options))
}
