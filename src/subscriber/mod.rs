// ============================================================================
// spark-tracked - Subscriber Bridge
// Connecting external event sources to the graph, lazily
// ============================================================================

mod create_subscriber;
mod events;
mod media_query;
mod reactive_value;

pub use create_subscriber::{create_subscriber, Subscriber};
pub use events::{on, EventHandler, EventTarget, ListenerId, ListenerOptions};
pub use media_query::{normalize_query, set_media_matcher, MediaMatcher, MediaQuery, MediaQueryList};
pub use reactive_value::ReactiveValue;
