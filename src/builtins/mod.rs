// ============================================================================
// spark-tracked - Built-in Wrappers
// Reactive date, URL and search params
// ============================================================================

mod date;
mod search_params;
mod url;

pub use self::date::{DateMethod, DateValue, ReactiveDate};
pub use self::search_params::{ReactiveSearchParams, SyncState};
pub use self::url::ReactiveUrl;
