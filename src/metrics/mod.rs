//! Metrics for sleet.
//!
//! Events are recorded through the `metrics` facade. No recorder is
//! installed by this crate; an embedding application that installs one gets
//! the counters and histograms below for free.

pub mod events;

/// Emit an internal event.
///
/// This macro calls the `InternalEvent::emit()` method on the given event,
/// which records the corresponding metric.
///
/// # Example
///
/// ```ignore
/// use sleet::metrics::events::{RecordsWritten, BlankLines};
///
/// emit!(RecordsWritten { count: 100 });
/// emit!(BlankLines { count: 2 });
/// ```
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::metrics::events::InternalEvent::emit($event)
    };
}
