//! Event subscription infrastructure.
//!
//! Listener lists are shared between the driving thread and observers on
//! other threads. Dispatch snapshots the list before invoking anything, so
//! listeners may subscribe or cancel from inside a callback or from another
//! thread while delivery is in progress.

mod listeners;
mod sinks;

pub use listeners::{EventSubject, ListenerList, Subscription};
pub use sinks::{CollectingListener, LoggingListener};
