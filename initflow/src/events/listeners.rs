//! Copy-on-iterate listener lists and subscription handles.

use crate::core::{NodeEvent, StageEvent};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Events that name the node or stage they are about.
pub trait EventSubject {
    /// Returns the id of the node or stage the event concerns.
    fn subject_id(&self) -> &str;
}

impl EventSubject for NodeEvent {
    fn subject_id(&self) -> &str {
        &self.node_id
    }
}

impl EventSubject for StageEvent {
    fn subject_id(&self) -> &str {
        &self.stage_id
    }
}

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Entry<E> {
    id: u64,
    filter: Option<HashSet<String>>,
    callback: Callback<E>,
}

impl<E: EventSubject> Entry<E> {
    fn accepts(&self, event: &E) -> bool {
        self.filter
            .as_ref()
            .map_or(true, |ids| ids.contains(event.subject_id()))
    }
}

/// Something a [`Subscription`] can cancel itself against.
trait Unsubscribe: Send + Sync {
    fn unsubscribe(&self, id: u64) -> bool;
    fn contains(&self, id: u64) -> bool;
}

/// A thread-safe list of event listeners.
pub struct ListenerList<E> {
    entries: RwLock<Vec<Arc<Entry<E>>>>,
    next_id: AtomicU64,
}

impl<E> Default for ListenerList<E> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<E: EventSubject + 'static> ListenerList<E> {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener and returns its handle.
    ///
    /// With a filter, only events whose subject id is in the set are
    /// delivered.
    pub fn add<F>(self: &Arc<Self>, callback: F, filter: Option<HashSet<String>>) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.write().push(Arc::new(Entry {
            id,
            filter,
            callback: Arc::new(callback),
        }));
        let list: Arc<dyn Unsubscribe> = Arc::clone(self) as Arc<dyn Unsubscribe>;
        Subscription {
            id,
            list: Arc::downgrade(&list),
        }
    }

    /// Removes the listener with the given id.
    pub fn remove(&self, id: u64) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        entries.len() != before
    }

    /// Returns the number of listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if there are no listeners.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Removes every listener.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Delivers `event` to every matching listener.
    ///
    /// The list is snapshotted first and no lock is held while callbacks
    /// run. A panicking listener does not stop delivery; the messages of all
    /// panics are returned.
    pub fn dispatch(&self, event: &E) -> Vec<String> {
        let snapshot: Vec<Arc<Entry<E>>> = self.entries.read().clone();
        let mut panics = Vec::new();
        for entry in snapshot.iter().filter(|e| e.accepts(event)) {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| (entry.callback)(event))) {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "listener panicked".to_string());
                panics.push(message);
            }
        }
        panics
    }
}

impl<E: EventSubject + 'static> Unsubscribe for ListenerList<E> {
    fn unsubscribe(&self, id: u64) -> bool {
        self.remove(id)
    }

    fn contains(&self, id: u64) -> bool {
        self.entries.read().iter().any(|e| e.id == id)
    }
}

impl<E> fmt::Debug for ListenerList<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerList")
            .field("listeners", &self.entries.read().len())
            .finish()
    }
}

/// Handle for a registered listener.
///
/// Dropping the handle leaves the listener registered; call
/// [`cancel`](Self::cancel) to remove it.
#[derive(Clone)]
pub struct Subscription {
    id: u64,
    list: Weak<dyn Unsubscribe>,
}

impl Subscription {
    /// Returns the listener id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Removes the listener. Returns false if it was already removed or the
    /// owning store is gone.
    pub fn cancel(&self) -> bool {
        self.list.upgrade().is_some_and(|list| list.unsubscribe(self.id))
    }

    /// Returns true while the listener is still registered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.list.upgrade().is_some_and(|list| list.contains(self.id))
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
