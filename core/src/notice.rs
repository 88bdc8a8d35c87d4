//! Transient notifications from the engine to whoever is presenting it.
//!
//! A [`ListenerList`] holds weak references to callbacks. Registering returns a
//! [`Listener`] handle; dropping the handle deregisters the callback, and its slot is
//! reclaimed on the next dispatch. Callbacks run synchronously, in registration order.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use crossbeam_skiplist::SkipMap;

use crate::model::TreeId;
use crate::uri::Uri;

type Callback<E> = dyn Fn(&E) + Send + Sync;

static NEXT_ORDER: AtomicUsize = AtomicUsize::new(0);

/// Callbacks registered for one event type, keyed by registration order.
pub struct ListenerList<E> {
    inner: SkipMap<usize, Weak<Callback<E>>>,
}

impl<E: 'static> ListenerList<E> {
    pub fn new() -> Self {
        ListenerList {
            inner: SkipMap::new(),
        }
    }

    /// Number of registered slots, including ones whose handle was dropped but not yet
    /// reclaimed.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub(crate) fn dispatch(&self, event: &E) {
        let mut stale = Vec::new();
        for entry in self.inner.iter() {
            match entry.value().upgrade() {
                Some(callback) => callback(event),
                None => stale.push(*entry.key()),
            }
        }
        for order in stale {
            self.inner.remove(&order);
        }
    }
}

impl<E: 'static> Default for ListenerList<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for ListenerList<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerList")
            .field("listener_count", &self.inner.len())
            .finish()
    }
}

/// Keeps a callback registered for as long as it is alive.
#[must_use = "the callback is deregistered when the listener is dropped"]
pub struct Listener<E> {
    _callback: Arc<Callback<E>>,
    order: usize,
}

impl<E: 'static> Listener<E> {
    pub fn new<F>(listeners: &ListenerList<E>, callback: F) -> Self
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let order = NEXT_ORDER.fetch_add(1, Ordering::SeqCst);
        let callback: Arc<Callback<E>> = Arc::new(callback);
        listeners.inner.insert(order, Arc::downgrade(&callback));
        Listener {
            _callback: callback,
            order,
        }
    }
}

impl<E> fmt::Debug for Listener<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("order", &self.order)
            .finish()
    }
}

/// Defines a struct with one public [`ListenerList`] field per event type.
macro_rules! define_listeners {
    ($(#[$meta:meta])* $name:ident { $($field:ident: $event:ty),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Default)]
        pub struct $name {
            $(pub $field: $crate::notice::ListenerList<$event>,)*
        }

        impl $name {
            pub fn new() -> Self {
                Self::default()
            }
        }
    };
}

pub(crate) use define_listeners;

/// Something the user should hear about that did not fail the operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A best-effort step failed and was skipped.
    Warning { uri: Uri, message: String },
    /// The document or a tree covering it is already linked.
    AlreadyLinked(Uri),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Warning { uri, message } => write!(f, "{uri}: {message}"),
            Notice::AlreadyLinked(uri) => write!(f, "{uri} is already linked"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    Unlinked,
    /// The backing file was deleted through the engine.
    Deleted,
    /// The backing file disappeared from the provider.
    Vanished,
    /// The owning tree was unlinked or superseded.
    TreeUnlinked(TreeId),
    /// Replaced by a tree-scoped row for the same file.
    Migrated,
    /// The row referenced a tree that no longer exists.
    Orphaned,
    /// The row moved to the URI the provider returned after a rename.
    Renamed,
}

/// A document row left the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRemoved {
    pub uri: Uri,
    pub reason: RemovalReason,
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    define_listeners!(TestEvents {
        numbers: i32,
        words: String,
    });

    #[test]
    fn dispatch_reaches_listeners_in_order() {
        let events = TestEvents::new();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let (a, b) = (calls.clone(), calls.clone());

        let _first = Listener::new(&events.numbers, move |n: &i32| {
            a.lock().unwrap().push(("first", *n))
        });
        let _second = Listener::new(&events.numbers, move |n: &i32| {
            b.lock().unwrap().push(("second", *n))
        });
        events.numbers.dispatch(&7);

        assert_eq!(*calls.lock().unwrap(), vec![("first", 7), ("second", 7)]);
    }

    #[test]
    fn dropped_listener_is_reclaimed_on_dispatch() {
        let events = TestEvents::new();
        let calls = Arc::new(Mutex::new(0));
        {
            let counter = calls.clone();
            let _listener = Listener::new(&events.words, move |_: &String| {
                *counter.lock().unwrap() += 1
            });
            assert_eq!(events.words.len(), 1);
        }
        assert_eq!(events.words.len(), 1);

        events.words.dispatch(&"hello".to_string());
        assert!(events.words.is_empty());
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[test]
    fn lists_are_independent() {
        let events = TestEvents::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let _listener = Listener::new(&events.words, move |w: &String| {
            s.lock().unwrap().push(w.clone())
        });

        events.numbers.dispatch(&1);
        events.words.dispatch(&"x".to_string());
        assert_eq!(*seen.lock().unwrap(), vec!["x".to_string()]);
    }
}
