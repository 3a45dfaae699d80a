use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::store::model::{Identity, Record};

pub type RecordFn = Arc<dyn Fn(&Record) + Send + Sync + 'static>;
pub type RemoveFn = Arc<dyn Fn(&Identity) + Send + Sync + 'static>;

/// Callbacks invoked for confirmed collection mutations. Every callback is optional.
#[derive(Clone, Default)]
pub struct CollectionObserver {
    pub on_add: Option<RecordFn>,
    pub on_update: Option<RecordFn>,
    pub on_remove: Option<RemoveFn>,
}

impl CollectionObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_add<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Record) + Send + Sync + 'static,
    {
        self.on_add = Some(Arc::new(callback));
        self
    }

    pub fn with_update<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Record) + Send + Sync + 'static,
    {
        self.on_update = Some(Arc::new(callback));
        self
    }

    pub fn with_remove<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Identity) + Send + Sync + 'static,
    {
        self.on_remove = Some(Arc::new(callback));
        self
    }
}

#[derive(Clone)]
struct Listener {
    id: u64,
    active: Arc<AtomicBool>,
    observer: CollectionObserver,
}

#[derive(Default)]
struct RegistryInner {
    next_id: AtomicU64,
    listeners: Mutex<Vec<Listener>>,
}

impl RegistryInner {
    fn remove(&self, id: u64) {
        self.listeners
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .retain(|listener| listener.id != id);
    }
}

/// Set of observers attached to one collection.
///
/// Notifications are delivered synchronously, outside the registry lock, so callbacks may
/// subscribe or detach other listeners. A listener detached while a notification is being
/// delivered does not receive it.
#[derive(Clone, Default)]
pub struct ObserverRegistry {
    inner: Arc<RegistryInner>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, observer: CollectionObserver) -> ListenerRegistration {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let active = Arc::new(AtomicBool::new(true));
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .push(Listener {
                id,
                active: Arc::clone(&active),
                observer,
            });
        ListenerRegistration {
            registry: Arc::downgrade(&self.inner),
            id,
            active,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .len()
    }

    pub fn notify_added(&self, record: &Record) {
        self.dispatch(|observer| {
            if let Some(callback) = &observer.on_add {
                callback(record);
            }
        });
    }

    pub fn notify_updated(&self, record: &Record) {
        self.dispatch(|observer| {
            if let Some(callback) = &observer.on_update {
                callback(record);
            }
        });
    }

    pub fn notify_removed(&self, id: &Identity) {
        self.dispatch(|observer| {
            if let Some(callback) = &observer.on_remove {
                callback(id);
            }
        });
    }

    fn dispatch<F>(&self, deliver: F)
    where
        F: Fn(&CollectionObserver),
    {
        let listeners = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone();
        for listener in listeners {
            if listener.active.load(Ordering::SeqCst) {
                deliver(&listener.observer);
            }
        }
    }
}

/// Handle returned by `subscribe`. Dropping the handle detaches the listener.
pub struct ListenerRegistration {
    registry: Weak<RegistryInner>,
    id: u64,
    active: Arc<AtomicBool>,
}

impl ListenerRegistration {
    /// Stops further notifications. Calling it again has no effect.
    pub fn remove(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            if let Some(registry) = self.registry.upgrade() {
                registry.remove(self.id);
            }
        }
    }

    pub fn detach(self) {
        self.remove();
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        self.remove();
    }
}
