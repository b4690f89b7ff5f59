//! Explicit shared state containers with change notification.
//!
//! A `Store<T>` is a cloneable handle. Mutations swap the value under a
//! lock and then run listeners with a snapshot of the new state, outside
//! the lock, so a listener may read or even update the store again.
//! Readers see either the old or the new value, never a half-applied one.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Listeners<T> {
    next_id: u64,
    entries: Vec<(u64, Listener<T>)>,
}

/// A partial update that can be merged into a `T`.
pub trait Patch<T> {
    fn apply(self, target: &mut T);
}

/// Shared, observable state.
pub struct Store<T> {
    value: Arc<Mutex<T>>,
    listeners: Arc<Mutex<Listeners<T>>>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            listeners: Arc::clone(&self.listeners),
        }
    }
}

fn lock<U>(mutex: &Mutex<U>) -> MutexGuard<'_, U> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<T: Clone + Send + 'static> Store<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Arc::new(Mutex::new(value)),
            listeners: Arc::new(Mutex::new(Listeners {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Snapshot of the current value.
    pub fn get(&self) -> T {
        lock(&self.value).clone()
    }

    /// Reads the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&lock(&self.value))
    }

    /// Mutates the value in place, then notifies listeners.
    pub fn set(&self, f: impl FnOnce(&mut T)) {
        let snapshot = {
            let mut value = lock(&self.value);
            f(&mut value);
            value.clone()
        };
        self.notify(&snapshot);
    }

    /// Merges a partial update, then notifies listeners.
    pub fn update<P: Patch<T>>(&self, patch: P) {
        self.set(|value| patch.apply(value));
    }

    /// Registers a listener called after every mutation, in subscription
    /// order. The listener stays registered until `unsubscribe` is called.
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = {
            let mut listeners = lock(&self.listeners);
            let id = listeners.next_id;
            listeners.next_id += 1;
            listeners.entries.push((id, Arc::new(listener)));
            id
        };

        let weak: Weak<Mutex<Listeners<T>>> = Arc::downgrade(&self.listeners);
        Subscription {
            release: Some(Box::new(move || {
                if let Some(listeners) = weak.upgrade() {
                    lock(&listeners).entries.retain(|(other, _)| *other != id);
                }
            })),
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).entries.len()
    }

    fn notify(&self, snapshot: &T) {
        let listeners: Vec<Listener<T>> = lock(&self.listeners)
            .entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(snapshot);
        }
    }
}

/// Handle returned by `Store::subscribe`.
///
/// Dropping it keeps the listener alive; call `unsubscribe` to remove it.
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}
