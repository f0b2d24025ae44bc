//! Name-keyed publish/subscribe registry.
//!
//! Every [`Connection`](crate::Connection) and every [`Room`](crate::Room)
//! owns its own [`EventBus`]; there is no process-wide registry.
//!
//! # Dispatch Order
//!
//! For one [`EventBus::dispatch`] call:
//!
//! 1. Persistent listeners for the name, in registration order
//! 2. One-shot listeners for the name, in registration order
//!
//! The one-shot list is taken out of the registry before any listener runs,
//! so each one-shot listener fires at most once. One-shot listeners that are
//! registered while a dispatch is running wait for the next dispatch.
//!
//! # Reentrancy
//!
//! No lock is held while a listener runs. A listener may register more
//! listeners, dispatch other names, or call back into the owning connection.
//!
//! # Failure
//!
//! Dispatch is fail-fast: a panicking listener unwinds through `dispatch`
//! and the remaining listeners for that call do not run.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

// ============================================================================
// Types
// ============================================================================

/// Persistent listener callback.
pub type Listener<A> = Arc<dyn Fn(&A) + Send + Sync>;

/// One-shot listener callback.
pub type OnceListener<A> = Box<dyn FnOnce(&A) + Send>;

// ============================================================================
// EventBus
// ============================================================================

/// Registry of persistent and one-shot listeners keyed by event name.
///
/// Listeners receive the dispatched value by reference.
pub struct EventBus<A> {
    /// Persistent listeners by name.
    persistent: Mutex<FxHashMap<String, Vec<Listener<A>>>>,
    /// One-shot listeners by name.
    once: Mutex<FxHashMap<String, Vec<OnceListener<A>>>>,
}

impl<A> Default for EventBus<A> {
    fn default() -> Self {
        Self {
            persistent: Mutex::new(FxHashMap::default()),
            once: Mutex::new(FxHashMap::default()),
        }
    }
}

impl<A> fmt::Debug for EventBus<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let persistent: usize = self.persistent.lock().values().map(Vec::len).sum();
        let once: usize = self.once.lock().values().map(Vec::len).sum();
        f.debug_struct("EventBus")
            .field("persistent", &persistent)
            .field("once", &once)
            .finish()
    }
}

impl<A> EventBus<A> {
    /// Creates an empty bus.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a persistent listener.
    ///
    /// Registering the same closure twice invokes it twice.
    pub fn on<F>(&self, name: impl Into<String>, listener: F)
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        self.persistent
            .lock()
            .entry(name.into())
            .or_default()
            .push(Arc::new(listener));
    }

    /// Registers a listener that is removed after its first invocation.
    pub fn once<F>(&self, name: impl Into<String>, listener: F)
    where
        F: FnOnce(&A) + Send + 'static,
    {
        self.once
            .lock()
            .entry(name.into())
            .or_default()
            .push(Box::new(listener));
    }

    /// Invokes every listener registered under `name`.
    ///
    /// Returns the number of listeners invoked.
    pub fn dispatch(&self, name: &str, args: &A) -> usize {
        let once = self.once.lock().remove(name).unwrap_or_default();
        let persistent: Vec<Listener<A>> = self
            .persistent
            .lock()
            .get(name)
            .cloned()
            .unwrap_or_default();

        for listener in &persistent {
            listener(args);
        }

        let count = persistent.len() + once.len();

        for listener in once {
            listener(args);
        }

        count
    }

    /// Removes every listener registered under `name`.
    pub fn off(&self, name: &str) {
        self.persistent.lock().remove(name);
        self.once.lock().remove(name);
    }

    /// Removes every listener.
    pub fn clear(&self) {
        self.persistent.lock().clear();
        self.once.lock().clear();
    }

    /// Returns the number of listeners (persistent and one-shot) for `name`.
    #[must_use]
    pub fn listener_count(&self, name: &str) -> usize {
        let persistent = self.persistent.lock().get(name).map_or(0, Vec::len);
        let once = self.once.lock().get(name).map_or(0, Vec::len);
        persistent + once
    }
}

// ============================================================================
// Tests
// ============================================================================
