//! Named event channels with guard-based unsubscription.
//!
//! Listeners are registered with [`EventChannel::listen`] and stay registered
//! until the returned [`Subscription`] is dropped or explicitly released.

use std::sync::{Arc, Mutex};

/// Channel the menu/tray uses to request a pack import.
pub const TRAY_IMPORT_EVENT: &str = "tray-import";

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Registry<E> {
    next_id: u64,
    handlers: Vec<(u64, Handler<E>)>,
}

pub struct EventChannel<E> {
    name: &'static str,
    registry: Arc<Mutex<Registry<E>>>,
}

impl<E: 'static> EventChannel<E> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                handlers: Vec::new(),
            })),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn listen<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = {
            let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
            let id = registry.next_id;
            registry.next_id += 1;
            registry.handlers.push((id, Arc::new(handler)));
            id
        };
        tracing::debug!(channel = self.name, id, "listener registered");

        let registry = Arc::downgrade(&self.registry);
        let name = self.name;
        Subscription::new(move || {
            // The channel may already be gone; nothing to remove then.
            if let Some(registry) = registry.upgrade() {
                let mut registry = registry.lock().unwrap_or_else(|e| e.into_inner());
                registry.handlers.retain(|(handler_id, _)| *handler_id != id);
                tracing::debug!(channel = name, id, "listener removed");
            }
        })
    }

    /// Deliver an event to every current listener. Returns how many were called.
    pub fn emit(&self, event: &E) -> usize {
        // Snapshot the handlers so a listener can subscribe or unsubscribe
        // from inside its callback.
        let handlers: Vec<Handler<E>> = {
            let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
            registry.handlers.iter().map(|(_, h)| h.clone()).collect()
        };
        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }

    pub fn listener_count(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .handlers
            .len()
    }
}

/// Registration guard returned by [`EventChannel::listen`].
#[must_use = "dropping a Subscription immediately removes the listener"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    fn new(release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    pub fn unlisten(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}
