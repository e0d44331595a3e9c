//! Handler registry.
//!
//! Maps event names to ordered sets of [`Handler`]s. The provider owns one
//! registry for its whole lifetime and replays it onto every transport
//! client it creates, so subscriptions survive identity swaps, reconnects
//! and client recreation.
//!
//! Set semantics are by handler identity (see [`Handler`]): registering the
//! same handler twice for one event is a no-op, and removing an absent
//! handler is a no-op as well.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::protocol::Handler;
use crate::transport::TransportClient;

// ============================================================================
// HandlerRegistry
// ============================================================================

/// Event name to handler set mapping.
///
/// Handlers for one event keep their registration order.
#[derive(Debug, Default, Clone)]
pub struct HandlerRegistry {
    /// Handlers by event name. Entries are never empty.
    entries: FxHashMap<String, Vec<Handler>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `handler` to the set for `event`.
    ///
    /// Returns `false` if it was already present.
    pub fn register(&mut self, event: impl Into<String>, handler: Handler) -> bool {
        let handlers = self.entries.entry(event.into()).or_default();
        if handlers.contains(&handler) {
            return false;
        }
        handlers.push(handler);
        true
    }

    /// Removes `handler` from the set for `event`.
    ///
    /// Returns `false` if it was not present.
    pub fn unregister(&mut self, event: &str, handler: &Handler) -> bool {
        let Some(handlers) = self.entries.get_mut(event) else {
            return false;
        };

        let Some(index) = handlers.iter().position(|h| h == handler) else {
            return false;
        };

        handlers.remove(index);
        if handlers.is_empty() {
            self.entries.remove(event);
        }
        true
    }

    /// Registers every held (event, handler) pair on `client`.
    ///
    /// Returns the number of pairs replayed.
    pub fn replay(&self, client: &TransportClient) -> usize {
        let mut replayed = 0;
        for (event, handlers) in &self.entries {
            for handler in handlers {
                client.on(event.as_str(), handler.clone());
                replayed += 1;
            }
        }

        debug!(connection = %client.id(), replayed, "Handler registry replayed");
        replayed
    }

    /// Returns `true` if `handler` is registered for `event`.
    #[must_use]
    pub fn contains(&self, event: &str, handler: &Handler) -> bool {
        self.entries
            .get(event)
            .is_some_and(|handlers| handlers.contains(handler))
    }

    /// Returns the number of handlers registered for `event`.
    #[must_use]
    pub fn handler_count(&self, event: &str) -> usize {
        self.entries.get(event).map_or(0, Vec::len)
    }

    /// Returns the number of events with at least one handler.
    #[inline]
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.entries.len()
    }

    /// Returns the total number of (event, handler) pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Returns `true` if nothing is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over event names with at least one handler.
    pub fn events(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Copies the handlers for `event` in registration order.
    pub(crate) fn snapshot(&self, event: &str) -> Vec<Handler> {
        self.entries.get(event).cloned().unwrap_or_default()
    }
}

// ============================================================================
// Tests
// ============================================================================
