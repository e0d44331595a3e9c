//! Subscriber callbacks.
//!
//! A [`Handler`] is a cheaply cloneable callback. Its identity is the
//! identity of its allocation: clones compare equal, separately constructed
//! handlers never do. Registries use that identity for set semantics.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde_json::Value;

// ============================================================================
// Types
// ============================================================================

/// Callback signature for event payloads.
type Callback = dyn Fn(&Value) + Send + Sync;

// ============================================================================
// Handler
// ============================================================================

/// Event handler callback.
///
/// Called with the event payload (`null` for lifecycle events).
///
/// # Example
///
/// ```ignore
/// let on_message = Handler::new(|payload| println!("{payload}"));
/// provider.on("message.new", on_message.clone());
/// // later
/// provider.off("message.new", &on_message);
/// ```
#[derive(Clone)]
pub struct Handler(Arc<Callback>);

impl Handler {
    /// Wraps a closure as a handler with a fresh identity.
    #[inline]
    pub fn new(callback: impl Fn(&Value) + Send + Sync + 'static) -> Self {
        Self(Arc::new(callback))
    }

    /// Invokes the handler.
    #[inline]
    pub fn call(&self, payload: &Value) {
        (self.0)(payload)
    }

    /// Address of the shared allocation, ignoring vtable metadata.
    #[inline]
    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for Handler {}

impl Hash for Handler {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler").field(&self.addr()).finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_clone_shares_identity() {
        let handler = Handler::new(|_| {});
        let clone = handler.clone();
        assert_eq!(handler, clone);
    }

    #[test]
    fn test_identical_closures_are_distinct() {
        let first = Handler::new(|_| {});
        let second = Handler::new(|_| {});
        assert_ne!(first, second);
    }

    #[test]
    fn test_call_passes_payload() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);
        let handler = Handler::new(move |payload| {
            let n = payload.as_u64().unwrap_or_default() as usize;
            seen_clone.fetch_add(n, Ordering::SeqCst);
        });

        handler.call(&Value::from(3));
        handler.call(&Value::from(4));
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }
}
