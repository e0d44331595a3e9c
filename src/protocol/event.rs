//! Event envelope and lifecycle names.
//!
//! Every text frame on the push connection carries exactly one envelope:
//!
//! ```json
//! {
//!   "event": "message.new",
//!   "payload": { "conversationId": "c-1", "body": "hi" }
//! }
//! ```
//!
//! `payload` is optional on the wire and defaults to `null`.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Raised by the transport when a link opens.
pub const CONNECTED: &str = "connected";

/// Raised by the transport when a live link is lost.
pub const DISCONNECTED: &str = "disconnected";

// ============================================================================
// Lifecycle
// ============================================================================

/// Lifecycle transition of a transport client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    /// The link opened (first connection or recovery).
    Connected,
    /// A live link was lost and the client is reconnecting.
    Disconnected,
}

impl Lifecycle {
    /// Returns the reserved event name for this transition.
    #[inline]
    #[must_use]
    pub const fn event_name(self) -> &'static str {
        match self {
            Self::Connected => CONNECTED,
            Self::Disconnected => DISCONNECTED,
        }
    }

    /// Parses a reserved event name.
    #[inline]
    #[must_use]
    pub fn from_event_name(name: &str) -> Option<Self> {
        match name {
            CONNECTED => Some(Self::Connected),
            DISCONNECTED => Some(Self::Disconnected),
            _ => None,
        }
    }
}

/// Returns `true` if `name` is one of the reserved lifecycle event names.
#[inline]
#[must_use]
pub fn is_lifecycle(name: &str) -> bool {
    Lifecycle::from_event_name(name).is_some()
}

// ============================================================================
// Envelope
// ============================================================================

/// A named event with an opaque JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event name.
    pub event: String,

    /// Event-specific data.
    #[serde(default)]
    pub payload: Value,
}

impl Envelope {
    /// Creates a new envelope.
    #[inline]
    #[must_use]
    pub fn new(event: impl Into<String>, payload: Value) -> Self {
        Self {
            event: event.into(),
            payload,
        }
    }

    /// Creates an outbound envelope, rejecting names the client may not send.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `event` is empty or a
    /// reserved lifecycle name.
    pub fn outbound(event: impl Into<String>, payload: Value) -> Result<Self> {
        let event = event.into();
        if event.is_empty() {
            return Err(Error::invalid_argument("event name must not be empty"));
        }
        if is_lifecycle(&event) {
            return Err(Error::invalid_argument(format!(
                "'{event}' is a reserved lifecycle event"
            )));
        }
        Ok(Self { event, payload })
    }

    /// Returns the lifecycle transition this envelope names, if any.
    #[inline]
    #[must_use]
    pub fn lifecycle(&self) -> Option<Lifecycle> {
        Lifecycle::from_event_name(&self.event)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_payload_defaults_to_null() {
        let envelope: Envelope =
            serde_json::from_str(r#"{"event":"presence.ping"}"#).expect("valid envelope");
        assert_eq!(envelope.event, "presence.ping");
        assert_eq!(envelope.payload, Value::Null);
    }

    #[test]
    fn test_wire_shape() {
        let envelope = Envelope::new("message.new", json!({ "id": 7 }));
        let text = serde_json::to_string(&envelope).expect("serializable");
        assert_eq!(text, r#"{"event":"message.new","payload":{"id":7}}"#);
    }

    #[test]
    fn test_outbound_rejects_reserved_names() {
        assert!(Envelope::outbound(CONNECTED, Value::Null).is_err());
        assert!(Envelope::outbound(DISCONNECTED, Value::Null).is_err());
        assert!(Envelope::outbound("", Value::Null).is_err());
        assert!(Envelope::outbound("typing", Value::Null).is_ok());
    }

    #[test]
    fn test_lifecycle_names() {
        assert_eq!(Lifecycle::Connected.event_name(), "connected");
        assert_eq!(Lifecycle::Disconnected.event_name(), "disconnected");
        assert_eq!(
            Lifecycle::from_event_name("disconnected"),
            Some(Lifecycle::Disconnected)
        );
        assert!(!is_lifecycle("booking.updated"));
        assert_eq!(
            Envelope::new(CONNECTED, Value::Null).lifecycle(),
            Some(Lifecycle::Connected)
        );
    }
}
