//! Push transport layer.
//!
//! This module owns the single server-push connection of a subject
//! identity and keeps it alive.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐                         ┌─────────────────┐
//! │   TransportClient    │                         │  Push endpoint  │
//! │                      │        WebSocket        │                 │
//! │  driver task         │◄───────────────────────►│  (hosted        │
//! │   ├ Reconnector      │   {event, payload}      │   backend)      │
//! │   └ handler fan-out  │                         │                 │
//! └──────────────────────┘                         └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `TransportClient::new` - bind to a subject identity, no I/O
//! 2. `TransportClient::on` - register handlers (the provider replays here)
//! 3. `TransportClient::connect` - spawn the driver, open the first link
//! 4. Link lost - emit `disconnected`, back off, reopen, emit `connected`
//! 5. `TransportClient::disconnect` - terminal, no further retries or events
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Transport client and connection driver |
//! | `connector` | Link factory trait and WebSocket implementation |
//! | `reconnect` | Reconnection state machine and backoff |

// ============================================================================
// Submodules
// ============================================================================

/// Transport client and connection driver.
pub mod connection;

/// Link factory and WebSocket connector.
pub mod connector;

/// Reconnection state machine and backoff policy.
pub mod reconnect;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{TransportClient, TransportOptions};
pub use connector::{Connector, Link, LinkPeer, WebSocketConnector, pump_socket};
pub use reconnect::{ConnectionState, ReconnectPolicy};
