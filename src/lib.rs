//! Realtime transport - shared server-push connection for one signed-in identity.
//!
//! This library keeps a single long-lived push connection per subject
//! identity, reconnects it with backoff, preserves event subscriptions across
//! reconnects and identity changes, and tells the user when real-time
//! updates drop out and come back.
//!
//! # Architecture
//!
//! ```text
//! RealtimeProvider ──owns──► HandlerRegistry   (survives identity swaps)
//!        │
//!        ├──owns──► TransportClient ──► Connector ──► push endpoint
//!        │               │ driver task: Reconnector + handler fan-out
//!        │               ▼
//!        └──────── connected / disconnected ──► ConnectivityNotifier ──► SignalSink
//! ```
//!
//! Key design principles:
//!
//! - At most one transport client exists per provider at any time
//! - Handlers are replayed onto every new client before it connects
//! - `disconnect()` is synchronous and terminal for a client
//! - Lifecycle events of a superseded client never reach the UI state
//!
//! # Quick Start
//!
//! ```no_run
//! use realtime_transport::{Handler, RealtimeProvider, Result, SubjectId};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let provider = RealtimeProvider::builder()
//!         .endpoint("wss://push.example.com/events")
//!         .build()?;
//!
//!     provider.on("message.new", Handler::new(|payload| {
//!         println!("new message: {payload}");
//!     }));
//!
//!     provider.set_subject(Some(SubjectId::new("user-42")?), true)?;
//!
//!     let mut connectivity = provider.connectivity();
//!     while connectivity.changed().await.is_ok() {
//!         println!("connected: {}", *connectivity.borrow());
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Subject and connection ids |
//! | [`notifier`] | Debounced connectivity signals |
//! | [`protocol`] | Wire envelope, lifecycle names, handlers |
//! | [`provider`] | Application-facing facade |
//! | [`registry`] | Persistent handler registry |
//! | [`transport`] | Push connection, connectors, reconnection |

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Connectivity notifications.
pub mod notifier;

/// Wire envelope, lifecycle event names and event handlers.
pub mod protocol;

/// Application-facing provider.
///
/// Use [`RealtimeProvider::builder()`] to create a configured provider.
pub mod provider;

/// Event name to handler set mapping.
pub mod registry;

/// Push transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ConnectionId, SubjectId};

// Notifier types
pub use notifier::{
    ConnectivityNotifier, NotifierConfig, Severity, Signal, SignalSink, SignalTemplate,
    TracingSink,
};

// Protocol types
pub use protocol::{CONNECTED, DISCONNECTED, Envelope, Handler, Lifecycle};

// Provider types
pub use provider::{ProviderBuilder, ProviderConfig, RealtimeProvider};

// Registry
pub use registry::HandlerRegistry;

// Transport types
pub use transport::{
    ConnectionState, Connector, Link, LinkPeer, ReconnectPolicy, TransportClient,
    TransportOptions, WebSocketConnector,
};
