//! Server-push event contract.
//!
//! This module defines the message format exchanged over the push
//! connection and the callback type consumers subscribe with.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Purpose |
//! |---------|-----------|---------|
//! | [`Envelope`] | Server → Client | Named application event with JSON payload |
//! | [`Envelope`] | Client → Server | Raw emission through `emit` |
//!
//! Two event names are reserved for lifecycle signals raised by the
//! transport itself: [`CONNECTED`] and [`DISCONNECTED`].
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `event` | Envelope and lifecycle names |
//! | `handler` | Subscriber callback with identity semantics |

// ============================================================================
// Submodules
// ============================================================================

/// Envelope and lifecycle event names.
pub mod event;

/// Subscriber callbacks.
pub mod handler;

// ============================================================================
// Re-exports
// ============================================================================

pub use event::{CONNECTED, DISCONNECTED, Envelope, Lifecycle, is_lifecycle};
pub use handler::Handler;
