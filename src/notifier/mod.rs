//! Connectivity notifications.
//!
//! Observes lifecycle transitions of the live transport and decides which
//! of them the user should hear about.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `policy` | Debounce policy and configuration |
//! | `sink` | Signal type and sink trait |

// ============================================================================
// Submodules
// ============================================================================

/// Debounce policy.
pub mod policy;

/// Signal sink.
pub mod sink;

// ============================================================================
// Re-exports
// ============================================================================

pub use policy::{ConnectivityNotifier, NotifierConfig, SignalTemplate};
pub use sink::{Severity, Signal, SignalSink, TracingSink};
