//! User-facing signal sink.
//!
//! The rendering of a signal (toast, banner, log line) is up to the
//! application. The notifier only calls [`SignalSink::notify`] and never
//! waits for it.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tracing::{info, warn};

// ============================================================================
// Severity
// ============================================================================

/// Severity of a user-facing signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Something recovered.
    Success,
    /// Something broke.
    Error,
}

// ============================================================================
// Signal
// ============================================================================

/// A toast-equivalent message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    /// Success or error.
    pub severity: Severity,
    /// Short headline.
    pub title: String,
    /// Longer explanation.
    pub description: String,
    /// How long the message should stay visible.
    pub duration: Duration,
}

// ============================================================================
// SignalSink
// ============================================================================

/// Receives user-facing connectivity signals. Fire-and-forget.
pub trait SignalSink: Send + Sync {
    /// Shows `signal` to the user.
    fn notify(&self, signal: Signal);
}

impl<F> SignalSink for F
where
    F: Fn(Signal) + Send + Sync,
{
    fn notify(&self, signal: Signal) {
        self(signal)
    }
}

// ============================================================================
// TracingSink
// ============================================================================

/// Sink that writes signals to the `tracing` log.
///
/// Used when no other sink is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl SignalSink for TracingSink {
    fn notify(&self, signal: Signal) {
        match signal.severity {
            Severity::Success => info!(
                title = %signal.title,
                description = %signal.description,
                duration_ms = signal.duration.as_millis() as u64,
                "Connectivity signal"
            ),
            Severity::Error => warn!(
                title = %signal.title,
                description = %signal.description,
                duration_ms = signal.duration.as_millis() as u64,
                "Connectivity signal"
            ),
        }
    }
}
