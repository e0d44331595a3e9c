//! Debounced connectivity notifications.
//!
//! Turns `connected` / `disconnected` transitions into at most one "lost"
//! and one "restored" signal per debounce window:
//!
//! | Transition | Condition | Result |
//! |------------|-----------|--------|
//! | first `connected` | - | silent |
//! | `disconnected` | never connected | silent |
//! | `disconnected` | lost window elapsed | "lost" signal |
//! | `connected` | after a `disconnected`, restored window elapsed | "restored" signal |
//! | `connected` | nothing to recover from | silent |
//!
//! Windows are measured from the last signal *sent* in that direction, not
//! from the last transition.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::Lifecycle;

use super::sink::{Severity, Signal};

// ============================================================================
// Constants
// ============================================================================

/// Minimum spacing between two "lost" signals.
const DEFAULT_LOST_DEBOUNCE: Duration = Duration::from_millis(5000);

/// Minimum spacing between two "restored" signals.
const DEFAULT_RESTORED_DEBOUNCE: Duration = Duration::from_millis(3000);

// ============================================================================
// SignalTemplate
// ============================================================================

/// Text and display duration of one kind of signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalTemplate {
    /// Short headline.
    pub title: String,
    /// Longer explanation.
    pub description: String,
    /// Display duration.
    pub duration: Duration,
}

impl SignalTemplate {
    /// Creates a template.
    #[must_use]
    pub fn new(title: impl Into<String>, description: impl Into<String>, duration: Duration) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            duration,
        }
    }

    fn render(&self, severity: Severity) -> Signal {
        Signal {
            severity,
            title: self.title.clone(),
            description: self.description.clone(),
            duration: self.duration,
        }
    }
}

// ============================================================================
// NotifierConfig
// ============================================================================

/// Debounce windows and signal texts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifierConfig {
    /// Minimum spacing between "lost" signals.
    pub lost_debounce: Duration,
    /// Minimum spacing between "restored" signals.
    pub restored_debounce: Duration,
    /// Signal sent when a live connection drops.
    pub lost: SignalTemplate,
    /// Signal sent when the connection comes back.
    pub restored: SignalTemplate,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            lost_debounce: DEFAULT_LOST_DEBOUNCE,
            restored_debounce: DEFAULT_RESTORED_DEBOUNCE,
            lost: SignalTemplate::new(
                "Connection lost",
                "Real-time updates are paused. Reconnecting...",
                Duration::from_secs(5),
            ),
            restored: SignalTemplate::new(
                "Connection restored",
                "Real-time updates are back.",
                Duration::from_secs(3),
            ),
        }
    }
}

impl NotifierConfig {
    /// Sets the "lost" debounce window.
    #[inline]
    #[must_use]
    pub fn with_lost_debounce(mut self, window: Duration) -> Self {
        self.lost_debounce = window;
        self
    }

    /// Sets the "restored" debounce window.
    #[inline]
    #[must_use]
    pub fn with_restored_debounce(mut self, window: Duration) -> Self {
        self.restored_debounce = window;
        self
    }

    /// Sets the "lost" signal text.
    #[inline]
    #[must_use]
    pub fn with_lost_signal(mut self, template: SignalTemplate) -> Self {
        self.lost = template;
        self
    }

    /// Sets the "restored" signal text.
    #[inline]
    #[must_use]
    pub fn with_restored_signal(mut self, template: SignalTemplate) -> Self {
        self.restored = template;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a signal title is empty.
    pub fn validate(&self) -> Result<()> {
        if self.lost.title.is_empty() || self.restored.title.is_empty() {
            return Err(Error::config("connectivity signal titles must not be empty"));
        }
        Ok(())
    }
}

// ============================================================================
// ConnectivityNotifier
// ============================================================================

/// Decides which lifecycle transitions reach the user.
#[derive(Debug, Clone)]
pub struct ConnectivityNotifier {
    /// Windows and texts.
    config: NotifierConfig,
    /// Set on the first `connected`.
    was_connected: bool,
    /// Set by `disconnected`, cleared by the next `connected`.
    recovery_pending: bool,
    /// When the last "lost" signal was sent.
    last_lost: Option<Instant>,
    /// When the last "restored" signal was sent.
    last_restored: Option<Instant>,
}

impl ConnectivityNotifier {
    /// Creates a notifier that has seen nothing yet.
    #[must_use]
    pub fn new(config: NotifierConfig) -> Self {
        Self {
            config,
            was_connected: false,
            recovery_pending: false,
            last_lost: None,
            last_restored: None,
        }
    }

    /// Returns `true` once any `connected` was observed.
    #[inline]
    #[must_use]
    pub fn was_connected(&self) -> bool {
        self.was_connected
    }

    /// Forgets a pending recovery when a new identity takes over.
    ///
    /// Debounce timestamps are kept: they pace signals to the user, not to
    /// one identity.
    pub fn rebind(&mut self) {
        self.recovery_pending = false;
    }

    /// Observes a transition now.
    pub fn observe(&mut self, lifecycle: Lifecycle) -> Option<Signal> {
        self.observe_at(lifecycle, Instant::now())
    }

    /// Observes a transition at `now` and returns the signal to show, if any.
    pub fn observe_at(&mut self, lifecycle: Lifecycle, now: Instant) -> Option<Signal> {
        match lifecycle {
            Lifecycle::Connected => self.on_connected(now),
            Lifecycle::Disconnected => self.on_disconnected(now),
        }
    }

    fn on_connected(&mut self, now: Instant) -> Option<Signal> {
        if !self.was_connected {
            self.was_connected = true;
            self.recovery_pending = false;
            return None;
        }

        if !std::mem::take(&mut self.recovery_pending) {
            return None;
        }

        if !window_elapsed(self.last_restored, now, self.config.restored_debounce) {
            debug!("Restored signal suppressed by debounce");
            return None;
        }

        self.last_restored = Some(now);
        Some(self.config.restored.render(Severity::Success))
    }

    fn on_disconnected(&mut self, now: Instant) -> Option<Signal> {
        if !self.was_connected {
            return None;
        }

        self.recovery_pending = true;

        if !window_elapsed(self.last_lost, now, self.config.lost_debounce) {
            debug!("Lost signal suppressed by debounce");
            return None;
        }

        self.last_lost = Some(now);
        Some(self.config.lost.render(Severity::Error))
    }
}

impl Default for ConnectivityNotifier {
    fn default() -> Self {
        Self::new(NotifierConfig::default())
    }
}

/// `true` if no signal was sent yet or `window` has fully elapsed since.
#[inline]
fn window_elapsed(last: Option<Instant>, now: Instant, window: Duration) -> bool {
    last.is_none_or(|sent| now.saturating_duration_since(sent) >= window)
}

// ============================================================================
// Tests
// ============================================================================
