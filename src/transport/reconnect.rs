//! Reconnection state machine and backoff policy.
//!
//! ```text
//!            open ok                    link lost
//!   Idle ───────────────► Connected ─────────────────► Reconnecting{1}
//!    │                        ▲                           │   ▲
//!    │ open failed            │ open ok                   │   │ open failed
//!    └────────────────────────┼───────────────────────────┘   │ (attempt + 1)
//!                             └────────── Reconnecting{n} ────┘
//!
//!   disconnect() from any state ──► Closed (terminal)
//! ```
//!
//! There is no retry ceiling. The delay before attempt `n` grows
//! exponentially from [`ReconnectPolicy::initial_delay`] up to
//! [`ReconnectPolicy::max_delay`], plus random jitter.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use rand::Rng;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default delay before the first reconnect attempt.
const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);

/// Default upper bound for any reconnect delay.
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Default growth factor between attempts.
const DEFAULT_MULTIPLIER: f64 = 1.5;

/// Default jitter as a fraction of the base delay.
const DEFAULT_JITTER: f64 = 0.25;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of a transport client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Never connected.
    #[default]
    Idle,
    /// Link is open.
    Connected,
    /// Waiting for or performing reconnect attempt `attempt` (1-based).
    Reconnecting {
        /// The attempt about to be made.
        attempt: u32,
    },
    /// `disconnect()` was called. Terminal.
    Closed,
}

impl ConnectionState {
    /// Returns `true` if the link is open.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns `true` while retrying.
    #[inline]
    #[must_use]
    pub fn is_reconnecting(&self) -> bool {
        matches!(self, Self::Reconnecting { .. })
    }

    /// Returns `true` once the client was explicitly disconnected.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

// ============================================================================
// ReconnectPolicy
// ============================================================================

/// Bounded exponential backoff with jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first attempt.
    pub initial_delay: Duration,
    /// Upper bound for every delay, jitter included.
    pub max_delay: Duration,
    /// Growth factor between consecutive attempts (`>= 1.0`).
    pub multiplier: f64,
    /// Random extra delay as a fraction of the base delay (`0.0..=1.0`).
    pub jitter: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
            jitter: DEFAULT_JITTER,
        }
    }
}

impl ReconnectPolicy {
    /// Creates the default policy (1s initial, 30s cap, x1.5, 25% jitter).
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the initial delay.
    #[inline]
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    #[inline]
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the growth factor.
    #[inline]
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets the jitter fraction. `0.0` makes delays deterministic.
    #[inline]
    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Checks that the policy describes a usable backoff curve.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on a zero initial delay, a cap below the
    /// initial delay, a multiplier below `1.0`, or jitter outside `0.0..=1.0`.
    pub fn validate(&self) -> Result<()> {
        if self.initial_delay.is_zero() {
            return Err(Error::config("reconnect initial_delay must be greater than zero"));
        }
        if self.max_delay < self.initial_delay {
            return Err(Error::config(format!(
                "reconnect max_delay ({:?}) must not be below initial_delay ({:?})",
                self.max_delay, self.initial_delay
            )));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(Error::config(format!(
                "reconnect multiplier must be a finite value >= 1.0, got {}",
                self.multiplier
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(Error::config(format!(
                "reconnect jitter must be within 0.0..=1.0, got {}",
                self.jitter
            )));
        }
        Ok(())
    }

    /// Delay before `attempt` (1-based) without jitter.
    #[must_use]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);

        if !secs.is_finite() {
            return self.max_delay;
        }

        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Delay before `attempt` (1-based) with jitter, capped at `max_delay`.
    #[must_use]
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let jitter = self.jitter.clamp(0.0, 1.0);

        if jitter == 0.0 || base.is_zero() {
            return base;
        }

        let factor = rand::thread_rng().gen_range(0.0..=jitter);
        let extra = Duration::try_from_secs_f64(base.as_secs_f64() * factor).unwrap_or(self.max_delay);
        base.saturating_add(extra).min(self.max_delay)
    }
}

// ============================================================================
// Reconnector
// ============================================================================

/// The state machine driven by a transport client's connection task.
#[derive(Debug)]
pub(crate) struct Reconnector {
    /// Backoff curve.
    policy: ReconnectPolicy,
    /// Current state.
    state: ConnectionState,
}

impl Reconnector {
    /// Creates a machine in [`ConnectionState::Idle`].
    pub(crate) fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ConnectionState::Idle,
        }
    }

    /// Returns the current state.
    #[inline]
    pub(crate) fn state(&self) -> ConnectionState {
        self.state
    }

    /// Records a successful open.
    ///
    /// Returns `false` if the machine is closed and the link must be dropped.
    pub(crate) fn on_open(&mut self) -> bool {
        if self.state.is_closed() {
            return false;
        }
        self.state = ConnectionState::Connected;
        true
    }

    /// Records the loss of a live link and returns the delay before retrying.
    pub(crate) fn on_lost(&mut self) -> Option<Duration> {
        if self.state.is_closed() {
            return None;
        }
        self.state = ConnectionState::Reconnecting { attempt: 1 };
        Some(self.policy.next_delay(1))
    }

    /// Records a failed open and returns the delay before the next attempt.
    pub(crate) fn on_failed(&mut self) -> Option<Duration> {
        let attempt = match self.state {
            ConnectionState::Closed => return None,
            ConnectionState::Idle | ConnectionState::Connected => 1,
            ConnectionState::Reconnecting { attempt } => attempt.saturating_add(1),
        };
        self.state = ConnectionState::Reconnecting { attempt };
        Some(self.policy.next_delay(attempt))
    }

    /// Moves to the terminal state.
    pub(crate) fn close(&mut self) {
        self.state = ConnectionState::Closed;
    }
}

// ============================================================================
// Tests
// ============================================================================
