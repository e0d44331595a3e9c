//! Provider configuration.

// ============================================================================
// Imports
// ============================================================================

use crate::error::Result;
use crate::notifier::NotifierConfig;
use crate::transport::TransportOptions;

// ============================================================================
// ProviderConfig
// ============================================================================

/// Settings shared by every transport client the provider creates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderConfig {
    /// Open timeout and reconnect policy.
    pub transport: TransportOptions,

    /// Debounce windows and signal texts.
    pub notifier: NotifierConfig,
}

impl ProviderConfig {
    /// Creates the default configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the transport options.
    #[inline]
    #[must_use]
    pub fn with_transport(mut self, transport: TransportOptions) -> Self {
        self.transport = transport;
        self
    }

    /// Sets the notifier configuration.
    #[inline]
    #[must_use]
    pub fn with_notifier(mut self, notifier: NotifierConfig) -> Self {
        self.notifier = notifier;
        self
    }

    /// Validates every nested section.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) naming the first
    /// invalid setting.
    pub fn validate(&self) -> Result<()> {
        self.transport.validate()?;
        self.notifier.validate()
    }
}

// ============================================================================
// Tests
// ============================================================================
