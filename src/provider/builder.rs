//! Builder pattern for provider configuration.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use realtime_transport::{RealtimeProvider, SubjectId};
//!
//! # async fn example() -> realtime_transport::Result<()> {
//! let provider = RealtimeProvider::builder()
//!     .endpoint("wss://push.example.com/events")
//!     .connect_timeout(Duration::from_secs(5))
//!     .build()?;
//!
//! provider.set_subject(Some(SubjectId::new("user-42")?), true)?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::notifier::{NotifierConfig, SignalSink, TracingSink};
use crate::transport::{Connector, ReconnectPolicy, WebSocketConnector};

use super::core::RealtimeProvider;
use super::options::ProviderConfig;

// ============================================================================
// ProviderBuilder
// ============================================================================

/// Builder for configuring a [`RealtimeProvider`].
///
/// Use [`RealtimeProvider::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct ProviderBuilder {
    /// Push endpoint URL.
    endpoint: Option<String>,
    /// Query parameter carrying the subject identity.
    subject_param: Option<String>,
    /// Custom link factory. Wins over `endpoint`.
    connector: Option<Arc<dyn Connector>>,
    /// Transport and notifier settings.
    config: ProviderConfig,
    /// Destination of user-facing signals.
    sink: Option<Arc<dyn SignalSink>>,
}

impl fmt::Debug for ProviderBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderBuilder")
            .field("endpoint", &self.endpoint)
            .field("subject_param", &self.subject_param)
            .field("custom_connector", &self.connector.is_some())
            .field("config", &self.config)
            .field("custom_sink", &self.sink.is_some())
            .finish()
    }
}

// ============================================================================
// ProviderBuilder Implementation
// ============================================================================

impl ProviderBuilder {
    /// Creates a builder with default settings and no endpoint.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the WebSocket push endpoint.
    ///
    /// # Arguments
    ///
    /// * `url` - `ws://` or `wss://` URL; the subject is appended as a query parameter
    #[inline]
    #[must_use]
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    /// Overrides the query parameter carrying the subject (default `subject`).
    #[inline]
    #[must_use]
    pub fn subject_param(mut self, name: impl Into<String>) -> Self {
        self.subject_param = Some(name.into());
        self
    }

    /// Uses a custom link factory instead of the WebSocket connector.
    #[inline]
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Sets the reconnect backoff policy.
    #[inline]
    #[must_use]
    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.config.transport.reconnect = policy;
        self
    }

    /// Sets the upper bound for one open attempt.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.transport.connect_timeout = timeout;
        self
    }

    /// Sets debounce windows and signal texts.
    #[inline]
    #[must_use]
    pub fn notifier(mut self, config: NotifierConfig) -> Self {
        self.config.notifier = config;
        self
    }

    /// Replaces the whole configuration.
    #[inline]
    #[must_use]
    pub fn config(mut self, config: ProviderConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets where connectivity signals go. Defaults to [`TracingSink`].
    #[inline]
    #[must_use]
    pub fn signal_sink(mut self, sink: impl SignalSink + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Builds the provider with validation.
    ///
    /// The provider starts unbound; call
    /// [`RealtimeProvider::set_subject`] to open a connection.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if neither endpoint nor connector is set
    /// - [`Error::Config`] if a duration, multiplier or jitter is invalid
    /// - [`Error::Url`] / [`Error::Config`] if the endpoint is malformed
    pub fn build(self) -> Result<RealtimeProvider> {
        self.config.validate()?;
        let connector = self.resolve_connector()?;
        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingSink));

        Ok(RealtimeProvider::new(connector, self.config, sink))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ProviderBuilder {
    /// Picks the custom connector or builds the WebSocket one.
    fn resolve_connector(&self) -> Result<Arc<dyn Connector>> {
        if let Some(connector) = &self.connector {
            return Ok(Arc::clone(connector));
        }

        let endpoint = self.endpoint.as_deref().ok_or_else(|| {
            Error::config(
                "Push endpoint is required. Use .endpoint() or .connector() to set it.\n\
                 Example: RealtimeProvider::builder().endpoint(\"wss://push.example.com/events\")",
            )
        })?;

        let mut connector = WebSocketConnector::new(endpoint)?;
        if let Some(param) = &self.subject_param {
            if param.is_empty() {
                return Err(Error::config("subject query parameter name must not be empty"));
            }
            connector = connector.with_subject_param(param.clone());
        }

        Ok(Arc::new(connector))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use crate::identifiers::SubjectId;
    use crate::notifier::Signal;
    use crate::transport::Link;

    struct Offline;

    #[async_trait]
    impl Connector for Offline {
        async fn open(&self, _subject: &SubjectId) -> Result<Link> {
            Err(Error::connection("offline"))
        }
    }

    #[test]
    fn test_new_creates_empty_builder() {
        let builder = ProviderBuilder::new();
        assert!(builder.endpoint.is_none());
        assert!(builder.connector.is_none());
        assert!(builder.sink.is_none());
        assert_eq!(builder.config, ProviderConfig::default());
    }

    #[test]
    fn test_build_without_endpoint_fails() {
        let err = ProviderBuilder::new().build().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("endpoint"));
    }

    #[test]
    fn test_build_rejects_http_scheme() {
        let err = ProviderBuilder::new()
            .endpoint("https://push.example.com")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_build_rejects_malformed_url() {
        let err = ProviderBuilder::new().endpoint("not a url").build().unwrap_err();
        assert!(matches!(err, Error::Url(_)));
    }

    #[test]
    fn test_build_rejects_empty_subject_param() {
        let err = ProviderBuilder::new()
            .endpoint("wss://push.example.com")
            .subject_param("")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_build_rejects_zero_timeout() {
        let err = ProviderBuilder::new()
            .endpoint("wss://push.example.com")
            .connect_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_custom_connector_wins_over_endpoint() {
        let provider = ProviderBuilder::new()
            .endpoint("not a url")
            .connector(Arc::new(Offline))
            .build();
        assert!(provider.is_ok());
    }

    #[test]
    fn test_build_with_endpoint_starts_unbound() {
        let provider = ProviderBuilder::new()
            .endpoint("ws://127.0.0.1:9/events")
            .subject_param("user_id")
            .reconnect(ReconnectPolicy::new().with_jitter(0.0))
            .signal_sink(|_signal: Signal| {})
            .build()
            .expect("valid configuration");

        assert!(provider.subject().is_none());
        assert!(!provider.is_connected());
    }
}
