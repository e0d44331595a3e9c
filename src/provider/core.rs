//! Realtime provider facade.
//!
//! The [`RealtimeProvider`] owns at most one [`TransportClient`] at a time,
//! bound to the current subject identity. It keeps the consumer's handler
//! registry across identity swaps, tracks connectivity for the UI and turns
//! lifecycle transitions into debounced user-facing signals.
//!
//! # Example
//!
//! ```no_run
//! use realtime_transport::{Handler, RealtimeProvider, SubjectId};
//!
//! # async fn example() -> realtime_transport::Result<()> {
//! let provider = RealtimeProvider::builder()
//!     .endpoint("wss://push.example.com/events")
//!     .build()?;
//!
//! let on_message = Handler::new(|payload| println!("new message: {payload}"));
//! provider.on("message.new", on_message.clone());
//!
//! provider.set_subject(Some(SubjectId::new("user-42")?), true)?;
//!
//! let mut connectivity = provider.connectivity();
//! connectivity.wait_for(|connected| *connected).await.ok();
//!
//! provider.off("message.new", &on_message);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, trace};

use crate::error::{Error, Result};
use crate::identifiers::SubjectId;
use crate::notifier::{ConnectivityNotifier, SignalSink};
use crate::protocol::{Handler, Lifecycle};
use crate::registry::HandlerRegistry;
use crate::transport::{ConnectionState, Connector, TransportClient};

use super::builder::ProviderBuilder;
use super::options::ProviderConfig;

// ============================================================================
// Connectivity
// ============================================================================

/// Connectivity flag plus notifier, fenced by a binding generation.
///
/// Every client gets the generation current at its creation. Transitions
/// from an older generation are ignored, so a superseded client can never
/// flip the flag.
struct Connectivity {
    /// Generation and notifier, updated together with the flag.
    inner: Mutex<ConnectivityInner>,
    /// Published connectivity flag.
    state_tx: watch::Sender<bool>,
    /// Destination of user-facing signals.
    sink: Arc<dyn SignalSink>,
}

struct ConnectivityInner {
    /// Bumped on every rebind and teardown.
    generation: u64,
    /// Debounce state.
    notifier: ConnectivityNotifier,
}

impl Connectivity {
    fn new(notifier: ConnectivityNotifier, sink: Arc<dyn SignalSink>) -> Self {
        let (state_tx, _) = watch::channel(false);
        Self {
            inner: Mutex::new(ConnectivityInner {
                generation: 0,
                notifier,
            }),
            state_tx,
            sink,
        }
    }

    /// Starts a new generation with the flag cleared and no recovery pending.
    fn reset(&self) -> u64 {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        inner.notifier.rebind();
        self.state_tx.send_replace(false);
        inner.generation
    }

    /// Applies a transition raised by the client of `generation`.
    fn observe(&self, generation: u64, lifecycle: Lifecycle) {
        let signal = {
            let mut inner = self.inner.lock();
            if inner.generation != generation {
                trace!(generation, current = inner.generation, ?lifecycle, "Stale lifecycle event ignored");
                return;
            }

            self.state_tx
                .send_replace(matches!(lifecycle, Lifecycle::Connected));
            inner.notifier.observe(lifecycle)
        };

        if let Some(signal) = signal {
            self.sink.notify(signal);
        }
    }

    #[inline]
    fn is_connected(&self) -> bool {
        *self.state_tx.borrow()
    }
}

// ============================================================================
// Binding
// ============================================================================

/// Consumer registry and the live client, guarded by one mutex.
#[derive(Default)]
struct Binding {
    /// Handlers that outlive any single client.
    registry: HandlerRegistry,
    /// Client for the current subject, if any.
    current: Option<TransportClient>,
}

impl Binding {
    /// Disconnects and drops the live client.
    ///
    /// Returns `true` if there was one.
    fn release(&mut self) -> bool {
        match self.current.take() {
            Some(client) => {
                client.disconnect();
                true
            }
            None => false,
        }
    }
}

// ============================================================================
// RealtimeProvider
// ============================================================================

/// Application-facing handle to the push connection.
///
/// Starts unbound. Binding a subject with [`set_subject`](Self::set_subject)
/// creates a transport client, replays every registered handler onto it and
/// connects. Rebinding or [`teardown`](Self::teardown) disconnects the old
/// client first. Dropping the provider tears it down.
pub struct RealtimeProvider {
    /// Link factory handed to every client.
    connector: Arc<dyn Connector>,
    /// Transport and notifier settings.
    config: ProviderConfig,
    /// Registry and live client.
    binding: Mutex<Binding>,
    /// Connectivity flag and notifier.
    connectivity: Arc<Connectivity>,
}

// ============================================================================
// RealtimeProvider - Display
// ============================================================================

impl fmt::Debug for RealtimeProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeProvider")
            .field("subject", &self.subject())
            .field("connected", &self.is_connected())
            .field("registry_len", &self.registry_len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// RealtimeProvider - Constructor
// ============================================================================

impl RealtimeProvider {
    /// Creates a configuration builder for the provider.
    #[inline]
    #[must_use]
    pub fn builder() -> ProviderBuilder {
        ProviderBuilder::new()
    }

    /// Creates an unbound provider.
    pub(crate) fn new(
        connector: Arc<dyn Connector>,
        config: ProviderConfig,
        sink: Arc<dyn SignalSink>,
    ) -> Self {
        let notifier = ConnectivityNotifier::new(config.notifier.clone());

        Self {
            connector,
            config,
            binding: Mutex::new(Binding::default()),
            connectivity: Arc::new(Connectivity::new(notifier, sink)),
        }
    }
}

// ============================================================================
// RealtimeProvider - Binding
// ============================================================================

impl RealtimeProvider {
    /// Binds the provider to `subject`.
    ///
    /// - same subject and flag as now: nothing happens
    /// - otherwise the current client (if any) is disconnected and
    ///   connectivity resets to `false`
    /// - `None` or `enabled == false`: the provider stays unbound
    /// - else a new client is created, handlers are replayed onto it and it
    ///   starts connecting
    ///
    /// # Errors
    ///
    /// Returns [`Error::Runtime`] when a client must be started outside a
    /// tokio runtime. The provider is left unbound in that case.
    pub fn set_subject(&self, subject: Option<SubjectId>, enabled: bool) -> Result<()> {
        let desired = subject.filter(|_| enabled);
        let mut binding = self.binding.lock();

        let current = binding.current.as_ref().map(TransportClient::subject);
        if current == desired.as_ref() {
            trace!(subject = ?desired, "set_subject() with unchanged binding ignored");
            return Ok(());
        }

        if binding.release() {
            debug!("Previous transport client released");
        }
        let generation = self.connectivity.reset();

        let Some(subject) = desired else {
            info!("Realtime provider unbound");
            return Ok(());
        };

        let client = TransportClient::new(
            subject,
            Arc::clone(&self.connector),
            self.config.transport.clone(),
        );

        self.install_lifecycle_handlers(&client, generation);
        binding.registry.replay(&client);

        if let Err(e) = client.connect() {
            client.disconnect();
            return Err(e);
        }

        info!(
            subject = %client.subject(),
            connection = %client.id(),
            generation,
            "Realtime provider bound"
        );

        binding.current = Some(client);
        Ok(())
    }

    /// Disconnects the live client and clears connectivity.
    ///
    /// Registered handlers are kept. Idempotent.
    pub fn teardown(&self) {
        let released = self.binding.lock().release();
        self.connectivity.reset();

        if released {
            info!("Realtime provider torn down");
        }
    }

    /// Routes the client's lifecycle events into the connectivity state.
    fn install_lifecycle_handlers(&self, client: &TransportClient, generation: u64) {
        for lifecycle in [Lifecycle::Connected, Lifecycle::Disconnected] {
            let connectivity = Arc::clone(&self.connectivity);
            client.on(
                lifecycle.event_name(),
                Handler::new(move |_| connectivity.observe(generation, lifecycle)),
            );
        }
    }
}

// ============================================================================
// RealtimeProvider - Public API
// ============================================================================

impl RealtimeProvider {
    /// Registers `handler` for `event`.
    ///
    /// The handler survives reconnects and identity swaps. Registering the
    /// same handler twice is a no-op; returns `false` in that case.
    pub fn on(&self, event: impl Into<String>, handler: Handler) -> bool {
        let event = event.into();
        let mut binding = self.binding.lock();

        if !binding.registry.register(event.clone(), handler.clone()) {
            return false;
        }
        if let Some(client) = &binding.current {
            client.on(event, handler);
        }
        true
    }

    /// Removes `handler` from `event`.
    ///
    /// Returns `false` if it was not registered.
    pub fn off(&self, event: &str, handler: &Handler) -> bool {
        let mut binding = self.binding.lock();

        if !binding.registry.unregister(event, handler) {
            return false;
        }
        if let Some(client) = &binding.current {
            client.off(event, handler);
        }
        true
    }

    /// Sends a named event to the server.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if unbound or no link is open
    /// - [`Error::InvalidArgument`] if `event` is empty or reserved
    pub fn emit(&self, event: impl Into<String>, payload: Value) -> Result<()> {
        let binding = self.binding.lock();
        let client = binding.current.as_ref().ok_or(Error::NotConnected)?;
        client.emit(event, payload)
    }

    /// Returns the current connectivity flag.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connectivity.is_connected()
    }

    /// Subscribes to connectivity changes.
    #[must_use]
    pub fn connectivity(&self) -> watch::Receiver<bool> {
        self.connectivity.state_tx.subscribe()
    }

    /// Returns the bound subject, if any.
    #[must_use]
    pub fn subject(&self) -> Option<SubjectId> {
        self.binding
            .lock()
            .current
            .as_ref()
            .map(|client| client.subject().clone())
    }

    /// Returns the live client's connection state, if bound.
    #[must_use]
    pub fn transport_state(&self) -> Option<ConnectionState> {
        self.binding.lock().current.as_ref().map(TransportClient::state)
    }

    /// Returns the number of registered (event, handler) pairs.
    #[must_use]
    pub fn registry_len(&self) -> usize {
        self.binding.lock().registry.len()
    }

    /// Returns the provider configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

impl Drop for RealtimeProvider {
    fn drop(&mut self) {
        self.teardown();
    }
}

// ============================================================================
// Tests
// ============================================================================
