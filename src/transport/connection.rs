//! Transport client and its connection driver.
//!
//! A [`TransportClient`] owns exactly one push connection for one subject
//! identity. `connect()` spawns a driver task that:
//!
//! - opens links through the [`Connector`]
//! - dispatches inbound envelopes to the handlers registered on this client
//! - raises `connected` / `disconnected` lifecycle events
//! - retries forever with backoff until `disconnect()`
//!
//! # Delivery
//!
//! All handlers of one client run on its driver task, in the order envelopes
//! arrived. Handler lists are copied before invocation, so a handler may
//! call [`TransportClient::on`] or [`TransportClient::off`] itself.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{ConnectionId, SubjectId};
use crate::protocol::{CONNECTED, DISCONNECTED, Envelope, Handler};
use crate::registry::HandlerRegistry;

use super::connector::{Connector, Link};
use super::reconnect::{ConnectionState, ReconnectPolicy, Reconnector};

// ============================================================================
// Constants
// ============================================================================

/// Default upper bound for a single open attempt.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// TransportOptions
// ============================================================================

/// Per-client connection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportOptions {
    /// Backoff curve for reconnect attempts.
    pub reconnect: ReconnectPolicy,
    /// Upper bound for a single open attempt.
    pub connect_timeout: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl TransportOptions {
    /// Creates default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the reconnect policy.
    #[inline]
    #[must_use]
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Sets the open timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero open timeout or an invalid
    /// reconnect policy.
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout.is_zero() {
            return Err(Error::config("connect_timeout must be greater than zero"));
        }
        self.reconnect.validate()
    }
}

// ============================================================================
// Shared
// ============================================================================

/// State shared between a client handle and its driver task.
struct Shared {
    /// Instance id for logging.
    id: ConnectionId,
    /// Bound identity.
    subject: SubjectId,
    /// Handlers registered on this instance.
    handlers: Mutex<HandlerRegistry>,
    /// Published state snapshot.
    state: Mutex<ConnectionState>,
    /// Set synchronously by `disconnect()`.
    closed: AtomicBool,
    /// Sender half of the live link, if any.
    outbound: Mutex<Option<mpsc::UnboundedSender<Envelope>>>,
}

impl Shared {
    #[inline]
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Publishes a state unless the client is already closed.
    fn publish_state(&self, next: ConnectionState) {
        let mut state = self.state.lock();
        if !state.is_closed() {
            *state = next;
        }
    }

    /// Attaches the outbound half of a freshly opened link.
    ///
    /// Returns `false` if the client was closed in the meantime.
    fn attach(&self, outbound: mpsc::UnboundedSender<Envelope>) -> bool {
        let mut state = self.state.lock();
        if state.is_closed() {
            return false;
        }
        *self.outbound.lock() = Some(outbound);
        *state = ConnectionState::Connected;
        true
    }

    /// Drops the outbound half of the current link.
    fn detach(&self) {
        self.outbound.lock().take();
    }

    /// Invokes every handler registered for `event`.
    ///
    /// Returns the number of handlers invoked.
    fn dispatch(&self, event: &str, payload: &Value) -> usize {
        let handlers = self.handlers.lock().snapshot(event);

        if handlers.is_empty() {
            trace!(connection = %self.id, event, "No handlers for event");
            return 0;
        }

        let mut delivered = 0;
        for handler in &handlers {
            if self.is_closed() {
                break;
            }

            if catch_unwind(AssertUnwindSafe(|| handler.call(payload))).is_err() {
                error!(connection = %self.id, event, "Event handler panicked");
            }
            delivered += 1;
        }

        delivered
    }
}

// ============================================================================
// DriverSlot
// ============================================================================

/// Lifecycle of the driver task.
enum DriverSlot {
    /// `connect()` not called yet.
    NotStarted,
    /// Driver running; sending on the channel stops it.
    Running(oneshot::Sender<()>),
    /// Driver stopped or never allowed to start.
    Stopped,
}

// ============================================================================
// TransportClient
// ============================================================================

/// One push connection for one subject identity.
///
/// Creating a second client for the same identity without disconnecting the
/// first opens a second socket; the provider prevents that.
///
/// Dropping the client disconnects it.
pub struct TransportClient {
    /// State shared with the driver.
    shared: Arc<Shared>,
    /// Link factory.
    connector: Arc<dyn Connector>,
    /// Connection settings.
    options: TransportOptions,
    /// Driver task control.
    driver: Mutex<DriverSlot>,
}

impl fmt::Debug for TransportClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportClient")
            .field("id", &self.shared.id)
            .field("subject", &self.shared.subject)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// TransportClient - Constructor
// ============================================================================

impl TransportClient {
    /// Creates an idle client. No I/O happens until [`connect`](Self::connect).
    pub fn new(
        subject: SubjectId,
        connector: Arc<dyn Connector>,
        options: TransportOptions,
    ) -> Self {
        let shared = Arc::new(Shared {
            id: ConnectionId::new(),
            subject,
            handlers: Mutex::new(HandlerRegistry::new()),
            state: Mutex::new(ConnectionState::Idle),
            closed: AtomicBool::new(false),
            outbound: Mutex::new(None),
        });

        debug!(connection = %shared.id, subject = %shared.subject, "Transport client created");

        Self {
            shared,
            connector,
            options,
            driver: Mutex::new(DriverSlot::NotStarted),
        }
    }
}

// ============================================================================
// TransportClient - Public API
// ============================================================================

impl TransportClient {
    /// Returns the instance id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.shared.id
    }

    /// Returns the bound subject identity.
    #[inline]
    #[must_use]
    pub fn subject(&self) -> &SubjectId {
        &self.shared.subject
    }

    /// Returns the current connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.lock()
    }

    /// Returns `true` while a link is open.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Starts the connection driver.
    ///
    /// Idempotent: calling it again while the driver exists does nothing,
    /// and a disconnected client never restarts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Runtime`] when called outside a tokio runtime.
    pub fn connect(&self) -> Result<()> {
        let mut driver = self.driver.lock();

        match *driver {
            DriverSlot::NotStarted => {}
            DriverSlot::Running(_) => {
                trace!(connection = %self.shared.id, "connect() ignored, driver already running");
                return Ok(());
            }
            DriverSlot::Stopped => {
                debug!(connection = %self.shared.id, "connect() ignored, client is closed");
                return Ok(());
            }
        }

        if self.shared.is_closed() {
            *driver = DriverSlot::Stopped;
            return Ok(());
        }

        let runtime = Handle::try_current().map_err(|e| Error::runtime(e.to_string()))?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        runtime.spawn(run_driver(
            Arc::clone(&self.shared),
            Arc::clone(&self.connector),
            self.options.clone(),
            shutdown_rx,
        ));

        *driver = DriverSlot::Running(shutdown_tx);

        debug!(connection = %self.shared.id, subject = %self.shared.subject, "Connection driver started");
        Ok(())
    }

    /// Terminates the connection.
    ///
    /// Takes effect synchronously: the state becomes
    /// [`ConnectionState::Closed`], pending retries are cancelled and no
    /// handler of this instance runs afterwards. Idempotent.
    pub fn disconnect(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        *self.shared.state.lock() = ConnectionState::Closed;
        self.shared.detach();

        let previous = std::mem::replace(&mut *self.driver.lock(), DriverSlot::Stopped);
        if let DriverSlot::Running(shutdown_tx) = previous {
            let _ = shutdown_tx.send(());
        }

        info!(connection = %self.shared.id, subject = %self.shared.subject, "Transport client disconnected");
    }

    /// Registers `handler` for `event` on this instance.
    ///
    /// Returns `false` if the handler was already registered for `event`.
    pub fn on(&self, event: impl Into<String>, handler: Handler) -> bool {
        self.shared.handlers.lock().register(event, handler)
    }

    /// Removes `handler` from `event` on this instance.
    ///
    /// Returns `false` if it was not registered.
    pub fn off(&self, event: &str, handler: &Handler) -> bool {
        self.shared.handlers.lock().unregister(event, handler)
    }

    /// Sends a named event to the server over the live link.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `event` is empty or reserved
    /// - [`Error::NotConnected`] if no link is open
    pub fn emit(&self, event: impl Into<String>, payload: Value) -> Result<()> {
        let envelope = Envelope::outbound(event, payload)?;

        let outbound = self.shared.outbound.lock();
        let sender = outbound.as_ref().ok_or(Error::NotConnected)?;
        sender.send(envelope).map_err(|_| Error::NotConnected)
    }
}

impl Drop for TransportClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

// ============================================================================
// Connection Driver
// ============================================================================

/// Why a served link ended.
enum LinkExit {
    /// `disconnect()` was called.
    Shutdown,
    /// The link dropped on its own.
    Lost,
}

/// Opens links, serves them and retries until shut down.
async fn run_driver(
    shared: Arc<Shared>,
    connector: Arc<dyn Connector>,
    options: TransportOptions,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut machine = Reconnector::new(options.reconnect.clone());
    let timeout_ms = options.connect_timeout.as_millis() as u64;

    loop {
        if shared.is_closed() {
            break;
        }

        let opened = tokio::select! {
            biased;

            _ = &mut shutdown => break,

            result = timeout(options.connect_timeout, connector.open(&shared.subject)) => {
                result.unwrap_or_else(|_| Err(Error::connection_timeout(timeout_ms)))
            }
        };

        let delay = match opened {
            Ok(link) => match serve_link(&shared, &mut machine, link, &mut shutdown).await {
                LinkExit::Shutdown => break,
                LinkExit::Lost => {
                    let Some(delay) = machine.on_lost() else {
                        break;
                    };
                    shared.publish_state(machine.state());

                    warn!(
                        connection = %shared.id,
                        subject = %shared.subject,
                        delay_ms = delay.as_millis() as u64,
                        "Push link lost, reconnecting"
                    );

                    shared.dispatch(DISCONNECTED, &Value::Null);
                    delay
                }
            },
            Err(e) => {
                let Some(delay) = machine.on_failed() else {
                    break;
                };
                shared.publish_state(machine.state());

                if let ConnectionState::Reconnecting { attempt } = machine.state() {
                    warn!(
                        connection = %shared.id,
                        subject = %shared.subject,
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Connection attempt failed, retrying"
                    );
                }
                delay
            }
        };

        tokio::select! {
            biased;

            _ = &mut shutdown => break,

            _ = sleep(delay) => {}
        }
    }

    machine.close();
    shared.detach();

    debug!(connection = %shared.id, "Connection driver terminated");
}

/// Serves one open link until it ends or the client shuts down.
async fn serve_link(
    shared: &Shared,
    machine: &mut Reconnector,
    link: Link,
    shutdown: &mut oneshot::Receiver<()>,
) -> LinkExit {
    let (mut inbound, outbound) = link.into_parts();

    if !machine.on_open() || !shared.attach(outbound) {
        return LinkExit::Shutdown;
    }

    info!(connection = %shared.id, subject = %shared.subject, "Push link connected");
    shared.dispatch(CONNECTED, &Value::Null);

    loop {
        tokio::select! {
            biased;

            _ = &mut *shutdown => return LinkExit::Shutdown,

            message = inbound.recv() => {
                match message {
                    Some(envelope) => {
                        if envelope.lifecycle().is_some() {
                            warn!(
                                connection = %shared.id,
                                event = %envelope.event,
                                "Dropping server event with reserved lifecycle name"
                            );
                            continue;
                        }

                        let delivered = shared.dispatch(&envelope.event, &envelope.payload);
                        trace!(connection = %shared.id, event = %envelope.event, delivered, "Event dispatched");
                    }

                    None => break,
                }
            }
        }
    }

    shared.detach();

    if shared.is_closed() {
        LinkExit::Shutdown
    } else {
        LinkExit::Lost
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;

    /// Connector that never succeeds.
    struct Unreachable {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl Connector for Unreachable {
        async fn open(&self, _subject: &SubjectId) -> Result<Link> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(Error::connection("unreachable"))
        }
    }

    fn client(connector: Arc<dyn Connector>) -> TransportClient {
        let subject = SubjectId::new("user-42").expect("valid subject");
        TransportClient::new(subject, connector, TransportOptions::default())
    }

    #[test]
    fn test_default_options() {
        let options = TransportOptions::default();
        assert_eq!(options.connect_timeout, Duration::from_secs(10));
        assert!(options.validate().is_ok());
        assert!(
            TransportOptions::new()
                .with_connect_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_connect_outside_runtime_fails() {
        let connector = Arc::new(Unreachable {
            attempts: AtomicUsize::new(0),
        });
        let client = client(connector);
        let err = client.connect().unwrap_err();
        assert!(matches!(err, Error::Runtime { .. }));
    }

    #[test]
    fn test_on_off_are_idempotent() {
        let client = client(Arc::new(Unreachable {
            attempts: AtomicUsize::new(0),
        }));
        let handler = Handler::new(|_| {});

        assert!(client.on("message.new", handler.clone()));
        assert!(!client.on("message.new", handler.clone()));
        assert!(client.off("message.new", &handler));
        assert!(!client.off("message.new", &handler));
    }

    #[test]
    fn test_emit_requires_link() {
        let client = client(Arc::new(Unreachable {
            attempts: AtomicUsize::new(0),
        }));
        assert!(matches!(
            client.emit("typing", Value::Null),
            Err(Error::NotConnected)
        ));
        assert!(matches!(
            client.emit(CONNECTED, Value::Null),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_disconnect_before_connect_is_terminal() {
        let client = client(Arc::new(Unreachable {
            attempts: AtomicUsize::new(0),
        }));
        client.disconnect();
        client.disconnect();
        assert_eq!(client.state(), ConnectionState::Closed);
        // Never starts a driver, so no runtime is needed.
        assert!(client.connect().is_ok());
        assert_eq!(client.state(), ConnectionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_attempts_keep_retrying() {
        let connector = Arc::new(Unreachable {
            attempts: AtomicUsize::new(0),
        });
        let client = client(Arc::clone(&connector) as Arc<dyn Connector>);

        client.connect().expect("inside runtime");
        client.connect().expect("idempotent");

        sleep(Duration::from_secs(120)).await;

        let attempts = connector.attempts.load(Ordering::SeqCst);
        assert!(attempts > 5, "expected repeated attempts, got {attempts}");
        assert!(client.state().is_reconnecting());

        client.disconnect();
        let frozen = connector.attempts.load(Ordering::SeqCst);
        sleep(Duration::from_secs(300)).await;
        assert_eq!(connector.attempts.load(Ordering::SeqCst), frozen);
        assert_eq!(client.state(), ConnectionState::Closed);
    }
}
