#![allow(dead_code)]
//! Common test infrastructure for integration tests.
//!
//! Provides:
//! - `ScriptedConnector`: in-memory [`Connector`] whose links are served by the test
//! - `Session`: server side of one accepted link
//! - `Recorder`: handler that forwards payloads into a channel
//! - `SignalLog`: [`SignalSink`] that records every signal
//!
//! ## Usage
//!
//! ```rust,ignore
//! let (connector, mut server) = ScriptedConnector::new();
//! let provider = provider_with(connector.clone(), signals.sink());
//! provider.set_subject(Some(subject("user-1")), true)?;
//! let session = server.accept().await;
//! session.push("message.new", json!({ "id": 1 }));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;

use realtime_transport::{
    Connector, Envelope, Error, Handler, Link, LinkPeer, RealtimeProvider, ReconnectPolicy,
    Result, Signal, SubjectId,
};

// ============================================================================
// Constants
// ============================================================================

/// Upper bound for any single wait in a test.
pub const WAIT: Duration = Duration::from_secs(60);

// ============================================================================
// Tracing
// ============================================================================

/// Installs a test-writer subscriber once. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Identifiers
// ============================================================================

pub fn subject(id: &str) -> SubjectId {
    SubjectId::new(id).expect("valid subject")
}

// ============================================================================
// ScriptedConnector
// ============================================================================

/// In-memory connector. Every successful open hands a [`Session`] to the test.
pub struct ScriptedConnector {
    /// Reject every open attempt while set.
    offline: AtomicBool,
    /// Number of upcoming open attempts to reject.
    fail_next: AtomicUsize,
    /// Total open attempts, failed ones included.
    opens: AtomicUsize,
    /// Accepted sessions waiting for the test.
    sessions: mpsc::UnboundedSender<Session>,
}

impl ScriptedConnector {
    pub fn new() -> (Arc<Self>, SessionQueue) {
        let (sessions_tx, sessions_rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            offline: AtomicBool::new(false),
            fail_next: AtomicUsize::new(0),
            opens: AtomicUsize::new(0),
            sessions: sessions_tx,
        });
        (connector, SessionQueue { sessions: sessions_rx })
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn open(&self, subject: &SubjectId) -> Result<Link> {
        self.opens.fetch_add(1, Ordering::SeqCst);

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::connection("scripted: offline"));
        }

        let pending = self.fail_next.load(Ordering::SeqCst);
        if pending > 0 {
            self.fail_next.store(pending - 1, Ordering::SeqCst);
            return Err(Error::connection("scripted: refused"));
        }

        let (link, peer) = Link::pair();
        let session = Session {
            subject: subject.clone(),
            peer,
        };
        self.sessions
            .send(session)
            .map_err(|_| Error::connection("scripted: no test listening"))?;
        Ok(link)
    }
}

/// Receives sessions opened through a [`ScriptedConnector`].
pub struct SessionQueue {
    sessions: mpsc::UnboundedReceiver<Session>,
}

impl SessionQueue {
    /// Waits for the next successful open.
    pub async fn accept(&mut self) -> Session {
        timeout(WAIT, self.sessions.recv())
            .await
            .expect("timed out waiting for a session")
            .expect("connector dropped")
    }

    /// Returns a session that was already opened, if any.
    pub fn try_accept(&mut self) -> Option<Session> {
        self.sessions.try_recv().ok()
    }
}

// ============================================================================
// Session
// ============================================================================

/// Server side of one accepted link.
pub struct Session {
    pub subject: SubjectId,
    peer: LinkPeer,
}

impl Session {
    /// Pushes an event to the client. Returns `false` if the client is gone.
    pub fn push(&self, event: &str, payload: Value) -> bool {
        self.peer.send(Envelope::new(event, payload))
    }

    /// Waits for the next event the client emits.
    pub async fn next_emitted(&mut self) -> Option<Envelope> {
        timeout(WAIT, self.peer.recv())
            .await
            .expect("timed out waiting for an emitted event")
    }

    /// Returns `true` once the client dropped the link.
    pub fn is_closed(&self) -> bool {
        self.peer.is_closed()
    }

    /// Drops the link from the server side.
    pub fn close(self) {
        drop(self);
    }
}

// ============================================================================
// Recorder
// ============================================================================

/// Handler that forwards every payload it sees.
pub struct Recorder {
    pub handler: Handler,
    calls: Arc<AtomicUsize>,
    payloads: mpsc::UnboundedReceiver<Value>,
}

impl Recorder {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let handler = Handler::new(move |payload| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(payload.clone());
        });

        Self {
            handler,
            calls,
            payloads: rx,
        }
    }

    /// Waits for the next payload.
    pub async fn next(&mut self) -> Value {
        timeout(WAIT, self.payloads.recv())
            .await
            .expect("timed out waiting for a handler call")
            .expect("handler dropped")
    }

    /// Returns a payload that already arrived, if any.
    pub fn try_next(&mut self) -> Option<Value> {
        self.payloads.try_recv().ok()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

// ============================================================================
// SignalLog
// ============================================================================

/// Records every connectivity signal.
#[derive(Clone, Default)]
pub struct SignalLog {
    signals: Arc<Mutex<Vec<Signal>>>,
}

impl SignalLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a sink closure writing into this log.
    pub fn sink(&self) -> impl Fn(Signal) + Send + Sync + 'static {
        let signals = Arc::clone(&self.signals);
        move |signal: Signal| signals.lock().push(signal)
    }

    pub fn titles(&self) -> Vec<String> {
        self.signals
            .lock()
            .iter()
            .map(|signal| signal.title.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.signals.lock().len()
    }
}

// ============================================================================
// Provider
// ============================================================================

/// Reconnect policy without jitter so backoff timing is predictable.
pub fn fixed_backoff() -> ReconnectPolicy {
    ReconnectPolicy::new()
        .with_initial_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(30))
        .with_multiplier(1.5)
        .with_jitter(0.0)
}

/// Builds a provider over `connector`.
pub fn provider_with(connector: Arc<ScriptedConnector>, signals: &SignalLog) -> RealtimeProvider {
    init_tracing();

    RealtimeProvider::builder()
        .connector(connector)
        .reconnect(fixed_backoff())
        .signal_sink(signals.sink())
        .build()
        .expect("valid provider configuration")
}

/// Waits until the connectivity flag equals `expected`.
pub async fn wait_connectivity(rx: &mut watch::Receiver<bool>, expected: bool) {
    timeout(WAIT, rx.wait_for(|connected| *connected == expected))
        .await
        .expect("timed out waiting for connectivity")
        .expect("provider dropped");
}
