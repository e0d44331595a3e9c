//! Push transport factory.
//!
//! A [`Connector`] opens one [`Link`] per call for a subject identity.
//! The transport client calls it for the first connection and for every
//! reconnect attempt.
//!
//! # Link Model
//!
//! ```text
//! ┌──────────────────┐   inbound Envelope    ┌──────────────────┐
//! │                  │◄──────────────────────│                  │
//! │ TransportClient  │                       │    LinkPeer      │
//! │   (owns Link)    │──────────────────────►│ (socket pump or  │
//! │                  │   outbound Envelope   │  test harness)   │
//! └──────────────────┘                       └──────────────────┘
//! ```
//!
//! The link is lost when the inbound channel ends. Dropping the [`Link`]
//! tells the peer to close the underlying resource.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{from_str, to_string};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, connect_async};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::SubjectId;
use crate::protocol::Envelope;

// ============================================================================
// Constants
// ============================================================================

/// Default query parameter carrying the subject identity.
pub const DEFAULT_SUBJECT_PARAM: &str = "subject";

// ============================================================================
// Connector
// ============================================================================

/// Opens push links for a subject identity.
///
/// Implementations must not retry internally; the transport client owns the
/// retry policy.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Opens a new link for `subject`.
    ///
    /// # Errors
    ///
    /// Any error is treated as a failed attempt and retried with backoff.
    async fn open(&self, subject: &SubjectId) -> Result<Link>;
}

// ============================================================================
// Link
// ============================================================================

/// Client end of an open push link.
#[derive(Debug)]
pub struct Link {
    /// Events arriving from the server.
    inbound: mpsc::UnboundedReceiver<Envelope>,
    /// Events to send to the server.
    outbound: mpsc::UnboundedSender<Envelope>,
}

impl Link {
    /// Creates a connected link/peer pair backed by in-process channels.
    #[must_use]
    pub fn pair() -> (Link, LinkPeer) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let link = Link {
            inbound: inbound_rx,
            outbound: outbound_tx,
        };
        let peer = LinkPeer {
            to_client: inbound_tx,
            from_client: outbound_rx,
        };

        (link, peer)
    }

    /// Splits the link into its channel halves.
    pub(crate) fn into_parts(
        self,
    ) -> (
        mpsc::UnboundedReceiver<Envelope>,
        mpsc::UnboundedSender<Envelope>,
    ) {
        (self.inbound, self.outbound)
    }
}

// ============================================================================
// LinkPeer
// ============================================================================

/// Server-facing end of a [`Link`].
///
/// Dropping the peer ends the link from the client's point of view.
#[derive(Debug)]
pub struct LinkPeer {
    /// Delivers envelopes to the client.
    to_client: mpsc::UnboundedSender<Envelope>,
    /// Receives envelopes emitted by the client.
    from_client: mpsc::UnboundedReceiver<Envelope>,
}

impl LinkPeer {
    /// Delivers an envelope to the client.
    ///
    /// Returns `false` if the client dropped its end.
    pub fn send(&self, envelope: Envelope) -> bool {
        self.to_client.send(envelope).is_ok()
    }

    /// Receives the next envelope emitted by the client.
    ///
    /// Returns `None` once the client dropped its end.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.from_client.recv().await
    }

    /// Returns `true` once the client dropped its end.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.to_client.is_closed()
    }
}

// ============================================================================
// WebSocketConnector
// ============================================================================

/// [`Connector`] over a WebSocket endpoint.
///
/// Each link is `GET {endpoint}?{subject_param}={subject}` upgraded to a
/// WebSocket. Every text frame carries one JSON [`Envelope`].
///
/// # Example
///
/// ```ignore
/// let connector = WebSocketConnector::new("wss://push.example.com/events")?
///     .with_subject_param("user_id");
/// ```
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    /// Base endpoint (`ws://` or `wss://`).
    endpoint: Url,
    /// Query parameter name for the subject identity.
    subject_param: String,
}

impl WebSocketConnector {
    /// Creates a connector for `endpoint`.
    ///
    /// # Errors
    ///
    /// - [`Error::Url`] if `endpoint` does not parse
    /// - [`Error::Config`] if the scheme is not `ws` or `wss`
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)?;

        if !matches!(endpoint.scheme(), "ws" | "wss") {
            return Err(Error::config(format!(
                "push endpoint must use ws:// or wss://, got {}://",
                endpoint.scheme()
            )));
        }

        Ok(Self {
            endpoint,
            subject_param: DEFAULT_SUBJECT_PARAM.to_string(),
        })
    }

    /// Overrides the query parameter carrying the subject identity.
    #[inline]
    #[must_use]
    pub fn with_subject_param(mut self, name: impl Into<String>) -> Self {
        self.subject_param = name.into();
        self
    }

    /// Returns the configured endpoint.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Builds the connection URL for `subject`.
    #[must_use]
    pub fn url_for(&self, subject: &SubjectId) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair(&self.subject_param, subject.as_str());
        url
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, subject: &SubjectId) -> Result<Link> {
        let url = self.url_for(subject);

        let (ws_stream, _response) = connect_async(url.as_str()).await?;

        info!(subject = %subject, endpoint = %self.endpoint, "WebSocket link established");

        let (link, peer) = Link::pair();
        tokio::spawn(pump_socket(ws_stream, peer));

        Ok(link)
    }
}

// ============================================================================
// Socket Pump
// ============================================================================

/// Moves frames between a WebSocket and a [`LinkPeer`] until either side ends.
pub async fn pump_socket<S>(ws_stream: WebSocketStream<S>, mut peer: LinkPeer)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut ws_write, mut ws_read) = ws_stream.split();

    loop {
        tokio::select! {
            // Frames from the server
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        let Some(envelope) = parse_envelope(&text) else {
                            continue;
                        };

                        if !peer.send(envelope) {
                            debug!("Client dropped link, closing socket");
                            let _ = ws_write.close().await;
                            break;
                        }
                    }

                    Some(Ok(Message::Close(_))) => {
                        debug!("WebSocket closed by remote");
                        break;
                    }

                    Some(Err(e)) => {
                        error!(error = %e, "WebSocket error");
                        break;
                    }

                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }

                    // Ignore Binary, Ping, Pong
                    _ => {}
                }
            }

            // Envelopes emitted by the client
            outgoing = peer.recv() => {
                match outgoing {
                    Some(envelope) => {
                        let json = match to_string(&envelope) {
                            Ok(json) => json,
                            Err(e) => {
                                warn!(error = %e, event = %envelope.event, "Failed to serialize envelope");
                                continue;
                            }
                        };

                        if let Err(e) = ws_write.send(Message::Text(json.into())).await {
                            warn!(error = %e, "Failed to send envelope");
                            break;
                        }

                        trace!(event = %envelope.event, "Envelope sent");
                    }

                    None => {
                        debug!("Client dropped link, closing socket");
                        let _ = ws_write.close().await;
                        break;
                    }
                }
            }
        }
    }

    debug!("Socket pump terminated");
}

/// Parses one text frame, logging and discarding malformed input.
fn parse_envelope(text: &str) -> Option<Envelope> {
    match from_str::<Envelope>(text) {
        Ok(envelope) => Some(envelope),
        Err(e) => {
            warn!(error = %e, text = %text, "Failed to parse incoming frame");
            None
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
