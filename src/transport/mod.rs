//! Persistent duplex connection to the dialogue service
//!
//! A [`Channel`] owns at most one live connection. Outbound text goes through a
//! single writer task, so frames leave in the order `send` was called. A reader
//! task reassembles fragments and reports each complete message as a
//! [`ChannelEvent::MessageReceived`]. Status changes are reported on the same
//! event queue; nothing here reconnects on its own.

mod reassembly;
mod ws;

use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub use reassembly::{DEFAULT_MAX_MESSAGE_SIZE, Reassembler};
pub use ws::WsConnector;

use crate::protocol::Envelope;
use crate::{Error, Result};

/// How long the writer waits for the close handshake
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Closing => "Closing",
        })
    }
}

/// Piece of an inbound message as delivered by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Payload bytes; `fin` marks the last fragment of a message
    Data { bytes: Vec<u8>, fin: bool },
    /// Peer started the close handshake
    Close,
}

/// Notification emitted by a [`Channel`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Human-readable progress text
    Progress(String),
    /// Handshake succeeded
    Connected,
    /// Handshake failed
    Failed(String),
    /// Connection released
    Disconnected,
    /// One complete inbound text message
    MessageReceived(String),
    /// An outbound frame could not be written
    SendFailed(String),
}

/// Outbound half of a connection
pub type TextSink = Pin<Box<dyn Sink<String, Error = Error> + Send>>;

/// Inbound half of a connection
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<Fragment>> + Send>>;

/// An established connection
pub struct Connection {
    pub sink: TextSink,
    pub stream: FragmentStream,
}

/// Opens connections for a [`Channel`]
#[async_trait]
pub trait Connector: Send + Sync {
    /// Perform the handshake with `address`
    async fn connect(&self, address: &str) -> Result<Connection>;
}

struct Link {
    state: ConnectionState,
    /// Bumped on every connect so stale tasks cannot close a newer connection
    epoch: u64,
    outbound: Option<mpsc::UnboundedSender<String>>,
    reader: Option<JoinHandle<()>>,
}

struct Shared {
    link: Mutex<Link>,
    events: mpsc::UnboundedSender<ChannelEvent>,
}

impl Shared {
    fn link(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: ChannelEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("channel event receiver dropped");
        }
    }

    /// Tear down the connection for `epoch`, if it is still the current one
    fn shutdown(&self, epoch: Option<u64>, abort_reader: bool) {
        let mut link = self.link();
        if matches!(link.state, ConnectionState::Disconnected | ConnectionState::Closing) {
            return;
        }
        if epoch.is_some_and(|e| e != link.epoch) {
            return;
        }

        link.state = ConnectionState::Closing;
        // Dropping the sender lets the writer drain and send a close frame
        link.outbound = None;
        let reader = link.reader.take();
        link.state = ConnectionState::Disconnected;
        drop(link);

        if let Some(reader) = reader.filter(|_| abort_reader) {
            reader.abort();
        }

        tracing::info!("connection closed");
        self.emit(ChannelEvent::Progress("connection closed".to_string()));
        self.emit(ChannelEvent::Disconnected);
    }
}

/// One persistent connection to the dialogue service
pub struct Channel {
    connector: Arc<dyn Connector>,
    shared: Arc<Shared>,
    max_message_size: usize,
}

impl Channel {
    /// Create a disconnected channel and the queue its events arrive on
    #[must_use]
    pub fn new(
        connector: Arc<dyn Connector>,
        max_message_size: usize,
    ) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            link: Mutex::new(Link {
                state: ConnectionState::Disconnected,
                epoch: 0,
                outbound: None,
                reader: None,
            }),
            events,
        });

        (
            Self {
                connector,
                shared,
                max_message_size,
            },
            rx,
        )
    }

    /// Current connection state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.link().state
    }

    /// Open the connection
    ///
    /// Progress, success and failure are also reported as events.
    ///
    /// # Errors
    ///
    /// Returns error if a connection is already open or in progress, the
    /// handshake fails, or the channel was closed during the handshake
    pub async fn connect(&self, address: &str) -> Result<()> {
        let epoch = {
            let mut link = self.shared.link();
            if link.state != ConnectionState::Disconnected {
                tracing::warn!(state = %link.state, "connect ignored: channel busy");
                return Err(Error::Transport(format!(
                    "cannot connect while {}",
                    link.state
                )));
            }
            link.state = ConnectionState::Connecting;
            link.epoch += 1;
            link.epoch
        };

        tracing::info!(address, "connecting");
        self.shared
            .emit(ChannelEvent::Progress(format!("connecting to {address}")));

        let connection = match self.connector.connect(address).await {
            Ok(connection) => connection,
            Err(e) => {
                {
                    let mut link = self.shared.link();
                    if link.epoch == epoch && link.state == ConnectionState::Connecting {
                        link.state = ConnectionState::Disconnected;
                    }
                }
                tracing::error!(address, error = %e, "connection failed");
                self.shared
                    .emit(ChannelEvent::Progress(format!("connection failed: {e}")));
                self.shared.emit(ChannelEvent::Failed(e.to_string()));
                return Err(e);
            }
        };

        let mut link = self.shared.link();
        if link.epoch != epoch || link.state != ConnectionState::Connecting {
            return Err(Error::Transport("channel closed during handshake".to_string()));
        }

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        link.state = ConnectionState::Connected;
        link.outbound = Some(outbound);

        tracing::info!(address, "connected");
        self.shared.emit(ChannelEvent::Connected);
        self.shared.emit(ChannelEvent::Progress("connected".to_string()));

        tokio::spawn(write_loop(
            Arc::clone(&self.shared),
            epoch,
            connection.sink,
            outbound_rx,
        ));
        link.reader = Some(tokio::spawn(read_loop(
            Arc::clone(&self.shared),
            epoch,
            connection.stream,
            Reassembler::new(self.max_message_size),
        )));

        Ok(())
    }

    /// Queue an envelope for sending
    ///
    /// Never waits for the write; failures are logged and reported as
    /// [`ChannelEvent::SendFailed`].
    pub fn send(&self, envelope: &Envelope) {
        let text = match envelope.to_json() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(event = envelope.event(), error = %e, "failed to encode envelope");
                return;
            }
        };

        let link = self.shared.link();
        let queued = match (&link.outbound, link.state) {
            (Some(outbound), ConnectionState::Connected) => outbound.send(text).is_ok(),
            _ => false,
        };
        drop(link);

        if queued {
            tracing::debug!(event = envelope.event(), "queued envelope");
        } else {
            tracing::warn!(event = envelope.event(), "cannot send: not connected");
            self.shared
                .emit(ChannelEvent::SendFailed(format!("{} dropped: not connected", envelope.event())));
        }
    }

    /// Close the connection
    ///
    /// Safe to call repeatedly or concurrently; `Disconnected` is emitted once.
    pub fn close(&self) {
        self.shared.shutdown(None, true);
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.close();
    }
}

async fn write_loop(
    shared: Arc<Shared>,
    epoch: u64,
    mut sink: TextSink,
    mut outbound: mpsc::UnboundedReceiver<String>,
) {
    while let Some(text) = outbound.recv().await {
        let bytes = text.len();
        if let Err(e) = sink.send(text).await {
            tracing::warn!(error = %e, "send failed");
            shared.emit(ChannelEvent::SendFailed(e.to_string()));
            shared.shutdown(Some(epoch), true);
            return;
        }
        tracing::trace!(bytes, "frame sent");
    }

    match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
        Ok(Ok(())) => tracing::debug!("close handshake sent"),
        Ok(Err(e)) => tracing::debug!(error = %e, "close handshake failed"),
        Err(_) => tracing::debug!("close handshake timed out"),
    }
}

async fn read_loop(
    shared: Arc<Shared>,
    epoch: u64,
    mut stream: FragmentStream,
    mut reassembler: Reassembler,
) {
    while let Some(item) = stream.next().await {
        match item {
            Ok(Fragment::Data { bytes, fin }) => match reassembler.push(&bytes, fin) {
                Ok(Some(text)) => {
                    tracing::debug!(bytes = text.len(), "message received");
                    shared.emit(ChannelEvent::MessageReceived(text));
                }
                Ok(None) => {}
                Err(Error::Protocol(reason)) => {
                    tracing::warn!(%reason, "dropping inbound message");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "closing connection");
                    break;
                }
            },
            Ok(Fragment::Close) => {
                tracing::info!("peer closed the connection");
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, "receive failed");
                break;
            }
        }
    }

    shared.shutdown(Some(epoch), false);
}
