//! Asynchronous TCP service layer of the FlexFIX engine.
//!
//! This crate runs client ([`Initiator`]) and server ([`Acceptor`]) FIX
//! connections on top of tokio. Inbound bytes are framed and decoded by
//! the dictionary-driven parser, outbound messages are finalized and
//! serialized on their way to the socket. Session-level protocol logic
//! (logon sequencing, heartbeats, resend handling) is left to the
//! application consuming the [`FixEvent`] stream.

pub mod acceptor;
pub mod codec;
pub mod initiator;
pub mod io;
pub mod settings;

use std::net::SocketAddr;

use flexfix_core::FixMessage;
use flexfix_messages::ParserStatus;
use tokio::sync::mpsc;
use tracing::error;

pub use acceptor::{Acceptor, Connection, TcpConnection};
pub use initiator::Initiator;
pub use settings::Settings;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoding error: {0}")]
    Encoding(#[from] flexfix_messages::EncodingError),
}

/// Disconnection reasons.
#[derive(Clone, Copy, Debug)]
pub enum DisconnectReason {
    /// Disconnect requested locally
    LocalRequestedDisconnect,
    /// Remote side closed the connection
    RemoteDisconnected,
    /// I/O error on the socket
    IoError,
}

#[derive(Debug)]
pub(crate) enum SenderMsg {
    Message(Box<FixMessage>),
    Disconnect(DisconnectReason),
}

/// Handle for queueing outbound messages on one connection.
///
/// Messages are finalized before hitting the wire: `SendingTime(52)`,
/// `BodyLength(9)` and `CheckSum(10)` are computed during encoding, so
/// callers may leave them unset or stale.
#[derive(Clone, Debug)]
pub struct Sender {
    inner: mpsc::UnboundedSender<SenderMsg>,
}

impl Sender {
    pub(crate) fn new(inner: mpsc::UnboundedSender<SenderMsg>) -> Sender {
        Sender { inner }
    }

    /// Queues a message for sending. Returns the message when the
    /// connection's output queue is already closed.
    pub fn send(&self, msg: Box<FixMessage>) -> Result<(), Box<FixMessage>> {
        if let Err(rejected) = self.inner.send(SenderMsg::Message(msg)) {
            match rejected.0 {
                SenderMsg::Message(msg) => {
                    error!("failed to queue outbound message, receiver closed or dropped");
                    Err(msg)
                }
                SenderMsg::Disconnect(_) => unreachable!(),
            }
        } else {
            Ok(())
        }
    }

    /// Closes the output queue; no more messages can be sent after this.
    pub fn disconnect(&self, reason: DisconnectReason) {
        if self.inner.send(SenderMsg::Disconnect(reason)).is_err() {
            error!("failed to disconnect, receiver closed or dropped");
        }
    }
}

/// Events a connection delivers to the application.
#[derive(Debug)]
pub enum FixEvent {
    /// A connection was established; the sender queues outbound messages
    Connected(SocketAddr, Sender),
    /// A complete message arrived
    Message(SocketAddr, Box<FixMessage>),
    /// Framing was lost or the message was malformed; bytes up to the next
    /// plausible message start were discarded
    ParseError(SocketAddr, ParserStatus),
    /// The connection ended
    Disconnected(SocketAddr, DisconnectReason),
}
