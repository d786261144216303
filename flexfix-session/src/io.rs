//! Connection byte pumps.
//!
//! [`input_stream`] frames and decodes the read half of a connection into
//! [`InputEvent`]s; [`output_loop`] drains a connection's outbound queue
//! through the encoder into the write half. [`run_connection`] wires both
//! to the application's event channel and lives for the duration of one
//! connection.

use std::{io, net::SocketAddr, sync::Arc};

use async_stream::stream;
use flexfix_core::FixMessage;
use flexfix_messages::{Parser, ParserStatus};
use futures::{SinkExt, Stream, StreamExt, pin_mut};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc,
};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, warn};

use crate::{
    DisconnectReason, FixEvent, Sender, SenderMsg,
    codec::{FixDecoder, FixEncoder, ParseOptions},
};

pub enum InputEvent {
    Message(Box<FixMessage>),
    ParseError(ParserStatus),
    IoError(io::Error),
}

/// Decodes the read half of a connection into an event stream. The stream
/// ends when the remote side closes the connection.
pub fn input_stream(
    source: impl AsyncRead + Unpin,
    parser: Arc<Parser>,
    options: ParseOptions,
) -> impl Stream<Item = InputEvent> {
    let framed = FramedRead::new(source, FixDecoder::new(parser, options));
    stream! {
        pin_mut!(framed);
        while let Some(item) = framed.next().await {
            match item {
                Ok(Ok(message)) => yield InputEvent::Message(message),
                Ok(Err(status)) => yield InputEvent::ParseError(status),
                Err(error) => {
                    yield InputEvent::IoError(error);
                    break;
                }
            }
        }
    }
}

/// Drains the outbound queue into the write half of a connection.
///
/// Ends on an explicit disconnect request, a closed queue or a write
/// error; returns the reason the connection should report.
pub(crate) async fn output_loop(
    writer: impl AsyncWrite + Unpin,
    mut queue: mpsc::UnboundedReceiver<SenderMsg>,
) -> DisconnectReason {
    let mut framed = FramedWrite::new(writer, FixEncoder::new());
    loop {
        match queue.recv().await {
            Some(SenderMsg::Message(message)) => {
                if let Err(error) = framed.send(message).await {
                    error!("failed to write outbound message: {error}");
                    return DisconnectReason::IoError;
                }
            }
            Some(SenderMsg::Disconnect(reason)) => {
                debug!("disconnect requested: {reason:?}");
                return reason;
            }
            None => return DisconnectReason::LocalRequestedDisconnect,
        }
    }
}

/// Runs one connection to completion, forwarding decoded messages and
/// parse errors to the application's event channel.
pub(crate) async fn run_connection(
    reader: impl AsyncRead + Unpin,
    writer: impl AsyncWrite + Unpin,
    peer: SocketAddr,
    parser: Arc<Parser>,
    options: ParseOptions,
    events: mpsc::UnboundedSender<FixEvent>,
) {
    let (queue_tx, queue_rx) = mpsc::unbounded_channel();
    let sender = Sender::new(queue_tx);
    if events.send(FixEvent::Connected(peer, sender)).is_err() {
        warn!("event receiver closed before connection start");
        return;
    }

    let input = input_stream(reader, parser, options);
    pin_mut!(input);
    let output = output_loop(writer, queue_rx);
    pin_mut!(output);

    let reason = loop {
        tokio::select! {
            event = input.next() => match event {
                Some(InputEvent::Message(message)) => {
                    if events.send(FixEvent::Message(peer, message)).is_err() {
                        break DisconnectReason::LocalRequestedDisconnect;
                    }
                }
                Some(InputEvent::ParseError(status)) => {
                    if events.send(FixEvent::ParseError(peer, status)).is_err() {
                        break DisconnectReason::LocalRequestedDisconnect;
                    }
                }
                Some(InputEvent::IoError(error)) => {
                    error!("connection I/O error: {error}");
                    break DisconnectReason::IoError;
                }
                None => {
                    info!("remote side closed the connection");
                    break DisconnectReason::RemoteDisconnected;
                }
            },
            reason = &mut output => break reason,
        }
    };

    if events.send(FixEvent::Disconnected(peer, reason)).is_err() {
        warn!("event receiver closed before disconnect notification");
    }
}
