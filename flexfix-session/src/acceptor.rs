//! Server side of the service layer: accepts TCP connections and runs one
//! connection task per peer.

use std::{io, net::SocketAddr, sync::Arc};

use flexfix_dictionary::VersionRegistry;
use flexfix_messages::Parser;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpListener,
    sync::mpsc,
    task::JoinHandle,
};
use tracing::{Instrument, error, info, info_span};

use crate::{FixEvent, Settings, io::run_connection};

/// Source of inbound connections. Implemented by [`TcpConnection`]; tests
/// and embeddings can provide in-memory transports.
#[allow(async_fn_in_trait)]
pub trait Connection {
    async fn accept(
        &mut self,
    ) -> Result<
        (
            impl AsyncRead + Unpin + 'static,
            impl AsyncWrite + Unpin + 'static,
            SocketAddr,
        ),
        io::Error,
    >;
}

pub struct TcpConnection {
    listener: TcpListener,
}

impl TcpConnection {
    pub async fn new(socket_addr: impl Into<SocketAddr>) -> Result<TcpConnection, io::Error> {
        let socket_addr = socket_addr.into();
        let listener = TcpListener::bind(&socket_addr).await?;
        Ok(TcpConnection { listener })
    }
}

impl Connection for TcpConnection {
    async fn accept(
        &mut self,
    ) -> Result<
        (
            impl AsyncRead + Unpin + 'static,
            impl AsyncWrite + Unpin + 'static,
            SocketAddr,
        ),
        io::Error,
    > {
        let (tcp_stream, peer_addr) = self.listener.accept().await?;
        tcp_stream.set_nodelay(true)?;
        let (reader, writer) = tcp_stream.into_split();
        Ok((reader, writer, peer_addr))
    }
}

/// FIX server endpoint.
///
/// Accepted connections share one parser (and so one resolved-schema
/// cache) and deliver their [`FixEvent`]s to the receiver returned from
/// [`Acceptor::new`].
pub struct Acceptor {
    settings: Settings,
    parser: Arc<Parser>,
    events: mpsc::UnboundedSender<FixEvent>,
}

impl Acceptor {
    pub fn new(
        settings: Settings,
        registry: Arc<VersionRegistry>,
    ) -> (Acceptor, mpsc::UnboundedReceiver<FixEvent>) {
        let (events, event_stream) = mpsc::unbounded_channel();
        let acceptor = Acceptor {
            settings,
            parser: Arc::new(Parser::new(registry)),
            events,
        };
        (acceptor, event_stream)
    }

    /// Spawns the accept loop on the current local task set.
    pub fn start(&self, connection: impl Connection + 'static) -> JoinHandle<()> {
        tokio::task::spawn_local(Self::server_task(
            connection,
            self.settings.clone(),
            self.parser.clone(),
            self.events.clone(),
        ))
    }

    async fn server_task(
        mut connection: impl Connection,
        settings: Settings,
        parser: Arc<Parser>,
        events: mpsc::UnboundedSender<FixEvent>,
    ) {
        info!("Acceptor started");
        loop {
            match connection.accept().await {
                Ok((reader, writer, peer_addr)) => {
                    let span = info_span!("connection", %peer_addr);
                    span.in_scope(|| info!("New connection"));
                    tokio::task::spawn_local(
                        run_connection(
                            reader,
                            writer,
                            peer_addr,
                            parser.clone(),
                            settings.parse_options(),
                            events.clone(),
                        )
                        .instrument(span),
                    );
                }
                Err(err) => error!("server task failed to accept incoming connection: {err}"),
            }
        }
    }
}
