//! Client side of the service layer: connects to a FIX counterparty and
//! runs the connection task.

use std::{net::SocketAddr, sync::Arc};

use flexfix_dictionary::VersionRegistry;
use flexfix_messages::Parser;
use tokio::{net::TcpStream, sync::mpsc};
use tracing::{Instrument, info, info_span};

use crate::{Error, FixEvent, Settings, io::run_connection};

/// FIX client endpoint.
pub struct Initiator {
    settings: Settings,
    parser: Arc<Parser>,
    events: mpsc::UnboundedSender<FixEvent>,
}

impl Initiator {
    pub fn new(
        settings: Settings,
        registry: Arc<VersionRegistry>,
    ) -> (Initiator, mpsc::UnboundedReceiver<FixEvent>) {
        let (events, event_stream) = mpsc::unbounded_channel();
        let initiator = Initiator {
            settings,
            parser: Arc::new(Parser::new(registry)),
            events,
        };
        (initiator, event_stream)
    }

    /// Connects to the configured endpoint and spawns the connection task
    /// on the current local task set.
    pub async fn connect(&self) -> Result<(), Error> {
        info!("Initiator started");

        let addr = SocketAddr::from((self.settings.host, self.settings.port));
        let tcp_stream = TcpStream::connect(addr).await?;
        tcp_stream.set_nodelay(true)?;
        let (reader, writer) = tcp_stream.into_split();

        let span = info_span!("connection", %addr);
        let connection = run_connection(
            reader,
            writer,
            addr,
            self.parser.clone(),
            self.settings.parse_options(),
            self.events.clone(),
        );
        tokio::task::spawn_local(async move {
            connection.await;
            info!("Connection closed");
        }
        .instrument(span));
        Ok(())
    }
}
