//! Minimal acceptor: logs every inbound message and answers with a
//! Heartbeat.
//!
//! Run it and feed it FIX messages, e.g. with netcat:
//!
//! ```text
//! printf '8=FIX.4.4\x019=20\x0135=1\x01112=ping\x0110=123\x01' | nc 127.0.0.1 10050
//! ```

use std::sync::Arc;

use flexfix_core::FixMessage;
use flexfix_dictionary::{
    DictionaryBuilder, ElementRef, FieldDef, MessageDef, VersionRegistry,
};
use flexfix_session::{Acceptor, FixEvent, Sender, Settings, TcpConnection};
use tokio::{runtime::Builder, task::LocalSet};
use tracing::{error, info};

fn dictionary() -> Result<flexfix_dictionary::Dictionary, flexfix_dictionary::Error> {
    DictionaryBuilder::new()
        .property("Type", "FIX")
        .property("Fix.Major", "4")
        .property("Fix.Minor", "4")
        .field(FieldDef::new(8, "BeginString", "String"))
        .field(FieldDef::new(9, "BodyLength", "Length"))
        .field(FieldDef::new(35, "MsgType", "String"))
        .field(FieldDef::new(49, "SenderCompID", "String"))
        .field(FieldDef::new(56, "TargetCompID", "String"))
        .field(FieldDef::new(34, "MsgSeqNum", "SeqNum"))
        .field(FieldDef::new(52, "SendingTime", "UtcTimestamp"))
        .field(FieldDef::new(10, "CheckSum", "String"))
        .field(FieldDef::new(112, "TestReqID", "String"))
        .header(vec![
            ElementRef::field("BeginString", true),
            ElementRef::field("BodyLength", true),
            ElementRef::field("MsgType", true),
            ElementRef::field("SenderCompID", false),
            ElementRef::field("TargetCompID", false),
            ElementRef::field("MsgSeqNum", false),
            ElementRef::field("SendingTime", false),
        ])
        .trailer(vec![ElementRef::field("CheckSum", true)])
        .message(MessageDef::new(
            "Heartbeat",
            "0",
            vec![ElementRef::field("TestReqID", false)],
        ))
        .message(MessageDef::new(
            "TestRequest",
            "1",
            vec![ElementRef::field("TestReqID", true)],
        ))
        .build()
}

fn heartbeat(test_req_id: Option<&[u8]>) -> Box<FixMessage> {
    let mut msg = FixMessage::new();
    msg.header.push_field(8, b"FIX.4.4".as_slice());
    msg.header.push_field(9, b"0".as_slice());
    msg.header.push_field(35, b"0".as_slice());
    if let Some(test_req_id) = test_req_id {
        msg.body.push_field(112, test_req_id);
    }
    msg.trailer.push_field(10, b"000".as_slice());
    Box::new(msg)
}

async fn acceptor() {
    let settings = Settings {
        host: "127.0.0.1".parse().expect("invalid host"),
        port: 10050,
        session_version: None,
        application_version: None,
        default_application_version: None,
    };

    let mut registry = VersionRegistry::with_standard_records();
    registry.add_dictionary(
        "FIX.4.4",
        Arc::new(dictionary().expect("dictionary build failed")),
    );

    let (acceptor, mut events) = Acceptor::new(settings.clone(), Arc::new(registry));
    let connection = TcpConnection::new((settings.host, settings.port))
        .await
        .expect("failed to bind");
    acceptor.start(connection);

    let mut senders: Vec<(std::net::SocketAddr, Sender)> = Vec::new();
    while let Some(event) = events.recv().await {
        match event {
            FixEvent::Connected(peer, sender) => {
                info!("{peer} connected");
                senders.push((peer, sender));
            }
            FixEvent::Message(peer, msg) => {
                info!(
                    "{peer} sent {:?}",
                    msg.msg_type().map(String::from_utf8_lossy)
                );
                if let Some((_, sender)) = senders.iter().find(|(addr, _)| *addr == peer)
                    && sender
                        .send(heartbeat(msg.body.field_content(112)))
                        .is_err()
                {
                    error!("{peer} output queue closed");
                }
            }
            FixEvent::ParseError(peer, status) => error!("{peer} parse error: {status:?}"),
            FixEvent::Disconnected(peer, reason) => {
                info!("{peer} disconnected: {reason:?}");
                senders.retain(|(addr, _)| *addr != peer);
            }
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build runtime");
    LocalSet::new().block_on(&runtime, acceptor());
}
