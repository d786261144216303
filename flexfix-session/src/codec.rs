//! tokio-util codec adapters around the message codec.

use std::{io, sync::Arc};

use bytes::BytesMut;
use flexfix_core::FixMessage;
use flexfix_messages::{EncodingError, Parser, ParserStatus, finalize, serialize};
use memchr::memchr;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, error, info};

/// Version overrides and defaults handed to every parse call.
#[derive(Clone, Debug, Default)]
pub struct ParseOptions {
    /// Version record forced as the session-layer dictionary
    pub session_version: Option<String>,
    /// Version record forced as the application-layer dictionary
    pub application_version: Option<String>,
    /// Version record used when no application-layer version matches
    pub default_application_version: Option<String>,
}

/// Discards bytes up to the next plausible message start.
///
/// Called after the parser reported lost framing or malformed input. The
/// next candidate is a `8` followed by `=`, or a `8` ending the buffer
/// (the rest of its `BeginString` field may still be in flight); anything
/// before it is unrecoverable. Without a candidate the whole buffer is
/// garbage.
pub(crate) fn drop_broken_bytes(buf: &mut BytesMut) {
    // Start behind the first byte so a broken message that itself begins
    // with "8=" is not handed back to the parser unchanged.
    let mut search_from = 1;
    while let Some(offset) = buf.get(search_from..).and_then(|tail| memchr(b'8', tail)) {
        let candidate = search_from + offset;
        if candidate + 1 == buf.len() || buf[candidate + 1] == b'=' {
            buf.split_to(candidate).freeze();
            info!("dropped {candidate} bytes of broken input");
            return;
        }
        search_from = candidate + 1;
    }
    let dropped = buf.len();
    buf.clear();
    info!("dropped {dropped} bytes of broken input");
}

/// Frames and decodes inbound FIX messages.
///
/// On a complete message the consumed bytes are split off the buffer; on
/// exhausted input the buffer is kept for the next read; on any other
/// parser status the broken prefix is discarded and the status is
/// surfaced as an item so the session can react.
pub struct FixDecoder {
    parser: Arc<Parser>,
    options: ParseOptions,
}

impl FixDecoder {
    pub fn new(parser: Arc<Parser>, options: ParseOptions) -> FixDecoder {
        FixDecoder { parser, options }
    }
}

impl Decoder for FixDecoder {
    type Error = io::Error;
    type Item = Result<Box<FixMessage>, ParserStatus>;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        debug!(
            "Raw data input :: {}",
            String::from_utf8_lossy(src).replace('\x01', "|")
        );

        let result = self.parser.parse(
            src,
            self.options.session_version.as_deref(),
            self.options.application_version.as_deref(),
            self.options.default_application_version.as_deref(),
        );
        match result.status {
            ParserStatus::Complete => {
                src.split_to(result.consumed).freeze();
                match result.message {
                    Some(message) => Ok(Some(Ok(Box::new(message)))),
                    None => Ok(None),
                }
            }
            ParserStatus::Exhausted => Ok(None),
            status => {
                error!("error decoding message: {status:?}");
                drop_broken_bytes(src);
                Ok(Some(Err(status)))
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum FixEncoderError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),
}

/// Finalizes and serializes outbound FIX messages.
#[derive(Debug, Default)]
pub struct FixEncoder {}

impl FixEncoder {
    pub fn new() -> FixEncoder {
        FixEncoder {}
    }
}

impl Encoder<Box<FixMessage>> for FixEncoder {
    type Error = FixEncoderError;

    fn encode(
        &mut self,
        mut message: Box<FixMessage>,
        dst: &mut BytesMut,
    ) -> Result<(), Self::Error> {
        finalize(&mut message)?;
        let buffer = serialize(&message);
        dst.extend_from_slice(&buffer);
        debug!(
            "Encoded raw data: {}",
            String::from_utf8_lossy(&buffer).replace('\x01', "|")
        );
        Ok(())
    }
}
