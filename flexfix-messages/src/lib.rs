//! Dictionary-driven FIX message codec for the FlexFIX engine.
//!
//! Inbound, [`Parser`] turns raw bytes into [`flexfix_core::FixMessage`]
//! containers against the schemas in a
//! [`flexfix_dictionary::VersionRegistry`]. Outbound, [`serialize`] emits
//! the canonical wire form and [`finalize`] stamps `SendingTime(52)`,
//! `BodyLength(9)` and `CheckSum(10)`.

pub mod parser;
pub mod serializer;

pub use parser::{ParseResult, Parser, ParserStatus};
pub use serializer::{
    EncodingError, Serializer, body_length, checksum, finalize, finalize_at, serialize,
};
