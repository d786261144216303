//! Core types of the FlexFIX engine.
//!
//! This crate defines the wire-level element model shared by the codec and
//! the session layer:
//! - [`Element`] - a single tag=value field or a repeating group
//! - [`ElementList`] - an ordered element sequence with tag-indexed lookup
//! - [`FixMessage`] - header, body and trailer sections of one FIX message

mod element;
mod message;
pub mod tags;

pub use element::{Element, Field, Group};
pub use message::{ElementList, FixMessage};

/// FIX tag number. Tags are unsigned decimal integers in ASCII on the wire.
pub type TagNum = u32;

/// Value of a `BodyLength(9)`-style length field.
pub type Length = u32;

/// The FIX field terminator, byte 0x01.
pub const SOH: u8 = 0x01;
