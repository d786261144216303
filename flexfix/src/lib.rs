//! FlexFIX - a dictionary-driven FIX protocol engine.
//!
//! The engine parses and serializes tag=value FIX messages against
//! runtime dictionaries instead of generated code: a
//! [`dictionary::Dictionary`] describes one protocol variant, a
//! [`dictionary::VersionRegistry`] picks the right variant for each
//! message from its header, and [`messages::Parser`] decodes byte
//! streams into [`FixMessage`] containers. The optional `session`
//! feature adds a tokio-based TCP service layer.
//!
//! ```
//! use std::sync::Arc;
//!
//! use flexfix::{
//!     dictionary::{DictionaryBuilder, ElementRef, FieldDef, MessageDef, VersionRegistry},
//!     messages::{Parser, ParserStatus},
//! };
//!
//! let dictionary = DictionaryBuilder::new()
//!     .property("Type", "FIX")
//!     .property("Fix.Major", "4")
//!     .property("Fix.Minor", "4")
//!     .field(FieldDef::new(8, "BeginString", "String"))
//!     .field(FieldDef::new(9, "BodyLength", "Length"))
//!     .field(FieldDef::new(35, "MsgType", "String"))
//!     .field(FieldDef::new(10, "CheckSum", "String"))
//!     .field(FieldDef::new(112, "TestReqID", "String"))
//!     .header(vec![
//!         ElementRef::field("BeginString", true),
//!         ElementRef::field("BodyLength", true),
//!         ElementRef::field("MsgType", true),
//!     ])
//!     .trailer(vec![ElementRef::field("CheckSum", true)])
//!     .message(MessageDef::new(
//!         "TestRequest",
//!         "1",
//!         vec![ElementRef::field("TestReqID", true)],
//!     ))
//!     .build()
//!     .unwrap();
//!
//! let mut registry = VersionRegistry::with_standard_records();
//! registry.add_dictionary("FIX.4.4", Arc::new(dictionary));
//!
//! let parser = Parser::new(Arc::new(registry));
//! let buf = b"8=FIX.4.4\x019=20\x0135=1\x01112=ping\x0110=123\x01";
//! let result = parser.parse(buf, None, None, None);
//! assert_eq!(result.status, ParserStatus::Complete);
//! assert_eq!(result.consumed, buf.len());
//! ```

pub use flexfix_core::{Element, ElementList, Field, FixMessage, Group, Length, SOH, TagNum, tags};

pub mod dictionary {
    pub use flexfix_dictionary::*;
}

pub mod messages {
    pub use flexfix_messages::*;
}

#[cfg(feature = "session")]
pub mod session {
    pub use flexfix_session::*;
}
