//! FIX protocol dictionaries for the FlexFIX engine.
//!
//! A dictionary is the schema of one protocol variant: fields, data types,
//! enumerations, component blocks and message layouts, plus the shared
//! header and trailer. The resolver turns reference-based dictionary
//! content into the resolved element trees the parser consumes, and the
//! version registry picks the right dictionary for a message from a few
//! header tags.
//!
//! Dictionaries can be built programmatically with [`DictionaryBuilder`] or
//! imported from XML, either the native format ([`Dictionary::from_xml_str`])
//! or QuickFIX-compatible files ([`Dictionary::from_quickfix_str`]).

mod dictionary;
pub mod quickfix;
mod resolver;
pub mod versions;
pub mod xml;

pub use dictionary::{
    BlockDef, BlockKind, BlockRef, DataTypeDef, Dictionary, DictionaryBuilder, ElementRef, Error,
    EnumerationDef, Enumerator, FieldDef, FieldRef, GroupRef, MessageDef, ValidationError,
};
pub use resolver::{ResolvedElement, ResolvedField, ResolvedGroup};
pub use versions::{Layer, MatchRule, VersionRecord, VersionRegistry, standard_records};
