//! Streaming, dictionary-driven FIX message parser.
//!
//! [`Parser::parse`] consumes a read buffer holding zero or more
//! concatenated messages and extracts at most one complete message,
//! reporting how many leading bytes belong to it. The caller owns the
//! buffer: on [`ParserStatus::Complete`] it discards `consumed` bytes and
//! calls again, on [`ParserStatus::Exhausted`] it waits for more input.
//!
//! Parsing is schema driven. The session-layer dictionary is identified
//! from the first header fields through the version registry, the body
//! schema comes from whichever dictionary defines the message's `MsgType`,
//! and repeating groups and length-coded data fields are decoded against
//! the resolved element trees. Resolved trees are memoised per dictionary
//! and scope behind a read-dominant lock, so steady-state parsing only
//! pays a map lookup.

use std::{
    collections::HashMap,
    str,
    sync::{Arc, RwLock},
};

use flexfix_core::{ElementList, FixMessage, Group, SOH, TagNum, tags};
use flexfix_dictionary::{
    Dictionary, Layer, ResolvedElement, ResolvedField, ResolvedGroup, VersionRegistry,
};
use memchr::memchr;
use tracing::{error, warn};

/// Classification of a parse attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParserStatus {
    /// Exactly one message produced; `consumed` bytes belong to it
    Complete,
    /// Input ran out before the message finished; retry with more bytes
    Exhausted,
    /// A new `BeginString(8)` appeared inside an unfinished message, the
    /// caller lost framing
    Incomplete,
    /// Structurally invalid input (non-integer tag, missing `=`)
    Malformed,
    /// No session-layer dictionary matched and no override was supplied
    UnknownSessionProtocol,
}

/// Result of one [`Parser::parse`] call.
///
/// `message` is populated only for [`ParserStatus::Complete`]; all other
/// statuses leave the buffer untouched (`consumed == 0`).
#[derive(Debug)]
pub struct ParseResult {
    pub consumed: usize,
    pub status: ParserStatus,
    pub message: Option<FixMessage>,
}

enum Halt {
    Exhausted,
    Incomplete,
    Malformed,
    UnknownSessionProtocol,
}

impl From<Halt> for ParserStatus {
    fn from(halt: Halt) -> ParserStatus {
        match halt {
            Halt::Exhausted => ParserStatus::Exhausted,
            Halt::Incomplete => ParserStatus::Incomplete,
            Halt::Malformed => ParserStatus::Malformed,
            Halt::UnknownSessionProtocol => ParserStatus::UnknownSessionProtocol,
        }
    }
}

/// Read position over the caller's buffer. The cursor only advances; a
/// failed parse leaves the caller's view untouched because the final
/// position is reported back solely on success.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Parses `tag=` at the current position without consuming it.
    /// Returns the tag and the index of the first value byte.
    fn peek_tag(&self) -> Result<(TagNum, usize), Halt> {
        let mut i = self.pos;
        let mut tag: TagNum = 0;
        let mut digits = 0usize;
        while i < self.buf.len() {
            match self.buf[i] {
                byte @ b'0'..=b'9' => {
                    tag = tag
                        .checked_mul(10)
                        .and_then(|tag| tag.checked_add(TagNum::from(byte - b'0')))
                        .ok_or(Halt::Malformed)?;
                    digits += 1;
                    i += 1;
                }
                b'=' => {
                    if digits == 0 || tag == 0 {
                        return Err(Halt::Malformed);
                    }
                    return Ok((tag, i + 1));
                }
                _ => return Err(Halt::Malformed),
            }
        }
        Err(Halt::Exhausted)
    }

    /// Consumes an SOH-terminated value starting at `value_start`.
    fn take_value(&mut self, value_start: usize) -> Result<&'a [u8], Halt> {
        match memchr(SOH, &self.buf[value_start..]) {
            Some(offset) => {
                let value = &self.buf[value_start..value_start + offset];
                self.pos = value_start + offset + 1;
                Ok(value)
            }
            None => Err(Halt::Exhausted),
        }
    }

    /// Consumes exactly `len` value bytes plus the trailing SOH. When the
    /// byte after the announced length is not SOH the length field lied,
    /// and reading falls back to SOH termination.
    fn take_value_exact(&mut self, value_start: usize, len: usize) -> Result<&'a [u8], Halt> {
        let end = value_start.checked_add(len).ok_or(Halt::Malformed)?;
        if end >= self.buf.len() {
            return Err(Halt::Exhausted);
        }
        if self.buf[end] == SOH {
            let value = &self.buf[value_start..end];
            self.pos = end + 1;
            Ok(value)
        } else {
            self.take_value(value_start)
        }
    }

    fn skip_soh(&mut self) {
        while self.pos < self.buf.len() && self.buf[self.pos] == SOH {
            self.pos += 1;
        }
    }
}

fn parse_count(content: &[u8]) -> Option<usize> {
    if content.is_empty() {
        return None;
    }
    str::from_utf8(content).ok()?.parse().ok()
}

/// Reads one field value, honouring length coding: when the field's length
/// field is already present in the current container with integer content,
/// exactly that many bytes are read and the value may contain SOH bytes.
/// Otherwise the value is SOH terminated.
fn read_field_value<'a>(
    cursor: &mut Cursor<'a>,
    field: &ResolvedField,
    container: &ElementList,
    value_start: usize,
) -> Result<&'a [u8], Halt> {
    if let Some(length_tag) = field.length_field_tag()
        && let Some(len) = container.field_content(length_tag).and_then(parse_count)
    {
        return cursor.take_value_exact(value_start, len);
    }
    cursor.take_value(value_start)
}

/// Resolved element set of one scope, keyed by tag.
type Scope = Arc<HashMap<TagNum, ResolvedElement>>;

#[derive(Clone, Eq, Hash, PartialEq)]
enum ScopeKey {
    Header,
    Trailer,
    Body(String),
}

/// Memoised resolved element sets, keyed by dictionary identity and scope.
/// Read-dominant: after warm-up every parse is a shared-lock map hit.
#[derive(Default)]
struct ScopeCache {
    inner: RwLock<HashMap<(usize, ScopeKey), Scope>>,
}

impl ScopeCache {
    fn get(&self, dictionary: &Arc<Dictionary>, key: ScopeKey) -> Scope {
        let cache_key = (Arc::as_ptr(dictionary) as usize, key);
        {
            let cache = self
                .inner
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(scope) = cache.get(&cache_key) {
                return scope.clone();
            }
        }

        let refs = match &cache_key.1 {
            ScopeKey::Header => dictionary.header(),
            ScopeKey::Trailer => dictionary.trailer(),
            ScopeKey::Body(msg_type) => dictionary
                .message_by_type(msg_type)
                .map(|message| message.elements())
                .unwrap_or_default(),
        };
        let resolved = dictionary.resolve(refs).unwrap_or_else(|err| {
            // Validated dictionaries cannot fail here; an unvalidated one
            // degrades to an empty scope instead of poisoning the session.
            error!("dictionary resolution failed: {err}");
            Vec::new()
        });
        let scope: Scope = Arc::new(
            resolved
                .into_iter()
                .map(|element| (element.tag(), element))
                .collect(),
        );

        let mut cache = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        cache.entry(cache_key).or_insert_with(|| scope.clone());
        scope
    }
}

/// Dictionary-driven streaming parser.
///
/// Stateless between calls apart from the resolved-scope cache, so one
/// parser instance can serve any number of independent buffers.
pub struct Parser {
    registry: Arc<VersionRegistry>,
    scopes: ScopeCache,
}

impl Parser {
    pub fn new(registry: Arc<VersionRegistry>) -> Parser {
        Parser {
            registry,
            scopes: ScopeCache::default(),
        }
    }

    pub fn registry(&self) -> &Arc<VersionRegistry> {
        &self.registry
    }

    /// Extracts at most one message from the start of `buf`.
    ///
    /// `sx_override` forces the session-layer dictionary, bypassing the
    /// version matcher. `ax_override` forces the application-layer
    /// dictionary; `ax_default` is used when no application-layer or
    /// combined-layer version matches. All three name version records in
    /// the registry.
    pub fn parse(
        &self,
        buf: &[u8],
        sx_override: Option<&str>,
        ax_override: Option<&str>,
        ax_default: Option<&str>,
    ) -> ParseResult {
        match self.parse_message(buf, sx_override, ax_override, ax_default) {
            Ok((consumed, message)) => ParseResult {
                consumed,
                status: ParserStatus::Complete,
                message: Some(message),
            },
            Err(halt) => ParseResult {
                consumed: 0,
                status: halt.into(),
                message: None,
            },
        }
    }

    fn parse_message(
        &self,
        buf: &[u8],
        sx_override: Option<&str>,
        ax_override: Option<&str>,
        ax_default: Option<&str>,
    ) -> Result<(usize, FixMessage), Halt> {
        let mut cursor = Cursor { buf, pos: 0 };
        let mut message = FixMessage::new();

        // ------------------------------------------------------------------
        // Header phase. Fields are appended as read; once the session-layer
        // dictionary is identified, the first tag outside the resolved
        // header set ends the phase. The header does not admit user-defined
        // fields.
        let mut session_dictionary: Option<Arc<Dictionary>> = match sx_override {
            Some(version_name) => Some(
                self.registry
                    .dictionary_for_version(version_name)
                    .cloned()
                    .ok_or(Halt::UnknownSessionProtocol)?,
            ),
            None => None,
        };
        let mut header_scope = session_dictionary
            .as_ref()
            .map(|dictionary| self.scopes.get(dictionary, ScopeKey::Header));

        loop {
            let (tag, value_start) = cursor.peek_tag()?;
            if tag == tags::BEGIN_STRING && message.header.contains(tags::BEGIN_STRING) {
                return Err(Halt::Incomplete);
            }

            match header_scope.as_ref().map(|scope| scope.get(&tag)) {
                // Dictionary identified and the tag left the header set.
                Some(None) => break,
                Some(Some(ResolvedElement::Group(group))) => {
                    let group = group.clone();
                    let count = cursor.take_value(value_start)?.to_vec();
                    let element = self.parse_group(&mut cursor, &group, &count, true)?;
                    message.header.push_group(element);
                }
                Some(Some(ResolvedElement::Field(field))) => {
                    let field = field.clone();
                    let value =
                        read_field_value(&mut cursor, &field, &message.header, value_start)?;
                    message.header.push_field(tag, value);
                }
                // No dictionary yet; collect the field as-is.
                None => {
                    let value = cursor.take_value(value_start)?;
                    message.header.push_field(tag, value);
                }
            }

            if session_dictionary.is_none() {
                let record = self
                    .registry
                    .get_version(&message.header, Layer::Session)
                    .or_else(|| self.registry.get_version(&message.header, Layer::Combined));
                match record {
                    Some(record) => match self.registry.dictionary_for(record) {
                        Some(dictionary) => {
                            let dictionary = dictionary.clone();
                            header_scope = Some(self.scopes.get(&dictionary, ScopeKey::Header));
                            session_dictionary = Some(dictionary);
                        }
                        None => {
                            warn!(
                                version = record.name(),
                                "matched version has no registered dictionary"
                            );
                            return Err(Halt::UnknownSessionProtocol);
                        }
                    },
                    // Give the matcher every tag up to MsgType before
                    // declaring the session protocol unknown.
                    None if tag == tags::MSG_TYPE => return Err(Halt::UnknownSessionProtocol),
                    None => {}
                }
            }
        }

        let Some(session_dictionary) = session_dictionary else {
            return Err(Halt::UnknownSessionProtocol);
        };

        // ------------------------------------------------------------------
        // Dispatch. The session dictionary wins when it defines the type;
        // otherwise the application-layer dictionary is selected via
        // override, matcher and default, in that order.
        let msg_type = match message.msg_type() {
            Some(content) => String::from_utf8_lossy(content).into_owned(),
            None => return Err(Halt::Malformed),
        };
        let trailer_scope = self.scopes.get(&session_dictionary, ScopeKey::Trailer);
        let body_scope = if session_dictionary.message_by_type(&msg_type).is_some() {
            self.scopes
                .get(&session_dictionary, ScopeKey::Body(msg_type))
        } else {
            let application_dictionary = ax_override
                .and_then(|version_name| self.registry.dictionary_for_version(version_name))
                .or_else(|| {
                    self.registry
                        .get_version(&message.header, Layer::Application)
                        .and_then(|record| self.registry.dictionary_for(record))
                })
                .or_else(|| {
                    self.registry
                        .get_version(&message.header, Layer::Combined)
                        .and_then(|record| self.registry.dictionary_for(record))
                })
                .or_else(|| {
                    ax_default
                        .and_then(|version_name| self.registry.dictionary_for_version(version_name))
                });
            match application_dictionary {
                Some(dictionary) => {
                    let dictionary = dictionary.clone();
                    self.scopes.get(&dictionary, ScopeKey::Body(msg_type))
                }
                // Unknown message type: the body is collected as
                // user-defined fields until a trailer tag appears.
                None => Arc::new(HashMap::new()),
            }
        };

        // ------------------------------------------------------------------
        // Body phase.
        loop {
            let (tag, value_start) = cursor.peek_tag()?;
            if tag == tags::BEGIN_STRING && message.header.contains(tags::BEGIN_STRING) {
                return Err(Halt::Incomplete);
            }
            match body_scope.get(&tag) {
                Some(ResolvedElement::Field(field)) => {
                    let value = read_field_value(&mut cursor, field, &message.body, value_start)?;
                    message.body.push_field(tag, value);
                }
                Some(ResolvedElement::Group(group)) => {
                    let count = cursor.take_value(value_start)?.to_vec();
                    let element = self.parse_group(&mut cursor, group, &count, true)?;
                    message.body.push_group(element);
                }
                None => {
                    if trailer_scope.contains_key(&tag) || tag == tags::CHECK_SUM {
                        break;
                    }
                    // Not in the schema, not a trailer tag: user-defined
                    // field.
                    let value = cursor.take_value(value_start)?;
                    message.body.push_field(tag, value);
                }
            }
        }

        // ------------------------------------------------------------------
        // Trailer phase, terminated by CheckSum(10).
        loop {
            let (tag, value_start) = cursor.peek_tag()?;
            if tag == tags::BEGIN_STRING && message.header.contains(tags::BEGIN_STRING) {
                return Err(Halt::Incomplete);
            }
            match trailer_scope.get(&tag) {
                Some(ResolvedElement::Group(group)) => {
                    let count = cursor.take_value(value_start)?.to_vec();
                    let element = self.parse_group(&mut cursor, group, &count, true)?;
                    message.trailer.push_group(element);
                }
                Some(ResolvedElement::Field(field)) => {
                    let value =
                        read_field_value(&mut cursor, field, &message.trailer, value_start)?;
                    message.trailer.push_field(tag, value);
                }
                None => {
                    let value = cursor.take_value(value_start)?;
                    message.trailer.push_field(tag, value);
                }
            }
            if tag == tags::CHECK_SUM {
                return Ok((cursor.pos, message));
            }
        }
    }

    /// Parses up to `count` group instances. The first element of the
    /// group's resolved body is the delimiter; its tag opens every
    /// instance. A non-integer or empty count yields a group with the
    /// literal content and zero instances.
    fn parse_group(
        &self,
        cursor: &mut Cursor<'_>,
        group: &ResolvedGroup,
        count_content: &[u8],
        begin_string_seen: bool,
    ) -> Result<Group, Halt> {
        let mut result = Group::new(group.tag(), count_content);
        let Some(count) = parse_count(count_content) else {
            return Ok(result);
        };

        let delimiter = group.delimiter();
        for _ in 0..count {
            cursor.skip_soh();
            let (tag, _) = cursor.peek_tag()?;
            if tag == tags::BEGIN_STRING && begin_string_seen {
                return Err(Halt::Incomplete);
            }
            if tag != delimiter {
                // Short count; downstream validation may flag it.
                break;
            }
            let instance = self.parse_instance(cursor, group, begin_string_seen)?;
            result.add_instance(instance);
        }
        Ok(result)
    }

    fn parse_instance(
        &self,
        cursor: &mut Cursor<'_>,
        group: &ResolvedGroup,
        begin_string_seen: bool,
    ) -> Result<ElementList, Halt> {
        let mut instance = ElementList::new();
        loop {
            cursor.skip_soh();
            let (tag, value_start) = cursor.peek_tag()?;
            if tag == tags::BEGIN_STRING && begin_string_seen {
                return Err(Halt::Incomplete);
            }
            if tag == group.delimiter() && !instance.is_empty() {
                // Start of the next instance.
                break;
            }
            let Some(element) = group.find(tag) else {
                // Tag outside the group schema ends the whole group.
                break;
            };
            if instance.contains(tag) {
                // Only the delimiter may repeat, and that opens a new
                // instance instead.
                return Err(Halt::Malformed);
            }
            match element {
                ResolvedElement::Field(field) => {
                    let value = read_field_value(cursor, field, &instance, value_start)?;
                    instance.push_field(tag, value);
                }
                ResolvedElement::Group(nested) => {
                    let count = cursor.take_value(value_start)?.to_vec();
                    let nested_group = self.parse_group(cursor, nested, &count, begin_string_seen)?;
                    instance.push_group(nested_group);
                }
            }
        }
        Ok(instance)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use flexfix_dictionary::{DictionaryBuilder, ElementRef, FieldDef, MessageDef, VersionRegistry};

    use super::*;

    fn registry() -> Arc<VersionRegistry> {
        let dictionary = DictionaryBuilder::new()
            .property("Type", "FIX")
            .property("Fix.Major", "4")
            .property("Fix.Minor", "4")
            .field(FieldDef::new(8, "BeginString", "String"))
            .field(FieldDef::new(9, "BodyLength", "Length"))
            .field(FieldDef::new(35, "MsgType", "String"))
            .field(FieldDef::new(10, "CheckSum", "String"))
            .field(FieldDef::new(112, "TestReqID", "String"))
            .header(vec![
                ElementRef::field("BeginString", true),
                ElementRef::field("BodyLength", true),
                ElementRef::field("MsgType", true),
            ])
            .trailer(vec![ElementRef::field("CheckSum", true)])
            .message(MessageDef::new(
                "TestRequest",
                "1",
                vec![ElementRef::field("TestReqID", true)],
            ))
            .build()
            .unwrap();

        let mut registry = VersionRegistry::with_standard_records();
        registry.add_dictionary("FIX.4.4", Arc::new(dictionary));
        Arc::new(registry)
    }

    fn wire(msg: &str) -> Vec<u8> {
        msg.replace('|', "\x01").into_bytes()
    }

    #[test]
    fn parse_minimal_message() {
        let parser = Parser::new(registry());
        let buf = wire("8=FIX.4.4|9=20|35=1|112=ping|10=123|");
        let result = parser.parse(&buf, None, None, None);

        assert_eq!(result.status, ParserStatus::Complete);
        assert_eq!(result.consumed, buf.len());
        let message = result.message.unwrap();
        assert_eq!(message.msg_type(), Some(b"1".as_slice()));
        assert_eq!(message.body.field_content(112), Some(b"ping".as_slice()));
        assert_eq!(message.trailer.field_content(10), Some(b"123".as_slice()));
    }

    #[test]
    fn malformed_tag_reported() {
        let parser = Parser::new(registry());
        let buf = wire("8=FIX.4.4|x=1|10=000|");
        let result = parser.parse(&buf, None, None, None);
        assert_eq!(result.status, ParserStatus::Malformed);
        assert_eq!(result.consumed, 0);
        assert!(result.message.is_none());
    }

    #[test]
    fn zero_tag_is_malformed() {
        let parser = Parser::new(registry());
        let buf = wire("8=FIX.4.4|0=1|10=000|");
        let result = parser.parse(&buf, None, None, None);
        assert_eq!(result.status, ParserStatus::Malformed);
    }

    #[test]
    fn truncated_input_is_exhausted() {
        let parser = Parser::new(registry());
        let buf = wire("8=FIX.4.4|9=20|35=1|112=pi");
        let result = parser.parse(&buf, None, None, None);
        assert_eq!(result.status, ParserStatus::Exhausted);
        assert_eq!(result.consumed, 0);
    }

    #[test]
    fn unknown_protocol_without_override() {
        let parser = Parser::new(registry());
        let buf = wire("8=FOO.9.9|9=20|35=1|112=ping|10=123|");
        let result = parser.parse(&buf, None, None, None);
        assert_eq!(result.status, ParserStatus::UnknownSessionProtocol);
    }

    #[test]
    fn session_override_skips_matching() {
        let parser = Parser::new(registry());
        let buf = wire("8=FOO.9.9|9=20|35=1|112=ping|10=123|");
        let result = parser.parse(&buf, Some("FIX.4.4"), None, None);
        assert_eq!(result.status, ParserStatus::Complete);
        assert_matches!(result.message, Some(_));
    }

    #[test]
    fn resolved_scopes_are_cached() {
        let parser = Parser::new(registry());
        let buf = wire("8=FIX.4.4|9=20|35=1|112=ping|10=123|");
        assert_eq!(
            parser.parse(&buf, None, None, None).status,
            ParserStatus::Complete
        );
        assert_eq!(
            parser.parse(&buf, None, None, None).status,
            ParserStatus::Complete
        );

        let cache = parser
            .scopes
            .inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Header, trailer and one body scope, resolved once each.
        assert_eq!(cache.len(), 3);
    }
}
