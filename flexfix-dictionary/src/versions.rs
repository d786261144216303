//! Protocol version registry and matching.
//!
//! The registry maps version records to dictionaries and picks the record a
//! message belongs to from a handful of header tags. Versions 4.0-4.4 carry
//! session and application semantics in one dictionary (the `Combined`
//! layer); 5.0+ splits them into a FIXT session dictionary and a FIX 5.0+
//! application dictionary, so the matcher is consulted once per layer.

use std::{collections::HashMap, sync::Arc};

use flexfix_core::{ElementList, TagNum, tags};

use crate::dictionary::Dictionary;

/// Which layer of the protocol a version record describes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Layer {
    /// Session framing only (FIXT)
    Session,
    /// Application payload only (FIX 5.0+)
    Application,
    /// Session and application semantics in one dictionary (FIX 4.0-4.4)
    Combined,
}

/// One predicate of a version match specification.
///
/// A rule with content matches when the header carries the tag with exactly
/// that content; a rule without content matches on presence alone.
#[derive(Clone, Debug)]
pub struct MatchRule {
    tag: TagNum,
    content: Option<Vec<u8>>,
}

impl MatchRule {
    /// Rule satisfied when the tag is present with any value.
    pub fn present(tag: TagNum) -> MatchRule {
        MatchRule { tag, content: None }
    }

    /// Rule satisfied when the tag is present with exactly this content.
    pub fn equals(tag: TagNum, content: impl Into<Vec<u8>>) -> MatchRule {
        MatchRule {
            tag,
            content: Some(content.into()),
        }
    }

    pub fn tag(&self) -> TagNum {
        self.tag
    }

    pub fn content(&self) -> Option<&[u8]> {
        self.content.as_deref()
    }

    fn matches(&self, header: &ElementList) -> bool {
        match header.field_content(self.tag) {
            Some(content) => match &self.content {
                Some(expected) if !expected.is_empty() => content == expected.as_slice(),
                _ => true,
            },
            None => false,
        }
    }
}

/// A protocol version: a name, the layer it lives on, the dictionaries it
/// references (in preference order) and its match specification.
#[derive(Clone, Debug)]
pub struct VersionRecord {
    name: String,
    layer: Layer,
    dictionaries: Vec<String>,
    rules: Vec<MatchRule>,
}

impl VersionRecord {
    pub fn new(
        name: impl Into<String>,
        layer: Layer,
        dictionaries: Vec<String>,
        rules: Vec<MatchRule>,
    ) -> VersionRecord {
        VersionRecord {
            name: name.into(),
            layer,
            dictionaries,
            rules,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    pub fn dictionaries(&self) -> &[String] {
        &self.dictionaries
    }

    pub fn rules(&self) -> &[MatchRule] {
        &self.rules
    }

    fn matches(&self, header: &ElementList, layer: Layer) -> bool {
        self.layer == layer && self.rules.iter().all(|rule| rule.matches(header))
    }
}

/// Version records plus the dictionaries they refer to.
///
/// Records match in insertion order; dictionaries are registered by name
/// and shared as [`Arc`] handles.
#[derive(Debug, Default)]
pub struct VersionRegistry {
    records: Vec<VersionRecord>,
    dictionaries: HashMap<String, Arc<Dictionary>>,
}

impl VersionRegistry {
    pub fn new() -> VersionRegistry {
        VersionRegistry::default()
    }

    /// Registry pre-populated with the conventional records for the
    /// standard protocol versions, see [`standard_records`].
    pub fn with_standard_records() -> VersionRegistry {
        let mut registry = VersionRegistry::new();
        for record in standard_records() {
            registry.add_record(record);
        }
        registry
    }

    pub fn add_dictionary(&mut self, name: impl Into<String>, dictionary: Arc<Dictionary>) {
        self.dictionaries.insert(name.into(), dictionary);
    }

    pub fn add_record(&mut self, record: VersionRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[VersionRecord] {
        &self.records
    }

    pub fn record(&self, name: &str) -> Option<&VersionRecord> {
        self.records.iter().find(|record| record.name == name)
    }

    pub fn dictionary(&self, name: &str) -> Option<&Arc<Dictionary>> {
        self.dictionaries.get(name)
    }

    /// First record on the given layer whose match specification is
    /// entirely satisfied by the partial header. `None` when nothing
    /// matches; that is not an error.
    pub fn get_version(&self, header: &ElementList, layer: Layer) -> Option<&VersionRecord> {
        self.records
            .iter()
            .find(|record| record.matches(header, layer))
    }

    /// First dictionary referenced by the record that is actually
    /// registered.
    pub fn dictionary_for(&self, record: &VersionRecord) -> Option<&Arc<Dictionary>> {
        record
            .dictionaries
            .iter()
            .find_map(|name| self.dictionaries.get(name))
    }

    /// Dictionary behind the named version record.
    pub fn dictionary_for_version(&self, version_name: &str) -> Option<&Arc<Dictionary>> {
        self.dictionary_for(self.record(version_name)?)
    }
}

/// The conventional version records.
///
/// FIX 4.0-4.4 are combined-layer and matched on `BeginString(8)`.
/// FIXT.1.1 is the session layer for 5.0+, matched on `BeginString(8)`.
/// The 5.0 application versions are matched on `ApplVerID(1128)` using the
/// standard enumerated values (7 = FIX50, 8 = FIX50SP1, 9 = FIX50SP2).
pub fn standard_records() -> Vec<VersionRecord> {
    let combined = |name: &str| {
        VersionRecord::new(
            name,
            Layer::Combined,
            vec![name.to_owned()],
            vec![MatchRule::equals(tags::BEGIN_STRING, name.as_bytes())],
        )
    };
    let application = |name: &str, appl_ver_id: &str| {
        VersionRecord::new(
            name,
            Layer::Application,
            vec![name.to_owned()],
            vec![MatchRule::equals(tags::APPL_VER_ID, appl_ver_id.as_bytes())],
        )
    };

    vec![
        combined("FIX.4.0"),
        combined("FIX.4.1"),
        combined("FIX.4.2"),
        combined("FIX.4.3"),
        combined("FIX.4.4"),
        VersionRecord::new(
            "FIXT.1.1",
            Layer::Session,
            vec!["FIXT.1.1".to_owned()],
            vec![MatchRule::equals(tags::BEGIN_STRING, b"FIXT.1.1".as_slice())],
        ),
        application("FIX.5.0", "7"),
        application("FIX.5.0SP1", "8"),
        application("FIX.5.0SP2", "9"),
    ]
}
