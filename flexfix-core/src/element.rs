use std::fmt;

use crate::{TagNum, message::ElementList};

/// A single scalar `tag=value` field.
///
/// The content is kept exactly as received (or as supplied by the
/// application). Values of data fields may contain SOH bytes, so content is
/// raw bytes rather than text.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Field {
    tag: TagNum,
    content: Vec<u8>,
}

impl Field {
    pub fn new(tag: TagNum, content: impl Into<Vec<u8>>) -> Field {
        Field {
            tag,
            content: content.into(),
        }
    }

    pub fn tag(&self) -> TagNum {
        self.tag
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub(crate) fn set_content(&mut self, content: Vec<u8>) {
        self.content = content;
    }
}

/// A repeating group: the count field plus an ordered list of instances.
///
/// `content` is the literal count string received on the wire - usually a
/// decimal integer, possibly empty or non-numeric for tolerantly parsed
/// input. Each instance is a mini-message holding the instance's elements in
/// wire order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Group {
    tag: TagNum,
    content: Vec<u8>,
    instances: Vec<ElementList>,
}

impl Group {
    pub fn new(tag: TagNum, content: impl Into<Vec<u8>>) -> Group {
        Group {
            tag,
            content: content.into(),
            instances: Vec::new(),
        }
    }

    pub fn with_instances(
        tag: TagNum,
        content: impl Into<Vec<u8>>,
        instances: Vec<ElementList>,
    ) -> Group {
        Group {
            tag,
            content: content.into(),
            instances,
        }
    }

    pub fn tag(&self) -> TagNum {
        self.tag
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn instances(&self) -> &[ElementList] {
        &self.instances
    }

    pub fn add_instance(&mut self, instance: ElementList) {
        self.instances.push(instance);
    }

    pub(crate) fn set_content(&mut self, content: Vec<u8>) {
        self.content = content;
    }
}

/// A wire element of a FIX message: either a scalar field or a repeating
/// group.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Element {
    Field(Field),
    Group(Group),
}

impl Element {
    pub fn field(tag: TagNum, content: impl Into<Vec<u8>>) -> Element {
        Element::Field(Field::new(tag, content))
    }

    pub fn tag(&self) -> TagNum {
        match self {
            Element::Field(field) => field.tag(),
            Element::Group(group) => group.tag(),
        }
    }

    /// The element's own content bytes. For a group this is the literal
    /// count string, not the instances.
    pub fn content(&self) -> &[u8] {
        match self {
            Element::Field(field) => field.content(),
            Element::Group(group) => group.content(),
        }
    }

    pub fn as_field(&self) -> Option<&Field> {
        match self {
            Element::Field(field) => Some(field),
            Element::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Element::Group(group) => Some(group),
            Element::Field(_) => None,
        }
    }

    pub fn is_field(&self) -> bool {
        matches!(self, Element::Field(_))
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Element::Group(_))
    }

    pub(crate) fn set_content(&mut self, content: Vec<u8>) {
        match self {
            Element::Field(field) => field.set_content(content),
            Element::Group(group) => group.set_content(content),
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.tag(), String::from_utf8_lossy(self.content()))
    }
}
