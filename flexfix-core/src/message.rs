use std::collections::HashMap;

use tracing::warn;

use crate::{
    TagNum,
    element::{Element, Field, Group},
    tags,
};

/// An ordered sequence of wire elements with tag-indexed lookup.
///
/// The list keeps two views in sync on every mutation: the elements in
/// insertion order (the order used for serialization and checksum
/// computation) and a map from tag to the positions of that tag's
/// occurrences. Within one list a tag refers either to fields or to a group,
/// never both.
///
/// An optional ordering vector changes iteration: elements whose tags appear
/// in the vector are yielded first, in vector order, consuming one instance
/// of the tag per vector entry; all remaining elements follow in insertion
/// order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ElementList {
    elements: Vec<Element>,
    positions: HashMap<TagNum, Vec<usize>>,
    ordering: Option<Vec<TagNum>>,
}

impl ElementList {
    pub fn new() -> ElementList {
        ElementList::default()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Appends an element, updating the tag index.
    pub fn push(&mut self, element: Element) {
        if let Some(first) = self.get(element.tag())
            && first.is_field() != element.is_field()
        {
            warn!(
                tag = element.tag(),
                "tag already present with a different element kind"
            );
        }
        self.positions
            .entry(element.tag())
            .or_default()
            .push(self.elements.len());
        self.elements.push(element);
    }

    pub fn push_field(&mut self, tag: TagNum, content: impl Into<Vec<u8>>) {
        self.push(Element::Field(Field::new(tag, content)));
    }

    pub fn push_group(&mut self, group: Group) {
        self.push(Element::Group(group));
    }

    /// Overwrites the content of the first element with the given tag, or
    /// appends a new field when the tag is absent.
    pub fn set_field(&mut self, tag: TagNum, content: impl Into<Vec<u8>>) {
        match self.positions.get(&tag).and_then(|p| p.first()) {
            Some(&pos) => self.elements[pos].set_content(content.into()),
            None => self.push_field(tag, content),
        }
    }

    pub fn contains(&self, tag: TagNum) -> bool {
        self.positions.contains_key(&tag)
    }

    /// First element with the given tag, in insertion order.
    pub fn get(&self, tag: TagNum) -> Option<&Element> {
        self.get_at(tag, 0)
    }

    /// The `index`-th occurrence of the given tag. The index is bounded by
    /// the number of occurrences of that tag, not by the size of the list.
    pub fn get_at(&self, tag: TagNum, index: usize) -> Option<&Element> {
        self.positions
            .get(&tag)
            .and_then(|positions| positions.get(index))
            .map(|&pos| &self.elements[pos])
    }

    /// Number of occurrences of the given tag.
    pub fn count(&self, tag: TagNum) -> usize {
        self.positions.get(&tag).map_or(0, Vec::len)
    }

    /// Content of the first field with the given tag. `None` when the tag is
    /// absent or refers to a group.
    pub fn field_content(&self, tag: TagNum) -> Option<&[u8]> {
        self.get(tag)?.as_field().map(Field::content)
    }

    pub fn group(&self, tag: TagNum) -> Option<&Group> {
        self.get(tag)?.as_group()
    }

    /// Elements in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter()
    }

    /// Elements with the ordering vector applied; insertion order when no
    /// ordering vector has been set.
    pub fn ordered_iter(&self) -> impl Iterator<Item = &Element> {
        self.ordered_positions()
            .into_iter()
            .map(|pos| &self.elements[pos])
    }

    /// Sets the ordering vector used by [`ElementList::ordered_iter`].
    pub fn set_ordering(&mut self, ordering: Vec<TagNum>) {
        self.ordering = Some(ordering);
    }

    fn ordered_positions(&self) -> Vec<usize> {
        let Some(ordering) = &self.ordering else {
            return (0..self.elements.len()).collect();
        };

        let mut taken = vec![false; self.elements.len()];
        let mut result = Vec::with_capacity(self.elements.len());
        let mut cursors: HashMap<TagNum, usize> = HashMap::new();
        for tag in ordering {
            let instance = cursors.entry(*tag).or_insert(0);
            if let Some(&pos) = self
                .positions
                .get(tag)
                .and_then(|positions| positions.get(*instance))
            {
                taken[pos] = true;
                result.push(pos);
                *instance += 1;
            }
        }
        // The residual follows the ordered prefix in insertion order.
        for (pos, yielded) in taken.iter().enumerate() {
            if !yielded {
                result.push(pos);
            }
        }
        result
    }
}

impl<'a> IntoIterator for &'a ElementList {
    type Item = &'a Element;
    type IntoIter = std::slice::Iter<'a, Element>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl FromIterator<Element> for ElementList {
    fn from_iter<I: IntoIterator<Item = Element>>(iter: I) -> ElementList {
        let mut list = ElementList::new();
        for element in iter {
            list.push(element);
        }
        list
    }
}

/// One FIX message: three ordered element sequences for the standard
/// header, the body and the standard trailer.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FixMessage {
    pub header: ElementList,
    pub body: ElementList,
    pub trailer: ElementList,
}

impl FixMessage {
    pub fn new() -> FixMessage {
        FixMessage::default()
    }

    /// Content of the `BeginString(8)` header field.
    pub fn begin_string(&self) -> Option<&[u8]> {
        self.header.field_content(tags::BEGIN_STRING)
    }

    /// Content of the `MsgType(35)` header field.
    pub fn msg_type(&self) -> Option<&[u8]> {
        self.header.field_content(tags::MSG_TYPE)
    }

    /// First element with the given tag, looked up in the header, then the
    /// body, then the trailer.
    pub fn find(&self, tag: TagNum) -> Option<&Element> {
        self.header
            .get(tag)
            .or_else(|| self.body.get(tag))
            .or_else(|| self.trailer.get(tag))
    }
}
