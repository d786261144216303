//! Reference resolution.
//!
//! Message, block and group bodies are stored as name-based references.
//! Before the parser can use them they are *expanded* (component blocks
//! spliced in) and *resolved* (names turned into tags, repeating blocks and
//! group references turned into [`ResolvedGroup`] nodes). The resolved form
//! contains no references by construction.

use std::collections::HashSet;

use flexfix_core::TagNum;

use crate::dictionary::{
    BlockKind, Dictionary, Error, ElementRef, FieldRef, ValidationError,
};

/// A fully resolved scalar field.
#[derive(Clone, Debug)]
pub struct ResolvedField {
    tag: TagNum,
    name: String,
    required: bool,
    length_field_tag: Option<TagNum>,
}

impl ResolvedField {
    pub fn tag(&self) -> TagNum {
        self.tag
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn required(&self) -> bool {
        self.required
    }

    /// Tag of the associated length field, when this field is length coded.
    pub fn length_field_tag(&self) -> Option<TagNum> {
        self.length_field_tag
    }

    pub fn is_length_coded(&self) -> bool {
        self.length_field_tag.is_some()
    }
}

/// A fully resolved repeating group keyed by its count tag.
///
/// The first element of `elements` is the group's delimiter: its tag marks
/// the start of each instance on the wire.
#[derive(Clone, Debug)]
pub struct ResolvedGroup {
    tag: TagNum,
    name: String,
    required: bool,
    elements: Vec<ResolvedElement>,
}

impl ResolvedGroup {
    /// The count tag announcing the number of instances.
    pub fn tag(&self) -> TagNum {
        self.tag
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn required(&self) -> bool {
        self.required
    }

    pub fn elements(&self) -> &[ResolvedElement] {
        &self.elements
    }

    /// Tag of the delimiter field opening every instance.
    pub fn delimiter(&self) -> TagNum {
        self.elements[0].tag()
    }

    /// Member of this group's body with the given tag, if any.
    pub fn find(&self, tag: TagNum) -> Option<&ResolvedElement> {
        self.elements.iter().find(|element| element.tag() == tag)
    }
}

/// A node of a resolved element tree: only scalars and groups, never
/// references.
#[derive(Clone, Debug)]
pub enum ResolvedElement {
    Field(ResolvedField),
    Group(ResolvedGroup),
}

impl ResolvedElement {
    pub fn tag(&self) -> TagNum {
        match self {
            ResolvedElement::Field(field) => field.tag(),
            ResolvedElement::Group(group) => group.tag(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ResolvedElement::Field(field) => field.name(),
            ResolvedElement::Group(group) => group.name(),
        }
    }

    pub fn required(&self) -> bool {
        match self {
            ResolvedElement::Field(field) => field.required(),
            ResolvedElement::Group(group) => group.required(),
        }
    }

    pub fn as_field(&self) -> Option<&ResolvedField> {
        match self {
            ResolvedElement::Field(field) => Some(field),
            ResolvedElement::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&ResolvedGroup> {
        match self {
            ResolvedElement::Group(group) => Some(group),
            ResolvedElement::Field(_) => None,
        }
    }
}

impl Dictionary {
    /// Recursively inlines `Component` block references, preserving field,
    /// group and repeating-block references unchanged in structure.
    pub fn expand(&self, refs: &[ElementRef]) -> Result<Vec<ElementRef>, Error> {
        let mut visited = HashSet::new();
        self.expand_impl(refs, &mut visited)
    }

    fn expand_impl(
        &self,
        refs: &[ElementRef],
        visited: &mut HashSet<String>,
    ) -> Result<Vec<ElementRef>, Error> {
        let mut expanded = Vec::with_capacity(refs.len());
        for element_ref in refs {
            match element_ref {
                ElementRef::Block(block_ref) => {
                    if block_ref.name.is_empty() {
                        return Err(ValidationError::MalformedDictionary(
                            "block reference with an empty name".into(),
                        )
                        .into());
                    }
                    let block = self.block(&block_ref.name).ok_or_else(|| {
                        ValidationError::UnresolvedReference(block_ref.name.clone())
                    })?;
                    match block.kind() {
                        BlockKind::Component => {
                            if !visited.insert(block_ref.name.clone()) {
                                return Err(ValidationError::MalformedDictionary(format!(
                                    "circular reference through block {}",
                                    block_ref.name
                                ))
                                .into());
                            }
                            let mut branch_visited = visited.clone();
                            expanded.extend(
                                self.expand_impl(block.elements(), &mut branch_visited)?,
                            );
                            visited.remove(&block_ref.name);
                        }
                        BlockKind::Repeating => expanded.push(element_ref.clone()),
                    }
                }
                ElementRef::Field(_) | ElementRef::Group(_) => expanded.push(element_ref.clone()),
            }
        }
        Ok(expanded)
    }

    /// Resolves a reference list into a tree of fields and groups.
    ///
    /// Component blocks are expanded first. A `Repeating` block becomes a
    /// group counted by the block's start field; a group reference becomes a
    /// group counted by the named field. Every name must resolve to a
    /// defined field or block, and group bodies must be non-empty.
    pub fn resolve(&self, refs: &[ElementRef]) -> Result<Vec<ResolvedElement>, Error> {
        let mut visited = HashSet::new();
        self.resolve_impl(refs, &mut visited)
    }

    fn resolve_impl(
        &self,
        refs: &[ElementRef],
        visited: &mut HashSet<String>,
    ) -> Result<Vec<ResolvedElement>, Error> {
        let expanded = self.expand_impl(refs, visited)?;

        let mut resolved = Vec::with_capacity(expanded.len());
        for element_ref in &expanded {
            match element_ref {
                ElementRef::Field(field_ref) => {
                    resolved.push(ResolvedElement::Field(self.resolve_field(field_ref)?));
                }
                ElementRef::Group(group_ref) => {
                    if group_ref.name.is_empty() {
                        return Err(ValidationError::MalformedDictionary(
                            "group reference with an empty name".into(),
                        )
                        .into());
                    }
                    let count_field = self.field_by_name(&group_ref.name).ok_or_else(|| {
                        ValidationError::UnresolvedReference(group_ref.name.clone())
                    })?;
                    if group_ref.elements.is_empty() {
                        return Err(
                            ValidationError::EmptyContainer(group_ref.name.clone()).into()
                        );
                    }
                    let mut branch_visited = visited.clone();
                    resolved.push(ResolvedElement::Group(ResolvedGroup {
                        tag: count_field.tag(),
                        name: group_ref.name.clone(),
                        required: group_ref.required,
                        elements: self.resolve_impl(&group_ref.elements, &mut branch_visited)?,
                    }));
                }
                ElementRef::Block(block_ref) => {
                    // Component blocks were inlined by expansion; only
                    // repeating blocks survive it.
                    let block = self.block(&block_ref.name).ok_or_else(|| {
                        ValidationError::UnresolvedReference(block_ref.name.clone())
                    })?;
                    let start_field_name = block.start_field().ok_or_else(|| {
                        ValidationError::MalformedDictionary(format!(
                            "repeating block {} has no start field",
                            block.name()
                        ))
                    })?;
                    let count_field = self.field_by_name(start_field_name).ok_or_else(|| {
                        ValidationError::UnresolvedReference(start_field_name.to_owned())
                    })?;
                    if !visited.insert(block_ref.name.clone()) {
                        return Err(ValidationError::MalformedDictionary(format!(
                            "circular reference through block {}",
                            block_ref.name
                        ))
                        .into());
                    }
                    let mut branch_visited = visited.clone();
                    let elements = self.resolve_impl(block.elements(), &mut branch_visited)?;
                    visited.remove(&block_ref.name);
                    if elements.is_empty() {
                        return Err(ValidationError::EmptyContainer(block_ref.name.clone()).into());
                    }
                    resolved.push(ResolvedElement::Group(ResolvedGroup {
                        tag: count_field.tag(),
                        name: block_ref.name.clone(),
                        required: block_ref.required,
                        elements,
                    }));
                }
            }
        }
        Ok(resolved)
    }

    fn resolve_field(&self, field_ref: &FieldRef) -> Result<ResolvedField, Error> {
        if field_ref.name.is_empty() {
            return Err(ValidationError::MalformedDictionary(
                "field reference with an empty name".into(),
            )
            .into());
        }
        let field = self
            .field_by_name(&field_ref.name)
            .ok_or_else(|| ValidationError::UnresolvedReference(field_ref.name.clone()))?;
        let length_field_tag = match field.length_field() {
            Some(length_field_name) => Some(
                self.field_by_name(length_field_name)
                    .ok_or_else(|| {
                        ValidationError::UnresolvedReference(length_field_name.to_owned())
                    })?
                    .tag(),
            ),
            None => None,
        };
        Ok(ResolvedField {
            tag: field.tag(),
            name: field.name().to_owned(),
            required: field_ref.required,
            length_field_tag,
        })
    }
}
