//! Core dictionary implementation and data structures.
//!
//! A [`Dictionary`] is the schema of one FIX protocol variant: named field,
//! data-type, enumeration, component-block and message definitions, plus the
//! header and trailer element lists shared by every message of the variant.
//! Message, block and group bodies are expressed as element *references*
//! ([`ElementRef`]) which the resolver turns into the resolved trees the
//! parser consumes.
//!
//! Dictionaries are immutable once published. To edit one, build a new
//! dictionary and publish that instead.

use std::{
    collections::{HashMap, HashSet},
    io,
    sync::Arc,
};

use flexfix_core::TagNum;


/// Errors that can occur during dictionary operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input/output error during file operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// XML parsing error when reading dictionary files
    #[error("XML parsing error: {0}")]
    XmlParse(#[from] quick_xml::de::DeError),

    /// XML serialization error when writing dictionary files
    #[error("XML writing error: {0}")]
    XmlWrite(#[from] quick_xml::SeError),

    /// Dictionary validation failed
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Errors related to dictionary structure and content validation.
///
/// Reported eagerly at build/resolve time; a dictionary that fails
/// validation is rejected before it ever reaches the parser.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// A referenced name does not resolve to any definition
    #[error("Unresolved reference {0}")]
    UnresolvedReference(String),

    /// Structural problem: an empty name, a repeating block without a
    /// start field, or a component reference cycle
    #[error("Malformed dictionary: {0}")]
    MalformedDictionary(String),

    /// A field with the same name already exists in the dictionary
    #[error("Duplicated field {0}")]
    DuplicatedField(String),

    /// A field with the same tag already exists in the dictionary
    #[error("Duplicated tag {0}")]
    DuplicatedTag(TagNum),

    /// A block with the same name already exists in the dictionary
    #[error("Duplicated block {0}")]
    DuplicatedBlock(String),

    /// A message with the same type already exists in the dictionary
    #[error("Duplicated message type {0}")]
    DuplicatedMessageType(String),

    /// Component, group or message body has no members defined
    #[error("{0} has no members")]
    EmptyContainer(String),
}

/// A field definition: the binding of a tag number to a name and a data
/// type.
///
/// A field whose `length_field` names another field is *length coded*: its
/// wire value is read as exactly as many bytes as the referenced length
/// field announces, and may contain SOH bytes.
#[derive(Clone, Debug)]
pub struct FieldDef {
    tag: TagNum,
    name: String,
    data_type: String,
    enumeration: Option<String>,
    length_field: Option<String>,
}

impl FieldDef {
    pub fn new(tag: TagNum, name: impl Into<String>, data_type: impl Into<String>) -> FieldDef {
        FieldDef {
            tag,
            name: name.into(),
            data_type: data_type.into(),
            enumeration: None,
            length_field: None,
        }
    }

    /// Associates this field with a named enumeration.
    pub fn with_enumeration(mut self, enumeration: impl Into<String>) -> FieldDef {
        self.enumeration = Some(enumeration.into());
        self
    }

    /// Marks this field as length coded by the named length field.
    pub fn with_length_field(mut self, length_field: impl Into<String>) -> FieldDef {
        self.length_field = Some(length_field.into());
        self
    }

    pub fn tag(&self) -> TagNum {
        self.tag
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &str {
        &self.data_type
    }

    pub fn enumeration(&self) -> Option<&str> {
        self.enumeration.as_deref()
    }

    /// Name of the field carrying this field's byte length, when length
    /// coded.
    pub fn length_field(&self) -> Option<&str> {
        self.length_field.as_deref()
    }

    pub fn is_length_coded(&self) -> bool {
        self.length_field.is_some()
    }
}

/// A data type definition. Purely informational for the codec.
#[derive(Clone, Debug)]
pub struct DataTypeDef {
    name: String,
    base_name: Option<String>,
}

impl DataTypeDef {
    pub fn new(name: impl Into<String>) -> DataTypeDef {
        DataTypeDef {
            name: name.into(),
            base_name: None,
        }
    }

    pub fn with_base(mut self, base_name: impl Into<String>) -> DataTypeDef {
        self.base_name = Some(base_name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_name(&self) -> Option<&str> {
        self.base_name.as_deref()
    }
}

/// One legal value of an enumerated field.
#[derive(Clone, Debug)]
pub struct Enumerator {
    pub value: String,
    pub description: Option<String>,
}

/// A named set of enumerators, referenced from field definitions.
#[derive(Clone, Debug)]
pub struct EnumerationDef {
    name: String,
    enumerators: Vec<Enumerator>,
}

impl EnumerationDef {
    pub fn new(name: impl Into<String>, enumerators: Vec<Enumerator>) -> EnumerationDef {
        EnumerationDef {
            name: name.into(),
            enumerators,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn enumerators(&self) -> &[Enumerator] {
        &self.enumerators
    }
}

/// Whether a block is inlined where referenced or emitted as a repeating
/// group.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BlockKind {
    /// Inlined into the referencing body during expansion
    Component,
    /// Emitted as a repeating group counted by the block's start field
    Repeating,
}

/// A named, reusable element list.
///
/// `Component` blocks are spliced into the referencing body. `Repeating`
/// blocks become repeating groups; their `start_field` names the field whose
/// tag is the group's count tag.
#[derive(Clone, Debug)]
pub struct BlockDef {
    name: String,
    kind: BlockKind,
    start_field: Option<String>,
    category: Option<String>,
    elements: Vec<ElementRef>,
}

impl BlockDef {
    pub fn component(name: impl Into<String>, elements: Vec<ElementRef>) -> BlockDef {
        BlockDef {
            name: name.into(),
            kind: BlockKind::Component,
            start_field: None,
            category: None,
            elements,
        }
    }

    pub fn repeating(
        name: impl Into<String>,
        start_field: impl Into<String>,
        elements: Vec<ElementRef>,
    ) -> BlockDef {
        BlockDef {
            name: name.into(),
            kind: BlockKind::Repeating,
            start_field: Some(start_field.into()),
            category: None,
            elements,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> BlockDef {
        self.category = Some(category.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    pub fn start_field(&self) -> Option<&str> {
        self.start_field.as_deref()
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn elements(&self) -> &[ElementRef] {
        &self.elements
    }
}

/// A message definition: the element references making up one `MsgType`.
#[derive(Clone, Debug)]
pub struct MessageDef {
    name: String,
    msg_type: String,
    category: Option<String>,
    elements: Vec<ElementRef>,
}

impl MessageDef {
    pub fn new(
        name: impl Into<String>,
        msg_type: impl Into<String>,
        elements: Vec<ElementRef>,
    ) -> MessageDef {
        MessageDef {
            name: name.into(),
            msg_type: msg_type.into(),
            category: None,
            elements,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> MessageDef {
        self.category = Some(category.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn msg_type(&self) -> &str {
        &self.msg_type
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn elements(&self) -> &[ElementRef] {
        &self.elements
    }
}

/// A reference to a field by name.
#[derive(Clone, Debug)]
pub struct FieldRef {
    pub name: String,
    pub required: bool,
}

/// A repeating group with inline member references. The named field's tag
/// becomes the group's count tag.
#[derive(Clone, Debug)]
pub struct GroupRef {
    pub name: String,
    pub required: bool,
    pub elements: Vec<ElementRef>,
}

/// A reference to a named block, expanded according to the block's kind.
#[derive(Clone, Debug)]
pub struct BlockRef {
    pub name: String,
    pub required: bool,
}

/// What appears inside message, block and group definitions.
#[derive(Clone, Debug)]
pub enum ElementRef {
    Field(FieldRef),
    Group(GroupRef),
    Block(BlockRef),
}

impl ElementRef {
    pub fn field(name: impl Into<String>, required: bool) -> ElementRef {
        ElementRef::Field(FieldRef {
            name: name.into(),
            required,
        })
    }

    pub fn group(name: impl Into<String>, required: bool, elements: Vec<ElementRef>) -> ElementRef {
        ElementRef::Group(GroupRef {
            name: name.into(),
            required,
            elements,
        })
    }

    pub fn block(name: impl Into<String>, required: bool) -> ElementRef {
        ElementRef::Block(BlockRef {
            name: name.into(),
            required,
        })
    }

    pub fn name(&self) -> &str {
        match self {
            ElementRef::Field(field_ref) => &field_ref.name,
            ElementRef::Group(group_ref) => &group_ref.name,
            ElementRef::Block(block_ref) => &block_ref.name,
        }
    }

    pub fn required(&self) -> bool {
        match self {
            ElementRef::Field(field_ref) => field_ref.required,
            ElementRef::Group(group_ref) => group_ref.required,
            ElementRef::Block(block_ref) => block_ref.required,
        }
    }
}

/// The schema of one FIX protocol variant.
///
/// Read-only after construction; wrap in [`Arc`] to share between sessions
/// and threads.
#[derive(Debug, Default)]
pub struct Dictionary {
    properties: HashMap<String, String>,
    fields_by_name: HashMap<String, Arc<FieldDef>>,
    fields_by_tag: HashMap<TagNum, Arc<FieldDef>>,
    data_types: HashMap<String, DataTypeDef>,
    enumerations: HashMap<String, EnumerationDef>,
    blocks: HashMap<String, BlockDef>,
    messages_by_type: HashMap<String, Arc<MessageDef>>,
    messages_by_name: HashMap<String, Arc<MessageDef>>,
    header: Vec<ElementRef>,
    trailer: Vec<ElementRef>,
}

impl Dictionary {
    /// Looks up a property, e.g. `Type`, `Fix.Major`, `Fix.Minor`.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// The `BeginString` this dictionary describes, composed from the
    /// `Type`, `Fix.Major` and `Fix.Minor` properties.
    pub fn begin_string(&self) -> Option<String> {
        Some(format!(
            "{}.{}.{}",
            self.property("Type")?,
            self.property("Fix.Major")?,
            self.property("Fix.Minor")?
        ))
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldDef> {
        self.fields_by_name.get(name).map(|field| &**field)
    }

    pub fn field_by_tag(&self, tag: TagNum) -> Option<&FieldDef> {
        self.fields_by_tag.get(&tag).map(|field| &**field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields_by_tag.values().map(|field| &**field)
    }

    pub fn data_type(&self, name: &str) -> Option<&DataTypeDef> {
        self.data_types.get(name)
    }

    pub fn data_types(&self) -> impl Iterator<Item = &DataTypeDef> {
        self.data_types.values()
    }

    pub fn enumeration(&self, name: &str) -> Option<&EnumerationDef> {
        self.enumerations.get(name)
    }

    pub fn enumerations(&self) -> impl Iterator<Item = &EnumerationDef> {
        self.enumerations.values()
    }

    pub fn block(&self, name: &str) -> Option<&BlockDef> {
        self.blocks.get(name)
    }

    pub fn blocks(&self) -> impl Iterator<Item = &BlockDef> {
        self.blocks.values()
    }

    /// Looks up a message definition by its `MsgType` value.
    pub fn message_by_type(&self, msg_type: &str) -> Option<&MessageDef> {
        self.messages_by_type.get(msg_type).map(|msg| &**msg)
    }

    pub fn message_by_name(&self, name: &str) -> Option<&MessageDef> {
        self.messages_by_name.get(name).map(|msg| &**msg)
    }

    pub fn messages(&self) -> impl Iterator<Item = &MessageDef> {
        self.messages_by_type.values().map(|msg| &**msg)
    }

    /// Element references of the standard header shared by all messages.
    pub fn header(&self) -> &[ElementRef] {
        &self.header
    }

    /// Element references of the standard trailer shared by all messages.
    pub fn trailer(&self) -> &[ElementRef] {
        &self.trailer
    }
}

/// Builder assembling and validating a [`Dictionary`].
///
/// `build()` validates eagerly: duplicate names and tags are rejected, and
/// the header, the trailer and every message body are fully resolved so
/// that dangling references or block cycles surface at load time rather
/// than during parsing.
#[derive(Default)]
pub struct DictionaryBuilder {
    properties: HashMap<String, String>,
    fields: Vec<FieldDef>,
    data_types: Vec<DataTypeDef>,
    enumerations: Vec<EnumerationDef>,
    blocks: Vec<BlockDef>,
    messages: Vec<MessageDef>,
    header: Vec<ElementRef>,
    trailer: Vec<ElementRef>,
}

impl DictionaryBuilder {
    pub fn new() -> DictionaryBuilder {
        DictionaryBuilder::default()
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn data_type(mut self, data_type: DataTypeDef) -> Self {
        self.data_types.push(data_type);
        self
    }

    pub fn enumeration(mut self, enumeration: EnumerationDef) -> Self {
        self.enumerations.push(enumeration);
        self
    }

    pub fn block(mut self, block: BlockDef) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn message(mut self, message: MessageDef) -> Self {
        self.messages.push(message);
        self
    }

    pub fn header(mut self, header: Vec<ElementRef>) -> Self {
        self.header = header;
        self
    }

    pub fn trailer(mut self, trailer: Vec<ElementRef>) -> Self {
        self.trailer = trailer;
        self
    }

    pub fn build(self) -> Result<Dictionary, Error> {
        let mut names: HashSet<String> = HashSet::new();

        let mut fields_by_name = HashMap::with_capacity(self.fields.len());
        let mut fields_by_tag = HashMap::with_capacity(self.fields.len());
        for field in self.fields {
            if field.name.is_empty() {
                return Err(ValidationError::MalformedDictionary(format!(
                    "field {} has an empty name",
                    field.tag
                ))
                .into());
            }
            if !names.insert(field.name.clone()) {
                return Err(ValidationError::DuplicatedField(field.name).into());
            }
            let field = Arc::new(field);
            if let Some(previous) = fields_by_tag.insert(field.tag, field.clone()) {
                return Err(ValidationError::DuplicatedTag(previous.tag).into());
            }
            fields_by_name.insert(field.name.clone(), field);
        }

        let mut blocks = HashMap::with_capacity(self.blocks.len());
        for block in self.blocks {
            if block.name.is_empty() {
                return Err(ValidationError::MalformedDictionary(
                    "block with an empty name".into(),
                )
                .into());
            }
            if block.kind == BlockKind::Repeating
                && block.start_field.as_deref().unwrap_or("").is_empty()
            {
                return Err(ValidationError::MalformedDictionary(format!(
                    "repeating block {} has no start field",
                    block.name
                ))
                .into());
            }
            if block.elements.is_empty() {
                return Err(ValidationError::EmptyContainer(block.name).into());
            }
            let name = block.name.clone();
            if blocks.insert(name.clone(), block).is_some() {
                return Err(ValidationError::DuplicatedBlock(name).into());
            }
        }

        let mut messages_by_type = HashMap::with_capacity(self.messages.len());
        let mut messages_by_name = HashMap::with_capacity(self.messages.len());
        for message in self.messages {
            if message.msg_type.is_empty() || message.name.is_empty() {
                return Err(ValidationError::MalformedDictionary(
                    "message with an empty name or type".into(),
                )
                .into());
            }
            if message.elements.is_empty() {
                return Err(ValidationError::EmptyContainer(message.name).into());
            }
            let message = Arc::new(message);
            messages_by_name.insert(message.name.clone(), message.clone());
            if messages_by_type
                .insert(message.msg_type.clone(), message.clone())
                .is_some()
            {
                return Err(ValidationError::DuplicatedMessageType(message.msg_type.clone()).into());
            }
        }

        let dictionary = Dictionary {
            properties: self.properties,
            fields_by_name,
            fields_by_tag,
            data_types: self
                .data_types
                .into_iter()
                .map(|data_type| (data_type.name.clone(), data_type))
                .collect(),
            enumerations: self
                .enumerations
                .into_iter()
                .map(|enumeration| (enumeration.name.clone(), enumeration))
                .collect(),
            blocks,
            messages_by_type,
            messages_by_name,
            header: self.header,
            trailer: self.trailer,
        };

        // Resolution failures are load-time errors, never parse-time ones.
        dictionary.resolve(dictionary.header())?;
        dictionary.resolve(dictionary.trailer())?;
        for message in dictionary.messages_by_type.values() {
            dictionary.resolve(message.elements())?;
        }

        Ok(dictionary)
    }
}
