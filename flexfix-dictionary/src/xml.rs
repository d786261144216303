//! XML import and export of the native dictionary format.
//!
//! The native format keeps fields, blocks, messages and enumerations in
//! separate sections and expresses message/block bodies as references:
//!
//! ```xml
//! <fix type='FIX' major='4' minor='4'>
//!   <header>
//!     <field name='BeginString' required='Y'/>
//!   </header>
//!   <trailer>
//!     <field name='CheckSum' required='Y'/>
//!   </trailer>
//!   <fields>
//!     <field tag='96' name='RawData' type='Data' LengthField='RawDataLength'/>
//!   </fields>
//!   <blocks>
//!     <block name='Parties' type='Repeating' field='NoPartyIDs'>
//!       <field name='PartyID' required='Y'/>
//!     </block>
//!   </blocks>
//!   <messages>
//!     <message name='Logon' msgType='A' msgCat='admin'>
//!       <field name='EncryptMethod' required='Y'/>
//!     </message>
//!   </messages>
//!   <enums>
//!     <enumeration name='EncryptMethod'>
//!       <enumerator value='0' description='NONE'/>
//!     </enumeration>
//!   </enums>
//! </fix>
//! ```
//!
//! Deserialization goes through [`DictionaryBuilder`], so imported
//! dictionaries get the same eager validation as programmatically built
//! ones. See [`crate::quickfix`] for the QuickFIX-compatible variant.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::dictionary::{
    BlockDef, BlockKind, DataTypeDef, Dictionary, DictionaryBuilder, ElementRef, EnumerationDef,
    Enumerator, Error, FieldDef, MessageDef,
};


// Y/N attribute handling, shared with the QuickFIX import.
pub(crate) mod required_flag {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    fn parse(flag: &str) -> Option<bool> {
        if matches!(flag, "Y" | "y" | "YES" | "yes") {
            Some(true)
        } else if matches!(flag, "N" | "n" | "NO" | "no") {
            Some(false)
        } else {
            None
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        let flag = String::deserialize(deserializer)?;
        parse(&flag)
            .ok_or_else(|| D::Error::custom(format!("invalid `required` flag value: {flag}")))
    }

    pub fn serialize<S>(required: &bool, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(if *required { "Y" } else { "N" })
    }
}

/// A reference inside a header, trailer, message, block or group body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum XmlRef {
    #[serde(rename = "field")]
    Field(XmlMemberRef),

    #[serde(rename = "group")]
    Group(XmlGroupRef),

    #[serde(rename = "block")]
    Block(XmlMemberRef),
}

/// A field or block reference with its required flag.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct XmlMemberRef {
    #[serde(rename = "@name")]
    pub name: String,

    #[serde(rename = "@required")]
    #[serde(with = "required_flag")]
    pub required: bool,
}

/// A group reference with inline member references.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct XmlGroupRef {
    #[serde(rename = "@name")]
    pub name: String,

    #[serde(rename = "@required")]
    #[serde(with = "required_flag")]
    pub required: bool,

    #[serde(rename = "$value")]
    #[serde(default)]
    pub members: Vec<XmlRef>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct XmlSection {
    #[serde(rename = "$value")]
    #[serde(default)]
    pub members: Vec<XmlRef>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct XmlField {
    #[serde(rename = "@tag")]
    pub tag: u32,

    #[serde(rename = "@name")]
    pub name: String,

    #[serde(rename = "@type")]
    pub data_type: String,

    #[serde(rename = "@Enumeration")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enumeration: Option<String>,

    #[serde(rename = "@LengthField")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length_field: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct XmlFields {
    #[serde(rename = "field")]
    #[serde(default)]
    pub fields: Vec<XmlField>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct XmlDataType {
    #[serde(rename = "@name")]
    pub name: String,

    #[serde(rename = "@baseName")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_name: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct XmlDataTypes {
    #[serde(rename = "dataType")]
    #[serde(default)]
    pub data_types: Vec<XmlDataType>,
}

/// Block kind attribute, `Component` or `Repeating`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum XmlBlockKind {
    Component,
    Repeating,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct XmlBlock {
    #[serde(rename = "@name")]
    pub name: String,

    #[serde(rename = "@type")]
    pub kind: XmlBlockKind,

    /// Start field of a repeating block; its tag is the group's count tag.
    #[serde(rename = "@field")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    #[serde(rename = "@Category")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(rename = "$value")]
    #[serde(default)]
    pub members: Vec<XmlRef>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct XmlBlocks {
    #[serde(rename = "block")]
    #[serde(default)]
    pub blocks: Vec<XmlBlock>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct XmlMessage {
    #[serde(rename = "@name")]
    pub name: String,

    #[serde(rename = "@msgType")]
    pub msg_type: String,

    #[serde(rename = "@msgCat")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_cat: Option<String>,

    #[serde(rename = "$value")]
    #[serde(default)]
    pub members: Vec<XmlRef>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct XmlMessages {
    #[serde(rename = "message")]
    #[serde(default)]
    pub messages: Vec<XmlMessage>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct XmlEnumerator {
    #[serde(rename = "@value")]
    pub value: String,

    #[serde(rename = "@description")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct XmlEnumeration {
    #[serde(rename = "@name")]
    pub name: String,

    #[serde(rename = "enumerator")]
    #[serde(default)]
    pub enumerators: Vec<XmlEnumerator>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct XmlEnums {
    #[serde(rename = "enumeration")]
    #[serde(default)]
    pub enumerations: Vec<XmlEnumeration>,
}

/// Root element of a native-format dictionary document.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "fix")]
pub struct XmlDictionary {
    #[serde(rename = "@type")]
    pub fix_type: String,

    #[serde(rename = "@major")]
    pub major: u8,

    #[serde(rename = "@minor")]
    pub minor: u8,

    #[serde(default)]
    pub header: XmlSection,

    #[serde(default)]
    pub trailer: XmlSection,

    #[serde(default)]
    pub fields: XmlFields,

    #[serde(rename = "dataTypes")]
    #[serde(default)]
    pub data_types: XmlDataTypes,

    #[serde(default)]
    pub blocks: XmlBlocks,

    #[serde(default)]
    pub messages: XmlMessages,

    #[serde(default)]
    pub enums: XmlEnums,
}

fn refs_from_xml(members: &[XmlRef]) -> Vec<ElementRef> {
    members
        .iter()
        .map(|member| match member {
            XmlRef::Field(field_ref) => ElementRef::field(&field_ref.name, field_ref.required),
            XmlRef::Block(block_ref) => ElementRef::block(&block_ref.name, block_ref.required),
            XmlRef::Group(group_ref) => ElementRef::group(
                &group_ref.name,
                group_ref.required,
                refs_from_xml(&group_ref.members),
            ),
        })
        .collect()
}

fn refs_to_xml(refs: &[ElementRef]) -> Vec<XmlRef> {
    refs.iter()
        .map(|element_ref| match element_ref {
            ElementRef::Field(field_ref) => XmlRef::Field(XmlMemberRef {
                name: field_ref.name.clone(),
                required: field_ref.required,
            }),
            ElementRef::Block(block_ref) => XmlRef::Block(XmlMemberRef {
                name: block_ref.name.clone(),
                required: block_ref.required,
            }),
            ElementRef::Group(group_ref) => XmlRef::Group(XmlGroupRef {
                name: group_ref.name.clone(),
                required: group_ref.required,
                members: refs_to_xml(&group_ref.elements),
            }),
        })
        .collect()
}

impl TryFrom<XmlDictionary> for Dictionary {
    type Error = Error;

    fn try_from(raw: XmlDictionary) -> Result<Dictionary, Error> {
        let mut builder = DictionaryBuilder::new()
            .property("Type", raw.fix_type)
            .property("Fix.Major", raw.major.to_string())
            .property("Fix.Minor", raw.minor.to_string())
            .header(refs_from_xml(&raw.header.members))
            .trailer(refs_from_xml(&raw.trailer.members));

        for field in raw.fields.fields {
            let mut def = FieldDef::new(field.tag, field.name, field.data_type);
            if let Some(enumeration) = field.enumeration {
                def = def.with_enumeration(enumeration);
            }
            if let Some(length_field) = field.length_field {
                def = def.with_length_field(length_field);
            }
            builder = builder.field(def);
        }

        for data_type in raw.data_types.data_types {
            let mut def = DataTypeDef::new(data_type.name);
            if let Some(base_name) = data_type.base_name {
                def = def.with_base(base_name);
            }
            builder = builder.data_type(def);
        }

        for enumeration in raw.enums.enumerations {
            builder = builder.enumeration(EnumerationDef::new(
                enumeration.name,
                enumeration
                    .enumerators
                    .into_iter()
                    .map(|enumerator| Enumerator {
                        value: enumerator.value,
                        description: enumerator.description,
                    })
                    .collect(),
            ));
        }

        for block in raw.blocks.blocks {
            let elements = refs_from_xml(&block.members);
            let mut def = match block.kind {
                XmlBlockKind::Component => BlockDef::component(block.name, elements),
                XmlBlockKind::Repeating => {
                    // An absent start field is reported by the builder.
                    let start_field = block.field.unwrap_or_default();
                    BlockDef::repeating(block.name, start_field, elements)
                }
            };
            if let Some(category) = block.category {
                def = def.with_category(category);
            }
            builder = builder.block(def);
        }

        for message in raw.messages.messages {
            let mut def = MessageDef::new(
                message.name,
                message.msg_type,
                refs_from_xml(&message.members),
            );
            if let Some(category) = message.msg_cat {
                def = def.with_category(category);
            }
            builder = builder.message(def);
        }

        builder.build()
    }
}

impl Dictionary {
    /// Parses a native-format XML document.
    pub fn from_xml_str(xml: &str) -> Result<Dictionary, Error> {
        let raw: XmlDictionary = quick_xml::de::from_str(xml)?;
        raw.try_into()
    }

    /// Reads and parses a native-format XML file.
    pub fn from_xml_file(path: impl AsRef<Path>) -> Result<Dictionary, Error> {
        let xml = fs::read_to_string(path)?;
        Dictionary::from_xml_str(&xml)
    }

    /// Renders this dictionary as a native-format XML document.
    ///
    /// Sections are emitted in a stable order (fields by tag, everything
    /// else by name) so the output is reproducible.
    pub fn to_xml_string(&self) -> Result<String, Error> {
        let mut fields: Vec<&FieldDef> = self.fields().collect();
        fields.sort_by_key(|field| field.tag());
        let mut data_types: Vec<&DataTypeDef> = self.data_types().collect();
        data_types.sort_by_key(|data_type| data_type.name().to_owned());
        let mut blocks: Vec<&BlockDef> = self.blocks().collect();
        blocks.sort_by_key(|block| block.name().to_owned());
        let mut messages: Vec<&MessageDef> = self.messages().collect();
        messages.sort_by_key(|message| message.msg_type().to_owned());
        let mut enumerations: Vec<&EnumerationDef> = self.enumerations().collect();
        enumerations.sort_by_key(|enumeration| enumeration.name().to_owned());

        let raw = XmlDictionary {
            fix_type: self.property("Type").unwrap_or("FIX").to_owned(),
            major: self
                .property("Fix.Major")
                .and_then(|major| major.parse().ok())
                .unwrap_or(0),
            minor: self
                .property("Fix.Minor")
                .and_then(|minor| minor.parse().ok())
                .unwrap_or(0),
            header: XmlSection {
                members: refs_to_xml(self.header()),
            },
            trailer: XmlSection {
                members: refs_to_xml(self.trailer()),
            },
            fields: XmlFields {
                fields: fields
                    .into_iter()
                    .map(|field| XmlField {
                        tag: field.tag(),
                        name: field.name().to_owned(),
                        data_type: field.data_type().to_owned(),
                        enumeration: field.enumeration().map(str::to_owned),
                        length_field: field.length_field().map(str::to_owned),
                    })
                    .collect(),
            },
            data_types: XmlDataTypes {
                data_types: data_types
                    .into_iter()
                    .map(|data_type| XmlDataType {
                        name: data_type.name().to_owned(),
                        base_name: data_type.base_name().map(str::to_owned),
                    })
                    .collect(),
            },
            blocks: XmlBlocks {
                blocks: blocks
                    .into_iter()
                    .map(|block| XmlBlock {
                        name: block.name().to_owned(),
                        kind: match block.kind() {
                            BlockKind::Component => XmlBlockKind::Component,
                            BlockKind::Repeating => XmlBlockKind::Repeating,
                        },
                        field: block.start_field().map(str::to_owned),
                        category: block.category().map(str::to_owned),
                        members: refs_to_xml(block.elements()),
                    })
                    .collect(),
            },
            messages: XmlMessages {
                messages: messages
                    .into_iter()
                    .map(|message| XmlMessage {
                        name: message.name().to_owned(),
                        msg_type: message.msg_type().to_owned(),
                        msg_cat: message.category().map(str::to_owned),
                        members: refs_to_xml(message.elements()),
                    })
                    .collect(),
            },
            enums: XmlEnums {
                enumerations: enumerations
                    .into_iter()
                    .map(|enumeration| XmlEnumeration {
                        name: enumeration.name().to_owned(),
                        enumerators: enumeration
                            .enumerators()
                            .iter()
                            .map(|enumerator| XmlEnumerator {
                                value: enumerator.value.clone(),
                                description: enumerator.description.clone(),
                            })
                            .collect(),
                    })
                    .collect(),
            },
        };

        Ok(quick_xml::se::to_string(&raw)?)
    }
}
