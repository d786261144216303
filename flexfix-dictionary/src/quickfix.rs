//! QuickFIX-compatible dictionary import.
//!
//! QuickFIX XML differs from the native format: enumerators live inline
//! under each `field`, repeating behaviour is inferred from `group` nodes
//! inside message and component bodies, and `components` become `Component`
//! blocks. Data/length field pairs are not declared explicitly either, so
//! the importer derives them from the QuickFIX naming convention
//! (`RawData`/`RawDataLength`, `XmlData`/`XmlDataLen`, ...).
//!
//! Import only; dictionaries are exported in the native format.

use std::{collections::HashMap, fs, path::Path};

use serde::Deserialize;

use crate::{
    dictionary::{
        BlockDef, Dictionary, DictionaryBuilder, ElementRef, EnumerationDef, Enumerator, Error,
        FieldDef, MessageDef,
    },
    xml::required_flag,
};

/// A member of a QuickFIX message, component or group body.
#[derive(Clone, Debug, Deserialize)]
pub enum QfMember {
    #[serde(rename = "field")]
    Field(QfMemberRef),

    #[serde(rename = "component")]
    Component(QfMemberRef),

    #[serde(rename = "group")]
    Group(QfGroup),
}

#[derive(Clone, Debug, Deserialize)]
pub struct QfMemberRef {
    #[serde(rename = "@name")]
    pub name: String,

    #[serde(rename = "@required")]
    #[serde(with = "required_flag")]
    pub required: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct QfGroup {
    #[serde(rename = "@name")]
    pub name: String,

    #[serde(rename = "@required")]
    #[serde(with = "required_flag")]
    pub required: bool,

    #[serde(rename = "$value")]
    #[serde(default)]
    pub members: Vec<QfMember>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QfSection {
    #[serde(rename = "$value")]
    #[serde(default)]
    pub members: Vec<QfMember>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct QfValue {
    #[serde(rename = "@enum")]
    pub value_enum: String,

    #[serde(rename = "@description")]
    pub description: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct QfField {
    #[serde(rename = "@number")]
    pub number: u32,

    #[serde(rename = "@name")]
    pub name: String,

    #[serde(rename = "@type")]
    pub data_type: String,

    #[serde(rename = "$value")]
    pub values: Option<Vec<QfValue>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QfFields {
    #[serde(rename = "field")]
    #[serde(default)]
    pub fields: Vec<QfField>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct QfComponent {
    #[serde(rename = "@name")]
    pub name: String,

    #[serde(rename = "$value")]
    #[serde(default)]
    pub members: Vec<QfMember>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QfComponents {
    #[serde(rename = "component")]
    #[serde(default)]
    pub components: Vec<QfComponent>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct QfMessage {
    #[serde(rename = "@name")]
    pub name: String,

    #[serde(rename = "@msgtype")]
    pub msg_type: String,

    #[serde(rename = "@msgcat")]
    #[serde(default)]
    pub msg_cat: Option<String>,

    #[serde(rename = "$value")]
    #[serde(default)]
    pub members: Vec<QfMember>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QfMessages {
    #[serde(rename = "message")]
    #[serde(default)]
    pub messages: Vec<QfMessage>,
}

/// Root element of a QuickFIX dictionary document.
#[derive(Debug, Deserialize)]
pub struct QfDictionary {
    #[serde(rename = "@type")]
    pub fix_type: String,

    #[serde(rename = "@major")]
    pub major: u8,

    #[serde(rename = "@minor")]
    pub minor: u8,

    #[serde(rename = "@servicepack")]
    #[serde(default)]
    pub servicepack: Option<u8>,

    #[serde(default)]
    pub header: QfSection,

    #[serde(default)]
    pub trailer: QfSection,

    #[serde(default)]
    pub messages: QfMessages,

    #[serde(default)]
    pub components: QfComponents,

    #[serde(default)]
    pub fields: QfFields,
}

fn refs_from_members(members: &[QfMember]) -> Vec<ElementRef> {
    members
        .iter()
        .map(|member| match member {
            QfMember::Field(field_ref) => ElementRef::field(&field_ref.name, field_ref.required),
            QfMember::Component(component_ref) => {
                ElementRef::block(&component_ref.name, component_ref.required)
            }
            QfMember::Group(group) => ElementRef::group(
                &group.name,
                group.required,
                refs_from_members(&group.members),
            ),
        })
        .collect()
}

/// Length field of a data field under the QuickFIX naming convention.
fn length_field_name<'a>(
    data_field_name: &str,
    fields_by_name: &HashMap<&str, &'a QfField>,
) -> Option<&'a str> {
    for suffix in ["Length", "Len"] {
        let candidate = format!("{data_field_name}{suffix}");
        if let Some(field) = fields_by_name.get(candidate.as_str()) {
            return Some(&field.name);
        }
    }
    None
}

impl TryFrom<QfDictionary> for Dictionary {
    type Error = Error;

    fn try_from(raw: QfDictionary) -> Result<Dictionary, Error> {
        let mut builder = DictionaryBuilder::new()
            .property("Type", raw.fix_type)
            .property("Fix.Major", raw.major.to_string())
            .property("Fix.Minor", raw.minor.to_string())
            .header(refs_from_members(&raw.header.members))
            .trailer(refs_from_members(&raw.trailer.members));
        if let Some(servicepack) = raw.servicepack {
            builder = builder.property("Fix.ServicePack", servicepack.to_string());
        }

        let fields_by_name: HashMap<&str, &QfField> = raw
            .fields
            .fields
            .iter()
            .map(|field| (field.name.as_str(), field))
            .collect();

        for field in &raw.fields.fields {
            let mut def = FieldDef::new(field.number, &field.name, &field.data_type);
            if let Some(values) = &field.values {
                // Inline values become an enumeration named after the field.
                builder = builder.enumeration(EnumerationDef::new(
                    &field.name,
                    values
                        .iter()
                        .map(|value| Enumerator {
                            value: value.value_enum.clone(),
                            description: Some(value.description.clone()),
                        })
                        .collect(),
                ));
                def = def.with_enumeration(&field.name);
            }
            if matches!(field.data_type.as_str(), "DATA" | "XMLDATA")
                && let Some(length_field) = length_field_name(&field.name, &fields_by_name)
            {
                def = def.with_length_field(length_field);
            }
            builder = builder.field(def);
        }

        for component in raw.components.components {
            builder = builder.block(BlockDef::component(
                component.name,
                refs_from_members(&component.members),
            ));
        }

        for message in raw.messages.messages {
            let mut def = MessageDef::new(
                message.name,
                message.msg_type,
                refs_from_members(&message.members),
            );
            if let Some(msg_cat) = message.msg_cat {
                def = def.with_category(msg_cat);
            }
            builder = builder.message(def);
        }

        builder.build()
    }
}

impl Dictionary {
    /// Parses a QuickFIX-format XML document.
    pub fn from_quickfix_str(xml: &str) -> Result<Dictionary, Error> {
        let raw: QfDictionary = quick_xml::de::from_str(xml)?;
        raw.try_into()
    }

    /// Reads and parses a QuickFIX-format XML file.
    pub fn from_quickfix_file(path: impl AsRef<Path>) -> Result<Dictionary, Error> {
        let xml = fs::read_to_string(path)?;
        Dictionary::from_quickfix_str(&xml)
    }
}
