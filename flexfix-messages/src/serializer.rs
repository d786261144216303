//! Message serialization and finalization.
//!
//! Serialization emits header, body and trailer elements in iteration
//! order as `tag=content<SOH>`, groups first emitting their own count
//! field and then each instance recursively. Nothing is re-ordered or
//! normalised, so a parsed message serializes back to its original bytes.
//!
//! [`finalize`] stamps the three computed fields: `SendingTime(52)`,
//! `BodyLength(9)` and `CheckSum(10)`.

use chrono::{DateTime, Utc};
use flexfix_core::{Element, FixMessage, Length, SOH, TagNum, tags};

/// Errors raised while encoding a message.
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    /// The message body is too large for the `BodyLength` field
    #[error("body length {0} exceeds the representable BodyLength range")]
    BodyLengthOverflow(usize),
}

/// Byte-oriented output writer for the FIX tag=value encoding.
pub struct Serializer {
    output: Vec<u8>,
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer {
    pub fn new() -> Serializer {
        Serializer { output: Vec::new() }
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn take(self) -> Vec<u8> {
        self.output
    }

    /// Emits `tag=content<SOH>`.
    pub fn serialize_field(&mut self, tag: TagNum, content: &[u8]) {
        let mut buffer = itoa::Buffer::new();
        self.output.extend_from_slice(buffer.format(tag).as_bytes());
        self.output.push(b'=');
        self.output.extend_from_slice(content);
        self.output.push(SOH);
    }

    /// Emits an element: a field as one `tag=content` pair, a group as its
    /// count field followed by every instance's elements.
    pub fn serialize_element(&mut self, element: &Element) {
        match element {
            Element::Field(field) => self.serialize_field(field.tag(), field.content()),
            Element::Group(group) => {
                self.serialize_field(group.tag(), group.content());
                for instance in group.instances() {
                    for element in instance.ordered_iter() {
                        self.serialize_element(element);
                    }
                }
            }
        }
    }
}

/// Canonical wire form of a message: header, body, trailer, in iteration
/// order.
pub fn serialize(message: &FixMessage) -> Vec<u8> {
    let mut serializer = Serializer::new();
    for section in [&message.header, &message.body, &message.trailer] {
        for element in section.ordered_iter() {
            serializer.serialize_element(element);
        }
    }
    serializer.take()
}

fn decimal_len(tag: TagNum) -> usize {
    let mut buffer = itoa::Buffer::new();
    buffer.format(tag).len()
}

/// Encoded size of one element: `len(tag) + 1 + len(content) + 1`, groups
/// adding their instances recursively.
fn encoded_len(element: &Element) -> usize {
    match element {
        Element::Field(field) => decimal_len(field.tag()) + 1 + field.content().len() + 1,
        Element::Group(group) => {
            let mut len = decimal_len(group.tag()) + 1 + group.content().len() + 1;
            for instance in group.instances() {
                for element in instance.ordered_iter() {
                    len += encoded_len(element);
                }
            }
            len
        }
    }
}

/// `BodyLength(9)` value of a message: the byte count of the serialized
/// form from just after the `BodyLength` field's SOH up to the first byte
/// of `CheckSum(10)`.
pub fn body_length(message: &FixMessage) -> Result<Length, EncodingError> {
    let mut total = 0usize;
    let mut past_body_length = false;
    for element in message.header.ordered_iter() {
        if past_body_length {
            total += encoded_len(element);
        }
        if element.tag() == tags::BODY_LENGTH {
            past_body_length = true;
        }
    }
    for element in message.body.ordered_iter() {
        total += encoded_len(element);
    }
    for element in message.trailer.ordered_iter() {
        if element.tag() == tags::CHECK_SUM {
            break;
        }
        total += encoded_len(element);
    }
    Length::try_from(total).map_err(|_| EncodingError::BodyLengthOverflow(total))
}

/// `CheckSum(10)` value of a message: the unsigned byte sum of the
/// serialized form up to but excluding the `CheckSum` field, modulo 256.
pub fn checksum(message: &FixMessage) -> u8 {
    let mut serializer = Serializer::new();
    'sections: for section in [&message.header, &message.body, &message.trailer] {
        for element in section.ordered_iter() {
            if element.tag() == tags::CHECK_SUM {
                break 'sections;
            }
            serializer.serialize_element(element);
        }
    }
    serializer
        .output()
        .iter()
        .fold(0u8, |sum, byte| sum.wrapping_add(*byte))
}

/// Stamps `SendingTime(52)` with the current UTC time, then writes
/// `BodyLength(9)` and `CheckSum(10)`. Existing fields are overwritten in
/// place; missing ones are appended to their section.
pub fn finalize(message: &mut FixMessage) -> Result<(), EncodingError> {
    finalize_at(message, Utc::now())
}

/// [`finalize`] with an explicit `SendingTime`.
pub fn finalize_at(
    message: &mut FixMessage,
    sending_time: DateTime<Utc>,
) -> Result<(), EncodingError> {
    message.header.set_field(
        tags::SENDING_TIME,
        sending_time
            .format("%Y%m%d-%H:%M:%S%.3f")
            .to_string()
            .into_bytes(),
    );

    let length = body_length(message)?;
    let mut buffer = itoa::Buffer::new();
    message
        .header
        .set_field(tags::BODY_LENGTH, buffer.format(length).as_bytes());

    let checksum = checksum(message);
    message
        .trailer
        .set_field(tags::CHECK_SUM, format!("{checksum:03}").into_bytes());
    Ok(())
}
