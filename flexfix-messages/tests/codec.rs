use std::sync::Arc;

use chrono::{TimeZone, Utc};
use flexfix_core::{Element, FixMessage, TagNum};
use flexfix_dictionary::{
    DictionaryBuilder, ElementRef, FieldDef, MessageDef, VersionRegistry,
};
use flexfix_messages::{Parser, ParserStatus, body_length, checksum, finalize_at, serialize};

fn standard_header() -> Vec<ElementRef> {
    vec![
        ElementRef::field("BeginString", true),
        ElementRef::field("BodyLength", true),
        ElementRef::field("MsgType", true),
        ElementRef::field("SenderCompID", true),
        ElementRef::field("TargetCompID", true),
        ElementRef::field("MsgSeqNum", true),
        ElementRef::field("SendingTime", true),
    ]
}

fn header_fields(builder: DictionaryBuilder) -> DictionaryBuilder {
    builder
        .field(FieldDef::new(8, "BeginString", "String"))
        .field(FieldDef::new(9, "BodyLength", "Length"))
        .field(FieldDef::new(35, "MsgType", "String"))
        .field(FieldDef::new(49, "SenderCompID", "String"))
        .field(FieldDef::new(56, "TargetCompID", "String"))
        .field(FieldDef::new(34, "MsgSeqNum", "SeqNum"))
        .field(FieldDef::new(52, "SendingTime", "UtcTimestamp"))
        .field(FieldDef::new(10, "CheckSum", "String"))
}

fn fix44_dictionary() -> Arc<flexfix_dictionary::Dictionary> {
    let builder = DictionaryBuilder::new()
        .property("Type", "FIX")
        .property("Fix.Major", "4")
        .property("Fix.Minor", "4")
        .header(standard_header())
        .trailer(vec![ElementRef::field("CheckSum", true)]);
    let builder = header_fields(builder)
        .field(FieldDef::new(98, "EncryptMethod", "Int"))
        .field(FieldDef::new(108, "HeartBtInt", "Int"))
        .field(FieldDef::new(66, "ListID", "String"))
        .field(FieldDef::new(73, "NoOrders", "NumInGroup"))
        .field(FieldDef::new(11, "ClOrdID", "String"))
        .field(FieldDef::new(67, "ListSeqNo", "Int"))
        .field(FieldDef::new(78, "NoAllocs", "NumInGroup"))
        .field(FieldDef::new(79, "AllocAccount", "String"))
        .field(FieldDef::new(80, "AllocQty", "Qty"))
        .field(FieldDef::new(539, "NoNestedPartyIDs", "NumInGroup"))
        .field(FieldDef::new(524, "NestedPartyID", "String"))
        .field(FieldDef::new(538, "NestedPartyRole", "Int"))
        .field(FieldDef::new(148, "Headline", "String"))
        .field(FieldDef::new(95, "RawDataLength", "Length"))
        .field(FieldDef::new(96, "RawData", "Data").with_length_field("RawDataLength"));

    let dictionary = builder
        .message(MessageDef::new(
            "Logon",
            "A",
            vec![
                ElementRef::field("EncryptMethod", true),
                ElementRef::field("HeartBtInt", true),
            ],
        ))
        .message(MessageDef::new(
            "NewOrderList",
            "E",
            vec![
                ElementRef::field("ListID", true),
                ElementRef::group(
                    "NoOrders",
                    true,
                    vec![
                        ElementRef::field("ClOrdID", true),
                        ElementRef::field("ListSeqNo", true),
                        ElementRef::group(
                            "NoAllocs",
                            false,
                            vec![
                                ElementRef::field("AllocAccount", true),
                                ElementRef::field("AllocQty", false),
                                ElementRef::group(
                                    "NoNestedPartyIDs",
                                    false,
                                    vec![
                                        ElementRef::field("NestedPartyID", true),
                                        ElementRef::field("NestedPartyRole", false),
                                    ],
                                ),
                            ],
                        ),
                    ],
                ),
            ],
        ))
        .message(MessageDef::new(
            "News",
            "B",
            vec![
                ElementRef::field("Headline", true),
                ElementRef::field("RawDataLength", false),
                ElementRef::field("RawData", false),
            ],
        ))
        .build()
        .unwrap();
    Arc::new(dictionary)
}

fn fixt11_dictionary() -> Arc<flexfix_dictionary::Dictionary> {
    let mut header = standard_header();
    header.push(ElementRef::field("ApplVerID", false));
    let builder = DictionaryBuilder::new()
        .property("Type", "FIXT")
        .property("Fix.Major", "1")
        .property("Fix.Minor", "1")
        .header(header)
        .trailer(vec![ElementRef::field("CheckSum", true)]);
    let dictionary = header_fields(builder)
        .field(FieldDef::new(1128, "ApplVerID", "String"))
        .field(FieldDef::new(98, "EncryptMethod", "Int"))
        .field(FieldDef::new(108, "HeartBtInt", "Int"))
        .field(FieldDef::new(1137, "DefaultApplVerID", "String"))
        .message(MessageDef::new(
            "Logon",
            "A",
            vec![
                ElementRef::field("EncryptMethod", true),
                ElementRef::field("HeartBtInt", true),
                ElementRef::field("DefaultApplVerID", true),
            ],
        ))
        .build()
        .unwrap();
    Arc::new(dictionary)
}

fn fix50sp2_dictionary() -> Arc<flexfix_dictionary::Dictionary> {
    let dictionary = DictionaryBuilder::new()
        .property("Type", "FIX")
        .property("Fix.Major", "5")
        .property("Fix.Minor", "0")
        .field(FieldDef::new(11, "ClOrdID", "String"))
        .field(FieldDef::new(55, "Symbol", "String"))
        .field(FieldDef::new(54, "Side", "Char"))
        .field(FieldDef::new(38, "OrderQty", "Qty"))
        .field(FieldDef::new(453, "NoPartyIDs", "NumInGroup"))
        .field(FieldDef::new(448, "PartyID", "String"))
        .field(FieldDef::new(452, "PartyRole", "Int"))
        .message(MessageDef::new(
            "NewOrderSingle",
            "D",
            vec![
                ElementRef::field("ClOrdID", true),
                ElementRef::field("Symbol", true),
                ElementRef::field("Side", true),
                ElementRef::field("OrderQty", false),
                ElementRef::group(
                    "NoPartyIDs",
                    false,
                    vec![
                        ElementRef::field("PartyID", true),
                        ElementRef::field("PartyRole", false),
                    ],
                ),
            ],
        ))
        .build()
        .unwrap();
    Arc::new(dictionary)
}

fn registry() -> Arc<VersionRegistry> {
    let mut registry = VersionRegistry::with_standard_records();
    registry.add_dictionary("FIX.4.4", fix44_dictionary());
    registry.add_dictionary("FIXT.1.1", fixt11_dictionary());
    registry.add_dictionary("FIX.5.0SP2", fix50sp2_dictionary());
    Arc::new(registry)
}

fn wire(msg: &str) -> Vec<u8> {
    msg.replace('|', "\x01").into_bytes()
}

fn tags_of(section: &flexfix_core::ElementList) -> Vec<TagNum> {
    section.iter().map(Element::tag).collect()
}

fn finalized_logon() -> Vec<u8> {
    let mut message = FixMessage::new();
    message.header.push_field(8, b"FIX.4.4".as_slice());
    message.header.push_field(9, b"0".as_slice());
    message.header.push_field(35, b"A".as_slice());
    message.header.push_field(34, b"1".as_slice());
    message.header.push_field(49, b"C".as_slice());
    message
        .header
        .push_field(52, b"20100101-00:00:00.000".as_slice());
    message.header.push_field(56, b"S".as_slice());
    message.body.push_field(98, b"0".as_slice());
    message.body.push_field(108, b"30".as_slice());
    message.trailer.push_field(10, b"000".as_slice());

    let sending_time = Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap();
    finalize_at(&mut message, sending_time).unwrap();
    serialize(&message)
}

#[test]
fn minimal_logon_sections() {
    let parser = Parser::new(registry());
    let buf = finalized_logon();
    let result = parser.parse(&buf, None, None, None);

    assert_eq!(result.status, ParserStatus::Complete);
    assert_eq!(result.consumed, buf.len());
    let message = result.message.unwrap();
    assert_eq!(tags_of(&message.header), [8, 9, 35, 34, 49, 52, 56]);
    assert_eq!(tags_of(&message.body), [98, 108]);
    assert_eq!(tags_of(&message.trailer), [10]);
}

#[test]
fn logon_roundtrip_reproduces_bytes() {
    let parser = Parser::new(registry());
    let buf = finalized_logon();
    let message = parser.parse(&buf, None, None, None).message.unwrap();
    assert_eq!(serialize(&message), buf);

    // Finalizing again with the same SendingTime is a fixed point.
    let mut message = message;
    let sending_time = Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap();
    finalize_at(&mut message, sending_time).unwrap();
    assert_eq!(serialize(&message), buf);
}

#[test]
fn body_length_and_checksum_identities() {
    let parser = Parser::new(registry());
    let buf = finalized_logon();
    let message = parser.parse(&buf, None, None, None).message.unwrap();

    let announced_length: u32 = std::str::from_utf8(message.header.field_content(9).unwrap())
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(announced_length, body_length(&message).unwrap());

    let announced_checksum = message.trailer.field_content(10).unwrap();
    assert_eq!(announced_checksum.len(), 3);
    let checksum_start = buf.len() - b"10=xxx\x01".len();
    let sum = buf[..checksum_start]
        .iter()
        .fold(0u8, |sum, byte| sum.wrapping_add(*byte));
    assert_eq!(checksum(&message), sum);
    assert_eq!(announced_checksum, format!("{sum:03}").as_bytes());
}

#[test]
fn repeating_group_two_instances() {
    let parser = Parser::new(registry());
    let buf = wire(
        "8=FIX.4.4|9=61|35=E|49=C|56=S|34=2|52=20100101-00:00:00.000|\
         66=LIST1|73=2|11=ORD1|67=1|11=ORD2|67=2|10=000|",
    );
    let result = parser.parse(&buf, None, None, None);
    assert_eq!(result.status, ParserStatus::Complete);

    let message = result.message.unwrap();
    let group = message.body.group(73).expect("group not parsed");
    assert_eq!(group.content(), b"2");
    assert_eq!(group.instances().len(), 2);
    assert_eq!(
        group.instances()[0].field_content(11),
        Some(b"ORD1".as_slice())
    );
    assert_eq!(
        group.instances()[1].field_content(11),
        Some(b"ORD2".as_slice())
    );
    assert_eq!(
        group.instances()[1].field_content(67),
        Some(b"2".as_slice())
    );

    // Group preservation: same instances, same order, same bytes.
    assert_eq!(serialize(&message), buf);
    let reparsed = parser.parse(&buf, None, None, None).message.unwrap();
    assert_eq!(reparsed, message);
}

#[test]
fn nested_groups_to_depth_three() {
    let parser = Parser::new(registry());
    let buf = wire(
        "8=FIX.4.4|9=0|35=E|49=C|56=S|34=3|52=20100101-00:00:00.000|\
         66=L1|73=1|11=A|67=1|78=2|79=ACC1|80=10|539=1|524=X|538=1|79=ACC2|80=20|10=000|",
    );
    let result = parser.parse(&buf, None, None, None);
    assert_eq!(result.status, ParserStatus::Complete);

    let message = result.message.unwrap();
    let orders = message.body.group(73).unwrap();
    assert_eq!(orders.instances().len(), 1);

    let allocs = orders.instances()[0].group(78).unwrap();
    assert_eq!(allocs.instances().len(), 2);
    assert_eq!(
        allocs.instances()[0].field_content(79),
        Some(b"ACC1".as_slice())
    );
    assert_eq!(
        allocs.instances()[1].field_content(79),
        Some(b"ACC2".as_slice())
    );

    let nested_parties = allocs.instances()[0].group(539).unwrap();
    assert_eq!(nested_parties.instances().len(), 1);
    assert_eq!(
        nested_parties.instances()[0].field_content(524),
        Some(b"X".as_slice())
    );
    // The second alloc instance has no nested parties.
    assert!(allocs.instances()[1].group(539).is_none());

    // Depth-3 structure survives the round trip byte for byte.
    assert_eq!(serialize(&message), buf);
    assert_eq!(parser.parse(&buf, None, None, None).message.unwrap(), message);
}

#[test]
fn length_coded_data_field_with_soh_content() {
    let parser = Parser::new(registry());
    let buf = wire(
        "8=FIX.4.4|9=0|35=B|49=C|56=S|34=4|52=20100101-00:00:00.000|\
         148=hello|95=5|96=ab\x01cd|10=000|",
    );
    let result = parser.parse(&buf, None, None, None);
    assert_eq!(result.status, ParserStatus::Complete);

    let message = result.message.unwrap();
    assert_eq!(
        message.body.field_content(96),
        Some(b"ab\x01cd".as_slice())
    );
    assert_eq!(serialize(&message), buf);
    assert_eq!(parser.parse(&buf, None, None, None).message.unwrap(), message);
}

#[test]
fn data_field_without_length_falls_back_to_soh() {
    let parser = Parser::new(registry());
    let buf = wire(
        "8=FIX.4.4|9=0|35=B|49=C|56=S|34=5|52=20100101-00:00:00.000|\
         148=hello|96=abc|10=000|",
    );
    let message = parser.parse(&buf, None, None, None).message.unwrap();
    assert_eq!(message.body.field_content(96), Some(b"abc".as_slice()));
}

#[test]
fn data_field_with_non_integer_length_falls_back_to_soh() {
    let parser = Parser::new(registry());
    let buf = wire(
        "8=FIX.4.4|9=0|35=B|49=C|56=S|34=6|52=20100101-00:00:00.000|\
         148=hello|95=zz|96=abc|10=000|",
    );
    let message = parser.parse(&buf, None, None, None).message.unwrap();
    assert_eq!(message.body.field_content(95), Some(b"zz".as_slice()));
    assert_eq!(message.body.field_content(96), Some(b"abc".as_slice()));
}

#[test]
fn framing_boundary_across_concatenated_messages() {
    let parser = Parser::new(registry());
    let first = finalized_logon();
    let second = finalized_logon();
    let mut buf = first.clone();
    buf.extend_from_slice(&second);

    let result_one = parser.parse(&buf, None, None, None);
    assert_eq!(result_one.status, ParserStatus::Complete);
    assert_eq!(result_one.consumed, first.len());

    let result_two = parser.parse(&buf[result_one.consumed..], None, None, None);
    assert_eq!(result_two.status, ParserStatus::Complete);
    assert_eq!(result_one.consumed + result_two.consumed, buf.len());
    assert_eq!(result_one.message, result_two.message);
}

#[test]
fn exhausted_on_every_strict_prefix() {
    let parser = Parser::new(registry());
    let buf = finalized_logon();
    for prefix_len in 0..buf.len() {
        let result = parser.parse(&buf[..prefix_len], None, None, None);
        assert_eq!(
            result.status,
            ParserStatus::Exhausted,
            "prefix of {prefix_len} bytes"
        );
        assert_eq!(result.consumed, 0);
    }
    assert_eq!(parser.parse(&buf, None, None, None).status, ParserStatus::Complete);
}

#[test]
fn begin_string_inside_message_is_incomplete() {
    let parser = Parser::new(registry());
    let buf = wire("8=FIX.4.4|9=30|8=FIX.4.4|9=20|35=A|10=000|");
    let result = parser.parse(&buf, None, None, None);
    assert_eq!(result.status, ParserStatus::Incomplete);
    assert_eq!(result.consumed, 0);
}

#[test]
fn malformed_tag_consumes_nothing() {
    let parser = Parser::new(registry());
    let buf = wire("8=FIX.4.4|x=1|10=000|");
    let result = parser.parse(&buf, None, None, None);
    assert_eq!(result.status, ParserStatus::Malformed);
    assert_eq!(result.consumed, 0);
}

#[test]
fn application_fallback_to_default_version() {
    let parser = Parser::new(registry());
    // No ApplVerID(1128): the application matcher has nothing to go on and
    // the body schema comes from the caller-supplied default.
    let buf = wire(
        "8=FIXT.1.1|9=0|35=D|49=C|56=S|34=7|52=20100101-00:00:00.000|\
         11=ORD1|55=EURUSD|54=1|453=1|448=BROKER|452=1|10=000|",
    );
    let result = parser.parse(&buf, None, None, Some("FIX.5.0SP2"));
    assert_eq!(result.status, ParserStatus::Complete);

    let message = result.message.unwrap();
    let parties = message.body.group(453).expect("schema-driven group");
    assert_eq!(parties.instances().len(), 1);
    assert_eq!(
        parties.instances()[0].field_content(448),
        Some(b"BROKER".as_slice())
    );
    assert_eq!(serialize(&message), buf);
}

#[test]
fn application_matcher_selects_dictionary_from_appl_ver_id() {
    let parser = Parser::new(registry());
    let buf = wire(
        "8=FIXT.1.1|9=0|35=D|49=C|56=S|34=8|52=20100101-00:00:00.000|1128=9|\
         11=ORD1|55=EURUSD|54=1|453=1|448=BROKER|452=1|10=000|",
    );
    // No default needed: ApplVerID=9 matches FIX.5.0SP2.
    let result = parser.parse(&buf, None, None, None);
    assert_eq!(result.status, ParserStatus::Complete);
    let message = result.message.unwrap();
    assert!(message.header.contains(1128));
    assert!(message.body.group(453).is_some());
}

#[test]
fn unknown_msg_type_collects_user_defined_fields() {
    let parser = Parser::new(registry());
    // Without a default, MsgType D resolves to no schema: the group count
    // tag is just another scalar field.
    let buf = wire(
        "8=FIXT.1.1|9=0|35=D|49=C|56=S|34=9|52=20100101-00:00:00.000|\
         11=ORD1|453=1|448=BROKER|10=000|",
    );
    let result = parser.parse(&buf, None, None, None);
    assert_eq!(result.status, ParserStatus::Complete);

    let message = result.message.unwrap();
    assert!(message.body.group(453).is_none());
    assert_eq!(message.body.field_content(453), Some(b"1".as_slice()));
    assert_eq!(tags_of(&message.body), [11, 453, 448]);
    assert_eq!(serialize(&message), buf);
}

#[test]
fn udf_in_known_body_is_kept() {
    let parser = Parser::new(registry());
    let buf = wire(
        "8=FIX.4.4|9=0|35=A|49=C|56=S|34=10|52=20100101-00:00:00.000|\
         98=0|9999=custom|108=30|10=000|",
    );
    let message = parser.parse(&buf, None, None, None).message.unwrap();
    assert_eq!(tags_of(&message.body), [98, 9999, 108]);
    assert_eq!(message.body.field_content(9999), Some(b"custom".as_slice()));
    assert_eq!(serialize(&message), buf);
}

#[test]
fn empty_group_count_yields_zero_instances() {
    let parser = Parser::new(registry());
    let buf = wire(
        "8=FIX.4.4|9=0|35=E|49=C|56=S|34=11|52=20100101-00:00:00.000|\
         66=L1|73=|10=000|",
    );
    let result = parser.parse(&buf, None, None, None);
    assert_eq!(result.status, ParserStatus::Complete);

    let message = result.message.unwrap();
    let group = message.body.group(73).unwrap();
    assert_eq!(group.content(), b"");
    assert!(group.instances().is_empty());
    assert_eq!(serialize(&message), buf);
}

#[test]
fn non_integer_group_count_is_tolerated() {
    let parser = Parser::new(registry());
    let buf = wire(
        "8=FIX.4.4|9=0|35=E|49=C|56=S|34=12|52=20100101-00:00:00.000|\
         66=L1|73=two|10=000|",
    );
    let result = parser.parse(&buf, None, None, None);
    assert_eq!(result.status, ParserStatus::Complete);
    let group = result.message.unwrap().body.group(73).cloned().unwrap();
    assert_eq!(group.content(), b"two");
    assert!(group.instances().is_empty());
}

#[test]
fn short_group_count_is_not_an_error() {
    let parser = Parser::new(registry());
    let buf = wire(
        "8=FIX.4.4|9=0|35=E|49=C|56=S|34=13|52=20100101-00:00:00.000|\
         66=L1|73=3|11=ORD1|67=1|10=000|",
    );
    let result = parser.parse(&buf, None, None, None);
    assert_eq!(result.status, ParserStatus::Complete);
    let message = result.message.unwrap();
    assert_eq!(message.body.group(73).unwrap().instances().len(), 1);
}

#[test]
fn stray_soh_between_instances_is_consumed() {
    let parser = Parser::new(registry());
    let buf = wire(
        "8=FIX.4.4|9=0|35=E|49=C|56=S|34=14|52=20100101-00:00:00.000|\
         66=L1|73=2|11=ORD1|67=1||11=ORD2|67=2|10=000|",
    );
    let result = parser.parse(&buf, None, None, None);
    assert_eq!(result.status, ParserStatus::Complete);
    let message = result.message.unwrap();
    assert_eq!(message.body.group(73).unwrap().instances().len(), 2);
}

#[test]
fn duplicate_tag_in_group_instance_is_malformed() {
    let parser = Parser::new(registry());
    let buf = wire(
        "8=FIX.4.4|9=0|35=E|49=C|56=S|34=15|52=20100101-00:00:00.000|\
         66=L1|73=1|11=ORD1|67=1|67=2|10=000|",
    );
    let result = parser.parse(&buf, None, None, None);
    assert_eq!(result.status, ParserStatus::Malformed);
    assert_eq!(result.consumed, 0);
}

#[test]
fn fixt_logon_uses_session_dictionary_body() {
    let parser = Parser::new(registry());
    let buf = wire(
        "8=FIXT.1.1|9=0|35=A|49=C|56=S|34=1|52=20100101-00:00:00.000|\
         98=0|108=30|1137=9|10=000|",
    );
    let result = parser.parse(&buf, None, None, None);
    assert_eq!(result.status, ParserStatus::Complete);
    let message = result.message.unwrap();
    assert_eq!(tags_of(&message.body), [98, 108, 1137]);
}
