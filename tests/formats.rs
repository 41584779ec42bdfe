//! Per-format wire coverage: byte array addressing modes, strings, structs,
//! addresses, and TLV records.

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};

use uuid::Uuid;
use wirecmd::builder::build_response;
use wirecmd::{
    FieldFormat, FieldSelection, FieldSpec, Message, MessageCodec, MessageVariant, MessageView,
    Schema, StringEncoding, StructDef, Tlv, Value, VariantKind,
};

fn service() -> Uuid {
    Uuid::from_bytes([0x53; 16])
}

fn values(entries: &[(&str, Value)]) -> HashMap<String, Value> {
    entries
        .iter()
        .map(|(name, v)| (name.to_string(), v.clone()))
        .collect()
}

fn response_codec(schema: Schema, fields: Vec<FieldSpec>) -> MessageCodec {
    let message =
        Message::new(service(), 1, "Test").with_response(MessageVariant::new("1.0", fields));
    MessageCodec::new(&message, &schema).unwrap()
}

fn round_trip<'a>(
    codec: &MessageCodec,
    raw: &'a [u8],
) -> wirecmd::ParsedFields<'a> {
    codec
        .parse(raw, VariantKind::Response, FieldSelection::All)
        .unwrap()
}

fn pair_schema() -> Schema {
    let mut schema = Schema::new();
    schema
        .add_struct(StructDef {
            name: "Pair".to_string(),
            fields: vec![
                FieldSpec::new("A", FieldFormat::Uint32),
                FieldSpec::new("B", FieldFormat::Uint32),
            ],
        })
        .unwrap();
    schema
}

fn pair(a: u32, b: u32) -> wirecmd::StructValue {
    let mut m = wirecmd::StructValue::new();
    m.insert("A".to_string(), Value::U32(a));
    m.insert("B".to_string(), Value::U32(b));
    m
}

#[test]
fn integer_and_uuid_formats() {
    let id = Uuid::from_bytes([0x0f; 16]);
    let codec = response_codec(
        Schema::new(),
        vec![
            FieldSpec::new("Small", FieldFormat::Uint16),
            FieldSpec::new("Wide", FieldFormat::Uint64),
            FieldSpec::new("DeviceId", FieldFormat::Uuid),
        ],
    );
    let raw = build_response(
        codec.message(),
        codec.schema(),
        1,
        0,
        &values(&[
            ("Small", Value::U16(0x1234)),
            ("Wide", Value::U64(0x1_0000_0001)),
            ("DeviceId", Value::Uuid(id)),
        ]),
    )
    .unwrap();

    let parsed = round_trip(&codec, &raw);
    assert_eq!(parsed.get("Small").and_then(|v| v.as_u64()), Some(0x1234));
    assert_eq!(
        parsed.get("Wide").and_then(|v| v.as_u64()),
        Some(0x1_0000_0001)
    );
    assert_eq!(
        parsed.get("DeviceId"),
        Some(&wirecmd::FieldView::Uuid(id))
    );
}

#[test]
fn fixed_byte_array_pads_short_input() {
    let codec = response_codec(
        Schema::new(),
        vec![FieldSpec::new("Mac", FieldFormat::ByteArray).with_array_size(4)],
    );
    let raw = build_response(
        codec.message(),
        codec.schema(),
        1,
        0,
        &values(&[("Mac", Value::Bytes(vec![0xde, 0xad]))]),
    )
    .unwrap();

    let parsed = round_trip(&codec, &raw);
    assert_eq!(
        parsed.get("Mac").and_then(|v| v.as_bytes()),
        Some(&[0xde, 0xad, 0x00, 0x00][..])
    );
}

#[test]
fn ref_byte_array_round_trip() {
    let codec = response_codec(
        Schema::new(),
        vec![FieldSpec::new("Data", FieldFormat::RefByteArray)],
    );
    let raw = build_response(
        codec.message(),
        codec.schema(),
        1,
        0,
        &values(&[("Data", Value::Bytes(vec![1, 2, 3]))]),
    )
    .unwrap();
    let parsed = round_trip(&codec, &raw);
    assert_eq!(parsed.get("Data").and_then(|v| v.as_bytes()), Some(&[1, 2, 3][..]));

    // Missing value encodes a 0/0 header and decodes empty.
    let raw = build_response(codec.message(), codec.schema(), 1, 0, &HashMap::new()).unwrap();
    let parsed = round_trip(&codec, &raw);
    assert_eq!(parsed.get("Data").and_then(|v| v.as_bytes()), Some(&[][..]));
}

#[test]
fn uicc_ref_byte_array_swaps_header_order() {
    let codec = response_codec(
        Schema::new(),
        vec![FieldSpec::new("Data", FieldFormat::UiccRefByteArray)],
    );
    let raw = build_response(
        codec.message(),
        codec.schema(),
        1,
        0,
        &values(&[("Data", Value::Bytes(vec![9, 8, 7]))]),
    )
    .unwrap();

    let payload = MessageView::new(&raw).unwrap().payload_region().unwrap();
    // length first, then offset past the 8-byte fixed part
    assert_eq!(&payload[0..4], &[3, 0, 0, 0]);
    assert_eq!(&payload[4..8], &[8, 0, 0, 0]);
    assert_eq!(&payload[8..11], &[9, 8, 7]);

    let parsed = round_trip(&codec, &raw);
    assert_eq!(parsed.get("Data").and_then(|v| v.as_bytes()), Some(&[9, 8, 7][..]));
}

#[test]
fn length_prefixed_byte_array_has_no_offset_word() {
    let codec = response_codec(
        Schema::new(),
        vec![FieldSpec::new("Data", FieldFormat::RefByteArrayNoOffset)],
    );
    let raw = build_response(
        codec.message(),
        codec.schema(),
        1,
        0,
        &values(&[("Data", Value::Bytes(vec![9, 8, 7]))]),
    )
    .unwrap();

    let payload = MessageView::new(&raw).unwrap().payload_region().unwrap();
    assert_eq!(&payload[0..4], &[3, 0, 0, 0]);
    assert_eq!(&payload[4..7], &[9, 8, 7]);

    let parsed = round_trip(&codec, &raw);
    assert_eq!(parsed.get("Data").and_then(|v| v.as_bytes()), Some(&[9, 8, 7][..]));
}

#[test]
fn unsized_byte_array_takes_the_tail() {
    let codec = response_codec(
        Schema::new(),
        vec![
            FieldSpec::new("Head", FieldFormat::Uint32),
            FieldSpec::new("Data", FieldFormat::UnsizedByteArray),
        ],
    );
    let raw = build_response(
        codec.message(),
        codec.schema(),
        1,
        0,
        &values(&[
            ("Head", Value::U32(1)),
            ("Data", Value::Bytes(vec![5, 6, 7, 8])),
        ]),
    )
    .unwrap();

    let parsed = round_trip(&codec, &raw);
    assert_eq!(
        parsed.get("Data").and_then(|v| v.as_bytes()),
        Some(&[5, 6, 7, 8][..])
    );
}

#[test]
fn inline_u32_array_round_trip() {
    let codec = response_codec(
        Schema::new(),
        vec![
            FieldSpec::new("Count", FieldFormat::Uint32),
            FieldSpec::new("Vals", FieldFormat::Uint32Array).with_array_size_field("Count"),
        ],
    );
    let raw = build_response(
        codec.message(),
        codec.schema(),
        1,
        0,
        &values(&[
            ("Count", Value::U32(3)),
            ("Vals", Value::U32Array(vec![10, 20, 30])),
        ]),
    )
    .unwrap();

    let parsed = round_trip(&codec, &raw);
    assert_eq!(
        parsed.get("Vals"),
        Some(&wirecmd::FieldView::U32Array(vec![10, 20, 30]))
    );
}

#[test]
fn huge_declared_count_fails_cleanly() {
    let codec = response_codec(
        Schema::new(),
        vec![
            FieldSpec::new("Count", FieldFormat::Uint32),
            FieldSpec::new("Vals", FieldFormat::Uint32Array).with_array_size_field("Count"),
        ],
    );

    // A count word far beyond what the payload could hold must surface a
    // decode error on the array, not a giant allocation.
    let raw = wirecmd::wire::response_new(1, &service(), 1, 0, &[0xff, 0xff, 0xff, 0xff]);
    let err = codec
        .parse(&raw, VariantKind::Response, FieldSelection::All)
        .unwrap_err();
    assert!(err.to_string().contains("Vals"), "got: {}", err);
}

#[test]
fn utf8_string_round_trip() {
    let codec = response_codec(
        Schema::new(),
        vec![FieldSpec::new("Name", FieldFormat::String).with_encoding(StringEncoding::Utf8)],
    );
    let raw = build_response(
        codec.message(),
        codec.schema(),
        1,
        0,
        &values(&[("Name", Value::Str("héllo".to_string()))]),
    )
    .unwrap();
    let parsed = round_trip(&codec, &raw);
    assert_eq!(parsed.get("Name").and_then(|v| v.as_str()), Some("héllo"));
}

#[test]
fn empty_string_has_zero_header() {
    let codec = response_codec(
        Schema::new(),
        vec![FieldSpec::new("Name", FieldFormat::String)],
    );
    let raw = build_response(
        codec.message(),
        codec.schema(),
        1,
        0,
        &values(&[("Name", Value::Str(String::new()))]),
    )
    .unwrap();

    let payload = MessageView::new(&raw).unwrap().payload_region().unwrap();
    assert_eq!(payload, &[0u8; 8][..]);

    let parsed = round_trip(&codec, &raw);
    assert_eq!(parsed.get("Name").and_then(|v| v.as_str()), Some(""));
}

#[test]
fn inline_struct_with_variable_tail() {
    let mut schema = Schema::new();
    schema
        .add_struct(StructDef {
            name: "Profile".to_string(),
            fields: vec![
                FieldSpec::new("Id", FieldFormat::Uint32),
                FieldSpec::new("Name", FieldFormat::String),
            ],
        })
        .unwrap();
    let codec = response_codec(
        schema,
        vec![FieldSpec::new("Profile", FieldFormat::Struct).with_struct_type("Profile")],
    );

    let mut interior = wirecmd::StructValue::new();
    interior.insert("Id".to_string(), Value::U32(7));
    interior.insert("Name".to_string(), Value::Str("apn".to_string()));
    let raw = build_response(
        codec.message(),
        codec.schema(),
        1,
        0,
        &values(&[("Profile", Value::Struct(interior.clone()))]),
    )
    .unwrap();

    let parsed = round_trip(&codec, &raw);
    match parsed.get("Profile") {
        Some(wirecmd::FieldView::Struct(m)) => {
            assert_eq!(m.get("Id"), Some(&Value::U32(7)));
            assert_eq!(m.get("Name"), Some(&Value::Str("apn".to_string())));
        }
        other => panic!("unexpected view: {:?}", other),
    }
}

#[test]
fn ms_struct_offset_zero_is_none() {
    let codec = response_codec(
        pair_schema(),
        vec![FieldSpec::new("P", FieldFormat::MsStruct).with_struct_type("Pair")],
    );

    let raw = build_response(
        codec.message(),
        codec.schema(),
        1,
        0,
        &values(&[("P", Value::Struct(pair(1, 2)))]),
    )
    .unwrap();
    let parsed = round_trip(&codec, &raw);
    assert_eq!(
        parsed.get("P"),
        Some(&wirecmd::FieldView::MsStruct(Some(pair(1, 2))))
    );

    let raw = build_response(codec.message(), codec.schema(), 1, 0, &HashMap::new()).unwrap();
    let parsed = round_trip(&codec, &raw);
    assert_eq!(parsed.get("P"), Some(&wirecmd::FieldView::MsStruct(None)));
}

#[test]
fn struct_array_uses_fixed_stride() {
    let codec = response_codec(
        pair_schema(),
        vec![
            FieldSpec::new("Count", FieldFormat::Uint32),
            FieldSpec::new("Entries", FieldFormat::StructArray)
                .with_struct_type("Pair")
                .with_array_size_field("Count"),
        ],
    );
    let raw = build_response(
        codec.message(),
        codec.schema(),
        1,
        0,
        &values(&[
            ("Count", Value::U32(2)),
            ("Entries", Value::StructArray(vec![pair(1, 2), pair(3, 4)])),
        ]),
    )
    .unwrap();

    let parsed = round_trip(&codec, &raw);
    assert_eq!(
        parsed.get("Entries"),
        Some(&wirecmd::FieldView::StructArray(vec![pair(1, 2), pair(3, 4)]))
    );
}

#[test]
fn ref_struct_array_reads_per_element_entries() {
    let codec = response_codec(
        pair_schema(),
        vec![
            FieldSpec::new("Count", FieldFormat::Uint32),
            FieldSpec::new("Entries", FieldFormat::RefStructArray)
                .with_struct_type("Pair")
                .with_array_size_field("Count"),
        ],
    );
    let raw = build_response(
        codec.message(),
        codec.schema(),
        1,
        0,
        &values(&[
            ("Count", Value::U32(2)),
            ("Entries", Value::StructArray(vec![pair(5, 6), pair(7, 8)])),
        ]),
    )
    .unwrap();

    let parsed = round_trip(&codec, &raw);
    assert_eq!(
        parsed.get("Entries"),
        Some(&wirecmd::FieldView::StructArray(vec![pair(5, 6), pair(7, 8)]))
    );
}

#[test]
fn ms_struct_array_self_reports_count() {
    let codec = response_codec(
        pair_schema(),
        vec![FieldSpec::new("Entries", FieldFormat::MsStructArray).with_struct_type("Pair")],
    );

    let raw = build_response(
        codec.message(),
        codec.schema(),
        1,
        0,
        &values(&[("Entries", Value::StructArray(vec![pair(1, 1), pair(2, 2)]))]),
    )
    .unwrap();
    let parsed = round_trip(&codec, &raw);
    assert_eq!(
        parsed.get("Entries"),
        Some(&wirecmd::FieldView::MsStructArray(Some(vec![
            pair(1, 1),
            pair(2, 2)
        ])))
    );

    let raw = build_response(codec.message(), codec.schema(), 1, 0, &HashMap::new()).unwrap();
    let parsed = round_trip(&codec, &raw);
    assert_eq!(
        parsed.get("Entries"),
        Some(&wirecmd::FieldView::MsStructArray(None))
    );
}

#[test]
fn ref_ipv4_offset_zero_is_absent() {
    let codec = response_codec(
        Schema::new(),
        vec![FieldSpec::new("Addr", FieldFormat::RefIpv4)],
    );

    let addr = Ipv4Addr::new(10, 0, 0, 1);
    let raw = build_response(
        codec.message(),
        codec.schema(),
        1,
        0,
        &values(&[("Addr", Value::Ipv4(addr))]),
    )
    .unwrap();
    let parsed = round_trip(&codec, &raw);
    assert_eq!(parsed.get("Addr"), Some(&wirecmd::FieldView::Ipv4(Some(addr))));

    let raw = build_response(codec.message(), codec.schema(), 1, 0, &HashMap::new()).unwrap();
    let parsed = round_trip(&codec, &raw);
    assert_eq!(parsed.get("Addr"), Some(&wirecmd::FieldView::Ipv4(None)));
}

#[test]
fn address_arrays_round_trip() {
    let codec = response_codec(
        Schema::new(),
        vec![
            FieldSpec::new("V4Count", FieldFormat::Uint32),
            FieldSpec::new("V4", FieldFormat::Ipv4Array).with_array_size_field("V4Count"),
            FieldSpec::new("V6Count", FieldFormat::Uint32),
            FieldSpec::new("V6", FieldFormat::Ipv6Array).with_array_size_field("V6Count"),
        ],
    );
    let v4 = vec![Ipv4Addr::new(8, 8, 8, 8), Ipv4Addr::new(1, 1, 1, 1)];
    let v6 = vec![Ipv6Addr::LOCALHOST];
    let raw = build_response(
        codec.message(),
        codec.schema(),
        1,
        0,
        &values(&[
            ("V4Count", Value::U32(2)),
            ("V4", Value::Ipv4Array(v4.clone())),
            ("V6Count", Value::U32(1)),
            ("V6", Value::Ipv6Array(v6.clone())),
        ]),
    )
    .unwrap();

    let parsed = round_trip(&codec, &raw);
    assert_eq!(parsed.get("V4"), Some(&wirecmd::FieldView::Ipv4Array(v4)));
    assert_eq!(parsed.get("V6"), Some(&wirecmd::FieldView::Ipv6Array(v6)));
}

#[test]
fn tlv_record_round_trip() {
    let codec = response_codec(Schema::new(), vec![FieldSpec::new("Rec", FieldFormat::Tlv)]);
    let raw = build_response(
        codec.message(),
        codec.schema(),
        1,
        0,
        &values(&[("Rec", Value::Tlv(Tlv::new(0x10, vec![1, 2, 3])))]),
    )
    .unwrap();

    let parsed = round_trip(&codec, &raw);
    match parsed.get("Rec") {
        Some(wirecmd::FieldView::Tlv(t)) => {
            assert_eq!(t.tlv_type, 0x10);
            assert_eq!(t.data, vec![1, 2, 3]);
        }
        other => panic!("unexpected view: {:?}", other),
    }
}

#[test]
fn tlv_string_round_trip() {
    let codec = response_codec(
        Schema::new(),
        vec![FieldSpec::new("Name", FieldFormat::TlvString)],
    );
    let raw = build_response(
        codec.message(),
        codec.schema(),
        1,
        0,
        &values(&[("Name", Value::Str("net".to_string()))]),
    )
    .unwrap();
    let parsed = round_trip(&codec, &raw);
    assert_eq!(
        parsed.get("Name"),
        Some(&wirecmd::FieldView::TlvString("net".to_string()))
    );
}

#[test]
fn tlv_u16_array_round_trip() {
    let codec = response_codec(
        Schema::new(),
        vec![FieldSpec::new("Ids", FieldFormat::TlvUint16Array)],
    );
    let raw = build_response(
        codec.message(),
        codec.schema(),
        1,
        0,
        &values(&[("Ids", Value::Tlv(Tlv::new_u16_array(3, &[5, 6])))]),
    )
    .unwrap();
    let parsed = round_trip(&codec, &raw);
    assert_eq!(
        parsed.get("Ids"),
        Some(&wirecmd::FieldView::TlvU16Array(vec![5, 6]))
    );
}

#[test]
fn tlv_list_reads_until_end_of_payload() {
    let codec = response_codec(
        Schema::new(),
        vec![FieldSpec::new("Unnamed", FieldFormat::TlvList)],
    );
    let records = vec![Tlv::new(1, vec![1]), Tlv::new(2, vec![2, 2])];
    let raw = build_response(
        codec.message(),
        codec.schema(),
        1,
        0,
        &values(&[("Unnamed", Value::TlvList(records.clone()))]),
    )
    .unwrap();
    let parsed = round_trip(&codec, &raw);
    assert_eq!(
        parsed.get("Unnamed"),
        Some(&wirecmd::FieldView::TlvList(records))
    );
}
