//! End-to-end record marshaling through the public API.
//!
//! Run with: cargo test --test record_roundtrip

use std::sync::Arc;

use chrono::NaiveDate;
use recwire::{
    DefaultValue, Error, FieldLayout, FieldType, FieldValue, LobLocator, RecordCodec,
    RecordFormat, WireConverter,
};

fn codec(format: RecordFormat) -> RecordCodec {
    RecordCodec::new(Arc::new(format), Arc::new(WireConverter::big_endian()))
}

/// A static format covering every fixed-width type plus a variable slot.
fn inventory_format() -> RecordFormat {
    RecordFormat::with_key_fields(
        "inventory",
        vec![
            FieldLayout::new("item_id", FieldType::Int64),
            FieldLayout::sized("warehouse", FieldType::Text, 4),
            FieldLayout::new("quantity", FieldType::Int32)
                .with_default(DefaultValue::Value(FieldValue::Int32(1))),
            FieldLayout::new("unit_price", FieldType::Float64),
            FieldLayout::variable("description", FieldType::Text, 40),
            FieldLayout::new("updated_at", FieldType::Timestamp)
                .with_default(DefaultValue::CurrentTimestamp),
        ],
        vec![0, 1],
    )
    .unwrap()
}

const INVENTORY_WIRE_LEN: usize = 8 + 4 + 4 + 8 + 42 + 8;

#[test]
fn test_round_trip_preserves_every_field() {
    let codec = codec(inventory_format());
    let mut record = codec.initialize_defaults().unwrap();

    record.set_field(0, FieldValue::Int64(900_100_200)).unwrap();
    record.set_field(1, FieldValue::Text("FRA1".into())).unwrap();
    record.set_field(2, FieldValue::Int32(250)).unwrap();
    record.set_field(3, FieldValue::Float64(19.99)).unwrap();
    record
        .set_field(4, FieldValue::Text("winter stock, aisle 4".into()))
        .unwrap();
    let updated = NaiveDate::from_ymd_opt(2025, 3, 14)
        .unwrap()
        .and_hms_micro_opt(9, 26, 53, 589_793)
        .unwrap();
    record.set_field(5, FieldValue::Timestamp(updated)).unwrap();

    let wire = codec.encode(&mut record).unwrap();
    assert_eq!(wire.len(), INVENTORY_WIRE_LEN);

    let mut copy = codec.decode(&wire, 0).unwrap();
    for index in 0..record.field_count() {
        assert_eq!(
            copy.field(index).unwrap(),
            record.field(index).unwrap(),
            "field {index} did not survive the round trip"
        );
    }
}

#[test]
fn test_defaults_fill_the_whole_buffer() {
    let codec = codec(inventory_format());
    let mut record = codec.initialize_defaults().unwrap();

    // Declared defaults and type-native zeros, never absent slots.
    assert_eq!(record.field(2).unwrap(), FieldValue::Int32(1));
    assert_eq!(record.field(4).unwrap(), FieldValue::Text(String::new()));
    let stamped = record.field(5).unwrap();
    assert!(stamped.as_timestamp().unwrap().and_utc().timestamp() > 1_500_000_000);

    // The buffer is full-width before and after values arrive.
    assert_eq!(record.contents().unwrap().len(), INVENTORY_WIRE_LEN);
    record
        .set_field(4, FieldValue::Text("short".into()))
        .unwrap();
    assert_eq!(record.contents().unwrap().len(), INVENTORY_WIRE_LEN);
}

#[test]
fn test_records_from_one_codec_are_independent() {
    let codec = codec(inventory_format());
    let mut first = codec.initialize_defaults().unwrap();
    let mut second = codec.initialize_defaults().unwrap();

    first.set_field(2, FieldValue::Int32(77)).unwrap();
    first.set_null(3).unwrap();

    assert_eq!(second.field(2).unwrap(), FieldValue::Int32(1));
    assert!(!second.is_null(3).unwrap());
    assert!(first.is_null(3).unwrap());
}

#[test]
fn test_key_projection_in_declared_order() {
    let codec = codec(inventory_format());
    let mut record = codec.initialize_defaults().unwrap();
    record.set_field(0, FieldValue::Int64(0x0102)).unwrap();
    record.set_field(1, FieldValue::Text("ZH".into())).unwrap();

    assert_eq!(
        record.key_field_values().unwrap(),
        vec![FieldValue::Int64(0x0102), FieldValue::Text("ZH".into())]
    );

    let mut expected = Vec::new();
    expected.extend_from_slice(&0x0102_i64.to_be_bytes());
    expected.extend_from_slice(b"ZH  ");
    assert_eq!(record.key_field_bytes().unwrap(), expected);
}

#[test]
fn test_null_fields_round_trip_as_placeholders() {
    let codec = codec(inventory_format());
    let mut record = codec.initialize_defaults().unwrap();
    record.set_field(2, FieldValue::Int32(9)).unwrap();
    record.set_null(2).unwrap();

    let wire = codec.encode(&mut record).unwrap();
    let mut copy = codec.decode(&wire, 0).unwrap();

    // Nullness is in-memory state; the wire carries the placeholder.
    assert!(record.is_null(2).unwrap());
    assert!(!copy.is_null(2).unwrap());
    assert_eq!(copy.field(2).unwrap(), FieldValue::Int32(0));
}

#[test]
fn test_length_dependent_frame() {
    // A frame whose body width is governed by the len field before it.
    let codec = codec(
        RecordFormat::new(
            "frame",
            vec![
                FieldLayout::new("tag", FieldType::Int16),
                FieldLayout::new("len", FieldType::Int32),
                FieldLayout::sized("body", FieldType::Bytes, 0).with_length_dependency(1),
                FieldLayout::new("crc", FieldType::Int32),
            ],
        )
        .unwrap(),
    );

    // Decode a hand-built frame, trailing bytes ignored.
    let mut wire = Vec::new();
    wire.extend_from_slice(&3i16.to_be_bytes());
    wire.extend_from_slice(&5i32.to_be_bytes());
    wire.extend_from_slice(b"hello");
    wire.extend_from_slice(&0x55aa_i32.to_be_bytes());
    wire.extend_from_slice(b"garbage after the frame");

    let mut record = codec.decode(&wire, 0).unwrap();
    assert_eq!(record.field(2).unwrap(), FieldValue::Bytes(b"hello".to_vec()));
    assert_eq!(record.field(3).unwrap(), FieldValue::Int32(0x55aa));
    assert_eq!(record.contents().unwrap().len(), 2 + 4 + 5 + 4);

    // Growing the len field moves the crc and widens the body on rebuild.
    record.set_field(1, FieldValue::Int32(8)).unwrap();
    record
        .set_field(2, FieldValue::Bytes(b"hello+++".to_vec()))
        .unwrap();
    let rebuilt = codec.encode(&mut record).unwrap();
    assert_eq!(rebuilt.len(), 2 + 4 + 8 + 4);
    assert_eq!(&rebuilt[6..14], b"hello+++");

    let mut reread = codec.decode(&rebuilt, 0).unwrap();
    assert_eq!(
        reread.field(2).unwrap(),
        FieldValue::Bytes(b"hello+++".to_vec())
    );
    assert_eq!(reread.field(3).unwrap(), FieldValue::Int32(0x55aa));
}

#[test]
fn test_malformed_buffers_are_rejected() {
    let codec = codec(inventory_format());

    let err = codec.decode(&[0u8; 8], 0).unwrap_err();
    assert!(matches!(err, Error::BufferTooSmall { .. }));

    let err = codec.decode(&[0u8; 8], 64).unwrap_err();
    assert!(matches!(err, Error::OffsetOutOfRange { offset: 64, .. }));
}

#[test]
fn test_lob_column_travels_as_handle() {
    let codec = codec(
        RecordFormat::new(
            "document",
            vec![
                FieldLayout::new("doc_id", FieldType::Int32),
                FieldLayout::new("body", FieldType::Clob),
            ],
        )
        .unwrap(),
    );

    let mut record = codec.initialize_defaults().unwrap();
    match record.field(1).unwrap() {
        FieldValue::Lob(locator) => assert!(!locator.is_bound()),
        other => panic!("expected a locator, got {other}"),
    }

    record
        .set_field(1, FieldValue::Lob(LobLocator::with_handle(1, 0xbeef)))
        .unwrap();
    let wire = codec.encode(&mut record).unwrap();
    assert_eq!(wire.len(), 4 + 4);
    assert_eq!(&wire[4..], &0xbeef_u32.to_be_bytes());

    let mut copy = codec.decode(&wire, 0).unwrap();
    match copy.field(1).unwrap() {
        FieldValue::Lob(locator) => {
            assert_eq!(locator.handle(), Some(0xbeef));
            assert_eq!(locator.column_index(), 1);
        }
        other => panic!("expected a locator, got {other}"),
    }
}
