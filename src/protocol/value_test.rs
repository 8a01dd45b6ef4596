use pretty_assertions::assert_eq;

use crate::buffer::{ChunkedReadBuffer, ChunkedWriteBuffer};
use crate::constant::{DEFAULT_MAX_CHUNK_SIZE, marker};
use crate::error::Error;
use crate::parser::BoltParser;
use crate::protocol::value::{pack, unpack};
use crate::value::{Structure, Value};

/// Chunked wire bytes of a single value sealed as one message.
fn encode(value: &Value) -> Vec<u8> {
    let mut buf = ChunkedWriteBuffer::new(DEFAULT_MAX_CHUNK_SIZE);
    pack(value, &mut buf).unwrap();
    buf.write_eof();
    buf.flush().flatten().collect()
}

fn decode(wire: &[u8]) -> crate::error::Result<Value> {
    let mut parser = BoltParser::new();
    let mut buf = ChunkedReadBuffer::new();
    parser.feed_data(wire, &mut buf);
    unpack(&mut buf)
}

fn roundtrip(value: &Value) -> Value {
    decode(&encode(value)).unwrap()
}

/// First payload byte, i.e. the marker, of the encoded value.
fn first_marker(value: &Value) -> u8 {
    encode(value)[2]
}

#[test]
fn scalar_roundtrip() {
    for value in [
        Value::Null,
        Value::Boolean(true),
        Value::Boolean(false),
        Value::Float(1.1),
        Value::Float(-9.875e300),
        Value::from("hello"),
        Value::from(""),
    ] {
        assert_eq!(roundtrip(&value), value);
    }
}

#[test]
fn integer_roundtrip_at_boundaries() {
    for v in [
        0i64,
        1,
        127,
        128,
        -1,
        -16,
        -17,
        -128,
        -129,
        32767,
        32768,
        -32768,
        -32769,
        i64::from(i32::MAX),
        i64::from(i32::MAX) + 1,
        i64::from(i32::MIN),
        i64::from(i32::MIN) - 1,
        i64::MAX,
        i64::MIN,
    ] {
        assert_eq!(roundtrip(&Value::Integer(v)), Value::Integer(v), "{}", v);
    }
}

#[test]
fn integer_markers_are_tight() {
    assert_eq!(first_marker(&Value::Integer(0)), 0x00);
    assert_eq!(first_marker(&Value::Integer(127)), 0x7F);
    assert_eq!(first_marker(&Value::Integer(-1)), 0xFF);
    assert_eq!(first_marker(&Value::Integer(-16)), 0xF0);
    assert_eq!(first_marker(&Value::Integer(-17)), marker::INT_8);
    assert_eq!(first_marker(&Value::Integer(-128)), marker::INT_8);
    assert_eq!(first_marker(&Value::Integer(128)), marker::INT_16);
    assert_eq!(first_marker(&Value::Integer(-129)), marker::INT_16);
    assert_eq!(first_marker(&Value::Integer(32767)), marker::INT_16);
    assert_eq!(first_marker(&Value::Integer(-32768)), marker::INT_16);
    assert_eq!(first_marker(&Value::Integer(32768)), marker::INT_32);
    assert_eq!(first_marker(&Value::Integer(-32769)), marker::INT_32);
    assert_eq!(
        first_marker(&Value::Integer(i64::from(i32::MAX))),
        marker::INT_32
    );
    assert_eq!(
        first_marker(&Value::Integer(i64::from(i32::MAX) + 1)),
        marker::INT_64
    );
    assert_eq!(first_marker(&Value::Integer(i64::MIN)), marker::INT_64);
}

#[test]
fn string_markers_are_tight() {
    let of_len = |n: usize| Value::String("x".repeat(n));
    assert_eq!(first_marker(&of_len(0)), marker::TINY_STRING);
    assert_eq!(first_marker(&of_len(15)), marker::TINY_STRING | 15);
    assert_eq!(first_marker(&of_len(16)), marker::STRING_8);
    assert_eq!(first_marker(&of_len(255)), marker::STRING_8);
    assert_eq!(first_marker(&of_len(256)), marker::STRING_16);
    assert_eq!(first_marker(&of_len(65535)), marker::STRING_16);
    assert_eq!(first_marker(&of_len(65536)), marker::STRING_32);
}

#[test]
fn string_roundtrip_at_boundaries() {
    for n in [0usize, 15, 16, 255, 256, 65535, 65536] {
        let value = Value::String("x".repeat(n));
        assert_eq!(roundtrip(&value), value, "len {}", n);
    }
}

#[test]
fn string_size_is_byte_length_not_char_count() {
    // "hällo" is 5 characters but 6 UTF-8 bytes.
    let value = Value::from("hällo");
    let wire = encode(&value);
    assert_eq!(wire[2], marker::TINY_STRING | 6);
    assert_eq!(roundtrip(&value), value);
}

#[test]
fn list_markers_are_tight() {
    let of_len = |n: usize| Value::List(vec![Value::Null; n]);
    assert_eq!(first_marker(&of_len(15)), marker::TINY_LIST | 15);
    assert_eq!(first_marker(&of_len(16)), marker::LIST_8);
    assert_eq!(first_marker(&of_len(255)), marker::LIST_8);
    assert_eq!(first_marker(&of_len(256)), marker::LIST_16);
    assert_eq!(first_marker(&of_len(65535)), marker::LIST_16);
    assert_eq!(first_marker(&of_len(65536)), marker::LIST_32);
}

#[test]
fn map_markers_are_tight() {
    let of_len = |n: usize| {
        Value::Map(
            (0..n)
                .map(|i| (format!("k{}", i), Value::Integer(i as i64)))
                .collect(),
        )
    };
    assert_eq!(first_marker(&of_len(15)), marker::TINY_MAP | 15);
    assert_eq!(first_marker(&of_len(16)), marker::MAP_8);
    assert_eq!(first_marker(&of_len(256)), marker::MAP_16);
}

#[test]
fn map_roundtrip_preserves_order() {
    let value = Value::Map(vec![
        ("zeta".to_string(), Value::Integer(1)),
        ("alpha".to_string(), Value::Integer(2)),
        ("mid".to_string(), Value::Null),
    ]);
    assert_eq!(roundtrip(&value), value);
}

#[test]
fn nested_containers_roundtrip() {
    let value = Value::List(vec![
        Value::Map(vec![
            ("items".to_string(), Value::List(vec![Value::Integer(1)])),
            ("ok".to_string(), Value::Boolean(true)),
        ]),
        Value::Null,
        Value::from("tail"),
    ]);
    assert_eq!(roundtrip(&value), value);
}

#[test]
fn graph_structure_roundtrip() {
    // NODE (0x4E): identity, labels, properties.
    let value = Value::Structure(Structure {
        signature: 0x4E,
        fields: vec![
            Value::Integer(12),
            Value::List(vec![Value::from("Person")]),
            Value::Map(vec![("name".to_string(), Value::from("Alice"))]),
        ],
    });
    assert_eq!(roundtrip(&value), value);
}

#[test]
fn unknown_marker_is_a_protocol_error() {
    // 0xC5 is not assigned.
    let err = decode(b"\x00\x01\xC5\x00\x00").unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
}

#[test]
fn unknown_structure_signature_is_a_protocol_error() {
    // Tiny struct, signature 0x99 is not assigned.
    let err = decode(b"\x00\x03\xB1\x99\x01\x00\x00").unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
}

#[test]
fn structure_arity_mismatch_is_a_protocol_error() {
    // RECORD (0x71) expects exactly one field.
    let err = decode(b"\x00\x04\xB2\x71\x01\x02\x00\x00").unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
}

#[test]
fn truncated_payload_is_a_buffer_error() {
    // INT_16 marker with only one trailing byte.
    let err = decode(b"\x00\x02\xC9\x01\x00\x00").unwrap_err();
    assert!(matches!(err, Error::Buffer(_)));
}

#[test]
fn invalid_utf8_is_a_protocol_error() {
    // Tiny string of length 2 carrying invalid UTF-8.
    let err = decode(b"\x00\x03\x82\xFF\xFE\x00\x00").unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
}
