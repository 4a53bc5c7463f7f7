//! Cross-checks against prost-reflect's `DynamicMessage`.

mod common;

use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;
use pretty_assertions::assert_eq;
use prost::Message;
use prost_reflect::{DescriptorPool, DynamicMessage, MapKey as ReflectKey, Value as ReflectValue};
use protodyn_core::{
    decode, encode, Codec, CodecConfig, DecodeError, MapKey, MessageDescriptor, Record, Schema,
    UnknownFieldPolicy, Value,
};

use common::{full_pool, full_proto, full_schema, record};

fn complex(schema: &Schema) -> MessageDescriptor {
    schema.get_message_by_name("full.ComplexMessage").unwrap()
}

fn reflect_descriptor(pool: &DescriptorPool) -> prost_reflect::MessageDescriptor {
    pool.get_message_by_name("full.ComplexMessage").unwrap()
}

fn simple_dynamic(pool: &DescriptorPool, some_field: i32, some_field2: &str) -> ReflectValue {
    let desc = pool
        .get_message_by_name("full.ComplexMessage.SimpleMessage")
        .unwrap();
    let mut message = DynamicMessage::new(desc);
    message.set_field_by_name("some_field", ReflectValue::I32(some_field));
    message.set_field_by_name("some_field2", ReflectValue::String(some_field2.to_string()));
    ReflectValue::Message(message)
}

fn simple_record(some_field: i32, some_field2: &str) -> Value {
    Value::Message(record([
        ("some_field", Value::I32(some_field)),
        ("some_field2", Value::from(some_field2)),
    ]))
}

fn reference_message(pool: &DescriptorPool) -> DynamicMessage {
    let mut message = DynamicMessage::new(reflect_descriptor(pool));
    let mut set = |name: &str, value: ReflectValue| message.set_field_by_name(name, value);

    set("enum", ReflectValue::EnumNumber(1));
    set("scalar_int32", ReflectValue::I32(-10));
    set("scalar_int64", ReflectValue::I64(-20));
    set("scalar_uint32", ReflectValue::U32(10));
    set("scalar_uint64", ReflectValue::U64(20));
    set("scalar_sint32", ReflectValue::I32(-50));
    set("scalar_sint64", ReflectValue::I64(-500));
    set("scalar_fixed32", ReflectValue::U32(1000));
    set("scalar_fixed64", ReflectValue::U64(10000));
    set("scalar_sfixed32", ReflectValue::I32(-100_000));
    set("scalar_sfixed64", ReflectValue::I64(-1_000_000));
    set(
        "scalar_string",
        ReflectValue::String("some another hello world".to_string()),
    );
    set("scalar_float", ReflectValue::F32(0.5));
    set("scalar_double", ReflectValue::F64(-1.25));
    set("message", simple_dynamic(pool, 300, "hello"));
    set("bytes", ReflectValue::Bytes(Bytes::from_static(b"hello world")));
    set(
        "map_enum",
        ReflectValue::Map(HashMap::from([
            (ReflectKey::I32(1), ReflectValue::EnumNumber(1)),
            (ReflectKey::I32(2), ReflectValue::EnumNumber(2)),
            (ReflectKey::I32(3), ReflectValue::EnumNumber(0)),
        ])),
    );
    set(
        "map_scalar",
        ReflectValue::Map(HashMap::from([
            (ReflectKey::I32(1), ReflectValue::I32(2)),
            (ReflectKey::I32(2), ReflectValue::I32(3)),
            (ReflectKey::I32(4), ReflectValue::I32(5)),
        ])),
    );
    set(
        "map_msg",
        ReflectValue::Map(HashMap::from([
            (
                ReflectKey::String("hello".to_string()),
                simple_dynamic(pool, 1, "hello"),
            ),
            (
                ReflectKey::String("world".to_string()),
                simple_dynamic(pool, 2, "world"),
            ),
        ])),
    );
    set(
        "r_enum",
        ReflectValue::List(vec![ReflectValue::EnumNumber(7), ReflectValue::EnumNumber(8)]),
    );
    set(
        "r_scalar",
        ReflectValue::List((1..=4).map(ReflectValue::I32).collect()),
    );
    set(
        "r_msg",
        ReflectValue::List(vec![
            simple_dynamic(pool, 1, "hello"),
            simple_dynamic(pool, 2, "world"),
        ]),
    );
    set(
        "r_bytes",
        ReflectValue::List(vec![
            ReflectValue::Bytes(Bytes::from_static(b"hello")),
            ReflectValue::Bytes(Bytes::from_static(b"world")),
        ]),
    );
    set("text", ReflectValue::String("picked".to_string()));

    message
}

fn expected_record() -> Record {
    record([
        ("enum", Value::I32(1)),
        ("scalar_int32", Value::I32(-10)),
        ("scalar_int64", Value::I64(-20)),
        ("scalar_uint32", Value::U32(10)),
        ("scalar_uint64", Value::U64(20)),
        ("scalar_sint32", Value::I32(-50)),
        ("scalar_sint64", Value::I64(-500)),
        ("scalar_fixed32", Value::U32(1000)),
        ("scalar_fixed64", Value::U64(10000)),
        ("scalar_sfixed32", Value::I32(-100_000)),
        ("scalar_sfixed64", Value::I64(-1_000_000)),
        ("scalar_string", Value::from("some another hello world")),
        ("scalar_float", Value::F32(0.5)),
        ("scalar_double", Value::F64(-1.25)),
        ("message", simple_record(300, "hello")),
        ("bytes", Value::from("aGVsbG8gd29ybGQ=")),
        (
            "map_enum",
            Value::Map(BTreeMap::from([
                (MapKey::I32(1), Value::I32(1)),
                (MapKey::I32(2), Value::I32(2)),
                (MapKey::I32(3), Value::I32(0)),
            ])),
        ),
        (
            "map_scalar",
            Value::Map(BTreeMap::from([
                (MapKey::I32(1), Value::I32(2)),
                (MapKey::I32(2), Value::I32(3)),
                (MapKey::I32(4), Value::I32(5)),
            ])),
        ),
        (
            "map_msg",
            Value::Map(BTreeMap::from([
                (MapKey::String("hello".into()), simple_record(1, "hello")),
                (MapKey::String("world".into()), simple_record(2, "world")),
            ])),
        ),
        ("r_enum", Value::List(vec![Value::I32(7), Value::I32(8)])),
        ("r_scalar", Value::List((1..=4).map(Value::I32).collect())),
        (
            "r_msg",
            Value::List(vec![simple_record(1, "hello"), simple_record(2, "world")]),
        ),
        (
            "r_bytes",
            Value::List(vec![Value::from("aGVsbG8="), Value::from("d29ybGQ=")]),
        ),
        ("text", Value::from("picked")),
    ])
}

#[test]
fn decodes_reference_encoding() {
    let pool = full_pool();
    let schema = full_schema();
    let bytes = reference_message(&pool).encode_to_vec();

    assert_eq!(decode(&bytes, &complex(&schema)).unwrap(), expected_record());
}

#[test]
fn reference_decodes_our_encoding() {
    let pool = full_pool();
    let schema = full_schema();

    for config in [
        CodecConfig::new(),
        CodecConfig::new().pack_repeated_scalars(true),
    ] {
        let bytes = Codec::with_config(config)
            .encode(&expected_record(), &complex(&schema))
            .unwrap();
        let dynamic = DynamicMessage::decode(reflect_descriptor(&pool), bytes.as_slice()).unwrap();

        assert_eq!(
            dynamic.get_field_by_name("scalar_sint32").unwrap().as_i32(),
            Some(-50)
        );
        assert_eq!(
            dynamic.get_field_by_name("bytes").unwrap().as_bytes(),
            Some(&Bytes::from_static(b"hello world"))
        );
        assert_eq!(dynamic.get_field_by_name("r_scalar").unwrap().as_list().map(<[_]>::len), Some(4));

        // Re-encoded by the reference, the message still decodes to the same record
        let transcoded = dynamic.encode_to_vec();
        assert_eq!(
            decode(&transcoded, &complex(&schema)).unwrap(),
            expected_record()
        );
    }
}

#[test]
fn unpacked_scalars_differ_from_reference_bytes_only_in_framing() {
    let pool = full_pool();
    let schema = full_schema();

    let mut reference = DynamicMessage::new(reflect_descriptor(&pool));
    reference.set_field_by_name(
        "r_scalar",
        ReflectValue::List((1..=4).map(ReflectValue::I32).collect()),
    );
    let packed = reference.encode_to_vec();
    assert_eq!(packed, [0xB2, 0x01, 0x04, 0x01, 0x02, 0x03, 0x04]);

    let decoded = decode(&packed, &complex(&schema)).unwrap();
    let unpacked = encode(&decoded, &complex(&schema)).unwrap();
    assert_eq!(
        unpacked,
        [0xB0, 0x01, 0x01, 0xB0, 0x01, 0x02, 0xB0, 0x01, 0x03, 0xB0, 0x01, 0x04]
    );

    let packed_again = Codec::with_config(CodecConfig::new().pack_repeated_scalars(true))
        .encode(&decoded, &complex(&schema))
        .unwrap();
    assert_eq!(packed_again, packed);
}

#[test]
fn unknown_fields_follow_policy() {
    let pool = full_pool();

    // Same file without the `count` field
    let mut trimmed = full_proto();
    trimmed.message_type[0]
        .field
        .retain(|field| field.name() != "count");
    let schema = Schema::from_file_descriptor_protos([trimmed]).unwrap();

    let mut reference = DynamicMessage::new(reflect_descriptor(&pool));
    reference.set_field_by_name("scalar_int32", ReflectValue::I32(3));
    reference.set_field_by_name("count", ReflectValue::U64(5));
    let bytes = reference.encode_to_vec();

    let err = decode(&bytes, &complex(&schema)).unwrap_err();
    assert_eq!(err, DecodeError::unknown_field("full.ComplexMessage", 26));

    let skipping = Codec::with_config(CodecConfig::new().unknown_fields(UnknownFieldPolicy::Skip));
    assert_eq!(
        skipping.decode(&bytes, &complex(&schema)).unwrap(),
        record([("scalar_int32", Value::I32(3))])
    );
}

#[test]
fn adapted_schema_shape() {
    let schema = full_schema();
    let message = complex(&schema);

    assert_eq!(message.fields().len(), 26);
    let maps: Vec<_> = message.map_fields().map(|f| f.name().to_string()).collect();
    assert_eq!(maps, ["map_enum", "map_scalar", "map_msg"]);
    assert_eq!(
        message.get_field_by_name("map_msg").unwrap().kind().to_string(),
        "map<string, message full.ComplexMessage.SimpleMessage>"
    );

    let payload = message.oneofs().next().unwrap();
    assert_eq!(payload.name(), "payload");
    let members: Vec<_> = payload.fields().map(|f| f.number()).collect();
    assert_eq!(members, [25, 26]);

    assert!(schema
        .get_enum_by_name("full.ComplexMessage.SimpleEnum")
        .is_some());
}
