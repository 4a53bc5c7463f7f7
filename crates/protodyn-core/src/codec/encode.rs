//! Value tree to wire bytes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::trace;

use crate::coerce::{enum_bits, scalar_bits};
use crate::config::CodecConfig;
use crate::error::EncodeError;
use crate::schema::{FieldDescriptor, Kind, MapType, MessageDescriptor, ScalarType};
use crate::value::{Record, Value};
use crate::wire::{put_fixed32, put_fixed64, put_length_delimited, put_tag, put_varint, WireType};

type Result<T> = std::result::Result<T, EncodeError>;

pub(crate) struct Encoder<'c> {
    config: &'c CodecConfig,
}

impl<'c> Encoder<'c> {
    pub(crate) fn new(config: &'c CodecConfig) -> Self {
        Self { config }
    }

    /// Appends the fields of `record` to `buf` in declaration order
    pub(crate) fn message(
        &self,
        record: &Record,
        message: &MessageDescriptor,
        depth: usize,
        buf: &mut Vec<u8>,
    ) -> Result<()> {
        if depth > self.config.max_depth {
            return Err(EncodeError::RecursionLimitExceeded {
                limit: self.config.max_depth,
            });
        }

        if let Some(key) = record
            .keys()
            .find(|key| message.get_field_by_name(key).is_none())
        {
            return Err(EncodeError::UnknownField {
                message: message.full_name().to_string(),
                field: key.clone(),
            });
        }

        for field in message.fields() {
            let Some(value) = record.get(field.name()) else {
                continue;
            };
            trace!("Field {}.{}", message.full_name(), field.name());
            self.field(&field, value, depth, buf)
                .map_err(|e| e.in_field(message.full_name(), field.name()))?;
        }

        Ok(())
    }

    fn field(
        &self,
        field: &FieldDescriptor,
        value: &Value,
        depth: usize,
        buf: &mut Vec<u8>,
    ) -> Result<()> {
        let number = field.number();
        let kind = field.kind();

        if let Kind::Map(map) = &kind {
            return self.map(number, map, value, depth, buf);
        }

        if !field.is_repeated() {
            return self.tagged(number, &kind, value, depth, buf);
        }

        let items = match value {
            Value::List(items) => items,
            other => {
                return Err(EncodeError::unexpected(
                    format!("repeated {}", kind),
                    other.type_name(),
                ))
            }
        };
        if items.is_empty() {
            return Ok(());
        }

        let packed = match &kind {
            Kind::Enum(_) => true,
            Kind::Scalar(scalar) => self.config.pack_repeated_scalars && scalar.is_packable(),
            Kind::Message(_) | Kind::Map(_) => false,
        };

        if packed {
            let mut payload = Vec::new();
            for item in items {
                self.value(&kind, item, depth, &mut payload)?;
            }
            put_tag(number, WireType::Len, buf);
            put_length_delimited(&payload, buf);
        } else {
            for item in items {
                self.tagged(number, &kind, item, depth, buf)?;
            }
        }

        Ok(())
    }

    /// Emits one map entry submessage per pair
    fn map(
        &self,
        number: u32,
        map: &MapType,
        value: &Value,
        depth: usize,
        buf: &mut Vec<u8>,
    ) -> Result<()> {
        match value {
            Value::Map(entries) => {
                for (key, value) in entries {
                    self.map_entry(number, map, &Value::from(key.clone()), value, depth, buf)?;
                }
            }
            // JSON objects only have string keys; coerce them per entry
            Value::Message(entries) => {
                for (key, value) in entries {
                    self.map_entry(number, map, &Value::String(key.clone()), value, depth, buf)?;
                }
            }
            other => {
                return Err(EncodeError::unexpected(
                    format!("map<{}, {}>", map.key_type(), map.value_type()),
                    other.type_name(),
                ))
            }
        }
        Ok(())
    }

    fn map_entry(
        &self,
        number: u32,
        map: &MapType,
        key: &Value,
        value: &Value,
        depth: usize,
        buf: &mut Vec<u8>,
    ) -> Result<()> {
        let mut entry = Vec::new();
        self.tagged(1, map.key_type(), key, depth, &mut entry)?;
        self.tagged(2, map.value_type(), value, depth, &mut entry)?;
        put_tag(number, WireType::Len, buf);
        put_length_delimited(&entry, buf);
        Ok(())
    }

    fn tagged(
        &self,
        number: u32,
        kind: &Kind,
        value: &Value,
        depth: usize,
        buf: &mut Vec<u8>,
    ) -> Result<()> {
        put_tag(number, kind.wire_type(), buf);
        self.value(kind, value, depth, buf)
    }

    /// Writes a single value without its tag
    fn value(&self, kind: &Kind, value: &Value, depth: usize, buf: &mut Vec<u8>) -> Result<()> {
        match kind {
            Kind::Scalar(scalar) => put_scalar(*scalar, value, buf),
            Kind::Enum(enum_type) => {
                // Symbolic names are accepted alongside numbers
                let named = match value {
                    Value::String(name) => enum_type.get_value_by_name(name).map(Value::I32),
                    _ => None,
                };
                put_varint(enum_bits(named.as_ref().unwrap_or(value))?, buf);
                Ok(())
            }
            Kind::Message(message) => {
                let Value::Message(record) = value else {
                    return Err(EncodeError::unexpected(kind.to_string(), value.type_name()));
                };
                let mut payload = Vec::new();
                self.message(record, message, depth + 1, &mut payload)?;
                put_length_delimited(&payload, buf);
                Ok(())
            }
            Kind::Map(_) => Err(EncodeError::unexpected(kind.to_string(), value.type_name())),
        }
    }
}

fn put_scalar(scalar: ScalarType, value: &Value, buf: &mut Vec<u8>) -> Result<()> {
    match (scalar, value) {
        (ScalarType::String, Value::String(s)) => put_length_delimited(s.as_bytes(), buf),
        (ScalarType::Bytes, Value::Bytes(raw)) => put_length_delimited(raw, buf),
        (ScalarType::Bytes, Value::String(text)) => {
            let raw = STANDARD
                .decode(text)
                .map_err(|e| EncodeError::InvalidBase64(e.to_string()))?;
            put_length_delimited(&raw, buf);
        }
        (ScalarType::String | ScalarType::Bytes, other) => {
            return Err(EncodeError::unexpected(scalar.name(), other.type_name()))
        }
        _ => {
            let bits = scalar_bits(scalar, value)?;
            match scalar.wire_type() {
                WireType::I64 => put_fixed64(bits, buf),
                WireType::I32 => put_fixed32(bits as u32, buf),
                _ => put_varint(bits, buf),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::tests::{record, sample_schema};
    use crate::codec::Codec;
    use crate::error::CoercionError;
    use crate::value::MapKey;
    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn encode_with(config: CodecConfig, record: &Record) -> Result<Vec<u8>> {
        let schema = sample_schema();
        let message = schema.get_message_by_name("test.Sample").unwrap();
        Codec::with_config(config).encode(record, &message)
    }

    fn encode(record: &Record) -> Result<Vec<u8>> {
        encode_with(CodecConfig::default(), record)
    }

    #[test]
    fn test_empty_record() {
        assert_eq!(encode(&Record::new()).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_declaration_order() {
        let input = record([
            ("name", Value::from("x")),
            ("color", Value::I32(1)),
            ("i32", Value::I32(3)),
        ]);
        assert_eq!(
            encode(&input).unwrap(),
            [0x08, 0x03, 0x4A, 0x01, b'x', 0x58, 0x01]
        );
    }

    #[test]
    fn test_signed_encodings() {
        let input = record([("i32", Value::I32(-10)), ("s32", Value::I32(-50))]);
        assert_eq!(
            encode(&input).unwrap(),
            [0x08, 0xF6, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01, 0x10, 0x63]
        );
    }

    #[test]
    fn test_loose_numeric_input() {
        let input = record([
            ("u64", Value::from("42")),
            ("fixed", Value::I64(1)),
            ("flag", Value::I32(1)),
        ]);
        assert_eq!(
            encode(&input).unwrap(),
            [0x18, 42, 0x25, 0x01, 0x00, 0x00, 0x00, 0x40, 0x01]
        );
    }

    #[test]
    fn test_bytes_from_base64_or_raw() {
        let mut expected = vec![0x52, 11];
        expected.extend_from_slice(b"hello world");

        let text = record([("data", Value::from("aGVsbG8gd29ybGQ="))]);
        assert_eq!(encode(&text).unwrap(), expected);

        let raw = record([("data", Value::Bytes(Bytes::from_static(b"hello world")))]);
        assert_eq!(encode(&raw).unwrap(), expected);

        let err = encode(&record([("data", Value::from("not base64!"))])).unwrap_err();
        assert!(matches!(err.root_cause(), EncodeError::InvalidBase64(_)));
    }

    #[test]
    fn test_repeated_scalars_unpacked_by_default() {
        let ids = Value::List((1..=4).map(Value::I32).collect());
        let input = record([("ids", ids)]);
        assert_eq!(
            encode(&input).unwrap(),
            [0x60, 0x01, 0x60, 0x02, 0x60, 0x03, 0x60, 0x04]
        );
        assert_eq!(
            encode_with(CodecConfig::new().pack_repeated_scalars(true), &input).unwrap(),
            [0x62, 0x04, 0x01, 0x02, 0x03, 0x04]
        );
    }

    #[test]
    fn test_repeated_enums_always_packed() {
        let input = record([(
            "colors",
            Value::List(vec![Value::I32(1), Value::from("BLUE")]),
        )]);
        assert_eq!(encode(&input).unwrap(), [0x6A, 0x02, 0x01, 0x02]);
    }

    #[test]
    fn test_repeated_bytes_never_packed() {
        let input = record([(
            "blobs",
            Value::List(vec![Value::from("AQ=="), Value::from("Ag==")]),
        )]);
        assert_eq!(
            encode_with(CodecConfig::new().pack_repeated_scalars(true), &input).unwrap(),
            [0xAA, 0x01, 0x01, 0x01, 0xAA, 0x01, 0x01, 0x02]
        );
    }

    #[test]
    fn test_empty_list_is_absent() {
        let input = record([("items", Value::List(vec![]))]);
        assert_eq!(encode(&input).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_map_entries() {
        let labels = BTreeMap::from([
            (MapKey::String("a".into()), Value::I32(1)),
            (MapKey::String("b".into()), Value::I32(2)),
        ]);
        let expected = [
            0x72, 0x05, 0x0A, 0x01, b'a', 0x10, 0x01, //
            0x72, 0x05, 0x0A, 0x01, b'b', 0x10, 0x02,
        ];
        assert_eq!(
            encode(&record([("labels", Value::Map(labels))])).unwrap(),
            expected
        );

        // A record with string keys is accepted as a map
        let as_record = record([("a", Value::I32(1)), ("b", Value::I32(2))]);
        assert_eq!(
            encode(&record([("labels", Value::Message(as_record))])).unwrap(),
            expected
        );
    }

    #[test]
    fn test_map_keys_coerced_from_strings() {
        let children = record([("5", Value::Message(record([("id", Value::U32(1))])))]);
        assert_eq!(
            encode(&record([("children", Value::Message(children))])).unwrap(),
            [0x7A, 0x06, 0x08, 0x05, 0x12, 0x02, 0x08, 0x01]
        );

        let bad = record([("five", Value::Message(Record::new()))]);
        let err = encode(&record([("children", Value::Message(bad))])).unwrap_err();
        assert!(matches!(
            err.root_cause(),
            EncodeError::Coercion(CoercionError::Unparseable { .. })
        ));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = encode(&record([("nope", Value::I32(1))])).unwrap_err();
        assert_eq!(
            err,
            EncodeError::UnknownField {
                message: "test.Sample".into(),
                field: "nope".into()
            }
        );
    }

    #[test]
    fn test_out_of_range_names_the_field() {
        let err = encode(&record([("i32", Value::I64(1 << 40))])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "test.Sample.i32: value 1099511627776 out of range for int32"
        );
    }

    #[test]
    fn test_wrong_variant() {
        let err = encode(&record([("name", Value::I32(1))])).unwrap_err();
        assert_eq!(
            err.root_cause(),
            &EncodeError::unexpected("string", "i32")
        );

        let err = encode(&record([("ids", Value::I32(1))])).unwrap_err();
        assert!(err.to_string().contains("expected repeated int32, found i32"));

        let err = encode(&record([("child", Value::List(vec![]))])).unwrap_err();
        assert!(err.to_string().contains("expected message test.Child"));
    }

    #[test]
    fn test_oneof_members_are_not_policed() {
        let input = record([("text", Value::from("a")), ("number", Value::I64(1))]);
        assert_eq!(
            encode(&input).unwrap(),
            [0x92, 0x01, 0x01, b'a', 0x98, 0x01, 0x01]
        );
    }

    #[test]
    fn test_recursion_limit() {
        let mut nested = Record::new();
        for _ in 0..3 {
            nested = record([("next", Value::Message(nested))]);
        }
        assert!(encode_with(CodecConfig::new().max_depth(3), &nested).is_ok());

        let err = encode_with(CodecConfig::new().max_depth(2), &nested).unwrap_err();
        assert_eq!(
            err.root_cause(),
            &EncodeError::RecursionLimitExceeded { limit: 2 }
        );
    }
}
