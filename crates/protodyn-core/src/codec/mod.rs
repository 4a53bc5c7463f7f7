//! The dynamic codec.
//!
//! [`Codec`] turns wire bytes into a [`Record`] and back, driven entirely by
//! a [`MessageDescriptor`]. It holds nothing but its [`CodecConfig`], so one
//! codec may serve any number of threads and schemas at once.
//!
//! ## Decoding
//!
//! Fields are read until the buffer ends exactly at a tag boundary. Each tag
//! is looked up by number; the wire type must agree with the declared type,
//! except that repeated numeric and enum fields also accept one packed
//! length-delimited block. `bytes` payloads are rendered as base64 text.
//!
//! ## Encoding
//!
//! Fields are written in declaration order. Repeated enums are packed;
//! repeated scalars are written one tag per element unless
//! [`CodecConfig::pack_repeated_scalars`] is set. Map fields emit one entry
//! submessage per pair.
//!
//! Any failure aborts the whole call, and the error names the message and
//! field at every level it passed through.

mod decode;
mod encode;

use tracing::debug;

use crate::config::CodecConfig;
use crate::error::{DecodeError, EncodeError};
use crate::schema::MessageDescriptor;
use crate::value::Record;
use crate::wire::WireReader;

use self::decode::Decoder;
use self::encode::Encoder;

/// Schema-driven encoder and decoder
#[derive(Debug, Clone, Default)]
pub struct Codec {
    config: CodecConfig,
}

impl Codec {
    /// Creates a codec with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a codec with custom configuration
    pub fn with_config(config: CodecConfig) -> Self {
        Self { config }
    }

    /// The active configuration
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Decodes a serialized message of type `message`
    pub fn decode(&self, bytes: &[u8], message: &MessageDescriptor) -> Result<Record, DecodeError> {
        debug!("Decoding {} bytes as {}", bytes.len(), message.full_name());
        let record = Decoder::new(&self.config).message(WireReader::new(bytes), message, 0)?;
        debug!("Decoded {} top-level fields", record.len());
        Ok(record)
    }

    /// Encodes `record` as a message of type `message`
    pub fn encode(&self, record: &Record, message: &MessageDescriptor) -> Result<Vec<u8>, EncodeError> {
        let mut buf = Vec::new();
        Encoder::new(&self.config).message(record, message, 0, &mut buf)?;
        debug!("Encoded {} as {} bytes", message.full_name(), buf.len());
        Ok(buf)
    }
}

/// Decodes with the default configuration
pub fn decode(bytes: &[u8], message: &MessageDescriptor) -> Result<Record, DecodeError> {
    Codec::new().decode(bytes, message)
}

/// Encodes with the default configuration
pub fn encode(record: &Record, message: &MessageDescriptor) -> Result<Vec<u8>, EncodeError> {
    Codec::new().encode(record, message)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::UnknownFieldPolicy;
    use crate::schema::{EnumDef, FieldDef, FileDef, MessageDef, OneofDef, Schema, TypeRef};
    use crate::value::{MapKey, Value};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    pub(crate) fn record<const N: usize>(fields: [(&str, Value); N]) -> Record {
        fields
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }

    pub(crate) fn sample_schema() -> Schema {
        let sample = MessageDef::new("Sample")
            .field(FieldDef::new("i32", 1, "int32"))
            .field(FieldDef::new("s32", 2, "sint32"))
            .field(FieldDef::new("u64", 3, "uint64"))
            .field(FieldDef::new("fixed", 4, "fixed32"))
            .field(FieldDef::new("sfixed", 5, "sfixed64"))
            .field(FieldDef::new("f", 6, "float"))
            .field(FieldDef::new("d", 7, "double"))
            .field(FieldDef::new("flag", 8, "bool"))
            .field(FieldDef::new("name", 9, "string"))
            .field(FieldDef::new("data", 10, "bytes"))
            .field(FieldDef::new("color", 11, "Color"))
            .field(FieldDef::new("ids", 12, "int32").repeated())
            .field(FieldDef::new("colors", 13, "Color").repeated())
            .field(FieldDef::new("labels", 14, TypeRef::map("string", "int32")))
            .field(FieldDef::new("children", 15, TypeRef::map("int32", "Child")))
            .field(FieldDef::new("child", 16, "Child"))
            .field(FieldDef::new("items", 17, "Child").repeated())
            .oneof(
                OneofDef::new("choice")
                    .field(FieldDef::new("text", 18, "string"))
                    .field(FieldDef::new("number", 19, "int64")),
            )
            .field(FieldDef::new("next", 20, "Sample"))
            .field(FieldDef::new("blobs", 21, "bytes").repeated());

        let child = MessageDef::new("Child")
            .field(FieldDef::new("id", 1, "uint32"))
            .field(FieldDef::new("tag", 2, "string"));

        let color = EnumDef::new("Color")
            .value("RED", 0)
            .value("GREEN", 1)
            .value("BLUE", 2);

        Schema::builder()
            .file(
                FileDef::new("sample.proto")
                    .package("test")
                    .message(sample)
                    .message(child)
                    .enumeration(color),
            )
            .build()
            .unwrap()
    }

    fn full_record() -> Record {
        let child = |id: u32, tag: &str| {
            Value::Message(record([("id", Value::U32(id)), ("tag", Value::from(tag))]))
        };

        record([
            ("i32", Value::I32(-10)),
            ("s32", Value::I32(-50)),
            ("u64", Value::U64(u64::MAX)),
            ("fixed", Value::U32(7)),
            ("sfixed", Value::I64(i64::MIN)),
            ("f", Value::F32(1.5)),
            ("d", Value::F64(-2.25)),
            ("flag", Value::Bool(true)),
            ("name", Value::from("héllo")),
            ("data", Value::from("aGVsbG8gd29ybGQ=")),
            ("color", Value::I32(2)),
            ("ids", Value::List(vec![Value::I32(1), Value::I32(-2), Value::I32(3)])),
            ("colors", Value::List(vec![Value::I32(0), Value::I32(1)])),
            (
                "labels",
                Value::Map(BTreeMap::from([
                    (MapKey::String("a".into()), Value::I32(1)),
                    (MapKey::String("b".into()), Value::I32(-1)),
                ])),
            ),
            (
                "children",
                Value::Map(BTreeMap::from([
                    (MapKey::I32(-3), child(3, "three")),
                    (MapKey::I32(4), child(4, "")),
                ])),
            ),
            ("child", child(1, "one")),
            ("items", Value::List(vec![child(5, "x"), child(6, "y")])),
            ("number", Value::I64(-7)),
            ("next", Value::Message(record([("name", Value::from("inner"))]))),
            ("blobs", Value::List(vec![Value::from("AAE="), Value::from("")])),
        ])
    }

    #[test]
    fn test_round_trip() {
        let schema = sample_schema();
        let sample = schema.get_message_by_name("test.Sample").unwrap();
        let input = full_record();

        let bytes = encode(&input, &sample).unwrap();
        assert_eq!(decode(&bytes, &sample).unwrap(), input);
    }

    #[test]
    fn test_round_trip_packed() {
        let schema = sample_schema();
        let sample = schema.get_message_by_name("test.Sample").unwrap();
        let codec = Codec::with_config(CodecConfig::new().pack_repeated_scalars(true));
        let input = full_record();

        let bytes = codec.encode(&input, &sample).unwrap();
        assert_eq!(codec.decode(&bytes, &sample).unwrap(), input);
        assert!(bytes.len() < encode(&input, &sample).unwrap().len());
    }

    #[test]
    fn test_packed_decode_unpacked_encode() {
        let schema = sample_schema();
        let sample = schema.get_message_by_name("test.Sample").unwrap();

        let packed = [0x62, 0x04, 0x01, 0x02, 0x03, 0x04];
        let decoded = decode(&packed, &sample).unwrap();
        assert_eq!(
            decoded,
            record([("ids", Value::List((1..=4).map(Value::I32).collect()))])
        );
        assert_eq!(
            encode(&decoded, &sample).unwrap(),
            [0x60, 0x01, 0x60, 0x02, 0x60, 0x03, 0x60, 0x04]
        );
    }

    #[test]
    fn test_codec_keeps_config() {
        let config = CodecConfig::new().unknown_fields(UnknownFieldPolicy::Skip);
        let codec = Codec::with_config(config.clone());
        assert_eq!(codec.config(), &config);
        assert_eq!(Codec::new().config(), &CodecConfig::default());
    }

    #[test]
    fn test_codec_is_shareable() {
        let schema = sample_schema();
        let sample = schema.get_message_by_name("test.Sample").unwrap();
        let codec = Codec::new();
        let input = full_record();
        let expected = codec.encode(&input, &sample).unwrap();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    let bytes = codec.encode(&input, &sample).unwrap();
                    assert_eq!(bytes, expected);
                    assert_eq!(codec.decode(&bytes, &sample).unwrap(), input);
                });
            }
        });
    }
}
