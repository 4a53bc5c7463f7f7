//! Wire bytes to value tree.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::trace;

use crate::coerce::{from_wire_bits, to_map_key};
use crate::config::{CodecConfig, UnknownFieldPolicy};
use crate::error::DecodeError;
use crate::schema::{FieldDescriptor, Kind, MapType, MessageDescriptor, ScalarType};
use crate::value::{MapKey, Record, Value};
use crate::wire::{WireReader, WireType};

type Result<T> = std::result::Result<T, DecodeError>;

/// Name reported for unknown fields inside a map entry
const MAP_ENTRY: &str = "map entry";

pub(crate) struct Decoder<'c> {
    config: &'c CodecConfig,
}

impl<'c> Decoder<'c> {
    pub(crate) fn new(config: &'c CodecConfig) -> Self {
        Self { config }
    }

    /// Decodes fields until the reader ends at a tag boundary
    pub(crate) fn message(
        &self,
        mut reader: WireReader<'_>,
        message: &MessageDescriptor,
        depth: usize,
    ) -> Result<Record> {
        if depth > self.config.max_depth {
            return Err(DecodeError::RecursionLimitExceeded {
                limit: self.config.max_depth,
            });
        }

        let mut record = Record::new();
        loop {
            let offset = reader.offset();
            let Some((number, wire_type)) = reader.read_tag()? else {
                break;
            };

            let Some(field) = message.get_field(number) else {
                self.unknown(&mut reader, message.full_name(), number, wire_type)?;
                continue;
            };

            trace!(
                "Field {}.{} ({:?}) at offset {}",
                message.full_name(),
                field.name(),
                wire_type,
                offset
            );
            self.field(&mut reader, &field, wire_type, offset, &mut record, depth)
                .map_err(|e| e.in_field(message.full_name(), field.name()))?;
        }

        Ok(record)
    }

    fn unknown(
        &self,
        reader: &mut WireReader<'_>,
        message: &str,
        number: u32,
        wire_type: WireType,
    ) -> Result<()> {
        match self.config.unknown_fields {
            UnknownFieldPolicy::Reject => Err(DecodeError::unknown_field(message, number)),
            UnknownFieldPolicy::Skip => {
                trace!("Skipping unknown field {} in {}", number, message);
                reader.skip_field(wire_type, number)
            }
        }
    }

    fn field(
        &self,
        reader: &mut WireReader<'_>,
        field: &FieldDescriptor,
        wire_type: WireType,
        offset: usize,
        record: &mut Record,
        depth: usize,
    ) -> Result<()> {
        reject_groups(wire_type, offset)?;

        let name = field.name();
        let kind = field.kind();

        match &kind {
            Kind::Map(map) => {
                expect_wire_type(name, &kind, wire_type)?;
                let (key, value) = self.map_entry(reader.read_nested()?, map, depth)?;
                insert_entry(record, name, key, value);
            }
            // One packed block carries the whole field
            _ if wire_type == WireType::Len && field.is_repeated() && kind.is_packable() => {
                let mut packed = reader.read_nested()?;
                let mut items = Vec::new();
                while !packed.is_empty() {
                    items.push(self.single(&mut packed, &kind, name, depth)?);
                }
                record.insert(name.to_string(), Value::List(items));
            }
            _ => {
                expect_wire_type(name, &kind, wire_type)?;
                let value = self.single(reader, &kind, name, depth)?;
                if field.is_repeated() {
                    push(record, name, value);
                } else {
                    clear_oneof(record, field);
                    record.insert(name.to_string(), value);
                }
            }
        }

        Ok(())
    }

    /// Reads one value whose wire type has already been checked
    fn single(
        &self,
        reader: &mut WireReader<'_>,
        kind: &Kind,
        name: &str,
        depth: usize,
    ) -> Result<Value> {
        match kind {
            Kind::Enum(_) => Ok(Value::I32(reader.read_varint()? as i32)),
            Kind::Scalar(scalar) => scalar_value(reader, *scalar, name),
            Kind::Message(message) => {
                let record = self.message(reader.read_nested()?, message, depth + 1)?;
                Ok(Value::Message(record))
            }
            Kind::Map(_) => Err(DecodeError::type_mismatch(
                name,
                WireType::Len,
                kind.to_string(),
            )),
        }
    }

    fn map_entry(
        &self,
        mut reader: WireReader<'_>,
        map: &MapType,
        depth: usize,
    ) -> Result<(MapKey, Value)> {
        let mut key = None;
        let mut value = None;

        loop {
            let offset = reader.offset();
            let Some((number, wire_type)) = reader.read_tag()? else {
                break;
            };

            let (slot, kind, name) = match number {
                1 => (&mut key, map.key_type(), "key"),
                2 => (&mut value, map.value_type(), "value"),
                _ => {
                    self.unknown(&mut reader, MAP_ENTRY, number, wire_type)?;
                    continue;
                }
            };

            reject_groups(wire_type, offset)?;
            expect_wire_type(name, kind, wire_type)?;
            *slot = Some(self.single(&mut reader, kind, name, depth)?);
        }

        // Missing halves take the type's default, as protobuf does
        let key = key.unwrap_or_else(|| default_value(map.key_type()));
        let key = to_map_key(key).map_err(|_| {
            DecodeError::type_mismatch(
                "key",
                map.key_type().wire_type(),
                map.key_type().to_string(),
            )
        })?;
        let value = value.unwrap_or_else(|| default_value(map.value_type()));

        Ok((key, value))
    }
}

fn scalar_value(reader: &mut WireReader<'_>, scalar: ScalarType, name: &str) -> Result<Value> {
    let bits = match scalar {
        ScalarType::String => {
            let payload = reader.read_length_delimited()?;
            return std::str::from_utf8(payload)
                .map(|s| Value::String(s.to_string()))
                .map_err(|_| DecodeError::InvalidUtf8 {
                    field: name.to_string(),
                });
        }
        ScalarType::Bytes => {
            let payload = reader.read_length_delimited()?;
            return Ok(Value::String(STANDARD.encode(payload)));
        }
        _ => match scalar.wire_type() {
            WireType::I64 => reader.read_fixed64()?,
            WireType::I32 => u64::from(reader.read_fixed32()?),
            _ => reader.read_varint()?,
        },
    };

    from_wire_bits(scalar, bits)
        .ok_or_else(|| DecodeError::type_mismatch(name, scalar.wire_type(), scalar.name()))
}

fn reject_groups(wire_type: WireType, offset: usize) -> Result<()> {
    match wire_type {
        WireType::StartGroup | WireType::EndGroup => {
            Err(DecodeError::UnsupportedWireType { wire_type, offset })
        }
        _ => Ok(()),
    }
}

fn expect_wire_type(name: &str, kind: &Kind, found: WireType) -> Result<()> {
    if found == kind.wire_type() {
        Ok(())
    } else {
        Err(DecodeError::type_mismatch(name, found, kind.to_string()))
    }
}

/// The value a field holds when it is absent from the wire
pub(crate) fn default_value(kind: &Kind) -> Value {
    match kind {
        Kind::Scalar(ScalarType::String | ScalarType::Bytes) => Value::String(String::new()),
        Kind::Scalar(scalar) => from_wire_bits(*scalar, 0).unwrap_or(Value::U64(0)),
        Kind::Enum(_) => Value::I32(0),
        Kind::Message(_) => Value::Message(Record::new()),
        Kind::Map(_) => Value::Map(BTreeMap::new()),
    }
}

/// Drops the other members of the field's oneof: the last one read wins
fn clear_oneof(record: &mut Record, field: &FieldDescriptor) {
    let Some(oneof) = field.containing_oneof() else {
        return;
    };
    for member in oneof.fields() {
        if member.number() != field.number() {
            record.remove(member.name());
        }
    }
}

fn push(record: &mut Record, name: &str, value: Value) {
    match record.get_mut(name) {
        Some(Value::List(items)) => items.push(value),
        _ => {
            record.insert(name.to_string(), Value::List(vec![value]));
        }
    }
}

fn insert_entry(record: &mut Record, name: &str, key: MapKey, value: Value) {
    match record.get_mut(name) {
        Some(Value::Map(entries)) => {
            // Later entries win
            entries.insert(key, value);
        }
        _ => {
            record.insert(name.to_string(), Value::Map(BTreeMap::from([(key, value)])));
        }
    }
}
