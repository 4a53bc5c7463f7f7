//! Building a [`Schema`] from compiled descriptors.
//!
//! `protoc --descriptor_set_out` (or any tool emitting a
//! `FileDescriptorSet`) produces the input; prost-reflect resolves it into a
//! `DescriptorPool`, which is then folded into the codec's own model:
//!
//! 1. Synthetic `*Entry` messages of map fields become [`TypeRef::Map`]
//! 2. Synthetic oneofs of proto3 `optional` fields are dropped
//! 3. Group fields are rejected

use prost::Message;
use prost_reflect::{DescriptorPool, FieldDescriptor as ReflectField, Kind as ReflectKind};
use prost_types::{FileDescriptorProto, FileDescriptorSet};
use tracing::{debug, trace};

use super::builder::{EnumDef, FieldDef, FileDef, MessageDef, SchemaBuilder, TypeRef};
use super::{ScalarType, Schema};
use crate::error::{Result, SchemaError};

impl Schema {
    /// Builds a schema from every file in a prost-reflect pool
    pub fn from_descriptor_pool(pool: &DescriptorPool) -> Result<Self> {
        let mut builder = SchemaBuilder::new();

        for file in pool.files() {
            trace!("Adapting {}", file.name());
            let mut def = FileDef::new(file.name()).package(file.package_name());
            for message in file.messages() {
                def = def.message(message_def(&message)?);
            }
            for enum_type in file.enums() {
                def = def.enumeration(enum_def(&enum_type));
            }
            builder.add_file(def);
        }

        builder.build()
    }

    /// Builds a schema from a `FileDescriptorSet`
    pub fn from_file_descriptor_set(set: FileDescriptorSet) -> Result<Self> {
        let pool = DescriptorPool::from_file_descriptor_set(set).map_err(|e| {
            SchemaError::descriptor_build(format!("failed to resolve descriptor set: {}", e))
        })?;
        debug!("Resolved descriptor pool with {} files", pool.files().len());
        Self::from_descriptor_pool(&pool)
    }

    /// Builds a schema from file descriptors, e.g. ones embedded by prost-build
    pub fn from_file_descriptor_protos(
        files: impl IntoIterator<Item = FileDescriptorProto>,
    ) -> Result<Self> {
        Self::from_file_descriptor_set(FileDescriptorSet {
            file: files.into_iter().collect(),
        })
    }

    /// Builds a schema from a serialized `FileDescriptorSet`
    pub fn decode_file_descriptor_set(bytes: &[u8]) -> Result<Self> {
        let set = FileDescriptorSet::decode(bytes)?;
        Self::from_file_descriptor_set(set)
    }
}

fn message_def(message: &prost_reflect::MessageDescriptor) -> Result<MessageDef> {
    let mut def = MessageDef::new(message.name());

    for field in message.fields() {
        let field_def = field_def(&field)?;
        match field.containing_oneof() {
            // proto3 `optional` fields sit in a synthetic oneof of their own
            Some(oneof) if !field.field_descriptor_proto().proto3_optional() => {
                def = def.oneof_field(oneof.name(), field_def);
            }
            _ => def = def.field(field_def),
        }
    }

    for nested in message.child_messages() {
        // Map entries are folded into the map field's type
        if nested.is_map_entry() {
            continue;
        }
        def = def.message(message_def(&nested)?);
    }
    for enum_type in message.child_enums() {
        def = def.enumeration(enum_def(&enum_type));
    }

    Ok(def)
}

fn field_def(field: &ReflectField) -> Result<FieldDef> {
    if field.is_group() {
        return Err(SchemaError::UnsupportedGroup(field.full_name().to_string()));
    }

    if field.is_map() {
        let entry = match field.kind() {
            ReflectKind::Message(entry) => entry,
            _ => {
                return Err(SchemaError::invalid_map(
                    field.full_name(),
                    "map field without an entry message",
                ))
            }
        };
        let key = type_ref(&entry.map_entry_key_field().kind());
        let value = type_ref(&entry.map_entry_value_field().kind());
        return Ok(FieldDef::new(
            field.name(),
            field.number(),
            TypeRef::map(key, value),
        ));
    }

    let def = FieldDef::new(field.name(), field.number(), type_ref(&field.kind()));
    Ok(if field.is_list() { def.repeated() } else { def })
}

fn enum_def(enum_type: &prost_reflect::EnumDescriptor) -> EnumDef {
    enum_type
        .values()
        .fold(EnumDef::new(enum_type.name()), |def, value| {
            def.value(value.name(), value.number())
        })
}

fn type_ref(kind: &ReflectKind) -> TypeRef {
    let scalar = match kind {
        ReflectKind::Double => ScalarType::Double,
        ReflectKind::Float => ScalarType::Float,
        ReflectKind::Int32 => ScalarType::Int32,
        ReflectKind::Int64 => ScalarType::Int64,
        ReflectKind::Uint32 => ScalarType::Uint32,
        ReflectKind::Uint64 => ScalarType::Uint64,
        ReflectKind::Sint32 => ScalarType::Sint32,
        ReflectKind::Sint64 => ScalarType::Sint64,
        ReflectKind::Fixed32 => ScalarType::Fixed32,
        ReflectKind::Fixed64 => ScalarType::Fixed64,
        ReflectKind::Sfixed32 => ScalarType::Sfixed32,
        ReflectKind::Sfixed64 => ScalarType::Sfixed64,
        ReflectKind::Bool => ScalarType::Bool,
        ReflectKind::String => ScalarType::String,
        ReflectKind::Bytes => ScalarType::Bytes,
        // Absolute references: the pool has already resolved them
        ReflectKind::Message(message) => return TypeRef::named(format!(".{}", message.full_name())),
        ReflectKind::Enum(enum_type) => return TypeRef::named(format!(".{}", enum_type.full_name())),
    };
    TypeRef::Scalar(scalar)
}
