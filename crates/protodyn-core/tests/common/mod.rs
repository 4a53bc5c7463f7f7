//! Shared descriptors for integration tests.

#![allow(dead_code)]

use prost_reflect::DescriptorPool;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, FileDescriptorSet, MessageOptions, OneofDescriptorProto,
};
use protodyn_core::{Record, Schema, Value};

pub fn field(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        r#type: Some(ty as i32),
        label: Some(Label::Optional as i32),
        json_name: Some(name.to_string()),
        ..Default::default()
    }
}

pub fn repeated(mut field: FieldDescriptorProto) -> FieldDescriptorProto {
    field.label = Some(Label::Repeated as i32);
    field
}

pub fn named(mut field: FieldDescriptorProto, type_name: &str) -> FieldDescriptorProto {
    field.type_name = Some(type_name.to_string());
    field
}

pub fn in_oneof(mut field: FieldDescriptorProto, index: i32) -> FieldDescriptorProto {
    field.oneof_index = Some(index);
    field
}

pub fn map_entry(name: &str, key: FieldDescriptorProto, value: FieldDescriptorProto) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field: vec![key, value],
        options: Some(MessageOptions {
            map_entry: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn enum_value(name: &str, number: i32) -> EnumValueDescriptorProto {
    EnumValueDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        ..Default::default()
    }
}

/// `full.proto`: one message exercising every field shape
pub fn full_proto() -> FileDescriptorProto {
    const SIMPLE_MESSAGE: &str = ".full.ComplexMessage.SimpleMessage";
    const SIMPLE_ENUM: &str = ".full.ComplexMessage.SimpleEnum";

    let simple_message = DescriptorProto {
        name: Some("SimpleMessage".to_string()),
        field: vec![
            field("some_field", 1, Type::Int32),
            field("some_field2", 2, Type::String),
        ],
        ..Default::default()
    };

    let simple_enum = EnumDescriptorProto {
        name: Some("SimpleEnum".to_string()),
        value: vec![
            enum_value("UNSPECIFIED", 0),
            enum_value("VALUE_A", 1),
            enum_value("VALUE_B", 2),
            enum_value("VALUE_B7", 7),
            enum_value("VALUE_B8", 8),
        ],
        ..Default::default()
    };

    let complex = DescriptorProto {
        name: Some("ComplexMessage".to_string()),
        field: vec![
            named(field("enum", 1, Type::Enum), SIMPLE_ENUM),
            field("scalar_int32", 2, Type::Int32),
            field("scalar_int64", 3, Type::Int64),
            field("scalar_uint32", 4, Type::Uint32),
            field("scalar_uint64", 5, Type::Uint64),
            field("scalar_sint32", 6, Type::Sint32),
            field("scalar_sint64", 7, Type::Sint64),
            field("scalar_fixed32", 8, Type::Fixed32),
            field("scalar_fixed64", 9, Type::Fixed64),
            field("scalar_sfixed32", 10, Type::Sfixed32),
            field("scalar_sfixed64", 11, Type::Sfixed64),
            field("scalar_bool", 12, Type::Bool),
            field("scalar_string", 13, Type::String),
            field("scalar_float", 14, Type::Float),
            field("scalar_double", 15, Type::Double),
            named(field("message", 16, Type::Message), SIMPLE_MESSAGE),
            field("bytes", 17, Type::Bytes),
            named(
                repeated(field("map_enum", 18, Type::Message)),
                ".full.ComplexMessage.MapEnumEntry",
            ),
            named(
                repeated(field("map_scalar", 19, Type::Message)),
                ".full.ComplexMessage.MapScalarEntry",
            ),
            named(
                repeated(field("map_msg", 20, Type::Message)),
                ".full.ComplexMessage.MapMsgEntry",
            ),
            named(repeated(field("r_enum", 21, Type::Enum)), SIMPLE_ENUM),
            repeated(field("r_scalar", 22, Type::Int32)),
            named(repeated(field("r_msg", 23, Type::Message)), SIMPLE_MESSAGE),
            repeated(field("r_bytes", 24, Type::Bytes)),
            in_oneof(field("text", 25, Type::String), 0),
            in_oneof(field("count", 26, Type::Uint64), 0),
        ],
        nested_type: vec![
            simple_message,
            map_entry(
                "MapEnumEntry",
                field("key", 1, Type::Int32),
                named(field("value", 2, Type::Enum), SIMPLE_ENUM),
            ),
            map_entry(
                "MapScalarEntry",
                field("key", 1, Type::Int32),
                field("value", 2, Type::Int32),
            ),
            map_entry(
                "MapMsgEntry",
                field("key", 1, Type::String),
                named(field("value", 2, Type::Message), SIMPLE_MESSAGE),
            ),
        ],
        enum_type: vec![simple_enum],
        oneof_decl: vec![OneofDescriptorProto {
            name: Some("payload".to_string()),
            ..Default::default()
        }],
        ..Default::default()
    };

    FileDescriptorProto {
        name: Some("full.proto".to_string()),
        package: Some("full".to_string()),
        syntax: Some("proto3".to_string()),
        message_type: vec![complex],
        ..Default::default()
    }
}

pub fn full_set() -> FileDescriptorSet {
    FileDescriptorSet {
        file: vec![full_proto()],
    }
}

pub fn full_pool() -> DescriptorPool {
    DescriptorPool::from_file_descriptor_set(full_set()).unwrap()
}

pub fn full_schema() -> Schema {
    Schema::from_file_descriptor_set(full_set()).unwrap()
}

pub fn record<const N: usize>(fields: [(&str, Value); N]) -> Record {
    fields
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}
