//! # protodyn-core
//!
//! A schema-driven, dynamic Protocol Buffers codec.
//!
//! Given a message descriptor loaded at runtime, this crate decodes wire-format
//! bytes into a generic value tree and encodes such a tree back into bytes,
//! without any generated message types.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`schema`]: Descriptor graph (built by hand or from a `FileDescriptorSet`)
//! - [`value`]: The dynamic value tree
//! - [`wire`]: Wire format cursor and writers
//! - [`coerce`]: Conversions between values and scalar bit patterns
//! - [`codec`]: The decode and encode engines
//! - [`config`]: Codec configuration
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```
//! use protodyn_core::schema::{FieldDef, FileDef, MessageDef};
//! use protodyn_core::{Record, Schema, Value};
//!
//! let schema = Schema::builder()
//!     .file(
//!         FileDef::new("point.proto").package("geo").message(
//!             MessageDef::new("Point")
//!                 .field(FieldDef::new("x", 1, "sint32"))
//!                 .field(FieldDef::new("label", 2, "string")),
//!         ),
//!     )
//!     .build()?;
//! let point = schema.get_message_by_name("geo.Point").unwrap();
//!
//! let mut record = Record::new();
//! record.insert("x".to_string(), Value::I32(-50));
//! record.insert("label".to_string(), Value::from("origin"));
//!
//! let bytes = protodyn_core::encode(&record, &point)?;
//! assert_eq!(&bytes[..2], &[0x08, 0x63]);
//! assert_eq!(protodyn_core::decode(&bytes, &point)?, record);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Descriptors compiled by `protoc --descriptor_set_out` can be loaded with
//! [`Schema::decode_file_descriptor_set`].
//!
//! ## Features
//!
//! - `json`: conversion between [`Value`] and `serde_json::Value`

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod codec;
pub mod coerce;
pub mod config;
pub mod error;
pub mod schema;
pub mod value;
pub mod wire;

// Re-export primary types for convenience
pub use codec::{decode, encode, Codec};
pub use config::{CodecConfig, UnknownFieldPolicy};
pub use error::{CoercionError, DecodeError, EncodeError, Result, SchemaError};
pub use schema::{
    EnumDescriptor, FieldDescriptor, FileDescriptor, Kind, MapType, MessageDescriptor,
    OneofDescriptor, ScalarType, Schema,
};
pub use value::{MapKey, Record, Value};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum valid protobuf field number (2^29 - 1)
pub const MAX_FIELD_NUMBER: u32 = 536_870_911;
