//! Error types for the protodyn-core library.
//!
//! Every failure mode of the codec is represented by a `thiserror` enum:
//!
//! - [`DecodeError`]: wire bytes could not be turned into a value tree
//! - [`EncodeError`]: a value tree could not be turned into wire bytes
//! - [`CoercionError`]: a [`Value`](crate::Value) has the wrong shape for a scalar
//! - [`SchemaError`]: a descriptor graph could not be built
//!
//! Errors raised below a field are wrapped in an `InField` variant at every
//! message level they pass through, so the rendered message reads as a path
//! from the outermost message down to the offending field.

use crate::wire::WireType;
use thiserror::Error;

/// Result type alias for schema construction
pub type Result<T, E = SchemaError> = std::result::Result<T, E>;

/// Failure to decode a wire-format buffer
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum DecodeError {
    /// The buffer ended inside a field (not at a tag boundary)
    #[error("truncated input at offset {offset}: {details}")]
    TruncatedInput {
        /// Byte offset where more data was expected
        offset: usize,
        /// What was being read
        details: String,
    },

    /// A varint ran past 10 bytes or overflowed 64 bits
    #[error("malformed varint at offset {offset}")]
    MalformedVarint {
        /// Byte offset where the varint started
        offset: usize,
    },

    /// A wire tag named a field number the message does not declare
    #[error("unknown field number {number} in message '{message}'")]
    UnknownField {
        /// Full name of the message being decoded
        message: String,
        /// The unrecognized field number
        number: u32,
    },

    /// Wire type incompatible with the declared field type
    #[error("type mismatch for field '{field}': wire type {wire_type:?} cannot carry {expected}")]
    TypeMismatch {
        /// Field name
        field: String,
        /// Wire type found in the tag
        wire_type: WireType,
        /// Declared type of the field
        expected: String,
    },

    /// Deprecated group start/end wire types
    #[error("unsupported wire type {wire_type:?} at offset {offset}")]
    UnsupportedWireType {
        /// The group wire type encountered
        wire_type: WireType,
        /// Byte offset of the tag
        offset: usize,
    },

    /// Wire type bits 6 or 7
    #[error("invalid wire type {value} at offset {offset}")]
    InvalidWireType {
        /// Raw wire type bits
        value: u8,
        /// Byte offset of the tag
        offset: usize,
    },

    /// Tag carried field number 0 or one beyond the protobuf maximum
    #[error("invalid field number {number} at offset {offset}")]
    InvalidFieldNumber {
        /// The invalid field number
        number: u64,
        /// Byte offset of the tag
        offset: usize,
    },

    /// A `string` payload was not valid UTF-8
    #[error("invalid UTF-8 in string field '{field}'")]
    InvalidUtf8 {
        /// Field name
        field: String,
    },

    /// An end-group marker did not match the open group
    #[error("unbalanced group for field {number} at offset {offset}")]
    UnbalancedGroup {
        /// Field number of the mismatched marker
        number: u32,
        /// Byte offset of the marker
        offset: usize,
    },

    /// Nested messages exceeded the configured depth
    #[error("recursion limit of {limit} exceeded")]
    RecursionLimitExceeded {
        /// The configured maximum depth
        limit: usize,
    },

    /// Error raised while decoding a specific field
    #[error("{message}.{field}: {source}")]
    InField {
        /// Full name of the enclosing message
        message: String,
        /// Field name
        field: String,
        /// Underlying error
        #[source]
        source: Box<DecodeError>,
    },
}

impl DecodeError {
    /// Creates a new truncated input error
    pub fn truncated(offset: usize, details: impl Into<String>) -> Self {
        Self::TruncatedInput {
            offset,
            details: details.into(),
        }
    }

    /// Creates a new malformed varint error
    pub fn malformed_varint(offset: usize) -> Self {
        Self::MalformedVarint { offset }
    }

    /// Creates a new unknown field error
    pub fn unknown_field(message: impl Into<String>, number: u32) -> Self {
        Self::UnknownField {
            message: message.into(),
            number,
        }
    }

    /// Creates a new type mismatch error
    pub fn type_mismatch(
        field: impl Into<String>,
        wire_type: WireType,
        expected: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            wire_type,
            expected: expected.into(),
        }
    }

    /// Wraps this error with the message and field it was raised under
    pub fn in_field(self, message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InField {
            message: message.into(),
            field: field.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, skipping any `InField` wrappers
    pub fn root_cause(&self) -> &DecodeError {
        match self {
            Self::InField { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Failure to encode a value tree
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum EncodeError {
    /// A scalar value could not be converted to the declared width
    #[error(transparent)]
    Coercion(#[from] CoercionError),

    /// The value variant cannot represent the declared field type
    #[error("expected {expected}, found {found}")]
    UnexpectedValue {
        /// Declared type
        expected: String,
        /// Variant supplied by the caller
        found: &'static str,
    },

    /// A record key names no field of the message
    #[error("message '{message}' has no field named '{field}'")]
    UnknownField {
        /// Full name of the message being encoded
        message: String,
        /// The unrecognized key
        field: String,
    },

    /// A `bytes` field held a string that is not valid base64
    #[error("invalid base64 in bytes value: {0}")]
    InvalidBase64(String),

    /// Nested messages exceeded the configured depth
    #[error("recursion limit of {limit} exceeded")]
    RecursionLimitExceeded {
        /// The configured maximum depth
        limit: usize,
    },

    /// Error raised while encoding a specific field
    #[error("{message}.{field}: {source}")]
    InField {
        /// Full name of the enclosing message
        message: String,
        /// Field name
        field: String,
        /// Underlying error
        #[source]
        source: Box<EncodeError>,
    },
}

impl EncodeError {
    /// Creates a new unexpected value error
    pub fn unexpected(expected: impl Into<String>, found: &'static str) -> Self {
        Self::UnexpectedValue {
            expected: expected.into(),
            found,
        }
    }

    /// Wraps this error with the message and field it was raised under
    pub fn in_field(self, message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InField {
            message: message.into(),
            field: field.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, skipping any `InField` wrappers
    pub fn root_cause(&self) -> &EncodeError {
        match self {
            Self::InField { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// A value could not be converted to the scalar representation required
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum CoercionError {
    /// The value variant has no numeric/boolean/string interpretation
    #[error("cannot coerce {found} to {target}")]
    Unsupported {
        /// Target representation
        target: &'static str,
        /// Variant supplied
        found: &'static str,
    },

    /// A string did not parse as the target representation
    #[error("cannot parse '{input}' as {target}")]
    Unparseable {
        /// Target representation
        target: &'static str,
        /// The rejected string
        input: String,
    },

    /// The logical value does not fit the declared width
    #[error("value {value} out of range for {target}")]
    OutOfRange {
        /// Target representation
        target: &'static str,
        /// Rendered logical value
        value: String,
    },
}

impl CoercionError {
    pub(crate) fn unsupported(target: &'static str, found: &'static str) -> Self {
        Self::Unsupported { target, found }
    }

    pub(crate) fn unparseable(target: &'static str, input: impl Into<String>) -> Self {
        Self::Unparseable {
            target,
            input: input.into(),
        }
    }

    pub(crate) fn out_of_range(target: &'static str, value: impl ToString) -> Self {
        Self::OutOfRange {
            target,
            value: value.to_string(),
        }
    }

    /// Same failure, reported against another target representation
    pub(crate) fn retarget(self, target: &'static str) -> Self {
        match self {
            Self::Unsupported { found, .. } => Self::Unsupported { target, found },
            Self::Unparseable { input, .. } => Self::Unparseable { target, input },
            Self::OutOfRange { value, .. } => Self::OutOfRange { target, value },
        }
    }
}

/// Failure to build a descriptor graph
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SchemaError {
    /// Two types share a fully-qualified name
    #[error("duplicate type name '{0}'")]
    DuplicateType(String),

    /// A field refers to a type that was never defined
    #[error("field '{field}' refers to unknown type '{type_name}'")]
    UnresolvedType {
        /// Full field path (`Message.field`)
        field: String,
        /// The missing type name
        type_name: String,
    },

    /// Field number out of the protobuf range
    #[error("invalid field number {number} for '{field}': must be between 1 and {max}")]
    InvalidFieldNumber {
        /// Full field path
        field: String,
        /// The invalid field number
        number: u32,
        /// Maximum valid field number
        max: u32,
    },

    /// Two fields of one message share a number
    #[error("field number {number} used more than once in '{message}'")]
    DuplicateFieldNumber {
        /// Message full name
        message: String,
        /// The reused number
        number: u32,
    },

    /// Two fields of one message share a name
    #[error("field name '{field}' used more than once in '{message}'")]
    DuplicateFieldName {
        /// Message full name
        message: String,
        /// The reused name
        field: String,
    },

    /// Map key or value type not allowed by protobuf
    #[error("invalid map type for '{field}': {details}")]
    InvalidMapType {
        /// Full field path
        field: String,
        /// Why the type was rejected
        details: String,
    },

    /// Oneof members cannot be repeated or maps
    #[error("oneof member '{0}' cannot be repeated or a map")]
    InvalidOneofMember(String),

    /// Group-typed fields are not supported
    #[error("group field '{0}' is not supported")]
    UnsupportedGroup(String),

    /// Failed to parse a serialized FileDescriptorSet
    #[error("failed to parse FileDescriptorSet: {0}")]
    DescriptorParse(#[from] prost::DecodeError),

    /// Failed to build a descriptor pool with prost-reflect
    #[error("failed to build descriptor pool: {0}")]
    DescriptorBuild(String),
}

impl SchemaError {
    /// Creates a new descriptor build error
    pub fn descriptor_build(msg: impl Into<String>) -> Self {
        Self::DescriptorBuild(msg.into())
    }

    /// Creates a new invalid map type error
    pub fn invalid_map(field: impl Into<String>, details: impl Into<String>) -> Self {
        Self::InvalidMapType {
            field: field.into(),
            details: details.into(),
        }
    }
}
