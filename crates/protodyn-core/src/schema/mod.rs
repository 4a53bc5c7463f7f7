//! Runtime descriptor graph consumed by the codec.
//!
//! A [`Schema`] is an immutable pool of files, messages and enums, shared
//! behind an `Arc`. Descriptors such as [`MessageDescriptor`] are cheap
//! handles (the pool plus an index), so recursive and mutually-referencing
//! message types need no cycles of owned data.
//!
//! ## Construction
//!
//! - [`SchemaBuilder`]: define files, messages and enums programmatically
//! - [`Schema::from_descriptor_pool`]: adapt a compiled `FileDescriptorSet`
//!   loaded through prost-reflect
//!
//! Both paths validate the graph once; after that the schema is read-only
//! and can be shared between threads freely.

mod builder;
mod reflect;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::wire::WireType;

pub use builder::{EnumDef, FieldDef, FileDef, MessageDef, OneofDef, SchemaBuilder, TypeRef};

/// The fifteen protobuf scalar types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// `double`
    Double,
    /// `float`
    Float,
    /// `int32`
    Int32,
    /// `int64`
    Int64,
    /// `uint32`
    Uint32,
    /// `uint64`
    Uint64,
    /// `sint32`
    Sint32,
    /// `sint64`
    Sint64,
    /// `fixed32`
    Fixed32,
    /// `fixed64`
    Fixed64,
    /// `sfixed32`
    Sfixed32,
    /// `sfixed64`
    Sfixed64,
    /// `bool`
    Bool,
    /// `string`
    String,
    /// `bytes`
    Bytes,
}

impl ScalarType {
    /// All scalar types, in `.proto` keyword order
    pub const ALL: [ScalarType; 15] = [
        ScalarType::Double,
        ScalarType::Float,
        ScalarType::Int32,
        ScalarType::Int64,
        ScalarType::Uint32,
        ScalarType::Uint64,
        ScalarType::Sint32,
        ScalarType::Sint64,
        ScalarType::Fixed32,
        ScalarType::Fixed64,
        ScalarType::Sfixed32,
        ScalarType::Sfixed64,
        ScalarType::Bool,
        ScalarType::String,
        ScalarType::Bytes,
    ];

    /// The `.proto` keyword for this type
    pub fn name(self) -> &'static str {
        match self {
            ScalarType::Double => "double",
            ScalarType::Float => "float",
            ScalarType::Int32 => "int32",
            ScalarType::Int64 => "int64",
            ScalarType::Uint32 => "uint32",
            ScalarType::Uint64 => "uint64",
            ScalarType::Sint32 => "sint32",
            ScalarType::Sint64 => "sint64",
            ScalarType::Fixed32 => "fixed32",
            ScalarType::Fixed64 => "fixed64",
            ScalarType::Sfixed32 => "sfixed32",
            ScalarType::Sfixed64 => "sfixed64",
            ScalarType::Bool => "bool",
            ScalarType::String => "string",
            ScalarType::Bytes => "bytes",
        }
    }

    /// Wire type of a single (unpacked) value
    pub fn wire_type(self) -> WireType {
        match self {
            ScalarType::Int32
            | ScalarType::Int64
            | ScalarType::Uint32
            | ScalarType::Uint64
            | ScalarType::Sint32
            | ScalarType::Sint64
            | ScalarType::Bool => WireType::Varint,
            ScalarType::Fixed64 | ScalarType::Sfixed64 | ScalarType::Double => WireType::I64,
            ScalarType::Fixed32 | ScalarType::Sfixed32 | ScalarType::Float => WireType::I32,
            ScalarType::String | ScalarType::Bytes => WireType::Len,
        }
    }

    /// Whether repeated values of this type may use packed encoding
    pub fn is_packable(self) -> bool {
        self.wire_type() != WireType::Len
    }

    /// Whether this type may be used as a map key
    pub fn is_valid_map_key(self) -> bool {
        !matches!(
            self,
            ScalarType::Double | ScalarType::Float | ScalarType::Bytes
        )
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScalarType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        ScalarType::ALL
            .into_iter()
            .find(|ty| ty.name() == s)
            .ok_or(())
    }
}

/// The declared type of a field
#[derive(Clone, PartialEq, Eq)]
pub enum Kind {
    /// One of the fifteen scalar types
    Scalar(ScalarType),
    /// An enum, carried on the wire as a varint
    Enum(EnumDescriptor),
    /// An embedded message
    Message(MessageDescriptor),
    /// A map, carried as repeated key/value entry messages
    Map(Box<MapType>),
}

impl Kind {
    /// Wire type of a single value of this kind
    pub fn wire_type(&self) -> WireType {
        match self {
            Kind::Scalar(scalar) => scalar.wire_type(),
            Kind::Enum(_) => WireType::Varint,
            Kind::Message(_) | Kind::Map(_) => WireType::Len,
        }
    }

    /// Whether repeated values of this kind may use packed encoding
    pub fn is_packable(&self) -> bool {
        match self {
            Kind::Scalar(scalar) => scalar.is_packable(),
            Kind::Enum(_) => true,
            Kind::Message(_) | Kind::Map(_) => false,
        }
    }

    /// Returns the scalar type, if this is a scalar
    pub fn as_scalar(&self) -> Option<ScalarType> {
        match self {
            Kind::Scalar(scalar) => Some(*scalar),
            _ => None,
        }
    }

    /// Returns the message descriptor, if this is a message
    pub fn as_message(&self) -> Option<&MessageDescriptor> {
        match self {
            Kind::Message(message) => Some(message),
            _ => None,
        }
    }

    /// Returns the map type, if this is a map
    pub fn as_map(&self) -> Option<&MapType> {
        match self {
            Kind::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Scalar(scalar) => write!(f, "{}", scalar),
            Kind::Enum(enum_type) => write!(f, "enum {}", enum_type.full_name()),
            Kind::Message(message) => write!(f, "message {}", message.full_name()),
            Kind::Map(map) => write!(f, "map<{}, {}>", map.key, map.value),
        }
    }
}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Kind({})", self)
    }
}

/// Key and value types of a map field
#[derive(Clone, PartialEq, Eq)]
pub struct MapType {
    key: Kind,
    value: Kind,
}

impl MapType {
    /// The key type (a scalar or an enum)
    pub fn key_type(&self) -> &Kind {
        &self.key
    }

    /// The value type (anything but a map)
    pub fn value_type(&self) -> &Kind {
        &self.value
    }
}

/// An immutable, shareable pool of protobuf definitions
#[derive(Clone)]
pub struct Schema {
    inner: Arc<SchemaInner>,
}

#[derive(Debug)]
struct SchemaInner {
    files: Vec<FileInner>,
    messages: Vec<MessageInner>,
    enums: Vec<EnumInner>,
    message_names: HashMap<String, usize>,
    enum_names: HashMap<String, usize>,
}

#[derive(Debug)]
struct FileInner {
    name: String,
    package: String,
}

#[derive(Debug)]
struct MessageInner {
    name: String,
    full_name: String,
    file: usize,
    fields: Vec<FieldInner>,
    field_numbers: HashMap<u32, usize>,
    field_names: HashMap<String, usize>,
    oneofs: Vec<OneofInner>,
}

#[derive(Debug)]
struct FieldInner {
    name: String,
    number: u32,
    ty: TypeId,
    repeated: bool,
    oneof: Option<usize>,
}

#[derive(Debug)]
struct OneofInner {
    name: String,
    fields: Vec<usize>,
}

#[derive(Debug)]
struct EnumInner {
    name: String,
    full_name: String,
    file: usize,
    values: Vec<(String, i32)>,
}

/// Resolved field type, indexing into the pool
#[derive(Debug, Clone)]
enum TypeId {
    Scalar(ScalarType),
    Enum(usize),
    Message(usize),
    Map(Box<TypeId>, Box<TypeId>),
}

impl Schema {
    /// Starts building a schema by hand
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// Looks up a message by fully-qualified name (leading dot optional)
    pub fn get_message_by_name(&self, full_name: &str) -> Option<MessageDescriptor> {
        let name = full_name.strip_prefix('.').unwrap_or(full_name);
        self.inner
            .message_names
            .get(name)
            .map(|&index| self.message(index))
    }

    /// Looks up an enum by fully-qualified name (leading dot optional)
    pub fn get_enum_by_name(&self, full_name: &str) -> Option<EnumDescriptor> {
        let name = full_name.strip_prefix('.').unwrap_or(full_name);
        self.inner
            .enum_names
            .get(name)
            .map(|&index| self.enumeration(index))
    }

    /// All messages, in definition order
    pub fn messages(&self) -> impl ExactSizeIterator<Item = MessageDescriptor> + '_ {
        (0..self.inner.messages.len()).map(move |index| self.message(index))
    }

    /// All enums, in definition order
    pub fn enums(&self) -> impl ExactSizeIterator<Item = EnumDescriptor> + '_ {
        (0..self.inner.enums.len()).map(move |index| self.enumeration(index))
    }

    /// All files, in definition order
    pub fn files(&self) -> impl ExactSizeIterator<Item = FileDescriptor> + '_ {
        (0..self.inner.files.len()).map(move |index| FileDescriptor {
            schema: self.clone(),
            index,
        })
    }

    fn message(&self, index: usize) -> MessageDescriptor {
        MessageDescriptor {
            schema: self.clone(),
            index,
        }
    }

    fn enumeration(&self, index: usize) -> EnumDescriptor {
        EnumDescriptor {
            schema: self.clone(),
            index,
        }
    }

    fn kind(&self, ty: &TypeId) -> Kind {
        match ty {
            TypeId::Scalar(scalar) => Kind::Scalar(*scalar),
            TypeId::Enum(index) => Kind::Enum(self.enumeration(*index)),
            TypeId::Message(index) => Kind::Message(self.message(*index)),
            TypeId::Map(key, value) => Kind::Map(Box::new(MapType {
                key: self.kind(key),
                value: self.kind(value),
            })),
        }
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Schema {}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("files", &self.inner.files.len())
            .field("messages", &self.inner.messages.len())
            .field("enums", &self.inner.enums.len())
            .finish()
    }
}

/// A `.proto` file that owns messages and enums
#[derive(Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    schema: Schema,
    index: usize,
}

impl FileDescriptor {
    fn inner(&self) -> &FileInner {
        &self.schema.inner.files[self.index]
    }

    /// File name, e.g. `full.proto`
    pub fn name(&self) -> &str {
        &self.inner().name
    }

    /// Package name, empty when none was declared
    pub fn package(&self) -> &str {
        &self.inner().package
    }
}

impl fmt::Debug for FileDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileDescriptor({})", self.name())
    }
}

/// A message definition
#[derive(Clone, PartialEq, Eq)]
pub struct MessageDescriptor {
    schema: Schema,
    index: usize,
}

impl MessageDescriptor {
    fn inner(&self) -> &MessageInner {
        &self.schema.inner.messages[self.index]
    }

    /// Short name
    pub fn name(&self) -> &str {
        &self.inner().name
    }

    /// Fully-qualified name, without a leading dot
    pub fn full_name(&self) -> &str {
        &self.inner().full_name
    }

    /// The file that defines this message
    pub fn file(&self) -> FileDescriptor {
        FileDescriptor {
            schema: self.schema.clone(),
            index: self.inner().file,
        }
    }

    /// The pool this message belongs to
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// All fields (normal, map and oneof members) in declaration order
    pub fn fields(&self) -> impl ExactSizeIterator<Item = FieldDescriptor> + '_ {
        (0..self.inner().fields.len()).map(move |index| self.field(index))
    }

    /// Fields that are neither maps nor oneof members
    pub fn normal_fields(&self) -> impl Iterator<Item = FieldDescriptor> + '_ {
        self.fields()
            .filter(|field| !field.is_map() && field.containing_oneof().is_none())
    }

    /// Map fields
    pub fn map_fields(&self) -> impl Iterator<Item = FieldDescriptor> + '_ {
        self.fields().filter(FieldDescriptor::is_map)
    }

    /// Oneof groups, in declaration order
    pub fn oneofs(&self) -> impl ExactSizeIterator<Item = OneofDescriptor> + '_ {
        (0..self.inner().oneofs.len()).map(move |index| OneofDescriptor {
            message: self.clone(),
            index,
        })
    }

    /// Looks up a field by number across all field kinds
    pub fn get_field(&self, number: u32) -> Option<FieldDescriptor> {
        self.inner()
            .field_numbers
            .get(&number)
            .map(|&index| self.field(index))
    }

    /// Looks up a field by name across all field kinds
    pub fn get_field_by_name(&self, name: &str) -> Option<FieldDescriptor> {
        self.inner()
            .field_names
            .get(name)
            .map(|&index| self.field(index))
    }

    fn field(&self, index: usize) -> FieldDescriptor {
        FieldDescriptor {
            message: self.clone(),
            index,
        }
    }
}

impl fmt::Debug for MessageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageDescriptor({})", self.full_name())
    }
}

/// A field of a message
#[derive(Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    message: MessageDescriptor,
    index: usize,
}

impl FieldDescriptor {
    fn inner(&self) -> &FieldInner {
        &self.message.inner().fields[self.index]
    }

    /// Field name, used as the record key
    pub fn name(&self) -> &str {
        &self.inner().name
    }

    /// Field number
    pub fn number(&self) -> u32 {
        self.inner().number
    }

    /// Declared type
    pub fn kind(&self) -> Kind {
        self.message.schema.kind(&self.inner().ty)
    }

    /// Whether this is a `repeated` field (map fields are not)
    pub fn is_repeated(&self) -> bool {
        self.inner().repeated
    }

    /// Whether this is a map field
    pub fn is_map(&self) -> bool {
        matches!(self.inner().ty, TypeId::Map(..))
    }

    /// The oneof this field belongs to, if any
    pub fn containing_oneof(&self) -> Option<OneofDescriptor> {
        self.inner().oneof.map(|index| OneofDescriptor {
            message: self.message.clone(),
            index,
        })
    }

    /// The message declaring this field
    pub fn parent_message(&self) -> &MessageDescriptor {
        &self.message
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FieldDescriptor({}.{} = {})",
            self.message.full_name(),
            self.name(),
            self.number()
        )
    }
}

/// A oneof group of mutually exclusive fields
#[derive(Clone, PartialEq, Eq)]
pub struct OneofDescriptor {
    message: MessageDescriptor,
    index: usize,
}

impl OneofDescriptor {
    fn inner(&self) -> &OneofInner {
        &self.message.inner().oneofs[self.index]
    }

    /// Oneof name
    pub fn name(&self) -> &str {
        &self.inner().name
    }

    /// Member fields, in declaration order
    pub fn fields(&self) -> impl ExactSizeIterator<Item = FieldDescriptor> + '_ {
        self.inner()
            .fields
            .iter()
            .map(move |&index| self.message.field(index))
    }
}

impl fmt::Debug for OneofDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OneofDescriptor({}.{})",
            self.message.full_name(),
            self.name()
        )
    }
}

/// An enum definition
#[derive(Clone, PartialEq, Eq)]
pub struct EnumDescriptor {
    schema: Schema,
    index: usize,
}

impl EnumDescriptor {
    fn inner(&self) -> &EnumInner {
        &self.schema.inner.enums[self.index]
    }

    /// Short name
    pub fn name(&self) -> &str {
        &self.inner().name
    }

    /// Fully-qualified name, without a leading dot
    pub fn full_name(&self) -> &str {
        &self.inner().full_name
    }

    /// The file that defines this enum
    pub fn file(&self) -> FileDescriptor {
        FileDescriptor {
            schema: self.schema.clone(),
            index: self.inner().file,
        }
    }

    /// `(name, number)` pairs in declaration order
    pub fn values(&self) -> impl ExactSizeIterator<Item = (&str, i32)> + '_ {
        self.inner()
            .values
            .iter()
            .map(|(name, number)| (name.as_str(), *number))
    }

    /// Number of the named value
    pub fn get_value_by_name(&self, name: &str) -> Option<i32> {
        self.values()
            .find(|(value_name, _)| *value_name == name)
            .map(|(_, number)| number)
    }

    /// Name of the first value with this number
    pub fn get_value(&self, number: i32) -> Option<&str> {
        self.values()
            .find(|(_, value_number)| *value_number == number)
            .map(|(name, _)| name)
    }
}

impl fmt::Debug for EnumDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EnumDescriptor({})", self.full_name())
    }
}
