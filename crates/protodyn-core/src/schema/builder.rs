//! Programmatic schema construction.
//!
//! Definitions mirror the shape of a `.proto` file: a [`FileDef`] holds
//! messages and enums, a [`MessageDef`] holds fields, oneofs and nested
//! types. Type references are resolved when [`SchemaBuilder::build`] runs,
//! using protobuf scoping: a relative name is looked up from the innermost
//! enclosing message outwards, a name with a leading dot is absolute.

use std::collections::HashMap;

use super::{
    EnumInner, FieldInner, FileInner, MessageInner, OneofInner, ScalarType, Schema, SchemaInner,
    TypeId,
};
use crate::error::{Result, SchemaError};
use crate::MAX_FIELD_NUMBER;
use std::sync::Arc;
use tracing::debug;

/// A reference to a field's type, resolved at build time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    /// A scalar keyword
    Scalar(ScalarType),
    /// A message or enum name, relative or absolute (leading dot)
    Named(String),
    /// `map<key, value>`
    Map(Box<TypeRef>, Box<TypeRef>),
}

impl TypeRef {
    /// A message or enum reference
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    /// A `map<key, value>` type
    pub fn map(key: impl Into<TypeRef>, value: impl Into<TypeRef>) -> Self {
        TypeRef::Map(Box::new(key.into()), Box::new(value.into()))
    }
}

impl From<ScalarType> for TypeRef {
    fn from(scalar: ScalarType) -> Self {
        TypeRef::Scalar(scalar)
    }
}

/// Scalar keywords become [`TypeRef::Scalar`], anything else a name
impl From<&str> for TypeRef {
    fn from(name: &str) -> Self {
        name.parse::<ScalarType>()
            .map(TypeRef::Scalar)
            .unwrap_or_else(|_| TypeRef::named(name))
    }
}

impl From<String> for TypeRef {
    fn from(name: String) -> Self {
        TypeRef::from(name.as_str())
    }
}

/// A field definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    name: String,
    number: u32,
    ty: TypeRef,
    repeated: bool,
}

impl FieldDef {
    /// Creates a singular field
    pub fn new(name: impl Into<String>, number: u32, ty: impl Into<TypeRef>) -> Self {
        Self {
            name: name.into(),
            number,
            ty: ty.into(),
            repeated: false,
        }
    }

    /// Marks the field `repeated`
    pub fn repeated(mut self) -> Self {
        self.repeated = true;
        self
    }
}

/// A oneof group definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneofDef {
    name: String,
    fields: Vec<FieldDef>,
}

impl OneofDef {
    /// Creates an empty oneof
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Adds a member field
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }
}

/// An enum definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDef {
    name: String,
    values: Vec<(String, i32)>,
}

impl EnumDef {
    /// Creates an enum with no values
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
        }
    }

    /// Adds a value
    pub fn value(mut self, name: impl Into<String>, number: i32) -> Self {
        self.values.push((name.into(), number));
        self
    }
}

/// A message definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDef {
    name: String,
    /// Fields in declaration order, with the index of their oneof
    fields: Vec<(FieldDef, Option<usize>)>,
    oneofs: Vec<String>,
    messages: Vec<MessageDef>,
    enums: Vec<EnumDef>,
}

impl MessageDef {
    /// Creates an empty message
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            oneofs: Vec::new(),
            messages: Vec::new(),
            enums: Vec::new(),
        }
    }

    /// Adds a field (normal or map)
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push((field, None));
        self
    }

    /// Adds a oneof and all of its members
    pub fn oneof(self, oneof: OneofDef) -> Self {
        let OneofDef { name, fields } = oneof;
        let mut this = self.declare_oneof(&name);
        let index = this.oneof_index(&name);
        this.fields
            .extend(fields.into_iter().map(|field| (field, Some(index))));
        this
    }

    /// Adds one member to the named oneof, declaring the oneof on first use
    pub fn oneof_field(self, oneof: &str, field: FieldDef) -> Self {
        let mut this = self.declare_oneof(oneof);
        let index = this.oneof_index(oneof);
        this.fields.push((field, Some(index)));
        this
    }

    /// Adds a nested message
    pub fn message(mut self, message: MessageDef) -> Self {
        self.messages.push(message);
        self
    }

    /// Adds a nested enum
    pub fn enumeration(mut self, enum_def: EnumDef) -> Self {
        self.enums.push(enum_def);
        self
    }

    fn declare_oneof(mut self, name: &str) -> Self {
        if !self.oneofs.iter().any(|existing| existing == name) {
            self.oneofs.push(name.to_string());
        }
        self
    }

    fn oneof_index(&self, name: &str) -> usize {
        self.oneofs
            .iter()
            .position(|existing| existing == name)
            .unwrap_or(self.oneofs.len())
    }
}

/// A file definition: a package plus top-level messages and enums
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDef {
    name: String,
    package: String,
    messages: Vec<MessageDef>,
    enums: Vec<EnumDef>,
}

impl FileDef {
    /// Creates an empty file without a package
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            package: String::new(),
            messages: Vec::new(),
            enums: Vec::new(),
        }
    }

    /// Sets the package
    pub fn package(mut self, package: impl Into<String>) -> Self {
        self.package = package.into();
        self
    }

    /// Adds a top-level message
    pub fn message(mut self, message: MessageDef) -> Self {
        self.messages.push(message);
        self
    }

    /// Adds a top-level enum
    pub fn enumeration(mut self, enum_def: EnumDef) -> Self {
        self.enums.push(enum_def);
        self
    }
}

/// Collects file definitions and resolves them into a [`Schema`]
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    files: Vec<FileDef>,
}

impl SchemaBuilder {
    /// Creates an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file
    pub fn file(mut self, file: FileDef) -> Self {
        self.files.push(file);
        self
    }

    /// Adds a file through a mutable reference
    pub fn add_file(&mut self, file: FileDef) -> &mut Self {
        self.files.push(file);
        self
    }

    /// Resolves all type references and validates the graph
    pub fn build(self) -> Result<Schema> {
        let mut inner = SchemaInner {
            files: Vec::with_capacity(self.files.len()),
            messages: Vec::new(),
            enums: Vec::new(),
            message_names: HashMap::new(),
            enum_names: HashMap::new(),
        };

        // First pass: assign an index to every named type
        let mut pending = Vec::new();
        for (file_index, file) in self.files.iter().enumerate() {
            inner.files.push(FileInner {
                name: file.name.clone(),
                package: file.package.clone(),
            });
            for message in &file.messages {
                register_message(&mut inner, &mut pending, file_index, &file.package, message)?;
            }
            for enum_def in &file.enums {
                register_enum(&mut inner, file_index, &file.package, enum_def)?;
            }
        }

        // Second pass: resolve field types now that every name is known
        for (index, def) in pending {
            let (fields, oneof_members) = resolve_fields(&inner, index, def)?;
            let message = &mut inner.messages[index];
            message.field_numbers = fields
                .iter()
                .enumerate()
                .map(|(i, field)| (field.number, i))
                .collect();
            message.field_names = fields
                .iter()
                .enumerate()
                .map(|(i, field)| (field.name.clone(), i))
                .collect();
            for (oneof, members) in message.oneofs.iter_mut().zip(oneof_members) {
                oneof.fields = members;
            }
            message.fields = fields;
        }

        debug!(
            "Built schema: {} files, {} messages, {} enums",
            inner.files.len(),
            inner.messages.len(),
            inner.enums.len()
        );

        Ok(Schema {
            inner: Arc::new(inner),
        })
    }
}

fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", scope, name)
    }
}

fn claim_name(inner: &SchemaInner, full_name: &str) -> Result<()> {
    if inner.message_names.contains_key(full_name) || inner.enum_names.contains_key(full_name) {
        return Err(SchemaError::DuplicateType(full_name.to_string()));
    }
    Ok(())
}

fn register_message<'a>(
    inner: &mut SchemaInner,
    pending: &mut Vec<(usize, &'a MessageDef)>,
    file: usize,
    scope: &str,
    def: &'a MessageDef,
) -> Result<()> {
    let full_name = qualify(scope, &def.name);
    claim_name(inner, &full_name)?;

    let index = inner.messages.len();
    inner.messages.push(MessageInner {
        name: def.name.clone(),
        full_name: full_name.clone(),
        file,
        fields: Vec::new(),
        field_numbers: HashMap::new(),
        field_names: HashMap::new(),
        oneofs: def
            .oneofs
            .iter()
            .map(|name| OneofInner {
                name: name.clone(),
                fields: Vec::new(),
            })
            .collect(),
    });
    inner.message_names.insert(full_name.clone(), index);
    pending.push((index, def));

    for nested in &def.messages {
        register_message(inner, pending, file, &full_name, nested)?;
    }
    for enum_def in &def.enums {
        register_enum(inner, file, &full_name, enum_def)?;
    }
    Ok(())
}

fn register_enum(inner: &mut SchemaInner, file: usize, scope: &str, def: &EnumDef) -> Result<()> {
    let full_name = qualify(scope, &def.name);
    claim_name(inner, &full_name)?;

    inner.enum_names.insert(full_name.clone(), inner.enums.len());
    inner.enums.push(EnumInner {
        name: def.name.clone(),
        full_name,
        file,
        values: def.values.clone(),
    });
    Ok(())
}

fn resolve_fields(
    inner: &SchemaInner,
    index: usize,
    def: &MessageDef,
) -> Result<(Vec<FieldInner>, Vec<Vec<usize>>)> {
    let message_name = &inner.messages[index].full_name;
    let mut numbers = HashMap::new();
    let mut names = HashMap::new();
    let mut fields = Vec::with_capacity(def.fields.len());
    let mut oneof_members = vec![Vec::new(); def.oneofs.len()];

    for (i, (field, oneof)) in def.fields.iter().enumerate() {
        let path = format!("{}.{}", message_name, field.name);

        if field.number == 0 || field.number > MAX_FIELD_NUMBER {
            return Err(SchemaError::InvalidFieldNumber {
                field: path,
                number: field.number,
                max: MAX_FIELD_NUMBER,
            });
        }
        if numbers.insert(field.number, i).is_some() {
            return Err(SchemaError::DuplicateFieldNumber {
                message: message_name.clone(),
                number: field.number,
            });
        }
        if names.insert(field.name.as_str(), i).is_some() {
            return Err(SchemaError::DuplicateFieldName {
                message: message_name.clone(),
                field: field.name.clone(),
            });
        }

        let ty = resolve_type(inner, message_name, &field.ty, &path)?;
        if let TypeId::Map(key, value) = &ty {
            if field.repeated {
                return Err(SchemaError::invalid_map(path, "map fields cannot be repeated"));
            }
            let valid_key = match **key {
                TypeId::Scalar(scalar) => scalar.is_valid_map_key(),
                TypeId::Enum(_) => true,
                TypeId::Message(_) | TypeId::Map(..) => false,
            };
            if !valid_key {
                return Err(SchemaError::invalid_map(
                    path,
                    "key must be an integral, bool or string scalar, or an enum",
                ));
            }
            if matches!(**value, TypeId::Map(..)) {
                return Err(SchemaError::invalid_map(path, "value cannot be a map"));
            }
        }

        if let Some(oneof) = *oneof {
            if field.repeated || matches!(ty, TypeId::Map(..)) {
                return Err(SchemaError::InvalidOneofMember(path));
            }
            oneof_members[oneof].push(i);
        }

        fields.push(FieldInner {
            name: field.name.clone(),
            number: field.number,
            ty,
            repeated: field.repeated,
            oneof: *oneof,
        });
    }

    Ok((fields, oneof_members))
}

fn resolve_type(inner: &SchemaInner, scope: &str, ty: &TypeRef, path: &str) -> Result<TypeId> {
    match ty {
        TypeRef::Scalar(scalar) => Ok(TypeId::Scalar(*scalar)),
        TypeRef::Named(name) => {
            lookup(inner, scope, name).ok_or_else(|| SchemaError::UnresolvedType {
                field: path.to_string(),
                type_name: name.clone(),
            })
        }
        TypeRef::Map(key, value) => Ok(TypeId::Map(
            Box::new(resolve_type(inner, scope, key, path)?),
            Box::new(resolve_type(inner, scope, value, path)?),
        )),
    }
}

fn lookup(inner: &SchemaInner, scope: &str, name: &str) -> Option<TypeId> {
    let find = |candidate: &str| {
        inner
            .message_names
            .get(candidate)
            .map(|&index| TypeId::Message(index))
            .or_else(|| inner.enum_names.get(candidate).map(|&index| TypeId::Enum(index)))
    };

    if let Some(absolute) = name.strip_prefix('.') {
        return find(absolute);
    }

    // Innermost scope first, then each enclosing scope, then the root
    let mut scope = Some(scope);
    while let Some(current) = scope {
        if let Some(found) = find(&qualify(current, name)) {
            return Some(found);
        }
        scope = match current.rfind('.') {
            Some(pos) => Some(&current[..pos]),
            None if !current.is_empty() => Some(""),
            None => None,
        };
    }
    None
}
