//! Input records produced by document front ends.
//!
//! Each record is a JSON object discriminated by a `construct` tag (types and
//! functions) or an `expression` tag (expressions). The whole schema is parsed
//! in one `serde` pass; tags outside the known set deserialize into an
//! `Unrecognized` variant carrying the tag, and are rejected when the record
//! is used.

// Field names mirror the JSON keys shown on each record type.
#![allow(missing_docs)]

use crate::error::Result;
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// A type or function constructor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "construct", remote = "Self")]
pub enum TypeConstructor {
    /// Fixed-width bit string
    BitString(BitStringRecord),
    /// Fixed-length array
    Array(ArrayRecord),
    /// Structure with fields, constraints and actions
    Struct(StructRecord),
    /// Enumerated type over variant types
    Enum(EnumRecord),
    /// Type derived from an existing type
    NewType(NewTypeRecord),
    /// Free function
    Function(FunctionRecord),
    /// Context; accepted by the schema but not supported by the protocol
    Context(ContextRecord),
    /// Any other construct tag
    #[serde(skip)]
    Unrecognized(String),
}

impl TypeConstructor {
    /// Returns the construct tag
    pub fn construct(&self) -> &str {
        match self {
            TypeConstructor::BitString(_) => "BitString",
            TypeConstructor::Array(_) => "Array",
            TypeConstructor::Struct(_) => "Struct",
            TypeConstructor::Enum(_) => "Enum",
            TypeConstructor::NewType(_) => "NewType",
            TypeConstructor::Function(_) => "Function",
            TypeConstructor::Context(_) => "Context",
            TypeConstructor::Unrecognized(tag) => tag,
        }
    }

    /// Returns the name the record defines, if it has one
    pub fn name(&self) -> Option<&str> {
        match self {
            TypeConstructor::BitString(r) => Some(&r.name),
            TypeConstructor::Array(r) => Some(&r.name),
            TypeConstructor::Struct(r) => Some(&r.name),
            TypeConstructor::Enum(r) => Some(&r.name),
            TypeConstructor::NewType(r) => Some(&r.name),
            TypeConstructor::Function(r) => Some(&r.name),
            TypeConstructor::Context(r) => r.name.as_deref(),
            TypeConstructor::Unrecognized(_) => None,
        }
    }

    /// Parses a single record from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// `{construct:"BitString", name, size}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitStringRecord {
    pub name: String,
    pub size: u64,
}

/// `{construct:"Array", name, element_type, length}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayRecord {
    pub name: String,
    pub element_type: String,
    pub length: u64,
}

/// `{construct:"Struct", name, fields, constraints, actions}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructRecord {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldRecord>,
    #[serde(default)]
    pub constraints: Vec<ExpressionRecord>,
    #[serde(default)]
    pub actions: Vec<ExpressionRecord>,
}

/// `{name, type, is_present, transform}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub is_present: ExpressionRecord,
    #[serde(default)]
    pub transform: Option<TransformRecord>,
}

/// `{into_name, into_type, using}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformRecord {
    pub into_name: String,
    pub into_type: String,
    pub using: String,
}

/// `{construct:"Enum", name, variants, parse_from?, serialise_to?}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumRecord {
    pub name: String,
    pub variants: Vec<VariantRecord>,
    #[serde(default)]
    pub parse_from: Option<String>,
    #[serde(default)]
    pub serialise_to: Option<String>,
}

/// `{type}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantRecord {
    #[serde(rename = "type")]
    pub ty: String,
}

/// `{construct:"NewType", name, derived_from, implements}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTypeRecord {
    pub name: String,
    pub derived_from: String,
    #[serde(default)]
    pub implements: Vec<ImplementsRecord>,
}

/// `{trait}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplementsRecord {
    #[serde(rename = "trait")]
    pub trait_name: String,
}

/// `{construct:"Function", name, parameters, return_type}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<ParameterRecord>,
    #[serde(default)]
    pub return_type: Option<String>,
}

/// `{name, type}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

/// `{construct:"Context", ...}`; the body is kept unparsed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub body: serde_json::Map<String, serde_json::Value>,
}

/// An expression, discriminated by its `expression` tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "expression", remote = "Self")]
pub enum ExpressionRecord {
    /// `target.method(arguments)`
    MethodInvocation {
        target: Box<ExpressionRecord>,
        method: String,
        #[serde(default)]
        arguments: Vec<ArgumentRecord>,
    },
    /// `name(arguments)`
    FunctionInvocation {
        name: String,
        #[serde(default)]
        arguments: Vec<ArgumentRecord>,
    },
    /// `target.field`
    FieldAccess {
        target: Box<ExpressionRecord>,
        field: String,
    },
    /// `context.field`
    ContextAccess { field: String },
    /// `if condition { if_true } else { if_false }`
    IfElse {
        condition: Box<ExpressionRecord>,
        if_true: Box<ExpressionRecord>,
        if_false: Box<ExpressionRecord>,
    },
    /// The enclosing structure
    This,
    /// A literal of an explicitly named type
    Constant {
        #[serde(rename = "type")]
        ty: String,
        value: serde_json::Value,
    },
    /// Any other expression tag
    #[serde(skip)]
    Unrecognized(String),
}

impl ExpressionRecord {
    /// Shorthand for a `This` expression
    pub fn this() -> Self {
        ExpressionRecord::This
    }

    /// Shorthand for a constant
    pub fn constant(ty: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        ExpressionRecord::Constant {
            ty: ty.into(),
            value: value.into(),
        }
    }

    /// Shorthand for `target.field`
    pub fn field(target: ExpressionRecord, field: impl Into<String>) -> Self {
        ExpressionRecord::FieldAccess {
            target: Box::new(target),
            field: field.into(),
        }
    }

    /// Shorthand for `target.method(arguments)`
    pub fn call(
        target: ExpressionRecord,
        method: impl Into<String>,
        arguments: Vec<ArgumentRecord>,
    ) -> Self {
        ExpressionRecord::MethodInvocation {
            target: Box::new(target),
            method: method.into(),
            arguments,
        }
    }

    /// Parses a single expression from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

const CONSTRUCT_TAGS: &[&str] = &[
    "BitString", "Array", "Struct", "Enum", "NewType", "Function", "Context",
];

const EXPRESSION_TAGS: &[&str] = &[
    "MethodInvocation",
    "FunctionInvocation",
    "FieldAccess",
    "ContextAccess",
    "IfElse",
    "This",
    "Constant",
];

/// Returns the tag when it is a string outside `known`
fn unknown_tag(value: &serde_json::Value, key: &str, known: &[&str]) -> Option<String> {
    match value.get(key) {
        Some(serde_json::Value::String(tag)) if !known.contains(&tag.as_str()) => {
            Some(tag.clone())
        }
        _ => None,
    }
}

fn serialize_tag<S: Serializer>(
    serializer: S,
    key: &str,
    tag: &str,
) -> std::result::Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(1))?;
    map.serialize_entry(key, tag)?;
    map.end()
}

impl<'de> Deserialize<'de> for TypeConstructor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        match unknown_tag(&value, "construct", CONSTRUCT_TAGS) {
            Some(tag) => Ok(TypeConstructor::Unrecognized(tag)),
            None => TypeConstructor::deserialize(value).map_err(de::Error::custom),
        }
    }
}

impl Serialize for TypeConstructor {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            TypeConstructor::Unrecognized(tag) => serialize_tag(serializer, "construct", tag),
            _ => TypeConstructor::serialize(self, serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ExpressionRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        match unknown_tag(&value, "expression", EXPRESSION_TAGS) {
            Some(tag) => Ok(ExpressionRecord::Unrecognized(tag)),
            None => ExpressionRecord::deserialize(value).map_err(de::Error::custom),
        }
    }
}

impl Serialize for ExpressionRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            ExpressionRecord::Unrecognized(tag) => serialize_tag(serializer, "expression", tag),
            _ => ExpressionRecord::serialize(self, serializer),
        }
    }
}

/// `{name, value}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentRecord {
    pub name: String,
    pub value: ExpressionRecord,
}

impl ArgumentRecord {
    /// Creates a named argument
    pub fn new(name: impl Into<String>, value: ExpressionRecord) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Everything a front end extracts from one standards document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolDocument {
    /// Protocol name
    pub name: String,
    /// Constructors in registration order
    #[serde(default)]
    pub definitions: Vec<TypeConstructor>,
    /// Names of the protocol data units
    #[serde(default)]
    pub pdus: Vec<String>,
}

impl ProtocolDocument {
    /// Parses a document from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
