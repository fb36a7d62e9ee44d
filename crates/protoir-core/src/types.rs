//! The closed set of protocol type variants.
//!
//! Types refer to each other by name. Every name a type mentions was
//! registered before the type itself, so lookups through the owning
//! [`Protocol`](crate::Protocol) always succeed for a constructed type.

use crate::expr::Expression;
use crate::traits::{Function, Trait};
use std::collections::{BTreeMap, BTreeSet};

/// A struct field
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Field name
    pub name: String,
    /// Field type name
    pub ty: String,
    /// Boolean-typed presence condition
    pub is_present: Expression,
    /// Optional downstream reinterpretation
    pub transform: Option<Transform>,
}

/// Reinterprets a present field into another name and type through a function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transform {
    /// Name of the reinterpreted value
    pub into_name: String,
    /// Type of the reinterpreted value
    pub into_type: String,
    /// Function performing the conversion
    pub using: String,
}

/// Shape of a structure type
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructDef {
    /// Fields in wire order
    pub fields: Vec<Field>,
    /// Boolean-typed invariants
    pub constraints: Vec<Expression>,
    /// Nothing-typed declarations
    pub actions: Vec<Expression>,
}

impl StructDef {
    /// Finds a field by name
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Shape of an enumerated type
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnumDef {
    /// Variant type names in declaration order
    pub variants: Vec<String>,
    /// Type the enum is parsed from, if declared
    pub parse_from: Option<String>,
    /// Type the enum is serialised to, if declared
    pub serialise_to: Option<String>,
}

/// A field of a context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextField {
    /// Field name
    pub name: String,
    /// Field type name
    pub ty: String,
}

/// Variant-specific shape of a type
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    /// The unit type of actions
    Nothing,
    /// Truth values
    Boolean,
    /// Sizes and lengths
    Size,
    /// Fixed-width bit sequence
    BitString {
        /// Width in bits
        size: u64,
    },
    /// Fixed-length sequence of one element type
    Array {
        /// Element type name
        element_type: String,
        /// Number of elements
        length: u64,
        /// Size in bits, when the element is sized
        size: Option<u64>,
    },
    /// Ordered fields with constraints and actions
    Struct(StructDef),
    /// One of several variant types
    Enum(EnumDef),
    /// Out-of-band state for expression evaluation
    Context {
        /// Context fields
        fields: Vec<ContextField>,
    },
}

impl TypeKind {
    /// Returns the variant name
    pub fn name(&self) -> &'static str {
        match self {
            TypeKind::Nothing => "Nothing",
            TypeKind::Boolean => "Boolean",
            TypeKind::Size => "Size",
            TypeKind::BitString { .. } => "BitString",
            TypeKind::Array { .. } => "Array",
            TypeKind::Struct(_) => "Struct",
            TypeKind::Enum(_) => "Enum",
            TypeKind::Context { .. } => "Context",
        }
    }

    /// Returns true for the pre-registered primitives
    pub fn is_primitive(&self) -> bool {
        matches!(self, TypeKind::Nothing | TypeKind::Boolean | TypeKind::Size)
    }
}

/// A protocol type: a shape plus an owned capability set
#[derive(Debug, Clone, PartialEq)]
pub struct Type {
    name: String,
    kind: TypeKind,
    derived_from: Option<String>,
    traits: BTreeSet<String>,
    methods: BTreeMap<String, Function>,
}

impl Type {
    pub(crate) fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            derived_from: None,
            traits: BTreeSet::new(),
            methods: BTreeMap::new(),
        }
    }

    /// Copies `base` under a new name. The trait set and method table are
    /// cloned, so later growth on either type leaves the other untouched.
    pub(crate) fn derive(name: impl Into<String>, base: &Type) -> Self {
        Self {
            name: name.into(),
            kind: base.kind.clone(),
            derived_from: Some(base.name.clone()),
            traits: base.traits.clone(),
            methods: base.methods.clone(),
        }
    }

    /// Adds a trait and its methods. Later methods replace earlier ones with the same name.
    pub(crate) fn implement(&mut self, t: &Trait) {
        self.traits.insert(t.name().to_string());
        for m in t.methods() {
            self.methods.insert(m.name.clone(), m.clone());
        }
    }

    pub(crate) fn declare_method(&mut self, method: Function) {
        self.methods.insert(method.name.clone(), method);
    }

    pub(crate) fn struct_def_mut(&mut self) -> Option<&mut StructDef> {
        match &mut self.kind {
            TypeKind::Struct(def) => Some(def),
            _ => None,
        }
    }

    /// Returns the type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the variant-specific shape
    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    /// Returns the name of the type this one was derived from
    pub fn derived_from(&self) -> Option<&str> {
        self.derived_from.as_deref()
    }

    /// Returns the implemented trait names
    pub fn traits(&self) -> &BTreeSet<String> {
        &self.traits
    }

    /// Returns true if the type implements the named trait
    pub fn implements(&self, trait_name: &str) -> bool {
        self.traits.contains(trait_name)
    }

    /// Returns the method table
    pub fn methods(&self) -> &BTreeMap<String, Function> {
        &self.methods
    }

    /// Looks up a method by name
    pub fn method(&self, name: &str) -> Option<&Function> {
        self.methods.get(name)
    }

    /// Size in bits, when statically known
    pub fn size(&self) -> Option<u64> {
        match &self.kind {
            TypeKind::BitString { size } => Some(*size),
            TypeKind::Array { size, .. } => *size,
            _ => None,
        }
    }

    /// Returns the struct shape, if this is a structure type
    pub fn as_struct(&self) -> Option<&StructDef> {
        match &self.kind {
            TypeKind::Struct(def) => Some(def),
            _ => None,
        }
    }

    /// Returns the enum shape, if this is an enumerated type
    pub fn as_enum(&self) -> Option<&EnumDef> {
        match &self.kind {
            TypeKind::Enum(def) => Some(def),
            _ => None,
        }
    }
}
