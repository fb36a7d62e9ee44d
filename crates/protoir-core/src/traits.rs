//! The built-in capability interfaces a type can implement.
//!
//! Traits carry method signatures only. The registry is closed: every
//! [`Protocol`](crate::Protocol) is seeded with [`builtin_traits`] and offers
//! no way to add to it.

use std::fmt;

/// Type position inside a signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    /// The receiver's own type
    SelfType,
    /// The element type of an array receiver
    Element,
    /// A registered type, by name
    Named(String),
}

impl TypeRef {
    /// Creates a reference to a registered type
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::SelfType => f.write_str("Self"),
            TypeRef::Element => f.write_str("Element"),
            TypeRef::Named(name) => f.write_str(name),
        }
    }
}

/// A named parameter. `ty == None` accepts an argument of any type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Declared type, if constrained
    pub ty: Option<TypeRef>,
}

impl Parameter {
    /// Creates a parameter of a registered type
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: Some(TypeRef::Named(ty.into())),
        }
    }

    /// Creates a parameter that accepts any argument type
    pub fn any(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: None,
        }
    }

    fn receiver() -> Self {
        Self {
            name: RECEIVER.to_string(),
            ty: Some(TypeRef::SelfType),
        }
    }

    fn typed(name: &str, ty: TypeRef) -> Self {
        Self {
            name: name.to_string(),
            ty: Some(ty),
        }
    }
}

/// Name of the receiver parameter of a method
pub const RECEIVER: &str = "self";

/// A function or method signature.
///
/// Free functions have only named parameters. Methods built with
/// [`Function::method`] take the receiver as their first parameter, named
/// [`RECEIVER`]. A missing return type means the call produces `Nothing`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    /// Function name
    pub name: String,
    /// Parameters in declaration order
    pub parameters: Vec<Parameter>,
    /// Return type, `None` for Nothing
    pub return_type: Option<TypeRef>,
    receiver: bool,
}

impl Function {
    /// Creates a free function signature
    pub fn new(
        name: impl Into<String>,
        parameters: Vec<Parameter>,
        return_type: Option<TypeRef>,
    ) -> Self {
        Self {
            name: name.into(),
            parameters,
            return_type,
            receiver: false,
        }
    }

    /// Creates a method signature; the receiver is prepended to `parameters`
    pub fn method(
        name: impl Into<String>,
        parameters: Vec<Parameter>,
        return_type: Option<TypeRef>,
    ) -> Self {
        let mut all = Vec::with_capacity(parameters.len() + 1);
        all.push(Parameter::receiver());
        all.extend(parameters);
        Self {
            name: name.into(),
            parameters: all,
            return_type,
            receiver: true,
        }
    }

    /// Whether the first parameter is the receiver
    pub fn is_method(&self) -> bool {
        self.receiver
    }

    /// Parameters after the receiver, or all parameters for a free function
    pub fn arguments(&self) -> &[Parameter] {
        if self.receiver {
            &self.parameters[1..]
        } else {
            &self.parameters
        }
    }

    /// Names of the registered types this signature mentions
    pub fn referenced_types(&self) -> impl Iterator<Item = &str> {
        self.parameters
            .iter()
            .filter_map(|p| p.ty.as_ref())
            .chain(self.return_type.as_ref())
            .filter_map(|t| match t {
                TypeRef::Named(name) => Some(name.as_str()),
                _ => None,
            })
    }
}

/// A named capability: an ordered list of method signatures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trait {
    name: String,
    methods: Vec<Function>,
}

impl Trait {
    fn new(name: &str, methods: Vec<Function>) -> Self {
        Self {
            name: name.to_string(),
            methods,
        }
    }

    /// Returns the trait name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the method signatures in declaration order
    pub fn methods(&self) -> &[Function] {
        &self.methods
    }
}

fn method(name: &str, parameters: Vec<Parameter>, return_type: Option<TypeRef>) -> Function {
    Function::method(name, parameters, return_type)
}

fn binary(name: &str, return_type: Option<TypeRef>) -> Function {
    method(name, vec![Parameter::any("other")], return_type)
}

fn boolean() -> Option<TypeRef> {
    Some(TypeRef::named(crate::BOOLEAN))
}

fn size() -> Option<TypeRef> {
    Some(TypeRef::named(crate::SIZE))
}

/// The fixed trait population every protocol starts with
pub fn builtin_traits() -> Vec<Trait> {
    vec![
        Trait::new(
            "Value",
            vec![
                method("get", vec![], Some(TypeRef::SelfType)),
                method("set", vec![Parameter::any("value")], None),
            ],
        ),
        Trait::new("Sized", vec![method("size", vec![], size())]),
        Trait::new(
            "IndexCollection",
            vec![
                method(
                    "get",
                    vec![Parameter::typed("index", TypeRef::named(crate::SIZE))],
                    Some(TypeRef::Element),
                ),
                method(
                    "set",
                    vec![
                        Parameter::typed("index", TypeRef::named(crate::SIZE)),
                        Parameter::typed("value", TypeRef::Element),
                    ],
                    None,
                ),
                method("length", vec![], size()),
            ],
        ),
        Trait::new(
            "Equality",
            vec![binary("eq", boolean()), binary("ne", boolean())],
        ),
        Trait::new(
            "Ordinal",
            vec![
                binary("lt", boolean()),
                binary("le", boolean()),
                binary("gt", boolean()),
                binary("ge", boolean()),
            ],
        ),
        Trait::new(
            "BooleanOps",
            vec![
                binary("and", boolean()),
                binary("or", boolean()),
                method("not", vec![], boolean()),
            ],
        ),
        Trait::new(
            "ArithmeticOps",
            vec![
                binary("plus", Some(TypeRef::SelfType)),
                binary("minus", Some(TypeRef::SelfType)),
                binary("multiply", Some(TypeRef::SelfType)),
                binary("divide", Some(TypeRef::SelfType)),
                binary("modulo", Some(TypeRef::SelfType)),
            ],
        ),
    ]
}
