//! Error types for the protoir-core library.
//!
//! Every construction and resolution failure is raised synchronously through
//! the [`Error`] enum. A failing call never registers anything, so callers can
//! keep using the protocol after an error.

use thiserror::Error;

/// Result type alias for protoir operations
pub type Result<T> = std::result::Result<T, Error>;

/// The registry namespace a name lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// Type names
    Type,
    /// Free function names
    Function,
    /// Trait names
    Trait,
    /// Struct field names
    Field,
    /// Method names within a type's method table
    Method,
    /// Parameter names within a function signature
    Parameter,
    /// Protocol data units
    Pdu,
}

impl Namespace {
    /// Returns a lowercase label for messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Type => "type",
            Namespace::Function => "function",
            Namespace::Trait => "trait",
            Namespace::Field => "field",
            Namespace::Method => "method",
            Namespace::Parameter => "parameter",
            Namespace::Pdu => "pdu",
        }
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comprehensive error type for all protoir operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Name already registered in its namespace
    #[error("cannot define {namespace} '{name}': already exists")]
    DuplicateDefinition {
        /// Namespace of the clashing name
        namespace: Namespace,
        /// The clashing name
        name: String,
    },

    /// Name fails the lexical validator for its category
    #[error("cannot define {namespace} '{name}': malformed name")]
    MalformedName {
        /// Namespace the name was checked against
        namespace: Namespace,
        /// The rejected name
        name: String,
    },

    /// Name absent from the relevant registry map
    #[error("unknown {namespace} '{name}'")]
    UnknownReference {
        /// Namespace that was searched
        namespace: Namespace,
        /// The missing name
        name: String,
    },

    /// A resolved type disagrees with the type required at that position
    #[error("type mismatch in {context}: expected {expected}, found {found}")]
    TypeMismatch {
        /// Where the mismatch was detected
        context: String,
        /// Type required at that position
        expected: String,
        /// Type the expression or reference actually has
        found: String,
    },

    /// Construct not supported, or not matching the requested kind
    #[error("unsupported construct: {0}")]
    UnsupportedConstruct(String),

    /// Expression discriminator not recognized
    #[error("unsupported expression: {0}")]
    UnsupportedExpression(String),

    /// Expression resolved outside a structure type
    #[error("expressions can only be resolved in the scope of a structure type ({0})")]
    Scope(String),

    /// The type graph reachable from the roots contains a cycle
    #[error("cyclic reference: {}", path.join(" -> "))]
    CyclicReference {
        /// The names on the cycle, closing name repeated at the end
        path: Vec<String>,
    },

    /// Input record is not valid JSON or does not match the record schema
    #[error("invalid input record: {0}")]
    InvalidRecord(#[from] serde_json::Error),

    /// A backend hook failed
    #[error("backend '{backend}' failed on '{name}': {details}")]
    Backend {
        /// Backend that raised the failure
        backend: String,
        /// Name being emitted
        name: String,
        /// Description of the failure
        details: String,
    },
}

impl Error {
    /// Creates a new duplicate definition error
    pub fn duplicate(namespace: Namespace, name: impl Into<String>) -> Self {
        Self::DuplicateDefinition {
            namespace,
            name: name.into(),
        }
    }

    /// Creates a new malformed name error
    pub fn malformed_name(namespace: Namespace, name: impl Into<String>) -> Self {
        Self::MalformedName {
            namespace,
            name: name.into(),
        }
    }

    /// Creates a new unknown reference error
    pub fn unknown(namespace: Namespace, name: impl Into<String>) -> Self {
        Self::UnknownReference {
            namespace,
            name: name.into(),
        }
    }

    /// Creates a new type mismatch error
    pub fn type_mismatch(
        context: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            context: context.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Creates a new unsupported construct error
    pub fn unsupported_construct(msg: impl Into<String>) -> Self {
        Self::UnsupportedConstruct(msg.into())
    }

    /// Creates a construct error for a record handed to the wrong `define_*` call
    pub fn construct_mismatch(expected: &str, found: &str) -> Self {
        Self::UnsupportedConstruct(format!("cannot create {} from {} record", expected, found))
    }

    /// Creates a new unsupported expression error
    pub fn unsupported_expression(msg: impl Into<String>) -> Self {
        Self::UnsupportedExpression(msg.into())
    }

    /// Creates a new scope error
    pub fn scope(msg: impl Into<String>) -> Self {
        Self::Scope(msg.into())
    }

    /// Creates a new backend error
    pub fn backend(
        backend: impl Into<String>,
        name: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self::Backend {
            backend: backend.into(),
            name: name.into(),
            details: details.into(),
        }
    }
}
