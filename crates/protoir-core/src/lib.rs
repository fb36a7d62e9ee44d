//! # protoir-core
//!
//! A typed intermediate representation for binary protocol descriptions.
//!
//! Front ends that parse protocol documents hand over a list of type
//! constructor records; this crate validates them into a [`Protocol`],
//! resolves the expressions attached to structure fields, orders the
//! definitions by dependency and dispatches them to emission backends.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`record`]: The serialized input schema
//! - [`protocol`]: The type registry and its `define_*` operations
//! - [`types`], [`traits`], [`expr`]: The IR itself
//! - [`names`]: Lexical rules for type and function names
//! - [`order`]: Dependency ordering for emission
//! - [`emit`]: Emission dispatch and the bundled backends
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```
//! use protoir_core::{emit, Backend, Protocol, ProtocolDocument, SimpleBackend};
//!
//! let doc = ProtocolDocument::from_json(r#"{
//!     "name": "Tiny",
//!     "definitions": [
//!         {"construct": "BitString", "name": "Word", "size": 32},
//!         {"construct": "Struct", "name": "Frame", "fields": [
//!             {"name": "word", "type": "Word",
//!              "is_present": {"expression": "Constant", "type": "Boolean", "value": true}}
//!         ]}
//!     ],
//!     "pdus": ["Frame"]
//! }"#)?;
//!
//! let protocol = Protocol::from_document(&doc)?;
//! let order = protocol.emission_order()?;
//! assert_eq!(order, ["Word", "Frame"]);
//!
//! let mut backend = SimpleBackend::default();
//! assert!(emit(&protocol, &order, &mut backend).is_complete());
//! println!("{}", backend.output());
//! # Ok::<(), protoir_core::Error>(())
//! ```
//!
//! ## Extensibility
//!
//! Implement [`Backend`] to render a protocol in another format.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod emit;
pub mod error;
pub mod expr;
pub mod names;
pub mod order;
pub mod protocol;
pub mod record;
pub mod traits;
pub mod types;

// Re-export primary types for convenience
pub use emit::{
    emit, Backend, EmitConfig, EmitReport, NullBackend, RustBackend, SimpleBackend, StatsBackend,
};
pub use error::{Error, Namespace, Result};
pub use expr::{Argument, Expression, ExpressionKind, Scope};
pub use names::{is_function_name, is_type_name, NameClass};
pub use protocol::Protocol;
pub use record::{
    ArgumentRecord, ArrayRecord, BitStringRecord, ContextRecord, EnumRecord, ExpressionRecord,
    FieldRecord, FunctionRecord, ImplementsRecord, NewTypeRecord, ParameterRecord,
    ProtocolDocument, StructRecord, TransformRecord, TypeConstructor, VariantRecord,
};
pub use traits::{builtin_traits, Function, Parameter, Trait, TypeRef};
pub use types::{ContextField, EnumDef, Field, StructDef, Transform, Type, TypeKind};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the unit type produced by actions
pub const NOTHING: &str = "Nothing";

/// Name of the truth-value type
pub const BOOLEAN: &str = "Boolean";

/// Name of the size type
pub const SIZE: &str = "Size";
