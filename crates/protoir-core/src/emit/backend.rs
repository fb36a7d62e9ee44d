//! Extensible emission hooks.
//!
//! This module provides the [`Backend`] trait for turning an ordered
//! protocol into one textual artifact.

use crate::error::Result;
use crate::protocol::Protocol;
use crate::traits::Function;
use crate::types::{ContextField, EnumDef, StructDef, Type};

/// Trait for emitting protocol definitions.
///
/// The dispatcher calls one hook per name in emission order, then
/// [`finish`](Backend::finish) once. Every hook defaults to a no-op, so a
/// backend only implements the variants it renders.
///
/// # Example
///
/// ```
/// use protoir_core::{Backend, Result, Type};
///
/// #[derive(Default)]
/// struct NameList {
///     names: Vec<String>,
/// }
///
/// impl Backend for NameList {
///     fn name(&self) -> &str {
///         "names"
///     }
///
///     fn bitstring(&mut self, ty: &Type, _size: u64) -> Result<()> {
///         self.names.push(ty.name().to_string());
///         Ok(())
///     }
///
///     fn output(&self) -> String {
///         self.names.join("\n")
///     }
/// }
/// ```
pub trait Backend {
    /// Short name used in logs and error reports
    fn name(&self) -> &str;

    /// File extension of the artifact, without the dot
    fn extension(&self) -> &str {
        "txt"
    }

    /// Emit a bit string type
    fn bitstring(&mut self, ty: &Type, size: u64) -> Result<()> {
        let _ = (ty, size);
        Ok(())
    }

    /// Emit an array type
    fn array(&mut self, ty: &Type, element_type: &str, length: u64) -> Result<()> {
        let _ = (ty, element_type, length);
        Ok(())
    }

    /// Emit a structure type
    fn structure(&mut self, ty: &Type, def: &StructDef) -> Result<()> {
        let _ = (ty, def);
        Ok(())
    }

    /// Emit an enumerated type
    fn enumeration(&mut self, ty: &Type, def: &EnumDef) -> Result<()> {
        let _ = (ty, def);
        Ok(())
    }

    /// Emit a context type
    fn context(&mut self, ty: &Type, fields: &[ContextField]) -> Result<()> {
        let _ = (ty, fields);
        Ok(())
    }

    /// Emit a free function
    fn function(&mut self, function: &Function) -> Result<()> {
        let _ = function;
        Ok(())
    }

    /// Called once after every name was dispatched
    fn finish(&mut self, protocol: &Protocol) -> Result<()> {
        let _ = protocol;
        Ok(())
    }

    /// Returns the accumulated artifact
    fn output(&self) -> String;
}

/// A no-op backend that discards all output
#[derive(Debug, Default)]
pub struct NullBackend;

impl Backend for NullBackend {
    fn name(&self) -> &str {
        "null"
    }

    fn output(&self) -> String {
        String::new()
    }
}

/// A backend that collects statistics about the emitted protocol
#[derive(Debug, Default)]
pub struct StatsBackend {
    /// Number of bit strings
    pub bitstring_count: usize,
    /// Number of arrays
    pub array_count: usize,
    /// Number of structures
    pub struct_count: usize,
    /// Number of struct fields
    pub field_count: usize,
    /// Number of enums
    pub enum_count: usize,
    /// Number of contexts
    pub context_count: usize,
    /// Number of functions
    pub function_count: usize,
}

impl Backend for StatsBackend {
    fn name(&self) -> &str {
        "stats"
    }

    fn bitstring(&mut self, _ty: &Type, _size: u64) -> Result<()> {
        self.bitstring_count += 1;
        Ok(())
    }

    fn array(&mut self, _ty: &Type, _element_type: &str, _length: u64) -> Result<()> {
        self.array_count += 1;
        Ok(())
    }

    fn structure(&mut self, _ty: &Type, def: &StructDef) -> Result<()> {
        self.struct_count += 1;
        self.field_count += def.fields.len();
        Ok(())
    }

    fn enumeration(&mut self, _ty: &Type, _def: &EnumDef) -> Result<()> {
        self.enum_count += 1;
        Ok(())
    }

    fn context(&mut self, _ty: &Type, _fields: &[ContextField]) -> Result<()> {
        self.context_count += 1;
        Ok(())
    }

    fn function(&mut self, _function: &Function) -> Result<()> {
        self.function_count += 1;
        Ok(())
    }

    fn output(&self) -> String {
        format!(
            "bitstrings: {}\narrays: {}\nstructs: {} ({} fields)\nenums: {}\ncontexts: {}\nfunctions: {}\n",
            self.bitstring_count,
            self.array_count,
            self.struct_count,
            self.field_count,
            self.enum_count,
            self.context_count,
            self.function_count
        )
    }
}
