//! Lexical classes for protocol identifiers.
//!
//! Type names are upper camel case (`SeqNum`, `CSRCList`, `Bits16`).
//! Function names, which also cover field names, methods and transform
//! targets, start with a lowercase letter (`transform_seq`, `testFunction`).

use crate::error::{Error, Namespace, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static TYPE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][A-Za-z0-9_]*$").expect("type name pattern is valid"));

static FUNC_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][A-Za-z0-9_]*$").expect("function name pattern is valid"));

/// Lexical class a name is checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameClass {
    /// Type names
    Type,
    /// Function, field and method names
    Function,
}

impl NameClass {
    /// Returns true if `name` belongs to this class
    pub fn matches(&self, name: &str) -> bool {
        match self {
            NameClass::Type => TYPE_NAME.is_match(name),
            NameClass::Function => FUNC_NAME.is_match(name),
        }
    }
}

/// Returns true if `name` is a valid type name
pub fn is_type_name(name: &str) -> bool {
    NameClass::Type.matches(name)
}

/// Returns true if `name` is a valid function name
pub fn is_function_name(name: &str) -> bool {
    NameClass::Function.matches(name)
}

/// Checks `name` against `class`, reporting failures in `namespace`
pub(crate) fn validate(name: &str, class: NameClass, namespace: Namespace) -> Result<()> {
    if class.matches(name) {
        Ok(())
    } else {
        Err(Error::malformed_name(namespace, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert!(is_type_name("SeqNum"));
        assert!(is_type_name("CSRCList"));
        assert!(is_type_name("Bits16"));
        assert!(is_type_name("Rtp_Header"));
        assert!(!is_type_name("seqNum"));
        assert!(!is_type_name("16Bits"));
        assert!(!is_type_name("Seq Num"));
        assert!(!is_type_name(""));
    }

    #[test]
    fn test_function_names() {
        assert!(is_function_name("transform_seq"));
        assert!(is_function_name("testFunction"));
        assert!(is_function_name("ext_seq"));
        assert!(!is_function_name("Transform"));
        assert!(!is_function_name("_hidden"));
        assert!(!is_function_name("a-b"));
    }

    #[test]
    fn test_validate_reports_namespace() {
        let err = validate("bad name", NameClass::Type, Namespace::Type).unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedName {
                namespace: Namespace::Type,
                ..
            }
        ));
    }
}
