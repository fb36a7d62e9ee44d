//! Emission dispatch.
//!
//! [`emit`] walks an emission order (see [`Protocol::emission_order`]) and
//! hands every name to the matching [`Backend`] hook. Two bundled backends
//! render a whole protocol:
//!
//! - [`SimpleBackend`]: a human-readable description (`.txt`)
//! - [`RustBackend`]: Rust type skeletons (`.rs`)
//!
//! ## Failures
//!
//! A failing hook does not stop the walk. Each failure is recorded against
//! the name that caused it in the returned [`EmitReport`], and
//! [`Backend::finish`] runs regardless. Callers decide whether an artifact
//! with failures is worth keeping.

mod backend;
mod rust;
mod simple;

use crate::error::{Error, Namespace};
use crate::protocol::Protocol;
use crate::types::TypeKind;
use tracing::{debug, trace, warn};

pub use backend::{Backend, NullBackend, StatsBackend};
pub use rust::RustBackend;
pub use simple::SimpleBackend;

/// Configuration for the bundled backends
#[derive(Debug, Clone)]
pub struct EmitConfig {
    /// Indentation string (default: 2 spaces)
    pub indent_str: String,
    /// Include descriptive comments (traits, presence conditions, origins)
    pub include_comments: bool,
}

impl Default for EmitConfig {
    fn default() -> Self {
        Self {
            indent_str: "  ".to_string(),
            include_comments: true,
        }
    }
}

impl EmitConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the indentation string
    pub fn indent_str(mut self, s: impl Into<String>) -> Self {
        self.indent_str = s.into();
        self
    }

    /// Sets whether to include comments
    pub fn include_comments(mut self, include: bool) -> Self {
        self.include_comments = include;
        self
    }
}

/// Outcome of one [`emit`] run
#[derive(Debug, Default)]
pub struct EmitReport {
    /// Names handed to a hook successfully
    pub emitted: Vec<String>,
    /// Names with no hook (the built-in primitives)
    pub skipped: Vec<String>,
    /// Names whose hook failed, with the failure
    pub failures: Vec<(String, Error)>,
    /// Whether [`Backend::finish`] succeeded
    pub finished: bool,
}

impl EmitReport {
    /// Returns true if every hook and `finish` succeeded
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.finished
    }
}

/// Dispatches every name in `order` to `backend`, then calls `finish`
pub fn emit<B>(protocol: &Protocol, order: &[String], backend: &mut B) -> EmitReport
where
    B: Backend + ?Sized,
{
    let mut report = EmitReport::default();

    for name in order {
        match dispatch(protocol, name, backend) {
            Ok(true) => {
                debug!(backend = backend.name(), name = %name, "emitted");
                report.emitted.push(name.clone());
            }
            Ok(false) => {
                trace!(name = %name, "no hook for primitive");
                report.skipped.push(name.clone());
            }
            Err(e) => {
                warn!("Backend '{}' failed on '{}': {}", backend.name(), name, e);
                report.failures.push((name.clone(), e));
            }
        }
    }

    match backend.finish(protocol) {
        Ok(()) => report.finished = true,
        Err(e) => {
            warn!("Backend '{}' failed to finish: {}", backend.name(), e);
            report.failures.push((protocol.name().to_string(), e));
        }
    }

    report
}

/// Calls the hook for one name. Returns `Ok(false)` when the name has none.
fn dispatch<B>(protocol: &Protocol, name: &str, backend: &mut B) -> crate::Result<bool>
where
    B: Backend + ?Sized,
{
    if protocol.has_type(name) {
        let ty = protocol.get_type(name)?;
        match ty.kind() {
            TypeKind::Nothing | TypeKind::Boolean | TypeKind::Size => return Ok(false),
            TypeKind::BitString { size } => backend.bitstring(ty, *size)?,
            TypeKind::Array {
                element_type,
                length,
                ..
            } => backend.array(ty, element_type, *length)?,
            TypeKind::Struct(def) => backend.structure(ty, def)?,
            TypeKind::Enum(def) => backend.enumeration(ty, def)?,
            TypeKind::Context { fields } => backend.context(ty, fields)?,
        }
        Ok(true)
    } else if protocol.has_func(name) {
        backend.function(protocol.get_func(name)?)?;
        Ok(true)
    } else {
        Err(Error::unknown(Namespace::Type, name))
    }
}

/// Line-oriented text builder shared by the bundled backends
#[derive(Debug)]
struct Printer {
    out: String,
    indent_str: String,
    indent_level: usize,
}

impl Printer {
    fn new(config: &EmitConfig) -> Self {
        Self {
            out: String::new(),
            indent_str: config.indent_str.clone(),
            indent_level: 0,
        }
    }

    fn indent(&mut self) {
        self.indent_level += 1;
    }

    fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    fn writeln(&mut self, s: impl AsRef<str>) {
        for _ in 0..self.indent_level {
            self.out.push_str(&self.indent_str);
        }
        self.out.push_str(s.as_ref());
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn as_str(&self) -> &str {
        &self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::*;
    use crate::types::Type;
    use pretty_assertions::assert_eq;

    fn protocol() -> Protocol {
        let mut p = Protocol::new().with_name("Demo");
        p.define(&TypeConstructor::BitString(BitStringRecord {
            name: "Word".into(),
            size: 32,
        }))
        .unwrap();
        p.define(&TypeConstructor::Struct(StructRecord {
            name: "Packet".into(),
            fields: vec![
                FieldRecord {
                    name: "word".into(),
                    ty: "Word".into(),
                    is_present: ExpressionRecord::constant("Boolean", true),
                    transform: None,
                },
                FieldRecord {
                    name: "flag".into(),
                    ty: "Boolean".into(),
                    is_present: ExpressionRecord::constant("Boolean", true),
                    transform: None,
                },
            ],
            constraints: vec![],
            actions: vec![],
        }))
        .unwrap();
        p.define_pdu("Packet").unwrap();
        p
    }

    #[test]
    fn test_primitives_are_skipped() {
        let p = protocol();
        let order = p.emission_order().unwrap();
        let mut stats = StatsBackend::default();
        let report = emit(&p, &order, &mut stats);

        assert!(report.is_complete());
        assert_eq!(report.emitted, ["Word", "Packet"]);
        assert_eq!(report.skipped, ["Boolean"]);
        assert_eq!(stats.bitstring_count, 1);
        assert_eq!(stats.struct_count, 1);
        assert_eq!(stats.field_count, 2);
    }

    struct FailingBackend {
        seen: Vec<String>,
        finished: bool,
    }

    impl Backend for FailingBackend {
        fn name(&self) -> &str {
            "failing"
        }

        fn bitstring(&mut self, ty: &Type, _size: u64) -> crate::Result<()> {
            Err(Error::backend(self.name(), ty.name(), "bit strings refused"))
        }

        fn structure(&mut self, ty: &Type, _def: &crate::types::StructDef) -> crate::Result<()> {
            self.seen.push(ty.name().to_string());
            Ok(())
        }

        fn finish(&mut self, _protocol: &Protocol) -> crate::Result<()> {
            self.finished = true;
            Ok(())
        }

        fn output(&self) -> String {
            self.seen.join(",")
        }
    }

    #[test]
    fn test_failure_does_not_stop_later_names() {
        let p = protocol();
        let order = p.emission_order().unwrap();
        let mut backend = FailingBackend {
            seen: vec![],
            finished: false,
        };
        let report = emit(&p, &order, &mut backend);

        assert!(!report.is_complete());
        assert!(report.finished);
        assert!(backend.finished);
        assert_eq!(backend.output(), "Packet");
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "Word");
        assert!(matches!(report.failures[0].1, Error::Backend { .. }));
    }

    #[test]
    fn test_unknown_name_is_a_failure() {
        let p = protocol();
        let mut backend = NullBackend;
        let report = emit(&p, &["Missing".to_string()], &mut backend);
        assert!(matches!(
            report.failures[0].1,
            Error::UnknownReference { .. }
        ));
        assert!(report.finished);
    }

    #[test]
    fn test_dyn_backend() {
        let p = protocol();
        let order = p.emission_order().unwrap();
        let mut backends: Vec<Box<dyn Backend>> =
            vec![Box::new(NullBackend), Box::new(StatsBackend::default())];
        for backend in backends.iter_mut() {
            assert!(emit(&p, &order, backend.as_mut()).is_complete());
        }
    }

    #[test]
    fn test_printer_indent() {
        let mut printer = Printer::new(&EmitConfig::new().indent_str("\t"));
        printer.writeln("a {");
        printer.indent();
        printer.writeln("b");
        printer.dedent();
        printer.dedent();
        printer.writeln("}");
        assert_eq!(printer.as_str(), "a {\n\tb\n}\n");
    }
}
