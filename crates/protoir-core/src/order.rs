//! Dependency ordering for emission.
//!
//! Starting from the protocol data units, a depth-first walk over the
//! reference graph appends each type or function after everything it refers
//! to. Every node is marked while it is on the walk stack and again once it
//! is finished, so a name shows up exactly once, at its first completion,
//! and meeting a node that is still on the stack reports the cycle.
//!
//! Edges:
//!
//! - struct: field types, then each field's transform target type and
//!   function, then the functions called from presence conditions,
//!   constraints and actions
//! - array: element type
//! - enum: variants, then the `parse_from` and `serialise_to` types
//! - context: field types
//! - function: parameter types, then the return type
//!
//! Because an enum's `parse_from` and `serialise_to` types are edges like
//! its variants, they are emitted before the enum. A walk that appended the
//! enum first and its conversion types afterwards would put them after it;
//! backends here may assume every conversion type already exists when the
//! enum hook runs.

use crate::error::{Error, Namespace, Result};
use crate::protocol::Protocol;
use crate::types::TypeKind;
use std::collections::HashMap;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Computes the emission order for `roots` and everything they reach
pub fn resolve<I, S>(protocol: &Protocol, roots: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut walk = Walk {
        protocol,
        marks: HashMap::new(),
        stack: Vec::new(),
        order: Vec::new(),
    };
    for root in roots {
        let name = walk.canonical(root.as_ref())?;
        walk.visit(name)?;
    }
    Ok(walk.order)
}

struct Walk<'a> {
    protocol: &'a Protocol,
    marks: HashMap<&'a str, Mark>,
    stack: Vec<&'a str>,
    order: Vec<String>,
}

impl<'a> Walk<'a> {
    /// Maps a caller-supplied name onto the registry's own key
    fn canonical(&self, name: &str) -> Result<&'a str> {
        if let Ok(ty) = self.protocol.get_type(name) {
            Ok(ty.name())
        } else if let Ok(f) = self.protocol.get_func(name) {
            Ok(f.name.as_str())
        } else {
            Err(Error::unknown(Namespace::Type, name))
        }
    }

    fn visit(&mut self, name: &'a str) -> Result<()> {
        match self.marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = self.stack.iter().position(|n| *n == name).unwrap_or(0);
                let mut path: Vec<String> = self.stack[start..].iter().map(|n| n.to_string()).collect();
                path.push(name.to_string());
                return Err(Error::CyclicReference { path });
            }
            None => {}
        }

        self.marks.insert(name, Mark::Visiting);
        self.stack.push(name);
        for dep in self.dependencies(name)? {
            let dep = self.canonical(dep)?;
            self.visit(dep)?;
        }
        self.stack.pop();
        self.marks.insert(name, Mark::Done);

        trace!(name, position = self.order.len(), "ordered");
        self.order.push(name.to_string());
        Ok(())
    }

    fn dependencies(&self, name: &str) -> Result<Vec<&'a str>> {
        if let Ok(ty) = self.protocol.get_type(name) {
            let deps = match ty.kind() {
                TypeKind::Nothing
                | TypeKind::Boolean
                | TypeKind::Size
                | TypeKind::BitString { .. } => Vec::new(),
                TypeKind::Array { element_type, .. } => vec![element_type.as_str()],
                TypeKind::Struct(def) => {
                    let mut deps = Vec::new();
                    for field in &def.fields {
                        deps.push(field.ty.as_str());
                        if let Some(t) = &field.transform {
                            deps.push(t.into_type.as_str());
                            deps.push(t.using.as_str());
                        }
                    }
                    let expressions = def
                        .fields
                        .iter()
                        .map(|f| &f.is_present)
                        .chain(&def.constraints)
                        .chain(&def.actions);
                    for expr in expressions {
                        deps.extend(expr.called_functions());
                    }
                    deps
                }
                TypeKind::Enum(def) => def
                    .variants
                    .iter()
                    .chain(&def.parse_from)
                    .chain(&def.serialise_to)
                    .map(String::as_str)
                    .collect(),
                TypeKind::Context { fields } => fields.iter().map(|f| f.ty.as_str()).collect(),
            };
            return Ok(deps);
        }
        let function = self.protocol.get_func(name)?;
        Ok(function.referenced_types().collect())
    }
}
