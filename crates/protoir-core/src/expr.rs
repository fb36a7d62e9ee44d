//! Typed expressions and their resolution.
//!
//! Expressions only exist inside a structure type: `This` must have
//! something to bind to. Resolution builds the typed tree from an
//! [`ExpressionRecord`] and computes the static type of every node. Values
//! are never evaluated; a constant's payload is carried as-is.

use crate::error::{Error, Namespace, Result};
use crate::protocol::Protocol;
use crate::record::{ArgumentRecord, ExpressionRecord};
use crate::traits::{Parameter, TypeRef};
use crate::types::{Type, TypeKind};
use crate::BOOLEAN;
use tracing::trace;

/// A resolved expression node and its static type
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    kind: ExpressionKind,
    ty: String,
}

/// The closed set of expression forms
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    /// `target.method(arguments)`
    MethodInvocation {
        /// Receiver
        target: Box<Expression>,
        /// Method name
        method: String,
        /// Arguments paired with the signature's parameters
        arguments: Vec<Argument>,
    },
    /// `function(arguments)`
    FunctionInvocation {
        /// Function name
        function: String,
        /// Arguments paired with the function's parameters
        arguments: Vec<Argument>,
    },
    /// `target.field`
    FieldAccess {
        /// Structure-typed target
        target: Box<Expression>,
        /// Field name
        field: String,
    },
    /// `context.field`
    ContextAccess {
        /// Context field name
        field: String,
    },
    /// Conditional
    IfElse {
        /// Boolean condition
        condition: Box<Expression>,
        /// Value when the condition holds
        if_true: Box<Expression>,
        /// Value otherwise
        if_false: Box<Expression>,
    },
    /// The enclosing structure
    This,
    /// Literal of a declared type; the payload is not checked against the type
    Constant {
        /// Literal payload
        value: serde_json::Value,
    },
}

/// An argument bound to a parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    /// Argument name as written in the record
    pub name: String,
    /// Resolved argument expression
    pub value: Expression,
}

impl Argument {
    /// Static type of the argument
    pub fn ty(&self) -> &str {
        self.value.ty()
    }
}

impl Expression {
    fn new(kind: ExpressionKind, ty: impl Into<String>) -> Self {
        Self {
            kind,
            ty: ty.into(),
        }
    }

    /// Returns the expression form
    pub fn kind(&self) -> &ExpressionKind {
        &self.kind
    }

    /// Returns the static type name
    pub fn ty(&self) -> &str {
        &self.ty
    }

    /// Returns true for a literal `true` (or the front ends' `"True"` spelling)
    pub fn is_constant_true(&self) -> bool {
        match &self.kind {
            ExpressionKind::Constant { value } => match value {
                serde_json::Value::Bool(b) => *b,
                serde_json::Value::String(s) => s.eq_ignore_ascii_case("true"),
                _ => false,
            },
            _ => false,
        }
    }

    /// Names of the free functions this expression calls, in visiting order
    pub fn called_functions(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_calls(&mut out);
        out
    }

    fn collect_calls<'a>(&'a self, out: &mut Vec<&'a str>) {
        match &self.kind {
            ExpressionKind::MethodInvocation {
                target, arguments, ..
            } => {
                target.collect_calls(out);
                for a in arguments {
                    a.value.collect_calls(out);
                }
            }
            ExpressionKind::FunctionInvocation {
                function,
                arguments,
            } => {
                out.push(function);
                for a in arguments {
                    a.value.collect_calls(out);
                }
            }
            ExpressionKind::FieldAccess { target, .. } => target.collect_calls(out),
            ExpressionKind::IfElse {
                condition,
                if_true,
                if_false,
            } => {
                condition.collect_calls(out);
                if_true.collect_calls(out);
                if_false.collect_calls(out);
            }
            ExpressionKind::ContextAccess { .. }
            | ExpressionKind::This
            | ExpressionKind::Constant { .. } => {}
        }
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn args(f: &mut std::fmt::Formatter<'_>, arguments: &[Argument]) -> std::fmt::Result {
            for (i, a) in arguments.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", a.value)?;
            }
            Ok(())
        }

        match &self.kind {
            ExpressionKind::MethodInvocation {
                target,
                method,
                arguments,
            } => {
                write!(f, "{}.{}(", target, method)?;
                args(f, arguments)?;
                f.write_str(")")
            }
            ExpressionKind::FunctionInvocation {
                function,
                arguments,
            } => {
                write!(f, "{}(", function)?;
                args(f, arguments)?;
                f.write_str(")")
            }
            ExpressionKind::FieldAccess { target, field } => write!(f, "{}.{}", target, field),
            ExpressionKind::ContextAccess { field } => write!(f, "context.{}", field),
            ExpressionKind::IfElse {
                condition,
                if_true,
                if_false,
            } => write!(f, "if {} {{ {} }} else {{ {} }}", condition, if_true, if_false),
            ExpressionKind::This => f.write_str("this"),
            ExpressionKind::Constant { value } => match value {
                serde_json::Value::String(s) => f.write_str(s),
                other => write!(f, "{}", other),
            },
        }
    }
}

/// Where an expression is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope<'a> {
    /// Outside any type; nothing can be resolved here
    TopLevel,
    /// Inside the named structure type
    Struct(&'a str),
}

/// Resolves expression records against a protocol and an enclosing struct.
///
/// The enclosing struct may not be registered yet (it is being defined), so
/// references to its name are served from `this` rather than the registry.
pub(crate) struct Resolver<'a> {
    protocol: &'a Protocol,
    this: &'a Type,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(protocol: &'a Protocol, this: &'a Type) -> Result<Self> {
        if !matches!(this.kind(), TypeKind::Struct(_)) {
            return Err(Error::scope(format!(
                "'{}' is a {}",
                this.name(),
                this.kind().name()
            )));
        }
        Ok(Self { protocol, this })
    }

    fn lookup(&self, name: &str) -> Result<&'a Type> {
        if name == self.this.name() {
            Ok(self.this)
        } else {
            self.protocol.get_type(name)
        }
    }

    pub(crate) fn resolve(&self, record: &ExpressionRecord) -> Result<Expression> {
        match record {
            ExpressionRecord::MethodInvocation {
                target,
                method,
                arguments,
            } => self.method_invocation(target, method, arguments),
            ExpressionRecord::FunctionInvocation { name, arguments } => {
                let function = self.protocol.get_func(name)?;
                let arguments = self.bind_arguments(
                    &format!("call to {}", name),
                    function.arguments(),
                    arguments,
                    None,
                )?;
                let ty = match &function.return_type {
                    Some(r) => self.return_type(r, None)?,
                    None => crate::NOTHING.to_string(),
                };
                Ok(Expression::new(
                    ExpressionKind::FunctionInvocation {
                        function: name.clone(),
                        arguments,
                    },
                    ty,
                ))
            }
            ExpressionRecord::FieldAccess { target, field } => {
                let target = self.resolve(target)?;
                let target_type = self.lookup(target.ty())?;
                let def = target_type.as_struct().ok_or_else(|| {
                    Error::type_mismatch(
                        format!("access to field '{}'", field),
                        "Struct",
                        target_type.kind().name(),
                    )
                })?;
                let ty = def
                    .field(field)
                    .ok_or_else(|| {
                        Error::unknown(Namespace::Field, format!("{}.{}", target_type.name(), field))
                    })?
                    .ty
                    .clone();
                Ok(Expression::new(
                    ExpressionKind::FieldAccess {
                        target: Box::new(target),
                        field: field.clone(),
                    },
                    ty,
                ))
            }
            ExpressionRecord::ContextAccess { field } => Err(Error::unsupported_construct(
                format!("context access to '{}': contexts are not implemented", field),
            )),
            ExpressionRecord::IfElse {
                condition,
                if_true,
                if_false,
            } => {
                let condition = self.resolve(condition)?;
                expect_type("if-else condition", BOOLEAN, &condition)?;
                let if_true = self.resolve(if_true)?;
                let if_false = self.resolve(if_false)?;
                expect_type("if-else branches", if_true.ty(), &if_false)?;
                let ty = if_true.ty().to_string();
                Ok(Expression::new(
                    ExpressionKind::IfElse {
                        condition: Box::new(condition),
                        if_true: Box::new(if_true),
                        if_false: Box::new(if_false),
                    },
                    ty,
                ))
            }
            ExpressionRecord::This => Ok(Expression::new(ExpressionKind::This, self.this.name())),
            ExpressionRecord::Constant { ty, value } => {
                let ty = self.lookup(ty)?.name().to_string();
                Ok(Expression::new(
                    ExpressionKind::Constant {
                        value: value.clone(),
                    },
                    ty,
                ))
            }
            ExpressionRecord::Unrecognized(tag) => Err(Error::unsupported_expression(format!(
                "unrecognized expression '{}'",
                tag
            ))),
        }
    }

    fn method_invocation(
        &self,
        target: &ExpressionRecord,
        method: &str,
        arguments: &[ArgumentRecord],
    ) -> Result<Expression> {
        let target = self.resolve(target)?;
        let receiver = self.lookup(target.ty())?;
        let signature = receiver
            .method(method)
            .ok_or_else(|| Error::unknown(Namespace::Method, format!("{}.{}", receiver.name(), method)))?;
        trace!(receiver = receiver.name(), method, "resolving method invocation");

        let arguments = self.bind_arguments(
            &format!("call to {}.{}", receiver.name(), method),
            signature.arguments(),
            arguments,
            Some(receiver),
        )?;
        let ty = match &signature.return_type {
            Some(r) => self.return_type(r, Some(receiver))?,
            None => crate::NOTHING.to_string(),
        };
        Ok(Expression::new(
            ExpressionKind::MethodInvocation {
                target: Box::new(target),
                method: method.to_string(),
                arguments,
            },
            ty,
        ))
    }

    /// Pairs arguments with parameters by declaration order
    fn bind_arguments(
        &self,
        context: &str,
        parameters: &[Parameter],
        arguments: &[ArgumentRecord],
        receiver: Option<&Type>,
    ) -> Result<Vec<Argument>> {
        if parameters.len() != arguments.len() {
            return Err(Error::type_mismatch(
                format!("{} (argument count)", context),
                parameters.len().to_string(),
                arguments.len().to_string(),
            ));
        }

        parameters
            .iter()
            .zip(arguments)
            .map(|(param, arg)| {
                let value = self.resolve(&arg.value)?;
                if let Some(expected) = &param.ty {
                    let expected = self.return_type(expected, receiver)?;
                    expect_type(
                        &format!("{}, argument '{}'", context, param.name),
                        &expected,
                        &value,
                    )?;
                }
                Ok(Argument {
                    name: arg.name.clone(),
                    value,
                })
            })
            .collect()
    }

    /// Turns a signature type position into a concrete type name
    fn return_type(&self, ty: &TypeRef, receiver: Option<&Type>) -> Result<String> {
        match (ty, receiver) {
            (TypeRef::Named(name), _) => Ok(self.lookup(name)?.name().to_string()),
            (TypeRef::SelfType, Some(r)) => Ok(r.name().to_string()),
            (TypeRef::Element, Some(r)) => match r.kind() {
                TypeKind::Array { element_type, .. } => Ok(element_type.clone()),
                other => Err(Error::type_mismatch(
                    format!("element type of '{}'", r.name()),
                    "Array",
                    other.name(),
                )),
            },
            (other, None) => Err(Error::unsupported_construct(format!(
                "'{}' outside a method signature",
                other
            ))),
        }
    }
}

fn expect_type(context: &str, expected: &str, expr: &Expression) -> Result<()> {
    if expr.ty() == expected {
        Ok(())
    } else {
        Err(Error::type_mismatch(context, expected, expr.ty()))
    }
}
