//! The protocol type registry.
//!
//! A [`Protocol`] owns every type, trait and free function defined by one
//! input document. It is created pre-seeded with the primitives and the
//! built-in traits, then populated by `define_*` calls in registration
//! order: anything a new definition refers to must already be registered.
//!
//! ## Failure model
//!
//! Each `define_*` call validates the whole record before touching the
//! registry. A failed call leaves earlier registrations intact and registers
//! nothing for the failed record.

use crate::error::{Error, Namespace, Result};
use crate::expr::{Expression, Resolver, Scope};
use crate::names::{self, NameClass};
use crate::order;
use crate::record::{
    ExpressionRecord, FieldRecord, ProtocolDocument, TransformRecord, TypeConstructor,
};
use crate::traits::{builtin_traits, Function, Parameter, Trait, TypeRef};
use crate::types::{EnumDef, Field, StructDef, Transform, Type, TypeKind};
use crate::{BOOLEAN, NOTHING, SIZE};
use std::collections::BTreeMap;
use tracing::debug;

/// Traits every bit string implements
const BITSTRING_TRAITS: &[&str] = &["Sized", "Value", "Equality"];
/// Traits every array implements
const ARRAY_TRAITS: &[&str] = &["Sized", "Equality", "IndexCollection"];
/// Traits every structure implements
const STRUCT_TRAITS: &[&str] = &["Sized", "Equality"];
/// Traits every enum implements
const ENUM_TRAITS: &[&str] = &["Sized"];

/// The type registry for one protocol
#[derive(Debug, Clone)]
pub struct Protocol {
    name: String,
    types: BTreeMap<String, Type>,
    traits: BTreeMap<String, Trait>,
    funcs: BTreeMap<String, Function>,
    pdus: Vec<String>,
}

impl Default for Protocol {
    fn default() -> Self {
        Self::new()
    }
}

impl Protocol {
    /// Creates a protocol holding only the primitives and built-in traits
    pub fn new() -> Self {
        let traits: BTreeMap<_, _> = builtin_traits()
            .into_iter()
            .map(|t| (t.name().to_string(), t))
            .collect();

        let mut protocol = Self {
            name: String::new(),
            types: BTreeMap::new(),
            traits,
            funcs: BTreeMap::new(),
            pdus: Vec::new(),
        };

        let primitives = [
            (NOTHING, TypeKind::Nothing, &[][..]),
            (BOOLEAN, TypeKind::Boolean, &["Value", "Equality", "BooleanOps"][..]),
            (
                SIZE,
                TypeKind::Size,
                &["Value", "Equality", "Ordinal", "ArithmeticOps"][..],
            ),
        ];
        for (name, kind, implements) in primitives {
            let mut ty = Type::new(name, kind);
            for t in implements {
                ty.implement(&protocol.traits[*t]);
            }
            protocol.types.insert(name.to_string(), ty);
        }

        protocol
    }

    /// Sets the protocol name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Builds a protocol from a whole document: every definition in order,
    /// then the PDU markings
    pub fn from_document(doc: &ProtocolDocument) -> Result<Self> {
        let mut protocol = Self::new().with_name(&doc.name);
        for record in &doc.definitions {
            protocol.define(record)?;
        }
        for pdu in &doc.pdus {
            protocol.define_pdu(pdu)?;
        }
        debug!(
            "Built protocol '{}': {} types, {} functions, {} PDUs",
            protocol.name,
            protocol.types.len(),
            protocol.funcs.len(),
            protocol.pdus.len()
        );
        Ok(protocol)
    }

    /// Returns the protocol name
    pub fn name(&self) -> &str {
        &self.name
    }

    // ---------------------------------------------------------------------
    // Lookup

    /// Looks up a type by name
    pub fn get_type(&self, name: &str) -> Result<&Type> {
        self.types
            .get(name)
            .ok_or_else(|| Error::unknown(Namespace::Type, name))
    }

    /// Looks up a free function by name
    pub fn get_func(&self, name: &str) -> Result<&Function> {
        self.funcs
            .get(name)
            .ok_or_else(|| Error::unknown(Namespace::Function, name))
    }

    /// Looks up a trait by name
    pub fn get_trait(&self, name: &str) -> Result<&Trait> {
        self.traits
            .get(name)
            .ok_or_else(|| Error::unknown(Namespace::Trait, name))
    }

    /// Returns true if a type with this name is registered
    pub fn has_type(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Returns true if a free function with this name is registered
    pub fn has_func(&self, name: &str) -> bool {
        self.funcs.contains_key(name)
    }

    /// Iterates over all registered types, by name
    pub fn types(&self) -> impl Iterator<Item = &Type> {
        self.types.values()
    }

    /// Iterates over all registered free functions, by name
    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.funcs.values()
    }

    /// Iterates over the trait registry, by name
    pub fn traits(&self) -> impl Iterator<Item = &Trait> {
        self.traits.values()
    }

    /// Returns the protocol data units in the order they were marked
    pub fn pdus(&self) -> &[String] {
        &self.pdus
    }

    // ---------------------------------------------------------------------
    // Construction

    /// Routes a record to the `define_*` call for its construct
    pub fn define(&mut self, record: &TypeConstructor) -> Result<()> {
        match record {
            TypeConstructor::BitString(_) => self.define_bitstring(record),
            TypeConstructor::Array(_) => self.define_array(record),
            TypeConstructor::Struct(_) => self.define_struct(record),
            TypeConstructor::Enum(_) => self.define_enum(record),
            TypeConstructor::NewType(_) => self.derive_type(record),
            TypeConstructor::Function(_) => self.define_function(record),
            TypeConstructor::Context(_) => self.define_context(record),
            TypeConstructor::Unrecognized(tag) => Err(Error::unsupported_construct(format!(
                "unrecognized construct '{}'",
                tag
            ))),
        }
    }

    /// Defines a fixed-width bit string
    pub fn define_bitstring(&mut self, record: &TypeConstructor) -> Result<()> {
        let TypeConstructor::BitString(r) = record else {
            return Err(Error::construct_mismatch("BitString", record.construct()));
        };
        self.check_new_type_name(&r.name)?;

        let ty = Type::new(&r.name, TypeKind::BitString { size: r.size });
        self.register(ty, BITSTRING_TRAITS)
    }

    /// Defines a fixed-length array over a registered element type
    pub fn define_array(&mut self, record: &TypeConstructor) -> Result<()> {
        let TypeConstructor::Array(r) = record else {
            return Err(Error::construct_mismatch("Array", record.construct()));
        };
        self.check_new_type_name(&r.name)?;

        let element = self.get_type(&r.element_type)?;
        let size = element.size().and_then(|s| s.checked_mul(r.length));
        let ty = Type::new(
            &r.name,
            TypeKind::Array {
                element_type: element.name().to_string(),
                length: r.length,
                size,
            },
        );
        self.register(ty, ARRAY_TRAITS)
    }

    /// Defines a structure type.
    ///
    /// Fields are resolved in order, so a field's presence expression can
    /// refer to the fields declared before it. Constraints must resolve to
    /// `Boolean` and actions to `Nothing`.
    pub fn define_struct(&mut self, record: &TypeConstructor) -> Result<()> {
        let TypeConstructor::Struct(r) = record else {
            return Err(Error::construct_mismatch("Struct", record.construct()));
        };
        self.check_new_type_name(&r.name)?;

        let mut ty = Type::new(&r.name, TypeKind::Struct(StructDef::default()));
        for t in STRUCT_TRAITS {
            ty.implement(self.get_trait(t)?);
        }

        for record in &r.fields {
            let field = self.parse_field(record, &ty)?;
            if let Some(def) = ty.struct_def_mut() {
                def.fields.push(field);
            }
        }

        let constraints = self.parse_typed_all(&r.constraints, &ty, BOOLEAN, "constraint")?;
        let actions = self.parse_typed_all(&r.actions, &ty, NOTHING, "action")?;
        if let Some(def) = ty.struct_def_mut() {
            def.constraints = constraints;
            def.actions = actions;
        }

        self.register(ty, &[])
    }

    /// Defines an enumerated type over registered variant types
    pub fn define_enum(&mut self, record: &TypeConstructor) -> Result<()> {
        let TypeConstructor::Enum(r) = record else {
            return Err(Error::construct_mismatch("Enum", record.construct()));
        };
        self.check_new_type_name(&r.name)?;

        let variants = r
            .variants
            .iter()
            .map(|v| self.type_name(&v.ty))
            .collect::<Result<Vec<_>>>()?;
        let parse_from = r.parse_from.as_deref().map(|n| self.type_name(n)).transpose()?;
        let serialise_to = r
            .serialise_to
            .as_deref()
            .map(|n| self.type_name(n))
            .transpose()?;

        let ty = Type::new(
            &r.name,
            TypeKind::Enum(EnumDef {
                variants,
                parse_from,
                serialise_to,
            }),
        );
        self.register(ty, ENUM_TRAITS)
    }

    /// Defines a new type with the shape of an existing one.
    ///
    /// The new type starts with its own copy of the base's trait set and
    /// method table, then gains the requested extra traits.
    pub fn derive_type(&mut self, record: &TypeConstructor) -> Result<()> {
        let TypeConstructor::NewType(r) = record else {
            return Err(Error::construct_mismatch("NewType", record.construct()));
        };
        self.check_new_type_name(&r.name)?;

        let base = self.get_type(&r.derived_from)?;
        let mut ty = Type::derive(&r.name, base);
        for implements in &r.implements {
            ty.implement(self.get_trait(&implements.trait_name)?);
        }
        self.register(ty, &[])
    }

    /// Defines a free function
    pub fn define_function(&mut self, record: &TypeConstructor) -> Result<()> {
        let TypeConstructor::Function(r) = record else {
            return Err(Error::construct_mismatch("Function", record.construct()));
        };
        names::validate(&r.name, NameClass::Function, Namespace::Function)?;
        if self.funcs.contains_key(&r.name) {
            return Err(Error::duplicate(Namespace::Function, &r.name));
        }

        let mut parameters: Vec<Parameter> = Vec::with_capacity(r.parameters.len());
        for p in &r.parameters {
            names::validate(&p.name, NameClass::Function, Namespace::Parameter)?;
            if parameters.iter().any(|known| known.name == p.name) {
                return Err(Error::duplicate(
                    Namespace::Parameter,
                    format!("{}.{}", r.name, p.name),
                ));
            }
            parameters.push(Parameter::new(&p.name, self.type_name(&p.ty)?));
        }
        let return_type = r
            .return_type
            .as_deref()
            .map(|n| self.type_name(n).map(TypeRef::Named))
            .transpose()?;

        debug!("Defined function {}", r.name);
        self.funcs.insert(
            r.name.clone(),
            Function::new(&r.name, parameters, return_type),
        );
        Ok(())
    }

    /// Contexts are not implemented; always fails once the record is confirmed
    /// to be a context
    pub fn define_context(&mut self, record: &TypeConstructor) -> Result<()> {
        if !matches!(record, TypeConstructor::Context(_)) {
            return Err(Error::construct_mismatch("Context", record.construct()));
        }
        Err(Error::unsupported_construct("Context types are not implemented"))
    }

    /// Marks a registered type as a protocol data unit
    pub fn define_pdu(&mut self, name: &str) -> Result<()> {
        self.get_type(name)?;
        if self.pdus.iter().any(|p| p == name) {
            return Err(Error::duplicate(Namespace::Pdu, name));
        }
        self.pdus.push(name.to_string());
        Ok(())
    }

    /// Adds a trait to a registered type. Implementing a trait twice is a no-op.
    pub fn implement_trait(&mut self, type_name: &str, trait_name: &str) -> Result<()> {
        let t = self
            .traits
            .get(trait_name)
            .ok_or_else(|| Error::unknown(Namespace::Trait, trait_name))?;
        let ty = self
            .types
            .get_mut(type_name)
            .ok_or_else(|| Error::unknown(Namespace::Type, type_name))?;
        if !ty.implements(trait_name) {
            ty.implement(t);
            debug!("{} now implements {}", type_name, trait_name);
        }
        Ok(())
    }

    /// Adds a user-declared method to a registered type's method table
    pub fn declare_method(&mut self, type_name: &str, method: Function) -> Result<()> {
        names::validate(&method.name, NameClass::Function, Namespace::Method)?;
        for referenced in method.referenced_types() {
            self.get_type(referenced)?;
        }
        let ty = self
            .types
            .get_mut(type_name)
            .ok_or_else(|| Error::unknown(Namespace::Type, type_name))?;
        if ty.method(&method.name).is_some() {
            return Err(Error::duplicate(
                Namespace::Method,
                format!("{}.{}", type_name, method.name),
            ));
        }
        ty.declare_method(method);
        Ok(())
    }

    /// Whole-protocol type checking is not implemented
    pub fn typecheck(&self) -> Result<()> {
        Err(Error::unsupported_construct(
            "whole-protocol typecheck is not implemented",
        ))
    }

    // ---------------------------------------------------------------------
    // Expressions and ordering

    /// Resolves an expression record in `scope`
    pub fn resolve_expression(&self, record: &ExpressionRecord, scope: Scope<'_>) -> Result<Expression> {
        match scope {
            Scope::TopLevel => Err(Error::scope("top level")),
            Scope::Struct(name) => Resolver::new(self, self.get_type(name)?)?.resolve(record),
        }
    }

    /// Emission order for the protocol data units
    pub fn emission_order(&self) -> Result<Vec<String>> {
        order::resolve(self, &self.pdus)
    }

    // ---------------------------------------------------------------------
    // Helpers

    /// Lexical check first, then uniqueness
    fn check_new_type_name(&self, name: &str) -> Result<()> {
        names::validate(name, NameClass::Type, Namespace::Type)?;
        if self.types.contains_key(name) {
            return Err(Error::duplicate(Namespace::Type, name));
        }
        Ok(())
    }

    fn type_name(&self, name: &str) -> Result<String> {
        Ok(self.get_type(name)?.name().to_string())
    }

    fn register(&mut self, mut ty: Type, implements: &[&str]) -> Result<()> {
        for t in implements {
            ty.implement(self.get_trait(t)?);
        }
        debug!("Defined {} {}", ty.kind().name(), ty.name());
        self.types.insert(ty.name().to_string(), ty);
        Ok(())
    }

    fn parse_field(&self, record: &FieldRecord, this: &Type) -> Result<Field> {
        names::validate(&record.name, NameClass::Function, Namespace::Field)?;
        let def = this.as_struct().ok_or_else(|| Error::scope(this.name()))?;
        if def.field(&record.name).is_some() {
            return Err(Error::duplicate(
                Namespace::Field,
                format!("{}.{}", this.name(), record.name),
            ));
        }

        let ty = self.type_name(&record.ty)?;
        let is_present = Resolver::new(self, this)?.resolve(&record.is_present)?;
        if is_present.ty() != BOOLEAN {
            return Err(Error::type_mismatch(
                format!("presence of field '{}'", record.name),
                BOOLEAN,
                is_present.ty(),
            ));
        }
        let transform = record
            .transform
            .as_ref()
            .map(|t| self.parse_transform(t, &ty))
            .transpose()?;

        Ok(Field {
            name: record.name.clone(),
            ty,
            is_present,
            transform,
        })
    }

    /// The transform function must map the field's type to `into_type`
    fn parse_transform(&self, record: &TransformRecord, field_type: &str) -> Result<Transform> {
        names::validate(&record.into_name, NameClass::Function, Namespace::Field)?;
        let into_type = self.type_name(&record.into_type)?;
        let using = self.get_func(&record.using)?;

        let context = format!("transform using '{}'", using.name);
        match using.parameters.as_slice() {
            [Parameter {
                ty: Some(TypeRef::Named(param)),
                ..
            }] if param == field_type => {}
            [Parameter { ty, .. }] => {
                let found = ty.as_ref().map_or("any".to_string(), |t| t.to_string());
                return Err(Error::type_mismatch(context, field_type, found));
            }
            params => {
                return Err(Error::type_mismatch(
                    format!("{} (parameter count)", context),
                    "1",
                    params.len().to_string(),
                ));
            }
        }
        match &using.return_type {
            Some(TypeRef::Named(ret)) if *ret == into_type => {}
            other => {
                let found = other.as_ref().map_or(NOTHING.to_string(), |t| t.to_string());
                return Err(Error::type_mismatch(context, into_type, found));
            }
        }

        Ok(Transform {
            into_name: record.into_name.clone(),
            into_type,
            using: using.name.clone(),
        })
    }

    fn parse_typed_all(
        &self,
        records: &[ExpressionRecord],
        this: &Type,
        expected: &str,
        what: &str,
    ) -> Result<Vec<Expression>> {
        let resolver = Resolver::new(self, this)?;
        records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let expr = resolver.resolve(record)?;
                if expr.ty() != expected {
                    return Err(Error::type_mismatch(
                        format!("{} #{} of '{}'", what, i, this.name()),
                        expected,
                        expr.ty(),
                    ));
                }
                Ok(expr)
            })
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn insert_unchecked(&mut self, ty: Type) {
        self.types.insert(ty.name().to_string(), ty);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::*;
    use pretty_assertions::assert_eq;

    fn always() -> ExpressionRecord {
        ExpressionRecord::constant("Boolean", "True")
    }

    fn bitstring(name: &str, size: u64) -> TypeConstructor {
        TypeConstructor::BitString(BitStringRecord {
            name: name.into(),
            size,
        })
    }

    fn field(name: &str, ty: &str) -> FieldRecord {
        FieldRecord {
            name: name.into(),
            ty: ty.into(),
            is_present: always(),
            transform: None,
        }
    }

    fn structure(
        name: &str,
        fields: Vec<FieldRecord>,
        constraints: Vec<ExpressionRecord>,
        actions: Vec<ExpressionRecord>,
    ) -> TypeConstructor {
        TypeConstructor::Struct(StructRecord {
            name: name.into(),
            fields,
            constraints,
            actions,
        })
    }

    fn trait_names(ty: &Type) -> Vec<&str> {
        ty.traits().iter().map(String::as_str).collect()
    }

    #[test]
    fn test_primitives() {
        let p = Protocol::new();
        assert!(trait_names(p.get_type("Nothing").unwrap()).is_empty());
        assert_eq!(
            trait_names(p.get_type("Boolean").unwrap()),
            ["BooleanOps", "Equality", "Value"]
        );
        assert_eq!(
            trait_names(p.get_type("Size").unwrap()),
            ["ArithmeticOps", "Equality", "Ordinal", "Value"]
        );
        assert_eq!(p.traits().count(), 7);
    }

    #[test]
    fn test_define_bitstring() {
        let mut p = Protocol::new();
        p.define_bitstring(&bitstring("Timestamp", 32)).unwrap();

        let ty = p.get_type("Timestamp").unwrap();
        assert_eq!(ty.kind().name(), "BitString");
        assert_eq!(ty.name(), "Timestamp");
        assert_eq!(ty.size(), Some(32));
        assert_eq!(trait_names(ty), ["Equality", "Sized", "Value"]);
        assert!(ty.method("size").is_some());
        assert!(ty.method("get").is_some());
        assert!(ty.method("eq").is_some());
    }

    #[test]
    fn test_define_array() {
        let mut p = Protocol::new();
        p.define_bitstring(&bitstring("SSRC", 32)).unwrap();
        p.define_array(&TypeConstructor::Array(ArrayRecord {
            name: "CSRCList".into(),
            element_type: "SSRC".into(),
            length: 4,
        }))
        .unwrap();

        let ty = p.get_type("CSRCList").unwrap();
        assert_eq!(ty.kind().name(), "Array");
        assert_eq!(
            ty.kind(),
            &TypeKind::Array {
                element_type: "SSRC".into(),
                length: 4,
                size: Some(128),
            }
        );
        assert_eq!(ty.size(), Some(128));
        assert_eq!(trait_names(ty), ["Equality", "IndexCollection", "Sized"]);
    }

    #[test]
    fn test_array_of_unsized_element() {
        let mut p = Protocol::new();
        p.define_array(&TypeConstructor::Array(ArrayRecord {
            name: "Flags".into(),
            element_type: "Boolean".into(),
            length: 8,
        }))
        .unwrap();
        assert_eq!(p.get_type("Flags").unwrap().size(), None);
    }

    #[test]
    fn test_derive_type() {
        let mut p = Protocol::new();
        p.define_bitstring(&bitstring("Bits16", 16)).unwrap();
        p.derive_type(&TypeConstructor::NewType(NewTypeRecord {
            name: "SeqNum".into(),
            derived_from: "Bits16".into(),
            implements: vec![ImplementsRecord {
                trait_name: "Ordinal".into(),
            }],
        }))
        .unwrap();

        let ty = p.get_type("SeqNum").unwrap();
        assert_eq!(ty.kind().name(), "BitString");
        assert_eq!(ty.name(), "SeqNum");
        assert_eq!(ty.size(), Some(16));
        assert_eq!(ty.derived_from(), Some("Bits16"));
        assert_eq!(trait_names(ty), ["Equality", "Ordinal", "Sized", "Value"]);

        let base = p.get_type("Bits16").unwrap();
        assert_eq!(trait_names(base), ["Equality", "Sized", "Value"]);
        assert!(base.method("lt").is_none());
    }

    #[test]
    fn test_derived_type_growth_leaves_base_alone() {
        let mut p = Protocol::new();
        p.define_bitstring(&bitstring("Bits16", 16)).unwrap();
        p.derive_type(&TypeConstructor::NewType(NewTypeRecord {
            name: "Length".into(),
            derived_from: "Bits16".into(),
            implements: vec![],
        }))
        .unwrap();
        p.implement_trait("Length", "ArithmeticOps").unwrap();

        assert!(p.get_type("Length").unwrap().implements("ArithmeticOps"));
        assert!(!p.get_type("Bits16").unwrap().implements("ArithmeticOps"));
    }

    fn rtp_protocol() -> Protocol {
        let mut p = Protocol::new();
        p.define_bitstring(&bitstring("SeqNumTrans", 16)).unwrap();
        p.define_bitstring(&bitstring("SeqNum", 16)).unwrap();
        p.define_bitstring(&bitstring("Timestamp", 32)).unwrap();
        p.define_function(&TypeConstructor::Function(FunctionRecord {
            name: "transform_seq".into(),
            parameters: vec![ParameterRecord {
                name: "seq".into(),
                ty: "SeqNum".into(),
            }],
            return_type: Some("SeqNumTrans".into()),
        }))
        .unwrap();
        p
    }

    fn seq_equals_47() -> ExpressionRecord {
        ExpressionRecord::call(
            ExpressionRecord::field(ExpressionRecord::this(), "seq"),
            "eq",
            vec![ArgumentRecord::new(
                "other",
                ExpressionRecord::constant("SeqNum", 47),
            )],
        )
    }

    #[test]
    fn test_define_struct() {
        let mut p = rtp_protocol();
        let mut seq = field("seq", "SeqNum");
        seq.transform = Some(TransformRecord {
            into_name: "ext_seq".into(),
            into_type: "SeqNumTrans".into(),
            using: "transform_seq".into(),
        });
        p.define_struct(&structure(
            "TestStruct",
            vec![seq, field("ts", "Timestamp")],
            vec![seq_equals_47()],
            vec![],
        ))
        .unwrap();

        let ty = p.get_type("TestStruct").unwrap();
        assert_eq!(ty.kind().name(), "Struct");
        let def = ty.as_struct().unwrap();
        let names: Vec<_> = def.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["seq", "ts"]);
        assert_eq!(def.fields[0].ty, "SeqNum");
        assert_eq!(def.fields[0].is_present.ty(), "Boolean");
        assert_eq!(
            def.fields[0].transform,
            Some(Transform {
                into_name: "ext_seq".into(),
                into_type: "SeqNumTrans".into(),
                using: "transform_seq".into(),
            })
        );
        assert_eq!(def.fields[1].ty, "Timestamp");
        assert_eq!(def.fields[1].transform, None);
        assert_eq!(def.constraints.len(), 1);
        assert_eq!(def.constraints[0].ty(), "Boolean");
        assert_eq!(def.constraints[0].to_string(), "this.seq.eq(47)");
        assert_eq!(trait_names(ty), ["Equality", "Sized"]);
    }

    #[test]
    fn test_struct_constraint_must_be_boolean() {
        let mut p = rtp_protocol();
        let err = p
            .define_struct(&structure(
                "Bad",
                vec![field("seq", "SeqNum")],
                vec![ExpressionRecord::field(ExpressionRecord::this(), "seq")],
                vec![],
            ))
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
        assert!(!p.has_type("Bad"));
    }

    #[test]
    fn test_struct_action_must_be_nothing() {
        let mut p = rtp_protocol();
        let err = p
            .define_struct(&structure("Bad", vec![field("seq", "SeqNum")], vec![], vec![seq_equals_47()]))
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
        assert!(!p.has_type("Bad"));
    }

    #[test]
    fn test_struct_action_set() {
        let mut p = rtp_protocol();
        let set = ExpressionRecord::call(
            ExpressionRecord::field(ExpressionRecord::this(), "seq"),
            "set",
            vec![ArgumentRecord::new(
                "value",
                ExpressionRecord::constant("SeqNum", 0),
            )],
        );
        p.define_struct(&structure("Reset", vec![field("seq", "SeqNum")], vec![], vec![set]))
            .unwrap();
        let def = p.get_type("Reset").unwrap().as_struct().unwrap().clone();
        assert_eq!(def.actions.len(), 1);
        assert_eq!(def.actions[0].ty(), "Nothing");
    }

    #[test]
    fn test_presence_refers_to_earlier_fields() {
        let mut p = rtp_protocol();
        let mut ext = field("ext", "Timestamp");
        ext.is_present = ExpressionRecord::field(ExpressionRecord::this(), "has_ext");
        p.define_struct(&structure(
            "Header",
            vec![field("has_ext", "Boolean"), ext],
            vec![],
            vec![],
        ))
        .unwrap();

        let mut early = field("ext", "Timestamp");
        early.is_present = ExpressionRecord::field(ExpressionRecord::this(), "has_ext");
        let err = p
            .define_struct(&structure(
                "Backwards",
                vec![early, field("has_ext", "Boolean")],
                vec![],
                vec![],
            ))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownReference {
                namespace: Namespace::Field,
                ..
            }
        ));
    }

    #[test]
    fn test_presence_must_be_boolean() {
        let mut p = rtp_protocol();
        let mut ts = field("ts", "Timestamp");
        ts.is_present = ExpressionRecord::constant("Size", 1);
        let err = p
            .define_struct(&structure("Bad", vec![ts], vec![], vec![]))
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn test_transform_signature_checked() {
        let mut p = rtp_protocol();
        let mut ts = field("ts", "Timestamp");
        ts.transform = Some(TransformRecord {
            into_name: "ext_ts".into(),
            into_type: "SeqNumTrans".into(),
            using: "transform_seq".into(),
        });
        let err = p
            .define_struct(&structure("Bad", vec![ts], vec![], vec![]))
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));

        let mut seq = field("seq", "SeqNum");
        seq.transform = Some(TransformRecord {
            into_name: "ext_seq".into(),
            into_type: "Timestamp".into(),
            using: "transform_seq".into(),
        });
        let err = p
            .define_struct(&structure("Bad", vec![seq], vec![], vec![]))
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn test_duplicate_field() {
        let mut p = rtp_protocol();
        let err = p
            .define_struct(&structure(
                "Dup",
                vec![field("seq", "SeqNum"), field("seq", "Timestamp")],
                vec![],
                vec![],
            ))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DuplicateDefinition {
                namespace: Namespace::Field,
                ..
            }
        ));
    }

    #[test]
    fn test_define_enum() {
        let mut p = Protocol::new();
        p.define_bitstring(&bitstring("TypeA", 32)).unwrap();
        p.define_bitstring(&bitstring("TypeB", 32)).unwrap();
        p.define_enum(&TypeConstructor::Enum(EnumRecord {
            name: "TestEnum".into(),
            variants: vec![
                VariantRecord { ty: "TypeA".into() },
                VariantRecord { ty: "TypeB".into() },
            ],
            parse_from: None,
            serialise_to: None,
        }))
        .unwrap();

        let ty = p.get_type("TestEnum").unwrap();
        assert_eq!(ty.as_enum().unwrap().variants, ["TypeA", "TypeB"]);
        assert_eq!(trait_names(ty), ["Sized"]);
    }

    #[test]
    fn test_define_function() {
        let mut p = Protocol::new();
        p.define_bitstring(&bitstring("Bits16", 16)).unwrap();
        p.define_function(&TypeConstructor::Function(FunctionRecord {
            name: "testFunction".into(),
            parameters: vec![
                ParameterRecord {
                    name: "foo".into(),
                    ty: "Bits16".into(),
                },
                ParameterRecord {
                    name: "bar".into(),
                    ty: "Boolean".into(),
                },
            ],
            return_type: Some("Boolean".into()),
        }))
        .unwrap();

        let f = p.get_func("testFunction").unwrap();
        assert_eq!(f.name, "testFunction");
        assert_eq!(
            f.parameters,
            [Parameter::new("foo", "Bits16"), Parameter::new("bar", "Boolean")]
        );
        assert_eq!(f.return_type, Some(TypeRef::named("Boolean")));
    }

    fn function(name: &str, parameters: &[(&str, &str)], return_type: Option<&str>) -> TypeConstructor {
        TypeConstructor::Function(FunctionRecord {
            name: name.into(),
            parameters: parameters
                .iter()
                .map(|(name, ty)| ParameterRecord {
                    name: (*name).into(),
                    ty: (*ty).into(),
                })
                .collect(),
            return_type: return_type.map(Into::into),
        })
    }

    #[test]
    fn test_define_function_errors() {
        let mut p = Protocol::new();
        p.define_bitstring(&bitstring("Bits16", 16)).unwrap();
        p.define_function(&function("check", &[("x", "Bits16")], Some("Boolean")))
            .unwrap();

        let err = p
            .define_function(&function("check", &[], None))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DuplicateDefinition {
                namespace: Namespace::Function,
                ..
            }
        ));
        assert_eq!(p.get_func("check").unwrap().parameters.len(), 1);

        let err = p
            .define_function(&function("Transform", &[], None))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedName {
                namespace: Namespace::Function,
                ..
            }
        ));

        let err = p
            .define_function(&function("widen", &[("x", "Missing")], None))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownReference {
                namespace: Namespace::Type,
                ..
            }
        ));
        let err = p
            .define_function(&function("widen", &[("x", "Bits16")], Some("Missing")))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownReference {
                namespace: Namespace::Type,
                ..
            }
        ));
        assert!(!p.has_func("widen"));
    }

    #[test]
    fn test_function_parameter_names() {
        let mut p = Protocol::new();
        p.define_bitstring(&bitstring("Bits16", 16)).unwrap();

        let err = p
            .define_function(&function(
                "between",
                &[("low", "Bits16"), ("low", "Bits16")],
                Some("Boolean"),
            ))
            .unwrap_err();
        match err {
            Error::DuplicateDefinition { namespace, name } => {
                assert_eq!(namespace, Namespace::Parameter);
                assert_eq!(name, "between.low");
            }
            other => panic!("expected a duplicate parameter, got {other:?}"),
        }

        let err = p
            .define_function(&function("between", &[("Low", "Bits16")], Some("Boolean")))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedName {
                namespace: Namespace::Parameter,
                ..
            }
        ));
        assert!(!p.has_func("between"));
    }

    #[test]
    fn test_free_function_parameter_named_self() {
        let mut p = Protocol::new();
        p.define_bitstring(&bitstring("Bits16", 16)).unwrap();
        p.define_function(&function("check", &[("self", "Bits16")], Some("Boolean")))
            .unwrap();
        let check = p.get_func("check").unwrap();
        assert!(!check.is_method());
        assert_eq!(check.arguments().len(), 1);

        let constraint = ExpressionRecord::FunctionInvocation {
            name: "check".into(),
            arguments: vec![ArgumentRecord::new(
                "self",
                ExpressionRecord::field(ExpressionRecord::this(), "x"),
            )],
        };
        p.define_struct(&structure(
            "Holder",
            vec![field("x", "Bits16")],
            vec![constraint],
            vec![],
        ))
        .unwrap();
        let holder = p.get_type("Holder").unwrap().as_struct().unwrap();
        assert_eq!(holder.constraints[0].ty(), "Boolean");
        assert_eq!(holder.constraints[0].to_string(), "check(this.x)");
    }

    #[test]
    fn test_duplicate_and_malformed_names() {
        let mut p = Protocol::new();
        p.define_bitstring(&bitstring("Timestamp", 32)).unwrap();

        let err = p.define_bitstring(&bitstring("Timestamp", 16)).unwrap_err();
        assert!(matches!(
            err,
            Error::DuplicateDefinition {
                namespace: Namespace::Type,
                ..
            }
        ));
        assert_eq!(p.get_type("Timestamp").unwrap().size(), Some(32));

        let err = p.define_bitstring(&bitstring("timestamp", 16)).unwrap_err();
        assert!(matches!(err, Error::MalformedName { .. }));

        // primitives are registered too, and a malformed name wins over a clash
        let err = p.define_bitstring(&bitstring("Boolean", 1)).unwrap_err();
        assert!(matches!(err, Error::DuplicateDefinition { .. }));
        let err = p.define_bitstring(&bitstring("Time stamp", 1)).unwrap_err();
        assert!(matches!(err, Error::MalformedName { .. }));
    }

    #[test]
    fn test_unknown_references() {
        let mut p = Protocol::new();
        let err = p
            .define_array(&TypeConstructor::Array(ArrayRecord {
                name: "List".into(),
                element_type: "Missing".into(),
                length: 2,
            }))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownReference {
                namespace: Namespace::Type,
                ..
            }
        ));
        assert!(!p.has_type("List"));

        let err = p
            .derive_type(&TypeConstructor::NewType(NewTypeRecord {
                name: "Flag".into(),
                derived_from: "Boolean".into(),
                implements: vec![ImplementsRecord {
                    trait_name: "Printable".into(),
                }],
            }))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownReference {
                namespace: Namespace::Trait,
                ..
            }
        ));
        assert!(!p.has_type("Flag"));

        p.define_bitstring(&bitstring("TypeA", 8)).unwrap();
        let err = p
            .define_enum(&TypeConstructor::Enum(EnumRecord {
                name: "Choice".into(),
                variants: vec![
                    VariantRecord { ty: "TypeA".into() },
                    VariantRecord { ty: "TypeB".into() },
                ],
                parse_from: None,
                serialise_to: None,
            }))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownReference {
                namespace: Namespace::Type,
                ..
            }
        ));
        let err = p
            .define_enum(&TypeConstructor::Enum(EnumRecord {
                name: "Choice".into(),
                variants: vec![VariantRecord { ty: "TypeA".into() }],
                parse_from: Some("Wire".into()),
                serialise_to: None,
            }))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownReference {
                namespace: Namespace::Type,
                ..
            }
        ));
        assert!(!p.has_type("Choice"));

        assert!(p.get_func("nope").is_err());
        assert!(p.get_trait("Value").is_ok());
    }

    #[test]
    fn test_construct_mismatch() {
        let mut p = Protocol::new();
        let err = p.define_array(&bitstring("Timestamp", 32)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedConstruct(_)));
        assert!(!p.has_type("Timestamp"));

        let union = TypeConstructor::Unrecognized("Union".into());
        let err = p.define(&union).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unsupported construct: unrecognized construct 'Union'"
        );
        let err = p.define_struct(&union).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unsupported construct: cannot create Struct from Union record"
        );
    }

    #[test]
    fn test_context_and_typecheck_unsupported() {
        let mut p = Protocol::new();
        let context = TypeConstructor::Context(ContextRecord {
            name: Some("Connection".into()),
            body: serde_json::Map::new(),
        });
        assert!(matches!(
            p.define_context(&context).unwrap_err(),
            Error::UnsupportedConstruct(_)
        ));
        assert!(matches!(
            p.define(&context).unwrap_err(),
            Error::UnsupportedConstruct(_)
        ));
        assert!(matches!(
            p.typecheck().unwrap_err(),
            Error::UnsupportedConstruct(_)
        ));
    }

    #[test]
    fn test_define_pdu() {
        let mut p = Protocol::new();
        p.define_bitstring(&bitstring("Packet", 8)).unwrap();
        p.define_pdu("Packet").unwrap();
        assert_eq!(p.pdus(), ["Packet"]);
        assert!(matches!(
            p.define_pdu("Packet").unwrap_err(),
            Error::DuplicateDefinition {
                namespace: Namespace::Pdu,
                ..
            }
        ));
        assert!(p.define_pdu("Missing").is_err());
    }

    #[test]
    fn test_declare_method() {
        let mut p = Protocol::new();
        p.define_bitstring(&bitstring("Port", 16)).unwrap();
        p.declare_method(
            "Port",
            Function::method("is_well_known", vec![], Some(TypeRef::named("Boolean"))),
        )
        .unwrap();
        let declared = p.get_type("Port").unwrap().method("is_well_known").unwrap();
        assert!(declared.is_method());
        assert!(declared.arguments().is_empty());

        let err = p
            .declare_method("Port", Function::new("eq", vec![], None))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateDefinition { .. }));
    }

    #[test]
    fn test_implement_trait_is_idempotent() {
        let mut p = Protocol::new();
        p.define_bitstring(&bitstring("Port", 16)).unwrap();
        p.implement_trait("Port", "Ordinal").unwrap();
        p.implement_trait("Port", "Ordinal").unwrap();
        assert_eq!(p.get_type("Port").unwrap().traits().len(), 4);
        assert!(p.implement_trait("Port", "Printable").is_err());
        assert!(p.implement_trait("Nope", "Ordinal").is_err());
    }
}
