//! Rust type skeletons.
//!
//! Every protocol type becomes a Rust type of the same name and every free
//! function a stub with a `todo!()` body. Bit strings map onto the smallest
//! unsigned integer that holds them, falling back to a byte array above 128
//! bits. Fields whose presence is not unconditionally true become `Option`s.

use super::{Backend, EmitConfig, Printer};
use crate::error::{Error, Result};
use crate::protocol::Protocol;
use crate::traits::{Function, TypeRef};
use crate::types::{ContextField, EnumDef, StructDef, Type};
use crate::{BOOLEAN, NOTHING, SIZE};

/// Words that must be written as raw identifiers
const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "do",
    "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl", "in",
    "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "static", "struct", "trait", "true", "try", "type", "typeof", "unsafe", "unsized",
    "use", "virtual", "where", "while", "yield",
];

/// Keywords that cannot be raw identifiers
const RESERVED: &[&str] = &["crate", "self", "super", "Self"];

/// Generates a Rust module skeleton for a protocol
#[derive(Debug)]
pub struct RustBackend {
    config: EmitConfig,
    body: Printer,
    header: String,
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new(EmitConfig::default())
    }
}

impl RustBackend {
    /// Creates a backend with the given configuration
    pub fn new(config: EmitConfig) -> Self {
        let body = Printer::new(&config);
        Self {
            config,
            body,
            header: String::new(),
        }
    }

    fn doc(&mut self, line: impl AsRef<str>) {
        if self.config.include_comments {
            self.body.writeln(format!("/// {}", line.as_ref()));
        }
    }

    fn type_doc(&mut self, ty: &Type) {
        if let Some(base) = ty.derived_from() {
            self.doc(format!("Derived from `{}`.", base));
        }
    }

    fn derives(&mut self, extra: &[&str]) {
        let mut derives = vec!["Debug", "Clone", "PartialEq"];
        derives.extend_from_slice(extra);
        self.body.writeln(format!("#[derive({})]", derives.join(", ")));
    }
}

/// Maps a protocol type name onto the Rust type that represents it
fn rust_type(name: &str) -> String {
    match name {
        BOOLEAN => "bool".to_string(),
        SIZE => "usize".to_string(),
        NOTHING => "()".to_string(),
        other => ident(other),
    }
}

fn signature_type(ty: &TypeRef) -> String {
    match ty {
        TypeRef::Named(name) => rust_type(name),
        TypeRef::SelfType => "Self".to_string(),
        TypeRef::Element => "Self::Element".to_string(),
    }
}

/// Escapes names that collide with Rust keywords
fn ident(name: &str) -> String {
    if RESERVED.contains(&name) {
        format!("{}_", name)
    } else if KEYWORDS.contains(&name) {
        format!("r#{}", name)
    } else {
        name.to_string()
    }
}

/// Smallest representation holding `bits` bits
fn bits_repr(bits: u64) -> String {
    match bits {
        0 => "()".to_string(),
        1..=8 => "u8".to_string(),
        9..=16 => "u16".to_string(),
        17..=32 => "u32".to_string(),
        33..=64 => "u64".to_string(),
        65..=128 => "u128".to_string(),
        _ => format!("[u8; {}]", bits.div_ceil(8)),
    }
}

impl Backend for RustBackend {
    fn name(&self) -> &str {
        "rust"
    }

    fn extension(&self) -> &str {
        "rs"
    }

    fn bitstring(&mut self, ty: &Type, size: u64) -> Result<()> {
        self.doc(format!("{}-bit string.", size));
        self.type_doc(ty);
        let mut extra = vec!["Eq", "Hash"];
        if ty.implements("Ordinal") {
            extra.extend(["PartialOrd", "Ord"]);
        }
        self.derives(&extra);
        self.body
            .writeln(format!("pub struct {}(pub {});", ident(ty.name()), bits_repr(size)));
        self.body.blank();
        Ok(())
    }

    fn array(&mut self, ty: &Type, element_type: &str, length: u64) -> Result<()> {
        self.type_doc(ty);
        self.derives(&[]);
        self.body.writeln(format!(
            "pub struct {}(pub [{}; {}]);",
            ident(ty.name()),
            rust_type(element_type),
            length
        ));
        self.body.blank();
        Ok(())
    }

    fn structure(&mut self, ty: &Type, def: &StructDef) -> Result<()> {
        self.type_doc(ty);
        for constraint in &def.constraints {
            self.doc(format!("Constraint: `{}`", constraint));
        }
        for action in &def.actions {
            self.doc(format!("Action: `{}`", action));
        }
        self.derives(&[]);
        self.body.writeln(format!("pub struct {} {{", ident(ty.name())));
        self.body.indent();
        for field in &def.fields {
            let field_type = rust_type(&field.ty);
            let always = field.is_present.is_constant_true();
            if !always {
                self.doc(format!("Present when `{}`.", field.is_present));
            }
            if let Some(t) = &field.transform {
                self.doc(format!(
                    "Read as `{}: {}` through `{}`.",
                    t.into_name, t.into_type, t.using
                ));
            }
            let field_type = if always {
                field_type
            } else {
                format!("Option<{}>", field_type)
            };
            self.body
                .writeln(format!("pub {}: {},", ident(&field.name), field_type));
        }
        self.body.dedent();
        self.body.writeln("}");
        self.body.blank();
        Ok(())
    }

    fn enumeration(&mut self, ty: &Type, def: &EnumDef) -> Result<()> {
        let name = ident(ty.name());
        self.type_doc(ty);
        self.derives(&[]);
        self.body.writeln(format!("pub enum {} {{", name));
        self.body.indent();
        for variant in &def.variants {
            self.body
                .writeln(format!("{}({}),", ident(variant), rust_type(variant)));
        }
        self.body.dedent();
        self.body.writeln("}");
        self.body.blank();

        if let Some(from) = &def.parse_from {
            self.body
                .writeln(format!("impl TryFrom<{}> for {} {{", rust_type(from), name));
            self.body.indent();
            self.body.writeln("type Error = ();");
            self.body.blank();
            self.body.writeln(format!(
                "fn try_from(value: {}) -> Result<Self, Self::Error> {{",
                rust_type(from)
            ));
            self.body.indent();
            self.body.writeln("todo!()");
            self.body.dedent();
            self.body.writeln("}");
            self.body.dedent();
            self.body.writeln("}");
            self.body.blank();
        }
        if let Some(to) = &def.serialise_to {
            self.body
                .writeln(format!("impl From<{}> for {} {{", name, rust_type(to)));
            self.body.indent();
            self.body
                .writeln(format!("fn from(value: {}) -> Self {{", name));
            self.body.indent();
            self.body.writeln("todo!()");
            self.body.dedent();
            self.body.writeln("}");
            self.body.dedent();
            self.body.writeln("}");
            self.body.blank();
        }
        Ok(())
    }

    fn context(&mut self, ty: &Type, _fields: &[ContextField]) -> Result<()> {
        Err(Error::backend(
            self.name(),
            ty.name(),
            "contexts have no Rust representation",
        ))
    }

    fn function(&mut self, function: &Function) -> Result<()> {
        let params: Vec<String> = function
            .parameters
            .iter()
            .map(|p| {
                let ty = p
                    .ty
                    .as_ref()
                    .map(signature_type)
                    .unwrap_or_else(|| "impl std::any::Any".to_string());
                format!("{}: {}", ident(&p.name), ty)
            })
            .collect();
        let ret = match &function.return_type {
            Some(ty) if *ty != TypeRef::named(NOTHING) => format!(" -> {}", signature_type(ty)),
            _ => String::new(),
        };
        self.body.writeln(format!(
            "pub fn {}({}){} {{",
            ident(&function.name),
            params.join(", "),
            ret
        ));
        self.body.indent();
        self.body.writeln("todo!()");
        self.body.dedent();
        self.body.writeln("}");
        self.body.blank();
        Ok(())
    }

    fn finish(&mut self, protocol: &Protocol) -> Result<()> {
        let mut header = String::new();
        if self.config.include_comments && !protocol.name().is_empty() {
            header.push_str(&format!("//! Types of the {} protocol.\n", protocol.name()));
            if !protocol.pdus().is_empty() {
                header.push_str("//!\n");
                let pdus: Vec<String> =
                    protocol.pdus().iter().map(|p| format!("`{}`", p)).collect();
                header.push_str(&format!("//! PDUs: {}\n", pdus.join(", ")));
            }
            header.push('\n');
        }
        header.push_str("#![allow(unused_variables)]\n\n");
        self.header = header;
        Ok(())
    }

    fn output(&self) -> String {
        let mut out = self.header.clone();
        out.push_str(self.body.as_str());
        out
    }
}
