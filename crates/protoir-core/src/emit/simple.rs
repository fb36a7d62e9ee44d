//! Human-readable protocol description.

use super::{Backend, EmitConfig, Printer};
use crate::error::Result;
use crate::protocol::Protocol;
use crate::traits::Function;
use crate::types::{ContextField, EnumDef, StructDef, Type};

/// Writes one paragraph per definition, followed by the protocol's PDUs
#[derive(Debug)]
pub struct SimpleBackend {
    config: EmitConfig,
    body: Printer,
    header: String,
    trailer: String,
}

impl Default for SimpleBackend {
    fn default() -> Self {
        Self::new(EmitConfig::default())
    }
}

impl SimpleBackend {
    /// Creates a backend with the given configuration
    pub fn new(config: EmitConfig) -> Self {
        let body = Printer::new(&config);
        Self {
            config,
            body,
            header: String::new(),
            trailer: String::new(),
        }
    }

    fn open(&mut self, kind: &str, ty: &Type) {
        self.body.writeln(format!("{} {}", kind, ty.name()));
        self.body.indent();
        if self.config.include_comments {
            if let Some(base) = ty.derived_from() {
                self.body.writeln(format!("derived from: {}", base));
            }
            if !ty.traits().is_empty() {
                let traits: Vec<&str> = ty.traits().iter().map(String::as_str).collect();
                self.body.writeln(format!("traits: {}", traits.join(", ")));
            }
        }
    }

    fn close(&mut self) {
        self.body.dedent();
        self.body.blank();
    }
}

impl Backend for SimpleBackend {
    fn name(&self) -> &str {
        "simple"
    }

    fn extension(&self) -> &str {
        "txt"
    }

    fn bitstring(&mut self, ty: &Type, size: u64) -> Result<()> {
        self.open("bitstring", ty);
        self.body.writeln(format!("size: {} bits", size));
        self.close();
        Ok(())
    }

    fn array(&mut self, ty: &Type, element_type: &str, length: u64) -> Result<()> {
        self.open("array", ty);
        self.body.writeln(format!("element: {}", element_type));
        self.body.writeln(format!("length: {}", length));
        if let Some(size) = ty.size() {
            self.body.writeln(format!("size: {} bits", size));
        }
        self.close();
        Ok(())
    }

    fn structure(&mut self, ty: &Type, def: &StructDef) -> Result<()> {
        self.open("struct", ty);
        for field in &def.fields {
            self.body.writeln(format!("field {}: {}", field.name, field.ty));
            self.body.indent();
            if !field.is_present.is_constant_true() {
                self.body.writeln(format!("present when: {}", field.is_present));
            }
            if let Some(t) = &field.transform {
                self.body.writeln(format!(
                    "transform: {}: {} using {}",
                    t.into_name, t.into_type, t.using
                ));
            }
            self.body.dedent();
        }
        for constraint in &def.constraints {
            self.body.writeln(format!("constraint: {}", constraint));
        }
        for action in &def.actions {
            self.body.writeln(format!("action: {}", action));
        }
        self.close();
        Ok(())
    }

    fn enumeration(&mut self, ty: &Type, def: &EnumDef) -> Result<()> {
        self.open("enum", ty);
        for variant in &def.variants {
            self.body.writeln(format!("variant {}", variant));
        }
        if let Some(from) = &def.parse_from {
            self.body.writeln(format!("parse from: {}", from));
        }
        if let Some(to) = &def.serialise_to {
            self.body.writeln(format!("serialise to: {}", to));
        }
        self.close();
        Ok(())
    }

    fn context(&mut self, ty: &Type, fields: &[ContextField]) -> Result<()> {
        self.open("context", ty);
        for field in fields {
            self.body.writeln(format!("field {}: {}", field.name, field.ty));
        }
        self.close();
        Ok(())
    }

    fn function(&mut self, function: &Function) -> Result<()> {
        let params: Vec<String> = function
            .parameters
            .iter()
            .map(|p| match &p.ty {
                Some(ty) => format!("{}: {}", p.name, ty),
                None => p.name.clone(),
            })
            .collect();
        let ret = match &function.return_type {
            Some(ty) => ty.to_string(),
            None => crate::NOTHING.to_string(),
        };
        self.body
            .writeln(format!("function {}({}) -> {}", function.name, params.join(", "), ret));
        self.body.blank();
        Ok(())
    }

    fn finish(&mut self, protocol: &Protocol) -> Result<()> {
        self.header = if protocol.name().is_empty() {
            "protocol\n\n".to_string()
        } else {
            format!("protocol {}\n\n", protocol.name())
        };
        self.trailer = format!("pdus: {}\n", protocol.pdus().join(", "));
        Ok(())
    }

    fn output(&self) -> String {
        let mut out = String::with_capacity(
            self.header.len() + self.body.as_str().len() + self.trailer.len(),
        );
        out.push_str(&self.header);
        out.push_str(self.body.as_str());
        out.push_str(&self.trailer);
        out
    }
}
