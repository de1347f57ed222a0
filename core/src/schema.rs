//! Structural parameter contracts for tools.
//!
//! A [`ParamSchema`] is plain data: field names, their types and whether they
//! are required. It renders to JSON Schema for the model and is compiled once
//! at registration, so validating arguments never runs tool code.

use std::collections::HashSet;

use jsonschema::JSONSchema;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    StringArray,
    /// A string restricted to the listed values.
    Enum(&'static [&'static str]),
}

impl ParamType {
    fn to_json_schema(self, description: &str) -> Value {
        match self {
            ParamType::String => json!({ "type": "string", "description": description }),
            ParamType::StringArray => json!({
                "type": "array",
                "items": { "type": "string" },
                "description": description,
            }),
            ParamType::Enum(values) => json!({
                "type": "string",
                "enum": values,
                "description": description,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamField {
    pub name: &'static str,
    pub kind: ParamType,
    pub required: bool,
    pub description: &'static str,
}

/// Object-shaped parameter contract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamSchema {
    fields: Vec<ParamField>,
}

impl ParamSchema {
    /// A schema with no fields; any object validates.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn required(self, name: &'static str, kind: ParamType, description: &'static str) -> Self {
        self.field(name, kind, true, description)
    }

    pub fn optional(self, name: &'static str, kind: ParamType, description: &'static str) -> Self {
        self.field(name, kind, false, description)
    }

    fn field(
        mut self,
        name: &'static str,
        kind: ParamType,
        required: bool,
        description: &'static str,
    ) -> Self {
        self.fields.push(ParamField {
            name,
            kind,
            required,
            description,
        });
        self
    }

    pub fn fields(&self) -> &[ParamField] {
        &self.fields
    }

    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|field| {
                (
                    field.name.to_string(),
                    field.kind.to_json_schema(field.description),
                )
            })
            .collect();
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|field| field.required)
            .map(|field| field.name)
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    pub(crate) fn compile(&self) -> Result<CompiledSchema, String> {
        let mut seen = HashSet::new();
        if let Some(field) = self.fields.iter().find(|field| !seen.insert(field.name)) {
            return Err(format!("field '{}' is declared twice", field.name));
        }

        let schema = self.to_json_schema();
        let compiled = JSONSchema::compile(&schema).map_err(|e| e.to_string())?;
        Ok(CompiledSchema(compiled))
    }
}

/// Validator produced from a [`ParamSchema`].
pub(crate) struct CompiledSchema(JSONSchema);

impl CompiledSchema {
    pub(crate) fn validate(&self, arguments: &Value) -> Result<(), String> {
        self.0.validate(arguments).map_err(|errors| {
            errors
                .map(|error| {
                    let path = error.instance_path.to_string();
                    if path.is_empty() {
                        error.to_string()
                    } else {
                        format!("{path}: {error}")
                    }
                })
                .collect::<Vec<_>>()
                .join("; ")
        })
    }
}
