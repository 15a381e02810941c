//! # Resolved JSON Description
//!
//! A JSON rendition of an already resolved service description: the types and operations a
//! description parser (for example a WSDL compiler) has extracted. Parsing the description
//! grammar itself is not this crate's job.
//!
//! ```json
//! {
//!   "namespace": "urn:users",
//!   "types": [
//!     {
//!       "name": "User",
//!       "fields": [
//!         { "name": "UserId", "type": "string" },
//!         { "name": "Name", "type": "string" },
//!         { "name": "Age", "type": "int" },
//!         { "name": "Email", "type": "string", "required": false }
//!       ]
//!     }
//!   ],
//!   "operations": [
//!     { "name": "GetUser", "input": [{ "name": "userId", "type": "string" }], "output": "User" },
//!     { "name": "RegisterUser", "input": "User", "output": "string", "action": "urn:users#Register" }
//!   ]
//! }
//! ```
//!
//! Type references are scalar names (`string`, `int`, `integer`, `long`, `float`, `double`,
//! `boolean`, `bool`), record names declared under `types`, or either followed by `[]` for a
//! sequence. An operation's `input`/`output` is either a type reference or a list of parts; a
//! part list becomes a record named `<Operation>Request` / `<Operation>Response`.
use super::{BindingError, ServiceBindingBuilder, WireOperation};
use crate::shape::{FieldShape, ScalarKind, ShapeArena, ShapeId};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Description {
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub types: Vec<TypeSpec>,
    pub operations: Vec<OperationSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeSpec {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub type_ref: String,
    #[serde(default = "required_by_default")]
    pub required: bool,
}

fn required_by_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OperationSpec {
    pub name: String,
    pub input: MessageSpec,
    pub output: MessageSpec,
    #[serde(default)]
    pub action: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MessageSpec {
    Type(String),
    Parts(Vec<FieldSpec>),
}

/// Parses a JSON description into a builder, so callers can still register their own types.
pub fn from_json(json: &str) -> Result<ServiceBindingBuilder, BindingError> {
    let description: Description = serde_json::from_str(json)?;
    from_description(description)
}

pub fn from_description(description: Description) -> Result<ServiceBindingBuilder, BindingError> {
    let mut builder = ServiceBindingBuilder::new(description.namespace.clone());

    // Declare first so that records may reference each other in any order.
    for spec in &description.types {
        builder.shapes_mut().declare_record(&spec.name);
    }

    for spec in &description.types {
        let context = format!("type '{}'", spec.name);
        let shapes = builder.shapes_mut();
        let fields = resolve_fields(shapes, &spec.fields, &context)?;
        let id = shapes.declare_record(&spec.name);
        shapes.define_record(id, fields)?;
    }

    for operation in description.operations {
        let context = format!("operation '{}'", operation.name);
        let shapes = builder.shapes_mut();
        let input = resolve_message(
            shapes,
            &operation.input,
            &format!("{}Request", operation.name),
            &context,
        )?;
        let output = resolve_message(
            shapes,
            &operation.output,
            &format!("{}Response", operation.name),
            &context,
        )?;

        let mut wire = WireOperation::new(description.namespace.clone(), &operation.name);
        if let Some(action) = operation.action {
            wire = wire.with_action(action);
        }
        builder.operation_with_wire(&operation.name, input, output, wire)?;
    }

    Ok(builder)
}

fn resolve_message(
    shapes: &mut ShapeArena,
    message: &MessageSpec,
    synthesized_name: &str,
    context: &str,
) -> Result<ShapeId, BindingError> {
    match message {
        MessageSpec::Type(type_ref) => resolve_type(shapes, type_ref, context),
        MessageSpec::Parts(parts) => {
            let fields = resolve_fields(shapes, parts, context)?;
            Ok(shapes.record(synthesized_name, fields)?)
        }
    }
}

fn resolve_fields(
    shapes: &mut ShapeArena,
    specs: &[FieldSpec],
    context: &str,
) -> Result<Vec<FieldShape>, BindingError> {
    specs
        .iter()
        .map(|spec| {
            Ok(FieldShape {
                name: spec.name.clone(),
                shape: resolve_type(shapes, &spec.type_ref, context)?,
                required: spec.required,
            })
        })
        .collect()
}

fn resolve_type(
    shapes: &mut ShapeArena,
    type_ref: &str,
    context: &str,
) -> Result<ShapeId, BindingError> {
    let type_ref = type_ref.trim();

    if let Some(element) = type_ref.strip_suffix("[]") {
        let element = resolve_type(shapes, element, context)?;
        return Ok(shapes.sequence(element));
    }

    let kind = match type_ref {
        "string" => Some(ScalarKind::String),
        "int" | "integer" | "long" => Some(ScalarKind::Integer),
        "float" | "double" => Some(ScalarKind::Float),
        "boolean" | "bool" => Some(ScalarKind::Boolean),
        _ => None,
    };

    if let Some(kind) = kind {
        return Ok(shapes.scalar(kind));
    }

    shapes
        .record_by_name(type_ref)
        .ok_or_else(|| BindingError::UnknownType {
            context: context.to_string(),
            name: type_ref.to_string(),
        })
}
