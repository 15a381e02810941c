//! # Proxy State: Offline
//!
//! Introspection of the bound operations. These methods are available in every state.
use super::ServiceProxy;
use crate::binding::{BindingEntry, NotFoundError};
use crate::shape::Shape;
use std::fmt;

/// Human readable description of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub namespace: String,
    pub action: String,
    /// Type name of the input shape.
    pub input: String,
    /// Type name of the output shape.
    pub output: String,
    /// Fields of a record input, in positional order. Empty for other inputs.
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub type_name: String,
    pub required: bool,
}

impl fmt::Display for Signature {
    /// `GetUser(userId: string) -> User`, with optional parameters suffixed by `?`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;

        if self.parameters.is_empty() {
            write!(f, "{}", self.input)?;
        }

        for (i, parameter) in self.parameters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            let marker = if parameter.required { "" } else { "?" };
            write!(f, "{}{marker}: {}", parameter.name, parameter.type_name)?;
        }

        write!(f, ") -> {}", self.output)
    }
}

impl<S> ServiceProxy<S> {
    /// All bound operations, sorted by name.
    pub fn operations(&self) -> Vec<&BindingEntry> {
        self.table.operations()
    }

    /// Describes an operation in terms of type names.
    pub fn describe(&self, operation: &str) -> Result<Signature, NotFoundError> {
        let entry = self.table.resolve(operation)?;
        let shapes = self.registry.shapes();

        let parameters = match shapes.get(entry.input) {
            Some(Shape::Record(record)) => record
                .fields()
                .iter()
                .map(|field| Parameter {
                    name: field.name.clone(),
                    type_name: shapes.type_name(field.shape),
                    required: field.required,
                })
                .collect(),
            _ => Vec::new(),
        };

        Ok(Signature {
            name: entry.name.clone(),
            namespace: entry.wire.namespace.clone(),
            action: entry.wire.action.clone(),
            input: shapes.type_name(entry.input),
            output: shapes.type_name(entry.output),
            parameters,
        })
    }
}
