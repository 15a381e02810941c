//! # Binding Table
//!
//! The binding table maps each operation name to its input and output shapes and to the
//! wire-level identifier used to route the request. It is built once, from an already resolved
//! service description, and never changes afterwards.
//!
//! A [`ServiceBinding`] bundles the table with the [`Registry`] that owns the shapes the table
//! points into. Bindings can come from:
//!
//! * code, through [`ServiceBinding::builder`];
//! * a resolved JSON description ([`description`]);
//! * a protobuf descriptor pool ([`descriptor_pool`]).
pub mod description;
pub mod descriptor_pool;

use crate::registry::{RecordType, Registry, RegistryBuilder, UnknownFieldPolicy};
use crate::shape::{FieldShape, ShapeArena, ShapeError, ShapeId};
use std::collections::HashMap;

/// Wire-level identity of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireOperation {
    /// Namespace of the operation element. May be empty.
    pub namespace: String,
    /// Local name of the operation element.
    pub name: String,
    /// Routing hint sent by the transport (the `SOAPAction` header over HTTP).
    pub action: String,
}

impl WireOperation {
    /// Creates an identifier whose action is `<namespace>/<name>`.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let name = name.into();
        let action = if namespace.is_empty() {
            name.clone()
        } else {
            format!("{}/{}", namespace.trim_end_matches('/'), name)
        };
        Self {
            namespace,
            name,
            action,
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingEntry {
    pub name: String,
    pub input: ShapeId,
    pub output: ShapeId,
    pub wire: WireOperation,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Operation '{0}' not found")]
pub struct NotFoundError(pub String);

/// Errors raised while building a binding from any source.
#[derive(Debug, thiserror::Error)]
pub enum BindingError {
    #[error("Invalid shape: '{0}'")]
    Shape(#[from] ShapeError),
    #[error("Operation '{0}' is declared more than once")]
    DuplicateOperation(String),
    #[error("Unknown type '{name}' referenced by {context}")]
    UnknownType { context: String, name: String },
    #[error("Failed to parse service description: '{0}'")]
    Json(#[from] serde_json::Error),
    #[error("Failed to decode file descriptor set: '{0}'")]
    Descriptor(#[from] prost_reflect::DescriptorError),
    #[error("Service '{0}' not found")]
    ServiceNotFound(String),
    #[error("Method '{0}' is streaming, only unary operations can be bound")]
    StreamingNotSupported(String),
}

/// Read-only table of operations.
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    entries: HashMap<String, BindingEntry>,
}

impl BindingTable {
    /// Looks up an operation by name.
    pub fn resolve(&self, operation: &str) -> Result<&BindingEntry, NotFoundError> {
        self.entries
            .get(operation)
            .ok_or_else(|| NotFoundError(operation.to_string()))
    }

    /// All entries, sorted by name.
    pub fn operations(&self) -> Vec<&BindingEntry> {
        let mut entries: Vec<_> = self.entries.values().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A binding table together with the registry holding its shapes.
#[derive(Debug)]
pub struct ServiceBinding {
    table: BindingTable,
    registry: Registry,
}

impl ServiceBinding {
    pub fn builder(namespace: impl Into<String>) -> ServiceBindingBuilder {
        ServiceBindingBuilder::new(namespace)
    }

    /// Builds a binding from a resolved JSON description.
    pub fn from_json(description: &str) -> Result<Self, BindingError> {
        description::from_json(description)?.build()
    }

    /// Builds a binding for `service` from an encoded protobuf `FileDescriptorSet`.
    pub fn from_file_descriptor_set(bytes: &[u8], service: &str) -> Result<Self, BindingError> {
        descriptor_pool::from_file_descriptor_set(bytes, service)?.build()
    }

    pub fn table(&self) -> &BindingTable {
        &self.table
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn into_parts(self) -> (BindingTable, Registry) {
        (self.table, self.registry)
    }
}

/// Collects shapes and operations before freezing them into a [`ServiceBinding`].
#[derive(Debug)]
pub struct ServiceBindingBuilder {
    namespace: String,
    registry: RegistryBuilder,
    entries: HashMap<String, BindingEntry>,
}

impl ServiceBindingBuilder {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            registry: RegistryBuilder::new(),
            entries: HashMap::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn shapes_mut(&mut self) -> &mut ShapeArena {
        self.registry.shapes_mut()
    }

    pub fn unknown_fields(mut self, policy: UnknownFieldPolicy) -> Self {
        self.registry.set_unknown_fields(policy);
        self
    }

    pub fn set_unknown_fields(&mut self, policy: UnknownFieldPolicy) {
        self.registry.set_unknown_fields(policy);
    }

    pub fn record(&mut self, name: &str, fields: Vec<FieldShape>) -> Result<ShapeId, ShapeError> {
        self.registry.record(name, fields)
    }

    pub fn register<T: RecordType>(&mut self) -> Result<ShapeId, ShapeError> {
        self.registry.register::<T>()
    }

    /// Adds an operation living in the builder's namespace.
    pub fn operation(
        &mut self,
        name: &str,
        input: ShapeId,
        output: ShapeId,
    ) -> Result<&mut Self, BindingError> {
        let wire = WireOperation::new(self.namespace.clone(), name);
        self.operation_with_wire(name, input, output, wire)
    }

    /// Adds an operation with an explicit wire identifier.
    pub fn operation_with_wire(
        &mut self,
        name: &str,
        input: ShapeId,
        output: ShapeId,
        wire: WireOperation,
    ) -> Result<&mut Self, BindingError> {
        if self.entries.contains_key(name) {
            return Err(BindingError::DuplicateOperation(name.to_string()));
        }

        self.entries.insert(
            name.to_string(),
            BindingEntry {
                name: name.to_string(),
                input,
                output,
                wire,
            },
        );
        Ok(self)
    }

    pub fn build(self) -> Result<ServiceBinding, BindingError> {
        Ok(ServiceBinding {
            table: BindingTable {
                entries: self.entries,
            },
            registry: self.registry.build()?,
        })
    }
}
