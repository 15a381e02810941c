//! # Protobuf Descriptor Pool
//!
//! Builds a binding for one service of a `prost_reflect::DescriptorPool`.
//!
//! * Each unary method becomes an operation named after the method. Its action is the gRPC
//!   style path `/<package>.<Service>/<Method>` and its namespace is `urn:<package>`.
//! * Each message becomes a record shape named after its fully qualified name. Messages may
//!   reference themselves; they are declared before their fields are resolved.
//! * `repeated` fields become sequences, maps become sequences of their entry records.
//! * Fields with explicit presence (message fields, proto3 `optional`, proto2 optional) are
//!   optional. `required` fields and implicit presence scalars are required.
//! * Enums and `bytes` map to strings.
use super::{BindingError, ServiceBindingBuilder, WireOperation};
use crate::shape::{FieldShape, ScalarKind, ShapeArena, ShapeId};
use prost_reflect::{Cardinality, DescriptorPool, FieldDescriptor, Kind, MessageDescriptor};

/// Decodes `bytes` as a `FileDescriptorSet` and binds `service` from it.
pub fn from_file_descriptor_set(
    bytes: &[u8],
    service: &str,
) -> Result<ServiceBindingBuilder, BindingError> {
    let pool = DescriptorPool::decode(bytes)?;
    from_descriptor_pool(&pool, service)
}

/// Fully qualified names of every service in the pool.
pub fn list_services(pool: &DescriptorPool) -> Vec<String> {
    pool.services().map(|s| s.full_name().to_string()).collect()
}

pub fn from_descriptor_pool(
    pool: &DescriptorPool,
    service: &str,
) -> Result<ServiceBindingBuilder, BindingError> {
    let service = pool
        .get_service_by_name(service)
        .ok_or_else(|| BindingError::ServiceNotFound(service.to_string()))?;

    let namespace = if service.package_name().is_empty() {
        format!("urn:{}", service.name())
    } else {
        format!("urn:{}", service.package_name())
    };

    let mut builder = ServiceBindingBuilder::new(namespace.clone());
    let mut pending = Vec::new();

    for method in service.methods() {
        if method.is_client_streaming() || method.is_server_streaming() {
            return Err(BindingError::StreamingNotSupported(
                method.full_name().to_string(),
            ));
        }

        let shapes = builder.shapes_mut();
        let input = message_shape(shapes, &method.input(), &mut pending);
        let output = message_shape(shapes, &method.output(), &mut pending);

        let wire = WireOperation::new(namespace.clone(), method.name())
            .with_action(format!("/{}/{}", service.full_name(), method.name()));

        builder.operation_with_wire(method.name(), input, output, wire)?;
    }

    // Defining a message may declare new ones, so drain until nothing is left.
    while let Some(message) = pending.pop() {
        let shapes = builder.shapes_mut();
        let fields = message
            .fields()
            .map(|field| field_shape(shapes, &field, &mut pending))
            .collect();

        let id = shapes.declare_record(message.full_name());
        shapes.define_record(id, fields)?;
    }

    Ok(builder)
}

fn message_shape(
    shapes: &mut ShapeArena,
    message: &MessageDescriptor,
    pending: &mut Vec<MessageDescriptor>,
) -> ShapeId {
    if let Some(id) = shapes.record_by_name(message.full_name()) {
        return id;
    }

    pending.push(message.clone());
    shapes.declare_record(message.full_name())
}

fn field_shape(
    shapes: &mut ShapeArena,
    field: &FieldDescriptor,
    pending: &mut Vec<MessageDescriptor>,
) -> FieldShape {
    let element = match field.kind() {
        Kind::Message(message) => message_shape(shapes, &message, pending),
        Kind::Enum(_) | Kind::String | Kind::Bytes => shapes.scalar(ScalarKind::String),
        Kind::Bool => shapes.scalar(ScalarKind::Boolean),
        Kind::Double | Kind::Float => shapes.scalar(ScalarKind::Float),
        Kind::Int32
        | Kind::Int64
        | Kind::Uint32
        | Kind::Uint64
        | Kind::Sint32
        | Kind::Sint64
        | Kind::Fixed32
        | Kind::Fixed64
        | Kind::Sfixed32
        | Kind::Sfixed64 => shapes.scalar(ScalarKind::Integer),
    };

    let cardinality = field.cardinality();
    let shape = match cardinality {
        Cardinality::Repeated => shapes.sequence(element),
        _ => element,
    };

    let required = match cardinality {
        Cardinality::Required => true,
        Cardinality::Repeated => false,
        Cardinality::Optional => !field.supports_presence(),
    };

    FieldShape {
        name: field.name().to_string(),
        shape,
        required,
    }
}
