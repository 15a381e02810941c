//! # Type Marshalling Registry
//!
//! The [`Registry`] converts domain [`Value`]s into [`WireValue`] trees and back, walking the
//! value and its [`Shape`] together.
//!
//! ## Registration phase
//!
//! Record types are registered on a [`RegistryBuilder`]. Calling [`RegistryBuilder::build`]
//! freezes the set of shapes into an immutable [`Registry`], which is then shared (usually
//! behind an `Arc`) by every call. There is no way to register a type after that point, so
//! concurrent calls never observe a registry that is being modified.
//!
//! ## Rules
//!
//! * Records are emitted in the **declared** field order of their shape, whatever order the
//!   value holds them in.
//! * A missing optional field is emitted as an explicit [`WireValue::Nil`], never omitted.
//! * A missing (or nil) required field is a [`MarshalError::MissingField`].
//! * Undeclared fields follow the [`UnknownFieldPolicy`]. Under `Reject`, a response that repeats
//!   the element of a declared field is a [`UnmarshalError::ShapeMismatch`]; under `Ignore` the
//!   first occurrence wins.
//! * A named record must be registered under its type name ([`MarshalError::UnregisteredType`]).
//!   Anonymous records take the shape expected at their position.
//! * Re-entering a [`SharedRecord`](crate::value::SharedRecord) on the current path is a
//!   [`MarshalError::CyclicValue`].
//!
//! ## Round trip
//!
//! `unmarshal(marshal(v, s), s) == v` holds for every value in canonical form: typed owned
//! records, `Float`s in float positions and `Nil` only where the shape allows it. Marshalling
//! also accepts three looser forms, which come back canonical:
//!
//! * an `Integer` in a float position returns as a `Float`;
//! * an anonymous record returns typed with the record name of its position;
//! * a `SharedRecord` returns as an owned `Record`.
mod scalar;

use crate::shape::{FieldShape, RecordShape, ScalarKind, Shape, ShapeArena, ShapeError, ShapeId};
use crate::value::{FromValue, Record, ToValue, Value};
use crate::wire::WireValue;

/// Nesting limit for both directions.
pub const MAX_DEPTH: usize = 64;

const ROOT: &str = "$";

/// What to do with fields that a value (or a response) carries but the shape does not declare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownFieldPolicy {
    /// Skip them silently.
    #[default]
    Ignore,
    /// Fail with an `UnknownField` error.
    Reject,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MarshalError {
    #[error("Record type '{type_name}' at '{path}' is not registered")]
    UnregisteredType { path: String, type_name: String },
    #[error("Missing required field '{field}' of record '{record}' at '{path}'")]
    MissingField {
        path: String,
        record: String,
        field: String,
    },
    #[error("Record '{type_name}' at '{path}' refers back to itself")]
    CyclicValue { path: String, type_name: String },
    #[error("Expected {expected} at '{path}', found {found}")]
    TypeMismatch {
        path: String,
        expected: String,
        found: String,
    },
    #[error("Field '{field}' is not declared by record '{record}' at '{path}'")]
    UnknownField {
        path: String,
        record: String,
        field: String,
    },
    #[error("Value nesting exceeds {MAX_DEPTH} levels at '{path}'")]
    DepthExceeded { path: String },
    #[error("Shape {shape:?} at '{path}' does not belong to this registry")]
    UnknownShape { path: String, shape: ShapeId },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UnmarshalError {
    #[error("Expected {expected} at '{path}', found {found}")]
    ShapeMismatch {
        path: String,
        expected: String,
        found: String,
    },
    #[error("Missing required field '{field}' of record '{record}' at '{path}'")]
    MissingField {
        path: String,
        record: String,
        field: String,
    },
    #[error("Field '{field}' is not declared by record '{record}' at '{path}'")]
    UnknownField {
        path: String,
        record: String,
        field: String,
    },
    #[error("Invalid {kind} literal '{text}' at '{path}'")]
    InvalidScalar {
        path: String,
        kind: ScalarKind,
        text: String,
    },
    #[error("Response nesting exceeds {MAX_DEPTH} levels at '{path}'")]
    DepthExceeded { path: String },
    #[error("Shape {shape:?} at '{path}' does not belong to this registry")]
    UnknownShape { path: String, shape: ShapeId },
}

/// A caller-defined structured type: a shape plus the conversion pair from [`ToValue`] and
/// [`FromValue`].
///
/// ```rust
/// use sopa_core::registry::RecordType;
/// use sopa_core::shape::{FieldShape, ScalarKind, ShapeArena};
/// use sopa_core::value::{FromValue, FromValueError, Record, ToValue, Value};
///
/// struct User {
///     user_id: String,
///     age: i64,
/// }
///
/// impl ToValue for User {
///     fn to_value(&self) -> Value {
///         Record::new(Self::TYPE_NAME)
///             .with("UserId", self.user_id.as_str())
///             .with("Age", self.age)
///             .into()
///     }
/// }
///
/// impl FromValue for User {
///     fn from_value(value: Value) -> Result<Self, FromValueError> {
///         let mut record = Record::from_value(value)?;
///         Ok(User {
///             user_id: record.take_as("UserId")?,
///             age: record.take_as("Age")?,
///         })
///     }
/// }
///
/// impl RecordType for User {
///     const TYPE_NAME: &'static str = "User";
///
///     fn fields(shapes: &mut ShapeArena) -> Vec<FieldShape> {
///         vec![
///             FieldShape::required("UserId", shapes.scalar(ScalarKind::String)),
///             FieldShape::required("Age", shapes.scalar(ScalarKind::Integer)),
///         ]
///     }
/// }
/// ```
pub trait RecordType: ToValue + FromValue {
    const TYPE_NAME: &'static str;

    /// Declared fields, in wire order. Nested record types can be referenced with
    /// [`ShapeArena::declare_record`] before (or after) they are registered.
    fn fields(shapes: &mut ShapeArena) -> Vec<FieldShape>;
}

/// The registration phase of a [`Registry`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    shapes: ShapeArena,
    policy: UnknownFieldPolicy,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shapes(&self) -> &ShapeArena {
        &self.shapes
    }

    pub fn shapes_mut(&mut self) -> &mut ShapeArena {
        &mut self.shapes
    }

    pub fn unknown_fields(mut self, policy: UnknownFieldPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn set_unknown_fields(&mut self, policy: UnknownFieldPolicy) {
        self.policy = policy;
    }

    /// Registers a record shape by name.
    pub fn record(&mut self, name: &str, fields: Vec<FieldShape>) -> Result<ShapeId, ShapeError> {
        self.shapes.record(name, fields)
    }

    /// Registers a caller-defined record type.
    pub fn register<T: RecordType>(&mut self) -> Result<ShapeId, ShapeError> {
        let id = self.shapes.declare_record(T::TYPE_NAME);
        let fields = T::fields(&mut self.shapes);
        self.shapes.define_record(id, fields)?;
        Ok(id)
    }

    /// Freezes the registry. Fails if a record was referenced but never defined.
    pub fn build(self) -> Result<Registry, ShapeError> {
        self.shapes.check_defined()?;
        Ok(Registry {
            shapes: self.shapes,
            policy: self.policy,
        })
    }
}

/// Immutable marshalling registry. Safe to share between threads.
#[derive(Debug)]
pub struct Registry {
    shapes: ShapeArena,
    policy: UnknownFieldPolicy,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn shapes(&self) -> &ShapeArena {
        &self.shapes
    }

    pub fn unknown_field_policy(&self) -> UnknownFieldPolicy {
        self.policy
    }

    /// Shape registered for a record type name.
    pub fn shape_of(&self, type_name: &str) -> Option<ShapeId> {
        self.shapes.record_by_name(type_name)
    }

    /// Converts a domain value into a wire tree following `shape`.
    pub fn marshal(&self, value: &Value, shape: ShapeId) -> Result<WireValue, MarshalError> {
        Marshaller {
            shapes: &self.shapes,
            policy: self.policy,
            visiting: Vec::new(),
        }
        .value(value, shape, ROOT, 0)
    }

    /// Converts a wire tree into a domain value, checking that it matches `shape`.
    pub fn unmarshal(&self, tree: &WireValue, shape: ShapeId) -> Result<Value, UnmarshalError> {
        Unmarshaller {
            shapes: &self.shapes,
            policy: self.policy,
        }
        .value(tree, shape, ROOT, 0)
    }

    /// [`Registry::unmarshal`] followed by a typed conversion.
    pub fn unmarshal_as<T: FromValue>(
        &self,
        tree: &WireValue,
        shape: ShapeId,
    ) -> Result<T, UnmarshalAsError> {
        let value = self.unmarshal(tree, shape)?;
        Ok(T::from_value(value)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UnmarshalAsError {
    #[error(transparent)]
    Unmarshal(#[from] UnmarshalError),
    #[error("Failed to convert the unmarshalled value: '{0}'")]
    Conversion(#[from] crate::value::FromValueError),
}

fn field_path(parent: &str, field: &str) -> String {
    format!("{parent}.{field}")
}

fn index_path(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}

struct Marshaller<'a> {
    shapes: &'a ShapeArena,
    policy: UnknownFieldPolicy,
    /// Identities of the shared records on the current path.
    visiting: Vec<usize>,
}

impl Marshaller<'_> {
    fn value(
        &mut self,
        value: &Value,
        shape: ShapeId,
        path: &str,
        depth: usize,
    ) -> Result<WireValue, MarshalError> {
        if depth > MAX_DEPTH {
            return Err(MarshalError::DepthExceeded {
                path: path.to_string(),
            });
        }

        let shapes = self.shapes;
        let Some(resolved) = shapes.get(shape) else {
            return Err(MarshalError::UnknownShape {
                path: path.to_string(),
                shape,
            });
        };

        if value.is_nil() {
            return Ok(WireValue::Nil);
        }

        match resolved {
            Shape::Scalar(kind) => scalar::encode(*kind, value)
                .map(WireValue::Scalar)
                .ok_or_else(|| self.mismatch(shape, value, path)),
            Shape::Sequence(element) => {
                let Value::List(items) = value else {
                    return Err(self.mismatch(shape, value, path));
                };
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.value(item, *element, &index_path(path, i), depth + 1))
                    .collect::<Result<Vec<_>, _>>()
                    .map(WireValue::Sequence)
            }
            Shape::Record(record_shape) => match value {
                Value::Record(record) => self.record(record, shape, record_shape, path, depth),
                Value::Shared(shared) => {
                    let identity = shared.identity();
                    if self.visiting.contains(&identity) {
                        return Err(MarshalError::CyclicValue {
                            path: path.to_string(),
                            type_name: record_shape.name().to_string(),
                        });
                    }

                    self.visiting.push(identity);
                    let result = self.record(&shared.read(), shape, record_shape, path, depth);
                    self.visiting.pop();
                    result
                }
                other => Err(self.mismatch(shape, other, path)),
            },
        }
    }

    fn record(
        &mut self,
        record: &Record,
        shape: ShapeId,
        record_shape: &RecordShape,
        path: &str,
        depth: usize,
    ) -> Result<WireValue, MarshalError> {
        if !record.is_anonymous() {
            match self.shapes.record_by_name(record.type_name()) {
                None => {
                    return Err(MarshalError::UnregisteredType {
                        path: path.to_string(),
                        type_name: record.type_name().to_string(),
                    });
                }
                Some(registered) if registered != shape => {
                    return Err(MarshalError::TypeMismatch {
                        path: path.to_string(),
                        expected: record_shape.name().to_string(),
                        found: record.type_name().to_string(),
                    });
                }
                Some(_) => {}
            }
        }

        if self.policy == UnknownFieldPolicy::Reject
            && let Some((name, _)) = record
                .fields()
                .find(|(name, _)| record_shape.field(name).is_none())
        {
            return Err(MarshalError::UnknownField {
                path: path.to_string(),
                record: record_shape.name().to_string(),
                field: name.to_string(),
            });
        }

        let mut fields = Vec::with_capacity(record_shape.fields().len());
        for field in record_shape.fields() {
            let wire = match record.get(&field.name) {
                Some(value) if !value.is_nil() => {
                    self.value(value, field.shape, &field_path(path, &field.name), depth + 1)?
                }
                _ if field.required => {
                    return Err(MarshalError::MissingField {
                        path: path.to_string(),
                        record: record_shape.name().to_string(),
                        field: field.name.clone(),
                    });
                }
                _ => WireValue::Nil,
            };
            fields.push((field.name.clone(), wire));
        }

        Ok(WireValue::Struct(fields))
    }

    fn mismatch(&self, shape: ShapeId, value: &Value, path: &str) -> MarshalError {
        MarshalError::TypeMismatch {
            path: path.to_string(),
            expected: self.shapes.type_name(shape),
            found: value.kind().to_string(),
        }
    }
}

struct Unmarshaller<'a> {
    shapes: &'a ShapeArena,
    policy: UnknownFieldPolicy,
}

impl Unmarshaller<'_> {
    fn value(
        &self,
        tree: &WireValue,
        shape: ShapeId,
        path: &str,
        depth: usize,
    ) -> Result<Value, UnmarshalError> {
        if depth > MAX_DEPTH {
            return Err(UnmarshalError::DepthExceeded {
                path: path.to_string(),
            });
        }

        let Some(resolved) = self.shapes.get(shape) else {
            return Err(UnmarshalError::UnknownShape {
                path: path.to_string(),
                shape,
            });
        };

        match (resolved, tree) {
            (_, WireValue::Nil) => Ok(Value::Nil),
            (Shape::Scalar(kind), WireValue::Scalar(text)) => {
                scalar::decode(*kind, text).ok_or_else(|| UnmarshalError::InvalidScalar {
                    path: path.to_string(),
                    kind: *kind,
                    text: text.clone(),
                })
            }
            (Shape::Sequence(element), WireValue::Sequence(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.value(item, *element, &index_path(path, i), depth + 1))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            // Peers that do not mark arrays send the items as plain child elements.
            (Shape::Sequence(element), WireValue::Struct(children)) => children
                .iter()
                .enumerate()
                .map(|(i, (_, item))| self.value(item, *element, &index_path(path, i), depth + 1))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            (Shape::Sequence(_), WireValue::Scalar(text)) if text.trim().is_empty() => {
                Ok(Value::List(Vec::new()))
            }
            (Shape::Record(record_shape), WireValue::Struct(children)) => {
                self.record(children, record_shape, path, depth)
            }
            // An element without children is an empty struct.
            (Shape::Record(record_shape), WireValue::Scalar(text)) if text.trim().is_empty() => {
                self.record(&[], record_shape, path, depth)
            }
            (_, other) => Err(UnmarshalError::ShapeMismatch {
                path: path.to_string(),
                expected: self.shapes.type_name(shape),
                found: other.kind().to_string(),
            }),
        }
    }

    fn record(
        &self,
        children: &[(String, WireValue)],
        record_shape: &RecordShape,
        path: &str,
        depth: usize,
    ) -> Result<Value, UnmarshalError> {
        if self.policy == UnknownFieldPolicy::Reject
            && let Some((name, _)) = children
                .iter()
                .find(|(name, _)| record_shape.field(name).is_none())
        {
            return Err(UnmarshalError::UnknownField {
                path: path.to_string(),
                record: record_shape.name().to_string(),
                field: name.clone(),
            });
        }

        let mut record = Record::new(record_shape.name());
        for field in record_shape.fields() {
            if self.policy == UnknownFieldPolicy::Reject {
                let occurrences = children.iter().filter(|(name, _)| *name == field.name).count();
                if occurrences > 1 {
                    return Err(UnmarshalError::ShapeMismatch {
                        path: field_path(path, &field.name),
                        expected: format!("a single {}", self.shapes.type_name(field.shape)),
                        found: format!("{occurrences} '{}' elements", field.name),
                    });
                }
            }

            let child = children
                .iter()
                .find(|(name, _)| *name == field.name)
                .map(|(_, tree)| tree);

            match child {
                Some(tree) if !tree.is_nil() => {
                    let value =
                        self.value(tree, field.shape, &field_path(path, &field.name), depth + 1)?;
                    record.set(field.name.clone(), value);
                }
                _ if field.required => {
                    return Err(UnmarshalError::MissingField {
                        path: path.to_string(),
                        record: record_shape.name().to_string(),
                        field: field.name.clone(),
                    });
                }
                _ => {}
            }
        }

        Ok(Value::Record(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::SharedRecord;

    fn user_registry(policy: UnknownFieldPolicy) -> (Registry, ShapeId) {
        let mut builder = Registry::builder().unknown_fields(policy);
        let shapes = builder.shapes_mut();
        let int = shapes.scalar(ScalarKind::Integer);
        let string = shapes.scalar(ScalarKind::String);
        let user = builder
            .record(
                "User",
                vec![
                    FieldShape::required("Age", int),
                    FieldShape::required("Name", string),
                    FieldShape::required("UserId", string),
                    FieldShape::optional("Email", string),
                ],
            )
            .unwrap();
        (builder.build().unwrap(), user)
    }

    fn john() -> Record {
        Record::new("User")
            .with("UserId", "john_doe")
            .with("Name", "John Doe")
            .with("Age", 25)
    }

    #[test]
    fn fields_follow_declared_order_and_absent_optional_is_nil() {
        let (registry, user) = user_registry(UnknownFieldPolicy::Ignore);

        let tree = registry.marshal(&john().into(), user).unwrap();

        assert_eq!(
            tree,
            WireValue::Struct(vec![
                ("Age".to_string(), WireValue::scalar("25")),
                ("Name".to_string(), WireValue::scalar("John Doe")),
                ("UserId".to_string(), WireValue::scalar("john_doe")),
                ("Email".to_string(), WireValue::Nil),
            ])
        );
    }

    #[test]
    fn empty_string_is_not_nil() {
        let (registry, user) = user_registry(UnknownFieldPolicy::Ignore);

        let tree = registry
            .marshal(&john().with("Email", "").into(), user)
            .unwrap();

        assert_eq!(tree.field("Email"), Some(&WireValue::scalar("")));
    }

    #[test]
    fn round_trip_preserves_value() {
        let (registry, user) = user_registry(UnknownFieldPolicy::Ignore);
        let value = Value::from(john().with("Email", "john@example.com"));

        let tree = registry.marshal(&value, user).unwrap();
        assert_eq!(registry.unmarshal(&tree, user).unwrap(), value);

        let value = Value::from(john());
        let tree = registry.marshal(&value, user).unwrap();
        assert_eq!(registry.unmarshal(&tree, user).unwrap(), value);
    }

    #[test]
    fn missing_required_field_is_reported() {
        let (registry, user) = user_registry(UnknownFieldPolicy::Ignore);
        let mut record = john();
        record.take("Name");

        assert_eq!(
            registry.marshal(&record.into(), user),
            Err(MarshalError::MissingField {
                path: "$".to_string(),
                record: "User".to_string(),
                field: "Name".to_string(),
            })
        );

        let nil_name = john().with("Name", Value::Nil);
        assert!(matches!(
            registry.marshal(&nil_name.into(), user),
            Err(MarshalError::MissingField { .. })
        ));
    }

    #[test]
    fn unknown_fields_follow_policy() {
        let extra = john().with("Nickname", "JD");

        let (lenient, user) = user_registry(UnknownFieldPolicy::Ignore);
        let tree = lenient.marshal(&extra.clone().into(), user).unwrap();
        assert_eq!(tree.field("Nickname"), None);

        let (strict, user) = user_registry(UnknownFieldPolicy::Reject);
        assert!(matches!(
            strict.marshal(&extra.into(), user),
            Err(MarshalError::UnknownField { field, .. }) if field == "Nickname"
        ));

        let mut response = lenient.marshal(&john().into(), user).unwrap();
        if let WireValue::Struct(children) = &mut response {
            children.push(("Extra".to_string(), WireValue::scalar("x")));
        }
        assert!(lenient.unmarshal(&response, user).is_ok());
        assert!(matches!(
            strict.unmarshal(&response, user),
            Err(UnmarshalError::UnknownField { .. })
        ));
    }

    #[test]
    fn repeated_field_elements_follow_policy() {
        let mut response = WireValue::Struct(vec![
            ("Age".to_string(), WireValue::scalar("25")),
            ("Name".to_string(), WireValue::scalar("John Doe")),
            ("UserId".to_string(), WireValue::scalar("john_doe")),
        ]);
        if let WireValue::Struct(children) = &mut response {
            children.push(("Name".to_string(), WireValue::scalar("Jane Doe")));
        }

        let (lenient, user) = user_registry(UnknownFieldPolicy::Ignore);
        assert_eq!(lenient.unmarshal(&response, user).unwrap(), Value::from(john()));

        let (strict, user) = user_registry(UnknownFieldPolicy::Reject);
        assert_eq!(
            strict.unmarshal(&response, user),
            Err(UnmarshalError::ShapeMismatch {
                path: "$.Name".to_string(),
                expected: "a single string".to_string(),
                found: "2 'Name' elements".to_string(),
            })
        );
    }

    #[test]
    fn marshalling_normalizes_accepted_variants() {
        let mut builder = Registry::builder();
        let float = builder.shapes_mut().scalar(ScalarKind::Float);
        let registry = builder.build().unwrap();

        let tree = registry.marshal(&Value::Integer(3), float).unwrap();
        assert_eq!(tree, WireValue::scalar("3"));
        assert_eq!(registry.unmarshal(&tree, float).unwrap(), Value::Float(3.0));

        let (registry, user) = user_registry(UnknownFieldPolicy::Ignore);
        let anonymous = Record::anonymous()
            .with("UserId", "john_doe")
            .with("Name", "John Doe")
            .with("Age", 25);
        let shared = SharedRecord::new(john());

        for value in [Value::from(anonymous), Value::from(shared)] {
            let tree = registry.marshal(&value, user).unwrap();
            assert_eq!(registry.unmarshal(&tree, user).unwrap(), Value::from(john()));
        }
    }

    #[test]
    fn unregistered_and_mismatched_types_are_rejected() {
        let (registry, user) = user_registry(UnknownFieldPolicy::Ignore);

        assert_eq!(
            registry.marshal(&Record::new("Admin").into(), user),
            Err(MarshalError::UnregisteredType {
                path: "$".to_string(),
                type_name: "Admin".to_string(),
            })
        );

        assert!(matches!(
            registry.marshal(&Value::from("john"), user),
            Err(MarshalError::TypeMismatch { .. })
        ));

        let anonymous = Record::anonymous()
            .with("UserId", "x")
            .with("Name", "X")
            .with("Age", 1);
        assert!(registry.marshal(&anonymous.into(), user).is_ok());
    }

    #[test]
    fn sequences_keep_order() {
        let mut builder = Registry::builder();
        let int = builder.shapes_mut().scalar(ScalarKind::Integer);
        let ints = builder.shapes_mut().sequence(int);
        let registry = builder.build().unwrap();

        let value = Value::List(vec![3.into(), 1.into(), 2.into()]);
        let tree = registry.marshal(&value, ints).unwrap();

        assert_eq!(
            tree,
            WireValue::Sequence(vec![
                WireValue::scalar("3"),
                WireValue::scalar("1"),
                WireValue::scalar("2"),
            ])
        );
        assert_eq!(registry.unmarshal(&tree, ints).unwrap(), value);
        assert_eq!(
            registry.unmarshal(&WireValue::scalar(""), ints).unwrap(),
            Value::List(vec![])
        );
    }

    fn node_registry() -> (Registry, ShapeId) {
        let mut builder = Registry::builder();
        let shapes = builder.shapes_mut();
        let string = shapes.scalar(ScalarKind::String);
        let node = shapes.declare_record("Node");
        let nodes = shapes.sequence(node);
        shapes
            .define_record(
                node,
                vec![
                    FieldShape::required("label", string),
                    FieldShape::optional("next", node),
                    FieldShape::optional("children", nodes),
                ],
            )
            .unwrap();
        (builder.build().unwrap(), node)
    }

    #[test]
    fn cyclic_shared_records_are_rejected() {
        let (registry, node) = node_registry();

        let a = SharedRecord::new(Record::new("Node").with("label", "a"));
        let b = SharedRecord::new(Record::new("Node").with("label", "b").with("next", a.clone()));
        a.write().set("next", b.clone());

        assert_eq!(
            registry.marshal(&a.clone().into(), node),
            Err(MarshalError::CyclicValue {
                path: "$.next.next".to_string(),
                type_name: "Node".to_string(),
            })
        );

        // Break the cycle so the test does not leak.
        a.write().take("next");
    }

    #[test]
    fn shared_records_without_cycles_are_fine() {
        let (registry, node) = node_registry();

        let leaf = SharedRecord::new(Record::new("Node").with("label", "leaf"));
        let root = Record::new("Node")
            .with("label", "root")
            .with("next", leaf.clone())
            .with("children", vec![Value::from(leaf.clone()), leaf.into()]);

        let tree = registry.marshal(&root.into(), node).unwrap();
        let value = registry.unmarshal(&tree, node).unwrap();

        let children = value.get("children").and_then(Value::as_list).unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[1].get("label"), Some(&Value::from("leaf")));
    }

    #[test]
    fn deep_owned_values_hit_the_depth_limit() {
        let (registry, node) = node_registry();

        let mut value = Record::new("Node").with("label", "0");
        for i in 1..=MAX_DEPTH + 1 {
            value = Record::new("Node").with("label", i.to_string()).with("next", value);
        }

        assert!(matches!(
            registry.marshal(&value.into(), node),
            Err(MarshalError::DepthExceeded { .. })
        ));
    }

    #[test]
    fn unmarshal_checks_shape() {
        let (registry, user) = user_registry(UnknownFieldPolicy::Ignore);

        assert!(matches!(
            registry.unmarshal(&WireValue::scalar("oops"), user),
            Err(UnmarshalError::ShapeMismatch { .. })
        ));

        let bad_age = WireValue::Struct(vec![
            ("Age".to_string(), WireValue::scalar("twenty")),
            ("Name".to_string(), WireValue::scalar("John")),
            ("UserId".to_string(), WireValue::scalar("john")),
        ]);
        assert_eq!(
            registry.unmarshal(&bad_age, user),
            Err(UnmarshalError::InvalidScalar {
                path: "$.Age".to_string(),
                kind: ScalarKind::Integer,
                text: "twenty".to_string(),
            })
        );

        let no_name = WireValue::Struct(vec![("Age".to_string(), WireValue::scalar("1"))]);
        assert!(matches!(
            registry.unmarshal(&no_name, user),
            Err(UnmarshalError::MissingField { field, .. }) if field == "Name"
        ));
    }

    #[test]
    fn undefined_records_fail_the_build() {
        let mut builder = Registry::builder();
        let ghost = builder.shapes_mut().declare_record("Ghost");
        builder
            .record("Holder", vec![FieldShape::optional("ghost", ghost)])
            .unwrap();

        assert_eq!(
            builder.build().unwrap_err(),
            ShapeError::UndefinedRecord("Ghost".to_string())
        );
    }
}
