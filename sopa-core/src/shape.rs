//! # Shape Descriptors
//!
//! Shapes describe the structure of a value for marshalling purposes. They live in a
//! [`ShapeArena`] and refer to each other through [`ShapeId`] indices, so a record may
//! reference itself (directly or through other records) without creating an ownership cycle.
//!
//! Records are created in two steps: [`ShapeArena::declare_record`] reserves an id for a name,
//! and [`ShapeArena::define_record`] fills in the fields later. Any field may point to a record
//! that has only been declared so far.
use std::collections::HashMap;
use std::fmt;

/// Index of a [`Shape`] inside its [`ShapeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId(usize);

/// The scalar kinds understood by the default conversion rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Integer,
    Float,
    Boolean,
    String,
}

impl ScalarKind {
    /// Schema name of the kind (e.g. `int`), as used in descriptions and `xsi:type` hints.
    pub fn name(&self) -> &'static str {
        match self {
            ScalarKind::Integer => "int",
            ScalarKind::Float => "double",
            ScalarKind::Boolean => "boolean",
            ScalarKind::String => "string",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Scalar(ScalarKind),
    /// Ordered sequence of elements of the given shape.
    Sequence(ShapeId),
    Record(RecordShape),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordShape {
    name: String,
    fields: Vec<FieldShape>,
    defined: bool,
}

impl RecordShape {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order. This is the order used on the wire.
    pub fn fields(&self) -> &[FieldShape] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldShape> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldShape {
    pub name: String,
    pub shape: ShapeId,
    pub required: bool,
}

impl FieldShape {
    pub fn required(name: impl Into<String>, shape: ShapeId) -> Self {
        Self {
            name: name.into(),
            shape,
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, shape: ShapeId) -> Self {
        Self {
            name: name.into(),
            shape,
            required: false,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ShapeError {
    #[error("Record '{0}' is already defined")]
    RecordRedefined(String),
    #[error("Shape {0:?} is not a record")]
    NotARecord(ShapeId),
    #[error("Record '{0}' was declared but never defined")]
    UndefinedRecord(String),
    #[error("Record '{record}' declares field '{field}' more than once")]
    DuplicateField { record: String, field: String },
}

/// Owns every shape of a service and hands out [`ShapeId`]s to them.
///
/// Scalar and sequence shapes are interned, so asking twice for `int[]` yields the same id.
#[derive(Debug, Clone, Default)]
pub struct ShapeArena {
    shapes: Vec<Shape>,
    records: HashMap<String, ShapeId>,
    scalars: HashMap<ScalarKind, ShapeId>,
    sequences: HashMap<ShapeId, ShapeId>,
}

impl ShapeArena {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, shape: Shape) -> ShapeId {
        let id = ShapeId(self.shapes.len());
        self.shapes.push(shape);
        id
    }

    pub fn scalar(&mut self, kind: ScalarKind) -> ShapeId {
        if let Some(id) = self.scalars.get(&kind) {
            return *id;
        }
        let id = self.push(Shape::Scalar(kind));
        self.scalars.insert(kind, id);
        id
    }

    pub fn sequence(&mut self, element: ShapeId) -> ShapeId {
        if let Some(id) = self.sequences.get(&element) {
            return *id;
        }
        let id = self.push(Shape::Sequence(element));
        self.sequences.insert(element, id);
        id
    }

    /// Reserves an id for the record `name`, or returns the existing one.
    pub fn declare_record(&mut self, name: &str) -> ShapeId {
        if let Some(id) = self.records.get(name) {
            return *id;
        }
        let id = self.push(Shape::Record(RecordShape {
            name: name.to_string(),
            fields: Vec::new(),
            defined: false,
        }));
        self.records.insert(name.to_string(), id);
        id
    }

    /// Sets the fields of a previously declared record.
    pub fn define_record(&mut self, id: ShapeId, fields: Vec<FieldShape>) -> Result<(), ShapeError> {
        let Some(Shape::Record(record)) = self.shapes.get_mut(id.0) else {
            return Err(ShapeError::NotARecord(id));
        };

        if record.defined {
            return Err(ShapeError::RecordRedefined(record.name.clone()));
        }

        for (i, field) in fields.iter().enumerate() {
            if fields[..i].iter().any(|f| f.name == field.name) {
                return Err(ShapeError::DuplicateField {
                    record: record.name.clone(),
                    field: field.name.clone(),
                });
            }
        }

        record.fields = fields;
        record.defined = true;
        Ok(())
    }

    /// Declares and defines a record in one step.
    pub fn record(&mut self, name: &str, fields: Vec<FieldShape>) -> Result<ShapeId, ShapeError> {
        let id = self.declare_record(name);
        self.define_record(id, fields)?;
        Ok(id)
    }

    pub fn record_by_name(&self, name: &str) -> Option<ShapeId> {
        self.records.get(name).copied()
    }

    pub fn get(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.get(id.0)
    }

    /// Returns the record shape behind `id`, if it is one.
    pub fn as_record(&self, id: ShapeId) -> Option<&RecordShape> {
        match self.get(id) {
            Some(Shape::Record(record)) => Some(record),
            _ => None,
        }
    }

    /// Fails if any declared record has not been defined yet.
    pub fn check_defined(&self) -> Result<(), ShapeError> {
        let mut undefined: Vec<_> = self
            .shapes
            .iter()
            .filter_map(|s| match s {
                Shape::Record(r) if !r.defined => Some(r.name.clone()),
                _ => None,
            })
            .collect();
        undefined.sort();

        match undefined.into_iter().next() {
            Some(name) => Err(ShapeError::UndefinedRecord(name)),
            None => Ok(()),
        }
    }

    /// Human readable type name: `string`, `User`, `User[]`.
    pub fn type_name(&self, id: ShapeId) -> String {
        match self.get(id) {
            Some(Shape::Scalar(kind)) => kind.name().to_string(),
            Some(Shape::Sequence(element)) => format!("{}[]", self.type_name(*element)),
            Some(Shape::Record(record)) => record.name.clone(),
            None => format!("<unknown #{}>", id.0),
        }
    }
}
