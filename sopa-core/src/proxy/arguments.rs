//! Maps positional and keyword arguments onto an operation's input shape.
use crate::binding::BindingEntry;
use crate::shape::{RecordShape, Shape, ShapeArena};
use crate::value::{Record, Value};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("Operation '{operation}' takes {expected} positional argument(s), {given} given")]
    Arity {
        operation: String,
        expected: usize,
        given: usize,
    },
    #[error("Operation '{operation}' has no parameter named '{name}'")]
    UnknownKeyword { operation: String, name: String },
    #[error("Parameter '{name}' of operation '{operation}' is bound more than once")]
    DuplicateArgument { operation: String, name: String },
}

/// Builder for the arguments of a call.
///
/// ```rust
/// use sopa_core::proxy::Args;
///
/// let args = Args::new().arg("john_doe").kwarg("verbose", true);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    positional: Vec<Value>,
    keyword: Vec<(String, Value)>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Appends a keyword argument.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.push((name.into(), value.into()));
        self
    }

    pub fn into_parts(self) -> (Vec<Value>, Vec<(String, Value)>) {
        (self.positional, self.keyword)
    }
}

/// Builds the domain value matching `entry`'s input shape.
///
/// For record inputs, positionals bind to fields in declared order and keywords bind by field
/// name. Unbound fields are left out; marshalling decides whether that is allowed. Other
/// inputs take exactly one positional argument.
pub(crate) fn bind(
    shapes: &ShapeArena,
    entry: &BindingEntry,
    mut positional: Vec<Value>,
    keyword: Vec<(String, Value)>,
) -> Result<Value, ArgumentError> {
    let Some(Shape::Record(record)) = shapes.get(entry.input) else {
        if let Some((name, _)) = keyword.into_iter().next() {
            return Err(ArgumentError::UnknownKeyword {
                operation: entry.name.clone(),
                name,
            });
        }
        if positional.len() != 1 {
            return Err(ArgumentError::Arity {
                operation: entry.name.clone(),
                expected: 1,
                given: positional.len(),
            });
        }
        return Ok(positional.remove(0));
    };

    if positional.len() == 1 && keyword.is_empty() && is_whole_input(shapes, record, &positional[0])
    {
        return Ok(positional.remove(0));
    }

    let fields = record.fields();
    if positional.len() > fields.len() {
        return Err(ArgumentError::Arity {
            operation: entry.name.clone(),
            expected: fields.len(),
            given: positional.len(),
        });
    }

    let mut value = Record::new(record.name());
    for (field, argument) in fields.iter().zip(positional) {
        value.set(field.name.as_str(), argument);
    }

    for (name, argument) in keyword {
        if record.field(&name).is_none() {
            return Err(ArgumentError::UnknownKeyword {
                operation: entry.name.clone(),
                name,
            });
        }
        if value.get(&name).is_some() {
            return Err(ArgumentError::DuplicateArgument {
                operation: entry.name.clone(),
                name,
            });
        }
        value.set(name, argument);
    }

    Ok(value.into())
}

/// A lone record argument is the whole input when it is typed as the input record, or when it
/// is anonymous and the first parameter does not itself expect a record.
fn is_whole_input(shapes: &ShapeArena, input: &RecordShape, argument: &Value) -> bool {
    let type_name = match argument {
        Value::Record(record) => record.type_name().to_string(),
        Value::Shared(shared) => shared.read().type_name().to_string(),
        _ => return false,
    };

    if type_name == input.name() {
        return true;
    }

    type_name.is_empty()
        && input
            .fields()
            .first()
            .is_none_or(|first| shapes.as_record(first.shape).is_none())
}
