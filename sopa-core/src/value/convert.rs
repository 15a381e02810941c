//! Conversions between Rust types and [`Value`].
//!
//! Caller-defined record types implement both traits; this pair is the conversion half of a
//! [`RecordType`](crate::registry::RecordType) registration.
use super::{Record, Value};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FromValueError {
    #[error("Expected {expected}, found {found}")]
    UnexpectedKind {
        expected: &'static str,
        found: &'static str,
    },
    #[error("Integer {0} does not fit the target type")]
    OutOfRange(i64),
    #[error("Record '{record}' is missing field '{field}'")]
    MissingField { record: String, field: String },
}

pub trait ToValue {
    fn to_value(&self) -> Value;
}

pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, FromValueError>;
}

fn unexpected(expected: &'static str, found: &Value) -> FromValueError {
    FromValueError::UnexpectedKind {
        expected,
        found: found.kind(),
    }
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, FromValueError> {
        Ok(value)
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Boolean(*self)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, FromValueError> {
        value.as_bool().ok_or_else(|| unexpected("boolean", &value))
    }
}

impl ToValue for i64 {
    fn to_value(&self) -> Value {
        Value::Integer(*self)
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self, FromValueError> {
        value.as_i64().ok_or_else(|| unexpected("integer", &value))
    }
}

impl ToValue for i32 {
    fn to_value(&self) -> Value {
        Value::Integer((*self).into())
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> Result<Self, FromValueError> {
        let wide = i64::from_value(value)?;
        i32::try_from(wide).map_err(|_| FromValueError::OutOfRange(wide))
    }
}

impl ToValue for u32 {
    fn to_value(&self) -> Value {
        Value::Integer((*self).into())
    }
}

impl FromValue for u32 {
    fn from_value(value: Value) -> Result<Self, FromValueError> {
        let wide = i64::from_value(value)?;
        u32::try_from(wide).map_err(|_| FromValueError::OutOfRange(wide))
    }
}

impl ToValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, FromValueError> {
        value.as_f64().ok_or_else(|| unexpected("float", &value))
    }
}

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::String(self.to_string())
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, FromValueError> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(unexpected("string", &other)),
        }
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Nil,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, FromValueError> {
        match value {
            Value::Nil => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(ToValue::to_value).collect())
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, FromValueError> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(unexpected("list", &other)),
        }
    }
}

impl ToValue for Record {
    fn to_value(&self) -> Value {
        Value::Record(self.clone())
    }
}

impl FromValue for Record {
    fn from_value(value: Value) -> Result<Self, FromValueError> {
        match value {
            Value::Record(record) => Ok(record),
            Value::Shared(shared) => Ok(shared.read().clone()),
            other => Err(unexpected("record", &other)),
        }
    }
}

impl Record {
    /// Removes field `name` and converts it. A missing field converts from `Nil`, so
    /// `Option<T>` targets accept it and everything else reports the field as missing.
    pub fn take_as<T: FromValue>(&mut self, name: &str) -> Result<T, FromValueError> {
        match self.take(name) {
            Some(value) => T::from_value(value),
            None => T::from_value(Value::Nil).map_err(|_| FromValueError::MissingField {
                record: self.type_name().to_string(),
                field: name.to_string(),
            }),
        }
    }
}
