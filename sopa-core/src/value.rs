//! # Domain Values
//!
//! [`Value`] is the in-memory representation callers pass to, and receive from, the proxy.
//!
//! Records come in two flavours:
//!
//! * [`Record`]: an owned, tree-shaped record. This is what unmarshalling produces.
//! * [`SharedRecord`]: a reference-counted record with interior mutability. It is the only way
//!   to build graph-shaped values (the same record reachable twice, or a record reaching itself),
//!   and its pointer identity is what marshalling uses to detect cycles.
//!
//! A record is tagged with the name of its registered type. An empty type name marks an
//! anonymous record, which takes the shape expected at the position it is marshalled into.
mod convert;
pub mod json;

pub use convert::{FromValue, FromValueError, ToValue};

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// Absent value. Marshals to an explicit nil marker.
    #[default]
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Record(Record),
    Shared(SharedRecord),
}

impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Short description of the variant, used in mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Record(_) | Value::Shared(_) => "record",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Reads field `name` of an owned record. Shared records must be read through their guard.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.as_record().and_then(|r| r.get(name))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value.into())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Integer(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Value::Record(value)
    }
}

impl From<SharedRecord> for Value {
    fn from(value: SharedRecord) -> Self {
        Value::Shared(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Nil)
    }
}

/// A structured record: a type name plus named fields.
///
/// Field order is whatever order the caller used; marshalling always re-orders to the
/// declared order of the shape. Equality ignores order and treats `Nil` fields as absent.
#[derive(Debug, Clone, Default)]
pub struct Record {
    type_name: String,
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    /// A record without a type name. It adopts the shape expected where it is marshalled.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn is_anonymous(&self) -> bool {
        self.type_name.is_empty()
    }

    /// Builder style [`Record::set`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Sets a field, replacing any previous value under the same name.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Removes and returns a field.
    pub fn take(&mut self, name: &str) -> Option<Value> {
        let index = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(index).1)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn present_fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields().filter(|(_, v)| !v.is_nil())
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name
            && self.present_fields().count() == other.present_fields().count()
            && self
                .present_fields()
                .all(|(name, value)| other.get(name) == Some(value))
    }
}

/// A record shared by reference. Cloning clones the handle, not the record.
#[derive(Clone)]
pub struct SharedRecord(Arc<RwLock<Record>>);

impl SharedRecord {
    pub fn new(record: Record) -> Self {
        Self(Arc::new(RwLock::new(record)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Record> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Record> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Identity of the record instance, stable for as long as any handle is alive.
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for SharedRecord {
    /// Same instance, or equal contents. Comparing two distinct cyclic graphs does not terminate.
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.read() == *other.read()
    }
}

impl fmt::Debug for SharedRecord {
    // Contents are not printed: the record may reach itself.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let type_name = self
            .0
            .try_read()
            .map(|r| r.type_name.clone())
            .unwrap_or_else(|_| "<locked>".to_string());
        write!(f, "SharedRecord({type_name} @ {:#x})", self.identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_equality_ignores_order_and_nil_fields() {
        let a = Record::new("User")
            .with("Name", "John Doe")
            .with("Age", 25)
            .with("Email", Value::Nil);
        let b = Record::new("User").with("Age", 25).with("Name", "John Doe");

        assert_eq!(a, b);
        assert_ne!(a, Record::new("Admin").with("Age", 25).with("Name", "John Doe"));
        assert_ne!(a, b.clone().with("Name", ""));
    }

    #[test]
    fn set_replaces_existing_field() {
        let mut record = Record::new("User").with("Name", "a");
        record.set("Name", "b");
        assert_eq!(record.len(), 1);
        assert_eq!(record.get("Name"), Some(&Value::from("b")));
        assert_eq!(record.take("Name"), Some(Value::from("b")));
        assert!(record.is_empty());
    }

    #[test]
    fn shared_records_compare_by_identity_first() {
        let shared = SharedRecord::new(Record::new("Node").with("label", "a"));
        let same = shared.clone();
        let copy = SharedRecord::new(Record::new("Node").with("label", "a"));

        assert!(shared.ptr_eq(&same));
        assert_eq!(shared.identity(), same.identity());
        assert_ne!(shared.identity(), copy.identity());
        assert_eq!(shared, copy);

        // Debug never walks into the record, so a self reference is harmless.
        shared.write().set("next", same);
        assert!(format!("{shared:?}").starts_with("SharedRecord(Node @ "));
    }
}
