//! JSON bridge for [`Value`], used to take arguments from and print results to the command line.
//!
//! Objects become anonymous records, so they take the shape of whatever position they are
//! bound to. Numbers with an exact `i64` representation become integers.
use super::{Record, Value};

/// Converts a JSON document into a domain value.
pub fn from_json(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Nil,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => Value::List(items.into_iter().map(from_json).collect()),
        serde_json::Value::Object(map) => {
            let mut record = Record::anonymous();
            for (name, value) in map {
                record.set(name, from_json(value));
            }
            Value::Record(record)
        }
    }
}

/// Converts a domain value into JSON. Non-finite floats become `null`; a shared record
/// already being converted further up the same branch becomes `null` as well.
pub fn to_json(value: &Value) -> serde_json::Value {
    to_json_guarded(value, &mut Vec::new())
}

fn to_json_guarded(value: &Value, path: &mut Vec<usize>) -> serde_json::Value {
    match value {
        Value::Nil => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Integer(i) => serde_json::Value::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::List(items) => serde_json::Value::Array(
            items.iter().map(|v| to_json_guarded(v, path)).collect(),
        ),
        Value::Record(record) => record_to_json(record, path),
        Value::Shared(shared) => {
            let identity = shared.identity();
            if path.contains(&identity) {
                return serde_json::Value::Null;
            }
            path.push(identity);
            let json = record_to_json(&shared.read(), path);
            path.pop();
            json
        }
    }
}

fn record_to_json(record: &Record, path: &mut Vec<usize>) -> serde_json::Value {
    let map = record
        .fields()
        .map(|(name, value)| (name.to_string(), to_json_guarded(value, path)))
        .collect();
    serde_json::Value::Object(map)
}
