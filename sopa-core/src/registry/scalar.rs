//! Per-kind conversion rules between scalar [`Value`]s and their textual wire form.
//!
//! * Integers: base-10, optional leading `-`.
//! * Floats: shortest decimal text that parses back to the same `f64`, never exponent
//!   notation; `INF`, `-INF` and `NaN` for the non-finite values.
//! * Booleans: `true` / `false` on output; `1` / `0` are accepted on input.
//! * Strings: verbatim. Escaping for markup is done by the envelope codec.
use crate::shape::ScalarKind;
use crate::value::Value;

/// Encodes `value` as `kind`. Returns `None` when the value cannot represent that kind.
pub(crate) fn encode(kind: ScalarKind, value: &Value) -> Option<String> {
    match (kind, value) {
        (ScalarKind::Integer, Value::Integer(i)) => Some(i.to_string()),
        (ScalarKind::Float, Value::Float(f)) => Some(format_float(*f)),
        (ScalarKind::Float, Value::Integer(i)) => Some(format_float(*i as f64)),
        (ScalarKind::Boolean, Value::Boolean(b)) => Some(b.to_string()),
        (ScalarKind::String, Value::String(s)) => Some(s.clone()),
        _ => None,
    }
}

/// Decodes wire text as `kind`. Returns `None` when the text is not a valid literal.
pub(crate) fn decode(kind: ScalarKind, text: &str) -> Option<Value> {
    match kind {
        ScalarKind::Integer => text.trim().parse().ok().map(Value::Integer),
        ScalarKind::Float => parse_float(text.trim()).map(Value::Float),
        ScalarKind::Boolean => match text.trim() {
            "true" | "1" => Some(Value::Boolean(true)),
            "false" | "0" => Some(Value::Boolean(false)),
            _ => None,
        },
        ScalarKind::String => Some(Value::String(text.to_string())),
    }
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f == f64::INFINITY {
        "INF".to_string()
    } else if f == f64::NEG_INFINITY {
        "-INF".to_string()
    } else {
        f.to_string()
    }
}

fn parse_float(text: &str) -> Option<f64> {
    match text {
        "INF" | "+INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        _ => text.parse().ok(),
    }
}
