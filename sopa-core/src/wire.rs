//! # Wire Value Tree
//!
//! The neutral intermediate representation between domain [`Value`](crate::value::Value)s
//! and envelope bytes. Marshalling produces it, the [`envelope`](crate::envelope) codec
//! serializes it, and parsing a response yields it again.
//!
//! A tree has no identity beyond its position: there are no references, only nesting.

/// A node of the wire tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireValue {
    /// Explicit "no value" marker. Encoded as `xsi:nil="true"` and never omitted.
    Nil,
    /// A scalar leaf holding its canonical textual encoding.
    Scalar(String),
    Sequence(Vec<WireValue>),
    /// Named children in wire order.
    Struct(Vec<(String, WireValue)>),
}

impl WireValue {
    pub fn scalar(text: impl Into<String>) -> Self {
        WireValue::Scalar(text.into())
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, WireValue::Nil)
    }

    /// Looks up the first child called `name` of a struct node.
    pub fn field(&self, name: &str) -> Option<&WireValue> {
        match self {
            WireValue::Struct(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Short description of the node kind, used in mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            WireValue::Nil => "nil",
            WireValue::Scalar(_) => "scalar",
            WireValue::Sequence(_) => "sequence",
            WireValue::Struct(_) => "struct",
        }
    }
}
