//! Property-based tests for the marshal / envelope / unmarshal round trip.
//!
//! Shapes are generated as a [`Layout`] tree. Record names are assigned in pre-order
//! (`Rec0`, `Rec1`, ...) both when the registry is built and when values are generated, so the
//! two always agree.
use proptest::prelude::*;
use sopa_core::binding::WireOperation;
use sopa_core::envelope::{self, Response};
use sopa_core::registry::Registry;
use sopa_core::shape::{FieldShape, ScalarKind, ShapeArena, ShapeId};
use sopa_core::value::{Record, Value};

#[derive(Debug, Clone)]
enum Layout {
    Integer,
    Float,
    Boolean,
    Text,
    List(Box<Layout>),
    /// `(required, layout)` per field.
    Fields(Vec<(bool, Layout)>),
}

fn layout() -> impl Strategy<Value = Layout> {
    let leaf = prop_oneof![
        Just(Layout::Integer),
        Just(Layout::Float),
        Just(Layout::Boolean),
        Just(Layout::Text),
    ];

    leaf.prop_recursive(4, 24, 4, |inner| {
        prop_oneof![
            inner.clone().prop_map(|l| Layout::List(Box::new(l))),
            prop::collection::vec((any::<bool>(), inner), 1..4).prop_map(Layout::Fields),
        ]
    })
}

fn field_name(index: usize) -> String {
    format!("f{index}")
}

fn build_shape(layout: &Layout, shapes: &mut ShapeArena, records: &mut usize) -> ShapeId {
    match layout {
        Layout::Integer => shapes.scalar(ScalarKind::Integer),
        Layout::Float => shapes.scalar(ScalarKind::Float),
        Layout::Boolean => shapes.scalar(ScalarKind::Boolean),
        Layout::Text => shapes.scalar(ScalarKind::String),
        Layout::List(element) => {
            let element = build_shape(element, shapes, records);
            shapes.sequence(element)
        }
        Layout::Fields(fields) => {
            let id = shapes.declare_record(&format!("Rec{records}"));
            *records += 1;

            let fields = fields
                .iter()
                .enumerate()
                .map(|(i, (required, layout))| {
                    let shape = build_shape(layout, shapes, records);
                    if *required {
                        FieldShape::required(field_name(i), shape)
                    } else {
                        FieldShape::optional(field_name(i), shape)
                    }
                })
                .collect();

            shapes.define_record(id, fields).unwrap();
            id
        }
    }
}

/// Canonical values: typed owned records, floats in float positions, optional fields absent
/// rather than nil.
fn value_for(layout: &Layout, records: &mut usize) -> BoxedStrategy<Value> {
    match layout {
        Layout::Integer => any::<i64>().prop_map(Value::Integer).boxed(),
        Layout::Float => (prop::num::f64::NORMAL | prop::num::f64::ZERO)
            .prop_map(Value::Float)
            .boxed(),
        Layout::Boolean => any::<bool>().prop_map(Value::Boolean).boxed(),
        Layout::Text => "[a-zA-Z0-9 <>&'\"é_-]{0,12}".prop_map(Value::String).boxed(),
        Layout::List(element) => prop::collection::vec(value_for(element, records), 0..4)
            .prop_map(Value::List)
            .boxed(),
        Layout::Fields(fields) => {
            let type_name = format!("Rec{records}");
            *records += 1;

            let fields: Vec<BoxedStrategy<Option<Value>>> = fields
                .iter()
                .map(|(required, layout)| {
                    let value = value_for(layout, records);
                    if *required {
                        value.prop_map(Some).boxed()
                    } else {
                        prop::option::of(value).boxed()
                    }
                })
                .collect();

            fields
                .prop_map(move |values| {
                    let mut record = Record::new(type_name.clone());
                    for (i, value) in values.into_iter().enumerate() {
                        if let Some(value) = value {
                            record.set(field_name(i), value);
                        }
                    }
                    Value::Record(record)
                })
                .boxed()
        }
    }
}

fn case() -> impl Strategy<Value = (Layout, Value)> {
    layout().prop_flat_map(|layout| {
        let value = value_for(&layout, &mut 0);
        (Just(layout), value)
    })
}

fn registry_for(layout: &Layout) -> (Registry, ShapeId) {
    let mut builder = Registry::builder();
    let shape = build_shape(layout, builder.shapes_mut(), &mut 0);
    (builder.build().unwrap(), shape)
}

proptest! {
    /// Any canonical value survives marshal, the response envelope and unmarshal unchanged.
    #[test]
    fn canonical_values_survive_the_round_trip((layout, value) in case()) {
        let (registry, shape) = registry_for(&layout);

        let tree = registry.marshal(&value, shape).unwrap();
        let bytes = envelope::build_response(&WireOperation::new("urn:round-trip", "Echo"), &tree)
            .unwrap();

        let parsed = match envelope::parse_response(&bytes).unwrap() {
            Response::Payload(parsed) => parsed,
            Response::Fault(fault) => panic!("Expected a payload, got fault {fault}"),
        };
        prop_assert_eq!(&parsed, &tree);

        let back = registry.unmarshal(&parsed, shape).unwrap();
        prop_assert_eq!(back, value);
    }
}
