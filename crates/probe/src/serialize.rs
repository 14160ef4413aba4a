// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Depth-bounded, cycle-safe conversion of introspectable values to JSON.
//!
//! Never fails and never recurses unboundedly: past [`MAX_SERIALIZATION_DEPTH`]
//! a subtree collapses to the depth sentinel, an object already on the current
//! recursion stack collapses to the cycle sentinel, and a field whose
//! introspection failed collapses to an error sentinel for that field alone.

use crate::inspect::{Inspect, Shape, Slot};
use serde_json::{Map, Number, Value};

/// Maximum nesting depth from the serialization root.
pub const MAX_SERIALIZATION_DEPTH: usize = 5;

pub const MAX_DEPTH_SENTINEL: &str = "[MAX_DEPTH_REACHED]";
pub const CYCLE_SENTINEL: &str = "[CYCLE_DETECTED]";

/// Reduced/cached numeric type whose raw fields misrepresent the logical
/// value; serialized through its logical parts instead.
pub const FRACTION_CLASS_NAME: &str = "org.apache.commons.math.fraction.Fraction";

/// Convert a value to a JSON-safe representation.
///
/// `allowed` is the dotted-path allow-list for this value's alias, if any; an
/// empty or absent list means no restriction. Matching is by path prefix in
/// both directions: allowing `profile.email` permits recursing through
/// `profile` to reach `email`, without admitting the rest of `profile`.
pub fn serialize(value: &dyn Inspect, allowed: Option<&[String]>) -> Value {
    let allowed = allowed.filter(|paths| !paths.is_empty());
    let mut visiting = Vec::new();
    sanitize(value, allowed, "", 0, &mut visiting)
}

/// Identity of one composite currently being serialized. The class name
/// disambiguates a struct from a first field sharing its address.
type VisitKey = (usize, String);

fn sanitize(
    value: &dyn Inspect,
    allowed: Option<&[String]>,
    path: &str,
    depth: usize,
    visiting: &mut Vec<VisitKey>,
) -> Value {
    let mut out = Value::Null;
    value.inspect(&mut |shape| {
        out = match shape {
            Shape::Null => Value::Null,
            _ if depth >= MAX_SERIALIZATION_DEPTH => Value::String(MAX_DEPTH_SENTINEL.into()),
            Shape::Bool(b) => Value::Bool(b),
            Shape::Int(i) => Value::from(i),
            Shape::UInt(u) => Value::from(u),
            Shape::Float(f) => float_value(f),
            Shape::Char(c) => Value::String(c.to_string()),
            Shape::Str(s) => Value::String(s.to_owned()),
            Shape::EnumVariant(name) => Value::String(name.to_owned()),
            Shape::Seq(items) => {
                with_visit_guard(value, visiting, |visiting| {
                    Value::Array(
                        items
                            .iter()
                            .map(|slot| slot_value(slot, allowed, path, depth + 1, visiting))
                            .collect(),
                    )
                })
            }
            Shape::Map(entries) => {
                with_visit_guard(value, visiting, |visiting| {
                    let mut map = Map::new();
                    for (key, slot) in &entries {
                        map.insert(
                            key.clone(),
                            slot_value(slot, allowed, path, depth + 1, visiting),
                        );
                    }
                    Value::Object(map)
                })
            }
            Shape::Object(fields) => {
                with_visit_guard(value, visiting, |visiting| {
                    if value.class_name() == FRACTION_CLASS_NAME {
                        fraction_value(&fields, depth, visiting)
                    } else {
                        object_value(value, &fields, allowed, path, depth, visiting)
                    }
                })
            }
        };
    });
    out
}

/// Pushes the value's identity for the duration of `f`, or yields the cycle
/// sentinel if it is already on the recursion stack. Identity, not equality:
/// two distinct but equal objects are not a cycle.
fn with_visit_guard(
    value: &dyn Inspect,
    visiting: &mut Vec<VisitKey>,
    f: impl FnOnce(&mut Vec<VisitKey>) -> Value,
) -> Value {
    let key = (value.identity(), value.class_name().to_owned());
    if visiting.contains(&key) {
        return Value::String(CYCLE_SENTINEL.into());
    }
    visiting.push(key);
    let result = f(visiting);
    visiting.pop();
    result
}

fn slot_value(
    slot: &Slot<'_>,
    allowed: Option<&[String]>,
    path: &str,
    depth: usize,
    visiting: &mut Vec<VisitKey>,
) -> Value {
    match slot {
        Slot::Value(v) => sanitize(*v, allowed, path, depth, visiting),
        Slot::Error(msg) => Value::String(format!("[SERIALIZATION_ERROR: {msg}]")),
    }
}

fn object_value(
    value: &dyn Inspect,
    fields: &[(&str, Slot<'_>)],
    allowed: Option<&[String]>,
    path: &str,
    depth: usize,
    visiting: &mut Vec<VisitKey>,
) -> Value {
    let mut map = Map::new();
    let mut included = 0usize;
    for (name, slot) in fields {
        let field_path = if path.is_empty() {
            (*name).to_owned()
        } else {
            format!("{path}.{name}")
        };
        if !path_allowed(allowed, &field_path) {
            continue;
        }
        included += 1;
        map.insert(
            (*name).to_owned(),
            slot_value(slot, allowed, &field_path, depth + 1, visiting),
        );
    }
    // An all-filtered object collapses to {} with no discriminator; it carries
    // nothing of interest and the _type would just clutter the trace.
    if allowed.is_none() || included > 0 {
        map.insert("_type".to_owned(), Value::String(value.class_name().to_owned()));
    }
    Value::Object(map)
}

fn fraction_value(
    fields: &[(&str, Slot<'_>)],
    depth: usize,
    visiting: &mut Vec<VisitKey>,
) -> Value {
    let mut numerator = Value::Null;
    let mut denominator = Value::Null;
    for (name, slot) in fields {
        match *name {
            "numerator" => numerator = slot_value(slot, None, "", depth + 1, visiting),
            "denominator" => denominator = slot_value(slot, None, "", depth + 1, visiting),
            _ => {}
        }
    }
    let double_value = match (numerator.as_f64(), denominator.as_f64()) {
        (Some(n), Some(d)) if d != 0.0 => float_value(n / d),
        _ => Value::Null,
    };
    let mut map = Map::new();
    map.insert("type".to_owned(), Value::String("Fraction".to_owned()));
    map.insert("numerator".to_owned(), numerator);
    map.insert("denominator".to_owned(), denominator);
    map.insert("doubleValue".to_owned(), double_value);
    Value::Object(map)
}

/// JSON has no NaN/Infinity; they become the literal strings the consumers
/// expect.
fn float_value(f: f64) -> Value {
    if f.is_nan() {
        Value::String("NaN".to_owned())
    } else if f.is_infinite() {
        Value::String(if f > 0.0 { "Infinity" } else { "-Infinity" }.to_owned())
    } else {
        Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
    }
}

fn path_allowed(allowed: Option<&[String]>, candidate: &str) -> bool {
    let Some(paths) = allowed else {
        return true;
    };
    paths.iter().any(|p| {
        p == candidate
            || p.strip_prefix(candidate)
                .is_some_and(|rest| rest.starts_with('.'))
            || candidate
                .strip_prefix(p.as_str())
                .is_some_and(|rest| rest.starts_with('.'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Node {
        label: String,
        next: RefCell<Option<Rc<Node>>>,
    }

    impl Inspect for Node {
        fn class_name(&self) -> &'static str {
            "Node"
        }
        fn identity(&self) -> usize {
            (self as *const Node).addr()
        }
        fn inspect(&self, probe: &mut dyn FnMut(Shape<'_>)) {
            probe(Shape::Object(vec![
                ("label", Slot::Value(&self.label)),
                ("next", Slot::Value(&self.next)),
            ]));
        }
    }

    struct Chain {
        depth: u32,
        inner: Option<Box<Chain>>,
    }

    impl Chain {
        fn of_depth(n: u32) -> Chain {
            let mut chain = Chain {
                depth: n,
                inner: None,
            };
            for d in (0..n).rev() {
                chain = Chain {
                    depth: d,
                    inner: Some(Box::new(chain)),
                };
            }
            chain
        }
    }

    impl Inspect for Chain {
        fn class_name(&self) -> &'static str {
            "Chain"
        }
        fn identity(&self) -> usize {
            (self as *const Chain).addr()
        }
        fn inspect(&self, probe: &mut dyn FnMut(Shape<'_>)) {
            probe(Shape::Object(vec![
                ("depth", Slot::Value(&self.depth)),
                ("inner", Slot::Value(&self.inner)),
            ]));
        }
    }

    #[test]
    fn scalars_serialize_directly() {
        assert_eq!(serialize(&42i32, None), json!(42));
        assert_eq!(serialize(&true, None), json!(true));
        assert_eq!(serialize(&"hello", None), json!("hello"));
        assert_eq!(serialize(&1.5f64, None), json!(1.5));
    }

    #[test]
    fn non_finite_floats_become_strings() {
        assert_eq!(serialize(&f64::NAN, None), json!("NaN"));
        assert_eq!(serialize(&f64::INFINITY, None), json!("Infinity"));
        assert_eq!(serialize(&f64::NEG_INFINITY, None), json!("-Infinity"));
        assert_eq!(serialize(&f32::NAN, None), json!("NaN"));
    }

    #[test]
    fn collections_preserve_order() {
        let v = vec![3i32, 1, 2];
        assert_eq!(serialize(&v, None), json!([3, 1, 2]));

        let mut m = indexmap::IndexMap::new();
        m.insert("b".to_owned(), 2i32);
        m.insert("a".to_owned(), 1i32);
        assert_eq!(serialize(&m, None), json!({"b": 2, "a": 1}));
    }

    #[test]
    fn objects_carry_type_discriminator() {
        let node = Node {
            label: "x".into(),
            next: RefCell::new(None),
        };
        assert_eq!(
            serialize(&node, None),
            json!({"label": "x", "next": null, "_type": "Node"})
        );
    }

    #[test]
    fn self_referential_graph_yields_cycle_sentinel() {
        let a = Rc::new(Node {
            label: "a".into(),
            next: RefCell::new(None),
        });
        *a.next.borrow_mut() = Some(Rc::clone(&a));

        let value = serialize(&a, None);
        assert_eq!(value["label"], json!("a"));
        assert_eq!(value["next"], json!(CYCLE_SENTINEL));
    }

    #[test]
    fn distinct_equal_objects_are_not_a_cycle() {
        // Two structurally identical nodes; the inner one must serialize in
        // full rather than being mistaken for a cycle.
        let pair = Node {
            label: "same".into(),
            next: RefCell::new(Some(Rc::new(Node {
                label: "same".into(),
                next: RefCell::new(None),
            }))),
        };
        let value = serialize(&pair, None);
        assert_eq!(value["next"]["label"], json!("same"));
        assert_eq!(value["next"]["_type"], json!("Node"));
    }

    #[test]
    fn depth_bound_cuts_at_five_levels() {
        let chain = Chain::of_depth(10);
        let value = serialize(&chain, None);

        // Objects at levels 0 through 4 render; their contents sit one level
        // deeper, so the sentinel lands exactly at nesting level 5.
        let mut cursor = &value;
        for expected in 0u32..4 {
            assert_eq!(cursor["depth"], json!(expected));
            cursor = &cursor["inner"];
        }
        assert_eq!(cursor["depth"], json!(MAX_DEPTH_SENTINEL));
        assert_eq!(cursor["inner"], json!(MAX_DEPTH_SENTINEL));
    }

    #[test]
    fn filter_is_prefix_matched() {
        struct Profile {
            email: String,
            password: String,
        }
        impl Inspect for Profile {
            fn class_name(&self) -> &'static str {
                "Profile"
            }
            fn identity(&self) -> usize {
                (self as *const Profile).addr()
            }
            fn inspect(&self, probe: &mut dyn FnMut(Shape<'_>)) {
                probe(Shape::Object(vec![
                    ("email", Slot::Value(&self.email)),
                    ("password", Slot::Value(&self.password)),
                ]));
            }
        }
        struct User {
            name: String,
            profile: Profile,
        }
        impl Inspect for User {
            fn class_name(&self) -> &'static str {
                "User"
            }
            fn identity(&self) -> usize {
                (self as *const User).addr()
            }
            fn inspect(&self, probe: &mut dyn FnMut(Shape<'_>)) {
                probe(Shape::Object(vec![
                    ("name", Slot::Value(&self.name)),
                    ("profile", Slot::Value(&self.profile)),
                ]));
            }
        }

        let user = User {
            name: "kim".into(),
            profile: Profile {
                email: "kim@example.com".into(),
                password: "hunter2".into(),
            },
        };
        let allowed = vec!["profile.email".to_owned()];
        let value = serialize(&user, Some(&allowed));

        // `profile` is traversable because an allowed path runs through it,
        // but only `email` survives inside; `name` is filtered out entirely.
        assert_eq!(
            value,
            json!({
                "profile": {"email": "kim@example.com", "_type": "Profile"},
                "_type": "User",
            })
        );
    }

    #[test]
    fn all_filtered_object_omits_type() {
        let node = Node {
            label: "x".into(),
            next: RefCell::new(None),
        };
        let allowed = vec!["something_else".to_owned()];
        assert_eq!(serialize(&node, Some(&allowed)), json!({}));
    }

    #[test]
    fn empty_filter_means_unrestricted() {
        let node = Node {
            label: "x".into(),
            next: RefCell::new(None),
        };
        let allowed: Vec<String> = vec![];
        assert_eq!(
            serialize(&node, Some(&allowed)),
            json!({"label": "x", "next": null, "_type": "Node"})
        );
    }

    #[test]
    fn fraction_serializes_by_logical_value() {
        struct Fraction {
            numerator: i32,
            denominator: i32,
        }
        impl Inspect for Fraction {
            fn class_name(&self) -> &'static str {
                FRACTION_CLASS_NAME
            }
            fn identity(&self) -> usize {
                (self as *const Fraction).addr()
            }
            fn inspect(&self, probe: &mut dyn FnMut(Shape<'_>)) {
                probe(Shape::Object(vec![
                    ("numerator", Slot::Value(&self.numerator)),
                    ("denominator", Slot::Value(&self.denominator)),
                ]));
            }
        }

        let f = Fraction {
            numerator: 1,
            denominator: 4,
        };
        assert_eq!(
            serialize(&f, None),
            json!({
                "type": "Fraction",
                "numerator": 1,
                "denominator": 4,
                "doubleValue": 0.25,
            })
        );
    }

    #[test]
    fn field_error_is_localized() {
        struct Flaky;
        impl Inspect for Flaky {
            fn class_name(&self) -> &'static str {
                "Flaky"
            }
            fn identity(&self) -> usize {
                (self as *const Flaky).addr()
            }
            fn inspect(&self, probe: &mut dyn FnMut(Shape<'_>)) {
                probe(Shape::Object(vec![
                    ("good", Slot::Value(&1i32)),
                    ("bad", Slot::Error("inaccessible".to_owned())),
                ]));
            }
        }
        assert_eq!(
            serialize(&Flaky, None),
            json!({
                "good": 1,
                "bad": "[SERIALIZATION_ERROR: inaccessible]",
                "_type": "Flaky",
            })
        );
    }
}
