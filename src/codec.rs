//! Value codec: schema-driven conversion between rich values and wire JSON.
//!
//! `encode` and `decode` mirror the mapper's traversal exactly so that
//! decoding an encoded value reconstructs it for every supported shape.
//! Neither function rejects: shape mismatches fall back to the
//! schema-agnostic deep conversions in [`crate::value`], and it is the
//! schema's own parse step ([`crate::check`]) that turns mismatches into
//! errors.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::Value as Json;

use crate::check;
use crate::mapper::Mapper;
use crate::registry::CodecRegistry;
use crate::schema::{Schema, SchemaNode, node_id};
use crate::value::{self, Value};

pub struct Codec<'r> {
    registry: &'r CodecRegistry,
}

impl<'r> Codec<'r> {
    pub fn new(registry: &'r CodecRegistry) -> Self {
        Self { registry }
    }

    /// Rich value → wire JSON, driven by `schema`.
    ///
    /// Union branches are probed in declaration order and the first whose
    /// native validator accepts the encoded candidate wins. Overlapping
    /// branches therefore resolve by declared order, so authors should list
    /// branches most-specific first; ambiguous values can mis-route.
    pub fn encode(&self, schema: &Schema, val: &Value) -> Json {
        let mut visited = HashSet::new();
        self.encode_walk(schema, val, &mut visited)
    }

    /// Wire JSON → rich value, driven by `schema`. Rebuilds dates from
    /// epoch-ms numbers wherever the schema says a position is date-bearing.
    pub fn decode(&self, wire: &Json, schema: &Schema) -> Value {
        let mut visited = HashSet::new();
        self.decode_walk(wire, schema, &mut visited)
    }

    fn encode_walk(&self, schema: &Schema, val: &Value, visited: &mut HashSet<usize>) -> Json {
        // Nullish short-circuits before any schema dispatch.
        if val.is_nullish() {
            return Json::Null;
        }
        let id = node_id(schema);
        if !visited.insert(id) {
            // A wrapper/lazy/union chain looped back without consuming any
            // value. Descent into a member value resets the guard, so finite
            // values traverse recursive schemas at full fidelity.
            return value::deep_to_wire(val);
        }
        let wire = self.encode_node(schema, val, visited);
        visited.remove(&id);
        wire
    }

    fn encode_node(&self, schema: &Schema, val: &Value, visited: &mut HashSet<usize>) -> Json {
        match schema.as_ref() {
            // Wrappers carry no wire representation of their own.
            SchemaNode::Optional { inner }
            | SchemaNode::Nullable { inner }
            | SchemaNode::Default { inner, .. } => self.encode_walk(inner, val, visited),

            node => {
                if let Some(entry) = self.registry.find_override(node) {
                    return entry.encode(val);
                }
                self.encode_structural(node, val, visited)
            }
        }
    }

    fn encode_structural(
        &self,
        node: &SchemaNode,
        val: &Value,
        visited: &mut HashSet<usize>,
    ) -> Json {
        match node {
            SchemaNode::Date => match val {
                Value::DateTime(dt) => Json::Number(value::datetime_to_millis(dt).into()),
                other => value::deep_to_wire(other),
            },

            SchemaNode::String
            | SchemaNode::Float64
            | SchemaNode::Int64
            | SchemaNode::Boolean
            | SchemaNode::Null
            | SchemaNode::Literal { .. }
            | SchemaNode::Enum { .. } => value::deep_to_wire(val),

            SchemaNode::Array { element } => match val {
                Value::Array(items) => Json::Array(
                    items.iter().map(|item| self.encode(element, item)).collect(),
                ),
                other => value::deep_to_wire(other),
            },

            SchemaNode::Object { fields } => match val {
                Value::Object(members) => {
                    let mut out = serde_json::Map::new();
                    for (name, member) in members {
                        if matches!(member, Value::Undefined) {
                            continue;
                        }
                        let wire = match fields.get(name) {
                            Some(field) => self.encode(field, member),
                            // Fields outside the schema still become
                            // wire-safe instead of breaking the round trip.
                            None => value::deep_to_wire(member),
                        };
                        out.insert(name.clone(), wire);
                    }
                    Json::Object(out)
                }
                other => value::deep_to_wire(other),
            },

            SchemaNode::Union { branches } => self.encode_union(branches, val, visited),

            SchemaNode::DiscriminatedUnion { tag, branches } => {
                if let Some(branch) = encode_branch_by_tag(tag, branches, val) {
                    return self.encode_walk(&branch, val, visited);
                }
                self.encode_union(branches, val, visited)
            }

            SchemaNode::Record { values } => match val {
                Value::Object(members) => Json::Object(
                    members
                        .iter()
                        // Undefined entries are omitted; decode never
                        // fabricates them, so absence round-trips.
                        .filter(|(_, v)| !matches!(v, Value::Undefined))
                        .map(|(k, v)| (k.clone(), self.encode(values, v)))
                        .collect(),
                ),
                other => value::deep_to_wire(other),
            },

            SchemaNode::Tuple { items } => match val {
                Value::Array(elems) if elems.len() == items.len() => Json::Object(
                    items
                        .iter()
                        .zip(elems)
                        .enumerate()
                        .map(|(i, (item, elem))| (format!("_{i}"), self.encode(item, elem)))
                        .collect(),
                ),
                other => value::deep_to_wire(other),
            },

            SchemaNode::Lazy(lazy) => match lazy.resolve() {
                Some(resolved) => self.encode_walk(&resolved, val, visited),
                None => value::deep_to_wire(val),
            },

            // Unregistered transforms: best-effort wire safety, nothing more.
            SchemaNode::Brand { .. } | SchemaNode::Opaque { .. } => value::deep_to_wire(val),

            SchemaNode::Optional { .. }
            | SchemaNode::Nullable { .. }
            | SchemaNode::Default { .. } => unreachable!("wrappers unwrapped before dispatch"),
        }
    }

    fn encode_union(
        &self,
        branches: &[Schema],
        val: &Value,
        visited: &mut HashSet<usize>,
    ) -> Json {
        let mapper = Mapper::new(self.registry);
        for branch in branches {
            let candidate = self.encode_walk(branch, val, visited);
            if mapper.to_validator(branch).check(&candidate) {
                return candidate;
            }
        }
        // No acceptable branch: pass through and let downstream validation
        // catch the mismatch.
        value::deep_to_wire(val)
    }

    fn decode_walk(&self, wire: &Json, schema: &Schema, visited: &mut HashSet<usize>) -> Value {
        if wire.is_null() {
            return Value::Null;
        }
        let id = node_id(schema);
        if !visited.insert(id) {
            // Same guard as encode: only a chain that never consumed any
            // value can loop.
            return value::from_wire_raw(wire);
        }
        let val = self.decode_node(wire, schema, visited);
        visited.remove(&id);
        val
    }

    fn decode_node(&self, wire: &Json, schema: &Schema, visited: &mut HashSet<usize>) -> Value {
        match schema.as_ref() {
            SchemaNode::Optional { inner }
            | SchemaNode::Nullable { inner }
            | SchemaNode::Default { inner, .. } => self.decode_walk(wire, inner, visited),

            node => {
                if let Some(entry) = self.registry.find_override(node) {
                    return entry.decode(wire);
                }
                self.decode_structural(wire, node, visited)
            }
        }
    }

    fn decode_structural(
        &self,
        wire: &Json,
        node: &SchemaNode,
        visited: &mut HashSet<usize>,
    ) -> Value {
        match node {
            SchemaNode::Date => {
                let ms = wire
                    .as_i64()
                    .or_else(|| wire.as_f64().map(|f| f.round() as i64));
                match ms.and_then(value::millis_to_datetime) {
                    Some(dt) => Value::DateTime(dt),
                    None => value::from_wire_raw(wire),
                }
            }

            // Any wire number is a float here, including whole ones the
            // encoder canonicalized to JSON integers.
            SchemaNode::Float64 => match wire {
                Json::Number(n) => Value::Float64(n.as_f64().unwrap_or(f64::NAN)),
                other => value::from_wire_raw(other),
            },

            SchemaNode::String
            | SchemaNode::Int64
            | SchemaNode::Boolean
            | SchemaNode::Null
            | SchemaNode::Literal { .. }
            | SchemaNode::Enum { .. } => value::from_wire_raw(wire),

            SchemaNode::Array { element } => match wire {
                Json::Array(items) => Value::Array(
                    items.iter().map(|item| self.decode(item, element)).collect(),
                ),
                other => value::from_wire_raw(other),
            },

            SchemaNode::Object { fields } => match wire {
                Json::Object(members) => Value::Object(
                    members
                        .iter()
                        .map(|(name, member)| {
                            let val = match fields.get(name) {
                                Some(field) => self.decode(member, field),
                                None => value::from_wire_raw(member),
                            };
                            (name.clone(), val)
                        })
                        .collect(),
                ),
                other => value::from_wire_raw(other),
            },

            SchemaNode::Union { branches } => self.decode_union(wire, branches, visited),

            SchemaNode::DiscriminatedUnion { tag, branches } => {
                if let Some(branch) = decode_branch_by_tag(tag, branches, wire) {
                    return self.decode_walk(wire, &branch, visited);
                }
                self.decode_union(wire, branches, visited)
            }

            SchemaNode::Record { values } => match wire {
                Json::Object(members) => Value::Object(
                    members
                        .iter()
                        .map(|(k, v)| (k.clone(), self.decode(v, values)))
                        .collect(),
                ),
                other => value::from_wire_raw(other),
            },

            // Positional object back to an array, index order.
            SchemaNode::Tuple { items } => match wire {
                Json::Object(members) => Value::Array(
                    items
                        .iter()
                        .enumerate()
                        .map(|(i, item)| match members.get(&format!("_{i}")) {
                            Some(member) => self.decode(member, item),
                            None => Value::Null,
                        })
                        .collect(),
                ),
                other => value::from_wire_raw(other),
            },

            SchemaNode::Lazy(lazy) => match lazy.resolve() {
                Some(resolved) => self.decode_walk(wire, &resolved, visited),
                None => value::from_wire_raw(wire),
            },

            // Opaque transforms pass through unchanged on decode.
            SchemaNode::Brand { .. } | SchemaNode::Opaque { .. } => value::from_wire_raw(wire),

            SchemaNode::Optional { .. }
            | SchemaNode::Nullable { .. }
            | SchemaNode::Default { .. } => unreachable!("wrappers unwrapped before dispatch"),
        }
    }

    fn decode_union(
        &self,
        wire: &Json,
        branches: &[Schema],
        visited: &mut HashSet<usize>,
    ) -> Value {
        // First branch whose decoded value re-validates against that branch
        // wins; declared order is the tie-break for overlapping branches.
        for branch in branches {
            let candidate = self.decode_walk(wire, branch, visited);
            if check::conforms(branch, &candidate) {
                return candidate;
            }
        }
        value::from_wire_raw(wire)
    }
}

fn encode_branch_by_tag(tag: &str, branches: &[Schema], val: &Value) -> Option<Schema> {
    let Value::Object(members) = val else {
        return None;
    };
    let actual = members.get(tag)?;
    single_tag_match(tag, branches, |lit| lit.matches_value(actual))
}

fn decode_branch_by_tag(tag: &str, branches: &[Schema], wire: &Json) -> Option<Schema> {
    let actual = wire.as_object()?.get(tag)?;
    single_tag_match(tag, branches, |lit| &lit.to_wire() == actual)
}

/// The branch whose discriminant literal matches, provided exactly one does.
fn single_tag_match(
    tag: &str,
    branches: &[Schema],
    matches: impl Fn(&crate::schema::LiteralValue) -> bool,
) -> Option<Schema> {
    let mut hit = None;
    for branch in branches {
        let SchemaNode::Object { fields } = branch.as_ref() else {
            continue;
        };
        if let Some(field) = fields.get(tag)
            && let SchemaNode::Literal { value: lit } = field.as_ref()
            && matches(lit)
        {
            if hit.is_some() {
                return None;
            }
            hit = Some(branch.clone());
        }
    }
    hit
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::default_registry;
    use crate::schema;
    use crate::value::millis_to_datetime;
    use serde_json::json;

    fn codec() -> Codec<'static> {
        Codec::new(default_registry())
    }

    fn round_trip(schema: &Schema, val: &Value) {
        let c = codec();
        let wire = c.encode(schema, val);
        assert_eq!(&c.decode(&wire, schema), val, "wire was {wire}");
    }

    #[test]
    fn date_encodes_to_epoch_millis_and_back() {
        let dt = millis_to_datetime(1_704_067_200_000).unwrap();
        let wire = codec().encode(&schema::date(), &Value::DateTime(dt));
        assert_eq!(wire, json!(1_704_067_200_000_i64));
        round_trip(&schema::date(), &Value::DateTime(dt));
    }

    #[test]
    fn primitives_round_trip() {
        round_trip(&schema::string(), &Value::from("x"));
        round_trip(&schema::int64(), &Value::Int64(-3));
        round_trip(&schema::float64(), &Value::Float64(1.5));
        round_trip(&schema::boolean(), &Value::Bool(true));
        round_trip(&schema::null(), &Value::Null);
    }

    #[test]
    fn whole_floats_round_trip_as_floats() {
        // The encoder canonicalizes 2.0 to the JSON integer 2; the schema is
        // what says the position is float-valued on the way back.
        let wire = codec().encode(&schema::float64(), &Value::Float64(2.0));
        assert_eq!(wire, json!(2));
        assert_eq!(codec().decode(&wire, &schema::float64()), Value::Float64(2.0));
        round_trip(&schema::float64(), &Value::Float64(2.0));
    }

    #[test]
    fn fractional_epoch_millis_round_to_the_nearest_date() {
        let decoded = codec().decode(&json!(1_704_067_200_000.6), &schema::date());
        assert_eq!(
            decoded,
            Value::DateTime(millis_to_datetime(1_704_067_200_001).unwrap())
        );
    }

    #[test]
    fn nested_object_with_dates_round_trips() {
        let s = schema::object([
            ("name", schema::string()),
            ("created", schema::date()),
            ("tags", schema::array(schema::string())),
        ]);
        let dt = millis_to_datetime(1_704_067_200_000).unwrap();
        let v = Value::object([
            ("name", Value::from("doc")),
            ("created", Value::DateTime(dt)),
            ("tags", Value::array([Value::from("a"), Value::from("b")])),
        ]);
        let wire = codec().encode(&s, &v);
        assert_eq!(
            wire,
            json!({"name": "doc", "created": 1_704_067_200_000_i64, "tags": ["a", "b"]})
        );
        round_trip(&s, &v);
    }

    #[test]
    fn undefined_members_are_dropped_on_encode() {
        let s = schema::object([
            ("a", schema::int64()),
            ("b", schema::optional(schema::string())),
        ]);
        let v = Value::object([("a", Value::Int64(1)), ("b", Value::Undefined)]);
        assert_eq!(codec().encode(&s, &v), json!({"a": 1}));
    }

    #[test]
    fn fields_outside_the_schema_still_become_wire_safe() {
        let s = schema::object([("a", schema::int64())]);
        let dt = millis_to_datetime(1_704_067_200_000).unwrap();
        let v = Value::object([
            ("a", Value::Int64(1)),
            ("stray", Value::DateTime(dt)),
        ]);
        assert_eq!(
            codec().encode(&s, &v),
            json!({"a": 1, "stray": 1_704_067_200_000_i64})
        );
    }

    #[test]
    fn wrappers_have_no_wire_representation() {
        let s = schema::optional(schema::nullable(schema::date()));
        let dt = millis_to_datetime(1_704_067_200_000).unwrap();
        assert_eq!(codec().encode(&s, &Value::DateTime(dt)), json!(1_704_067_200_000_i64));
        assert_eq!(codec().encode(&s, &Value::Null), json!(null));
        round_trip(&s, &Value::DateTime(dt));
    }

    #[test]
    fn record_with_optional_values_omits_undefined_entries() {
        let s = schema::record(schema::optional(schema::float64()));
        let v = Value::object([("x", Value::Float64(5.0)), ("y", Value::Undefined)]);
        let wire = codec().encode(&s, &v);
        assert_eq!(wire, json!({"x": 5}));

        // The mapped validator for this record is float64-or-null; an
        // omitted entry stays consistent with it on the way back.
        let decoded = codec().decode(&wire, &s);
        assert_eq!(decoded, Value::object([("x", Value::Float64(5.0))]));
    }

    #[test]
    fn tuple_crosses_the_wire_as_a_positional_object() {
        let s = schema::tuple([schema::string(), schema::date()]);
        let dt = millis_to_datetime(1_704_067_200_000).unwrap();
        let v = Value::array([Value::from("at"), Value::DateTime(dt)]);
        let wire = codec().encode(&s, &v);
        assert_eq!(wire, json!({"_0": "at", "_1": 1_704_067_200_000_i64}));
        round_trip(&s, &v);
    }

    #[test]
    fn union_encode_prefers_the_more_specific_object_shape() {
        // ObjectA's shape is a subset of ObjectB's. Declared most-specific
        // first, a value with the full shape selects ObjectB because the
        // strict object check rejects its extra field under ObjectA.
        let object_b = schema::object([("id", schema::string()), ("score", schema::float64())]);
        let object_a = schema::object([("id", schema::string())]);
        let s = schema::union([object_b.clone(), object_a]);

        let full = Value::object([("id", Value::from("k")), ("score", Value::Float64(0.5))]);
        let wire = codec().encode(&s, &full);
        assert_eq!(wire, json!({"id": "k", "score": 0.5}));
        round_trip(&s, &full);
    }

    #[test]
    fn union_decode_rebuilds_dates_on_the_matching_branch() {
        let s = schema::union([schema::date(), schema::string()]);
        let dt = millis_to_datetime(1_704_067_200_000).unwrap();
        assert_eq!(
            codec().decode(&json!(1_704_067_200_000_i64), &s),
            Value::DateTime(dt)
        );
        assert_eq!(codec().decode(&json!("plain"), &s), Value::from("plain"));
    }

    #[test]
    fn union_with_no_acceptable_branch_passes_through() {
        let s = schema::union([schema::string(), schema::float64()]);
        let v = Value::Bool(true);
        assert_eq!(codec().encode(&s, &v), json!(true));
        assert_eq!(codec().decode(&json!(true), &s), Value::Bool(true));
    }

    #[test]
    fn discriminated_union_routes_by_tag_without_probing() {
        let s = schema::discriminated_union(
            "kind",
            [
                schema::object([("kind", schema::literal("event")), ("at", schema::date())]),
                schema::object([("kind", schema::literal("note")), ("text", schema::string())]),
            ],
        );
        let dt = millis_to_datetime(1_704_067_200_000).unwrap();
        let v = Value::object([("kind", Value::from("event")), ("at", Value::DateTime(dt))]);
        let wire = codec().encode(&s, &v);
        assert_eq!(wire, json!({"kind": "event", "at": 1_704_067_200_000_i64}));
        round_trip(&s, &v);
    }

    #[test]
    fn registered_brand_codec_wins_over_structural_recursion() {
        let s = schema::brand("timestamp", schema::float64());
        let dt = millis_to_datetime(1_704_067_200_000).unwrap();
        let wire = codec().encode(&s, &Value::DateTime(dt));
        assert_eq!(wire, json!(1_704_067_200_000_i64));
        assert_eq!(codec().decode(&wire, &s), Value::DateTime(dt));
    }

    #[test]
    fn unregistered_brand_passes_values_through() {
        let s = schema::brand("user_id", schema::string());
        assert_eq!(codec().encode(&s, &Value::from("u_1")), json!("u_1"));
        assert_eq!(codec().decode(&json!("u_1"), &s), Value::from("u_1"));
    }

    #[test]
    fn opaque_schema_passes_through_on_decode() {
        let s = schema::opaque("pipe");
        let wire = json!({"anything": [1, 2]});
        let decoded = codec().decode(&wire, &s);
        assert_eq!(value::deep_to_wire(&decoded), wire);
    }

    #[test]
    fn cyclic_lazy_schema_round_trips() {
        use once_cell::sync::OnceCell;

        static TREE: OnceCell<Schema> = OnceCell::new();
        let tree = TREE
            .get_or_init(|| {
                schema::object([
                    ("label", schema::string()),
                    (
                        "children",
                        schema::array(schema::lazy(|| TREE.get().unwrap().clone())),
                    ),
                ])
            })
            .clone();

        let v = Value::object([
            ("label", Value::from("root")),
            (
                "children",
                Value::array([Value::object([
                    ("label", Value::from("leaf")),
                    ("children", Value::array([])),
                ])]),
            ),
        ]);
        round_trip(&tree, &v);
    }

    #[test]
    fn recursive_schema_rebuilds_dates_below_the_root() {
        use once_cell::sync::OnceCell;

        static TREE: OnceCell<Schema> = OnceCell::new();
        let tree = TREE
            .get_or_init(|| {
                schema::object([
                    ("at", schema::date()),
                    (
                        "children",
                        schema::array(schema::lazy(|| TREE.get().unwrap().clone())),
                    ),
                ])
            })
            .clone();

        // The cycle guard must not fire on value descent: the child's date
        // sits one level below the root and still has to come back rich.
        let dt = millis_to_datetime(1_704_067_200_000).unwrap();
        let v = Value::object([
            ("at", Value::DateTime(dt)),
            (
                "children",
                Value::array([Value::object([
                    ("at", Value::DateTime(dt)),
                    ("children", Value::array([])),
                ])]),
            ),
        ]);

        let wire = codec().encode(&tree, &v);
        assert_eq!(
            wire["children"][0]["at"],
            json!(1_704_067_200_000_i64)
        );
        round_trip(&tree, &v);
    }

    #[test]
    fn defaults_recurse_transparently() {
        let s = schema::with_default(schema::int64(), Value::Int64(0));
        round_trip(&s, &Value::Int64(9));
    }
}
