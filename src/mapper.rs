//! Schema → native validator lowering.
//!
//! One match arm per schema kind, generic recursion otherwise; registry
//! overrides short-circuit the walk. Traversal failures never raise: cycles,
//! failed lazy resolution, and unregistered brands all degrade to the
//! accept-anything validator so a loose validator beats a crash.

use std::collections::{BTreeMap, HashSet};

use serde_json::Value as Json;

use crate::registry::CodecRegistry;
use crate::schema::{Schema, SchemaNode, node_id};
use crate::validator::Validator;
use crate::value;

pub struct Mapper<'r> {
    registry: &'r CodecRegistry,
}

struct Session {
    /// Path-scoped: ids are removed on exit so DAG-shared subschemas map
    /// normally and only true cycles short-circuit.
    visited: HashSet<usize>,
    /// Default values recorded out-of-band, keyed by dotted field path
    /// (`*` for record values). The validator itself stays required.
    defaults: BTreeMap<String, Json>,
}

impl<'r> Mapper<'r> {
    pub fn new(registry: &'r CodecRegistry) -> Self {
        Self { registry }
    }

    pub fn to_validator(&self, schema: &Schema) -> Validator {
        self.to_validator_with_defaults(schema).0
    }

    /// Map a schema and also report the default-value side channel.
    pub fn to_validator_with_defaults(
        &self,
        schema: &Schema,
    ) -> (Validator, BTreeMap<String, Json>) {
        let mut session = Session {
            visited: HashSet::new(),
            defaults: BTreeMap::new(),
        };
        let validator = self.map(schema, "", &mut session);
        (validator, session.defaults)
    }

    fn map(&self, schema: &Schema, path: &str, s: &mut Session) -> Validator {
        let id = node_id(schema);
        if !s.visited.insert(id) {
            // Re-entry through a cycle: accept anything instead of looping.
            return Validator::Any;
        }
        let validator = self.map_node(schema, path, s);
        s.visited.remove(&id);
        validator
    }

    fn map_node(&self, schema: &Schema, path: &str, s: &mut Session) -> Validator {
        // Wrappers are unwrapped before the registry is consulted; for every
        // other kind a registered override wins over structural recursion.
        match schema.as_ref() {
            SchemaNode::Optional { inner } => {
                let mapped = self.map(inner, path, s);
                match mapped {
                    already @ Validator::Optional { .. } => already,
                    v => v.optional(),
                }
            }
            SchemaNode::Nullable { inner } => {
                // The native model has no nested-wrapper construct:
                // optional-and-nullable collapses to an optional union with
                // null, whichever order the wrappers were declared in.
                let (core, was_optional) = strip_optional(self.map(inner, path, s));
                let unioned = union_with_null(core);
                if was_optional { unioned.optional() } else { unioned }
            }
            SchemaNode::Default { inner, value } => {
                s.defaults
                    .insert(path.to_owned(), value::deep_to_wire(value));
                self.map(inner, path, s)
            }
            node => {
                if let Some(entry) = self.registry.find_override(node) {
                    return entry.build_validator(node);
                }
                self.map_structural(node, path, s)
            }
        }
    }

    fn map_structural(&self, node: &SchemaNode, path: &str, s: &mut Session) -> Validator {
        match node {
            SchemaNode::String => Validator::String,
            SchemaNode::Float64 => Validator::Float64,
            SchemaNode::Int64 => Validator::Int64,
            SchemaNode::Boolean => Validator::Boolean,
            // No native date type: dates cross the boundary as epoch-ms
            // numbers.
            SchemaNode::Date => Validator::Float64,
            SchemaNode::Null => Validator::Null,

            SchemaNode::Array { element } => Validator::Array {
                element: Box::new(value_position(self.map(element, path, s))),
            },

            SchemaNode::Object { fields } => Validator::Object {
                fields: fields
                    .iter()
                    .map(|(name, field)| {
                        let child = join_path(path, name);
                        (name.clone(), self.map(field, &child, s))
                    })
                    .collect(),
            },

            SchemaNode::Union { branches } | SchemaNode::DiscriminatedUnion { branches, .. } => {
                let mut variants: Vec<Validator> = branches
                    .iter()
                    .map(|b| value_position(self.map(b, path, s)))
                    .collect();
                match variants.len() {
                    0 => {
                        tracing::warn!(path, "union with no branches degraded to any");
                        Validator::Any
                    }
                    1 => variants.remove(0),
                    _ => Validator::Union { variants },
                }
            }

            SchemaNode::Literal { value } => Validator::Literal {
                value: value.to_wire(),
            },

            // Enumerated explicitly: one value is a bare literal, two is a
            // two-branch union, more is an N-branch union.
            SchemaNode::Enum { values } => match values.as_slice() {
                [] => {
                    tracing::warn!(path, "enum with no values degraded to any");
                    Validator::Any
                }
                [only] => string_literal(only),
                [a, b] => Validator::Union {
                    variants: vec![string_literal(a), string_literal(b)],
                },
                many => Validator::Union {
                    variants: many.iter().map(|v| string_literal(v)).collect(),
                },
            },

            SchemaNode::Record { values } => {
                // Native records cannot mark values optional: flatten to a
                // union with null. Defaults on the value schema land in the
                // side channel under the `*` segment.
                let child = join_path(path, "*");
                let (core, was_optional) = strip_optional(self.map(values, &child, s));
                let values = if was_optional { union_with_null(core) } else { core };
                Validator::Record {
                    values: Box::new(values),
                }
            }

            // No fixed-length heterogeneous tuples natively: positional
            // object keyed "_0", "_1", ...
            SchemaNode::Tuple { items } => Validator::Object {
                fields: items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        let key = format!("_{i}");
                        let child = join_path(path, &key);
                        (key, value_position(self.map(item, &child, s)))
                    })
                    .collect(),
            },

            SchemaNode::Lazy(lazy) => match lazy.resolve() {
                Some(resolved) => self.map(&resolved, path, s),
                None => {
                    tracing::warn!(path, "lazy schema failed to resolve, degraded to any");
                    Validator::Any
                }
            },

            // An unregistered brand is an arbitrary transform; shape cannot
            // be inferred across it.
            SchemaNode::Brand { name, .. } => {
                tracing::debug!(path, brand = %name, "unregistered brand degraded to any");
                Validator::Any
            }

            SchemaNode::Opaque { name } => {
                tracing::warn!(path, kind = %name, "unrecognized schema kind degraded to any");
                Validator::Any
            }

            // Wrappers are handled in map_node before dispatch.
            SchemaNode::Optional { .. }
            | SchemaNode::Nullable { .. }
            | SchemaNode::Default { .. } => unreachable!("wrappers unwrapped before dispatch"),
        }
    }
}

fn string_literal(s: &str) -> Validator {
    Validator::Literal {
        value: Json::String(s.to_owned()),
    }
}

fn join_path(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_owned()
    } else {
        format!("{path}.{segment}")
    }
}

fn strip_optional(v: Validator) -> (Validator, bool) {
    match v {
        Validator::Optional { inner } => (*inner, true),
        other => (other, false),
    }
}

/// Normalize a validator for a position that cannot carry the optional
/// marker (array elements, union branches, tuple slots).
fn value_position(v: Validator) -> Validator {
    match strip_optional(v) {
        (core, true) => union_with_null(core),
        (core, false) => core,
    }
}

fn union_with_null(core: Validator) -> Validator {
    match core {
        Validator::Null | Validator::Any => core,
        Validator::Union { mut variants } => {
            if !variants.contains(&Validator::Null) {
                variants.push(Validator::Null);
            }
            Validator::Union { variants }
        }
        other => Validator::Union {
            variants: vec![other, Validator::Null],
        },
    }
}

// ------------------------------- Tests ------------------------------------ //
