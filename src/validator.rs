//! Native validator tree: the platform's own enforcement objects.
//!
//! Mirrors the schema shape one-to-one, with two platform limits the mapper
//! compensates for: `Optional` is legal only in object-field position, and
//! record values cannot be optional (flattened to union-with-null upstream).
//! Serializes with snake_case kind tags so a registration payload can be
//! emitted directly.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Validator {
    /// Accept anything. Cycle guard and degradation target.
    Any,
    Null,
    Boolean,
    Float64,
    Int64,
    String,
    Literal {
        value: Json,
    },
    Array {
        element: Box<Validator>,
    },
    Object {
        fields: IndexMap<String, Validator>,
    },
    Union {
        variants: Vec<Validator>,
    },
    Record {
        values: Box<Validator>,
    },
    /// Field-position marker: the field may be absent. Never nested.
    Optional {
        inner: Box<Validator>,
    },
}

impl Validator {
    pub fn optional(self) -> Validator {
        Validator::Optional {
            inner: Box::new(self),
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Validator::Optional { .. })
    }

    /// Structural check of a wire value.
    ///
    /// Objects are strict: declared non-optional fields must be present and
    /// undeclared fields are rejected. That strictness is what lets union
    /// branch probing prefer the more specific of two overlapping object
    /// shapes.
    pub fn check(&self, value: &Json) -> bool {
        match self {
            Validator::Any => true,
            Validator::Null => value.is_null(),
            Validator::Boolean => value.is_boolean(),
            Validator::Float64 => value.is_number(),
            Validator::Int64 => value.is_i64() || value.is_u64(),
            Validator::String => value.is_string(),
            Validator::Literal { value: expected } => value == expected,
            Validator::Array { element } => value
                .as_array()
                .is_some_and(|items| items.iter().all(|item| element.check(item))),
            Validator::Object { fields } => {
                let Some(map) = value.as_object() else {
                    return false;
                };
                if map.keys().any(|k| !fields.contains_key(k)) {
                    return false;
                }
                fields.iter().all(|(name, field)| match map.get(name) {
                    Some(v) => match field {
                        Validator::Optional { inner } => inner.check(v),
                        _ => field.check(v),
                    },
                    None => field.is_optional(),
                })
            }
            Validator::Union { variants } => variants.iter().any(|v| v.check(value)),
            Validator::Record { values } => value
                .as_object()
                .is_some_and(|map| map.values().all(|v| values.check(v))),
            // Optional means the field may be absent, not that null is
            // acceptable; a present value must satisfy the inner validator.
            Validator::Optional { inner } => inner.check(value),
        }
    }
}

// ------------------------------- Tests ------------------------------------ //
