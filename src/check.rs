//! The schema's own parse step: structural validation of a rich value.
//!
//! This is the rejection layer the codec deliberately lacks. Parsing walks
//! value and schema together, collects ordered issues with dotted paths and
//! machine-readable codes, and applies `Default` wrapper values to absent
//! members. Brands and opaque transforms accept anything here; the native
//! validator is the strict layer for those.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::error::{Issue, IssueCode};
use crate::schema::{Schema, SchemaNode, node_id};
use crate::value::Value;

/// Validate `value` against `schema`, applying defaults. Returns the parsed
/// value, or every issue found, in traversal order.
pub fn parse(schema: &Schema, value: &Value) -> Result<Value, Vec<Issue>> {
    let mut issues = Vec::new();
    let mut visited = HashSet::new();
    let parsed = walk(schema, value, "", &mut issues, &mut visited);
    if issues.is_empty() { Ok(parsed) } else { Err(issues) }
}

/// True when `value` conforms to `schema`. Used by the codec's union decode
/// probe to pick the first acceptable branch.
pub fn conforms(schema: &Schema, value: &Value) -> bool {
    parse(schema, value).is_ok()
}

fn walk(
    schema: &Schema,
    value: &Value,
    path: &str,
    issues: &mut Vec<Issue>,
    visited: &mut HashSet<usize>,
) -> Value {
    let id = node_id(schema);
    if !visited.insert(id) {
        // Cycle re-entry: accept rather than recurse forever.
        return value.clone();
    }
    let parsed = walk_node(schema, value, path, issues, visited);
    visited.remove(&id);
    parsed
}

fn walk_node(
    schema: &Schema,
    value: &Value,
    path: &str,
    issues: &mut Vec<Issue>,
    visited: &mut HashSet<usize>,
) -> Value {
    match schema.as_ref() {
        SchemaNode::Optional { inner } => match value {
            Value::Undefined => Value::Undefined,
            other => walk(inner, other, path, issues, visited),
        },
        SchemaNode::Nullable { inner } => match value {
            Value::Null => Value::Null,
            other => walk(inner, other, path, issues, visited),
        },
        SchemaNode::Default { inner, value: default } => match value {
            Value::Undefined | Value::Null => default.clone(),
            other => walk(inner, other, path, issues, visited),
        },

        SchemaNode::String => expect(value, path, issues, "string", |v| {
            matches!(v, Value::String(_))
        }),
        SchemaNode::Float64 => expect(value, path, issues, "float64", |v| {
            matches!(v, Value::Float64(_) | Value::Int64(_))
        }),
        SchemaNode::Int64 => expect(value, path, issues, "int64", |v| {
            matches!(v, Value::Int64(_))
        }),
        SchemaNode::Boolean => expect(value, path, issues, "boolean", |v| {
            matches!(v, Value::Bool(_))
        }),
        SchemaNode::Date => expect(value, path, issues, "datetime", |v| {
            matches!(v, Value::DateTime(_))
        }),
        SchemaNode::Null => expect(value, path, issues, "null", |v| {
            matches!(v, Value::Null)
        }),

        SchemaNode::Literal { value: expected } => {
            if !expected.matches_value(value) {
                issues.push(Issue::new(
                    path,
                    IssueCode::InvalidLiteral,
                    format!("expected literal {expected}, got {}", value.type_name()),
                ));
            }
            value.clone()
        }

        SchemaNode::Enum { values } => {
            let ok = matches!(value, Value::String(s) if values.iter().any(|v| v == s));
            if !ok {
                issues.push(Issue::new(
                    path,
                    IssueCode::InvalidEnumValue,
                    format!("expected one of {values:?}, got {}", value.type_name()),
                ));
            }
            value.clone()
        }

        SchemaNode::Array { element } => match value {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        let child = join_path(path, &i.to_string());
                        walk(element, item, &child, issues, visited)
                    })
                    .collect(),
            ),
            other => type_mismatch(other, path, issues, "array"),
        },

        SchemaNode::Object { fields } => match value {
            Value::Object(members) => {
                let mut parsed = IndexMap::new();
                for (name, field) in fields {
                    let child = join_path(path, name);
                    let member = members.get(name).unwrap_or(&Value::Undefined);
                    if matches!(member, Value::Undefined) && !accepts_absent(field) {
                        issues.push(Issue::new(
                            &child,
                            IssueCode::MissingField,
                            "field is required",
                        ));
                        continue;
                    }
                    match walk(field, member, &child, issues, visited) {
                        Value::Undefined => {}
                        v => {
                            parsed.insert(name.clone(), v);
                        }
                    }
                }
                // Unknown extras are kept: the codec must be able to round-trip
                // them, and the native validator is the strict layer.
                for (name, member) in members {
                    if !fields.contains_key(name) && !matches!(member, Value::Undefined) {
                        parsed.insert(name.clone(), member.clone());
                    }
                }
                Value::Object(parsed)
            }
            other => type_mismatch(other, path, issues, "object"),
        },

        SchemaNode::Union { branches } => {
            first_matching_branch(branches, value, path, issues, visited)
        }

        SchemaNode::DiscriminatedUnion { tag, branches } => {
            if let Some(branch) = branch_by_tag(tag, branches, value) {
                return walk(&branch, value, path, issues, visited);
            }
            first_matching_branch(branches, value, path, issues, visited)
        }

        SchemaNode::Record { values } => match value {
            Value::Object(members) => Value::Object(
                members
                    .iter()
                    .filter(|(_, v)| !matches!(v, Value::Undefined))
                    .map(|(k, v)| {
                        let child = join_path(path, k);
                        (k.clone(), walk(values, v, &child, issues, visited))
                    })
                    .collect(),
            ),
            other => type_mismatch(other, path, issues, "object"),
        },

        SchemaNode::Tuple { items } => match value {
            Value::Array(elems) if elems.len() == items.len() => Value::Array(
                items
                    .iter()
                    .zip(elems)
                    .enumerate()
                    .map(|(i, (item, elem))| {
                        let child = join_path(path, &i.to_string());
                        walk(item, elem, &child, issues, visited)
                    })
                    .collect(),
            ),
            Value::Array(elems) => {
                issues.push(Issue::new(
                    path,
                    IssueCode::InvalidLength,
                    format!("expected {} items, got {}", items.len(), elems.len()),
                ));
                value.clone()
            }
            other => type_mismatch(other, path, issues, "array"),
        },

        SchemaNode::Lazy(lazy) => match lazy.resolve() {
            Some(resolved) => walk(&resolved, value, path, issues, visited),
            None => value.clone(),
        },

        // Arbitrary transforms cannot be parsed structurally; accept and let
        // the native validator enforce whatever the registry declared.
        SchemaNode::Brand { .. } | SchemaNode::Opaque { .. } => value.clone(),
    }
}

/// Whether an absent member satisfies the field schema without an issue.
fn accepts_absent(schema: &Schema) -> bool {
    match schema.as_ref() {
        SchemaNode::Optional { .. } | SchemaNode::Default { .. } => true,
        SchemaNode::Nullable { inner } => accepts_absent(inner),
        _ => false,
    }
}

fn branch_by_tag(tag: &str, branches: &[Schema], value: &Value) -> Option<Schema> {
    let Value::Object(members) = value else {
        return None;
    };
    let actual = members.get(tag)?;
    let mut hit = None;
    for branch in branches {
        let SchemaNode::Object { fields } = branch.as_ref() else {
            continue;
        };
        let Some(field) = fields.get(tag) else {
            continue;
        };
        if let SchemaNode::Literal { value: lit } = field.as_ref()
            && lit.matches_value(actual)
        {
            if hit.is_some() {
                // Ambiguous tag: fall back to the ordered probe.
                return None;
            }
            hit = Some(branch.clone());
        }
    }
    hit
}

fn first_matching_branch(
    branches: &[Schema],
    value: &Value,
    path: &str,
    issues: &mut Vec<Issue>,
    visited: &mut HashSet<usize>,
) -> Value {
    for branch in branches {
        let mut probe = Vec::new();
        let parsed = walk(branch, value, path, &mut probe, visited);
        if probe.is_empty() {
            return parsed;
        }
    }
    issues.push(Issue::new(
        path,
        IssueCode::NoUnionMatch,
        format!("no union branch matched {}", value.type_name()),
    ));
    value.clone()
}

fn expect(
    value: &Value,
    path: &str,
    issues: &mut Vec<Issue>,
    expected: &str,
    ok: impl Fn(&Value) -> bool,
) -> Value {
    if !ok(value) {
        issues.push(Issue::new(
            path,
            IssueCode::InvalidType,
            format!("expected {expected}, got {}", value.type_name()),
        ));
    }
    value.clone()
}

fn type_mismatch(value: &Value, path: &str, issues: &mut Vec<Issue>, expected: &str) -> Value {
    issues.push(Issue::new(
        path,
        IssueCode::InvalidType,
        format!("expected {expected}, got {}", value.type_name()),
    ));
    value.clone()
}

fn join_path(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_owned()
    } else {
        format!("{path}.{segment}")
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;
    use crate::value::millis_to_datetime;

    #[test]
    fn primitives_parse_or_report_invalid_type() {
        assert!(parse(&schema::string(), &Value::from("x")).is_ok());
        let err = parse(&schema::string(), &Value::Int64(1)).unwrap_err();
        assert_eq!(err[0].code, IssueCode::InvalidType);
        assert_eq!(err[0].path, "");
    }

    #[test]
    fn int64_is_accepted_where_float64_is_expected() {
        assert!(parse(&schema::float64(), &Value::Int64(3)).is_ok());
        assert!(parse(&schema::int64(), &Value::Float64(3.5)).is_err());
    }

    #[test]
    fn missing_required_field_reports_dotted_path() {
        let s = schema::object([(
            "user",
            schema::object([("name", schema::string())]),
        )]);
        let args = Value::object([("user", Value::object::<[(&str, Value); 0], &str>([]))]);
        let err = parse(&s, &args).unwrap_err();
        assert_eq!(err[0].path, "user.name");
        assert_eq!(err[0].code, IssueCode::MissingField);
    }

    #[test]
    fn optional_fields_may_be_absent() {
        let s = schema::object([
            ("a", schema::string()),
            ("b", schema::optional(schema::int64())),
        ]);
        let parsed = parse(&s, &Value::object([("a", Value::from("x"))])).unwrap();
        let Value::Object(members) = parsed else { panic!("object expected") };
        assert!(!members.contains_key("b"));
    }

    #[test]
    fn defaults_fill_absent_members() {
        let s = schema::object([(
            "limit",
            schema::with_default(schema::int64(), Value::Int64(50)),
        )]);
        let parsed = parse(&s, &Value::object::<_, &str>([])).unwrap();
        let Value::Object(members) = parsed else { panic!("object expected") };
        assert_eq!(members["limit"], Value::Int64(50));
    }

    #[test]
    fn unknown_extra_fields_are_kept() {
        let s = schema::object([("a", schema::int64())]);
        let parsed = parse(
            &s,
            &Value::object([("a", Value::Int64(1)), ("extra", Value::from(true))]),
        )
        .unwrap();
        let Value::Object(members) = parsed else { panic!("object expected") };
        assert_eq!(members["extra"], Value::Bool(true));
    }

    #[test]
    fn union_takes_first_matching_branch() {
        let s = schema::union([schema::string(), schema::float64()]);
        assert!(parse(&s, &Value::from("x")).is_ok());
        assert!(parse(&s, &Value::Float64(1.5)).is_ok());
        let err = parse(&s, &Value::Bool(true)).unwrap_err();
        assert_eq!(err[0].code, IssueCode::NoUnionMatch);
    }

    #[test]
    fn discriminated_union_routes_by_tag() {
        let s = schema::discriminated_union(
            "kind",
            [
                schema::object([("kind", schema::literal("circle")), ("r", schema::float64())]),
                schema::object([("kind", schema::literal("square")), ("s", schema::float64())]),
            ],
        );
        let v = Value::object([("kind", Value::from("square")), ("s", Value::Float64(2.0))]);
        assert!(parse(&s, &v).is_ok());

        let bad = Value::object([("kind", Value::from("square")), ("r", Value::Float64(2.0))]);
        assert!(parse(&s, &bad).is_err());
    }

    #[test]
    fn tuple_length_is_checked() {
        let s = schema::tuple([schema::string(), schema::int64()]);
        assert!(parse(&s, &Value::array([Value::from("x"), Value::Int64(1)])).is_ok());
        let err = parse(&s, &Value::array([Value::from("x")])).unwrap_err();
        assert_eq!(err[0].code, IssueCode::InvalidLength);
    }

    #[test]
    fn enum_rejects_unlisted_values() {
        let s = schema::string_enum(["on", "off"]);
        assert!(parse(&s, &Value::from("on")).is_ok());
        let err = parse(&s, &Value::from("dimmed")).unwrap_err();
        assert_eq!(err[0].code, IssueCode::InvalidEnumValue);
    }

    #[test]
    fn date_schema_expects_datetime_values() {
        let dt = millis_to_datetime(1_704_067_200_000).unwrap();
        assert!(parse(&schema::date(), &Value::DateTime(dt)).is_ok());
        assert!(parse(&schema::date(), &Value::Int64(1_704_067_200_000)).is_err());
    }

    #[test]
    fn brand_accepts_anything() {
        let s = schema::brand("user_id", schema::string());
        assert!(parse(&s, &Value::Int64(7)).is_ok());
    }

    #[test]
    fn cyclic_schema_parse_terminates() {
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
        assert!(parse(&tree, &v).is_ok());
    }
}
