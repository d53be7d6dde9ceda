//! Schema nodes: the shape vocabulary applications declare arguments and
//! return values in.
//!
//! Nodes are immutable and shared by reference (`Schema = Arc<SchemaNode>`);
//! traversals key their visited sets on the `Arc` address, so self-reference
//! through [`SchemaNode::Lazy`] is safe. Classification goes through
//! [`SchemaNode::kind`], a stable discriminant tag, never shape-sniffing.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::OnceCell;

use crate::value::Value;

pub type Schema = Arc<SchemaNode>;

#[derive(Debug, Clone)]
pub enum SchemaNode {
    // Primitives
    String,
    Float64,
    Int64,
    Boolean,
    /// Rich date value; the wire carries it as an epoch-ms number.
    Date,
    Null,

    Array {
        element: Schema,
    },
    Object {
        /// Declaration order is semantic (issue ordering, wire layout).
        fields: IndexMap<String, Schema>,
    },
    /// At least two branches; matching is first-acceptable in declared order.
    Union {
        branches: Vec<Schema>,
    },
    DiscriminatedUnion {
        tag: String,
        branches: Vec<Schema>,
    },
    Literal {
        value: LiteralValue,
    },
    Enum {
        values: Vec<String>,
    },
    /// String keys, uniform value schema.
    Record {
        values: Schema,
    },
    Tuple {
        items: Vec<Schema>,
    },
    Lazy(LazyNode),

    // Wrappers
    Optional {
        inner: Schema,
    },
    Nullable {
        inner: Schema,
    },
    Default {
        inner: Schema,
        value: Value,
    },
    /// Tagged type. Only meaningful through a registry entry; unregistered
    /// brands map to the accept-anything validator.
    Brand {
        name: String,
        inner: Schema,
    },
    /// Transform whose inner shape cannot be introspected.
    Opaque {
        name: String,
    },
}

/// Literal values a schema can pin a position to.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    String(String),
    Float64(f64),
    Int64(i64),
    Bool(bool),
}

impl LiteralValue {
    pub fn to_wire(&self) -> serde_json::Value {
        match self {
            LiteralValue::String(s) => serde_json::Value::String(s.clone()),
            LiteralValue::Float64(n) => crate::value::float_to_wire(*n),
            LiteralValue::Int64(n) => serde_json::Value::Number((*n).into()),
            LiteralValue::Bool(b) => serde_json::Value::Bool(*b),
        }
    }

    pub fn matches_value(&self, value: &Value) -> bool {
        match (self, value) {
            (LiteralValue::String(a), Value::String(b)) => a == b,
            (LiteralValue::Float64(a), Value::Float64(b)) => a == b,
            (LiteralValue::Int64(a), Value::Int64(b)) => a == b,
            (LiteralValue::Bool(a), Value::Bool(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::String(s) => write!(f, "{s:?}"),
            LiteralValue::Float64(n) => write!(f, "{n}"),
            LiteralValue::Int64(n) => write!(f, "{n}"),
            LiteralValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Deferred schema for self-referential shapes. The resolver runs at most
/// once; the result is memoized for the node's lifetime.
#[derive(Clone)]
pub struct LazyNode {
    resolver: Arc<dyn Fn() -> Schema + Send + Sync>,
    cell: Arc<OnceCell<Schema>>,
}

impl LazyNode {
    pub fn new<F>(resolver: F) -> Self
    where
        F: Fn() -> Schema + Send + Sync + 'static,
    {
        Self {
            resolver: Arc::new(resolver),
            cell: Arc::new(OnceCell::new()),
        }
    }

    /// Resolve the inner schema. A panicking resolver is absorbed and
    /// reported as `None`; callers degrade to accept-anything.
    pub fn resolve(&self) -> Option<Schema> {
        if let Some(schema) = self.cell.get() {
            return Some(schema.clone());
        }
        let resolver = self.resolver.clone();
        let resolved = catch_unwind(AssertUnwindSafe(move || resolver())).ok()?;
        Some(self.cell.get_or_init(|| resolved).clone())
    }
}

impl fmt::Debug for LazyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyNode")
            .field("resolved", &self.cell.get().is_some())
            .finish()
    }
}

// ------------------------------ Classifier -------------------------------- //

/// Structural kind of a schema node. One tag per variant plus the `Unknown`
/// sentinel; unrecognized shapes classify rather than fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    String,
    Float64,
    Int64,
    Boolean,
    Date,
    Null,
    Array,
    Object,
    Union,
    DiscriminatedUnion,
    Literal,
    Enum,
    Record,
    Tuple,
    Lazy,
    Optional,
    Nullable,
    Default,
    Brand,
    Unknown,
}

impl SchemaNode {
    pub fn kind(&self) -> Kind {
        match self {
            SchemaNode::String => Kind::String,
            SchemaNode::Float64 => Kind::Float64,
            SchemaNode::Int64 => Kind::Int64,
            SchemaNode::Boolean => Kind::Boolean,
            SchemaNode::Date => Kind::Date,
            SchemaNode::Null => Kind::Null,
            SchemaNode::Array { .. } => Kind::Array,
            SchemaNode::Object { .. } => Kind::Object,
            SchemaNode::Union { .. } => Kind::Union,
            SchemaNode::DiscriminatedUnion { .. } => Kind::DiscriminatedUnion,
            SchemaNode::Literal { .. } => Kind::Literal,
            SchemaNode::Enum { .. } => Kind::Enum,
            SchemaNode::Record { .. } => Kind::Record,
            SchemaNode::Tuple { .. } => Kind::Tuple,
            SchemaNode::Lazy(_) => Kind::Lazy,
            SchemaNode::Optional { .. } => Kind::Optional,
            SchemaNode::Nullable { .. } => Kind::Nullable,
            SchemaNode::Default { .. } => Kind::Default,
            SchemaNode::Brand { .. } => Kind::Brand,
            SchemaNode::Opaque { .. } => Kind::Unknown,
        }
    }

    /// Wrapper kinds decorate an inner schema without changing its shape.
    pub fn is_wrapper(&self) -> bool {
        matches!(
            self.kind(),
            Kind::Optional | Kind::Nullable | Kind::Default | Kind::Brand
        )
    }
}

/// Identity of a shared node, used as the visited-set key.
pub fn node_id(schema: &Schema) -> usize {
    Arc::as_ptr(schema) as usize
}

// ------------------------------- Builders --------------------------------- //

pub fn string() -> Schema {
    Arc::new(SchemaNode::String)
}

pub fn float64() -> Schema {
    Arc::new(SchemaNode::Float64)
}

pub fn int64() -> Schema {
    Arc::new(SchemaNode::Int64)
}

pub fn boolean() -> Schema {
    Arc::new(SchemaNode::Boolean)
}

pub fn date() -> Schema {
    Arc::new(SchemaNode::Date)
}

pub fn null() -> Schema {
    Arc::new(SchemaNode::Null)
}

pub fn array(element: Schema) -> Schema {
    Arc::new(SchemaNode::Array { element })
}

pub fn object<I, K>(fields: I) -> Schema
where
    I: IntoIterator<Item = (K, Schema)>,
    K: Into<String>,
{
    Arc::new(SchemaNode::Object {
        fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
    })
}

pub fn union<I: IntoIterator<Item = Schema>>(branches: I) -> Schema {
    Arc::new(SchemaNode::Union {
        branches: branches.into_iter().collect(),
    })
}

pub fn discriminated_union<I: IntoIterator<Item = Schema>>(
    tag: impl Into<String>,
    branches: I,
) -> Schema {
    Arc::new(SchemaNode::DiscriminatedUnion {
        tag: tag.into(),
        branches: branches.into_iter().collect(),
    })
}

pub fn literal(value: impl Into<LiteralValue>) -> Schema {
    Arc::new(SchemaNode::Literal {
        value: value.into(),
    })
}

pub fn string_enum<I, S>(values: I) -> Schema
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Arc::new(SchemaNode::Enum {
        values: values.into_iter().map(Into::into).collect(),
    })
}

pub fn record(values: Schema) -> Schema {
    Arc::new(SchemaNode::Record { values })
}

pub fn tuple<I: IntoIterator<Item = Schema>>(items: I) -> Schema {
    Arc::new(SchemaNode::Tuple {
        items: items.into_iter().collect(),
    })
}

pub fn lazy<F>(resolver: F) -> Schema
where
    F: Fn() -> Schema + Send + Sync + 'static,
{
    Arc::new(SchemaNode::Lazy(LazyNode::new(resolver)))
}

pub fn optional(inner: Schema) -> Schema {
    Arc::new(SchemaNode::Optional { inner })
}

pub fn nullable(inner: Schema) -> Schema {
    Arc::new(SchemaNode::Nullable { inner })
}

pub fn with_default(inner: Schema, value: Value) -> Schema {
    Arc::new(SchemaNode::Default { inner, value })
}

pub fn brand(name: impl Into<String>, inner: Schema) -> Schema {
    Arc::new(SchemaNode::Brand {
        name: name.into(),
        inner,
    })
}

pub fn opaque(name: impl Into<String>) -> Schema {
    Arc::new(SchemaNode::Opaque { name: name.into() })
}

impl From<&str> for LiteralValue {
    fn from(s: &str) -> Self {
        LiteralValue::String(s.to_owned())
    }
}

impl From<f64> for LiteralValue {
    fn from(n: f64) -> Self {
        LiteralValue::Float64(n)
    }
}

impl From<i64> for LiteralValue {
    fn from(n: i64) -> Self {
        LiteralValue::Int64(n)
    }
}

impl From<bool> for LiteralValue {
    fn from(b: bool) -> Self {
        LiteralValue::Bool(b)
    }
}

// ------------------------------- Tests ------------------------------------ //
