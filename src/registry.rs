//! Codec registry: specialized (validator, encode, decode) triples for
//! recognized schema patterns.
//!
//! Entries are scanned in registration order and the first matching
//! recognizer wins, so later registrations can only shadow earlier ones by
//! being registered first. Registration happens during process
//! initialization; after that the registry is read-only and safe to share
//! across concurrent calls. The mapper and codec take the registry by
//! reference, never through an ambient global; [`default_registry`] is just
//! the conventional process-wide instance.

use std::panic::{AssertUnwindSafe, catch_unwind};

use once_cell::sync::Lazy;
use serde_json::Value as Json;

use crate::schema::SchemaNode;
use crate::validator::Validator;
use crate::value::{self, Value};

type Recognizer = Box<dyn Fn(&SchemaNode) -> bool + Send + Sync>;
type BuildValidator = Box<dyn Fn(&SchemaNode) -> Validator + Send + Sync>;
type EncodeFn = Box<dyn Fn(&Value) -> Json + Send + Sync>;
type DecodeFn = Box<dyn Fn(&Json) -> Value + Send + Sync>;

pub struct CodecEntry {
    name: String,
    recognizer: Recognizer,
    build_validator: BuildValidator,
    encode: EncodeFn,
    decode: DecodeFn,
}

impl CodecEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// A panicking recognizer must not abort the mapping; it is absorbed and
    /// treated as non-matching.
    pub fn matches(&self, node: &SchemaNode) -> bool {
        catch_unwind(AssertUnwindSafe(|| (self.recognizer)(node))).unwrap_or(false)
    }

    pub fn build_validator(&self, node: &SchemaNode) -> Validator {
        (self.build_validator)(node)
    }

    pub fn encode(&self, value: &Value) -> Json {
        (self.encode)(value)
    }

    pub fn decode(&self, wire: &Json) -> Value {
        (self.decode)(wire)
    }
}

#[derive(Default)]
pub struct CodecRegistry {
    entries: Vec<CodecEntry>,
}

impl CodecRegistry {
    /// Empty registry, no base codecs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the base codecs every deployment carries.
    pub fn with_base_codecs() -> Self {
        let mut registry = Self::new();
        registry.register_timestamp_codec();
        registry
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        recognizer: impl Fn(&SchemaNode) -> bool + Send + Sync + 'static,
        build_validator: impl Fn(&SchemaNode) -> Validator + Send + Sync + 'static,
        encode: impl Fn(&Value) -> Json + Send + Sync + 'static,
        decode: impl Fn(&Json) -> Value + Send + Sync + 'static,
    ) {
        self.entries.push(CodecEntry {
            name: name.into(),
            recognizer: Box::new(recognizer),
            build_validator: Box::new(build_validator),
            encode: Box::new(encode),
            decode: Box::new(decode),
        });
    }

    /// First entry whose recognizer accepts `node`, in registration order.
    pub fn find_override(&self, node: &SchemaNode) -> Option<&CodecEntry> {
        self.entries.iter().find(|entry| entry.matches(node))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Brand `"timestamp"`: a date-valued schema whose native representation
    /// is a plain epoch-ms float64, regardless of the branded inner shape.
    fn register_timestamp_codec(&mut self) {
        self.register(
            "timestamp",
            |node| matches!(node, SchemaNode::Brand { name, .. } if name == "timestamp"),
            |_| Validator::Float64,
            |val| match val {
                Value::DateTime(dt) => Json::Number(value::datetime_to_millis(dt).into()),
                other => value::deep_to_wire(other),
            },
            |wire| {
                let ms = wire
                    .as_i64()
                    .or_else(|| wire.as_f64().map(|f| f.round() as i64));
                match ms.and_then(value::millis_to_datetime) {
                    Some(dt) => Value::DateTime(dt),
                    None => value::from_wire_raw(wire),
                }
            },
        );
    }
}

/// Process-wide default registry: base codecs only. Consumers needing extra
/// codecs construct their own `CodecRegistry` during initialization and pass
/// it to the mapper/codec instead.
pub fn default_registry() -> &'static CodecRegistry {
    static REGISTRY: Lazy<CodecRegistry> = Lazy::new(CodecRegistry::with_base_codecs);
    &REGISTRY
}

// ------------------------------- Tests ------------------------------------ //
