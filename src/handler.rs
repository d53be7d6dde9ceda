//! Handler wrapper: the boundary where wire values meet user code.
//!
//! One call runs strictly in order: decode wire args, parse them against the
//! argument schema, await the user handler, parse the result against the
//! return schema (when one is declared), encode the result back to the wire.
//! Validation failures surface as structured [`WireError::Validation`]
//! values tagged with the failing context; nothing is swallowed.

use serde_json::Value as Json;

use crate::check;
use crate::codec::Codec;
use crate::error::{ErrorContext, WireError};
use crate::mapper::Mapper;
use crate::registry::CodecRegistry;
use crate::schema::Schema;
use crate::validator::Validator;
use crate::value::{self, Value};

pub struct Handler<'r> {
    registry: &'r CodecRegistry,
    args: Schema,
    returns: Option<Schema>,
}

impl<'r> Handler<'r> {
    pub fn new(registry: &'r CodecRegistry, args: Schema, returns: Option<Schema>) -> Self {
        Self {
            registry,
            args,
            returns,
        }
    }

    /// Native validator for the argument schema. Built at registration time
    /// and cached by the caller; the per-call path never rebuilds it.
    pub fn args_validator(&self) -> Validator {
        Mapper::new(self.registry).to_validator(&self.args)
    }

    pub fn returns_validator(&self) -> Option<Validator> {
        self.returns
            .as_ref()
            .map(|s| Mapper::new(self.registry).to_validator(s))
    }

    /// Run one request/response cycle through the wrapped handler.
    pub async fn call<F, Fut>(&self, wire_args: &Json, f: F) -> Result<Json, WireError>
    where
        F: FnOnce(Value) -> Fut,
        Fut: Future<Output = Result<Value, WireError>>,
    {
        let codec = Codec::new(self.registry);

        let decoded = codec.decode(wire_args, &self.args);
        let parsed = check::parse(&self.args, &decoded)
            .map_err(|issues| WireError::validation(ErrorContext::Args, issues))?;

        let result = f(parsed).await?;

        match &self.returns {
            Some(returns) => {
                let validated = check::parse(returns, &result)
                    .map_err(|issues| WireError::validation(ErrorContext::Returns, issues))?;
                Ok(codec.encode(returns, &validated))
            }
            // No declared return schema: still wire-safe, dates to numbers
            // and undefined members dropped.
            None => Ok(value::deep_to_wire(&result)),
        }
    }
}

// ------------------------------- Tests ------------------------------------ //
