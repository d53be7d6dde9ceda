//! schema-wire: a bidirectional schema-conversion layer.
//!
//! Applications declare argument and return shapes once as [`schema`] nodes.
//! From that single declaration this crate derives the platform's native
//! [`validator`] tree for boundary enforcement, encodes rich values into
//! wire-safe JSON on the way out, and decodes wire JSON back into rich
//! values (rebuilding dates from epoch-ms numbers) on the way in.
//!
//! The [`mapper`] and [`codec`] walk the same schema tree with the same
//! precedence: registry overrides first, then one structural rule per kind.
//! Traversal never raises; cycles, failed lazy resolution, and unrecognized
//! kinds degrade to the accept-anything validator. Only the [`handler`]
//! wrapper's parse steps turn mismatches into errors.

pub mod check;
pub mod codec;
pub mod error;
pub mod handler;
pub mod mapper;
pub mod registry;
pub mod schema;
pub mod validator;
pub mod value;

pub use codec::Codec;
pub use error::{ErrorContext, Issue, IssueCode, WireError};
pub use handler::Handler;
pub use mapper::Mapper;
pub use registry::{CodecRegistry, default_registry};
pub use schema::{Kind, Schema, SchemaNode};
pub use validator::Validator;
pub use value::Value;
