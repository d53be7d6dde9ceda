//! Error taxonomy.
//!
//! Only user-visible contract violations (bad arguments, bad return values)
//! surface as errors; internal traversal failures degrade to loose
//! validators instead of raising.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where in the call lifecycle a validation failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorContext {
    Args,
    Returns,
    Input,
    Output,
    Codec,
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorContext::Args => "args",
            ErrorContext::Returns => "returns",
            ErrorContext::Input => "input",
            ErrorContext::Output => "output",
            ErrorContext::Codec => "codec",
        };
        f.write_str(s)
    }
}

/// Machine-readable issue codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    InvalidType,
    MissingField,
    InvalidLiteral,
    InvalidEnumValue,
    NoUnionMatch,
    InvalidLength,
}

impl IssueCode {
    pub fn code(&self) -> &'static str {
        match self {
            IssueCode::InvalidType => "invalid_type",
            IssueCode::MissingField => "missing_field",
            IssueCode::InvalidLiteral => "invalid_literal",
            IssueCode::InvalidEnumValue => "invalid_enum_value",
            IssueCode::NoUnionMatch => "no_union_match",
            IssueCode::InvalidLength => "invalid_length",
        }
    }
}

/// One validation finding at a dotted field path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Dotted path from the root, e.g. `user.address.city`. Empty at root.
    pub path: String,
    pub code: IssueCode,
    pub message: String,
}

impl Issue {
    pub fn new(path: impl Into<String>, code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "[{}] {}", self.code.code(), self.message)
        } else {
            write!(f, "{}: [{}] {}", self.path, self.code.code(), self.message)
        }
    }
}

#[derive(Debug, Error)]
pub enum WireError {
    #[error("validation failed ({context}): {}", format_issues(issues))]
    Validation {
        context: ErrorContext,
        issues: Vec<Issue>,
    },

    /// Failure raised by the user handler itself, passed through unchanged.
    #[error("handler failed: {message}")]
    Handler { message: String },
}

impl WireError {
    pub fn validation(context: ErrorContext, issues: Vec<Issue>) -> Self {
        WireError::Validation { context, issues }
    }

    pub fn handler(message: impl Into<String>) -> Self {
        WireError::Handler {
            message: message.into(),
        }
    }
}

fn format_issues(issues: &[Issue]) -> String {
    issues
        .iter()
        .map(Issue::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ------------------------------- Tests ------------------------------------ //
