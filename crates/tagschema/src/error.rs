//! Error types for schema derivation, validation and query decoding
//!
//! Validation violations are not errors: a broken rule is reported as
//! `Ok(Some(Violation))`. Everything in this module aborts the whole call.

use std::num::{ParseFloatError, ParseIntError};
use thiserror::Error;

/// Main error type for tagschema operations
#[derive(Error, Debug)]
pub enum Error {
    /// The model is not a struct-like composite where one is required
    #[error("{operation} only supports struct-like models, got {type_name}")]
    Shape {
        operation: &'static str,
        type_name: &'static str,
    },

    /// Two elements of one sequence resolve to different concrete types
    #[error("slice or array element type must be unique, got {first} and {second}")]
    Heterogeneous {
        first: &'static str,
        second: &'static str,
    },

    /// A `schema` tag option could not be parsed or applied
    #[error("schema tag [{key}] got error: {source}")]
    TagOption {
        key: String,
        #[source]
        source: TagOptionError,
    },

    /// A value could not be converted to or from text
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// A pattern stored on a schema node does not compile
    #[error("invalid pattern '{pattern}'")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A numeric node carries an enum member that is not a number
    #[error("enum member '{member}' is not a number")]
    NonNumericEnum {
        member: String,
        #[source]
        source: ParseFloatError,
    },

    /// A query string (or nested sub-query) is not valid form encoding
    #[error("malformed query '{query}': {reason}")]
    MalformedQuery { query: String, reason: String },

    /// A field type the decoder has no way to fill from text
    #[error("type {type_name} cannot be decoded from query values")]
    Unsupported { type_name: &'static str },

    /// A model with its own decoder reported a failure
    #[error("custom decoder for {type_name} failed")]
    Custom {
        type_name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Failure to parse or apply a single option of the `schema` tag
#[derive(Error, Debug)]
pub enum TagOptionError {
    /// A `:` with nothing before it
    #[error("invalid options key in '{segment}'")]
    EmptyKey { segment: String },

    #[error("'{value}' is not a number")]
    InvalidFloat {
        value: String,
        #[source]
        source: ParseFloatError,
    },

    #[error("'{value}' is not an unsigned integer")]
    InvalidInteger {
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// A text value that does not fit the target primitive type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot convert '{value}' to {target}: {reason}")]
pub struct ConversionError {
    pub value: String,
    pub target: &'static str,
    pub reason: String,
}

impl ConversionError {
    /// Create a new conversion error
    pub fn new<V, R>(value: V, target: &'static str, reason: R) -> Self
    where
        V: Into<String>,
        R: ToString,
    {
        Self {
            value: value.into(),
            target,
            reason: reason.to_string(),
        }
    }

    /// The target type has no text representation at all
    pub fn unsupported<V: Into<String>>(value: V, target: &'static str) -> Self {
        Self::new(value, target, "type has no text form")
    }
}
