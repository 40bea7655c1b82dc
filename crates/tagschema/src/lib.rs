//! Tagschema - schema derivation, validation and query decoding for described models
//!
//! Models describe themselves through the [`Reflect`] trait, usually generated
//! with [`impl_model!`]. From a described model this crate can:
//!
//! - **Derive** a JSON-Schema-like [`SchemaNode`] tree, with validation rules
//!   read from Go-style struct tags (`json:"name" schema:"required" desc:"..."`)
//! - **Validate** values against a derived tree, stopping at the first
//!   [`Violation`]
//! - **Decode** flat query maps ([`QueryValues`]) into model instances
//!
//! ## Quick Start
//!
//! ```rust
//! use tagschema::{impl_model, decode, QueryValues, SchemaNode};
//!
//! #[derive(Default)]
//! struct Login {
//!     username: String,
//!     password: String,
//!     sex: Option<i32>,
//! }
//!
//! impl_model!(Login in "accounts" {
//!     username: r#"json:"username" schema:"required; pattern:[\\w]{6,12}""#,
//!     password: r#"json:"password" schema:"required; pattern:[\\w]{6,12}""#,
//!     sex: r#"json:"sex" schema:"required; enum:1,2""#,
//! });
//!
//! let schema = SchemaNode::from_model(&Login::default()).unwrap();
//!
//! let values = QueryValues::parse("username=JayChou&password=ChouJay&sex=3").unwrap();
//! let mut login = Login::default();
//! decode(&values, &mut login).unwrap();
//!
//! let violation = schema.validate(&login).unwrap().unwrap();
//! assert_eq!(violation.field, "sex");
//! assert_eq!(violation.constraint.enumeration, Some(vec!["1".into(), "2".into()]));
//! ```
//!
//! ## Tag Options
//!
//! The `schema` tag is a `;` separated list: `required`, `enum:a,b`,
//! `minNum`, `maxNum`, `minExcNum`, `maxExcNum`, `minLen`, `maxLen`,
//! `minItems`, `maxItems` and `pattern`. Array item counts use
//! `minItems`/`maxItems`, falling back to `minLen`/`maxLen` when neither is set.
//!
//! Copyright (c) 2025 Tagschema Team
//! Licensed under the Apache-2.0 license

pub mod builder;
pub mod constraint;
pub mod error;
pub mod file;
pub mod kind;
pub mod model;
pub mod pattern;
pub mod query;
pub mod reflect;
pub mod schema;
pub mod tag;
pub mod validate;

// Re-export main types for convenience
pub use builder::SchemaBuilder;
pub use constraint::{Constraint, Violation};
pub use error::{ConversionError, Error, Result, TagOptionError};
pub use file::{FileData, UploadHeader, UploadReadable};
pub use kind::Kind;
pub use model::{Field, FieldDef, FieldMut, Model};
pub use pattern::PatternCache;
pub use query::{Decoder, QueryValues};
pub use reflect::{Dynamic, Reflect, SelfDecoding, SelfDescribing, Value, ValueMut};
pub use schema::{Properties, SchemaNode};
pub use tag::{StructTag, TagKeys, TagOptions};
pub use validate::Validator;

/// Derives the schema of a struct-like model with default settings
pub fn schema_of(model: &dyn Reflect) -> Result<SchemaNode> {
    SchemaBuilder::default().build(model)
}

/// Decodes `values` into `target` with default settings
pub fn decode(values: &QueryValues, target: &mut dyn Reflect) -> Result<()> {
    Decoder::default().decode(values, target)
}
