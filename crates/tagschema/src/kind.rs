//! Schema kind taxonomy and the mapping from described types onto it

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::reflect::{Reflect, Value};

/// Closed set of schema kinds
///
/// Constraint applicability depends on exactly these seven kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    #[serde(rename = "invalid")]
    Invalid,
    Boolean,
    Number,
    Array,
    Object,
    File,
    String,
}

impl Kind {
    /// Classifies a value's type, unwrapping pointer indirection first
    ///
    /// The upload capability takes precedence over the structural shape, so a
    /// byte sequence that can read itself from an upload is `File`.
    pub fn of(value: &dyn Reflect) -> Kind {
        match value.value() {
            Value::Pointer(pointer) => match pointer.pointee() {
                Some(inner) => Kind::of(inner),
                None => Kind::of(pointer.zero_pointee().as_ref()),
            },
            _ if value.is_upload() => Kind::File,
            Value::Bool(_) => Kind::Boolean,
            Value::Int(_) | Value::Uint(_) | Value::Float(_) => Kind::Number,
            Value::Str(_) => Kind::String,
            Value::Seq(_) => Kind::Array,
            Value::Map(_) | Value::Struct(_) => Kind::Object,
            Value::Opaque => Kind::Invalid,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Invalid => write!(f, "invalid"),
            Kind::Boolean => write!(f, "Boolean"),
            Kind::Number => write!(f, "Number"),
            Kind::Array => write!(f, "Array"),
            Kind::Object => write!(f, "Object"),
            Kind::File => write!(f, "File"),
            Kind::String => write!(f, "String"),
        }
    }
}
