//! Explicit type description for schema derivation, validation and decoding
//!
//! Every type that takes part in a model implements [`Reflect`], which hands
//! out a read view ([`Value`]) and a write view ([`ValueMut`]) of itself.
//! Structs implement it through [`impl_model!`](crate::impl_model); the
//! primitives, `String`, `Option`, `Box`, `Vec`, arrays and maps are covered
//! here.
//!
//! Copyright (c) 2025 Tagschema Team
//! Licensed under the Apache-2.0 license

use std::collections::{BTreeMap, HashMap};

use crate::error::ConversionError;
use crate::file::UploadReadable;
use crate::model::Model;
use crate::query::QueryValues;
use crate::schema::SchemaNode;

/// Read view of a described value
pub enum Value<'a> {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(&'a str),
    /// One level of indirection that may be absent
    Pointer(&'a dyn Pointer),
    Seq(&'a dyn Sequence),
    Map(&'a dyn Mapping),
    Struct(&'a dyn Model),
    /// Anything outside the schema taxonomy
    Opaque,
}

/// Write view of a described value
pub enum ValueMut<'a> {
    Scalar(&'a mut dyn ScalarMut),
    Pointer(&'a mut dyn PointerMut),
    Seq(&'a mut dyn SequenceMut),
    Struct(&'a mut dyn Model),
    Opaque,
}

/// A type that can describe itself to the schema builder, validator and decoder
pub trait Reflect {
    /// Concrete type name once `Option`/`Box` indirection is unwrapped
    fn type_name(&self) -> &'static str;

    fn value(&self) -> Value<'_>;

    fn value_mut(&mut self) -> ValueMut<'_>;

    /// Types that hand out their own schema instead of being walked
    fn as_self_describing(&self) -> Option<&dyn SelfDescribing> {
        None
    }

    /// Whether the type can load itself from a file upload (maps to `File`)
    fn is_upload(&self) -> bool {
        false
    }

    fn as_upload_mut(&mut self) -> Option<&mut dyn UploadReadable> {
        None
    }

    /// Types that decode the flat query map themselves
    fn as_self_decoding(&mut self) -> Option<&mut dyn SelfDecoding> {
        None
    }
}

/// Escape hatch for hand-authored schemas
pub trait SelfDescribing {
    fn schema(&self) -> SchemaNode;
}

/// Custom decoding from a flat query map
pub trait SelfDecoding {
    fn decode_query(&mut self, values: &QueryValues) -> anyhow::Result<()>;
}

pub trait Pointer {
    fn pointee(&self) -> Option<&dyn Reflect>;

    /// A freshly allocated zero value of the pointee type
    fn zero_pointee(&self) -> Box<dyn Reflect>;
}

pub trait PointerMut {
    fn is_absent(&self) -> bool;

    /// Allocates a zero pointee when absent
    fn pointee_or_insert(&mut self) -> &mut dyn Reflect;

    /// Drops the pointee
    fn clear(&mut self);
}

pub trait Sequence {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn element(&self, index: usize) -> Option<&dyn Reflect>;

    /// Zero value of the declared element type
    fn zero_element(&self) -> Box<dyn Reflect>;
}

pub trait SequenceMut {
    /// Replaces the whole sequence with one element per text value
    fn assign_texts(&mut self, texts: &[String]) -> Result<(), ConversionError>;
}

pub trait Mapping {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> Vec<(&dyn Reflect, &dyn Reflect)>;
}

pub trait ScalarMut {
    fn set_text(&mut self, text: &str) -> Result<(), ConversionError>;
}

impl Value<'_> {
    /// Zero value test: false, 0, "", empty collections, absent pointers and
    /// structs whose fields are all zero
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::Uint(u) => *u == 0,
            Value::Float(f) => *f == 0.0,
            Value::Str(s) => s.is_empty(),
            Value::Pointer(p) => p.pointee().is_none(),
            Value::Seq(s) => s.is_empty(),
            Value::Map(m) => m.is_empty(),
            Value::Struct(model) => model
                .fields()
                .iter()
                .all(|field| field.value.value().is_zero()),
            Value::Opaque => true,
        }
    }
}

/// Follows pointer indirection without allocating; `None` when absent
pub fn indirect(value: &dyn Reflect) -> Option<&dyn Reflect> {
    match value.value() {
        Value::Pointer(pointer) => pointer.pointee().and_then(indirect),
        _ => Some(value),
    }
}

/// Generic string coercion of a scalar value
pub fn scalar_text(value: &dyn Reflect) -> Result<String, ConversionError> {
    match value.value() {
        Value::Bool(b) => Ok(b.to_string()),
        Value::Int(i) => Ok(i.to_string()),
        Value::Uint(u) => Ok(u.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        Value::Str(s) => Ok(s.to_owned()),
        Value::Pointer(pointer) => match pointer.pointee() {
            Some(inner) => scalar_text(inner),
            None => Err(ConversionError::new("", "string", "pointer is absent")),
        },
        _ => Err(ConversionError::unsupported(
            format!("<{}>", value.type_name()),
            "string",
        )),
    }
}

/// Coerces a scalar value to a 64-bit float
pub fn scalar_number(value: &dyn Reflect) -> Result<f64, ConversionError> {
    match value.value() {
        Value::Int(i) => Ok(i as f64),
        Value::Uint(u) => Ok(u as f64),
        Value::Float(f) => Ok(f),
        Value::Str(s) => s
            .trim()
            .parse()
            .map_err(|e| ConversionError::new(s, "f64", e)),
        Value::Pointer(pointer) => match pointer.pointee() {
            Some(inner) => scalar_number(inner),
            None => Err(ConversionError::new("", "f64", "pointer is absent")),
        },
        _ => Err(ConversionError::unsupported(
            format!("<{}>", value.type_name()),
            "f64",
        )),
    }
}

/// Runs `f` on the pointee, allocating it first when absent
///
/// A pointee allocated for a failing `f` is dropped again, leaving the
/// pointer absent.
pub fn with_pointee<R, E>(
    pointer: &mut dyn PointerMut,
    f: impl FnOnce(&mut dyn Reflect) -> Result<R, E>,
) -> Result<R, E> {
    let allocated = pointer.is_absent();
    let result = f(pointer.pointee_or_insert());
    if result.is_err() && allocated {
        pointer.clear();
    }
    result
}

/// Stores `text` into a scalar, allocating through pointer levels
pub fn assign_text(target: &mut dyn Reflect, text: &str) -> Result<(), ConversionError> {
    let type_name = target.type_name();
    match target.value_mut() {
        ValueMut::Scalar(scalar) => scalar.set_text(text),
        ValueMut::Pointer(pointer) => with_pointee(pointer, |inner| assign_text(inner, text)),
        _ => Err(ConversionError::unsupported(text, type_name)),
    }
}

/// Accepts the usual spellings of a boolean: 1, t, T, TRUE, true, True and
/// their false counterparts
fn parse_bool(text: &str) -> Result<bool, ConversionError> {
    match text {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err(ConversionError::new(text, "bool", "invalid syntax")),
    }
}

impl Reflect for bool {
    fn type_name(&self) -> &'static str {
        "bool"
    }

    fn value(&self) -> Value<'_> {
        Value::Bool(*self)
    }

    fn value_mut(&mut self) -> ValueMut<'_> {
        ValueMut::Scalar(self)
    }
}

impl ScalarMut for bool {
    fn set_text(&mut self, text: &str) -> Result<(), ConversionError> {
        *self = parse_bool(text)?;
        Ok(())
    }
}

macro_rules! impl_number {
    ($($ty:ty => $variant:ident as $wide:ty),* $(,)?) => {
        $(
            impl Reflect for $ty {
                fn type_name(&self) -> &'static str {
                    stringify!($ty)
                }

                fn value(&self) -> Value<'_> {
                    Value::$variant(*self as $wide)
                }

                fn value_mut(&mut self) -> ValueMut<'_> {
                    ValueMut::Scalar(self)
                }
            }

            impl ScalarMut for $ty {
                fn set_text(&mut self, text: &str) -> Result<(), ConversionError> {
                    *self = text
                        .parse::<$ty>()
                        .map_err(|e| ConversionError::new(text, stringify!($ty), e))?;
                    Ok(())
                }
            }
        )*
    };
}

impl_number! {
    i8 => Int as i64,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int as i64,
    isize => Int as i64,
    u8 => Uint as u64,
    u16 => Uint as u64,
    u32 => Uint as u64,
    u64 => Uint as u64,
    usize => Uint as u64,
    f32 => Float as f64,
    f64 => Float as f64,
}

impl Reflect for String {
    fn type_name(&self) -> &'static str {
        "String"
    }

    fn value(&self) -> Value<'_> {
        Value::Str(self)
    }

    fn value_mut(&mut self) -> ValueMut<'_> {
        ValueMut::Scalar(self)
    }
}

impl ScalarMut for String {
    fn set_text(&mut self, text: &str) -> Result<(), ConversionError> {
        text.clone_into(self);
        Ok(())
    }
}

/// The unit type stands for an unresolved or absent type
impl Reflect for () {
    fn type_name(&self) -> &'static str {
        "()"
    }

    fn value(&self) -> Value<'_> {
        Value::Opaque
    }

    fn value_mut(&mut self) -> ValueMut<'_> {
        ValueMut::Opaque
    }
}

impl<T: Reflect + Default + 'static> Reflect for Option<T> {
    fn type_name(&self) -> &'static str {
        match self {
            Some(inner) => inner.type_name(),
            None => T::default().type_name(),
        }
    }

    fn value(&self) -> Value<'_> {
        Value::Pointer(self)
    }

    fn value_mut(&mut self) -> ValueMut<'_> {
        ValueMut::Pointer(self)
    }
}

impl<T: Reflect + Default + 'static> Pointer for Option<T> {
    fn pointee(&self) -> Option<&dyn Reflect> {
        self.as_ref().map(|inner| inner as &dyn Reflect)
    }

    fn zero_pointee(&self) -> Box<dyn Reflect> {
        Box::new(T::default())
    }
}

impl<T: Reflect + Default + 'static> PointerMut for Option<T> {
    fn is_absent(&self) -> bool {
        self.is_none()
    }

    fn pointee_or_insert(&mut self) -> &mut dyn Reflect {
        self.get_or_insert_with(T::default)
    }

    fn clear(&mut self) {
        *self = None;
    }
}

/// Boxes are transparent: recursive models box their self references
impl<T: Reflect + ?Sized> Reflect for Box<T> {
    fn type_name(&self) -> &'static str {
        (**self).type_name()
    }

    fn value(&self) -> Value<'_> {
        (**self).value()
    }

    fn value_mut(&mut self) -> ValueMut<'_> {
        (**self).value_mut()
    }

    fn as_self_describing(&self) -> Option<&dyn SelfDescribing> {
        (**self).as_self_describing()
    }

    fn is_upload(&self) -> bool {
        (**self).is_upload()
    }

    fn as_upload_mut(&mut self) -> Option<&mut dyn UploadReadable> {
        (**self).as_upload_mut()
    }

    fn as_self_decoding(&mut self) -> Option<&mut dyn SelfDecoding> {
        (**self).as_self_decoding()
    }
}

/// A slot holding a value of any described type
///
/// Sequences of `Dynamic` are the only sequences whose elements can differ in
/// concrete type; schema derivation rejects them when they do.
pub struct Dynamic(pub Box<dyn Reflect>);

impl Dynamic {
    pub fn new<T: Reflect + 'static>(value: T) -> Self {
        Self(Box::new(value))
    }
}

impl Default for Dynamic {
    fn default() -> Self {
        Self(Box::new(()))
    }
}

impl Reflect for Dynamic {
    fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    fn value(&self) -> Value<'_> {
        self.0.value()
    }

    fn value_mut(&mut self) -> ValueMut<'_> {
        self.0.value_mut()
    }

    fn as_self_describing(&self) -> Option<&dyn SelfDescribing> {
        self.0.as_self_describing()
    }

    fn is_upload(&self) -> bool {
        self.0.is_upload()
    }

    fn as_upload_mut(&mut self) -> Option<&mut dyn UploadReadable> {
        self.0.as_upload_mut()
    }

    fn as_self_decoding(&mut self) -> Option<&mut dyn SelfDecoding> {
        self.0.as_self_decoding()
    }
}

impl<T: Reflect + Default + 'static> Reflect for Vec<T> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn value(&self) -> Value<'_> {
        Value::Seq(self)
    }

    fn value_mut(&mut self) -> ValueMut<'_> {
        ValueMut::Seq(self)
    }
}

impl<T: Reflect + Default + 'static> Sequence for Vec<T> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn element(&self, index: usize) -> Option<&dyn Reflect> {
        self.get(index).map(|item| item as &dyn Reflect)
    }

    fn zero_element(&self) -> Box<dyn Reflect> {
        Box::new(T::default())
    }
}

impl<T: Reflect + Default + 'static> SequenceMut for Vec<T> {
    fn assign_texts(&mut self, texts: &[String]) -> Result<(), ConversionError> {
        let mut items = Vec::with_capacity(texts.len());
        for text in texts {
            let mut item = T::default();
            assign_text(&mut item, text)?;
            items.push(item);
        }
        *self = items;
        Ok(())
    }
}

/// Fixed-size arrays are described but cannot be decoded
impl<T: Reflect + Default + 'static, const N: usize> Reflect for [T; N] {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn value(&self) -> Value<'_> {
        Value::Seq(self)
    }

    fn value_mut(&mut self) -> ValueMut<'_> {
        ValueMut::Opaque
    }
}

impl<T: Reflect + Default + 'static, const N: usize> Sequence for [T; N] {
    fn len(&self) -> usize {
        N
    }

    fn element(&self, index: usize) -> Option<&dyn Reflect> {
        self.get(index).map(|item| item as &dyn Reflect)
    }

    fn zero_element(&self) -> Box<dyn Reflect> {
        Box::new(T::default())
    }
}

macro_rules! impl_map {
    ($($map:ident),*) => {
        $(
            impl<K: Reflect + 'static, V: Reflect + 'static> Reflect for $map<K, V> {
                fn type_name(&self) -> &'static str {
                    std::any::type_name::<Self>()
                }

                fn value(&self) -> Value<'_> {
                    Value::Map(self)
                }

                fn value_mut(&mut self) -> ValueMut<'_> {
                    ValueMut::Opaque
                }
            }

            impl<K: Reflect + 'static, V: Reflect + 'static> Mapping for $map<K, V> {
                fn len(&self) -> usize {
                    $map::len(self)
                }

                fn entries(&self) -> Vec<(&dyn Reflect, &dyn Reflect)> {
                    self.iter()
                        .map(|(key, value)| (key as &dyn Reflect, value as &dyn Reflect))
                        .collect()
                }
            }
        )*
    };
}

impl_map!(HashMap, BTreeMap);
