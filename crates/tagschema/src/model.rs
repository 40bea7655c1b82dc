//! Named composites and the field flattening shared by every walk
//!
//! Embedded fields are flattened into their parent: a parent's own fields come
//! first in declaration order, then the promoted fields of each embedded
//! value, skipping any whose declared name is already taken by a shallower or
//! earlier field (first declared wins). Fields tagged with the ignore
//! sentinel are skipped but still shadow promoted fields of the same name.

use std::collections::HashSet;
use tracing::trace;

use crate::reflect::{Reflect, Value, ValueMut};
use crate::tag::{StructTag, TagKeys};

/// Static description of one declared field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    /// Declared field name
    pub name: &'static str,
    /// Raw struct tag
    pub tag: &'static str,
    /// Whether the field's own fields are promoted into the parent
    pub embedded: bool,
}

impl FieldDef {
    pub const fn new(name: &'static str, tag: &'static str) -> Self {
        Self {
            name,
            tag,
            embedded: false,
        }
    }

    pub const fn embedded(mut self) -> Self {
        self.embedded = true;
        self
    }

    pub fn struct_tag(&self) -> StructTag<'static> {
        StructTag::new(self.tag)
    }
}

pub struct Field<'a> {
    pub def: FieldDef,
    pub value: &'a dyn Reflect,
}

impl<'a> Field<'a> {
    pub fn new(def: FieldDef, value: &'a dyn Reflect) -> Self {
        Self { def, value }
    }
}

pub struct FieldMut<'a> {
    pub def: FieldDef,
    pub value: &'a mut dyn Reflect,
}

impl<'a> FieldMut<'a> {
    pub fn new(def: FieldDef, value: &'a mut dyn Reflect) -> Self {
        Self { def, value }
    }
}

/// A named struct-like composite
pub trait Model {
    fn namespace(&self) -> &'static str;

    fn model_name(&self) -> &'static str;

    /// Fields in declaration order
    fn fields(&self) -> Vec<Field<'_>>;

    fn fields_mut(&mut self) -> Vec<FieldMut<'_>>;

    /// Stable identifier used for cross references
    fn identifier(&self) -> String {
        format!("{}.{}", self.namespace(), self.model_name())
    }
}

/// A field after flattening, with its external property name resolved
pub struct FlatField<'a> {
    pub def: FieldDef,
    pub property: String,
    pub value: &'a dyn Reflect,
}

pub struct FlatFieldMut<'a> {
    pub def: FieldDef,
    pub property: String,
    pub value: &'a mut dyn Reflect,
}

/// Runs `f` on the struct behind `value`, allocating zero pointees on the way
///
/// Returns `None` when there is no struct underneath.
pub fn with_struct<R>(value: &dyn Reflect, f: &mut dyn FnMut(&dyn Model) -> R) -> Option<R> {
    match value.value() {
        Value::Pointer(pointer) => match pointer.pointee() {
            Some(inner) => with_struct(inner, f),
            None => with_struct(pointer.zero_pointee().as_ref(), f),
        },
        Value::Struct(model) => Some(f(model)),
        _ => None,
    }
}

/// Mutable counterpart of [`with_struct`]; absent pointees are stored
pub fn with_struct_mut<R>(
    value: &mut dyn Reflect,
    f: &mut dyn FnMut(&mut dyn Model) -> R,
) -> Option<R> {
    match value.value_mut() {
        ValueMut::Pointer(pointer) => with_struct_mut(pointer.pointee_or_insert(), f),
        ValueMut::Struct(model) => Some(f(model)),
        _ => None,
    }
}

/// Visits the flattened fields of `model` in order
///
/// An embedded composite whose model is already being flattened further up
/// the same path contributes nothing, so self-embedding models terminate.
pub fn walk_fields<E>(
    model: &dyn Model,
    keys: &TagKeys,
    visit: &mut dyn FnMut(FlatField<'_>) -> Result<(), E>,
) -> Result<(), E> {
    walk_flattened(model, keys, &mut vec![model.identifier()], visit)
}

fn walk_flattened<E>(
    model: &dyn Model,
    keys: &TagKeys,
    path: &mut Vec<String>,
    visit: &mut dyn FnMut(FlatField<'_>) -> Result<(), E>,
) -> Result<(), E> {
    let mut seen = HashSet::new();
    let mut embedded = Vec::new();
    for field in model.fields() {
        let tag = field.def.struct_tag();
        if field.def.embedded {
            if !keys.is_ignored(&tag) {
                embedded.push(field.value);
            }
            continue;
        }
        seen.insert(field.def.name);
        if keys.is_ignored(&tag) {
            continue;
        }
        visit(FlatField {
            def: field.def,
            property: keys.property_name(&tag, field.def.name),
            value: field.value,
        })?;
    }

    for value in embedded {
        let promoted = with_struct(value, &mut |inner: &dyn Model| {
            let identifier = inner.identifier();
            if path.contains(&identifier) {
                trace!(model = %identifier, "skipping recursive embedding");
                return Ok(());
            }
            path.push(identifier);
            let walked = walk_flattened(inner, keys, path, &mut |flat: FlatField<'_>| {
                if seen.insert(flat.def.name) {
                    visit(flat)
                } else {
                    Ok(())
                }
            });
            path.pop();
            walked
        });
        promoted.unwrap_or(Ok(()))?;
    }
    Ok(())
}

/// Mutable counterpart of [`walk_fields`]; absent embedded pointers are
/// allocated before their fields are visited
///
/// Recursive embeddings are detected before anything is allocated.
pub fn walk_fields_mut<E>(
    model: &mut dyn Model,
    keys: &TagKeys,
    visit: &mut dyn FnMut(FlatFieldMut<'_>) -> Result<(), E>,
) -> Result<(), E> {
    let mut path = vec![model.identifier()];
    walk_flattened_mut(model, keys, &mut path, visit)
}

fn walk_flattened_mut<E>(
    model: &mut dyn Model,
    keys: &TagKeys,
    path: &mut Vec<String>,
    visit: &mut dyn FnMut(FlatFieldMut<'_>) -> Result<(), E>,
) -> Result<(), E> {
    let mut seen = HashSet::new();
    let mut embedded = Vec::new();
    for field in model.fields_mut() {
        let tag = field.def.struct_tag();
        if field.def.embedded {
            if !keys.is_ignored(&tag) {
                embedded.push(field.value);
            }
            continue;
        }
        seen.insert(field.def.name);
        if keys.is_ignored(&tag) {
            continue;
        }
        visit(FlatFieldMut {
            def: field.def,
            property: keys.property_name(&tag, field.def.name),
            value: field.value,
        })?;
    }

    for value in embedded {
        let Some(identifier) = with_struct(&*value, &mut |inner: &dyn Model| inner.identifier())
        else {
            continue;
        };
        if path.contains(&identifier) {
            trace!(model = %identifier, "skipping recursive embedding");
            continue;
        }
        path.push(identifier);
        let promoted = with_struct_mut(value, &mut |inner: &mut dyn Model| {
            walk_flattened_mut(inner, keys, path, &mut |flat: FlatFieldMut<'_>| {
                if seen.insert(flat.def.name) {
                    visit(flat)
                } else {
                    Ok(())
                }
            })
        });
        path.pop();
        promoted.unwrap_or(Ok(()))?;
    }
    Ok(())
}

/// Implements [`Reflect`] and [`Model`] for a struct from its field list
///
/// Each entry is `field: "struct tag"`; embedded fields are marked
/// `field(embedded): "tag"`. The namespace defaults to the invoking module.
///
/// ```
/// use tagschema::impl_model;
///
/// #[derive(Default)]
/// struct Audit {
///     created_by: String,
/// }
///
/// #[derive(Default)]
/// struct Login {
///     username: String,
///     remember: Option<bool>,
///     audit: Option<Audit>,
/// }
///
/// impl_model!(Audit { created_by: r#"json:"created_by""# });
/// impl_model!(Login in "accounts" {
///     username: r#"json:"username" schema:"required; minLen:3""#,
///     remember: r#"json:"remember""#,
///     audit(embedded): "",
/// });
/// ```
#[macro_export]
macro_rules! impl_model {
    (@model $ty:ident, ($namespace:expr), { $( $field:ident $( ($flag:ident) )? : $tag:literal ),* $(,)? }) => {
        impl $crate::Reflect for $ty {
            fn type_name(&self) -> &'static str {
                ::std::any::type_name::<$ty>()
            }

            fn value(&self) -> $crate::Value<'_> {
                $crate::Value::Struct(self)
            }

            fn value_mut(&mut self) -> $crate::ValueMut<'_> {
                $crate::ValueMut::Struct(self)
            }
        }

        impl $crate::Model for $ty {
            fn namespace(&self) -> &'static str {
                $namespace
            }

            fn model_name(&self) -> &'static str {
                stringify!($ty)
            }

            fn fields(&self) -> ::std::vec::Vec<$crate::Field<'_>> {
                ::std::vec![
                    $(
                        $crate::Field::new(
                            $crate::FieldDef::new(stringify!($field), $tag) $( .$flag() )?,
                            &self.$field,
                        )
                    ),*
                ]
            }

            fn fields_mut(&mut self) -> ::std::vec::Vec<$crate::FieldMut<'_>> {
                ::std::vec![
                    $(
                        $crate::FieldMut::new(
                            $crate::FieldDef::new(stringify!($field), $tag) $( .$flag() )?,
                            &mut self.$field,
                        )
                    ),*
                ]
            }
        }
    };
    ($ty:ident in $namespace:literal { $($body:tt)* }) => {
        $crate::impl_model!(@model $ty, ($namespace), { $($body)* });
    };
    ($ty:ident { $($body:tt)* }) => {
        $crate::impl_model!(@model $ty, (::std::module_path!()), { $($body)* });
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::scalar_text;

    #[derive(Default)]
    struct Inner {
        shared: String,
        extra: i32,
    }

    #[derive(Default)]
    struct Middle {
        shared: String,
        inner: Option<Box<Inner>>,
    }

    #[derive(Default)]
    struct Outer {
        shared: String,
        hidden: String,
        middle: Middle,
        skipped: Option<Inner>,
    }

    crate::impl_model!(Inner in "flat" {
        shared: r#"json:"inner_shared""#,
        extra: r#"json:"extra""#,
    });
    crate::impl_model!(Middle in "flat" {
        shared: r#"json:"middle_shared""#,
        inner(embedded): "",
    });
    crate::impl_model!(Outer in "flat" {
        shared: r#"json:"shared""#,
        hidden: r#"json:"-""#,
        middle(embedded): "",
        skipped(embedded): r#"json:"-""#,
    });

    fn properties(model: &dyn Model) -> Vec<(String, String)> {
        let mut out = Vec::new();
        walk_fields::<()>(model, &TagKeys::default(), &mut |field| {
            out.push((field.property, scalar_text(field.value).unwrap()));
            Ok(())
        })
        .unwrap();
        out
    }

    #[test]
    fn test_first_declared_wins() {
        let outer = Outer {
            shared: "outer".into(),
            middle: Middle {
                shared: "middle".into(),
                inner: Some(Box::new(Inner {
                    shared: "inner".into(),
                    extra: 7,
                })),
            },
            ..Default::default()
        };
        assert_eq!(
            properties(&outer),
            vec![
                ("shared".to_string(), "outer".to_string()),
                ("extra".to_string(), "7".to_string()),
            ]
        );
    }

    #[test]
    fn test_absent_embedded_reads_zero_value() {
        let middle = Middle::default();
        assert_eq!(
            properties(&middle),
            vec![
                ("middle_shared".to_string(), String::new()),
                ("extra".to_string(), "0".to_string()),
            ]
        );
        let names: Vec<_> = {
            let mut names = Vec::new();
            walk_fields::<()>(&Inner::default(), &TagKeys::default(), &mut |f| {
                names.push(f.def.name);
                Ok(())
            })
            .unwrap();
            names
        };
        assert_eq!(names, vec!["shared", "extra"]);
    }

    #[test]
    fn test_walk_mut_allocates_embedded() {
        let mut middle = Middle::default();
        walk_fields_mut::<()>(&mut middle, &TagKeys::default(), &mut |field| {
            if field.property == "extra" {
                crate::reflect::assign_text(field.value, "42").unwrap();
            }
            Ok(())
        })
        .unwrap();
        assert_eq!(middle.inner.as_ref().map(|inner| inner.extra), Some(42));
    }

    #[derive(Default)]
    struct Left {
        left: String,
        right: Option<Box<Right>>,
    }

    #[derive(Default)]
    struct Right {
        right: String,
        left: Option<Box<Left>>,
        again: Option<Box<Right>>,
    }

    crate::impl_model!(Left in "flat" {
        left: r#"json:"left""#,
        right(embedded): "",
    });
    crate::impl_model!(Right in "flat" {
        right: r#"json:"right""#,
        left(embedded): "",
        again(embedded): "",
    });

    #[test]
    fn test_recursive_embedding_terminates() {
        let left = Left {
            left: "l".into(),
            right: Some(Box::new(Right {
                right: "r".into(),
                ..Default::default()
            })),
        };
        assert_eq!(
            properties(&left),
            vec![
                ("left".to_string(), "l".to_string()),
                ("right".to_string(), "r".to_string()),
            ]
        );
        assert_eq!(
            properties(&Right::default()),
            vec![
                ("right".to_string(), String::new()),
                ("left".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_recursive_embedding_is_not_allocated() {
        let mut right = Right::default();
        let mut names = Vec::new();
        walk_fields_mut::<()>(&mut right, &TagKeys::default(), &mut |field| {
            names.push(field.property);
            Ok(())
        })
        .unwrap();
        assert_eq!(names, vec!["right", "left"]);
        assert!(right.again.is_none());
        let left = right.left.as_ref().unwrap();
        assert!(left.right.is_none());
    }

    #[test]
    fn test_identifier() {
        assert_eq!(Outer::default().identifier(), "flat.Outer");
        assert_eq!(Outer::default().model_name(), "Outer");
    }

    #[test]
    fn test_walk_stops_on_error() {
        let outer = Outer::default();
        let mut visited = 0;
        let result = walk_fields(&outer, &TagKeys::default(), &mut |_| {
            visited += 1;
            Err("stop")
        });
        assert_eq!(result, Err("stop"));
        assert_eq!(visited, 1);
    }
}
