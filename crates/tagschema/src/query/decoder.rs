//! Query decoder: fills a described model from a [`QueryValues`] map
//!
//! Fields are matched by external property name, flattening embedded fields
//! the same way schema derivation does. Missing keys leave fields untouched.
//!
//! Copyright (c) 2025 Tagschema Team
//! Licensed under the Apache-2.0 license

use tracing::{debug, trace};

use super::values::QueryValues;
use crate::error::{Error, Result};
use crate::model::{walk_fields_mut, FlatFieldMut, Model};
use crate::reflect::{with_pointee, Reflect, ValueMut};
use crate::tag::TagKeys;

/// Decodes flat query maps into models
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    keys: TagKeys,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tag_keys(mut self, keys: TagKeys) -> Self {
        self.keys = keys;
        self
    }

    /// Decodes `values` into `target`, which must be struct-like or decode
    /// itself
    ///
    /// Fields set before a failing field keep their new values. An absent
    /// pointer allocated for the failing field is left absent.
    pub fn decode(&self, values: &QueryValues, target: &mut dyn Reflect) -> Result<()> {
        let type_name = target.type_name();
        if let Some(custom) = target.as_self_decoding() {
            debug!(type_name, "delegating to custom decoder");
            return custom
                .decode_query(values)
                .map_err(|source| Error::Custom { type_name, source });
        }
        match target.value_mut() {
            ValueMut::Pointer(pointer) => with_pointee(pointer, |inner| self.decode(values, inner)),
            ValueMut::Struct(model) => self.decode_model(values, model),
            _ => Err(Error::Shape {
                operation: "query decoding",
                type_name,
            }),
        }
    }

    /// Parses `query` and decodes it into `target`
    pub fn decode_str(&self, query: &str, target: &mut dyn Reflect) -> Result<()> {
        self.decode(&QueryValues::parse(query)?, target)
    }

    fn decode_model(&self, values: &QueryValues, model: &mut dyn Model) -> Result<()> {
        walk_fields_mut(model, &self.keys, &mut |field: FlatFieldMut<'_>| {
            match values.get(&field.property) {
                Some(found) if !found.is_empty() => {
                    trace!(property = %field.property, count = found.len(), "decoding field");
                    self.assign(found, field.value)
                }
                _ => Ok(()),
            }
        })
    }

    /// Sequences take every value; everything else takes the first
    fn assign(&self, found: &[String], target: &mut dyn Reflect) -> Result<()> {
        let Some(first) = found.first() else {
            return Ok(());
        };
        let type_name = target.type_name();
        if target.as_self_decoding().is_some() {
            return self.decode(&QueryValues::parse(first)?, target);
        }
        match target.value_mut() {
            ValueMut::Pointer(pointer) => with_pointee(pointer, |inner| self.assign(found, inner)),
            ValueMut::Seq(sequence) => Ok(sequence.assign_texts(found)?),
            ValueMut::Struct(model) => self.decode_model(&QueryValues::parse(first)?, model),
            ValueMut::Scalar(scalar) => Ok(scalar.set_text(first)?),
            ValueMut::Opaque => Err(Error::Unsupported { type_name }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::SelfDecoding;

    #[derive(Default, Debug, PartialEq)]
    struct Paging {
        page: u32,
        size: Option<u16>,
    }

    #[derive(Default, Debug, PartialEq)]
    struct Search {
        q: String,
        ids: Vec<i64>,
        paging: Paging,
        hidden: bool,
    }

    crate::impl_model!(Paging in "search" {
        page: r#"json:"page""#,
        size: r#"json:"size""#,
    });
    crate::impl_model!(Search in "search" {
        q: r#"json:"q""#,
        ids: r#"json:"ids""#,
        paging: r#"json:"paging""#,
        hidden: r#"json:"-""#,
    });

    #[test]
    fn test_decode_fields() {
        let mut search = Search::default();
        Decoder::new()
            .decode_str("q=rust&ids=3&ids=-4&paging=page%3D2%26size%3D50&hidden=true", &mut search)
            .unwrap();
        assert_eq!(
            search,
            Search {
                q: "rust".into(),
                ids: vec![3, -4],
                paging: Paging {
                    page: 2,
                    size: Some(50)
                },
                hidden: false,
            }
        );
    }

    #[test]
    fn test_missing_keys_leave_fields() {
        let mut search = Search {
            q: "kept".into(),
            ..Default::default()
        };
        let mut values = QueryValues::new();
        values.insert("ids", Vec::new());
        Decoder::new().decode(&values, &mut search).unwrap();
        assert_eq!(search.q, "kept");
        assert!(search.ids.is_empty());
    }

    #[test]
    fn test_conversion_failure_aborts() {
        let mut search = Search::default();
        let err = Decoder::new()
            .decode_str("ids=1&paging=page%3Dtwo&q=late", &mut search)
            .unwrap_err();
        assert!(matches!(err, Error::Conversion(ref e) if e.target == "u32"));
        assert_eq!(search.ids, vec![1]);
    }

    #[derive(Default, Debug, PartialEq)]
    struct Optional {
        label: String,
        count: Option<i32>,
        paging: Option<Paging>,
    }

    crate::impl_model!(Optional in "search" {
        label: r#"json:"label""#,
        count: r#"json:"count""#,
        paging: r#"json:"paging""#,
    });

    #[test]
    fn test_failed_field_stays_absent() {
        let cases = [
            "label=set&count=abc",
            "label=set&paging=page%3Dx",
            "label=set&paging=page%3D%25zz",
        ];
        for query in cases {
            let mut target = Optional::default();
            assert!(Decoder::new().decode_str(query, &mut target).is_err(), "query {query}");
            assert_eq!(
                target,
                Optional {
                    label: "set".into(),
                    ..Default::default()
                },
                "query {query}"
            );
        }

        let mut root: Option<Paging> = None;
        assert!(Decoder::new().decode_str("page=-1", &mut root).is_err());
        assert_eq!(root, None);
    }

    #[derive(Default)]
    struct Chain {
        label: String,
        parent: Option<Box<Chain>>,
    }

    crate::impl_model!(Chain in "search" {
        label: r#"json:"label""#,
        parent(embedded): "",
    });

    #[test]
    fn test_self_embedding_decodes() {
        let mut chain = Chain::default();
        Decoder::new().decode_str("label=tail", &mut chain).unwrap();
        assert_eq!(chain.label, "tail");
        assert!(chain.parent.is_none());
    }

    #[test]
    fn test_non_struct_target() {
        let mut numbers = vec![1u8];
        let err = Decoder::new()
            .decode(&QueryValues::new(), &mut numbers)
            .unwrap_err();
        assert!(matches!(err, Error::Shape { operation: "query decoding", .. }));
    }

    #[derive(Default)]
    struct Csv(Vec<String>);

    impl Reflect for Csv {
        fn type_name(&self) -> &'static str {
            "Csv"
        }

        fn value(&self) -> crate::reflect::Value<'_> {
            crate::reflect::Value::Opaque
        }

        fn value_mut(&mut self) -> ValueMut<'_> {
            ValueMut::Opaque
        }

        fn as_self_decoding(&mut self) -> Option<&mut dyn SelfDecoding> {
            Some(self)
        }
    }

    impl SelfDecoding for Csv {
        fn decode_query(&mut self, values: &QueryValues) -> anyhow::Result<()> {
            let raw = values
                .first("items")
                .ok_or_else(|| anyhow::anyhow!("items missing"))?;
            self.0 = raw.split(',').map(str::to_string).collect();
            Ok(())
        }
    }

    #[test]
    fn test_self_decoding_root_and_field() {
        let mut csv = Csv::default();
        Decoder::new().decode_str("items=a,b", &mut csv).unwrap();
        assert_eq!(csv.0, vec!["a", "b"]);

        let err = Decoder::new().decode_str("other=1", &mut csv).unwrap_err();
        assert!(matches!(err, Error::Custom { type_name: "Csv", .. }));

        #[derive(Default)]
        struct Holder {
            list: Option<Csv>,
        }
        crate::impl_model!(Holder in "search" { list: r#"json:"list""# });

        let mut holder = Holder::default();
        Decoder::new()
            .decode_str("list=items%3Dx%2Cy", &mut holder)
            .unwrap();
        assert_eq!(holder.list.map(|csv| csv.0), Some(vec!["x".to_string(), "y".to_string()]));
    }
}
