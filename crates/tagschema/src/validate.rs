//! Schema validation
//!
//! The validator walks a schema tree and a value in lock step and stops at the
//! first broken rule. Object nodes recurse into their properties in property
//! order; every other node checks its own constraints. A reference
//! placeholder is checked against the model it names whenever the value
//! underneath it is present; absent values skip it, which keeps the walk as
//! deep as the value itself.
//!
//! Copyright (c) 2025 Tagschema Team
//! Licensed under the Apache-2.0 license

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::constraint::{Constraint, Violation};
use crate::error::{Error, Result};
use crate::kind::Kind;
use crate::model::{walk_fields, FlatField, Model};
use crate::pattern::PatternCache;
use crate::reflect::{indirect, scalar_number, scalar_text, Mapping, Reflect, Value};
use crate::schema::{Properties, SchemaNode};
use crate::tag::TagKeys;

/// Named models of the schema being checked, by identifier
type Models<'s> = BTreeMap<String, &'s SchemaNode>;

/// Reason a field walk was cut short
enum Halt {
    Found(Violation),
    Failed(Error),
}

/// Checks values against derived schemas
#[derive(Debug, Clone)]
pub struct Validator {
    keys: TagKeys,
    patterns: Arc<PatternCache>,
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            keys: TagKeys::default(),
            patterns: PatternCache::global(),
        }
    }
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag keys must match the ones the schema was derived with
    pub fn with_tag_keys(mut self, keys: TagKeys) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_pattern_cache(mut self, patterns: Arc<PatternCache>) -> Self {
        self.patterns = patterns;
        self
    }

    /// Returns the first violation found, or `None` when `value` conforms
    pub fn validate(&self, schema: &SchemaNode, value: &dyn Reflect) -> Result<Option<Violation>> {
        let models = schema.models();
        let found = self.check(schema, Some(value), &models)?;
        if let Some(violation) = &found {
            debug!(field = %violation.field, "validation failed");
        }
        Ok(found)
    }

    fn check(
        &self,
        node: &SchemaNode,
        value: Option<&dyn Reflect>,
        models: &Models<'_>,
    ) -> Result<Option<Violation>> {
        if let Some(reference) = &node.reference {
            return match (value.and_then(indirect), models.get(reference)) {
                (Some(value), Some(target)) => self.check(target, Some(value), models),
                _ => Ok(None),
            };
        }
        match node.kind() {
            Kind::Object => match &node.properties {
                Some(properties) => self.check_object(properties, value, models),
                None => Ok(None),
            },
            kind => match &node.constraints {
                Some(constraint) => self.check_leaf(node, kind, constraint, value),
                None => Ok(None),
            },
        }
    }

    fn check_leaf(
        &self,
        node: &SchemaNode,
        kind: Kind,
        constraint: &Constraint,
        value: Option<&dyn Reflect>,
    ) -> Result<Option<Violation>> {
        let present = value
            .and_then(indirect)
            .filter(|value| !value.value().is_zero());
        let Some(value) = present else {
            if constraint.required {
                return Ok(Some(Violation::new(node.name.as_str(), Constraint::required())));
            }
            return Ok(None);
        };

        let broken = match kind {
            Kind::String => constraint.check_text(&scalar_text(value)?, &self.patterns)?,
            Kind::Number => constraint.check_number(scalar_number(value)?)?,
            Kind::Array => match value.value() {
                Value::Seq(sequence) => constraint.check_count(sequence.len()),
                _ => None,
            },
            _ => None,
        };
        Ok(broken.map(|constraint| Violation::new(node.name.as_str(), constraint)))
    }

    /// An absent object still recurses so nested `required` rules fire
    fn check_object(
        &self,
        properties: &Properties,
        value: Option<&dyn Reflect>,
        models: &Models<'_>,
    ) -> Result<Option<Violation>> {
        let Some(value) = value else {
            return self.check_absent(properties, &HashSet::new(), models);
        };
        match value.value() {
            Value::Pointer(pointer) => match pointer.pointee() {
                Some(inner) => self.check_object(properties, Some(inner), models),
                None => {
                    self.check_object(properties, Some(pointer.zero_pointee().as_ref()), models)
                }
            },
            Value::Struct(model) => self.check_model(properties, model, models),
            Value::Map(mapping) => self.check_mapping(properties, mapping, models),
            _ => Ok(None),
        }
    }

    fn check_model(
        &self,
        properties: &Properties,
        model: &dyn Model,
        models: &Models<'_>,
    ) -> Result<Option<Violation>> {
        let mut checked = HashSet::new();
        let walked = walk_fields(model, &self.keys, &mut |field: FlatField<'_>| {
            let Some(child) = properties.get(&field.property) else {
                return Ok(());
            };
            if !checked.insert(field.property) {
                return Ok(());
            }
            match self.check(child, Some(field.value), models) {
                Ok(None) => Ok(()),
                Ok(Some(violation)) => Err(Halt::Found(violation)),
                Err(err) => Err(Halt::Failed(err)),
            }
        });
        match walked {
            Ok(()) => self.check_absent(properties, &checked, models),
            Err(Halt::Found(violation)) => Ok(Some(violation)),
            Err(Halt::Failed(err)) => Err(err),
        }
    }

    fn check_mapping(
        &self,
        properties: &Properties,
        mapping: &dyn Mapping,
        models: &Models<'_>,
    ) -> Result<Option<Violation>> {
        let mut members = HashMap::with_capacity(mapping.len());
        for (key, value) in mapping.entries() {
            members.insert(scalar_text(key)?, value);
        }
        for (name, child) in properties.iter() {
            if let Some(violation) = self.check(child, members.get(name).copied(), models)? {
                return Ok(Some(violation));
            }
        }
        Ok(None)
    }

    /// Properties with no member in the value, in property order
    fn check_absent(
        &self,
        properties: &Properties,
        checked: &HashSet<String>,
        models: &Models<'_>,
    ) -> Result<Option<Violation>> {
        for (name, child) in properties.iter() {
            if checked.contains(name) {
                continue;
            }
            if let Some(violation) = self.check(child, None, models)? {
                return Ok(Some(violation));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SchemaBuilder;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct Address {
        city: String,
        zip: Option<u32>,
    }

    #[derive(Default)]
    struct Person {
        name: String,
        age: u8,
        tags: Vec<String>,
        address: Option<Address>,
    }

    crate::impl_model!(Address in "people" {
        city: r#"json:"city" schema:"required""#,
        zip: r#"json:"zip" schema:"minNum:10000; maxNum:99999""#,
    });
    crate::impl_model!(Person in "people" {
        name: r#"json:"name" schema:"required; minLen:2""#,
        age: r#"json:"age" schema:"maxExcNum:130""#,
        tags: r#"json:"tags" schema:"maxItems:2""#,
        address: r#"json:"address""#,
    });

    fn setup() -> (SchemaNode, Validator) {
        let patterns = Arc::new(PatternCache::new());
        let schema = SchemaBuilder::new()
            .with_pattern_cache(Arc::clone(&patterns))
            .build(&Person::default())
            .unwrap();
        (schema, Validator::new().with_pattern_cache(patterns))
    }

    fn valid_person() -> Person {
        Person {
            name: "Ada".into(),
            age: 36,
            tags: vec!["math".into()],
            address: Some(Address {
                city: "London".into(),
                zip: None,
            }),
        }
    }

    #[test]
    fn test_valid_value_passes() {
        let (schema, validator) = setup();
        assert_eq!(validator.validate(&schema, &valid_person()).unwrap(), None);
    }

    #[test]
    fn test_first_violation_in_property_order() {
        let (schema, validator) = setup();
        let person = Person {
            name: "A".into(),
            age: 200,
            ..valid_person()
        };
        let violation = validator.validate(&schema, &person).unwrap().unwrap();
        assert_eq!(violation.field, "name");
        assert_eq!(violation.constraint.min_len, Some(2));
        assert!(!violation.constraint.required);
    }

    #[test]
    fn test_required_reports_only_required() {
        let (schema, validator) = setup();
        let violation = validator
            .validate(&schema, &Person::default())
            .unwrap()
            .unwrap();
        assert_eq!(violation, Violation::new("name", Constraint::required()));
    }

    #[test]
    fn test_absent_nested_object_checks_required() {
        let (schema, validator) = setup();
        let person = Person {
            address: None,
            ..valid_person()
        };
        let violation = validator.validate(&schema, &person).unwrap().unwrap();
        assert_eq!(violation.field, "city");
        assert!(violation.constraint.required);
    }

    #[test]
    fn test_exclusive_bound_and_item_count() {
        let (schema, validator) = setup();
        let person = Person {
            age: 130,
            ..valid_person()
        };
        let violation = validator.validate(&schema, &person).unwrap().unwrap();
        assert_eq!((violation.field.as_str(), violation.constraint.max_exc_num), ("age", Some(130.0)));

        let person = Person {
            tags: vec!["a".into(), "b".into(), "c".into()],
            ..valid_person()
        };
        let violation = validator.validate(&schema, &person).unwrap().unwrap();
        assert_eq!(violation.field, "tags");
        assert_eq!(violation.constraint.max_items, Some(2));
    }

    #[test]
    fn test_optional_number_checked_when_present() {
        let (schema, validator) = setup();
        let mut person = valid_person();
        if let Some(address) = person.address.as_mut() {
            address.zip = Some(123);
        }
        let violation = validator.validate(&schema, &person).unwrap().unwrap();
        assert_eq!(violation.field, "zip");
        assert_eq!(violation.constraint.min_num, Some(10000.0));
    }

    #[test]
    fn test_map_values_by_key() {
        let mut schema = SchemaNode::object(
            [
                ("a".to_string(), SchemaNode::leaf(Kind::Number)),
                ("b".to_string(), SchemaNode::leaf(Kind::Number)),
            ]
            .into_iter()
            .collect(),
        );
        schema.property_mut("a").unwrap().name = "a".into();
        schema.property_mut("b").unwrap().name = "b".into();
        schema.property_mut("a").unwrap().with_max_num(10.0);
        schema.requires(&["b"]);

        let validator = Validator::new();
        let mut values = BTreeMap::new();
        values.insert("a".to_string(), 5i64);
        let violation = validator.validate(&schema, &values).unwrap().unwrap();
        assert_eq!(violation, Violation::new("b", Constraint::required()));

        values.insert("a".to_string(), 11);
        values.insert("b".to_string(), 1);
        let violation = validator.validate(&schema, &values).unwrap().unwrap();
        assert_eq!(violation.constraint.max_num, Some(10.0));
    }

    #[derive(Default)]
    struct Order {
        billing: Address,
        shipping: Address,
        forwarded: Option<Address>,
    }

    crate::impl_model!(Order in "people" {
        billing: r#"json:"billing""#,
        shipping: r#"json:"shipping""#,
        forwarded: r#"json:"forwarded""#,
    });

    #[test]
    fn test_reference_checked_against_its_model() {
        let schema = SchemaBuilder::new().build(&Order::default()).unwrap();
        assert!(schema.property("shipping").unwrap().is_reference());

        let city = |name: &str| Address {
            city: name.into(),
            zip: None,
        };
        let validator = Validator::new();
        let order = Order {
            billing: city("Paris"),
            shipping: city(""),
            forwarded: None,
        };
        let violation = validator.validate(&schema, &order).unwrap().unwrap();
        assert_eq!(violation, Violation::new("city", Constraint::required()));

        let order = Order {
            billing: city("Paris"),
            shipping: city("Lyon"),
            forwarded: Some(Address {
                city: "Nice".into(),
                zip: Some(5),
            }),
        };
        let violation = validator.validate(&schema, &order).unwrap().unwrap();
        assert_eq!(violation.field, "zip");

        let order = Order {
            billing: city("Paris"),
            shipping: city("Lyon"),
            forwarded: None,
        };
        assert_eq!(validator.validate(&schema, &order).unwrap(), None);
    }

    #[derive(Default)]
    struct Chain {
        label: String,
        parent: Option<Box<Chain>>,
    }

    crate::impl_model!(Chain in "people" {
        label: r#"json:"label" schema:"required""#,
        parent(embedded): "",
    });

    #[test]
    fn test_self_embedding_validates() {
        let schema = SchemaBuilder::new().build(&Chain::default()).unwrap();
        let validator = Validator::new();
        let violation = validator.validate(&schema, &Chain::default()).unwrap().unwrap();
        assert_eq!(violation, Violation::new("label", Constraint::required()));

        let chain = Chain {
            label: "head".into(),
            parent: None,
        };
        assert_eq!(validator.validate(&schema, &chain).unwrap(), None);
    }

    #[test]
    fn test_bad_stored_pattern_is_error() {
        let mut node = SchemaNode::leaf(Kind::String);
        node.constraints = Some(Constraint {
            pattern: Some("(".to_string()),
            ..Default::default()
        });
        let err = Validator::new().validate(&node, &String::from("x")).unwrap_err();
        assert!(matches!(err, Error::Pattern { .. }));
    }
}
