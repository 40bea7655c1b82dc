//! Schema tree: one node per introspected value
//!
//! A node is either a reference placeholder (`reference` set, nothing but
//! `name` besides) or a regular node with a kind. `items` only appears on
//! `Array` nodes and `properties` only on `Object` nodes.
//!
//! Copyright (c) 2025 Tagschema Team
//! Licensed under the Apache-2.0 license

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;

use crate::constraint::{Constraint, Violation};
use crate::error::{Error, Result, TagOptionError};
use crate::kind::Kind;
use crate::pattern::PatternCache;
use crate::reflect::Reflect;
use crate::tag::{option, StructTag, TagKeys, TagOptions};
use crate::validate::Validator;

/// Derived description of one value
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct SchemaNode {
    /// External property name; empty at the root
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(rename = "model", skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Identifier of a composite defined elsewhere in the same tree
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Absent only on reference placeholders
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<Kind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaNode>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Properties>,
    #[serde(rename = "validations", skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Constraint>,
}

impl SchemaNode {
    /// A node of the given kind with no children
    pub fn leaf(kind: Kind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// An `Array` node with its element schema
    pub fn array(items: SchemaNode) -> Self {
        Self {
            kind: Some(Kind::Array),
            items: Some(Box::new(items)),
            ..Self::default()
        }
    }

    /// An `Object` node with the given properties
    pub fn object(properties: Properties) -> Self {
        Self {
            kind: Some(Kind::Object),
            properties: Some(properties),
            ..Self::default()
        }
    }

    /// A placeholder pointing at an identifier defined elsewhere
    pub fn reference<S: Into<String>>(identifier: S) -> Self {
        Self {
            reference: Some(identifier.into()),
            ..Self::default()
        }
    }

    /// Derives the schema of a struct-like model with the default builder
    pub fn from_model<T: Reflect>(model: &T) -> Result<Self> {
        crate::builder::SchemaBuilder::default().build(model)
    }

    pub fn is_reference(&self) -> bool {
        self.reference.is_some()
    }

    /// Kind of the node; reference placeholders report `Invalid`
    pub fn kind(&self) -> Kind {
        self.kind.unwrap_or(Kind::Invalid)
    }

    /// `namespace.Model` for named composites
    pub fn identifier(&self) -> Option<String> {
        let model = self.model_name.as_ref()?;
        let namespace = self.namespace.as_deref().unwrap_or_default();
        Some(format!("{}.{}", namespace, model))
    }

    /// Every named composite in the tree keyed by identifier
    pub fn models(&self) -> BTreeMap<String, &SchemaNode> {
        let mut models = BTreeMap::new();
        self.collect_models(&mut models);
        models
    }

    fn collect_models<'a>(&'a self, models: &mut BTreeMap<String, &'a SchemaNode>) {
        if let Some(identifier) = self.identifier() {
            models.insert(identifier, self);
        }
        if let Some(properties) = &self.properties {
            for child in properties.values() {
                child.collect_models(models);
            }
        }
        if let Some(items) = &self.items {
            items.collect_models(models);
        }
    }

    /// The definition a reference placeholder points at
    pub fn resolve(&self, reference: &str) -> Option<&SchemaNode> {
        self.models().get(reference).copied()
    }

    pub fn property(&self, name: &str) -> Option<&SchemaNode> {
        self.properties.as_ref()?.get(name)
    }

    pub fn property_mut(&mut self, name: &str) -> Option<&mut SchemaNode> {
        self.properties.as_mut()?.get_mut(name)
    }

    /// Marks the named properties required; unknown names are ignored
    pub fn requires<S: AsRef<str>>(&mut self, names: &[S]) -> &mut Self {
        for name in names {
            if let Some(property) = self.property_mut(name.as_ref()) {
                property.with_required(true);
            }
        }
        self
    }

    /// Validates `value` against this tree with the shared pattern cache
    pub fn validate(&self, value: &dyn Reflect) -> Result<Option<Violation>> {
        Validator::default().validate(self, value)
    }

    fn constraint_mut(&mut self) -> &mut Constraint {
        self.constraints.get_or_insert_with(Constraint::default)
    }

    pub fn with_description<S: Into<String>>(&mut self, description: S) -> &mut Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_required(&mut self, required: bool) -> &mut Self {
        self.constraint_mut().required = required;
        self
    }

    /// Sets the pattern after making sure it compiles
    pub fn with_pattern(&mut self, pattern: &str, patterns: &PatternCache) -> Result<&mut Self> {
        patterns.compile(pattern).map_err(|source| Error::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;
        self.constraint_mut().pattern = Some(pattern.to_string());
        Ok(self)
    }

    pub fn with_min_num(&mut self, bound: f64) -> &mut Self {
        self.constraint_mut().set_min_num(bound);
        self
    }

    pub fn with_max_num(&mut self, bound: f64) -> &mut Self {
        self.constraint_mut().set_max_num(bound);
        self
    }

    pub fn with_min_exc_num(&mut self, bound: f64) -> &mut Self {
        self.constraint_mut().set_min_exc_num(bound);
        self
    }

    pub fn with_max_exc_num(&mut self, bound: f64) -> &mut Self {
        self.constraint_mut().set_max_exc_num(bound);
        self
    }

    pub fn with_min_len(&mut self, bound: usize) -> &mut Self {
        self.constraint_mut().min_len = Some(bound);
        self
    }

    pub fn with_max_len(&mut self, bound: usize) -> &mut Self {
        self.constraint_mut().max_len = Some(bound);
        self
    }

    pub fn with_min_items(&mut self, bound: usize) -> &mut Self {
        self.constraint_mut().min_items = Some(bound);
        self
    }

    pub fn with_max_items(&mut self, bound: usize) -> &mut Self {
        self.constraint_mut().max_items = Some(bound);
        self
    }

    /// Stores enum members in their string form
    pub fn with_enum<I, T>(&mut self, members: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        self.constraint_mut().enumeration =
            Some(members.into_iter().map(|member| member.to_string()).collect());
        self
    }

    /// Applies the description and `schema` options of a raw struct tag
    ///
    /// Failures are reported with the offending key, e.g. `schema.minNum`.
    pub fn with_tag_options(
        &mut self,
        tag: &str,
        keys: &TagKeys,
        patterns: &PatternCache,
    ) -> Result<&mut Self> {
        let tag = StructTag::new(tag);
        let description = tag.get(&keys.description);
        if !description.is_empty() {
            self.with_description(description);
        }
        let raw = tag.get(&keys.schema);
        if raw.is_empty() {
            return Ok(self);
        }

        let wrap = |name: &str| {
            let key = format!("{}.{}", keys.schema, name);
            move |source: TagOptionError| Error::TagOption { key, source }
        };
        let opts = TagOptions::parse(&raw).map_err(|source| Error::TagOption {
            key: keys.schema.clone(),
            source,
        })?;

        if opts.contains(option::REQUIRED) {
            self.with_required(true);
        }
        if let Some(members) = opts.value(option::ENUM) {
            self.with_enum(members.split(',').map(str::trim));
        }
        if let Some(value) = opts.value(option::MIN_NUM) {
            self.with_min_num(parse_float(value).map_err(wrap(option::MIN_NUM))?);
        }
        if let Some(value) = opts.value(option::MAX_NUM) {
            self.with_max_num(parse_float(value).map_err(wrap(option::MAX_NUM))?);
        }
        if let Some(value) = opts.value(option::MIN_EXC_NUM) {
            self.with_min_exc_num(parse_float(value).map_err(wrap(option::MIN_EXC_NUM))?);
        }
        if let Some(value) = opts.value(option::MAX_EXC_NUM) {
            self.with_max_exc_num(parse_float(value).map_err(wrap(option::MAX_EXC_NUM))?);
        }
        if let Some(value) = opts.value(option::MIN_LEN) {
            self.with_min_len(parse_integer(value).map_err(wrap(option::MIN_LEN))?);
        }
        if let Some(value) = opts.value(option::MAX_LEN) {
            self.with_max_len(parse_integer(value).map_err(wrap(option::MAX_LEN))?);
        }
        if let Some(value) = opts.value(option::MIN_ITEMS) {
            self.with_min_items(parse_integer(value).map_err(wrap(option::MIN_ITEMS))?);
        }
        if let Some(value) = opts.value(option::MAX_ITEMS) {
            self.with_max_items(parse_integer(value).map_err(wrap(option::MAX_ITEMS))?);
        }
        if let Some(pattern) = opts.value(option::PATTERN) {
            patterns
                .compile(pattern)
                .map_err(|e| wrap(option::PATTERN)(TagOptionError::from(e)))?;
            self.constraint_mut().pattern = Some(pattern.to_string());
        }
        Ok(self)
    }
}

fn parse_float(value: &str) -> std::result::Result<f64, TagOptionError> {
    value
        .trim()
        .parse()
        .map_err(|source| TagOptionError::InvalidFloat {
            value: value.to_string(),
            source,
        })
}

fn parse_integer(value: &str) -> std::result::Result<usize, TagOptionError> {
    value
        .trim()
        .parse()
        .map_err(|source| TagOptionError::InvalidInteger {
            value: value.to_string(),
            source,
        })
}

/// Property name to child schema, in insertion order
///
/// Serializes as a JSON object whose keys follow that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    entries: Vec<(String, SchemaNode)>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces in place, keeping the original position
    pub fn insert<S: Into<String>>(&mut self, name: S, node: SchemaNode) -> Option<SchemaNode> {
        let name = name.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => Some(std::mem::replace(existing, node)),
            None => {
                self.entries.push((name, node));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&SchemaNode> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, node)| node)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut SchemaNode> {
        self.entries
            .iter_mut()
            .find(|(key, _)| key == name)
            .map(|(_, node)| node)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &SchemaNode> {
        self.entries.iter().map(|(_, node)| node)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SchemaNode)> {
        self.entries.iter().map(|(key, node)| (key.as_str(), node))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Orders entries by name
    pub fn sort_by_name(&mut self) {
        self.entries.sort_by(|(a, _), (b, _)| a.cmp(b));
    }
}

impl Serialize for Properties {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, node) in &self.entries {
            map.serialize_entry(name, node)?;
        }
        map.end()
    }
}

impl FromIterator<(String, SchemaNode)> for Properties {
    fn from_iter<I: IntoIterator<Item = (String, SchemaNode)>>(iter: I) -> Self {
        let mut properties = Self::new();
        for (name, node) in iter {
            properties.insert(name, node);
        }
        properties
    }
}
