//! Schema derivation from described values
//!
//! The builder walks a value depth first. Named composites are registered by
//! identifier the first time they are seen; any later occurrence in the same
//! tree becomes a reference placeholder, which is what keeps self-referential
//! models finite.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::kind::Kind;
use crate::model::{walk_fields, with_struct, FlatField, Model};
use crate::pattern::PatternCache;
use crate::reflect::{scalar_text, Mapping, Reflect, Sequence, Value};
use crate::schema::{Properties, SchemaNode};
use crate::tag::TagKeys;

/// Derives [`SchemaNode`] trees
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    keys: TagKeys,
    patterns: Arc<PatternCache>,
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self {
            keys: TagKeys::default(),
            patterns: PatternCache::global(),
        }
    }
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tag_keys(mut self, keys: TagKeys) -> Self {
        self.keys = keys;
        self
    }

    /// Use a dedicated pattern cache instead of the process-wide one
    pub fn with_pattern_cache(mut self, patterns: Arc<PatternCache>) -> Self {
        self.patterns = patterns;
        self
    }

    pub fn tag_keys(&self) -> &TagKeys {
        &self.keys
    }

    pub fn pattern_cache(&self) -> &Arc<PatternCache> {
        &self.patterns
    }

    /// Derives the schema of a struct-like model
    ///
    /// Anything that is not a struct (or a pointer to one) is rejected.
    pub fn build(&self, model: &dyn Reflect) -> Result<SchemaNode> {
        if with_struct(model, &mut |_: &dyn Model| ()).is_none() {
            return Err(Error::Shape {
                operation: "schema derivation",
                type_name: model.type_name(),
            });
        }
        self.derive(model)
    }

    /// Derives the schema of any described value
    pub fn derive(&self, value: &dyn Reflect) -> Result<SchemaNode> {
        self.derive_value(value, &mut HashSet::new())
    }

    fn derive_value(&self, value: &dyn Reflect, visited: &mut HashSet<String>) -> Result<SchemaNode> {
        if let Some(described) = value.as_self_describing() {
            return Ok(described.schema());
        }

        match value.value() {
            Value::Pointer(pointer) => match pointer.pointee() {
                Some(inner) => self.derive_value(inner, visited),
                None => self.derive_value(pointer.zero_pointee().as_ref(), visited),
            },
            Value::Seq(sequence) if !value.is_upload() => {
                Ok(SchemaNode::array(self.derive_items(sequence, visited)?))
            }
            Value::Struct(model) => self.derive_model(model, visited),
            Value::Map(mapping) => self.derive_mapping(mapping, visited),
            _ => Ok(SchemaNode::leaf(Kind::of(value))),
        }
    }

    /// Element schema of a monomorphic sequence
    fn derive_items(
        &self,
        sequence: &dyn Sequence,
        visited: &mut HashSet<String>,
    ) -> Result<SchemaNode> {
        let Some(first) = sequence.element(0) else {
            return self.derive_value(sequence.zero_element().as_ref(), visited);
        };
        let mut previous = first.type_name();
        for index in 1..sequence.len() {
            let Some(element) = sequence.element(index) else {
                break;
            };
            let current = element.type_name();
            if current != previous {
                return Err(Error::Heterogeneous {
                    first: previous,
                    second: current,
                });
            }
            previous = current;
        }
        self.derive_value(first, visited)
    }

    fn derive_model(&self, model: &dyn Model, visited: &mut HashSet<String>) -> Result<SchemaNode> {
        let identifier = model.identifier();
        if visited.contains(&identifier) {
            debug!(model = %identifier, "emitting reference for visited model");
            return Ok(SchemaNode::reference(identifier));
        }
        visited.insert(identifier);

        let mut properties = Properties::new();
        walk_fields(model, &self.keys, &mut |field: FlatField<'_>| {
            let mut child = self.derive_value(field.value, visited)?;
            child.name.clone_from(&field.property);
            if !child.is_reference() {
                child.with_tag_options(field.def.tag, &self.keys, &self.patterns)?;
            }
            properties.insert(field.property, child);
            Ok::<(), Error>(())
        })?;

        let mut node = SchemaNode::object(properties);
        node.model_name = Some(model.model_name().to_string());
        node.namespace = Some(model.namespace().to_string());
        Ok(node)
    }

    /// Properties keyed by the text form of each map key, sorted by key
    fn derive_mapping(
        &self,
        mapping: &dyn Mapping,
        visited: &mut HashSet<String>,
    ) -> Result<SchemaNode> {
        let mut properties = Properties::new();
        for (key, value) in mapping.entries() {
            let name = scalar_text(key)?;
            let mut child = self.derive_value(value, visited)?;
            child.name.clone_from(&name);
            properties.insert(name, child);
        }
        properties.sort_by_name();
        Ok(SchemaNode::object(properties))
    }
}
