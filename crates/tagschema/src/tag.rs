//! Field metadata: struct tags and the `schema` option mini-language
//!
//! A struct tag is a space separated list of `key:"value"` pairs, e.g.
//! `json:"username" schema:"required; pattern:^[a-z]+$" desc:"login name"`.
//! The `schema` value is itself a `;` separated list of `key[:value]` options.
//!
//! Copyright (c) 2025 Tagschema Team
//! Licensed under the Apache-2.0 license

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::TagOptionError;

/// Option keys recognized inside the `schema` tag
pub mod option {
    pub const REQUIRED: &str = "required";
    pub const ENUM: &str = "enum";
    pub const MIN_NUM: &str = "minNum";
    pub const MAX_NUM: &str = "maxNum";
    pub const MIN_EXC_NUM: &str = "minExcNum";
    pub const MAX_EXC_NUM: &str = "maxExcNum";
    pub const MIN_LEN: &str = "minLen";
    pub const MAX_LEN: &str = "maxLen";
    pub const MIN_ITEMS: &str = "minItems";
    pub const MAX_ITEMS: &str = "maxItems";
    pub const PATTERN: &str = "pattern";
}

/// Names of the struct-tag keys consulted for each field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagKeys {
    /// External property name; `-` excludes the field
    pub name: String,
    /// Option mini-language
    pub schema: String,
    /// Free text description
    pub description: String,
}

impl Default for TagKeys {
    fn default() -> Self {
        Self {
            name: "json".to_string(),
            schema: "schema".to_string(),
            description: "desc".to_string(),
        }
    }
}

impl TagKeys {
    pub fn with_name_key<S: Into<String>>(mut self, key: S) -> Self {
        self.name = key.into();
        self
    }

    pub fn with_schema_key<S: Into<String>>(mut self, key: S) -> Self {
        self.schema = key.into();
        self
    }

    pub fn with_description_key<S: Into<String>>(mut self, key: S) -> Self {
        self.description = key.into();
        self
    }

    /// External name of a field: the name tag up to the first `,`, falling
    /// back to the declared name
    pub fn property_name(&self, tag: &StructTag<'_>, declared: &str) -> String {
        let value = tag.get(&self.name);
        let name = value.split(',').next().unwrap_or_default();
        if name.is_empty() {
            declared.to_string()
        } else {
            name.to_string()
        }
    }

    pub fn is_ignored(&self, tag: &StructTag<'_>) -> bool {
        tag.get(&self.name) == "-"
    }
}

/// Read-only view over a raw struct tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructTag<'a>(&'a str);

impl<'a> StructTag<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> &'a str {
        self.0
    }

    /// Value for `key`, or the empty string when absent
    pub fn get(&self, key: &str) -> String {
        self.lookup(key).unwrap_or_default()
    }

    /// Value for `key`; scanning stops at the first malformed pair
    ///
    /// Inside a quoted value `\\` and `\"` are unescaped, `\n` and `\t` become
    /// control characters, and any other backslash is kept verbatim.
    pub fn lookup(&self, key: &str) -> Option<String> {
        let mut rest = self.0;
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                return None;
            }
            let name_end = rest
                .find(|c: char| c <= ' ' || c == ':' || c == '"' || c == '\u{7f}')
                .unwrap_or(rest.len());
            if name_end == 0 || !rest[name_end..].starts_with(":\"") {
                return None;
            }
            let name = &rest[..name_end];
            rest = &rest[name_end + 2..];

            let mut value = String::new();
            let mut escaped = false;
            let mut close = None;
            for (index, c) in rest.char_indices() {
                if escaped {
                    match c {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        '\\' | '"' => value.push(c),
                        other => {
                            value.push('\\');
                            value.push(other);
                        }
                    }
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    close = Some(index);
                    break;
                } else {
                    value.push(c);
                }
            }
            let close = close?;
            if name == key {
                return Some(value);
            }
            rest = &rest[close + 1..];
        }
    }
}

/// Parsed `schema` options: key to value, bare flags map to ""
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagOptions {
    options: HashMap<String, String>,
}

impl TagOptions {
    /// Parses `key[:value]` options separated by `;`
    ///
    /// Empty segments are skipped, a value extends to the end of its segment
    /// (so it may contain further `:`), and a segment starting with `:` is an
    /// error. Later duplicates overwrite earlier ones.
    pub fn parse(tag: &str) -> Result<Self, TagOptionError> {
        let mut options = HashMap::new();
        for segment in tag.split(';') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            match segment.split_once(':') {
                Some(("", _)) => {
                    return Err(TagOptionError::EmptyKey {
                        segment: segment.to_string(),
                    })
                }
                Some((key, value)) => {
                    options.insert(key.to_string(), value.to_string());
                }
                None => {
                    options.insert(segment.to_string(), String::new());
                }
            }
        }
        Ok(Self { options })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.options.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Value for `key` when present with a non-empty value
    pub fn value(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|value| !value.is_empty())
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_option_parsing() {
        let opts = TagOptions::parse("required;min:18;max:20;unique").unwrap();
        for (key, value) in [("required", ""), ("min", "18"), ("max", "20"), ("unique", "")] {
            assert_eq!(opts.get(key), Some(value), "option {}", key);
        }
        assert_eq!(opts.len(), 4);
        assert!(!opts.contains("pattern"));
    }

    #[test]
    fn test_tag_option_edge_cases() {
        let opts = TagOptions::parse(";; required ; pattern:^a:b$;enum:;").unwrap();
        assert!(opts.contains("required"));
        assert_eq!(opts.get("pattern"), Some("^a:b$"));
        assert_eq!(opts.get("enum"), Some(""));
        assert_eq!(opts.value("enum"), None);
        assert!(TagOptions::parse("").unwrap().is_empty());
    }

    #[test]
    fn test_tag_option_empty_key() {
        let err = TagOptions::parse("required; :5").unwrap_err();
        assert!(matches!(err, TagOptionError::EmptyKey { ref segment } if segment == ":5"));
    }

    #[test]
    fn test_struct_tag_lookup() {
        let tag = StructTag::new(r#"json:"username" schema:"required; pattern:[\\w]{6,12}" desc:"say \"hi\"""#);
        assert_eq!(tag.get("json"), "username");
        assert_eq!(tag.get("schema"), r"required; pattern:[\w]{6,12}");
        assert_eq!(tag.get("desc"), r#"say "hi""#);
        assert_eq!(tag.lookup("xml"), None);
    }

    #[test]
    fn test_struct_tag_keeps_unknown_escapes() {
        let tag = StructTag::new(r#"schema:"pattern:^\d+$""#);
        assert_eq!(tag.get("schema"), r"pattern:^\d+$");
    }

    #[test]
    fn test_struct_tag_malformed() {
        assert_eq!(StructTag::new(r#"json:username"#).lookup("json"), None);
        assert_eq!(StructTag::new(r#"json:"open"#).lookup("json"), None);
        assert_eq!(StructTag::new("").lookup("json"), None);
    }

    #[test]
    fn test_property_name() {
        let keys = TagKeys::default();
        let declared = "user_name";
        assert_eq!(keys.property_name(&StructTag::new(r#"json:"name,omitempty""#), declared), "name");
        assert_eq!(keys.property_name(&StructTag::new(r#"json:",omitempty""#), declared), declared);
        assert_eq!(keys.property_name(&StructTag::new(""), declared), declared);
        assert!(keys.is_ignored(&StructTag::new(r#"json:"-""#)));

        let custom = TagKeys::default().with_name_key("form");
        assert_eq!(custom.property_name(&StructTag::new(r#"form:"q" json:"x""#), declared), "q");
    }

    #[test]
    fn test_tag_keys_from_json() {
        let keys: TagKeys = serde_json::from_str(r#"{"name": "form"}"#).unwrap();
        assert_eq!(keys.name, "form");
        assert_eq!(keys.schema, "schema");
        assert_eq!(keys.description, "desc");
    }
}
