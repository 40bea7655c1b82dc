//! Declarative validation rules attached to a schema node
//!
//! Every check returns the subset of rules that the candidate broke, or
//! `None`. Checks short-circuit on the first broken rule.
//!
//! Copyright (c) 2025 Tagschema Team
//! Licensed under the Apache-2.0 license

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pattern::PatternCache;

/// Validation rules of one schema node
///
/// Inclusive and exclusive numeric bounds on the same side are mutually
/// exclusive; the setters clear the counterpart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraint {
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_len: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_len: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_num: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_num: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_exc_num: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_exc_num: Option<f64>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enumeration: Option<Vec<String>>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Constraint {
    /// The violation reported for an absent required value
    pub fn required() -> Self {
        Self {
            required: true,
            ..Self::default()
        }
    }

    pub fn set_min_num(&mut self, bound: f64) {
        self.min_exc_num = None;
        self.min_num = Some(bound);
    }

    pub fn set_max_num(&mut self, bound: f64) {
        self.max_exc_num = None;
        self.max_num = Some(bound);
    }

    pub fn set_min_exc_num(&mut self, bound: f64) {
        self.min_num = None;
        self.min_exc_num = Some(bound);
    }

    pub fn set_max_exc_num(&mut self, bound: f64) {
        self.max_num = None;
        self.max_exc_num = Some(bound);
    }

    /// String rules, in order: enum, pattern, minLen, maxLen
    ///
    /// Lengths count bytes.
    pub fn check_text(&self, text: &str, patterns: &PatternCache) -> Result<Option<Constraint>> {
        if let Some(members) = &self.enumeration {
            if !members.iter().any(|member| member == text) {
                return Ok(Some(Self {
                    enumeration: Some(members.clone()),
                    ..Self::default()
                }));
            }
        }
        if let Some(pattern) = &self.pattern {
            let matcher = patterns.compile(pattern).map_err(|source| Error::Pattern {
                pattern: pattern.clone(),
                source,
            })?;
            if !matcher.is_match(text) {
                return Ok(Some(Self {
                    pattern: Some(pattern.clone()),
                    ..Self::default()
                }));
            }
        }
        let length = text.len();
        if let Some(min_len) = self.min_len.filter(|&min| length < min) {
            return Ok(Some(Self {
                min_len: Some(min_len),
                ..Self::default()
            }));
        }
        if let Some(max_len) = self.max_len.filter(|&max| length > max) {
            return Ok(Some(Self {
                max_len: Some(max_len),
                ..Self::default()
            }));
        }
        Ok(None)
    }

    /// Numeric rules, in order: enum, minNum, maxNum, minExcNum, maxExcNum
    ///
    /// Enum members are parsed as floats for the comparison; a member that is
    /// not a number is an error rather than a violation.
    pub fn check_number(&self, number: f64) -> Result<Option<Constraint>> {
        if let Some(members) = &self.enumeration {
            let mut found = false;
            for member in members {
                let parsed: f64 = member.trim().parse().map_err(|source| Error::NonNumericEnum {
                    member: member.clone(),
                    source,
                })?;
                if parsed == number {
                    found = true;
                    break;
                }
            }
            if !found {
                return Ok(Some(Self {
                    enumeration: Some(members.clone()),
                    ..Self::default()
                }));
            }
        }
        if let Some(min_num) = self.min_num.filter(|&min| number < min) {
            return Ok(Some(Self {
                min_num: Some(min_num),
                ..Self::default()
            }));
        }
        if let Some(max_num) = self.max_num.filter(|&max| number > max) {
            return Ok(Some(Self {
                max_num: Some(max_num),
                ..Self::default()
            }));
        }
        if let Some(min_exc_num) = self.min_exc_num.filter(|&min| number <= min) {
            return Ok(Some(Self {
                min_exc_num: Some(min_exc_num),
                ..Self::default()
            }));
        }
        if let Some(max_exc_num) = self.max_exc_num.filter(|&max| number >= max) {
            return Ok(Some(Self {
                max_exc_num: Some(max_exc_num),
                ..Self::default()
            }));
        }
        Ok(None)
    }

    /// Item-count rules of an array
    ///
    /// `minItems`/`maxItems` apply when either is set; otherwise the length
    /// bounds double as item counts. The violation echoes both bounds of
    /// whichever pair was applied.
    pub fn check_count(&self, count: usize) -> Option<Constraint> {
        let by_items = self.min_items.is_some() || self.max_items.is_some();
        let (min, max) = if by_items {
            (self.min_items, self.max_items)
        } else {
            (self.min_len, self.max_len)
        };
        let broken = min.is_some_and(|min| count < min) || max.is_some_and(|max| count > max);
        if !broken {
            return None;
        }
        Some(if by_items {
            Self {
                min_items: min,
                max_items: max,
                ..Self::default()
            }
        } else {
            Self {
                min_len: min,
                max_len: max,
                ..Self::default()
            }
        })
    }
}

/// First broken rule found during validation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    /// External property name of the offending node
    pub field: String,
    #[serde(flatten)]
    pub constraint: Constraint,
}

impl Violation {
    pub fn new<S: Into<String>>(field: S, constraint: Constraint) -> Self {
        Self {
            field: field.into(),
            constraint,
        }
    }
}
