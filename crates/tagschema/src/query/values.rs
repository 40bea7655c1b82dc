//! Flat multi-valued string map fed to the decoder

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use url::form_urlencoded;

use crate::error::{Error, Result};

/// Name to ordered values, the shape of decoded form and query parameters
///
/// Keys are kept sorted so [`encode`](Self::encode) is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryValues {
    values: BTreeMap<String, Vec<String>>,
}

impl QueryValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses an `application/x-www-form-urlencoded` string
    ///
    /// `+` decodes to a space. Malformed `%` escapes and `;` separators are
    /// rejected rather than passed through.
    pub fn parse(query: &str) -> Result<Self> {
        for segment in query.split('&') {
            if segment.contains(';') {
                return Err(malformed(query, "invalid semicolon separator"));
            }
            check_escapes(segment).map_err(|reason| malformed(query, &reason))?;
        }

        let mut values = Self::new();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            values.add(key.into_owned(), value.into_owned());
        }
        Ok(values)
    }

    /// Serializes back to a query string, keys in sorted order
    pub fn encode(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, values) in &self.values {
            for value in values {
                serializer.append_pair(key, value);
            }
        }
        serializer.finish()
    }

    /// Appends a value to the key's list
    pub fn add<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.values.entry(key.into()).or_default().push(value.into());
    }

    /// Replaces the key's list with a single value
    pub fn set<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.values.insert(key.into(), vec![value.into()]);
    }

    pub fn insert<K: Into<String>>(&mut self, key: K, values: Vec<String>) -> Option<Vec<String>> {
        self.values.insert(key.into(), values)
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.values.get(key).map(Vec::as_slice)
    }

    pub fn first(&self, key: &str) -> Option<&str> {
        self.get(key)?.first().map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.values.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.values
            .iter()
            .map(|(key, values)| (key.as_str(), values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn malformed(query: &str, reason: &str) -> Error {
    Error::MalformedQuery {
        query: query.to_string(),
        reason: reason.to_string(),
    }
}

/// Every `%` must be followed by two hex digits
fn check_escapes(segment: &str) -> std::result::Result<(), String> {
    let bytes = segment.as_bytes();
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%' {
            let escape = bytes.get(index + 1..index + 3);
            if !escape.is_some_and(|digits| digits.iter().all(u8::is_ascii_hexdigit)) {
                let end = (index + 3).min(bytes.len());
                return Err(format!(
                    "invalid URL escape {:?}",
                    String::from_utf8_lossy(&bytes[index..end])
                ));
            }
            index += 3;
        } else {
            index += 1;
        }
    }
    Ok(())
}

impl FromStr for QueryValues {
    type Err = Error;

    fn from_str(query: &str) -> Result<Self> {
        Self::parse(query)
    }
}

impl fmt::Display for QueryValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut values = Self::new();
        for (key, value) in iter {
            values.add(key, value);
        }
        values
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for QueryValues {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.add(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_multi_values() {
        let values = QueryValues::parse("a=1&b=x+y%21&a=2&flag&&c=").unwrap();
        assert_eq!(values.get("a"), Some(&["1".to_string(), "2".to_string()][..]));
        assert_eq!(values.first("b"), Some("x y!"));
        assert_eq!(values.first("flag"), Some(""));
        assert_eq!(values.first("c"), Some(""));
        assert_eq!(values.len(), 4);
        assert!(QueryValues::parse("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_semicolons() {
        let err = QueryValues::parse("a=1;b=2").unwrap_err();
        assert!(matches!(err, Error::MalformedQuery { ref reason, .. } if reason.contains("semicolon")));
    }

    #[test]
    fn test_parse_rejects_bad_escapes() {
        for query in ["a=%zz", "a=%4", "%=1", "a=100%"] {
            assert!(
                matches!(QueryValues::parse(query), Err(Error::MalformedQuery { .. })),
                "accepted {query}"
            );
        }
        assert_eq!(QueryValues::parse("a=%41").unwrap().first("a"), Some("A"));
    }

    #[test]
    fn test_encode_sorted_and_escaped() {
        let values: QueryValues = [("z", "1"), ("a", "x y"), ("a", "&")].into_iter().collect();
        assert_eq!(values.encode(), "a=x+y&a=%26&z=1");
        assert_eq!(values.to_string().parse::<QueryValues>().unwrap(), values);
    }

    #[test]
    fn test_set_replaces() {
        let mut values = QueryValues::new();
        values.add("k", "1");
        values.add("k", "2");
        values.set("k", "3");
        assert_eq!(values.get("k"), Some(&["3".to_string()][..]));
        assert_eq!(values.remove("k"), Some(vec!["3".to_string()]));
        assert!(!values.contains_key("k"));
    }
}
