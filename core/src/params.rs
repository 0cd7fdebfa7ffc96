/*
 * params.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Courier, an asynchronous HTTP form client.
 *
 * Courier is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Courier is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Courier.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Parameter bag: an ordered list of (name, value) pairs sent as a query string,
//! a form body, or the scalar fields of a multipart upload.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::error::HttpError;
use crate::query;

/// Ordered (name, value) pairs. Duplicate names are kept and sent as separate pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    pairs: Vec<(String, String)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pair (builder style). The value is converted with `Display`.
    pub fn add(mut self, name: impl Into<String>, value: impl fmt::Display) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl fmt::Display) {
        self.pairs.push((name.into(), value.to_string()));
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.iter().find(|(k, _)| *k == name).map(|(_, v)| v)
    }

    /// `name=value&...` for this bag; empty bag gives an empty string.
    pub fn to_query_string(&self) -> String {
        query::encode_pairs(self.iter())
    }

    /// Build a bag from a struct or map, in field declaration order.
    ///
    /// Strings, numbers and booleans become values. `null`, sequences and nested
    /// objects have no single textual form and are rejected with
    /// `HttpError::Encoding`. A value that serializes to `null` as a whole (e.g.
    /// `None`) is an absent bag.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, HttpError> {
        let value = serde_json::to_value(value).map_err(|e| HttpError::Encoding {
            name: String::new(),
            reason: e.to_string(),
        })?;
        let map = match value {
            Value::Object(map) => map,
            Value::Null => return Err(HttpError::NullParameters),
            other => {
                return Err(HttpError::invalid(format!(
                    "parameters must be a struct or map, got {}",
                    json_type_name(&other)
                )))
            }
        };
        let mut params = Params::new();
        for (name, value) in map {
            let text = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => {
                    return Err(HttpError::Encoding {
                        reason: format!("{} value has no textual form", json_type_name(&other)),
                        name,
                    })
                }
            };
            params.pairs.push((name, text));
        }
        Ok(params)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "object",
    }
}

impl<K: Into<String>, V: fmt::Display> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.push(k, v);
        }
        params
    }
}

impl<K: Into<String>, V: fmt::Display, const N: usize> From<[(K, V); N]> for Params {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl<'a> IntoIterator for &'a Params {
    type Item = (&'a str, &'a str);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    struct Login<'a> {
        user: &'a str,
        remember: bool,
        attempts: u32,
    }

    #[test]
    fn builder_keeps_order_and_duplicates() {
        let p = Params::new().add("b", 2).add("a", "x").add("b", 3);
        let pairs: Vec<_> = p.iter().collect();
        assert_eq!(pairs, vec![("b", "2"), ("a", "x"), ("b", "3")]);
        assert_eq!(p.get("b"), Some("2"));
        assert_eq!(p.len(), 3);
    }

    #[test]
    fn from_serialize_uses_field_order() {
        let p = Params::from_serialize(&Login { user: "ann", remember: true, attempts: 3 }).unwrap();
        assert_eq!(p.to_query_string(), "user=ann&remember=true&attempts=3");
    }

    #[test]
    fn from_serialize_map() {
        let mut m = BTreeMap::new();
        m.insert("k", "v w");
        let p = Params::from_serialize(&m).unwrap();
        assert_eq!(p.to_query_string(), "k=v%20w");
    }

    #[test]
    fn from_serialize_rejects_null_field() {
        #[derive(Serialize)]
        struct Opt {
            a: Option<String>,
        }
        let err = Params::from_serialize(&Opt { a: None }).unwrap_err();
        match err {
            HttpError::Encoding { name, .. } => assert_eq!(name, "a"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn from_serialize_rejects_nested() {
        #[derive(Serialize)]
        struct Nested {
            tags: Vec<u8>,
        }
        assert!(matches!(
            Params::from_serialize(&Nested { tags: vec![1] }),
            Err(HttpError::Encoding { .. })
        ));
    }

    #[test]
    fn from_serialize_none_is_absent() {
        let none: Option<Login> = None;
        assert!(matches!(Params::from_serialize(&none), Err(HttpError::NullParameters)));
        assert!(matches!(Params::from_serialize("text"), Err(HttpError::InvalidArgument(_))));
    }

    #[test]
    fn from_array() {
        let p = Params::from([("a", 1), ("b", 2)]);
        assert_eq!(p.to_query_string(), "a=1&b=2");
    }
}
