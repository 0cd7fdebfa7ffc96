/*
 * query.rs
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

//! Query string / form body codec: `name=value&name=value` with URI data escaping.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::HttpError;
use crate::params::Params;

/// URI data escaping: everything except the RFC 3986 unreserved characters.
const DATA: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encode one name or value.
pub fn encode_component(s: &str) -> String {
    utf8_percent_encode(s, DATA).to_string()
}

pub(crate) fn encode_pairs<'a>(pairs: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    let mut out = String::new();
    for (i, (name, value)) in pairs.enumerate() {
        if i > 0 {
            out.push('&');
        }
        out.extend(utf8_percent_encode(name, DATA));
        out.push('=');
        out.extend(utf8_percent_encode(value, DATA));
    }
    out
}

/// Serialize a parameter bag. An absent bag is a caller error; an empty bag gives `""`.
pub fn serialize(params: Option<&Params>) -> Result<String, HttpError> {
    params
        .map(Params::to_query_string)
        .ok_or(HttpError::NullParameters)
}

/// Join an existing query with newly serialized pairs using exactly one `&`.
/// Returns `None` when both sides are empty (the URL should carry no query).
pub fn merge_query(existing: Option<&str>, serialized: &str) -> Option<String> {
    let existing = existing.unwrap_or("").trim_start_matches('?');
    match (existing.is_empty(), serialized.is_empty()) {
        (true, true) => None,
        (true, false) => Some(serialized.to_string()),
        (false, true) => Some(existing.to_string()),
        (false, false) => Some(format!("{}&{}", existing.trim_end_matches('&'), serialized)),
    }
}

/// Decode `name=value&...` back into pairs. `+` is taken literally, since the
/// encoder above never produces it for a space.
pub fn parse(query: &str) -> Params {
    query
        .split('&')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let (name, value) = segment.split_once('=').unwrap_or((segment, ""));
            (
                percent_decode_str(name).decode_utf8_lossy().into_owned(),
                percent_decode_str(value).decode_utf8_lossy().into_owned(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_pair() {
        let p = Params::new().add("key", "value");
        assert_eq!(serialize(Some(&p)).unwrap(), "key=value");
    }

    #[test]
    fn two_pairs() {
        let p = Params::new().add("key", "value").add("key2", "value2");
        assert_eq!(serialize(Some(&p)).unwrap(), "key=value&key2=value2");
    }

    #[test]
    fn ampersand_is_encoded() {
        let p = Params::new().add("key", "value&");
        assert_eq!(serialize(Some(&p)).unwrap(), "key=value%26");
    }

    #[test]
    fn absent_bag_is_an_error() {
        assert!(matches!(serialize(None), Err(HttpError::NullParameters)));
    }

    #[test]
    fn empty_bag_is_empty_string() {
        assert_eq!(serialize(Some(&Params::new())).unwrap(), "");
    }

    #[test]
    fn unreserved_characters_pass_through() {
        assert_eq!(encode_component("aZ09-._~"), "aZ09-._~");
        assert_eq!(encode_component("a b+c/d?é"), "a%20b%2Bc%2Fd%3F%C3%A9");
    }

    #[test]
    fn segment_and_separator_counts() {
        for n in 0..6 {
            let p: Params = (0..n).map(|i| (format!("k{}", i), format!("v&{}", i))).collect();
            let s = p.to_query_string();
            let segments = if s.is_empty() { 0 } else { s.split('&').count() };
            assert_eq!(segments, n);
            assert_eq!(s.matches('&').count(), n.saturating_sub(1));
            assert!(s.split('&').filter(|x| !x.is_empty()).all(|seg| seg.matches('=').count() == 1));
        }
    }

    #[test]
    fn decode_reproduces_pairs_in_order() {
        let p = Params::new()
            .add("q", "rust & tokio")
            .add("page", 2)
            .add("q", "100% = done")
            .add("name with space", "ünïcode");
        let decoded = parse(&p.to_query_string());
        assert_eq!(decoded, p);
    }

    #[test]
    fn merge_uses_single_separator() {
        assert_eq!(merge_query(Some("a=1"), "b=2").as_deref(), Some("a=1&b=2"));
        assert_eq!(merge_query(Some("a=1&"), "b=2").as_deref(), Some("a=1&b=2"));
        assert_eq!(merge_query(None, "b=2").as_deref(), Some("b=2"));
        assert_eq!(merge_query(Some(""), "b=2").as_deref(), Some("b=2"));
        assert_eq!(merge_query(Some("a=1"), "").as_deref(), Some("a=1"));
        assert_eq!(merge_query(None, ""), None);
    }
}
