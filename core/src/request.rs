/*
 * request.rs
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

//! HTTP request: verb, URL, headers, optional body length.
//!
//! The dispatcher builds a `RequestHead`; the transport turns it into bytes.

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::HttpError;
use crate::response::Headers;

pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// The request methods this client issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpVerb {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Head => "HEAD",
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
            HttpVerb::Patch => "PATCH",
            HttpVerb::Delete => "DELETE",
        }
    }

    /// Verbs whose parameters travel in a request body rather than the URL query.
    pub fn has_body(&self) -> bool {
        !matches!(self, HttpVerb::Get | HttpVerb::Head)
    }

    /// Verbs accepted by multipart uploads.
    pub fn allows_upload(&self) -> bool {
        matches!(self, HttpVerb::Post | HttpVerb::Put)
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpVerb {
    type Err = HttpError;

    /// Case-insensitive method name; anything outside the six verbs is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpVerb::Get),
            "HEAD" => Ok(HttpVerb::Head),
            "POST" => Ok(HttpVerb::Post),
            "PUT" => Ok(HttpVerb::Put),
            "PATCH" => Ok(HttpVerb::Patch),
            "DELETE" => Ok(HttpVerb::Delete),
            _ => Err(HttpError::UnsupportedVerb(s.to_string())),
        }
    }
}

/// Everything the transport needs before the body: verb, target, headers.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub verb: HttpVerb,
    pub url: Url,
    pub headers: Headers,
    /// Body length when known up front; `None` with a body means chunked.
    pub content_length: Option<u64>,
}

impl RequestHead {
    pub fn new(verb: HttpVerb, url: Url) -> Self {
        Self {
            verb,
            url,
            headers: Headers::new(),
            content_length: None,
        }
    }

    /// Add or replace a header (case-insensitive name match). Names must be
    /// tokens and values free of control characters.
    pub fn header(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<&mut Self, HttpError> {
        let (name, value) = (name.into(), value.into());
        check_header(&name, &value)?;
        self.headers.set(name, value);
        Ok(self)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("Content-Type")
    }

    /// Origin-form request target: path plus query.
    pub fn target(&self) -> String {
        match self.url.query() {
            Some(q) => format!("{}?{}", self.url.path(), q),
            None => self.url.path().to_string(),
        }
    }
}

/// Reject header fields that cannot be written on one line.
pub fn check_header(name: &str, value: &str) -> Result<(), HttpError> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_graphic() && b != b':') {
        return Err(HttpError::invalid(format!("invalid header name {:?}", name)));
    }
    if value.bytes().any(|b| (b < 0x20 && b != b'\t') || b == 0x7f) {
        return Err(HttpError::invalid(format!(
            "header {} has a control character in its value",
            name
        )));
    }
    Ok(())
}

/// Parse and check a caller-supplied URL: non-blank, absolute, http or https.
pub fn parse_url(url: &str) -> Result<Url, HttpError> {
    if url.trim().is_empty() {
        return Err(HttpError::invalid("url is empty"));
    }
    let parsed = Url::parse(url.trim()).map_err(|source| HttpError::InvalidUrl {
        url: url.to_string(),
        source,
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(HttpError::UnsupportedScheme(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verb_names_and_body_rules() {
        assert_eq!(HttpVerb::Patch.as_str(), "PATCH");
        assert!(!HttpVerb::Get.has_body());
        assert!(!HttpVerb::Head.has_body());
        assert!(HttpVerb::Delete.has_body());
        assert!(HttpVerb::Put.allows_upload());
        assert!(!HttpVerb::Patch.allows_upload());
    }

    #[test]
    fn parse_verb() {
        assert_eq!("post".parse::<HttpVerb>().unwrap(), HttpVerb::Post);
        assert!(matches!("OPTIONS".parse::<HttpVerb>(), Err(HttpError::UnsupportedVerb(_))));
    }

    #[test]
    fn url_preconditions() {
        assert!(matches!(parse_url("   "), Err(HttpError::InvalidArgument(_))));
        assert!(matches!(parse_url("not a url"), Err(HttpError::InvalidUrl { .. })));
        assert!(matches!(parse_url("ftp://host/x"), Err(HttpError::UnsupportedScheme(_))));
        assert!(parse_url("http://host/x").is_ok());
    }

    #[test]
    fn header_rejects_control_characters() {
        let mut head = RequestHead::new(HttpVerb::Get, Url::parse("http://h/").unwrap());
        assert!(matches!(head.header("X-A", "1\r\nX-B: 2"), Err(HttpError::InvalidArgument(_))));
        assert!(matches!(head.header("X-A", "nul\0"), Err(HttpError::InvalidArgument(_))));
        assert!(matches!(head.header("Bad Name", "v"), Err(HttpError::InvalidArgument(_))));
        assert!(head.headers.is_empty());
        head.header("X-A", "tab\tok").unwrap();
        assert_eq!(head.headers.get("x-a"), Some("tab\tok"));
    }

    #[test]
    fn target_includes_query() {
        let head = RequestHead::new(HttpVerb::Get, Url::parse("http://h/p/q?a=1").unwrap());
        assert_eq!(head.target(), "/p/q?a=1");
        let head = RequestHead::new(HttpVerb::Get, Url::parse("http://h").unwrap());
        assert_eq!(head.target(), "/");
    }
}
