/*
 * cookie.rs
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

//! Cookie jar shared by all requests of one client (or several clients holding
//! the same `Arc<CookieJar>`).
//!
//! Storage model follows RFC 6265 section 5.3 closely enough for a non-browser
//! client: cookies are keyed by (domain, path, name), host-only unless a
//! `Domain` attribute was given, and `Max-Age` wins over `Expires`.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use url::Url;

/// One stored cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// Lower-case, without a leading dot.
    pub domain: String,
    /// True when no `Domain` attribute was given: only the exact host matches.
    pub host_only: bool,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    /// `None` for session cookies (kept for the life of the jar).
    pub expires: Option<DateTime<Utc>>,
}

impl Cookie {
    /// Parse a `Set-Cookie` header value received in response to `url`.
    /// Returns `None` for malformed headers and for a `Domain` the host may not set.
    pub fn parse(header: &str, url: &Url, now: DateTime<Utc>) -> Option<Cookie> {
        let host = url.host_str()?.to_ascii_lowercase();
        let mut parts = header.split(';');
        let (name, value) = parts.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let mut domain_attr: Option<String> = None;
        let mut path_attr: Option<String> = None;
        let mut max_age: Option<i64> = None;
        let mut expires: Option<DateTime<Utc>> = None;
        let mut secure = false;
        let mut http_only = false;

        for attr in parts {
            let (key, val) = match attr.split_once('=') {
                Some((k, v)) => (k.trim(), v.trim()),
                None => (attr.trim(), ""),
            };
            match key.to_ascii_lowercase().as_str() {
                "domain" => {
                    let d = val.trim_start_matches('.').to_ascii_lowercase();
                    if !d.is_empty() {
                        domain_attr = Some(d);
                    }
                }
                "path" => {
                    if val.starts_with('/') {
                        path_attr = Some(val.to_string());
                    }
                }
                "max-age" => max_age = val.parse::<i64>().ok(),
                "expires" => expires = parse_cookie_date(val),
                "secure" => secure = true,
                "httponly" => http_only = true,
                _ => {}
            }
        }

        if let Some(secs) = max_age {
            expires = Some(if secs <= 0 {
                DateTime::<Utc>::MIN_UTC
            } else {
                now + Duration::seconds(secs.min(i64::from(i32::MAX)))
            });
        }

        let (domain, host_only) = match domain_attr {
            Some(d) => {
                if !domain_match(&host, &d) {
                    return None;
                }
                (d, false)
            }
            None => (host, true),
        };

        Some(Cookie {
            name: name.to_string(),
            value: value.trim().to_string(),
            domain,
            host_only,
            path: path_attr.unwrap_or_else(|| default_path(url)),
            secure,
            http_only,
            expires,
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.map_or(false, |t| t <= now)
    }

    /// Whether this cookie should be sent with a request to `url`.
    pub fn matches(&self, url: &Url) -> bool {
        let host = match url.host_str() {
            Some(h) => h.to_ascii_lowercase(),
            None => return false,
        };
        let domain_ok = if self.host_only {
            host == self.domain
        } else {
            domain_match(&host, &self.domain)
        };
        domain_ok && path_match(url.path(), &self.path) && (!self.secure || url.scheme() == "https")
    }

    fn same_key(&self, other: &Cookie) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }
}

/// RFC 6265 5.1.3 domain-match (without the IP address refinement).
fn domain_match(host: &str, domain: &str) -> bool {
    host == domain
        || (host.len() > domain.len()
            && host.ends_with(domain)
            && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
}

/// RFC 6265 5.1.4 path-match.
fn path_match(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/') || request_path.as_bytes().get(cookie_path.len()) == Some(&b'/'))
}

/// RFC 6265 5.1.4 default-path: the request path up to (not including) its last `/`.
fn default_path(url: &Url) -> String {
    let path = url.path();
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(i) => path[..i].to_string(),
    }
}

/// `Expires` values: RFC 1123, RFC 850 and asctime forms.
fn parse_cookie_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    const FORMATS: [&str; 3] = [
        "%A, %d-%b-%y %H:%M:%S GMT",
        "%a, %d-%b-%Y %H:%M:%S GMT",
        "%a %b %e %H:%M:%S %Y",
    ];
    FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[derive(Default)]
struct JarState {
    /// Insertion (creation) order is preserved; replacements keep their slot.
    cookies: Vec<Cookie>,
}

/// Thread-safe cookie store. Share between clients with `Arc<CookieJar>`.
#[derive(Default)]
pub struct CookieJar {
    state: Mutex<JarState>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, JarState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record the `Set-Cookie` values of a response to `url`.
    pub fn store_response_cookies<'a, I>(&self, url: &Url, set_cookie: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.store_at(url, set_cookie, Utc::now());
    }

    pub(crate) fn store_at<'a, I>(&self, url: &Url, set_cookie: I, now: DateTime<Utc>)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut state = self.lock();
        for header in set_cookie {
            let cookie = match Cookie::parse(header, url, now) {
                Some(c) => c,
                None => {
                    tracing::debug!(url = %url, header, "rejected cookie");
                    continue;
                }
            };
            let existing = state.cookies.iter().position(|c| c.same_key(&cookie));
            match (existing, cookie.is_expired(now)) {
                (Some(i), true) => {
                    state.cookies.remove(i);
                }
                (Some(i), false) => state.cookies[i] = cookie,
                (None, true) => {}
                (None, false) => state.cookies.push(cookie),
            }
        }
    }

    /// Value for a `Cookie` request header to `url`, or `None` when nothing matches.
    pub fn cookie_header(&self, url: &Url) -> Option<String> {
        self.header_at(url, Utc::now())
    }

    pub(crate) fn header_at(&self, url: &Url, now: DateTime<Utc>) -> Option<String> {
        let pairs = self.cookies_at(url, now);
        if pairs.is_empty() {
            return None;
        }
        let parts: Vec<String> = pairs.into_iter().map(|(n, v)| format!("{}={}", n, v)).collect();
        Some(parts.join("; "))
    }

    /// (name, value) of the cookies that would be sent to `url`, in header order.
    pub fn cookies(&self, url: &Url) -> Vec<(String, String)> {
        self.cookies_at(url, Utc::now())
    }

    fn cookies_at(&self, url: &Url, now: DateTime<Utc>) -> Vec<(String, String)> {
        let mut state = self.lock();
        state.cookies.retain(|c| !c.is_expired(now));
        let mut matching: Vec<&Cookie> = state.cookies.iter().filter(|c| c.matches(url)).collect();
        // Stable sort: equal path lengths keep creation order.
        matching.sort_by(|a, b| b.path.len().cmp(&a.path.len()));
        matching
            .into_iter()
            .map(|c| (c.name.clone(), c.value.clone()))
            .collect()
    }

    /// Number of stored cookies (including ones that have expired but not yet been purged).
    pub fn len(&self) -> usize {
        self.lock().cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().cookies.clear();
    }
}

impl std::fmt::Debug for CookieJar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieJar").field("len", &self.len()).finish()
    }
}
