/*
 * response.rs
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

//! Responses and success continuations.
//!
//! A successful call hands a `Response` (status, headers, open body stream) to a
//! `ResponseHandler`. Two handlers cover the usual cases:
//! - `stream(f)`: `f` receives the response and owns the body from then on.
//! - `text(f)`: the body is drained and decoded as UTF-8, closed, and `f`
//!   receives the string.

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

use crate::error::TransportError;

/// Ordered header list with case-insensitive lookup. Repeated names are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replace every header called `name` with a single value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.entries.push((name, value.into()));
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.append(k, v);
        }
        headers
    }
}

/// Response body: an async byte stream. Dropping it closes the underlying connection.
pub struct ResponseBody {
    inner: Box<dyn AsyncRead + Send + Unpin>,
}

impl ResponseBody {
    pub fn new(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self { inner: Box::new(reader) }
    }

    pub fn empty() -> Self {
        Self::new(tokio::io::empty())
    }

    /// Read the rest of the body into memory (no size limit).
    pub async fn bytes(mut self) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        self.inner.read_to_end(&mut out).await?;
        Ok(out)
    }

    /// Read the rest of the body as UTF-8; invalid sequences become U+FFFD.
    pub async fn text(self) -> io::Result<String> {
        let bytes = self.bytes().await?;
        Ok(match String::from_utf8(bytes) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        })
    }
}

impl AsyncRead for ResponseBody {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResponseBody")
    }
}

/// A response whose status did not count as a failure (below 400).
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub reason: Option<String>,
    pub headers: Headers,
    pub body: ResponseBody,
}

impl Response {
    pub fn into_parts(self) -> (Headers, ResponseBody) {
        (self.headers, self.body)
    }
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send>>;

/// Success continuation. Invoked at most once, on a runtime worker thread.
///
/// The returned future is awaited by the dispatcher; an error from it (e.g. the
/// connection dropping while the body is drained) is delivered to the failure
/// continuation instead, so exactly one of the two continuations completes.
pub trait ResponseHandler: Send + 'static {
    fn handle(self: Box<Self>, response: Response) -> HandlerFuture;
}

impl ResponseHandler for Box<dyn ResponseHandler> {
    fn handle(self: Box<Self>, response: Response) -> HandlerFuture {
        (*self).handle(response)
    }
}

/// Hands the response, open body included, to a closure.
pub struct StreamHandler<F>(F);

impl<F> ResponseHandler for StreamHandler<F>
where
    F: FnOnce(Response) + Send + 'static,
{
    fn handle(self: Box<Self>, response: Response) -> HandlerFuture {
        (self.0)(response);
        Box::pin(async { Ok(()) })
    }
}

/// Drains the body as text, then calls the closure with it.
pub struct TextHandler<F>(F);

impl<F> ResponseHandler for TextHandler<F>
where
    F: FnOnce(String) + Send + 'static,
{
    fn handle(self: Box<Self>, response: Response) -> HandlerFuture {
        let on_text = self.0;
        Box::pin(async move {
            // The body is consumed by `text()`, so it is closed on every path.
            let text = response.body.text().await.map_err(TransportError::from)?;
            on_text(text);
            Ok(())
        })
    }
}

/// Success continuation receiving headers and the open body stream.
pub fn stream<F>(on_response: F) -> StreamHandler<F>
where
    F: FnOnce(Response) + Send + 'static,
{
    StreamHandler(on_response)
}

/// Adapt a string callback into a response handler.
pub fn text<F>(on_text: F) -> TextHandler<F>
where
    F: FnOnce(String) + Send + 'static,
{
    TextHandler(on_text)
}
