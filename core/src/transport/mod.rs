/*
 * mod.rs
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

//! Transport capability consumed by the dispatcher.
//!
//! Two asynchronous phases per request, mirroring the way a body is produced:
//! 1. `request_stream()`: connect and obtain a writable body stream (body verbs only).
//! 2. `response()`: finish the request and wait for status + headers; the body
//!    comes back as a stream.
//!
//! `NetTransport` is the shipped HTTP/1.1 implementation (plain TCP or TLS).
//! Tests substitute their own.

pub mod body;
pub mod h1;
pub mod net;
pub mod tls;

use std::future::Future;
use std::pin::Pin;

use tokio::io::AsyncWrite;

use crate::error::TransportError;
use crate::request::RequestHead;
use crate::response::{Headers, ResponseBody};

pub use net::NetTransport;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Writable request body.
pub type BodyStream = dyn AsyncWrite + Send + Unpin;

/// Creates requests. Implementations are shared across concurrent calls.
pub trait Transport: Send + Sync + 'static {
    /// Prepare a request. Performs no I/O.
    fn create_request(&self, head: RequestHead) -> Box<dyn PendingRequest>;
}

/// One request in flight.
pub trait PendingRequest: Send {
    /// Obtain the request body stream. The returned stream must be fully written
    /// and flushed before `response()` is called.
    fn request_stream(&mut self) -> BoxFuture<'_, Result<&mut BodyStream, TransportError>>;

    /// Complete the request and wait for the response head.
    fn response(self: Box<Self>) -> BoxFuture<'static, Result<RawResponse, TransportError>>;
}

/// Response as produced by a transport, before status classification.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub reason: Option<String>,
    pub headers: Headers,
    pub body: ResponseBody,
}
