/*
 * error.rs
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

//! Error types.
//!
//! Two channels: `HttpError` is returned synchronously by every entry point when
//! the call itself is malformed (no I/O has happened); `TransportError` is only
//! ever delivered asynchronously, to the failure continuation and the client's
//! failure observers.

use std::io;

use thiserror::Error;

use crate::response::Headers;

/// Precondition errors. Raised before any I/O, never routed through continuations.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The parameter bag was absent (as opposed to empty).
    #[error("parameters cannot be null")]
    NullParameters,

    #[error("invalid url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),

    #[error("unsupported request method: {0}")]
    UnsupportedVerb(String),

    /// A parameter value has no textual form (null, sequence, nested map).
    #[error("parameter {name:?} cannot be encoded: {reason}")]
    Encoding { name: String, reason: String },

    /// Continuation-style calls need a tokio runtime to spawn onto.
    #[error("no tokio runtime available to run the request")]
    NoRuntime,

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

impl HttpError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

/// Coarse classification of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Name resolution, connection refused, TLS handshake.
    Connect,
    Timeout,
    /// The server answered with an error status (4xx, 5xx).
    Status,
    /// Malformed response or broken connection after connect.
    Protocol,
    /// Writing the request body failed (includes upload source streams).
    Body,
}

/// Failures of an in-flight request. Always delivered to the failure continuation.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect to {host}:{port} failed: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("TLS handshake failed: {0}")]
    Tls(#[source] io::Error),

    #[error("HTTP {code}{}", reason_suffix(.reason))]
    Status {
        code: u16,
        reason: Option<String>,
        headers: Headers,
    },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("connection error: {0}")]
    Io(#[source] io::Error),

    #[error("request body write failed: {0}")]
    Body(#[source] io::Error),
}

impl TransportError {
    pub fn kind(&self) -> TransportErrorKind {
        match self {
            TransportError::Connect { .. } | TransportError::Tls(_) => TransportErrorKind::Connect,
            TransportError::Timeout(_) => TransportErrorKind::Timeout,
            TransportError::Status { .. } => TransportErrorKind::Status,
            TransportError::Protocol(_) | TransportError::Io(_) => TransportErrorKind::Protocol,
            TransportError::Body(_) => TransportErrorKind::Body,
        }
    }

    /// Status code when the failure is an error response.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason.as_deref().map(|r| format!(" {}", r)).unwrap_or_default()
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut => TransportError::Timeout("I/O"),
            io::ErrorKind::InvalidData => TransportError::Protocol(e.to_string()),
            _ => TransportError::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display_includes_reason() {
        let e = TransportError::Status {
            code: 404,
            reason: Some("Not Found".into()),
            headers: Headers::new(),
        };
        assert_eq!(e.to_string(), "HTTP 404 Not Found");
        assert_eq!(e.kind(), TransportErrorKind::Status);
        assert_eq!(e.status(), Some(404));
    }

    #[test]
    fn io_errors_are_classified() {
        let timeout: TransportError = io::Error::new(io::ErrorKind::TimedOut, "slow").into();
        assert_eq!(timeout.kind(), TransportErrorKind::Timeout);
        let reset: TransportError = io::Error::new(io::ErrorKind::ConnectionReset, "rst").into();
        assert_eq!(reset.kind(), TransportErrorKind::Protocol);
    }
}
