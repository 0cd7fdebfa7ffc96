/*
 * config.rs
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

//! Client configuration. All fields have defaults, so an empty TOML document
//! is a valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::HttpError;
use crate::request::check_header;

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_IO_TIMEOUT_SECS: u64 = 60;
const DEFAULT_UPLOAD_CHUNK_SIZE: usize = 4096;
const DEFAULT_MAX_HEADER_BYTES: usize = 64 * 1024;

/// Settings shared by the dispatcher and the shipped transport.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    /// Sent as `User-Agent` on every request. Empty disables the header.
    pub user_agent: String,

    /// TCP connect (and TLS handshake) limit.
    pub connect_timeout_secs: u64,

    /// Limit for each read or write on an established connection.
    pub io_timeout_secs: u64,

    /// Read size when copying upload streams into the request body.
    pub upload_chunk_size: usize,

    /// Maximum size of a response status line plus header section.
    pub max_header_bytes: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("courier/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            io_timeout_secs: DEFAULT_IO_TIMEOUT_SECS,
            upload_chunk_size: DEFAULT_UPLOAD_CHUNK_SIZE,
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
        }
    }
}

impl ClientConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, HttpError> {
        let config: ClientConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), HttpError> {
        if self.upload_chunk_size == 0 {
            return Err(HttpError::invalid("upload_chunk_size must be greater than zero"));
        }
        if self.connect_timeout_secs == 0 || self.io_timeout_secs == 0 {
            return Err(HttpError::invalid("timeouts must be greater than zero"));
        }
        if self.max_header_bytes < 128 {
            return Err(HttpError::invalid("max_header_bytes must be at least 128"));
        }
        if !self.user_agent.is_empty() {
            check_header("User-Agent", &self.user_agent)?;
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = ClientConfig::from_toml("").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.upload_chunk_size, 4096);
        assert_eq!(config.connect_timeout(), Duration::from_secs(15));
        assert!(config.user_agent.starts_with("courier/"));
    }

    #[test]
    fn partial_document_overrides() {
        let config = ClientConfig::from_toml(
            "user_agent = \"test-agent\"\nupload_chunk_size = 16\n",
        )
        .unwrap();
        assert_eq!(config.user_agent, "test-agent");
        assert_eq!(config.upload_chunk_size, 16);
        assert_eq!(config.io_timeout_secs, 60);
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let err = ClientConfig::from_toml("upload_chunk_size = 0").unwrap_err();
        assert!(matches!(err, HttpError::InvalidArgument(_)));
    }

    #[test]
    fn user_agent_with_line_break_rejected() {
        let err = ClientConfig::from_toml("user_agent = \"agent\\r\\nX-Evil: 1\"").unwrap_err();
        assert!(matches!(err, HttpError::InvalidArgument(_)));
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = ClientConfig::from_toml("user_agent = ").unwrap_err();
        assert!(matches!(err, HttpError::Config(_)));
    }
}
