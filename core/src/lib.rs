/*
 * lib.rs
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

//! Courier core: an asynchronous HTTP client for form posts, queries and
//! multipart uploads, with success/failure continuations and a cookie jar
//! shared across requests.

pub mod client;
pub mod config;
pub mod cookie;
pub mod dispatch;
pub mod error;
pub mod multipart;
pub mod params;
pub mod query;
pub mod request;
pub mod response;
pub mod transport;

pub use client::{discard_failure, Client, ClientBuilder};
pub use config::ClientConfig;
pub use cookie::CookieJar;
pub use dispatch::{Dispatcher, ObserverId};
pub use error::{HttpError, TransportError, TransportErrorKind};
pub use multipart::NamedFileStream;
pub use params::Params;
pub use request::HttpVerb;
pub use response::{Headers, Response, ResponseBody, ResponseHandler};
pub use transport::{NetTransport, Transport};
