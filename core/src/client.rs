/*
 * client.rs
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

//! Client facade: one entry point per verb plus uploads.
//!
//! Every entry point validates its arguments synchronously and returns
//! `HttpError` without doing any I/O when they are malformed. Otherwise it
//! spawns the request on the client's runtime and returns at once; exactly one
//! of the two continuations runs later on a runtime worker thread.
//!
//! ```no_run
//! # use courier_core::{Client, Params, response};
//! # async fn demo() -> Result<(), courier_core::HttpError> {
//! let client = Client::new()?;
//! let params = Params::new().add("q", "rust");
//! client.get(
//!     "https://example.com/search",
//!     Some(&params),
//!     response::text(|body| println!("{}", body)),
//!     |err| eprintln!("failed: {}", err),
//! )?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tokio::runtime::Handle;

use crate::config::ClientConfig;
use crate::cookie::CookieJar;
use crate::dispatch::{deliver, Dispatcher, FailureObservers, ObserverId, PreparedRequest};
use crate::error::{HttpError, TransportError};
use crate::multipart::NamedFileStream;
use crate::params::Params;
use crate::request::HttpVerb;
use crate::response::ResponseHandler;
use crate::transport::{NetTransport, Transport};

/// Failure continuation that does nothing. Observers are still notified.
pub fn discard_failure(_error: TransportError) {}

/// Builder for `Client`. Defaults: `NetTransport`, a new cookie jar, default
/// configuration, the runtime of the calling context.
#[derive(Default)]
pub struct ClientBuilder {
    transport: Option<Arc<dyn Transport>>,
    cookies: Option<Arc<CookieJar>>,
    config: ClientConfig,
    runtime: Option<Handle>,
}

impl ClientBuilder {
    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Share a cookie jar with other clients.
    pub fn cookie_jar(mut self, jar: Arc<CookieJar>) -> Self {
        self.cookies = Some(jar);
        self
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Runtime the requests are spawned on.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn build(self) -> Result<Client, HttpError> {
        self.config.validate()?;
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| HttpError::NoRuntime)?,
        };
        let config = Arc::new(self.config);
        let transport: Arc<dyn Transport> = match self.transport {
            Some(t) => t,
            None => Arc::new(NetTransport::new(config.clone())),
        };
        let cookies = self.cookies.unwrap_or_default();
        Ok(Client {
            dispatcher: Dispatcher::new(transport, cookies, config),
            observers: Arc::new(FailureObservers::new()),
            runtime,
        })
    }
}

/// Asynchronous HTTP form client.
#[derive(Debug, Clone)]
pub struct Client {
    dispatcher: Dispatcher,
    observers: Arc<FailureObservers>,
    runtime: Handle,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Client with default settings on the current tokio runtime.
    pub fn new() -> Result<Self, HttpError> {
        Self::builder().build()
    }

    pub fn cookie_jar(&self) -> &Arc<CookieJar> {
        self.dispatcher.cookies()
    }

    /// The continuation-free pipeline, for callers already in async code.
    /// Failures on this path do not reach the failure observers.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Register an observer called with every failed call of this client
    /// (and of its clones), before the call's own failure continuation.
    pub fn on_connect_failed<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&TransportError) + Send + Sync + 'static,
    {
        self.observers.add(observer)
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }

    /// GET with `params` appended to the URL query. `None` sends no parameters.
    pub fn get<H, F>(&self, url: &str, params: Option<&Params>, on_success: H, on_failure: F) -> Result<(), HttpError>
    where
        H: ResponseHandler,
        F: FnOnce(TransportError) + Send + 'static,
    {
        self.request(HttpVerb::Get, url, params, on_success, on_failure)
    }

    pub fn head<H, F>(&self, url: &str, params: Option<&Params>, on_success: H, on_failure: F) -> Result<(), HttpError>
    where
        H: ResponseHandler,
        F: FnOnce(TransportError) + Send + 'static,
    {
        self.request(HttpVerb::Head, url, params, on_success, on_failure)
    }

    /// POST `params` as a form body. `None` is rejected with `NullParameters`.
    pub fn post<H, F>(&self, url: &str, params: Option<&Params>, on_success: H, on_failure: F) -> Result<(), HttpError>
    where
        H: ResponseHandler,
        F: FnOnce(TransportError) + Send + 'static,
    {
        self.request(HttpVerb::Post, url, params, on_success, on_failure)
    }

    pub fn put<H, F>(&self, url: &str, params: Option<&Params>, on_success: H, on_failure: F) -> Result<(), HttpError>
    where
        H: ResponseHandler,
        F: FnOnce(TransportError) + Send + 'static,
    {
        self.request(HttpVerb::Put, url, params, on_success, on_failure)
    }

    pub fn patch<H, F>(&self, url: &str, params: Option<&Params>, on_success: H, on_failure: F) -> Result<(), HttpError>
    where
        H: ResponseHandler,
        F: FnOnce(TransportError) + Send + 'static,
    {
        self.request(HttpVerb::Patch, url, params, on_success, on_failure)
    }

    pub fn delete<H, F>(&self, url: &str, params: Option<&Params>, on_success: H, on_failure: F) -> Result<(), HttpError>
    where
        H: ResponseHandler,
        F: FnOnce(TransportError) + Send + 'static,
    {
        self.request(HttpVerb::Delete, url, params, on_success, on_failure)
    }

    /// Any verb, with the parameter rules of the verb-specific entry points.
    pub fn request<H, F>(
        &self,
        verb: HttpVerb,
        url: &str,
        params: Option<&Params>,
        on_success: H,
        on_failure: F,
    ) -> Result<(), HttpError>
    where
        H: ResponseHandler,
        F: FnOnce(TransportError) + Send + 'static,
    {
        let prepared = self.dispatcher.prepare(verb, url, params)?;
        self.spawn_request(prepared, on_success, on_failure);
        Ok(())
    }

    /// Multipart POST of `params` and `files`.
    pub fn upload<H, F>(
        &self,
        url: &str,
        params: Option<&Params>,
        files: Vec<NamedFileStream>,
        on_success: H,
        on_failure: F,
    ) -> Result<(), HttpError>
    where
        H: ResponseHandler,
        F: FnOnce(TransportError) + Send + 'static,
    {
        self.upload_with(HttpVerb::Post, url, params, files, on_success, on_failure)
    }

    /// Multipart upload with an explicit verb; only POST and PUT are accepted.
    pub fn upload_with<H, F>(
        &self,
        verb: HttpVerb,
        url: &str,
        params: Option<&Params>,
        files: Vec<NamedFileStream>,
        on_success: H,
        on_failure: F,
    ) -> Result<(), HttpError>
    where
        H: ResponseHandler,
        F: FnOnce(TransportError) + Send + 'static,
    {
        let upload = self.dispatcher.prepare_upload(verb, url, params, files)?;
        let dispatcher = self.dispatcher.clone();
        let observers = self.observers.clone();
        self.runtime.spawn(async move {
            let result = dispatcher.send_upload(upload).await;
            deliver(result, on_success, on_failure, &observers).await;
        });
        Ok(())
    }

    fn spawn_request<H, F>(&self, prepared: PreparedRequest, on_success: H, on_failure: F)
    where
        H: ResponseHandler,
        F: FnOnce(TransportError) + Send + 'static,
    {
        let dispatcher = self.dispatcher.clone();
        let observers = self.observers.clone();
        self.runtime.spawn(async move {
            let result = dispatcher.send(prepared).await;
            deliver(result, on_success, on_failure, &observers).await;
        });
    }
}
