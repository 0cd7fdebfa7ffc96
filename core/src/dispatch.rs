/*
 * dispatch.rs
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

//! Request dispatch: Build, Open, Write, Await, Deliver.
//!
//! `prepare` does everything that can fail without I/O and returns `HttpError`.
//! `send` runs the asynchronous stages and returns `TransportError`.
//! `deliver` routes the outcome to exactly one continuation, notifying the
//! failure observers first when the call failed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::io::AsyncWriteExt;
use url::Url;

use crate::config::ClientConfig;
use crate::cookie::CookieJar;
use crate::error::{HttpError, TransportError};
use crate::params::Params;
use crate::query;
use crate::request::{parse_url, HttpVerb, RequestHead, FORM_URLENCODED};
use crate::response::{Response, ResponseHandler};
use crate::transport::{PendingRequest, Transport};

/// A validated request, ready to send.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub head: RequestHead,
    /// Form body for body verbs; `None` for GET and HEAD.
    pub body: Option<Vec<u8>>,
}

/// Runs requests through a transport, sharing a cookie jar.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    cookies: Arc<CookieJar>,
    config: Arc<ClientConfig>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, cookies: Arc<CookieJar>, config: Arc<ClientConfig>) -> Self {
        Self {
            transport,
            cookies,
            config,
        }
    }

    pub fn cookies(&self) -> &Arc<CookieJar> {
        &self.cookies
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Build stage. GET and HEAD carry the parameters in the URL query and treat
    /// `None` as "no parameters"; the other verbs send them as a form body and
    /// require a bag, which may be empty.
    pub fn prepare(
        &self,
        verb: HttpVerb,
        url: &str,
        params: Option<&Params>,
    ) -> Result<PreparedRequest, HttpError> {
        let mut url = parse_url(url)?;
        if !verb.has_body() {
            if let Some(params) = params {
                let serialized = params.to_query_string();
                let merged = query::merge_query(url.query(), &serialized);
                url.set_query(merged.as_deref());
            }
            return Ok(PreparedRequest {
                head: RequestHead::new(verb, url),
                body: None,
            });
        }
        let body = query::serialize(params)?.into_bytes();
        let mut head = RequestHead::new(verb, url);
        head.header("Content-Type", FORM_URLENCODED)?;
        head.content_length = Some(body.len() as u64);
        Ok(PreparedRequest {
            head,
            body: Some(body),
        })
    }

    /// Cookie and User-Agent headers for the request URL.
    pub(crate) fn attach_ambient_headers(&self, head: &mut RequestHead) {
        if let Some(cookie) = self.cookies.cookie_header(&head.url) {
            if let Some(e) = head.header("Cookie", cookie).err() {
                tracing::warn!(url = %head.url, error = %e, "stored cookies not sent");
            }
        }
        if !self.config.user_agent.is_empty() && !head.headers.contains("User-Agent") {
            if let Some(e) = head.header("User-Agent", self.config.user_agent.clone()).err() {
                tracing::warn!(error = %e, "User-Agent not sent");
            }
        }
    }

    /// Open, Write and Await for a prepared request.
    pub async fn send(&self, prepared: PreparedRequest) -> Result<Response, TransportError> {
        let PreparedRequest { mut head, body } = prepared;
        self.attach_ambient_headers(&mut head);
        let url = head.url.clone();
        tracing::debug!(verb = %head.verb, url = %url, "dispatching request");
        let mut pending = self.transport.create_request(head);
        if let Some(body) = body {
            let stream = pending.request_stream().await?;
            stream.write_all(&body).await.map_err(TransportError::Body)?;
            stream.flush().await.map_err(TransportError::Body)?;
        }
        self.await_response(pending, &url).await
    }

    /// Await stage, shared with uploads: store cookies, then classify the status.
    pub(crate) async fn await_response(
        &self,
        pending: Box<dyn PendingRequest>,
        url: &Url,
    ) -> Result<Response, TransportError> {
        let raw = pending.response().await?;
        self.cookies.store_response_cookies(url, raw.headers.get_all("Set-Cookie"));
        tracing::debug!(url = %url, status = raw.status, "response received");
        if raw.status >= 400 {
            return Err(TransportError::Status {
                code: raw.status,
                reason: raw.reason,
                headers: raw.headers,
            });
        }
        Ok(Response {
            status: raw.status,
            reason: raw.reason,
            headers: raw.headers,
            body: raw.body,
        })
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("cookies", &self.cookies)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Handle returned when registering a failure observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Observer = Arc<dyn Fn(&TransportError) + Send + Sync>;

/// Callbacks notified of every failed call of one client.
#[derive(Default)]
pub struct FailureObservers {
    next_id: AtomicU64,
    list: Mutex<Vec<(ObserverId, Observer)>>,
}

impl FailureObservers {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(ObserverId, Observer)>> {
        self.list.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&TransportError) + Send + Sync + 'static,
    {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, Arc::new(observer)));
        id
    }

    pub fn remove(&self, id: ObserverId) -> bool {
        let mut list = self.lock();
        let before = list.len();
        list.retain(|(i, _)| *i != id);
        list.len() != before
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every observer registered at the time of the call. The lock is not
    /// held while they run, so observers may register or remove observers.
    pub fn notify(&self, error: &TransportError) {
        let snapshot: Vec<Observer> = self.lock().iter().map(|(_, o)| o.clone()).collect();
        for observer in snapshot {
            observer(error);
        }
    }
}

impl std::fmt::Debug for FailureObservers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureObservers").field("len", &self.len()).finish()
    }
}

/// Deliver stage: run the success continuation, or the observers and then the
/// failure continuation. A handler that fails while consuming the body counts
/// as a failed call.
pub async fn deliver<H, F>(
    result: Result<Response, TransportError>,
    handler: H,
    on_failure: F,
    observers: &FailureObservers,
) where
    H: ResponseHandler,
    F: FnOnce(TransportError) + Send + 'static,
{
    let outcome = match result {
        Ok(response) => Box::new(handler).handle(response).await,
        Err(e) => Err(e),
    };
    if let Err(e) = outcome {
        tracing::warn!(error = %e, kind = ?e.kind(), "request failed");
        observers.notify(&e);
        on_failure(e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{BodyStream, BoxFuture, RawResponse};

    struct Unreachable;

    impl Transport for Unreachable {
        fn create_request(&self, _head: RequestHead) -> Box<dyn PendingRequest> {
            unreachable!("prepare performs no I/O")
        }
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(
            Arc::new(Unreachable),
            Arc::new(CookieJar::new()),
            Arc::new(ClientConfig::default()),
        )
    }

    #[test]
    fn get_merges_params_into_existing_query() {
        let params = Params::new().add("b", "2 3");
        let p = dispatcher()
            .prepare(HttpVerb::Get, "http://h/p?a=1", Some(&params))
            .unwrap();
        assert_eq!(p.head.url.as_str(), "http://h/p?a=1&b=2%203");
        assert!(p.body.is_none());
        assert!(p.head.content_type().is_none());
    }

    #[test]
    fn head_merges_params_with_a_single_separator() {
        let params = Params::new().add("b", "2");
        let p = dispatcher()
            .prepare(HttpVerb::Head, "http://h/p?a=1", Some(&params))
            .unwrap();
        assert_eq!(p.head.url.as_str(), "http://h/p?a=1&b=2");
        let p = dispatcher()
            .prepare(HttpVerb::Head, "http://h/p?a=1&", Some(&params))
            .unwrap();
        assert_eq!(p.head.url.as_str(), "http://h/p?a=1&b=2");
        assert!(p.body.is_none());
        assert!(p.head.content_length.is_none());
    }

    #[test]
    fn get_without_params_leaves_url_alone() {
        let p = dispatcher().prepare(HttpVerb::Head, "http://h/p", None).unwrap();
        assert_eq!(p.head.url.as_str(), "http://h/p");
        let p = dispatcher()
            .prepare(HttpVerb::Get, "http://h/p", Some(&Params::new()))
            .unwrap();
        assert_eq!(p.head.url.query(), None);
    }

    #[test]
    fn post_builds_form_body() {
        let params = Params::new().add("key", "value&");
        let p = dispatcher()
            .prepare(HttpVerb::Post, "http://h/form?x=1", Some(&params))
            .unwrap();
        assert_eq!(p.body.as_deref(), Some(&b"key=value%26"[..]));
        assert_eq!(p.head.content_type(), Some(FORM_URLENCODED));
        assert_eq!(p.head.content_length, Some(12));
        assert_eq!(p.head.url.query(), Some("x=1"));
    }

    #[test]
    fn preconditions() {
        let d = dispatcher();
        assert!(matches!(
            d.prepare(HttpVerb::Delete, "http://h/", None),
            Err(HttpError::NullParameters)
        ));
        assert!(matches!(
            d.prepare(HttpVerb::Post, "", Some(&Params::new())),
            Err(HttpError::InvalidArgument(_))
        ));
        assert!(matches!(
            d.prepare(HttpVerb::Get, "mailto:x@y", None),
            Err(HttpError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn ambient_headers_include_cookies() {
        let d = dispatcher();
        let url = Url::parse("http://h/").unwrap();
        d.cookies().store_response_cookies(&url, ["sid=42"]);
        let mut head = RequestHead::new(HttpVerb::Get, url);
        d.attach_ambient_headers(&mut head);
        assert_eq!(head.headers.get("cookie"), Some("sid=42"));
        assert!(head.headers.get("user-agent").unwrap().starts_with("courier/"));
    }

    #[test]
    fn observers_can_unsubscribe_while_notified() {
        let observers = Arc::new(FailureObservers::new());
        let hits = Arc::new(AtomicU64::new(0));
        let (o, h) = (observers.clone(), hits.clone());
        let id = Arc::new(Mutex::new(None));
        let own = id.clone();
        let registered = observers.add(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = *own.lock().unwrap() {
                o.remove(id);
            }
        });
        *id.lock().unwrap() = Some(registered);
        let err = TransportError::Protocol("x".into());
        observers.notify(&err);
        observers.notify(&err);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(observers.is_empty());
    }

    struct NotFound;

    struct NotFoundRequest;

    impl Transport for NotFound {
        fn create_request(&self, _head: RequestHead) -> Box<dyn PendingRequest> {
            Box::new(NotFoundRequest)
        }
    }

    impl PendingRequest for NotFoundRequest {
        fn request_stream(&mut self) -> BoxFuture<'_, Result<&mut BodyStream, TransportError>> {
            Box::pin(async { Err(TransportError::Protocol("no body expected".into())) })
        }

        fn response(self: Box<Self>) -> BoxFuture<'static, Result<RawResponse, TransportError>> {
            Box::pin(async {
                Ok(RawResponse {
                    status: 404,
                    reason: Some("Not Found".into()),
                    headers: [("Set-Cookie", "seen=1")].into_iter().collect(),
                    body: crate::response::ResponseBody::empty(),
                })
            })
        }
    }

    #[tokio::test]
    async fn error_status_still_stores_cookies() {
        let d = Dispatcher::new(
            Arc::new(NotFound),
            Arc::new(CookieJar::new()),
            Arc::new(ClientConfig::default()),
        );
        let prepared = d.prepare(HttpVerb::Get, "http://h/missing", None).unwrap();
        let err = d.send(prepared).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(d.cookies().len(), 1);
    }
}
