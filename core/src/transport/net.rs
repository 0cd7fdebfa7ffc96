/*
 * net.rs
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

//! HTTP/1.1 transport over TCP or TLS. One connection per request
//! (`Connection: close`); the response body reads from that connection.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use url::{Host, Url};

use super::body::{BodyWriter, NetBody};
use super::h1::{BodyMode, H1Events, ParseState, ResponseParser};
use super::{tls, BodyStream, BoxFuture, PendingRequest, RawResponse, Transport};
use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::request::{check_header, HttpVerb, RequestHead};
use crate::response::{Headers, ResponseBody};

/// Plain TCP or TLS connection.
pub enum HttpStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for HttpStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for HttpStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_flush(cx),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// The shipped transport.
#[derive(Debug, Clone, Default)]
pub struct NetTransport {
    config: Arc<ClientConfig>,
}

impl NetTransport {
    pub fn new(config: Arc<ClientConfig>) -> Self {
        Self { config }
    }
}

impl Transport for NetTransport {
    fn create_request(&self, head: RequestHead) -> Box<dyn PendingRequest> {
        Box::new(NetRequest {
            head,
            config: self.config.clone(),
            writer: None,
        })
    }
}

struct NetRequest {
    head: RequestHead,
    config: Arc<ClientConfig>,
    /// Set once the connection is open and the head is written.
    writer: Option<BodyWriter<HttpStream>>,
}

impl NetRequest {
    fn chunked(&self) -> bool {
        self.head.verb.has_body() && self.head.content_length.is_none()
    }

    async fn open(&mut self) -> Result<&mut BodyWriter<HttpStream>, TransportError> {
        if self.writer.is_none() {
            let mut stream = connect(&self.head.url, &self.config).await?;
            let head = head_bytes(&self.head, self.chunked());
            tracing::trace!(verb = %self.head.verb, target = %self.head.target(), "sending request head");
            let write = async {
                stream.write_all(&head).await?;
                stream.flush().await?;
                Ok::<(), io::Error>(())
            };
            match timeout(self.config.io_timeout(), write).await {
                Err(_) => return Err(TransportError::Timeout("request write")),
                Ok(r) => r?,
            }
            self.writer = Some(BodyWriter::new(stream, self.chunked(), self.config.io_timeout()));
        }
        self.writer
            .as_mut()
            .ok_or_else(|| TransportError::Protocol("request stream unavailable".into()))
    }
}

impl PendingRequest for NetRequest {
    fn request_stream(&mut self) -> BoxFuture<'_, Result<&mut BodyStream, TransportError>> {
        Box::pin(async move {
            let writer = self.open().await?;
            Ok(writer as &mut BodyStream)
        })
    }

    fn response(self: Box<Self>) -> BoxFuture<'static, Result<RawResponse, TransportError>> {
        Box::pin(async move {
            let mut this = *self;
            this.open().await?;
            let writer = this
                .writer
                .take()
                .ok_or_else(|| TransportError::Protocol("request stream unavailable".into()))?;
            let stream = writer.finish().await?;
            read_response(stream, this.head.verb, &this.config).await
        })
    }
}

async fn connect(url: &Url, config: &ClientConfig) -> Result<HttpStream, TransportError> {
    let host = match url.host() {
        Some(Host::Domain(d)) => d.to_string(),
        Some(Host::Ipv4(a)) => a.to_string(),
        Some(Host::Ipv6(a)) => a.to_string(),
        None => return Err(TransportError::Protocol(format!("no host in {}", url))),
    };
    let port = url
        .port_or_known_default()
        .ok_or_else(|| TransportError::Protocol(format!("no port for {}", url)))?;
    tracing::debug!(%host, port, "connecting");
    let tcp = match timeout(config.connect_timeout(), TcpStream::connect((host.as_str(), port))).await {
        Err(_) => return Err(TransportError::Timeout("connect")),
        Ok(Err(source)) => return Err(TransportError::Connect { host, port, source }),
        Ok(Ok(tcp)) => tcp,
    };
    let _ = tcp.set_nodelay(true);
    if url.scheme() != "https" {
        return Ok(HttpStream::Plain(tcp));
    }
    match timeout(config.connect_timeout(), tls::handshake(&host, tcp)).await {
        Err(_) => Err(TransportError::Timeout("TLS handshake")),
        Ok(Err(e)) => Err(TransportError::Tls(e)),
        Ok(Ok(s)) => Ok(HttpStream::Tls(Box::new(s))),
    }
}

/// Framing headers the transport owns; caller values for these are dropped.
const HOP_HEADERS: [&str; 4] = ["Host", "Content-Length", "Transfer-Encoding", "Connection"];

fn head_bytes(head: &RequestHead, chunked: bool) -> Vec<u8> {
    let mut out = format!("{} {} HTTP/1.1\r\n", head.verb, head.target());
    let host = head.url.host_str().unwrap_or("");
    match head.url.port() {
        Some(port) => out.push_str(&format!("Host: {}:{}\r\n", host, port)),
        None => out.push_str(&format!("Host: {}\r\n", host)),
    }
    for (name, value) in head.headers.iter() {
        if HOP_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name)) {
            continue;
        }
        // Fields set directly on `headers` bypass `RequestHead::header`.
        if let Err(e) = check_header(name, value) {
            tracing::warn!(error = %e, "header dropped");
            continue;
        }
        out.push_str(&format!("{}: {}\r\n", name, value));
    }
    if let Some(len) = head.content_length {
        out.push_str(&format!("Content-Length: {}\r\n", len));
    } else if chunked {
        out.push_str("Transfer-Encoding: chunked\r\n");
    }
    out.push_str("Connection: close\r\n\r\n");
    out.into_bytes()
}

#[derive(Default)]
struct ResponseHead {
    status: Option<(u16, Option<String>)>,
    headers: Headers,
}

impl H1Events for ResponseHead {
    fn status(&mut self, code: u16, reason: Option<&str>) {
        self.status = Some((code, reason.map(str::to_string)));
    }

    fn header(&mut self, name: &str, value: &str) {
        self.headers.append(name, value);
    }

    fn body_chunk(&mut self, _data: &[u8]) {}
}

async fn read_response(
    mut stream: HttpStream,
    verb: HttpVerb,
    config: &ClientConfig,
) -> Result<RawResponse, TransportError> {
    let io_timeout = config.io_timeout();
    let mut parser = ResponseParser::new(config.max_header_bytes);
    let mut buf = BytesMut::with_capacity(8192);
    loop {
        let mut head = ResponseHead::default();
        loop {
            parser.receive(&mut buf, &mut head)?;
            if parser.state() == ParseState::HeadersComplete {
                break;
            }
            let n = match timeout(io_timeout, stream.read_buf(&mut buf)).await {
                Err(_) => return Err(TransportError::Timeout("response head")),
                Ok(r) => r?,
            };
            if n == 0 {
                return Err(TransportError::Protocol(
                    "connection closed before response head".into(),
                ));
            }
        }
        let (status, reason) = head
            .status
            .ok_or_else(|| TransportError::Protocol("response without status line".into()))?;
        if status == 101 {
            return Err(TransportError::Protocol("unexpected protocol switch".into()));
        }
        if (100..200).contains(&status) {
            tracing::trace!(status, "skipping interim response");
            parser.reset();
            continue;
        }
        let mode = BodyMode::for_response(verb, status, &head.headers)?;
        parser.set_body_mode(mode);
        tracing::debug!(status, ?mode, "response head received");
        let body = if parser.is_done() {
            ResponseBody::empty()
        } else {
            ResponseBody::new(NetBody::new(stream, buf, parser, io_timeout))
        };
        return Ok(RawResponse {
            status,
            reason,
            headers: head.headers,
            body,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(head: &RequestHead, chunked: bool) -> String {
        String::from_utf8(head_bytes(head, chunked)).unwrap()
    }

    #[test]
    fn get_head_omits_default_port_and_body_framing() {
        let mut head = RequestHead::new(HttpVerb::Get, Url::parse("http://example.com/a?b=1").unwrap());
        head.header("User-Agent", "courier/test").unwrap();
        assert_eq!(
            text(&head, false),
            "GET /a?b=1 HTTP/1.1\r\nHost: example.com\r\nUser-Agent: courier/test\r\nConnection: close\r\n\r\n"
        );
    }

    #[test]
    fn post_head_with_length_and_explicit_port() {
        let mut head = RequestHead::new(HttpVerb::Post, Url::parse("http://127.0.0.1:8080/f").unwrap());
        head.header("Content-Type", "application/x-www-form-urlencoded")
            .unwrap()
            .header("Connection", "keep-alive")
            .unwrap();
        head.content_length = Some(7);
        assert_eq!(
            text(&head, false),
            "POST /f HTTP/1.1\r\nHost: 127.0.0.1:8080\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: 7\r\nConnection: close\r\n\r\n"
        );
    }

    #[test]
    fn fields_with_line_breaks_are_not_written() {
        let mut head = RequestHead::new(HttpVerb::Get, Url::parse("http://example.com/").unwrap());
        head.headers.append("X-Injected", "a\r\nEvil: 1");
        head.headers.append("X-Fine", "ok");
        let out = text(&head, false);
        assert!(!out.contains("Evil"));
        assert!(out.contains("X-Fine: ok\r\n"));
    }

    #[test]
    fn unknown_length_uses_chunked() {
        let head = RequestHead::new(HttpVerb::Put, Url::parse("https://example.com/").unwrap());
        assert!(text(&head, true).contains("Transfer-Encoding: chunked\r\n"));
    }
}
