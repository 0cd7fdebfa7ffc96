/*
 * body.rs
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

//! Body streams over an HTTP/1.1 connection.
//!
//! `BodyWriter` frames outgoing bytes (passthrough for Content-Length, chunked
//! otherwise). `NetBody` decodes the incoming body through the response parser.
//! Both fail with `TimedOut` when the socket makes no progress for the
//! configured I/O timeout.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::{Buf, BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::time::{Instant, Sleep};

use super::h1::{H1Events, ResponseParser};

const READ_CHUNK: usize = 8192;

/// Stand-in deadline when the timeout does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Deadline that starts when a socket operation first returns `Pending`
/// and is cleared by any progress.
struct IdleTimer {
    duration: Duration,
    sleep: Pin<Box<Sleep>>,
    armed: bool,
}

impl IdleTimer {
    fn new(duration: Duration) -> Self {
        Self {
            duration,
            sleep: Box::pin(tokio::time::sleep(duration)),
            armed: false,
        }
    }

    fn progress(&mut self) {
        self.armed = false;
    }

    fn poll_pending<T>(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<T>> {
        if !self.armed {
            let now = Instant::now();
            let deadline = now
                .checked_add(self.duration)
                .unwrap_or_else(|| now + FAR_FUTURE);
            self.sleep.as_mut().reset(deadline);
            self.armed = true;
        }
        match self.sleep.as_mut().poll(cx) {
            Poll::Ready(()) => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "no progress on connection",
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Request body sink. Every byte written here goes on the wire, framed if chunked.
pub struct BodyWriter<S> {
    stream: S,
    chunked: bool,
    /// Framed bytes not yet accepted by the socket.
    pending: BytesMut,
    timer: IdleTimer,
}

impl<S: AsyncWrite + Unpin> BodyWriter<S> {
    pub fn new(stream: S, chunked: bool, io_timeout: Duration) -> Self {
        Self {
            stream,
            chunked,
            pending: BytesMut::new(),
            timer: IdleTimer::new(io_timeout),
        }
    }

    fn poll_drain(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        while !self.pending.is_empty() {
            match Pin::new(&mut self.stream).poll_write(cx, &self.pending) {
                Poll::Ready(Ok(0)) => return Poll::Ready(Err(io::ErrorKind::WriteZero.into())),
                Poll::Ready(Ok(n)) => {
                    self.pending.advance(n);
                    self.timer.progress();
                }
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return self.timer.poll_pending(cx),
            }
        }
        Poll::Ready(Ok(()))
    }

    /// Write the chunked terminator if needed, flush, and give the stream back.
    pub async fn finish(mut self) -> io::Result<S> {
        if self.chunked {
            self.pending.put_slice(b"0\r\n\r\n");
        }
        self.flush().await?;
        Ok(self.stream)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for BodyWriter<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = &mut *self;
        if let Poll::Ready(Err(e)) = this.poll_drain(cx) {
            return Poll::Ready(Err(e));
        }
        if !this.pending.is_empty() {
            return Poll::Pending;
        }
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }
        if !this.chunked {
            return match Pin::new(&mut this.stream).poll_write(cx, buf) {
                Poll::Ready(Ok(n)) => {
                    this.timer.progress();
                    Poll::Ready(Ok(n))
                }
                Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
                Poll::Pending => this.timer.poll_pending(cx),
            };
        }
        this.pending.put_slice(format!("{:X}\r\n", buf.len()).as_bytes());
        this.pending.put_slice(buf);
        this.pending.put_slice(b"\r\n");
        // Accepted once framed; the socket write may still be pending.
        if let Poll::Ready(Err(e)) = this.poll_drain(cx) {
            return Poll::Ready(Err(e));
        }
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = &mut *self;
        match this.poll_drain(cx) {
            Poll::Ready(Ok(())) => Pin::new(&mut this.stream).poll_flush(cx),
            other => other,
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        // The connection stays open for the response; shutting down only flushes.
        self.poll_flush(cx)
    }
}

struct Decoded<'a>(&'a mut BytesMut);

impl H1Events for Decoded<'_> {
    fn status(&mut self, _code: u16, _reason: Option<&str>) {}
    fn header(&mut self, _name: &str, _value: &str) {}
    fn body_chunk(&mut self, data: &[u8]) {
        self.0.put_slice(data);
    }
}

/// Response body decoded from the connection. The connection closes when this is dropped.
pub struct NetBody<S> {
    stream: S,
    read_buf: BytesMut,
    parser: ResponseParser,
    decoded: BytesMut,
    closed: bool,
    timer: IdleTimer,
}

impl<S: AsyncRead + Unpin> NetBody<S> {
    /// `parser` must already have its body mode set; `leftover` holds bytes read
    /// past the response head.
    pub fn new(stream: S, leftover: BytesMut, parser: ResponseParser, io_timeout: Duration) -> Self {
        Self {
            stream,
            read_buf: leftover,
            parser,
            decoded: BytesMut::new(),
            closed: false,
            timer: IdleTimer::new(io_timeout),
        }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for NetBody<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        loop {
            if !this.decoded.is_empty() {
                let n = this.decoded.len().min(buf.remaining());
                buf.put_slice(&this.decoded[..n]);
                this.decoded.advance(n);
                return Poll::Ready(Ok(()));
            }
            if this.closed || this.parser.is_done() {
                return Poll::Ready(Ok(()));
            }
            if !this.read_buf.is_empty() {
                let before = this.read_buf.len();
                this.parser.receive(&mut this.read_buf, &mut Decoded(&mut this.decoded))?;
                if this.read_buf.len() != before {
                    continue;
                }
            }
            let mut chunk = [0u8; READ_CHUNK];
            let mut rb = ReadBuf::new(&mut chunk);
            match Pin::new(&mut this.stream).poll_read(cx, &mut rb) {
                Poll::Ready(Ok(())) => {
                    this.timer.progress();
                    if rb.filled().is_empty() {
                        if this.parser.reads_until_close() {
                            this.closed = true;
                            continue;
                        }
                        return Poll::Ready(Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "connection closed before end of body",
                        )));
                    }
                    this.read_buf.extend_from_slice(rb.filled());
                }
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return this.timer.poll_pending(cx),
            }
        }
    }
}
