/*
 * h1.rs
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

//! HTTP/1.1 response push parser: status line, headers, then a body framed by
//! Content-Length, chunked encoding, or connection close.
//!
//! Feed bytes with `receive`; complete tokens are reported to an `H1Events`
//! implementation and consumed from the buffer, partial tokens stay in it.
//! After the header section the parser stops in `HeadersComplete` until the
//! caller picks a body mode with `set_body_mode`.

use std::io;

use bytes::{Buf, BytesMut};

use crate::request::HttpVerb;
use crate::response::Headers;

/// Callbacks for parsed response tokens.
pub trait H1Events {
    fn status(&mut self, code: u16, reason: Option<&str>);
    fn header(&mut self, name: &str, value: &str);
    fn body_chunk(&mut self, data: &[u8]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    StatusLine,
    Headers,
    /// Waiting for `set_body_mode`.
    HeadersComplete,
    Body,
    UntilClose,
    ChunkSize,
    ChunkData,
    /// CRLF after a chunk's data.
    ChunkDataEnd,
    ChunkTrailer,
    Done,
}

/// How the body of a response is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    Empty,
    Length(u64),
    Chunked,
    UntilClose,
}

impl BodyMode {
    /// RFC 9112 section 6.3, for a response to `verb`.
    pub fn for_response(verb: HttpVerb, status: u16, headers: &Headers) -> io::Result<BodyMode> {
        if verb == HttpVerb::Head || (100..200).contains(&status) || status == 204 || status == 304 {
            return Ok(BodyMode::Empty);
        }
        let chunked = headers
            .get_all("Transfer-Encoding")
            .any(|v| v.to_ascii_lowercase().contains("chunked"));
        if chunked {
            return Ok(BodyMode::Chunked);
        }
        match headers.get("Content-Length") {
            Some(v) => {
                let n = v.trim().parse::<u64>().map_err(|_| {
                    io::Error::new(io::ErrorKind::InvalidData, format!("invalid Content-Length {:?}", v))
                })?;
                Ok(if n == 0 { BodyMode::Empty } else { BodyMode::Length(n) })
            }
            None => Ok(BodyMode::UntilClose),
        }
    }
}

/// Push parser for one HTTP/1.1 response.
pub struct ResponseParser {
    state: ParseState,
    /// Bytes left in the current Content-Length body or chunk.
    remaining: u64,
    /// Bytes consumed by the status line and headers so far.
    header_bytes: usize,
    max_header_bytes: usize,
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

impl ResponseParser {
    pub fn new(max_header_bytes: usize) -> Self {
        Self {
            state: ParseState::StatusLine,
            remaining: 0,
            header_bytes: 0,
            max_header_bytes,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == ParseState::Done
    }

    /// True when the body ends only when the peer closes the connection.
    pub fn reads_until_close(&self) -> bool {
        self.state == ParseState::UntilClose
    }

    /// Start over for the next response (e.g. after an interim 1xx).
    pub fn reset(&mut self) {
        self.state = ParseState::StatusLine;
        self.remaining = 0;
        self.header_bytes = 0;
    }

    pub fn set_body_mode(&mut self, mode: BodyMode) {
        if self.state != ParseState::HeadersComplete {
            return;
        }
        self.state = match mode {
            BodyMode::Empty => ParseState::Done,
            BodyMode::Length(n) => {
                self.remaining = n;
                ParseState::Body
            }
            BodyMode::Chunked => ParseState::ChunkSize,
            BodyMode::UntilClose => ParseState::UntilClose,
        };
    }

    /// Take one CRLF-terminated line off the front of `buf`. The header limit bounds
    /// the head and the trailer section as a whole, and each chunk-size line alone.
    fn take_line(&mut self, buf: &mut BytesMut) -> io::Result<Option<String>> {
        let cumulative = matches!(
            self.state,
            ParseState::StatusLine | ParseState::Headers | ParseState::ChunkTrailer
        );
        let counted = if cumulative { self.header_bytes } else { 0 };
        let end = match find_crlf(buf) {
            Some(n) => n,
            None => {
                if counted + buf.len() > self.max_header_bytes {
                    return Err(invalid("response line too long"));
                }
                return Ok(None);
            }
        };
        if counted + end + 2 > self.max_header_bytes {
            return Err(invalid("response line too long"));
        }
        if cumulative {
            self.header_bytes += end + 2;
        }
        let line = buf.split_to(end + 2);
        let text = std::str::from_utf8(&line[..end]).map_err(|_| invalid("response line is not UTF-8"))?;
        Ok(Some(text.to_string()))
    }

    /// Consume as much of `buf` as can be parsed.
    pub fn receive<E: H1Events>(&mut self, buf: &mut BytesMut, events: &mut E) -> io::Result<()> {
        while !buf.is_empty() {
            match self.state {
                ParseState::StatusLine => {
                    let line = match self.take_line(buf)? {
                        Some(l) => l,
                        None => return Ok(()),
                    };
                    // HTTP/1.1 200 OK | HTTP/1.1 200
                    let mut parts = line.splitn(3, ' ');
                    let version = parts.next().unwrap_or("");
                    if !version.starts_with("HTTP/") {
                        return Err(invalid("malformed status line"));
                    }
                    let code = parts
                        .next()
                        .and_then(|c| c.parse::<u16>().ok())
                        .ok_or_else(|| invalid("malformed status code"))?;
                    let reason = parts.next().map(str::trim).filter(|r| !r.is_empty());
                    events.status(code, reason);
                    self.state = ParseState::Headers;
                }
                ParseState::Headers => {
                    let line = match self.take_line(buf)? {
                        Some(l) => l,
                        None => return Ok(()),
                    };
                    if line.is_empty() {
                        self.state = ParseState::HeadersComplete;
                        return Ok(());
                    }
                    if let Some((name, value)) = line.split_once(':') {
                        events.header(name.trim(), value.trim());
                    }
                }
                ParseState::HeadersComplete | ParseState::Done => return Ok(()),
                ParseState::Body => {
                    let n = (self.remaining.min(buf.len() as u64)) as usize;
                    let chunk = buf.split_to(n);
                    events.body_chunk(&chunk);
                    self.remaining -= n as u64;
                    if self.remaining == 0 {
                        self.state = ParseState::Done;
                    }
                }
                ParseState::UntilClose => {
                    let chunk = buf.split();
                    events.body_chunk(&chunk);
                }
                ParseState::ChunkSize => {
                    let line = match self.take_line(buf)? {
                        Some(l) => l,
                        None => return Ok(()),
                    };
                    let hex = line.split(';').next().unwrap_or("").trim();
                    self.remaining =
                        u64::from_str_radix(hex, 16).map_err(|_| invalid("invalid chunk size"))?;
                    self.state = if self.remaining == 0 {
                        self.header_bytes = 0;
                        ParseState::ChunkTrailer
                    } else {
                        ParseState::ChunkData
                    };
                }
                ParseState::ChunkData => {
                    let n = (self.remaining.min(buf.len() as u64)) as usize;
                    let chunk = buf.split_to(n);
                    events.body_chunk(&chunk);
                    self.remaining -= n as u64;
                    if self.remaining == 0 {
                        self.state = ParseState::ChunkDataEnd;
                    }
                }
                ParseState::ChunkDataEnd => {
                    if buf.len() < 2 {
                        return Ok(());
                    }
                    if &buf[..2] != b"\r\n" {
                        return Err(invalid("missing CRLF after chunk data"));
                    }
                    buf.advance(2);
                    self.state = ParseState::ChunkSize;
                }
                ParseState::ChunkTrailer => {
                    // Trailer fields are not surfaced.
                    match self.take_line(buf)? {
                        Some(l) if l.is_empty() => self.state = ParseState::Done,
                        Some(_) => {}
                        None => return Ok(()),
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        status: Option<(u16, Option<String>)>,
        headers: Headers,
        body: Vec<u8>,
    }

    impl H1Events for Recorder {
        fn status(&mut self, code: u16, reason: Option<&str>) {
            self.status = Some((code, reason.map(str::to_string)));
        }
        fn header(&mut self, name: &str, value: &str) {
            self.headers.append(name, value);
        }
        fn body_chunk(&mut self, data: &[u8]) {
            self.body.extend_from_slice(data);
        }
    }

    fn parse_all(input: &[&[u8]], verb: HttpVerb) -> (ResponseParser, Recorder) {
        let mut parser = ResponseParser::new(8192);
        let mut rec = Recorder::default();
        let mut buf = BytesMut::new();
        for piece in input {
            buf.extend_from_slice(piece);
            parser.receive(&mut buf, &mut rec).unwrap();
            if parser.state() == ParseState::HeadersComplete {
                let (code, _) = rec.status.clone().unwrap();
                let mode = BodyMode::for_response(verb, code, &rec.headers).unwrap();
                parser.set_body_mode(mode);
                parser.receive(&mut buf, &mut rec).unwrap();
            }
        }
        (parser, rec)
    }

    #[test]
    fn content_length_body_split_across_reads() {
        let (parser, rec) = parse_all(
            &[b"HTTP/1.1 200 OK\r\nContent-Le", b"ngth: 5\r\n\r\nhel", b"lo"],
            HttpVerb::Get,
        );
        assert!(parser.is_done());
        assert_eq!(rec.status, Some((200, Some("OK".into()))));
        assert_eq!(rec.headers.get("content-length"), Some("5"));
        assert_eq!(rec.body, b"hello");
    }

    #[test]
    fn chunked_body_with_extension_and_trailer() {
        let (parser, rec) = parse_all(
            &[
                b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n",
                b"3;ext=1\r\nabc\r",
                b"\n2\r\nde\r\n0\r\nX-Trailer: t\r\n\r\n",
            ],
            HttpVerb::Get,
        );
        assert!(parser.is_done());
        assert_eq!(rec.body, b"abcde");
    }

    #[test]
    fn head_response_has_no_body() {
        let (parser, rec) = parse_all(&[b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\n"], HttpVerb::Head);
        assert!(parser.is_done());
        assert!(rec.body.is_empty());
    }

    #[test]
    fn missing_length_reads_until_close() {
        let (parser, rec) = parse_all(&[b"HTTP/1.0 200 OK\r\n\r\npartial", b" data"], HttpVerb::Get);
        assert!(parser.reads_until_close());
        assert_eq!(rec.body, b"partial data");
    }

    #[test]
    fn status_without_reason() {
        let (_, rec) = parse_all(&[b"HTTP/1.1 204\r\n\r\n"], HttpVerb::Get);
        assert_eq!(rec.status, Some((204, None)));
    }

    #[test]
    fn oversized_header_rejected() {
        let mut parser = ResponseParser::new(128);
        let mut rec = Recorder::default();
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nX-Big: "[..]);
        buf.extend_from_slice(&[b'a'; 200]);
        let err = parser.receive(&mut buf, &mut rec).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    fn chunked_parser(limit: usize) -> (ResponseParser, Recorder, BytesMut) {
        let mut parser = ResponseParser::new(limit);
        let mut rec = Recorder::default();
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n"[..]);
        parser.receive(&mut buf, &mut rec).unwrap();
        parser.set_body_mode(BodyMode::Chunked);
        (parser, rec, buf)
    }

    #[test]
    fn unterminated_trailer_line_rejected() {
        let (mut parser, mut rec, mut buf) = chunked_parser(128);
        buf.extend_from_slice(b"2\r\nok\r\n0\r\nX-Trailer: ");
        buf.extend_from_slice(&[b'a'; 200]);
        let err = parser.receive(&mut buf, &mut rec).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(rec.body, b"ok");
    }

    #[test]
    fn trailer_section_shares_the_header_limit() {
        let (mut parser, mut rec, mut buf) = chunked_parser(128);
        buf.extend_from_slice(b"0\r\n");
        for i in 0..10 {
            buf.extend_from_slice(format!("X-Trailer-{}: value\r\n", i).as_bytes());
        }
        assert!(parser.receive(&mut buf, &mut rec).is_err());
    }

    #[test]
    fn overlong_chunk_size_line_rejected() {
        let (mut parser, mut rec, mut buf) = chunked_parser(128);
        buf.extend_from_slice(&[b'0'; 300]);
        assert!(parser.receive(&mut buf, &mut rec).is_err());
    }

    #[test]
    fn trailer_within_limit_completes() {
        let (mut parser, mut rec, mut buf) = chunked_parser(128);
        buf.extend_from_slice(b"3\r\nabc\r\n0\r\nX-Trailer: t\r\n\r\n");
        parser.receive(&mut buf, &mut rec).unwrap();
        assert!(parser.is_done());
        assert_eq!(rec.body, b"abc");
    }

    #[test]
    fn garbage_status_line_rejected() {
        let mut parser = ResponseParser::new(1024);
        let mut rec = Recorder::default();
        let mut buf = BytesMut::from(&b"SSH-2.0-OpenSSH\r\n"[..]);
        assert!(parser.receive(&mut buf, &mut rec).is_err());
    }

    #[test]
    fn invalid_content_length_rejected() {
        let headers: Headers = [("Content-Length", "ten")].into_iter().collect();
        assert!(BodyMode::for_response(HttpVerb::Get, 200, &headers).is_err());
    }
}
