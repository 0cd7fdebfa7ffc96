/*
 * multipart.rs
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

//! multipart/form-data uploads (RFC 7578): scalar fields first, then files,
//! streamed into the request body without buffering whole files.

use std::fmt;
use std::io;

use rand::Rng;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::dispatch::Dispatcher;
use crate::error::{HttpError, TransportError};
use crate::params::Params;
use crate::query::encode_component;
use crate::request::{parse_url, HttpVerb, RequestHead};
use crate::response::Response;

const BOUNDARY_ALPHABET: &[u8] = b"abcdefghijkmnopqrstuvwxyzABCDEFGHJKLMNOPQRSTUVWXYZ0123456789";
const BOUNDARY_LEN: usize = 12;

/// A file part: form field name, file name, MIME type and the bytes to send.
/// The stream is read once, front to back.
pub struct NamedFileStream {
    pub name: String,
    pub filename: String,
    pub content_type: String,
    stream: Box<dyn AsyncRead + Send + Unpin>,
}

impl NamedFileStream {
    pub fn new(
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        stream: impl AsyncRead + Send + Unpin + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            filename: filename.into(),
            content_type: content_type.into(),
            stream: Box::new(stream),
        }
    }

    /// In-memory file contents.
    pub fn from_bytes(
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self::new(name, filename, content_type, io::Cursor::new(data.into()))
    }
}

impl fmt::Debug for NamedFileStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedFileStream")
            .field("name", &self.name)
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Fresh random boundary token.
pub fn generate_boundary() -> String {
    let mut rng = rand::thread_rng();
    (0..BOUNDARY_LEN)
        .map(|_| BOUNDARY_ALPHABET[rng.gen_range(0..BOUNDARY_ALPHABET.len())] as char)
        .collect()
}

pub fn content_type(boundary: &str) -> String {
    format!("multipart/form-data, boundary={}", boundary)
}

/// Write a complete multipart body to `writer` and flush it. File streams are
/// copied `chunk_size` bytes at a time.
pub async fn write_body<W>(
    writer: &mut W,
    boundary: &str,
    params: &Params,
    files: Vec<NamedFileStream>,
    chunk_size: usize,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    writer.write_all(b"\r\n").await?;
    for (name, value) in params.iter() {
        let part = format!(
            "--{}\r\ncontent-disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
            boundary,
            encode_component(name),
            encode_component(value)
        );
        writer.write_all(part.as_bytes()).await?;
    }
    let mut buf = vec![0u8; chunk_size.max(1)];
    for mut file in files {
        let head = format!(
            "--{}\r\ncontent-disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            boundary, file.name, file.filename, file.content_type
        );
        writer.write_all(head.as_bytes()).await?;
        loop {
            let n = file.stream.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n]).await?;
        }
        writer.write_all(b"\r\n").await?;
    }
    writer.write_all(format!("--{}--\r\n", boundary).as_bytes()).await?;
    writer.flush().await
}

/// A validated upload, ready to send.
#[derive(Debug)]
pub struct PreparedUpload {
    pub head: RequestHead,
    pub boundary: String,
    params: Params,
    files: Vec<NamedFileStream>,
}

impl Dispatcher {
    /// Build stage for uploads. Only POST and PUT are accepted; the verb is
    /// checked before anything else.
    pub fn prepare_upload(
        &self,
        verb: HttpVerb,
        url: &str,
        params: Option<&Params>,
        files: Vec<NamedFileStream>,
    ) -> Result<PreparedUpload, HttpError> {
        if !verb.allows_upload() {
            return Err(HttpError::UnsupportedVerb(format!("{} cannot carry an upload", verb)));
        }
        let url = parse_url(url)?;
        let params = params.cloned().ok_or(HttpError::NullParameters)?;
        let boundary = generate_boundary();
        let mut head = RequestHead::new(verb, url);
        head.header("Content-Type", content_type(&boundary))?;
        Ok(PreparedUpload {
            head,
            boundary,
            params,
            files,
        })
    }

    /// Open, stream the multipart body, then Await.
    pub async fn send_upload(&self, upload: PreparedUpload) -> Result<Response, TransportError> {
        let PreparedUpload {
            mut head,
            boundary,
            params,
            files,
        } = upload;
        self.attach_ambient_headers(&mut head);
        let url = head.url.clone();
        tracing::debug!(verb = %head.verb, url = %url, files = files.len(), "dispatching upload");
        let mut pending = self.transport().create_request(head);
        let stream = pending.request_stream().await?;
        write_body(stream, &boundary, &params, files, self.config().upload_chunk_size)
            .await
            .map_err(TransportError::Body)?;
        self.await_response(pending, &url).await
    }
}
