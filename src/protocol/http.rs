//! HTTP Proxy Handshake
//!
//! Reads one HTTP/1.x request head and works out which origin it targets.
//! The raw bytes are kept so a non-CONNECT request can be forwarded to the
//! origin unchanged.

use anyhow::{anyhow, bail, Context};
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use super::TargetAddr;
use crate::protocol::constants::*;
use crate::Result;

/// A parsed request head together with everything read from the client
#[derive(Debug, Clone)]
pub struct HttpRequestHead {
    pub method: String,
    pub target: TargetAddr,
    raw: Bytes,
    head_len: usize,
}

impl HttpRequestHead {
    pub fn is_connect(&self) -> bool {
        self.method.eq_ignore_ascii_case("CONNECT")
    }

    /// Every byte read from the client so far, head included
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// Bytes the client sent after the end of the head
    pub fn trailing(&self) -> Bytes {
        self.raw.slice(self.head_len..)
    }
}

/// Read a request head of at most `max_head` bytes
pub async fn read_request<R>(stream: &mut R, max_head: usize) -> Result<HttpRequestHead>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(max_head.min(4096));

    loop {
        let n = stream
            .read_buf(&mut buf)
            .await
            .context("Failed to read request head")?;
        if n == 0 {
            bail!("Connection closed before request head was complete");
        }

        let mut headers = [httparse::EMPTY_HEADER; HTTP_MAX_HEADERS];
        let mut request = httparse::Request::new(&mut headers);
        match request.parse(&buf) {
            Ok(httparse::Status::Complete(head_len)) => {
                let method = request
                    .method
                    .ok_or_else(|| anyhow!("Request line has no method"))?
                    .to_string();
                let path = request
                    .path
                    .ok_or_else(|| anyhow!("Request line has no target"))?;
                let target = request_target(&method, path, request.headers)?;

                trace!(method = %method, target = %target, head_len, "Parsed request head");
                return Ok(HttpRequestHead {
                    method,
                    target,
                    raw: buf.freeze(),
                    head_len,
                });
            }
            Ok(httparse::Status::Partial) => {
                if buf.len() >= max_head {
                    bail!("Request head exceeds {} bytes", max_head);
                }
            }
            Err(e) => bail!("Malformed request head: {}", e),
        }
    }
}

/// Resolve the origin from the request target, falling back to the Host header
fn request_target(
    method: &str,
    path: &str,
    headers: &[httparse::Header<'_>],
) -> Result<TargetAddr> {
    let authority = if method.eq_ignore_ascii_case("CONNECT") {
        Some(path)
    } else {
        absolute_form_authority(path)
    };

    let authority = match authority.filter(|a| !a.is_empty()) {
        Some(authority) => authority,
        None => headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case("host"))
            .map(|h| std::str::from_utf8(h.value))
            .transpose()
            .map_err(|_| anyhow!("Host header is not valid UTF-8"))?
            .ok_or_else(|| anyhow!("Request carries no host"))?,
    };

    TargetAddr::parse_authority(authority, HTTP_DEFAULT_PORT)
}

/// Authority of an absolute-form target such as `http://host:port/path`
fn absolute_form_authority(path: &str) -> Option<&str> {
    let (_, rest) = path.split_once("://")?;
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..end];
    Some(authority.rsplit_once('@').map_or(authority, |(_, host)| host))
}
