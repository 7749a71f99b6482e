//! SOCKS5 Handshake
//!
//! Method negotiation (always answering "no authentication required") and the
//! CONNECT request. Every violation aborts the handshake without a reply.

use anyhow::{anyhow, bail, Context};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::{read_at_least, TargetAddr};
use crate::protocol::constants::*;
use crate::Result;

/// Phase 1: read the greeting and select "no authentication"
pub async fn negotiate_method<S>(stream: &mut S) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = [0u8; SOCKS5_MAX_GREETING_LEN];
    let n = read_at_least(stream, &mut buf, 2)
        .await
        .context("Failed to read greeting header")?;

    if buf[0] != SOCKS5_VERSION {
        bail!("Unsupported SOCKS version: {}", buf[0]);
    }

    let frame_len = 2 + buf[1] as usize;
    if n > frame_len {
        bail!("Greeting carries {} bytes, expected {}", n, frame_len);
    }
    if n < frame_len {
        stream
            .read_exact(&mut buf[n..frame_len])
            .await
            .context("Failed to read auth methods")?;
    }

    debug!(methods = ?&buf[2..frame_len], "SOCKS5 greeting received");

    stream
        .write_all(&[SOCKS5_VERSION, SOCKS5_AUTH_NONE])
        .await
        .context("Failed to send auth method response")?;
    Ok(())
}

/// Phase 2: read a CONNECT request and decode its target
pub async fn read_connect_request<S>(stream: &mut S) -> Result<TargetAddr>
where
    S: AsyncRead + Unpin,
{
    let mut buf = [0u8; SOCKS5_MAX_REQUEST_LEN];
    let n = read_at_least(stream, &mut buf, 5)
        .await
        .context("Failed to read request header")?;

    if buf[0] != SOCKS5_VERSION {
        bail!("Invalid SOCKS version in request: {}", buf[0]);
    }

    match buf[1] {
        SOCKS5_CMD_CONNECT => {}
        SOCKS5_CMD_BIND => bail!("BIND command is not supported"),
        SOCKS5_CMD_UDP_ASSOCIATE => bail!("UDP ASSOCIATE command is not supported"),
        other => bail!("Unsupported command: {}", other),
    }

    let address_type = buf[3];
    let frame_len = match address_type {
        SOCKS5_ADDR_IPV4 => 4 + 4 + 2,
        SOCKS5_ADDR_DOMAIN => 4 + 1 + buf[4] as usize + 2,
        SOCKS5_ADDR_IPV6 => 4 + 16 + 2,
        other => bail!("Unsupported address type: {}", other),
    };

    if n > frame_len {
        bail!("Request carries {} bytes, expected {}", n, frame_len);
    }
    if n < frame_len {
        stream
            .read_exact(&mut buf[n..frame_len])
            .await
            .context("Failed to read request address")?;
    }

    let port = u16::from_be_bytes([buf[frame_len - 2], buf[frame_len - 1]]);
    let target = match address_type {
        SOCKS5_ADDR_IPV4 => {
            let octets: [u8; 4] = buf[4..8].try_into()?;
            TargetAddr::Ip(SocketAddr::new(IpAddr::V4(Ipv4Addr::from(octets)), port))
        }
        SOCKS5_ADDR_IPV6 => {
            let octets: [u8; 16] = buf[4..20].try_into()?;
            TargetAddr::Ip(SocketAddr::new(IpAddr::V6(Ipv6Addr::from(octets)), port))
        }
        _ => {
            let domain = std::str::from_utf8(&buf[5..frame_len - 2])
                .map_err(|e| anyhow!("Invalid UTF-8 in domain name: {}", e))?;
            if domain.is_empty() {
                bail!("Domain name length cannot be zero");
            }
            TargetAddr::Domain(domain.to_string(), port)
        }
    };

    Ok(target)
}

/// Success reply sent once the origin is connected.
///
/// Without a bound address the reply carries the constant placeholder
/// `0.0.0.0` with a fixed port, which CONNECT clients ignore.
pub fn success_reply(bound: Option<SocketAddr>) -> Vec<u8> {
    let mut reply = vec![SOCKS5_VERSION, SOCKS5_REPLY_SUCCESS, SOCKS5_RESERVED];
    match bound {
        Some(SocketAddr::V4(addr)) => {
            reply.push(SOCKS5_ADDR_IPV4);
            reply.extend_from_slice(&addr.ip().octets());
            reply.extend_from_slice(&addr.port().to_be_bytes());
        }
        Some(SocketAddr::V6(addr)) => {
            reply.push(SOCKS5_ADDR_IPV6);
            reply.extend_from_slice(&addr.ip().octets());
            reply.extend_from_slice(&addr.port().to_be_bytes());
        }
        None => {
            reply.push(SOCKS5_ADDR_IPV4);
            reply.extend_from_slice(&[0, 0, 0, 0]);
            reply.extend_from_slice(&SOCKS5_PLACEHOLDER_PORT);
        }
    }
    reply
}
