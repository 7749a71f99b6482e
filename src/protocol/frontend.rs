//! Front-end Dispatch
//!
//! The protocol is chosen once at startup. Each variant offers the same three
//! steps the session coordinator drives: negotiate a target with the client,
//! refuse when the origin cannot be reached, and confirm once it is connected.

use anyhow::{bail, Context};
use bytes::Bytes;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::{http, socks5, TargetAddr};
use crate::config::{Config, Protocol};
use crate::protocol::constants::*;
use crate::Result;

/// Outcome of a successful negotiation, awaiting the origin dial
#[derive(Debug, Clone)]
pub enum Negotiated {
    /// HTTP CONNECT; `trailing` holds bytes the client sent after the head
    HttpTunnel { target: TargetAddr, trailing: Bytes },
    /// Plain HTTP request to forward verbatim
    HttpForward { target: TargetAddr, request: Bytes },
    Socks5 { target: TargetAddr },
}

impl Negotiated {
    pub fn target(&self) -> &TargetAddr {
        match self {
            Negotiated::HttpTunnel { target, .. }
            | Negotiated::HttpForward { target, .. }
            | Negotiated::Socks5 { target } => target,
        }
    }
}

/// HTTP and CONNECT proxy front end
#[derive(Debug, Clone)]
pub struct HttpFrontend {
    pub max_request_head: usize,
}

impl HttpFrontend {
    pub async fn negotiate<S>(
        &self,
        client: &mut S,
        local_addr: Option<SocketAddr>,
    ) -> Result<Negotiated>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let request = match http::read_request(client, self.max_request_head).await {
            Ok(request) => request,
            Err(e) => {
                let _ = client.write_all(HTTP_BAD_REQUEST).await;
                return Err(e.context("Not a http request"));
            }
        };

        if let Some(local) = local_addr {
            if request.target.to_string() == local.to_string() {
                let _ = client.write_all(HTTP_LOOPED).await;
                bail!("Host address looped: {}", request.target);
            }
        }

        debug!(method = %request.method, target = %request.target, "HTTP request accepted");

        if request.is_connect() {
            Ok(Negotiated::HttpTunnel {
                trailing: request.trailing(),
                target: request.target,
            })
        } else {
            Ok(Negotiated::HttpForward {
                request: request.raw().clone(),
                target: request.target,
            })
        }
    }

    pub async fn refuse<S>(&self, client: &mut S)
    where
        S: AsyncWrite + Unpin,
    {
        let _ = client.write_all(HTTP_UNREACHABLE).await;
    }

    pub async fn confirm<C, O>(
        &self,
        client: &mut C,
        origin: &mut O,
        negotiated: Negotiated,
    ) -> Result<()>
    where
        C: AsyncWrite + Unpin,
        O: AsyncWrite + Unpin,
    {
        match negotiated {
            Negotiated::HttpTunnel { trailing, .. } => {
                client
                    .write_all(HTTP_ESTABLISHED)
                    .await
                    .context("Failed to send CONNECT response")?;
                if !trailing.is_empty() {
                    origin
                        .write_all(&trailing)
                        .await
                        .context("Failed to forward pipelined bytes")?;
                }
            }
            Negotiated::HttpForward { request, .. } => {
                origin
                    .write_all(&request)
                    .await
                    .context("Failed to forward request")?;
            }
            Negotiated::Socks5 { .. } => bail!("SOCKS5 negotiation reached the HTTP front end"),
        }
        Ok(())
    }
}

/// SOCKS5 front end (CONNECT only, no authentication)
#[derive(Debug, Clone, Default)]
pub struct Socks5Frontend {
    /// Report the origin socket's local address instead of the constant placeholder
    pub report_bound_addr: bool,
}

impl Socks5Frontend {
    pub async fn negotiate<S>(&self, client: &mut S) -> Result<Negotiated>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        socks5::negotiate_method(client).await?;
        let target = socks5::read_connect_request(client).await?;
        debug!(target = %target, "SOCKS5 CONNECT accepted");
        Ok(Negotiated::Socks5 { target })
    }

    pub async fn confirm<C>(&self, client: &mut C, origin_local: Option<SocketAddr>) -> Result<()>
    where
        C: AsyncWrite + Unpin,
    {
        let bound = if self.report_bound_addr { origin_local } else { None };
        client
            .write_all(&socks5::success_reply(bound))
            .await
            .context("Failed to send SOCKS5 success response")?;
        Ok(())
    }
}

/// Front end selected at startup
#[derive(Debug, Clone)]
pub enum Frontend {
    Http(HttpFrontend),
    Socks5(Socks5Frontend),
}

impl Frontend {
    pub fn from_config(config: &Config) -> Self {
        match config.server.protocol {
            Protocol::Http => Frontend::Http(HttpFrontend {
                max_request_head: config.server.max_request_head,
            }),
            Protocol::Socks5 => Frontend::Socks5(Socks5Frontend {
                report_bound_addr: config.socks5.report_bound_addr,
            }),
        }
    }

    pub fn protocol(&self) -> Protocol {
        match self {
            Frontend::Http(_) => Protocol::Http,
            Frontend::Socks5(_) => Protocol::Socks5,
        }
    }

    /// Run the client side of the handshake up to the point of dialing
    pub async fn negotiate<S>(
        &self,
        client: &mut S,
        local_addr: Option<SocketAddr>,
    ) -> Result<Negotiated>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match self {
            Frontend::Http(http) => http.negotiate(client, local_addr).await,
            Frontend::Socks5(socks) => socks.negotiate(client).await,
        }
    }

    /// Tell the client the origin could not be reached, where the protocol allows it
    pub async fn refuse<S>(&self, client: &mut S)
    where
        S: AsyncWrite + Unpin,
    {
        match self {
            Frontend::Http(http) => http.refuse(client).await,
            Frontend::Socks5(_) => {}
        }
    }

    /// Finish the handshake once the origin is connected
    pub async fn confirm<C, O>(
        &self,
        client: &mut C,
        origin: &mut O,
        origin_local: Option<SocketAddr>,
        negotiated: Negotiated,
    ) -> Result<()>
    where
        C: AsyncWrite + Unpin,
        O: AsyncWrite + Unpin,
    {
        match self {
            Frontend::Http(http) => http.confirm(client, origin, negotiated).await,
            Frontend::Socks5(socks) => socks.confirm(client, origin_local).await,
        }
    }
}
