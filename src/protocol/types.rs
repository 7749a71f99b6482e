//! Protocol Types

use anyhow::{anyhow, bail};
use std::fmt;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use crate::Result;

/// Origin address requested by a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetAddr {
    Ip(SocketAddr),
    Domain(String, u16),
}

impl TargetAddr {
    /// Build from a host and port, recognising IP literals
    pub fn from_host_port(host: &str, port: u16) -> Self {
        match host.parse::<IpAddr>() {
            Ok(ip) => TargetAddr::Ip(SocketAddr::new(ip, port)),
            Err(_) => TargetAddr::Domain(host.to_string(), port),
        }
    }

    /// Parse an HTTP authority (`host`, `host:port`, `[v6]`, `[v6]:port`),
    /// falling back to `default_port` when none is given
    pub fn parse_authority(authority: &str, default_port: u16) -> Result<Self> {
        let authority = authority.trim();
        if authority.is_empty() {
            bail!("Empty host");
        }

        if let Some(rest) = authority.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| anyhow!("Unterminated IPv6 literal: {}", authority))?;
            let ip = host
                .parse::<Ipv6Addr>()
                .map_err(|_| anyhow!("Invalid IPv6 literal: {}", host))?;
            let port = match tail {
                "" => default_port,
                _ => match tail.strip_prefix(':') {
                    Some(port) => parse_port(port, default_port)?,
                    None => bail!("Unexpected characters after IPv6 literal: {}", authority),
                },
            };
            return Ok(TargetAddr::Ip(SocketAddr::new(IpAddr::V6(ip), port)));
        }

        match authority.matches(':').count() {
            0 => Ok(Self::from_host_port(authority, default_port)),
            1 => {
                let (host, port) = authority
                    .split_once(':')
                    .ok_or_else(|| anyhow!("Invalid authority: {}", authority))?;
                if host.is_empty() {
                    bail!("Empty host in authority: {}", authority);
                }
                Ok(Self::from_host_port(host, parse_port(port, default_port)?))
            }
            // Bare IPv6 literal without brackets carries no port
            _ => authority
                .parse::<Ipv6Addr>()
                .map(|ip| TargetAddr::Ip(SocketAddr::new(IpAddr::V6(ip), default_port)))
                .map_err(|_| anyhow!("Invalid authority: {}", authority)),
        }
    }
}

fn parse_port(port: &str, default_port: u16) -> Result<u16> {
    if port.is_empty() {
        return Ok(default_port);
    }
    port.parse::<u16>()
        .map_err(|_| anyhow!("Invalid port: {}", port))
}

impl fmt::Display for TargetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetAddr::Ip(addr) => write!(f, "{}", addr),
            TargetAddr::Domain(domain, port) if domain.contains(':') => {
                write!(f, "[{}]:{}", domain, port)
            }
            TargetAddr::Domain(domain, port) => write!(f, "{}:{}", domain, port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_parse_authority_with_port() {
        let addr = TargetAddr::parse_authority("example.com:8443", 80).unwrap();
        assert_eq!(addr, TargetAddr::Domain("example.com".to_string(), 8443));
        assert_eq!(addr.to_string(), "example.com:8443");
    }

    #[test]
    fn test_parse_authority_default_port() {
        let addr = TargetAddr::parse_authority("example.com", 80).unwrap();
        assert_eq!(addr.to_string(), "example.com:80");

        let addr = TargetAddr::parse_authority("10.0.0.1", 80).unwrap();
        assert_eq!(
            addr,
            TargetAddr::Ip(SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 80))
        );
    }

    #[test]
    fn test_parse_authority_ipv6() {
        let addr = TargetAddr::parse_authority("[::1]:8080", 80).unwrap();
        assert_eq!(addr.to_string(), "[::1]:8080");
        assert!(matches!(addr, TargetAddr::Ip(SocketAddr::V6(_))));

        let addr = TargetAddr::parse_authority("[::1]", 80).unwrap();
        assert_eq!(addr.to_string(), "[::1]:80");

        let addr = TargetAddr::parse_authority("fe80::1", 80).unwrap();
        assert_eq!(addr.to_string(), "[fe80::1]:80");
    }

    #[test]
    fn test_parse_authority_rejects_garbage() {
        assert!(TargetAddr::parse_authority("", 80).is_err());
        assert!(TargetAddr::parse_authority(":8080", 80).is_err());
        assert!(TargetAddr::parse_authority("host:notaport", 80).is_err());
        assert!(TargetAddr::parse_authority("[::1", 80).is_err());
        assert!(TargetAddr::parse_authority("a:b:c", 80).is_err());
    }

    #[test]
    fn test_display_matches_socket_addr() {
        let local: SocketAddr = "127.0.0.1:1080".parse().unwrap();
        let target = TargetAddr::parse_authority("127.0.0.1:1080", 80).unwrap();
        assert_eq!(target.to_string(), local.to_string());
    }
}
