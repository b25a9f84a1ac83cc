use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::ForwardError;

pub const DEFAULT_DNS_PORT: u16 = 53;

/// An upstream identity: either a plain DNS server reached over UDP/TCP, or a
/// DNS-over-HTTPS endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolverSpec {
    Plain { addr: SocketAddr },
    Https { url: Arc<str> },
}

impl ResolverSpec {
    pub fn plain(addr: SocketAddr) -> Self {
        ResolverSpec::Plain { addr }
    }

    pub fn https(url: &str) -> Result<Self, ForwardError> {
        let has_host = url
            .strip_prefix("https://")
            .and_then(|rest| rest.split('/').next())
            .is_some_and(|host| !host.is_empty());
        if !has_host {
            return Err(ForwardError::InvalidResolver(format!("Invalid HTTPS URL: {}", url)));
        }
        Ok(ResolverSpec::Https { url: url.into() })
    }

    pub fn socket_addr(&self) -> Option<SocketAddr> {
        match self {
            ResolverSpec::Plain { addr } => Some(*addr),
            ResolverSpec::Https { .. } => None,
        }
    }

    pub fn ip(&self) -> Option<IpAddr> {
        self.socket_addr().map(|addr| addr.ip())
    }
}

fn parse_plain(s: &str) -> Option<SocketAddr> {
    if let Ok(addr) = s.parse::<SocketAddr>() {
        return Some(addr);
    }
    if let Ok(ip) = s.parse::<IpAddr>() {
        return Some(SocketAddr::new(ip, DEFAULT_DNS_PORT));
    }
    let bracketed = s.strip_prefix('[')?.strip_suffix(']')?;
    let ip = bracketed.parse::<IpAddr>().ok()?;
    Some(SocketAddr::new(ip, DEFAULT_DNS_PORT))
}

impl FromStr for ResolverSpec {
    type Err = ForwardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with("https://") {
            return ResolverSpec::https(s);
        }
        let addr_str = s.strip_prefix("udp://").unwrap_or(s);
        parse_plain(addr_str)
            .map(ResolverSpec::plain)
            .ok_or_else(|| {
                ForwardError::InvalidResolver(format!(
                    "Invalid resolver '{}'. Expected: IP, IP:PORT, [IPv6]:PORT, udp://IP:PORT or https://URL",
                    s
                ))
            })
    }
}

impl fmt::Display for ResolverSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolverSpec::Plain { addr } if addr.port() == DEFAULT_DNS_PORT => {
                write!(f, "{}", addr.ip())
            }
            ResolverSpec::Plain { addr } => write!(f, "{}", addr),
            ResolverSpec::Https { url, .. } => write!(f, "{}", url),
        }
    }
}

/// One entry of a race plan: a resolver and how long to wait before starting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverAndDelay {
    pub resolver: ResolverSpec,
    pub start_delay: Duration,
}

impl ResolverAndDelay {
    pub fn immediate(resolver: ResolverSpec) -> Self {
        Self {
            resolver,
            start_delay: Duration::ZERO,
        }
    }

    pub fn delayed(resolver: ResolverSpec, start_delay: Duration) -> Self {
        Self {
            resolver,
            start_delay,
        }
    }
}

impl fmt::Display for ResolverAndDelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{:?}", self.resolver, self.start_delay)
    }
}
