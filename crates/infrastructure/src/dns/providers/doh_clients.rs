//! Pre-built HTTP clients for known DoH providers.
//!
//! Each known client resolves the provider hostname straight to the
//! provider's published addresses, so a DoH query never depends on the
//! system resolver (which may be this forwarder).

use super::table::{NEXTDNS_ANYCAST, NEXTDNS_DOH_BASE, NEXTDNS_DOH_HOST, PROVIDERS};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

const HTTPS_PORT: u16 = 443;
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

static KNOWN_CLIENTS: LazyLock<HashMap<&'static str, reqwest::Client>> = LazyLock::new(|| {
    let mut clients: HashMap<&'static str, reqwest::Client> = PROVIDERS
        .iter()
        .map(|provider| {
            let addrs: Vec<IpAddr> = provider.addresses().collect();
            (provider.doh_url, pinned_client(provider.doh_host, &addrs))
        })
        .collect();
    clients.insert(
        NEXTDNS_DOH_BASE,
        pinned_client(NEXTDNS_DOH_HOST, NEXTDNS_ANYCAST),
    );
    clients
});

/// Client for DoH URLs that are not a known provider.
static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .use_rustls_tls()
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .pool_max_idle_per_host(4)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

fn pinned_client(host: &str, addrs: &[IpAddr]) -> reqwest::Client {
    let socket_addrs: Vec<SocketAddr> = addrs
        .iter()
        .map(|ip| SocketAddr::new(*ip, HTTPS_PORT))
        .collect();

    debug!(host, addrs = socket_addrs.len(), "Building pinned DoH client");

    reqwest::Client::builder()
        .use_rustls_tls()
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .pool_max_idle_per_host(4)
        .resolve_to_addrs(host, &socket_addrs)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

fn known_key(url: &str) -> Option<&'static str> {
    if let Some((key, _)) = KNOWN_CLIENTS.get_key_value(url) {
        return Some(key);
    }
    url.strip_prefix(NEXTDNS_DOH_BASE)
        .filter(|profile| !profile.is_empty())
        .map(|_| NEXTDNS_DOH_BASE)
}

/// The pinned client for a known provider's DoH URL.
///
/// NextDNS URLs match on their base so every profile shares one client.
pub fn known_doh_client(url: &str) -> Option<reqwest::Client> {
    known_key(url).and_then(|key| KNOWN_CLIENTS.get(key).cloned())
}

pub fn is_known_doh_url(url: &str) -> bool {
    known_key(url).is_some()
}

/// Client to use for `url`: the pinned client when known, otherwise a shared
/// client that resolves hostnames through the system.
pub fn doh_client_for(url: &str) -> reqwest::Client {
    known_doh_client(url).unwrap_or_else(|| SHARED_CLIENT.clone())
}
