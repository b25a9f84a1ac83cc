use std::collections::HashMap;
use std::fmt::Write as _;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::LazyLock;

/// A public resolver operator that also serves DNS-over-HTTPS.
#[derive(Debug)]
pub struct Provider {
    pub name: &'static str,
    pub doh_url: &'static str,
    pub doh_host: &'static str,
    pub ipv4: &'static [Ipv4Addr],
    pub ipv6: &'static [Ipv6Addr],
}

impl Provider {
    pub fn addresses(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.ipv4
            .iter()
            .copied()
            .map(IpAddr::V4)
            .chain(self.ipv6.iter().copied().map(IpAddr::V6))
    }
}

pub static PROVIDERS: &[Provider] = &[
    Provider {
        name: "google",
        doh_url: "https://dns.google/dns-query",
        doh_host: "dns.google",
        ipv4: &[Ipv4Addr::new(8, 8, 8, 8), Ipv4Addr::new(8, 8, 4, 4)],
        ipv6: &[
            Ipv6Addr::new(0x2001, 0x4860, 0x4860, 0, 0, 0, 0, 0x8888),
            Ipv6Addr::new(0x2001, 0x4860, 0x4860, 0, 0, 0, 0, 0x8844),
        ],
    },
    Provider {
        name: "cloudflare",
        doh_url: "https://cloudflare-dns.com/dns-query",
        doh_host: "cloudflare-dns.com",
        ipv4: &[Ipv4Addr::new(1, 1, 1, 1), Ipv4Addr::new(1, 0, 0, 1)],
        ipv6: &[
            Ipv6Addr::new(0x2606, 0x4700, 0x4700, 0, 0, 0, 0, 0x1111),
            Ipv6Addr::new(0x2606, 0x4700, 0x4700, 0, 0, 0, 0, 0x1001),
        ],
    },
    Provider {
        name: "quad9",
        doh_url: "https://dns.quad9.net/dns-query",
        doh_host: "dns.quad9.net",
        ipv4: &[Ipv4Addr::new(9, 9, 9, 9), Ipv4Addr::new(149, 112, 112, 112)],
        ipv6: &[
            Ipv6Addr::new(0x2620, 0xfe, 0, 0, 0, 0, 0, 0xfe),
            Ipv6Addr::new(0x2620, 0xfe, 0, 0, 0, 0, 0, 0x9),
        ],
    },
];

/// NextDNS profile endpoints are this base followed by the profile id.
pub const NEXTDNS_DOH_BASE: &str = "https://dns.nextdns.io/";
pub const NEXTDNS_DOH_HOST: &str = "dns.nextdns.io";

/// Anycast addresses the NextDNS DoH hostname is pinned to.
pub static NEXTDNS_ANYCAST: &[IpAddr] = &[
    IpAddr::V4(Ipv4Addr::new(45, 90, 28, 0)),
    IpAddr::V4(Ipv4Addr::new(45, 90, 30, 0)),
    IpAddr::V6(Ipv6Addr::new(0x2a07, 0xa8c0, 0, 0, 0, 0, 0, 0)),
    IpAddr::V6(Ipv6Addr::new(0x2a07, 0xa8c1, 0, 0, 0, 0, 0, 0)),
];

static PROVIDER_BY_IP: LazyLock<HashMap<IpAddr, &'static Provider>> = LazyLock::new(|| {
    PROVIDERS
        .iter()
        .flat_map(|provider| provider.addresses().map(move |ip| (ip, provider)))
        .collect()
});

/// DoH endpoint a plain resolver address maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DohEndpoint {
    pub url: String,
    /// The plain address must not be raced alongside the DoH endpoint.
    pub doh_only: bool,
}

pub fn provider_for_ip(ip: IpAddr) -> Option<&'static Provider> {
    PROVIDER_BY_IP.get(&ip).copied()
}

pub fn doh_endpoint_for_ip(ip: IpAddr) -> Option<DohEndpoint> {
    if let Some(provider) = provider_for_ip(ip) {
        return Some(DohEndpoint {
            url: provider.doh_url.to_string(),
            doh_only: false,
        });
    }
    match ip {
        IpAddr::V6(v6) if is_nextdns_ipv6(v6) => Some(DohEndpoint {
            url: nextdns_url_for(v6),
            doh_only: true,
        }),
        _ => None,
    }
}

/// Matches 2a07:a8c0::/33 and 2a07:a8c1::/33.
pub fn is_nextdns_ipv6(ip: Ipv6Addr) -> bool {
    let segments = ip.segments();
    segments[0] == 0x2a07 && matches!(segments[1], 0xa8c0 | 0xa8c1) && segments[2] & 0x8000 == 0
}

/// The low 64 bits of a NextDNS address encode the profile id, hex encoded
/// with leading zero bytes dropped.
fn nextdns_url_for(ip: Ipv6Addr) -> String {
    let octets = ip.octets();
    let profile = &octets[8..];
    let start = profile.iter().position(|&b| b != 0).unwrap_or(profile.len());

    let mut url = String::with_capacity(NEXTDNS_DOH_BASE.len() + 16);
    url.push_str(NEXTDNS_DOH_BASE);
    for byte in &profile[start..] {
        let _ = write!(url, "{:02x}", byte);
    }
    url
}
