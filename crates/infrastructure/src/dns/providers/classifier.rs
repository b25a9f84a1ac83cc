use super::table::{doh_endpoint_for_ip, DohEndpoint};
use ferrous_forward_domain::{ForwardConfig, ResolverAndDelay, ResolverSpec, DEFAULT_DNS_PORT};
use std::collections::HashMap;
use std::time::Duration;

/// How long plain fallbacks of a DoH-capable provider wait behind its DoH
/// endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayPolicy {
    /// Delay of the first plain address per (provider, address family).
    pub doh_head_start: Duration,
    /// Added for each further address of the same provider and family.
    pub backup_delay: Duration,
}

impl Default for DelayPolicy {
    fn default() -> Self {
        Self {
            doh_head_start: Duration::from_millis(500),
            backup_delay: Duration::from_millis(200),
        }
    }
}

impl From<&ForwardConfig> for DelayPolicy {
    fn from(config: &ForwardConfig) -> Self {
        Self {
            doh_head_start: config.doh_head_start(),
            backup_delay: config.backup_delay(),
        }
    }
}

/// Builds the race plan for `resolvers`.
///
/// Every known provider contributes its DoH endpoint once, up front and
/// undelayed, in order of first appearance. The inputs then follow in their
/// original order: unknown addresses and DoH URLs start immediately, known
/// provider addresses are staggered behind the DoH endpoint, and addresses of
/// DoH-only providers are dropped.
pub fn resolvers_with_delays(
    resolvers: &[ResolverSpec],
    policy: &DelayPolicy,
) -> Vec<ResolverAndDelay> {
    let mut plan = Vec::with_capacity(resolvers.len() * 2);
    let mut doh_only: HashMap<String, bool> = HashMap::new();

    for resolver in resolvers {
        let Some(endpoint) = known_endpoint(resolver) else {
            continue;
        };
        if doh_only.contains_key(&endpoint.url) {
            continue;
        }
        match ResolverSpec::https(&endpoint.url) {
            Ok(spec) => {
                plan.push(ResolverAndDelay::immediate(spec));
                doh_only.insert(endpoint.url, endpoint.doh_only);
            }
            Err(_) => {
                doh_only.insert(endpoint.url, false);
            }
        }
    }

    let mut seen_per_family: HashMap<(String, bool), u32> = HashMap::new();
    for resolver in resolvers {
        let Some(endpoint) = known_endpoint(resolver) else {
            plan.push(ResolverAndDelay::immediate(resolver.clone()));
            continue;
        };
        if doh_only.get(&endpoint.url).copied().unwrap_or(false) {
            continue;
        }

        let is_v6 = resolver.ip().is_some_and(|ip| ip.is_ipv6());
        let seen = seen_per_family.entry((endpoint.url, is_v6)).or_insert(0);
        let start_delay = policy
            .doh_head_start
            .saturating_add(policy.backup_delay.saturating_mul(*seen));
        *seen += 1;
        plan.push(ResolverAndDelay::delayed(resolver.clone(), start_delay));
    }

    plan
}

fn known_endpoint(resolver: &ResolverSpec) -> Option<DohEndpoint> {
    let addr = resolver.socket_addr()?;
    if addr.port() != DEFAULT_DNS_PORT {
        return None;
    }
    doh_endpoint_for_ip(addr.ip())
}
