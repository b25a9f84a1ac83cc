//! Forwards one raw DNS query to a set of upstream resolvers.
//!
//! Each configured resolver becomes a candidate with a start delay. Candidates
//! race in parallel; the first response carrying the query's transaction id
//! wins and everything else opened for the query is closed.

mod attempt;
pub mod debug;
pub mod query;
mod race;

pub use query::ForwardQuery;

use crate::dns::providers::{resolvers_with_delays, DelayPolicy};
use crate::dns::transport::{Dialer, SystemDialer};
use ferrous_forward_domain::{Config, ConfigError, ForwardConfig, ResolverAndDelay, ResolverSpec};
use std::sync::Arc;
use std::time::Duration;

/// Tunables of a [`Forwarder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwarderSettings {
    /// UDP responses above this are treated as truncated; also the EDNS
    /// buffer size advertised back to the client.
    pub max_udp_response_bytes: u16,
    pub query_timeout: Duration,
    pub delays: DelayPolicy,
    pub debug_send: bool,
}

impl Default for ForwarderSettings {
    fn default() -> Self {
        Self::from(&ForwardConfig::default())
    }
}

impl From<&ForwardConfig> for ForwarderSettings {
    fn from(config: &ForwardConfig) -> Self {
        Self {
            max_udp_response_bytes: config.max_udp_response_bytes,
            query_timeout: config.query_timeout(),
            delays: DelayPolicy::from(config),
            debug_send: config.debug_send || debug::debug_send_from_env(),
        }
    }
}

struct ForwarderInner {
    resolvers: Vec<ResolverSpec>,
    settings: ForwarderSettings,
    dialer: Arc<dyn Dialer>,
}

#[derive(Clone)]
pub struct Forwarder {
    inner: Arc<ForwarderInner>,
}

impl Forwarder {
    pub fn new(resolvers: Vec<ResolverSpec>, settings: ForwarderSettings) -> Self {
        Self::with_dialer(resolvers, settings, Arc::new(SystemDialer))
    }

    pub fn with_dialer(
        resolvers: Vec<ResolverSpec>,
        settings: ForwarderSettings,
        dialer: Arc<dyn Dialer>,
    ) -> Self {
        Self {
            inner: Arc::new(ForwarderInner {
                resolvers,
                settings,
                dialer,
            }),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let resolvers = config.resolvers()?;
        Ok(Self::new(resolvers, ForwarderSettings::from(&config.forward)))
    }

    pub fn resolvers(&self) -> &[ResolverSpec] {
        &self.inner.resolvers
    }

    pub fn settings(&self) -> &ForwarderSettings {
        &self.inner.settings
    }

    /// The race plan for the configured resolvers.
    pub fn plan(&self) -> Vec<ResolverAndDelay> {
        resolvers_with_delays(&self.inner.resolvers, &self.inner.settings.delays)
    }
}

impl std::fmt::Debug for Forwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forwarder")
            .field("resolvers", &self.inner.resolvers)
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}
