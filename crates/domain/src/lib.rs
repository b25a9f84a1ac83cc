//! Ferrous Forward Domain Layer
pub mod config;
pub mod errors;
pub mod resolver_spec;

pub use config::{CliOverrides, Config, ConfigError, ForwardConfig, LogFormat, LoggingConfig};
pub use errors::ForwardError;
pub use resolver_spec::{ResolverAndDelay, ResolverSpec, DEFAULT_DNS_PORT};
