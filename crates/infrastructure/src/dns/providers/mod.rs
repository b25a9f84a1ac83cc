pub mod classifier;
pub mod doh_clients;
pub mod table;

pub use classifier::{resolvers_with_delays, DelayPolicy};
pub use doh_clients::{doh_client_for, is_known_doh_url, known_doh_client};
pub use table::{doh_endpoint_for_ip, provider_for_ip, DohEndpoint, Provider, PROVIDERS};
