pub mod close_pool;
pub mod context;
pub mod forwarder;
pub mod packet;
pub mod providers;
pub mod transport;

pub use close_pool::{Closable, ClosePool, Registration};
pub use context::ForwardContext;
pub use forwarder::{ForwardQuery, Forwarder, ForwarderSettings};
pub use providers::{doh_client_for, known_doh_client, resolvers_with_delays, DelayPolicy};
pub use transport::{Dialer, SystemDialer};
