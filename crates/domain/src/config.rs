pub mod errors;
pub mod forward;
pub mod logging;
pub mod root;

pub use errors::ConfigError;
pub use forward::ForwardConfig;
pub use logging::{LogFormat, LoggingConfig};
pub use root::{CliOverrides, Config};
