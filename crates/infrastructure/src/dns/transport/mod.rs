pub mod dialer;
pub mod https;
pub mod tcp;
pub mod udp;

pub use dialer::{Dialer, SystemDialer};
pub use udp::UdpReply;
