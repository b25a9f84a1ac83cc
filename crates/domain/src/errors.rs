use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ForwardError {
    #[error("Malformed DNS packet: {0}")]
    MalformedPacket(String),

    #[error("Transaction id mismatch: expected {expected:#06x}, got {got:#06x}")]
    TransactionMismatch { expected: u16, got: u16 },

    #[error("Transport failure talking to {server}: {reason}")]
    TransportFailure { server: String, reason: String },

    #[error("Upstream {server} answered SERVFAIL")]
    ServerFailure { server: String },

    #[error("All upstream candidates failed: {0}")]
    AllCandidatesFailed(Box<ForwardError>),

    #[error("Query cancelled")]
    Cancelled,

    #[error("Query deadline exceeded")]
    DeadlineExceeded,

    #[error("No upstream resolvers configured")]
    NoResolvers,

    #[error("Invalid resolver: {0}")]
    InvalidResolver(String),
}

impl ForwardError {
    pub fn transport(server: impl ToString, reason: impl ToString) -> Self {
        Self::TransportFailure {
            server: server.to_string(),
            reason: reason.to_string(),
        }
    }

    /// True for errors produced by the ambient context rather than by an upstream.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}
