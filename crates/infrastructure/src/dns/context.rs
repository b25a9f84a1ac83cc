use ferrous_forward_domain::ForwardError;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Ambient cancellation scope of one forward call: a caller-owned
/// cancellation token plus an optional deadline.
#[derive(Debug, Clone, Default)]
pub struct ForwardContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl ForwardContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Tightens the deadline to `timeout` from now. An earlier deadline wins;
    /// a timeout too large to represent leaves the deadline unchanged.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The reason this context is done, if it is.
    pub fn err(&self) -> Option<ForwardError> {
        if self.token.is_cancelled() {
            Some(ForwardError::Cancelled)
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(ForwardError::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> ForwardError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => ForwardError::Cancelled,
                _ = tokio::time::sleep_until(deadline) => ForwardError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                ForwardError::Cancelled
            }
        }
    }
}
