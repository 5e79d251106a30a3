use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::LimitError;

/// Cancellation and deadline governing every store call of one operation.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Drives `work` until it completes, the token is cancelled, or the
    /// deadline passes, whichever happens first.
    pub async fn run<T, F>(&self, work: F) -> Result<T, LimitError>
    where
        F: Future<Output = Result<T, LimitError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(LimitError::Cancelled);
        }

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(LimitError::Cancelled),
            _ = deadline => Err(LimitError::DeadlineExceeded),
            outcome = work => outcome,
        }
    }
}
