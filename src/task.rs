//! The long-running unit of work behind `/long-running`.
//!
//! The work is a trait object so the route does not care whether it is a
//! timer standing in for a slow query or something real.

use std::time::Duration;

use futures_util::future::BoxFuture;
use thiserror::Error;

/// Failure raised by a [`LongTask`]. Never shown to clients.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The work itself reported a failure
    #[error("task failed: {0}")]
    Failed(String),
}

/// An asynchronous operation of arbitrary (possibly unbounded) length.
pub trait LongTask: Send + Sync + 'static {
    /// Start the work. The returned future must not block the executor.
    fn run(&self) -> BoxFuture<'static, Result<(), TaskError>>;
}

/// Sleeps for a fixed duration and then succeeds.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedWork {
    duration: Duration,
}

impl SimulatedWork {
    /// Create simulated work lasting `duration`.
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl LongTask for SimulatedWork {
    fn run(&self) -> BoxFuture<'static, Result<(), TaskError>> {
        let duration = self.duration;
        Box::pin(async move {
            tokio::time::sleep(duration).await;
            Ok(())
        })
    }
}
