//! Shared test utilities and helpers for drainserve tests.
//!
//! Not every test binary uses every helper.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use drainserve::config::{AppState, Config};
use drainserve::gate::RequestGate;
use drainserve::routes::create_router;
use drainserve::shutdown::{serve_until_shutdown, ShutdownCoordinator, ShutdownSignal};
use drainserve::task::{LongTask, TaskError};
use drainserve::Termination;
use futures_util::future::BoxFuture;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Long task that counts how often it was started.
pub struct CountingTask {
    duration: Duration,
    fail: bool,
    runs: AtomicUsize,
}

impl CountingTask {
    /// Succeeds after `duration`.
    pub fn succeeding(duration: Duration) -> Arc<Self> {
        Arc::new(Self {
            duration,
            fail: false,
            runs: AtomicUsize::new(0),
        })
    }

    /// Fails after `duration`.
    pub fn failing(duration: Duration) -> Arc<Self> {
        Arc::new(Self {
            duration,
            fail: true,
            runs: AtomicUsize::new(0),
        })
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl LongTask for CountingTask {
    fn run(&self) -> BoxFuture<'static, Result<(), TaskError>> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let duration = self.duration;
        let fail = self.fail;
        Box::pin(async move {
            tokio::time::sleep(duration).await;
            if fail {
                Err(TaskError::Failed("task failure".to_string()))
            } else {
                Ok(())
            }
        })
    }
}

/// Router state with a fresh gate and the given long task.
pub fn test_state(long_task: Arc<dyn LongTask>) -> AppState {
    AppState::new(&Config::new("127.0.0.1", 0), RequestGate::new()).with_long_task(long_task)
}

/// A server on a real ephemeral port, driven by a coordinator.
pub struct RunningServer {
    pub addr: SocketAddr,
    pub coordinator: ShutdownCoordinator,
    signals: mpsc::UnboundedSender<ShutdownSignal>,
    handle: JoinHandle<Termination>,
}

impl RunningServer {
    /// Bind 127.0.0.1:0 and start serving.
    pub async fn start(long_task: Arc<dyn LongTask>, drain_timeout: Duration) -> Self {
        let state = test_state(long_task);
        let coordinator = ShutdownCoordinator::new(state.gate.clone(), drain_timeout);
        let app = create_router(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (signals, rx) = mpsc::unbounded_channel();
        let driver = coordinator.clone();
        let handle =
            tokio::spawn(async move { serve_until_shutdown(listener, app, &driver, rx).await });

        Self {
            addr,
            coordinator,
            signals,
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Deliver a signal as if the OS had sent it.
    pub fn signal(&self, signal: ShutdownSignal) {
        self.signals.send(signal).unwrap();
    }

    /// Wait for the server to terminate.
    pub async fn termination(self) -> Termination {
        self.handle.await.unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counting_task_counts_runs() {
        let task = CountingTask::succeeding(Duration::ZERO);
        task.run().await.unwrap();
        assert_eq!(task.runs(), 1);
    }
}
