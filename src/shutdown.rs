//! Graceful shutdown handling for the drainserve server.
//!
//! The [`ShutdownCoordinator`] owns the termination sequence:
//!
//! 1. A termination signal flips the [`RequestGate`], so requests that still
//!    reach a handler are answered with 503.
//! 2. The listener stops accepting connections while open connections keep
//!    being served ([`ShutdownCoordinator::draining`] feeds axum's graceful
//!    shutdown).
//! 3. Drain completion races the deadline. SIGTERM arms a deadline
//!    (120 seconds by default) after which the process exits with code 1.
//!    SIGINT waits for the drain with no deadline at all.
//!
//! Further signals while draining are ignored: the drain is not restarted
//! and no second deadline is armed.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};

use crate::gate::RequestGate;

/// The two termination signals the server reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGTERM: drain, then force exit once the deadline passes
    Terminate,
    /// SIGINT (Ctrl+C): drain with no deadline
    Interrupt,
}

impl ShutdownSignal {
    pub fn name(self) -> &'static str {
        match self {
            ShutdownSignal::Terminate => "SIGTERM",
            ShutdownSignal::Interrupt => "SIGINT",
        }
    }

    /// Deadline armed when this signal starts the drain.
    ///
    /// SIGINT never gets one. An operator pressing Ctrl+C on a server stuck
    /// with an open connection will wait until it closes.
    pub fn drain_deadline(self, drain_timeout: Duration) -> Option<Duration> {
        match self {
            ShutdownSignal::Terminate => Some(drain_timeout),
            ShutdownSignal::Interrupt => None,
        }
    }
}

/// Lifecycle of the server process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    Draining,
    Terminated,
}

/// How the server ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Every connection closed before any deadline
    Drained,
    /// The drain deadline elapsed with connections still open
    Forced,
    /// The listener failed
    Failed,
}

impl Termination {
    /// Process exit code for this outcome.
    pub fn exit_code(self) -> i32 {
        match self {
            Termination::Drained => 0,
            Termination::Forced | Termination::Failed => 1,
        }
    }
}

/// Drives the `Running -> Draining -> Terminated` state machine.
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    gate: RequestGate,
    drain_timeout: Duration,
    state: Arc<watch::Sender<ShutdownState>>,
}

impl ShutdownCoordinator {
    pub fn new(gate: RequestGate, drain_timeout: Duration) -> Self {
        let (state, _) = watch::channel(ShutdownState::Running);
        Self {
            gate,
            drain_timeout,
            state: Arc::new(state),
        }
    }

    pub fn gate(&self) -> &RequestGate {
        &self.gate
    }

    pub fn state(&self) -> ShutdownState {
        *self.state.borrow()
    }

    /// Start draining in response to `signal`.
    ///
    /// Returns `true` if this call moved the coordinator out of `Running`.
    /// Any later call is logged and otherwise ignored.
    pub fn begin(&self, signal: ShutdownSignal) -> bool {
        let started = self.state.send_if_modified(|state| {
            if *state == ShutdownState::Running {
                *state = ShutdownState::Draining;
                true
            } else {
                false
            }
        });

        if !started {
            tracing::debug!("Received {} while already shutting down, ignoring", signal.name());
            return false;
        }

        self.gate.begin_draining();
        match signal.drain_deadline(self.drain_timeout) {
            Some(deadline) => tracing::info!(
                "Received {}, starting graceful shutdown (forced exit in {}s)",
                signal.name(),
                deadline.as_secs()
            ),
            None => tracing::info!(
                "Received {}, starting graceful shutdown (no deadline)",
                signal.name()
            ),
        }
        true
    }

    /// Completes once draining has begun.
    ///
    /// Hand this to the listener as its stop-accepting trigger.
    pub fn draining(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut state = self.state.subscribe();
        async move {
            // The sender lives in `self`, which may be dropped first; treat
            // that like a shutdown.
            let _ = state
                .wait_for(|state| *state != ShutdownState::Running)
                .await;
        }
    }

    /// Run `server` until it drains or is abandoned.
    ///
    /// `server` must stop accepting once [`draining`](Self::draining)
    /// resolves and complete once its last connection closes. Signals are
    /// read from `signals` for the whole lifetime of the server; only the
    /// first one has any effect.
    pub async fn run<F>(
        &self,
        mut signals: mpsc::UnboundedReceiver<ShutdownSignal>,
        server: F,
    ) -> Termination
    where
        F: Future<Output = std::io::Result<()>>,
    {
        tokio::pin!(server);

        let signal = tokio::select! {
            Some(signal) = signals.recv() => signal,
            result = &mut server => return self.finish(Self::served(result)),
        };

        self.begin(signal);
        let deadline = signal.drain_deadline(self.drain_timeout);
        let forced = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep(deadline).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(forced);

        let termination = loop {
            tokio::select! {
                result = &mut server => break Self::served(result),
                () = &mut forced => {
                    tracing::warn!("Force exiting after timeout, abandoning open connections");
                    break Termination::Forced;
                }
                Some(again) = signals.recv() => {
                    self.begin(again);
                }
            }
        };

        self.finish(termination)
    }

    fn served(result: std::io::Result<()>) -> Termination {
        match result {
            Ok(()) => {
                tracing::info!("All active connections closed");
                Termination::Drained
            }
            Err(e) => {
                tracing::error!("Server error: {}", e);
                Termination::Failed
            }
        }
    }

    /// Enter `Terminated`. Only the first caller performs the transition.
    fn finish(&self, termination: Termination) -> Termination {
        let first = self.state.send_if_modified(|state| {
            if *state == ShutdownState::Terminated {
                false
            } else {
                *state = ShutdownState::Terminated;
                true
            }
        });
        if first {
            tracing::info!(
                "Shutdown complete: {:?} (exit code {})",
                termination,
                termination.exit_code()
            );
        }
        termination
    }
}

/// Serve `app` on `listener` until the coordinator terminates.
pub async fn serve_until_shutdown(
    listener: TcpListener,
    app: Router,
    coordinator: &ShutdownCoordinator,
    signals: mpsc::UnboundedReceiver<ShutdownSignal>,
) -> Termination {
    let draining = coordinator.draining();
    let server = async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(draining)
            .await
    };
    coordinator.run(signals, server).await
}

/// Install handlers for SIGTERM and SIGINT and forward every delivery.
///
/// On non-unix platforms only Ctrl+C is handled, reported as
/// [`ShutdownSignal::Interrupt`].
pub fn listen_for_signals() -> std::io::Result<mpsc::UnboundedReceiver<ShutdownSignal>> {
    let (tx, rx) = mpsc::unbounded_channel();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    Some(()) = sigterm.recv() => ShutdownSignal::Terminate,
                    Some(()) = sigint.recv() => ShutdownSignal::Interrupt,
                    else => break,
                };
                if tx.send(received).is_err() {
                    break;
                }
            }
        });
    }

    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if tx.send(ShutdownSignal::Interrupt).is_err() {
                    break;
                }
            }
        });
    }

    Ok(rx)
}
