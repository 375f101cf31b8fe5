//! Per-request close and delivery tracking for long-running handlers.
//!
//! A long-running handler splits into two halves: the connection side, which
//! waits for a response on behalf of the client, and the worker side, which
//! does the slow work and hands the finished response over. The tracker is
//! the shared view of that in-flight request:
//!
//! - `closed` is set when the connection side goes away (the client or a
//!   proxy hung up, or the response has finished). A [`CloseGuard`] held by
//!   the connection side sets it on drop.
//! - `headers_sent` is set by the first successful
//!   [`ResponseTracker::begin_response`], which [`ResponseTracker::deliver`] goes
//!   through.
//!
//! A response is handed over only while neither flag is set. Anything else is
//! a silent no-op with an informational log line.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::oneshot;

#[derive(Debug, Default)]
struct InFlight {
    closed: AtomicBool,
    headers_sent: AtomicBool,
}

/// Shared handle on one in-flight request.
#[derive(Debug, Clone, Default)]
pub struct ResponseTracker {
    inner: Arc<InFlight>,
}

impl ResponseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register close detection for the connection side of the request.
    ///
    /// Must be taken before the handler starts waiting, so a hang-up during
    /// the wait is always observed.
    pub fn close_guard(&self) -> CloseGuard {
        CloseGuard {
            tracker: self.clone(),
        }
    }

    /// Record that the connection is gone.
    pub fn mark_closed(&self) {
        if !self.inner.closed.swap(true, Ordering::AcqRel) {
            tracing::info!("Response stream closed (client finished or connection dropped)");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn headers_sent(&self) -> bool {
        self.inner.headers_sent.load(Ordering::Acquire)
    }

    /// True while a response may still be written.
    pub fn can_respond(&self) -> bool {
        !self.is_closed() && !self.headers_sent()
    }

    /// Claim the right to write the response, setting `headers_sent`.
    ///
    /// Only the first claim on an open request succeeds.
    pub fn begin_response(&self) -> bool {
        if !self.can_respond() || self.inner.headers_sent.swap(true, Ordering::AcqRel) {
            tracing::info!("Response already inflight/closed, skipping write");
            return false;
        }
        true
    }

    /// Hand `response` to the connection side if nothing has closed or been
    /// sent yet.
    ///
    /// Returns whether the response was handed over. A `false` result is not
    /// an error: the response is dropped and nothing is written.
    pub fn deliver<T>(&self, sender: oneshot::Sender<T>, response: T) -> bool {
        if !self.begin_response() {
            return false;
        }

        if sender.send(response).is_err() {
            // Receiver dropped between the check and the send.
            self.mark_closed();
            tracing::info!("Response already inflight/closed, skipping write");
            return false;
        }

        true
    }
}

/// Marks its request closed when dropped.
///
/// Axum drops the handler future when the connection goes away, which drops
/// the guard with it.
#[derive(Debug)]
pub struct CloseGuard {
    tracker: ResponseTracker,
}

impl Drop for CloseGuard {
    fn drop(&mut self) {
        self.tracker.mark_closed();
    }
}
