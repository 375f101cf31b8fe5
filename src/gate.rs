//! Process-wide admission gate for inbound requests.
//!
//! The gate is a single one-way flag. Once the shutdown coordinator starts
//! draining, every request arriving afterwards is turned away before any
//! route logic runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared draining flag, cheap to clone into every request context.
#[derive(Debug, Clone, Default)]
pub struct RequestGate {
    draining: Arc<AtomicBool>,
}

impl RequestGate {
    /// Create a gate in the accepting state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once draining has begun. No I/O, safe on the hot path.
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    /// Flip the gate to draining.
    ///
    /// Returns `true` only for the call that performed the transition; every
    /// later call is a no-op and returns `false`. The flag is never reset.
    pub fn begin_draining(&self) -> bool {
        !self.draining.swap(true, Ordering::AcqRel)
    }
}
