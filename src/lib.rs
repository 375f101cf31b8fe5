//! drainserve - an HTTP server that drains in-flight requests on shutdown

pub mod config;
pub mod error;
pub mod gate;
pub mod middleware;
pub mod routes;
pub mod shutdown;
pub mod task;
pub mod tracker;

pub use gate::RequestGate;
pub use shutdown::{ShutdownCoordinator, ShutdownSignal, ShutdownState, Termination};
pub use tracker::ResponseTracker;
