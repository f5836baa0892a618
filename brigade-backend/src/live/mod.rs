//! Live position broadcast: cache, viewer sessions, liveness and transport.

pub mod cache;
pub mod hub;
pub mod liveness;
pub mod socket;
pub mod state;

pub use cache::PositionCache;
pub use hub::{CloseReason, Outbound, ProbeReport, SessionHub, ViewerSession};
pub use liveness::LivenessMonitor;
pub use state::LiveState;
