//! Per-connection session lifecycle

pub mod state;

pub use state::{SessionPhase, SessionState};
