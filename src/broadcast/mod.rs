//! Fan-out of frames to room members

pub mod coordinator;

pub use coordinator::{Broadcaster, PublishError};
