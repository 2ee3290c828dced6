//! Wire protocol: frame types and line-delimited JSON codec
//!
//! The duplex channel speaks one JSON object per line. The handshake is the
//! only mandated sequence:
//!
//! ```text
//! Client                                   Server
//!   |                                        |
//!   |-- {"type":"auth",token,room} --------->|
//!   |                                        |
//!   |<------- {"type":"auth_success",..} ----|
//!   |<------- {"type":"message_history",..} -|
//!   |                                        |
//!   |        [normal operation begins]       |
//!   |-- send_message / ping ---------------->|
//!   |<-- new_message / user_joined / ... ----|
//! ```
//!
//! After the handshake, outbound event ordering is not contractually fixed;
//! history ordering is owned by the durable store.

pub mod codec;
pub mod frame;

pub use codec::{FrameReader, FrameWriter};
pub use frame::{Announcement, ClientFrame, ServerFrame};

/// Default TCP port for the chat protocol
pub const DEFAULT_PORT: u16 = 7667;

/// Default cap on a single encoded frame, in bytes
pub const MAX_FRAME_BYTES: usize = 64 * 1024;
