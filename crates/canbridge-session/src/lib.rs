//! Pub/sub session boundary.
//!
//! The capture loop only needs a liveness query and a way to publish frames;
//! both are expressed by the [`Session`] trait. [`UdpSession`] is the concrete
//! multicast session used by the binary, with an inbound thread that hands
//! every received envelope to a callback.

pub mod control;
pub mod error;
pub mod session;
pub mod udp;

pub use control::{RecorderCommand, RecordingRequest, COMMAND_START, COMMAND_STOP};
pub use error::{Result, SessionError};
pub use session::{EnvelopeHandler, Session};
pub use udp::{SessionConfig, UdpSession, DEFAULT_PORT};
