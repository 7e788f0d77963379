//! Bridge SocketCAN channels to a pub/sub session or an on-disk recording.
//!
//! canbridge captures frames from one or more raw CAN sockets, tags each with
//! its channel identity and receive time, and forwards it either to a live
//! session or to the active recording file, never both.
//!
//! # Crate Structure
//!
//! - [`transport`]: channel list parsing, raw CAN endpoints, readiness wait
//! - [`frame`]: frame records, envelopes and the length-framed envelope codec
//! - [`session`]: the session boundary and the UDP multicast session
//! - [`recorder`]: recording sink and remote recording control
//! - [`capture`]: the capture loop tying them together (Linux only)

/// Re-export transport types.
pub mod transport {
    pub use canbridge_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use canbridge_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use canbridge_session::*;
}

/// Re-export recorder types.
pub mod recorder {
    pub use canbridge_recorder::*;
}

#[cfg(target_os = "linux")]
pub mod capture;
