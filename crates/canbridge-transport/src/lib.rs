//! SocketCAN channel endpoints.
//!
//! This is the lowest layer of canbridge. It turns a `device:id` channel list
//! into bound raw CAN sockets and waits for readiness across all of them:
//! - [`parse_channel_list`] for the configuration string
//! - [`ChannelEndpoint`] for one bound socket plus its sender identity
//! - [`wait_readable`] for the timeout-bounded readiness wait
//!
//! Raw CAN sockets only exist on Linux; the parser is available everywhere.

pub mod channels;
pub mod error;

#[cfg(target_os = "linux")]
pub mod endpoint;
#[cfg(target_os = "linux")]
pub mod poll;

pub use channels::{parse_channel_list, ChannelSpec};
pub use error::{Result, TransportError};

#[cfg(target_os = "linux")]
pub use endpoint::{open_all, ChannelEndpoint, CAN_MTU};
#[cfg(target_os = "linux")]
pub use poll::wait_readable;
