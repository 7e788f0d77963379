use std::ffi::CString;
use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;

use tracing::{debug, info};

use crate::channels::ChannelSpec;
use crate::error::{Result, TransportError};

/// Size of a classic `struct can_frame`: id (4) + dlc (1) + pad (3) + data (8).
pub const CAN_MTU: usize = 16;

// Not exported by every libc target; value from <asm-generic/sockios.h>.
const SIOCGSTAMP: libc::c_ulong = 0x8906;

/// One bound bus channel plus the identity its frames are tagged with.
///
/// The socket is owned exclusively by the endpoint and closed exactly once,
/// when the endpoint is dropped.
pub struct ChannelEndpoint {
    name: String,
    sender_id: u32,
    fd: OwnedFd,
}

impl ChannelEndpoint {
    /// Open a raw CAN socket and bind it to the interface named in `spec`.
    pub fn open(spec: &ChannelSpec) -> Result<Self> {
        let device = spec.name.clone();

        // SAFETY: plain socket(2) call with constant arguments.
        let raw = unsafe { libc::socket(libc::PF_CAN, libc::SOCK_RAW, libc::CAN_RAW) };
        if raw < 0 {
            return Err(TransportError::Socket {
                device,
                source: io::Error::last_os_error(),
            });
        }
        // SAFETY: `raw` was just returned by socket(2) and has no other owner.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        let c_name = CString::new(device.as_str()).map_err(|_| TransportError::Resolve {
            device: device.clone(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "device name contains NUL"),
        })?;
        // SAFETY: `c_name` is a valid NUL-terminated string for the duration of the call.
        let ifindex = unsafe { libc::if_nametoindex(c_name.as_ptr()) };
        if ifindex == 0 {
            return Err(TransportError::Resolve {
                device,
                source: io::Error::last_os_error(),
            });
        }

        // SAFETY: all-zero is a valid bit pattern for `sockaddr_can`.
        let mut addr: libc::sockaddr_can = unsafe { std::mem::zeroed() };
        addr.can_family = libc::AF_CAN as libc::sa_family_t;
        addr.can_ifindex = ifindex as libc::c_int;

        // SAFETY: `addr` is a fully initialised `sockaddr_can` and the length
        // passed matches its size; `fd` is an open socket owned by us.
        let rc = unsafe {
            libc::bind(
                fd.as_raw_fd(),
                (&addr as *const libc::sockaddr_can).cast::<libc::sockaddr>(),
                std::mem::size_of::<libc::sockaddr_can>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(TransportError::Bind {
                device,
                source: io::Error::last_os_error(),
            });
        }

        info!(device = %spec.name, sender_id = spec.sender_id, ifindex, "opened can channel");
        Ok(Self::from_fd(spec.name.clone(), spec.sender_id, fd))
    }

    /// Wrap an already-bound datagram descriptor.
    ///
    /// Each `read` on `fd` must yield one whole frame, as raw CAN sockets do.
    pub fn from_fd(name: impl Into<String>, sender_id: u32, fd: OwnedFd) -> Self {
        Self {
            name: name.into(),
            sender_id,
            fd,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sender_id(&self) -> u32 {
        self.sender_id
    }

    /// Read exactly one frame.
    ///
    /// Returns `Ok(None)` for short reads and for reads that would block or
    /// were interrupted.
    pub fn read_frame(&self) -> Result<Option<[u8; CAN_MTU]>> {
        let mut buf = [0u8; CAN_MTU];
        // SAFETY: `buf` is writable for `CAN_MTU` bytes and `fd` is open.
        let n = unsafe {
            libc::read(
                self.fd.as_raw_fd(),
                buf.as_mut_ptr().cast::<libc::c_void>(),
                CAN_MTU,
            )
        };
        if n < 0 {
            let err = io::Error::last_os_error();
            return match err.kind() {
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock => Ok(None),
                _ => Err(TransportError::Io(err)),
            };
        }
        if n as usize != CAN_MTU {
            return Ok(None);
        }
        Ok(Some(buf))
    }

    /// Kernel receive time of the last frame read, as time since the Unix epoch.
    pub fn receive_timestamp(&self) -> Result<Duration> {
        let mut tv = libc::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        // SAFETY: SIOCGSTAMP writes one `timeval` through the provided pointer.
        let rc = unsafe {
            libc::ioctl(
                self.fd.as_raw_fd(),
                SIOCGSTAMP as _,
                &mut tv as *mut libc::timeval,
            )
        };
        if rc != 0 {
            return Err(TransportError::Timestamp(io::Error::last_os_error()));
        }
        if tv.tv_sec < 0 || tv.tv_usec < 0 {
            return Err(TransportError::Timestamp(io::Error::new(
                io::ErrorKind::InvalidData,
                "negative receive timestamp",
            )));
        }
        Ok(Duration::new(tv.tv_sec as u64, (tv.tv_usec as u32) * 1_000))
    }
}

impl AsFd for ChannelEndpoint {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl AsRawFd for ChannelEndpoint {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl Drop for ChannelEndpoint {
    fn drop(&mut self) {
        debug!(device = %self.name, "closing channel");
    }
}

impl std::fmt::Debug for ChannelEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelEndpoint")
            .field("name", &self.name)
            .field("sender_id", &self.sender_id)
            .field("fd", &self.fd.as_raw_fd())
            .finish()
    }
}

/// Open every channel in order, stopping at the first failure.
///
/// Endpoints opened before a failure are dropped, which closes them.
pub fn open_all(specs: &[ChannelSpec]) -> Result<Vec<ChannelEndpoint>> {
    specs.iter().map(ChannelEndpoint::open).collect()
}
