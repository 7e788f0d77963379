use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::BytesMut;
use canbridge_frame::{decode_envelope, encode_envelope, Envelope, FrameRecord, TimeStamp};
use tracing::{debug, info, warn};

use crate::error::{Result, SessionError};
use crate::session::{EnvelopeHandler, Session};

/// Default UDP port of the multicast session.
pub const DEFAULT_PORT: u16 = 12175;

const MAX_DATAGRAM: usize = 64 * 1024;

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Session id; selects the multicast group `225.0.0.<cid>`.
    pub cid: u8,
    /// UDP port shared by all session members.
    pub port: u16,
    /// Explicit endpoint overriding the multicast group. A unicast address is
    /// bound locally and messages are sent to the bound address.
    pub endpoint: Option<SocketAddrV4>,
    /// Receive timeout; bounds how long `stop` waits for the inbound thread.
    pub read_timeout: Duration,
    /// Maximum envelope body accepted from the network.
    pub max_body_size: usize,
}

impl SessionConfig {
    pub fn new(cid: u8) -> Self {
        Self {
            cid,
            ..Self::default()
        }
    }

    /// Multicast group address for this session.
    pub fn group(&self) -> SocketAddrV4 {
        self.endpoint
            .unwrap_or_else(|| SocketAddrV4::new(Ipv4Addr::new(225, 0, 0, self.cid), self.port))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cid: 111,
            port: DEFAULT_PORT,
            endpoint: None,
            read_timeout: Duration::from_millis(250),
            max_body_size: canbridge_frame::DEFAULT_MAX_BODY,
        }
    }
}

/// UDP multicast pub/sub session.
///
/// Outbound frames are sent as `RAW_CAN_FRAME` envelopes. When a handler is
/// attached, a background thread decodes inbound datagrams and invokes the
/// handler once per envelope. Envelopes this session sent itself are not
/// delivered back to it, even though multicast loopback is on for other local
/// members.
pub struct UdpSession {
    socket: UdpSocket,
    sender: UdpSocket,
    origin: SocketAddrV4,
    target: SocketAddrV4,
    running: Arc<AtomicBool>,
    receiver: Mutex<Option<JoinHandle<()>>>,
}

impl UdpSession {
    /// Open a send-only session.
    pub fn open(config: &SessionConfig) -> Result<Self> {
        let (socket, target) = open_socket(config)?;
        let (sender, origin) = open_sender(target)?;
        info!(%target, %origin, "session open");
        Ok(Self {
            socket,
            sender,
            origin,
            target,
            running: Arc::new(AtomicBool::new(true)),
            receiver: Mutex::new(None),
        })
    }

    /// Open a session and deliver every inbound envelope to `handler`.
    pub fn open_with_handler<F>(config: &SessionConfig, handler: F) -> Result<Self>
    where
        F: Fn(Envelope) + Send + Sync + 'static,
    {
        let session = Self::open(config)?;
        let rx_socket = session.socket.try_clone()?;
        rx_socket.set_read_timeout(Some(config.read_timeout))?;

        let running = Arc::clone(&session.running);
        let handler: EnvelopeHandler = Arc::new(handler);
        let max_body = config.max_body_size;
        let origin = session.origin;
        let handle = std::thread::Builder::new()
            .name("canbridge-session-rx".to_string())
            .spawn(move || receive_loop(&rx_socket, origin, &running, &handler, max_body))
            .map_err(SessionError::Spawn)?;

        *session
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(session)
    }

    /// Publish an arbitrary envelope.
    pub fn send_envelope(&self, envelope: &Envelope) -> Result<()> {
        if !self.is_running() {
            return Err(SessionError::Stopped);
        }
        let mut buf = BytesMut::new();
        encode_envelope(envelope, &mut buf)?;
        self.sender.send_to(&buf, self.target)?;
        Ok(())
    }

    /// Mark the session as stopped and wait for the inbound thread.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            debug!("session stopping");
        }
        let handle = self
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("session receive thread panicked");
            }
        }
    }

    /// Shared liveness flag, e.g. for a signal handler.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Address messages are sent to.
    pub fn target(&self) -> SocketAddrV4 {
        self.target
    }

    /// Source address of this session's outbound datagrams.
    pub fn origin(&self) -> SocketAddrV4 {
        self.origin
    }
}

impl Session for UdpSession {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn send(&self, record: &FrameRecord, sample_time: TimeStamp, sender_stamp: u32) -> Result<()> {
        let envelope = Envelope::from_frame(record, sender_stamp).with_sample_time(sample_time);
        self.send_envelope(&envelope)
    }
}

impl Drop for UdpSession {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for UdpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpSession")
            .field("target", &self.target)
            .field("origin", &self.origin)
            .field("running", &self.running.load(Ordering::SeqCst))
            .finish()
    }
}

fn open_socket(config: &SessionConfig) -> Result<(UdpSocket, SocketAddrV4)> {
    let group = config.group();
    let open_err = |source: io::Error| SessionError::Open {
        addr: group,
        source,
    };

    if group.ip().is_multicast() {
        let socket = bind_reusable(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, group.port()))
            .map_err(open_err)?;
        socket
            .join_multicast_v4(group.ip(), &Ipv4Addr::UNSPECIFIED)
            .map_err(open_err)?;
        socket.set_multicast_loop_v4(true).map_err(open_err)?;
        Ok((socket, group))
    } else {
        let socket = UdpSocket::bind(group).map_err(open_err)?;
        let bound = match socket.local_addr().map_err(open_err)? {
            SocketAddr::V4(addr) => addr,
            SocketAddr::V6(_) => group,
        };
        Ok((socket, bound))
    }
}

/// Connected send socket on an ephemeral port, plus the source address the
/// kernel picked for it.
fn open_sender(target: SocketAddrV4) -> Result<(UdpSocket, SocketAddrV4)> {
    let open_err = |source: io::Error| SessionError::Open {
        addr: target,
        source,
    };
    let sender = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)).map_err(open_err)?;
    if target.ip().is_multicast() {
        sender.set_multicast_loop_v4(true).map_err(open_err)?;
    }
    // Connecting pins the source address; without a route the port alone
    // identifies our datagrams.
    if let Err(err) = sender.connect(target) {
        debug!(%target, error = %err, "send socket left unconnected");
    }
    let origin = match sender.local_addr().map_err(open_err)? {
        SocketAddr::V4(addr) => addr,
        SocketAddr::V6(_) => SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0),
    };
    Ok((sender, origin))
}

/// Whether a datagram from `from` was sent by the session whose send socket
/// has source address `origin`. An unspecified origin address matches on the
/// port alone.
fn is_own_datagram(from: SocketAddr, origin: SocketAddrV4) -> bool {
    match from {
        SocketAddr::V4(from) => {
            from.port() == origin.port()
                && (origin.ip().is_unspecified() || from.ip() == origin.ip())
        }
        SocketAddr::V6(_) => false,
    }
}

/// Bind with `SO_REUSEADDR` so several processes can join the same group.
#[cfg(target_os = "linux")]
fn bind_reusable(addr: SocketAddrV4) -> io::Result<UdpSocket> {
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

    // SAFETY: plain socket(2) call with constant arguments.
    let raw = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM | libc::SOCK_CLOEXEC, 0) };
    if raw < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: `raw` was just returned by socket(2) and has no other owner.
    let fd = unsafe { OwnedFd::from_raw_fd(raw) };

    let one: libc::c_int = 1;
    // SAFETY: `one` is a valid c_int for the duration of the call.
    let rc = unsafe {
        libc::setsockopt(
            fd.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            (&one as *const libc::c_int).cast::<libc::c_void>(),
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }

    // SAFETY: all-zero is a valid bit pattern for `sockaddr_in`.
    let mut sin: libc::sockaddr_in = unsafe { std::mem::zeroed() };
    sin.sin_family = libc::AF_INET as libc::sa_family_t;
    sin.sin_port = addr.port().to_be();
    sin.sin_addr = libc::in_addr {
        s_addr: u32::from(*addr.ip()).to_be(),
    };
    // SAFETY: `sin` is fully initialised and the length matches its size.
    let rc = unsafe {
        libc::bind(
            fd.as_raw_fd(),
            (&sin as *const libc::sockaddr_in).cast::<libc::sockaddr>(),
            std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(UdpSocket::from(fd))
}

#[cfg(not(target_os = "linux"))]
fn bind_reusable(addr: SocketAddrV4) -> io::Result<UdpSocket> {
    UdpSocket::bind(addr)
}

fn receive_loop(
    socket: &UdpSocket,
    origin: SocketAddrV4,
    running: &AtomicBool,
    handler: &EnvelopeHandler,
    max_body: usize,
) {
    let mut datagram = vec![0u8; MAX_DATAGRAM];
    while running.load(Ordering::SeqCst) {
        let len = match socket.recv_from(&mut datagram) {
            Ok((_, from)) if is_own_datagram(from, origin) => continue,
            Ok((len, _)) => len,
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                continue
            }
            Err(err) => {
                warn!(error = %err, "session receive failed");
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
        };

        let mut buf = BytesMut::from(&datagram[..len]);
        loop {
            match decode_envelope(&mut buf, max_body) {
                Ok(Some(envelope)) => handler(envelope),
                Ok(None) => break,
                Err(err) => {
                    debug!(error = %err, len, "dropping undecodable datagram");
                    break;
                }
            }
        }
    }
    debug!("session receive thread exiting");
}
