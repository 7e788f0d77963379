use std::io;
use std::os::fd::{AsFd, AsRawFd};
use std::time::Duration;

use crate::error::{Result, TransportError};

const READY_EVENTS: libc::c_short = libc::POLLIN | libc::POLLERR | libc::POLLHUP | libc::POLLNVAL;

/// Block until at least one endpoint is readable or `timeout` elapses.
///
/// Returns the indices of the readable endpoints, in input order. Endpoints
/// reporting an error, hangup or invalid descriptor count as readable so the
/// following read surfaces the failure. A timeout or an interrupted wait
/// yields an empty set.
pub fn wait_readable<E: AsFd>(endpoints: &[E], timeout: Duration) -> Result<Vec<usize>> {
    if endpoints.is_empty() {
        return Ok(Vec::new());
    }

    let mut fds: Vec<libc::pollfd> = endpoints
        .iter()
        .map(|endpoint| libc::pollfd {
            fd: endpoint.as_fd().as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        })
        .collect();

    let timeout_ms = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

    // SAFETY: `fds` is a valid array of `fds.len()` pollfd entries whose
    // descriptors stay open for the duration of the call.
    let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(Vec::new());
        }
        return Err(TransportError::Poll(err));
    }

    Ok(fds
        .iter()
        .enumerate()
        .filter(|(_, fd)| fd.revents & READY_EVENTS != 0)
        .map(|(index, _)| index)
        .collect())
}
