//! The local side of a relay session.

use std::io::{self, Read, Stdout};
use std::time::Duration;

/// Local input and output handed to a pump. Each is used by exactly one
/// loop.
///
/// `input` follows the pump's read convention: an error of kind
/// [`io::ErrorKind::WouldBlock`] means "nothing yet, poll again".
#[derive(Debug)]
pub struct LocalIo<I, O> {
    pub input: I,
    pub output: O,
}

impl<I, O> LocalIo<I, O> {
    pub fn new(input: I, output: O) -> Self {
        Self { input, output }
    }
}

impl LocalIo<PolledStdin, Stdout> {
    /// Process stdin/stdout, with stdin reads bounded by `poll_interval`.
    pub fn stdio(poll_interval: Duration) -> Self {
        Self::new(PolledStdin::new(poll_interval), io::stdout())
    }
}

/// Unbuffered stdin that waits at most `poll_interval` for readiness.
///
/// On unix this polls fd 0 and reads it directly, so no bytes sit in a
/// userspace buffer the poll cannot see. Elsewhere reads block until input
/// or EOF arrives.
#[derive(Debug)]
pub struct PolledStdin {
    poll_interval: Duration,
}

impl PolledStdin {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }
}

#[cfg(unix)]
impl Read for PolledStdin {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !sys::wait_readable(libc::STDIN_FILENO, self.poll_interval)? {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        sys::read(libc::STDIN_FILENO, buf)
    }
}

#[cfg(not(unix))]
impl Read for PolledStdin {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let _ = self.poll_interval;
        io::stdin().read(buf)
    }
}

#[cfg(unix)]
mod sys {
    use std::io;
    use std::os::fd::RawFd;
    use std::time::Duration;

    /// `Ok(false)` when `timeout` elapsed (or a signal arrived) first.
    /// Hang-up and error conditions count as readable so the following
    /// read reports them.
    pub(super) fn wait_readable(fd: RawFd, timeout: Duration) -> io::Result<bool> {
        let mut pfd = libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let millis = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
        // SAFETY: `pfd` is a valid pollfd for the duration of the call.
        let rc = unsafe { libc::poll(&mut pfd, 1, millis) };
        match rc {
            0 => Ok(false),
            n if n > 0 => Ok(true),
            _ => {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    Ok(false)
                } else {
                    Err(err)
                }
            }
        }
    }

    pub(super) fn read(fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
        // SAFETY: `buf` is valid for writes of `buf.len()` bytes.
        let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
        if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(n as usize)
        }
    }
}
