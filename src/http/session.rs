//! Session operations abstraction
//!
//! This module provides the session operations pattern that allows
//! transparent switching between plain TCP and TLS connections, and the
//! deadline-bounded send and receive loops the transport runs on top of it.
//!
//! Every blocking step polls the socket with the time left before the
//! deadline and also caps the socket's own read/write timeout to that
//! remainder, so a stalled peer surfaces as `ErrorKind::TimedOut` instead of
//! a hang.

use bytes::BytesMut;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::os::fd::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

/// Largest single write handed to the socket
const WRITE_CHUNK: usize = 16 * 1024;

/// Read buffer size
const READ_CHUNK: usize = 8 * 1024;

/// Session operations trait
///
/// This trait defines the operations that can be performed on a session,
/// abstracting over plain TCP and TLS connections.
pub trait SessionOps {
    /// The TCP stream carrying the session
    fn tcp_stream(&self) -> &TcpStream;

    /// Poll the session for events
    ///
    /// Returns true if the session is ready for the requested operation
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> io::Result<bool>;

    /// Read data from the session
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write data to the session
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    fn flush(&mut self) -> io::Result<()>;

    /// Close the session
    fn close(&mut self) -> io::Result<()>;
}

/// Poll events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEvents {
    Read,
    Write,
    Both,
}

/// poll(2) a single file descriptor
pub(crate) fn poll_fd(fd: RawFd, events: PollEvents, timeout: Option<Duration>) -> io::Result<bool> {
    use libc::{poll, pollfd, POLLIN, POLLOUT};

    let mut pfd = pollfd {
        fd,
        events: match events {
            PollEvents::Read => POLLIN,
            PollEvents::Write => POLLOUT,
            PollEvents::Both => POLLIN | POLLOUT,
        },
        revents: 0,
    };

    let timeout_ms = timeout
        .map(|d| d.as_millis().min(i32::MAX as u128) as i32)
        .unwrap_or(-1); // -1 = infinite

    loop {
        let result = unsafe { poll(&mut pfd as *mut pollfd, 1, timeout_ms) };

        if result < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }

        return Ok(result > 0);
    }
}

fn timed_out(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, format!("{} deadline exceeded", what))
}

/// Timeouts surface as `TimedOut` or, from socket timeouts, `WouldBlock`
pub fn is_timeout(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
}

/// HTTP session wrapping a transport with session operations
pub struct HttpSession<S: SessionOps> {
    session: S,
}

impl<S: SessionOps> HttpSession<S> {
    /// Create a new HTTP session
    pub fn new(session: S) -> Self {
        HttpSession { session }
    }

    /// Time left before `deadline`, or a timeout error
    fn remaining(deadline: Instant, what: &str) -> io::Result<Duration> {
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            Err(timed_out(what))
        } else {
            Ok(left)
        }
    }

    /// Write all of `buf` before `timeout` elapses
    pub fn write_all(&mut self, buf: &[u8], timeout: Duration) -> io::Result<()> {
        let deadline = Instant::now() + timeout;
        let mut written = 0;

        while written < buf.len() {
            let left = Self::remaining(deadline, "send")?;
            if !self.session.poll(PollEvents::Write, Some(left))? {
                return Err(timed_out("send"));
            }
            self.session.tcp_stream().set_write_timeout(Some(left))?;

            let end = (written + WRITE_CHUNK).min(buf.len());
            match self.session.write(&buf[written..end]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "connection closed while sending",
                    ))
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        self.session.flush()
    }

    /// Read until the peer closes the connection or `timeout` elapses
    pub fn read_to_end(&mut self, timeout: Duration) -> io::Result<BytesMut> {
        let deadline = Instant::now() + timeout;
        let mut buffer = BytesMut::with_capacity(READ_CHUNK);
        let mut temp = [0u8; READ_CHUNK];

        loop {
            let left = Self::remaining(deadline, "receive")?;
            if !self.session.poll(PollEvents::Read, Some(left))? {
                return Err(timed_out("receive"));
            }
            self.session.tcp_stream().set_read_timeout(Some(left))?;

            match self.session.read(&mut temp) {
                Ok(0) => return Ok(buffer),
                Ok(n) => buffer.extend_from_slice(&temp[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                // Reset after the peer sent everything still ends the stream
                Err(e) if e.kind() == io::ErrorKind::ConnectionReset && !buffer.is_empty() => {
                    return Ok(buffer)
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Close the session
    pub fn close(&mut self) -> io::Result<()> {
        self.session.close()
    }
}

/// Plain file descriptor session operations
pub struct FdSessionOps {
    stream: TcpStream,
}

impl FdSessionOps {
    /// Create a new FD session operations from a TCP stream
    pub fn new(stream: TcpStream) -> Self {
        FdSessionOps { stream }
    }
}

impl SessionOps for FdSessionOps {
    fn tcp_stream(&self) -> &TcpStream {
        &self.stream
    }

    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> io::Result<bool> {
        poll_fd(self.stream.as_raw_fd(), events, timeout)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }

    fn close(&mut self) -> io::Result<()> {
        // Shutdown the connection
        use std::net::Shutdown;
        match self.stream.shutdown(Shutdown::Both) {
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

/// Helper to create an HTTP session from a TCP stream
pub fn from_tcp_stream(stream: TcpStream) -> HttpSession<FdSessionOps> {
    HttpSession::new(FdSessionOps::new(stream))
}
