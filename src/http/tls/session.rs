//! TLS session operations
//!
//! This module implements the SessionOps trait for TLS connections,
//! enabling transparent switching between plain TCP and TLS I/O.

use super::cert::{chain_info, CertInfo};
use super::config::{TlsConfig, TlsError};
use crate::http::session::{PollEvents, SessionOps};
use openssl::ssl::{ErrorCode, HandshakeError, Ssl, SslStream, SslVerifyMode};
use std::io::{self, Write};
use std::net::{IpAddr, TcpStream};
use std::os::fd::AsRawFd;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

/// TLS session operations
///
/// Wraps an OpenSSL SslStream and provides poll/read/write/close operations.
pub struct TlsSessionOps {
    stream: SslStream<TcpStream>,
    failed: bool,
}

/// Outcome of the validator for one handshake
#[derive(Default)]
struct Verification {
    decision: OnceLock<bool>,
    errors: Mutex<Vec<String>>,
    subject: OnceLock<String>,
}

impl TlsSessionOps {
    /// Create a client TLS connection (perform handshake)
    ///
    /// The configured validator is consulted once, for the leaf certificate,
    /// and its answer is reused for every later verify callback of the same
    /// handshake.
    pub fn connect(tcp_stream: TcpStream, config: &TlsConfig, host: &str) -> Result<Self, TlsError> {
        let mut ssl = Ssl::new(&config.ctx)?;

        // SNI is only valid for host names
        if host.parse::<IpAddr>().is_err() {
            ssl.set_hostname(host)?;
        }

        let verification = Arc::new(Verification::default());
        let state = Arc::clone(&verification);
        let validator = Arc::clone(&config.validator);
        ssl.set_verify_callback(SslVerifyMode::PEER, move |preverify_ok, ctx| {
            if !preverify_ok {
                if let Ok(mut errors) = state.errors.lock() {
                    errors.push(format!("depth {}: {}", ctx.error_depth(), ctx.error()));
                }
            }
            if ctx.error_depth() > 0 {
                return true;
            }

            *state.decision.get_or_init(|| {
                let Some(cert) = ctx.current_cert() else {
                    return false;
                };
                let certificate = CertInfo::from_x509_ref(cert);
                let chain = ctx.chain().map(chain_info).unwrap_or_default();
                let errors = state
                    .errors
                    .lock()
                    .map(|e| e.join("; "))
                    .unwrap_or_default();
                let policy_errors = (!errors.is_empty()).then_some(errors.as_str());
                let _ = state.subject.set(certificate.subject.clone());
                validator.validate(&certificate, &chain, policy_errors)
            })
        });

        let ssl_stream = match ssl.connect(tcp_stream) {
            Ok(stream) => stream,
            Err(e) => {
                if verification.decision.get() == Some(&false) {
                    let subject = verification.subject.get().cloned().unwrap_or_default();
                    tracing::warn!(%subject, "server certificate rejected");
                    return Err(TlsError::CertificateRejected(subject));
                }
                return Err(TlsError::HandshakeFailed(handshake_failure(e)));
            }
        };

        tracing::debug!(
            version = ssl_stream.ssl().version_str(),
            cipher = ssl_stream.ssl().current_cipher().map(|c| c.name()).unwrap_or("<undef>"),
            "TLS handshake complete"
        );

        Ok(TlsSessionOps {
            stream: ssl_stream,
            failed: false,
        })
    }

    /// Negotiated protocol version (e.g. "TLSv1.3")
    pub fn version(&self) -> &'static str {
        self.stream.ssl().version_str()
    }
}

fn handshake_failure(e: HandshakeError<TcpStream>) -> String {
    match e {
        HandshakeError::SetupFailure(stack) => format!("setup failed: {}", stack),
        HandshakeError::Failure(mid) => format!("{}", mid.error()),
        HandshakeError::WouldBlock(mid) => format!("timed out: {}", mid.error()),
    }
}

impl SessionOps for TlsSessionOps {
    fn tcp_stream(&self) -> &TcpStream {
        self.stream.get_ref()
    }

    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> io::Result<bool> {
        // Decrypted bytes already buffered inside OpenSSL
        if events != PollEvents::Write && self.stream.ssl().pending() > 0 {
            return Ok(true);
        }
        crate::http::session::poll_fd(self.stream.get_ref().as_raw_fd(), events, timeout)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.stream.ssl_read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.code() == ErrorCode::ZERO_RETURN => Ok(0),
            Err(e) if e.code() == ErrorCode::SYSCALL && e.io_error().is_none() => Ok(0),
            // Peer closed without close_notify; treat as end of stream
            Err(e)
                if e.code() == ErrorCode::SSL
                    && e.ssl_error()
                        .map(|s| s.to_string().to_lowercase().contains("unexpected eof"))
                        .unwrap_or(false) =>
            {
                Ok(0)
            }
            Err(e) => {
                self.failed = true;
                Err(e
                    .into_io_error()
                    .unwrap_or_else(|e| io::Error::new(io::ErrorKind::Other, e.to_string())))
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.ssl_write(buf).map_err(|e| {
            self.failed = true;
            e.into_io_error()
                .unwrap_or_else(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
        })
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush().map_err(|e| {
            self.failed = true;
            e
        })
    }

    fn close(&mut self) -> io::Result<()> {
        // close_notify only on a healthy session
        if !self.failed {
            let _ = self.stream.shutdown();
        }

        use std::net::Shutdown;
        match self.stream.get_mut().shutdown(Shutdown::Both) {
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}
