//! One-shot TCP/TLS transport
//!
//! `Transport::send` opens a fresh connection, optionally upgrades it to
//! TLS, writes the request text, reads until the server closes the
//! connection and closes the session again on every path. Connections are
//! never reused and nothing is retried.

use super::session::{is_timeout, FdSessionOps, HttpSession, SessionOps};
use super::tls::{CertificateValidator, ClientCertificate, TlsConfig, TlsError, TlsVersions};
use super::Transcript;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Transport failures
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Cannot resolve {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        source: io::Error,
    },

    #[error("Cannot connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        source: io::Error,
    },

    #[error("TLS failure with {host}:{port}: {source}")]
    Tls {
        host: String,
        port: u16,
        source: TlsError,
    },

    #[error("{}", describe("sending request", "send", .timed_out, .elapsed, .timeout, .source))]
    Send {
        timed_out: bool,
        elapsed: Duration,
        timeout: Duration,
        source: io::Error,
    },

    #[error("{}", describe("receiving response", "receive", .timed_out, .elapsed, .timeout, .source))]
    Receive {
        timed_out: bool,
        elapsed: Duration,
        timeout: Duration,
        source: io::Error,
    },
}

impl TransportError {
    /// Whether the failure was a send or receive timeout
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            TransportError::Send { timed_out: true, .. } | TransportError::Receive { timed_out: true, .. }
        )
    }
}

fn describe(
    action: &str,
    limit: &str,
    timed_out: &bool,
    elapsed: &Duration,
    timeout: &Duration,
    source: &io::Error,
) -> String {
    if *timed_out {
        format!(
            "Timeout {}: elapsed {}, {} timeout {}",
            action,
            format_duration(elapsed),
            limit,
            format_duration(timeout)
        )
    } else {
        format!(
            "I/O error {}: {} (elapsed {})",
            action,
            source,
            format_duration(elapsed)
        )
    }
}

/// Render a duration as minutes and seconds, e.g. `1m5.250s`
pub fn format_duration(d: &Duration) -> String {
    let total_ms = d.as_millis();
    let minutes = total_ms / 60_000;
    let seconds = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{}m{}.{:03}s", minutes, seconds, millis)
}

/// Transport for single request/response exchanges
pub struct Transport {
    tls: Option<TlsConfig>,
    send_timeout: Duration,
    receive_timeout: Duration,
    transcript: Transcript,
}

impl Transport {
    /// Plain TCP transport
    pub fn plain(send_timeout: Duration, receive_timeout: Duration, transcript: Transcript) -> Self {
        Transport {
            tls: None,
            send_timeout,
            receive_timeout,
            transcript,
        }
    }

    /// TLS transport offering `versions`, presenting `client_certificate` if
    /// given and asking `validator` about the server certificate
    pub fn tls(
        versions: TlsVersions,
        client_certificate: Option<&ClientCertificate>,
        validator: Arc<dyn CertificateValidator>,
        send_timeout: Duration,
        receive_timeout: Duration,
        transcript: Transcript,
    ) -> Result<Self, TlsError> {
        let mut builder = TlsConfig::client(validator)?.versions(versions)?;
        if let Some(cert) = client_certificate {
            builder = builder.client_certificate(cert)?;
        }

        Ok(Transport {
            tls: Some(builder.build()),
            send_timeout,
            receive_timeout,
            transcript,
        })
    }

    /// Send `request_text` to `host:port` and return everything the server
    /// sent before closing the connection
    pub fn send(&self, host: &str, port: u16, request_text: &str) -> Result<Vec<u8>, TransportError> {
        warn_on_keep_alive(request_text, &self.transcript);
        self.transcript.record(
            &format!("Request to {}:{}", host, port),
            request_text,
        );

        let stream = self.connect(host, port)?;
        // Bounds the TLS handshake; the exchange narrows these per step
        let _ = stream.set_write_timeout(Some(self.send_timeout));
        let _ = stream.set_read_timeout(Some(self.receive_timeout));

        match &self.tls {
            Some(config) => {
                let ops = config
                    .connect(stream, host)
                    .map_err(|source| {
                        tracing::warn!(host, port, error = %source, "TLS handshake failed");
                        TransportError::Tls {
                            host: host.to_string(),
                            port,
                            source,
                        }
                    })?;
                tracing::debug!(host, port, version = ops.version(), "TLS session established");
                self.exchange(HttpSession::new(ops), request_text)
            }
            None => self.exchange(HttpSession::new(FdSessionOps::new(stream)), request_text),
        }
    }

    fn connect(&self, host: &str, port: u16) -> Result<TcpStream, TransportError> {
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|source| TransportError::Resolve {
                host: host.to_string(),
                port,
                source,
            })?
            .collect();

        let mut last_error =
            io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses");
        for addr in addrs {
            tracing::debug!(%addr, "connecting");
            match connect_addr(addr, self.send_timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    tracing::debug!(%addr, error = %e, "connect failed");
                    last_error = e;
                }
            }
        }

        Err(TransportError::Connect {
            host: host.to_string(),
            port,
            source: last_error,
        })
    }

    /// Send and receive over an established session, closing it afterwards
    fn exchange<S: SessionOps>(
        &self,
        mut session: HttpSession<S>,
        request_text: &str,
    ) -> Result<Vec<u8>, TransportError> {
        let result = self.exchange_inner(&mut session, request_text);
        if let Err(e) = session.close() {
            tracing::debug!(error = %e, "session close failed");
        }
        result
    }

    fn exchange_inner<S: SessionOps>(
        &self,
        session: &mut HttpSession<S>,
        request_text: &str,
    ) -> Result<Vec<u8>, TransportError> {
        let started = Instant::now();
        session
            .write_all(request_text.as_bytes(), self.send_timeout)
            .map_err(|source| {
                let error = TransportError::Send {
                    timed_out: is_timeout(&source),
                    elapsed: started.elapsed(),
                    timeout: self.send_timeout,
                    source,
                };
                self.transcript.record("Send failed", &error.to_string());
                error
            })?;
        let sent = started.elapsed();
        tracing::debug!(bytes = request_text.len(), elapsed = ?sent, "request sent");

        let started = Instant::now();
        let response = session
            .read_to_end(self.receive_timeout)
            .map_err(|source| {
                let error = TransportError::Receive {
                    timed_out: is_timeout(&source),
                    elapsed: started.elapsed(),
                    timeout: self.receive_timeout,
                    source,
                };
                self.transcript.record("Receive failed", &error.to_string());
                error
            })?;
        let received = started.elapsed();
        tracing::debug!(bytes = response.len(), elapsed = ?received, "response received");

        self.transcript.record(
            "Timing",
            &format!(
                "Sent {} bytes in {}, received {} bytes in {}",
                request_text.len(),
                format_duration(&sent),
                response.len(),
                format_duration(&received)
            ),
        );

        Ok(response.to_vec())
    }
}

fn connect_addr(addr: SocketAddr, timeout: Duration) -> io::Result<TcpStream> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.connect_timeout(&SockAddr::from(addr), timeout)?;
    socket.set_nodelay(true)?;
    Ok(socket.into())
}

/// Responses are framed by connection close only
fn warn_on_keep_alive(request_text: &str, transcript: &Transcript) {
    if requests_keep_alive(request_text) {
        tracing::warn!(
            "request asks for Connection: keep-alive; responses are read until the server \
             closes the connection, so this exchange will end in a receive timeout unless \
             the server closes anyway"
        );
        transcript.record(
            "Warning",
            "Connection: keep-alive requested; only connection-close framing is supported",
        );
    }
}

/// A `Connection` header line listing the `keep-alive` token
fn requests_keep_alive(request_text: &str) -> bool {
    request_text.lines().any(|line| {
        let Some((name, value)) = line.split_once(':') else {
            return false;
        };
        name.trim().eq_ignore_ascii_case("connection")
            && value
                .split(',')
                .any(|token| token.trim().eq_ignore_ascii_case("keep-alive"))
    })
}
