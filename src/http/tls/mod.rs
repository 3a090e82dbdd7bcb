//! TLS support for raw HTTP exchanges
//!
//! This module wraps a TCP connection in an OpenSSL client session. Which
//! server certificates are accepted is a test decision made by a
//! `CertificateValidator`, not a trust evaluation.
//!
//! # Architecture
//!
//! 1. `TlsConfig` holds the offered versions, optional client certificate
//!    and the validator
//! 2. `TlsSessionOps` implements the `SessionOps` trait for encrypted I/O
//! 3. The transport code stays unchanged - it transparently uses TLS operations
//!
//! # Examples
//!
//! ```no_run
//! use rawhttp::http::tls::{MockValidator, TlsConfig, TlsVersion, TlsVersions};
//! use rawhttp::http::Transcript;
//! use std::net::TcpStream;
//! use std::sync::Arc;
//!
//! let validator = Arc::new(MockValidator::new(true, Transcript::disabled()));
//! let tls_config = TlsConfig::client(validator)
//!     .unwrap()
//!     .versions(TlsVersions::new([TlsVersion::Tls12, TlsVersion::Tls13]).unwrap())
//!     .unwrap()
//!     .build();
//!
//! let tcp_stream = TcpStream::connect("example.com:443").unwrap();
//! let tls_session = tls_config.connect(tcp_stream, "example.com").unwrap();
//! ```

pub mod cert;
pub mod config;
pub mod session;
pub mod validation;

pub use cert::CertInfo;
pub use config::{ClientCertificate, ClientConfigBuilder, TlsConfig, TlsError, TlsVersion, TlsVersions};
pub use session::TlsSessionOps;
pub use validation::{CertificateValidator, MockValidator};
