//! Raw HTTP/1.x engine
//!
//! This module provides the request builder, transport and response decoder
//! used to send deliberately malformed requests and inspect exact responses.
//!
//! # Architecture
//!
//! Every call flows one way through three components:
//!
//! - `Request` renders the exact request text from raw strings or item lists
//! - `Transport` opens one TCP (optionally TLS) session, sends the text and
//!   reads until the peer closes
//! - `decoder::decode` turns the raw response into an `ItemList`
//!
//! `HttpClient` wires them together and keeps the last request, response and
//! error for inspection.
//!
//! # Examples
//!
//! ```no_run
//! use rawhttp::http::{HttpClient, Method, Settings};
//!
//! let mut client = HttpClient::new(Settings::default());
//! client.set_domain("localhost");
//! client.set_method(Method::Post);
//! client.set_resource_path("/submit");
//! client.set_header("Host: localhost\r\nContent-Length: 999\r\n");
//! client.set_body("hello");
//!
//! // Content-Length is patched to 5 before sending
//! let response = client.send(true).unwrap();
//! assert_eq!(response.get("StatusCode").unwrap(), "200");
//! ```

pub mod chunked;
pub mod client;
pub mod decoder;
pub mod items;
pub mod request;
pub mod session;
pub mod settings;
pub mod tls;
pub mod transcript;
pub mod transport;

pub use client::HttpClient;
pub use decoder::{decode, decode_bytes, DecodeStep, MalformedResponse};
pub use items::ItemList;
pub use request::{Method, Request, Source};
pub use session::{HttpSession, SessionOps};
pub use settings::Settings;
pub use transcript::Transcript;
pub use transport::{Transport, TransportError};

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP operation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    MalformedResponse(#[from] MalformedResponse),

    #[error("TLS error: {0}")]
    Tls(#[from] tls::TlsError),

    #[error("Item not found: {0}")]
    ItemNotFound(String),
}

/// Default HTTP port
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Default HTTPS port
pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// CRLF line ending
pub const CRLF: &str = "\r\n";
