//! TLS configuration
//!
//! This module builds the client-side OpenSSL context: the offered protocol
//! versions, an optional client certificate, and the certificate validator
//! consulted during each handshake.

use super::validation::CertificateValidator;
use openssl::pkey::{PKey, Private};
use openssl::ssl::{SslContext, SslContextBuilder, SslMethod, SslOptions, SslVerifyMode, SslVersion};
use openssl::x509::X509;
use std::fmt;
use std::sync::Arc;

/// TLS version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TlsVersion {
    Tls10,
    Tls11,
    Tls12,
    Tls13,
}

impl TlsVersion {
    pub const ALL: [TlsVersion; 4] = [
        TlsVersion::Tls10,
        TlsVersion::Tls11,
        TlsVersion::Tls12,
        TlsVersion::Tls13,
    ];

    /// Parse TLS version from string (case-insensitive)
    pub fn from_str(s: &str) -> Result<Self, TlsError> {
        match s.trim().to_uppercase().as_str() {
            "TLSV1.0" | "TLS1.0" | "TLSV1" | "TLS1" | "TLS10" => Ok(TlsVersion::Tls10),
            "TLSV1.1" | "TLS1.1" | "TLS11" => Ok(TlsVersion::Tls11),
            "TLSV1.2" | "TLS1.2" | "TLS12" => Ok(TlsVersion::Tls12),
            "TLSV1.3" | "TLS1.3" | "TLS13" => Ok(TlsVersion::Tls13),
            _ => Err(TlsError::InvalidVersion(s.to_string())),
        }
    }

    /// Get OpenSSL protocol version constant
    pub fn to_openssl_version(&self) -> SslVersion {
        match self {
            TlsVersion::Tls10 => SslVersion::TLS1,
            TlsVersion::Tls11 => SslVersion::TLS1_1,
            TlsVersion::Tls12 => SslVersion::TLS1_2,
            TlsVersion::Tls13 => SslVersion::TLS1_3,
        }
    }

    /// Option that disables this version inside a min/max range
    fn disable_option(&self) -> SslOptions {
        match self {
            TlsVersion::Tls10 => SslOptions::NO_TLSV1,
            TlsVersion::Tls11 => SslOptions::NO_TLSV1_1,
            TlsVersion::Tls12 => SslOptions::NO_TLSV1_2,
            TlsVersion::Tls13 => SslOptions::NO_TLSV1_3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TlsVersion::Tls10 => "TLSv1.0",
            TlsVersion::Tls11 => "TLSv1.1",
            TlsVersion::Tls12 => "TLSv1.2",
            TlsVersion::Tls13 => "TLSv1.3",
        }
    }
}

impl fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of TLS versions offered by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsVersions {
    versions: Vec<TlsVersion>,
}

impl TlsVersions {
    /// TLS 1.0 through 1.3
    pub fn all() -> Self {
        TlsVersions {
            versions: TlsVersion::ALL.to_vec(),
        }
    }

    /// Build a set; fails when empty
    pub fn new(versions: impl IntoIterator<Item = TlsVersion>) -> Result<Self, TlsError> {
        let mut versions: Vec<TlsVersion> = versions.into_iter().collect();
        versions.sort();
        versions.dedup();
        if versions.is_empty() {
            return Err(TlsError::InvalidVersion("empty version set".to_string()));
        }
        Ok(TlsVersions { versions })
    }

    /// Parse a comma separated list such as `TLSv1.2,TLSv1.3`
    pub fn parse(list: &str) -> Result<Self, TlsError> {
        let versions = list
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(TlsVersion::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(versions)
    }

    pub fn contains(&self, version: TlsVersion) -> bool {
        self.versions.contains(&version)
    }

    pub fn min(&self) -> TlsVersion {
        self.versions[0]
    }

    pub fn max(&self) -> TlsVersion {
        self.versions[self.versions.len() - 1]
    }

    /// Versions inside the min/max range that must be switched off
    fn gaps(&self) -> impl Iterator<Item = TlsVersion> + '_ {
        TlsVersion::ALL
            .into_iter()
            .filter(move |v| *v > self.min() && *v < self.max() && !self.contains(*v))
    }
}

impl Default for TlsVersions {
    fn default() -> Self {
        Self::all()
    }
}

/// TLS errors
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),

    #[error("Invalid TLS version: {0}")]
    InvalidVersion(String),

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("Server certificate rejected by validation policy: {0}")]
    CertificateRejected(String),
}

/// Client certificate presented during the handshake
#[derive(Clone)]
pub struct ClientCertificate {
    cert: X509,
    key: PKey<Private>,
}

impl ClientCertificate {
    pub fn new(cert: X509, key: PKey<Private>) -> Self {
        ClientCertificate { cert, key }
    }

    /// Load certificate and private key from one PEM bundle
    pub fn from_pem(pem: &[u8]) -> Result<Self, TlsError> {
        Self::from_pem_parts(pem, pem)
    }

    /// Load certificate and private key from separate PEM blocks
    pub fn from_pem_parts(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self, TlsError> {
        let cert = X509::from_pem(cert_pem)
            .map_err(|e| TlsError::Certificate(format!("Failed to load certificate: {}", e)))?;
        let key = PKey::private_key_from_pem(key_pem)
            .map_err(|e| TlsError::Certificate(format!("Failed to load private key: {}", e)))?;
        Ok(ClientCertificate { cert, key })
    }

    pub fn certificate(&self) -> &X509 {
        &self.cert
    }
}

impl fmt::Debug for ClientCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCertificate")
            .field("subject", &super::CertInfo::from_x509_ref(&self.cert).subject)
            .finish_non_exhaustive()
    }
}

/// Client TLS configuration (immutable after building)
#[derive(Clone)]
pub struct TlsConfig {
    pub(crate) ctx: SslContext,
    pub(crate) versions: TlsVersions,
    pub(crate) validator: Arc<dyn CertificateValidator>,
}

impl TlsConfig {
    /// Create a new client configuration builder
    pub fn client(validator: Arc<dyn CertificateValidator>) -> Result<ClientConfigBuilder, TlsError> {
        ClientConfigBuilder::new(validator)
    }

    /// Perform the client handshake over an established TCP stream
    pub fn connect(
        &self,
        stream: std::net::TcpStream,
        host: &str,
    ) -> Result<super::TlsSessionOps, TlsError> {
        super::session::TlsSessionOps::connect(stream, self, host)
    }

    pub fn versions(&self) -> &TlsVersions {
        &self.versions
    }
}

/// Client configuration builder
pub struct ClientConfigBuilder {
    ctx_builder: SslContextBuilder,
    versions: TlsVersions,
    validator: Arc<dyn CertificateValidator>,
}

impl ClientConfigBuilder {
    fn new(validator: Arc<dyn CertificateValidator>) -> Result<Self, TlsError> {
        let mut ctx_builder = SslContextBuilder::new(SslMethod::tls_client())?;

        // The validator decides; OpenSSL only reports what it found
        ctx_builder.set_verify(SslVerifyMode::PEER);

        let mut builder = ClientConfigBuilder {
            ctx_builder,
            versions: TlsVersions::all(),
            validator,
        };
        builder.apply_versions()?;
        Ok(builder)
    }

    /// Restrict the offered protocol versions
    pub fn versions(mut self, versions: TlsVersions) -> Result<Self, TlsError> {
        self.versions = versions;
        self.apply_versions()?;
        Ok(self)
    }

    fn apply_versions(&mut self) -> Result<(), TlsError> {
        let min = self.versions.min();
        let max = self.versions.max();
        self.ctx_builder
            .set_min_proto_version(Some(min.to_openssl_version()))?;
        self.ctx_builder
            .set_max_proto_version(Some(max.to_openssl_version()))?;

        let gaps = self
            .versions
            .gaps()
            .fold(SslOptions::empty(), |acc, v| acc | v.disable_option());
        let all_gaps = TlsVersion::ALL
            .iter()
            .fold(SslOptions::empty(), |acc, v| acc | v.disable_option());
        self.ctx_builder.clear_options(all_gaps);
        self.ctx_builder.set_options(gaps);

        // Legacy versions are refused at the default security level
        if min < TlsVersion::Tls12 {
            self.ctx_builder.set_security_level(0);
        }
        Ok(())
    }

    /// Present a client certificate
    pub fn client_certificate(mut self, cert: &ClientCertificate) -> Result<Self, TlsError> {
        self.ctx_builder.set_certificate(&cert.cert)?;
        self.ctx_builder.set_private_key(&cert.key)?;
        self.ctx_builder.check_private_key()?;
        Ok(self)
    }

    /// Build the TLS configuration
    pub fn build(self) -> TlsConfig {
        TlsConfig {
            ctx: self.ctx_builder.build(),
            versions: self.versions,
            validator: self.validator,
        }
    }
}
