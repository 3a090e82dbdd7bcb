//! Client settings
//!
//! All tunables the builder and transport consult live in one `Settings`
//! value that is built once and handed to the client. Defaults match a
//! conventional HTTP/1.1 client; every field can be overridden from the
//! environment (`RAWHTTP_<KEY>`) or from any key lookup function.

use super::request::Source;
use super::tls::TlsVersions;
use super::{Error, Result, CRLF, DEFAULT_HTTPS_PORT, DEFAULT_HTTP_PORT};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "RAWHTTP_";

/// Default send and receive timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

#[derive(Debug, Clone)]
pub struct Settings {
    /// Bound on writing the full request
    pub send_timeout: Duration,
    /// Bound on reading the response until the peer closes
    pub receive_timeout: Duration,
    /// TLS protocol versions offered during the handshake
    pub tls_versions: TlsVersions,
    pub tls_port: u16,
    pub http_port: u16,
    /// Answer given by the built-in certificate validator
    pub accept_certificates: bool,
    /// Separator between header name and value (`:`)
    pub header_item_delimiter: String,
    /// Emit a space after the header delimiter
    pub space_after_delimiter: bool,
    pub header_line_terminator: String,
    pub content_length_title: String,
    /// Separator between header block and body
    pub header_body_delimiter: String,
    /// Separator between resource path and query (`?`)
    pub query_separator: String,
    /// Separator between query parameters (`&`)
    pub query_param_separator: String,
    /// Separator between query name and value (`=`)
    pub query_name_value_separator: String,
    pub post_token: String,
    pub get_token: String,
    pub http_version_token: String,
    /// Transcript file; `None` disables transcript logging
    pub transcript_path: Option<PathBuf>,
    /// Header used when a request sets none
    pub default_header: Option<Source>,
    /// Query used when a request sets none
    pub default_query: Option<Source>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            send_timeout: DEFAULT_TIMEOUT,
            receive_timeout: DEFAULT_TIMEOUT,
            tls_versions: TlsVersions::all(),
            tls_port: DEFAULT_HTTPS_PORT,
            http_port: DEFAULT_HTTP_PORT,
            accept_certificates: true,
            header_item_delimiter: ":".to_string(),
            space_after_delimiter: true,
            header_line_terminator: CRLF.to_string(),
            content_length_title: "Content-Length".to_string(),
            header_body_delimiter: CRLF.to_string(),
            query_separator: "?".to_string(),
            query_param_separator: "&".to_string(),
            query_name_value_separator: "=".to_string(),
            post_token: "POST".to_string(),
            get_token: "GET".to_string(),
            http_version_token: "HTTP/1.1".to_string(),
            transcript_path: None,
            default_header: None,
            default_query: None,
        }
    }
}

impl Settings {
    /// Defaults overridden by `RAWHTTP_<KEY>` environment variables
    pub fn from_env() -> Result<Self> {
        Self::with_overrides(Self::default(), |key| {
            env::var(format!("{}{}", ENV_PREFIX, key)).ok()
        })
    }

    /// Apply overrides from a key lookup on top of `base`
    ///
    /// Keys are the upper-case field names (`SEND_TIMEOUT_MS`, `TLS_PORT`, ...).
    /// String values accept `\r`, `\n` and `\t` escapes so line terminators
    /// can be configured from plain text.
    pub fn with_overrides<F>(base: Self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = base;

        if let Some(v) = lookup("SEND_TIMEOUT_MS") {
            settings.send_timeout = Duration::from_millis(parse_value("SEND_TIMEOUT_MS", &v)?);
        }
        if let Some(v) = lookup("RECEIVE_TIMEOUT_MS") {
            settings.receive_timeout =
                Duration::from_millis(parse_value("RECEIVE_TIMEOUT_MS", &v)?);
        }
        if let Some(v) = lookup("TLS_VERSIONS") {
            settings.tls_versions = TlsVersions::parse(&v)
                .map_err(|e| Error::Configuration(format!("TLS_VERSIONS: {}", e)))?;
        }
        if let Some(v) = lookup("TLS_PORT") {
            settings.tls_port = parse_value("TLS_PORT", &v)?;
        }
        if let Some(v) = lookup("HTTP_PORT") {
            settings.http_port = parse_value("HTTP_PORT", &v)?;
        }
        if let Some(v) = lookup("ACCEPT_CERTIFICATES") {
            settings.accept_certificates = parse_bool("ACCEPT_CERTIFICATES", &v)?;
        }
        if let Some(v) = lookup("SPACE_AFTER_DELIMITER") {
            settings.space_after_delimiter = parse_bool("SPACE_AFTER_DELIMITER", &v)?;
        }

        let strings: [(&str, &mut String); 10] = [
            ("HEADER_ITEM_DELIMITER", &mut settings.header_item_delimiter),
            ("HEADER_LINE_TERMINATOR", &mut settings.header_line_terminator),
            ("CONTENT_LENGTH_TITLE", &mut settings.content_length_title),
            ("HEADER_BODY_DELIMITER", &mut settings.header_body_delimiter),
            ("QUERY_SEPARATOR", &mut settings.query_separator),
            ("QUERY_PARAM_SEPARATOR", &mut settings.query_param_separator),
            ("QUERY_NAME_VALUE_SEPARATOR", &mut settings.query_name_value_separator),
            ("POST_TOKEN", &mut settings.post_token),
            ("GET_TOKEN", &mut settings.get_token),
            ("HTTP_VERSION_TOKEN", &mut settings.http_version_token),
        ];
        for (key, slot) in strings {
            if let Some(v) = lookup(key) {
                *slot = unescape(&v);
            }
        }

        if let Some(v) = lookup("TRANSCRIPT_PATH") {
            settings.transcript_path = if v.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(v))
            };
        }
        if let Some(v) = lookup("DEFAULT_HEADER") {
            settings.default_header = Some(Source::Raw(unescape(&v)));
        }
        if let Some(v) = lookup("DEFAULT_QUERY") {
            settings.default_query = Some(Source::Raw(unescape(&v)));
        }

        Ok(settings)
    }

    /// Header delimiter followed by the optional space
    pub fn header_delimiter_with_space(&self) -> String {
        if self.space_after_delimiter {
            format!("{} ", self.header_item_delimiter)
        } else {
            self.header_item_delimiter.clone()
        }
    }

    /// Port used for the given scheme
    pub fn port_for(&self, use_tls: bool) -> u16 {
        if use_tls {
            self.tls_port
        } else {
            self.http_port
        }
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| Error::Configuration(format!("{}: invalid value '{}'", key, value)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(Error::Configuration(format!(
            "{}: invalid boolean '{}'",
            key, value
        ))),
    }
}

/// Expand `\r`, `\n`, `\t` and `\\` escapes
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::tls::TlsVersion;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.send_timeout, Duration::from_secs(10));
        assert_eq!(settings.receive_timeout, Duration::from_secs(10));
        assert_eq!(settings.tls_port, 443);
        assert_eq!(settings.http_port, 80);
        assert!(settings.accept_certificates);
        assert_eq!(settings.header_delimiter_with_space(), ": ");
        assert_eq!(settings.header_line_terminator, "\r\n");
        assert_eq!(settings.content_length_title, "Content-Length");
        assert_eq!(settings.query_separator, "?");
        assert_eq!(settings.http_version_token, "HTTP/1.1");
        assert!(settings.transcript_path.is_none());
        assert!(settings.tls_versions.contains(TlsVersion::Tls10));
        assert!(settings.tls_versions.contains(TlsVersion::Tls13));
    }

    #[test]
    fn test_overrides_applied() {
        let settings = Settings::with_overrides(
            Settings::default(),
            lookup_from(&[
                ("SEND_TIMEOUT_MS", "250"),
                ("HTTP_PORT", "8080"),
                ("ACCEPT_CERTIFICATES", "no"),
                ("SPACE_AFTER_DELIMITER", "false"),
                ("HEADER_LINE_TERMINATOR", "\\n"),
                ("TLS_VERSIONS", "TLSv1.2,TLSv1.3"),
                ("DEFAULT_HEADER", "Host: example\\r\\n"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.send_timeout, Duration::from_millis(250));
        assert_eq!(settings.receive_timeout, DEFAULT_TIMEOUT, "untouched");
        assert_eq!(settings.http_port, 8080);
        assert!(!settings.accept_certificates);
        assert_eq!(settings.header_delimiter_with_space(), ":");
        assert_eq!(settings.header_line_terminator, "\n");
        assert!(!settings.tls_versions.contains(TlsVersion::Tls11));
        assert_eq!(
            settings.default_header,
            Some(Source::Raw("Host: example\r\n".to_string()))
        );
    }

    #[test]
    fn test_invalid_override_is_configuration_error() {
        let result = Settings::with_overrides(
            Settings::default(),
            lookup_from(&[("TLS_PORT", "not-a-port")]),
        );
        assert!(matches!(result, Err(Error::Configuration(msg)) if msg.contains("TLS_PORT")));

        let result = Settings::with_overrides(
            Settings::default(),
            lookup_from(&[("ACCEPT_CERTIFICATES", "maybe")]),
        );
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("a\\r\\nb"), "a\r\nb");
        assert_eq!(unescape("tab\\there"), "tab\there");
        assert_eq!(unescape("keep\\x"), "keep\\x");
        assert_eq!(unescape("trailing\\"), "trailing\\");
    }

    #[test]
    fn test_port_for() {
        let settings = Settings::default();
        assert_eq!(settings.port_for(true), 443);
        assert_eq!(settings.port_for(false), 80);
    }
}
