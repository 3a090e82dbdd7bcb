//! Response decoding
//!
//! Turns the raw text of a response into an `ItemList`:
//!
//! ```text
//! HTTPVersion, StatusCode, StatusText, <header>..., Body
//! ```
//!
//! Responses that are not HTTP at all (empty, foreign protocol, broken status
//! line) decode into sentinel `Unknown - ...` values instead of errors, so
//! negative tests can assert on them directly. Inconsistencies inside an
//! otherwise recognised response raise `MalformedResponse`.

use super::chunked::{self, ChunkedError};
use super::ItemList;
use std::fmt;

pub const HTTP_VERSION: &str = "HTTPVersion";
pub const STATUS_CODE: &str = "StatusCode";
pub const STATUS_TEXT: &str = "StatusText";
pub const BODY: &str = "Body";

pub const EMPTY_RESPONSE: &str = "Unknown - Empty Response";
pub const NOT_HTTP: &str = "Unknown - Response not HTTP";
pub const BAD_TOP_LINE: &str = "Unknown - Response header top line not in correct format";

const HEADER_BODY_SEPARATOR: &str = "\r\n\r\n";
const LINE_SEPARATOR: &str = "\r\n";

/// Lines longer than this are cut in diagnostics
const FIRST_LINE_LIMIT: usize = 20;
/// Characters kept when a line is cut
const FIRST_LINE_KEEP: usize = 17;

/// Decoder step that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStep {
    HeaderLine,
    ChunkedBody,
}

impl fmt::Display for DecodeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DecodeStep::HeaderLine => "header line",
            DecodeStep::ChunkedBody => "chunked body",
        };
        f.write_str(name)
    }
}

/// A response that was recognised as HTTP but could not be decoded
#[derive(Debug, thiserror::Error)]
#[error("Malformed response ({step}): {description}")]
pub struct MalformedResponse {
    pub step: DecodeStep,
    pub description: String,
    /// 1-based line of a `HeaderLine` failure
    pub line: Option<usize>,
    #[source]
    pub source: Option<ChunkedError>,
}

impl MalformedResponse {
    fn header_line(line_number: usize, line: &str) -> Self {
        MalformedResponse {
            step: DecodeStep::HeaderLine,
            description: format!(
                "header line {} has no ':' delimiter: [{}]",
                line_number, line
            ),
            line: Some(line_number),
            source: None,
        }
    }

    fn chunked(cause: ChunkedError) -> Self {
        MalformedResponse {
            step: DecodeStep::ChunkedBody,
            description: format!("chunked body could not be reassembled: {}", cause),
            line: None,
            source: Some(cause),
        }
    }

    /// 1-based header line number for `HeaderLine` failures
    pub fn line_number(&self) -> Option<usize> {
        self.line
    }
}

/// Decode a raw response
pub fn decode(raw: &str) -> Result<ItemList, MalformedResponse> {
    decode_bytes(raw.as_bytes())
}

/// Decode a response exactly as read from the wire
///
/// Chunk sizes count wire bytes, so the body is reassembled before any
/// UTF-8 conversion; invalid sequences become U+FFFD only afterwards.
pub fn decode_bytes(raw: &[u8]) -> Result<ItemList, MalformedResponse> {
    if String::from_utf8_lossy(raw).trim().is_empty() {
        tracing::debug!("empty response");
        return Ok(sentinel(EMPTY_RESPONSE.to_string(), EMPTY_RESPONSE));
    }

    let (header_bytes, body_bytes) = match find_separator(raw) {
        Some(pos) => (&raw[..pos], &raw[pos + HEADER_BODY_SEPARATOR.len()..]),
        None => (raw, &raw[raw.len()..]),
    };
    let header_area = String::from_utf8_lossy(header_bytes);

    if !raw.starts_with(b"HTTP") {
        let first_line = header_area.split(LINE_SEPARATOR).next().unwrap_or("");
        tracing::debug!(first_line = %truncate_line(first_line), "response is not HTTP");
        return Ok(sentinel(
            format!("{}: FirstLine=[{}]", NOT_HTTP, truncate_line(first_line)),
            NOT_HTTP,
        ));
    }

    let mut lines = header_area.split(LINE_SEPARATOR);
    let top_line = lines.next().unwrap_or("");

    let (version, code, text) = match split_top_line(top_line) {
        Some(parts) => parts,
        None => {
            tracing::debug!(top_line = %truncate_line(top_line), "status line not in correct format");
            return Ok(sentinel(
                format!("{}: FirstLine=[{}]", BAD_TOP_LINE, truncate_line(top_line)),
                BAD_TOP_LINE,
            ));
        }
    };

    let mut response = ItemList::new();
    response.push(HTTP_VERSION, version);
    response.push(STATUS_CODE, code);
    response.push(STATUS_TEXT, text);

    for (index, line) in lines.enumerate() {
        // Top line is line 1
        let line_number = index + 2;
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| MalformedResponse::header_line(line_number, line))?;
        response.push(key, value);
    }

    let body = if is_chunked(&response) {
        tracing::debug!(len = body_bytes.len(), "reassembling chunked body");
        chunked::decode_chunked_bytes(body_bytes).map_err(MalformedResponse::chunked)?
    } else {
        String::from_utf8_lossy(body_bytes).into_owned()
    };
    response.push(BODY, body);

    Ok(response)
}

fn find_separator(raw: &[u8]) -> Option<usize> {
    raw.windows(HEADER_BODY_SEPARATOR.len())
        .position(|w| w == HEADER_BODY_SEPARATOR.as_bytes())
}

/// Split `HTTP/x.y CODE TEXT` into version, code and trimmed text
fn split_top_line(line: &str) -> Option<(&str, &str, &str)> {
    let parts: Vec<&str> = line.splitn(3, ' ').collect();
    if parts.len() != 3 {
        return None;
    }
    let (_, version) = parts[0].split_once('/')?;
    Some((version, parts[1], parts[2].trim()))
}

fn is_chunked(response: &ItemList) -> bool {
    response.iter().any(|(k, v)| {
        k.trim().eq_ignore_ascii_case("Transfer-Encoding") && v.trim().eq_ignore_ascii_case("chunked")
    })
}

fn sentinel(version: String, code: &str) -> ItemList {
    ItemList::new().with(HTTP_VERSION, version).with(STATUS_CODE, code)
}

/// Cut long lines to 17 characters plus an ellipsis
fn truncate_line(line: &str) -> String {
    if line.chars().count() > FIRST_LINE_LIMIT {
        let kept: String = line.chars().take(FIRST_LINE_KEEP).collect();
        format!("{}...", kept)
    } else {
        line.to_string()
    }
}
