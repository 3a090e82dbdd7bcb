//! Request builder
//!
//! A `Request` holds the mutable pieces of one request (method, resource
//! path, query, header, body) and renders them into the exact text sent on
//! the wire. Header and query are either raw strings, used verbatim so
//! malformed input survives untouched, or item lists rendered with the
//! delimiters from `Settings`.

use super::{Error, ItemList, Result, Settings};
use std::fmt;

/// HTTP methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Connect,
    Options,
    Trace,
    Patch,
}

impl Method {
    /// Parse method from string
    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "CONNECT" => Ok(Method::Connect),
            "OPTIONS" => Ok(Method::Options),
            "TRACE" => Ok(Method::Trace),
            "PATCH" => Ok(Method::Patch),
            _ => Err(Error::Configuration(format!("Invalid HTTP method: {}", s))),
        }
    }

    /// Canonical method name
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Connect => "CONNECT",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Patch => "PATCH",
        }
    }

    /// Token written on the request line
    ///
    /// GET and POST use the configurable tokens so a test can send e.g.
    /// `get` or `P0ST`; other methods use their canonical name.
    pub fn token<'a>(&self, settings: &'a Settings) -> &'a str {
        match self {
            Method::Get => &settings.get_token,
            Method::Post => &settings.post_token,
            other => other.as_str(),
        }
    }

    /// Whether the client drives this method end to end
    pub fn is_supported(&self) -> bool {
        matches!(self, Method::Get | Method::Post)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Header or query content
///
/// `Raw` text is sent exactly as given. `Pairs` are rendered with the
/// configured delimiters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Raw(String),
    Pairs(ItemList),
}

/// Mutable request state
#[derive(Debug, Clone, Default)]
pub struct Request {
    method: Option<Method>,
    resource_path: String,
    query: Option<Source>,
    header: Option<Source>,
    body: String,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(&self) -> Option<Method> {
        self.method
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = Some(method);
    }

    /// Drop the method so no request line is written at all
    pub fn clear_method(&mut self) {
        self.method = None;
    }

    pub fn resource_path(&self) -> &str {
        &self.resource_path
    }

    pub fn set_resource_path(&mut self, path: impl Into<String>) {
        self.resource_path = path.into();
    }

    pub fn query(&self) -> Option<&Source> {
        self.query.as_ref()
    }

    /// Use a raw query string, replacing any query pairs
    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = Some(Source::Raw(query.into()));
    }

    /// Use query pairs, replacing any raw query string
    pub fn set_query_pairs(&mut self, pairs: ItemList) {
        self.query = Some(Source::Pairs(pairs));
    }

    /// Fall back to the configured default query
    pub fn clear_query(&mut self) {
        self.query = None;
    }

    pub fn header(&self) -> Option<&Source> {
        self.header.as_ref()
    }

    /// Use a raw header block, replacing any header pairs
    pub fn set_header(&mut self, header: impl Into<String>) {
        self.header = Some(Source::Raw(header.into()));
    }

    /// Use header pairs, replacing any raw header block
    pub fn set_header_pairs(&mut self, pairs: ItemList) {
        self.header = Some(Source::Pairs(pairs));
    }

    /// Fall back to the configured default header
    pub fn clear_header(&mut self) {
        self.header = None;
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = body.into();
    }

    /// Request line, or an empty string when no method is set
    ///
    /// Format: `<METHOD> <path>[<query-sep><query>] <VERSION>`
    pub fn top_line(&self, settings: &Settings) -> String {
        let method = match self.method {
            Some(method) => method,
            None => return String::new(),
        };

        let query = self.query_text(settings);
        let mut line = format!("{} {}", method.token(settings), self.resource_path);
        if !query.is_empty() {
            line.push_str(&settings.query_separator);
            line.push_str(&query);
        }
        line.push(' ');
        line.push_str(&settings.http_version_token);
        line
    }

    /// Rendered query (without the leading separator)
    pub fn query_text(&self, settings: &Settings) -> String {
        match self.query.as_ref().or(settings.default_query.as_ref()) {
            Some(Source::Raw(text)) => text.clone(),
            Some(Source::Pairs(pairs)) => pairs.render(
                &settings.query_name_value_separator,
                &settings.query_param_separator,
            ),
            None => String::new(),
        }
    }

    /// Rendered header block
    ///
    /// Raw text is returned verbatim. Pairs are rendered one per line, each
    /// line ending with the configured line terminator.
    pub fn header_text(&self, settings: &Settings) -> String {
        match self.header.as_ref().or(settings.default_header.as_ref()) {
            Some(Source::Raw(text)) => text.clone(),
            Some(Source::Pairs(pairs)) => {
                let delimiter = settings.header_delimiter_with_space();
                pairs
                    .iter()
                    .map(|(k, v)| format!("{}{}{}{}", k, delimiter, v, settings.header_line_terminator))
                    .collect()
            }
            None => String::new(),
        }
    }

    /// Parse the rendered header block back into pairs
    ///
    /// Each non-empty line is split at the first item delimiter; one space
    /// after the delimiter is dropped when `space_after_delimiter` is set.
    /// A line without a delimiter is a configuration error.
    pub fn header_as_list(&self, settings: &Settings) -> Result<ItemList> {
        let text = self.header_text(settings);
        let mut list = ItemList::new();

        for (index, line) in text
            .split(settings.header_line_terminator.as_str())
            .enumerate()
            .filter(|(_, line)| !line.is_empty())
        {
            let (key, value) = line
                .split_once(settings.header_item_delimiter.as_str())
                .ok_or_else(|| {
                    Error::Configuration(format!(
                        "Header line {} has no '{}' delimiter: {}",
                        index + 1,
                        settings.header_item_delimiter,
                        line
                    ))
                })?;
            let value = if settings.space_after_delimiter {
                value.strip_prefix(' ').unwrap_or(value)
            } else {
                value
            };
            list.push(key, value);
        }

        Ok(list)
    }

    /// Produce the exact request text
    ///
    /// `top + terminator + header + header/body delimiter + body`. An empty
    /// body is replaced by a second header/body delimiter so the blank line
    /// that ends the header block is always present. With
    /// `patch_content_length` the header's Content-Length is rewritten (or
    /// added) to the body length before assembly.
    pub fn to_request_text(&self, patch_content_length: bool, settings: &Settings) -> String {
        let top = self.top_line(settings);
        let mut header = self.header_text(settings);

        if patch_content_length {
            header = patch_content_length_value(
                &header,
                self.body.chars().count(),
                settings,
            );
        }

        let mut text = String::with_capacity(top.len() + header.len() + self.body.len() + 8);
        if !top.is_empty() {
            text.push_str(&top);
            text.push_str(&settings.header_line_terminator);
        }
        text.push_str(&header);
        text.push_str(&settings.header_body_delimiter);
        if self.body.is_empty() {
            text.push_str(&settings.header_body_delimiter);
        } else {
            text.push_str(&self.body);
        }
        text
    }
}

/// Rewrite or append the Content-Length value in a header block
///
/// This is plain string surgery, not header parsing, so a deliberately
/// corrupted header stays corrupted:
///
/// 1. Find the first occurrence of the Content-Length title.
/// 2. Scan forward to the first ASCII digit or line terminator.
/// 3. A digit run found there is replaced by `length`; if a terminator (or
///    the end of the text) comes first, `length` is inserted at that point.
///
/// Without the title a `<title><delimiter>[space]<length>` line is appended.
/// When the header block ended with a line terminator (or was empty) the new
/// line is terminated too; otherwise it is separated by a leading
/// terminator, preserving the block's own shape.
pub fn patch_content_length_value(header: &str, length: usize, settings: &Settings) -> String {
    let title = settings.content_length_title.as_str();
    let terminator = settings.header_line_terminator.as_str();
    let length = length.to_string();

    if let Some(title_pos) = (!title.is_empty()).then(|| header.find(title)).flatten() {
        let scan_start = title_pos + title.len();
        let rest = &header[scan_start..];

        let mut offset = rest.len();
        for (i, c) in rest.char_indices() {
            if c.is_ascii_digit() || (!terminator.is_empty() && rest[i..].starts_with(terminator)) {
                offset = i;
                break;
            }
        }

        let start = scan_start + offset;
        let digits = header[start..]
            .bytes()
            .take_while(|b| b.is_ascii_digit())
            .count();

        let mut patched = String::with_capacity(header.len() + length.len());
        patched.push_str(&header[..start]);
        patched.push_str(&length);
        patched.push_str(&header[start + digits..]);
        return patched;
    }

    let line = format!("{}{}{}", title, settings.header_delimiter_with_space(), length);
    let mut patched = header.to_string();
    if header.is_empty() || header.ends_with(terminator) {
        patched.push_str(&line);
        patched.push_str(terminator);
    } else {
        patched.push_str(terminator);
        patched.push_str(&line);
    }
    patched
}
