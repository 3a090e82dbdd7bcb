//! HTTP client facade
//!
//! `HttpClient` holds the request being built, sends it over a fresh
//! connection per call and keeps the last request text, raw response and
//! decoded response (or error) for inspection.

use super::decoder::{self, STATUS_CODE};
use super::tls::{CertificateValidator, ClientCertificate, MockValidator};
use super::{
    Error, ItemList, Method, Request, Result, Settings, Source, Transcript, Transport,
};
use std::sync::Arc;
use std::time::Instant;

/// HTTP client
///
/// One instance drives one conversation at a time; each `send` opens and
/// closes its own connection.
pub struct HttpClient {
    settings: Settings,
    transcript: Transcript,
    domain: String,
    use_tls: bool,
    request: Request,
    client_certificate: Option<ClientCertificate>,
    validator: Option<Arc<dyn CertificateValidator>>,
    last_request: Option<String>,
    last_response_text: Option<String>,
    last_response: Option<ItemList>,
    last_error: Option<Error>,
}

impl HttpClient {
    /// Create a new client using `settings` for every request
    pub fn new(settings: Settings) -> Self {
        let transcript = Transcript::new(settings.transcript_path.clone());
        HttpClient {
            settings,
            transcript,
            domain: String::new(),
            use_tls: false,
            request: Request::new(),
            client_certificate: None,
            validator: None,
            last_request: None,
            last_response_text: None,
            last_response: None,
            last_error: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn set_domain(&mut self, domain: impl Into<String>) {
        self.domain = domain.into();
    }

    pub fn use_tls(&self) -> bool {
        self.use_tls
    }

    pub fn set_use_tls(&mut self, use_tls: bool) {
        self.use_tls = use_tls;
    }

    pub fn set_method(&mut self, method: Method) {
        self.request.set_method(method);
    }

    pub fn set_resource_path(&mut self, path: impl Into<String>) {
        self.request.set_resource_path(path);
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.request.set_query(query);
    }

    pub fn set_query_pairs(&mut self, pairs: ItemList) {
        self.request.set_query_pairs(pairs);
    }

    pub fn set_header(&mut self, header: impl Into<String>) {
        self.request.set_header(header);
    }

    pub fn set_header_pairs(&mut self, pairs: ItemList) {
        self.request.set_header_pairs(pairs);
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        self.request.set_body(body);
    }

    /// Present `certificate` during TLS handshakes
    pub fn set_client_certificate(&mut self, certificate: Option<ClientCertificate>) {
        self.client_certificate = certificate;
    }

    /// Replace the built-in certificate policy
    ///
    /// With a validator set, `accept_certificates` from the settings is not
    /// consulted.
    pub fn set_validator(&mut self, validator: Option<Arc<dyn CertificateValidator>>) {
        self.validator = validator;
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    /// Port for the current scheme
    pub fn port(&self) -> u16 {
        self.settings.port_for(self.use_tls)
    }

    pub fn scheme(&self) -> &'static str {
        if self.use_tls {
            "https"
        } else {
            "http"
        }
    }

    /// Exact text of the last request handed to the transport
    pub fn last_request_text(&self) -> Option<&str> {
        self.last_request.as_deref()
    }

    /// Raw text of the last response received
    pub fn last_response_text(&self) -> Option<&str> {
        self.last_response_text.as_deref()
    }

    pub fn last_response(&self) -> Option<&ItemList> {
        self.last_response.as_ref()
    }

    /// Error captured by the last `try_send`/`try_send_request`
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    fn validate(&self) -> Result<()> {
        if self.domain.trim().is_empty() {
            return Err(Error::Configuration("Domain is not set".to_string()));
        }
        if let Some(method) = self.request.method() {
            if !method.is_supported() {
                return Err(Error::Configuration(format!(
                    "Unsupported HTTP method: {}",
                    method
                )));
            }
        }
        Ok(())
    }

    fn transport(&self) -> Result<Transport> {
        let settings = &self.settings;
        if !self.use_tls {
            return Ok(Transport::plain(
                settings.send_timeout,
                settings.receive_timeout,
                self.transcript.clone(),
            ));
        }

        let validator = match &self.validator {
            Some(validator) => Arc::clone(validator),
            None => Arc::new(MockValidator::new(
                settings.accept_certificates,
                self.transcript.clone(),
            )),
        };
        Ok(Transport::tls(
            settings.tls_versions.clone(),
            self.client_certificate.as_ref(),
            validator,
            settings.send_timeout,
            settings.receive_timeout,
            self.transcript.clone(),
        )?)
    }

    /// Build, send and decode the current request
    ///
    /// With `patch_content_length` the header's Content-Length is set to the
    /// body length first. A request without a method is sent as header and
    /// body only.
    pub fn send(&mut self, patch_content_length: bool) -> Result<ItemList> {
        self.last_request = None;
        self.last_response_text = None;
        self.last_response = None;
        self.validate()?;

        let text = self
            .request
            .to_request_text(patch_content_length, &self.settings);
        self.last_request = Some(text.clone());

        let transport = self.transport()?;
        let host = self.domain.trim().to_string();
        let port = self.port();
        tracing::debug!(scheme = self.scheme(), %host, port, "sending request");

        let started = Instant::now();
        let raw = transport.send(&host, port, &text)?;
        self.last_response_text = Some(String::from_utf8_lossy(&raw).into_owned());

        let response = decoder::decode_bytes(&raw)?;
        tracing::info!(
            %host,
            port,
            status = response.get(STATUS_CODE).unwrap_or(""),
            elapsed = ?started.elapsed(),
            "exchange completed"
        );
        self.last_response = Some(response.clone());
        Ok(response)
    }

    /// Set every request field, then `send`
    #[allow(clippy::too_many_arguments)]
    pub fn send_request(
        &mut self,
        method: Option<Method>,
        domain: &str,
        resource_path: &str,
        query: Option<Source>,
        header: Option<Source>,
        body: &str,
        patch_content_length: bool,
    ) -> Result<ItemList> {
        self.apply(method, domain, resource_path, query, header, body);
        self.send(patch_content_length)
    }

    fn apply(
        &mut self,
        method: Option<Method>,
        domain: &str,
        resource_path: &str,
        query: Option<Source>,
        header: Option<Source>,
        body: &str,
    ) {
        self.set_domain(domain);
        match method {
            Some(method) => self.request.set_method(method),
            None => self.request.clear_method(),
        }
        self.request.set_resource_path(resource_path);
        match query {
            Some(Source::Raw(text)) => self.request.set_query(text),
            Some(Source::Pairs(pairs)) => self.request.set_query_pairs(pairs),
            None => self.request.clear_query(),
        }
        match header {
            Some(Source::Raw(text)) => self.request.set_header(text),
            Some(Source::Pairs(pairs)) => self.request.set_header_pairs(pairs),
            None => self.request.clear_header(),
        }
        self.request.set_body(body);
    }

    /// `send` that never fails; the error is kept in `last_error`
    pub fn try_send(&mut self, patch_content_length: bool) -> Option<ItemList> {
        let result = self.send(patch_content_length);
        self.capture(result)
    }

    /// `send_request` that never fails; the error is kept in `last_error`
    #[allow(clippy::too_many_arguments)]
    pub fn try_send_request(
        &mut self,
        method: Option<Method>,
        domain: &str,
        resource_path: &str,
        query: Option<Source>,
        header: Option<Source>,
        body: &str,
        patch_content_length: bool,
    ) -> Option<ItemList> {
        let result = self.send_request(
            method,
            domain,
            resource_path,
            query,
            header,
            body,
            patch_content_length,
        );
        self.capture(result)
    }

    fn capture(&mut self, result: Result<ItemList>) -> Option<ItemList> {
        match result {
            Ok(response) => {
                self.last_error = None;
                Some(response)
            }
            Err(e) => {
                tracing::debug!(error = %e, "request failed");
                self.last_error = Some(e);
                None
            }
        }
    }

    /// GET `path` with the current header
    pub fn get(&mut self, path: &str) -> Result<ItemList> {
        self.request.set_method(Method::Get);
        self.request.set_resource_path(path);
        self.request.set_body("");
        self.send(false)
    }

    /// POST `body` to `path` with a patched Content-Length
    pub fn post(&mut self, path: &str, body: &str) -> Result<ItemList> {
        self.request.set_method(Method::Post);
        self.request.set_resource_path(path);
        self.request.set_body(body);
        self.send(true)
    }
}
