//! Integration tests for plain HTTP exchanges
//!
//! Each test runs a one-shot server on a local port and drives it through
//! `HttpClient`.

mod common;

use common::{client_for, respond_once, settings_for, spawn_server};
use rawhttp::http::{DecodeStep, Error, HttpClient, ItemList, Method, Settings, TransportError};
use std::io::Write;
use std::thread;
use std::time::Duration;

#[test]
fn test_post_with_patched_content_length() {
    let (port, server) = respond_once(b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\nreceived");
    let mut client = client_for(port);
    client.set_header("Host: localhost\r\nContent-Length: 999\r\n");

    let response = client.post("/submit", "hello").unwrap();

    assert_eq!(response.get("HTTPVersion").unwrap(), "1.1");
    assert_eq!(response.get("StatusCode").unwrap(), "200");
    assert_eq!(response.get("StatusText").unwrap(), "OK");
    assert_eq!(response.get("Content-Type").unwrap(), " text/plain");
    assert_eq!(response.get("Body").unwrap(), "received");

    let request = server.join().unwrap();
    assert!(request.starts_with("POST /submit HTTP/1.1\r\n"), "{}", request);
    assert!(request.contains("Content-Length: 5\r\n"), "{}", request);
    assert!(!request.contains("999"), "{}", request);
}

#[test]
fn test_duplicate_headers_are_kept_in_order() {
    let (port, server) = respond_once(
        b"HTTP/1.1 200 OK\r\nSet-Cookie: a=1\r\nSet-Cookie: b=2\r\nContent-Length: 0\r\n\r\n",
    );
    let mut client = client_for(port);

    let response = client.get("/").unwrap();

    assert_eq!(response.get_all("Set-Cookie"), vec![" a=1", " b=2"]);
    assert_eq!(response.get("Set-Cookie").unwrap(), " a=1");
    let keys: Vec<&str> = response.iter().map(|(k, _)| k).collect();
    assert_eq!(
        keys,
        vec!["HTTPVersion", "StatusCode", "StatusText", "Set-Cookie", "Set-Cookie", "Content-Length", "Body"]
    );
    server.join().unwrap();
}

#[test]
fn test_chunked_response_is_reassembled() {
    let (port, server) = respond_once(
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n",
    );
    let mut client = client_for(port);

    let response = client.get("/chunked").unwrap();
    assert_eq!(response.get("Body").unwrap(), "Wikipedia");
    server.join().unwrap();
}

#[test]
fn test_header_without_colon_is_malformed() {
    let (port, server) = respond_once(b"HTTP/1.1 200 OK\r\nBrokenHeader\r\n\r\n");
    let mut client = client_for(port);

    let err = client.get("/").unwrap_err();
    match err {
        Error::MalformedResponse(malformed) => {
            assert_eq!(malformed.step, DecodeStep::HeaderLine);
            assert_eq!(malformed.line_number(), Some(2));
        }
        other => panic!("unexpected error: {}", other),
    }

    // The raw text is still available for inspection
    assert_eq!(
        client.last_response_text(),
        Some("HTTP/1.1 200 OK\r\nBrokenHeader\r\n\r\n")
    );
    assert!(client.last_response().is_none());
    server.join().unwrap();
}

#[test]
fn test_non_http_response_decodes_to_sentinel() {
    let (port, server) = respond_once(b"SSH-2.0-OpenSSH_8.9p1 Ubuntu-3ubuntu0.1\r\n");
    let mut client = client_for(port);

    let response = client.get("/").unwrap();
    assert_eq!(response.get("StatusCode").unwrap(), "Unknown - Response not HTTP");
    assert_eq!(
        response.get("HTTPVersion").unwrap(),
        "Unknown - Response not HTTP: FirstLine=[SSH-2.0-OpenSSH_8...]"
    );
    assert!(response.get("Body").is_err());
    server.join().unwrap();
}

#[test]
fn test_server_closing_without_answer() {
    let (port, server) = spawn_server(|mut stream| {
        common::read_request(&mut stream);
    });
    let mut client = client_for(port);

    let response = client.get("/").unwrap();
    assert_eq!(response.get("StatusCode").unwrap(), "Unknown - Empty Response");
    server.join().unwrap();
}

#[test]
fn test_receive_timeout_is_captured_by_try_send() {
    let (port, _server) = spawn_server(|mut stream| {
        common::read_request(&mut stream);
        stream
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n")
            .unwrap();
        // Keep the connection open past the client's receive timeout
        thread::sleep(Duration::from_secs(2));
    });

    let mut settings = settings_for(port);
    settings.receive_timeout = Duration::from_millis(300);
    let mut client = HttpClient::new(settings);
    client.set_domain("127.0.0.1");
    client.set_method(Method::Get);
    client.set_resource_path("/");
    client.set_header("Host: localhost\r\nConnection: keep-alive\r\n");

    assert!(client.try_send(false).is_none());
    let err = client.last_error().unwrap();
    assert!(
        matches!(err, Error::Transport(TransportError::Receive { timed_out: true, .. })),
        "{}",
        err
    );
    assert!(err.to_string().starts_with("Timeout receiving response"), "{}", err);
}

#[test]
fn test_request_without_method_sends_header_and_body_only() {
    let (port, server) = respond_once(b"HTTP/1.1 400 Bad Request\r\n\r\n");
    let mut client = client_for(port);

    let response = client
        .try_send_request(
            None,
            "127.0.0.1",
            "/ignored",
            None,
            Some(rawhttp::http::Source::Raw("GARBAGE\r\n".to_string())),
            "",
            false,
        )
        .unwrap();

    assert_eq!(response.get("StatusCode").unwrap(), "400");
    assert_eq!(response.get("StatusText").unwrap(), "Bad Request");
    assert!(client.last_error().is_none());

    let request = server.join().unwrap();
    assert!(request.starts_with("GARBAGE\r\n\r\n"), "{:?}", request);
    assert_eq!(client.last_request_text(), Some("GARBAGE\r\n\r\n\r\n"));
}

#[test]
fn test_header_pairs_and_custom_tokens() {
    let (port, server) = respond_once(b"HTTP/1.0 200 OK\r\n\r\n");
    let settings = Settings::with_overrides(settings_for(port), |key| match key {
        "GET_TOKEN" => Some("get".to_string()),
        "HTTP_VERSION_TOKEN" => Some("HTTP/1.0".to_string()),
        _ => None,
    })
    .unwrap();
    let mut client = HttpClient::new(settings);
    client.set_domain("127.0.0.1");
    client.set_header_pairs(ItemList::new().with("Host", "localhost").with("X-Test", "1"));
    client.set_query_pairs(ItemList::new().with("q", "rust"));

    let response = client.get("/search").unwrap();
    assert_eq!(response.get("HTTPVersion").unwrap(), "1.0");

    let request = server.join().unwrap();
    assert!(
        request.starts_with("get /search?q=rust HTTP/1.0\r\nHost: localhost\r\nX-Test: 1\r\n\r\n"),
        "{:?}",
        request
    );
}

#[test]
fn test_transcript_records_exchange() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("transcript.log");

    let (port, server) = respond_once(b"HTTP/1.1 200 OK\r\n\r\n");
    let mut settings = settings_for(port);
    settings.transcript_path = Some(path.clone());
    let mut client = HttpClient::new(settings);
    client.set_domain("127.0.0.1");
    client.set_header("Host: localhost\r\n");

    client.get("/logged").unwrap();
    server.join().unwrap();

    let transcript = std::fs::read_to_string(&path).unwrap();
    assert!(transcript.contains("GET /logged HTTP/1.1\r\nHost: localhost"), "{}", transcript);
    assert!(transcript.contains("Timing"), "{}", transcript);
}
