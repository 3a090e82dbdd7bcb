//! Local servers shared by the integration tests

#![allow(dead_code)]

use openssl::asn1::Asn1Time;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::x509::extension::SubjectAlternativeName;
use openssl::x509::{X509NameBuilder, X509};
use rawhttp::http::{HttpClient, Settings};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

/// Read a request head (up to the blank line) plus whatever follows
/// within a short grace period
pub fn read_request(stream: &mut impl Read) -> String {
    let mut received = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                received.extend_from_slice(&buf[..n]);
                if received.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
        }
    }
    String::from_utf8_lossy(&received).into_owned()
}

/// Accept one connection, hand it to `handler`, return what it returns
pub fn spawn_server<F, T>(handler: F) -> (u16, thread::JoinHandle<T>)
where
    F: FnOnce(TcpStream) -> T + Send + 'static,
    T: Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        stream
            .set_read_timeout(Some(Duration::from_millis(500)))
            .unwrap();
        handler(stream)
    });

    (port, handle)
}

/// Answer one request with `response` and close; yields the request text
pub fn respond_once(response: &'static [u8]) -> (u16, thread::JoinHandle<String>) {
    spawn_server(move |mut stream| {
        let request = read_request(&mut stream);
        stream.write_all(response).unwrap();
        request
    })
}

pub fn settings_for(port: u16) -> Settings {
    let mut settings = Settings::default();
    settings.http_port = port;
    settings.tls_port = port;
    settings.send_timeout = Duration::from_secs(2);
    settings.receive_timeout = Duration::from_secs(2);
    settings
}

pub fn client_for(port: u16) -> HttpClient {
    let mut client = HttpClient::new(settings_for(port));
    client.set_domain("127.0.0.1");
    client
}

/// Self-signed certificate and key for `cn`
pub fn self_signed(cn: &str) -> (X509, PKey<Private>) {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    let key = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_nid(Nid::COMMONNAME, cn).unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(30).unwrap()).unwrap();
    let san = SubjectAlternativeName::new()
        .dns(cn)
        .ip("127.0.0.1")
        .build(&builder.x509v3_context(None, None))
        .unwrap();
    builder.append_extension(san).unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();

    (builder.build(), key)
}
