//! rawhttp - raw HTTP/1.x client for negative testing of HTTP servers
//!
//! This crate sends requests exactly as the caller assembled them, including
//! malformed request lines, corrupt headers and wrong Content-Length values,
//! and returns the raw response decoded into an order-preserving item list.

pub mod http;
