//! Fluent HTTP request builder with deferred execution.
//!
//! # Overview
//! A `Request` is configured through chained setters, dispatched once with
//! `send` (which returns immediately) and collected later with `end` (which
//! blocks until the exchange is done and returns the decoded body).
//!
//! # Design
//! - `Client` owns the shared `Transport` plus timeout, proxy and user
//!   agent. It holds no per-request state.
//! - `Transport` is the single I/O seam: one blocking `execute` per request.
//!   `UreqTransport` is the default; tests swap in recording doubles.
//! - Every failure, from URL parsing to the network, surfaces from `end`.
//! - Responses with `Content-Encoding: gzip` are decompressed transparently.

pub mod client;
pub mod error;
pub mod http;
pub mod request;
pub mod transport;
pub mod types;

pub use crate::client::{Client, ClientConfig, ClientOption, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
pub use crate::error::{BoxError, Error};
pub use crate::http::{decode_body, BodyReader, RequestBody, Response};
pub use crate::request::Request;
pub use crate::transport::{Transport, TransportConfig, UreqTransport};
pub use crate::types::Cookie;
