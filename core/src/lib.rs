//! Blocking REST/JSON API client.
//!
//! # Overview
//! A `Client` issues GET/POST/PUT/DELETE requests against a fixed base URL,
//! optionally over mutual TLS. Request bodies are JSON-encoded (or passed
//! through as raw bytes), responses are JSON-decoded into a caller-chosen
//! type and also rendered as indented JSON text for display.
//!
//! # Design
//! - `ClientConfig` is an explicit value; nothing is read from global state.
//! - Request assembly (`http`), the network round trip (`transport`) and
//!   response classification (`decode`) are separate steps so each can be
//!   tested on its own.
//! - Default and per-call headers are appended, never replaced: a name set in
//!   both goes out with both values.
//! - Every failure is an `Error` value naming the operation and its cause.

pub mod client;
pub mod config;
pub mod decode;
pub mod error;
pub mod http;
pub mod trace;
pub mod transport;

pub use client::Client;
pub use config::{ClientConfig, Headers, TlsFiles, DEFAULT_DISABLE_KEEPALIVES, DEFAULT_IDLE_CONN_TIMEOUT};
pub use decode::Response;
pub use error::{Error, Result};
pub use http::{Body, Call, HttpMethod, RawResponse, Request};
