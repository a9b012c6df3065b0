//! Outbound request assembly.
//!
//! # Design
//! A `Call` is what the caller asks for: a method, a path relative to the
//! base URL, a body and extra headers. `Request::resolve` turns it into the
//! plain-data request that goes on the wire: the absolute URL, the merged
//! header list and the body bytes. Resolution does no I/O, so everything
//! about request assembly can be tested without a server.

use std::time::Duration;

use serde::Serialize;

use crate::config::Headers;
use crate::error::{Error, Result};

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// Request payload. Raw bytes are sent unchanged; `Body::json` encodes a
/// value up front so an encoding failure never reaches the network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Body {
    #[default]
    Empty,
    Raw(Vec<u8>),
}

impl Body {
    pub fn json<B: Serialize + ?Sized>(value: &B) -> Result<Self> {
        serde_json::to_vec(value)
            .map(Body::Raw)
            .map_err(|e| Error::serialization("encoding JSON request body", e))
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Body::Empty => &[],
            Body::Raw(bytes) => bytes,
        }
    }
}

/// One call as the caller describes it.
#[derive(Debug, Clone)]
pub struct Call {
    pub method: HttpMethod,
    pub path: String,
    pub body: Body,
    pub headers: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl Call {
    pub fn new(method: HttpMethod, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            body: Body::Empty,
            headers: Vec::new(),
            timeout: None,
        }
    }

    pub fn body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    pub fn json<B: Serialize + ?Sized>(self, value: &B) -> Result<Self> {
        Ok(self.body(Body::json(value)?))
    }

    /// Adds one value for `name`; repeated names are kept, not replaced.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn headers(mut self, headers: Option<&Headers>) -> Self {
        if let Some(headers) = headers {
            self.headers
                .extend(headers.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        self
    }

    /// Deadline for the whole round trip, overriding the client default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A fully resolved outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: HttpMethod,
    pub url: String,
    /// Client defaults first, then per-call headers. A name may repeat.
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl Request {
    pub fn resolve(base_url: &str, defaults: &Headers, call: Call) -> Self {
        let mut headers: Vec<(String, String)> = defaults
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        headers.extend(call.headers);
        Self {
            method: call.method,
            url: format!("{base_url}{}", call.path),
            headers,
            body: call.body,
        }
    }
}

/// Status and body of a response, read to the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// Code and reason phrase, e.g. `404 Not Found`.
    pub status_line: String,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            status_line: status_line(status),
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// `<code> <canonical reason>`, or the bare code when the code has no
/// registered reason. The phrase the server actually sent is not available
/// from the transport, so a custom reason such as `200 Fine` reads `200 OK`.
pub(crate) fn status_line(status: u16) -> String {
    let reason = ureq::http::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason());
    match reason {
        Some(reason) => format!("{status} {reason}"),
        None => status.to_string(),
    }
}
