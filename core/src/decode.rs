//! Response decoding and status classification.
//!
//! # Design
//! A non-empty body is decoded before the status is looked at, so a
//! malformed body is reported as a serialization error even when the status
//! was a success, and even when it was not. For non-2xx responses the body
//! only has to be well-formed JSON: the destination type describes the
//! success shape, and a well-formed error payload is reported verbatim as a
//! protocol error instead.

use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::http::RawResponse;

/// A successful, decoded response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response<T> {
    pub status: u16,
    pub status_line: String,
    pub body: Vec<u8>,
    /// `None` when the server sent no body.
    pub value: Option<T>,
    text: String,
}

impl<T> Response<T> {
    /// `value` rendered as JSON with two-space indentation; empty without a
    /// body.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_value(self) -> Option<T> {
        self.value
    }
}

/// Decodes `raw` into `T` and classifies its status. `origin` names the call
/// (`GET http://...`) in error messages.
pub fn decode<T>(raw: RawResponse, origin: &str) -> Result<Response<T>>
where
    T: DeserializeOwned + Serialize,
{
    let context = || format!("decoding {} response from {origin}", raw.status_line);
    let mut value = None;
    let mut text = String::new();
    if !raw.body.is_empty() {
        if raw.is_success() {
            let decoded: T = serde_json::from_slice(&raw.body)
                .map_err(|e| Error::serialization(context(), e))?;
            text = serde_json::to_string_pretty(&decoded)
                .map_err(|e| Error::serialization(format!("rendering response from {origin}"), e))?;
            value = Some(decoded);
        } else {
            serde_json::from_slice::<IgnoredAny>(&raw.body)
                .map_err(|e| Error::serialization(context(), e))?;
        }
    }
    check_status(&raw)?;

    Ok(Response {
        status: raw.status,
        status_line: raw.status_line,
        body: raw.body,
        value,
        text,
    })
}

/// Map statuses outside `[200, 300)` to `Error::Protocol`.
pub fn check_status(raw: &RawResponse) -> Result<()> {
    if raw.is_success() {
        return Ok(());
    }
    Err(Error::Protocol {
        status: raw.status,
        status_line: raw.status_line.clone(),
        body: String::from_utf8_lossy(&raw.body).into_owned(),
    })
}
