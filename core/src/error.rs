//! Error types for the API client.
//!
//! # Design
//! One enum covers every failure a call or a construction can produce. Each
//! variant records where it came from (the operation, the path or the
//! method and URL) next to the underlying cause, so a message read from a log
//! is enough to diagnose the failure without re-running it.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration or a request that could not be assembled.
    /// Nothing was sent.
    #[error("{context}: {message}")]
    Config { context: String, message: String },

    /// A certificate, key or CA file could not be read.
    #[error("reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// DNS, connect, TLS handshake, write, read or deadline failure.
    #[error("{method} {url}: {source}")]
    Network {
        method: &'static str,
        url: String,
        #[source]
        source: ureq::Error,
    },

    /// The server answered with a status outside `[200, 300)`. The message is
    /// the status line followed by the raw body, if there was one.
    #[error("{status_line}{}", detail(.body))]
    Protocol {
        status: u16,
        status_line: String,
        body: String,
    },

    /// Encoding the request body or decoding the response body failed.
    #[error("{context}: {source}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("client closed")]
    Closed,
}

fn detail(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!("\n{body}")
    }
}

impl Error {
    pub(crate) fn config(context: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            context: context.into(),
            message: message.into(),
        }
    }

    pub(crate) fn serialization(context: impl Into<String>, source: serde_json::Error) -> Self {
        Error::Serialization {
            context: context.into(),
            source,
        }
    }

    /// HTTP status code of a protocol error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Protocol { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when a network failure was caused by an expired deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::Network {
                source: ureq::Error::Timeout(_),
                ..
            }
        )
    }
}
