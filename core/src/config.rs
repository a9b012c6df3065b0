//! Client configuration.
//!
//! `ClientConfig` is built once by the host tool, either with the chained
//! setters below or by deserializing it from whatever config format the tool
//! reads, and is handed to `Client::new`. Nothing is looked up implicitly.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Seconds an unused pooled connection stays open.
pub const DEFAULT_IDLE_CONN_TIMEOUT: u64 = 5;
pub const DEFAULT_DISABLE_KEEPALIVES: bool = false;

/// Header name to value. Keys are case-sensitive as given.
pub type Headers = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Prefix every request path is appended to, verbatim.
    pub base_url: String,
    /// Sent with every request, before any per-call headers.
    pub headers: Headers,
    /// Log one summary line per request and response, at INFO.
    pub verbose: bool,
    /// With `verbose`, also dump headers and bodies. These lines are logged
    /// at DEBUG, so the installed subscriber must let DEBUG through for
    /// `apiclient::trace` as well.
    pub debug: bool,
    pub idle_conn_timeout: u64,
    pub disable_keepalives: bool,
    /// Deadline in seconds applied to calls that do not set their own.
    pub request_timeout: Option<u64>,
    pub tls: TlsFiles,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            headers: Headers::new(),
            verbose: false,
            debug: false,
            idle_conn_timeout: DEFAULT_IDLE_CONN_TIMEOUT,
            disable_keepalives: DEFAULT_DISABLE_KEEPALIVES,
            request_timeout: None,
            tls: TlsFiles::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_tls(mut self, cert: &str, key: &str, ca: &str) -> Self {
        self.tls = TlsFiles {
            cert: cert.to_string(),
            key: key.to_string(),
            ca: ca.to_string(),
        };
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn idle_conn_timeout(mut self, seconds: u64) -> Self {
        self.idle_conn_timeout = seconds;
        self
    }

    pub fn disable_keepalives(mut self, disable: bool) -> Self {
        self.disable_keepalives = disable;
        self
    }

    pub fn request_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout = Some(seconds);
        self
    }

    /// Rejects configurations no client can be built from.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(Error::config("validating client config", "base URL is empty"));
        }
        self.tls.mode().map(|_| ())
    }
}

/// Paths of the mutual-TLS material. Empty means unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TlsFiles {
    pub cert: String,
    pub key: String,
    pub ca: String,
}

/// Expanded paths of a complete TLS triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutualTls {
    pub cert: String,
    pub key: String,
    pub ca: String,
}

impl TlsFiles {
    /// `None` when no TLS material is configured, the expanded triple when
    /// all of it is, and an error for anything in between.
    pub fn mode(&self) -> Result<Option<MutualTls>> {
        let fields = [("cert", &self.cert), ("key", &self.key), ("ca", &self.ca)];
        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, path)| path.is_empty())
            .map(|(name, _)| *name)
            .collect();
        match missing.len() {
            3 => Ok(None),
            0 => Ok(Some(MutualTls {
                cert: expand_env(&self.cert),
                key: expand_env(&self.key),
                ca: expand_env(&self.ca),
            })),
            _ => Err(Error::config(
                "validating TLS config",
                format!(
                    "incomplete TLS config, missing {}: cert={:?} key={:?} ca={:?}",
                    missing.join(", "),
                    self.cert,
                    self.key,
                    self.ca
                ),
            )),
        }
    }
}

/// Replaces `$NAME` and `${NAME}` with the value of the environment variable.
/// Unset variables expand to the empty string; a `$` not followed by a name
/// is kept as is.
pub fn expand_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => {
                    out.push_str(&lookup(&braced[..end]));
                    rest = &braced[end + 1..];
                }
                None => {
                    out.push_str(&rest[pos..]);
                    rest = "";
                }
            }
            continue;
        }
        let len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        if len == 0 {
            out.push('$');
        } else {
            out.push_str(&lookup(&after[..len]));
        }
        rest = &after[len..];
    }
    out.push_str(rest);
    out
}

fn lookup(name: &str) -> String {
    std::env::var(name).unwrap_or_default()
}
