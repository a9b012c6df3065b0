//! Connection handling: building the pooled agent and running one round trip.
//!
//! # Design
//! The agent is configured once per client. Plain mode trusts the platform
//! store; mutual-TLS mode presents the configured client certificate and
//! trusts the platform store plus the configured CA bundle. Idle timeout and
//! keep-alive settings apply in both modes. Status codes are never treated as
//! transport errors here; classifying them is the decoder's job.

use std::fs;
use std::path::Path;
use std::time::Duration;

use ureq::http;
use ureq::tls::{Certificate, ClientCert, PemItem, PrivateKey, RootCerts, TlsConfig};
use ureq::{Agent, AsSendBody};

use crate::config::{ClientConfig, MutualTls};
use crate::error::{Error, Result};
use crate::http::{Body, RawResponse, Request};

/// Shared, internally synchronized connection pool.
#[derive(Debug, Clone)]
pub struct Transport {
    agent: Agent,
}

impl Transport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let tls = match config.tls.mode()? {
            None => TlsConfig::builder().root_certs(platform_roots()).build(),
            Some(files) => mutual_tls(&files, config.debug)?,
        };

        let mut builder = Agent::config_builder()
            .http_status_as_error(false)
            .max_idle_age(Duration::from_secs(config.idle_conn_timeout))
            .tls_config(tls);
        if config.disable_keepalives {
            builder = builder
                .max_idle_connections(0)
                .max_idle_connections_per_host(0);
        }

        Ok(Self {
            agent: builder.build().new_agent(),
        })
    }

    /// Sends `request` and reads the whole response body.
    pub fn round_trip(&self, request: &Request, timeout: Option<Duration>) -> Result<RawResponse> {
        let mut builder = http::Request::builder()
            .method(request.method.as_str())
            .uri(request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        match &request.body {
            Body::Empty => self.send(builder.body(()), request, timeout),
            Body::Raw(bytes) => self.send(builder.body(bytes.clone()), request, timeout),
        }
    }

    fn send<S: AsSendBody>(
        &self,
        built: std::result::Result<http::Request<S>, http::Error>,
        request: &Request,
        timeout: Option<Duration>,
    ) -> Result<RawResponse> {
        let method = request.method.as_str();
        let built = built.map_err(|e| {
            Error::config(format!("building {method} request for {}", request.url), e.to_string())
        })?;
        let built = self
            .agent
            .configure_request(built)
            .timeout_global(timeout)
            .build();
        let network = |source| Error::Network {
            method,
            url: request.url.clone(),
            source,
        };

        let mut response = self.agent.run(built).map_err(network)?;
        let status = response.status().as_u16();
        // Reading to the end hands the connection back to the pool.
        let body = response
            .body_mut()
            .with_config()
            .limit(u64::MAX)
            .read_to_vec()
            .map_err(network)?;
        Ok(RawResponse::new(status, body))
    }
}

fn platform_certs() -> Vec<Certificate<'static>> {
    let loaded = rustls_native_certs::load_native_certs();
    for err in &loaded.errors {
        tracing::warn!(%err, "skipping unreadable platform certificate");
    }
    loaded
        .certs
        .iter()
        .map(|der| Certificate::from_der(der.as_ref()).to_owned())
        .collect()
}

fn platform_roots() -> RootCerts {
    let certs = platform_certs();
    if certs.is_empty() {
        tracing::warn!("platform trust store is empty, falling back to bundled roots");
        RootCerts::WebPki
    } else {
        RootCerts::new_with_certs(&certs)
    }
}

fn mutual_tls(files: &MutualTls, debug: bool) -> Result<TlsConfig> {
    if debug {
        tracing::debug!(cert = %files.cert, key = %files.key, "loading client certificate");
    }
    let chain = load_certs(&files.cert)?;
    let key = load_key(&files.key)?;

    if debug {
        tracing::debug!(ca = %files.ca, "loading certificate authority");
    }
    let mut roots = platform_certs();
    roots.extend(load_certs(&files.ca)?);

    Ok(TlsConfig::builder()
        .client_cert(Some(ClientCert::new_with_certs(&chain, key)))
        .root_certs(RootCerts::new_with_certs(&roots))
        .build())
}

fn read(path: &str) -> Result<Vec<u8>> {
    fs::read(path).map_err(|source| Error::Io {
        path: Path::new(path).to_path_buf(),
        source,
    })
}

/// Every certificate in a PEM file; other PEM items are ignored.
fn load_certs(path: &str) -> Result<Vec<Certificate<'static>>> {
    let pem = read(path)?;
    let mut certs = Vec::new();
    for item in ureq::tls::parse_pem(&pem) {
        match item {
            Ok(PemItem::Certificate(cert)) => certs.push(cert),
            Ok(_) => {}
            Err(e) => return Err(Error::config(format!("parsing {path}"), e.to_string())),
        }
    }
    if certs.is_empty() {
        return Err(Error::config(format!("parsing {path}"), "no PEM certificates found"));
    }
    Ok(certs)
}

fn load_key(path: &str) -> Result<PrivateKey<'static>> {
    let pem = read(path)?;
    PrivateKey::from_pem(&pem).map_err(|e| Error::config(format!("parsing {path}"), e.to_string()))
}
