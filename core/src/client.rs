//! The API client handle.
//!
//! # Design
//! `Client` holds the immutable configuration and one pooled transport. Every
//! verb resolves a `Call` into a `Request`, traces it, runs one blocking
//! round trip and hands the raw response to the decoder. No per-call state
//! lives on the client, so a single instance can be shared across threads.
//! The transport sits behind a lock only so `close` can drop it; calls take a
//! cheap clone of the handle and release the lock before any I/O.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::{ClientConfig, Headers};
use crate::decode::{self, Response};
use crate::error::{Error, Result};
use crate::http::{Body, Call, HttpMethod, RawResponse, Request};
use crate::trace::Tracer;
use crate::transport::Transport;

pub struct Client {
    config: ClientConfig,
    tracer: Tracer,
    transport: RwLock<Option<Transport>>,
}

impl Client {
    /// Validates `config` and builds the transport, loading TLS material if
    /// configured. Fails without creating a client when any of it is invalid.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = Transport::new(&config)?;
        Ok(Self {
            tracer: Tracer::new(config.verbose, config.debug),
            transport: RwLock::new(Some(transport)),
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn get<T>(&self, path: &str) -> Result<Response<T>>
    where
        T: DeserializeOwned + Serialize,
    {
        self.execute(Call::new(HttpMethod::Get, path))
    }

    pub fn post<B, T>(&self, path: &str, body: &B, headers: Option<&Headers>) -> Result<Response<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned + Serialize,
    {
        self.execute(Call::new(HttpMethod::Post, path).json(body)?.headers(headers))
    }

    pub fn put<B, T>(&self, path: &str, body: &B, headers: Option<&Headers>) -> Result<Response<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned + Serialize,
    {
        self.execute(Call::new(HttpMethod::Put, path).json(body)?.headers(headers))
    }

    pub fn delete<T>(&self, path: &str) -> Result<Response<T>>
    where
        T: DeserializeOwned + Serialize,
    {
        self.execute(Call::new(HttpMethod::Delete, path))
    }

    /// POST with a body sent byte for byte.
    pub fn post_raw<T>(&self, path: &str, body: Vec<u8>, headers: Option<&Headers>) -> Result<Response<T>>
    where
        T: DeserializeOwned + Serialize,
    {
        self.execute(Call::new(HttpMethod::Post, path).body(Body::Raw(body)).headers(headers))
    }

    /// PUT with a body sent byte for byte.
    pub fn put_raw<T>(&self, path: &str, body: Vec<u8>, headers: Option<&Headers>) -> Result<Response<T>>
    where
        T: DeserializeOwned + Serialize,
    {
        self.execute(Call::new(HttpMethod::Put, path).body(Body::Raw(body)).headers(headers))
    }

    pub fn execute<T>(&self, call: Call) -> Result<Response<T>>
    where
        T: DeserializeOwned + Serialize,
    {
        let origin = format!("{} {}{}", call.method.as_str(), self.config.base_url, call.path);
        let raw = self.round_trip(call)?;
        decode::decode(raw, &origin)
    }

    /// Runs `call` without decoding the body. Statuses outside `[200, 300)`
    /// are still reported as `Error::Protocol`.
    pub fn execute_raw(&self, call: Call) -> Result<RawResponse> {
        let raw = self.round_trip(call)?;
        decode::check_status(&raw)?;
        Ok(raw)
    }

    /// Drops the connection pool. Every later call fails with `Error::Closed`.
    pub fn close(&self) {
        let mut transport = self.transport.write().unwrap_or_else(PoisonError::into_inner);
        if transport.take().is_some() {
            tracing::debug!(base_url = %self.config.base_url, "client closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.transport
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    fn round_trip(&self, call: Call) -> Result<RawResponse> {
        let transport = self
            .transport
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(Error::Closed)?;
        let timeout = call
            .timeout
            .or_else(|| self.config.request_timeout.map(Duration::from_secs));
        let request = Request::resolve(&self.config.base_url, &self.config.headers, call);
        self.tracer.request(&request);
        let raw = transport.round_trip(&request, timeout)?;
        self.tracer.response(&raw);
        Ok(raw)
    }
}
