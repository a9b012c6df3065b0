//! Traffic tracing.
//!
//! With `verbose` set, one line is logged per direction. With `debug` also
//! set, headers and bodies follow, each wrapped in BEGIN/END marker lines so
//! multi-line payloads stay delimited in a shared log stream. Summary lines
//! are emitted at INFO, header and body dumps at DEBUG.

use crate::http::{RawResponse, Request};

#[derive(Debug, Clone, Copy, Default)]
pub struct Tracer {
    verbose: bool,
    debug: bool,
}

impl Tracer {
    pub fn new(verbose: bool, debug: bool) -> Self {
        Self { verbose, debug }
    }

    fn dumps(&self) -> bool {
        self.verbose && self.debug
    }

    pub fn request(&self, request: &Request) {
        if !self.verbose {
            return;
        }
        let body = request.body.as_bytes();
        tracing::info!(
            "<-- {} {} ({} bytes)",
            request.method.as_str(),
            request.url,
            body.len()
        );
        if self.dumps() {
            tracing::debug!("BEGIN-REQUEST-HEADER");
            for (name, value) in &request.headers {
                tracing::debug!("{name}: {value}");
            }
            tracing::debug!("END-REQUEST-HEADER");
            tracing::debug!("BEGIN-REQUEST-BODY");
            tracing::debug!("{}", String::from_utf8_lossy(body));
            tracing::debug!("END-REQUEST-BODY");
        }
    }

    pub fn response(&self, response: &RawResponse) {
        if !self.verbose {
            return;
        }
        tracing::info!(
            "--> '{}' ({} bytes)",
            response.status_line,
            response.body.len()
        );
        if self.dumps() {
            tracing::debug!("BEGIN-RESPONSE-BODY");
            tracing::debug!("{}", String::from_utf8_lossy(&response.body));
            tracing::debug!("END-RESPONSE-BODY");
        }
    }
}
