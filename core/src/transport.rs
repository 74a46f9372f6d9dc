//! Executing `HttpRequest`s.
//!
//! # Design
//! `Transport` is the single I/O seam of the crate. `YourlsClient` is generic
//! over it so tests can substitute a canned responder, while production code
//! uses `UreqTransport`, a blocking ureq agent.

use std::fmt;

use thiserror::Error;
use ureq::tls::TlsConfig;
use ureq::Agent;

use crate::http::{HttpRequest, HttpResponse};

/// Raised when no response could be obtained at all.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    /// OS error code, when the failure came from the socket layer.
    pub code: Option<i32>,
}

/// Performs one blocking HTTP round-trip.
///
/// Any status code counts as a response; only failures to obtain one are
/// errors.
pub trait Transport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Blocking transport backed by a ureq agent.
///
/// Certificate and host name verification are disabled, and redirects are
/// followed up to ureq's default limit.
#[derive(Clone)]
pub struct UreqTransport {
    agent: Agent,
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport").finish_non_exhaustive()
    }
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .tls_config(TlsConfig::builder().disable_verification(true).build())
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self.agent.get(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let mut response = builder.call()?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                let value = value.to_str().ok()?;
                Some((name.as_str().to_string(), value.to_string()))
            })
            .collect();
        // Bodies are kept whatever their size or encoding; invalid UTF-8 is
        // replaced rather than treated as a failed round-trip.
        let bytes = response
            .body_mut()
            .with_config()
            .limit(u64::MAX)
            .read_to_vec()?;
        let body = String::from_utf8_lossy(&bytes).into_owned();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

impl From<ureq::Error> for TransportError {
    fn from(err: ureq::Error) -> Self {
        let code = match &err {
            ureq::Error::Io(io) => io.raw_os_error(),
            _ => None,
        };
        TransportError {
            message: err.to_string(),
            code,
        }
    }
}
