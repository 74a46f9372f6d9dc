//! Blocking client for the YOURLS URL-shortening API.
//!
//! # Overview
//! `YourlsClient` shortens URLs, expands short URLs and fetches per-link
//! statistics. Each operation is one signed `GET` against the configured
//! endpoint followed by status and JSON interpretation.
//!
//! # Design
//! - Requests and responses are plain data (`HttpRequest`, `HttpResponse`);
//!   building and parsing them never touches the network.
//! - The network round-trip goes through the `Transport` trait.
//!   `UreqTransport` is the default; tests plug in canned responders.
//! - `Credentials` fixes the authentication mode at construction.
//! - Failures are classified by layer in `ClientError`.

pub mod client;
pub mod error;
pub mod http;
pub mod status;
pub mod transport;
pub mod types;

pub use client::{parse_response, signature, ApiResult, Params, YourlsClient};
pub use error::ClientError;
pub use http::{HttpRequest, HttpResponse};
pub use status::status_phrase;
pub use transport::{Transport, TransportError, UreqTransport};
pub use types::{Action, ClientConfig, Credentials};
