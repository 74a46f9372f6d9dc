//! Error types for the YOURLS API client.
//!
//! # Design
//! One variant per layer a call can fail at: transport, HTTP status, JSON
//! decoding, the API's own `status` field, and response shape. Each carries a
//! human-readable message; `ClientError::code` exposes the numeric code where
//! the failing layer provides one.

use serde_json::error::Category;
use thiserror::Error;

use crate::transport::TransportError;

/// Message used for every `ClientError::Decode`.
pub const DECODE_ERROR_MESSAGE: &str = "JSON decode error";

/// Errors returned by `YourlsClient` operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No response was obtained (DNS, connect, TLS handshake, read failure).
    #[error("transport error: {message}")]
    Transport { message: String, code: Option<i32> },

    /// A response arrived with a status other than 200.
    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    /// Status 200, but the body is not a JSON object.
    #[error("{message}")]
    Decode {
        message: String,
        code: u8,
        #[source]
        source: serde_json::Error,
    },

    /// The API answered but reported failure in its `status` field.
    #[error("{message}")]
    Api { message: String },

    /// A field the operation relies on is absent or has the wrong type.
    #[error("malformed response: missing field `{field}`")]
    MalformedResponse { field: &'static str },
}

impl ClientError {
    pub(crate) fn decode(source: serde_json::Error) -> Self {
        ClientError::Decode {
            message: DECODE_ERROR_MESSAGE.to_string(),
            code: category_code(source.classify()),
            source,
        }
    }

    /// Numeric code for programmatic branching, if the failing layer has one.
    ///
    /// OS error code for transport failures, the status for HTTP failures and
    /// the decoder's error category for decode failures.
    pub fn code(&self) -> Option<i64> {
        match self {
            ClientError::Transport { code, .. } => code.map(i64::from),
            ClientError::HttpStatus { status, .. } => Some(i64::from(*status)),
            ClientError::Decode { code, .. } => Some(i64::from(*code)),
            ClientError::Api { .. } | ClientError::MalformedResponse { .. } => None,
        }
    }
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        ClientError::Transport {
            message: err.message,
            code: err.code,
        }
    }
}

fn category_code(category: Category) -> u8 {
    match category {
        Category::Io => 1,
        Category::Syntax => 2,
        Category::Data => 3,
        Category::Eof => 4,
    }
}
