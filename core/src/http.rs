//! HTTP transport types.
//!
//! # Design
//! Requests and responses are plain data so that request building and
//! response parsing stay deterministic and can be exercised without a
//! network. Every YOURLS API call is a `GET`, so the request carries no
//! method or body.

/// An HTTP `GET` request described as plain data.
///
/// Built by `YourlsClient::build_request_at` and handed to a `Transport`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Endpoint with the form-urlencoded query string already appended.
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    /// Decoded query pairs in the order they appear in `url`.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        match self.url.split_once('?') {
            Some((_, query)) => url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Value of the first query parameter called `name`.
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.query_pairs()
            .into_iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}

/// An HTTP response described as plain data.
///
/// Produced by a `Transport` once a response has been received, whatever its
/// status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}
