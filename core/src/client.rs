//! Request builder, response parser and the three public API operations.
//!
//! # Design
//! Every operation funnels through `YourlsClient::call`, which builds the
//! request, hands it to the `Transport`, records the raw body and interprets
//! the response. Request building (`build_request_at`) and response parsing
//! (`parse_response`) are pure, so both can be tested without a network.

use std::time::{SystemTime, UNIX_EPOCH};

use md5::{Digest, Md5};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::form_urlencoded;

use crate::error::ClientError;
use crate::http::{HttpRequest, HttpResponse};
use crate::status::describe_status;
use crate::transport::{Transport, UreqTransport};
use crate::types::{Action, ClientConfig, Credentials};

/// Decoded JSON object returned by the API.
pub type ApiResult = Map<String, Value>;

/// Query parameters of a single call, in the order they are sent.
pub type Params = Vec<(String, String)>;

/// Blocking client for a YOURLS API endpoint.
///
/// Operations take `&mut self` because each one overwrites the last raw
/// response; wrap the client in a `Mutex` to share it between threads.
#[derive(Debug)]
pub struct YourlsClient<T = UreqTransport> {
    config: ClientConfig,
    transport: T,
    last_response: Option<String>,
}

impl YourlsClient<UreqTransport> {
    /// Client for `endpoint` using the positional credential rules of
    /// `Credentials::from_parts`. Nothing is validated or contacted here.
    pub fn new(
        endpoint: &str,
        username: Option<&str>,
        password: Option<&str>,
        token: Option<&str>,
    ) -> Self {
        let credentials = Credentials::from_parts(username, password, token);
        Self::from_config(ClientConfig::new(endpoint, credentials))
    }

    pub fn from_config(config: ClientConfig) -> Self {
        Self::with_transport(config, UreqTransport::new())
    }
}

impl<T> YourlsClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            last_response: None,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Raw body of the most recent response, if any call has received one.
    pub fn last_response(&self) -> Option<&str> {
        self.last_response.as_deref()
    }

    /// Build the request for `action`, signing with the current time.
    pub fn build_request(&self, action: Action, params: Params) -> HttpRequest {
        self.build_request_at(action, params, unix_timestamp())
    }

    /// Build the request for `action` as if issued at `timestamp`.
    ///
    /// The timestamp only matters in signature mode.
    pub fn build_request_at(&self, action: Action, mut params: Params, timestamp: u64) -> HttpRequest {
        params.push(("action".to_string(), action.as_str().to_string()));
        match &self.config.credentials {
            Credentials::Password { username, password } => {
                params.push(("username".to_string(), username.clone()));
                params.push(("password".to_string(), password.clone()));
            }
            Credentials::Signature { token } => {
                params.push(("timestamp".to_string(), timestamp.to_string()));
                params.push(("signature".to_string(), signature(token, timestamp)));
            }
        }
        params.push(("format".to_string(), "json".to_string()));

        let mut query = form_urlencoded::Serializer::new(String::new());
        for (name, value) in &params {
            query.append_pair(name, value);
        }
        let separator = if self.config.endpoint.contains('?') { '&' } else { '?' };

        HttpRequest {
            url: format!("{}{separator}{}", self.config.endpoint, query.finish()),
            headers: vec![("Expect".to_string(), String::new())],
        }
    }
}

impl<T: Transport> YourlsClient<T> {
    /// Shorten `url`, optionally under a chosen `keyword`, and return the
    /// short URL.
    pub fn shorten(&mut self, url: &str, keyword: Option<&str>) -> Result<String, ClientError> {
        let mut params: Params = vec![("url".to_string(), url.to_string())];
        if let Some(keyword) = keyword {
            params.push(("keyword".to_string(), keyword.to_string()));
        }

        let result = self.call(Action::ShortUrl, params)?;
        if is_failure(result.get("status")) {
            let message = match result.get("message").and_then(Value::as_str) {
                Some(message) => message.to_string(),
                None => format!(
                    "Could not shorten url address {url} [{}]",
                    keyword.unwrap_or_default()
                ),
            };
            return Err(ClientError::Api { message });
        }
        string_field(&result, "shorturl")
    }

    /// Statistics for `short_url`, returned exactly as the API sent them.
    pub fn url_stats(&mut self, short_url: &str) -> Result<ApiResult, ClientError> {
        let params = vec![("shorturl".to_string(), short_url.to_string())];
        self.call(Action::UrlStats, params)
    }

    /// The long URL `short_url` points to.
    pub fn expand(&mut self, short_url: &str) -> Result<String, ClientError> {
        let params = vec![("shorturl".to_string(), short_url.to_string())];
        let result = self.call(Action::Expand, params)?;
        string_field(&result, "longurl")
    }

    fn call(&mut self, action: Action, params: Params) -> Result<ApiResult, ClientError> {
        let request = self.build_request(action, params);
        debug!(
            action = action.as_str(),
            mode = self.config.credentials.mode(),
            endpoint = %self.config.endpoint,
            "calling YOURLS API"
        );

        let response = self.transport.execute(&request).map_err(|err| {
            warn!(action = action.as_str(), error = %err, "YOURLS API unreachable");
            ClientError::from(err)
        })?;
        self.last_response = Some(response.body.clone());

        parse_response(&response).inspect_err(|err| {
            warn!(action = action.as_str(), error = %err, "YOURLS API call failed");
        })
    }
}

/// Interpret a raw response: anything but 200 is an `HttpStatus` error,
/// a 200 must carry a JSON object.
pub fn parse_response(response: &HttpResponse) -> Result<ApiResult, ClientError> {
    if response.status != 200 {
        return Err(ClientError::HttpStatus {
            status: response.status,
            message: error_message(response),
        });
    }
    serde_json::from_str(&response.body).map_err(ClientError::decode)
}

/// Hex md5 of `token` followed by the decimal `timestamp`.
pub fn signature(token: &str, timestamp: u64) -> String {
    let digest = Md5::digest(format!("{token}{timestamp}").as_bytes());
    format!("{digest:x}")
}

/// `message` from a JSON error body, else the canned phrase for the status.
fn error_message(response: &HttpResponse) -> String {
    serde_json::from_str::<Value>(&response.body)
        .ok()
        .and_then(|body| body.get("message").and_then(Value::as_str).map(str::to_string))
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| describe_status(response.status))
}

/// A missing, empty or `"fail"` status means the API refused the request.
///
/// "Empty" covers every falsy JSON value: null, `false`, `0`, `""`, `"0"`,
/// `[]` and `{}`.
fn is_failure(status: Option<&Value>) -> bool {
    match status {
        None | Some(Value::Null) | Some(Value::Bool(false)) => true,
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(Value::String(status)) => status.is_empty() || status == "0" || status == "fail",
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(fields)) => fields.is_empty(),
        Some(Value::Bool(true)) => false,
    }
}

fn string_field(result: &ApiResult, field: &'static str) -> Result<String, ClientError> {
    result
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(ClientError::MalformedResponse { field })
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::transport::TransportError;

    const ENDPOINT: &str = "https://sho.rt/yourls-api.php";

    /// Answers every request with the same canned result and remembers what
    /// it was asked.
    struct Canned {
        reply: Result<HttpResponse, TransportError>,
        seen: RefCell<Vec<HttpRequest>>,
    }

    impl Canned {
        fn json(status: u16, body: &str) -> Self {
            Self {
                reply: Ok(HttpResponse {
                    status,
                    headers: Vec::new(),
                    body: body.to_string(),
                }),
                seen: RefCell::new(Vec::new()),
            }
        }

        fn unreachable() -> Self {
            Self {
                reply: Err(TransportError {
                    message: "Connection refused".to_string(),
                    code: Some(111),
                }),
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl Transport for Canned {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            self.seen.borrow_mut().push(request.clone());
            self.reply.clone()
        }
    }

    fn signed(transport: Canned) -> YourlsClient<Canned> {
        let creds = Credentials::Signature {
            token: "tok".to_string(),
        };
        YourlsClient::with_transport(ClientConfig::new(ENDPOINT, creds), transport)
    }

    fn password_client() -> YourlsClient<()> {
        let creds = Credentials::from_parts(Some("admin"), Some("hunter2"), None);
        YourlsClient::with_transport(ClientConfig::new(ENDPOINT, creds), ())
    }

    #[test]
    fn signature_is_md5_of_token_then_timestamp() {
        assert_eq!(signature("tok", 1000), "80f28040b9c8e3caa2d5fd0d3d170add");
    }

    #[test]
    fn signature_mode_request_shape() {
        let client = signed(Canned::json(200, "{}"));
        let req = client.build_request_at(
            Action::ShortUrl,
            vec![("url".to_string(), "http://example.com/a b".to_string())],
            1000,
        );
        assert_eq!(
            req.url,
            "https://sho.rt/yourls-api.php?url=http%3A%2F%2Fexample.com%2Fa+b&action=shorturl\
             &timestamp=1000&signature=80f28040b9c8e3caa2d5fd0d3d170add&format=json"
        );
        assert_eq!(req.headers, vec![("Expect".to_string(), String::new())]);
    }

    #[test]
    fn password_mode_sends_the_password() {
        let req = password_client().build_request_at(Action::Expand, Vec::new(), 1000);
        assert_eq!(req.query_param("username").as_deref(), Some("admin"));
        assert_eq!(req.query_param("password").as_deref(), Some("hunter2"));
        assert!(req.query_param("timestamp").is_none());
        assert!(req.query_param("signature").is_none());
        assert_eq!(req.query_param("format").as_deref(), Some("json"));
    }

    #[test]
    fn endpoint_with_query_is_extended() {
        let creds = Credentials::from_parts(Some("admin"), Some("pw"), None);
        let client =
            YourlsClient::with_transport(ClientConfig::new("http://h/api.php?lang=en", creds), ());
        let req = client.build_request_at(Action::Expand, Vec::new(), 0);
        assert!(req.url.starts_with("http://h/api.php?lang=en&action=expand&"));
    }

    #[test]
    fn shorten_returns_short_url() {
        let mut client = signed(Canned::json(200, r#"{"status":"success","shorturl":"http://x/y"}"#));
        assert_eq!(client.shorten("http://example.com", Some("y")).unwrap(), "http://x/y");

        let seen = client.transport.seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].query_param("action").as_deref(), Some("shorturl"));
        assert_eq!(seen[0].query_param("keyword").as_deref(), Some("y"));
        assert!(seen[0].query_param("signature").is_some());
    }

    #[test]
    fn shorten_without_keyword_omits_it() {
        let mut client = signed(Canned::json(200, r#"{"status":"success","shorturl":"http://x/1"}"#));
        client.shorten("http://example.com", None).unwrap();
        assert!(client.transport.seen.borrow()[0].query_param("keyword").is_none());
    }

    #[test]
    fn shorten_fail_uses_server_message() {
        let mut client = signed(Canned::json(200, r#"{"status":"fail","message":"bad url"}"#));
        let err = client.shorten("nope", None).unwrap_err();
        match err {
            ClientError::Api { message } => assert_eq!(message, "bad url"),
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[test]
    fn shorten_fail_without_message_names_url_and_keyword() {
        let mut client = signed(Canned::json(200, r#"{"status":"fail"}"#));
        let err = client.shorten("http://example.com", Some("kw")).unwrap_err();
        match err {
            ClientError::Api { message } => {
                assert!(message.contains("http://example.com"));
                assert!(message.contains("kw"));
            }
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[test]
    fn shorten_missing_status_is_a_failure() {
        let mut client = signed(Canned::json(200, r#"{"shorturl":"http://x/y"}"#));
        assert!(matches!(
            client.shorten("http://example.com", None),
            Err(ClientError::Api { .. })
        ));
    }

    #[test]
    fn shorten_treats_falsy_status_as_failure() {
        for status in ["0", "0.0", "[]", "{}", "false", "null", r#""""#, r#""0""#] {
            let body = format!(r#"{{"status":{status},"shorturl":"http://x/y"}}"#);
            let mut client = signed(Canned::json(200, &body));
            assert!(
                matches!(client.shorten("http://example.com", None), Err(ClientError::Api { .. })),
                "status {status} should fail"
            );
        }
        for status in ["1", "true", r#""success""#, "[0]"] {
            let body = format!(r#"{{"status":{status},"shorturl":"http://x/y"}}"#);
            let mut client = signed(Canned::json(200, &body));
            assert_eq!(
                client.shorten("http://example.com", None).unwrap(),
                "http://x/y",
                "status {status} should succeed"
            );
        }
    }

    #[test]
    fn shorten_success_without_short_url_is_malformed() {
        let mut client = signed(Canned::json(200, r#"{"status":"success"}"#));
        assert!(matches!(
            client.shorten("http://example.com", None),
            Err(ClientError::MalformedResponse { field: "shorturl" })
        ));
    }

    #[test]
    fn expand_returns_long_url() {
        let mut client = signed(Canned::json(200, r#"{"longurl":"http://long.example/path"}"#));
        assert_eq!(client.expand("http://x/y").unwrap(), "http://long.example/path");
        let seen = client.transport.seen.borrow();
        assert_eq!(seen[0].query_param("action").as_deref(), Some("expand"));
        assert_eq!(seen[0].query_param("shorturl").as_deref(), Some("http://x/y"));
    }

    #[test]
    fn expand_without_long_url_is_malformed() {
        let mut client = signed(Canned::json(200, r#"{"message":"success"}"#));
        assert!(matches!(
            client.expand("http://x/y"),
            Err(ClientError::MalformedResponse { field: "longurl" })
        ));
    }

    #[test]
    fn url_stats_returns_object_verbatim() {
        let body = r#"{"statusCode":200,"message":"success","link":{"shorturl":"http://x/y","clicks":"7"}}"#;
        let mut client = signed(Canned::json(200, body));
        let stats = client.url_stats("http://x/y").unwrap();
        let expected: ApiResult = serde_json::from_str(body).unwrap();
        assert_eq!(stats, expected);
    }

    #[test]
    fn not_found_without_json_uses_phrase_table() {
        let mut client = signed(Canned::json(404, "<html>gone</html>"));
        let err = client.expand("http://x/y").unwrap_err();
        match &err {
            ClientError::HttpStatus { status, message } => {
                assert_eq!(*status, 404);
                assert_eq!(message, "Not Found");
            }
            other => panic!("expected HttpStatus, got {other:?}"),
        }
        assert_eq!(err.code(), Some(404));
    }

    #[test]
    fn error_status_prefers_json_message() {
        let mut client = signed(Canned::json(403, r#"{"errorCode":403,"message":"Please log in"}"#));
        let err = client.url_stats("http://x/y").unwrap_err();
        assert!(matches!(
            err,
            ClientError::HttpStatus { status: 403, ref message } if message == "Please log in"
        ));
    }

    #[test]
    fn error_status_json_without_message_uses_phrase_table() {
        let mut client = signed(Canned::json(500, r#"{"errorCode":500}"#));
        let err = client.url_stats("http://x/y").unwrap_err();
        assert!(matches!(
            err,
            ClientError::HttpStatus { status: 500, ref message } if message == "Internal Server Error"
        ));
    }

    #[test]
    fn ok_with_invalid_json_is_decode_error() {
        let mut client = signed(Canned::json(200, "not-json"));
        assert!(matches!(client.url_stats("http://x/y"), Err(ClientError::Decode { .. })));
    }

    #[test]
    fn ok_with_non_object_json_is_decode_error() {
        let mut client = signed(Canned::json(200, "[1,2]"));
        assert!(matches!(client.url_stats("http://x/y"), Err(ClientError::Decode { .. })));
    }

    #[test]
    fn transport_failure_keeps_message_and_code() {
        let mut client = signed(Canned::unreachable());
        let err = client.expand("http://x/y").unwrap_err();
        match err {
            ClientError::Transport { message, code } => {
                assert_eq!(message, "Connection refused");
                assert_eq!(code, Some(111));
            }
            other => panic!("expected Transport, got {other:?}"),
        }
        assert_eq!(client.last_response(), None);
    }

    #[test]
    fn last_response_tracks_every_received_body() {
        let mut client = signed(Canned::json(200, "not-json"));
        assert_eq!(client.last_response(), None);
        let _ = client.url_stats("http://x/y");
        assert_eq!(client.last_response(), Some("not-json"));

        let mut client = signed(Canned::json(404, r#"{"message":"Error: short URL not found"}"#));
        let _ = client.expand("http://x/y");
        assert_eq!(client.last_response(), Some(r#"{"message":"Error: short URL not found"}"#));
    }

    #[test]
    fn every_call_issues_a_new_request() {
        let mut client = signed(Canned::json(200, r#"{"longurl":"http://l"}"#));
        client.expand("http://x/y").unwrap();
        client.expand("http://x/y").unwrap();
        assert_eq!(client.transport.seen.borrow().len(), 2);
    }
}
