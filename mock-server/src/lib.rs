use std::{
    collections::HashMap,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use axum::{
    extract::{Query, RawQuery, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use md5::{Digest, Md5};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};

pub const API_PATH: &str = "/yourls-api.php";
pub const LEGACY_API_PATH: &str = "/api.php";
pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "secret";
pub const TOKEN: &str = "1002a612b4";
pub const SHORT_BASE: &str = "http://sho.rt";

/// Signed requests older or newer than this are rejected.
pub const SIGNATURE_WINDOW_SECS: u64 = 12 * 60 * 60;

#[derive(Clone, Debug)]
pub struct Auth {
    pub username: String,
    pub password: String,
    pub token: String,
}

impl Default for Auth {
    fn default() -> Self {
        Self {
            username: USERNAME.to_string(),
            password: PASSWORD.to_string(),
            token: TOKEN.to_string(),
        }
    }
}

impl Auth {
    /// Username/password pair, or a timestamp signed with the token.
    pub fn accepts(&self, params: &HashMap<String, String>, now: u64) -> bool {
        if let (Some(username), Some(password)) = (params.get("username"), params.get("password")) {
            return *username == self.username && *password == self.password;
        }
        if let (Some(timestamp), Some(sig)) = (params.get("timestamp"), params.get("signature")) {
            let Ok(timestamp) = timestamp.parse::<u64>() else {
                return false;
            };
            return now.abs_diff(timestamp) <= SIGNATURE_WINDOW_SECS
                && *sig == signature(&self.token, timestamp);
        }
        false
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Link {
    pub keyword: String,
    pub url: String,
    pub title: String,
    pub timestamp: String,
    pub ip: String,
    pub clicks: u64,
}

#[derive(Default)]
struct Store {
    links: HashMap<String, Link>,
    next_id: u64,
}

struct AppState {
    auth: Auth,
    short_base: String,
    store: RwLock<Store>,
}

type Shared = Arc<AppState>;

pub fn app() -> Router {
    app_with(Auth::default(), SHORT_BASE)
}

pub fn app_with(auth: Auth, short_base: &str) -> Router {
    let state = Arc::new(AppState {
        auth,
        short_base: short_base.trim_end_matches('/').to_string(),
        store: RwLock::new(Store::default()),
    });
    Router::new()
        .route(API_PATH, get(api))
        .route(LEGACY_API_PATH, get(legacy_api))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Hex md5 of `token` followed by the decimal `timestamp`.
pub fn signature(token: &str, timestamp: u64) -> String {
    let digest = Md5::digest(format!("{token}{timestamp}").as_bytes());
    format!("{digest:x}")
}

/// Lowercase base-36 rendering used for generated keywords.
pub fn base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut out = Vec::new();
    loop {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
        if n == 0 {
            break;
        }
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

fn error(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({ "errorCode": status.as_u16(), "message": message })),
    )
}

async fn api(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let action = params.get("action").map(String::as_str).unwrap_or_default();
    debug!(action, "api request");

    if !state.auth.accepts(&params, now()) {
        return error(StatusCode::FORBIDDEN, "Please log in");
    }
    match action {
        "shorturl" => shorten(&state, &params).await,
        "url-stats" => url_stats(&state, &params).await,
        "expand" => expand(&state, &params).await,
        _ => error(
            StatusCode::BAD_REQUEST,
            "Unknown or missing \"action\" parameter",
        ),
    }
}

async fn shorten(state: &AppState, params: &HashMap<String, String>) -> (StatusCode, Json<Value>) {
    let url = params.get("url").map(String::as_str).unwrap_or_default();
    if !url.contains("://") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "status": "fail",
                "code": "error:nourl",
                "message": "Missing or malformed URL",
                "errorCode": 400,
            })),
        );
    }

    let mut store = state.store.write().await;
    let keyword = match params.get("keyword").filter(|k| !k.is_empty()) {
        Some(keyword) => {
            let keyword = keyword.to_lowercase();
            let valid = keyword.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
            if !valid || store.links.contains_key(&keyword) {
                return (
                    StatusCode::OK,
                    Json(json!({
                        "status": "fail",
                        "code": "error:keyword",
                        "message": format!("Short URL {keyword} already exists in database or is reserved"),
                        "statusCode": 200,
                    })),
                );
            }
            keyword
        }
        None => loop {
            let candidate = base36(store.next_id);
            store.next_id += 1;
            if !store.links.contains_key(&candidate) {
                break candidate;
            }
        },
    };

    let link = Link {
        keyword: keyword.clone(),
        url: url.to_string(),
        title: url.to_string(),
        timestamp: now().to_string(),
        ip: "127.0.0.1".to_string(),
        clicks: 0,
    };
    store.links.insert(keyword.clone(), link.clone());
    info!(%keyword, url, "link added");

    (
        StatusCode::OK,
        Json(json!({
            "url": {
                "keyword": link.keyword,
                "url": link.url,
                "title": link.title,
                "date": link.timestamp,
                "ip": link.ip,
            },
            "status": "success",
            "message": format!("{url} added to database"),
            "title": link.title,
            "shorturl": format!("{}/{keyword}", state.short_base),
            "statusCode": 200,
        })),
    )
}

async fn url_stats(state: &AppState, params: &HashMap<String, String>) -> (StatusCode, Json<Value>) {
    let keyword = keyword_of(state, params);
    let store = state.store.read().await;
    match store.links.get(&keyword) {
        Some(link) => {
            let mut body = serde_json::to_value(link).unwrap_or_default();
            body["shorturl"] = json!(format!("{}/{}", state.short_base, link.keyword));
            (
                StatusCode::OK,
                Json(json!({ "statusCode": 200, "message": "success", "link": body })),
            )
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "statusCode": 404, "message": "Error: short URL not found" })),
        ),
    }
}

async fn expand(state: &AppState, params: &HashMap<String, String>) -> (StatusCode, Json<Value>) {
    let keyword = keyword_of(state, params);
    let store = state.store.read().await;
    match store.links.get(&keyword) {
        Some(link) => (
            StatusCode::OK,
            Json(json!({
                "keyword": link.keyword,
                "shorturl": format!("{}/{}", state.short_base, link.keyword),
                "longurl": link.url,
                "title": link.title,
                "message": "success",
                "statusCode": 200,
            })),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "keyword": keyword,
                "message": "Error: short URL not found",
                "errorCode": 404,
            })),
        ),
    }
}

/// Old API location; forwards the query to `API_PATH` with a 302.
async fn legacy_api(RawQuery(query): RawQuery) -> Response {
    let location = match query {
        Some(query) => format!("{API_PATH}?{query}"),
        None => API_PATH.to_string(),
    };
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

/// `shorturl` may be a full short URL or a bare keyword.
fn keyword_of(state: &AppState, params: &HashMap<String, String>) -> String {
    let short = params.get("shorturl").map(String::as_str).unwrap_or_default();
    let keyword = short
        .strip_prefix(state.short_base.as_str())
        .map(|rest| rest.trim_start_matches('/'))
        .unwrap_or(short);
    keyword.to_lowercase()
}
