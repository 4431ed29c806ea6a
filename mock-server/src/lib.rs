use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query, RawQuery},
    http::{HeaderMap, Method, StatusCode},
    routing::{any, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::debug;

/// What `/echo` saw of the incoming request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub query: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Echo {
    /// All values of header `name` (case-insensitive), in arrival order.
    pub fn header(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

/// One decoded part of a `/upload` request.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadedPart {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Widget {
    pub id: u32,
    pub name: String,
}

#[derive(Deserialize)]
pub struct StatusQuery {
    pub body: Option<String>,
}

pub fn app() -> Router {
    Router::new()
        .route("/ok", get(ok))
        .route("/status/{code}", any(status))
        .route("/echo", any(echo))
        .route("/upload", post(upload))
        .route("/slow/{ms}", get(slow))
        .route("/widget", get(widget))
        .route("/binary", get(binary))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn ok() -> &'static str {
    "ok"
}

async fn status(Path(code): Path<u16>, Query(query): Query<StatusQuery>) -> (StatusCode, String) {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
    let body = query.body.unwrap_or_else(|| format!("status {code}"));
    (status, body)
}

async fn echo(method: Method, RawQuery(query): RawQuery, headers: HeaderMap, body: Bytes) -> Json<Echo> {
    let headers = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    Json(Echo {
        method: method.to_string(),
        query,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

async fn upload(mut multipart: Multipart) -> Result<Json<Vec<UploadedPart>>, (StatusCode, String)> {
    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(bad_request)?.to_vec();
        debug!(%name, bytes = data.len(), "received part");
        parts.push(UploadedPart {
            name,
            file_name,
            content_type,
            data,
        });
    }
    Ok(Json(parts))
}

fn bad_request(err: impl std::fmt::Display) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, err.to_string())
}

async fn slow(Path(ms): Path<u64>) -> &'static str {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    "slow"
}

async fn widget() -> Json<Widget> {
    Json(Widget {
        id: 1,
        name: "sprocket".to_string(),
    })
}

async fn binary() -> Vec<u8> {
    vec![0xff, 0xfe, 0x00]
}
