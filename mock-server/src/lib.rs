use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
    time::Duration,
};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};

/// Body of `/get`: the query string and request headers echoed back.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Echo {
    pub args: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
}

/// Body of `/post`: the url-encoded form echoed back.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FormEcho {
    pub form: BTreeMap<String, String>,
}

/// Hit counts per `/flaky/{key}`.
pub type Hits = Arc<RwLock<HashMap<String, u32>>>;

pub fn app() -> Router {
    let hits: Hits = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/get", get(echo_query))
        .route("/post", post(echo_form).put(echo_form).patch(echo_form))
        .route("/envelope", get(envelope))
        .route("/status/{code}", get(status).post(status))
        .route("/delay/{ms}", get(delay))
        .route("/flaky/{key}", get(flaky))
        .with_state(hits)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
        .collect()
}

async fn echo_query(Query(args): Query<BTreeMap<String, String>>, headers: HeaderMap) -> Json<Echo> {
    Json(Echo {
        args,
        headers: header_map(&headers),
    })
}

async fn echo_form(Form(form): Form<BTreeMap<String, String>>) -> Json<FormEcho> {
    Json(FormEcho { form })
}

/// A `{respCode, respMsg, respData}` envelope wrapping the query arguments.
async fn envelope(Query(args): Query<BTreeMap<String, String>>) -> Json<Value> {
    Json(json!({
        "respCode": 0,
        "respMsg": "ok",
        "respData": {
            "contents": {
                "name": args.get("name").map(String::as_str).unwrap_or("KK"),
                "args": args,
            }
        }
    }))
}

async fn status(Path(code): Path<u16>) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let status = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok((status, Json(json!({ "status": code }))))
}

async fn delay(Path(ms): Path<u64>) -> Json<Value> {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    Json(json!({ "delayed_ms": ms }))
}

/// Fails with 503 on the first hit for `key`, succeeds afterwards.
async fn flaky(State(hits): State<Hits>, Path(key): Path<String>) -> (StatusCode, Json<Value>) {
    let mut hits = hits.write().await;
    let count = hits.entry(key.clone()).or_insert(0);
    *count += 1;
    if *count == 1 {
        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "key": key, "attempt": 1 })))
    } else {
        (StatusCode::OK, Json(json!({ "key": key, "attempt": *count })))
    }
}
