//! A small in-process stand-in for the Cloudflare API v4
//!
//! Knows a single zone (`example.com`, id `zone-1`) and accepts either the
//! bearer token `good-token` or the global key `ops@example.com`/`good-key`.

#![allow(dead_code)]

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const TOKEN: &str = "good-token";
pub const EMAIL: &str = "ops@example.com";
pub const GLOBAL_KEY: &str = "good-key";
pub const ZONE_ID: &str = "zone-1";
pub const ZONE_NAME: &str = "example.com";

#[derive(Default)]
struct MockState {
    records: Vec<Value>,
    writes: Vec<(String, Value)>,
    zone_lookups: Vec<String>,
    record_lookups: usize,
    next_id: usize,
}

/// Handle to the mock's state, shared with the running server
#[derive(Clone, Default)]
pub struct MockCloudflare {
    state: Arc<Mutex<MockState>>,
}

impl MockCloudflare {
    pub fn with_record(name: &str, record_type: &str, content: &str) -> Self {
        let mock = Self::default();
        mock.add_record("rec-1", name, record_type, content);
        mock
    }

    /// Store another record, e.g. a duplicate left behind by hand edits
    pub fn add_record(&self, id: &str, name: &str, record_type: &str, content: &str) {
        self.state.lock().unwrap().records.push(json!({
            "id": id,
            "zone_id": ZONE_ID,
            "name": name,
            "type": record_type,
            "content": content,
            "ttl": 300,
            "proxied": false
        }));
    }

    /// Start serving; returns the API root URL
    pub async fn serve(&self) -> String {
        let app = Router::new()
            .route("/user/tokens/verify", get(verify_token))
            .route("/user", get(user))
            .route("/zones", get(list_zones))
            .route("/zones/{zone_id}", get(zone_details))
            .route(
                "/zones/{zone_id}/dns_records",
                get(list_records).post(create_record),
            )
            .route(
                "/zones/{zone_id}/dns_records/{record_id}",
                axum::routing::put(update_record).delete(delete_record),
            )
            .with_state(self.clone());

        serve_router(Router::new().nest("/client/v4", app)).await
    }

    /// Methods and bodies of every write, in order (DELETE bodies are `{ "id": ... }`)
    pub fn writes(&self) -> Vec<(String, Value)> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn records(&self) -> Vec<Value> {
        self.state.lock().unwrap().records.clone()
    }

    /// Zone names queried via `/zones?name=`
    pub fn zone_lookups(&self) -> Vec<String> {
        self.state.lock().unwrap().zone_lookups.clone()
    }

    pub fn record_lookups(&self) -> usize {
        self.state.lock().unwrap().record_lookups
    }
}

/// Serve `app` on an ephemeral local port
pub async fn serve_router(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/client/v4", addr)
}

/// A server answering every request with `status` and `body`
pub async fn serve_fixed(status: u16, body: Value) -> String {
    let status = StatusCode::from_u16(status).unwrap();
    let app = Router::new().fallback(move || {
        let body = body.clone();
        async move { (status, Json(body)) }
    });
    serve_router(app).await
}

pub fn success(result: Value) -> Json<Value> {
    Json(json!({ "success": true, "errors": [], "messages": [], "result": result }))
}

pub fn failure(code: u32, message: &str) -> Json<Value> {
    Json(json!({
        "success": false,
        "errors": [{ "code": code, "message": message }],
        "messages": [],
        "result": null
    }))
}

type Reply = (StatusCode, Json<Value>);

fn authorized(headers: &HeaderMap) -> bool {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    header("authorization") == Some(format!("Bearer {}", TOKEN).as_str())
        || (header("x-auth-email") == Some(EMAIL) && header("x-auth-key") == Some(GLOBAL_KEY))
}

fn forbidden() -> Reply {
    (StatusCode::FORBIDDEN, failure(10000, "Authentication error"))
}

async fn verify_token(headers: HeaderMap) -> Reply {
    let bearer = format!("Bearer {}", TOKEN);
    if headers.get("authorization").and_then(|v| v.to_str().ok()) == Some(bearer.as_str()) {
        (StatusCode::OK, success(json!({ "id": "tok-1", "status": "active" })))
    } else {
        (StatusCode::UNAUTHORIZED, failure(1000, "Invalid API Token"))
    }
}

async fn user(headers: HeaderMap) -> Reply {
    if authorized(&headers) {
        (StatusCode::OK, success(json!({ "id": "user-1", "email": EMAIL })))
    } else {
        (StatusCode::BAD_REQUEST, failure(9103, "Unknown X-Auth-Key or X-Auth-Email"))
    }
}

async fn list_zones(
    State(mock): State<MockCloudflare>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Reply {
    if !authorized(&headers) {
        return forbidden();
    }

    let name = query.get("name").cloned().unwrap_or_default();
    mock.state.lock().unwrap().zone_lookups.push(name.clone());

    let zones = if name == ZONE_NAME {
        json!([{ "id": ZONE_ID, "name": ZONE_NAME, "status": "active" }])
    } else {
        json!([])
    };
    (StatusCode::OK, success(zones))
}

async fn zone_details(Path(zone_id): Path<String>, headers: HeaderMap) -> Reply {
    if !authorized(&headers) {
        return forbidden();
    }

    if zone_id == ZONE_ID {
        (StatusCode::OK, success(json!({ "id": ZONE_ID, "name": ZONE_NAME })))
    } else {
        (
            StatusCode::BAD_REQUEST,
            failure(7003, "Could not route to /zones/unknown, perhaps your object identifier is invalid?"),
        )
    }
}

async fn list_records(
    State(mock): State<MockCloudflare>,
    Path(zone_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Reply {
    if !authorized(&headers) {
        return forbidden();
    }
    if zone_id != ZONE_ID {
        return (StatusCode::NOT_FOUND, failure(7003, "Could not route"));
    }

    let mut state = mock.state.lock().unwrap();
    state.record_lookups += 1;

    let matching: Vec<Value> = state
        .records
        .iter()
        .filter(|r| query.get("name").is_none_or(|n| r["name"] == n.as_str()))
        .filter(|r| query.get("type").is_none_or(|t| r["type"] == t.as_str()))
        .cloned()
        .collect();

    (StatusCode::OK, success(Value::Array(matching)))
}

async fn update_record(
    State(mock): State<MockCloudflare>,
    Path((zone_id, record_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    if !authorized(&headers) {
        return forbidden();
    }

    let mut state = mock.state.lock().unwrap();
    state.writes.push(("PUT".to_string(), body.clone()));

    let Some(record) = state
        .records
        .iter_mut()
        .find(|r| zone_id == ZONE_ID && r["id"] == record_id.as_str())
    else {
        return (StatusCode::NOT_FOUND, failure(81044, "Record does not exist."));
    };

    for key in ["type", "name", "content", "ttl", "proxied"] {
        record[key] = body[key].clone();
    }
    (StatusCode::OK, success(record.clone()))
}

async fn create_record(
    State(mock): State<MockCloudflare>,
    Path(zone_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    if !authorized(&headers) {
        return forbidden();
    }
    if zone_id != ZONE_ID {
        return (StatusCode::NOT_FOUND, failure(7003, "Could not route"));
    }

    let mut state = mock.state.lock().unwrap();
    state.writes.push(("POST".to_string(), body.clone()));
    state.next_id += 1;

    let mut record = body;
    record["id"] = json!(format!("created-{}", state.next_id));
    record["zone_id"] = json!(ZONE_ID);
    state.records.push(record.clone());

    (StatusCode::OK, success(record))
}

async fn delete_record(
    State(mock): State<MockCloudflare>,
    Path((zone_id, record_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Reply {
    if !authorized(&headers) {
        return forbidden();
    }

    let mut state = mock.state.lock().unwrap();
    state
        .writes
        .push(("DELETE".to_string(), json!({ "id": record_id })));

    let Some(index) = state
        .records
        .iter()
        .position(|r| zone_id == ZONE_ID && r["id"] == record_id.as_str())
    else {
        return (StatusCode::NOT_FOUND, failure(81044, "Record does not exist."));
    };

    state.records.remove(index);
    (StatusCode::OK, success(json!({ "id": record_id })))
}
