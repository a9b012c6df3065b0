//! Fixture HTTP server for exercising the API client over real sockets.
//!
//! Serves a small in-memory widget store plus a handful of diagnostic
//! endpoints: body echo, header inspection, arbitrary status codes,
//! malformed and empty bodies, and a deliberately slow route.

use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Widget {
    pub id: u64,
    pub name: String,
}

#[derive(Deserialize)]
pub struct NewWidget {
    pub name: String,
}

pub type Db = Arc<RwLock<HashMap<u64, Widget>>>;

type Failure = (StatusCode, Json<Value>);

/// Widget 7 ("gear") is always present when the server starts.
pub fn app() -> Router {
    let seed = Widget {
        id: 7,
        name: "gear".to_string(),
    };
    let db: Db = Arc::new(RwLock::new(HashMap::from([(seed.id, seed)])));
    Router::new()
        .route("/widgets", post(create_widget))
        .route(
            "/widgets/{id}",
            get(get_widget).put(update_widget).delete(delete_widget),
        )
        .route("/echo", post(echo).put(echo))
        .route("/headers/{name}", get(header_values))
        .route("/status/{code}", get(status))
        .route("/text/{code}", get(text_status))
        .route("/malformed", get(malformed))
        .route("/empty", get(empty))
        .route("/slow/{millis}", get(slow))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn not_found() -> Failure {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" })))
}

async fn create_widget(
    State(db): State<Db>,
    Json(input): Json<NewWidget>,
) -> (StatusCode, Json<Widget>) {
    let mut widgets = db.write().await;
    let id = widgets.keys().max().map_or(1, |max| max + 1);
    let widget = Widget {
        id,
        name: input.name,
    };
    widgets.insert(id, widget.clone());
    tracing::debug!(id, "widget created");
    (StatusCode::CREATED, Json(widget))
}

async fn get_widget(State(db): State<Db>, Path(id): Path<u64>) -> Result<Json<Widget>, Failure> {
    let widgets = db.read().await;
    widgets.get(&id).cloned().map(Json).ok_or_else(not_found)
}

async fn update_widget(
    State(db): State<Db>,
    Path(id): Path<u64>,
    Json(input): Json<NewWidget>,
) -> Result<Json<Widget>, Failure> {
    let mut widgets = db.write().await;
    let widget = widgets.get_mut(&id).ok_or_else(not_found)?;
    widget.name = input.name;
    Ok(Json(widget.clone()))
}

async fn delete_widget(State(db): State<Db>, Path(id): Path<u64>) -> Result<StatusCode, Failure> {
    let mut widgets = db.write().await;
    widgets
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(not_found)
}

/// Returns the request body untouched, keeping its content type.
async fn echo(headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
    ([(header::CONTENT_TYPE, content_type)], body)
}

/// Every value received for `name`, in wire order.
async fn header_values(Path(name): Path<String>, headers: HeaderMap) -> Json<Vec<String>> {
    let values = headers
        .get_all(name.as_str())
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(str::to_string)
        .collect();
    Json(values)
}

async fn status(Path(code): Path<u16>) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let status = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok((status, Json(json!({ "status": code }))))
}

async fn text_status(Path(code): Path<u16>) -> Result<(StatusCode, &'static str), StatusCode> {
    let status = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok((status, "plain text failure"))
}

async fn malformed() -> (StatusCode, &'static str) {
    (StatusCode::OK, "{\"id\": 7, \"name\": ")
}

async fn empty() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn slow(Path(millis): Path<u64>) -> Json<Value> {
    tokio::time::sleep(Duration::from_millis(millis)).await;
    Json(json!({}))
}
