use axum::{extract::Query, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Deserialize)]
pub struct HelloParams {
    name: Option<String>,
}

pub async fn hello(Query(params): Query<HelloParams>) -> Json<Value> {
    let name = params.name.as_deref().unwrap_or("world");
    Json(json!({ "message": format!("hello {name}") }))
}

pub async fn echo(Json(body): Json<Map<String, Value>>) -> Json<Value> {
    Json(json!({ "received": body }))
}

pub async fn error() -> impl IntoResponse {
    (StatusCode::IM_A_TEAPOT, Json(json!({ "error": "teapot" })))
}
