//! HTTP routes
//!
//! Every endpoint lives under `/api/<area>`; each area module exposes a
//! `routes()` function nested here.

mod admin;
mod auth;
mod dashboard;
mod instructor;
mod lessons;
mod quizzes;

use std::sync::Arc;

use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{async_trait, Json, Router};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::AppState;

/// The API router, with state applied
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/auth", auth::routes())
        .nest("/api/dashboard", dashboard::routes())
        .nest("/api/lessons", lessons::routes())
        .nest("/api/quizzes", quizzes::routes())
        .nest("/api/admin", admin::routes())
        .nest("/api/instructor", instructor::routes())
        .fallback(not_found)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().timestamp_millis(),
    }))
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "message": "Not Found" })))
}

/// JSON request body whose rejection renders as a `400` in the API's error shape
pub struct Payload<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for Payload<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Payload(value)),
            Err(rejection) => Err(AppError::BadRequest {
                message: "Invalid JSON payload".to_string(),
                details: Some(json!({ "reason": rejection.body_text() })),
            }),
        }
    }
}

/// Ok response with a `message` merged into a JSON object body
fn with_message(mut body: Value, message: impl Into<String>) -> Json<Value> {
    if let Value::Object(map) = &mut body {
        map.insert("message".to_string(), Value::String(message.into()));
    }
    Json(body)
}
