//! Admin console: user management and the approval queue

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{with_message, Payload};
use crate::auth::AdminUser;
use crate::error::{AppError, Result};
use crate::models::{Decision, UserStatus};
use crate::validation;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:user_id", patch(update_user))
        .route("/approvals", get(list_approvals))
        .route("/approvals/:approval_id/decision", post(decide))
}

#[derive(Debug, Deserialize)]
struct UpdateUserRequest {
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DecisionRequest {
    decision: Option<String>,
    note: Option<String>,
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<Value>> {
    let users = state.store.list_users().await?;
    Ok(Json(json!({ "users": users })))
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<String>,
    Payload(req): Payload<UpdateUserRequest>,
) -> Result<Json<Value>> {
    let status = validation::one_of(req.status.as_deref(), "status", UserStatus::ALL)?;
    let user_id =
        Uuid::parse_str(&user_id).map_err(|_| AppError::not_found("User not found"))?;

    let user = state.store.update_user_status(user_id, status).await?;
    tracing::info!("Admin {} set user {} to {}", admin.id, user.id, status);

    Ok(Json(json!({ "user": user })))
}

async fn list_approvals(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<Value>> {
    let approvals = state.store.pending_approvals().await?;
    Ok(Json(json!({ "approvals": approvals })))
}

async fn decide(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(approval_id): Path<String>,
    Payload(req): Payload<DecisionRequest>,
) -> Result<Json<Value>> {
    let approval_id = validation::integer(
        Some(&Value::String(approval_id)),
        "approvalId",
        Some(1),
        None,
    )?;
    let decision = validation::one_of(req.decision.as_deref(), "decision", Decision::ALL)?;
    let note = validation::optional_string(req.note.as_deref());

    let item = state
        .store
        .decide_approval(approval_id, decision, admin.id, note)
        .await?;
    let message = format!(
        "{}'s {} {}.",
        item.author,
        item.kind.to_lowercase(),
        decision
    );

    Ok(with_message(json!({ "item": item }), message))
}
