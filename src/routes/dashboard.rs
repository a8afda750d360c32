//! Learner dashboard: course progress, recommendations and the activity feed

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::Payload;
use crate::auth::AuthUser;
use crate::error::Result;
use crate::models::UnitType;
use crate::validation;
use crate::views::Dashboard;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_dashboard))
        .route("/courses/:course_id/progress", post(complete_unit))
        .route("/courses/:course_id/continue", post(continue_course))
        .route("/recommendations/:id/start", post(start_recommendation))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompleteUnitRequest {
    unit_type: Option<String>,
    unit_id: Option<String>,
}

async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Dashboard>> {
    Ok(Json(state.store.get_dashboard(user.id()).await?))
}

async fn complete_unit(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(course_id): Path<String>,
    Payload(req): Payload<CompleteUnitRequest>,
) -> Result<Json<Value>> {
    let unit_type = validation::one_of(req.unit_type.as_deref(), "unitType", UnitType::ALL)?;
    let unit_id = validation::required_string(req.unit_id.as_deref(), "unitId", 1)?;

    let outcome = state
        .store
        .mark_unit_complete(user.id(), &course_id, unit_type, &unit_id)
        .await?;
    let dashboard = state.store.get_dashboard(user.id()).await?;

    Ok(Json(json!({
        "message": outcome.message,
        "activity": outcome.activity,
        "dashboard": dashboard,
    })))
}

async fn continue_course(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(course_id): Path<String>,
) -> Result<Json<Value>> {
    let outcome = state.store.continue_course(user.id(), &course_id).await?;
    let dashboard = state.store.get_dashboard(user.id()).await?;

    Ok(Json(json!({
        "message": outcome.message,
        "activity": outcome.activity,
        "dashboard": dashboard,
    })))
}

async fn start_recommendation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = validation::integer(
        Some(&Value::String(id)),
        "recommendationId",
        Some(1),
        None,
    )?;

    let recommendation = state.store.start_recommendation(user.id(), id).await?;
    let dashboard = state.store.get_dashboard(user.id()).await?;
    let message = format!("{} added to plan", recommendation.label);

    Ok(Json(json!({
        "recommendation": {
            "id": recommendation.id,
            "label": recommendation.label,
            "meta": recommendation.meta,
            "lessons": recommendation.lessons,
            "quizzes": recommendation.quizzes,
            "started": true,
        },
        "dashboard": dashboard,
        "message": message,
    })))
}
