//! Lesson reading, progress tracking and learner feedback

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{with_message, Payload};
use crate::auth::AuthUser;
use crate::error::Result;
use crate::models::{LessonState, Visibility};
use crate::validation::{self, NumberRule};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:lesson_id", get(get_lesson))
        .route("/:lesson_id/progress", post(update_progress))
        .route("/:lesson_id/feedback", get(list_feedback).post(submit_feedback))
}

#[derive(Debug, Deserialize)]
struct ProgressRequest {
    percent: Option<Value>,
    bookmarked: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct FeedbackRequest {
    content: Option<String>,
    rating: Option<Value>,
    visibility: Option<String>,
}

async fn get_lesson(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(lesson_id): Path<String>,
) -> Result<Json<Value>> {
    let (lesson, progress) = state.store.lesson_for_learner(&user, &lesson_id).await?;
    Ok(Json(json!({ "lesson": lesson, "progress": progress })))
}

async fn update_progress(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(lesson_id): Path<String>,
    Payload(req): Payload<ProgressRequest>,
) -> Result<Json<Value>> {
    let percent = validation::number(req.percent.as_ref(), "percent", NumberRule::range(0.0, 100.0))?;
    let bookmarked = match req.bookmarked {
        None | Some(Value::Null) => false,
        Some(value) => validation::boolean(Some(&value), "bookmarked")?,
    };

    let progress = state
        .store
        .set_lesson_progress(&user, &lesson_id, LessonState { percent, bookmarked })
        .await?;
    tracing::debug!("User {} at {}% of lesson {}", user.id, percent, lesson_id);

    Ok(with_message(json!({ "progress": progress }), "Progress updated"))
}

async fn list_feedback(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(lesson_id): Path<String>,
) -> Result<Json<Value>> {
    let feedback = state
        .store
        .lesson_feedback_for_student(&user, &lesson_id)
        .await?;
    Ok(Json(json!({ "feedback": feedback })))
}

async fn submit_feedback(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(lesson_id): Path<String>,
    Payload(req): Payload<FeedbackRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let content = validation::required_string(req.content.as_deref(), "content", 3)?;
    let rating = validation::integer(req.rating.as_ref(), "rating", Some(1), Some(5))?;
    let visibility = match validation::optional_string(req.visibility.as_deref()) {
        Some(value) => validation::one_of(Some(&value), "visibility", Visibility::ALL)?,
        None => Visibility::Private,
    };

    let feedback = state
        .store
        .submit_feedback(&user, &lesson_id, &content, rating, visibility)
        .await?;
    tracing::info!("Feedback {} left on lesson {} by {}", feedback.id, lesson_id, user.id);

    Ok((
        StatusCode::CREATED,
        with_message(json!({ "feedback": feedback }), "Feedback submitted"),
    ))
}
