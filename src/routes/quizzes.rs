//! Quiz retrieval and grading

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::Payload;
use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::validation;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:quiz_id", get(get_quiz))
        .route("/:quiz_id/submit", post(submit_quiz))
}

#[derive(Debug, Deserialize)]
struct SubmitRequest {
    answers: Option<Value>,
}

/// Question id to chosen option index
fn parse_answers(value: Option<Value>) -> Result<HashMap<String, i64>> {
    let answers: Map<String, Value> = match value {
        Some(Value::Object(map)) => map,
        None | Some(Value::Null) => Map::new(),
        Some(_) => return Err(AppError::bad_request("answers must be an object")),
    };

    answers
        .iter()
        .map(|(question_id, choice)| {
            let field = format!("answers.{}", question_id);
            let index = validation::integer(Some(choice), &field, Some(0), None)?;
            Ok((question_id.clone(), index))
        })
        .collect()
}

async fn get_quiz(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(quiz_id): Path<String>,
) -> Result<Json<Value>> {
    let quiz = state.store.quiz_for_learner(&user, &quiz_id).await?;
    Ok(Json(json!({ "quiz": quiz })))
}

async fn submit_quiz(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(quiz_id): Path<String>,
    Payload(req): Payload<SubmitRequest>,
) -> Result<Json<Value>> {
    let answers = parse_answers(req.answers)?;
    let summary = state.store.submit_quiz(&user, &quiz_id, &answers).await?;
    Ok(Json(json!({ "summary": summary })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answers() {
        let answers = parse_answers(Some(json!({ "q1": 0, "q2": "1" }))).unwrap();
        assert_eq!(answers.get("q1"), Some(&0));
        assert_eq!(answers.get("q2"), Some(&1));
    }

    #[test]
    fn test_parse_answers_missing_is_empty() {
        assert!(parse_answers(None).unwrap().is_empty());
    }

    #[test]
    fn test_parse_answers_rejects_negative_and_non_object() {
        let err = parse_answers(Some(json!({ "q1": -1 }))).unwrap_err();
        assert!(err.to_string().contains("answers.q1"));
        assert!(parse_answers(Some(json!([0, 1]))).is_err());
    }
}
