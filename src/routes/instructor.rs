//! Instructor studio: drafts, feedback, workspaces and category suggestions
//!
//! Every route here requires an instructor or admin session.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{with_message, Payload};
use crate::auth::InstructorUser;
use crate::error::{AppError, Result};
use crate::store::{LessonDraft, LessonPatch, NewWorkspace, QuizDraft, QuizPatch};
use crate::validation::{self, BlockInput, ChallengeInput, QuestionInput};
use crate::views::Studio;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/studio", get(studio))
        .route("/lessons", post(create_lesson))
        .route("/lessons/:lesson_id", put(update_lesson))
        .route("/lessons/:lesson_id/feedback", get(lesson_feedback))
        .route("/quizzes", post(create_quiz))
        .route("/quizzes/:quiz_id", put(update_quiz))
        .route("/workspaces", get(list_workspaces).post(create_workspace))
        .route("/workspaces/:workspace_id/collaborators", post(add_collaborator))
        .route(
            "/workspaces/:workspace_id/collaborators/:member_id",
            delete(remove_collaborator),
        )
        .route("/workspaces/:workspace_id/threads", post(post_thread))
        .route("/categories/suggestions", post(suggest_category))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LessonRequest {
    title: Option<String>,
    course_id: Option<String>,
    level: Option<String>,
    duration: Option<String>,
    notes: Option<String>,
    blocks: Option<Vec<BlockInput>>,
    challenge: Option<ChallengeInput>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuizRequest {
    title: Option<String>,
    course_id: Option<String>,
    description: Option<String>,
    notes: Option<String>,
    questions: Option<Vec<QuestionInput>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkspaceRequest {
    title: Option<String>,
    lesson_id: Option<String>,
    notes: Option<String>,
    #[serde(default)]
    collaborators: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CollaboratorRequest {
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ThreadRequest {
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SuggestionRequest {
    name: Option<String>,
    description: Option<String>,
}

fn workspace_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::not_found("Workspace not found"))
}

async fn studio(
    State(state): State<Arc<AppState>>,
    instructor: InstructorUser,
) -> Result<Json<Studio>> {
    Ok(Json(state.store.instructor_studio(instructor.id()).await?))
}

async fn lesson_feedback(
    State(state): State<Arc<AppState>>,
    instructor: InstructorUser,
    Path(lesson_id): Path<String>,
) -> Result<Json<Value>> {
    let feedback = state
        .store
        .lesson_feedback_for_instructor(instructor.id(), &lesson_id)
        .await?;
    Ok(Json(json!({ "feedback": feedback })))
}

async fn create_lesson(
    State(state): State<Arc<AppState>>,
    instructor: InstructorUser,
    Payload(req): Payload<LessonRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let draft = LessonDraft {
        title: validation::required_string(req.title.as_deref(), "title", 3)?,
        course_id: validation::optional_string(req.course_id.as_deref()),
        level: validation::optional_string(req.level.as_deref()),
        duration: validation::optional_string(req.duration.as_deref()),
        notes: validation::optional_string(req.notes.as_deref()),
        blocks: validation::sanitize_blocks(req.blocks),
        challenge: validation::sanitize_challenge(req.challenge),
    };

    let lesson = state
        .store
        .create_lesson_draft(instructor.id(), draft)
        .await?;

    Ok((
        StatusCode::CREATED,
        with_message(json!({ "lesson": lesson }), "Lesson draft submitted for review"),
    ))
}

async fn update_lesson(
    State(state): State<Arc<AppState>>,
    instructor: InstructorUser,
    Path(lesson_id): Path<String>,
    Payload(req): Payload<LessonRequest>,
) -> Result<Json<Value>> {
    let patch = LessonPatch {
        title: validation::optional_string(req.title.as_deref()),
        course_id: validation::optional_string(req.course_id.as_deref()),
        level: validation::optional_string(req.level.as_deref()),
        duration: validation::optional_string(req.duration.as_deref()),
        notes: validation::optional_string(req.notes.as_deref()),
        blocks: req.blocks.map(|blocks| validation::sanitize_blocks(Some(blocks))),
        challenge: validation::sanitize_challenge(req.challenge),
    };

    let lesson = state
        .store
        .update_lesson_draft(instructor.id(), &lesson_id, patch)
        .await?;

    Ok(with_message(json!({ "lesson": lesson }), "Lesson draft updated"))
}

async fn create_quiz(
    State(state): State<Arc<AppState>>,
    instructor: InstructorUser,
    Payload(req): Payload<QuizRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let draft = QuizDraft {
        title: validation::required_string(req.title.as_deref(), "title", 3)?,
        course_id: validation::optional_string(req.course_id.as_deref()),
        description: validation::optional_string(req.description.as_deref()).unwrap_or_default(),
        notes: validation::optional_string(req.notes.as_deref()),
        questions: validation::sanitize_questions(req.questions)?,
    };

    let quiz = state.store.create_quiz_draft(instructor.id(), draft).await?;

    Ok((
        StatusCode::CREATED,
        with_message(json!({ "quiz": quiz }), "Quiz draft submitted for review"),
    ))
}

async fn update_quiz(
    State(state): State<Arc<AppState>>,
    instructor: InstructorUser,
    Path(quiz_id): Path<String>,
    Payload(req): Payload<QuizRequest>,
) -> Result<Json<Value>> {
    let questions = match req.questions {
        Some(questions) => Some(validation::sanitize_questions(Some(questions))?),
        None => None,
    };
    let patch = QuizPatch {
        title: validation::optional_string(req.title.as_deref()),
        course_id: validation::optional_string(req.course_id.as_deref()),
        description: req.description.map(|d| d.trim().to_string()),
        notes: validation::optional_string(req.notes.as_deref()),
        questions,
    };

    let quiz = state
        .store
        .update_quiz_draft(instructor.id(), &quiz_id, patch)
        .await?;

    Ok(with_message(json!({ "quiz": quiz }), "Quiz draft updated"))
}

async fn list_workspaces(
    State(state): State<Arc<AppState>>,
    instructor: InstructorUser,
) -> Result<Json<Value>> {
    let workspaces = state.store.workspaces_for_member(instructor.id()).await?;
    Ok(Json(json!({ "workspaces": workspaces })))
}

async fn create_workspace(
    State(state): State<Arc<AppState>>,
    instructor: InstructorUser,
    Payload(req): Payload<WorkspaceRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let title = validation::required_string(req.title.as_deref(), "title", 3)?;

    let mut member_ids = Vec::with_capacity(req.collaborators.len());
    for entry in &req.collaborators {
        let email = validation::email(Some(entry), "collaborators[]")?;
        let user = state
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or_else(|| AppError::bad_request(format!("No account found for {}", email)))?;
        member_ids.push(user.id);
    }

    let workspace = state
        .store
        .create_workspace(
            instructor.id(),
            NewWorkspace {
                title,
                lesson_id: validation::optional_string(req.lesson_id.as_deref()),
                notes: validation::optional_string(req.notes.as_deref()),
                member_ids,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        with_message(json!({ "workspace": workspace }), "Workspace created"),
    ))
}

async fn add_collaborator(
    State(state): State<Arc<AppState>>,
    instructor: InstructorUser,
    Path(workspace): Path<String>,
    Payload(req): Payload<CollaboratorRequest>,
) -> Result<Json<Value>> {
    let workspace_id = workspace_id(&workspace)?;
    let email = validation::email(req.email.as_deref(), "email")?;
    let collaborator = state
        .store
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| AppError::bad_request("Collaborator not found"))?;

    let workspace = state
        .store
        .add_workspace_member(instructor.id(), workspace_id, collaborator.id)
        .await?;
    let name = if collaborator.name.is_empty() {
        email
    } else {
        collaborator.name
    };

    Ok(with_message(
        json!({ "workspace": workspace }),
        format!("{} added", name),
    ))
}

async fn remove_collaborator(
    State(state): State<Arc<AppState>>,
    instructor: InstructorUser,
    Path((workspace, member)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let workspace_id = workspace_id(&workspace)?;
    let member_id = Uuid::parse_str(&member)
        .map_err(|_| AppError::bad_request("memberId must be a valid id"))?;

    let workspace = state
        .store
        .remove_workspace_member(instructor.id(), workspace_id, member_id)
        .await?;

    Ok(with_message(
        json!({ "workspace": workspace }),
        "Collaborator removed",
    ))
}

async fn post_thread(
    State(state): State<Arc<AppState>>,
    instructor: InstructorUser,
    Path(workspace): Path<String>,
    Payload(req): Payload<ThreadRequest>,
) -> Result<Json<Value>> {
    let workspace_id = workspace_id(&workspace)?;
    let body = validation::required_string(req.body.as_deref(), "body", 2)?;

    let workspace = state
        .store
        .post_workspace_thread(instructor.id(), workspace_id, &body)
        .await?;

    Ok(with_message(json!({ "workspace": workspace }), "Note posted"))
}

async fn suggest_category(
    State(state): State<Arc<AppState>>,
    instructor: InstructorUser,
    Payload(req): Payload<SuggestionRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let name = validation::required_string(req.name.as_deref(), "name", 3)?;
    let description = validation::required_string(req.description.as_deref(), "description", 10)?;

    let suggestion = state
        .store
        .create_category_suggestion(instructor.id(), &name, &description)
        .await?;

    Ok((
        StatusCode::CREATED,
        with_message(
            json!({ "suggestion": suggestion }),
            "Category suggestion submitted for review",
        ),
    ))
}
