//! Sign-up, sign-in and session endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::Payload;
use crate::auth::{hash_password, verify_password, AuthUser, MaybeAuthUser};
use crate::error::{AppError, Result};
use crate::models::{Role, User, UserStatus};
use crate::validation;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/signup", post(signup))
        .route("/signin", post(signin))
        .route("/signout", post(signout))
        .route("/me", get(me))
}

#[derive(Debug, Deserialize)]
struct SignupRequest {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SigninRequest {
    email: Option<String>,
    password: Option<String>,
}

fn session(state: &AppState, user: User) -> Result<Value> {
    let token = state.jwt.create_token(&user)?;
    Ok(json!({ "user": user, "token": token }))
}

async fn signup(
    State(state): State<Arc<AppState>>,
    Payload(req): Payload<SignupRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let name = validation::required_string(req.name.as_deref(), "name", 2)?;
    let email = validation::email(req.email.as_deref(), "email")?;
    let password = validation::password(req.password.as_deref(), 6)?;

    if state.store.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict(
            "Account already exists for this email".to_string(),
        ));
    }

    let hash = hash_password(password, state.bcrypt_cost).await?;
    let user = state
        .store
        .create_user(&name, &email, &hash, Role::Student)
        .await?;
    tracing::info!("New account {} ({})", user.id, user.email);

    Ok((StatusCode::CREATED, Json(session(&state, user)?)))
}

async fn signin(
    State(state): State<Arc<AppState>>,
    Payload(req): Payload<SigninRequest>,
) -> Result<Json<Value>> {
    let email = validation::email(req.email.as_deref(), "email")?;
    let password = validation::password(req.password.as_deref(), 1)?;
    let invalid = || AppError::Unauthorized("Invalid credentials".to_string());

    let (user, hash) = state
        .store
        .find_credentials(&email)
        .await?
        .ok_or_else(invalid)?;
    if !verify_password(password, hash).await? {
        return Err(invalid());
    }
    if user.status == UserStatus::Suspended {
        return Err(AppError::forbidden("Account suspended"));
    }

    tracing::debug!("User {} signed in", user.id);
    Ok(Json(session(&state, user)?))
}

async fn signout(MaybeAuthUser(user): MaybeAuthUser) -> Json<Value> {
    if let Some(user) = user {
        tracing::debug!("User {} signed out", user.id);
    }
    Json(json!({ "message": "Signed out" }))
}

async fn me(AuthUser(user): AuthUser) -> Json<Value> {
    Json(json!({ "user": user }))
}
