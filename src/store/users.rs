//! User accounts

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{parse_column, parse_uuid, Store};
use crate::error::{AppError, Result};
use crate::models::{Role, User, UserStatus};

impl Store {
    /// Create an account; the email is stored lower-cased and must be unique
    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let email = email.to_lowercase();
        let status = UserStatus::Active;

        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(name)
        .bind(&email)
        .bind(password_hash)
        .bind(role.as_str())
        .bind(status.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict("Account already exists for this email".to_string())
            }
            other => AppError::Database(other),
        })?;

        Ok(User {
            id,
            name: name.to_string(),
            email,
            role,
            status,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, email, password_hash, role, status, avatar_url, created_at, updated_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User> {
        self.find_user(id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.find_credentials(email).await?.map(|(user, _)| user))
    }

    /// The user and their password hash, for sign-in
    pub async fn find_credentials(&self, email: &str) -> Result<Option<(User, String)>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, email, password_hash, role, status, avatar_url, created_at, updated_at
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email.to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let hash = row.password_hash.clone();
                Ok(Some((row.try_into()?, hash)))
            }
            None => Ok(None),
        }
    }

    /// All accounts, newest first
    pub async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, email, password_hash, role, status, avatar_url, created_at, updated_at
            FROM users
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    pub async fn update_user_status(&self, id: Uuid, status: UserStatus) -> Result<User> {
        let result = sqlx::query(
            r#"
            UPDATE users SET status = ?, updated_at = ? WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("User not found"));
        }
        self.get_user(id).await
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    status: String,
    avatar_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: parse_uuid(&row.id)?,
            name: row.name,
            email: row.email,
            role: parse_column(&row.role)?,
            status: parse_column(&row.status)?,
            avatar_url: row.avatar_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
