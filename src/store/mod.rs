//! Database store for users, catalog content, learner progress and moderation

mod approvals;
mod authoring;
mod catalog;
mod learner;
mod lessons;
mod quizzes;
mod users;
mod workspaces;

pub use authoring::{LessonDraft, LessonPatch, QuizDraft, QuizPatch};
pub use workspaces::NewWorkspace;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Database store
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Delete every row, children before parents
    pub async fn reset(&self) -> Result<()> {
        const TABLES: &[&str] = &[
            "approval_history",
            "approval_requests",
            "category_suggestions",
            "workspace_threads",
            "workspace_members",
            "workspaces",
            "feedback",
            "activities",
            "started_recommendations",
            "lesson_states",
            "completed_courses",
            "completed_units",
            "submissions",
            "recommendations",
            "topics",
            "quizzes",
            "lessons",
            "courses",
            "users",
        ];

        let mut tx = self.pool.begin().await?;
        for table in TABLES {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

// Column helpers shared by the row conversions

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn from_json<T: DeserializeOwned>(raw: &str, column: &str) -> Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| AppError::Internal(format!("Invalid {} column: {}", column, e)))
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| AppError::Internal(format!("Invalid UUID: {}", e)))
}

fn parse_column<T>(raw: &str) -> Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    raw.parse().map_err(AppError::Internal)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::models::{Course, CourseStatus, Role, User};
    use chrono::Utc;
    use sqlx::sqlite::SqlitePoolOptions;

    pub async fn setup_test_db() -> Store {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        Store::new(pool)
    }

    pub async fn create_user(store: &Store, email: &str, role: Role) -> User {
        store
            .create_user("Test User", email, "not-a-real-hash", role)
            .await
            .expect("Failed to create user")
    }

    pub async fn create_course(store: &Store, id: &str, title: &str) -> Course {
        let now = Utc::now();
        let course = Course {
            id: id.to_string(),
            title: title.to_string(),
            description: format!("About {}", title),
            level: "Beginner".to_string(),
            duration_minutes: 120,
            topics: vec![],
            status: CourseStatus::Published,
            created_at: now,
            updated_at: now,
        };
        store.insert_course(&course).await.expect("Failed to create course");
        course
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::models::Role;

    #[tokio::test]
    async fn test_store_new() {
        let store = setup_test_db().await;
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count.0, 0);
    }

    #[tokio::test]
    async fn test_reset_clears_tables() {
        let store = setup_test_db().await;
        create_user(&store, "a@example.com", Role::Student).await;
        create_course(&store, "course-a", "A").await;

        store.reset().await.unwrap();

        assert!(store.list_users().await.unwrap().is_empty());
        assert!(store.find_course("course-a").await.unwrap().is_none());
    }

    #[test]
    fn test_from_json_reports_column() {
        let err = from_json::<Vec<String>>("not json", "blocks").unwrap_err();
        assert!(err.to_string().contains("Invalid blocks column"));
    }

    #[test]
    fn test_parse_uuid_invalid() {
        assert!(matches!(parse_uuid("nope"), Err(AppError::Internal(_))));
    }
}
