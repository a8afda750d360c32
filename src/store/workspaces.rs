//! Instructor workspaces: members and discussion threads

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{parse_column, parse_uuid, Store};
use crate::error::{AppError, Result};
use crate::views::{AuthorView, LessonRef, MemberView, ThreadView, WorkspaceView};

#[derive(Debug, Clone, Default)]
pub struct NewWorkspace {
    pub title: String,
    pub lesson_id: Option<String>,
    pub notes: Option<String>,
    /// Other members besides the creator
    pub member_ids: Vec<Uuid>,
}

impl Store {
    /// Workspaces the user belongs to, most recently active first
    pub async fn workspaces_for_member(&self, user_id: Uuid) -> Result<Vec<WorkspaceView>> {
        let ids: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT w.id FROM workspaces w
            JOIN workspace_members m ON m.workspace_id = w.id
            WHERE m.user_id = ?
            ORDER BY w.updated_at DESC
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut views = Vec::with_capacity(ids.len());
        for (id,) in ids {
            views.push(self.workspace_view(parse_uuid(&id)?).await?);
        }
        Ok(views)
    }

    pub async fn create_workspace(&self, creator: Uuid, new: NewWorkspace) -> Result<WorkspaceView> {
        let lesson_id = match new.lesson_id.as_deref() {
            Some(id) => Some(self.get_lesson(id).await?.id),
            None => None,
        };

        let id = Uuid::new_v4();
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO workspaces (id, title, lesson_id, created_by, notes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&new.title)
        .bind(&lesson_id)
        .bind(creator.to_string())
        .bind(new.notes.as_deref().unwrap_or_default())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for member in std::iter::once(creator).chain(new.member_ids) {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO workspace_members (workspace_id, user_id, added_at)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(id.to_string())
            .bind(member.to_string())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::info!("Workspace {} created by {}", id, creator);
        self.workspace_view(id).await
    }

    pub async fn add_workspace_member(
        &self,
        requestor: Uuid,
        workspace_id: Uuid,
        member_id: Uuid,
    ) -> Result<WorkspaceView> {
        self.ensure_workspace_member(workspace_id, requestor).await?;
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO workspace_members (workspace_id, user_id, added_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(workspace_id.to_string())
        .bind(member_id.to_string())
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            self.touch_workspace(workspace_id, now).await?;
        }
        self.workspace_view(workspace_id).await
    }

    /// Remove a member; the last member cannot be removed
    pub async fn remove_workspace_member(
        &self,
        requestor: Uuid,
        workspace_id: Uuid,
        member_id: Uuid,
    ) -> Result<WorkspaceView> {
        self.ensure_workspace_member(workspace_id, requestor).await?;

        // Delete first so the write lock is held while the remaining members are counted
        let mut tx = self.pool.begin().await?;
        let result =
            sqlx::query("DELETE FROM workspace_members WHERE workspace_id = ? AND user_id = ?")
                .bind(workspace_id.to_string())
                .bind(member_id.to_string())
                .execute(&mut *tx)
                .await?;

        let remaining: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM workspace_members WHERE workspace_id = ?")
                .bind(workspace_id.to_string())
                .fetch_one(&mut *tx)
                .await?;
        if remaining.0 == 0 {
            return Err(AppError::bad_request(
                "A workspace must keep at least one member",
            ));
        }

        if result.rows_affected() > 0 {
            sqlx::query("UPDATE workspaces SET updated_at = ? WHERE id = ?")
                .bind(Utc::now())
                .bind(workspace_id.to_string())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        self.workspace_view(workspace_id).await
    }

    pub async fn post_workspace_thread(
        &self,
        author: Uuid,
        workspace_id: Uuid,
        body: &str,
    ) -> Result<WorkspaceView> {
        self.ensure_workspace_member(workspace_id, author).await?;
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO workspace_threads (workspace_id, author_id, body, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(workspace_id.to_string())
        .bind(author.to_string())
        .bind(body)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.touch_workspace(workspace_id, now).await?;
        self.workspace_view(workspace_id).await
    }

    async fn ensure_workspace_member(&self, workspace_id: Uuid, user_id: Uuid) -> Result<()> {
        let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM workspaces WHERE id = ?")
            .bind(workspace_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Err(AppError::not_found("Workspace not found"));
        }

        let member: Option<(String,)> = sqlx::query_as(
            "SELECT user_id FROM workspace_members WHERE workspace_id = ? AND user_id = ?",
        )
        .bind(workspace_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        if member.is_none() {
            return Err(AppError::forbidden("You are not a member of this workspace"));
        }
        Ok(())
    }

    async fn touch_workspace(&self, workspace_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE workspaces SET updated_at = ? WHERE id = ?")
            .bind(at)
            .bind(workspace_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn workspace_view(&self, id: Uuid) -> Result<WorkspaceView> {
        let row = sqlx::query_as::<_, WorkspaceRow>(
            r#"
            SELECT w.id, w.title, w.notes, w.created_at, w.updated_at,
                   l.id AS lesson_id, l.title AS lesson_title
            FROM workspaces w
            LEFT JOIN lessons l ON l.id = w.lesson_id
            WHERE w.id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("Workspace not found"))?;

        let members = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT u.id, u.name, u.email, u.role
            FROM workspace_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.workspace_id = ?
            ORDER BY m.added_at, u.name
            "#,
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let threads = sqlx::query_as::<_, ThreadRow>(
            r#"
            SELECT t.body, t.created_at, u.id AS author_id, u.name AS author_name,
                   u.email AS author_email
            FROM workspace_threads t
            LEFT JOIN users u ON u.id = t.author_id
            WHERE t.workspace_id = ?
            ORDER BY t.created_at DESC, t.id DESC
            "#,
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(WorkspaceView {
            id: parse_uuid(&row.id)?,
            title: row.title,
            lesson: match (row.lesson_id, row.lesson_title) {
                (Some(id), Some(title)) => Some(LessonRef { id, title }),
                _ => None,
            },
            notes: row.notes,
            members: members
                .into_iter()
                .map(MemberRow::into_view)
                .collect::<Result<_>>()?,
            threads: threads
                .into_iter()
                .map(ThreadRow::into_view)
                .collect::<Result<_>>()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct WorkspaceRow {
    id: String,
    title: String,
    notes: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    lesson_id: Option<String>,
    lesson_title: Option<String>,
}

#[derive(sqlx::FromRow)]
struct MemberRow {
    id: String,
    name: String,
    email: String,
    role: String,
}

impl MemberRow {
    fn into_view(self) -> Result<MemberView> {
        Ok(MemberView {
            id: parse_uuid(&self.id)?,
            name: self.name,
            email: self.email,
            role: parse_column(&self.role)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ThreadRow {
    body: String,
    created_at: DateTime<Utc>,
    author_id: Option<String>,
    author_name: Option<String>,
    author_email: Option<String>,
}

impl ThreadRow {
    fn into_view(self) -> Result<ThreadView> {
        let author = match (self.author_id, self.author_name, self.author_email) {
            (Some(id), Some(name), Some(email)) => Some(AuthorView {
                id: parse_uuid(&id)?,
                name,
                email,
            }),
            _ => None,
        };
        Ok(ThreadView {
            body: self.body,
            created_at: self.created_at,
            author,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::models::Role;

    #[tokio::test]
    async fn test_create_workspace_includes_creator() {
        let store = setup_test_db().await;
        let creator = create_user(&store, "i@example.com", Role::Instructor).await;
        let other = create_user(&store, "o@example.com", Role::Instructor).await;

        let view = store
            .create_workspace(
                creator.id,
                NewWorkspace {
                    title: "Rust track".to_string(),
                    member_ids: vec![other.id, creator.id],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(view.members.len(), 2);
        assert!(view.lesson.is_none());
        assert_eq!(view.notes, "");

        assert_eq!(store.workspaces_for_member(other.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_workspace_unknown_lesson() {
        let store = setup_test_db().await;
        let creator = create_user(&store, "i@example.com", Role::Instructor).await;
        let err = store
            .create_workspace(
                creator.id,
                NewWorkspace {
                    title: "Rust track".to_string(),
                    lesson_id: Some("missing".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_membership_checks() {
        let store = setup_test_db().await;
        let creator = create_user(&store, "i@example.com", Role::Instructor).await;
        let outsider = create_user(&store, "x@example.com", Role::Instructor).await;
        let view = store
            .create_workspace(
                creator.id,
                NewWorkspace {
                    title: "Private".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = store
            .post_workspace_thread(outsider.id, view.id, "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = store
            .add_workspace_member(creator.id, Uuid::new_v4(), outsider.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_last_member_cannot_be_removed() {
        let store = setup_test_db().await;
        let creator = create_user(&store, "i@example.com", Role::Instructor).await;
        let other = create_user(&store, "o@example.com", Role::Instructor).await;
        let view = store
            .create_workspace(
                creator.id,
                NewWorkspace {
                    title: "Pair".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = store
            .remove_workspace_member(creator.id, view.id, creator.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest { .. }));

        let view = store
            .add_workspace_member(creator.id, view.id, other.id)
            .await
            .unwrap();
        assert_eq!(view.members.len(), 2);

        let view = store
            .remove_workspace_member(creator.id, view.id, creator.id)
            .await
            .unwrap();
        assert_eq!(view.members.len(), 1);
        assert_eq!(view.members[0].id, other.id);
    }

    #[tokio::test]
    async fn test_concurrent_removals_keep_one_member() {
        let store = setup_test_db().await;
        let creator = create_user(&store, "i@example.com", Role::Instructor).await;
        let other = create_user(&store, "o@example.com", Role::Instructor).await;
        let view = store
            .create_workspace(
                creator.id,
                NewWorkspace {
                    title: "Pair".to_string(),
                    member_ids: vec![other.id],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(view.members.len(), 2);

        let (first, second) = tokio::join!(
            store.remove_workspace_member(creator.id, view.id, creator.id),
            store.remove_workspace_member(other.id, view.id, other.id),
        );
        assert!(first.is_ok() ^ second.is_ok());

        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM workspace_members WHERE workspace_id = ?")
                .bind(view.id.to_string())
                .fetch_one(store.pool())
                .await
                .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_threads_newest_first() {
        let store = setup_test_db().await;
        let creator = create_user(&store, "i@example.com", Role::Instructor).await;
        let view = store
            .create_workspace(
                creator.id,
                NewWorkspace {
                    title: "Notes".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        store
            .post_workspace_thread(creator.id, view.id, "first")
            .await
            .unwrap();
        let view = store
            .post_workspace_thread(creator.id, view.id, "second")
            .await
            .unwrap();
        assert_eq!(view.threads[0].body, "second");
        assert_eq!(view.threads[1].body, "first");
        assert_eq!(
            view.threads[0].author.as_ref().unwrap().email,
            "i@example.com"
        );
    }
}
