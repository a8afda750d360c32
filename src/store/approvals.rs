//! Approval requests and their append-only history

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::catalog::{set_lesson_status, set_quiz_status};
use super::{parse_column, parse_uuid, Store};
use crate::approval::next_approval_id;
use crate::error::{AppError, Result};
use crate::models::{ApprovalKind, ApprovalRequest, Decision, HistoryEntry};
use crate::progress::format_relative_time;
use crate::views::{AdminApprovalView, ApprovalDetails};

impl Store {
    pub async fn find_approval(&self, id: i64) -> Result<Option<ApprovalRequest>> {
        let mut conn = self.pool.acquire().await?;
        fetch_approval(&mut conn, id).await
    }

    /// Requests submitted by `user_id`, newest first
    pub async fn approvals_by_submitter(&self, user_id: Uuid) -> Result<Vec<ApprovalRequest>> {
        let rows = sqlx::query_as::<_, ApprovalRow>(
            r#"
            SELECT id, kind, target_id, submitted_by, status, notes, created_at, updated_at
            FROM approval_requests
            WHERE submitted_by = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut conn = self.pool.acquire().await?;
        let mut requests = Vec::with_capacity(rows.len());
        for row in rows {
            let history = fetch_history(&mut conn, row.id).await?;
            requests.push(row.into_request(history)?);
        }
        Ok(requests)
    }

    /// The admin queue: pending requests, newest first
    pub async fn pending_approvals(&self) -> Result<Vec<AdminApprovalView>> {
        let rows = sqlx::query_as::<_, ApprovalRow>(
            r#"
            SELECT id, kind, target_id, submitted_by, status, notes, created_at, updated_at
            FROM approval_requests
            WHERE status = 'pending'
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let now = Utc::now();
        let mut views = Vec::with_capacity(rows.len());
        for row in rows {
            let request = row.into_request(Vec::new())?;
            views.push(self.admin_view(&request, now).await?);
        }
        Ok(views)
    }

    /// Approve or reject a pending request and apply the verdict to its target
    pub async fn decide_approval(
        &self,
        id: i64,
        decision: Decision,
        admin_id: Uuid,
        note: Option<String>,
    ) -> Result<AdminApprovalView> {
        let mut tx = self.pool.begin().await?;

        let mut request = fetch_approval(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::not_found("Approval request not found"))?;
        let now = Utc::now();
        let entry = request.decide(decision, admin_id, note, now)?;

        sqlx::query("UPDATE approval_requests SET status = ?, updated_at = ? WHERE id = ?")
            .bind(request.status.as_str())
            .bind(now)
            .bind(request.id)
            .execute(&mut *tx)
            .await?;
        insert_history(&mut tx, request.id, &entry).await?;

        match request.kind {
            ApprovalKind::Lesson => {
                set_lesson_status(&mut tx, &request.target_id, decision.content_status(), now)
                    .await?
            }
            ApprovalKind::Quiz => {
                set_quiz_status(&mut tx, &request.target_id, decision.content_status(), now)
                    .await?
            }
            ApprovalKind::Category => {
                sqlx::query(
                    "UPDATE category_suggestions SET status = ?, updated_at = ? WHERE id = ?",
                )
                .bind(decision.status().as_str())
                .bind(now)
                .bind(&request.target_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        tracing::info!(
            "Approval {} for {} {} marked {} by {}",
            request.id,
            request.kind,
            request.target_id,
            decision,
            admin_id
        );

        self.admin_view(&request, now).await
    }

    async fn admin_view(
        &self,
        request: &ApprovalRequest,
        now: DateTime<Utc>,
    ) -> Result<AdminApprovalView> {
        let author = self
            .find_user(request.submitted_by)
            .await?
            .map(|u| u.name)
            .unwrap_or_else(|| "Contributor".to_string());

        Ok(AdminApprovalView {
            id: request.id,
            author,
            kind: request.kind.label().to_string(),
            submitted: format_relative_time(request.created_at, now),
            status: request.status,
            details: self.approval_details(request).await?,
        })
    }

    /// Summary of the content under review; `None` when the target is gone
    async fn approval_details(&self, request: &ApprovalRequest) -> Result<Option<ApprovalDetails>> {
        let details = match request.kind {
            ApprovalKind::Lesson => match self.find_lesson(&request.target_id).await? {
                Some(lesson) => Some(ApprovalDetails::Lesson {
                    course: self.lesson_course_title(&lesson).await?,
                    title: lesson.title,
                    status: lesson.status,
                    version: lesson.version,
                }),
                None => None,
            },
            ApprovalKind::Quiz => match self.find_quiz(&request.target_id).await? {
                Some(quiz) => Some(ApprovalDetails::Quiz {
                    course: self.quiz_course_title(&quiz).await?,
                    title: quiz.title,
                    questions: quiz.questions.len(),
                }),
                None => None,
            },
            ApprovalKind::Category => {
                let row: Option<(String, String)> = sqlx::query_as(
                    "SELECT name, description FROM category_suggestions WHERE id = ?",
                )
                .bind(&request.target_id)
                .fetch_optional(&self.pool)
                .await?;
                row.map(|(name, description)| ApprovalDetails::Category { name, description })
            }
        };
        Ok(details)
    }
}

/// Open a new pending request with its `submitted` entry
pub(super) async fn open_approval(
    conn: &mut SqliteConnection,
    kind: ApprovalKind,
    target_id: &str,
    submitted_by: Uuid,
    note: Option<String>,
) -> Result<ApprovalRequest> {
    let (max,): (Option<i64>,) = sqlx::query_as("SELECT MAX(id) FROM approval_requests")
        .fetch_one(&mut *conn)
        .await?;
    let request = ApprovalRequest::submit(
        next_approval_id(max),
        kind,
        target_id,
        submitted_by,
        note,
        Utc::now(),
    );

    sqlx::query(
        r#"
        INSERT INTO approval_requests (id, kind, target_id, submitted_by, status, notes, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(request.id)
    .bind(request.kind.as_str())
    .bind(&request.target_id)
    .bind(request.submitted_by.to_string())
    .bind(request.status.as_str())
    .bind(&request.notes)
    .bind(request.created_at)
    .bind(request.updated_at)
    .execute(&mut *conn)
    .await?;

    for entry in &request.history {
        insert_history(conn, request.id, entry).await?;
    }

    Ok(request)
}

/// Attach a revision to the content's current request while it is still pending,
/// otherwise open a fresh one. Returns the id of the request now tracking the content.
pub(super) async fn submit_revision(
    conn: &mut SqliteConnection,
    current: Option<i64>,
    kind: ApprovalKind,
    target_id: &str,
    submitted_by: Uuid,
    note: Option<String>,
) -> Result<i64> {
    if let Some(id) = current {
        if let Some(mut request) = fetch_approval(conn, id).await? {
            if request.is_pending() {
                let entry = request.record_update(submitted_by, note, Utc::now())?;
                sqlx::query("UPDATE approval_requests SET updated_at = ? WHERE id = ?")
                    .bind(request.updated_at)
                    .bind(request.id)
                    .execute(&mut *conn)
                    .await?;
                insert_history(conn, request.id, &entry).await?;
                return Ok(request.id);
            }
        }
    }

    let note = note.or_else(|| Some("Updated draft".to_string()));
    let request = open_approval(conn, kind, target_id, submitted_by, note).await?;
    Ok(request.id)
}

async fn fetch_approval(conn: &mut SqliteConnection, id: i64) -> Result<Option<ApprovalRequest>> {
    let row = sqlx::query_as::<_, ApprovalRow>(
        r#"
        SELECT id, kind, target_id, submitted_by, status, notes, created_at, updated_at
        FROM approval_requests
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => {
            let history = fetch_history(conn, row.id).await?;
            Ok(Some(row.into_request(history)?))
        }
        None => Ok(None),
    }
}

async fn fetch_history(conn: &mut SqliteConnection, approval_id: i64) -> Result<Vec<HistoryEntry>> {
    let rows = sqlx::query_as::<_, HistoryRow>(
        r#"
        SELECT action, by_user, note, at FROM approval_history
        WHERE approval_id = ?
        ORDER BY id
        "#,
    )
    .bind(approval_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(|r| r.try_into()).collect()
}

async fn insert_history(
    conn: &mut SqliteConnection,
    approval_id: i64,
    entry: &HistoryEntry,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO approval_history (approval_id, action, by_user, note, at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(approval_id)
    .bind(entry.action.as_str())
    .bind(entry.by.map(|id| id.to_string()))
    .bind(&entry.note)
    .bind(entry.at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[derive(sqlx::FromRow)]
struct ApprovalRow {
    id: i64,
    kind: String,
    target_id: String,
    submitted_by: String,
    status: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ApprovalRow {
    fn into_request(self, history: Vec<HistoryEntry>) -> Result<ApprovalRequest> {
        Ok(ApprovalRequest {
            id: self.id,
            kind: parse_column(&self.kind)?,
            target_id: self.target_id,
            submitted_by: parse_uuid(&self.submitted_by)?,
            status: parse_column(&self.status)?,
            notes: self.notes,
            history,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    action: String,
    by_user: Option<String>,
    note: Option<String>,
    at: DateTime<Utc>,
}

impl TryFrom<HistoryRow> for HistoryEntry {
    type Error = AppError;

    fn try_from(row: HistoryRow) -> Result<Self> {
        Ok(HistoryEntry {
            action: parse_column(&row.action)?,
            by: row.by_user.as_deref().map(parse_uuid).transpose()?,
            note: row.note,
            at: row.at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::catalog::fixtures;
    use super::super::test_support::*;
    use super::*;
    use crate::approval::FIRST_APPROVAL_ID;
    use crate::models::{ApprovalStatus, ContentStatus, HistoryAction, Role};

    #[tokio::test]
    async fn test_open_approval_assigns_sequential_ids() {
        let store = setup_test_db().await;
        let user = create_user(&store, "i@example.com", Role::Instructor).await;
        let mut conn = store.pool().acquire().await.unwrap();

        let first = open_approval(&mut conn, ApprovalKind::Lesson, "l1", user.id, None)
            .await
            .unwrap();
        let second = open_approval(&mut conn, ApprovalKind::Quiz, "q1", user.id, None)
            .await
            .unwrap();
        assert_eq!(first.id, FIRST_APPROVAL_ID);
        assert_eq!(second.id, FIRST_APPROVAL_ID + 1);
        drop(conn);

        let stored = store.find_approval(first.id).await.unwrap().unwrap();
        assert_eq!(stored.history.len(), 1);
        assert_eq!(stored.history[0].action, HistoryAction::Submitted);
    }

    #[tokio::test]
    async fn test_submit_revision_appends_while_pending() {
        let store = setup_test_db().await;
        let user = create_user(&store, "i@example.com", Role::Instructor).await;
        let mut conn = store.pool().acquire().await.unwrap();

        let request = open_approval(&mut conn, ApprovalKind::Lesson, "l1", user.id, None)
            .await
            .unwrap();
        let id = submit_revision(
            &mut conn,
            Some(request.id),
            ApprovalKind::Lesson,
            "l1",
            user.id,
            Some("Fixed typos".to_string()),
        )
        .await
        .unwrap();
        assert_eq!(id, request.id);
        drop(conn);

        let stored = store.find_approval(id).await.unwrap().unwrap();
        assert_eq!(stored.history.len(), 2);
        assert_eq!(stored.history[1].action, HistoryAction::Updated);
        assert_eq!(stored.history[1].note.as_deref(), Some("Fixed typos"));
    }

    #[tokio::test]
    async fn test_decision_cascades_and_is_final() {
        let store = setup_test_db().await;
        let instructor = create_user(&store, "i@example.com", Role::Instructor).await;
        let admin = create_user(&store, "a@example.com", Role::Admin).await;

        let mut lesson = fixtures::lesson("l1", None, instructor.id, ContentStatus::Pending);
        let mut conn = store.pool().acquire().await.unwrap();
        let request = open_approval(&mut conn, ApprovalKind::Lesson, "l1", instructor.id, None)
            .await
            .unwrap();
        drop(conn);
        lesson.approval_id = Some(request.id);
        store.insert_lesson(&lesson).await.unwrap();

        let queue = store.pending_approvals().await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].kind, "Lesson");
        assert_eq!(queue[0].author, "Test User");
        assert!(matches!(
            queue[0].details,
            Some(ApprovalDetails::Lesson { version: 1, .. })
        ));

        let view = store
            .decide_approval(request.id, Decision::Approved, admin.id, None)
            .await
            .unwrap();
        assert_eq!(view.status, ApprovalStatus::Approved);
        assert_eq!(
            store.get_lesson("l1").await.unwrap().status,
            ContentStatus::Published
        );
        assert!(store.pending_approvals().await.unwrap().is_empty());

        let stored = store.find_approval(request.id).await.unwrap().unwrap();
        assert_eq!(stored.history.len(), 2);
        assert_eq!(stored.history[1].note.as_deref(), Some("Marked as approved"));
        assert_eq!(stored.history[1].by, Some(admin.id));

        let err = store
            .decide_approval(request.id, Decision::Rejected, admin.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(
            store.find_approval(request.id).await.unwrap().unwrap().history.len(),
            2
        );
    }

    #[tokio::test]
    async fn test_decide_unknown_request() {
        let store = setup_test_db().await;
        let admin = create_user(&store, "a@example.com", Role::Admin).await;
        let err = store
            .decide_approval(4242, Decision::Approved, admin.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
