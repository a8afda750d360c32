//! Lessons as learners read them, reading progress and lesson feedback

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{parse_column, parse_uuid, Store};
use crate::error::{AppError, Result};
use crate::models::{ContentStatus, Feedback, Lesson, LessonState, Role, UnitType, User, Visibility};
use crate::views::{FeedbackView, LessonView, StudentRef};

/// Unpublished lessons are only visible to their authors and admins
fn can_view_lesson(lesson: &Lesson, viewer: &User) -> bool {
    lesson.status == ContentStatus::Published
        || viewer.role == Role::Admin
        || lesson.is_collaborator(viewer.id)
}

impl Store {
    async fn visible_lesson(&self, viewer: &User, lesson_id: &str) -> Result<Lesson> {
        match self.find_lesson(lesson_id).await? {
            Some(lesson) if can_view_lesson(&lesson, viewer) => Ok(lesson),
            _ => Err(AppError::not_found("Lesson not found")),
        }
    }

    /// The lesson and the viewer's reading state for it
    pub async fn lesson_for_learner(
        &self,
        viewer: &User,
        lesson_id: &str,
    ) -> Result<(LessonView, LessonState)> {
        let lesson = self.visible_lesson(viewer, lesson_id).await?;
        let course = self.lesson_course_title(&lesson).await?;
        let state = self.lesson_state(viewer.id, &lesson.id).await?;

        let view = LessonView {
            id: lesson.id,
            title: lesson.title,
            course,
            breadcrumb: lesson.breadcrumb,
            duration: lesson.duration,
            level: lesson.level,
            order: lesson.order,
            blocks: lesson.blocks,
            challenge: lesson.challenge,
        };
        Ok((view, state))
    }

    /// Save reading progress. Reaching 100% also completes the lesson in its course;
    /// a failure there does not fail the update.
    pub async fn set_lesson_progress(
        &self,
        viewer: &User,
        lesson_id: &str,
        state: LessonState,
    ) -> Result<LessonState> {
        let lesson = self.visible_lesson(viewer, lesson_id).await?;
        self.save_lesson_state(viewer.id, &lesson.id, state).await?;

        if state.percent >= 100.0 {
            if let Some(course_id) = lesson.course_id.as_deref() {
                if let Err(e) = self
                    .mark_unit_complete(viewer.id, course_id, UnitType::Lesson, &lesson.id)
                    .await
                {
                    tracing::warn!("Could not complete lesson {} for {}: {}", lesson.id, viewer.id, e);
                }
            }
        }

        Ok(state)
    }

    /// Shared feedback plus the viewer's own, newest first
    pub async fn lesson_feedback_for_student(
        &self,
        viewer: &User,
        lesson_id: &str,
    ) -> Result<Vec<FeedbackView>> {
        let lesson = self.visible_lesson(viewer, lesson_id).await?;

        let rows = sqlx::query_as::<_, FeedbackRow>(
            r#"
            SELECT f.id, f.student_id, f.content, f.rating, f.visibility,
                   f.created_at, f.updated_at, u.name AS student_name
            FROM feedback f
            LEFT JOIN users u ON u.id = f.student_id
            WHERE f.lesson_id = ? AND (f.visibility = 'shared' OR f.student_id = ?)
            ORDER BY f.created_at DESC
            "#,
        )
        .bind(&lesson.id)
        .bind(viewer.id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(FeedbackRow::into_view).collect()
    }

    /// All feedback on a lesson, for its owner and collaborators
    pub async fn lesson_feedback_for_instructor(
        &self,
        instructor_id: Uuid,
        lesson_id: &str,
    ) -> Result<Vec<FeedbackView>> {
        let lesson = self.get_lesson(lesson_id).await?;
        if !lesson.is_collaborator(instructor_id) {
            return Err(AppError::forbidden(
                "You are not authorized to view this lesson feedback",
            ));
        }

        let rows = sqlx::query_as::<_, FeedbackRow>(
            r#"
            SELECT f.id, f.student_id, f.content, f.rating, f.visibility,
                   f.created_at, f.updated_at, u.name AS student_name
            FROM feedback f
            LEFT JOIN users u ON u.id = f.student_id
            WHERE f.lesson_id = ?
            ORDER BY f.created_at DESC
            "#,
        )
        .bind(&lesson.id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(FeedbackRow::into_view).collect()
    }

    pub async fn submit_feedback(
        &self,
        student: &User,
        lesson_id: &str,
        content: &str,
        rating: i64,
        visibility: Visibility,
    ) -> Result<FeedbackView> {
        let lesson = self.visible_lesson(student, lesson_id).await?;
        let now = Utc::now();
        let feedback = Feedback {
            id: Uuid::new_v4(),
            lesson_id: lesson.id,
            student_id: student.id,
            content: content.to_string(),
            rating,
            visibility,
            created_at: now,
            updated_at: now,
        };
        self.insert_feedback(&feedback).await?;

        Ok(FeedbackView {
            id: feedback.id,
            content: feedback.content,
            rating: feedback.rating,
            visibility: feedback.visibility,
            created_at: feedback.created_at,
            updated_at: feedback.updated_at,
            student: Some(StudentRef {
                id: student.id,
                name: student.name.clone(),
            }),
        })
    }

    pub async fn insert_feedback(&self, feedback: &Feedback) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO feedback (id, lesson_id, student_id, content, rating, visibility, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(feedback.id.to_string())
        .bind(&feedback.lesson_id)
        .bind(feedback.student_id.to_string())
        .bind(&feedback.content)
        .bind(feedback.rating)
        .bind(feedback.visibility.as_str())
        .bind(feedback.created_at)
        .bind(feedback.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct FeedbackRow {
    id: String,
    student_id: String,
    content: String,
    rating: i64,
    visibility: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    student_name: Option<String>,
}

impl FeedbackRow {
    fn into_view(self) -> Result<FeedbackView> {
        let student_id = parse_uuid(&self.student_id)?;
        Ok(FeedbackView {
            id: parse_uuid(&self.id)?,
            content: self.content,
            rating: self.rating,
            visibility: parse_column(&self.visibility)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
            student: self.student_name.map(|name| StudentRef {
                id: student_id,
                name,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::catalog::fixtures;
    use super::super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn test_unpublished_lesson_hidden_from_students() {
        let store = setup_test_db().await;
        let instructor = create_user(&store, "i@example.com", Role::Instructor).await;
        let student = create_user(&store, "s@example.com", Role::Student).await;
        let admin = create_user(&store, "a@example.com", Role::Admin).await;
        store
            .insert_lesson(&fixtures::lesson("l1", None, instructor.id, ContentStatus::Pending))
            .await
            .unwrap();

        let err = store.lesson_for_learner(&student, "l1").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(store.lesson_for_learner(&instructor, "l1").await.is_ok());
        assert!(store.lesson_for_learner(&admin, "l1").await.is_ok());
    }

    #[tokio::test]
    async fn test_lesson_view_includes_course_and_state() {
        let store = setup_test_db().await;
        let instructor = create_user(&store, "i@example.com", Role::Instructor).await;
        let student = create_user(&store, "s@example.com", Role::Student).await;
        create_course(&store, "course-a", "Course A").await;
        store
            .insert_lesson(&fixtures::lesson(
                "l1",
                Some("course-a"),
                instructor.id,
                ContentStatus::Published,
            ))
            .await
            .unwrap();

        let (view, state) = store.lesson_for_learner(&student, "l1").await.unwrap();
        assert_eq!(view.course.as_deref(), Some("Course A"));
        assert_eq!(state.percent, 0.0);
        assert!(!state.bookmarked);
    }

    #[tokio::test]
    async fn test_full_progress_completes_lesson() {
        let store = setup_test_db().await;
        let instructor = create_user(&store, "i@example.com", Role::Instructor).await;
        let student = create_user(&store, "s@example.com", Role::Student).await;
        create_course(&store, "course-a", "Course A").await;
        store
            .insert_lesson(&fixtures::lesson(
                "l1",
                Some("course-a"),
                instructor.id,
                ContentStatus::Published,
            ))
            .await
            .unwrap();

        store
            .set_lesson_progress(
                &student,
                "l1",
                LessonState {
                    percent: 100.0,
                    bookmarked: true,
                },
            )
            .await
            .unwrap();

        let completed = store.completion_set(student.id).await.unwrap();
        assert!(completed.is_done(UnitType::Lesson, "l1"));
        assert!(completed.courses.contains("course-a"));
        assert!(store.lesson_state(student.id, "l1").await.unwrap().bookmarked);
    }

    #[tokio::test]
    async fn test_feedback_visibility() {
        let store = setup_test_db().await;
        let instructor = create_user(&store, "i@example.com", Role::Instructor).await;
        let alice = create_user(&store, "alice@example.com", Role::Student).await;
        let bob = create_user(&store, "bob@example.com", Role::Student).await;
        store
            .insert_lesson(&fixtures::lesson("l1", None, instructor.id, ContentStatus::Published))
            .await
            .unwrap();

        store
            .submit_feedback(&alice, "l1", "Private note", 4, Visibility::Private)
            .await
            .unwrap();
        store
            .submit_feedback(&bob, "l1", "Shared note", 5, Visibility::Shared)
            .await
            .unwrap();

        let for_alice = store.lesson_feedback_for_student(&alice, "l1").await.unwrap();
        assert_eq!(for_alice.len(), 2);
        let for_bob = store.lesson_feedback_for_student(&bob, "l1").await.unwrap();
        assert_eq!(for_bob.len(), 1);
        assert_eq!(for_bob[0].content, "Shared note");
        assert_eq!(for_bob[0].student.as_ref().unwrap().name, "Test User");

        let all = store
            .lesson_feedback_for_instructor(instructor.id, "l1")
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let err = store
            .lesson_feedback_for_instructor(bob.id, "l1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
