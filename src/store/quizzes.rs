//! Quizzes as learners take them

use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use super::{to_json, Store};
use crate::error::{AppError, Result};
use crate::models::{ContentStatus, Quiz, Role, UnitType, User};
use crate::progress::{grade_quiz, QuizSummary};
use crate::views::QuizView;

fn can_view_quiz(quiz: &Quiz, viewer: &User) -> bool {
    quiz.status == ContentStatus::Published
        || viewer.role == Role::Admin
        || quiz.owner_id == viewer.id
        || quiz.collaborators.contains(&viewer.id)
}

impl Store {
    async fn visible_quiz(&self, viewer: &User, quiz_id: &str) -> Result<Quiz> {
        match self.find_quiz(quiz_id).await? {
            Some(quiz) if can_view_quiz(&quiz, viewer) => Ok(quiz),
            _ => Err(AppError::not_found("Quiz not found")),
        }
    }

    pub async fn quiz_for_learner(&self, viewer: &User, quiz_id: &str) -> Result<QuizView> {
        let quiz = self.visible_quiz(viewer, quiz_id).await?;
        Ok(QuizView {
            id: quiz.id,
            title: quiz.title,
            description: quiz.description,
            questions: quiz.questions,
        })
    }

    /// Grade and store a submission. Any submission completes the quiz in its course.
    pub async fn submit_quiz(
        &self,
        viewer: &User,
        quiz_id: &str,
        answers: &HashMap<String, i64>,
    ) -> Result<QuizSummary> {
        let quiz = self.visible_quiz(viewer, quiz_id).await?;
        let summary = grade_quiz(&quiz.questions, answers);

        sqlx::query(
            r#"
            INSERT INTO submissions (id, user_id, quiz_id, attempted, correct, incorrect, accuracy, answers, submitted_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(viewer.id.to_string())
        .bind(&quiz.id)
        .bind(summary.attempted)
        .bind(summary.correct)
        .bind(summary.incorrect)
        .bind(summary.accuracy)
        .bind(to_json(answers)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        tracing::info!(
            "User {} submitted quiz {} ({}% accuracy)",
            viewer.id,
            quiz.id,
            summary.accuracy
        );

        if let Some(course_id) = quiz.course_id.as_deref() {
            if let Err(e) = self
                .mark_unit_complete(viewer.id, course_id, UnitType::Quiz, &quiz.id)
                .await
            {
                tracing::warn!("Could not complete quiz {} for {}: {}", quiz.id, viewer.id, e);
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::super::catalog::fixtures;
    use super::super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn test_submit_quiz_grades_and_completes() {
        let store = setup_test_db().await;
        let instructor = create_user(&store, "i@example.com", Role::Instructor).await;
        let student = create_user(&store, "s@example.com", Role::Student).await;
        create_course(&store, "course-a", "Course A").await;
        store
            .insert_quiz(&fixtures::quiz(
                "quiz-1",
                Some("course-a"),
                instructor.id,
                ContentStatus::Published,
            ))
            .await
            .unwrap();

        let answers = HashMap::from([("q1".to_string(), 0), ("q2".to_string(), 0)]);
        let summary = store.submit_quiz(&student, "quiz-1", &answers).await.unwrap();
        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.correct, 1);
        assert_eq!(summary.accuracy, 50);

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM submissions")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);

        let completed = store.completion_set(student.id).await.unwrap();
        assert!(completed.is_done(UnitType::Quiz, "quiz-1"));
    }

    #[tokio::test]
    async fn test_draft_quiz_hidden_from_students() {
        let store = setup_test_db().await;
        let instructor = create_user(&store, "i@example.com", Role::Instructor).await;
        let student = create_user(&store, "s@example.com", Role::Student).await;
        store
            .insert_quiz(&fixtures::quiz("quiz-1", None, instructor.id, ContentStatus::Pending))
            .await
            .unwrap();

        let err = store.quiz_for_learner(&student, "quiz-1").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let view = store.quiz_for_learner(&instructor, "quiz-1").await.unwrap();
        assert_eq!(view.questions.len(), 2);
    }
}
