//! Courses, lessons, quizzes, topics and recommendations

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::{from_json, parse_column, parse_uuid, to_json, Store};
use crate::error::{AppError, Result};
use crate::models::{
    Challenge, ContentStatus, Course, CourseUnits, Lesson, LessonOrder, Quiz, Recommendation,
    Topic, UnitRef,
};

const LESSON_COLUMNS: &str = "id, title, slug, course_id, owner_id, collaborators, level, duration, \
     breadcrumb, order_current, order_total, blocks, challenge, status, approval_id, categories, \
     version, created_at, updated_at";

const QUIZ_COLUMNS: &str = "id, title, description, course_id, owner_id, collaborators, questions, \
     status, approval_id, created_at, updated_at";

impl Store {
    // Course operations

    pub async fn insert_course(&self, course: &Course) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO courses (id, title, description, level, duration_minutes, topics, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&course.id)
        .bind(&course.title)
        .bind(&course.description)
        .bind(&course.level)
        .bind(course.duration_minutes)
        .bind(to_json(&course.topics)?)
        .bind(course.status.as_str())
        .bind(course.created_at)
        .bind(course.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_course(&self, id: &str) -> Result<Option<Course>> {
        let row = sqlx::query_as::<_, CourseRow>(
            r#"
            SELECT id, title, description, level, duration_minutes, topics, status, created_at, updated_at
            FROM courses
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Course::try_from).transpose()
    }

    /// Like [`Store::find_course`], but a missing course is a 404
    pub async fn get_course(&self, id: &str) -> Result<Course> {
        self.find_course(id)
            .await?
            .ok_or_else(|| AppError::not_found("Course not found"))
    }

    /// A course with its published lessons and quizzes in course order
    pub async fn find_course_units(&self, id: &str) -> Result<Option<CourseUnits>> {
        let Some(course) = self.find_course(id).await? else {
            return Ok(None);
        };

        let lessons = sqlx::query_as::<_, UnitRow>(
            r#"
            SELECT id, title, course_id FROM lessons
            WHERE course_id = ? AND status = 'published'
            ORDER BY position, created_at
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let quizzes = sqlx::query_as::<_, UnitRow>(
            r#"
            SELECT id, title, course_id FROM quizzes
            WHERE course_id = ? AND status = 'published'
            ORDER BY position, created_at
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(CourseUnits {
            course,
            lessons: lessons.into_iter().map(UnitRef::from).collect(),
            quizzes: quizzes.into_iter().map(UnitRef::from).collect(),
        }))
    }

    /// Every published course with its units
    pub async fn published_courses(&self) -> Result<Vec<CourseUnits>> {
        let courses = sqlx::query_as::<_, CourseRow>(
            r#"
            SELECT id, title, description, level, duration_minutes, topics, status, created_at, updated_at
            FROM courses
            WHERE status = 'published'
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut lessons = group_units(
            sqlx::query_as::<_, UnitRow>(
                r#"
                SELECT id, title, course_id FROM lessons
                WHERE course_id IS NOT NULL AND status = 'published'
                ORDER BY position, created_at
                "#,
            )
            .fetch_all(&self.pool)
            .await?,
        );
        let mut quizzes = group_units(
            sqlx::query_as::<_, UnitRow>(
                r#"
                SELECT id, title, course_id FROM quizzes
                WHERE course_id IS NOT NULL AND status = 'published'
                ORDER BY position, created_at
                "#,
            )
            .fetch_all(&self.pool)
            .await?,
        );

        courses
            .into_iter()
            .map(|row| {
                let course = Course::try_from(row)?;
                Ok(CourseUnits {
                    lessons: lessons.remove(&course.id).unwrap_or_default(),
                    quizzes: quizzes.remove(&course.id).unwrap_or_default(),
                    course,
                })
            })
            .collect()
    }

    async fn course_title(&self, id: Option<&str>) -> Result<Option<String>> {
        let Some(id) = id else {
            return Ok(None);
        };
        let title: Option<(String,)> = sqlx::query_as("SELECT title FROM courses WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(title.map(|(t,)| t))
    }

    // Lesson operations

    pub async fn insert_lesson(&self, lesson: &Lesson) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        write_lesson(&mut conn, lesson).await
    }

    pub async fn find_lesson(&self, id: &str) -> Result<Option<Lesson>> {
        let row = sqlx::query_as::<_, LessonRow>(&format!(
            "SELECT {} FROM lessons WHERE id = ?",
            LESSON_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Lesson::try_from).transpose()
    }

    pub async fn get_lesson(&self, id: &str) -> Result<Lesson> {
        self.find_lesson(id)
            .await?
            .ok_or_else(|| AppError::not_found("Lesson not found"))
    }

    /// Lessons owned by `owner`, most recently updated first
    pub async fn lessons_by_owner(&self, owner: Uuid) -> Result<Vec<Lesson>> {
        let rows = sqlx::query_as::<_, LessonRow>(&format!(
            "SELECT {} FROM lessons WHERE owner_id = ? ORDER BY updated_at DESC",
            LESSON_COLUMNS
        ))
        .bind(owner.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    pub(super) async fn lesson_course_title(&self, lesson: &Lesson) -> Result<Option<String>> {
        self.course_title(lesson.course_id.as_deref()).await
    }

    // Quiz operations

    pub async fn insert_quiz(&self, quiz: &Quiz) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        write_quiz(&mut conn, quiz).await
    }

    pub async fn find_quiz(&self, id: &str) -> Result<Option<Quiz>> {
        let row = sqlx::query_as::<_, QuizRow>(&format!(
            "SELECT {} FROM quizzes WHERE id = ?",
            QUIZ_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Quiz::try_from).transpose()
    }

    pub async fn get_quiz(&self, id: &str) -> Result<Quiz> {
        self.find_quiz(id)
            .await?
            .ok_or_else(|| AppError::not_found("Quiz not found"))
    }

    /// Quizzes owned by `owner`, most recently updated first
    pub async fn quizzes_by_owner(&self, owner: Uuid) -> Result<Vec<Quiz>> {
        let rows = sqlx::query_as::<_, QuizRow>(&format!(
            "SELECT {} FROM quizzes WHERE owner_id = ? ORDER BY updated_at DESC",
            QUIZ_COLUMNS
        ))
        .bind(owner.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    pub(super) async fn quiz_course_title(&self, quiz: &Quiz) -> Result<Option<String>> {
        self.course_title(quiz.course_id.as_deref()).await
    }

    // Topics and recommendations

    pub async fn insert_topic(&self, topic: &Topic) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO topics (id, name, courses, lessons, quizzes)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(topic.id)
        .bind(&topic.name)
        .bind(topic.courses)
        .bind(to_json(&topic.lessons)?)
        .bind(to_json(&topic.quizzes)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_topics(&self) -> Result<Vec<Topic>> {
        let rows = sqlx::query_as::<_, TopicRow>(
            "SELECT id, name, courses, lessons, quizzes FROM topics ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    pub async fn insert_recommendation(&self, recommendation: &Recommendation) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO recommendations (id, label, meta, lessons, quizzes)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(recommendation.id)
        .bind(&recommendation.label)
        .bind(&recommendation.meta)
        .bind(to_json(&recommendation.lessons)?)
        .bind(to_json(&recommendation.quizzes)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_recommendations(&self) -> Result<Vec<Recommendation>> {
        let rows = sqlx::query_as::<_, RecommendationRow>(
            "SELECT id, label, meta, lessons, quizzes FROM recommendations ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    pub async fn find_recommendation(&self, id: i64) -> Result<Option<Recommendation>> {
        let row = sqlx::query_as::<_, RecommendationRow>(
            "SELECT id, label, meta, lessons, quizzes FROM recommendations WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Recommendation::try_from).transpose()
    }
}

/// Insert or fully overwrite a lesson. New or moved lessons go to the end of their course.
pub(super) async fn write_lesson(conn: &mut SqliteConnection, lesson: &Lesson) -> Result<()> {
    let challenge = lesson.challenge.as_ref().map(to_json).transpose()?;

    sqlx::query(
        r#"
        INSERT INTO lessons (
            id, title, slug, course_id, owner_id, collaborators, level, duration, breadcrumb,
            order_current, order_total, position, blocks, challenge, status, approval_id,
            categories, version, created_at, updated_at
        )
        VALUES (
            ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
            (SELECT COALESCE(MAX(position), 0) + 1 FROM lessons WHERE course_id IS ?),
            ?, ?, ?, ?, ?, ?, ?, ?
        )
        ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            slug = excluded.slug,
            position = CASE WHEN lessons.course_id IS excluded.course_id
                THEN lessons.position ELSE excluded.position END,
            course_id = excluded.course_id,
            collaborators = excluded.collaborators,
            level = excluded.level,
            duration = excluded.duration,
            breadcrumb = excluded.breadcrumb,
            order_current = excluded.order_current,
            order_total = excluded.order_total,
            blocks = excluded.blocks,
            challenge = excluded.challenge,
            status = excluded.status,
            approval_id = excluded.approval_id,
            categories = excluded.categories,
            version = excluded.version,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&lesson.id)
    .bind(&lesson.title)
    .bind(&lesson.slug)
    .bind(&lesson.course_id)
    .bind(lesson.owner_id.to_string())
    .bind(to_json(&lesson.collaborators)?)
    .bind(&lesson.level)
    .bind(&lesson.duration)
    .bind(to_json(&lesson.breadcrumb)?)
    .bind(lesson.order.current)
    .bind(lesson.order.total)
    .bind(&lesson.course_id)
    .bind(to_json(&lesson.blocks)?)
    .bind(challenge)
    .bind(lesson.status.as_str())
    .bind(lesson.approval_id)
    .bind(to_json(&lesson.categories)?)
    .bind(lesson.version)
    .bind(lesson.created_at)
    .bind(lesson.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Insert or fully overwrite a quiz. New or moved quizzes go to the end of their course.
pub(super) async fn write_quiz(conn: &mut SqliteConnection, quiz: &Quiz) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO quizzes (
            id, title, description, course_id, owner_id, collaborators, questions, position,
            status, approval_id, created_at, updated_at
        )
        VALUES (
            ?, ?, ?, ?, ?, ?, ?,
            (SELECT COALESCE(MAX(position), 0) + 1 FROM quizzes WHERE course_id IS ?),
            ?, ?, ?, ?
        )
        ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            description = excluded.description,
            position = CASE WHEN quizzes.course_id IS excluded.course_id
                THEN quizzes.position ELSE excluded.position END,
            course_id = excluded.course_id,
            collaborators = excluded.collaborators,
            questions = excluded.questions,
            status = excluded.status,
            approval_id = excluded.approval_id,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&quiz.id)
    .bind(&quiz.title)
    .bind(&quiz.description)
    .bind(&quiz.course_id)
    .bind(quiz.owner_id.to_string())
    .bind(to_json(&quiz.collaborators)?)
    .bind(to_json(&quiz.questions)?)
    .bind(&quiz.course_id)
    .bind(quiz.status.as_str())
    .bind(quiz.approval_id)
    .bind(quiz.created_at)
    .bind(quiz.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(super) async fn set_lesson_status(
    conn: &mut SqliteConnection,
    id: &str,
    status: ContentStatus,
    at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE lessons SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(at)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(super) async fn set_quiz_status(
    conn: &mut SqliteConnection,
    id: &str,
    status: ContentStatus,
    at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE quizzes SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(at)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

fn group_units(rows: Vec<UnitRow>) -> HashMap<String, Vec<UnitRef>> {
    let mut grouped: HashMap<String, Vec<UnitRef>> = HashMap::new();
    for row in rows {
        if let Some(course_id) = row.course_id.clone() {
            grouped.entry(course_id).or_default().push(row.into());
        }
    }
    grouped
}

#[derive(sqlx::FromRow)]
struct CourseRow {
    id: String,
    title: String,
    description: String,
    level: String,
    duration_minutes: i64,
    topics: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CourseRow> for Course {
    type Error = AppError;

    fn try_from(row: CourseRow) -> Result<Self> {
        Ok(Course {
            id: row.id,
            title: row.title,
            description: row.description,
            level: row.level,
            duration_minutes: row.duration_minutes,
            topics: from_json(&row.topics, "topics")?,
            status: parse_column(&row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UnitRow {
    id: String,
    title: String,
    course_id: Option<String>,
}

impl From<UnitRow> for UnitRef {
    fn from(row: UnitRow) -> Self {
        UnitRef {
            id: row.id,
            title: row.title,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LessonRow {
    id: String,
    title: String,
    slug: String,
    course_id: Option<String>,
    owner_id: String,
    collaborators: String,
    level: String,
    duration: String,
    breadcrumb: String,
    order_current: i64,
    order_total: i64,
    blocks: String,
    challenge: Option<String>,
    status: String,
    approval_id: Option<i64>,
    categories: String,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LessonRow> for Lesson {
    type Error = AppError;

    fn try_from(row: LessonRow) -> Result<Self> {
        let challenge: Option<Challenge> = row
            .challenge
            .as_deref()
            .map(|raw| from_json(raw, "challenge"))
            .transpose()?;

        Ok(Lesson {
            id: row.id,
            title: row.title,
            slug: row.slug,
            course_id: row.course_id,
            owner_id: parse_uuid(&row.owner_id)?,
            collaborators: from_json(&row.collaborators, "collaborators")?,
            level: row.level,
            duration: row.duration,
            breadcrumb: from_json(&row.breadcrumb, "breadcrumb")?,
            order: LessonOrder {
                current: row.order_current,
                total: row.order_total,
            },
            blocks: from_json(&row.blocks, "blocks")?,
            challenge,
            status: parse_column(&row.status)?,
            approval_id: row.approval_id,
            categories: from_json(&row.categories, "categories")?,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct QuizRow {
    id: String,
    title: String,
    description: String,
    course_id: Option<String>,
    owner_id: String,
    collaborators: String,
    questions: String,
    status: String,
    approval_id: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<QuizRow> for Quiz {
    type Error = AppError;

    fn try_from(row: QuizRow) -> Result<Self> {
        Ok(Quiz {
            id: row.id,
            title: row.title,
            description: row.description,
            course_id: row.course_id,
            owner_id: parse_uuid(&row.owner_id)?,
            collaborators: from_json(&row.collaborators, "collaborators")?,
            questions: from_json(&row.questions, "questions")?,
            status: parse_column(&row.status)?,
            approval_id: row.approval_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TopicRow {
    id: i64,
    name: String,
    courses: i64,
    lessons: String,
    quizzes: String,
}

impl TryFrom<TopicRow> for Topic {
    type Error = AppError;

    fn try_from(row: TopicRow) -> Result<Self> {
        Ok(Topic {
            id: row.id,
            name: row.name,
            courses: row.courses,
            lessons: from_json(&row.lessons, "lessons")?,
            quizzes: from_json(&row.quizzes, "quizzes")?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RecommendationRow {
    id: i64,
    label: String,
    meta: String,
    lessons: String,
    quizzes: String,
}

impl TryFrom<RecommendationRow> for Recommendation {
    type Error = AppError;

    fn try_from(row: RecommendationRow) -> Result<Self> {
        Ok(Recommendation {
            id: row.id,
            label: row.label,
            meta: row.meta,
            lessons: from_json(&row.lessons, "lessons")?,
            quizzes: from_json(&row.quizzes, "quizzes")?,
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::models::{LessonBlock, QuizQuestion};

    pub fn lesson(id: &str, course_id: Option<&str>, owner: Uuid, status: ContentStatus) -> Lesson {
        let now = Utc::now();
        Lesson {
            id: id.to_string(),
            title: format!("Lesson {}", id),
            slug: id.to_string(),
            course_id: course_id.map(str::to_string),
            owner_id: owner,
            collaborators: vec![owner],
            level: "Beginner".to_string(),
            duration: "10 min read".to_string(),
            breadcrumb: vec!["Courses".to_string()],
            order: LessonOrder::default(),
            blocks: vec![LessonBlock {
                heading: "Intro".to_string(),
                ..Default::default()
            }],
            challenge: None,
            status,
            approval_id: None,
            categories: vec![],
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn quiz(id: &str, course_id: Option<&str>, owner: Uuid, status: ContentStatus) -> Quiz {
        let now = Utc::now();
        Quiz {
            id: id.to_string(),
            title: format!("Quiz {}", id),
            description: String::new(),
            course_id: course_id.map(str::to_string),
            owner_id: owner,
            collaborators: vec![owner],
            questions: vec![
                QuizQuestion {
                    id: "q1".to_string(),
                    prompt: "Pick the first".to_string(),
                    options: vec!["a".to_string(), "b".to_string()],
                    answer: 0,
                    explanation: String::new(),
                    correct_feedback: String::new(),
                    incorrect_feedback: String::new(),
                },
                QuizQuestion {
                    id: "q2".to_string(),
                    prompt: "Pick the second".to_string(),
                    options: vec!["a".to_string(), "b".to_string()],
                    answer: 1,
                    explanation: String::new(),
                    correct_feedback: String::new(),
                    incorrect_feedback: String::new(),
                },
            ],
            status,
            approval_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}
