//! Learner progress: completed units, lesson states, the activity feed and the dashboard

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::{parse_column, parse_uuid, Store};
use crate::error::{AppError, Result};
use crate::models::{Activity, Course, LessonState, Recommendation, UnitType};
use crate::progress::{
    self, course_progress, dashboard_stats, is_course_complete, next_pending_unit, CompletionSet,
    ACTIVITY_FEED_LIMIT,
};
use crate::views::{ActivityView, CompletionOutcome, Dashboard, RecommendationView};

impl Store {
    /// Every lesson, quiz and course the user has finished
    pub async fn completion_set(&self, user_id: Uuid) -> Result<CompletionSet> {
        let units: Vec<(String, String)> = sqlx::query_as(
            "SELECT unit_type, unit_id FROM completed_units WHERE user_id = ?",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let courses: Vec<(String,)> =
            sqlx::query_as("SELECT course_id FROM completed_courses WHERE user_id = ?")
                .bind(user_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        let mut set = CompletionSet::default();
        for (unit_type, unit_id) in units {
            set.mark(parse_column::<UnitType>(&unit_type)?, unit_id);
        }
        set.courses = courses.into_iter().map(|(id,)| id).collect();
        Ok(set)
    }

    /// Reading state for a lesson, defaulting to unread and not bookmarked
    pub async fn lesson_state(&self, user_id: Uuid, lesson_id: &str) -> Result<LessonState> {
        let mut conn = self.pool.acquire().await?;
        fetch_lesson_state(&mut conn, user_id, lesson_id).await
    }

    pub async fn save_lesson_state(
        &self,
        user_id: Uuid,
        lesson_id: &str,
        state: LessonState,
    ) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        write_lesson_state(&mut conn, user_id, lesson_id, state).await
    }

    /// Append to the user's feed and drop everything past the newest entries
    pub async fn push_activity(&self, user_id: Uuid, text: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        insert_activity(&mut tx, user_id, text).await?;
        tx.commit().await?;
        Ok(())
    }

    /// The user's feed, newest first
    pub async fn recent_activities(&self, user_id: Uuid) -> Result<Vec<Activity>> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            r#"
            SELECT id, user_id, text, created_at FROM activities
            WHERE user_id = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id.to_string())
        .bind(ACTIVITY_FEED_LIMIT as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn started_recommendations(&self, user_id: Uuid) -> Result<HashSet<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT recommendation_id FROM started_recommendations WHERE user_id = ?",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn completed_courses(&self, user_id: Uuid) -> Result<Vec<Course>> {
        let ids: Vec<(String,)> =
            sqlx::query_as("SELECT course_id FROM completed_courses WHERE user_id = ?")
                .bind(user_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        let mut courses = Vec::with_capacity(ids.len());
        for (id,) in ids {
            if let Some(course) = self.find_course(&id).await? {
                courses.push(course);
            }
        }
        Ok(courses)
    }

    pub async fn get_dashboard(&self, user_id: Uuid) -> Result<Dashboard> {
        let completed = self.completion_set(user_id).await?;
        let catalog = self.published_courses().await?;
        let total_courses = catalog.len();

        let courses = catalog
            .iter()
            .map(|units| course_progress(units, &completed))
            .filter(|course| course.pct < 100)
            .collect();

        let started = self.started_recommendations(user_id).await?;
        let recommendations = self
            .list_recommendations()
            .await?
            .into_iter()
            .map(|recommendation| RecommendationView {
                started: started.contains(&recommendation.id),
                recommendation,
            })
            .collect();

        let now = Utc::now();
        let activities = self
            .recent_activities(user_id)
            .await?
            .into_iter()
            .map(|activity| ActivityView {
                id: activity.id,
                when: progress::format_relative_time(activity.created_at, now),
                text: activity.text,
            })
            .collect();

        let finished = self.completed_courses(user_id).await?;

        Ok(Dashboard {
            courses,
            topics: self.list_topics().await?,
            recommendations,
            activities,
            stats: dashboard_stats(finished.iter(), total_courses),
        })
    }

    /// Record a finished lesson or quiz, completing the course once every unit is done
    pub async fn mark_unit_complete(
        &self,
        user_id: Uuid,
        course_id: &str,
        unit_type: UnitType,
        unit_id: &str,
    ) -> Result<CompletionOutcome> {
        let units = self
            .find_course_units(course_id)
            .await?
            .ok_or_else(|| AppError::not_found("Course not found"))?;
        let unit = units
            .find_unit(unit_type, unit_id)
            .ok_or_else(|| AppError::not_found("Unit not found"))?;

        let mut completed = self.completion_set(user_id).await?;
        let already_completed = CompletionOutcome {
            message: format!("{} already completed", unit.title),
            activity: None,
        };
        if completed.is_done(unit_type, unit_id) {
            return Ok(already_completed);
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT OR IGNORE INTO completed_units (user_id, unit_type, unit_id, completed_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(user_id.to_string())
        .bind(unit_type.as_str())
        .bind(unit_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() == 0 {
            return Ok(already_completed);
        }
        completed.mark(unit_type, unit_id);

        if unit_type == UnitType::Lesson {
            let state = fetch_lesson_state(&mut tx, user_id, unit_id).await?;
            write_lesson_state(
                &mut tx,
                user_id,
                unit_id,
                LessonState {
                    percent: 100.0,
                    ..state
                },
            )
            .await?;
        }

        let descriptor = unit_type.descriptor();
        let activity = format!("{} \"{}\" in {}", descriptor, unit.title, units.course.title);
        insert_activity(&mut tx, user_id, &activity).await?;

        let course_finished =
            is_course_complete(&units, &completed) && !completed.courses.contains(course_id);
        if course_finished {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO completed_courses (user_id, course_id, completed_at)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(user_id.to_string())
            .bind(course_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            insert_activity(
                &mut tx,
                user_id,
                &format!("{} completed (all lessons & quizzes)", units.course.title),
            )
            .await?;
        }

        tx.commit().await?;
        if course_finished {
            tracing::info!("User {} completed course {}", user_id, course_id);
        }

        Ok(CompletionOutcome {
            message: format!("{} complete: {}", descriptor, unit.title),
            activity: Some(activity),
        })
    }

    /// Complete the next unfinished unit of a course
    pub async fn continue_course(&self, user_id: Uuid, course_id: &str) -> Result<CompletionOutcome> {
        let units = self
            .find_course_units(course_id)
            .await?
            .ok_or_else(|| AppError::not_found("Course not found"))?;
        let completed = self.completion_set(user_id).await?;

        match next_pending_unit(&units, &completed) {
            Some((unit_type, unit)) => {
                self.mark_unit_complete(user_id, course_id, unit_type, &unit.id)
                    .await
            }
            None => Ok(CompletionOutcome {
                message: format!("{} already completed", units.course.title),
                activity: Some(format!("{} already complete", units.course.title)),
            }),
        }
    }

    /// Add a recommended path to the user's plan. Starting it again changes nothing.
    pub async fn start_recommendation(&self, user_id: Uuid, id: i64) -> Result<Recommendation> {
        let recommendation = self
            .find_recommendation(id)
            .await?
            .ok_or_else(|| AppError::not_found("Recommendation not found"))?;

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO started_recommendations (user_id, recommendation_id, started_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(user_id.to_string())
        .bind(id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() > 0 {
            insert_activity(
                &mut tx,
                user_id,
                &format!("Started recommended path: {}", recommendation.label),
            )
            .await?;
        }
        tx.commit().await?;

        Ok(recommendation)
    }
}

async fn fetch_lesson_state(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    lesson_id: &str,
) -> Result<LessonState> {
    let row: Option<(f64, bool)> = sqlx::query_as(
        "SELECT percent, bookmarked FROM lesson_states WHERE user_id = ? AND lesson_id = ?",
    )
    .bind(user_id.to_string())
    .bind(lesson_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row
        .map(|(percent, bookmarked)| LessonState {
            percent,
            bookmarked,
        })
        .unwrap_or_default())
}

async fn write_lesson_state(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    lesson_id: &str,
    state: LessonState,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO lesson_states (user_id, lesson_id, percent, bookmarked, updated_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(user_id, lesson_id) DO UPDATE SET
            percent = excluded.percent,
            bookmarked = excluded.bookmarked,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(user_id.to_string())
    .bind(lesson_id)
    .bind(state.percent)
    .bind(state.bookmarked)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Feed entries past the newest `ACTIVITY_FEED_LIMIT` are pruned in the same write
async fn insert_activity(conn: &mut SqliteConnection, user_id: Uuid, text: &str) -> Result<()> {
    sqlx::query("INSERT INTO activities (user_id, text, created_at) VALUES (?, ?, ?)")
        .bind(user_id.to_string())
        .bind(text)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        r#"
        DELETE FROM activities
        WHERE user_id = ? AND id NOT IN (
            SELECT id FROM activities WHERE user_id = ? ORDER BY id DESC LIMIT ?
        )
        "#,
    )
    .bind(user_id.to_string())
    .bind(user_id.to_string())
    .bind(ACTIVITY_FEED_LIMIT as i64)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[derive(sqlx::FromRow)]
struct ActivityRow {
    id: i64,
    user_id: String,
    text: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ActivityRow> for Activity {
    type Error = AppError;

    fn try_from(row: ActivityRow) -> Result<Self> {
        Ok(Activity {
            id: row.id,
            user_id: parse_uuid(&row.user_id)?,
            text: row.text,
            created_at: row.created_at,
        })
    }
}
