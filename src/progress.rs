//! Course-completion bookkeeping
//!
//! Pure functions over a learner's completion sets: per-course percentages,
//! the next pending unit of a course, quiz grading and dashboard statistics.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Course, CourseUnits, QuizQuestion, UnitRef, UnitType};

/// Maximum number of entries kept in a user's activity feed
pub const ACTIVITY_FEED_LIMIT: usize = 6;

/// Everything a learner has finished
#[derive(Debug, Clone, Default)]
pub struct CompletionSet {
    pub lessons: HashSet<String>,
    pub quizzes: HashSet<String>,
    pub courses: HashSet<String>,
}

impl CompletionSet {
    pub fn units(&self, unit_type: UnitType) -> &HashSet<String> {
        match unit_type {
            UnitType::Lesson => &self.lessons,
            UnitType::Quiz => &self.quizzes,
        }
    }

    pub fn is_done(&self, unit_type: UnitType, unit_id: &str) -> bool {
        self.units(unit_type).contains(unit_id)
    }

    pub fn mark(&mut self, unit_type: UnitType, unit_id: impl Into<String>) -> bool {
        match unit_type {
            UnitType::Lesson => self.lessons.insert(unit_id.into()),
            UnitType::Quiz => self.quizzes.insert(unit_id.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitProgress {
    pub id: String,
    pub title: String,
    pub done: bool,
}

/// A course as seen on the dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseProgress {
    pub id: String,
    pub title: String,
    pub desc: String,
    pub lessons: Vec<UnitProgress>,
    pub quizzes: Vec<UnitProgress>,
    pub pct: u32,
}

/// `round(done / total * 100)`, or 0 for an empty course
pub fn completion_percent(done: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((done as f64 / total as f64) * 100.0).round() as u32
}

fn annotate(units: &[UnitRef], done: &HashSet<String>) -> Vec<UnitProgress> {
    units
        .iter()
        .map(|unit| UnitProgress {
            id: unit.id.clone(),
            title: unit.title.clone(),
            done: done.contains(&unit.id),
        })
        .collect()
}

pub fn course_progress(units: &CourseUnits, completed: &CompletionSet) -> CourseProgress {
    let lessons = annotate(&units.lessons, &completed.lessons);
    let quizzes = annotate(&units.quizzes, &completed.quizzes);
    let total = lessons.len() + quizzes.len();
    let done = lessons.iter().chain(quizzes.iter()).filter(|u| u.done).count();

    CourseProgress {
        id: units.course.id.clone(),
        title: units.course.title.clone(),
        desc: units.course.description.clone(),
        lessons,
        quizzes,
        pct: completion_percent(done, total),
    }
}

/// True when every lesson and every quiz of the course is done.
/// A course without units is never complete.
pub fn is_course_complete(units: &CourseUnits, completed: &CompletionSet) -> bool {
    let total = units.lessons.len() + units.quizzes.len();
    total > 0
        && units.lessons.iter().all(|l| completed.lessons.contains(&l.id))
        && units.quizzes.iter().all(|q| completed.quizzes.contains(&q.id))
}

/// First unfinished lesson in course order, otherwise the first unfinished quiz
pub fn next_pending_unit<'a>(
    units: &'a CourseUnits,
    completed: &CompletionSet,
) -> Option<(UnitType, &'a UnitRef)> {
    units
        .lessons
        .iter()
        .find(|l| !completed.lessons.contains(&l.id))
        .map(|l| (UnitType::Lesson, l))
        .or_else(|| {
            units
                .quizzes
                .iter()
                .find(|q| !completed.quizzes.contains(&q.id))
                .map(|q| (UnitType::Quiz, q))
        })
}

/// Result of grading one quiz submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuizSummary {
    pub attempted: u32,
    pub correct: u32,
    pub incorrect: u32,
    pub accuracy: u32,
}

/// Grade answers keyed by question id. Answers for unknown questions are ignored.
pub fn grade_quiz(questions: &[QuizQuestion], answers: &HashMap<String, i64>) -> QuizSummary {
    let mut summary = QuizSummary {
        attempted: 0,
        correct: 0,
        incorrect: 0,
        accuracy: 0,
    };

    for question in questions {
        let Some(choice) = answers.get(&question.id) else {
            continue;
        };
        summary.attempted += 1;
        if *choice == question.answer {
            summary.correct += 1;
        } else {
            summary.incorrect += 1;
        }
    }

    summary.accuracy = completion_percent(summary.correct as usize, summary.attempted as usize);
    summary
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub courses: String,
    pub hours: String,
    pub certificates: usize,
}

/// Stats over the learner's completed courses out of `total_courses` available
pub fn dashboard_stats<'a>(
    completed_courses: impl IntoIterator<Item = &'a Course>,
    total_courses: usize,
) -> DashboardStats {
    let (count, minutes) = completed_courses
        .into_iter()
        .fold((0usize, 0i64), |(count, minutes), course| {
            (count + 1, minutes + course.duration_minutes.max(0))
        });

    DashboardStats {
        courses: format!("{}/{}", count, total_courses),
        hours: format!("{}h", minutes / 60),
        certificates: count,
    }
}

/// Human-readable age of a timestamp, e.g. "3 hours ago"
pub fn format_relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - at).num_minutes();
    if minutes < 1 {
        return "Just now".to_string();
    }
    if minutes < 60 {
        return plural(minutes, "minute");
    }
    let hours = minutes / 60;
    if hours < 24 {
        return plural(hours, "hour");
    }
    plural(hours / 24, "day")
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("{} {} ago", n, unit)
    } else {
        format!("{} {}s ago", n, unit)
    }
}
