//! Data models for users, catalog content, learner state and moderation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a string-backed enum with `as_str`, `FromStr` and `Display`.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal {
            $($variant:ident => $value:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $value)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value,)+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($value => Ok($name::$variant),)+
                    _ => Err(format!("Invalid {}: {}", $label, s)),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum! {
    /// Account role
    Role, "role" {
        Student => "student",
        Instructor => "instructor",
        Admin => "admin",
    }
}

impl Role {
    /// Instructors and admins may author content
    pub fn can_author(&self) -> bool {
        matches!(self, Role::Instructor | Role::Admin)
    }
}

string_enum! {
    /// Account status, managed by admins
    UserStatus, "user status" {
        Active => "Active",
        Pending => "Pending",
        Suspended => "Suspended",
    }
}

string_enum! {
    CourseStatus, "course status" {
        Draft => "draft",
        Pending => "pending",
        Published => "published",
        Archived => "archived",
    }
}

string_enum! {
    /// Publication status of lessons and quizzes
    ContentStatus, "content status" {
        Draft => "draft",
        Pending => "pending",
        Published => "published",
        Rejected => "rejected",
    }
}

string_enum! {
    /// Status of an approval request
    ApprovalStatus, "approval status" {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

string_enum! {
    /// What an approval request is about
    ApprovalKind, "approval kind" {
        Lesson => "lesson",
        Quiz => "quiz",
        Category => "category",
    }
}

impl ApprovalKind {
    /// Label shown in the admin queue
    pub fn label(&self) -> &'static str {
        match self {
            ApprovalKind::Lesson => "Lesson",
            ApprovalKind::Quiz => "Quiz",
            ApprovalKind::Category => "Category",
        }
    }
}

string_enum! {
    /// Entry kind in an approval request's history
    HistoryAction, "history action" {
        Submitted => "submitted",
        Approved => "approved",
        Rejected => "rejected",
        Updated => "updated",
    }
}

string_enum! {
    /// A reviewer's verdict on a pending request
    Decision, "decision" {
        Approved => "approved",
        Rejected => "rejected",
    }
}

impl Decision {
    pub fn status(&self) -> ApprovalStatus {
        match self {
            Decision::Approved => ApprovalStatus::Approved,
            Decision::Rejected => ApprovalStatus::Rejected,
        }
    }

    pub fn history_action(&self) -> HistoryAction {
        match self {
            Decision::Approved => HistoryAction::Approved,
            Decision::Rejected => HistoryAction::Rejected,
        }
    }

    /// Status the reviewed lesson or quiz moves to
    pub fn content_status(&self) -> ContentStatus {
        match self {
            Decision::Approved => ContentStatus::Published,
            Decision::Rejected => ContentStatus::Rejected,
        }
    }
}

string_enum! {
    /// Who can read a piece of lesson feedback
    Visibility, "visibility" {
        Private => "private",
        Shared => "shared",
    }
}

string_enum! {
    /// A course is made of lesson and quiz units
    UnitType, "unit type" {
        Lesson => "lesson",
        Quiz => "quiz",
    }
}

impl UnitType {
    pub fn descriptor(&self) -> &'static str {
        match self {
            UnitType::Lesson => "Lesson",
            UnitType::Quiz => "Quiz",
        }
    }
}

/// A registered account. The password hash is never part of this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub status: UserStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub title: String,
    pub description: String,
    pub level: String,
    pub duration_minutes: i64,
    pub topics: Vec<String>,
    pub status: CourseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Minimal reference to a lesson or quiz inside a course
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRef {
    pub id: String,
    pub title: String,
}

/// A course together with its published units, in course order
#[derive(Debug, Clone)]
pub struct CourseUnits {
    pub course: Course,
    pub lessons: Vec<UnitRef>,
    pub quizzes: Vec<UnitRef>,
}

impl CourseUnits {
    pub fn units(&self, unit_type: UnitType) -> &[UnitRef] {
        match unit_type {
            UnitType::Lesson => &self.lessons,
            UnitType::Quiz => &self.quizzes,
        }
    }

    pub fn find_unit(&self, unit_type: UnitType, unit_id: &str) -> Option<&UnitRef> {
        self.units(unit_type).iter().find(|u| u.id == unit_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LessonBlock {
    pub heading: String,
    pub copy: String,
    pub code: String,
    pub list: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default)]
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonOrder {
    pub current: i64,
    pub total: i64,
}

impl Default for LessonOrder {
    fn default() -> Self {
        Self {
            current: 1,
            total: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub course_id: Option<String>,
    pub owner_id: Uuid,
    pub collaborators: Vec<Uuid>,
    pub level: String,
    pub duration: String,
    pub breadcrumb: Vec<String>,
    pub order: LessonOrder,
    pub blocks: Vec<LessonBlock>,
    pub challenge: Option<Challenge>,
    pub status: ContentStatus,
    pub approval_id: Option<i64>,
    pub categories: Vec<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lesson {
    pub fn is_collaborator(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id || self.collaborators.contains(&user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub id: String,
    pub prompt: String,
    pub options: Vec<String>,
    pub answer: i64,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub correct_feedback: String,
    #[serde(default)]
    pub incorrect_feedback: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: String,
    pub title: String,
    pub description: String,
    pub course_id: Option<String>,
    pub owner_id: Uuid,
    pub collaborators: Vec<Uuid>,
    pub questions: Vec<QuizQuestion>,
    pub status: ContentStatus,
    pub approval_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub id: Uuid,
    pub lesson_id: String,
    pub student_id: Uuid,
    pub content: String,
    pub rating: i64,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySuggestion {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub status: ApprovalStatus,
    pub submitted_by: Uuid,
    #[serde(skip_serializing)]
    pub approval_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One entry in an approval request's append-only history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: HistoryAction,
    pub by: Option<Uuid>,
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

/// A moderation request for instructor-submitted content
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: ApprovalKind,
    pub target_id: String,
    pub submitted_by: Uuid,
    pub status: ApprovalStatus,
    pub notes: Option<String>,
    pub history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: i64,
    pub name: String,
    pub courses: i64,
    pub lessons: Vec<String>,
    pub quizzes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: i64,
    pub label: String,
    pub meta: String,
    pub lessons: Vec<String>,
    pub quizzes: Vec<String>,
}

/// An entry in a user's activity feed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: i64,
    pub user_id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// A learner's reading state for one lesson
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LessonState {
    pub percent: f64,
    pub bookmarked: bool,
}

impl Default for LessonState {
    fn default() -> Self {
        Self {
            percent: 0.0,
            bookmarked: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), *role);
        }
        assert!("moderator".parse::<Role>().is_err());
    }

    #[test]
    fn test_user_status_uses_capitalized_values() {
        assert_eq!(UserStatus::Suspended.as_str(), "Suspended");
        assert_eq!(
            serde_json::to_string(&UserStatus::Active).unwrap(),
            "\"Active\""
        );
        assert!("active".parse::<UserStatus>().is_err());
    }

    #[test]
    fn test_invalid_enum_message() {
        let err = "maybe".parse::<Decision>().unwrap_err();
        assert_eq!(err, "Invalid decision: maybe");
    }

    #[test]
    fn test_decision_mappings() {
        assert_eq!(Decision::Approved.status(), ApprovalStatus::Approved);
        assert_eq!(Decision::Rejected.history_action(), HistoryAction::Rejected);
        assert_eq!(Decision::Approved.content_status(), ContentStatus::Published);
        assert_eq!(Decision::Rejected.content_status(), ContentStatus::Rejected);
    }

    #[test]
    fn test_role_can_author() {
        assert!(!Role::Student.can_author());
        assert!(Role::Instructor.can_author());
        assert!(Role::Admin.can_author());
    }

    #[test]
    fn test_lesson_block_defaults_missing_fields() {
        let block: LessonBlock = serde_json::from_str(r#"{"heading":"Intro"}"#).unwrap();
        assert_eq!(block.heading, "Intro");
        assert!(block.copy.is_empty());
        assert!(block.list.is_empty());
    }

    #[test]
    fn test_approval_request_serializes_kind_as_type() {
        let now = Utc::now();
        let request = ApprovalRequest {
            id: 1001,
            kind: ApprovalKind::Quiz,
            target_id: "quiz-1".to_string(),
            submitted_by: Uuid::new_v4(),
            status: ApprovalStatus::Pending,
            notes: None,
            history: vec![],
            created_at: now,
            updated_at: now,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["type"], "quiz");
        assert_eq!(value["status"], "pending");
        assert_eq!(value["targetId"], "quiz-1");
    }
}
