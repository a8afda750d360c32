//! Response payloads returned by the API

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{
    ApprovalRequest, ApprovalStatus, Challenge, ContentStatus, HistoryEntry, LessonBlock,
    LessonOrder, QuizQuestion, Recommendation, Role, Topic, Visibility,
};
use crate::progress::{CourseProgress, DashboardStats};

#[derive(Debug, Clone, Serialize)]
pub struct ActivityView {
    pub id: i64,
    pub text: String,
    pub when: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendationView {
    #[serde(flatten)]
    pub recommendation: Recommendation,
    pub started: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub courses: Vec<CourseProgress>,
    pub topics: Vec<Topic>,
    pub recommendations: Vec<RecommendationView>,
    pub activities: Vec<ActivityView>,
    pub stats: DashboardStats,
}

/// Outcome of completing a unit or continuing a course
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionOutcome {
    pub message: String,
    pub activity: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LessonView {
    pub id: String,
    pub title: String,
    pub course: Option<String>,
    pub breadcrumb: Vec<String>,
    pub duration: String,
    pub level: String,
    pub order: LessonOrder,
    pub blocks: Vec<LessonBlock>,
    pub challenge: Option<Challenge>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentRef {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackView {
    pub id: Uuid,
    pub content: String,
    pub rating: i64,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub student: Option<StudentRef>,
}

/// An approval request as its submitter sees it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructorApprovalView {
    pub id: i64,
    pub status: ApprovalStatus,
    #[serde(rename = "type")]
    pub kind: crate::models::ApprovalKind,
    pub submitted_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub history: Vec<HistoryEntry>,
}

impl From<ApprovalRequest> for InstructorApprovalView {
    fn from(request: ApprovalRequest) -> Self {
        Self {
            id: request.id,
            status: request.status,
            kind: request.kind,
            submitted_at: request.created_at,
            notes: request.notes,
            history: request.history,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonStudioView {
    pub id: String,
    pub title: String,
    pub status: ContentStatus,
    pub level: String,
    pub duration: String,
    pub course: Option<String>,
    pub course_id: Option<String>,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
    pub blocks: Vec<LessonBlock>,
    pub challenge: Option<Challenge>,
    pub approval: Option<InstructorApprovalView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizStudioView {
    pub id: String,
    pub title: String,
    pub status: ContentStatus,
    pub course: Option<String>,
    pub course_id: Option<String>,
    pub description: String,
    pub questions: Vec<QuizQuestion>,
    pub updated_at: DateTime<Utc>,
    pub approval: Option<InstructorApprovalView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Studio {
    pub lessons: Vec<LessonStudioView>,
    pub quizzes: Vec<QuizStudioView>,
    pub approvals: Vec<InstructorApprovalView>,
}

/// Summary of the content behind an approval request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ApprovalDetails {
    Lesson {
        title: String,
        status: ContentStatus,
        course: Option<String>,
        version: i64,
    },
    Quiz {
        title: String,
        questions: usize,
        course: Option<String>,
    },
    Category {
        name: String,
        description: String,
    },
}

/// An approval request as shown in the admin queue
#[derive(Debug, Clone, Serialize)]
pub struct AdminApprovalView {
    pub id: i64,
    pub author: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub submitted: String,
    pub status: ApprovalStatus,
    pub details: Option<ApprovalDetails>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthorView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadView {
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub author: Option<AuthorView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LessonRef {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceView {
    pub id: Uuid,
    pub title: String,
    pub lesson: Option<LessonRef>,
    pub notes: String,
    pub members: Vec<MemberView>,
    /// Newest first
    pub threads: Vec<ThreadView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approval_details_tagged_by_kind() {
        let details = ApprovalDetails::Quiz {
            title: "Scope".to_string(),
            questions: 3,
            course: None,
        };
        let value = serde_json::to_value(&details).unwrap();
        assert_eq!(value["kind"], "quiz");
        assert_eq!(value["questions"], 3);
    }

    #[test]
    fn test_recommendation_view_flattens() {
        let view = RecommendationView {
            recommendation: Recommendation {
                id: 2,
                label: "Node.js Backend".to_string(),
                meta: "16h".to_string(),
                lessons: vec![],
                quizzes: vec![],
            },
            started: true,
        };
        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["id"], 2);
        assert_eq!(value["label"], "Node.js Backend");
        assert_eq!(value["started"], true);
    }
}
