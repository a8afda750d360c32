//! Approval workflow for instructor-submitted content
//!
//! A request moves `pending -> approved | rejected` exactly once. Every change,
//! including revisions while still pending, appends to the request's history;
//! entries are never edited or removed.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{ApprovalKind, ApprovalRequest, ApprovalStatus, Decision, HistoryAction, HistoryEntry};

/// First id handed out when no request exists yet
pub const FIRST_APPROVAL_ID: i64 = 1001;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Approval request {id} is already {status}")]
    AlreadyDecided { id: i64, status: ApprovalStatus },
}

/// Id for the next request given the highest id in use
pub fn next_approval_id(current_max: Option<i64>) -> i64 {
    match current_max {
        Some(max) if max >= FIRST_APPROVAL_ID => max + 1,
        _ => FIRST_APPROVAL_ID,
    }
}

impl ApprovalRequest {
    /// A fresh pending request with its `submitted` history entry
    pub fn submit(
        id: i64,
        kind: ApprovalKind,
        target_id: impl Into<String>,
        submitted_by: Uuid,
        note: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        let history = vec![HistoryEntry {
            action: HistoryAction::Submitted,
            by: Some(submitted_by),
            note: Some(note.clone().unwrap_or_else(|| "Awaiting review".to_string())),
            at,
        }];

        Self {
            id,
            kind,
            target_id: target_id.into(),
            submitted_by,
            status: ApprovalStatus::Pending,
            notes: note,
            history,
            created_at: at,
            updated_at: at,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }

    /// Record a revision of the content under review
    pub fn record_update(
        &mut self,
        by: Uuid,
        note: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<HistoryEntry, TransitionError> {
        self.ensure_pending()?;
        let entry = HistoryEntry {
            action: HistoryAction::Updated,
            by: Some(by),
            note: Some(note.unwrap_or_else(|| "Updated draft".to_string())),
            at,
        };
        self.history.push(entry.clone());
        self.updated_at = at;
        Ok(entry)
    }

    /// Approve or reject a pending request
    pub fn decide(
        &mut self,
        decision: Decision,
        by: Uuid,
        note: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<HistoryEntry, TransitionError> {
        self.ensure_pending()?;
        let entry = HistoryEntry {
            action: decision.history_action(),
            by: Some(by),
            note: Some(note.unwrap_or_else(|| format!("Marked as {}", decision))),
            at,
        };
        self.status = decision.status();
        self.history.push(entry.clone());
        self.updated_at = at;
        Ok(entry)
    }

    fn ensure_pending(&self) -> Result<(), TransitionError> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(TransitionError::AlreadyDecided {
                id: self.id,
                status: self.status,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> ApprovalRequest {
        ApprovalRequest::submit(
            FIRST_APPROVAL_ID,
            ApprovalKind::Lesson,
            "lesson-abc",
            Uuid::new_v4(),
            None,
            Utc::now(),
        )
    }

    #[test]
    fn test_next_approval_id() {
        assert_eq!(next_approval_id(None), 1001);
        assert_eq!(next_approval_id(Some(1)), 1001);
        assert_eq!(next_approval_id(Some(1001)), 1002);
        assert_eq!(next_approval_id(Some(1500)), 1501);
    }

    #[test]
    fn test_submit_starts_pending_with_history() {
        let request = pending();
        assert!(request.is_pending());
        assert_eq!(request.history.len(), 1);
        assert_eq!(request.history[0].action, HistoryAction::Submitted);
        assert_eq!(request.history[0].note.as_deref(), Some("Awaiting review"));
        assert_eq!(request.history[0].by, Some(request.submitted_by));
    }

    #[test]
    fn test_submit_keeps_note() {
        let request = ApprovalRequest::submit(
            1002,
            ApprovalKind::Category,
            "cat",
            Uuid::new_v4(),
            Some("New category: Rust".to_string()),
            Utc::now(),
        );
        assert_eq!(request.notes.as_deref(), Some("New category: Rust"));
        assert_eq!(request.history[0].note.as_deref(), Some("New category: Rust"));
    }

    #[test]
    fn test_approve() {
        let mut request = pending();
        let admin = Uuid::new_v4();
        let entry = request
            .decide(Decision::Approved, admin, None, Utc::now())
            .unwrap();

        assert_eq!(request.status, ApprovalStatus::Approved);
        assert_eq!(entry.action, HistoryAction::Approved);
        assert_eq!(entry.by, Some(admin));
        assert_eq!(entry.note.as_deref(), Some("Marked as approved"));
        assert_eq!(request.history.len(), 2);
    }

    #[test]
    fn test_reject_with_note() {
        let mut request = pending();
        request
            .decide(
                Decision::Rejected,
                Uuid::new_v4(),
                Some("Needs examples".to_string()),
                Utc::now(),
            )
            .unwrap();
        assert_eq!(request.status, ApprovalStatus::Rejected);
        assert_eq!(request.history[1].note.as_deref(), Some("Needs examples"));
    }

    #[test]
    fn test_cannot_decide_twice() {
        let mut request = pending();
        request
            .decide(Decision::Approved, Uuid::new_v4(), None, Utc::now())
            .unwrap();

        let err = request
            .decide(Decision::Rejected, Uuid::new_v4(), None, Utc::now())
            .unwrap_err();
        assert_eq!(
            err,
            TransitionError::AlreadyDecided {
                id: FIRST_APPROVAL_ID,
                status: ApprovalStatus::Approved
            }
        );
        assert_eq!(request.status, ApprovalStatus::Approved);
        assert_eq!(request.history.len(), 2);
    }

    #[test]
    fn test_update_while_pending_appends_history() {
        let mut request = pending();
        let entry = request
            .record_update(request.submitted_by, None, Utc::now())
            .unwrap();
        assert_eq!(entry.action, HistoryAction::Updated);
        assert_eq!(entry.note.as_deref(), Some("Updated draft"));
        assert!(request.is_pending());
        assert_eq!(request.history.len(), 2);
    }

    #[test]
    fn test_update_after_decision_fails() {
        let mut request = pending();
        request
            .decide(Decision::Rejected, Uuid::new_v4(), None, Utc::now())
            .unwrap();
        assert!(request
            .record_update(request.submitted_by, None, Utc::now())
            .is_err());
    }

    #[test]
    fn test_transition_error_message() {
        let err = TransitionError::AlreadyDecided {
            id: 1003,
            status: ApprovalStatus::Rejected,
        };
        assert_eq!(err.to_string(), "Approval request 1003 is already rejected");
    }
}
