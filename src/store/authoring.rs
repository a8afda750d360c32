//! Instructor drafts, the studio overview and category suggestions
//!
//! Every create or update goes back through review: the content is marked
//! pending and its approval request is opened or extended in the same
//! transaction.

use chrono::Utc;
use uuid::Uuid;

use super::approvals::{open_approval, submit_revision};
use super::catalog::{write_lesson, write_quiz};
use super::Store;
use crate::error::{AppError, Result};
use crate::models::{
    ApprovalKind, ApprovalRequest, ApprovalStatus, CategorySuggestion, Challenge, ContentStatus,
    Course, Lesson, LessonBlock, LessonOrder, Quiz, QuizQuestion,
};
use crate::validation::{generate_content_id, slugify};
use crate::views::{InstructorApprovalView, LessonStudioView, QuizStudioView, Studio};

#[derive(Debug, Clone, Default)]
pub struct LessonDraft {
    pub title: String,
    pub course_id: Option<String>,
    pub level: Option<String>,
    pub duration: Option<String>,
    pub notes: Option<String>,
    pub blocks: Vec<LessonBlock>,
    pub challenge: Option<Challenge>,
}

/// Changes to a lesson draft; `None` leaves a field as it is
#[derive(Debug, Clone, Default)]
pub struct LessonPatch {
    pub title: Option<String>,
    pub course_id: Option<String>,
    pub level: Option<String>,
    pub duration: Option<String>,
    pub notes: Option<String>,
    pub blocks: Option<Vec<LessonBlock>>,
    pub challenge: Option<Challenge>,
}

#[derive(Debug, Clone, Default)]
pub struct QuizDraft {
    pub title: String,
    pub course_id: Option<String>,
    pub description: String,
    pub notes: Option<String>,
    pub questions: Vec<QuizQuestion>,
}

/// Changes to a quiz draft; `None` leaves a field as it is
#[derive(Debug, Clone, Default)]
pub struct QuizPatch {
    pub title: Option<String>,
    pub course_id: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub questions: Option<Vec<QuizQuestion>>,
}

fn breadcrumb(course: Option<&Course>, title: &str) -> Vec<String> {
    match course {
        Some(course) => vec!["Courses".to_string(), course.title.clone(), title.to_string()],
        None => vec!["Instructor".to_string(), title.to_string()],
    }
}

fn ensure_owner(owner_id: Uuid, user_id: Uuid) -> Result<()> {
    if owner_id == user_id {
        Ok(())
    } else {
        Err(AppError::forbidden("You can only modify your own drafts"))
    }
}

impl Store {
    async fn resolve_course(&self, course_id: Option<&str>) -> Result<Option<Course>> {
        match course_id {
            Some(id) => Ok(Some(self.get_course(id).await?)),
            None => Ok(None),
        }
    }

    async fn approval_view(&self, id: Option<i64>) -> Result<Option<InstructorApprovalView>> {
        match id {
            Some(id) => Ok(self.find_approval(id).await?.map(Into::into)),
            None => Ok(None),
        }
    }

    async fn lesson_studio_view(&self, lesson: Lesson) -> Result<LessonStudioView> {
        let course = self.lesson_course_title(&lesson).await?;
        let approval = self.approval_view(lesson.approval_id).await?;
        Ok(LessonStudioView {
            id: lesson.id,
            title: lesson.title,
            status: lesson.status,
            level: lesson.level,
            duration: lesson.duration,
            course,
            course_id: lesson.course_id,
            version: lesson.version,
            updated_at: lesson.updated_at,
            blocks: lesson.blocks,
            challenge: lesson.challenge,
            approval,
        })
    }

    async fn quiz_studio_view(&self, quiz: Quiz) -> Result<QuizStudioView> {
        let course = self.quiz_course_title(&quiz).await?;
        let approval = self.approval_view(quiz.approval_id).await?;
        Ok(QuizStudioView {
            id: quiz.id,
            title: quiz.title,
            status: quiz.status,
            course,
            course_id: quiz.course_id,
            description: quiz.description,
            questions: quiz.questions,
            updated_at: quiz.updated_at,
            approval,
        })
    }

    /// The instructor's own lessons, quizzes and approval requests
    pub async fn instructor_studio(&self, owner_id: Uuid) -> Result<Studio> {
        let mut lessons = Vec::new();
        for lesson in self.lessons_by_owner(owner_id).await? {
            lessons.push(self.lesson_studio_view(lesson).await?);
        }

        let mut quizzes = Vec::new();
        for quiz in self.quizzes_by_owner(owner_id).await? {
            quizzes.push(self.quiz_studio_view(quiz).await?);
        }

        let approvals = self
            .approvals_by_submitter(owner_id)
            .await?
            .into_iter()
            .map(InstructorApprovalView::from)
            .collect();

        Ok(Studio {
            lessons,
            quizzes,
            approvals,
        })
    }

    pub async fn create_lesson_draft(
        &self,
        owner_id: Uuid,
        draft: LessonDraft,
    ) -> Result<LessonStudioView> {
        let course = self.resolve_course(draft.course_id.as_deref()).await?;
        let now = Utc::now();
        let id = generate_content_id("lesson");

        let mut tx = self.pool.begin().await?;
        let request = open_approval(&mut tx, ApprovalKind::Lesson, &id, owner_id, draft.notes).await?;

        let lesson = Lesson {
            slug: slugify(&draft.title),
            breadcrumb: breadcrumb(course.as_ref(), &draft.title),
            id,
            title: draft.title,
            course_id: course.map(|c| c.id),
            owner_id,
            collaborators: vec![owner_id],
            level: draft.level.unwrap_or_else(|| "Beginner".to_string()),
            duration: draft.duration.unwrap_or_else(|| "15 min read".to_string()),
            order: LessonOrder::default(),
            blocks: draft.blocks,
            challenge: draft.challenge,
            status: ContentStatus::Pending,
            approval_id: Some(request.id),
            categories: vec![],
            version: 1,
            created_at: now,
            updated_at: now,
        };
        write_lesson(&mut tx, &lesson).await?;
        tx.commit().await?;

        tracing::info!("Lesson draft {} submitted by {} (approval {})", lesson.id, owner_id, request.id);
        self.lesson_studio_view(lesson).await
    }

    pub async fn update_lesson_draft(
        &self,
        user_id: Uuid,
        lesson_id: &str,
        patch: LessonPatch,
    ) -> Result<LessonStudioView> {
        let mut lesson = self.get_lesson(lesson_id).await?;
        ensure_owner(lesson.owner_id, user_id)?;

        let course = match patch.course_id.as_deref() {
            Some(id) => Some(self.get_course(id).await?),
            None => self.find_course_opt(lesson.course_id.as_deref()).await?,
        };
        if let Some(course) = &course {
            lesson.course_id = Some(course.id.clone());
        }
        if let Some(title) = patch.title {
            lesson.slug = slugify(&title);
            lesson.title = title;
        }
        if let Some(level) = patch.level {
            lesson.level = level;
        }
        if let Some(duration) = patch.duration {
            lesson.duration = duration;
        }
        if let Some(blocks) = patch.blocks {
            lesson.blocks = blocks;
        }
        if let Some(challenge) = patch.challenge {
            lesson.challenge = Some(challenge);
        }
        lesson.breadcrumb = breadcrumb(course.as_ref(), &lesson.title);
        lesson.status = ContentStatus::Pending;
        lesson.version += 1;
        lesson.updated_at = Utc::now();

        let mut tx = self.pool.begin().await?;
        let approval_id = submit_revision(
            &mut tx,
            lesson.approval_id,
            ApprovalKind::Lesson,
            &lesson.id,
            user_id,
            patch.notes,
        )
        .await?;
        lesson.approval_id = Some(approval_id);
        write_lesson(&mut tx, &lesson).await?;
        tx.commit().await?;

        tracing::info!("Lesson draft {} revised to version {}", lesson.id, lesson.version);
        self.lesson_studio_view(lesson).await
    }

    pub async fn create_quiz_draft(&self, owner_id: Uuid, draft: QuizDraft) -> Result<QuizStudioView> {
        let course = self.resolve_course(draft.course_id.as_deref()).await?;
        let now = Utc::now();
        let id = generate_content_id("quiz");

        let mut tx = self.pool.begin().await?;
        let request = open_approval(&mut tx, ApprovalKind::Quiz, &id, owner_id, draft.notes).await?;

        let quiz = Quiz {
            id,
            title: draft.title,
            description: draft.description,
            course_id: course.map(|c| c.id),
            owner_id,
            collaborators: vec![owner_id],
            questions: draft.questions,
            status: ContentStatus::Pending,
            approval_id: Some(request.id),
            created_at: now,
            updated_at: now,
        };
        write_quiz(&mut tx, &quiz).await?;
        tx.commit().await?;

        tracing::info!("Quiz draft {} submitted by {} (approval {})", quiz.id, owner_id, request.id);
        self.quiz_studio_view(quiz).await
    }

    pub async fn update_quiz_draft(
        &self,
        user_id: Uuid,
        quiz_id: &str,
        patch: QuizPatch,
    ) -> Result<QuizStudioView> {
        let mut quiz = self.get_quiz(quiz_id).await?;
        ensure_owner(quiz.owner_id, user_id)?;

        if let Some(course) = self.resolve_course(patch.course_id.as_deref()).await? {
            quiz.course_id = Some(course.id);
        }
        if let Some(title) = patch.title {
            quiz.title = title;
        }
        if let Some(description) = patch.description {
            quiz.description = description;
        }
        if let Some(questions) = patch.questions {
            quiz.questions = questions;
        }
        quiz.status = ContentStatus::Pending;
        quiz.updated_at = Utc::now();

        let mut tx = self.pool.begin().await?;
        let approval_id = submit_revision(
            &mut tx,
            quiz.approval_id,
            ApprovalKind::Quiz,
            &quiz.id,
            user_id,
            patch.notes,
        )
        .await?;
        quiz.approval_id = Some(approval_id);
        write_quiz(&mut tx, &quiz).await?;
        tx.commit().await?;

        tracing::info!("Quiz draft {} revised", quiz.id);
        self.quiz_studio_view(quiz).await
    }

    async fn find_course_opt(&self, id: Option<&str>) -> Result<Option<Course>> {
        match id {
            Some(id) => self.find_course(id).await,
            None => Ok(None),
        }
    }

    /// Propose a new content category; it stays pending until an admin decides
    pub async fn create_category_suggestion(
        &self,
        user_id: Uuid,
        name: &str,
        description: &str,
    ) -> Result<CategorySuggestion> {
        let now = Utc::now();
        let id = Uuid::new_v4();

        let mut tx = self.pool.begin().await?;
        let request = open_approval(
            &mut tx,
            ApprovalKind::Category,
            &id.to_string(),
            user_id,
            Some(description.to_string()),
        )
        .await?;

        sqlx::query(
            r#"
            INSERT INTO category_suggestions (id, name, description, submitted_by, status, approval_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(name)
        .bind(description)
        .bind(user_id.to_string())
        .bind(ApprovalStatus::Pending.as_str())
        .bind(request.id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!("Category suggestion {:?} submitted by {}", name, user_id);

        Ok(CategorySuggestion {
            id,
            name: name.to_string(),
            description: description.to_string(),
            status: ApprovalStatus::Pending,
            submitted_by: user_id,
            approval_id: Some(request.id),
            created_at: now,
            updated_at: now,
        })
    }

    /// Open a pending request for content that already exists, e.g. seeded lessons
    pub async fn request_approval(
        &self,
        kind: ApprovalKind,
        target_id: &str,
        submitted_by: Uuid,
        note: Option<String>,
    ) -> Result<ApprovalRequest> {
        let mut tx = self.pool.begin().await?;
        let request = open_approval(&mut tx, kind, target_id, submitted_by, note).await?;
        tx.commit().await?;
        Ok(request)
    }
}
