//! Demo content for local development
//!
//! `academy seed` wipes every table and loads a small, consistent data set:
//! one account per role (password `password123`), a published course with
//! one lesson and one quiz, and enough moderation and collaboration history
//! for each screen of the client to have something to show.

use chrono::Utc;

use crate::auth::hash_password;
use crate::error::Result;
use crate::models::{
    ApprovalKind, Challenge, ContentStatus, Course, CourseStatus, Decision, Feedback, Lesson,
    LessonBlock, LessonOrder, Quiz, QuizQuestion, Recommendation, Role, Topic, Visibility,
};
use crate::store::{NewWorkspace, Store};

pub const DEMO_PASSWORD: &str = "password123";

pub const COURSE_ID: &str = "course-js";
pub const LESSON_ID: &str = "lesson-js-variables";
pub const QUIZ_ID: &str = "quiz-js-fundamentals";

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn lesson_blocks() -> Vec<LessonBlock> {
    vec![
        LessonBlock {
            heading: "Understanding Variables".to_string(),
            copy: "Variables store data values and can be declared using let, const, or var."
                .to_string(),
            code: r#"let userName = "John Doe";"#.to_string(),
            list: Vec::new(),
        },
        LessonBlock {
            heading: "Primitive Types".to_string(),
            list: strings(&["String", "Number", "Boolean", "Undefined", "Null"]),
            ..Default::default()
        },
        LessonBlock {
            heading: "Complex Types".to_string(),
            list: strings(&["Object", "Array", "Function", "Date"]),
            ..Default::default()
        },
    ]
}

fn quiz_questions() -> Vec<QuizQuestion> {
    vec![
        QuizQuestion {
            id: "q1".to_string(),
            prompt: "Which keyword declares a variable whose value cannot be reassigned?"
                .to_string(),
            options: strings(&["let", "var", "const", "static"]),
            answer: 2,
            explanation: "const creates a read-only binding.".to_string(),
            correct_feedback: "Correct! const prevents reassignment.".to_string(),
            incorrect_feedback: "Incorrect. Remember that const locks the identifier.".to_string(),
        },
        QuizQuestion {
            id: "q2".to_string(),
            prompt: "Which method converts JSON text into a JavaScript object?".to_string(),
            options: strings(&["JSON.stringify", "JSON.parse", "Object.fromJSON", "JSON.toObject"]),
            answer: 1,
            explanation: "JSON.parse converts JSON strings into objects.".to_string(),
            correct_feedback: "Correct! JSON.parse reads JSON text.".to_string(),
            incorrect_feedback: "Incorrect. JSON.stringify turns objects into strings.".to_string(),
        },
    ]
}

/// Reset the database and load the demo data set
pub async fn run(store: &Store, bcrypt_cost: u32) -> Result<()> {
    store.reset().await?;
    let now = Utc::now();

    let password_hash = hash_password(DEMO_PASSWORD.to_string(), bcrypt_cost).await?;
    let admin = store
        .create_user("Admin", "admin@gmail.com", &password_hash, Role::Admin)
        .await?;
    let instructor = store
        .create_user("Instructor", "instructor@gmail.com", &password_hash, Role::Instructor)
        .await?;
    let student = store
        .create_user("Student", "student@gmail.com", &password_hash, Role::Student)
        .await?;

    store
        .insert_course(&Course {
            id: COURSE_ID.to_string(),
            title: "JavaScript Fundamentals".to_string(),
            description: "Chapter 5: Functions and Scope".to_string(),
            level: "Intermediate".to_string(),
            duration_minutes: 180,
            topics: strings(&["Web Development"]),
            status: CourseStatus::Published,
            created_at: now,
            updated_at: now,
        })
        .await?;

    // The lesson is reviewed like any other draft, so open its request first
    let approval = store
        .request_approval(
            ApprovalKind::Lesson,
            LESSON_ID,
            instructor.id,
            Some("Initial content submission.".to_string()),
        )
        .await?;

    store
        .insert_lesson(&Lesson {
            id: LESSON_ID.to_string(),
            title: "Variables and Data Types".to_string(),
            slug: "variables-and-data-types".to_string(),
            course_id: Some(COURSE_ID.to_string()),
            owner_id: instructor.id,
            collaborators: vec![instructor.id, admin.id],
            level: "Beginner".to_string(),
            duration: "15 min read".to_string(),
            breadcrumb: strings(&["Courses", "JavaScript Fundamentals", "Variables and Data Types"]),
            order: LessonOrder { current: 3, total: 12 },
            blocks: lesson_blocks(),
            challenge: Some(Challenge {
                prompt: Some(
                    "Create variables for a user profile including name, age, email, and active status."
                        .to_string(),
                ),
                fields: strings(&["name", "age", "email", "active"]),
            }),
            status: ContentStatus::Pending,
            approval_id: Some(approval.id),
            categories: Vec::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        })
        .await?;

    store
        .decide_approval(
            approval.id,
            Decision::Approved,
            admin.id,
            Some("Looks great!".to_string()),
        )
        .await?;

    store
        .insert_quiz(&Quiz {
            id: QUIZ_ID.to_string(),
            title: "JavaScript Fundamentals".to_string(),
            description: "Test your knowledge of JavaScript basics".to_string(),
            course_id: Some(COURSE_ID.to_string()),
            owner_id: instructor.id,
            collaborators: vec![instructor.id],
            questions: quiz_questions(),
            status: ContentStatus::Published,
            approval_id: None,
            created_at: now,
            updated_at: now,
        })
        .await?;

    store
        .insert_feedback(&Feedback {
            id: uuid::Uuid::new_v4(),
            lesson_id: LESSON_ID.to_string(),
            student_id: student.id,
            content: "Loved the clarity on primitives vs objects!".to_string(),
            rating: 5,
            visibility: Visibility::Shared,
            created_at: now,
            updated_at: now,
        })
        .await?;

    let workspace = store
        .create_workspace(
            instructor.id,
            NewWorkspace {
                title: "Lesson Enhancements".to_string(),
                lesson_id: Some(LESSON_ID.to_string()),
                notes: Some("Track improvements for next release.".to_string()),
                member_ids: vec![admin.id],
            },
        )
        .await?;
    store
        .post_workspace_thread(
            instructor.id,
            workspace.id,
            "Can we add a section on template literals?",
        )
        .await?;
    store
        .post_workspace_thread(
            admin.id,
            workspace.id,
            "Yes, adding to backlog. Also cover let vs var edge cases.",
        )
        .await?;

    store
        .create_category_suggestion(
            instructor.id,
            "AI Ethics",
            "Content focused on responsible AI patterns.",
        )
        .await?;

    for topic in demo_topics() {
        store.insert_topic(&topic).await?;
    }
    for recommendation in demo_recommendations() {
        store.insert_recommendation(&recommendation).await?;
    }

    store
        .push_activity(student.id, r#"Completed "Arrays and Objects" lesson"#)
        .await?;

    tracing::info!(
        "Seeded demo data: admin {}, instructor {}, student {}",
        admin.email,
        instructor.email,
        student.email
    );
    Ok(())
}

fn demo_topics() -> Vec<Topic> {
    vec![
        Topic {
            id: 1,
            name: "Web Development".to_string(),
            courses: 18,
            lessons: strings(&["Modern HTML", "Responsive Layouts", "Intro to React"]),
            quizzes: strings(&["Flexbox", "React Basics"]),
        },
        Topic {
            id: 2,
            name: "Data Science".to_string(),
            courses: 21,
            lessons: strings(&["Data Cleaning", "Model Evaluation"]),
            quizzes: strings(&["Probability"]),
        },
    ]
}

fn demo_recommendations() -> Vec<Recommendation> {
    vec![
        Recommendation {
            id: 1,
            label: "React Advanced Patterns".to_string(),
            meta: "4.8★ • 12h".to_string(),
            lessons: strings(&["Render Props", "Compound Components"]),
            quizzes: strings(&["Hooks Deep Dive"]),
        },
        Recommendation {
            id: 2,
            label: "Node.js Backend".to_string(),
            meta: "4.9★ • 16h".to_string(),
            lessons: strings(&["API Hardening", "Streaming"]),
            quizzes: strings(&["Event Loop"]),
        },
    ]
}
