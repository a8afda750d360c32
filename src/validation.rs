//! Request field validation and content sanitizing
//!
//! Handlers receive loosely typed JSON; these helpers turn it into checked
//! values and produce `400` errors naming the offending field.

use std::str::FromStr;
use std::sync::LazyLock;

use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{Challenge, LessonBlock, QuizQuestion};

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

/// Trimmed string of at least `min_len` characters
pub fn required_string(value: Option<&str>, field: &str, min_len: usize) -> Result<String> {
    let value = value.ok_or_else(|| AppError::bad_request(format!("{} is required", field)))?;
    let trimmed = value.trim();
    if trimmed.chars().count() < min_len.max(1) {
        if trimmed.is_empty() && min_len <= 1 {
            return Err(AppError::bad_request(format!("{} is required", field)));
        }
        return Err(AppError::bad_request(format!(
            "{} must be at least {} characters",
            field, min_len
        )));
    }
    Ok(trimmed.to_string())
}

/// Trimmed string, `None` when absent or blank
pub fn optional_string(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Password of at least `min_len` characters; whitespace is significant
pub fn password(value: Option<&str>, min_len: usize) -> Result<String> {
    let value = value.ok_or_else(|| AppError::bad_request("password is required"))?;
    if value.chars().count() < min_len {
        return Err(AppError::bad_request(format!(
            "password must be at least {} characters",
            min_len
        )));
    }
    Ok(value.to_string())
}

/// Lower-cased, syntactically plausible email address
pub fn email(value: Option<&str>, field: &str) -> Result<String> {
    let value = required_string(value, field, 1)?;
    if !is_valid_email(&value) {
        return Err(AppError::bad_request(format!(
            "{} must be a valid email address",
            field
        )));
    }
    Ok(value.to_lowercase())
}

fn is_valid_email(value: &str) -> bool {
    EMAIL.is_match(value)
}

/// One of the allowed enum values
pub fn one_of<T>(value: Option<&str>, field: &str, allowed: &[T]) -> Result<T>
where
    T: FromStr + Copy + std::fmt::Display,
{
    let value = value.ok_or_else(|| AppError::bad_request(format!("{} is required", field)))?;
    value.parse::<T>().map_err(|_| {
        let names: Vec<String> = allowed.iter().map(|v| v.to_string()).collect();
        AppError::bad_request(format!("{} must be one of: {}", field, names.join(", ")))
    })
}

/// Constraints for [`number`]
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberRule {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub integer: bool,
}

impl NumberRule {
    pub fn integer(min: Option<i64>, max: Option<i64>) -> Self {
        Self {
            min: min.map(|v| v as f64),
            max: max.map(|v| v as f64),
            integer: true,
        }
    }

    pub fn range(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            integer: false,
        }
    }
}

/// A JSON number, or a string holding one
pub fn number(value: Option<&Value>, field: &str, rule: NumberRule) -> Result<f64> {
    let parsed = match value {
        None | Some(Value::Null) => {
            return Err(AppError::bad_request(format!("{} is required", field)))
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            return Err(AppError::bad_request(format!("{} is required", field)))
        }
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    let num = parsed
        .filter(|n| n.is_finite())
        .ok_or_else(|| AppError::bad_request(format!("{} must be a number", field)))?;

    if rule.integer && num.fract() != 0.0 {
        return Err(AppError::bad_request(format!("{} must be an integer", field)));
    }
    if let Some(min) = rule.min {
        if num < min {
            return Err(AppError::bad_request(format!(
                "{} must be greater than or equal to {}",
                field, min
            )));
        }
    }
    if let Some(max) = rule.max {
        if num > max {
            return Err(AppError::bad_request(format!(
                "{} must be less than or equal to {}",
                field, max
            )));
        }
    }
    Ok(num)
}

/// Like [`number`] with an integer rule, returned as `i64`
pub fn integer(value: Option<&Value>, field: &str, min: Option<i64>, max: Option<i64>) -> Result<i64> {
    number(value, field, NumberRule::integer(min, max)).map(|n| n as i64)
}

/// `true`/`false`, also accepted as strings
pub fn boolean(value: Option<&Value>, field: &str) -> Result<bool> {
    match value {
        None | Some(Value::Null) => Err(AppError::bad_request(format!("{} is required", field))),
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::String(s)) if s == "true" => Ok(true),
        Some(Value::String(s)) if s == "false" => Ok(false),
        Some(_) => Err(AppError::bad_request(format!("{} must be true or false", field))),
    }
}

/// URL-friendly slug of at most 60 characters, `draft` when nothing is left
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;
    for c in value.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    let slug: String = slug.chars().take(60).collect();
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "draft".to_string()
    } else {
        slug
    }
}

/// Identifier for instructor-authored content, e.g. `lesson-lx3k9q2a-f0a1`
pub fn generate_content_id(prefix: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(4)
        .map(|c| (c as char).to_ascii_lowercase())
        .collect();
    format!("{}-{}-{}", prefix, to_base36(millis), suffix)
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Lesson block as submitted by an instructor
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockInput {
    pub heading: Option<String>,
    pub copy: Option<String>,
    pub code: Option<String>,
    pub list: Option<Vec<String>>,
}

pub fn sanitize_blocks(blocks: Option<Vec<BlockInput>>) -> Vec<LessonBlock> {
    blocks
        .unwrap_or_default()
        .into_iter()
        .map(|block| LessonBlock {
            heading: block.heading.map(|s| s.trim().to_string()).unwrap_or_default(),
            copy: block.copy.map(|s| s.trim().to_string()).unwrap_or_default(),
            code: block.code.unwrap_or_default(),
            list: block
                .list
                .unwrap_or_default()
                .iter()
                .filter_map(|item| optional_string(Some(item)))
                .collect(),
        })
        .collect()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChallengeInput {
    pub prompt: Option<String>,
    pub fields: Option<Vec<String>>,
}

/// `None` when the challenge has neither a prompt nor fields
pub fn sanitize_challenge(challenge: Option<ChallengeInput>) -> Option<Challenge> {
    let challenge = challenge?;
    let prompt = optional_string(challenge.prompt.as_deref());
    let fields: Vec<String> = challenge
        .fields
        .unwrap_or_default()
        .iter()
        .filter_map(|f| optional_string(Some(f)))
        .collect();
    if prompt.is_none() && fields.is_empty() {
        return None;
    }
    Some(Challenge { prompt, fields })
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionInput {
    pub id: Option<String>,
    pub prompt: Option<String>,
    pub options: Option<Vec<String>>,
    pub answer: Option<Value>,
    pub explanation: Option<String>,
    pub correct_feedback: Option<String>,
    pub incorrect_feedback: Option<String>,
}

/// At least one question, each with a prompt, two or more options and an
/// answer index pointing at one of them
pub fn sanitize_questions(questions: Option<Vec<QuestionInput>>) -> Result<Vec<QuizQuestion>> {
    let questions = questions.unwrap_or_default();
    if questions.is_empty() {
        return Err(AppError::bad_request(
            "questions must include at least one item",
        ));
    }

    questions
        .into_iter()
        .enumerate()
        .map(|(index, question)| {
            let prompt = required_string(
                question.prompt.as_deref(),
                &format!("questions[{}].prompt", index),
                3,
            )?;
            let options = question
                .options
                .unwrap_or_default()
                .iter()
                .enumerate()
                .map(|(opt, option)| {
                    required_string(
                        Some(option),
                        &format!("questions[{}].options[{}]", index, opt),
                        1,
                    )
                })
                .collect::<Result<Vec<_>>>()?;
            if options.len() < 2 {
                return Err(AppError::bad_request(format!(
                    "questions[{}] must include at least two options",
                    index
                )));
            }
            let answer = integer(
                question.answer.as_ref(),
                &format!("questions[{}].answer", index),
                Some(0),
                Some(options.len() as i64 - 1),
            )?;

            Ok(QuizQuestion {
                id: optional_string(question.id.as_deref())
                    .unwrap_or_else(|| format!("q{}", index + 1)),
                prompt,
                options,
                answer,
                explanation: question.explanation.unwrap_or_default(),
                correct_feedback: question.correct_feedback.unwrap_or_default(),
                incorrect_feedback: question.incorrect_feedback.unwrap_or_default(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserStatus;
    use serde_json::json;

    fn message(err: AppError) -> String {
        match err {
            AppError::BadRequest { message, .. } => message,
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_required_string() {
        assert_eq!(required_string(Some("  Ada "), "name", 2).unwrap(), "Ada");
        assert_eq!(
            message(required_string(None, "name", 2).unwrap_err()),
            "name is required"
        );
        assert_eq!(
            message(required_string(Some(" a "), "name", 2).unwrap_err()),
            "name must be at least 2 characters"
        );
        assert_eq!(
            message(required_string(Some("   "), "lessonId", 1).unwrap_err()),
            "lessonId is required"
        );
    }

    #[test]
    fn test_optional_string() {
        assert_eq!(optional_string(Some(" x ")), Some("x".to_string()));
        assert_eq!(optional_string(Some("  ")), None);
        assert_eq!(optional_string(None), None);
    }

    #[test]
    fn test_password_keeps_whitespace() {
        assert_eq!(password(Some(" secret "), 6).unwrap(), " secret ");
        assert_eq!(
            message(password(Some("abc"), 6).unwrap_err()),
            "password must be at least 6 characters"
        );
    }

    #[test]
    fn test_email() {
        assert_eq!(
            email(Some(" Ada@Example.COM "), "email").unwrap(),
            "ada@example.com"
        );
        for bad in ["ada", "ada@", "@x.io", "ada@example", "a b@x.io", "a@b@c.io", "ada@.io", "ada@io."] {
            assert!(email(Some(bad), "email").is_err(), "{} accepted", bad);
        }
    }

    #[test]
    fn test_email_whitespace_and_dotless_domain() {
        assert!(email(Some("ada lovelace@example.com"), "email").is_err());
        assert!(email(Some("ada\tl@example.com"), "email").is_err());
        assert!(email(Some("ada@localhost"), "email").is_err());
        assert_eq!(
            email(Some("ada.l+course@mail.example.co"), "email").unwrap(),
            "ada.l+course@mail.example.co"
        );
    }

    #[test]
    fn test_one_of() {
        let status: UserStatus = one_of(Some("Suspended"), "status", UserStatus::ALL).unwrap();
        assert_eq!(status, UserStatus::Suspended);
        assert_eq!(
            message(one_of::<UserStatus>(Some("gone"), "status", UserStatus::ALL).unwrap_err()),
            "status must be one of: Active, Pending, Suspended"
        );
    }

    #[test]
    fn test_number_rules() {
        let rule = NumberRule::range(0.0, 100.0);
        assert_eq!(number(Some(&json!(42.5)), "percent", rule).unwrap(), 42.5);
        assert_eq!(number(Some(&json!("80")), "percent", rule).unwrap(), 80.0);
        assert_eq!(
            message(number(Some(&json!(101)), "percent", rule).unwrap_err()),
            "percent must be less than or equal to 100"
        );
        assert_eq!(
            message(number(Some(&json!("abc")), "percent", rule).unwrap_err()),
            "percent must be a number"
        );
        assert_eq!(
            message(number(None, "percent", rule).unwrap_err()),
            "percent is required"
        );
    }

    #[test]
    fn test_integer() {
        assert_eq!(integer(Some(&json!(3)), "rating", Some(1), Some(5)).unwrap(), 3);
        assert_eq!(
            message(integer(Some(&json!(2.5)), "rating", Some(1), Some(5)).unwrap_err()),
            "rating must be an integer"
        );
        assert_eq!(
            message(integer(Some(&json!(0)), "rating", Some(1), Some(5)).unwrap_err()),
            "rating must be greater than or equal to 1"
        );
    }

    #[test]
    fn test_boolean() {
        assert!(boolean(Some(&json!(true)), "bookmarked").unwrap());
        assert!(!boolean(Some(&json!("false")), "bookmarked").unwrap());
        assert!(boolean(Some(&json!(1)), "bookmarked").is_err());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Variables and Data Types"), "variables-and-data-types");
        assert_eq!(slugify("  Hello, World!! "), "hello-world");
        assert_eq!(slugify("***"), "draft");
        assert!(slugify(&"a ".repeat(100)).len() <= 60);
        assert!(!slugify(&"ab ".repeat(40)).ends_with('-'));
    }

    #[test]
    fn test_generate_content_id() {
        let id = generate_content_id("lesson");
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "lesson");
        assert_eq!(parts[2].len(), 4);
        assert_ne!(generate_content_id("quiz"), generate_content_id("quiz"));
    }

    #[test]
    fn test_to_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn test_sanitize_blocks() {
        let blocks = sanitize_blocks(Some(vec![BlockInput {
            heading: Some("  Intro ".into()),
            copy: None,
            code: Some("  let x = 1;".into()),
            list: Some(vec!["a".into(), "  ".into(), " b ".into()]),
        }]));
        assert_eq!(blocks[0].heading, "Intro");
        assert_eq!(blocks[0].code, "  let x = 1;");
        assert_eq!(blocks[0].list, vec!["a", "b"]);
        assert!(sanitize_blocks(None).is_empty());
    }

    #[test]
    fn test_sanitize_challenge() {
        assert!(sanitize_challenge(Some(ChallengeInput::default())).is_none());
        let challenge = sanitize_challenge(Some(ChallengeInput {
            prompt: None,
            fields: Some(vec!["name".into(), "".into()]),
        }))
        .unwrap();
        assert_eq!(challenge.fields, vec!["name"]);
    }

    #[test]
    fn test_sanitize_questions() {
        let questions = sanitize_questions(Some(vec![QuestionInput {
            prompt: Some("What is 2 + 2?".into()),
            options: Some(vec!["3".into(), "4".into()]),
            answer: Some(json!(1)),
            ..Default::default()
        }]))
        .unwrap();
        assert_eq!(questions[0].id, "q1");
        assert_eq!(questions[0].answer, 1);
    }

    #[test]
    fn test_sanitize_questions_errors() {
        assert_eq!(
            message(sanitize_questions(None).unwrap_err()),
            "questions must include at least one item"
        );
        assert_eq!(
            message(
                sanitize_questions(Some(vec![QuestionInput {
                    prompt: Some("Pick one".into()),
                    options: Some(vec!["only".into()]),
                    answer: Some(json!(0)),
                    ..Default::default()
                }]))
                .unwrap_err()
            ),
            "questions[0] must include at least two options"
        );
        assert_eq!(
            message(
                sanitize_questions(Some(vec![QuestionInput {
                    prompt: Some("Pick one".into()),
                    options: Some(vec!["a".into(), "b".into()]),
                    answer: Some(json!(2)),
                    ..Default::default()
                }]))
                .unwrap_err()
            ),
            "questions[0].answer must be less than or equal to 1"
        );
    }
}
