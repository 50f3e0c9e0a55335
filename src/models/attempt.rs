// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};

/// A learner's answer: one option id, or a list of option ids for
/// multiple-choice questions. Short answers travel as a single string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Single(String),
    Multiple(Vec<String>),
}

impl AnswerValue {
    pub fn as_slice(&self) -> &[String] {
        match self {
            AnswerValue::Single(id) => std::slice::from_ref(id),
            AnswerValue::Multiple(ids) => ids,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: i64,
    pub answer: AnswerValue,
}

/// DTO for submitting a quiz attempt.
#[derive(Debug, Deserialize)]
pub struct SubmitQuizRequest {
    pub answers: Vec<SubmittedAnswer>,
    /// When the learner opened the quiz. Defaults to submission time.
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Per-question outcome stored with the attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question_id: i64,
    pub correct: bool,
    pub points_earned: i32,
    pub points_possible: i32,
}

/// Represents the 'quiz_attempts' table. Rows are never updated.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QuizAttempt {
    pub id: i64,
    pub quiz_id: i64,
    pub user_id: i64,
    pub answers: Json<Vec<SubmittedAnswer>>,
    pub results: Json<Vec<QuestionResult>>,
    pub score: i32,
    pub max_score: i32,
    pub percentage: f64,
    pub passed: bool,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

/// Response to a quiz submission.
#[derive(Debug, Serialize)]
pub struct AttemptResult {
    pub attempt_id: i64,
    pub quiz_id: i64,
    pub score: i32,
    pub max_score: i32,
    pub percentage: f64,
    pub passed: bool,
    pub passing_score: i32,
    pub results: Vec<QuestionResult>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

impl AttemptResult {
    pub fn from_attempt(attempt: QuizAttempt, passing_score: i32) -> Self {
        AttemptResult {
            attempt_id: attempt.id,
            quiz_id: attempt.quiz_id,
            score: attempt.score,
            max_score: attempt.max_score,
            percentage: attempt.percentage,
            passed: attempt.passed,
            passing_score,
            results: attempt.results.0,
            started_at: attempt.started_at,
            completed_at: attempt.completed_at,
        }
    }
}

/// Admin listing row: attempt joined with the learner's username.
#[derive(Debug, Serialize, FromRow)]
pub struct AttemptSummary {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub score: i32,
    pub max_score: i32,
    pub percentage: f64,
    pub passed: bool,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}
