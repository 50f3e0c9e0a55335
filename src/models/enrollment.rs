// src/models/enrollment.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::certificate::Certificate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Active,
    Completed,
    Expired,
}

impl EnrollmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Completed => "completed",
            EnrollmentStatus::Expired => "expired",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(EnrollmentStatus::Active),
            "completed" => Some(EnrollmentStatus::Completed),
            "expired" => Some(EnrollmentStatus::Expired),
            _ => None,
        }
    }
}

/// Represents the 'enrollments' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: i64,
    pub user_id: i64,
    pub course_id: i64,
    /// Percentage of completed lessons, two decimals.
    pub progress: f64,
    pub status: String,
    pub enrolled_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Enrollment {
    /// Status as of `now`. A lapsed, unfinished enrollment reads as expired
    /// even before the stored column catches up.
    pub fn effective_status(&self, now: chrono::DateTime<chrono::Utc>) -> EnrollmentStatus {
        match EnrollmentStatus::parse(&self.status) {
            Some(EnrollmentStatus::Completed) => EnrollmentStatus::Completed,
            Some(EnrollmentStatus::Expired) => EnrollmentStatus::Expired,
            _ if self.expires_at.is_some_and(|at| at <= now) => EnrollmentStatus::Expired,
            _ => EnrollmentStatus::Active,
        }
    }
}

/// Represents the 'lesson_progress' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LessonProgress {
    pub id: i64,
    pub enrollment_id: i64,
    pub lesson_id: i64,
    pub watched_seconds: i32,
    pub completed: bool,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Enrollment row joined with its course title, for "my courses" lists and
/// organization reports.
#[derive(Debug, Serialize, FromRow)]
pub struct EnrollmentSummary {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub course_id: i64,
    pub course_title: String,
    pub progress: f64,
    pub status: String,
    pub enrolled_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecordProgressRequest {
    #[validate(range(min = 0, max = 86400))]
    pub watched_seconds: i32,
    /// Explicit completion, e.g. for text lessons.
    #[serde(default)]
    pub completed: bool,
}

/// Response to a lesson progress update.
#[derive(Debug, Serialize)]
pub struct ProgressResult {
    pub enrollment_id: i64,
    pub lesson_id: i64,
    pub watched_seconds: i32,
    pub lesson_completed: bool,
    pub completed_lessons: i64,
    pub total_lessons: i64,
    pub progress: f64,
    pub status: EnrollmentStatus,
    /// Present once the enrollment has a certificate.
    pub certificate: Option<Certificate>,
}

/// Full progress view of one enrollment.
#[derive(Debug, Serialize)]
pub struct EnrollmentProgress {
    #[serde(flatten)]
    pub enrollment: Enrollment,
    pub completed_lessons: i64,
    pub total_lessons: i64,
    /// Watched seconds over total video seconds, as a percentage.
    pub watch_time_progress: f64,
    pub lessons: Vec<LessonProgress>,
}
