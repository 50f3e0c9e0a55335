// src/models/course.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::utils::validate::{validate_http_url, validate_slug};

/// Represents the 'courses' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,

    /// Set for organization-private courses; `None` means public catalog.
    pub organization_id: Option<i64>,

    pub is_published: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Course {
    /// Whether a learner from `organization_id` may see and enroll in this course.
    pub fn visible_to(&self, organization_id: Option<i64>) -> bool {
        self.is_published
            && match self.organization_id {
                None => true,
                Some(owner) => organization_id == Some(owner),
            }
    }
}

/// Represents the 'modules' table. An ordered group of lessons.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Module {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub position: i32,
}

/// Represents the 'lessons' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Lesson {
    pub id: i64,
    pub module_id: i64,
    pub title: String,
    /// Sanitized HTML.
    pub content: String,
    pub video_url: Option<String>,
    /// Video duration; zero for text-only lessons.
    pub duration_seconds: i32,
    pub position: i32,
}

/// Module with its lessons, as rendered in the course page.
#[derive(Debug, Serialize)]
pub struct ModuleOutline {
    #[serde(flatten)]
    pub module: Module,
    pub lessons: Vec<Lesson>,
    pub quiz_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub modules: Vec<ModuleOutline>,
}

/// Query parameters for the public catalog.
#[derive(Debug, Deserialize)]
pub struct CourseListParams {
    /// Case-insensitive title search.
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCourseRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 2, max = 100), custom(function = validate_slug))]
    pub slug: String,
    #[validate(length(max = 20000))]
    #[serde(default)]
    pub description: String,
    pub organization_id: Option<i64>,
    #[serde(default)]
    pub is_published: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCourseRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 20000))]
    pub description: Option<String>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateModuleRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub position: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateModuleRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub position: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLessonRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 100000))]
    #[serde(default)]
    pub content: String,
    #[validate(length(max = 500), custom(function = validate_http_url))]
    pub video_url: Option<String>,
    #[validate(range(min = 0, max = 86400))]
    #[serde(default)]
    pub duration_seconds: i32,
    pub position: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLessonRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 100000))]
    pub content: Option<String>,
    #[validate(length(max = 500), custom(function = validate_http_url))]
    pub video_url: Option<String>,
    #[validate(range(min = 0, max = 86400))]
    pub duration_seconds: Option<i32>,
    pub position: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(org: Option<i64>, published: bool) -> Course {
        Course {
            id: 1,
            title: "Rust".into(),
            slug: "rust".into(),
            description: String::new(),
            organization_id: org,
            is_published: published,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_visibility() {
        assert!(course(None, true).visible_to(None));
        assert!(course(None, true).visible_to(Some(3)));
        assert!(!course(None, false).visible_to(None));
        assert!(course(Some(3), true).visible_to(Some(3)));
        assert!(!course(Some(3), true).visible_to(Some(4)));
        assert!(!course(Some(3), true).visible_to(None));
    }

    #[test]
    fn test_lesson_request_rejects_negative_duration() {
        let req: CreateLessonRequest =
            serde_json::from_str(r#"{"title": "Intro", "duration_seconds": -5}"#).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_lesson_duration_fits_progress_reports() {
        // Progress reports are capped at a day, so a lesson can't be longer.
        let day: CreateLessonRequest =
            serde_json::from_str(r#"{"title": "Long", "duration_seconds": 86400}"#).unwrap();
        assert!(day.validate().is_ok());

        let longer: CreateLessonRequest =
            serde_json::from_str(r#"{"title": "Long", "duration_seconds": 96000}"#).unwrap();
        assert!(longer.validate().is_err());

        let update: UpdateLessonRequest =
            serde_json::from_str(r#"{"duration_seconds": 100000}"#).unwrap();
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_lesson_request_rejects_bad_video_url() {
        let req: CreateLessonRequest =
            serde_json::from_str(r#"{"title": "Intro", "video_url": "javascript:alert(1)"}"#)
                .unwrap();
        assert!(req.validate().is_err());
    }
}
