// src/models/certificate.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::utils::validate::validate_http_url;

/// Represents the 'certificates' table. One row per completed enrollment.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Certificate {
    pub id: i64,
    pub enrollment_id: i64,
    pub user_id: i64,
    pub course_id: i64,
    pub verification_code: String,
    pub issued_at: chrono::DateTime<chrono::Utc>,
    /// URL of the rendered document, once one has been produced.
    pub document_url: Option<String>,
}

/// Public answer to a verification lookup.
#[derive(Debug, Serialize, FromRow)]
pub struct CertificateVerification {
    pub verification_code: String,
    pub learner_name: String,
    pub course_title: String,
    pub issued_at: chrono::DateTime<chrono::Utc>,
    pub document_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetDocumentRequest {
    #[validate(length(max = 500), custom(function = validate_http_url))]
    pub document_url: String,
}
