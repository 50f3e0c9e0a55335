// src/handlers/certificate.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::enrollment::fetch_own_enrollment,
    models::certificate::{Certificate, CertificateVerification, SetDocumentRequest},
    services::certificate::{self, is_well_formed_code},
    utils::jwt::Claims,
};

/// Issues the certificate of a completed enrollment, or returns the one
/// already issued.
pub async fn request_certificate(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(enrollment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let enrollment = fetch_own_enrollment(&mut tx, enrollment_id, claims.user_id()?, true).await?;
    let certificate = certificate::issue_if_eligible(&mut tx, &enrollment)
        .await?
        .ok_or(AppError::BadRequest(
            "Course is not completed yet".to_string(),
        ))?;

    tx.commit().await?;

    Ok(Json(certificate))
}

pub async fn list_my_certificates(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let certificates = sqlx::query_as::<_, Certificate>(
        r#"
        SELECT id, enrollment_id, user_id, course_id, verification_code, issued_at, document_url
        FROM certificates
        WHERE user_id = $1
        ORDER BY issued_at DESC
        "#,
    )
    .bind(claims.user_id()?)
    .fetch_all(&pool)
    .await?;

    Ok(Json(certificates))
}

/// Public lookup of a certificate by its verification code.
pub async fn verify_certificate(
    State(pool): State<PgPool>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let code = code.trim().to_uppercase();
    if !is_well_formed_code(&code) {
        return Err(AppError::BadRequest(
            "Malformed verification code".to_string(),
        ));
    }

    let verification = sqlx::query_as::<_, CertificateVerification>(
        r#"
        SELECT
            c.verification_code,
            u.display_name AS learner_name,
            co.title AS course_title,
            c.issued_at,
            c.document_url
        FROM certificates c
        JOIN users u ON c.user_id = u.id
        JOIN courses co ON c.course_id = co.id
        WHERE c.verification_code = $1
        "#,
    )
    .bind(&code)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Certificate not found".to_string()))?;

    Ok(Json(verification))
}

/// Attaches the rendered document URL to a certificate.
/// Admin only.
pub async fn set_certificate_document(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<SetDocumentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let certificate = sqlx::query_as::<_, Certificate>(
        r#"
        UPDATE certificates SET document_url = $1
        WHERE id = $2
        RETURNING id, enrollment_id, user_id, course_id, verification_code, issued_at, document_url
        "#,
    )
    .bind(&payload.document_url)
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Certificate not found".to_string()))?;

    Ok(Json(certificate))
}
