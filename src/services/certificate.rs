// src/services/certificate.rs

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use sqlx::{PgConnection, Postgres, Transaction};

use crate::{
    config::CERTIFICATE_CODE_PREFIX,
    error::AppError,
    models::{
        certificate::Certificate,
        enrollment::{Enrollment, EnrollmentStatus},
    },
};

static CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^{}-\d{{8}}-[0-9A-F]{{8}}$", CERTIFICATE_CODE_PREFIX))
        .expect("certificate code pattern is valid")
});

/// Builds a verification code such as `CERT-20250314-9F2C41AB`.
pub fn generate_code(issued_at: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!(
        "{}-{}-{}",
        CERTIFICATE_CODE_PREFIX,
        issued_at.format("%Y%m%d"),
        suffix
    )
}

pub fn is_well_formed_code(code: &str) -> bool {
    CODE_RE.is_match(code)
}

async fn find_by_enrollment(
    conn: &mut PgConnection,
    enrollment_id: i64,
) -> Result<Option<Certificate>, sqlx::Error> {
    sqlx::query_as::<_, Certificate>(
        r#"
        SELECT id, enrollment_id, user_id, course_id, verification_code, issued_at, document_url
        FROM certificates
        WHERE enrollment_id = $1
        "#,
    )
    .bind(enrollment_id)
    .fetch_optional(conn)
    .await
}

/// Issues the certificate for a completed enrollment.
///
/// Returns `Ok(None)` when the enrollment is not completed yet. An
/// enrollment that already holds a certificate gets the existing one back.
pub async fn issue_if_eligible(
    tx: &mut Transaction<'_, Postgres>,
    enrollment: &Enrollment,
) -> Result<Option<Certificate>, AppError> {
    if let Some(existing) = find_by_enrollment(&mut **tx, enrollment.id).await? {
        return Ok(Some(existing));
    }

    if enrollment.effective_status(Utc::now()) != EnrollmentStatus::Completed {
        return Ok(None);
    }

    let issued_at = Utc::now();

    // The unique index on enrollment_id turns a concurrent second issue into a no-op.
    let inserted = sqlx::query_as::<_, Certificate>(
        r#"
        INSERT INTO certificates (enrollment_id, user_id, course_id, verification_code, issued_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (enrollment_id) DO NOTHING
        RETURNING id, enrollment_id, user_id, course_id, verification_code, issued_at, document_url
        "#,
    )
    .bind(enrollment.id)
    .bind(enrollment.user_id)
    .bind(enrollment.course_id)
    .bind(generate_code(issued_at))
    .bind(issued_at)
    .fetch_optional(&mut **tx)
    .await?;

    match inserted {
        Some(certificate) => {
            tracing::info!(
                enrollment_id = enrollment.id,
                code = %certificate.verification_code,
                "Certificate issued"
            );
            Ok(Some(certificate))
        }
        None => Ok(find_by_enrollment(&mut **tx, enrollment.id).await?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_generated_code_is_well_formed() {
        let issued = Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap();
        let code = generate_code(issued);
        assert!(code.starts_with("CERT-20250314-"));
        assert!(is_well_formed_code(&code), "{}", code);
    }

    #[test]
    fn test_codes_are_unique() {
        let now = Utc::now();
        assert_ne!(generate_code(now), generate_code(now));
    }

    #[test]
    fn test_malformed_codes() {
        assert!(!is_well_formed_code(""));
        assert!(!is_well_formed_code("CERT-2025-ABCDEF12"));
        assert!(!is_well_formed_code("CERT-20250314-abcdef12"));
        assert!(!is_well_formed_code("'; DROP TABLE certificates; --"));
    }
}
