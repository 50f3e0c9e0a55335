// src/handlers/organization.rs
//
// Organization portal. Org admins see and manage their own organization;
// platform admins pick one with `?organization_id=`.

use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::PgPool;

use crate::{
    error::AppError,
    handlers::{catalog::fetch_course, enrollment::create_enrollment},
    models::{
        enrollment::EnrollmentSummary,
        user::{Role, User},
    },
    utils::jwt::Claims,
};

#[derive(Debug, Deserialize)]
pub struct OrgScopeParams {
    pub organization_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct EnrollMemberRequest {
    pub user_id: i64,
    pub course_id: i64,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Resolves which organization the caller acts on.
fn resolve_scope(claims: &Claims, requested: Option<i64>) -> Result<i64, AppError> {
    match claims.role() {
        Role::Admin => requested.or(claims.org).ok_or(AppError::BadRequest(
            "organization_id is required".to_string(),
        )),
        Role::OrgAdmin => {
            let own = claims
                .org
                .ok_or(AppError::Forbidden("No organization assigned".to_string()))?;
            match requested {
                Some(other) if other != own => Err(AppError::Forbidden(
                    "Cannot access another organization".to_string(),
                )),
                _ => Ok(own),
            }
        }
        Role::Learner => Err(AppError::Forbidden("Organization admins only".to_string())),
    }
}

pub async fn list_members(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(scope): Query<OrgScopeParams>,
) -> Result<impl IntoResponse, AppError> {
    let organization_id = resolve_scope(&claims, scope.organization_id)?;

    let members = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password, display_name, role, organization_id, created_at
        FROM users
        WHERE organization_id = $1
        ORDER BY username
        "#,
    )
    .bind(organization_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(members))
}

/// Every enrollment of every member, with course and progress.
pub async fn enrollment_report(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(scope): Query<OrgScopeParams>,
) -> Result<impl IntoResponse, AppError> {
    let organization_id = resolve_scope(&claims, scope.organization_id)?;

    let rows = sqlx::query_as::<_, EnrollmentSummary>(
        r#"
        SELECT
            e.id, e.user_id, u.username, e.course_id, c.title AS course_title,
            e.progress,
            CASE
                WHEN e.status = 'active' AND e.expires_at IS NOT NULL AND e.expires_at <= NOW()
                THEN 'expired'
                ELSE e.status
            END AS status,
            e.enrolled_at, e.completed_at
        FROM enrollments e
        JOIN users u ON e.user_id = u.id
        JOIN courses c ON e.course_id = c.id
        WHERE u.organization_id = $1
        ORDER BY u.username, c.title
        "#,
    )
    .bind(organization_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(rows))
}

/// Enrolls a member of the organization in a course it can see.
pub async fn enroll_member(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(scope): Query<OrgScopeParams>,
    Json(payload): Json<EnrollMemberRequest>,
) -> Result<impl IntoResponse, AppError> {
    let organization_id = resolve_scope(&claims, scope.organization_id)?;
    let mut conn = pool.acquire().await?;

    sqlx::query("SELECT id FROM users WHERE id = $1 AND organization_id = $2")
        .bind(payload.user_id)
        .bind(organization_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound("Member not found".to_string()))?;

    let course = fetch_course(&mut conn, payload.course_id).await?;
    if !course.visible_to(Some(organization_id)) {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    let enrollment =
        create_enrollment(&mut conn, payload.user_id, course.id, payload.expires_at).await?;

    Ok((StatusCode::CREATED, Json(enrollment)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: &str, org: Option<i64>) -> Claims {
        Claims {
            sub: "1".into(),
            role: role.into(),
            org,
            exp: 0,
        }
    }

    #[test]
    fn test_org_admin_scoped_to_own_org() {
        assert_eq!(resolve_scope(&claims("org_admin", Some(5)), None).unwrap(), 5);
        assert_eq!(
            resolve_scope(&claims("org_admin", Some(5)), Some(5)).unwrap(),
            5
        );
        assert!(matches!(
            resolve_scope(&claims("org_admin", Some(5)), Some(6)),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_admin_must_pick_org() {
        assert_eq!(resolve_scope(&claims("admin", None), Some(9)).unwrap(), 9);
        assert!(matches!(
            resolve_scope(&claims("admin", None), None),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_learner_rejected() {
        assert!(matches!(
            resolve_scope(&claims("learner", Some(5)), None),
            Err(AppError::Forbidden(_))
        ));
    }
}
