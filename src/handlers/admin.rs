// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::{AppError, is_unique_violation},
    handlers::catalog::{fetch_course, load_outline},
    models::{
        course::{
            Course, CourseDetail, CreateCourseRequest, CreateLessonRequest, CreateModuleRequest,
            Lesson, Module, UpdateCourseRequest, UpdateLessonRequest, UpdateModuleRequest,
        },
        user::{CreateOrganizationRequest, Organization, UpdateUserRequest, User},
    },
    utils::html::clean_html,
};

/// Lists all users in the system.
pub async fn list_users(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password, display_name, role, organization_id, created_at
        FROM users
        ORDER BY id DESC
        "#,
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(users))
}

/// Changes a user's role, display name or organization.
pub async fn update_user(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.role.is_none() && payload.organization_id.is_none() && payload.display_name.is_none()
    {
        return Ok(StatusCode::OK);
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET ");
    let mut separated = builder.separated(", ");

    if let Some(role) = payload.role {
        separated.push("role = ");
        separated.push_bind_unseparated(role.as_str());
    }

    if let Some(organization_id) = payload.organization_id {
        separated.push("organization_id = ");
        separated.push_bind_unseparated(organization_id);
    }

    if let Some(display_name) = payload.display_name {
        separated.push("display_name = ");
        separated.push_bind_unseparated(display_name);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    let result = builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update user: {:?}", e);
        AppError::from(e)
    })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(StatusCode::OK)
}

pub async fn create_organization(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateOrganizationRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let organization = sqlx::query_as::<_, Organization>(
        r#"
        INSERT INTO organizations (name, slug)
        VALUES ($1, $2)
        RETURNING id, name, slug, created_at
        "#,
    )
    .bind(&payload.name)
    .bind(&payload.slug)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(format!("Organization '{}' already exists", payload.slug))
        } else {
            AppError::from(e)
        }
    })?;

    Ok((StatusCode::CREATED, Json(organization)))
}

pub async fn list_organizations(
    State(pool): State<PgPool>,
) -> Result<impl IntoResponse, AppError> {
    let organizations = sqlx::query_as::<_, Organization>(
        "SELECT id, name, slug, created_at FROM organizations ORDER BY name",
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(organizations))
}

/// Every course, published or not.
pub async fn list_all_courses(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let courses = sqlx::query_as::<_, Course>(
        r#"
        SELECT id, title, slug, description, organization_id, is_published, created_at, updated_at
        FROM courses
        ORDER BY id DESC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(courses))
}

/// Course with its full outline, regardless of publication.
pub async fn get_course_outline(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let course = fetch_course(&mut conn, id).await?;
    let modules = load_outline(&mut conn, course.id).await?;

    Ok(Json(CourseDetail { course, modules }))
}

pub async fn create_course(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let course = sqlx::query_as::<_, Course>(
        r#"
        INSERT INTO courses (title, slug, description, organization_id, is_published)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, title, slug, description, organization_id, is_published, created_at, updated_at
        "#,
    )
    .bind(&payload.title)
    .bind(&payload.slug)
    .bind(clean_html(&payload.description))
    .bind(payload.organization_id)
    .bind(payload.is_published)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(format!("Course slug '{}' already exists", payload.slug))
        } else {
            tracing::error!("Failed to create course: {:?}", e);
            AppError::from(e)
        }
    })?;

    Ok((StatusCode::CREATED, Json(course)))
}

pub async fn update_course(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    if payload.title.is_none() && payload.description.is_none() && payload.is_published.is_none() {
        return Ok(StatusCode::OK);
    }

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("UPDATE courses SET updated_at = NOW()");

    if let Some(title) = payload.title {
        builder.push(", title = ");
        builder.push_bind(title);
    }

    if let Some(description) = payload.description {
        builder.push(", description = ");
        builder.push_bind(clean_html(&description));
    }

    if let Some(is_published) = payload.is_published {
        builder.push(", is_published = ");
        builder.push_bind(is_published);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    let result = builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update course: {:?}", e);
        AppError::from(e)
    })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    Ok(StatusCode::OK)
}

pub async fn delete_course(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM courses WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_module(
    State(pool): State<PgPool>,
    Path(course_id): Path<i64>,
    Json(payload): Json<CreateModuleRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut conn = pool.acquire().await?;
    fetch_course(&mut conn, course_id).await?;

    let module = sqlx::query_as::<_, Module>(
        r#"
        INSERT INTO modules (course_id, title, position)
        VALUES (
            $1, $2,
            COALESCE($3, (SELECT COALESCE(MAX(position) + 1, 0) FROM modules WHERE course_id = $1))
        )
        RETURNING id, course_id, title, position
        "#,
    )
    .bind(course_id)
    .bind(&payload.title)
    .bind(payload.position)
    .fetch_one(&mut *conn)
    .await?;

    Ok((StatusCode::CREATED, Json(module)))
}

pub async fn update_module(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateModuleRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let module = sqlx::query_as::<_, Module>(
        r#"
        UPDATE modules SET
            title = COALESCE($1, title),
            position = COALESCE($2, position)
        WHERE id = $3
        RETURNING id, course_id, title, position
        "#,
    )
    .bind(payload.title)
    .bind(payload.position)
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Module not found".to_string()))?;

    Ok(Json(module))
}

pub async fn delete_module(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM modules WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Module not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_lesson(
    State(pool): State<PgPool>,
    Path(module_id): Path<i64>,
    Json(payload): Json<CreateLessonRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    sqlx::query("SELECT id FROM modules WHERE id = $1")
        .bind(module_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Module not found".to_string()))?;

    let lesson = sqlx::query_as::<_, Lesson>(
        r#"
        INSERT INTO lessons (module_id, title, content, video_url, duration_seconds, position)
        VALUES (
            $1, $2, $3, $4, $5,
            COALESCE($6, (SELECT COALESCE(MAX(position) + 1, 0) FROM lessons WHERE module_id = $1))
        )
        RETURNING id, module_id, title, content, video_url, duration_seconds, position
        "#,
    )
    .bind(module_id)
    .bind(&payload.title)
    .bind(clean_html(&payload.content))
    .bind(&payload.video_url)
    .bind(payload.duration_seconds)
    .bind(payload.position)
    .fetch_one(&pool)
    .await?;

    Ok((StatusCode::CREATED, Json(lesson)))
}

pub async fn update_lesson(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateLessonRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let lesson = sqlx::query_as::<_, Lesson>(
        r#"
        UPDATE lessons SET
            title = COALESCE($1, title),
            content = COALESCE($2, content),
            video_url = COALESCE($3, video_url),
            duration_seconds = COALESCE($4, duration_seconds),
            position = COALESCE($5, position)
        WHERE id = $6
        RETURNING id, module_id, title, content, video_url, duration_seconds, position
        "#,
    )
    .bind(payload.title)
    .bind(payload.content.as_deref().map(clean_html))
    .bind(payload.video_url)
    .bind(payload.duration_seconds)
    .bind(payload.position)
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Lesson not found".to_string()))?;

    Ok(Json(lesson))
}

pub async fn delete_lesson(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM lessons WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Lesson not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize, FromRow)]
pub struct PlatformStats {
    pub users: i64,
    pub courses: i64,
    pub enrollments: i64,
    pub completed_enrollments: i64,
    pub quiz_attempts: i64,
    pub certificates: i64,
}

/// Dashboard counters.
pub async fn stats(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let stats = sqlx::query_as::<_, PlatformStats>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM users) AS users,
            (SELECT COUNT(*) FROM courses) AS courses,
            (SELECT COUNT(*) FROM enrollments) AS enrollments,
            (SELECT COUNT(*) FROM enrollments WHERE status = 'completed') AS completed_enrollments,
            (SELECT COUNT(*) FROM quiz_attempts) AS quiz_attempts,
            (SELECT COUNT(*) FROM certificates) AS certificates
        "#,
    )
    .fetch_one(&pool)
    .await?;

    Ok(Json(stats))
}
