// src/handlers/catalog.rs

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use sqlx::{PgConnection, PgPool};

use crate::{
    config::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE},
    error::AppError,
    models::course::{Course, CourseDetail, CourseListParams, Lesson, Module, ModuleOutline},
    utils::jwt::Viewer,
};

pub(crate) async fn fetch_course(conn: &mut PgConnection, id: i64) -> Result<Course, AppError> {
    sqlx::query_as::<_, Course>(
        r#"
        SELECT id, title, slug, description, organization_id, is_published, created_at, updated_at
        FROM courses
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or(AppError::NotFound("Course not found".to_string()))
}

/// Loads a course the caller is allowed to see. Hidden courses read as absent.
pub(crate) async fn fetch_visible_course(
    conn: &mut PgConnection,
    id: i64,
    organization_id: Option<i64>,
    is_admin: bool,
) -> Result<Course, AppError> {
    let course = fetch_course(conn, id).await?;
    if is_admin || course.visible_to(organization_id) {
        Ok(course)
    } else {
        Err(AppError::NotFound("Course not found".to_string()))
    }
}

/// Modules of a course in display order, each with its lessons and quiz id.
pub(crate) async fn load_outline(
    conn: &mut PgConnection,
    course_id: i64,
) -> Result<Vec<ModuleOutline>, AppError> {
    let modules = sqlx::query_as::<_, Module>(
        r#"
        SELECT id, course_id, title, position
        FROM modules
        WHERE course_id = $1
        ORDER BY position, id
        "#,
    )
    .bind(course_id)
    .fetch_all(&mut *conn)
    .await?;

    let lessons = sqlx::query_as::<_, Lesson>(
        r#"
        SELECT l.id, l.module_id, l.title, l.content, l.video_url, l.duration_seconds, l.position
        FROM lessons l
        JOIN modules m ON l.module_id = m.id
        WHERE m.course_id = $1
        ORDER BY l.position, l.id
        "#,
    )
    .bind(course_id)
    .fetch_all(&mut *conn)
    .await?;

    let quizzes: Vec<(i64, i64)> = sqlx::query_as(
        r#"
        SELECT q.module_id, q.id
        FROM quizzes q
        JOIN modules m ON q.module_id = m.id
        WHERE m.course_id = $1
        "#,
    )
    .bind(course_id)
    .fetch_all(&mut *conn)
    .await?;

    let quiz_by_module: HashMap<i64, i64> = quizzes.into_iter().collect();
    let mut lessons_by_module: HashMap<i64, Vec<Lesson>> = HashMap::new();
    for lesson in lessons {
        lessons_by_module
            .entry(lesson.module_id)
            .or_default()
            .push(lesson);
    }

    Ok(modules
        .into_iter()
        .map(|module| ModuleOutline {
            lessons: lessons_by_module.remove(&module.id).unwrap_or_default(),
            quiz_id: quiz_by_module.get(&module.id).copied(),
            module,
        })
        .collect())
}

/// Turns a search term into an `ILIKE` substring pattern. `%`, `_` and the
/// escape character itself match literally.
fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Lists published courses: public ones plus those of the caller's organization.
pub async fn list_courses(
    State(pool): State<PgPool>,
    Extension(viewer): Extension<Viewer>,
    Query(params): Query<CourseListParams>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = params.offset.unwrap_or(0).max(0);
    let search = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(contains_pattern);

    let courses = sqlx::query_as::<_, Course>(
        r#"
        SELECT id, title, slug, description, organization_id, is_published, created_at, updated_at
        FROM courses
        WHERE is_published = TRUE
          AND (organization_id IS NULL OR organization_id = $1)
          AND ($2::TEXT IS NULL OR title ILIKE $2 ESCAPE '\')
        ORDER BY created_at DESC, id DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(viewer.organization_id())
    .bind(search)
    .bind(limit)
    .bind(offset)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list courses: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(courses))
}

/// Course page: the course with its ordered modules and lessons.
pub async fn get_course(
    State(pool): State<PgPool>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;

    let course =
        fetch_visible_course(&mut conn, id, viewer.organization_id(), viewer.is_admin()).await?;
    let modules = load_outline(&mut conn, course.id).await?;

    Ok(Json(CourseDetail { course, modules }))
}
