// src/handlers/enrollment.rs

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::{PgConnection, PgPool};
use validator::Validate;

use crate::{
    error::{AppError, is_unique_violation},
    handlers::catalog::fetch_visible_course,
    models::enrollment::{
        Enrollment, EnrollmentProgress, EnrollmentStatus, EnrollmentSummary,
        LessonProgress, ProgressResult, RecordProgressRequest,
    },
    services::{
        certificate,
        progress::{self, LessonState},
    },
    utils::jwt::Claims,
};

/// Inserts an enrollment. A second enrollment of the same user in the same
/// course is a conflict.
pub(crate) async fn create_enrollment(
    conn: &mut PgConnection,
    user_id: i64,
    course_id: i64,
    expires_at: Option<chrono::DateTime<Utc>>,
) -> Result<Enrollment, AppError> {
    let enrollment = sqlx::query_as::<_, Enrollment>(
        r#"
        INSERT INTO enrollments (user_id, course_id, expires_at)
        VALUES ($1, $2, $3)
        RETURNING id, user_id, course_id, progress, status, enrolled_at, completed_at, expires_at
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .bind(expires_at)
    .fetch_one(conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("Already enrolled in this course".to_string())
        } else {
            tracing::error!("Failed to create enrollment: {:?}", e);
            AppError::from(e)
        }
    })?;

    tracing::info!(
        enrollment_id = enrollment.id,
        user_id,
        course_id,
        "Learner enrolled"
    );

    Ok(enrollment)
}

/// Loads an enrollment owned by `user_id`. Other users' enrollments read as absent.
/// With `lock`, the row stays locked until the surrounding transaction ends.
pub(crate) async fn fetch_own_enrollment(
    conn: &mut PgConnection,
    enrollment_id: i64,
    user_id: i64,
    lock: bool,
) -> Result<Enrollment, AppError> {
    let sql = if lock {
        r#"
        SELECT id, user_id, course_id, progress, status, enrolled_at, completed_at, expires_at
        FROM enrollments
        WHERE id = $1 AND user_id = $2
        FOR UPDATE
        "#
    } else {
        r#"
        SELECT id, user_id, course_id, progress, status, enrolled_at, completed_at, expires_at
        FROM enrollments
        WHERE id = $1 AND user_id = $2
        "#
    };

    sqlx::query_as::<_, Enrollment>(sql)
        .bind(enrollment_id)
        .bind(user_id)
        .fetch_optional(conn)
        .await?
        .ok_or(AppError::NotFound("Enrollment not found".to_string()))
}

async fn count_lessons(conn: &mut PgConnection, course_id: i64) -> Result<i64, AppError> {
    let (total,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM lessons l
        JOIN modules m ON l.module_id = m.id
        WHERE m.course_id = $1
        "#,
    )
    .bind(course_id)
    .fetch_one(conn)
    .await?;
    Ok(total)
}

async fn count_completed_lessons(
    conn: &mut PgConnection,
    enrollment: &Enrollment,
) -> Result<i64, AppError> {
    let (completed,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM lesson_progress lp
        JOIN lessons l ON lp.lesson_id = l.id
        JOIN modules m ON l.module_id = m.id
        WHERE lp.enrollment_id = $1 AND lp.completed AND m.course_id = $2
        "#,
    )
    .bind(enrollment.id)
    .bind(enrollment.course_id)
    .fetch_one(conn)
    .await?;
    Ok(completed)
}

/// Enrolls the caller in a published, visible course.
pub async fn enroll(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let mut conn = pool.acquire().await?;

    let course = fetch_visible_course(&mut conn, course_id, claims.org, claims.is_admin()).await?;
    let enrollment = create_enrollment(&mut conn, user_id, course.id, None).await?;

    Ok((StatusCode::CREATED, Json(enrollment)))
}

/// Lists the caller's enrollments with course titles.
pub async fn list_my_enrollments(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let enrollments = sqlx::query_as::<_, EnrollmentSummary>(
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
        JOIN courses c ON e.course_id = c.id
        JOIN users u ON e.user_id = u.id
        WHERE e.user_id = $1
        ORDER BY e.enrolled_at DESC
        "#,
    )
    .bind(claims.user_id()?)
    .fetch_all(&pool)
    .await?;

    Ok(Json(enrollments))
}

/// Per-lesson progress of one enrollment plus its rollup.
pub async fn get_enrollment_progress(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(enrollment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let mut enrollment =
        fetch_own_enrollment(&mut conn, enrollment_id, claims.user_id()?, false).await?;
    enrollment.status = enrollment.effective_status(Utc::now()).as_str().to_string();

    let lessons = sqlx::query_as::<_, LessonProgress>(
        r#"
        SELECT id, enrollment_id, lesson_id, watched_seconds, completed, completed_at, updated_at
        FROM lesson_progress
        WHERE enrollment_id = $1
        ORDER BY lesson_id
        "#,
    )
    .bind(enrollment.id)
    .fetch_all(&mut *conn)
    .await?;

    let watch_pairs: Vec<(i32, i32)> = sqlx::query_as(
        r#"
        SELECT COALESCE(lp.watched_seconds, 0), l.duration_seconds
        FROM lessons l
        JOIN modules m ON l.module_id = m.id
        LEFT JOIN lesson_progress lp ON lp.lesson_id = l.id AND lp.enrollment_id = $1
        WHERE m.course_id = $2
        "#,
    )
    .bind(enrollment.id)
    .bind(enrollment.course_id)
    .fetch_all(&mut *conn)
    .await?;

    let total_lessons = watch_pairs.len() as i64;
    let completed_lessons = count_completed_lessons(&mut conn, &enrollment).await?;

    Ok(Json(EnrollmentProgress {
        enrollment,
        completed_lessons,
        total_lessons,
        watch_time_progress: progress::watch_time_percentage(&watch_pairs),
        lessons,
    }))
}

/// Records watched time for a lesson and rolls it up into the enrollment.
///
/// Runs as one transaction with the enrollment row locked, so concurrent
/// pings for the same enrollment serialize. Completing the last lesson
/// completes the enrollment and issues its certificate.
pub async fn record_lesson_progress(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path((enrollment_id, lesson_id)): Path<(i64, i64)>,
    payload: Result<Json<RecordProgressRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    payload.validate()?;
    let user_id = claims.user_id()?;

    let mut tx = pool.begin().await?;

    let enrollment = fetch_own_enrollment(&mut tx, enrollment_id, user_id, true).await?;
    let now = Utc::now();

    if enrollment.effective_status(now) == EnrollmentStatus::Expired {
        if enrollment.status != EnrollmentStatus::Expired.as_str() {
            sqlx::query("UPDATE enrollments SET status = 'expired' WHERE id = $1")
                .bind(enrollment.id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
        }
        return Err(AppError::BadRequest("Enrollment has expired".to_string()));
    }

    let (duration_seconds,): (i32,) = sqlx::query_as(
        r#"
        SELECT l.duration_seconds
        FROM lessons l
        JOIN modules m ON l.module_id = m.id
        WHERE l.id = $1 AND m.course_id = $2
        "#,
    )
    .bind(lesson_id)
    .bind(enrollment.course_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("Lesson not found in this course".to_string()))?;

    let previous: Option<(i32, bool)> = sqlx::query_as(
        r#"
        SELECT watched_seconds, completed
        FROM lesson_progress
        WHERE enrollment_id = $1 AND lesson_id = $2
        "#,
    )
    .bind(enrollment.id)
    .bind(lesson_id)
    .fetch_optional(&mut *tx)
    .await?;

    let previous = previous
        .map(|(watched_seconds, completed)| LessonState {
            watched_seconds,
            completed,
        })
        .unwrap_or_default();

    let update = progress::apply_report(
        previous,
        payload.watched_seconds,
        payload.completed,
        duration_seconds,
    );

    sqlx::query(
        r#"
        INSERT INTO lesson_progress
            (enrollment_id, lesson_id, watched_seconds, completed, completed_at, updated_at)
        VALUES ($1, $2, $3, $4, CASE WHEN $4 THEN NOW() ELSE NULL END, NOW())
        ON CONFLICT (enrollment_id, lesson_id) DO UPDATE SET
            watched_seconds = EXCLUDED.watched_seconds,
            completed = EXCLUDED.completed,
            completed_at = COALESCE(lesson_progress.completed_at, EXCLUDED.completed_at),
            updated_at = NOW()
        "#,
    )
    .bind(enrollment.id)
    .bind(lesson_id)
    .bind(update.state.watched_seconds)
    .bind(update.state.completed)
    .execute(&mut *tx)
    .await?;

    if update.newly_completed {
        tracing::info!(enrollment_id = enrollment.id, lesson_id, "Lesson completed");
    }

    let total_lessons = count_lessons(&mut tx, enrollment.course_id).await?;
    let completed_lessons = count_completed_lessons(&mut tx, &enrollment).await?;

    let was_completed = enrollment.effective_status(now) == EnrollmentStatus::Completed;
    let status = if was_completed || progress::is_course_complete(completed_lessons, total_lessons)
    {
        EnrollmentStatus::Completed
    } else {
        EnrollmentStatus::Active
    };

    let mut percentage = progress::completion_percentage(completed_lessons, total_lessons);
    if was_completed {
        // Lessons added after completion don't take the enrollment backwards.
        percentage = percentage.max(enrollment.progress);
    }

    let enrollment = sqlx::query_as::<_, Enrollment>(
        r#"
        UPDATE enrollments SET
            progress = $1,
            status = $2,
            completed_at = CASE WHEN $2 = 'completed' THEN COALESCE(completed_at, NOW()) ELSE completed_at END
        WHERE id = $3
        RETURNING id, user_id, course_id, progress, status, enrolled_at, completed_at, expires_at
        "#,
    )
    .bind(percentage)
    .bind(status.as_str())
    .bind(enrollment.id)
    .fetch_one(&mut *tx)
    .await?;

    if status == EnrollmentStatus::Completed && !was_completed {
        tracing::info!(enrollment_id = enrollment.id, "Enrollment completed");
    }

    let certificate = certificate::issue_if_eligible(&mut tx, &enrollment).await?;

    tx.commit().await?;

    Ok(Json(ProgressResult {
        enrollment_id: enrollment.id,
        lesson_id,
        watched_seconds: update.state.watched_seconds,
        lesson_completed: update.state.completed,
        completed_lessons,
        total_lessons,
        progress: enrollment.progress,
        status,
        certificate,
    }))
}
