// src/handlers/quiz.rs

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::{PgConnection, PgPool, types::Json as SqlJson};

use crate::{
    error::AppError,
    models::{
        attempt::{AttemptResult, QuizAttempt, SubmitQuizRequest},
        enrollment::{Enrollment, EnrollmentStatus},
        quiz::{PublicQuestion, Question, Quiz, QuizForTaking},
    },
    services::grading,
    utils::jwt::Claims,
};

/// Loads a quiz. `FOR SHARE` keeps question edits out while a submission
/// is being graded against it.
pub(crate) async fn fetch_quiz(
    conn: &mut PgConnection,
    quiz_id: i64,
    share_lock: bool,
) -> Result<Quiz, AppError> {
    let sql = if share_lock {
        r#"
        SELECT id, module_id, title, passing_score, time_limit_minutes, created_at
        FROM quizzes
        WHERE id = $1
        FOR SHARE
        "#
    } else {
        r#"
        SELECT id, module_id, title, passing_score, time_limit_minutes, created_at
        FROM quizzes
        WHERE id = $1
        "#
    };

    sqlx::query_as::<_, Quiz>(sql)
        .bind(quiz_id)
        .fetch_optional(conn)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))
}

/// Questions of a quiz in display order.
pub(crate) async fn fetch_questions(
    conn: &mut PgConnection,
    quiz_id: i64,
) -> Result<Vec<Question>, AppError> {
    let questions = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, quiz_id, question_type, prompt, options, points, position
        FROM questions
        WHERE quiz_id = $1
        ORDER BY position, id
        "#,
    )
    .bind(quiz_id)
    .fetch_all(conn)
    .await?;
    Ok(questions)
}

/// Learners need a live enrollment in the course that owns the quiz.
async fn ensure_enrolled(
    conn: &mut PgConnection,
    claims: &Claims,
    quiz_id: i64,
) -> Result<(), AppError> {
    if claims.is_admin() {
        return Ok(());
    }

    let enrollment = sqlx::query_as::<_, Enrollment>(
        r#"
        SELECT e.id, e.user_id, e.course_id, e.progress, e.status,
               e.enrolled_at, e.completed_at, e.expires_at
        FROM enrollments e
        JOIN modules m ON m.course_id = e.course_id
        JOIN quizzes q ON q.module_id = m.id
        WHERE q.id = $1 AND e.user_id = $2
        "#,
    )
    .bind(quiz_id)
    .bind(claims.user_id()?)
    .fetch_optional(conn)
    .await?
    .ok_or(AppError::Forbidden(
        "You must be enrolled in this course".to_string(),
    ))?;

    if enrollment.effective_status(Utc::now()) == EnrollmentStatus::Expired {
        return Err(AppError::Forbidden("Enrollment has expired".to_string()));
    }
    Ok(())
}

/// Returns the quiz for taking, with every correctness flag stripped.
pub async fn get_quiz_for_taking(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;

    let quiz = fetch_quiz(&mut conn, quiz_id, false).await?;
    ensure_enrolled(&mut conn, &claims, quiz.id).await?;
    let questions = fetch_questions(&mut conn, quiz.id).await?;

    Ok(Json(QuizForTaking {
        quiz,
        questions: questions.into_iter().map(PublicQuestion::from).collect(),
    }))
}

/// Grades a submission and stores the attempt.
///
/// * Scores are recomputed from the stored questions.
/// * An unknown question id rejects the whole submission; nothing is stored.
/// * Read, grade and insert share one transaction.
pub async fn submit_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    payload: Result<Json<SubmitQuizRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload?;
    let user_id = claims.user_id()?;
    let mut tx = pool.begin().await?;

    let quiz = fetch_quiz(&mut tx, quiz_id, true).await?;
    ensure_enrolled(&mut tx, &claims, quiz.id).await?;
    let questions = fetch_questions(&mut tx, quiz.id).await?;

    let outcome = grading::grade_submission(&questions, &req.answers, quiz.passing_score)?;

    let completed_at = Utc::now();
    let started_at = req
        .started_at
        .filter(|started| *started <= completed_at)
        .unwrap_or(completed_at);

    let attempt = sqlx::query_as::<_, QuizAttempt>(
        r#"
        INSERT INTO quiz_attempts
            (quiz_id, user_id, answers, results, score, max_score, percentage, passed,
             started_at, completed_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id, quiz_id, user_id, answers, results, score, max_score, percentage, passed,
                  started_at, completed_at
        "#,
    )
    .bind(quiz.id)
    .bind(user_id)
    .bind(SqlJson(&req.answers))
    .bind(SqlJson(&outcome.results))
    .bind(outcome.score)
    .bind(outcome.max_score)
    .bind(outcome.percentage)
    .bind(outcome.passed)
    .bind(started_at)
    .bind(completed_at)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to store quiz attempt: {:?}", e);
        AppError::from(e)
    })?;

    tx.commit().await?;

    tracing::info!(
        attempt_id = attempt.id,
        quiz_id = quiz.id,
        user_id,
        score = attempt.score,
        max_score = attempt.max_score,
        passed = attempt.passed,
        "Quiz attempt graded"
    );

    Ok((
        StatusCode::CREATED,
        Json(AttemptResult::from_attempt(attempt, quiz.passing_score)),
    ))
}

/// The caller's attempts at a quiz, newest first.
pub async fn list_my_attempts(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempts = sqlx::query_as::<_, QuizAttempt>(
        r#"
        SELECT id, quiz_id, user_id, answers, results, score, max_score, percentage, passed,
               started_at, completed_at
        FROM quiz_attempts
        WHERE quiz_id = $1 AND user_id = $2
        ORDER BY completed_at DESC, id DESC
        "#,
    )
    .bind(quiz_id)
    .bind(claims.user_id()?)
    .fetch_all(&pool)
    .await?;

    Ok(Json(attempts))
}

/// The caller's best attempt: highest percentage, earliest first on ties.
pub async fn best_attempt(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let quiz = fetch_quiz(&mut conn, quiz_id, false).await?;

    let attempt = sqlx::query_as::<_, QuizAttempt>(
        r#"
        SELECT id, quiz_id, user_id, answers, results, score, max_score, percentage, passed,
               started_at, completed_at
        FROM quiz_attempts
        WHERE quiz_id = $1 AND user_id = $2
        ORDER BY percentage DESC, completed_at ASC, id ASC
        LIMIT 1
        "#,
    )
    .bind(quiz.id)
    .bind(claims.user_id()?)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("No attempts yet".to_string()))?;

    Ok(Json(AttemptResult::from_attempt(attempt, quiz.passing_score)))
}
