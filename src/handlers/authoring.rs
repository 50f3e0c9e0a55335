// src/handlers/authoring.rs
//
// Quiz authoring. Admin only.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder, types::Json as SqlJson};
use validator::Validate;

use crate::{
    error::{AppError, is_unique_violation},
    handlers::quiz::{fetch_questions, fetch_quiz},
    models::{
        attempt::AttemptSummary,
        quiz::{
            CreateQuestionRequest, CreateQuizRequest, Question, QuestionType, Quiz,
            QuizWithQuestions, UpdateQuestionRequest, UpdateQuizRequest, check_options,
        },
    },
};

/// Locks the quiz row so question edits and gradings don't interleave.
async fn lock_quiz(conn: &mut PgConnection, quiz_id: i64) -> Result<(), AppError> {
    sqlx::query("SELECT id FROM quizzes WHERE id = $1 FOR UPDATE")
        .bind(quiz_id)
        .fetch_optional(conn)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;
    Ok(())
}

/// Creates the quiz of a module. A module holds at most one quiz.
pub async fn create_quiz(
    State(pool): State<PgPool>,
    Path(module_id): Path<i64>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    sqlx::query("SELECT id FROM modules WHERE id = $1")
        .bind(module_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Module not found".to_string()))?;

    let quiz = sqlx::query_as::<_, Quiz>(
        r#"
        INSERT INTO quizzes (module_id, title, passing_score, time_limit_minutes)
        VALUES ($1, $2, $3, $4)
        RETURNING id, module_id, title, passing_score, time_limit_minutes, created_at
        "#,
    )
    .bind(module_id)
    .bind(&payload.title)
    .bind(payload.passing_score)
    .bind(payload.time_limit_minutes)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(format!("Module {} already has a quiz", module_id))
        } else {
            tracing::error!("Failed to create quiz: {:?}", e);
            AppError::from(e)
        }
    })?;

    Ok((StatusCode::CREATED, Json(quiz)))
}

/// Quiz with questions, correct answers included.
pub async fn get_quiz_with_answers(
    State(pool): State<PgPool>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let quiz = fetch_quiz(&mut conn, quiz_id, false).await?;
    let questions = fetch_questions(&mut conn, quiz.id).await?;

    Ok(Json(QuizWithQuestions { quiz, questions }))
}

pub async fn update_quiz(
    State(pool): State<PgPool>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    if payload.title.is_none()
        && payload.passing_score.is_none()
        && payload.time_limit_minutes.is_none()
    {
        return Ok(StatusCode::OK);
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE quizzes SET ");
    let mut separated = builder.separated(", ");

    if let Some(title) = payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(title);
    }

    if let Some(passing_score) = payload.passing_score {
        separated.push("passing_score = ");
        separated.push_bind_unseparated(passing_score);
    }

    if let Some(limit) = payload.time_limit_minutes {
        separated.push("time_limit_minutes = ");
        separated.push_bind_unseparated(limit);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(quiz_id);

    let result = builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update quiz: {:?}", e);
        AppError::from(e)
    })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    Ok(StatusCode::OK)
}

/// Deletes a quiz with its questions and attempts.
pub async fn delete_quiz(
    State(pool): State<PgPool>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM quizzes WHERE id = $1")
        .bind(quiz_id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Appends a question. Without an explicit position it goes last.
pub async fn add_question(
    State(pool): State<PgPool>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut tx = pool.begin().await?;
    lock_quiz(&mut tx, quiz_id).await?;

    let position = match payload.position {
        Some(position) => position,
        None => {
            let (next,): (i32,) = sqlx::query_as(
                "SELECT COALESCE(MAX(position) + 1, 0) FROM questions WHERE quiz_id = $1",
            )
            .bind(quiz_id)
            .fetch_one(&mut *tx)
            .await?;
            next
        }
    };

    let question = sqlx::query_as::<_, Question>(
        r#"
        INSERT INTO questions (quiz_id, question_type, prompt, options, points, position)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, quiz_id, question_type, prompt, options, points, position
        "#,
    )
    .bind(quiz_id)
    .bind(payload.question_type.as_str())
    .bind(&payload.prompt)
    .bind(SqlJson(&payload.options))
    .bind(payload.points)
    .bind(position)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(question)))
}

/// Updates a question. Type and options are re-checked together, so
/// changing one can't leave the other inconsistent.
pub async fn update_question(
    State(pool): State<PgPool>,
    Path(question_id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut tx = pool.begin().await?;

    let existing = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, quiz_id, question_type, prompt, options, points, position
        FROM questions
        WHERE id = $1
        "#,
    )
    .bind(question_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("Question not found".to_string()))?;

    lock_quiz(&mut tx, existing.quiz_id).await?;

    let question_type = match payload.question_type {
        Some(kind) => kind,
        None => existing.kind().ok_or_else(|| {
            AppError::InternalServerError(format!(
                "Question {} has unknown type '{}'",
                existing.id, existing.question_type
            ))
        })?,
    };
    let options = payload.options.unwrap_or(existing.options.0);
    check_options(question_type, &options)?;

    let question = sqlx::query_as::<_, Question>(
        r#"
        UPDATE questions SET
            question_type = $1,
            prompt = $2,
            options = $3,
            points = $4,
            position = $5
        WHERE id = $6
        RETURNING id, quiz_id, question_type, prompt, options, points, position
        "#,
    )
    .bind(question_type.as_str())
    .bind(payload.prompt.unwrap_or(existing.prompt))
    .bind(SqlJson(&options))
    .bind(payload.points.unwrap_or(existing.points))
    .bind(payload.position.unwrap_or(existing.position))
    .bind(question_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Json(question))
}

pub async fn delete_question(
    State(pool): State<PgPool>,
    Path(question_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let (quiz_id,): (i64,) = sqlx::query_as("SELECT quiz_id FROM questions WHERE id = $1")
        .bind(question_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    lock_quiz(&mut tx, quiz_id).await?;

    sqlx::query("DELETE FROM questions WHERE id = $1")
        .bind(question_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Every attempt at a quiz, best first.
pub async fn list_quiz_attempts(
    State(pool): State<PgPool>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempts = sqlx::query_as::<_, AttemptSummary>(
        r#"
        SELECT a.id, a.user_id, u.username, a.score, a.max_score, a.percentage, a.passed,
               a.completed_at
        FROM quiz_attempts a
        JOIN users u ON a.user_id = u.id
        WHERE a.quiz_id = $1
        ORDER BY a.percentage DESC, a.completed_at ASC
        "#,
    )
    .bind(quiz_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(attempts))
}
