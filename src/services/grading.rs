// src/services/grading.rs

//! Quiz scoring.
//!
//! Grading is a pure function of the stored quiz definition and the
//! learner's submission. Scores sent by the client are never consulted.

use std::collections::{HashMap, HashSet};

use crate::{
    error::AppError,
    models::{
        attempt::{AnswerValue, QuestionResult, SubmittedAnswer},
        quiz::{Question, QuestionType},
    },
};

/// Outcome of grading one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeOutcome {
    pub score: i32,
    pub max_score: i32,
    pub percentage: f64,
    pub passed: bool,
    pub results: Vec<QuestionResult>,
}

/// Grades `answers` against `questions`.
///
/// The whole submission is rejected when it names a question that is not
/// part of the quiz, or names the same question twice. Unanswered questions
/// score zero but still count towards `max_score`.
pub fn grade_submission(
    questions: &[Question],
    answers: &[SubmittedAnswer],
    passing_score: i32,
) -> Result<GradeOutcome, AppError> {
    if questions.is_empty() {
        return Err(AppError::BadRequest("Quiz has no questions".to_string()));
    }

    let known: HashSet<i64> = questions.iter().map(|q| q.id).collect();
    let mut by_question: HashMap<i64, &AnswerValue> = HashMap::with_capacity(answers.len());

    for submitted in answers {
        if !known.contains(&submitted.question_id) {
            return Err(AppError::BadRequest(format!(
                "Question {} does not belong to this quiz",
                submitted.question_id
            )));
        }
        if by_question
            .insert(submitted.question_id, &submitted.answer)
            .is_some()
        {
            return Err(AppError::BadRequest(format!(
                "Question {} answered more than once",
                submitted.question_id
            )));
        }
    }

    let mut score = 0;
    let mut max_score = 0;
    let mut results = Vec::with_capacity(questions.len());

    for question in questions {
        let kind = question.kind().ok_or_else(|| {
            AppError::InternalServerError(format!(
                "Question {} has unknown type '{}'",
                question.id, question.question_type
            ))
        })?;

        let correct = by_question
            .get(&question.id)
            .is_some_and(|answer| is_correct(kind, question, answer));

        let points_earned = if correct { question.points } else { 0 };
        score += points_earned;
        max_score += question.points;

        results.push(QuestionResult {
            question_id: question.id,
            correct,
            points_earned,
            points_possible: question.points,
        });
    }

    let percentage = percentage(score, max_score);

    Ok(GradeOutcome {
        score,
        max_score,
        percentage,
        passed: is_passing(score, max_score, passing_score),
        results,
    })
}

/// Exact-match check of one answer. No partial credit.
fn is_correct(kind: QuestionType, question: &Question, answer: &AnswerValue) -> bool {
    let selected = answer.as_slice();

    match kind {
        QuestionType::SingleChoice | QuestionType::TrueFalse => match selected {
            [only] => question.correct_option_ids().any(|id| id == only.as_str()),
            _ => false,
        },
        QuestionType::MultipleChoice => {
            let correct: HashSet<&str> = question.correct_option_ids().collect();
            let chosen: HashSet<&str> = selected.iter().map(String::as_str).collect();
            // A repeated id is not a distinct selection.
            !correct.is_empty() && chosen == correct
        }
        QuestionType::ShortAnswer => match selected {
            [text] => {
                let given = normalize(text);
                !given.is_empty()
                    && question
                        .options
                        .iter()
                        .filter(|o| o.is_correct)
                        .any(|o| normalize(&o.text) == given)
            }
            _ => false,
        },
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// `score / max_score * 100`, rounded to two decimals. Zero when there is
/// nothing to score.
pub fn percentage(score: i32, max_score: i32) -> f64 {
    if max_score <= 0 {
        return 0.0;
    }
    let raw = f64::from(score) / f64::from(max_score) * 100.0;
    (raw * 100.0).round() / 100.0
}

/// `score / max_score * 100 >= passing_score`, decided on exact integers.
/// The rounded percentage is for display only and never drives the verdict.
pub fn is_passing(score: i32, max_score: i32, passing_score: i32) -> bool {
    if max_score <= 0 {
        return passing_score <= 0;
    }
    i64::from(score) * 100 >= i64::from(passing_score) * i64::from(max_score)
}
