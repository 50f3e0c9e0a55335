// src/models/quiz.rs

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::{Validate, ValidationError};

/// Represents the 'quizzes' table. At most one quiz per module.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub module_id: i64,
    pub title: String,
    /// Minimum percentage (0-100, inclusive) for an attempt to pass.
    pub passing_score: i32,
    pub time_limit_minutes: Option<i32>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
}

impl QuestionType {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "single_choice",
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::TrueFalse => "true_false",
            QuestionType::ShortAnswer => "short_answer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "single_choice" => Some(QuestionType::SingleChoice),
            "multiple_choice" => Some(QuestionType::MultipleChoice),
            "true_false" => Some(QuestionType::TrueFalse),
            "short_answer" => Some(QuestionType::ShortAnswer),
            _ => None,
        }
    }
}

/// One entry of a question's JSON options list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// Option as shown to a learner taking the quiz.
#[derive(Debug, Clone, Serialize)]
pub struct PublicOption {
    pub id: String,
    pub text: String,
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub quiz_id: i64,

    /// 'single_choice', 'multiple_choice', 'true_false' or 'short_answer'.
    pub question_type: String,

    pub prompt: String,

    /// Ordered options, stored as a JSON array.
    pub options: Json<Vec<QuestionOption>>,

    pub points: i32,
    pub position: i32,
}

impl Question {
    pub fn kind(&self) -> Option<QuestionType> {
        QuestionType::parse(&self.question_type)
    }

    /// Ids of the options flagged correct, in display order.
    pub fn correct_option_ids(&self) -> impl Iterator<Item = &str> {
        self.options
            .iter()
            .filter(|o| o.is_correct)
            .map(|o| o.id.as_str())
    }
}

/// DTO for sending a question to a learner (correctness flags stripped).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    #[serde(rename = "type")]
    pub question_type: String,
    pub prompt: String,
    pub options: Vec<PublicOption>,
    pub points: i32,
    pub position: i32,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        // Short-answer options hold the accepted answers; never expose them.
        let options = if q.kind() == Some(QuestionType::ShortAnswer) {
            Vec::new()
        } else {
            q.options
                .0
                .into_iter()
                .map(|o| PublicOption {
                    id: o.id,
                    text: o.text,
                })
                .collect()
        };

        PublicQuestion {
            id: q.id,
            question_type: q.question_type,
            prompt: q.prompt,
            options,
            points: q.points,
            position: q.position,
        }
    }
}

/// Quiz with its questions, learner view.
#[derive(Debug, Serialize)]
pub struct QuizForTaking {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<PublicQuestion>,
}

/// Quiz with its questions, author view.
#[derive(Debug, Serialize)]
pub struct QuizWithQuestions {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<Question>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(range(min = 0, max = 100, message = "Passing score must be between 0 and 100"))]
    pub passing_score: i32,
    #[validate(range(min = 1))]
    pub time_limit_minutes: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(range(min = 0, max = 100, message = "Passing score must be between 0 and 100"))]
    pub passing_score: Option<i32>,
    #[validate(range(min = 1))]
    pub time_limit_minutes: Option<i32>,
}

/// DTO for creating a question.
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = validate_question_shape))]
pub struct CreateQuestionRequest {
    pub question_type: QuestionType,
    #[validate(length(min = 1, max = 2000))]
    pub prompt: String,
    #[validate(length(min = 1, max = 20))]
    pub options: Vec<QuestionOption>,
    #[validate(range(min = 1, max = 1000))]
    #[serde(default = "default_points")]
    pub points: i32,
    pub position: Option<i32>,
}

/// DTO for updating a question. Type and options are replaced together.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[validate(length(min = 1, max = 2000))]
    pub prompt: Option<String>,
    pub question_type: Option<QuestionType>,
    #[validate(length(min = 1, max = 20))]
    pub options: Option<Vec<QuestionOption>>,
    #[validate(range(min = 1, max = 1000))]
    pub points: Option<i32>,
    pub position: Option<i32>,
}

fn default_points() -> i32 {
    1
}

fn validate_question_shape(req: &CreateQuestionRequest) -> Result<(), ValidationError> {
    check_options(req.question_type, &req.options)
}

/// Structural rules for a question's options.
pub fn check_options(
    question_type: QuestionType,
    options: &[QuestionOption],
) -> Result<(), ValidationError> {
    if options.is_empty() {
        return Err(ValidationError::new("options_cannot_be_empty"));
    }

    let mut seen = HashSet::new();
    for opt in options {
        if opt.id.is_empty() || opt.id.len() > 64 {
            return Err(ValidationError::new("invalid_option_id"));
        }
        if opt.text.len() > 500 {
            return Err(ValidationError::new("option_too_long"));
        }
        if !seen.insert(opt.id.as_str()) {
            return Err(ValidationError::new("duplicate_option_id"));
        }
    }

    let correct = options.iter().filter(|o| o.is_correct).count();
    match question_type {
        QuestionType::SingleChoice if correct != 1 => {
            Err(ValidationError::new("single_choice_needs_one_correct_option"))
        }
        QuestionType::TrueFalse if options.len() != 2 || correct != 1 => {
            Err(ValidationError::new("true_false_needs_two_options_one_correct"))
        }
        QuestionType::MultipleChoice | QuestionType::ShortAnswer if correct == 0 => {
            Err(ValidationError::new("at_least_one_correct_option"))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opt(id: &str, correct: bool) -> QuestionOption {
        QuestionOption {
            id: id.into(),
            text: id.to_uppercase(),
            is_correct: correct,
        }
    }

    #[test]
    fn test_options_default_to_incorrect() {
        let opts: Vec<QuestionOption> =
            serde_json::from_str(r#"[{"id":"a","text":"A","is_correct":true},{"id":"b","text":"B"}]"#)
                .unwrap();
        assert!(opts[0].is_correct);
        assert!(!opts[1].is_correct);
    }

    #[test]
    fn test_single_choice_requires_exactly_one_correct() {
        assert!(check_options(QuestionType::SingleChoice, &[opt("a", true), opt("b", false)]).is_ok());
        assert!(check_options(QuestionType::SingleChoice, &[opt("a", true), opt("b", true)]).is_err());
        assert!(check_options(QuestionType::SingleChoice, &[opt("a", false)]).is_err());
    }

    #[test]
    fn test_true_false_shape() {
        assert!(check_options(QuestionType::TrueFalse, &[opt("t", true), opt("f", false)]).is_ok());
        assert!(
            check_options(
                QuestionType::TrueFalse,
                &[opt("t", true), opt("f", false), opt("x", false)]
            )
            .is_err()
        );
    }

    #[test]
    fn test_duplicate_option_ids_rejected() {
        assert!(check_options(QuestionType::MultipleChoice, &[opt("a", true), opt("a", false)]).is_err());
    }

    #[test]
    fn test_public_question_strips_correctness() {
        let q = Question {
            id: 1,
            quiz_id: 1,
            question_type: "single_choice".into(),
            prompt: "?".into(),
            options: Json(vec![opt("a", true), opt("b", false)]),
            points: 1,
            position: 0,
        };
        let json = serde_json::to_value(PublicQuestion::from(q)).unwrap();
        assert!(json["options"][0].get("is_correct").is_none());
        assert_eq!(json["options"][1]["id"], "b");
    }

    #[test]
    fn test_public_short_answer_hides_accepted_answers() {
        let q = Question {
            id: 2,
            quiz_id: 1,
            question_type: "short_answer".into(),
            prompt: "Capital of France?".into(),
            options: Json(vec![opt("paris", true)]),
            points: 1,
            position: 1,
        };
        assert!(PublicQuestion::from(q).options.is_empty());
    }
}
