use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Question, QuestionBank};
use crate::db::types::{DifficultyLevel, QuestionKind};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct BankCreate {
    #[validate(length(min = 1, max = 200, message = "name must be 1-200 characters"))]
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct BankUpdate {
    #[serde(default)]
    #[validate(length(min = 1, max = 200, message = "name must be 1-200 characters"))]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) description: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct BankResponse {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) created_by: String,
    pub(crate) question_count: i64,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl BankResponse {
    pub(crate) fn from_model(bank: QuestionBank, question_count: i64) -> Self {
        Self {
            id: bank.id,
            name: bank.name,
            description: bank.description,
            created_by: bank.created_by,
            question_count,
            created_at: format_primitive(bank.created_at),
            updated_at: format_primitive(bank.updated_at),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionCreate {
    #[validate(length(min = 1, message = "question_text must not be empty"))]
    pub(crate) question_text: String,
    pub(crate) question_type: QuestionKind,
    #[serde(default)]
    pub(crate) options: Vec<String>,
    #[validate(length(min = 1, message = "correct_answer must not be empty"))]
    pub(crate) correct_answer: String,
    #[serde(default = "default_difficulty")]
    pub(crate) difficulty: DifficultyLevel,
    #[serde(default)]
    pub(crate) category: Option<String>,
}

/// Owner-side view: includes the correct answer.
#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    pub(crate) id: String,
    pub(crate) question_bank_id: String,
    pub(crate) question_text: String,
    pub(crate) question_type: QuestionKind,
    pub(crate) options: Vec<String>,
    pub(crate) correct_answer: String,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) category: Option<String>,
    pub(crate) created_at: String,
}

impl From<Question> for QuestionResponse {
    fn from(question: Question) -> Self {
        Self {
            id: question.id,
            question_bank_id: question.question_bank_id,
            question_text: question.question_text,
            question_type: question.question_type,
            options: question.options.0,
            correct_answer: question.correct_answer,
            difficulty: question.difficulty,
            category: question.category,
            created_at: format_primitive(question.created_at),
        }
    }
}

fn default_difficulty() -> DifficultyLevel {
    DifficultyLevel::Medium
}
