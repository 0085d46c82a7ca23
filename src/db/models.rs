use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{DifficultyLevel, InviteStatus, QuestionKind, SessionStatus};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) name: String,
    pub(crate) hashed_password: String,
    pub(crate) is_active: bool,
    pub(crate) is_guest: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct QuestionBank {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) created_by: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) question_bank_id: String,
    pub(crate) question_text: String,
    pub(crate) question_type: QuestionKind,
    pub(crate) options: Json<Vec<String>>,
    pub(crate) correct_answer: String,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) category: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Test {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) question_bank_ids: Json<Vec<String>>,
    pub(crate) created_by: String,
    pub(crate) num_questions: i32,
    pub(crate) time_limit_minutes: Option<i32>,
    pub(crate) difficulty_filter: Option<DifficultyLevel>,
    pub(crate) category_filter: Option<String>,
    pub(crate) is_active: bool,
    pub(crate) is_public: bool,
    pub(crate) scheduled_start: Option<PrimitiveDateTime>,
    pub(crate) scheduled_end: Option<PrimitiveDateTime>,
    pub(crate) max_attempts: i32,
    pub(crate) pass_threshold: f64,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// One autosaved answer inside a session's draft map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AnswerDraft {
    pub(crate) selected_answer: String,
    pub(crate) question_number: i32,
    pub(crate) saved_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct TestSession {
    pub(crate) id: String,
    pub(crate) test_id: String,
    pub(crate) user_id: Option<String>,
    pub(crate) participant_name: String,
    pub(crate) participant_email: Option<String>,
    pub(crate) session_token: String,
    pub(crate) invite_token: Option<String>,
    pub(crate) status: SessionStatus,
    pub(crate) current_question: i32,
    pub(crate) answers_draft: Json<HashMap<String, AnswerDraft>>,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) expires_at: PrimitiveDateTime,
    pub(crate) submission_id: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct QuestionResult {
    pub(crate) question_id: String,
    pub(crate) selected_answer: String,
    pub(crate) correct_answer: String,
    pub(crate) is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct TestSubmission {
    pub(crate) id: String,
    pub(crate) test_id: String,
    pub(crate) user_id: Option<String>,
    pub(crate) participant_name: String,
    pub(crate) participant_email: Option<String>,
    pub(crate) score: f64,
    pub(crate) total_questions: i32,
    pub(crate) correct_answers: i32,
    pub(crate) is_passed: bool,
    pub(crate) time_taken_minutes: Option<i32>,
    pub(crate) question_results: Json<Vec<QuestionResult>>,
    pub(crate) session_id: Option<String>,
    pub(crate) invite_token: Option<String>,
    pub(crate) submitted_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct TestAnalytics {
    pub(crate) test_id: String,
    pub(crate) total_submissions: i32,
    pub(crate) total_participants: i32,
    pub(crate) average_score: f64,
    pub(crate) pass_rate: f64,
    pub(crate) average_time_minutes: f64,
    pub(crate) last_updated: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct TestInvite {
    pub(crate) id: String,
    pub(crate) test_id: String,
    pub(crate) created_by: String,
    pub(crate) invited_user_id: Option<String>,
    pub(crate) invited_email: String,
    pub(crate) invite_token: String,
    pub(crate) message: Option<String>,
    pub(crate) status: InviteStatus,
    pub(crate) expires_at: Option<PrimitiveDateTime>,
    pub(crate) accepted_at: Option<PrimitiveDateTime>,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct TestPublicLink {
    pub(crate) id: String,
    pub(crate) test_id: String,
    pub(crate) created_by: String,
    pub(crate) link_token: String,
    pub(crate) is_active: bool,
    pub(crate) max_uses: Option<i32>,
    pub(crate) current_uses: i32,
    pub(crate) expires_at: Option<PrimitiveDateTime>,
    pub(crate) created_at: PrimitiveDateTime,
}
