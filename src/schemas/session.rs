use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::TestSession;
use crate::db::types::{QuestionKind, SessionStatus};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SessionStart {
    #[validate(length(min = 1, max = 100, message = "participant_name must be 1-100 characters"))]
    pub(crate) participant_name: String,
    #[serde(default)]
    #[validate(email(message = "participant_email must be a valid email"))]
    pub(crate) participant_email: Option<String>,
    #[serde(default)]
    pub(crate) invite_token: Option<String>,
    #[serde(default)]
    pub(crate) link_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionResponse {
    pub(crate) id: String,
    pub(crate) test_id: String,
    pub(crate) session_token: String,
    pub(crate) participant_name: String,
    pub(crate) status: SessionStatus,
    pub(crate) current_question: i32,
    pub(crate) answered_count: usize,
    pub(crate) started_at: String,
    pub(crate) expires_at: String,
}

impl From<TestSession> for SessionResponse {
    fn from(session: TestSession) -> Self {
        Self {
            id: session.id,
            test_id: session.test_id,
            session_token: session.session_token,
            participant_name: session.participant_name,
            status: session.status,
            current_question: session.current_question,
            answered_count: session.answers_draft.0.len(),
            started_at: format_primitive(session.started_at),
            expires_at: format_primitive(session.expires_at),
        }
    }
}

/// Participant-side view of a question: the correct answer never leaves
/// the server while a session is running.
#[derive(Debug, Serialize)]
pub(crate) struct QuestionPublic {
    pub(crate) id: String,
    pub(crate) question_number: i32,
    pub(crate) question_text: String,
    pub(crate) question_type: QuestionKind,
    pub(crate) options: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionQuestionsResponse {
    pub(crate) test_id: String,
    pub(crate) title: String,
    pub(crate) time_limit_minutes: Option<i32>,
    pub(crate) questions: Vec<QuestionPublic>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SaveAnswer {
    #[validate(length(min = 1, message = "question_id must not be empty"))]
    pub(crate) question_id: String,
    pub(crate) selected_answer: String,
    #[validate(range(min = 1, message = "question_number must be positive"))]
    pub(crate) question_number: i32,
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionStatusResponse {
    pub(crate) status: SessionStatus,
    pub(crate) current_question: i32,
    pub(crate) answered_count: usize,
    /// True once the draft holds as many answers as the test has
    /// questions. A count check only; it does not verify which
    /// question ids are present.
    pub(crate) can_submit: bool,
    pub(crate) time_remaining_seconds: i64,
    pub(crate) expires_at: String,
}
