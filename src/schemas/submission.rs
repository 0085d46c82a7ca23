use serde::Serialize;

use crate::core::time::format_primitive;
use crate::db::models::{QuestionResult, TestSubmission};

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionResponse {
    pub(crate) id: String,
    pub(crate) test_id: String,
    pub(crate) participant_name: String,
    pub(crate) participant_email: Option<String>,
    pub(crate) score: f64,
    pub(crate) total_questions: i32,
    pub(crate) correct_answers: i32,
    pub(crate) is_passed: bool,
    pub(crate) time_taken_minutes: Option<i32>,
    pub(crate) submitted_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) question_results: Option<Vec<QuestionResult>>,
}

impl SubmissionResponse {
    /// Participant view: per-question breakdown included.
    pub(crate) fn detailed(submission: TestSubmission) -> Self {
        let mut response = Self::summary(submission.clone());
        response.question_results = Some(submission.question_results.0);
        response
    }

    /// Roster view: scores only.
    pub(crate) fn summary(submission: TestSubmission) -> Self {
        Self {
            id: submission.id,
            test_id: submission.test_id,
            participant_name: submission.participant_name,
            participant_email: submission.participant_email,
            score: submission.score,
            total_questions: submission.total_questions,
            correct_answers: submission.correct_answers,
            is_passed: submission.is_passed,
            time_taken_minutes: submission.time_taken_minutes,
            submitted_at: format_primitive(submission.submitted_at),
            question_results: None,
        }
    }
}
