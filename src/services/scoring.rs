use std::collections::HashMap;

use crate::db::models::{AnswerDraft, Question, QuestionResult};

pub(crate) struct ScoreOutcome {
    pub(crate) score: f64,
    pub(crate) total_questions: i32,
    pub(crate) correct_answers: i32,
    pub(crate) is_passed: bool,
    pub(crate) question_results: Vec<QuestionResult>,
}

fn normalize(answer: &str) -> String {
    answer.trim().to_lowercase()
}

/// Grade a draft answer map against the test's assigned questions.
///
/// Every question kind, essays included, is graded by normalized string
/// equality. Unanswered questions count as wrong; the denominator is
/// always the full assigned set.
pub(crate) fn grade(
    questions: &[Question],
    answers: &HashMap<String, AnswerDraft>,
    pass_threshold: f64,
) -> ScoreOutcome {
    let mut correct = 0;
    let mut results = Vec::with_capacity(questions.len());

    for question in questions {
        let selected = answers
            .get(&question.id)
            .map(|draft| draft.selected_answer.clone())
            .unwrap_or_default();
        let is_correct = !selected.is_empty()
            && normalize(&selected) == normalize(&question.correct_answer);
        if is_correct {
            correct += 1;
        }
        results.push(QuestionResult {
            question_id: question.id.clone(),
            selected_answer: selected,
            correct_answer: question.correct_answer.clone(),
            is_correct,
        });
    }

    let total = questions.len();
    let score = if total == 0 { 0.0 } else { correct as f64 / total as f64 * 100.0 };

    ScoreOutcome {
        score,
        total_questions: total as i32,
        correct_answers: correct,
        is_passed: score >= pass_threshold,
        question_results: results,
    }
}
