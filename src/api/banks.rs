use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::QuestionKind;
use crate::repositories;
use crate::schemas::bank::{BankCreate, BankResponse, BankUpdate, QuestionCreate, QuestionResponse};
use crate::services::tokens;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_bank).get(list_banks))
        .route("/:bank_id", get(get_bank).patch(update_bank).delete(delete_bank))
        .route("/:bank_id/questions", post(add_question).get(list_questions))
        .route("/:bank_id/questions/:question_id", axum::routing::delete(delete_question))
}

async fn create_bank(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<BankCreate>,
) -> Result<(StatusCode, Json<BankResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let now = primitive_now_utc();
    let bank = repositories::banks::create(
        state.db(),
        repositories::banks::CreateBank {
            id: &tokens::new_id(),
            name: payload.name.trim(),
            description: payload.description.as_deref(),
            created_by: &user.id,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create question bank"))?;

    Ok((StatusCode::CREATED, Json(BankResponse::from_model(bank, 0))))
}

async fn list_banks(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<BankResponse>>, ApiError> {
    let banks = repositories::banks::list_by_owner(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list question banks"))?;

    let mut responses = Vec::with_capacity(banks.len());
    for bank in banks {
        let count = repositories::questions::count_by_bank(state.db(), &bank.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to count questions"))?;
        responses.push(BankResponse::from_model(bank, count));
    }

    Ok(Json(responses))
}

async fn get_bank(
    Path(bank_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<BankResponse>, ApiError> {
    let bank = repositories::banks::find_owned(state.db(), &bank_id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load question bank"))?
        .ok_or_else(|| ApiError::NotFound("Question bank not found".to_string()))?;

    let count = repositories::questions::count_by_bank(state.db(), &bank.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count questions"))?;

    Ok(Json(BankResponse::from_model(bank, count)))
}

async fn update_bank(
    Path(bank_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<BankUpdate>,
) -> Result<Json<BankResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let bank = repositories::banks::find_owned(state.db(), &bank_id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load question bank"))?
        .ok_or_else(|| ApiError::NotFound("Question bank not found".to_string()))?;

    repositories::banks::update(
        state.db(),
        &bank.id,
        repositories::banks::UpdateBank {
            name: payload.name,
            description: payload.description,
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update question bank"))?;

    let bank = repositories::banks::find_owned(state.db(), &bank_id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to reload question bank"))?
        .ok_or_else(|| ApiError::NotFound("Question bank not found".to_string()))?;
    let count = repositories::questions::count_by_bank(state.db(), &bank.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count questions"))?;

    Ok(Json(BankResponse::from_model(bank, count)))
}

async fn delete_bank(
    Path(bank_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let bank = repositories::banks::find_owned(state.db(), &bank_id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load question bank"))?
        .ok_or_else(|| ApiError::NotFound("Question bank not found".to_string()))?;

    repositories::banks::delete(state.db(), &bank.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete question bank"))?;

    Ok(StatusCode::NO_CONTENT)
}

fn validate_question(payload: &QuestionCreate) -> Result<(), ApiError> {
    match payload.question_type {
        QuestionKind::MultipleChoice => {
            if payload.options.len() < 2 {
                return Err(ApiError::BadRequest(
                    "multiple_choice questions need at least 2 options".to_string(),
                ));
            }
            if !payload.options.iter().any(|option| option == &payload.correct_answer) {
                return Err(ApiError::BadRequest(
                    "correct_answer must be one of the options".to_string(),
                ));
            }
        }
        QuestionKind::TrueFalse => {
            let normalized = payload.correct_answer.trim().to_lowercase();
            if normalized != "true" && normalized != "false" {
                return Err(ApiError::BadRequest(
                    "true_false questions must have 'true' or 'false' as the answer".to_string(),
                ));
            }
        }
        QuestionKind::ShortAnswer | QuestionKind::Essay => {}
    }
    Ok(())
}

async fn add_question(
    Path(bank_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<QuestionCreate>,
) -> Result<(StatusCode, Json<QuestionResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    validate_question(&payload)?;

    let bank = repositories::banks::find_owned(state.db(), &bank_id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load question bank"))?
        .ok_or_else(|| ApiError::NotFound("Question bank not found".to_string()))?;

    let options = serde_json::to_value(&payload.options)
        .map_err(|e| ApiError::internal(e, "Failed to encode options"))?;

    let question = repositories::questions::create(
        state.db(),
        repositories::questions::CreateQuestion {
            id: &tokens::new_id(),
            question_bank_id: &bank.id,
            question_text: payload.question_text.trim(),
            question_type: payload.question_type,
            options,
            correct_answer: &payload.correct_answer,
            difficulty: payload.difficulty,
            category: payload.category.as_deref(),
            created_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create question"))?;

    Ok((StatusCode::CREATED, Json(question.into())))
}

async fn list_questions(
    Path(bank_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<QuestionResponse>>, ApiError> {
    let bank = repositories::banks::find_owned(state.db(), &bank_id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load question bank"))?
        .ok_or_else(|| ApiError::NotFound("Question bank not found".to_string()))?;

    let questions = repositories::questions::list_by_bank(state.db(), &bank.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list questions"))?;

    Ok(Json(questions.into_iter().map(QuestionResponse::from).collect()))
}

async fn delete_question(
    Path((bank_id, question_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let bank = repositories::banks::find_owned(state.db(), &bank_id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load question bank"))?
        .ok_or_else(|| ApiError::NotFound("Question bank not found".to_string()))?;

    let question = repositories::questions::find_by_id(state.db(), &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load question"))?
        .ok_or_else(|| ApiError::NotFound("Question not found".to_string()))?;

    if question.question_bank_id != bank.id {
        return Err(ApiError::NotFound("Question not found".to_string()));
    }

    repositories::questions::delete(state.db(), &question.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete question"))?;

    Ok(StatusCode::NO_CONTENT)
}
