use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use time::Duration;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{require_owned_test, CurrentUser};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::InviteStatus;
use crate::repositories;
use crate::schemas::sharing::{
    InviteBatchCreate, InviteResponse, PublicLinkCreate, PublicLinkResponse, TokenInfoResponse,
};
use crate::services::tokens;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/tests/:test_id/invites", post(create_invites).get(list_invites))
        .route("/invites/:invite_id", delete(delete_invite))
        .route("/tests/:test_id/links", post(create_link).get(list_links))
        .route("/links/:link_id", delete(deactivate_link))
        .route("/tokens/:token", get(token_info))
}

async fn create_invites(
    Path(test_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<InviteBatchCreate>,
) -> Result<(StatusCode, Json<Vec<InviteResponse>>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    for email in &payload.emails {
        if !email.contains('@') || email.trim().is_empty() {
            return Err(ApiError::BadRequest(format!("invalid email: {email}")));
        }
    }

    let test = require_owned_test(&state, &user, &test_id).await?;

    let now = primitive_now_utc();
    let expires_at = payload.expires_in_days.map(|days| now + Duration::days(days));

    let mut responses = Vec::with_capacity(payload.emails.len());
    for email in &payload.emails {
        let email = email.trim().to_lowercase();
        let invited_user = repositories::users::find_by_email(state.db(), &email)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to look up invitee"))?;

        let invite = repositories::invites::create(
            state.db(),
            repositories::invites::CreateInvite {
                id: &tokens::new_id(),
                test_id: &test.id,
                created_by: &user.id,
                invited_user_id: invited_user.as_ref().map(|user| user.id.as_str()),
                invited_email: &email,
                invite_token: &tokens::generate_token(),
                message: payload.message.as_deref(),
                expires_at,
                created_at: now,
            },
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to create invite"))?;
        responses.push(invite.into());
    }

    Ok((StatusCode::CREATED, Json(responses)))
}

async fn list_invites(
    Path(test_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<InviteResponse>>, ApiError> {
    let test = require_owned_test(&state, &user, &test_id).await?;

    let invites = repositories::invites::list_by_test(state.db(), &test.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list invites"))?;

    Ok(Json(invites.into_iter().map(InviteResponse::from).collect()))
}

async fn delete_invite(
    Path(invite_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let invite = repositories::invites::find_by_id(state.db(), &invite_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load invite"))?
        .ok_or_else(|| ApiError::NotFound("Invite not found".to_string()))?;

    if invite.created_by != user.id {
        return Err(ApiError::Forbidden("You do not own this invite"));
    }

    repositories::invites::delete(state.db(), &invite.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete invite"))?;

    Ok(StatusCode::NO_CONTENT)
}

async fn create_link(
    Path(test_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<PublicLinkCreate>,
) -> Result<(StatusCode, Json<PublicLinkResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let test = require_owned_test(&state, &user, &test_id).await?;

    let now = primitive_now_utc();
    let link = repositories::public_links::create(
        state.db(),
        repositories::public_links::CreateLink {
            id: &tokens::new_id(),
            test_id: &test.id,
            created_by: &user.id,
            link_token: &tokens::generate_token(),
            max_uses: payload.max_uses,
            expires_at: payload.expires_in_days.map(|days| now + Duration::days(days)),
            created_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create link"))?;

    Ok((StatusCode::CREATED, Json(link.into())))
}

async fn list_links(
    Path(test_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<PublicLinkResponse>>, ApiError> {
    let test = require_owned_test(&state, &user, &test_id).await?;

    let links = repositories::public_links::list_by_test(state.db(), &test.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list links"))?;

    Ok(Json(links.into_iter().map(PublicLinkResponse::from).collect()))
}

async fn deactivate_link(
    Path(link_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let link = repositories::public_links::find_by_id(state.db(), &link_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load link"))?
        .ok_or_else(|| ApiError::NotFound("Link not found".to_string()))?;
    if link.created_by != user.id {
        return Err(ApiError::Forbidden("You do not own this link"));
    }

    repositories::public_links::deactivate(state.db(), &link.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to deactivate link"))?;

    Ok(StatusCode::NO_CONTENT)
}

/// Public endpoint: participants validate a token before entering a
/// name and starting.
async fn token_info(
    Path(token): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<TokenInfoResponse>, ApiError> {
    let now = primitive_now_utc();

    if let Some(invite) = repositories::invites::find_by_token(state.db(), &token)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load invite"))?
    {
        let expired = invite.expires_at.is_some_and(|expires_at| expires_at <= now);
        if invite.status != InviteStatus::Pending || expired {
            return Ok(Json(TokenInfoResponse::invalid()));
        }
        let test = repositories::tests::find_by_id(state.db(), &invite.test_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load test"))?;
        let Some(test) = test.filter(|test| test.is_active) else {
            return Ok(Json(TokenInfoResponse::invalid()));
        };
        return Ok(Json(TokenInfoResponse {
            valid: true,
            test_id: Some(test.id),
            test_title: Some(test.title),
            num_questions: Some(test.num_questions),
            time_limit_minutes: test.time_limit_minutes,
            invited_email: Some(invite.invited_email),
        }));
    }

    if let Some(link) = repositories::public_links::find_by_token(state.db(), &token)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load link"))?
    {
        let expired = link.expires_at.is_some_and(|expires_at| expires_at <= now);
        let exhausted = link.max_uses.is_some_and(|max| link.current_uses >= max);
        if !link.is_active || expired || exhausted {
            return Ok(Json(TokenInfoResponse::invalid()));
        }
        let test = repositories::tests::find_by_id(state.db(), &link.test_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load test"))?;
        let Some(test) = test.filter(|test| test.is_active) else {
            return Ok(Json(TokenInfoResponse::invalid()));
        };
        return Ok(Json(TokenInfoResponse {
            valid: true,
            test_id: Some(test.id),
            test_title: Some(test.title),
            num_questions: Some(test.num_questions),
            time_limit_minutes: test.time_limit_minutes,
            invited_email: None,
        }));
    }

    Ok(Json(TokenInfoResponse::invalid()))
}
