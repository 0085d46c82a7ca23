use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::core::security::hash_password;
use crate::core::time::primitive_now_utc;
use crate::db::models::User;
use crate::repositories::users::{self, CreateUser};
use crate::services::tokens;

/// Who is taking the test. Authenticated callers map to their account;
/// anonymous callers with an email get a reusable guest account, and
/// callers with neither stay fully anonymous.
pub(crate) struct Participant {
    pub(crate) user_id: Option<String>,
    pub(crate) name: String,
    pub(crate) email: Option<String>,
    pub(crate) is_guest: bool,
}

pub(crate) async fn resolve(
    pool: &PgPool,
    current: Option<&User>,
    participant_name: &str,
    participant_email: Option<&str>,
) -> Result<Participant> {
    if let Some(user) = current {
        return Ok(Participant {
            user_id: Some(user.id.clone()),
            name: user.name.clone(),
            email: Some(user.email.clone()),
            is_guest: user.is_guest,
        });
    }

    let Some(email) = participant_email else {
        return Ok(Participant {
            user_id: None,
            name: participant_name.to_string(),
            email: None,
            is_guest: true,
        });
    };

    let email = email.trim().to_lowercase();
    if let Some(existing) = users::find_by_email(pool, &email).await? {
        return Ok(Participant {
            user_id: Some(existing.id),
            name: participant_name.to_string(),
            email: Some(email),
            is_guest: existing.is_guest,
        });
    }

    // Guest accounts cannot log in; the placeholder password is random
    // and never shown to anyone.
    let hashed_password =
        hash_password(&tokens::generate_token()).context("hash guest placeholder password")?;
    let now = primitive_now_utc();
    let user = users::create(
        pool,
        CreateUser {
            id: &tokens::new_id(),
            email: &email,
            name: participant_name,
            hashed_password,
            is_active: true,
            is_guest: true,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .context("create guest user")?;

    Ok(Participant {
        user_id: Some(user.id),
        name: user.name,
        email: Some(user.email),
        is_guest: true,
    })
}
