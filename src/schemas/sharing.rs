use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{TestInvite, TestPublicLink};
use crate::db::types::InviteStatus;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct InviteBatchCreate {
    #[validate(length(min = 1, max = 50, message = "emails must contain 1-50 addresses"))]
    pub(crate) emails: Vec<String>,
    #[serde(default)]
    pub(crate) message: Option<String>,
    #[serde(default)]
    #[validate(range(min = 1, max = 90, message = "expires_in_days must be 1-90"))]
    pub(crate) expires_in_days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct InviteResponse {
    pub(crate) id: String,
    pub(crate) test_id: String,
    pub(crate) invited_email: String,
    pub(crate) invite_token: String,
    pub(crate) message: Option<String>,
    pub(crate) status: InviteStatus,
    pub(crate) expires_at: Option<String>,
    pub(crate) created_at: String,
}

impl From<TestInvite> for InviteResponse {
    fn from(invite: TestInvite) -> Self {
        Self {
            id: invite.id,
            test_id: invite.test_id,
            invited_email: invite.invited_email,
            invite_token: invite.invite_token,
            message: invite.message,
            status: invite.status,
            expires_at: invite.expires_at.map(format_primitive),
            created_at: format_primitive(invite.created_at),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct PublicLinkCreate {
    #[serde(default)]
    #[validate(range(min = 1, max = 10000, message = "max_uses must be 1-10000"))]
    pub(crate) max_uses: Option<i32>,
    #[serde(default)]
    #[validate(range(min = 1, max = 365, message = "expires_in_days must be 1-365"))]
    pub(crate) expires_in_days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PublicLinkResponse {
    pub(crate) id: String,
    pub(crate) test_id: String,
    pub(crate) link_token: String,
    pub(crate) is_active: bool,
    pub(crate) max_uses: Option<i32>,
    pub(crate) current_uses: i32,
    pub(crate) expires_at: Option<String>,
    pub(crate) created_at: String,
}

impl From<TestPublicLink> for PublicLinkResponse {
    fn from(link: TestPublicLink) -> Self {
        Self {
            id: link.id,
            test_id: link.test_id,
            link_token: link.link_token,
            is_active: link.is_active,
            max_uses: link.max_uses,
            current_uses: link.current_uses,
            expires_at: link.expires_at.map(format_primitive),
            created_at: format_primitive(link.created_at),
        }
    }
}

/// What a participant learns when they validate a token before
/// starting: enough to render the landing page, nothing more.
#[derive(Debug, Serialize)]
pub(crate) struct TokenInfoResponse {
    pub(crate) valid: bool,
    pub(crate) test_id: Option<String>,
    pub(crate) test_title: Option<String>,
    pub(crate) num_questions: Option<i32>,
    pub(crate) time_limit_minutes: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) invited_email: Option<String>,
}

impl TokenInfoResponse {
    pub(crate) fn invalid() -> Self {
        Self {
            valid: false,
            test_id: None,
            test_title: None,
            num_questions: None,
            time_limit_minutes: None,
            invited_email: None,
        }
    }
}
