use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{dto::validation::validate_uid, state::UserIdentity};

/// Identity assertion forwarded by the client after the provider sign-in popup.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SignInRequest {
    #[validate(custom(function = "validate_uid"))]
    pub uid: String,
    #[serde(default)]
    #[validate(length(max = 256))]
    pub display_name: Option<String>,
    /// Avatar shown next to the user's messages.
    #[serde(default)]
    #[validate(url)]
    pub photo_url: Option<String>,
}

impl From<SignInRequest> for UserIdentity {
    fn from(request: SignInRequest) -> Self {
        Self {
            uid: request.uid,
            display_name: request
                .display_name
                .filter(|name| !name.trim().is_empty()),
            photo_url: request.photo_url,
        }
    }
}

/// Public projection of the signed-in user.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserSummary {
    pub uid: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

impl From<UserIdentity> for UserSummary {
    fn from(identity: UserIdentity) -> Self {
        Self {
            uid: identity.uid,
            display_name: identity.display_name,
            photo_url: identity.photo_url,
        }
    }
}

/// Returned once a session has been opened.
#[derive(Debug, Serialize, ToSchema)]
pub struct SignInResponse {
    /// Token to send back in the `X-Session-Token` header.
    pub token: String,
    pub user: UserSummary,
}

/// Which top-level view the client should render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GateView {
    Login,
    Main,
}

/// Session gate answer.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionView {
    pub view: GateView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
}

impl SessionView {
    pub fn login() -> Self {
        Self {
            view: GateView::Login,
            user: None,
        }
    }

    pub fn main(identity: UserIdentity) -> Self {
        Self {
            view: GateView::Main,
            user: Some(identity.into()),
        }
    }
}
