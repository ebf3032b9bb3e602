//! Actor Extractor
//!
//! Custom extractor reading the identity headers set by the upstream
//! auth/routing layer.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::auth::{CurrentUser, Role};
use crate::core::ServerState;
use crate::utils::AppError;

const USER_ID_HEADER: &str = "x-user-id";
const USER_ROLE_HEADER: &str = "x-user-role";
const USER_EMAIL_HEADER: &str = "x-user-email";

impl FromRequestParts<ServerState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        // Check if already extracted (from middleware)
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            return Ok(user.clone());
        }

        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Forbidden("Missing user identity".into()))?
            .to_string();

        let role = match parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|h| h.to_str().ok())
        {
            Some("admin") => Role::Admin,
            _ => Role::User,
        };

        let email = parts
            .headers
            .get(USER_EMAIL_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string());

        let user = CurrentUser {
            user_id,
            role,
            email,
        };
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}
