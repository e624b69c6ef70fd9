//! Identity extraction for HTTP requests.
//!
//! Credentials are verified by the external auth collaborator before a
//! request reaches this server; what arrives here is the already
//! authenticated user id, carried in a header. This extractor only rejects
//! requests that carry no identity at all.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use parley_shared::types::UserId;

use crate::error::ServerError;

/// Header carrying the pre-verified user identity.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller of a protected route.
pub struct AuthUser(pub UserId);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(ServerError::Unauthorized)?;

        Ok(AuthUser(UserId::new(user_id)))
    }
}
