use axum::{extract::FromRequestParts, http::request::Parts};

use cadenza_core::UserId;

use crate::error::Error;

/// The authenticated user, read from the bearer token.
///
/// Session management is outside this crate; the bearer carries the user
/// id verbatim, which is where a real session layer plugs in.
pub struct AuthUser(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(Error::Unauthorized)?;

        let token = header.strip_prefix("Bearer ").ok_or(Error::Unauthorized)?;

        token
            .trim()
            .parse::<UserId>()
            .map(AuthUser)
            .map_err(|_| Error::Unauthorized)
    }
}
