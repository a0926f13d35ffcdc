use axum::http::request::Parts;
use axum::{async_trait, extract::FromRequestParts};

use crate::errors::WebError;

/// Header carrying the signed-in user's id, set by the auth layer in front of this server.
pub const USER_HEADER: &str = "x-user-id";

/// The user a request acts for. Use this as a request guard on per-user routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(USER_HEADER)
            .ok_or(WebError::Unauthorized("You must be signed in to save recipes"))?;
        let user = header
            .to_str()
            .map_err(|_| WebError::Unauthorized("Invalid user header"))?
            .trim();
        if user.is_empty() || user.len() > 128 {
            return Err(WebError::Unauthorized("Invalid user header"));
        }
        Ok(UserId(user.to_string()))
    }
}
