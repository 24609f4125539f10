use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use crate::error::ServiceError;

/// Caller credential taken from `Authorization: Bearer <token>`.
///
/// Only presence is checked. Any non-blank token is accepted; there is no
/// verification against an identity provider yet.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ServiceError::Unauthorized)?;

        let token = bearer.token().trim();
        if token.is_empty() {
            return Err(ServiceError::Unauthorized);
        }
        Ok(BearerToken(token.to_string()))
    }
}
