use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use super::{claims::Claims, errors::AuthError, jwt::TokenIssuer};

/// Verified token claims. Handlers taking this only run for valid tokens.
pub struct AuthUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<dyn TokenIssuer>: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tokens = <Arc<dyn TokenIssuer> as FromRef<S>>::from_ref(state);

        // An absent header is treated like one without the scheme prefix.
        let presented = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .unwrap_or_default();

        let claims = tokens.verify(presented).map_err(|e| {
            warn!(reason = %e, "rejected token");
            AuthError::Unauthorized(e)
        })?;

        Ok(AuthUser(claims))
    }
}
