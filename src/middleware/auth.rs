use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use crate::auth::{Credential, TOKEN_COOKIE};
use crate::error::{ApiError, MSG_NOT_AUTHENTICATED};
use crate::state::AppState;

/// Credential verification middleware.
///
/// Rejects with 401 unless the request carries a valid, unexpired credential
/// created after the invalidation watermark. On success the decoded
/// [`Credential`] is inserted into the request extensions.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized(MSG_NOT_AUTHENTICATED))?;

    let credential = state.verifier.verify(&token).map_err(|e| {
        tracing::debug!("Credential rejected: {}", e);
        ApiError::from(e)
    })?;

    tracing::trace!("Authenticated {} (service: {})", credential.id, credential.service);
    request.extensions_mut().insert(credential);

    Ok(next.run(request).await)
}

/// Bearer header first (scheme matched case-insensitively), then the
/// unsigned `token` cookie.
fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.trim_start().split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .filter(|t| !t.is_empty());

    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(headers)
        .get(TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|t| !t.is_empty())
}

/// Handlers behind [`authenticate`] can take the credential as an argument.
#[async_trait]
impl<S> FromRequestParts<S> for Credential
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Credential>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized(MSG_NOT_AUTHENTICATED))
    }
}
