// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::auth::TokenError;
use crate::client::ClientError;

pub const MSG_EXPIRED: &str = "Your token has expired; please re-authenticate.";
pub const MSG_NOT_AUTHENTICATED: &str = "You are not authenticated.";
pub const MSG_NOT_AUTHORISED: &str = "You are not authorised for this action.";
pub const MSG_NOT_PERMITTED: &str = "You are not permitted for this action.";
pub const MSG_NOT_FOUND: &str = "The requested resource could not be found.";
pub const MSG_GUILD_BANNED: &str = "This guild has been banned for breaking the terms of service.";
pub const MSG_INTERNAL: &str = "An internal server error occurred.";

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 401 Unauthorized
    Unauthorized(String),

    // 401 Unauthorized, the client should re-authenticate requesting `elevate` scopes
    ScopeElevationRequired { elevate: &'static str },

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 413 Payload Too Large
    PayloadTooLarge(String),

    // 451 Unavailable For Legal Reasons
    UnavailableForLegalReasons(String),

    // 500 Internal Server Error. `detail` is logged, never sent.
    InternalServerError { detail: String },
}

/// Attached to error responses so the response logger can report the cause.
#[derive(Debug, Clone)]
pub struct FailureDetail {
    pub status: u16,
    pub detail: String,
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Unauthorized(_) => 401,
            ApiError::ScopeElevationRequired { .. } => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::PayloadTooLarge(_) => 413,
            ApiError::UnavailableForLegalReasons(_) => 451,
            ApiError::InternalServerError { .. } => 500,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::Unauthorized(msg) => msg,
            ApiError::ScopeElevationRequired { .. } => MSG_NOT_AUTHORISED,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::PayloadTooLarge(msg) => msg,
            ApiError::UnavailableForLegalReasons(msg) => msg,
            ApiError::InternalServerError { .. } => MSG_INTERNAL,
        }
    }

    fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Convert to JSON response body: `{ error, message, statusCode }`
    pub fn to_json(&self) -> Value {
        let status = self.status();
        let mut body = json!({
            "error": status.canonical_reason().unwrap_or("Error"),
            "message": self.message(),
            "statusCode": status.as_u16(),
        });

        if let ApiError::ScopeElevationRequired { elevate } = self {
            body["elevate"] = json!(elevate);
        }

        body
    }

    /// Detail for the logs; includes internal causes that the client never sees.
    pub fn detail(&self) -> &str {
        match self {
            ApiError::InternalServerError { detail } => detail,
            _ => self.message(),
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn elevation_required(elevate: &'static str) -> Self {
        ApiError::ScopeElevationRequired { elevate }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        ApiError::PayloadTooLarge(message.into())
    }

    pub fn legally_unavailable(message: impl Into<String>) -> Self {
        ApiError::UnavailableForLegalReasons(message.into())
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        ApiError::InternalServerError { detail: detail.into() }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::MissingSecret => ApiError::internal(err.to_string()),
            err if err.is_expired() => ApiError::unauthorized(MSG_EXPIRED),
            _ => ApiError::unauthorized(MSG_NOT_AUTHENTICATED),
        }
    }
}

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> Self {
        // Collaborator failures are not masked as guard outcomes.
        ApiError::internal(err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.detail())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let failure = FailureDetail {
            status: self.status_code(),
            detail: self.detail().to_string(),
        };
        let mut response = (self.status(), Json(self.to_json())).into_response();
        response.extensions_mut().insert(failure);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_shape() {
        let body = ApiError::forbidden(MSG_NOT_PERMITTED).to_json();
        assert_eq!(body["error"], "Forbidden");
        assert_eq!(body["message"], MSG_NOT_PERMITTED);
        assert_eq!(body["statusCode"], 403);
        assert!(body.get("elevate").is_none());
    }

    #[test]
    fn test_elevation_hint() {
        let err = ApiError::elevation_required("admin");
        assert_eq!(err.status_code(), 401);
        let body = err.to_json();
        assert_eq!(body["elevate"], "admin");
        assert_eq!(body["error"], "Unauthorized");
    }

    #[test]
    fn test_legal_reasons_status() {
        let body = ApiError::legally_unavailable(MSG_GUILD_BANNED).to_json();
        assert_eq!(body["statusCode"], 451);
        assert_eq!(body["error"], "Unavailable For Legal Reasons");
    }

    #[test]
    fn test_internal_detail_is_not_exposed() {
        let err: ApiError = ClientError::Lookup("gateway timed out".into()).into();
        let body = err.to_json();
        assert_eq!(body["message"], MSG_INTERNAL);
        assert!(err.detail().contains("gateway timed out"));

        let response = err.into_response();
        let failure = response.extensions().get::<FailureDetail>().unwrap();
        assert_eq!(failure.status, 500);
        assert!(failure.detail.contains("gateway timed out"));
    }

    #[test]
    fn test_token_error_messages() {
        assert_eq!(ApiError::from(TokenError::Expired).message(), MSG_EXPIRED);
        assert_eq!(ApiError::from(TokenError::Revoked).message(), MSG_EXPIRED);
        assert_eq!(ApiError::from(TokenError::MissingSecret).status_code(), 500);
    }
}
