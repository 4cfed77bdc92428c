use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SecurityConfig;

/// Name of the unsigned cookie carrying the credential.
pub const TOKEN_COOKIE: &str = "token";

/// OAuth scope that lets a dashboard user manage a guild's settings.
pub const PERMISSIONS_SCOPE: &str = "applications.commands.permissions.update";

/// Decoded credential claims. Timestamps are Unix epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    /// Subject (the user's snowflake id).
    pub id: String,
    pub created_at: i64,
    pub expires_at: i64,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Service credentials are issued to other components, not to dashboard users.
    #[serde(default)]
    pub service: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl Credential {
    pub fn new(id: impl Into<String>, scopes: Vec<String>, lifetime: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created_at: now.timestamp_millis(),
            expires_at: (now + lifetime).timestamp_millis(),
            scopes,
            service: false,
            username: None,
            avatar: None,
            locale: None,
        }
    }

    pub fn service(mut self) -> Self {
        self.service = true;
        self
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,

    #[error("Token was issued before the invalidation watermark")]
    Revoked,

    #[error("Invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error("Token signing secret is not configured")]
    MissingSecret,
}

impl TokenError {
    /// Expired and revoked credentials share the same client-facing message.
    pub fn is_expired(&self) -> bool {
        matches!(self, TokenError::Expired | TokenError::Revoked)
    }
}

/// Verifies signed credentials against the signing secret and the invalidation watermark.
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
    watermark: Option<DateTime<Utc>>,
}

impl TokenVerifier {
    pub fn new(security: &SecurityConfig) -> Result<Self, TokenError> {
        if security.encryption_key.is_empty() {
            return Err(TokenError::MissingSecret);
        }

        // Expiry lives in `expiresAt` (milliseconds), not the registered `exp` claim.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Ok(Self {
            decoding_key: DecodingKey::from_secret(security.encryption_key.as_bytes()),
            validation,
            watermark: security.invalidate_tokens,
        })
    }

    pub fn verify(&self, token: &str) -> Result<Credential, TokenError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Credential, TokenError> {
        let credential = decode::<Credential>(token, &self.decoding_key, &self.validation)?.claims;

        if credential.expires_at < now.timestamp_millis() {
            return Err(TokenError::Expired);
        }

        if let Some(watermark) = self.watermark {
            if credential.created_at < watermark.timestamp_millis() {
                return Err(TokenError::Revoked);
            }
        }

        Ok(credential)
    }
}

/// Sign a credential with the configured secret.
pub fn issue_token(credential: &Credential, security: &SecurityConfig) -> Result<String, TokenError> {
    if security.encryption_key.is_empty() {
        return Err(TokenError::MissingSecret);
    }

    let encoding_key = EncodingKey::from_secret(security.encryption_key.as_bytes());
    Ok(encode(&Header::new(Algorithm::HS256), credential, &encoding_key)?)
}
