use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

/// 128 MiB, the largest upload the dashboard accepts.
pub const DEFAULT_UPLOAD_LIMIT: usize = 1 << 27;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub http: HttpConfig,
    pub security: SecurityConfig,
    pub assets: AssetConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    pub trust_proxy: bool,
    pub upload_limit_bytes: usize,
    pub external_url: Option<Url>,
    pub internal_url: Option<Url>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub encryption_key: String,
    /// Credentials created before this instant are treated as revoked.
    pub invalidate_tokens: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetConfig {
    pub spa_index: Option<PathBuf>,
    pub bot_state: Option<PathBuf>,
}

impl HttpConfig {
    /// Base URL other services should use to reach this server.
    pub fn origin(&self) -> String {
        self.internal_url
            .as_ref()
            .or(self.external_url.as_ref())
            .map(|url| url.to_string())
            .unwrap_or_else(|| format!("http://localhost:{}/", self.port))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            _ => Environment::Development,
        };

        let encryption_key = lookup("ENCRYPTION_KEY")
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("ENCRYPTION_KEY"))?;

        Self::defaults(environment, encryption_key).with_overrides(lookup)
    }

    fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // HTTP overrides
        if let Some(v) = lookup("HTTP_HOST") {
            self.http.host = v;
        }
        if let Some(v) = lookup("PORT") {
            self.http.port = v.parse().map_err(|_| ConfigError::Invalid { key: "PORT", value: v })?;
        }
        if let Some(v) = lookup("HTTP_TRUST_PROXY") {
            self.http.trust_proxy = v == "true";
        }
        if let Some(v) = lookup("HTTP_UPLOAD_LIMIT") {
            self.http.upload_limit_bytes = v
                .parse()
                .map_err(|_| ConfigError::Invalid { key: "HTTP_UPLOAD_LIMIT", value: v })?;
        }
        if let Some(v) = lookup("HTTP_EXTERNAL") {
            self.http.external_url = Some(parse_url("HTTP_EXTERNAL", v)?);
        }
        if let Some(v) = lookup("HTTP_INTERNAL") {
            self.http.internal_url = Some(parse_url("HTTP_INTERNAL", v)?);
        }

        // Security overrides
        if let Some(v) = lookup("INVALIDATE_TOKENS").filter(|v| !v.trim().is_empty()) {
            let watermark = parse_watermark(&v).ok_or(ConfigError::Invalid { key: "INVALIDATE_TOKENS", value: v })?;
            self.security.invalidate_tokens = Some(watermark);
        }

        // Asset overrides
        if let Some(v) = lookup("SPA_INDEX") {
            self.assets.spa_index = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("BOT_STATE") {
            self.assets.bot_state = Some(PathBuf::from(v));
        }

        Ok(self)
    }

    fn defaults(environment: Environment, encryption_key: String) -> Self {
        Self {
            environment,
            http: HttpConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                trust_proxy: false,
                upload_limit_bytes: DEFAULT_UPLOAD_LIMIT,
                external_url: None,
                internal_url: None,
            },
            security: SecurityConfig {
                encryption_key,
                invalidate_tokens: None,
            },
            assets: AssetConfig::default(),
        }
    }

    /// Development defaults with a fixed signing key, for tests and local tooling.
    pub fn for_test(encryption_key: &str) -> Self {
        Self::defaults(Environment::Development, encryption_key.to_string())
    }
}

fn parse_url(key: &'static str, value: String) -> Result<Url, ConfigError> {
    Url::parse(&value).map_err(|_| ConfigError::Invalid { key, value })
}

/// Accepts RFC 3339 timestamps, `YYYY-MM-DDTHH:MM:SS` (UTC) or a bare date (UTC midnight).
pub fn parse_watermark(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(ts.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::from_lookup(lookup(&[("ENCRYPTION_KEY", "secret")])).unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.http.bind_address(), "0.0.0.0:3000");
        assert!(!config.http.trust_proxy);
        assert_eq!(config.http.upload_limit_bytes, DEFAULT_UPLOAD_LIMIT);
        assert!(config.security.invalidate_tokens.is_none());
    }

    #[test]
    fn test_missing_encryption_key() {
        let err = AppConfig::from_lookup(lookup(&[("PORT", "8080")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("ENCRYPTION_KEY")));
    }

    #[test]
    fn test_env_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("ENCRYPTION_KEY", "secret"),
            ("APP_ENV", "production"),
            ("HTTP_HOST", "127.0.0.1"),
            ("PORT", "8169"),
            ("HTTP_TRUST_PROXY", "true"),
            ("INVALIDATE_TOKENS", "2024-03-01"),
        ]))
        .unwrap();

        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.http.bind_address(), "127.0.0.1:8169");
        assert!(config.http.trust_proxy);
        assert_eq!(config.http.origin(), "http://localhost:8169/");
        assert_eq!(
            config.security.invalidate_tokens.unwrap().to_rfc3339(),
            "2024-03-01T00:00:00+00:00"
        );
    }

    #[test]
    fn test_internal_url_takes_precedence() {
        let config = AppConfig::from_lookup(lookup(&[
            ("ENCRYPTION_KEY", "secret"),
            ("HTTP_EXTERNAL", "https://tickets.example.com"),
            ("HTTP_INTERNAL", "http://tickets:8169"),
        ]))
        .unwrap();
        assert_eq!(config.http.origin(), "http://tickets:8169/");
        assert_eq!(
            config.http.external_url.map(|u| u.to_string()).as_deref(),
            Some("https://tickets.example.com/")
        );
    }

    #[test]
    fn test_invalid_watermark_is_rejected() {
        let err = AppConfig::from_lookup(lookup(&[
            ("ENCRYPTION_KEY", "secret"),
            ("INVALIDATE_TOKENS", "last tuesday"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "INVALIDATE_TOKENS", .. }));
    }

    #[test]
    fn test_upload_limit_override() {
        let config = AppConfig::from_lookup(lookup(&[
            ("ENCRYPTION_KEY", "secret"),
            ("HTTP_UPLOAD_LIMIT", "1048576"),
        ]))
        .unwrap();
        assert_eq!(config.http.upload_limit_bytes, 1_048_576);

        let err = AppConfig::from_lookup(lookup(&[
            ("ENCRYPTION_KEY", "secret"),
            ("HTTP_UPLOAD_LIMIT", "128MB"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "HTTP_UPLOAD_LIMIT", .. }));
    }

    #[test]
    fn test_watermark_formats() {
        assert!(parse_watermark("2024-03-01T12:30:00Z").is_some());
        assert!(parse_watermark("2024-03-01T12:30:00+02:00").is_some());
        assert!(parse_watermark("2024-03-01T12:30:00").is_some());
        assert!(parse_watermark("01/03/2024").is_none());
    }
}
