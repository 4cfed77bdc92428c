//! Shared helpers for HTTP integration tests.
//!
//! `TestApp` builds the full router around an in-memory bot state and sends
//! requests through it with `tower::ServiceExt::oneshot`.
#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{to_bytes, Body, Bytes};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use chrono::Duration;
use serde_json::Value;
use tower::ServiceExt;

use tickets_http::auth::{issue_token, Credential, PERMISSIONS_SCOPE};
use tickets_http::client::MemoryClient;
use tickets_http::config::AppConfig;
use tickets_http::error::FailureDetail;
use tickets_http::fallback::ShellRenderer;
use tickets_http::middleware::RouteTemplate;
use tickets_http::registrar::RouteFile;
use tickets_http::server;
use tickets_http::state::AppState;

pub const SECRET: &str = "integration-test-secret";
pub const SPA_HTML: &str = "<html><body>tickets dashboard</body></html>";

pub const GUILD: &str = "10";
pub const BANNED_GUILD: &str = "66";
pub const FLAKY_GUILD: &str = "77";
pub const UNKNOWN_GUILD: &str = "404";

/// Privilege 2 in GUILD, 3 in BANNED_GUILD and FLAKY_GUILD.
pub const ADMIN: &str = "1001";
/// Privilege 1 in GUILD.
pub const MEMBER: &str = "1002";
/// Not a member anywhere.
pub const OUTSIDER: &str = "3000";

pub fn bot_state() -> MemoryClient {
    MemoryClient::new()
        .with_guild(GUILD, "Support")
        .with_member(GUILD, ADMIN, 2)
        .with_member(GUILD, MEMBER, 1)
        .with_guild(BANNED_GUILD, "Spam Central")
        .with_member(BANNED_GUILD, ADMIN, 3)
        .with_banned(BANNED_GUILD)
        .with_guild(FLAKY_GUILD, "Flaky")
        .with_member(FLAKY_GUILD, ADMIN, 3)
        .with_failing_member_lookups(FLAKY_GUILD)
}

pub fn test_config() -> AppConfig {
    AppConfig::for_test(SECRET)
}

pub struct TestApp {
    pub router: Router,
    pub client: Arc<MemoryClient>,
    pub config: AppConfig,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let client = Arc::new(bot_state());
        let state = build_state(&config, &client);
        let router = server::app(state).expect("route table should build");
        Self { router, client, config }
    }

    pub fn with_files(files: &[RouteFile]) -> Self {
        let config = test_config();
        let client = Arc::new(bot_state());
        let state = build_state(&config, &client);
        let router = server::build_app(state, files).expect("route table should build");
        Self { router, client, config }
    }

    pub fn token(&self, credential: &Credential) -> String {
        issue_token(credential, &self.config.security).expect("token should sign")
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let route = response.extensions().get::<RouteTemplate>().map(|r| r.0.clone());
        let failure = response.extensions().get::<FailureDetail>().cloned();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");

        TestResponse { status, headers, route, failure, body }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(request(Method::GET, uri, token, None)).await
    }

    pub async fn post_json(&self, uri: &str, token: Option<&str>, body: &str) -> TestResponse {
        self.send(request(Method::POST, uri, token, Some(body))).await
    }
}

fn build_state(config: &AppConfig, client: &Arc<MemoryClient>) -> AppState {
    AppState::new(config.clone(), client.clone(), Arc::new(ShellRenderer::new(SPA_HTML)))
        .expect("state should build")
}

/// Request with an optional bearer token and an optional JSON body.
pub fn request(method: Method, uri: &str, token: Option<&str>, json: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    let body = match json {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    builder.body(body).expect("request should build")
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Route template the router matched; `None` for the SPA fallback.
    pub route: Option<String>,
    /// Cause attached by an error response, as the response logger sees it.
    pub failure: Option<FailureDetail>,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("body should be JSON")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub fn user(id: &str, scopes: &[&str]) -> Credential {
    Credential::new(id, scopes.iter().map(|s| s.to_string()).collect(), Duration::hours(1))
}

/// A dashboard user who has granted the permissions scope.
pub fn elevated_user(id: &str) -> Credential {
    user(id, &["identify", "guilds", PERMISSIONS_SCOPE])
}
