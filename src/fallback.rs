// SPA fallback - serves the dashboard shell for any path no route claims.

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::path::Path;

use crate::state::AppState;

const DEFAULT_SHELL: &str = "<!doctype html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>Tickets</title></head>\n<body><div id=\"app\"></div></body>\n</html>\n";

/// Renders the single-page application for unmatched requests.
///
/// Implementations receive the raw request untouched.
#[async_trait]
pub trait SpaRenderer: Send + Sync {
    async fn render(&self, request: Request) -> Response;
}

/// Serves one pre-built HTML document for every path.
pub struct ShellRenderer {
    html: String,
}

impl ShellRenderer {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }

    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        std::fs::read_to_string(path).map(Self::new)
    }
}

impl Default for ShellRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_SHELL)
    }
}

#[async_trait]
impl SpaRenderer for ShellRenderer {
    async fn render(&self, _request: Request) -> Response {
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            self.html.clone(),
        )
            .into_response()
    }
}

/// Router fallback: hand the request to the SPA renderer and do nothing else.
pub async fn spa_fallback(State(state): State<AppState>, request: Request) -> Response {
    state.spa.render(request).await
}
