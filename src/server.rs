use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::{json, Value};
use std::any::Any;
use std::net::SocketAddr;
use thiserror::Error;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, SetRequestIdLayer};

use crate::error::ApiError;
use crate::middleware::log_response;
use crate::registrar::{self, Access, RouteConfig, RouteError, RouteFile, RouteTable, StaticRoute};
use crate::routes::ROUTE_FILES;
use crate::state::AppState;

/// Routes declared in code. These win over route files with the same
/// method and path.
pub const STATIC_ROUTES: &[StaticRoute] = &[StaticRoute {
    method: "get",
    path: "/status",
    factory: status_route,
}];

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid route table: {0}")]
    Routes(#[from] RouteError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(std::io::Error),
}

fn status_route() -> RouteConfig {
    RouteConfig::new(Access::Public, status)
}

/// GET /status - Liveness probe
async fn status() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// A panicking handler becomes an ordinary 500; the panic message is only
/// logged.
fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        *s
    } else {
        "unknown panic payload"
    };

    ApiError::internal(format!("handler panicked: {}", message)).into_response()
}

/// Resolve the built-in route tree and static routes.
pub fn route_table() -> Result<RouteTable, RouteError> {
    RouteTable::build(ROUTE_FILES, STATIC_ROUTES)
}

/// Build the application router for the built-in route tree.
pub fn app(state: AppState) -> Result<Router, RouteError> {
    build_app(state, ROUTE_FILES)
}

/// Build the application router for an arbitrary set of route files.
pub fn build_app(state: AppState, files: &[RouteFile]) -> Result<Router, RouteError> {
    let table = RouteTable::build(files, STATIC_ROUTES)?;
    tracing::info!(
        "Registered {} routes ({} duplicates skipped)",
        table.routes.len(),
        table.skipped.len()
    );

    let upload_limit = state.config.http.upload_limit_bytes;
    let router = registrar::bind(&table, &state)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(from_fn_with_state(state.clone(), log_response))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state);

    Ok(router)
}

/// Bind the listener and serve until the process is stopped.
pub async fn serve(state: AppState) -> Result<(), ServerError> {
    let addr = state.config.http.bind_address();
    let app = app(state)?;

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            return Err(ServerError::Bind { addr, source: e });
        }
    };

    let local = listener.local_addr().map(|a| a.to_string()).unwrap_or(addr);
    tracing::info!(outcome = "success", "Listening at http://{}", local);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(ServerError::Serve)
}
