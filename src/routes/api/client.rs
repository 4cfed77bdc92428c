use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::registrar::{Access, RouteConfig};
use crate::state::AppState;

pub fn get() -> RouteConfig {
    RouteConfig::new(Access::Public, client_info)
}

/// GET /api/client - Service name, version and the origin the dashboard should call
async fn client_info(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "origin": state.config.http.origin(),
    }))
}
