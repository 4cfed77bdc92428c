pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod fallback;
pub mod logging;
pub mod middleware;
pub mod registrar;
pub mod routes;
pub mod server;
pub mod state;

pub use config::AppConfig;
pub use error::ApiError;
pub use state::AppState;
