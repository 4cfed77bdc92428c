use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Environment;

/// Install the global subscriber. `RUST_LOG` overrides the default `info`
/// filter; production writes JSON lines.
pub fn init(environment: Environment) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match environment {
        Environment::Production => registry.with(fmt::layer().json().with_current_span(false)).init(),
        Environment::Development => registry.with(fmt::layer().with_target(false)).init(),
    }
}
