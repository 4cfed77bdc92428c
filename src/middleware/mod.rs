pub mod auth;
pub mod body;
pub mod guard;
pub mod logging;

pub use auth::authenticate;
pub use body::{normalize_body, trim_top_level_strings};
pub use guard::{enforce_guards, AuthorizationOutcome, GuardChain, GuardContext, GuardStage, GUILD_PARAM};
pub use logging::{log_response, tag_route, RouteTemplate, REQUEST_ID_HEADER};
