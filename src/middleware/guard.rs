// Guild guards - ordered stages that authorize a request against a guild
//
// A chain runs its stages in order. Each stage either lets the request
// continue or halts with a terminal outcome. Collaborator errors abort the
// chain and surface as 500s.

use async_trait::async_trait;
use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
    Extension,
};
use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::{Credential, PERMISSIONS_SCOPE};
use crate::client::{BotClient, ClientError, Guild, GuildMember, ADMIN_PRIVILEGE};
use crate::error::{ApiError, MSG_GUILD_BANNED, MSG_NOT_FOUND, MSG_NOT_PERMITTED};
use crate::state::AppState;

/// Name of the path parameter holding the guild id.
pub const GUILD_PARAM: &str = "guild";

/// Result of authorizing one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationOutcome {
    Authenticated,
    Unauthenticated(String),
    Forbidden(String),
    NotFound,
    LegallyUnavailable,
    ScopeElevationRequired,
}

impl AuthorizationOutcome {
    /// `Ok` for `Authenticated`, otherwise the matching client error.
    pub fn into_result(self) -> Result<(), ApiError> {
        match self {
            AuthorizationOutcome::Authenticated => Ok(()),
            AuthorizationOutcome::Unauthenticated(reason) => Err(ApiError::unauthorized(reason)),
            AuthorizationOutcome::Forbidden(reason) => Err(ApiError::forbidden(reason)),
            AuthorizationOutcome::NotFound => Err(ApiError::not_found(MSG_NOT_FOUND)),
            AuthorizationOutcome::LegallyUnavailable => Err(ApiError::legally_unavailable(MSG_GUILD_BANNED)),
            AuthorizationOutcome::ScopeElevationRequired => Err(ApiError::elevation_required("admin")),
        }
    }
}

/// What a stage decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Halt(AuthorizationOutcome),
}

/// Per-request state threaded through the stages.
pub struct GuardContext {
    pub client: Arc<dyn BotClient>,
    pub credential: Credential,
    pub guild_id: String,
    pub guild: Option<Guild>,
    pub member: Option<GuildMember>,
}

impl GuardContext {
    pub fn new(client: Arc<dyn BotClient>, credential: Credential, guild_id: impl Into<String>) -> Self {
        Self {
            client,
            credential,
            guild_id: guild_id.into(),
            guild: None,
            member: None,
        }
    }
}

#[async_trait]
pub trait GuardStage: Send + Sync {
    /// Stage name for logging
    fn name(&self) -> &'static str;

    async fn check(&self, ctx: &mut GuardContext) -> Result<Flow, ClientError>;
}

/// The guild must be known to the bot.
pub struct ResolveGuild;

#[async_trait]
impl GuardStage for ResolveGuild {
    fn name(&self) -> &'static str {
        "ResolveGuild"
    }

    async fn check(&self, ctx: &mut GuardContext) -> Result<Flow, ClientError> {
        match ctx.client.guild(&ctx.guild_id).await {
            Some(guild) => {
                ctx.guild = Some(guild);
                Ok(Flow::Continue)
            }
            None => Ok(Flow::Halt(AuthorizationOutcome::NotFound)),
        }
    }
}

/// Banned guilds are unavailable to everyone, owners included.
pub struct RejectBannedGuild;

#[async_trait]
impl GuardStage for RejectBannedGuild {
    fn name(&self) -> &'static str {
        "RejectBannedGuild"
    }

    async fn check(&self, ctx: &mut GuardContext) -> Result<Flow, ClientError> {
        if ctx.client.is_banned(&ctx.guild_id) {
            return Ok(Flow::Halt(AuthorizationOutcome::LegallyUnavailable));
        }
        Ok(Flow::Continue)
    }
}

/// User credentials must carry the permissions scope; service credentials always pass.
pub struct RequireElevatedScope;

#[async_trait]
impl GuardStage for RequireElevatedScope {
    fn name(&self) -> &'static str {
        "RequireElevatedScope"
    }

    async fn check(&self, ctx: &mut GuardContext) -> Result<Flow, ClientError> {
        if ctx.credential.service || ctx.credential.has_scope(PERMISSIONS_SCOPE) {
            return Ok(Flow::Continue);
        }
        Ok(Flow::Halt(AuthorizationOutcome::ScopeElevationRequired))
    }
}

/// The caller must be a member of the guild.
pub struct ResolveMember;

#[async_trait]
impl GuardStage for ResolveMember {
    fn name(&self) -> &'static str {
        "ResolveMember"
    }

    async fn check(&self, ctx: &mut GuardContext) -> Result<Flow, ClientError> {
        let guild = match ctx.guild.as_ref() {
            Some(guild) => guild,
            None => return Ok(Flow::Halt(AuthorizationOutcome::NotFound)),
        };

        match ctx.client.member(guild, &ctx.credential.id).await? {
            Some(member) => {
                ctx.member = Some(member);
                Ok(Flow::Continue)
            }
            None => Ok(Flow::Halt(AuthorizationOutcome::Forbidden(MSG_NOT_PERMITTED.to_string()))),
        }
    }
}

/// The member's privilege level must reach `minimum`.
pub struct RequirePrivilege {
    pub minimum: u8,
}

#[async_trait]
impl GuardStage for RequirePrivilege {
    fn name(&self) -> &'static str {
        "RequirePrivilege"
    }

    async fn check(&self, ctx: &mut GuardContext) -> Result<Flow, ClientError> {
        let member = match ctx.member.as_ref() {
            Some(member) => member,
            None => return Ok(Flow::Halt(AuthorizationOutcome::Forbidden(MSG_NOT_PERMITTED.to_string()))),
        };

        let level = ctx.client.privilege_level(member).await?;
        if level >= self.minimum {
            Ok(Flow::Continue)
        } else {
            Ok(Flow::Halt(AuthorizationOutcome::Forbidden(MSG_NOT_PERMITTED.to_string())))
        }
    }
}

/// Ordered list of guard stages.
pub struct GuardChain {
    name: &'static str,
    stages: Vec<Box<dyn GuardStage>>,
}

impl GuardChain {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            stages: Vec::new(),
        }
    }

    pub fn stage(mut self, stage: impl GuardStage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Guild exists and the caller is a member.
    pub fn membership() -> Self {
        Self::new("membership").stage(ResolveGuild).stage(ResolveMember)
    }

    /// Local checks (ban list, scopes) run before the member lookup.
    pub fn admin() -> Self {
        Self::new("admin")
            .stage(ResolveGuild)
            .stage(RejectBannedGuild)
            .stage(RequireElevatedScope)
            .stage(ResolveMember)
            .stage(RequirePrivilege { minimum: ADMIN_PRIVILEGE })
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage in order, stopping at the first halt.
    pub async fn run(&self, ctx: &mut GuardContext) -> Result<AuthorizationOutcome, ClientError> {
        for stage in &self.stages {
            match stage.check(ctx).await? {
                Flow::Continue => {
                    tracing::trace!("Guard {}: {} passed", self.name, stage.name());
                }
                Flow::Halt(outcome) => {
                    tracing::debug!(
                        "Guard {}: {} halted for user {} in guild {}: {:?}",
                        self.name, stage.name(), ctx.credential.id, ctx.guild_id, outcome
                    );
                    return Ok(outcome);
                }
            }
        }
        Ok(AuthorizationOutcome::Authenticated)
    }
}

/// Middleware enforcing the route's [`GuardChain`].
///
/// Must run after [`super::authenticate`]; the chain itself is supplied as a
/// request extension by the route registrar. The resolved [`Guild`] and
/// [`GuildMember`] are handed on to the handler as extensions.
pub async fn enforce_guards(
    State(state): State<AppState>,
    Extension(chain): Extension<Arc<GuardChain>>,
    Path(params): Path<HashMap<String, String>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let credential = request
        .extensions()
        .get::<Credential>()
        .cloned()
        .ok_or_else(|| ApiError::internal("guild guard ran before credential verification"))?;

    let guild_id = params
        .get(GUILD_PARAM)
        .cloned()
        .ok_or_else(|| ApiError::internal(format!("route has no :{} parameter", GUILD_PARAM)))?;

    let mut ctx = GuardContext::new(state.client.clone(), credential, guild_id);
    chain.run(&mut ctx).await?.into_result()?;

    if let Some(guild) = ctx.guild {
        request.extensions_mut().insert(guild);
    }
    if let Some(member) = ctx.member {
        request.extensions_mut().insert(member);
    }

    Ok(next.run(request).await)
}
