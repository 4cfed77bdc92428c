// Bot connection state consumed by the HTTP layer.
//
// The live bot owns the guild cache, member lookups and the ban list. The HTTP
// layer only reads through this trait; staleness is acceptable.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::{MemoryClient, MemorySnapshot};

/// Privilege level at or above which a member may administer the guild.
pub const ADMIN_PRIVILEGE: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildMember {
    pub guild_id: String,
    pub user_id: String,
}

/// Collaborator lookup failures. These are not translated into guard outcomes.
#[derive(Debug, Error, Clone)]
pub enum ClientError {
    #[error("Lookup failed: {0}")]
    Lookup(String),
}

#[async_trait]
pub trait BotClient: Send + Sync {
    /// Resolve a guild through the bot's cache.
    async fn guild(&self, guild_id: &str) -> Option<Guild>;

    /// Fetch a member of `guild`. `Ok(None)` means the user is not a member.
    async fn member(&self, guild: &Guild, user_id: &str) -> Result<Option<GuildMember>, ClientError>;

    /// Privilege level of a member (0 none, 1 support, 2 admin, 3 owner).
    async fn privilege_level(&self, member: &GuildMember) -> Result<u8, ClientError>;

    /// Whether the guild is on the process-wide ban list.
    fn is_banned(&self, guild_id: &str) -> bool;
}
