use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{BotClient, ClientError, Guild, GuildMember};

/// Serializable view of the bot's state, used to seed a [`MemoryClient`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySnapshot {
    #[serde(default)]
    pub guilds: Vec<GuildSnapshot>,
    #[serde(default)]
    pub banned_guilds: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildSnapshot {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub members: Vec<MemberSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberSnapshot {
    pub user_id: String,
    #[serde(default)]
    pub privilege_level: u8,
}

/// In-memory bot state. Read-only after construction apart from lookup counters.
#[derive(Debug, Default)]
pub struct MemoryClient {
    guilds: HashMap<String, Guild>,
    members: HashMap<(String, String), u8>,
    banned: HashSet<String>,
    failing_members: HashSet<String>,
    guild_lookups: AtomicUsize,
    member_lookups: AtomicUsize,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: MemorySnapshot) -> Self {
        let mut client = Self::new();
        for guild in snapshot.guilds {
            client = client.with_guild(&guild.id, &guild.name);
            for member in guild.members {
                client = client.with_member(&guild.id, &member.user_id, member.privilege_level);
            }
        }
        for guild_id in snapshot.banned_guilds {
            client = client.with_banned(&guild_id);
        }
        client
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let snapshot: MemorySnapshot = serde_json::from_str(&raw)?;
        tracing::debug!(
            "Loaded bot state from {}: {} guilds, {} banned",
            path.display(),
            snapshot.guilds.len(),
            snapshot.banned_guilds.len()
        );
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn with_guild(mut self, id: &str, name: &str) -> Self {
        self.guilds.insert(
            id.to_string(),
            Guild {
                id: id.to_string(),
                name: name.to_string(),
            },
        );
        self
    }

    pub fn with_member(mut self, guild_id: &str, user_id: &str, privilege_level: u8) -> Self {
        self.members
            .insert((guild_id.to_string(), user_id.to_string()), privilege_level);
        self
    }

    pub fn with_banned(mut self, guild_id: &str) -> Self {
        self.banned.insert(guild_id.to_string());
        self
    }

    /// Member lookups in this guild fail as if the bot's gateway were unreachable.
    pub fn with_failing_member_lookups(mut self, guild_id: &str) -> Self {
        self.failing_members.insert(guild_id.to_string());
        self
    }

    pub fn guild_lookups(&self) -> usize {
        self.guild_lookups.load(Ordering::Relaxed)
    }

    pub fn member_lookups(&self) -> usize {
        self.member_lookups.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl BotClient for MemoryClient {
    async fn guild(&self, guild_id: &str) -> Option<Guild> {
        self.guild_lookups.fetch_add(1, Ordering::Relaxed);
        self.guilds.get(guild_id).cloned()
    }

    async fn member(&self, guild: &Guild, user_id: &str) -> Result<Option<GuildMember>, ClientError> {
        self.member_lookups.fetch_add(1, Ordering::Relaxed);

        if self.failing_members.contains(&guild.id) {
            return Err(ClientError::Lookup(format!(
                "member {} of guild {} could not be fetched",
                user_id, guild.id
            )));
        }

        let key = (guild.id.clone(), user_id.to_string());
        Ok(self.members.contains_key(&key).then(|| GuildMember {
            guild_id: guild.id.clone(),
            user_id: user_id.to_string(),
        }))
    }

    async fn privilege_level(&self, member: &GuildMember) -> Result<u8, ClientError> {
        let key = (member.guild_id.clone(), member.user_id.clone());
        Ok(self.members.get(&key).copied().unwrap_or(0))
    }

    fn is_banned(&self, guild_id: &str) -> bool {
        self.banned.contains(guild_id)
    }
}
