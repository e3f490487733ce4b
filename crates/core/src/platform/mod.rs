use async_trait::async_trait;
use thiserror::Error;

use crate::domain::ids::{ChannelId, GuildId, RoleId, UserId};

/// Failure of one call into the chat platform. Adapters decide which of their
/// native failures count as a refusal, a missing entity, or a transport issue.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PlatformError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

impl PlatformError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    pub user_id: UserId,
    pub guild_id: GuildId,
    pub nickname: Option<String>,
    pub roles: Vec<RoleId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub color: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelKind {
    Text,
    Category,
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Channel {
    pub id: ChannelId,
    pub guild_id: GuildId,
    pub name: String,
    pub kind: ChannelKind,
    pub parent_id: Option<ChannelId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Principal {
    Role(RoleId),
    Member(UserId),
}

/// Per-principal read access on a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadOverride {
    pub principal: Principal,
    pub can_read: bool,
}

impl ReadOverride {
    pub fn allow(principal: Principal) -> Self {
        Self { principal, can_read: true }
    }

    pub fn deny(principal: Principal) -> Self {
        Self { principal, can_read: false }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewTextChannel {
    pub name: String,
    pub category: Option<ChannelId>,
    pub overrides: Vec<ReadOverride>,
}

/// Everything the registration workflow and guild setup need from the chat
/// platform. The production adapter talks to the platform API; tests use
/// in-memory fakes.
#[async_trait]
pub trait SupportPlatform: Send + Sync {
    async fn fetch_member(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<Option<Member>, PlatformError>;

    async fn edit_nickname(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        nickname: &str,
    ) -> Result<(), PlatformError>;

    async fn grant_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<(), PlatformError>;

    async fn list_roles(&self, guild_id: GuildId) -> Result<Vec<Role>, PlatformError>;

    async fn create_role(&self, guild_id: GuildId, name: &str) -> Result<Role, PlatformError>;

    async fn edit_role_color(
        &self,
        guild_id: GuildId,
        role_id: RoleId,
        color: u32,
    ) -> Result<(), PlatformError>;

    async fn list_channels(&self, guild_id: GuildId) -> Result<Vec<Channel>, PlatformError>;

    async fn create_category(&self, guild_id: GuildId, name: &str)
        -> Result<Channel, PlatformError>;

    async fn create_text_channel(
        &self,
        guild_id: GuildId,
        channel: NewTextChannel,
    ) -> Result<Channel, PlatformError>;

    async fn rename_channel(&self, channel_id: ChannelId, name: &str)
        -> Result<(), PlatformError>;

    async fn send_message(&self, channel_id: ChannelId, content: &str)
        -> Result<(), PlatformError>;

    async fn find_role_by_name(
        &self,
        guild_id: GuildId,
        name: &str,
    ) -> Result<Option<Role>, PlatformError> {
        let roles = self.list_roles(guild_id).await?;
        Ok(roles.into_iter().find(|role| role.name == name))
    }

    async fn find_category_by_name(
        &self,
        guild_id: GuildId,
        name: &str,
    ) -> Result<Option<Channel>, PlatformError> {
        let channels = self.list_channels(guild_id).await?;
        Ok(channels
            .into_iter()
            .find(|channel| channel.kind == ChannelKind::Category && channel.name == name))
    }

    /// True when `channel_id` is still a live text channel of `guild_id`.
    async fn text_channel_exists(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<bool, PlatformError> {
        let channels = self.list_channels(guild_id).await?;
        Ok(channels
            .iter()
            .any(|channel| channel.id == channel_id && channel.kind == ChannelKind::Text))
    }
}

pub mod memory;
pub use memory::{InMemoryPlatform, PlatformCall};
