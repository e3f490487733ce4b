use async_trait::async_trait;
use thiserror::Error;

use crate::domain::ids::{ChannelId, GuildId, UserId};
use crate::domain::registration::RegistrationRecord;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("user {user_id} is already registered in guild {guild_id}")]
    Duplicate { user_id: UserId, guild_id: GuildId },
    #[error("no registration for user {user_id} in guild {guild_id}")]
    Missing { user_id: UserId, guild_id: GuildId },
    #[error("persistence failure: {0}")]
    Backend(String),
}

/// Owner of all registration records.
#[async_trait]
pub trait RegistrationStore: Send + Sync {
    async fn find(
        &self,
        user_id: UserId,
        guild_id: GuildId,
    ) -> Result<Option<RegistrationRecord>, StoreError>;

    /// Fails with [`StoreError::Duplicate`] when the pair is already present.
    async fn insert(&self, record: &RegistrationRecord) -> Result<(), StoreError>;

    /// Fails with [`StoreError::Missing`] when the pair was never registered.
    async fn update_channel_id(
        &self,
        user_id: UserId,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<(), StoreError>;

    async fn list_for_guild(&self, guild_id: GuildId)
        -> Result<Vec<RegistrationRecord>, StoreError>;

    async fn is_registered(&self, user_id: UserId, guild_id: GuildId) -> Result<bool, StoreError> {
        Ok(self.find(user_id, guild_id).await?.is_some())
    }

    async fn channel_id(
        &self,
        user_id: UserId,
        guild_id: GuildId,
    ) -> Result<Option<ChannelId>, StoreError> {
        Ok(self.find(user_id, guild_id).await?.map(|record| record.channel_id))
    }
}
