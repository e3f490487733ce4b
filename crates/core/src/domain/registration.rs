use serde::{Deserialize, Serialize};

use crate::domain::ids::{ChannelId, GuildId, UserId};

/// One member's support channel within one guild. At most one record exists
/// per `(user_id, guild_id)`; only `channel_id` ever changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    pub user_id: UserId,
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
}

impl RegistrationRecord {
    pub fn new(user_id: UserId, guild_id: GuildId, channel_id: ChannelId) -> Self {
        Self { user_id, guild_id, channel_id }
    }

    pub fn with_channel(self, channel_id: ChannelId) -> Self {
        Self { channel_id, ..self }
    }
}
