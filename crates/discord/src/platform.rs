use std::num::NonZeroU64;
use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{
    ChannelId as DiscordChannelId, ChannelType, CreateChannel, CreateMessage, EditChannel,
    EditMember, EditRole, GuildChannel, GuildId as DiscordGuildId, InteractionId,
    PermissionOverwrite, PermissionOverwriteType, Permissions, RoleId as DiscordRoleId,
    UserId as DiscordUserId,
};
use serenity::http::Http;
use tracing::debug;

use supportdesk_core::domain::ids::{ChannelId, GuildId, RoleId, UserId};
use supportdesk_core::platform::{
    Channel, ChannelKind, Member, NewTextChannel, PlatformError, Principal, ReadOverride, Role,
    SupportPlatform,
};

use crate::components::MessageTemplate;
use crate::events::InteractionRef;
use crate::responder::{InteractionResponder, InteractionResponse, Messenger};

/// Discord over serenity's HTTP client. Every call is made once; failures
/// surface as [`PlatformError`] and are never retried here.
#[derive(Clone)]
pub struct DiscordPlatform {
    http: Arc<Http>,
}

impl DiscordPlatform {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

/// 403 and 404 keep their meaning; anything else is a transport failure.
pub fn status_error(action: &str, status: Option<u16>, detail: &str) -> PlatformError {
    let detail = format!("{action}: {detail}");
    match status {
        Some(403) => PlatformError::PermissionDenied(detail),
        Some(404) => PlatformError::NotFound(detail),
        _ => PlatformError::Transport(detail),
    }
}

fn classify(action: &str, error: serenity::Error) -> PlatformError {
    let status = match &error {
        serenity::Error::Http(http_error) => http_error.status_code().map(|code| code.as_u16()),
        _ => None,
    };
    debug!(action, status, "discord api call failed");
    status_error(action, status, &error.to_string())
}

/// Serenity ids are non-zero; zero never names a real Discord object.
fn snowflake(raw: u64, what: &str) -> Result<NonZeroU64, PlatformError> {
    NonZeroU64::new(raw).ok_or_else(|| PlatformError::NotFound(format!("{what} id 0")))
}

fn guild(id: GuildId) -> Result<DiscordGuildId, PlatformError> {
    snowflake(id.0, "guild").map(DiscordGuildId::from)
}

fn user(id: UserId) -> Result<DiscordUserId, PlatformError> {
    snowflake(id.0, "user").map(DiscordUserId::from)
}

fn channel(id: ChannelId) -> Result<DiscordChannelId, PlatformError> {
    snowflake(id.0, "channel").map(DiscordChannelId::from)
}

fn role(id: RoleId) -> Result<DiscordRoleId, PlatformError> {
    snowflake(id.0, "role").map(DiscordRoleId::from)
}

fn channel_kind(kind: ChannelType) -> ChannelKind {
    match kind {
        ChannelType::Text => ChannelKind::Text,
        ChannelType::Category => ChannelKind::Category,
        _ => ChannelKind::Other,
    }
}

fn to_channel(channel: &GuildChannel) -> Channel {
    Channel {
        id: ChannelId(channel.id.get()),
        guild_id: GuildId(channel.guild_id.get()),
        name: channel.name.clone(),
        kind: channel_kind(channel.kind),
        parent_id: channel.parent_id.map(|parent| ChannelId(parent.get())),
    }
}

fn to_role(role: &serenity::all::Role) -> Role {
    Role { id: RoleId(role.id.get()), name: role.name.clone(), color: role.colour.0 }
}

/// Read access only: either VIEW_CHANNEL is allowed or it is denied.
pub fn permission_overwrite(value: &ReadOverride) -> Result<PermissionOverwrite, PlatformError> {
    let kind = match value.principal {
        Principal::Role(role_id) => PermissionOverwriteType::Role(role(role_id)?),
        Principal::Member(user_id) => PermissionOverwriteType::Member(user(user_id)?),
    };
    let (allow, deny) = if value.can_read {
        (Permissions::VIEW_CHANNEL, Permissions::empty())
    } else {
        (Permissions::empty(), Permissions::VIEW_CHANNEL)
    };
    Ok(PermissionOverwrite { allow, deny, kind })
}

#[async_trait]
impl SupportPlatform for DiscordPlatform {
    async fn fetch_member(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<Option<Member>, PlatformError> {
        match self.http.get_member(guild(guild_id)?, user(user_id)?).await {
            Ok(member) => Ok(Some(Member {
                user_id: UserId(member.user.id.get()),
                guild_id,
                nickname: member.nick,
                roles: member.roles.iter().map(|role| RoleId(role.get())).collect(),
            })),
            Err(error) => match classify("get member", error) {
                PlatformError::NotFound(_) => Ok(None),
                other => Err(other),
            },
        }
    }

    async fn edit_nickname(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        nickname: &str,
    ) -> Result<(), PlatformError> {
        guild(guild_id)?
            .edit_member(&self.http, user(user_id)?, EditMember::new().nickname(nickname))
            .await
            .map(|_| ())
            .map_err(|error| classify("edit nickname", error))
    }

    async fn grant_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<(), PlatformError> {
        self.http
            .add_member_role(guild(guild_id)?, user(user_id)?, role(role_id)?, None)
            .await
            .map_err(|error| classify("add member role", error))
    }

    async fn list_roles(&self, guild_id: GuildId) -> Result<Vec<Role>, PlatformError> {
        let roles = self
            .http
            .get_guild_roles(guild(guild_id)?)
            .await
            .map_err(|error| classify("list roles", error))?;
        Ok(roles.iter().map(to_role).collect())
    }

    async fn create_role(&self, guild_id: GuildId, name: &str) -> Result<Role, PlatformError> {
        guild(guild_id)?
            .create_role(&self.http, EditRole::new().name(name))
            .await
            .map(|role| to_role(&role))
            .map_err(|error| classify("create role", error))
    }

    async fn edit_role_color(
        &self,
        guild_id: GuildId,
        role_id: RoleId,
        color: u32,
    ) -> Result<(), PlatformError> {
        guild(guild_id)?
            .edit_role(&self.http, role(role_id)?, EditRole::new().colour(color))
            .await
            .map(|_| ())
            .map_err(|error| classify("edit role", error))
    }

    async fn list_channels(&self, guild_id: GuildId) -> Result<Vec<Channel>, PlatformError> {
        let channels = self
            .http
            .get_channels(guild(guild_id)?)
            .await
            .map_err(|error| classify("list channels", error))?;
        Ok(channels.iter().map(to_channel).collect())
    }

    async fn create_category(
        &self,
        guild_id: GuildId,
        name: &str,
    ) -> Result<Channel, PlatformError> {
        guild(guild_id)?
            .create_channel(&self.http, CreateChannel::new(name).kind(ChannelType::Category))
            .await
            .map(|created| to_channel(&created))
            .map_err(|error| classify("create category", error))
    }

    async fn create_text_channel(
        &self,
        guild_id: GuildId,
        new_channel: NewTextChannel,
    ) -> Result<Channel, PlatformError> {
        let overwrites = new_channel
            .overrides
            .iter()
            .map(permission_overwrite)
            .collect::<Result<Vec<_>, _>>()?;
        let mut builder =
            CreateChannel::new(new_channel.name).kind(ChannelType::Text).permissions(overwrites);
        if let Some(category) = new_channel.category {
            builder = builder.category(channel(category)?);
        }
        guild(guild_id)?
            .create_channel(&self.http, builder)
            .await
            .map(|created| to_channel(&created))
            .map_err(|error| classify("create text channel", error))
    }

    async fn rename_channel(&self, channel_id: ChannelId, name: &str) -> Result<(), PlatformError> {
        channel(channel_id)?
            .edit(&self.http, EditChannel::new().name(name))
            .await
            .map(|_| ())
            .map_err(|error| classify("rename channel", error))
    }

    async fn send_message(&self, channel_id: ChannelId, content: &str) -> Result<(), PlatformError> {
        channel(channel_id)?
            .send_message(&self.http, CreateMessage::new().content(content))
            .await
            .map(|_| ())
            .map_err(|error| classify("send message", error))
    }

    /// One lookup by id instead of listing every channel of the guild.
    async fn text_channel_exists(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<bool, PlatformError> {
        match self.http.get_channel(channel(channel_id)?).await {
            Ok(found) => Ok(found.guild().is_some_and(|found| {
                let found = to_channel(&found);
                found.kind == ChannelKind::Text && found.guild_id == guild_id
            })),
            Err(error) => match classify("get channel", error) {
                PlatformError::NotFound(_) => Ok(false),
                other => Err(other),
            },
        }
    }
}

#[async_trait]
impl Messenger for DiscordPlatform {
    async fn send_to_channel(
        &self,
        channel_id: ChannelId,
        message: MessageTemplate,
    ) -> Result<(), PlatformError> {
        channel(channel_id)?
            .send_message(&self.http, message.to_channel_message())
            .await
            .map(|_| ())
            .map_err(|error| classify("send message", error))
    }

    async fn send_direct(
        &self,
        user_id: UserId,
        message: MessageTemplate,
    ) -> Result<(), PlatformError> {
        let direct = user(user_id)?
            .create_dm_channel(&self.http)
            .await
            .map_err(|error| classify("open direct message", error))?;
        direct
            .id
            .send_message(&self.http, message.to_channel_message())
            .await
            .map(|_| ())
            .map_err(|error| classify("send direct message", error))
    }
}

#[async_trait]
impl InteractionResponder for DiscordPlatform {
    async fn respond(
        &self,
        interaction: &InteractionRef,
        response: InteractionResponse,
    ) -> Result<(), PlatformError> {
        let interaction_id = InteractionId::from(snowflake(interaction.id, "interaction")?);
        self.http
            .create_interaction_response(
                interaction_id,
                &interaction.token,
                &response.to_serenity(),
                Vec::new(),
            )
            .await
            .map_err(|error| classify("interaction response", error))
    }

    async fn follow_up(
        &self,
        interaction: &InteractionRef,
        message: MessageTemplate,
    ) -> Result<(), PlatformError> {
        self.http
            .create_followup_message(&interaction.token, &message.to_follow_up(), Vec::new())
            .await
            .map(|_| ())
            .map_err(|error| classify("interaction follow-up", error))
    }
}
