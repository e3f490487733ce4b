use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::{
    Channel, ChannelKind, Member, NewTextChannel, PlatformError, ReadOverride, Role,
    SupportPlatform,
};
use crate::domain::ids::{ChannelId, GuildId, RoleId, UserId};

/// Every mutation the in-memory platform has accepted, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlatformCall {
    EditNickname { guild_id: GuildId, user_id: UserId, nickname: String },
    GrantRole { guild_id: GuildId, user_id: UserId, role_id: RoleId },
    CreateRole { guild_id: GuildId, name: String },
    EditRoleColor { guild_id: GuildId, role_id: RoleId, color: u32 },
    CreateCategory { guild_id: GuildId, name: String },
    CreateTextChannel { guild_id: GuildId, channel_id: ChannelId, name: String },
    RenameChannel { channel_id: ChannelId, name: String },
    SendMessage { channel_id: ChannelId, content: String },
}

#[derive(Default)]
struct PlatformState {
    next_id: u64,
    members: HashMap<(GuildId, UserId), Member>,
    elevated: HashSet<(GuildId, UserId)>,
    roles: HashMap<GuildId, Vec<Role>>,
    channels: Vec<Channel>,
    overrides: HashMap<ChannelId, Vec<ReadOverride>>,
    calls: Vec<PlatformCall>,
    offline: bool,
    role_listings_left: Option<usize>,
}

impl PlatformState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        10_000 + self.next_id
    }

    fn ensure_online(&self) -> Result<(), PlatformError> {
        if self.offline {
            return Err(PlatformError::Transport("platform unreachable".to_owned()));
        }
        Ok(())
    }
}

/// A single-process stand-in for the chat platform. Members marked elevated
/// behave like guild administrators: their nickname and roles cannot be
/// changed by the bot.
#[derive(Default)]
pub struct InMemoryPlatform {
    state: Mutex<PlatformState>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, apply: impl FnOnce(&mut PlatformState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        apply(&mut state)
    }

    pub fn add_member(&self, guild_id: GuildId, user_id: UserId) {
        self.with_state(|state| {
            state.members.insert(
                (guild_id, user_id),
                Member { user_id, guild_id, nickname: None, roles: Vec::new() },
            );
        });
    }

    pub fn add_elevated_member(&self, guild_id: GuildId, user_id: UserId) {
        self.add_member(guild_id, user_id);
        self.with_state(|state| {
            state.elevated.insert((guild_id, user_id));
        });
    }

    pub fn add_role(&self, guild_id: GuildId, name: &str) -> RoleId {
        self.with_state(|state| {
            let id = RoleId(state.allocate_id());
            state.roles.entry(guild_id).or_default().push(Role {
                id,
                name: name.to_owned(),
                color: 0,
            });
            id
        })
    }

    /// Simulates a staff member deleting a channel by hand.
    pub fn delete_channel(&self, channel_id: ChannelId) {
        self.with_state(|state| state.channels.retain(|channel| channel.id != channel_id));
    }

    pub fn set_offline(&self, offline: bool) {
        self.with_state(|state| state.offline = offline);
    }

    /// Role listings succeed `successful` more times, then fail as a transport blip.
    pub fn fail_role_listings_after(&self, successful: usize) {
        self.with_state(|state| state.role_listings_left = Some(successful));
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.with_state(|state| state.calls.clone())
    }

    pub fn clear_calls(&self) {
        self.with_state(|state| state.calls.clear());
    }

    pub fn channels(&self, guild_id: GuildId) -> Vec<Channel> {
        self.with_state(|state| {
            state.channels.iter().filter(|channel| channel.guild_id == guild_id).cloned().collect()
        })
    }

    pub fn channel(&self, channel_id: ChannelId) -> Option<Channel> {
        self.with_state(|state| state.channels.iter().find(|c| c.id == channel_id).cloned())
    }

    pub fn roles(&self, guild_id: GuildId) -> Vec<Role> {
        self.with_state(|state| state.roles.get(&guild_id).cloned().unwrap_or_default())
    }

    pub fn member(&self, guild_id: GuildId, user_id: UserId) -> Option<Member> {
        self.with_state(|state| state.members.get(&(guild_id, user_id)).cloned())
    }

    pub fn overrides(&self, channel_id: ChannelId) -> Vec<ReadOverride> {
        self.with_state(|state| state.overrides.get(&channel_id).cloned().unwrap_or_default())
    }

    pub fn messages(&self, channel_id: ChannelId) -> Vec<String> {
        self.with_state(|state| {
            state
                .calls
                .iter()
                .filter_map(|call| match call {
                    PlatformCall::SendMessage { channel_id: id, content } if *id == channel_id => {
                        Some(content.clone())
                    }
                    _ => None,
                })
                .collect()
        })
    }
}

#[async_trait]
impl SupportPlatform for InMemoryPlatform {
    async fn fetch_member(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<Option<Member>, PlatformError> {
        self.with_state(|state| {
            state.ensure_online()?;
            Ok(state.members.get(&(guild_id, user_id)).cloned())
        })
    }

    async fn edit_nickname(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        nickname: &str,
    ) -> Result<(), PlatformError> {
        self.with_state(|state| {
            state.ensure_online()?;
            if state.elevated.contains(&(guild_id, user_id)) {
                return Err(PlatformError::PermissionDenied("member outranks the bot".to_owned()));
            }
            let member = state
                .members
                .get_mut(&(guild_id, user_id))
                .ok_or_else(|| PlatformError::NotFound(format!("member {user_id}")))?;
            member.nickname = Some(nickname.to_owned());
            state.calls.push(PlatformCall::EditNickname {
                guild_id,
                user_id,
                nickname: nickname.to_owned(),
            });
            Ok(())
        })
    }

    async fn grant_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<(), PlatformError> {
        self.with_state(|state| {
            state.ensure_online()?;
            if state.elevated.contains(&(guild_id, user_id)) {
                return Err(PlatformError::PermissionDenied("member outranks the bot".to_owned()));
            }
            let member = state
                .members
                .get_mut(&(guild_id, user_id))
                .ok_or_else(|| PlatformError::NotFound(format!("member {user_id}")))?;
            if !member.roles.contains(&role_id) {
                member.roles.push(role_id);
            }
            state.calls.push(PlatformCall::GrantRole { guild_id, user_id, role_id });
            Ok(())
        })
    }

    async fn list_roles(&self, guild_id: GuildId) -> Result<Vec<Role>, PlatformError> {
        self.with_state(|state| {
            state.ensure_online()?;
            match state.role_listings_left {
                Some(0) => return Err(PlatformError::Transport("blip".to_owned())),
                Some(left) => state.role_listings_left = Some(left - 1),
                None => {}
            }
            Ok(state.roles.get(&guild_id).cloned().unwrap_or_default())
        })
    }

    async fn create_role(&self, guild_id: GuildId, name: &str) -> Result<Role, PlatformError> {
        self.with_state(|state| {
            state.ensure_online()?;
            let role = Role { id: RoleId(state.allocate_id()), name: name.to_owned(), color: 0 };
            state.roles.entry(guild_id).or_default().push(role.clone());
            state.calls.push(PlatformCall::CreateRole { guild_id, name: name.to_owned() });
            Ok(role)
        })
    }

    async fn edit_role_color(
        &self,
        guild_id: GuildId,
        role_id: RoleId,
        color: u32,
    ) -> Result<(), PlatformError> {
        self.with_state(|state| {
            state.ensure_online()?;
            let role = state
                .roles
                .get_mut(&guild_id)
                .and_then(|roles| roles.iter_mut().find(|role| role.id == role_id))
                .ok_or_else(|| PlatformError::NotFound(format!("role {role_id}")))?;
            role.color = color;
            state.calls.push(PlatformCall::EditRoleColor { guild_id, role_id, color });
            Ok(())
        })
    }

    async fn list_channels(&self, guild_id: GuildId) -> Result<Vec<Channel>, PlatformError> {
        self.with_state(|state| {
            state.ensure_online()?;
            Ok(state.channels.iter().filter(|c| c.guild_id == guild_id).cloned().collect())
        })
    }

    async fn create_category(
        &self,
        guild_id: GuildId,
        name: &str,
    ) -> Result<Channel, PlatformError> {
        self.with_state(|state| {
            state.ensure_online()?;
            let channel = Channel {
                id: ChannelId(state.allocate_id()),
                guild_id,
                name: name.to_owned(),
                kind: ChannelKind::Category,
                parent_id: None,
            };
            state.channels.push(channel.clone());
            state.calls.push(PlatformCall::CreateCategory { guild_id, name: name.to_owned() });
            Ok(channel)
        })
    }

    async fn create_text_channel(
        &self,
        guild_id: GuildId,
        request: NewTextChannel,
    ) -> Result<Channel, PlatformError> {
        self.with_state(|state| {
            state.ensure_online()?;
            let channel = Channel {
                id: ChannelId(state.allocate_id()),
                guild_id,
                name: request.name.clone(),
                kind: ChannelKind::Text,
                parent_id: request.category,
            };
            state.channels.push(channel.clone());
            state.overrides.insert(channel.id, request.overrides);
            state.calls.push(PlatformCall::CreateTextChannel {
                guild_id,
                channel_id: channel.id,
                name: request.name,
            });
            Ok(channel)
        })
    }

    async fn rename_channel(&self, channel_id: ChannelId, name: &str) -> Result<(), PlatformError> {
        self.with_state(|state| {
            state.ensure_online()?;
            let channel = state
                .channels
                .iter_mut()
                .find(|channel| channel.id == channel_id)
                .ok_or_else(|| PlatformError::NotFound(format!("channel {channel_id}")))?;
            channel.name = name.to_owned();
            state.calls.push(PlatformCall::RenameChannel { channel_id, name: name.to_owned() });
            Ok(())
        })
    }

    async fn send_message(&self, channel_id: ChannelId, content: &str) -> Result<(), PlatformError> {
        self.with_state(|state| {
            state.ensure_online()?;
            if !state.channels.iter().any(|channel| channel.id == channel_id) {
                return Err(PlatformError::NotFound(format!("channel {channel_id}")));
            }
            state.calls.push(PlatformCall::SendMessage { channel_id, content: content.to_owned() });
            Ok(())
        })
    }
}
