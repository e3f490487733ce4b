use async_trait::async_trait;
use serenity::all::{
    ActionRowComponent, CommandInteraction, ComponentInteraction, Guild, Member,
    ModalInteraction, Ready,
};
use thiserror::Error;

use supportdesk_core::domain::ids::{ChannelId, GuildId, UserId};
use supportdesk_core::platform::PlatformError;

use crate::commands::{CommandOption, CommandParseError, SlashCommandPayload};
use crate::components::{MessageTemplate, NAME_INPUT_ID};

/// Enough of an interaction to answer it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InteractionRef {
    pub id: u64,
    pub token: String,
}

impl InteractionRef {
    pub fn new(id: u64, token: impl Into<String>) -> Self {
        Self { id, token: token.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadyEvent {
    pub session_id: String,
    pub bot_user_id: UserId,
    pub guild_count: usize,
}

impl From<&Ready> for ReadyEvent {
    fn from(ready: &Ready) -> Self {
        Self {
            session_id: ready.session_id.clone(),
            bot_user_id: UserId(ready.user.id.get()),
            guild_count: ready.guilds.len(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuildCreateEvent {
    pub guild_id: GuildId,
    pub name: String,
}

impl From<&Guild> for GuildCreateEvent {
    fn from(guild: &Guild) -> Self {
        Self { guild_id: GuildId(guild.id.get()), name: guild.name.clone() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberAddEvent {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub is_bot: bool,
}

impl From<&Member> for MemberAddEvent {
    fn from(member: &Member) -> Self {
        Self {
            guild_id: GuildId(member.guild_id.get()),
            user_id: UserId(member.user.id.get()),
            is_bot: member.user.bot,
        }
    }
}

impl From<&CommandInteraction> for SlashCommandPayload {
    fn from(command: &CommandInteraction) -> Self {
        let options = command
            .data
            .options
            .iter()
            .filter_map(|option| {
                option.value.as_str().map(|value| CommandOption {
                    name: option.name.clone(),
                    value: value.to_owned(),
                })
            })
            .collect();
        Self {
            interaction: InteractionRef::new(command.id.get(), command.token.clone()),
            name: command.data.name.clone(),
            options,
            guild_id: command.guild_id.map(|id| GuildId(id.get())),
            channel_id: Some(ChannelId(command.channel_id.get())),
            user_id: UserId(command.user.id.get()),
        }
    }
}

/// A button press on one of the bot's messages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentClick {
    pub interaction: InteractionRef,
    pub custom_id: String,
    pub guild_id: Option<GuildId>,
    pub channel_id: Option<ChannelId>,
    pub user_id: UserId,
}

impl From<&ComponentInteraction> for ComponentClick {
    fn from(click: &ComponentInteraction) -> Self {
        Self {
            interaction: InteractionRef::new(click.id.get(), click.token.clone()),
            custom_id: click.data.custom_id.clone(),
            guild_id: click.guild_id.map(|id| GuildId(id.get())),
            channel_id: Some(ChannelId(click.channel_id.get())),
            user_id: UserId(click.user.id.get()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModalSubmission {
    pub interaction: InteractionRef,
    pub custom_id: String,
    pub guild_id: Option<GuildId>,
    pub user_id: UserId,
    /// `(input custom id, submitted value)` for every text input in the modal.
    pub fields: Vec<(String, String)>,
}

impl ModalSubmission {
    pub fn field(&self, custom_id: &str) -> Option<&str> {
        self.fields.iter().find(|(id, _)| id == custom_id).map(|(_, value)| value.as_str())
    }

    pub fn submitted_name(&self) -> Option<&str> {
        self.field(NAME_INPUT_ID)
    }
}

impl From<&ModalInteraction> for ModalSubmission {
    fn from(modal: &ModalInteraction) -> Self {
        let fields = modal
            .data
            .components
            .iter()
            .flat_map(|row| row.components.iter())
            .filter_map(|component| match component {
                ActionRowComponent::InputText(input) => {
                    Some((input.custom_id.clone(), input.value.clone().unwrap_or_default()))
                }
                _ => None,
            })
            .collect();
        Self {
            interaction: InteractionRef::new(modal.id.get(), modal.token.clone()),
            custom_id: modal.data.custom_id.clone(),
            guild_id: modal.guild_id.map(|id| GuildId(id.get())),
            user_id: UserId(modal.user.id.get()),
            fields,
        }
    }
}

/// Everything the bot reacts to, already stripped of serenity types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    Ready(ReadyEvent),
    GuildCreate(GuildCreateEvent),
    MemberAdd(MemberAddEvent),
    SlashCommand(SlashCommandPayload),
    ComponentClick(ComponentClick),
    ModalSubmit(ModalSubmission),
}

impl InboundEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Ready(_) => "ingress.discord.ready",
            Self::GuildCreate(_) => "ingress.discord.guild_create",
            Self::MemberAdd(_) => "ingress.discord.member_add",
            Self::SlashCommand(_) => "ingress.discord.slash_command",
            Self::ComponentClick(_) => "ingress.discord.component_click",
            Self::ModalSubmit(_) => "ingress.discord.modal_submit",
        }
    }

    /// Interaction id when there is one, otherwise something stable for the event.
    pub fn correlation_id(&self) -> String {
        match self {
            Self::Ready(event) => format!("ready-{}", event.session_id),
            Self::GuildCreate(event) => format!("guild-{}", event.guild_id),
            Self::MemberAdd(event) => format!("join-{}-{}", event.guild_id, event.user_id),
            Self::SlashCommand(payload) => payload.interaction.id.to_string(),
            Self::ComponentClick(event) => event.interaction.id.to_string(),
            Self::ModalSubmit(event) => event.interaction.id.to_string(),
        }
    }

    pub fn guild_id(&self) -> Option<GuildId> {
        match self {
            Self::Ready(_) => None,
            Self::GuildCreate(event) => Some(event.guild_id),
            Self::MemberAdd(event) => Some(event.guild_id),
            Self::SlashCommand(payload) => payload.guild_id,
            Self::ComponentClick(event) => event.guild_id,
            Self::ModalSubmit(event) => event.guild_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    /// The interaction was answered; carries the last message sent.
    Responded(MessageTemplate),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Parse(#[from] CommandParseError),
    #[error("could not deliver reply: {0}")]
    Reply(#[from] PlatformError),
    #[error("guild setup failed: {0}")]
    GuildSetup(String),
}

/// Entry points the bot reacts to, one per inbound event kind.
#[async_trait]
pub trait SupportEventService: Send + Sync {
    async fn ready(
        &self,
        event: &ReadyEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;

    async fn guild_joined(
        &self,
        event: &GuildCreateEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;

    async fn member_joined(
        &self,
        event: &MemberAddEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;

    async fn slash_command(
        &self,
        payload: &SlashCommandPayload,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;

    async fn component_click(
        &self,
        event: &ComponentClick,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;

    async fn modal_submit(
        &self,
        event: &ModalSubmission,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

/// Hands one event to the matching [`SupportEventService`] entry point.
pub async fn route(
    service: &dyn SupportEventService,
    event: &InboundEvent,
    ctx: &EventContext,
) -> Result<HandlerResult, EventHandlerError> {
    match event {
        InboundEvent::Ready(event) => service.ready(event, ctx).await,
        InboundEvent::GuildCreate(event) => service.guild_joined(event, ctx).await,
        InboundEvent::MemberAdd(event) => service.member_joined(event, ctx).await,
        InboundEvent::SlashCommand(payload) => service.slash_command(payload, ctx).await,
        InboundEvent::ComponentClick(event) => service.component_click(event, ctx).await,
        InboundEvent::ModalSubmit(event) => service.modal_submit(event, ctx).await,
    }
}
