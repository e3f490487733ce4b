use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use supportdesk_core::config::SupportConfig;
use supportdesk_core::domain::ids::{ChannelId, GuildId, UserId};
use supportdesk_core::platform::SupportPlatform;
use supportdesk_core::registration::{
    ensure_guild_setup, FormSubmission, RegistrationForm, RegistrationRequest,
    RegistrationSettings, RegistrationStore, RegistrationWorkflow,
};

use crate::commands::{normalize_command, SlashCommandPayload, SupportCommand};
use crate::components::{ephemeral_message, register_prompt_message, CustomId, MessageTemplate};
use crate::events::{
    ComponentClick, EventContext, EventHandlerError, GuildCreateEvent, HandlerResult,
    InteractionRef, MemberAddEvent, ModalSubmission, ReadyEvent, SupportEventService,
};
use crate::responder::{InteractionResponder, InteractionResponse, Messenger};

pub const BUTTON_POSTED: &str = "Posted the register button in this channel.";
pub const INVITE_RESENT: &str = "Sent you the registration Direct Message.";
pub const CHANNEL_REQUIRED: &str = "This command must be used inside a text channel.";
pub const INVITE_FAILED: &str =
    "Could not send you a Direct Message. Please allow Direct Messages from server members.";
pub const BUTTON_FAILED: &str =
    "Could not post the register button here. Check that I can send messages in this channel.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BotSettings {
    pub register_prompt: String,
    pub welcome_channel_id: Option<ChannelId>,
    pub registration: RegistrationSettings,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self::from(&SupportConfig::default())
    }
}

impl From<&SupportConfig> for BotSettings {
    fn from(config: &SupportConfig) -> Self {
        Self {
            register_prompt: config.register_prompt.clone(),
            welcome_channel_id: config.welcome_channel_id.map(ChannelId),
            registration: RegistrationSettings::from(config),
        }
    }
}

/// The support bot: answers every inbound entry point and drives the
/// registration workflow for form submissions and `/register <name>`.
pub struct SupportBot {
    workflow: RegistrationWorkflow,
    platform: Arc<dyn SupportPlatform>,
    messenger: Arc<dyn Messenger>,
    responder: Arc<dyn InteractionResponder>,
    settings: BotSettings,
}

impl SupportBot {
    pub fn new(
        platform: Arc<dyn SupportPlatform>,
        store: Arc<dyn RegistrationStore>,
        messenger: Arc<dyn Messenger>,
        responder: Arc<dyn InteractionResponder>,
        settings: BotSettings,
    ) -> Self {
        let workflow =
            RegistrationWorkflow::new(platform.clone(), store, settings.registration.clone());
        Self { workflow, platform, messenger, responder, settings }
    }

    fn prompt(&self, guild_id: GuildId) -> MessageTemplate {
        register_prompt_message(&self.settings.register_prompt, guild_id)
    }

    async fn reply(
        &self,
        interaction: &InteractionRef,
        message: MessageTemplate,
    ) -> Result<HandlerResult, EventHandlerError> {
        self.responder.respond(interaction, InteractionResponse::Message(message.clone())).await?;
        Ok(HandlerResult::Responded(message))
    }

    async fn present_form(
        &self,
        interaction: &InteractionRef,
        guild_id: GuildId,
    ) -> Result<HandlerResult, EventHandlerError> {
        let form = RegistrationForm::for_guild(guild_id);
        self.responder.respond(interaction, InteractionResponse::Modal(form)).await?;
        Ok(HandlerResult::Processed)
    }

    /// Defers the interaction, runs the workflow and answers with one
    /// follow-up per line of the outcome.
    async fn register(
        &self,
        interaction: &InteractionRef,
        request: RegistrationRequest,
    ) -> Result<HandlerResult, EventHandlerError> {
        self.responder.respond(interaction, InteractionResponse::DeferredEphemeral).await?;

        let correlation_id = request.correlation_id.clone();
        let guild_id = request.guild_id;
        let user_id = request.user_id;
        let lines = match self.workflow.register(request).await {
            Ok(outcome) => outcome.messages(),
            Err(failure) => {
                let interface = failure.into_interface(correlation_id.as_str());
                warn!(
                    event_name = "registration.failed",
                    correlation_id = %correlation_id,
                    guild_id = %guild_id,
                    user_id = %user_id,
                    error = %interface,
                    "registration did not complete"
                );
                vec![interface.user_message().to_owned()]
            }
        };

        let mut last = None;
        for line in lines {
            let message = ephemeral_message(line);
            self.responder.follow_up(interaction, message.clone()).await?;
            last = Some(message);
        }
        Ok(last.map_or(HandlerResult::Processed, HandlerResult::Responded))
    }

    async fn send_invite(&self, user_id: UserId, guild_id: GuildId, correlation_id: &str) -> bool {
        match self.messenger.send_direct(user_id, self.prompt(guild_id)).await {
            Ok(()) => {
                info!(
                    event_name = "registration.invite_sent",
                    correlation_id = %correlation_id,
                    guild_id = %guild_id,
                    user_id = %user_id,
                    "sent registration direct message"
                );
                true
            }
            Err(error) => {
                warn!(
                    event_name = "registration.invite_failed",
                    correlation_id = %correlation_id,
                    guild_id = %guild_id,
                    user_id = %user_id,
                    error = %error,
                    "could not send registration direct message"
                );
                false
            }
        }
    }

    /// Only called when setup changed something, so reconnects that
    /// redeliver the guild do not repost the prompt.
    async fn post_welcome_prompt(&self, guild_id: GuildId, correlation_id: &str) {
        let Some(channel_id) = self.settings.welcome_channel_id else {
            return;
        };

        match self.platform.text_channel_exists(guild_id, channel_id).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    event_name = "guild_setup.welcome_channel_missing",
                    correlation_id = %correlation_id,
                    guild_id = %guild_id,
                    channel_id = %channel_id,
                    "welcome channel is not a text channel of this guild; skipping register prompt"
                );
                return;
            }
            Err(error) => {
                warn!(
                    event_name = "guild_setup.welcome_channel_missing",
                    correlation_id = %correlation_id,
                    guild_id = %guild_id,
                    channel_id = %channel_id,
                    error = %error,
                    "could not look up welcome channel; skipping register prompt"
                );
                return;
            }
        }

        if let Err(error) = self.messenger.send_to_channel(channel_id, self.prompt(guild_id)).await {
            warn!(
                event_name = "guild_setup.welcome_prompt_failed",
                correlation_id = %correlation_id,
                guild_id = %guild_id,
                channel_id = %channel_id,
                error = %error,
                "could not post register prompt"
            );
        }
    }
}

#[async_trait]
impl SupportEventService for SupportBot {
    async fn ready(
        &self,
        event: &ReadyEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        info!(
            event_name = "ingress.discord.ready",
            correlation_id = %ctx.correlation_id,
            bot_user_id = %event.bot_user_id,
            guild_count = event.guild_count,
            "support bot logged in"
        );
        Ok(HandlerResult::Processed)
    }

    async fn guild_joined(
        &self,
        event: &GuildCreateEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let report =
            match ensure_guild_setup(self.platform.as_ref(), event.guild_id, &self.settings.registration)
                .await
            {
                Ok(report) => report,
                Err(failure) => {
                    error!(
                        event_name = "guild_setup.failed",
                        correlation_id = %ctx.correlation_id,
                        guild_id = %event.guild_id,
                        error = %failure,
                        "guild setup failed"
                    );
                    return Err(EventHandlerError::GuildSetup(failure.to_string()));
                }
            };

        if report.changed() {
            self.post_welcome_prompt(event.guild_id, &ctx.correlation_id).await;
        }
        Ok(HandlerResult::Processed)
    }

    async fn member_joined(
        &self,
        event: &MemberAddEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        if event.is_bot {
            return Ok(HandlerResult::Ignored);
        }
        self.send_invite(event.user_id, event.guild_id, &ctx.correlation_id).await;
        Ok(HandlerResult::Processed)
    }

    async fn slash_command(
        &self,
        payload: &SlashCommandPayload,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let envelope = match normalize_command(payload.clone()) {
            Ok(envelope) => envelope,
            Err(rejection) => {
                info!(
                    event_name = "ingress.discord.command_rejected",
                    correlation_id = %ctx.correlation_id,
                    command = %payload.name,
                    reason = %rejection,
                    "rejected slash command"
                );
                return self.reply(&payload.interaction, ephemeral_message(rejection.to_string())).await;
            }
        };

        info!(
            event_name = "ingress.discord.command_received",
            correlation_id = %ctx.correlation_id,
            guild_id = %envelope.guild_id,
            user_id = %envelope.user_id,
            command = %payload.name,
            "handling slash command"
        );

        match envelope.command {
            SupportCommand::Register { name: Some(name) } => {
                let request = RegistrationRequest {
                    user_id: envelope.user_id,
                    guild_id: envelope.guild_id,
                    raw_name: name,
                    correlation_id: ctx.correlation_id.clone(),
                };
                self.register(&envelope.interaction, request).await
            }
            SupportCommand::Register { name: None } => {
                self.present_form(&envelope.interaction, envelope.guild_id).await
            }
            SupportCommand::PostButton => {
                let Some(channel_id) = envelope.channel_id else {
                    return self
                        .reply(&envelope.interaction, ephemeral_message(CHANNEL_REQUIRED))
                        .await;
                };
                let posted =
                    self.messenger.send_to_channel(channel_id, self.prompt(envelope.guild_id)).await;
                let text = match posted {
                    Ok(()) => BUTTON_POSTED,
                    Err(error) => {
                        warn!(
                            event_name = "registration.button_post_failed",
                            correlation_id = %ctx.correlation_id,
                            guild_id = %envelope.guild_id,
                            channel_id = %channel_id,
                            error = %error,
                            "could not post register button"
                        );
                        BUTTON_FAILED
                    }
                };
                self.reply(&envelope.interaction, ephemeral_message(text)).await
            }
            SupportCommand::ResendInvite => {
                let sent = self
                    .send_invite(envelope.user_id, envelope.guild_id, &ctx.correlation_id)
                    .await;
                let text = if sent { INVITE_RESENT } else { INVITE_FAILED };
                self.reply(&envelope.interaction, ephemeral_message(text)).await
            }
        }
    }

    async fn component_click(
        &self,
        event: &ComponentClick,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        match CustomId::parse(&event.custom_id) {
            Some(CustomId::OpenRegistration(guild_id)) => {
                self.present_form(&event.interaction, guild_id).await
            }
            _ => Ok(HandlerResult::Ignored),
        }
    }

    async fn modal_submit(
        &self,
        event: &ModalSubmission,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let Some(CustomId::SubmitRegistration(guild_id)) = CustomId::parse(&event.custom_id) else {
            return Ok(HandlerResult::Ignored);
        };

        let submission = FormSubmission {
            user_id: event.user_id,
            guild_id,
            name: event.submitted_name().unwrap_or_default().to_owned(),
        };
        self.register(&event.interaction, submission.into_request(ctx.correlation_id.clone()))
            .await
    }
}
