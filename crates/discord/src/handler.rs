use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{Command, Context, EventHandler, GatewayIntents, Guild, Interaction, Member, Ready};
use tracing::{info, warn};

use supportdesk_core::registration::RegistrationStore;

use crate::bot::{BotSettings, SupportBot};
use crate::commands::command_definitions;
use crate::events::{route, EventContext, HandlerResult, InboundEvent};
use crate::platform::DiscordPlatform;

/// Gateway intents the entry points need: guild lifecycle and member joins.
pub fn intents() -> GatewayIntents {
    GatewayIntents::GUILDS | GatewayIntents::GUILD_MEMBERS
}

/// Serenity event handler that turns gateway events into [`SupportBot`] calls.
#[derive(Clone)]
pub struct SupportHandler {
    store: Arc<dyn RegistrationStore>,
    settings: BotSettings,
}

impl SupportHandler {
    pub fn new(store: Arc<dyn RegistrationStore>, settings: BotSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &BotSettings {
        &self.settings
    }

    /// The bot talks back through the HTTP client of the shard that delivered the event.
    fn bot(&self, ctx: &Context) -> SupportBot {
        let discord = Arc::new(DiscordPlatform::new(ctx.http.clone()));
        SupportBot::new(
            discord.clone(),
            self.store.clone(),
            discord.clone(),
            discord,
            self.settings.clone(),
        )
    }

    async fn handle(&self, ctx: &Context, event: InboundEvent) {
        let event_ctx = EventContext { correlation_id: event.correlation_id() };
        let guild_id = event.guild_id().map(|id| id.to_string()).unwrap_or_default();

        match route(&self.bot(ctx), &event, &event_ctx).await {
            Ok(HandlerResult::Ignored) => {
                info!(
                    event_name = event.event_name(),
                    correlation_id = %event_ctx.correlation_id,
                    guild_id = %guild_id,
                    "event ignored"
                );
            }
            Ok(_) => {}
            Err(error) => {
                warn!(
                    event_name = event.event_name(),
                    correlation_id = %event_ctx.correlation_id,
                    guild_id = %guild_id,
                    error = %error,
                    "event handling failed"
                );
            }
        }
    }

    async fn register_commands(&self, ctx: &Context) {
        match Command::set_global_commands(&ctx.http, command_definitions()).await {
            Ok(registered) => info!(
                event_name = "system.discord.commands_registered",
                correlation_id = "ready",
                count = registered.len(),
                "slash commands registered"
            ),
            Err(error) => warn!(
                event_name = "system.discord.commands_registered",
                correlation_id = "ready",
                error = %error,
                "slash command registration failed; previously registered commands stay active"
            ),
        }
    }
}

#[async_trait]
impl EventHandler for SupportHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        self.register_commands(&ctx).await;
        self.handle(&ctx, InboundEvent::Ready((&ready).into())).await;
    }

    /// Redelivered on every reconnect; setup is idempotent.
    async fn guild_create(&self, ctx: Context, guild: Guild, _is_new: Option<bool>) {
        self.handle(&ctx, InboundEvent::GuildCreate((&guild).into())).await;
    }

    async fn guild_member_addition(&self, ctx: Context, new_member: Member) {
        self.handle(&ctx, InboundEvent::MemberAdd((&new_member).into())).await;
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let event = match &interaction {
            Interaction::Command(command) => InboundEvent::SlashCommand(command.into()),
            Interaction::Component(click) => InboundEvent::ComponentClick(click.into()),
            Interaction::Modal(modal) => InboundEvent::ModalSubmit(modal.into()),
            _ => return,
        };
        self.handle(&ctx, event).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serenity::all::GatewayIntents;
    use supportdesk_db::InMemoryRegistrationRepository;

    use super::{intents, SupportHandler};
    use crate::bot::BotSettings;

    #[test]
    fn subscribes_to_guild_and_member_events() {
        let intents = intents();
        assert!(intents.contains(GatewayIntents::GUILDS));
        assert!(intents.contains(GatewayIntents::GUILD_MEMBERS));
        assert!(!intents.contains(GatewayIntents::MESSAGE_CONTENT));
    }

    #[test]
    fn keeps_configured_settings() {
        let settings = BotSettings { register_prompt: "Hi".to_owned(), ..BotSettings::default() };
        let handler =
            SupportHandler::new(Arc::new(InMemoryRegistrationRepository::default()), settings);
        assert_eq!(handler.settings().register_prompt, "Hi");
    }
}
