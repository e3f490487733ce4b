use serenity::all::{CommandOptionType, CreateCommand, CreateCommandOption};
use thiserror::Error;

use supportdesk_core::domain::ids::{ChannelId, GuildId, UserId};

use crate::components::name_length_limit;
use crate::events::InteractionRef;

pub const REGISTER_COMMAND: &str = "register";
pub const BUTTON_COMMAND: &str = "button";
pub const RESEND_INVITE_COMMAND: &str = "resend_register_invite";
pub const NAME_OPTION: &str = "name";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommandPayload {
    pub interaction: InteractionRef,
    pub name: String,
    pub options: Vec<CommandOption>,
    pub guild_id: Option<GuildId>,
    pub channel_id: Option<ChannelId>,
    pub user_id: UserId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandOption {
    pub name: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SupportCommand {
    /// Without a name the member gets the registration form.
    Register { name: Option<String> },
    PostButton,
    ResendInvite,
}

/// A command routed to a guild-scoped action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEnvelope {
    pub command: SupportCommand,
    pub guild_id: GuildId,
    pub channel_id: Option<ChannelId>,
    pub user_id: UserId,
    pub interaction: InteractionRef,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unsupported slash command: /{0}")]
    UnsupportedCommand(String),
    #[error("/{0} can only be used inside a server")]
    GuildOnly(String),
}

pub fn normalize_command(payload: SlashCommandPayload) -> Result<CommandEnvelope, CommandParseError> {
    let command = match payload.name.as_str() {
        REGISTER_COMMAND => {
            let name = payload
                .options
                .iter()
                .find(|option| option.name == NAME_OPTION)
                .map(|option| option.value.clone())
                .filter(|value| !value.is_empty());
            SupportCommand::Register { name }
        }
        BUTTON_COMMAND => SupportCommand::PostButton,
        RESEND_INVITE_COMMAND => SupportCommand::ResendInvite,
        _ => return Err(CommandParseError::UnsupportedCommand(payload.name)),
    };

    let guild_id = payload.guild_id.ok_or_else(|| CommandParseError::GuildOnly(payload.name.clone()))?;

    Ok(CommandEnvelope {
        command,
        guild_id,
        channel_id: payload.channel_id,
        user_id: payload.user_id,
        interaction: payload.interaction,
    })
}

/// Global slash commands, registered once the session is ready.
pub fn command_definitions() -> Vec<CreateCommand> {
    vec![
        CreateCommand::new(REGISTER_COMMAND)
            .description("Registers you to the support system.")
            .dm_permission(false)
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    NAME_OPTION,
                    "Your name (letters and spaces only).",
                )
                .required(false)
                .max_length(name_length_limit()),
            ),
        CreateCommand::new(BUTTON_COMMAND)
            .description("Posts the register button in this channel.")
            .dm_permission(false),
        CreateCommand::new(RESEND_INVITE_COMMAND)
            .description("Resends the registration Direct Message.")
            .dm_permission(false),
    ]
}
