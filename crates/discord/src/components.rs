use serenity::all::{
    ButtonStyle, CreateActionRow, CreateButton, CreateInputText,
    CreateInteractionResponseFollowup, CreateInteractionResponseMessage, CreateMessage,
    CreateModal, InputTextStyle,
};

use supportdesk_core::domain::ids::GuildId;
use supportdesk_core::domain::name::MAX_NAME_LEN;
use supportdesk_core::registration::RegistrationForm;

pub const REGISTER_BUTTON_LABEL: &str = "Register";
pub const NAME_INPUT_ID: &str = "supportdesk:register:name";

const OPEN_PREFIX: &str = "supportdesk:register:open:";
const SUBMIT_PREFIX: &str = "supportdesk:register:submit:";

/// Routing information carried in component and modal custom ids. The guild
/// id rides along so a click from a direct message can still be resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CustomId {
    OpenRegistration(GuildId),
    SubmitRegistration(GuildId),
}

impl CustomId {
    pub fn encode(self) -> String {
        match self {
            Self::OpenRegistration(guild_id) => format!("{OPEN_PREFIX}{guild_id}"),
            Self::SubmitRegistration(guild_id) => format!("{SUBMIT_PREFIX}{guild_id}"),
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        if let Some(guild) = raw.strip_prefix(OPEN_PREFIX) {
            return guild.parse().ok().map(Self::OpenRegistration);
        }
        if let Some(guild) = raw.strip_prefix(SUBMIT_PREFIX) {
            return guild.parse().ok().map(Self::SubmitRegistration);
        }
        None
    }

    pub fn guild_id(self) -> GuildId {
        match self {
            Self::OpenRegistration(guild_id) | Self::SubmitRegistration(guild_id) => guild_id,
        }
    }
}

/// Length cap handed to Discord for the name input and the `/register` option.
pub fn name_length_limit() -> u16 {
    u16::try_from(MAX_NAME_LEN).unwrap_or(u16::MAX)
}

/// Body of a channel message, interaction reply or follow-up, kept free of
/// serenity types so handlers can be asserted on directly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageTemplate {
    pub content: String,
    /// Attaches the register button for this guild below the text.
    pub register_button: Option<GuildId>,
    pub ephemeral: bool,
}

impl MessageTemplate {
    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    fn action_rows(&self) -> Vec<CreateActionRow> {
        self.register_button
            .map(|guild_id| {
                vec![CreateActionRow::Buttons(vec![CreateButton::new(
                    CustomId::OpenRegistration(guild_id).encode(),
                )
                .label(REGISTER_BUTTON_LABEL)
                .style(ButtonStyle::Primary)])]
            })
            .unwrap_or_default()
    }

    /// Channel and direct messages cannot be ephemeral; the flag is dropped.
    pub fn to_channel_message(&self) -> CreateMessage {
        let message = CreateMessage::new().content(self.content.clone());
        match self.action_rows() {
            rows if rows.is_empty() => message,
            rows => message.components(rows),
        }
    }

    pub fn to_response(&self) -> CreateInteractionResponseMessage {
        let message =
            CreateInteractionResponseMessage::new().content(self.content.clone()).ephemeral(self.ephemeral);
        match self.action_rows() {
            rows if rows.is_empty() => message,
            rows => message.components(rows),
        }
    }

    pub fn to_follow_up(&self) -> CreateInteractionResponseFollowup {
        let message = CreateInteractionResponseFollowup::new()
            .content(self.content.clone())
            .ephemeral(self.ephemeral);
        match self.action_rows() {
            rows if rows.is_empty() => message,
            rows => message.components(rows),
        }
    }
}

/// The persistent register prompt posted in welcome channels and DMs.
pub fn register_prompt_message(prompt: &str, guild_id: GuildId) -> MessageTemplate {
    MessageTemplate { content: prompt.to_owned(), register_button: Some(guild_id), ephemeral: false }
}

pub fn ephemeral_message(content: impl Into<String>) -> MessageTemplate {
    MessageTemplate { content: content.into(), register_button: None, ephemeral: true }
}

pub fn registration_modal(form: &RegistrationForm) -> CreateModal {
    let input = CreateInputText::new(InputTextStyle::Short, form.name_label.clone(), NAME_INPUT_ID)
        .min_length(1)
        .max_length(name_length_limit())
        .required(true);
    CreateModal::new(CustomId::SubmitRegistration(form.guild_id).encode(), form.title.clone())
        .components(vec![CreateActionRow::InputText(input)])
}

#[cfg(test)]
mod tests {
    use super::{
        ephemeral_message, name_length_limit, register_prompt_message, registration_modal,
        CustomId, NAME_INPUT_ID,
    };
    use supportdesk_core::domain::ids::GuildId;
    use supportdesk_core::domain::name::MAX_NAME_LEN;
    use supportdesk_core::registration::RegistrationForm;

    #[test]
    fn custom_ids_carry_the_guild() {
        let open = CustomId::OpenRegistration(GuildId(81));
        assert_eq!(open.encode(), "supportdesk:register:open:81");
        assert_eq!(CustomId::parse("supportdesk:register:open:81"), Some(open));
        assert_eq!(
            CustomId::parse("supportdesk:register:submit:82"),
            Some(CustomId::SubmitRegistration(GuildId(82)))
        );
        assert_eq!(CustomId::parse("supportdesk:register:open:abc"), None);
        assert_eq!(CustomId::parse("something-else"), None);
    }

    #[test]
    fn name_limit_matches_validation_bound() {
        assert_eq!(usize::from(name_length_limit()), MAX_NAME_LEN);
    }

    #[test]
    fn register_prompt_carries_the_open_button() {
        let message = register_prompt_message("Welcome!", GuildId(5));

        let body = serde_json::to_value(message.to_channel_message()).expect("serialize");

        assert_eq!(body["content"], "Welcome!");
        let button = &body["components"][0]["components"][0];
        assert_eq!(button["custom_id"], "supportdesk:register:open:5");
        assert_eq!(button["label"], "Register");
    }

    #[test]
    fn modal_has_single_bounded_name_input() {
        let modal = registration_modal(&RegistrationForm::for_guild(GuildId(7)));

        let body = serde_json::to_value(&modal).expect("serialize");

        assert_eq!(body["custom_id"], "supportdesk:register:submit:7");
        assert_eq!(body["title"], "Register");
        let input = &body["components"][0]["components"][0];
        assert_eq!(input["custom_id"], NAME_INPUT_ID);
        assert_eq!(input["label"], "Enter your name:");
        assert_eq!(input["max_length"], 35);
    }

    #[test]
    fn ephemeral_replies_set_the_flag_and_have_no_buttons() {
        let message = ephemeral_message("hi");
        assert!(message.is_ephemeral());

        let body = serde_json::to_value(message.to_follow_up()).expect("serialize");

        assert_eq!(body["content"], "hi");
        assert_eq!(body["flags"], 64);
        assert!(body.get("components").map_or(true, |rows| rows.is_null()));
    }
}
