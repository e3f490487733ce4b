use serde::{Deserialize, Serialize};

use crate::domain::ids::{GuildId, UserId};
use crate::registration::workflow::RegistrationRequest;

pub const FORM_TITLE: &str = "Register";
pub const NAME_FIELD_LABEL: &str = "Enter your name:";

/// First half of the registration handshake: ask the member for a name. The
/// guild travels with the form so the answer can be correlated even when it
/// arrives from a direct message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationForm {
    pub guild_id: GuildId,
    pub title: String,
    pub name_label: String,
}

impl RegistrationForm {
    pub fn for_guild(guild_id: GuildId) -> Self {
        Self { guild_id, title: FORM_TITLE.to_owned(), name_label: NAME_FIELD_LABEL.to_owned() }
    }
}

/// Second half: the member's answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSubmission {
    pub user_id: UserId,
    pub guild_id: GuildId,
    pub name: String,
}

impl FormSubmission {
    pub fn into_request(self, correlation_id: impl Into<String>) -> RegistrationRequest {
        RegistrationRequest {
            user_id: self.user_id,
            guild_id: self.guild_id,
            raw_name: self.name,
            correlation_id: correlation_id.into(),
        }
    }
}
