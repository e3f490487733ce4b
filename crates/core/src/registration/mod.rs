//! Member registration: the persistence port, the reconciliation workflow
//! that creates, repairs or renames a member's support channel, and the
//! one-time guild setup that provisions the roles it relies on.

pub mod protocol;
pub mod setup;
pub mod store;
pub mod workflow;

use crate::config::SupportConfig;

/// Guild-facing names and texts the workflow and setup work with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistrationSettings {
    pub staff_role: String,
    pub member_role: String,
    pub member_role_color: u32,
    pub ticket_category: String,
    pub ticket_welcome_message: String,
}

impl Default for RegistrationSettings {
    fn default() -> Self {
        Self::from(&SupportConfig::default())
    }
}

impl From<&SupportConfig> for RegistrationSettings {
    fn from(config: &SupportConfig) -> Self {
        Self {
            staff_role: config.staff_role.clone(),
            member_role: config.member_role.clone(),
            member_role_color: config.member_role_color,
            ticket_category: config.ticket_category.clone(),
            ticket_welcome_message: config.ticket_welcome_message.clone(),
        }
    }
}

pub use protocol::{FormSubmission, RegistrationForm};
pub use setup::{ensure_guild_setup, GuildSetupReport};
pub use store::{RegistrationStore, StoreError};
pub use workflow::{
    RegistrationAction, RegistrationNotice, RegistrationOutcome, RegistrationRequest,
    RegistrationWorkflow,
};
