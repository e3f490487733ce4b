pub mod config;
pub mod domain;
pub mod errors;
pub mod platform;
pub mod registration;

pub use domain::channel::{channel_slug, ticket_channel_name};
pub use domain::ids::{ChannelId, GuildId, RoleId, UserId};
pub use domain::name::{validate_name, DisplayName, NameRejection};
pub use domain::registration::RegistrationRecord;
pub use errors::{ApplicationError, InterfaceError};
pub use platform::{PlatformError, SupportPlatform};
pub use registration::{
    ensure_guild_setup, GuildSetupReport, RegistrationAction, RegistrationNotice,
    RegistrationOutcome, RegistrationRequest, RegistrationSettings, RegistrationStore,
    RegistrationWorkflow, StoreError,
};
