use tracing::{info, warn};

use crate::domain::ids::{ChannelId, GuildId, RoleId};
use crate::errors::ApplicationError;
use crate::platform::{PlatformError, Role, SupportPlatform};
use crate::registration::RegistrationSettings;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuildSetupReport {
    pub staff_role: RoleId,
    pub staff_role_created: bool,
    pub member_role: RoleId,
    pub member_role_created: bool,
    pub ticket_category: ChannelId,
    pub ticket_category_created: bool,
}

impl GuildSetupReport {
    pub fn changed(&self) -> bool {
        self.staff_role_created || self.member_role_created || self.ticket_category_created
    }
}

/// Provisions the staff role, the member role and the ticket category of a
/// guild. Existence is checked by exact name, so running it again is a no-op.
/// The member role is coloured only when it is created here.
pub async fn ensure_guild_setup(
    platform: &dyn SupportPlatform,
    guild_id: GuildId,
    settings: &RegistrationSettings,
) -> Result<GuildSetupReport, ApplicationError> {
    let (staff_role, staff_role_created) =
        ensure_role(platform, guild_id, &settings.staff_role).await?;
    let (member_role, member_role_created) =
        ensure_role(platform, guild_id, &settings.member_role).await?;

    if member_role_created {
        if let Err(error) =
            platform.edit_role_color(guild_id, member_role.id, settings.member_role_color).await
        {
            warn!(
                event_name = "guild_setup.role_color_failed",
                guild_id = %guild_id,
                role = %member_role.name,
                error = %error,
                "could not colour member role"
            );
        }
    }

    let (ticket_category, ticket_category_created) =
        ensure_category(platform, guild_id, &settings.ticket_category).await?;

    let report = GuildSetupReport {
        staff_role: staff_role.id,
        staff_role_created,
        member_role: member_role.id,
        member_role_created,
        ticket_category,
        ticket_category_created,
    };
    info!(
        event_name = "guild_setup.completed",
        guild_id = %guild_id,
        changed = report.changed(),
        "guild setup verified"
    );
    Ok(report)
}

pub(crate) async fn ensure_role(
    platform: &dyn SupportPlatform,
    guild_id: GuildId,
    name: &str,
) -> Result<(Role, bool), PlatformError> {
    if let Some(role) = platform.find_role_by_name(guild_id, name).await? {
        return Ok((role, false));
    }

    let role = platform.create_role(guild_id, name).await?;
    info!(event_name = "guild_setup.role_created", guild_id = %guild_id, role = name, "created role");
    Ok((role, true))
}

pub(crate) async fn ensure_category(
    platform: &dyn SupportPlatform,
    guild_id: GuildId,
    name: &str,
) -> Result<(ChannelId, bool), PlatformError> {
    if let Some(category) = platform.find_category_by_name(guild_id, name).await? {
        return Ok((category.id, false));
    }

    let category = platform.create_category(guild_id, name).await?;
    info!(
        event_name = "guild_setup.category_created",
        guild_id = %guild_id,
        category = name,
        "created ticket category"
    );
    Ok((category.id, true))
}

#[cfg(test)]
mod tests {
    use super::ensure_guild_setup;
    use crate::domain::ids::GuildId;
    use crate::platform::{ChannelKind, InMemoryPlatform, PlatformCall};
    use crate::registration::RegistrationSettings;

    const GUILD: GuildId = GuildId(900);

    #[tokio::test]
    async fn creates_roles_and_category_once() {
        let platform = InMemoryPlatform::new();
        let settings = RegistrationSettings::default();

        let first = ensure_guild_setup(&platform, GUILD, &settings).await.expect("first setup");
        let second = ensure_guild_setup(&platform, GUILD, &settings).await.expect("second setup");

        assert!(first.changed());
        assert!(!second.changed());
        assert_eq!(first.staff_role, second.staff_role);
        assert_eq!(first.member_role, second.member_role);
        assert_eq!(first.ticket_category, second.ticket_category);

        let roles = platform.roles(GUILD);
        assert_eq!(roles.iter().filter(|role| role.name == settings.staff_role).count(), 1);
        assert_eq!(roles.iter().filter(|role| role.name == settings.member_role).count(), 1);
        let categories = platform
            .channels(GUILD)
            .into_iter()
            .filter(|channel| channel.kind == ChannelKind::Category)
            .count();
        assert_eq!(categories, 1);
    }

    #[tokio::test]
    async fn colours_member_role_only_when_created() {
        let platform = InMemoryPlatform::new();
        let settings = RegistrationSettings::default();

        ensure_guild_setup(&platform, GUILD, &settings).await.expect("setup");
        let member_role = platform
            .roles(GUILD)
            .into_iter()
            .find(|role| role.name == settings.member_role)
            .expect("member role exists");
        assert_eq!(member_role.color, 0x4499d5);

        platform.clear_calls();
        ensure_guild_setup(&platform, GUILD, &settings).await.expect("setup again");
        assert!(platform.calls().is_empty(), "second setup must not mutate the guild");
    }

    #[tokio::test]
    async fn keeps_existing_roles_untouched() {
        let platform = InMemoryPlatform::new();
        let settings = RegistrationSettings::default();
        let staff = platform.add_role(GUILD, &settings.staff_role);

        let report = ensure_guild_setup(&platform, GUILD, &settings).await.expect("setup");

        assert_eq!(report.staff_role, staff);
        assert!(!report.staff_role_created);
        assert!(report.member_role_created);
        assert!(!platform
            .calls()
            .iter()
            .any(|call| matches!(call, PlatformCall::CreateRole { name, .. } if name == &settings.staff_role)));
    }

    #[tokio::test]
    async fn surfaces_transport_failures() {
        let platform = InMemoryPlatform::new();
        platform.set_offline(true);

        let result = ensure_guild_setup(&platform, GUILD, &RegistrationSettings::default()).await;
        assert!(result.is_err());
    }
}
