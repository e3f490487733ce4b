use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::channel::ticket_channel_name;
use crate::domain::ids::{ChannelId, GuildId, UserId};
use crate::domain::name::{validate_name, DisplayName};
use crate::domain::registration::RegistrationRecord;
use crate::errors::ApplicationError;
use crate::platform::{NewTextChannel, Principal, ReadOverride, SupportPlatform};
use crate::registration::setup::ensure_category;
use crate::registration::store::{RegistrationStore, StoreError};
use crate::registration::RegistrationSettings;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistrationRequest {
    pub user_id: UserId,
    pub guild_id: GuildId,
    pub raw_name: String,
    pub correlation_id: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationAction {
    /// No record existed: channel created, role granted, record inserted.
    Created,
    /// Record and channel exist: channel renamed.
    Updated,
    /// Record exists but its channel is gone: replacement created, record repointed.
    Recreated,
    /// A concurrent registration inserted the record first.
    AlreadyRegistered,
}

impl RegistrationAction {
    pub fn summary(self) -> &'static str {
        match self {
            Self::Created => "Successfully registered you to the support system!",
            Self::Updated => "Successfully updated your support channel name.",
            Self::Recreated => "Successfully recreated your support channel.",
            Self::AlreadyRegistered => "You are already registered to the support system.",
        }
    }
}

/// Non-fatal refusals met along the way.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegistrationNotice {
    NicknameUnchanged,
    RoleNotGranted { role: String },
}

impl RegistrationNotice {
    pub fn message(&self) -> String {
        match self {
            Self::NicknameUnchanged => {
                "Could not change your nickname (does not work for admins).".to_owned()
            }
            Self::RoleNotGranted { role } => {
                format!("Could not give you {role} role (does not work for administrators).")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RegistrationOutcome {
    pub action: RegistrationAction,
    pub channel_id: ChannelId,
    pub channel_name: String,
    pub notices: Vec<RegistrationNotice>,
}

impl RegistrationOutcome {
    /// Notices first, then the final summary line.
    pub fn messages(&self) -> Vec<String> {
        self.notices
            .iter()
            .map(RegistrationNotice::message)
            .chain(std::iter::once(self.action.summary().to_owned()))
            .collect()
    }
}

/// Reconciles a member's support channel with what is stored and what still
/// exists on the platform. Holds no state of its own between calls.
///
/// | record | channel alive | action                                   |
/// |--------|---------------|------------------------------------------|
/// | no     | -             | create channel, grant role, insert record|
/// | yes    | yes           | rename channel                           |
/// | yes    | no            | create channel, repoint record           |
///
/// Platform mutations are not rolled back when a later step fails.
pub struct RegistrationWorkflow {
    platform: Arc<dyn SupportPlatform>,
    store: Arc<dyn RegistrationStore>,
    settings: RegistrationSettings,
}

impl RegistrationWorkflow {
    pub fn new(
        platform: Arc<dyn SupportPlatform>,
        store: Arc<dyn RegistrationStore>,
        settings: RegistrationSettings,
    ) -> Self {
        Self { platform, store, settings }
    }

    pub fn settings(&self) -> &RegistrationSettings {
        &self.settings
    }

    pub async fn register(
        &self,
        request: RegistrationRequest,
    ) -> Result<RegistrationOutcome, ApplicationError> {
        let RegistrationRequest { user_id, guild_id, raw_name, correlation_id } = request;

        let name = match validate_name(&raw_name) {
            Ok(name) => name,
            Err(rejection) => {
                info!(
                    event_name = "registration.name_rejected",
                    correlation_id = %correlation_id,
                    guild_id = %guild_id,
                    user_id = %user_id,
                    reason = %rejection,
                    "registration name rejected"
                );
                return Err(rejection.into());
            }
        };

        if self.platform.fetch_member(guild_id, user_id).await?.is_none() {
            return Err(ApplicationError::MissingEntity(format!(
                "user {user_id} is not a member of guild {guild_id}"
            )));
        }

        let mut notices = Vec::new();
        if let Err(error) = self.platform.edit_nickname(guild_id, user_id, name.as_str()).await {
            warn!(
                event_name = "registration.nickname_unchanged",
                correlation_id = %correlation_id,
                guild_id = %guild_id,
                user_id = %user_id,
                error = %error,
                "could not change member nickname"
            );
            notices.push(RegistrationNotice::NicknameUnchanged);
        }

        let outcome = match self.store.find(user_id, guild_id).await? {
            None => self.create(user_id, guild_id, &name, notices, &correlation_id).await?,
            Some(record) => self.reconcile(record, &name, notices, &correlation_id).await?,
        };

        info!(
            event_name = "registration.completed",
            correlation_id = %correlation_id,
            guild_id = %guild_id,
            user_id = %user_id,
            action = ?outcome.action,
            channel_id = %outcome.channel_id,
            "registration workflow finished"
        );
        Ok(outcome)
    }

    async fn create(
        &self,
        user_id: UserId,
        guild_id: GuildId,
        name: &DisplayName,
        mut notices: Vec<RegistrationNotice>,
        correlation_id: &str,
    ) -> Result<RegistrationOutcome, ApplicationError> {
        let (channel_id, channel_name) =
            self.provision_channel(user_id, guild_id, name, correlation_id).await?;

        if let Some(notice) = self.grant_member_role(user_id, guild_id, correlation_id).await? {
            notices.push(notice);
        }

        let record = RegistrationRecord::new(user_id, guild_id, channel_id);
        let action = match self.store.insert(&record).await {
            Ok(()) => RegistrationAction::Created,
            Err(StoreError::Duplicate { .. }) => {
                warn!(
                    event_name = "registration.duplicate_insert",
                    correlation_id = %correlation_id,
                    guild_id = %guild_id,
                    user_id = %user_id,
                    orphan_channel_id = %channel_id,
                    "registration raced with another; keeping the stored record"
                );
                RegistrationAction::AlreadyRegistered
            }
            Err(error) => return Err(error.into()),
        };

        Ok(RegistrationOutcome { action, channel_id, channel_name, notices })
    }

    async fn reconcile(
        &self,
        record: RegistrationRecord,
        name: &DisplayName,
        notices: Vec<RegistrationNotice>,
        correlation_id: &str,
    ) -> Result<RegistrationOutcome, ApplicationError> {
        let RegistrationRecord { user_id, guild_id, channel_id } = record;

        let alive = match self.platform.text_channel_exists(guild_id, channel_id).await {
            Ok(alive) => alive,
            Err(error) if error.is_not_found() => false,
            Err(error) => return Err(error.into()),
        };

        if alive {
            let channel_name = ticket_channel_name(name);
            self.platform.rename_channel(channel_id, &channel_name).await?;
            info!(
                event_name = "registration.channel_renamed",
                correlation_id = %correlation_id,
                guild_id = %guild_id,
                user_id = %user_id,
                channel_id = %channel_id,
                channel_name = %channel_name,
                "updated existing support channel name"
            );
            return Ok(RegistrationOutcome {
                action: RegistrationAction::Updated,
                channel_id,
                channel_name,
                notices,
            });
        }

        warn!(
            event_name = "registration.channel_missing",
            correlation_id = %correlation_id,
            guild_id = %guild_id,
            user_id = %user_id,
            channel_id = %channel_id,
            "stored support channel no longer exists; creating a replacement"
        );
        let (new_channel_id, channel_name) =
            self.provision_channel(user_id, guild_id, name, correlation_id).await?;
        self.store.update_channel_id(user_id, guild_id, new_channel_id).await?;

        Ok(RegistrationOutcome {
            action: RegistrationAction::Recreated,
            channel_id: new_channel_id,
            channel_name,
            notices,
        })
    }

    /// Private ticket channel: hidden from `@everyone`, visible to the staff
    /// role and the member. The welcome text is best effort.
    async fn provision_channel(
        &self,
        user_id: UserId,
        guild_id: GuildId,
        name: &DisplayName,
        correlation_id: &str,
    ) -> Result<(ChannelId, String), ApplicationError> {
        let platform = self.platform.as_ref();
        let (category, _) = ensure_category(platform, guild_id, &self.settings.ticket_category).await?;

        let mut overrides = vec![ReadOverride::deny(Principal::Role(guild_id.everyone_role()))];
        match platform.find_role_by_name(guild_id, &self.settings.staff_role).await? {
            Some(staff) => overrides.push(ReadOverride::allow(Principal::Role(staff.id))),
            None => warn!(
                event_name = "registration.staff_role_missing",
                correlation_id = %correlation_id,
                guild_id = %guild_id,
                role = %self.settings.staff_role,
                "staff role not found; ticket channel will only be visible to the member"
            ),
        }
        overrides.push(ReadOverride::allow(Principal::Member(user_id)));

        let channel_name = ticket_channel_name(name);
        let channel = platform
            .create_text_channel(
                guild_id,
                NewTextChannel { name: channel_name.clone(), category: Some(category), overrides },
            )
            .await?;
        info!(
            event_name = "registration.channel_created",
            correlation_id = %correlation_id,
            guild_id = %guild_id,
            user_id = %user_id,
            channel_id = %channel.id,
            channel_name = %channel_name,
            "created support channel"
        );

        if let Err(error) =
            platform.send_message(channel.id, &self.settings.ticket_welcome_message).await
        {
            warn!(
                event_name = "registration.welcome_failed",
                correlation_id = %correlation_id,
                channel_id = %channel.id,
                error = %error,
                "could not post welcome message into support channel"
            );
        }

        Ok((channel.id, channel_name))
    }

    async fn grant_member_role(
        &self,
        user_id: UserId,
        guild_id: GuildId,
        correlation_id: &str,
    ) -> Result<Option<RegistrationNotice>, ApplicationError> {
        let role_name = &self.settings.member_role;
        // The ticket channel already exists here; a failed lookup must not abort before the record is saved.
        let role = match self.platform.find_role_by_name(guild_id, role_name).await {
            Ok(Some(role)) => role,
            Ok(None) => {
                warn!(
                    event_name = "registration.member_role_missing",
                    correlation_id = %correlation_id,
                    guild_id = %guild_id,
                    role = %role_name,
                    "member role not found; skipping role assignment"
                );
                return Ok(None);
            }
            Err(error) => {
                warn!(
                    event_name = "registration.member_role_lookup_failed",
                    correlation_id = %correlation_id,
                    guild_id = %guild_id,
                    user_id = %user_id,
                    role = %role_name,
                    error = %error,
                    "could not look up member role; skipping role assignment"
                );
                return Ok(Some(RegistrationNotice::RoleNotGranted { role: role_name.clone() }));
            }
        };

        match self.platform.grant_role(guild_id, user_id, role.id).await {
            Ok(()) => Ok(None),
            Err(error) => {
                warn!(
                    event_name = "registration.role_not_granted",
                    correlation_id = %correlation_id,
                    guild_id = %guild_id,
                    user_id = %user_id,
                    role = %role_name,
                    error = %error,
                    "could not grant member role"
                );
                Ok(Some(RegistrationNotice::RoleNotGranted { role: role_name.clone() }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::{RegistrationAction, RegistrationNotice, RegistrationRequest, RegistrationWorkflow};
    use crate::domain::ids::{ChannelId, GuildId, UserId};
    use crate::domain::registration::RegistrationRecord;
    use crate::errors::ApplicationError;
    use crate::platform::{ChannelKind, InMemoryPlatform, PlatformCall, Principal, ReadOverride};
    use crate::registration::store::{RegistrationStore, StoreError};
    use crate::registration::{ensure_guild_setup, RegistrationSettings};

    const GUILD: GuildId = GuildId(700);
    const USER: UserId = UserId(42);

    #[derive(Default)]
    struct ScriptedStore {
        records: Mutex<HashMap<(UserId, GuildId), RegistrationRecord>>,
        reject_inserts_as_duplicate: bool,
    }

    impl ScriptedStore {
        fn snapshot(&self) -> Vec<RegistrationRecord> {
            self.records.lock().expect("store lock").values().cloned().collect()
        }
    }

    #[async_trait]
    impl RegistrationStore for ScriptedStore {
        async fn find(
            &self,
            user_id: UserId,
            guild_id: GuildId,
        ) -> Result<Option<RegistrationRecord>, StoreError> {
            Ok(self.records.lock().expect("store lock").get(&(user_id, guild_id)).cloned())
        }

        async fn insert(&self, record: &RegistrationRecord) -> Result<(), StoreError> {
            let mut records = self.records.lock().expect("store lock");
            let key = (record.user_id, record.guild_id);
            if self.reject_inserts_as_duplicate || records.contains_key(&key) {
                return Err(StoreError::Duplicate {
                    user_id: record.user_id,
                    guild_id: record.guild_id,
                });
            }
            records.insert(key, record.clone());
            Ok(())
        }

        async fn update_channel_id(
            &self,
            user_id: UserId,
            guild_id: GuildId,
            channel_id: ChannelId,
        ) -> Result<(), StoreError> {
            let mut records = self.records.lock().expect("store lock");
            let record = records
                .get_mut(&(user_id, guild_id))
                .ok_or(StoreError::Missing { user_id, guild_id })?;
            record.channel_id = channel_id;
            Ok(())
        }

        async fn list_for_guild(
            &self,
            guild_id: GuildId,
        ) -> Result<Vec<RegistrationRecord>, StoreError> {
            Ok(self
                .records
                .lock()
                .expect("store lock")
                .values()
                .filter(|record| record.guild_id == guild_id)
                .cloned()
                .collect())
        }
    }

    struct Harness {
        platform: Arc<InMemoryPlatform>,
        store: Arc<ScriptedStore>,
        workflow: RegistrationWorkflow,
    }

    async fn harness_with(store: ScriptedStore) -> Harness {
        let platform = Arc::new(InMemoryPlatform::new());
        let store = Arc::new(store);
        let settings = RegistrationSettings::default();
        ensure_guild_setup(platform.as_ref(), GUILD, &settings).await.expect("guild setup");
        platform.add_member(GUILD, USER);
        platform.clear_calls();
        let workflow = RegistrationWorkflow::new(platform.clone(), store.clone(), settings);
        Harness { platform, store, workflow }
    }

    async fn harness() -> Harness {
        harness_with(ScriptedStore::default()).await
    }

    fn request(name: &str) -> RegistrationRequest {
        RegistrationRequest {
            user_id: USER,
            guild_id: GUILD,
            raw_name: name.to_owned(),
            correlation_id: "req-test".to_owned(),
        }
    }

    fn ticket_channels(platform: &InMemoryPlatform) -> Vec<String> {
        platform
            .channels(GUILD)
            .into_iter()
            .filter(|channel| channel.kind == ChannelKind::Text)
            .map(|channel| channel.name)
            .collect()
    }

    #[tokio::test]
    async fn first_registration_creates_private_channel_and_record() {
        let h = harness().await;

        let outcome = h.workflow.register(request("Jane Doe")).await.expect("register");

        assert_eq!(outcome.action, RegistrationAction::Created);
        assert_eq!(outcome.channel_name, "ticket-jane-doe");
        assert!(outcome.notices.is_empty());
        assert_eq!(
            outcome.messages(),
            vec!["Successfully registered you to the support system!".to_owned()]
        );

        let channel = h.platform.channel(outcome.channel_id).expect("channel exists");
        let category = h
            .platform
            .channels(GUILD)
            .into_iter()
            .find(|channel| channel.kind == ChannelKind::Category)
            .expect("ticket category");
        assert_eq!(channel.parent_id, Some(category.id));

        let staff = h
            .platform
            .roles(GUILD)
            .into_iter()
            .find(|role| role.name == "Support Staff")
            .expect("staff role");
        let overrides = h.platform.overrides(outcome.channel_id);
        assert!(overrides.contains(&ReadOverride::deny(Principal::Role(GUILD.everyone_role()))));
        assert!(overrides.contains(&ReadOverride::allow(Principal::Role(staff.id))));
        assert!(overrides.contains(&ReadOverride::allow(Principal::Member(USER))));

        let member = h.platform.member(GUILD, USER).expect("member");
        assert_eq!(member.nickname.as_deref(), Some("Jane Doe"));
        let student = h
            .platform
            .roles(GUILD)
            .into_iter()
            .find(|role| role.name == "Student")
            .expect("member role");
        assert!(member.roles.contains(&student.id));

        assert_eq!(
            h.platform.messages(outcome.channel_id),
            vec![RegistrationSettings::default().ticket_welcome_message]
        );
        assert_eq!(
            h.store.snapshot(),
            vec![RegistrationRecord::new(USER, GUILD, outcome.channel_id)]
        );
    }

    #[tokio::test]
    async fn registering_again_renames_the_same_channel() {
        let h = harness().await;
        let first = h.workflow.register(request("Jane Doe")).await.expect("first");
        h.platform.clear_calls();

        let second = h.workflow.register(request("Jane Smith")).await.expect("second");

        assert_eq!(second.action, RegistrationAction::Updated);
        assert_eq!(second.channel_id, first.channel_id);
        assert_eq!(
            h.platform.channel(first.channel_id).map(|channel| channel.name),
            Some("ticket-jane-smith".to_owned())
        );
        assert_eq!(ticket_channels(&h.platform).len(), 1);
        assert!(!h
            .platform
            .calls()
            .iter()
            .any(|call| matches!(call, PlatformCall::GrantRole { .. })));
        assert_eq!(h.store.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn deleted_channel_is_recreated_and_record_repointed() {
        let h = harness().await;
        let first = h.workflow.register(request("Jane Doe")).await.expect("first");
        h.platform.delete_channel(first.channel_id);
        h.platform.clear_calls();

        let repaired = h.workflow.register(request("Jane Doe")).await.expect("repair");

        assert_eq!(repaired.action, RegistrationAction::Recreated);
        assert_ne!(repaired.channel_id, first.channel_id);
        assert_eq!(ticket_channels(&h.platform), vec!["ticket-jane-doe".to_owned()]);
        assert_eq!(
            h.store.snapshot(),
            vec![RegistrationRecord::new(USER, GUILD, repaired.channel_id)]
        );
        assert!(!h
            .platform
            .calls()
            .iter()
            .any(|call| matches!(call, PlatformCall::GrantRole { .. })));
    }

    #[tokio::test]
    async fn invalid_name_changes_nothing() {
        let h = harness().await;

        let error = h.workflow.register(request("J4ne")).await.expect_err("rejected");

        assert!(matches!(error, ApplicationError::Validation(_)));
        assert_eq!(
            error.into_interface("req-test").user_message(),
            "Names may only contain letters."
        );
        assert!(h.platform.calls().is_empty());
        assert!(h.store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn elevated_member_gets_notices_but_still_registers() {
        let h = harness().await;
        let admin = UserId(43);
        h.platform.add_elevated_member(GUILD, admin);

        let outcome = h
            .workflow
            .register(RegistrationRequest { user_id: admin, ..request("Ada Lovelace") })
            .await
            .expect("register");

        assert_eq!(outcome.action, RegistrationAction::Created);
        assert_eq!(
            outcome.notices,
            vec![
                RegistrationNotice::NicknameUnchanged,
                RegistrationNotice::RoleNotGranted { role: "Student".to_owned() },
            ]
        );
        assert_eq!(
            outcome.messages(),
            vec![
                "Could not change your nickname (does not work for admins).".to_owned(),
                "Could not give you Student role (does not work for administrators)."
                    .to_owned(),
                "Successfully registered you to the support system!".to_owned(),
            ]
        );
        assert_eq!(h.store.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn unknown_member_is_reported_missing() {
        let h = harness().await;

        let error = h
            .workflow
            .register(RegistrationRequest { user_id: UserId(9999), ..request("Jane") })
            .await
            .expect_err("missing member");

        assert!(matches!(error, ApplicationError::MissingEntity(_)));
        assert!(h.store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn concurrent_insert_reports_already_registered() {
        let h = harness_with(ScriptedStore {
            reject_inserts_as_duplicate: true,
            ..ScriptedStore::default()
        })
        .await;

        let outcome = h.workflow.register(request("Jane")).await.expect("register");

        assert_eq!(outcome.action, RegistrationAction::AlreadyRegistered);
        assert_eq!(
            outcome.messages(),
            vec!["You are already registered to the support system.".to_owned()]
        );
    }

    #[tokio::test]
    async fn repeated_registrations_keep_one_record_and_one_channel() {
        let h = harness().await;
        for name in ["Jane", "Jane Doe", "Jane  Q  Doe", "jane"] {
            h.workflow.register(request(name)).await.expect("register");
        }

        assert_eq!(h.store.snapshot().len(), 1);
        assert_eq!(ticket_channels(&h.platform), vec!["ticket-jane".to_owned()]);
    }

    #[tokio::test]
    async fn missing_member_role_skips_grant_without_notice() {
        let platform = Arc::new(InMemoryPlatform::new());
        platform.add_member(GUILD, USER);
        let store = Arc::new(ScriptedStore::default());
        let workflow =
            RegistrationWorkflow::new(platform.clone(), store.clone(), RegistrationSettings::default());

        let outcome = workflow.register(request("Jane")).await.expect("register");

        assert_eq!(outcome.action, RegistrationAction::Created);
        assert!(outcome.notices.is_empty());
        assert_eq!(
            platform.overrides(outcome.channel_id),
            vec![
                ReadOverride::deny(Principal::Role(GUILD.everyone_role())),
                ReadOverride::allow(Principal::Member(USER)),
            ]
        );
    }

    #[tokio::test]
    async fn role_lookup_blip_after_channel_creation_still_saves_the_record() {
        let h = harness().await;
        // The first listing serves the staff overwrite, the second the member role lookup.
        h.platform.fail_role_listings_after(1);

        let outcome = h.workflow.register(request("Jane Doe")).await.expect("register");

        assert_eq!(outcome.action, RegistrationAction::Created);
        assert_eq!(
            outcome.notices,
            vec![RegistrationNotice::RoleNotGranted { role: "Student".to_owned() }]
        );
        assert_eq!(ticket_channels(&h.platform), vec!["ticket-jane-doe".to_owned()]);
        let records = h.store.snapshot();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].channel_id, outcome.channel_id);
    }

    #[tokio::test]
    async fn transport_failure_surfaces_as_platform_error() {
        let h = harness().await;
        h.platform.set_offline(true);

        let error = h.workflow.register(request("Jane")).await.expect_err("offline");

        assert!(matches!(error, ApplicationError::Platform(_)));
        assert!(h.store.snapshot().is_empty());
    }
}
