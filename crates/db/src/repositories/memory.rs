use std::collections::BTreeMap;

use tokio::sync::RwLock;

use supportdesk_core::domain::ids::{ChannelId, GuildId, UserId};
use supportdesk_core::domain::registration::RegistrationRecord;
use supportdesk_core::registration::{RegistrationStore, StoreError};

/// Keyed by insertion sequence so `list_for_guild` matches the SQL ordering.
#[derive(Default)]
pub struct InMemoryRegistrationRepository {
    records: RwLock<BTreeMap<u64, RegistrationRecord>>,
    next_id: RwLock<u64>,
}

impl InMemoryRegistrationRepository {
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl RegistrationStore for InMemoryRegistrationRepository {
    async fn find(
        &self,
        user_id: UserId,
        guild_id: GuildId,
    ) -> Result<Option<RegistrationRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|record| record.user_id == user_id && record.guild_id == guild_id)
            .cloned())
    }

    async fn insert(&self, record: &RegistrationRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let taken = records
            .values()
            .any(|stored| stored.user_id == record.user_id && stored.guild_id == record.guild_id);
        if taken {
            return Err(StoreError::Duplicate { user_id: record.user_id, guild_id: record.guild_id });
        }

        let mut next_id = self.next_id.write().await;
        *next_id += 1;
        records.insert(*next_id, record.clone());
        Ok(())
    }

    async fn update_channel_id(
        &self,
        user_id: UserId,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .values_mut()
            .find(|record| record.user_id == user_id && record.guild_id == guild_id)
            .ok_or(StoreError::Missing { user_id, guild_id })?;
        record.channel_id = channel_id;
        Ok(())
    }

    async fn list_for_guild(
        &self,
        guild_id: GuildId,
    ) -> Result<Vec<RegistrationRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records.values().filter(|record| record.guild_id == guild_id).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use supportdesk_core::domain::ids::{ChannelId, GuildId, UserId};
    use supportdesk_core::domain::registration::RegistrationRecord;
    use supportdesk_core::registration::{RegistrationStore, StoreError};

    use crate::repositories::InMemoryRegistrationRepository;

    #[tokio::test]
    async fn in_memory_repo_enforces_one_record_per_pair() {
        let repo = InMemoryRegistrationRepository::default();
        let record = RegistrationRecord::new(UserId(1), GuildId(2), ChannelId(3));

        repo.insert(&record).await.expect("insert");
        let duplicate = repo.insert(&record.clone().with_channel(ChannelId(4))).await;

        assert_eq!(duplicate, Err(StoreError::Duplicate { user_id: UserId(1), guild_id: GuildId(2) }));
        assert_eq!(repo.len().await, 1);
        assert_eq!(repo.find(UserId(1), GuildId(2)).await.expect("find"), Some(record));
    }

    #[tokio::test]
    async fn in_memory_repo_repoints_channel() {
        let repo = InMemoryRegistrationRepository::default();
        repo.insert(&RegistrationRecord::new(UserId(1), GuildId(2), ChannelId(3)))
            .await
            .expect("insert");

        repo.update_channel_id(UserId(1), GuildId(2), ChannelId(30)).await.expect("update");

        assert_eq!(repo.channel_id(UserId(1), GuildId(2)).await.expect("lookup"), Some(ChannelId(30)));
        assert_eq!(
            repo.update_channel_id(UserId(9), GuildId(2), ChannelId(1)).await,
            Err(StoreError::Missing { user_id: UserId(9), guild_id: GuildId(2) })
        );
    }
}
