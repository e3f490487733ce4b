use sqlx::Row;

use supportdesk_core::domain::ids::{ChannelId, GuildId, UserId};
use supportdesk_core::domain::registration::RegistrationRecord;
use supportdesk_core::registration::{RegistrationStore, StoreError};

use super::RepositoryError;
use crate::DbPool;

/// `registered_users` table. Snowflakes are stored as SQLite INTEGER; ids
/// above `i64::MAX` are rejected instead of wrapping.
pub struct SqlRegistrationRepository {
    pool: DbPool,
}

impl SqlRegistrationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find(
        &self,
        user_id: UserId,
        guild_id: GuildId,
    ) -> Result<Option<RegistrationRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT user_id, guild_id, support_channel_id
             FROM registered_users WHERE user_id = ? AND guild_id = ?",
        )
        .bind(to_db_id(user_id.get())?)
        .bind(to_db_id(guild_id.get())?)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    pub async fn insert(&self, record: &RegistrationRecord) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO registered_users (user_id, guild_id, support_channel_id)
             VALUES (?, ?, ?)",
        )
        .bind(to_db_id(record.user_id.get())?)
        .bind(to_db_id(record.guild_id.get())?)
        .bind(to_db_id(record.channel_id.get())?)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(error)) if error.is_unique_violation() => {
                Err(RepositoryError::Conflict { user_id: record.user_id, guild_id: record.guild_id })
            }
            Err(error) => Err(error.into()),
        }
    }

    pub async fn update_channel_id(
        &self,
        user_id: UserId,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE registered_users SET support_channel_id = ?
             WHERE user_id = ? AND guild_id = ?",
        )
        .bind(to_db_id(channel_id.get())?)
        .bind(to_db_id(user_id.get())?)
        .bind(to_db_id(guild_id.get())?)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound { user_id, guild_id });
        }
        Ok(())
    }

    pub async fn list_for_guild(
        &self,
        guild_id: GuildId,
    ) -> Result<Vec<RegistrationRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT user_id, guild_id, support_channel_id
             FROM registered_users WHERE guild_id = ? ORDER BY id",
        )
        .bind(to_db_id(guild_id.get())?)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM registered_users")
            .fetch_one(&self.pool)
            .await?;
        row.try_get("count").map_err(|e| RepositoryError::Decode(e.to_string()))
    }
}

fn to_db_id(value: u64) -> Result<i64, RepositoryError> {
    i64::try_from(value)
        .map_err(|_| RepositoryError::Decode(format!("snowflake {value} exceeds INTEGER range")))
}

fn from_db_id(column: &str, value: i64) -> Result<u64, RepositoryError> {
    u64::try_from(value)
        .map_err(|_| RepositoryError::Decode(format!("negative snowflake in `{column}`: {value}")))
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<RegistrationRecord, RepositoryError> {
    let read = |column: &str| -> Result<u64, RepositoryError> {
        let value: i64 = row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))?;
        from_db_id(column, value)
    };

    Ok(RegistrationRecord {
        user_id: UserId(read("user_id")?),
        guild_id: GuildId(read("guild_id")?),
        channel_id: ChannelId(read("support_channel_id")?),
    })
}

#[async_trait::async_trait]
impl RegistrationStore for SqlRegistrationRepository {
    async fn find(
        &self,
        user_id: UserId,
        guild_id: GuildId,
    ) -> Result<Option<RegistrationRecord>, StoreError> {
        Ok(SqlRegistrationRepository::find(self, user_id, guild_id).await?)
    }

    async fn insert(&self, record: &RegistrationRecord) -> Result<(), StoreError> {
        Ok(SqlRegistrationRepository::insert(self, record).await?)
    }

    async fn update_channel_id(
        &self,
        user_id: UserId,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<(), StoreError> {
        Ok(SqlRegistrationRepository::update_channel_id(self, user_id, guild_id, channel_id).await?)
    }

    async fn list_for_guild(
        &self,
        guild_id: GuildId,
    ) -> Result<Vec<RegistrationRecord>, StoreError> {
        Ok(SqlRegistrationRepository::list_for_guild(self, guild_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use supportdesk_core::domain::ids::{ChannelId, GuildId, UserId};
    use supportdesk_core::domain::registration::RegistrationRecord;
    use supportdesk_core::registration::{RegistrationStore, StoreError};

    use super::SqlRegistrationRepository;
    use crate::repositories::RepositoryError;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> SqlRegistrationRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlRegistrationRepository::new(pool)
    }

    fn record(user: u64, guild: u64, channel: u64) -> RegistrationRecord {
        RegistrationRecord::new(UserId(user), GuildId(guild), ChannelId(channel))
    }

    #[tokio::test]
    async fn insert_then_query_by_pair() {
        let repo = setup().await;
        let stored = record(281_474_976_710_656, 900_000_000_000_000_001, 42);

        assert!(!repo.is_registered(stored.user_id, stored.guild_id).await.expect("lookup"));
        RegistrationStore::insert(&repo, &stored).await.expect("insert");

        assert!(repo.is_registered(stored.user_id, stored.guild_id).await.expect("lookup"));
        assert_eq!(
            repo.channel_id(stored.user_id, stored.guild_id).await.expect("channel"),
            Some(ChannelId(42))
        );
        assert_eq!(
            RegistrationStore::find(&repo, stored.user_id, GuildId(1)).await.expect("other guild"),
            None
        );
    }

    #[tokio::test]
    async fn second_insert_for_pair_is_a_duplicate() {
        let repo = setup().await;
        RegistrationStore::insert(&repo, &record(1, 2, 3)).await.expect("first insert");

        let error = RegistrationStore::insert(&repo, &record(1, 2, 4)).await.expect_err("dup");

        assert_eq!(error, StoreError::Duplicate { user_id: UserId(1), guild_id: GuildId(2) });
        assert_eq!(repo.count().await.expect("count"), 1);
        assert_eq!(repo.channel_id(UserId(1), GuildId(2)).await.expect("channel"), Some(ChannelId(3)));
    }

    #[tokio::test]
    async fn same_user_may_register_in_several_guilds() {
        let repo = setup().await;
        RegistrationStore::insert(&repo, &record(1, 2, 3)).await.expect("guild 2");
        RegistrationStore::insert(&repo, &record(1, 5, 6)).await.expect("guild 5");

        assert_eq!(repo.count().await.expect("count"), 2);
    }

    #[tokio::test]
    async fn update_channel_id_repoints_existing_record() {
        let repo = setup().await;
        RegistrationStore::insert(&repo, &record(1, 2, 3)).await.expect("insert");

        RegistrationStore::update_channel_id(&repo, UserId(1), GuildId(2), ChannelId(99))
            .await
            .expect("update");

        assert_eq!(repo.channel_id(UserId(1), GuildId(2)).await.expect("channel"), Some(ChannelId(99)));
    }

    #[tokio::test]
    async fn update_channel_id_for_unknown_pair_is_missing() {
        let repo = setup().await;

        let error = RegistrationStore::update_channel_id(&repo, UserId(7), GuildId(8), ChannelId(9))
            .await
            .expect_err("missing");

        assert_eq!(error, StoreError::Missing { user_id: UserId(7), guild_id: GuildId(8) });
    }

    #[tokio::test]
    async fn list_for_guild_returns_insertion_order() {
        let repo = setup().await;
        for (user, channel) in [(10, 100), (11, 101), (12, 102)] {
            RegistrationStore::insert(&repo, &record(user, 2, channel)).await.expect("insert");
        }
        RegistrationStore::insert(&repo, &record(13, 3, 103)).await.expect("other guild");

        let listed = RegistrationStore::list_for_guild(&repo, GuildId(2)).await.expect("list");

        assert_eq!(listed, vec![record(10, 2, 100), record(11, 2, 101), record(12, 2, 102)]);
    }

    #[tokio::test]
    async fn snowflakes_above_integer_range_are_rejected() {
        let repo = setup().await;

        let error = SqlRegistrationRepository::insert(&repo, &record(u64::MAX, 2, 3))
            .await
            .expect_err("out of range");

        assert!(matches!(error, RepositoryError::Decode(_)));
    }
}
