use thiserror::Error;

use supportdesk_core::domain::ids::{GuildId, UserId};
use supportdesk_core::registration::StoreError;

pub mod memory;
pub mod registration;

pub use memory::InMemoryRegistrationRepository;
pub use registration::SqlRegistrationRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("user {user_id} is already registered in guild {guild_id}")]
    Conflict { user_id: UserId, guild_id: GuildId },
    #[error("no registration for user {user_id} in guild {guild_id}")]
    NotFound { user_id: UserId, guild_id: GuildId },
}

impl From<RepositoryError> for StoreError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Conflict { user_id, guild_id } => {
                StoreError::Duplicate { user_id, guild_id }
            }
            RepositoryError::NotFound { user_id, guild_id } => {
                StoreError::Missing { user_id, guild_id }
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}
