use serde_json::json;

use supportdesk_core::domain::ids::{GuildId, UserId};
use supportdesk_core::domain::registration::RegistrationRecord;
use supportdesk_db::{RepositoryError, SqlRegistrationRepository};

use crate::commands::{load_config, open_pool, runtime, CommandResult, StepFailure, EXIT_DATABASE};

/// Prints the registrations of a guild, or of one member in it.
pub fn run(guild_id: u64, user_id: Option<u64>) -> CommandResult {
    let guild_id = GuildId(guild_id);
    let user_id = user_id.map(UserId);

    let result = load_config().and_then(|config| {
        runtime()?.block_on(async {
            let pool = open_pool(&config).await?;
            let repository = SqlRegistrationRepository::new(pool.clone());
            let records = fetch(&repository, guild_id, user_id).await;
            pool.close().await;
            records.map_err(|error| StepFailure {
                error_class: "db_query",
                message: format!(
                    "registration lookup failed: {error} (run `supportdesk migrate` first?)"
                ),
                exit_code: EXIT_DATABASE,
            })
        })
    });

    match result {
        Ok(records) => {
            let message = match (user_id, records.len()) {
                (Some(user_id), 0) => {
                    format!("user {user_id} is not registered in guild {guild_id}")
                }
                (Some(user_id), _) => format!("user {user_id} is registered in guild {guild_id}"),
                (None, count) => format!("{count} registration(s) in guild {guild_id}"),
            };
            CommandResult::success_with_data("lookup", message, Some(json!({ "records": records })))
        }
        Err(failure) => failure.into_result("lookup"),
    }
}

async fn fetch(
    repository: &SqlRegistrationRepository,
    guild_id: GuildId,
    user_id: Option<UserId>,
) -> Result<Vec<RegistrationRecord>, RepositoryError> {
    match user_id {
        Some(user_id) => Ok(repository.find(user_id, guild_id).await?.into_iter().collect()),
        None => repository.list_for_guild(guild_id).await,
    }
}
