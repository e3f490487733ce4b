use supportdesk_db::migrations;

use crate::commands::{load_config, open_pool, runtime, CommandResult, StepFailure, EXIT_MIGRATION};

pub fn run() -> CommandResult {
    let result = load_config().and_then(|config| {
        runtime()?.block_on(async {
            let pool = open_pool(&config).await?;
            let applied = migrations::run_pending(&pool).await.map_err(|error| StepFailure {
                error_class: "migration",
                message: error.to_string(),
                exit_code: EXIT_MIGRATION,
            });
            pool.close().await;
            applied
        })
    });

    match result {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err(failure) => failure.into_result("migrate"),
    }
}
