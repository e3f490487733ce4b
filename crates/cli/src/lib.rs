pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "supportdesk",
    about = "Supportdesk operator CLI",
    long_about = "Inspect configuration, check readiness, apply migrations, and look up member registrations.",
    after_help = "Examples:\n  supportdesk doctor --json\n  supportdesk config\n  supportdesk lookup --guild 123 --user 456"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, Discord token readiness, and DB connectivity checks")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "List registrations of a guild, or the registration of one member")]
    Lookup {
        #[arg(long, help = "Guild (server) snowflake id")]
        guild: u64,
        #[arg(long, help = "Restrict the lookup to one member")]
        user: Option<u64>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Lookup { guild, user } => commands::lookup::run(guild, user),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn parses_lookup_with_optional_user() {
        let cli = Cli::parse_from(["supportdesk", "lookup", "--guild", "42"]);
        assert!(matches!(cli.command, Command::Lookup { guild: 42, user: None }));

        let cli = Cli::parse_from(["supportdesk", "lookup", "--guild", "42", "--user", "7"]);
        assert!(matches!(cli.command, Command::Lookup { guild: 42, user: Some(7) }));
    }

    #[test]
    fn lookup_requires_a_guild() {
        assert!(Cli::try_parse_from(["supportdesk", "lookup"]).is_err());
    }
}
