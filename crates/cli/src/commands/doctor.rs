use secrecy::ExposeSecret;
use serde::Serialize;
use supportdesk_core::config::AppConfig;

use crate::commands::{load_config, open_pool, runtime, CommandResult, EXIT_CONFIG, EXIT_DATABASE};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    fn check_failed(&self, name: &str) -> bool {
        self.checks.iter().any(|check| check.name == name && check.status == CheckStatus::Fail)
    }

    /// Config problems take precedence; they also cause the remaining checks to be skipped.
    fn exit_code(&self) -> u8 {
        if self.check_failed("config_validation") || self.check_failed("discord_token_readiness") {
            EXIT_CONFIG
        } else if self.check_failed("database_connectivity") {
            EXIT_DATABASE
        } else {
            0
        }
    }
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = report.exit_code();

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match load_config() {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_discord_token(&config));
            checks.push(check_database_connectivity(&config));
        }
        Err(failure) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: failure.message,
            });
            for name in ["discord_token_readiness", "database_connectivity"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_discord_token(config: &AppConfig) -> DoctorCheck {
    let token = config.discord.bot_token.expose_secret().trim();
    let segments: Vec<&str> = token.split('.').collect();
    let well_formed = segments.len() == 3 && segments.iter().all(|segment| !segment.is_empty());

    if !well_formed {
        return DoctorCheck {
            name: "discord_token_readiness",
            status: CheckStatus::Fail,
            details: "bot token should have three dot-separated segments".to_string(),
        };
    }

    let details = match config.discord.application_id {
        Some(application_id) => {
            format!("token is well formed; application id {application_id} configured")
        }
        None => "token is well formed; application id is not configured".to_string(),
    };
    DoctorCheck { name: "discord_token_readiness", status: CheckStatus::Pass, details }
}

fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    let result = runtime().and_then(|runtime| {
        runtime.block_on(async {
            let pool = open_pool(config).await?;
            pool.close().await;
            Ok(())
        })
    });

    match result {
        Ok(()) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: format!("connected using `{}`", config.database.url),
        },
        Err(failure) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Fail,
            details: failure.message,
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
