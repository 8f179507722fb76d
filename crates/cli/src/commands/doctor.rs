use echobot_core::config::{validate_token_format, AppConfig, LoadOptions};
use echobot_discord::client::SerenityChannels;
use secrecy::ExposeSecret;
use serde::Serialize;

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

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            let token_check = check_token_format(&config);
            let token_ok = token_check.status == CheckStatus::Pass;
            checks.push(token_check);
            if token_ok {
                checks.push(check_discord_authentication(&config));
            } else {
                checks.push(skipped("discord_authentication", "token format check failed"));
            }
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(skipped("token_format", "configuration did not load"));
            checks.push(skipped("discord_authentication", "configuration did not load"));
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

fn skipped(name: &'static str, reason: &str) -> DoctorCheck {
    DoctorCheck {
        name,
        status: CheckStatus::Skipped,
        details: format!("skipped because {reason}"),
    }
}

fn check_token_format(config: &AppConfig) -> DoctorCheck {
    match validate_token_format(config.discord.token.expose_secret()) {
        Ok(()) => DoctorCheck {
            name: "token_format",
            status: CheckStatus::Pass,
            details: "token has the three-segment bot token shape".to_string(),
        },
        Err(error) => DoctorCheck {
            name: "token_format",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_discord_authentication(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "discord_authentication",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let channels = SerenityChannels::from_token(&config.discord.token);
    let result = runtime.block_on(async { channels.http().get_current_user().await });

    match result {
        Ok(user) => DoctorCheck {
            name: "discord_authentication",
            status: CheckStatus::Pass,
            details: format!("authenticated as `{}` ({})", user.name, user.id),
        },
        Err(error) => DoctorCheck {
            name: "discord_authentication",
            status: CheckStatus::Fail,
            details: format!("discord rejected the token: {error}"),
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
