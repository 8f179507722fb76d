pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "echobot",
    about = "Echobot operator CLI",
    long_about = "Inspect echobot configuration, check Discord readiness, and preview echo replies offline.",
    after_help = "Examples:\n  echobot doctor --json\n  echobot config\n  echobot echo '!echo hello world'"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run startup preflight checks and return structured status output")]
    Start,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, token format, and Discord authentication")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Show the reply the bot would send for a message, without connecting")]
    Echo {
        #[arg(help = "Message content to evaluate, e.g. '!echo hello'")]
        content: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Start => commands::start::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Echo { content } => commands::echo::run(&content),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
