use std::process::ExitCode;

fn main() -> ExitCode {
    echobot_cli::run()
}
