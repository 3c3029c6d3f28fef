use std::process::ExitCode;

fn main() -> ExitCode {
    coreflow_cli::run()
}
