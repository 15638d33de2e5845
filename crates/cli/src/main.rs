use std::process::ExitCode;

fn main() -> ExitCode {
    groupbid_cli::run()
}
