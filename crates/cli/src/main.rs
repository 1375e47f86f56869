use std::process::ExitCode;

fn main() -> ExitCode {
    merryway_cli::run()
}
