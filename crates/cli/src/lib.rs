pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "merryway",
    about = "Merry's way assistant operator CLI",
    long_about = "Inspect configuration, check readiness, and run single chat requests against the assistant.",
    after_help = "Examples:\n  merryway doctor --json\n  merryway config\n  merryway ask payload.json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, credentials, and recommendation data readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Dispatch one chat payload file and print the response envelope")]
    Ask {
        #[arg(help = "Path to a JSON file shaped like {\"input\": {\"messages\": [...]}}")]
        file: PathBuf,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Ask { file } => commands::ask::run(&file),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
