pub mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use groupbid_core::config::{AppConfig, LoadOptions, LogFormat};

use crate::commands::negotiate::NegotiateCommand;
use crate::commands::quotes::QuotesCommand;

#[derive(Debug, Parser)]
#[command(
    name = "groupbid",
    about = "Groupbid operator CLI",
    long_about = "Run collective-vs-supplier negotiations and quote simulations against the local store.",
    after_help = "Examples:\n  groupbid migrate\n  groupbid seed\n  groupbid negotiate offer --negotiation 1 --actor collective --pmpm 470\n  groupbid quotes simulate --collective 1"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo collectives, suppliers and negotiation")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(subcommand, about = "Start, advance and inspect negotiations")]
    Negotiate(NegotiateCommand),
    #[command(subcommand, about = "Simulate and compare supplier quotes for a collective")]
    Quotes(QuotesCommand),
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    if let Ok(config) = AppConfig::load(LoadOptions::default()) {
        init_logging(&config);
    }

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => commands::config::run(),
        Command::Negotiate(command) => commands::negotiate::run(command),
        Command::Quotes(command) => commands::quotes::run(command),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr; stdout carries only the command payload.
fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let installed = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if installed.is_err() {
        eprintln!("logging was already initialized; keeping the existing subscriber");
    }
}
