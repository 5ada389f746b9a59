mod archive;
mod cli;
mod db;
mod error;
mod importer;
mod models;
mod mt940;
mod readers;
mod registry;
mod settings;

use std::io::stderr;

use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

use cli::{AccountsCommands, Cli, Commands};

fn parse_log_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "off" => LevelFilter::OFF,
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        _ => {
            eprintln!("Invalid log level '{level}', defaulting to 'warn'");
            LevelFilter::WARN
        }
    }
}

fn setup_logging(level: LevelFilter) {
    // stdout carries command output, so logs go to stderr
    let terminal_log = fmt::layer()
        .with_target(false)
        .with_writer(stderr)
        .with_filter(level);

    tracing_subscriber::registry().with(terminal_log).init();
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.log_level.as_deref() {
        Some(level) => level.to_string(),
        None => settings::load_settings()
            .map(|s| s.log_level)
            .unwrap_or_else(|_| "warn".to_string()),
    };
    setup_logging(parse_log_level(&level));

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Accounts { command } => match command {
            AccountsCommands::Add { name, iban, bic, reader } => {
                cli::accounts::add(&name, iban.as_deref(), bic.as_deref(), reader.as_deref())
            }
            AccountsCommands::List => cli::accounts::list(),
            AccountsCommands::SetReader { name, reader } => cli::accounts::set_reader(&name, &reader),
        },
        Commands::Readers => cli::readers::run(),
        Commands::Import { account, files } => cli::import::run(&account, &files),
        Commands::Statements { account } => cli::statements::run(account.as_deref()),
        Commands::Transactions { account, credit, debit } => {
            cli::transactions::run(account.as_deref(), credit, debit)
        }
        Commands::Completions { shell } => cli::completions::run(shell),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
