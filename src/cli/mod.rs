pub mod accounts;
pub mod completions;
pub mod import;
pub mod init;
pub mod readers;
pub mod statements;
pub mod transactions;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use rusqlite::Connection;

use crate::db::get_connection;
use crate::error::{BankreaderError, Result};
use crate::registry::ReaderRegistry;
use crate::settings::{get_db_path, load_settings};

/// Open the ledger database, which `bankreader init` must have created.
pub(crate) fn open_db() -> Result<Connection> {
    let path = get_db_path()?;
    if !path.exists() {
        return Err(BankreaderError::Other(format!(
            "Database {} not found. Run `bankreader init` to set up.",
            path.display()
        )));
    }
    get_connection(&path)
}

/// Built-in readers plus the CSV formats from the settings file.
pub(crate) fn load_registry() -> Result<ReaderRegistry> {
    ReaderRegistry::from_configs(&load_settings()?.csv_readers)
}

#[derive(Parser)]
#[command(
    name = "bankreader",
    version,
    about = "Reads bank account statements (Best, GPC, CSV, MT940) into a local ledger."
)]
pub struct Cli {
    /// Log level: error, warn, info, debug, trace (default: log_level setting, else warn)
    #[arg(long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for bankreader data (default: ~/Documents/bankreader)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Manage accounts.
    Accounts {
        #[command(subcommand)]
        command: AccountsCommands,
    },
    /// List the statement formats that can be assigned to accounts.
    Readers,
    /// Load statement files into an account.
    Import {
        /// Account id, name or IBAN
        #[arg(long)]
        account: String,
        /// Statement files, plain or zipped
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List imported statements.
    Statements {
        /// Account id, name or IBAN
        #[arg(long)]
        account: Option<String>,
    },
    /// List stored transactions.
    Transactions {
        /// Account id, name or IBAN
        #[arg(long)]
        account: Option<String>,
        /// Only incoming payments
        #[arg(long, conflicts_with = "debit")]
        credit: bool,
        /// Only outgoing payments
        #[arg(long)]
        debit: bool,
    },
    /// Print a shell completion script.
    Completions {
        /// Target shell
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum AccountsCommands {
    /// Add a new account.
    Add {
        /// Account name, e.g. 'Main CZK'
        name: String,
        /// International bank account number
        #[arg(long)]
        iban: Option<String>,
        /// Bank identifier code
        #[arg(long)]
        bic: Option<String>,
        /// Statement format key (see `bankreader readers`)
        #[arg(long)]
        reader: Option<String>,
    },
    /// List all accounts.
    List,
    /// Assign a statement format to an account.
    SetReader {
        /// Account name
        name: String,
        /// Statement format key
        reader: String,
    },
}
