use thiserror::Error;

use crate::readers::ParseError;

#[derive(Error, Debug)]
pub enum BankreaderError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Account \"{0}\" does not exist")]
    UnknownAccount(String),

    #[error("Account \"{0}\" is ambiguous")]
    AmbiguousAccount(String),

    #[error("Unknown statement format: {0}")]
    UnknownReader(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to read transaction data in format {reader}: {source}")]
    Parse {
        reader: String,
        #[source]
        source: ParseError,
    },

    #[error("The account statement \"{0}\" doesn't contain any transaction data.")]
    EmptyStatement(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, BankreaderError>;
