use std::io::Read;

use rusqlite::Connection;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::db;
use crate::error::{BankreaderError, Result};
use crate::models::{Account, AccountStatement, Transaction};
use crate::readers::Reader;
use crate::registry::ReaderRegistry;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn compute_checksum(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    hex::encode(hasher.finalize())
}

fn duplicate_message(t: &Transaction, account: &Account) -> String {
    format!(
        "Transaction \"{}\" already exists in account \"{}\".",
        t.transaction_id, account.name
    )
}

/// The reader configured for `account`.
pub fn reader_for<'r>(registry: &'r ReaderRegistry, account: &Account) -> Result<&'r dyn Reader> {
    let key = account.reader.as_deref().ok_or_else(|| {
        BankreaderError::Configuration(format!(
            "Account \"{}\" has no statement format configured",
            account.name
        ))
    })?;
    registry.get(key).ok_or_else(|| {
        BankreaderError::Configuration(format!(
            "Statement format \"{key}\" of account \"{}\" is not registered",
            account.name
        ))
    })
}

// ---------------------------------------------------------------------------
// import_statement
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ImportResult {
    pub statement: AccountStatement,
    /// One line per transaction skipped because it was already stored.
    pub messages: Vec<String>,
    /// Transactions found in the statement, stored or not.
    pub total: usize,
}

impl ImportResult {
    pub fn inserted(&self) -> usize {
        self.total - self.messages.len()
    }
}

/// Parse `source` with the account's reader and store it as one statement.
///
/// Everything is written in a single database transaction. Each record gets
/// its own savepoint so a record that is already stored for the account is
/// skipped and reported in `messages` while the rest of the statement goes in.
/// Any other failure rolls the whole statement back.
pub fn import_statement(
    conn: &mut Connection,
    registry: &ReaderRegistry,
    account: &Account,
    label: &str,
    source: &mut dyn Read,
) -> Result<ImportResult> {
    let reader = reader_for(registry, account)?;

    let mut body = Vec::new();
    source.read_to_end(&mut body)?;
    let checksum = compute_checksum(&body);
    if db::statement_checksum_exists(conn, account.id, &checksum)? {
        warn!(
            statement = label,
            account = account.name.as_str(),
            "identical statement was imported before"
        );
    }

    let parse_error = |source| BankreaderError::Parse {
        reader: reader.label().to_string(),
        source,
    };
    let transactions: Vec<Transaction> = reader
        .read_file(&mut body.as_slice())
        .map_err(parse_error)?
        .collect::<std::result::Result<_, _>>()
        .map_err(parse_error)?;
    debug!(count = transactions.len(), reader = reader.label(), "parsed statement");

    let dates = transactions.iter().map(|t| t.accounted_date);
    let (Some(from_date), Some(to_date)) = (dates.clone().min(), dates.max()) else {
        return Err(BankreaderError::EmptyStatement(label.to_string()));
    };

    let mut tx = conn.transaction()?;
    let statement_id = db::insert_statement(&tx, account.id, label, from_date, to_date, &checksum)?;

    let mut messages = Vec::new();
    for t in &transactions {
        let savepoint = tx.savepoint()?;
        match db::insert_transaction(&savepoint, account.id, statement_id, t) {
            Ok(()) => savepoint.commit()?,
            // Dropping the savepoint rolls the row back.
            Err(e) if db::is_unique_violation(&e) => {
                let message = duplicate_message(t, account);
                debug!("{message}");
                messages.push(message);
            }
            Err(e) => return Err(e.into()),
        }
    }
    tx.commit()?;

    let result = ImportResult {
        statement: AccountStatement {
            id: statement_id,
            account_id: account.id,
            statement: label.to_string(),
            from_date,
            to_date,
            checksum: Some(checksum),
        },
        messages,
        total: transactions.len(),
    };
    info!(
        statement = label,
        account = account.name.as_str(),
        total = result.total,
        inserted = result.inserted(),
        "statement imported"
    );
    Ok(result)
}
