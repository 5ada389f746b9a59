use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use rust_decimal::Decimal;

use crate::error::{BankreaderError, Result};
use crate::models::{Account, AccountStatement, StoredTransaction, Transaction};

pub const DB_FILE: &str = "bankreader.db";

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    iban TEXT,
    bic TEXT,
    reader TEXT,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS account_statements (
    id INTEGER PRIMARY KEY,
    account_id INTEGER NOT NULL,
    statement TEXT NOT NULL,
    from_date TEXT NOT NULL,
    to_date TEXT NOT NULL,
    checksum TEXT,
    imported_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (account_id) REFERENCES accounts(id)
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    account_id INTEGER NOT NULL,
    account_statement_id INTEGER NOT NULL,
    transaction_id TEXT NOT NULL,
    entry_date TEXT NOT NULL,
    accounted_date TEXT NOT NULL,
    remote_account_number TEXT NOT NULL DEFAULT '',
    remote_account_name TEXT NOT NULL DEFAULT '',
    amount TEXT NOT NULL,
    variable_symbol INTEGER NOT NULL DEFAULT 0,
    constant_symbol INTEGER NOT NULL DEFAULT 0,
    specific_symbol INTEGER NOT NULL DEFAULT 0,
    sender_description TEXT NOT NULL DEFAULT '',
    recipient_description TEXT NOT NULL DEFAULT '',
    UNIQUE (account_id, transaction_id),
    FOREIGN KEY (account_id) REFERENCES accounts(id),
    FOREIGN KEY (account_statement_id) REFERENCES account_statements(id)
);

CREATE INDEX IF NOT EXISTS idx_transactions_accounted_date ON transactions(accounted_date);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// True for a violated UNIQUE constraint, the only failure the importer tolerates.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

const ACCOUNT_COLUMNS: &str = "id, name, iban, bic, reader";

fn account_from_row(row: &Row) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        name: row.get(1)?,
        iban: row.get(2)?,
        bic: row.get(3)?,
        reader: row.get(4)?,
    })
}

pub fn insert_account(
    conn: &Connection,
    name: &str,
    iban: Option<&str>,
    bic: Option<&str>,
    reader: Option<&str>,
) -> Result<Account> {
    conn.execute(
        "INSERT INTO accounts (name, iban, bic, reader) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![name, iban, bic, reader],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            BankreaderError::Other(format!("Account \"{name}\" already exists"))
        } else {
            e.into()
        }
    })?;
    Ok(Account {
        id: conn.last_insert_rowid(),
        name: name.to_string(),
        iban: iban.map(str::to_string),
        bic: bic.map(str::to_string),
        reader: reader.map(str::to_string),
    })
}

pub fn list_accounts(conn: &Connection) -> Result<Vec<Account>> {
    let mut stmt = conn.prepare(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY name"))?;
    let rows = stmt
        .query_map([], account_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_account_by_name(conn: &Connection, name: &str) -> Result<Option<Account>> {
    let account = conn
        .query_row(
            &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE name = ?1"),
            [name],
            account_from_row,
        )
        .optional()?;
    Ok(account)
}

/// Find the account a statement is loaded into. `query` is an account id when
/// numeric, otherwise a name or IBAN. Accounts without a reader never match.
pub fn resolve_account(conn: &Connection, query: &str) -> Result<Account> {
    let matches: Vec<Account> = if let Ok(id) = query.parse::<i64>() {
        let mut stmt = conn.prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1 AND reader IS NOT NULL"
        ))?;
        let rows = stmt
            .query_map([id], account_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows
    } else {
        let mut stmt = conn.prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE (name = ?1 OR iban = ?1) AND reader IS NOT NULL"
        ))?;
        let rows = stmt
            .query_map([query], account_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows
    };

    let mut matches = matches.into_iter();
    match (matches.next(), matches.next()) {
        (Some(account), None) => Ok(account),
        (None, _) => Err(BankreaderError::UnknownAccount(query.to_string())),
        (Some(_), Some(_)) => Err(BankreaderError::AmbiguousAccount(query.to_string())),
    }
}

pub fn set_account_reader(conn: &Connection, name: &str, reader: &str) -> Result<()> {
    let changed = conn.execute(
        "UPDATE accounts SET reader = ?1 WHERE name = ?2",
        rusqlite::params![reader, name],
    )?;
    if changed == 0 {
        return Err(BankreaderError::UnknownAccount(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

pub fn insert_statement(
    conn: &Connection,
    account_id: i64,
    statement: &str,
    from_date: NaiveDate,
    to_date: NaiveDate,
    checksum: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO account_statements (account_id, statement, from_date, to_date, checksum)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![account_id, statement, from_date, to_date, checksum],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn statement_checksum_exists(conn: &Connection, account_id: i64, checksum: &str) -> Result<bool> {
    let mut stmt =
        conn.prepare("SELECT 1 FROM account_statements WHERE account_id = ?1 AND checksum = ?2")?;
    Ok(stmt.exists(rusqlite::params![account_id, checksum])?)
}

/// Statements with their account name and stored transaction count, ordered by period.
pub fn list_statements(
    conn: &Connection,
    account_id: Option<i64>,
) -> Result<Vec<(String, AccountStatement, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT a.name, s.id, s.account_id, s.statement, s.from_date, s.to_date, s.checksum,
                (SELECT count(*) FROM transactions t WHERE t.account_statement_id = s.id)
         FROM account_statements s
         JOIN accounts a ON a.id = s.account_id
         WHERE ?1 IS NULL OR s.account_id = ?1
         ORDER BY s.from_date, s.id",
    )?;
    let rows = stmt
        .query_map([account_id], |row| {
            Ok((
                row.get(0)?,
                AccountStatement {
                    id: row.get(1)?,
                    account_id: row.get(2)?,
                    statement: row.get(3)?,
                    from_date: row.get(4)?,
                    to_date: row.get(5)?,
                    checksum: row.get(6)?,
                },
                row.get(7)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// Insert one parsed transaction. The raw `rusqlite::Error` is returned so the
/// caller can tell a duplicate from a real failure.
pub fn insert_transaction(
    conn: &Connection,
    account_id: i64,
    statement_id: i64,
    t: &Transaction,
) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO transactions (
            account_id, account_statement_id, transaction_id, entry_date, accounted_date,
            remote_account_number, remote_account_name, amount,
            variable_symbol, constant_symbol, specific_symbol,
            sender_description, recipient_description
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
    )?;
    stmt.execute(rusqlite::params![
        account_id,
        statement_id,
        t.transaction_id,
        t.entry_date,
        t.accounted_date,
        t.remote_account_number,
        t.remote_account_name,
        t.amount.to_string(),
        t.variable_symbol,
        t.constant_symbol,
        t.specific_symbol,
        t.sender_description,
        t.recipient_description,
    ])?;
    Ok(())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionFilter {
    pub account_id: Option<i64>,
    /// Only incoming payments (amount > 0).
    pub credit: bool,
    /// Only outgoing payments (amount < 0).
    pub debit: bool,
}

pub fn list_transactions(conn: &Connection, filter: &TransactionFilter) -> Result<Vec<StoredTransaction>> {
    let mut sql = String::from(
        "SELECT t.id, a.name, t.account_statement_id, t.transaction_id, t.entry_date, t.accounted_date,
                t.remote_account_number, t.remote_account_name, t.amount,
                t.variable_symbol, t.constant_symbol, t.specific_symbol,
                t.sender_description, t.recipient_description
         FROM transactions t
         JOIN accounts a ON a.id = t.account_id
         WHERE (?1 IS NULL OR t.account_id = ?1)",
    );
    if filter.credit {
        sql.push_str(" AND CAST(t.amount AS REAL) > 0");
    }
    if filter.debit {
        sql.push_str(" AND CAST(t.amount AS REAL) < 0");
    }
    sql.push_str(" ORDER BY t.accounted_date, t.id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([filter.account_id], |row| {
            let amount: String = row.get(8)?;
            let amount = Decimal::from_str(&amount)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?;
            Ok(StoredTransaction {
                id: row.get(0)?,
                account_name: row.get(1)?,
                account_statement_id: row.get(2)?,
                transaction: Transaction {
                    transaction_id: row.get(3)?,
                    entry_date: row.get(4)?,
                    accounted_date: row.get(5)?,
                    remote_account_number: row.get(6)?,
                    remote_account_name: row.get(7)?,
                    amount,
                    variable_symbol: row.get(9)?,
                    constant_symbol: row.get(10)?,
                    specific_symbol: row.get(11)?,
                    sender_description: row.get(12)?,
                    recipient_description: row.get(13)?,
                },
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
