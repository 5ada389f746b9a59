use std::fs::File;
use std::path::{Path, PathBuf};

use colored::Colorize;
use rusqlite::Connection;

use super::{load_registry, open_db};
use crate::db::resolve_account;
use crate::error::{BankreaderError, Result};
use crate::importer::{import_statement, ImportResult};
use crate::models::{Account, AccountStatement};
use crate::registry::ReaderRegistry;

fn load_file(
    conn: &mut Connection,
    registry: &ReaderRegistry,
    account: &Account,
    path: &Path,
) -> Result<ImportResult> {
    let label = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    let mut file = File::open(path)?;
    import_statement(conn, registry, account, &label, &mut file)
}

fn statement_line(statement: &AccountStatement) -> String {
    format!(
        "Statement #{} covers {} to {}.",
        statement.id, statement.from_date, statement.to_date
    )
}

/// Load every file in turn. A file that fails is reported and skipped.
pub fn run(account: &str, files: &[PathBuf]) -> Result<()> {
    let registry = load_registry()?;
    let mut conn = open_db()?;
    let account = resolve_account(&conn, account)?;

    let mut failed = 0usize;
    for path in files {
        println!(
            "Loading transactions from {} into account \"{}\"...",
            path.display(),
            account.name
        );
        match load_file(&mut conn, &registry, &account, path) {
            Ok(result) => {
                for message in &result.messages {
                    eprintln!("{}", message.yellow());
                }
                let summary = format!(
                    "Successfully loaded {} transactions ({} new) from {}.",
                    result.total,
                    result.inserted(),
                    path.display()
                );
                println!("{}", summary.green());
                println!("{}", statement_line(&result.statement));
            }
            Err(e) => {
                failed += 1;
                eprintln!("{}", format!("Error loading {}: {e}", path.display()).red());
            }
        }
    }

    if failed > 0 {
        return Err(BankreaderError::Other(format!(
            "{failed} of {} files could not be loaded",
            files.len()
        )));
    }
    Ok(())
}
