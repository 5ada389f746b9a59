use comfy_table::{Cell, Table};

use super::open_db;
use crate::db::{list_statements, resolve_account};
use crate::error::Result;
use crate::models::AccountStatement;

fn account_cell(account_name: &str, statement: &AccountStatement) -> String {
    format!("{account_name} (#{})", statement.account_id)
}

pub fn run(account: Option<&str>) -> Result<()> {
    let conn = open_db()?;
    let account_id = account
        .map(|query| resolve_account(&conn, query))
        .transpose()?
        .map(|a| a.id);
    let rows = list_statements(&conn, account_id)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Account", "Statement", "From", "To", "Transactions", "SHA-256"]);
    for (account_name, statement, count) in rows {
        table.add_row(vec![
            Cell::new(statement.id),
            Cell::new(account_cell(&account_name, &statement)),
            Cell::new(statement.statement),
            Cell::new(statement.from_date),
            Cell::new(statement.to_date),
            Cell::new(count),
            Cell::new(statement.checksum.as_deref().map_or("", |c| &c[..c.len().min(12)])),
        ]);
    }
    println!("Statements\n{table}");
    Ok(())
}
