use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};

use super::open_db;
use crate::db::{list_transactions, resolve_account, TransactionFilter};
use crate::error::Result;
use crate::models::Transaction;

fn counterparty(t: &Transaction) -> String {
    match (t.remote_account_number.is_empty(), t.remote_account_name.is_empty()) {
        (false, false) => format!("{} ({})", t.remote_account_name, t.remote_account_number),
        (true, false) => t.remote_account_name.clone(),
        _ => t.remote_account_number.clone(),
    }
}

fn description(t: &Transaction) -> &str {
    if t.recipient_description.is_empty() {
        &t.sender_description
    } else {
        &t.recipient_description
    }
}

fn symbol(value: i64) -> String {
    if value == 0 {
        String::new()
    } else {
        value.to_string()
    }
}

pub fn run(account: Option<&str>, credit: bool, debit: bool) -> Result<()> {
    let conn = open_db()?;
    let account_id = account
        .map(|query| resolve_account(&conn, query))
        .transpose()?
        .map(|a| a.id);
    let rows = list_transactions(&conn, &TransactionFilter { account_id, credit, debit })?;

    let mut table = Table::new();
    table.set_header(vec!["#", "Date", "Account", "Stmt", "ID", "Counterparty", "Amount", "VS", "Description"]);
    for row in &rows {
        let t = &row.transaction;
        let amount = if t.amount.is_sign_negative() {
            t.amount.to_string().red().to_string()
        } else {
            t.amount.to_string().green().to_string()
        };
        table.add_row(vec![
            Cell::new(row.id),
            Cell::new(t.accounted_date),
            Cell::new(&row.account_name),
            Cell::new(row.account_statement_id),
            Cell::new(&t.transaction_id),
            Cell::new(counterparty(t)),
            Cell::new(amount).set_alignment(CellAlignment::Right),
            Cell::new(symbol(t.variable_symbol)),
            Cell::new(description(t)),
        ]);
    }
    println!("Transactions ({})\n{table}", rows.len());
    Ok(())
}
