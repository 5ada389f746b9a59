use comfy_table::{Cell, Table};

use super::{load_registry, open_db};
use crate::db::{get_account_by_name, insert_account, list_accounts, set_account_reader};
use crate::error::{BankreaderError, Result};
use crate::registry::ReaderRegistry;

fn check_reader(registry: &ReaderRegistry, key: &str) -> Result<()> {
    if registry.get(key).is_none() {
        return Err(BankreaderError::UnknownReader(key.to_string()));
    }
    Ok(())
}

pub fn add(name: &str, iban: Option<&str>, bic: Option<&str>, reader: Option<&str>) -> Result<()> {
    if let Some(key) = reader {
        check_reader(&load_registry()?, key)?;
    }
    let conn = open_db()?;
    let account = insert_account(&conn, name, iban, bic, reader)?;
    println!("Added account: {name} (id {})", account.id);
    Ok(())
}

pub fn list() -> Result<()> {
    let registry = load_registry()?;
    let conn = open_db()?;
    let accounts = list_accounts(&conn)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "IBAN", "BIC", "Format"]);
    for account in accounts {
        let format = match account.reader.as_deref() {
            Some(key) => registry
                .get(key)
                .map(|r| r.label().to_string())
                .unwrap_or_else(|| format!("{key} (not registered)")),
            None => String::new(),
        };
        table.add_row(vec![
            Cell::new(account.id),
            Cell::new(account.name),
            Cell::new(account.iban.unwrap_or_default()),
            Cell::new(account.bic.unwrap_or_default()),
            Cell::new(format),
        ]);
    }
    println!("Accounts\n{table}");
    Ok(())
}

pub fn set_reader(name: &str, reader: &str) -> Result<()> {
    let registry = load_registry()?;
    check_reader(&registry, reader)?;
    let conn = open_db()?;
    set_account_reader(&conn, name, reader)?;
    let account = get_account_by_name(&conn, name)?
        .ok_or_else(|| BankreaderError::UnknownAccount(name.to_string()))?;
    println!(
        "Account {} now reads {} statements",
        account.name,
        registry.get(reader).map_or(reader, |r| r.label())
    );
    Ok(())
}
