use comfy_table::{Cell, Table};

use super::load_registry;
use crate::error::Result;

pub fn run() -> Result<()> {
    let registry = load_registry()?;
    let mut table = Table::new();
    table.set_header(vec!["Key", "Format", "Encoding"]);
    for (key, label) in registry.choices() {
        let encoding = registry.get(key).map_or("", |r| r.encoding().name());
        table.add_row(vec![Cell::new(key), Cell::new(label), Cell::new(encoding)]);
    }
    println!("Statement formats\n{table}");
    Ok(())
}
