use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use super::{parse_symbol, ParseError, Reader, Transactions};
use crate::models::{normalize_amount, Transaction};
use crate::mt940::{self, StatementLine};

/// MT940 statements as exported by MultiCash.
#[derive(Debug, Clone)]
pub struct Mt940Reader {
    label: String,
    key: Option<String>,
}

impl Mt940Reader {
    pub fn new() -> Self {
        Self {
            label: "MT940 (MultiCash)".to_string(),
            key: None,
        }
    }

    pub fn with_key(mut self, key: &str) -> Self {
        self.key = Some(key.to_string());
        self
    }
}

impl Default for Mt940Reader {
    fn default() -> Self {
        Self::new()
    }
}

impl Reader for Mt940Reader {
    fn label(&self) -> &str {
        &self.label
    }

    fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    fn read_transactions(&self, text: String) -> Result<Transactions<'_>, ParseError> {
        let lines = mt940::parse(&text)?
            .into_iter()
            .flat_map(|message| {
                debug!(
                    reference = ?message.reference,
                    account = ?message.account,
                    statement = ?message.statement_number,
                    lines = message.lines.len(),
                    "MT940 message"
                );
                message.lines
            });
        Ok(Box::new(lines.map(to_transaction)))
    }
}

fn symbol_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([KVS]S) ([0-9]{10})").expect("valid symbol regex"))
}

fn account_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([0-9]+-)?([0-9]{10})/([0-9]{4})").expect("valid account regex"))
}

fn to_transaction(line: StatementLine) -> Result<Transaction, ParseError> {
    let details = line.details.unwrap_or_default();
    let purpose = details.purpose;
    debug!(
        transaction_type = line.transaction_type.as_str(),
        code = ?details.code,
        supplementary = ?line.supplementary_details,
        "MT940 statement line"
    );

    let transaction_id = match line.customer_reference.as_str() {
        "" | "NONREF" => line.bank_reference.unwrap_or_default(),
        reference => reference.to_string(),
    };
    if transaction_id.is_empty() {
        return Err(ParseError::MissingField("transaction reference"));
    }

    // KS = constant, VS = variable, SS = specific
    let symbols: HashMap<&str, &str> = symbol_regex()
        .captures_iter(&purpose)
        .map(|caps| {
            let (_, [tag, value]) = caps.extract();
            (tag, value)
        })
        .collect();
    let symbol = |tag: &str| symbols.get(tag).map_or(0, |value| parse_symbol(value));

    let remote_account_number = match account_regex().find(&purpose) {
        Some(m) => m.as_str().to_string(),
        None => match (details.applicant_account, details.applicant_bank) {
            (Some(account), Some(bank)) => format!("{account}/{bank}"),
            _ => String::new(),
        },
    };

    let description = symbol_regex()
        .replace_all(&purpose, "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    Ok(Transaction {
        transaction_id,
        entry_date: line.entry_date.unwrap_or(line.value_date),
        accounted_date: line.value_date,
        remote_account_number,
        remote_account_name: details.applicant_name.unwrap_or_default(),
        amount: normalize_amount(line.amount),
        variable_symbol: symbol("VS"),
        constant_symbol: symbol("KS"),
        specific_symbol: symbol("SS"),
        sender_description: description.clone(),
        recipient_description: description,
    })
}
