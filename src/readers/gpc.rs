use std::io::{BufRead, Cursor, Lines};

use rust_decimal::Decimal;
use tracing::debug;

use super::{fixed_field, parse_date, parse_symbol, ParseError, Reader, Transactions};
use crate::models::{normalize_amount, normalize_dates, Transaction};

const DATE_FORMAT: &str = "%d%m%y";
const DESCRIPTION_SEGMENT: usize = 35;

/// Fixed-width GPC (ABO) statements. A `075` line opens a transaction and the
/// `076`, `078` and `079` lines that follow it add dates and descriptions.
#[derive(Debug, Clone)]
pub struct GpcReader {
    label: String,
    key: Option<String>,
}

impl GpcReader {
    pub fn new() -> Self {
        Self {
            label: "GPC".to_string(),
            key: None,
        }
    }

    pub fn with_key(mut self, key: &str) -> Self {
        self.key = Some(key.to_string());
        self
    }
}

impl Default for GpcReader {
    fn default() -> Self {
        Self::new()
    }
}

impl Reader for GpcReader {
    fn label(&self) -> &str {
        &self.label
    }

    fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    fn read_transactions(&self, text: String) -> Result<Transactions<'_>, ParseError> {
        Ok(Box::new(GpcTransactions {
            lines: Cursor::new(text.into_bytes()).lines(),
            pending: None,
        }))
    }
}

struct GpcTransactions {
    lines: Lines<Cursor<Vec<u8>>>,
    /// Transaction whose continuation lines may still arrive.
    pending: Option<Transaction>,
}

impl Iterator for GpcTransactions {
    type Item = Result<Transaction, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => return Some(Err(e.into())),
                None => return self.pending.take().map(Ok),
            };
            let record = fixed_field(&line, 0, 3);
            match record.as_str() {
                "075" => {
                    let closed = self.pending.take();
                    match open_transaction(&line) {
                        Ok(opened) => self.pending = opened,
                        Err(e) => return Some(Err(e)),
                    }
                    if let Some(closed) = closed {
                        return Some(Ok(closed));
                    }
                }
                "076" => {
                    if let Some(pending) = self.pending.as_mut() {
                        if let Err(e) = apply_076(pending, &line) {
                            return Some(Err(e));
                        }
                    }
                }
                "078" => {
                    if let Some(pending) = self.pending.as_mut() {
                        pending.recipient_description = description_segments(&line);
                    }
                }
                "079" => {
                    if let Some(pending) = self.pending.as_mut() {
                        let more = description_segments(&line);
                        let recipient = &mut pending.recipient_description;
                        if !more.is_empty() {
                            if !recipient.is_empty() {
                                recipient.push(' ');
                            }
                            recipient.push_str(&more);
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

/// Parse a `075` line. Only debit (`1`) and credit (`2`) postings open a transaction.
fn open_transaction(line: &str) -> Result<Option<Transaction>, ParseError> {
    let field = |start: usize, end: usize| fixed_field(line, start, end);

    let code = field(60, 61);
    if code != "1" && code != "2" {
        debug!(code = code.as_str(), "skipping GPC posting with unsupported accounting code");
        return Ok(None);
    }

    // unsigned; the accounting code carries the sign
    let raw_amount = field(48, 60);
    let digits = raw_amount.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::InvalidAmount(raw_amount));
    }
    let cents: i64 = digits
        .parse()
        .map_err(|_| ParseError::InvalidAmount(raw_amount.clone()))?;
    let mut amount = Decimal::new(cents, 2);
    if code == "1" {
        amount = -amount;
    }

    let accounted_date = parse_date(&field(122, 128), DATE_FORMAT)?;
    let (entry_date, accounted_date) =
        normalize_dates(None, Some(accounted_date)).ok_or(ParseError::MissingField("accounted_date"))?;

    Ok(Some(Transaction {
        transaction_id: field(35, 48).trim().to_string(),
        entry_date,
        accounted_date,
        remote_account_number: account_number(&field(19, 35), &field(73, 77)),
        remote_account_name: field(97, 117).trim().to_string(),
        amount: normalize_amount(amount),
        variable_symbol: parse_symbol(field(61, 71).trim()),
        constant_symbol: parse_symbol(field(77, 81).trim()),
        specific_symbol: parse_symbol(field(81, 91).trim()),
        sender_description: String::new(),
        recipient_description: String::new(),
    }))
}

fn apply_076(pending: &mut Transaction, line: &str) -> Result<(), ParseError> {
    let raw_date = fixed_field(line, 29, 35);
    if !raw_date.trim().is_empty() {
        pending.entry_date = parse_date(&raw_date, DATE_FORMAT)?;
    }
    pending.sender_description = fixed_field(line, 35, usize::MAX).trim().to_string();
    Ok(())
}

/// Text after the record type, in 35-character segments joined by single spaces.
fn description_segments(line: &str) -> String {
    let chars: Vec<char> = line.chars().skip(3).collect();
    chars
        .chunks(DESCRIPTION_SEGMENT)
        .map(|chunk| chunk.iter().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `prefix-number/bank` from the 16-digit account field, without leading zeros.
fn account_number(raw: &str, bank_code: &str) -> String {
    let raw = raw.trim();
    if raw.chars().all(|c| c == '0') {
        return String::new();
    }
    if !raw.is_ascii() {
        return raw.to_string();
    }
    let split = raw.len().saturating_sub(10);
    let (prefix, number) = raw.split_at(split);
    let prefix = prefix.trim_start_matches('0');
    let number = number.trim_start_matches('0');
    let account = if prefix.is_empty() {
        number.to_string()
    } else {
        format!("{prefix}-{number}")
    };
    let bank_code = bank_code.trim();
    if bank_code.is_empty() {
        account
    } else {
        format!("{account}/{bank_code}")
    }
}
