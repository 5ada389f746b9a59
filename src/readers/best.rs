use std::io::{BufRead, Cursor};
use std::str::FromStr;

use encoding_rs::{Encoding, WINDOWS_1250};
use rust_decimal::Decimal;

use super::{fixed_field, parse_date, parse_symbol, ParseError, Reader, Transactions};
use crate::models::{normalize_amount, Transaction};

const TRANSACTION_RECORD: &str = "52";
const DATE_FORMAT: &str = "%Y%m%d";

/// Fixed-width "Best" statements. One line per record, only `52` records
/// carry transactions.
#[derive(Debug, Clone)]
pub struct BestReader {
    label: String,
    key: Option<String>,
}

impl BestReader {
    pub fn new() -> Self {
        Self::with_label("Best")
    }

    pub fn with_label(label: &str) -> Self {
        Self {
            label: label.to_string(),
            key: None,
        }
    }

    pub fn with_key(mut self, key: &str) -> Self {
        self.key = Some(key.to_string());
        self
    }
}

impl Default for BestReader {
    fn default() -> Self {
        Self::new()
    }
}

impl Reader for BestReader {
    fn label(&self) -> &str {
        &self.label
    }

    fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    fn encoding(&self) -> &'static Encoding {
        WINDOWS_1250
    }

    fn read_transactions(&self, text: String) -> Result<Transactions<'_>, ParseError> {
        let lines = Cursor::new(text.into_bytes()).lines();
        Ok(Box::new(lines.filter_map(|line| match line {
            Ok(line) if line.starts_with(TRANSACTION_RECORD) => Some(parse_line(&line)),
            Ok(_) => None,
            Err(e) => Some(Err(e.into())),
        })))
    }
}

fn parse_line(line: &str) -> Result<Transaction, ParseError> {
    let field = |start: usize, end: usize| fixed_field(line, start, end);

    let bank_code = if field(39, 42) == "000" {
        field(42, 46)
    } else {
        field(39, 46)
    };
    let sign = if field(46, 47) == "0" { "-" } else { "" };
    let raw_amount = format!("{sign}{}.{}", field(50, 63), field(63, 65));
    let amount =
        Decimal::from_str(&raw_amount).map_err(|_| ParseError::InvalidAmount(raw_amount.clone()))?;

    Ok(Transaction {
        transaction_id: field(86, 117).trim().to_string(),
        entry_date: parse_date(&field(167, 175), DATE_FORMAT)?,
        accounted_date: parse_date(&field(175, 183), DATE_FORMAT)?,
        remote_account_number: format!("{}-{}/{}", field(23, 29), field(29, 39), bank_code),
        remote_account_name: String::new(),
        amount: normalize_amount(amount),
        variable_symbol: parse_symbol(field(127, 137).trim()),
        constant_symbol: parse_symbol(field(137, 147).trim()),
        specific_symbol: parse_symbol(field(147, 157).trim()),
        sender_description: field(269, 409).trim().to_string(),
        recipient_description: field(209, 239).trim().to_string(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::NaiveDate;

    use super::*;

    /// Lay a transaction out the way the bank writes a `52` record.
    pub(crate) fn best_line(t: &Transaction, prefix: &str, number: &str, bank: &str) -> String {
        let mut line: Vec<char> = vec![' '; 420];
        let mut put = |start: usize, value: &str| {
            for (i, c) in value.chars().enumerate() {
                line[start + i] = c;
            }
        };
        put(0, TRANSACTION_RECORD);
        put(23, &format!("{prefix:0>6}"));
        put(29, &format!("{number:0>10}"));
        put(39, &format!("{bank:0>7}"));
        put(46, if t.amount.is_sign_negative() { "0" } else { "1" });
        let cents = (t.amount.abs() * Decimal::ONE_HUNDRED).trunc().to_string();
        let cents = format!("{cents:0>15}");
        put(50, &cents[..13]);
        put(63, &cents[13..]);
        put(86, &t.transaction_id);
        put(127, &format!("{:010}", t.variable_symbol));
        put(137, &format!("{:010}", t.constant_symbol));
        put(147, &format!("{:010}", t.specific_symbol));
        put(167, &t.entry_date.format("%Y%m%d").to_string());
        put(175, &t.accounted_date.format("%Y%m%d").to_string());
        put(209, &t.recipient_description);
        put(269, &t.sender_description);
        line.into_iter().collect::<String>().trim_end().to_string()
    }

    fn sample(id: &str, amount: i64) -> Transaction {
        Transaction {
            transaction_id: id.to_string(),
            entry_date: NaiveDate::from_ymd_opt(2024, 2, 28).unwrap(),
            accounted_date: NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
            remote_account_number: "000019-0123456789/0100".to_string(),
            remote_account_name: String::new(),
            amount: normalize_amount(Decimal::new(amount, 2)),
            variable_symbol: 1234567890,
            constant_symbol: 308,
            specific_symbol: 0,
            sender_description: "Platba faktury č. 5".to_string(),
            recipient_description: "Nájem únor".to_string(),
        }
    }

    fn read(text: &str) -> Vec<Transaction> {
        BestReader::new()
            .read_transactions(text.to_string())
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_fields_round_trip() {
        for (id, amount) in [("TX-1", -150_075), ("2024022900001", 99), ("x", 123_456_789)] {
            let expected = sample(id, amount);
            let line = best_line(&expected, "19", "123456789", "100");
            let parsed = read(&line);
            assert_eq!(parsed, vec![expected]);
        }
    }

    #[test]
    fn test_non_transaction_records_skipped() {
        let t = sample("A1", 1000);
        let text = format!(
            "51HEADER\n{}\n53TRAILER\n\n{}\n",
            best_line(&t, "19", "123456789", "100"),
            best_line(&sample("A2", -5), "19", "123456789", "100"),
        );
        let parsed = read(&text);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].transaction_id, "A1");
        assert_eq!(parsed[1].amount.to_string(), "-0.05");
    }

    #[test]
    fn test_bank_code_with_long_form() {
        let t = sample("B1", 100);
        let line = best_line(&t, "0", "42", "1234567");
        let parsed = read(&line);
        assert_eq!(parsed[0].remote_account_number, "000000-0000000042/1234567");
    }

    #[test]
    fn test_zero_sign_means_debit() {
        let t = sample("C1", -2500);
        let line = best_line(&t, "19", "1", "800");
        assert_eq!(line.chars().nth(46), Some('0'));
        assert_eq!(read(&line)[0].amount, Decimal::new(-2500, 2));
    }

    #[test]
    fn test_bad_date_is_error() {
        let t = sample("D1", 100);
        let mut line: Vec<char> = best_line(&t, "19", "1", "800").chars().collect();
        line[167] = 'X';
        let line: String = line.into_iter().collect();
        let result: Result<Vec<_>, _> = BestReader::new().read_transactions(line).unwrap().collect();
        assert!(matches!(result, Err(ParseError::InvalidDate { .. })));
    }

    #[test]
    fn test_empty_input() {
        assert!(read("").is_empty());
    }

    #[test]
    fn test_encoding_is_windows_1250() {
        assert_eq!(BestReader::new().encoding().name(), "windows-1250");
    }
}
