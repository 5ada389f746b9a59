use std::collections::BTreeMap;
use std::io::Cursor;
use std::str::FromStr;

use chrono::NaiveDate;
use encoding_rs::{Encoding, UTF_8};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::error;

use super::{encoding_for_label, parse_date, parse_symbol, ParseError, Reader, Transactions};
use crate::models::{normalize_amount, normalize_dates, Transaction};

/// Transaction field a CSV column can be mapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CsvField {
    TransactionId,
    EntryDate,
    AccountedDate,
    RemoteAccountNumber,
    RemoteAccountName,
    Amount,
    VariableSymbol,
    ConstantSymbol,
    SpecificSymbol,
    SenderDescription,
    RecipientDescription,
}

impl CsvField {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TransactionId => "transaction_id",
            Self::EntryDate => "entry_date",
            Self::AccountedDate => "accounted_date",
            Self::RemoteAccountNumber => "remote_account_number",
            Self::RemoteAccountName => "remote_account_name",
            Self::Amount => "amount",
            Self::VariableSymbol => "variable_symbol",
            Self::ConstantSymbol => "constant_symbol",
            Self::SpecificSymbol => "specific_symbol",
            Self::SenderDescription => "sender_description",
            Self::RecipientDescription => "recipient_description",
        }
    }
}

/// A cell converted to the type of the field it is mapped to.
#[derive(Debug, Clone, PartialEq)]
pub enum CsvValue {
    Date(NaiveDate),
    Amount(Decimal),
    Integer(i64),
    Text(String),
}

/// Delimited statements. Each bank variant is described by its header
/// labels, delimiter, quoting, encoding, date format and decimal separator.
#[derive(Debug, Clone)]
pub struct CsvReader {
    label: String,
    key: Option<String>,
    encoding: &'static Encoding,
    delimiter: u8,
    quote: u8,
    date_format: String,
    decimal_separator: char,
    column_mapping: Vec<(String, CsvField)>,
}

impl CsvReader {
    pub fn new(label: &str, column_mapping: &[(&str, CsvField)]) -> Self {
        Self {
            label: label.to_string(),
            key: None,
            encoding: UTF_8,
            delimiter: b',',
            quote: b'"',
            date_format: "%Y-%m-%d".to_string(),
            decimal_separator: '.',
            column_mapping: column_mapping
                .iter()
                .map(|(header, field)| (header.to_string(), *field))
                .collect(),
        }
    }

    pub fn with_key(mut self, key: &str) -> Self {
        self.key = Some(key.to_string());
        self
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_quote(mut self, quote: u8) -> Self {
        self.quote = quote;
        self
    }

    pub fn with_date_format(mut self, date_format: &str) -> Self {
        self.date_format = date_format.to_string();
        self
    }

    pub fn with_decimal_separator(mut self, separator: char) -> Self {
        self.decimal_separator = separator;
        self
    }

    pub fn from_config(config: &CsvReaderConfig) -> Result<Self, String> {
        let encoding = encoding_for_label(&config.encoding)
            .ok_or_else(|| format!("unknown encoding \"{}\" for reader {}", config.encoding, config.key))?;
        let delimiter = ascii_byte(config.delimiter, "delimiter", &config.key)?;
        let quote = ascii_byte(config.quotechar, "quotechar", &config.key)?;
        if config.column_mapping.is_empty() {
            return Err(format!("reader {} has an empty column_mapping", config.key));
        }
        let mapping: Vec<(&str, CsvField)> = config
            .column_mapping
            .iter()
            .map(|(header, field)| (header.as_str(), *field))
            .collect();
        Ok(Self::new(&config.label, &mapping)
            .with_key(&config.key)
            .with_encoding(encoding)
            .with_delimiter(delimiter)
            .with_quote(quote)
            .with_date_format(&config.date_format)
            .with_decimal_separator(config.decimal_separator))
    }

    /// Convert one cell according to the field it is mapped to.
    pub fn get_value(&self, field: CsvField, value: &str) -> Result<CsvValue, ParseError> {
        match field {
            CsvField::EntryDate | CsvField::AccountedDate => {
                Ok(CsvValue::Date(parse_date(value, &self.date_format)?))
            }
            CsvField::Amount => Ok(CsvValue::Amount(self.parse_amount(value)?)),
            CsvField::VariableSymbol | CsvField::ConstantSymbol | CsvField::SpecificSymbol => {
                Ok(CsvValue::Integer(parse_symbol(value)))
            }
            CsvField::TransactionId
            | CsvField::RemoteAccountNumber
            | CsvField::RemoteAccountName
            | CsvField::SenderDescription
            | CsvField::RecipientDescription => Ok(CsvValue::Text(value.to_string())),
        }
    }

    fn parse_amount(&self, value: &str) -> Result<Decimal, ParseError> {
        let separator = self.decimal_separator;
        let cleaned: String = value
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == separator || *c == '-')
            .map(|c| if c == separator { '.' } else { c })
            .collect();
        Decimal::from_str(&cleaned).map_err(|_| ParseError::InvalidAmount(value.to_string()))
    }

    /// Column index of every mapped field, if `row` is the header row.
    fn header_columns(&self, row: &::csv::StringRecord) -> Option<Vec<(usize, CsvField)>> {
        self.column_mapping
            .iter()
            .map(|(header, field)| row.iter().position(|cell| cell == header).map(|i| (i, *field)))
            .collect()
    }

    fn project(
        &self,
        columns: &[(usize, CsvField)],
        row: &::csv::StringRecord,
    ) -> Result<Transaction, ParseError> {
        let mut values = BTreeMap::new();
        for &(index, field) in columns {
            values.insert(field, self.get_value(field, &row[index])?);
        }

        let mut date = |field: CsvField| match values.remove(&field) {
            Some(CsvValue::Date(d)) => Some(d),
            _ => None,
        };
        let entry_date = date(CsvField::EntryDate);
        let accounted_date = date(CsvField::AccountedDate);
        let (entry_date, accounted_date) = normalize_dates(entry_date, accounted_date)
            .ok_or(ParseError::MissingField("accounted_date"))?;
        let amount = match values.remove(&CsvField::Amount) {
            Some(CsvValue::Amount(a)) => normalize_amount(a),
            _ => return Err(ParseError::MissingField("amount")),
        };

        let mut t = Transaction::new(String::new(), accounted_date, amount);
        t.entry_date = entry_date;
        for (field, value) in values {
            match value {
                CsvValue::Integer(n) => match field {
                    CsvField::VariableSymbol => t.variable_symbol = n,
                    CsvField::ConstantSymbol => t.constant_symbol = n,
                    _ => t.specific_symbol = n,
                },
                CsvValue::Text(s) => match field {
                    CsvField::TransactionId => t.transaction_id = s,
                    CsvField::RemoteAccountNumber => t.remote_account_number = s,
                    CsvField::RemoteAccountName => t.remote_account_name = s,
                    CsvField::SenderDescription => t.sender_description = s,
                    _ => t.recipient_description = s,
                },
                CsvValue::Date(_) | CsvValue::Amount(_) => {}
            }
        }
        Ok(t)
    }
}

impl Reader for CsvReader {
    fn label(&self) -> &str {
        &self.label
    }

    fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    fn read_transactions(&self, text: String) -> Result<Transactions<'_>, ParseError> {
        let records = ::csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .quote(self.quote)
            .from_reader(Cursor::new(text.into_bytes()))
            .into_records();
        Ok(Box::new(CsvTransactions {
            reader: self,
            records,
            columns: None,
        }))
    }
}

struct CsvTransactions<'a> {
    reader: &'a CsvReader,
    records: ::csv::StringRecordsIntoIter<Cursor<Vec<u8>>>,
    /// Established once the header row has been seen.
    columns: Option<Vec<(usize, CsvField)>>,
}

impl Iterator for CsvTransactions<'_> {
    type Item = Result<Transaction, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(e) => return Some(Err(e.into())),
            };
            let Some(columns) = &self.columns else {
                self.columns = self.reader.header_columns(&record);
                continue;
            };
            let needed = columns.iter().map(|(i, _)| i + 1).max().unwrap_or(0);
            if record.len() < needed {
                error!(
                    line = record.position().map(|p| p.line()),
                    "CSV row has {} columns, {needed} expected; skipping",
                    record.len()
                );
                continue;
            }
            return Some(self.reader.project(columns, &record));
        }
    }
}

fn ascii_byte(c: char, what: &str, key: &str) -> Result<u8, String> {
    u8::try_from(c)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| format!("{what} of reader {key} must be an ASCII character"))
}

/// A CSV statement variant declared in the settings file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvReaderConfig {
    pub key: String,
    pub label: String,
    #[serde(default = "default_encoding")]
    pub encoding: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    #[serde(default = "default_quotechar")]
    pub quotechar: char,
    #[serde(default = "default_date_format")]
    pub date_format: String,
    #[serde(default = "default_decimal_separator")]
    pub decimal_separator: char,
    pub column_mapping: BTreeMap<String, CsvField>,
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

fn default_delimiter() -> char {
    ','
}

fn default_quotechar() -> char {
    '"'
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

fn default_decimal_separator() -> char {
    '.'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader() -> CsvReader {
        CsvReader::new(
            "Test CSV",
            &[
                ("Date", CsvField::AccountedDate),
                ("Id", CsvField::TransactionId),
                ("Amount", CsvField::Amount),
                ("VS", CsvField::VariableSymbol),
                ("Note", CsvField::RecipientDescription),
            ],
        )
        .with_delimiter(b';')
        .with_date_format("%d.%m.%Y")
        .with_decimal_separator(',')
    }

    fn read(reader: &CsvReader, text: &str) -> Vec<Transaction> {
        reader
            .read_transactions(text.to_string())
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_header_found_after_preamble() {
        let text = "\
Account statement;;;
Period;01.03.2024 - 31.03.2024
Note;Amount;Id;Date;VS
rent;-1 500,50 CZK;T1;01.03.2024;123
refund;\"2,00\";T2;02.03.2024;
";
        let rows = read(&reader(), text);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].transaction_id, "T1");
        assert_eq!(rows[0].amount, Decimal::new(-150050, 2));
        assert_eq!(rows[0].variable_symbol, 123);
        assert_eq!(rows[0].recipient_description, "rent");
        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(rows[0].accounted_date, d);
        assert_eq!(rows[0].entry_date, d);
        assert_eq!(rows[1].amount, Decimal::new(200, 2));
        assert_eq!(rows[1].variable_symbol, 0);
    }

    #[test]
    fn test_short_rows_are_skipped() {
        let text = "Date;Id;Amount;VS;Note\n01.03.2024;T1\n02.03.2024;T2;5,00;;x\n";
        let rows = read(&reader(), text);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].transaction_id, "T2");
    }

    #[test]
    fn test_no_header_yields_nothing() {
        assert!(read(&reader(), "a;b;c\n1;2;3\n").is_empty());
        assert!(read(&reader(), "").is_empty());
    }

    #[test]
    fn test_get_value_is_idempotent() {
        let r = reader();
        for (field, cell) in [
            (CsvField::Amount, "-1.234,56 Kč"),
            (CsvField::AccountedDate, "29.02.2024"),
            (CsvField::SpecificSymbol, "0042"),
            (CsvField::ConstantSymbol, "n/a"),
            (CsvField::RemoteAccountName, " ACME "),
        ] {
            assert_eq!(r.get_value(field, cell).unwrap(), r.get_value(field, cell).unwrap());
        }
    }

    #[test]
    fn test_amount_cleaning() {
        let r = reader();
        assert_eq!(r.get_value(CsvField::Amount, "CZK 1.234,56").unwrap(), CsvValue::Amount(Decimal::new(123456, 2)));
        assert_eq!(r.get_value(CsvField::Amount, "-0,5").unwrap(), CsvValue::Amount(Decimal::new(-5, 1)));
        assert!(matches!(r.get_value(CsvField::Amount, "n/a"), Err(ParseError::InvalidAmount(_))));

        let dot = CsvReader::new("x", &[]);
        assert_eq!(dot.get_value(CsvField::Amount, "$1,234.56").unwrap(), CsvValue::Amount(Decimal::new(123456, 2)));
    }

    #[test]
    fn test_symbols_default_to_zero() {
        let r = reader();
        assert_eq!(r.get_value(CsvField::VariableSymbol, "12a").unwrap(), CsvValue::Integer(0));
        assert_eq!(r.get_value(CsvField::VariableSymbol, "").unwrap(), CsvValue::Integer(0));
        assert_eq!(r.get_value(CsvField::VariableSymbol, "77").unwrap(), CsvValue::Integer(77));
    }

    #[test]
    fn test_invalid_date_is_error() {
        let text = "Date;Id;Amount;VS;Note\n2024-03-01;T1;1,00;;\n";
        let result: Result<Vec<_>, _> = reader().read_transactions(text.to_string()).unwrap().collect();
        assert!(matches!(result, Err(ParseError::InvalidDate { .. })));
    }

    #[test]
    fn test_every_field_is_mapped() {
        let r = CsvReader::new(
            "full",
            &[
                ("id", CsvField::TransactionId),
                ("entry", CsvField::EntryDate),
                ("booked", CsvField::AccountedDate),
                ("account", CsvField::RemoteAccountNumber),
                ("name", CsvField::RemoteAccountName),
                ("amount", CsvField::Amount),
                ("vs", CsvField::VariableSymbol),
                ("ks", CsvField::ConstantSymbol),
                ("ss", CsvField::SpecificSymbol),
                ("from", CsvField::SenderDescription),
                ("to", CsvField::RecipientDescription),
            ],
        );
        let text = "id,entry,booked,account,name,amount,vs,ks,ss,from,to\n\
F1,2024-05-06,2024-05-07,42/0800,ACME,-12.5,11,308,33,payer note,payee note\n";
        let t = &read(&r, text)[0];
        assert_eq!(t.transaction_id, "F1");
        assert_eq!(t.entry_date, NaiveDate::from_ymd_opt(2024, 5, 6).unwrap());
        assert_eq!(t.accounted_date, NaiveDate::from_ymd_opt(2024, 5, 7).unwrap());
        assert_eq!(t.remote_account_number, "42/0800");
        assert_eq!(t.remote_account_name, "ACME");
        assert_eq!(t.amount, Decimal::new(-1250, 2));
        assert_eq!((t.variable_symbol, t.constant_symbol, t.specific_symbol), (11, 308, 33));
        assert_eq!(t.sender_description, "payer note");
        assert_eq!(t.recipient_description, "payee note");
    }

    #[test]
    fn test_entry_date_fills_accounted_date() {
        let r = CsvReader::new(
            "entry only",
            &[("When", CsvField::EntryDate), ("Sum", CsvField::Amount)],
        );
        let rows = read(&r, "When,Sum\n2024-05-06,10\n");
        assert_eq!(rows[0].accounted_date, NaiveDate::from_ymd_opt(2024, 5, 6).unwrap());
        assert!(rows[0].transaction_id.is_empty());
    }

    #[test]
    fn test_from_config() {
        let json = r#"{
            "key": "fio_csv",
            "label": "Fio CSV",
            "encoding": "cp1250",
            "delimiter": ";",
            "decimal_separator": ",",
            "date_format": "%d.%m.%Y",
            "column_mapping": {"Datum": "accounted_date", "Objem": "amount", "ID pohybu": "transaction_id"}
        }"#;
        let config: CsvReaderConfig = serde_json::from_str(json).unwrap();
        let r = CsvReader::from_config(&config).unwrap();
        assert_eq!(r.key(), Some("fio_csv"));
        assert_eq!(r.label(), "Fio CSV");
        assert_eq!(r.encoding().name(), "windows-1250");
        let rows = read(&r, "ID pohybu;Datum;Objem\n42;01.02.2024;-3,10\n");
        assert_eq!(rows[0].transaction_id, "42");
        assert_eq!(rows[0].amount, Decimal::new(-310, 2));
    }

    #[test]
    fn test_from_config_rejects_unknown_encoding() {
        let json = r#"{"key": "x", "label": "X", "encoding": "klingon", "column_mapping": {"A": "amount"}}"#;
        let config: CsvReaderConfig = serde_json::from_str(json).unwrap();
        assert!(CsvReader::from_config(&config).unwrap_err().contains("klingon"));
    }
}
