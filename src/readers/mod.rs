pub mod best;
pub mod csv;
pub mod gpc;
pub mod mt940;

use std::borrow::Cow;
use std::io::Read;

use chrono::NaiveDate;
use encoding_rs::{Encoding, UTF_8};
use thiserror::Error;

use crate::archive;
use crate::models::Transaction;

pub use self::best::BestReader;
pub use self::csv::{CsvField, CsvReader};
pub use self::gpc::GpcReader;
pub use self::mt940::Mt940Reader;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("input is not valid {0} text")]
    Decode(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("invalid date \"{value}\" (expected {format})")]
    InvalidDate { value: String, format: String },

    #[error("invalid amount \"{0}\"")]
    InvalidAmount(String),

    #[error("missing {0}")]
    MissingField(&'static str),

    #[error("MT940: {0}")]
    Mt940(String),
}

/// Lazy, single-pass sequence of parsed transactions.
pub type Transactions<'a> = Box<dyn Iterator<Item = Result<Transaction, ParseError>> + 'a>;

/// A statement format. Implementations only provide `read_transactions` over
/// decoded text; decoding and zip unwrapping come with the trait.
pub trait Reader: Send + Sync {
    /// Human readable format name shown to users.
    fn label(&self) -> &str;

    /// Registry key. When `None` the registry uses the Rust type name.
    fn key(&self) -> Option<&str> {
        None
    }

    fn encoding(&self) -> &'static Encoding {
        UTF_8
    }

    fn read_transactions(&self, text: String) -> Result<Transactions<'_>, ParseError>;

    fn decode(&self, body: &[u8]) -> Result<String, ParseError> {
        decode(self.encoding(), body)
    }

    /// Read a whole statement file, expanding zip archives, and parse every body in it.
    fn read_file(&self, source: &mut dyn Read) -> Result<Transactions<'_>, ParseError> {
        let mut body = Vec::new();
        source.read_to_end(&mut body)?;
        archive::unwrap(self, body)
    }
}

pub fn decode(encoding: &'static Encoding, body: &[u8]) -> Result<String, ParseError> {
    let body = if encoding == UTF_8 {
        body.strip_prefix(&b"\xEF\xBB\xBF"[..]).unwrap_or(body)
    } else {
        body
    };
    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .map(Cow::into_owned)
        .ok_or(ParseError::Decode(encoding.name()))
}

/// Look up an encoding by any WHATWG label, e.g. `cp1250` or `utf-8`.
pub fn encoding_for_label(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
}

/// Characters `[start, end)` of a fixed-width line. Short lines yield whatever is there.
pub(crate) fn fixed_field(line: &str, start: usize, end: usize) -> String {
    line.chars()
        .skip(start)
        .take(end.saturating_sub(start))
        .collect()
}

/// Payment symbols are plain digit strings; anything else counts as no symbol.
pub(crate) fn parse_symbol(value: &str) -> i64 {
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
        value.parse().unwrap_or(0)
    } else {
        0
    }
}

pub(crate) fn parse_date(value: &str, format: &str) -> Result<NaiveDate, ParseError> {
    NaiveDate::parse_from_str(value.trim(), format).map_err(|_| ParseError::InvalidDate {
        value: value.to_string(),
        format: format.to_string(),
    })
}
