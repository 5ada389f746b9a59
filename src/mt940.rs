//! SWIFT MT940 statement messages: tag tokenizing, `:61:` statement lines
//! and the `:86:` information that belongs to them.

use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use rust_decimal::Decimal;
use tracing::debug;

use crate::readers::ParseError;

#[derive(Debug, Clone, Default)]
pub struct Message {
    /// `:20:`
    pub reference: Option<String>,
    /// `:25:`
    pub account: Option<String>,
    /// `:28C:`
    pub statement_number: Option<String>,
    pub lines: Vec<StatementLine>,
}

/// One `:61:` entry with its `:86:` information.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementLine {
    pub value_date: NaiveDate,
    pub entry_date: Option<NaiveDate>,
    /// Signed: debits and credit reversals are negative.
    pub amount: Decimal,
    pub transaction_type: String,
    pub customer_reference: String,
    pub bank_reference: Option<String>,
    pub supplementary_details: Option<String>,
    pub details: Option<Details>,
}

/// `:86:` information to account owner. MultiCash files structure it in
/// `?NN` subfields; otherwise only `purpose` is filled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Details {
    pub code: Option<String>,
    pub purpose: String,
    pub applicant_bank: Option<String>,
    pub applicant_account: Option<String>,
    pub applicant_name: Option<String>,
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^:(\d{2}[A-Z]?):(.*)$").expect("valid tag regex"))
}

fn statement_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<value>\d{6})(?P<entry>\d{4})?(?P<mark>R?[CD])(?P<funds>[A-Z])?(?P<amount>\d[\d,]*)(?P<type>[A-Z][A-Z0-9]{3})(?P<rest>.*)$",
        )
        .expect("valid statement line regex")
    })
}

fn subfield_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\?(\d{2})").expect("valid subfield regex"))
}

/// Split `text` into messages and parse their statement lines.
pub fn parse(text: &str) -> Result<Vec<Message>, ParseError> {
    let mut messages = Vec::new();
    for fields in tokenize(text) {
        messages.push(build_message(&fields)?);
    }
    Ok(messages)
}

/// Tag/value pairs of every message. Continuation lines are appended to the
/// previous value after a newline.
fn tokenize(text: &str) -> Vec<Vec<(String, String)>> {
    let mut messages = Vec::new();
    let mut fields: Vec<(String, String)> = Vec::new();

    for raw in text.lines() {
        let mut line = raw.trim_end_matches('\r');
        if let Some(pos) = line.find("{4:") {
            line = &line[pos + 3..];
        }
        let trimmed = line.trim();
        if trimmed == "-" || trimmed.starts_with("-}") {
            if !fields.is_empty() {
                messages.push(std::mem::take(&mut fields));
            }
            continue;
        }
        if trimmed.is_empty() || trimmed.starts_with("{1:") {
            continue;
        }
        if let Some(caps) = tag_regex().captures(trimmed) {
            fields.push((caps[1].to_string(), caps[2].to_string()));
        } else if let Some((_, value)) = fields.last_mut() {
            value.push('\n');
            value.push_str(line.trim_end());
        }
    }
    if !fields.is_empty() {
        messages.push(fields);
    }
    messages
}

fn build_message(fields: &[(String, String)]) -> Result<Message, ParseError> {
    let mut message = Message::default();
    for (tag, value) in fields {
        match tag.as_str() {
            "20" => message.reference = Some(value.trim().to_string()),
            "25" => message.account = Some(value.trim().to_string()),
            "28C" | "28" => message.statement_number = Some(value.trim().to_string()),
            "61" => message.lines.push(parse_statement_line(value)?),
            "86" => match message.lines.last_mut() {
                Some(line) => line.details = Some(parse_details(value)),
                None => debug!("ignoring :86: before first :61:"),
            },
            _ => {}
        }
    }
    Ok(message)
}

fn parse_statement_line(value: &str) -> Result<StatementLine, ParseError> {
    let mut parts = value.splitn(2, '\n');
    let first = parts.next().unwrap_or_default().trim();
    let supplementary_details = parts
        .next()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let caps = statement_line_regex()
        .captures(first)
        .ok_or_else(|| ParseError::Mt940(format!("malformed statement line \":61:{first}\"")))?;

    let value_date = NaiveDate::parse_from_str(&caps["value"], "%y%m%d")
        .map_err(|_| ParseError::Mt940(format!("invalid value date \"{}\"", &caps["value"])))?;
    let entry_date = caps
        .name("entry")
        .map(|m| booking_date(value_date, m.as_str()))
        .transpose()?;

    let mut raw_amount = caps["amount"].replace(',', ".");
    if raw_amount.ends_with('.') {
        raw_amount.push('0');
    }
    let mut amount =
        Decimal::from_str(&raw_amount).map_err(|_| ParseError::InvalidAmount(caps["amount"].to_string()))?;
    if matches!(&caps["mark"], "D" | "RC") {
        amount = -amount;
    }

    let rest = caps["rest"].trim();
    let (customer_reference, bank_reference) = match rest.split_once("//") {
        Some((customer, bank)) => (customer.trim().to_string(), Some(bank.trim().to_string())),
        None => (rest.to_string(), None),
    };

    Ok(StatementLine {
        value_date,
        entry_date,
        amount,
        transaction_type: caps["type"].to_string(),
        customer_reference,
        bank_reference,
        supplementary_details,
        details: None,
    })
}

/// `MMDD` booking date in the year that puts it closest to the value date.
fn booking_date(value_date: NaiveDate, mmdd: &str) -> Result<NaiveDate, ParseError> {
    let invalid = || ParseError::Mt940(format!("invalid entry date \"{mmdd}\""));
    let month: u32 = mmdd[..2].parse().map_err(|_| invalid())?;
    let day: u32 = mmdd[2..].parse().map_err(|_| invalid())?;
    let year = value_date.year();
    [year - 1, year, year + 1]
        .into_iter()
        .filter_map(|y| NaiveDate::from_ymd_opt(y, month, day))
        .min_by_key(|d| (*d - value_date).num_days().abs())
        .ok_or_else(invalid)
}

fn parse_details(value: &str) -> Details {
    let joined: String = value.lines().map(str::trim_end).collect();
    let subfields = subfield_regex();
    let Some(first) = subfields.find(&joined) else {
        let purpose = value.lines().map(str::trim).collect::<Vec<_>>().join(" ");
        return Details {
            purpose: purpose.trim().to_string(),
            ..Details::default()
        };
    };

    let mut details = Details::default();
    let code = joined[..first.start()].trim();
    if !code.is_empty() {
        details.code = Some(code.to_string());
    }

    let mut name = String::new();
    let starts: Vec<_> = subfields.captures_iter(&joined).collect();
    for (i, caps) in starts.iter().enumerate() {
        let Some(whole) = caps.get(0) else { continue };
        let end = starts
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(joined.len(), |m| m.start());
        let content = &joined[whole.end()..end];
        match &caps[1] {
            "20" | "21" | "22" | "23" | "24" | "25" | "26" | "27" | "28" | "29" | "60" | "61"
            | "62" | "63" => details.purpose.push_str(content),
            "30" => details.applicant_bank = non_empty(content),
            "31" => details.applicant_account = non_empty(content),
            "32" | "33" => name.push_str(content),
            _ => {}
        }
    }
    details.purpose = details.purpose.trim().to_string();
    details.applicant_name = non_empty(&name);
    details
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
