use chrono::NaiveDate;
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub iban: Option<String>,
    pub bic: Option<String>,
    /// Registry key of the statement format used for this account.
    pub reader: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AccountStatement {
    pub id: i64,
    pub account_id: i64,
    pub statement: String,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub checksum: Option<String>,
}

/// One ledger entry as produced by a statement reader, before it is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub transaction_id: String,
    pub entry_date: NaiveDate,
    pub accounted_date: NaiveDate,
    pub remote_account_number: String,
    pub remote_account_name: String,
    pub amount: Decimal,
    pub variable_symbol: i64,
    pub constant_symbol: i64,
    pub specific_symbol: i64,
    pub sender_description: String,
    pub recipient_description: String,
}

impl Transaction {
    /// A record with the given identity and every optional field at its default.
    pub fn new(transaction_id: impl Into<String>, date: NaiveDate, amount: Decimal) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            entry_date: date,
            accounted_date: date,
            remote_account_number: String::new(),
            remote_account_name: String::new(),
            amount: normalize_amount(amount),
            variable_symbol: 0,
            constant_symbol: 0,
            specific_symbol: 0,
            sender_description: String::new(),
            recipient_description: String::new(),
        }
    }
}

/// A transaction row as stored, joined with its account name.
#[derive(Debug, Clone)]
pub struct StoredTransaction {
    pub id: i64,
    pub account_name: String,
    pub account_statement_id: i64,
    pub transaction: Transaction,
}

/// Fill a missing date from the other one. Returns `None` only when both are missing.
pub fn normalize_dates(
    entry_date: Option<NaiveDate>,
    accounted_date: Option<NaiveDate>,
) -> Option<(NaiveDate, NaiveDate)> {
    match (entry_date, accounted_date) {
        (Some(entry), Some(accounted)) => Some((entry, accounted)),
        (Some(date), None) | (None, Some(date)) => Some((date, date)),
        (None, None) => None,
    }
}

/// Round to cents and fix the scale at two fractional digits.
pub fn normalize_amount(amount: Decimal) -> Decimal {
    let mut amount = amount.round_dp(2);
    amount.rescale(2);
    amount
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_normalize_dates_copies_missing_side() {
        let d = date(2024, 3, 1);
        assert_eq!(normalize_dates(Some(d), None), Some((d, d)));
        assert_eq!(normalize_dates(None, Some(d)), Some((d, d)));
        assert_eq!(normalize_dates(None, None), None);
    }

    #[test]
    fn test_normalize_dates_keeps_both() {
        let entry = date(2024, 3, 1);
        let accounted = date(2024, 3, 2);
        assert_eq!(normalize_dates(Some(entry), Some(accounted)), Some((entry, accounted)));
    }

    #[test]
    fn test_normalize_amount_has_two_decimals() {
        assert_eq!(normalize_amount(Decimal::new(15, 0)).to_string(), "15.00");
        assert_eq!(normalize_amount(Decimal::new(-12347, 3)).to_string(), "-12.35");
        assert_eq!(normalize_amount(Decimal::new(1, 1)).to_string(), "0.10");
    }

    #[test]
    fn test_new_transaction_defaults() {
        let t = Transaction::new("abc", date(2024, 1, 5), Decimal::new(-500, 2));
        assert_eq!(t.entry_date, t.accounted_date);
        assert_eq!(t.variable_symbol, 0);
        assert!(t.remote_account_name.is_empty());
        assert_eq!(t.amount.to_string(), "-5.00");
    }
}
