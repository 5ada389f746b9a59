use std::collections::HashMap;

use encoding_rs::WINDOWS_1250;

use crate::error::{BankreaderError, Result};
use crate::readers::{BestReader, CsvField, CsvReader, GpcReader, Mt940Reader, Reader};
use crate::readers::csv::CsvReaderConfig;

/// Statement readers by key. Built once at startup, read-only afterwards.
#[derive(Default)]
pub struct ReaderRegistry {
    readers: HashMap<String, Box<dyn Reader>>,
}

impl ReaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All readers that ship with bankreader.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(BestReader::new().with_key("best"));
        registry.register(GpcReader::new().with_key("gpc"));
        registry.register(Mt940Reader::new().with_key("mt940"));
        registry.register(BestReader::with_label("Komerční banka Best").with_key("kb_best"));
        registry.register(komercni_banka_csv());
        registry
    }

    /// Built-in readers plus the CSV variants declared in the settings.
    pub fn from_configs(configs: &[CsvReaderConfig]) -> Result<Self> {
        let mut registry = Self::with_builtin();
        for config in configs {
            let reader = CsvReader::from_config(config).map_err(BankreaderError::Settings)?;
            registry.register(reader);
        }
        Ok(registry)
    }

    /// Register `reader` under its own key, or its type name when it has none.
    /// A later registration replaces an earlier one with the same key.
    pub fn register<R: Reader + 'static>(&mut self, reader: R) {
        let key = reader
            .key()
            .map(str::to_string)
            .unwrap_or_else(|| std::any::type_name::<R>().to_string());
        self.readers.insert(key, Box::new(reader));
    }

    pub fn get(&self, key: &str) -> Option<&dyn Reader> {
        self.readers.get(key).map(|r| r.as_ref())
    }

    /// `(key, label)` pairs sorted by label.
    pub fn choices(&self) -> Vec<(&str, &str)> {
        let mut choices: Vec<(&str, &str)> = self
            .readers
            .iter()
            .map(|(key, reader)| (key.as_str(), reader.label()))
            .collect();
        choices.sort_by(|a, b| a.1.cmp(b.1).then(a.0.cmp(b.0)));
        choices
    }
}

fn komercni_banka_csv() -> CsvReader {
    CsvReader::new(
        "Komerční banka CSV",
        &[
            ("Datum splatnosti", CsvField::AccountedDate),
            ("Datum odepsani JB", CsvField::EntryDate),
            ("Protiucet/Kod banky", CsvField::RemoteAccountNumber),
            ("Nazev protiuctu", CsvField::RemoteAccountName),
            ("Castka", CsvField::Amount),
            ("VS", CsvField::VariableSymbol),
            ("KS", CsvField::ConstantSymbol),
            ("SS", CsvField::SpecificSymbol),
            ("Identifikace transakce", CsvField::TransactionId),
            ("Popis prikazce", CsvField::SenderDescription),
            ("Popis pro prijemce", CsvField::RecipientDescription),
        ],
    )
    .with_key("kb_csv")
    .with_encoding(WINDOWS_1250)
    .with_delimiter(b';')
    .with_date_format("%Y-%m-%d")
    .with_decimal_separator(',')
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::readers::{ParseError, Transactions};

    struct Unkeyed;

    impl Reader for Unkeyed {
        fn label(&self) -> &str {
            "AAA first by label"
        }

        fn read_transactions(&self, _text: String) -> std::result::Result<Transactions<'_>, ParseError> {
            Ok(Box::new(std::iter::empty()))
        }
    }

    #[test]
    fn test_builtin_choices_sorted_by_label() {
        let registry = ReaderRegistry::with_builtin();
        let labels: Vec<&str> = registry.choices().into_iter().map(|(_, label)| label).collect();
        assert_eq!(
            labels,
            vec!["Best", "GPC", "Komerční banka Best", "Komerční banka CSV", "MT940 (MultiCash)"]
        );
    }

    #[test]
    fn test_get() {
        let registry = ReaderRegistry::with_builtin();
        assert_eq!(registry.get("gpc").unwrap().label(), "GPC");
        assert_eq!(registry.get("kb_csv").unwrap().encoding().name(), "windows-1250");
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_default_key_is_type_name() {
        let mut registry = ReaderRegistry::new();
        registry.register(Unkeyed);
        let key = std::any::type_name::<Unkeyed>();
        assert!(key.ends_with("registry::tests::Unkeyed"));
        assert_eq!(registry.get(key).unwrap().label(), "AAA first by label");
        assert_eq!(registry.choices(), vec![(key, "AAA first by label")]);
    }

    #[test]
    fn test_from_configs_adds_csv_variants() {
        let config: CsvReaderConfig = serde_json::from_str(
            r#"{"key": "bank_x", "label": "Bank X", "column_mapping": {"Date": "accounted_date", "Amount": "amount"}}"#,
        )
        .unwrap();
        let registry = ReaderRegistry::from_configs(&[config]).unwrap();
        let reader = registry.get("bank_x").unwrap();
        let rows: Vec<_> = reader
            .read_transactions("Date,Amount\n2024-01-02,3.5\n".to_string())
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert_eq!(rows[0].amount, Decimal::new(350, 2));
        assert_eq!(registry.choices().len(), 6);
    }

    #[test]
    fn test_komercni_banka_csv() {
        let registry = ReaderRegistry::with_builtin();
        let reader = registry.get("kb_csv").unwrap();
        let body = "\
Cislo uctu;123456789/0100
Datum splatnosti;Datum odepsani JB;Protiucet/Kod banky;Nazev protiuctu;Castka;Originalni castka;VS;KS;SS;Identifikace transakce;Popis prikazce;Popis pro prijemce
2024-03-02;2024-03-01;19-123/0800;ACME;-1 200,00;;0000001234;0308;;X-1;najem;brezen
";
        let mut source = std::io::Cursor::new(body.as_bytes().to_vec());
        let rows: Vec<_> = reader
            .read_file(&mut source)
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert_eq!(rows.len(), 1);
        let t = &rows[0];
        assert_eq!(t.transaction_id, "X-1");
        assert_eq!(t.amount, Decimal::new(-120000, 2));
        assert_eq!(t.remote_account_number, "19-123/0800");
        assert_eq!(t.variable_symbol, 1234);
        assert_eq!(t.constant_symbol, 308);
        assert_eq!(t.sender_description, "najem");
        assert_eq!(t.recipient_description, "brezen");
    }
}
