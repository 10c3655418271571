// src/services/catalog.rs
use crate::models::{Instrument, InstrumentCategory};
use csv::Reader;
use log::info;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::error::Error;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

pub const MIN_HORIZON_YEARS: u8 = 1;
pub const MAX_HORIZON_YEARS: u8 = 5;

#[derive(Debug)]
pub enum CatalogError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidRow { line: u64, message: String },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CatalogError::Io(e) => write!(f, "Failed to open catalog: {}", e),
            CatalogError::Csv(e) => write!(f, "Failed to read catalog CSV: {}", e),
            CatalogError::InvalidRow { line, message } => {
                write!(f, "Invalid catalog row at line {}: {}", line, message)
            }
        }
    }
}

impl Error for CatalogError {}

impl From<std::io::Error> for CatalogError {
    fn from(e: std::io::Error) -> Self {
        CatalogError::Io(e)
    }
}

impl From<csv::Error> for CatalogError {
    fn from(e: csv::Error) -> Self {
        CatalogError::Csv(e)
    }
}

/// Instruments in load order. Catalog order is the tie-break for equal
/// rates: the first-seen instrument wins.
#[derive(Debug, Clone, Default)]
pub struct InstrumentCatalog {
    instruments: Vec<Instrument>,
}

impl InstrumentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an instrument unless one with the same (name, horizon) exists.
    /// Returns whether it was added.
    pub fn insert(&mut self, instrument: Instrument) -> bool {
        if self.contains(&instrument.name, instrument.horizon_years) {
            info!(
                "Instrument already exists for {} for {} years. Skipping insert.",
                instrument.name, instrument.horizon_years
            );
            return false;
        }
        self.instruments.push(instrument);
        true
    }

    pub fn contains(&self, name: &str, horizon_years: u8) -> bool {
        self.instruments
            .iter()
            .any(|i| i.name == name && i.horizon_years == horizon_years)
    }

    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    pub fn for_horizon(&self, horizon_years: u8) -> impl Iterator<Item = &Instrument> + '_ {
        self.instruments
            .iter()
            .filter(move |i| i.horizon_years == horizon_years)
    }

    /// Highest-rate instrument of `category` for the horizon.
    pub fn select_best_instrument(
        &self,
        category: InstrumentCategory,
        horizon_years: u8,
    ) -> Option<&Instrument> {
        self.best_among(&[category], horizon_years)
    }

    /// Highest-rate instrument across several categories; equal rates keep
    /// whichever came first in the catalog.
    pub fn best_among(
        &self,
        categories: &[InstrumentCategory],
        horizon_years: u8,
    ) -> Option<&Instrument> {
        self.for_horizon(horizon_years)
            .filter(|i| categories.contains(&i.category))
            .fold(None, |best: Option<&Instrument>, candidate| match best {
                Some(current) if current.annual_rate >= candidate.annual_rate => Some(current),
                _ => Some(candidate),
            })
    }

    /// Reads `category,name,description,horizon_years,annual_rate` rows.
    /// The header row is required; an empty description is stored as `None`.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        let mut rdr = Reader::from_reader(reader);
        let mut catalog = InstrumentCatalog::new();

        for result in rdr.records() {
            let record = result?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            let invalid = |message: String| CatalogError::InvalidRow { line, message };

            if record.len() < 5 {
                return Err(invalid(format!("expected 5 columns, found {}", record.len())));
            }

            let category = InstrumentCategory::parse(&record[0])
                .ok_or_else(|| invalid(format!("unknown category '{}'", record[0].trim())))?;
            let name = record[1].trim().to_string();
            if name.is_empty() {
                return Err(invalid("instrument name is empty".to_string()));
            }
            let description = match record[2].trim() {
                "" => None,
                val => Some(val.to_string()),
            };
            let horizon_years: u8 = record[3]
                .trim()
                .parse()
                .map_err(|_| invalid(format!("horizon '{}' is not a whole number", record[3].trim())))?;
            if !(MIN_HORIZON_YEARS..=MAX_HORIZON_YEARS).contains(&horizon_years) {
                return Err(invalid(format!("horizon {} outside 1-5 years", horizon_years)));
            }
            let annual_rate = Decimal::from_str(record[4].trim())
                .map_err(|e| invalid(format!("rate '{}': {}", record[4].trim(), e)))?;
            if annual_rate < Decimal::ZERO {
                return Err(invalid(format!("negative rate {}", annual_rate)));
            }

            let added = catalog.insert(Instrument {
                category,
                name: name.clone(),
                description,
                horizon_years,
                annual_rate,
            });
            if !added {
                return Err(invalid(format!("duplicate instrument {} for {} years", name, horizon_years)));
            }
        }

        info!("Loaded {} instruments from catalog CSV", catalog.len());
        Ok(catalog)
    }

    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let file = File::open(path)?;
        Self::from_csv_reader(file)
    }

    /// Built-in product table used when no catalog file is configured.
    pub fn seeded() -> Self {
        use InstrumentCategory::*;

        let rows: &[(InstrumentCategory, &str, Option<&str>, u8, Decimal)] = &[
            (Equity, "Stocks | Top 25 Sensex Stocks", Some("Top 25 companies in stock Market"), 1, dec!(0.02)),
            (Equity, "Stocks | Top 25 Sensex Stocks", None, 2, dec!(0.10)),
            (Equity, "Stocks | Top 25 Sensex Stocks", None, 3, dec!(0.21)),
            (Equity, "Stocks | Top 25 Sensex Stocks", None, 4, dec!(0.24)),
            (Equity, "Stocks | Top 25 Sensex Stocks", None, 5, dec!(0.30)),
            (Gold, "Digital Gold", Some("Gold investment in digital form"), 1, dec!(0.08)),
            (Gold, "Digital Gold", None, 2, dec!(0.21)),
            (Gold, "Digital Gold", None, 3, dec!(0.17)),
            (Gold, "Digital Gold", None, 4, dec!(0.17)),
            (Gold, "Digital Gold", None, 5, dec!(0.24)),
            (MutualFund, "UTI Nifty Next 50 Index Fund Direct - Growth", None, 1, dec!(0.08)),
            (MutualFund, "DSP Nifty Next 50 Index Fund Direct - Growth", None, 2, dec!(0.21)),
            (MutualFund, "ICICI Prudential Nifty Next 50 Index Fund Direct - Growth", None, 3, dec!(0.17)),
            (MutualFund, "SBI Nifty Index Direct Plan-Growth", None, 4, dec!(0.19)),
            (MutualFund, "HDFC Nifty 50 Index Fund Direct-Growth", None, 5, dec!(0.24)),
            (MutualFund, "Nippon India Large Cap Fund Direct-Growth", None, 1, dec!(0.108)),
            (MutualFund, "Nippon India Large Cap Fund Direct-Growth", None, 2, dec!(0.21)),
            (MutualFund, "ICICI Prudential Bluechip Fund Direct-Growth", None, 3, dec!(0.19)),
            (MutualFund, "ICICI Prudential Bluechip Fund Direct-Growth", None, 4, dec!(0.19)),
            (MutualFund, "HDFC Large Cap Fund Direct-Growth", None, 5, dec!(0.25)),
            (MutualFund, "HDFC Midcap Opportunities Fund Direct-Growth", None, 1, dec!(0.097)),
            (MutualFund, "Nippon India Growth Fund Direct-Growth", None, 2, dec!(0.30)),
            (MutualFund, "ICICI Prudential Midcap Direct Plan-Growth", None, 3, dec!(0.25)),
            (MutualFund, "SBI Magnum Mid Cap Direct Plan-Growth", None, 4, dec!(0.28)),
            (MutualFund, "Kotak Emerging Equity Fund Direct-Growth", None, 5, dec!(0.33)),
            (MutualFund, "Tata Small Cap Fund Direct - Growth", None, 1, dec!(0.07)),
            (MutualFund, "Nippon India Small Cap Fund Direct-Growth", None, 2, dec!(0.26)),
            (MutualFund, "Franklin India Smaller Companies Fund Direct-Growth", None, 3, dec!(0.23)),
            (MutualFund, "HDFC Small Cap Fund Direct-Growth", None, 4, dec!(0.23)),
            (MutualFund, "Axis Small Cap Fund Direct-Growth", None, 5, dec!(0.38)),
            (MutualFund, "ICICI Prudential Equity & Debt Fund Direct-Growth", None, 1, dec!(0.11)),
            (MutualFund, "DSP Aggressive Hybrid Fund Direct-Growth", None, 2, dec!(0.21)),
            (MutualFund, "Kotak Equity Hybrid Fund Direct-Growth", None, 3, dec!(0.18)),
            (MutualFund, "UTI Aggressive Hybrid Fund Direct Fund-Growth", None, 4, dec!(0.19)),
            (MutualFund, "SBI Equity Hybrid Fund Direct Plan-Growth", None, 5, dec!(0.23)),
            (MutualFund, "HDFC Multi Asset Fund Direct-Growth", None, 1, dec!(0.10)),
            (MutualFund, "Tata Multi Asset Opportunities Fund Direct - Growth", None, 2, dec!(0.19)),
            (MutualFund, "SBI Multi Asset Allocation Fund Direct-Growth", None, 3, dec!(0.17)),
            (MutualFund, "Axis Multi Asset Allocation Direct Plan-Growth", None, 4, dec!(0.18)),
            (MutualFund, "ICICI Prudential Multi Asset Fund Direct-Growth", None, 5, dec!(0.22)),
            (MutualFund, "ICICI Prudential Short Term Debt Fund Direct Plan-Growth", None, 1, dec!(0.09)),
            (MutualFund, "HDFC Short Term Debt Fund Direct Plan-Growth", None, 2, dec!(0.085)),
            (MutualFund, "SBI Short Term Debt Fund Direct Plan-Growth", None, 3, dec!(0.08)),
            (MutualFund, "Tata Short Term Bond Direct Plan-Growth", None, 4, dec!(0.08)),
            (MutualFund, "Nippon India Short Term Fund Direct-Growth", None, 5, dec!(0.071)),
            (BankSavings, "SBI Recurring Deposit", None, 1, dec!(0.068)),
            (BankSavings, "HDFC Bank Recurring Deposit", None, 2, dec!(0.067)),
            (BankSavings, "Kotak Recurring Deposit", None, 3, dec!(0.067)),
            (BankSavings, "ICICI Bank Recurring Deposit", None, 4, dec!(0.067)),
            (BankSavings, "Axis Bank Recurring Deposit", None, 5, dec!(0.067)),
            (BankSavings, "Axis Bank Fixed Deposit", None, 1, dec!(0.03)),
            (BankSavings, "Kotak Fixed Deposit", None, 2, dec!(0.06)),
            (BankSavings, "SBI Fixed Deposit", None, 3, dec!(0.07)),
            (BankSavings, "HDFC Bank Fixed Deposit", None, 4, dec!(0.07)),
            (BankSavings, "Bandhan Fixed Deposit", None, 5, dec!(0.07)),
        ];

        let mut catalog = InstrumentCatalog::new();
        for (category, name, description, horizon_years, annual_rate) in rows {
            catalog.insert(Instrument {
                category: *category,
                name: name.to_string(),
                description: description.map(str::to_string),
                horizon_years: *horizon_years,
                annual_rate: *annual_rate,
            });
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instrument(category: InstrumentCategory, name: &str, horizon_years: u8, rate: Decimal) -> Instrument {
        Instrument {
            category,
            name: name.to_string(),
            description: None,
            horizon_years,
            annual_rate: rate,
        }
    }

    #[test]
    fn seeded_catalog_covers_every_horizon_and_category() {
        let catalog = InstrumentCatalog::seeded();
        assert_eq!(catalog.len(), 55);
        for years in MIN_HORIZON_YEARS..=MAX_HORIZON_YEARS {
            for category in InstrumentCategory::ALL {
                assert!(
                    catalog.select_best_instrument(category, years).is_some(),
                    "missing {} for {} years",
                    category,
                    years
                );
            }
        }
    }

    #[test]
    fn best_instrument_is_highest_rate_for_horizon() {
        let catalog = InstrumentCatalog::seeded();
        let bank = catalog.select_best_instrument(InstrumentCategory::BankSavings, 5).unwrap();
        assert_eq!(bank.name, "Bandhan Fixed Deposit");
        let mf = catalog.select_best_instrument(InstrumentCategory::MutualFund, 1).unwrap();
        assert_eq!(mf.name, "ICICI Prudential Equity & Debt Fund Direct-Growth");
        assert!(catalog.select_best_instrument(InstrumentCategory::Gold, 6).is_none());
    }

    #[test]
    fn equal_rates_keep_catalog_order() {
        let mut catalog = InstrumentCatalog::new();
        catalog.insert(instrument(InstrumentCategory::MutualFund, "First Fund", 2, dec!(0.21)));
        catalog.insert(instrument(InstrumentCategory::MutualFund, "Second Fund", 2, dec!(0.21)));
        catalog.insert(instrument(InstrumentCategory::MutualFund, "Lower Fund", 2, dec!(0.20)));

        let best = catalog.select_best_instrument(InstrumentCategory::MutualFund, 2).unwrap();
        assert_eq!(best.name, "First Fund");
    }

    #[test]
    fn duplicate_name_and_horizon_keeps_first() {
        let mut catalog = InstrumentCatalog::new();
        assert!(catalog.insert(instrument(InstrumentCategory::Gold, "Digital Gold", 1, dec!(0.08))));
        assert!(!catalog.insert(instrument(InstrumentCategory::Gold, "Digital Gold", 1, dec!(0.50))));
        assert!(catalog.insert(instrument(InstrumentCategory::Gold, "Digital Gold", 2, dec!(0.21))));
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.instruments()[0].annual_rate, dec!(0.08));
    }

    #[test]
    fn loads_catalog_from_csv() {
        let csv = "category,name,description,horizon_years,annual_rate\n\
                   Bank Savings Products,SBI Recurring Deposit,,1,0.068\n\
                   mutualfund,HDFC Multi Asset Fund Direct-Growth,Hybrid,1,0.10\n\
                   Gold,Digital Gold,Gold in digital form,1,0.08\n";
        let catalog = InstrumentCatalog::from_csv_reader(csv.as_bytes()).unwrap();

        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.instruments()[0].description, None);
        assert_eq!(catalog.instruments()[1].category, InstrumentCategory::MutualFund);
        assert_eq!(catalog.instruments()[1].description.as_deref(), Some("Hybrid"));
        assert_eq!(catalog.for_horizon(1).count(), 3);
    }

    #[test]
    fn rejects_invalid_csv_rows() {
        let header = "category,name,description,horizon_years,annual_rate\n";
        let bad_rows = [
            "Crypto,Coin,,1,0.5\n",
            "Gold,Digital Gold,,6,0.08\n",
            "Gold,Digital Gold,,1,-0.01\n",
            "Gold,Digital Gold,,one,0.08\n",
            "Gold,,,1,0.08\n",
            "Gold,Digital Gold,,1,0.08\nGold,Digital Gold,,1,0.09\n",
        ];
        for row in bad_rows {
            let input = format!("{}{}", header, row);
            let result = InstrumentCatalog::from_csv_reader(input.as_bytes());
            assert!(
                matches!(result, Err(CatalogError::InvalidRow { .. })),
                "expected rejection for {:?}",
                row
            );
        }
    }
}
