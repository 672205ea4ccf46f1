use super::transaction::normalize_code;
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;

/// Currency all report figures are expressed in
pub const REPORTING_CURRENCY: &str = "GBP";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RateError {
    #[error("no {currency} exchange rate for {year}-{month:02}")]
    MissingRate {
        currency: String,
        year: i32,
        month: u32,
    },
    #[error("invalid {currency} exchange rate {rate} for {period}")]
    InvalidRate {
        currency: String,
        period: String,
        rate: Decimal,
    },
    #[error("invalid rate period '{0}', expected YYYY-MM")]
    InvalidPeriod(String),
}

/// Calendar month a rate applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RatePeriod {
    pub year: i32,
    pub month: u32,
}

impl RatePeriod {
    pub fn of(date: NaiveDate) -> Self {
        RatePeriod {
            year: date.year(),
            month: date.month(),
        }
    }

    fn parse(s: &str) -> Result<Self, RateError> {
        let invalid = || RateError::InvalidPeriod(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        if !(1..=12).contains(&month) {
            return Err(invalid());
        }
        Ok(RatePeriod { year, month })
    }
}

#[derive(Debug, Deserialize)]
struct RateRecord {
    period: String,
    currency: String,
    rate: Decimal,
}

/// Monthly exchange rates, quoted as units of foreign currency per one GBP
/// (the convention HMRC publishes them in).
#[derive(Debug, Clone, Default)]
pub struct RateTable {
    rates: HashMap<(String, RatePeriod), Decimal>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        currency: &str,
        period: RatePeriod,
        rate: Decimal,
    ) -> Result<(), RateError> {
        let currency = normalize_code(currency);
        if rate <= Decimal::ZERO {
            return Err(RateError::InvalidRate {
                currency,
                period: format!("{}-{:02}", period.year, period.month),
                rate,
            });
        }
        self.rates.insert((currency, period), rate);
        Ok(())
    }

    pub fn get(&self, currency: &str, period: RatePeriod) -> Option<Decimal> {
        self.rates.get(&(currency.to_string(), period)).copied()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Read a `period,currency,rate` CSV file
    pub fn read_csv<R: Read>(reader: R) -> anyhow::Result<RateTable> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut table = RateTable::new();
        for record in rdr.deserialize::<RateRecord>() {
            let record = record?;
            let period = RatePeriod::parse(&record.period)?;
            table.insert(&record.currency, period, record.rate)?;
        }
        log::debug!("Loaded {} exchange rates", table.len());
        Ok(table)
    }
}

/// Converts amounts into the reporting currency using a fixed rate table.
#[derive(Debug, Clone, Default)]
pub struct CurrencyConverter {
    table: RateTable,
}

impl CurrencyConverter {
    pub fn new(table: RateTable) -> Self {
        CurrencyConverter { table }
    }

    /// Convert `amount` in `currency` on `date` into GBP.
    ///
    /// GBP amounts pass through untouched; anything else needs a rate for the
    /// month containing `date`, and a missing rate is an error.
    pub fn convert(
        &self,
        amount: Decimal,
        currency: &str,
        date: NaiveDate,
    ) -> Result<Decimal, RateError> {
        let currency = normalize_code(currency);
        if currency == REPORTING_CURRENCY {
            return Ok(amount);
        }
        let period = RatePeriod::of(date);
        let rate = self
            .table
            .get(&currency, period)
            .ok_or(RateError::MissingRate {
                currency,
                year: period.year,
                month: period.month,
            })?;
        Ok(amount / rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn converter() -> CurrencyConverter {
        let csv = "period,currency,rate\n2020-06,USD,1.25\n2020-07,usd,1.3\n";
        CurrencyConverter::new(RateTable::read_csv(csv.as_bytes()).unwrap())
    }

    #[test]
    fn gbp_passes_through() {
        let c = CurrencyConverter::default();
        assert_eq!(c.convert(dec!(123.45), "GBP", d(2020, 1, 1)).unwrap(), dec!(123.45));
        assert_eq!(c.convert(dec!(1), " gbp", d(2020, 1, 1)).unwrap(), dec!(1));
    }

    #[test]
    fn uses_rate_for_month_of_date() {
        let c = converter();
        assert_eq!(c.convert(dec!(125), "USD", d(2020, 6, 30)).unwrap(), dec!(100));
        assert_eq!(c.convert(dec!(130), "USD", d(2020, 7, 1)).unwrap(), dec!(100));
    }

    #[test]
    fn header_only_file_loads_no_rates() {
        let table = RateTable::read_csv("period,currency,rate\n".as_bytes()).unwrap();
        assert!(table.is_empty());
        assert!(!converter().table.is_empty());
    }

    #[test]
    fn missing_rate_is_an_error() {
        let c = converter();
        let err = c.convert(dec!(1), "USD", d(2020, 8, 1)).unwrap_err();
        assert_eq!(
            err,
            RateError::MissingRate {
                currency: "USD".to_string(),
                year: 2020,
                month: 8
            }
        );
        assert!(c.convert(dec!(1), "EUR", d(2020, 6, 1)).is_err());
    }

    #[test]
    fn rejects_non_positive_rates() {
        let csv = "period,currency,rate\n2020-06,USD,0\n";
        assert!(RateTable::read_csv(csv.as_bytes()).is_err());
    }

    #[test]
    fn rejects_bad_periods() {
        assert!(RatePeriod::parse("2020-13").is_err());
        assert!(RatePeriod::parse("June").is_err());
        assert_eq!(
            RatePeriod::parse("2021-03").unwrap(),
            RatePeriod { year: 2021, month: 3 }
        );
    }
}
