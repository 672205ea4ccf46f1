use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Serialize, Serializer};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TaxYearError {
    #[error("tax year window is empty: {start} to {end}")]
    EmptyWindow { start: NaiveDate, end: NaiveDate },
}

/// UK Tax Year (runs 6 April to 5 April)
/// The year value is the calendar year it starts in (e.g., 2020 = 2020/21 tax year)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaxYear(pub i32);

impl TaxYear {
    /// Create a tax year from a date
    pub fn from_date(date: NaiveDate) -> Self {
        let year = date.year();
        if (date.month(), date.day()) >= (4, 6) {
            TaxYear(year)
        } else {
            TaxYear(year - 1)
        }
    }

    /// Most recent tax year that has fully ended on `today`
    pub fn last_elapsed(today: NaiveDate) -> Self {
        TaxYear(TaxYear::from_date(today).0 - 1)
    }

    /// Start date of the tax year (6 April). Years outside chrono's range
    /// saturate.
    pub fn start_date(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.0, 4, 6).unwrap_or(NaiveDate::MIN)
    }

    /// End date of the tax year (5 April of the following year)
    pub fn end_date(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.0 + 1, 4, 5).unwrap_or(NaiveDate::MAX)
    }

    /// Display as "2020/21" format
    pub fn display(&self) -> String {
        format!("{}/{:02}", self.0, (self.0 + 1) % 100)
    }

    /// Half-open `[start, end)` window for the year, optionally narrowed for
    /// split-year treatment. `split_end` is the last day still included.
    pub fn window(
        &self,
        split_start: Option<NaiveDate>,
        split_end: Option<NaiveDate>,
    ) -> Result<TaxYearWindow, TaxYearError> {
        let mut start = self.start_date();
        let mut end = next_day(self.end_date());
        if let Some(split_start) = split_start {
            start = start.max(split_start);
        }
        if let Some(split_end) = split_end {
            end = end.min(next_day(split_end));
        }
        if start >= end {
            return Err(TaxYearError::EmptyWindow { start, end });
        }
        if split_start.is_some() || split_end.is_some() {
            log::info!("Tax year {} narrowed to {} until {}", self, start, end);
        }
        Ok(TaxYearWindow {
            tax_year: *self,
            start,
            end,
        })
    }

    /// CGT annual exempt amount for this tax year
    pub fn cgt_exempt_amount(&self) -> Decimal {
        match self.0 {
            2024.. => dec!(3000),
            2023 => dec!(6000),
            2020..=2022 => dec!(12300),
            2019 => dec!(12000),
            2018 => dec!(11700),
            2017 => dec!(11300),
            2015 | 2016 => dec!(11100),
            2014 => dec!(11000),
            2013 => dec!(10900),
            _ => dec!(10600),
        }
    }
}

impl std::fmt::Display for TaxYear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

impl Serialize for TaxYear {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn next_day(date: NaiveDate) -> NaiveDate {
    date.succ_opt().unwrap_or(date)
}

/// Reporting window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaxYearWindow {
    pub tax_year: TaxYear,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TaxYearWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    /// Last day inside the window
    pub fn last_day(&self) -> NaiveDate {
        self.end.pred_opt().unwrap_or(self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn tax_year_from_date_before_april_6() {
        // 5 April 2024 is in 2023/24 tax year
        assert_eq!(TaxYear::from_date(d(2024, 4, 5)), TaxYear(2023));
    }

    #[test]
    fn tax_year_from_date_on_april_6() {
        assert_eq!(TaxYear::from_date(d(2024, 4, 6)), TaxYear(2024));
    }

    #[test]
    fn tax_year_from_date_january_and_december() {
        assert_eq!(TaxYear::from_date(d(2024, 1, 15)), TaxYear(2023));
        assert_eq!(TaxYear::from_date(d(2024, 12, 31)), TaxYear(2024));
    }

    #[test]
    fn last_elapsed_year() {
        assert_eq!(TaxYear::last_elapsed(d(2021, 4, 5)), TaxYear(2019));
        assert_eq!(TaxYear::last_elapsed(d(2021, 4, 6)), TaxYear(2020));
    }

    #[test]
    fn tax_year_display() {
        assert_eq!(TaxYear(2020).display(), "2020/21");
        assert_eq!(TaxYear(1999).display(), "1999/00");
        assert_eq!(TaxYear(2024).to_string(), "2024/25");
    }

    #[test]
    fn window_is_half_open() {
        let w = TaxYear(2020).window(None, None).unwrap();
        assert_eq!(w.start, d(2020, 4, 6));
        assert_eq!(w.end, d(2021, 4, 6));
        assert!(w.contains(d(2020, 4, 6)));
        assert!(w.contains(d(2021, 4, 5)));
        assert!(!w.contains(d(2021, 4, 6)));
        assert!(!w.contains(d(2020, 4, 5)));
        assert_eq!(w.last_day(), d(2021, 4, 5));
    }

    #[test]
    fn split_year_narrows_window() {
        let w = TaxYear(2020)
            .window(Some(d(2020, 9, 1)), Some(d(2021, 1, 31)))
            .unwrap();
        assert_eq!(w.start, d(2020, 9, 1));
        assert_eq!(w.end, d(2021, 2, 1));

        // split dates outside the year do not widen it
        let w = TaxYear(2020)
            .window(Some(d(2019, 1, 1)), Some(d(2022, 1, 1)))
            .unwrap();
        assert_eq!(w.start, d(2020, 4, 6));
        assert_eq!(w.end, d(2021, 4, 6));
    }

    #[test]
    fn empty_split_window_is_rejected() {
        let err = TaxYear(2020)
            .window(Some(d(2021, 1, 1)), Some(d(2020, 12, 31)))
            .unwrap_err();
        assert!(matches!(err, TaxYearError::EmptyWindow { .. }));
    }

    #[test]
    fn cgt_exempt_amounts() {
        assert_eq!(TaxYear(2020).cgt_exempt_amount(), dec!(12300));
        assert_eq!(TaxYear(2023).cgt_exempt_amount(), dec!(6000));
        assert_eq!(TaxYear(2024).cgt_exempt_amount(), dec!(3000));
        assert_eq!(TaxYear(2025).cgt_exempt_amount(), dec!(3000));
        assert_eq!(TaxYear(2017).cgt_exempt_amount(), dec!(11300));
    }
}
