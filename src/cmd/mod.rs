pub mod pools;
pub mod report;
pub mod schema;
pub mod validate;

use crate::core::{
    read_csv, read_json, CurrencyConverter, RateTable, TaxYear, TaxYearWindow, Transaction,
};
use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::Args;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

/// Input files shared by every calculating command
#[derive(Args, Debug)]
pub struct InputArgs {
    /// Transactions file (CSV or JSON). Reads from stdin with "-".
    #[arg(short, long, default_value = "-")]
    pub transactions: PathBuf,

    /// Monthly exchange rates CSV (period,currency,rate), needed for non-GBP transactions
    #[arg(short, long)]
    pub rates: Option<PathBuf>,
}

impl InputArgs {
    pub fn read_transactions(&self) -> anyhow::Result<Vec<Transaction>> {
        let transactions = read_transactions(&self.transactions)?;
        log::info!("Read {} transactions", transactions.len());
        Ok(transactions)
    }

    pub fn converter(&self) -> anyhow::Result<CurrencyConverter> {
        let Some(path) = &self.rates else {
            return Ok(CurrencyConverter::default());
        };
        let file = File::open(path)
            .with_context(|| format!("failed to open rates file {}", path.display()))?;
        let table = RateTable::read_csv(BufReader::new(file))?;
        if table.is_empty() {
            log::warn!("Rates file {} has no rates", path.display());
        }
        Ok(CurrencyConverter::new(table))
    }
}

/// Tax year selection with optional split-year dates
#[derive(Args, Debug)]
pub struct YearArgs {
    /// First calendar year of the tax year (e.g., 2020 for 2020/21). Defaults to the last ended tax year.
    #[arg(short, long)]
    pub year: Option<i32>,

    /// First day of a split year (YYYY-MM-DD)
    #[arg(long)]
    pub split_year_start: Option<NaiveDate>,

    /// Last day of a split year (YYYY-MM-DD)
    #[arg(long)]
    pub split_year_end: Option<NaiveDate>,
}

impl YearArgs {
    pub fn tax_year(&self) -> TaxYear {
        self.year
            .map(TaxYear)
            .unwrap_or_else(|| TaxYear::last_elapsed(Local::now().date_naive()))
    }

    pub fn window(&self) -> anyhow::Result<TaxYearWindow> {
        Ok(self
            .tax_year()
            .window(self.split_year_start, self.split_year_end)?)
    }
}

/// Read transactions (CSV or JSON) from a file, or stdin with "-"
pub fn read_transactions(path: &Path) -> anyhow::Result<Vec<Transaction>> {
    if path.as_os_str() == "-" {
        read_from_stdin()
    } else {
        read_from_file(path)
    }
}

fn read_from_file(path: &Path) -> anyhow::Result<Vec<Transaction>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open transactions file {}", path.display()))?;
    let reader = BufReader::new(file);
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        read_json(reader)
    } else {
        read_csv(reader)
    }
}

fn read_from_stdin() -> anyhow::Result<Vec<Transaction>> {
    let stdin = io::stdin();
    let mut reader = BufReader::new(stdin.lock());

    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer)?;

    if buffer.iter().all(u8::is_ascii_whitespace) {
        anyhow::bail!("No input received. Provide a file or pipe data to stdin.");
    }

    let is_json = buffer
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'{');
    let cursor = io::Cursor::new(buffer);
    if is_json {
        read_json(cursor)
    } else {
        read_csv(cursor)
    }
}
