//! Pools command - section 104 pool balances over time

use crate::cmd::report::PoolRow;
use crate::cmd::InputArgs;
use crate::core::{calculate_cgt, PoolHistoryEntry, PoolState, TaxYear, TaxYearAggregator};
use crate::utils::{format_gbp, format_quantity};
use clap::Args;
use serde::Serialize;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct PoolsCommand {
    #[command(flatten)]
    input: InputArgs,

    /// Tax year to show (first calendar year, e.g., 2020 for 2020/21)
    #[arg(short, long)]
    year: Option<i32>,

    /// Filter by symbol
    #[arg(short, long)]
    symbol: Option<String>,

    /// Show every pool change instead of year-end snapshots
    #[arg(long)]
    history: bool,

    /// Output as JSON instead of formatted table
    #[arg(long)]
    json: bool,
}

impl PoolsCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let transactions = self.input.read_transactions()?;
        let converter = self.input.converter()?;
        let outcome = calculate_cgt(&transactions, &converter)?;
        let tax_year = self.year.map(TaxYear);

        if self.history {
            let entries: Vec<&PoolHistoryEntry> = outcome
                .history
                .iter()
                .filter(|e| tax_year.is_none_or(|y| TaxYear::from_date(e.date) == y))
                .filter(|e| self.matches_symbol(&e.symbol))
                .collect();
            if self.json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                print_history(&entries);
            }
            return Ok(());
        }

        let aggregator = TaxYearAggregator::new(&outcome);
        let years = match tax_year {
            Some(year) => vec![year],
            None => aggregator.tax_years(),
        };
        let mut snapshots = Vec::new();
        for tax_year in years {
            let window = tax_year.window(None, None)?;
            let pools: Vec<PoolState> = aggregator
                .pools_before(window.end)
                .into_iter()
                .filter(|p| self.matches_symbol(&p.symbol))
                .collect();
            if !pools.is_empty() {
                snapshots.push(YearEndSnapshot { tax_year, pools });
            }
        }

        if self.json {
            println!("{}", serde_json::to_string_pretty(&snapshots)?);
        } else {
            print_year_end(&snapshots);
        }
        Ok(())
    }

    fn matches_symbol(&self, symbol: &str) -> bool {
        self.symbol
            .as_deref()
            .is_none_or(|s| s.trim().eq_ignore_ascii_case(symbol))
    }
}

#[derive(Debug, Serialize)]
struct YearEndSnapshot {
    tax_year: TaxYear,
    pools: Vec<PoolState>,
}

fn print_year_end(snapshots: &[YearEndSnapshot]) {
    if snapshots.is_empty() {
        println!("No pool balances found matching filters");
        return;
    }

    println!();
    println!("POOL BALANCES");
    println!();

    for snapshot in snapshots {
        println!("Tax Year {} (at {})", snapshot.tax_year, snapshot.tax_year.end_date());
        let rows: Vec<PoolRow> = snapshot.pools.iter().map(PoolRow::from).collect();
        let table = Table::new(rows)
            .with(Style::rounded())
            .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
            .to_string();
        println!("{}", table);
        println!();
    }
}

#[derive(Debug, Clone, Tabled)]
struct HistoryRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Quantity")]
    quantity: String,
    #[tabled(rename = "Cost (GBP)")]
    cost: String,
}

fn print_history(entries: &[&PoolHistoryEntry]) {
    if entries.is_empty() {
        println!("No pool history found matching filters");
        return;
    }

    let rows: Vec<HistoryRow> = entries
        .iter()
        .map(|e| HistoryRow {
            date: e.date.format("%Y-%m-%d").to_string(),
            symbol: e.symbol.clone(),
            quantity: format_quantity(e.quantity),
            cost: format_gbp(e.cost),
        })
        .collect();

    println!();
    println!("POOL HISTORY");
    println!();

    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{}", table);
}
