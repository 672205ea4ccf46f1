//! Report command - disposals and gains for one tax year

use crate::cmd::{InputArgs, YearArgs};
use crate::core::{
    calculate_cgt, DisposalResult, MatchedPortion, PoolState, TaxYearAggregator, TaxYearReport,
    TaxYearWindow,
};
use crate::utils::{format_gbp, format_quantity, write_csv};
use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct ReportCommand {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    year: YearArgs,

    /// Output matched portions as CSV
    #[arg(long, conflicts_with = "json")]
    csv: bool,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

impl ReportCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let transactions = self.input.read_transactions()?;
        let converter = self.input.converter()?;
        let window = self.year.window()?;

        let outcome = calculate_cgt(&transactions, &converter)?;
        let report = TaxYearAggregator::new(&outcome).report(&window);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else if self.csv {
            let rows = report.disposals.iter().flat_map(|d| {
                d.matches.iter().map(move |m| PortionRecord::new(d, m))
            });
            write_csv(rows, io::stdout())?;
        } else {
            print_report(&report, &window);
        }
        Ok(())
    }
}

fn print_report(report: &TaxYearReport, window: &TaxYearWindow) {
    let last_day = window.last_day();

    println!();
    println!("CAPITAL GAINS REPORT ({})", report.tax_year);
    println!("  Period: {} to {}", report.start, last_day);
    println!();
    println!("  Disposals: {}", report.disposal_count());
    println!(
        "  Proceeds: {} | Allowable costs: {}",
        format_gbp(report.total_proceeds),
        format_gbp(report.total_allowable_cost)
    );
    println!(
        "  Gains: {} | Losses: {} | Net gain: {}",
        format_gbp(report.total_gains),
        format_gbp(report.total_losses),
        format_gbp(report.net_gain)
    );
    println!(
        "  Exempt: {} | Taxable gain: {}",
        format_gbp(report.exempt_amount),
        format_gbp(report.taxable_gain)
    );
    println!();

    if !report.disposals.is_empty() {
        println!("DISPOSALS");
        let rows: Vec<DisposalRow> = report.disposals.iter().flat_map(disposal_rows).collect();
        print_table(rows);
        println!();
    }

    println!("POOLS AT {}", last_day);
    if report.pools.is_empty() {
        println!("  (no pools)");
    } else {
        let rows: Vec<PoolRow> = report.pools.iter().map(PoolRow::from).collect();
        print_table(rows);
    }
    println!();
}

fn print_table<T: Tabled>(rows: Vec<T>) {
    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{}", table);
}

/// The disposal itself, then one row per rule when it was split
fn disposal_rows(d: &DisposalResult) -> Vec<DisposalRow> {
    let rules: Vec<&str> = d.matches.iter().map(|m| m.rule.display()).collect();
    let mut rows = vec![DisposalRow {
        date: d.date.to_string(),
        symbol: d.symbol.clone(),
        rule: rules.join(" + "),
        quantity: format_quantity(d.quantity),
        proceeds: format_gbp(d.proceeds),
        cost: format_gbp(d.allowable_cost),
        gain: format_gbp(d.gain),
    }];
    if d.matches.len() > 1 {
        rows.extend(d.matches.iter().map(|m| DisposalRow {
            date: String::new(),
            symbol: String::new(),
            rule: rule_label(m),
            quantity: format_quantity(m.quantity),
            proceeds: format_gbp(m.proceeds),
            cost: format_gbp(m.cost),
            gain: format_gbp(m.gain()),
        }));
    }
    rows
}

fn rule_label(m: &MatchedPortion) -> String {
    match m.rule.matched_date() {
        Some(acquired) => format!("{} {}", m.rule, acquired),
        None => m.rule.to_string(),
    }
}

#[derive(Debug, Clone, Tabled)]
struct DisposalRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Rule")]
    rule: String,
    #[tabled(rename = "Quantity")]
    quantity: String,
    #[tabled(rename = "Proceeds")]
    proceeds: String,
    #[tabled(rename = "Cost")]
    cost: String,
    #[tabled(rename = "Gain")]
    gain: String,
}

#[derive(Debug, Clone, Tabled)]
pub(crate) struct PoolRow {
    #[tabled(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Quantity")]
    quantity: String,
    #[tabled(rename = "Cost (GBP)")]
    cost: String,
    #[tabled(rename = "Average Cost")]
    average_cost: String,
}

impl From<&PoolState> for PoolRow {
    fn from(p: &PoolState) -> Self {
        PoolRow {
            symbol: p.symbol.clone(),
            quantity: format_quantity(p.quantity),
            cost: format_gbp(p.cost),
            average_cost: format_gbp(p.average_cost()),
        }
    }
}

/// CSV row for one matched portion of a disposal
#[derive(Debug, Serialize)]
struct PortionRecord<'a> {
    date: NaiveDate,
    symbol: &'a str,
    broker: &'a str,
    rule: &'static str,
    acquired: Option<NaiveDate>,
    quantity: Decimal,
    proceeds: Decimal,
    cost: Decimal,
    gain: Decimal,
}

impl<'a> PortionRecord<'a> {
    fn new(d: &'a DisposalResult, m: &MatchedPortion) -> Self {
        PortionRecord {
            date: d.date,
            symbol: &d.symbol,
            broker: &d.broker,
            rule: m.rule.display(),
            acquired: m.rule.matched_date(),
            quantity: m.quantity,
            proceeds: m.proceeds,
            cost: m.cost,
            gain: m.gain(),
        }
    }
}
