//! Validate command - surface data quality issues without generating full reports

use crate::cmd::InputArgs;
use crate::core::{calculate_cgt, check_transactions, TaxYear, TransactionWarning};
use clap::Args;
use serde::Serialize;

#[derive(Args, Debug)]
pub struct ValidateCommand {
    #[command(flatten)]
    input: InputArgs,

    /// Tax year to filter (first calendar year, e.g., 2020 for 2020/21)
    #[arg(short, long)]
    year: Option<i32>,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

/// A validation issue for output
#[derive(Debug, Clone, Serialize)]
struct ValidationIssue {
    #[serde(rename = "type")]
    issue_type: String,
    date: String,
    symbol: String,
    message: String,
}

impl From<&TransactionWarning> for ValidationIssue {
    fn from(w: &TransactionWarning) -> Self {
        ValidationIssue {
            issue_type: w.warning.name().to_string(),
            date: w.date.format("%Y-%m-%d").to_string(),
            symbol: w.symbol.clone().unwrap_or_default(),
            message: w.warning.message(),
        }
    }
}

/// JSON output structure
#[derive(Debug, Serialize)]
struct ValidationOutput {
    tax_year: String,
    issue_count: usize,
    issues: Vec<ValidationIssue>,
}

impl ValidateCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let transactions = self.input.read_transactions()?;
        let converter = self.input.converter()?;
        let tax_year = self.year.map(TaxYear);

        let mut issues: Vec<ValidationIssue> = check_transactions(&transactions)
            .iter()
            .filter(|w| tax_year.is_none_or(|y| TaxYear::from_date(w.date) == y))
            .map(ValidationIssue::from)
            .collect();

        // A run that cannot complete is always reported, whatever the year
        if let Err(err) = calculate_cgt(&transactions, &converter) {
            issues.push(ValidationIssue {
                issue_type: "CalculationFailed".to_string(),
                date: String::new(),
                symbol: String::new(),
                message: err.to_string(),
            });
        }

        if self.json {
            self.print_json(&issues, tax_year)?;
        } else {
            self.print_text(&issues, tax_year);
        }

        // Exit with code 1 if issues found
        if !issues.is_empty() {
            std::process::exit(1);
        }
        Ok(())
    }

    fn print_text(&self, issues: &[ValidationIssue], year: Option<TaxYear>) {
        let year_str = year.map_or("All Years".to_string(), |y| y.display());

        println!();
        println!("VALIDATION RESULTS ({})", year_str);
        println!();

        if issues.is_empty() {
            println!("\u{2713} No issues found.");
            return;
        }

        println!("\u{26A0} {} issue(s) found:", issues.len());
        println!();
        for (i, issue) in issues.iter().enumerate() {
            println!(
                "  {}. [{}] {} {}",
                i + 1,
                issue.issue_type,
                issue.date,
                issue.symbol
            );
            println!("     {}", issue.message);
            println!();
        }
    }

    fn print_json(&self, issues: &[ValidationIssue], year: Option<TaxYear>) -> anyhow::Result<()> {
        let year_str = year.map_or("All Years".to_string(), |y| y.display());

        let output = ValidationOutput {
            tax_year: year_str,
            issue_count: issues.len(),
            issues: issues.to_vec(),
        };

        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }
}
