//! Schema command - print expected input formats

use crate::core::{TransactionInput, TransactionRecord};
use clap::Args;
use schemars::schema_for;

#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// Output format: json-schema, csv-header or csv-fields
    #[arg(value_enum, default_value = "json-schema")]
    format: SchemaFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SchemaFormat {
    /// JSON Schema for the transactions file
    JsonSchema,
    /// CSV header row with column names
    CsvHeader,
    /// CSV column descriptions
    CsvFields,
    /// Exchange rate CSV format
    Rates,
}

impl SchemaCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        match self.format {
            SchemaFormat::JsonSchema => {
                let schema = schema_for!(TransactionInput);
                println!("{}", serde_json::to_string_pretty(&schema)?);
            }
            SchemaFormat::CsvHeader => {
                let names: Vec<&str> = TransactionRecord::csv_schema()
                    .iter()
                    .map(|f| f.name)
                    .collect();
                println!("{}", names.join(","));
            }
            SchemaFormat::CsvFields => {
                println!("CSV Input Format");
                println!("================");
                println!();
                for field in TransactionRecord::csv_schema() {
                    let req = if field.required { "required" } else { "optional" };
                    println!("{:10} ({:8})  {}", field.name, req, field.description);
                }
                println!();
                println!("Empty cells are treated as absent. Rows without a Symbol are cash events.");
            }
            SchemaFormat::Rates => {
                println!("period,currency,rate");
                println!();
                println!("period    YYYY-MM month the rate applies to");
                println!("currency  ISO currency code (e.g., USD)");
                println!("rate      units of currency per 1 GBP, as published by HMRC");
            }
        }
        Ok(())
    }
}
