use cgtcalc::cmd::{
    pools::PoolsCommand, report::ReportCommand, schema::SchemaCommand,
    validate::ValidateCommand,
};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "cgtcalc", version, about = "UK Capital Gains Tax calculator for shares")]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Calculate gains and losses for a tax year
    Report(ReportCommand),
    /// Show section 104 pool balances
    Pools(PoolsCommand),
    /// Check transactions for data quality issues
    Validate(ValidateCommand),
    /// Print the expected input formats
    Schema(SchemaCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Command::Report(cmd) => cmd.exec(),
        Command::Pools(cmd) => cmd.exec(),
        Command::Validate(cmd) => cmd.exec(),
        Command::Schema(cmd) => cmd.exec(),
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}
