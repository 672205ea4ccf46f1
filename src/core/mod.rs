pub mod currency;
pub mod gains;
pub mod matcher;
pub mod pool;
pub mod report;
pub mod transaction;
pub mod uk;
pub mod warnings;

// Flat public surface for domain types and functions.
pub use currency::{CurrencyConverter, RateError, RatePeriod, RateTable, REPORTING_CURRENCY};
pub use gains::{Allocation, DisposalResult, GainCalculator, MatchedPortion, MatchingRule};
pub use matcher::{
    calculate_cgt, CgtError, DisposalMatcher, MatchOutcome, MatchingError, BED_AND_BREAKFAST_DAYS,
};
pub use pool::{HoldingPool, PoolError, PoolHistoryEntry, PoolState};
pub use report::{TaxYearAggregator, TaxYearReport};
pub use transaction::{
    read_csv, read_json, Action, CsvField, Transaction, TransactionError, TransactionInput,
    TransactionRecord,
};
pub use uk::{TaxYear, TaxYearError, TaxYearWindow};
pub use warnings::{check_transactions, TransactionWarning, Warning};
