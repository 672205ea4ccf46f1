//! Share identification for disposals.
//!
//! Each symbol's timeline is resolved in two passes:
//!
//! 1. Claims. Every SELL is matched against BUYs on the same day, then (in
//!    disposal date order) against BUYs in the following 30 days. All
//!    same-day claims are settled before any bed & breakfast claim, so a BUY
//!    only offers a later-dated claim what its own day's disposals left.
//! 2. Replay. The timeline is walked in date order: unclaimed BUY remainders
//!    go into the section 104 pool, and whatever a SELL still needs is taken
//!    out of it at the average cost.

use super::currency::{CurrencyConverter, RateError};
use super::gains::{Allocation, DisposalResult, GainCalculator, MatchingRule};
use super::pool::{HoldingPool, PoolError, PoolHistoryEntry};
use super::transaction::{Action, Transaction, TransactionError};
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Number of days after a disposal in which re-acquisitions are matched
pub const BED_AND_BREAKFAST_DAYS: i64 = 30;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error(
    "cannot match disposal of {quantity} {symbol} on {date}: {unmatched} left unmatched \
     with only {available} in the pool"
)]
pub struct MatchingError {
    pub symbol: String,
    pub date: NaiveDate,
    pub quantity: Decimal,
    pub unmatched: Decimal,
    pub available: Decimal,
}

/// Anything that aborts a calculation run
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CgtError {
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    #[error(transparent)]
    MissingRate(#[from] RateError),
    #[error(transparent)]
    InsufficientPool(#[from] PoolError),
    #[error(transparent)]
    Matching(#[from] MatchingError),
}

/// Everything the matcher produces for one run
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    /// Ordered by date, then input position
    pub disposals: Vec<DisposalResult>,
    /// Pool per symbol after the final transaction
    pub pools: BTreeMap<String, HoldingPool>,
    /// Pool states after every change, in date order per symbol
    pub history: Vec<PoolHistoryEntry>,
}

/// Calculate disposals for a set of transactions in any order
pub fn calculate_cgt(
    transactions: &[Transaction],
    converter: &CurrencyConverter,
) -> Result<MatchOutcome, CgtError> {
    DisposalMatcher::new(converter).run(transactions)
}

/// BUY not yet fully claimed
#[derive(Debug)]
struct Acquisition {
    date: NaiveDate,
    quantity: Decimal,
    cost: Decimal,
    remaining: Decimal,
    remaining_cost: Decimal,
}

impl Acquisition {
    /// Take up to `wanted` shares, returning the quantity taken and its cost
    fn claim(&mut self, wanted: Decimal) -> (Decimal, Decimal) {
        let taken = wanted.min(self.remaining);
        if taken.is_zero() {
            return (Decimal::ZERO, Decimal::ZERO);
        }
        let cost = if taken == self.remaining {
            self.remaining_cost
        } else {
            self.cost * taken / self.quantity
        };
        self.remaining -= taken;
        self.remaining_cost -= cost;
        (taken, cost)
    }
}

#[derive(Debug)]
struct Disposal<'t> {
    index: usize,
    tx: &'t Transaction,
    unmatched: Decimal,
    allocations: Vec<Allocation>,
}

impl Disposal<'_> {
    fn date(&self) -> NaiveDate {
        self.tx.date
    }

    fn take_from(&mut self, acquisition: &mut Acquisition, rule: MatchingRule) {
        let (quantity, cost) = acquisition.claim(self.unmatched);
        if quantity.is_zero() {
            return;
        }
        log::debug!(
            "{} match: {} {} on {} at cost {}",
            rule,
            quantity,
            self.tx.symbol.as_deref().unwrap_or_default(),
            self.date(),
            cost
        );
        self.unmatched -= quantity;
        self.allocations.push(Allocation {
            rule,
            quantity,
            cost,
        });
    }
}

#[derive(Debug, Clone, Copy)]
enum Entry {
    Acquisition(usize),
    Disposal(usize),
}

/// Matches every SELL against acquisitions, scoped to a single run.
pub struct DisposalMatcher<'a> {
    calculator: GainCalculator<'a>,
}

impl<'a> DisposalMatcher<'a> {
    pub fn new(converter: &'a CurrencyConverter) -> Self {
        DisposalMatcher {
            calculator: GainCalculator::new(converter),
        }
    }

    pub fn run(&self, transactions: &[Transaction]) -> Result<MatchOutcome, CgtError> {
        let mut timelines: BTreeMap<&str, Vec<(usize, &Transaction)>> = BTreeMap::new();
        for (index, tx) in transactions.iter().enumerate() {
            tx.validate()?;
            match tx.symbol.as_deref() {
                Some(symbol) => timelines.entry(symbol).or_default().push((index, tx)),
                None => log::warn!(
                    "Ignoring cash event: {} {} on {} ({})",
                    tx.action,
                    tx.currency,
                    tx.date,
                    tx.broker
                ),
            }
        }

        let mut outcome = MatchOutcome::default();
        for (symbol, mut timeline) in timelines {
            // stable: same-day transactions keep input order
            timeline.sort_by_key(|(_, tx)| tx.date);
            let (disposals, pool, history) = self.match_symbol(symbol, &timeline)?;
            outcome.disposals.extend(disposals);
            outcome.history.extend(history);
            outcome.pools.insert(symbol.to_string(), pool);
        }
        outcome
            .disposals
            .sort_by_key(|d| (d.date, d.transaction));
        Ok(outcome)
    }

    fn match_symbol(
        &self,
        symbol: &str,
        timeline: &[(usize, &Transaction)],
    ) -> Result<(Vec<DisposalResult>, HoldingPool, Vec<PoolHistoryEntry>), CgtError> {
        let mut acquisitions = Vec::new();
        let mut disposals = Vec::new();
        let mut entries = Vec::with_capacity(timeline.len());

        for &(index, tx) in timeline {
            match tx.action {
                Action::Buy => {
                    let cost = self.calculator.acquisition_cost(tx)?;
                    entries.push(Entry::Acquisition(acquisitions.len()));
                    acquisitions.push(Acquisition {
                        date: tx.date,
                        quantity: tx.shares(),
                        cost,
                        remaining: tx.shares(),
                        remaining_cost: cost,
                    });
                }
                Action::Sell => {
                    entries.push(Entry::Disposal(disposals.len()));
                    disposals.push(Disposal {
                        index,
                        tx,
                        unmatched: tx.shares(),
                        allocations: Vec::new(),
                    });
                }
            }
        }

        match_same_day(&mut disposals, &mut acquisitions);
        match_bed_and_breakfast(&mut disposals, &mut acquisitions);

        let mut pool = HoldingPool::new(symbol);
        let mut history = Vec::new();
        for entry in entries {
            match entry {
                Entry::Acquisition(i) => {
                    let acquisition = &acquisitions[i];
                    if acquisition.remaining.is_zero() {
                        continue;
                    }
                    pool.acquire(acquisition.remaining, acquisition.remaining_cost);
                    history.push(PoolHistoryEntry::record(acquisition.date, &pool));
                }
                Entry::Disposal(i) => {
                    let disposal = &mut disposals[i];
                    if disposal.unmatched.is_zero() {
                        continue;
                    }
                    if disposal.unmatched > pool.quantity() {
                        return Err(MatchingError {
                            symbol: symbol.to_string(),
                            date: disposal.date(),
                            quantity: disposal.tx.shares(),
                            unmatched: disposal.unmatched,
                            available: pool.quantity(),
                        }
                        .into());
                    }
                    let quantity = disposal.unmatched;
                    let cost = pool.dispose(quantity)?;
                    log::debug!(
                        "Pool match: {} {} on {} at cost {}",
                        quantity,
                        symbol,
                        disposal.date(),
                        cost
                    );
                    disposal.unmatched = Decimal::ZERO;
                    disposal.allocations.push(Allocation {
                        rule: MatchingRule::Pool,
                        quantity,
                        cost,
                    });
                    history.push(PoolHistoryEntry::record(disposal.date(), &pool));
                }
            }
        }

        let results = disposals
            .iter()
            .map(|d| self.calculator.disposal_result(d.index, d.tx, &d.allocations))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((results, pool, history))
    }
}

/// Same-day rule: each SELL takes BUYs dated the same day, in input order.
fn match_same_day(disposals: &mut [Disposal], acquisitions: &mut [Acquisition]) {
    for disposal in disposals.iter_mut() {
        let date = disposal.date();
        for acquisition in acquisitions.iter_mut().filter(|a| a.date == date) {
            if disposal.unmatched.is_zero() {
                break;
            }
            disposal.take_from(acquisition, MatchingRule::SameDay);
        }
    }
}

/// Bed & breakfast rule: earliest disposals first, each taking BUYs in the
/// 30 days after it, earliest first.
fn match_bed_and_breakfast(disposals: &mut [Disposal], acquisitions: &mut [Acquisition]) {
    for disposal in disposals.iter_mut() {
        if disposal.unmatched.is_zero() {
            continue;
        }
        let date = disposal.date();
        let last = date + Duration::days(BED_AND_BREAKFAST_DAYS);
        for acquisition in acquisitions
            .iter_mut()
            .filter(|a| a.date > date && a.date <= last)
        {
            if disposal.unmatched.is_zero() {
                break;
            }
            let rule = MatchingRule::BedAndBreakfast {
                acquired: acquisition.date,
            };
            disposal.take_from(acquisition, rule);
        }
    }
}
