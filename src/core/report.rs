use super::gains::DisposalResult;
use super::matcher::MatchOutcome;
use super::pool::PoolState;
use super::uk::{TaxYear, TaxYearWindow};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Totals and detail for one reporting window
#[derive(Debug, Clone, Serialize)]
pub struct TaxYearReport {
    pub tax_year: TaxYear,
    pub start: NaiveDate,
    /// Exclusive
    pub end: NaiveDate,
    pub disposals: Vec<DisposalResult>,
    pub total_proceeds: Decimal,
    pub total_allowable_cost: Decimal,
    pub total_gains: Decimal,
    /// Sum of losses as a positive figure
    pub total_losses: Decimal,
    pub net_gain: Decimal,
    pub exempt_amount: Decimal,
    pub taxable_gain: Decimal,
    /// Pool per symbol as it stood at the end of the window
    pub pools: Vec<PoolState>,
}

impl TaxYearReport {
    pub fn disposal_count(&self) -> usize {
        self.disposals.len()
    }
}

/// Slices a run's results into tax years.
pub struct TaxYearAggregator<'o> {
    outcome: &'o MatchOutcome,
}

impl<'o> TaxYearAggregator<'o> {
    pub fn new(outcome: &'o MatchOutcome) -> Self {
        TaxYearAggregator { outcome }
    }

    pub fn report(&self, window: &TaxYearWindow) -> TaxYearReport {
        let disposals: Vec<DisposalResult> = self
            .outcome
            .disposals
            .iter()
            .filter(|d| window.contains(d.date))
            .cloned()
            .collect();

        let mut total_proceeds = Decimal::ZERO;
        let mut total_allowable_cost = Decimal::ZERO;
        let mut total_gains = Decimal::ZERO;
        let mut total_losses = Decimal::ZERO;
        for d in &disposals {
            total_proceeds += d.proceeds;
            total_allowable_cost += d.allowable_cost;
            if d.is_loss() {
                total_losses -= d.gain;
            } else {
                total_gains += d.gain;
            }
        }
        let net_gain = total_gains - total_losses;
        let exempt_amount = window.tax_year.cgt_exempt_amount();
        let taxable_gain = (net_gain - exempt_amount).max(Decimal::ZERO);

        log::info!(
            "Tax year {}: {} disposals, net gain {}",
            window.tax_year,
            disposals.len(),
            net_gain
        );

        TaxYearReport {
            tax_year: window.tax_year,
            start: window.start,
            end: window.end,
            disposals,
            total_proceeds,
            total_allowable_cost,
            total_gains,
            total_losses,
            net_gain,
            exempt_amount,
            taxable_gain,
            pools: self.pools_before(window.end),
        }
    }

    /// Latest pool state per symbol from changes dated before `end`.
    ///
    /// A symbol disposed of before `end` whose pool never changed (every
    /// sale matched same-day or B&B) is reported with an empty pool.
    pub fn pools_before(&self, end: NaiveDate) -> Vec<PoolState> {
        let mut latest = BTreeMap::new();
        for entry in self.outcome.history.iter().filter(|h| h.date < end) {
            latest.insert(entry.symbol.as_str(), entry.state());
        }
        for disposal in self.outcome.disposals.iter().filter(|d| d.date < end) {
            latest
                .entry(disposal.symbol.as_str())
                .or_insert_with(|| PoolState {
                    symbol: disposal.symbol.clone(),
                    quantity: Decimal::ZERO,
                    cost: Decimal::ZERO,
                });
        }
        latest.into_values().collect()
    }

    /// Tax years in which any disposal or pool change happened
    pub fn tax_years(&self) -> Vec<TaxYear> {
        let disposal_dates = self.outcome.disposals.iter().map(|d| d.date);
        let pool_dates = self.outcome.history.iter().map(|h| h.date);
        disposal_dates
            .chain(pool_dates)
            .map(TaxYear::from_date)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
