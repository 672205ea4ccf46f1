use super::currency::{CurrencyConverter, RateError};
use super::transaction::{Action, Transaction};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

/// Which share identification rule matched a portion of a disposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "rule")]
pub enum MatchingRule {
    SameDay,
    BedAndBreakfast { acquired: NaiveDate },
    Pool,
}

impl MatchingRule {
    pub fn display(&self) -> &'static str {
        match self {
            MatchingRule::SameDay => "Same-Day",
            MatchingRule::BedAndBreakfast { .. } => "B&B",
            MatchingRule::Pool => "Pool",
        }
    }

    /// Acquisition date the portion was matched against, if any
    pub fn matched_date(&self) -> Option<NaiveDate> {
        match self {
            MatchingRule::BedAndBreakfast { acquired } => Some(*acquired),
            _ => None,
        }
    }
}

impl std::fmt::Display for MatchingRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// Quantity matched by a rule together with the GBP cost it brings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub rule: MatchingRule,
    pub quantity: Decimal,
    pub cost: Decimal,
}

/// One slice of a disposal with its share of proceeds and cost
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedPortion {
    /// Input position of the SELL transaction this portion belongs to
    pub disposal: usize,
    #[serde(flatten)]
    pub rule: MatchingRule,
    pub quantity: Decimal,
    pub cost: Decimal,
    pub proceeds: Decimal,
}

impl MatchedPortion {
    pub fn gain(&self) -> Decimal {
        self.proceeds - self.cost
    }
}

/// Outcome of one SELL transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisposalResult {
    /// Input position of the SELL transaction
    pub transaction: usize,
    pub date: NaiveDate,
    pub symbol: String,
    pub broker: String,
    pub quantity: Decimal,
    /// Net of disposal fees
    pub proceeds: Decimal,
    /// Includes the acquisition fees attributed to the matched shares
    pub allowable_cost: Decimal,
    /// Disposal fees in GBP, already deducted from proceeds
    pub fees: Decimal,
    pub gain: Decimal,
    pub matches: Vec<MatchedPortion>,
}

impl DisposalResult {
    pub fn is_loss(&self) -> bool {
        self.gain < Decimal::ZERO
    }
}

/// Values transactions and matched portions in GBP.
#[derive(Debug, Clone, Copy)]
pub struct GainCalculator<'a> {
    converter: &'a CurrencyConverter,
}

impl<'a> GainCalculator<'a> {
    pub fn new(converter: &'a CurrencyConverter) -> Self {
        GainCalculator { converter }
    }

    /// Allowable cost of a BUY in GBP, fees included
    pub fn acquisition_cost(&self, tx: &Transaction) -> Result<Decimal, RateError> {
        debug_assert_eq!(tx.action, Action::Buy);
        let cost = match tx.price {
            Some(price) => price * tx.shares() + tx.fees,
            None => tx.amount.unwrap_or(Decimal::ZERO).abs(),
        };
        self.converter.convert(cost, &tx.currency, tx.date)
    }

    /// Proceeds of a SELL in GBP, net of fees
    pub fn disposal_proceeds(&self, tx: &Transaction) -> Result<Decimal, RateError> {
        debug_assert_eq!(tx.action, Action::Sell);
        let proceeds = match tx.price {
            Some(price) => price * tx.shares() - tx.fees,
            None => tx.amount.unwrap_or(Decimal::ZERO),
        };
        self.converter.convert(proceeds, &tx.currency, tx.date)
    }

    /// Build the result for a SELL from its allocations.
    ///
    /// Proceeds and disposal fees are spread over the portions by quantity;
    /// the last portion takes the remainder so the portions sum exactly to
    /// the disposal totals.
    pub fn disposal_result(
        &self,
        index: usize,
        tx: &Transaction,
        allocations: &[Allocation],
    ) -> Result<DisposalResult, RateError> {
        let quantity = tx.shares();
        let proceeds = self.disposal_proceeds(tx)?;
        let fees = self.converter.convert(tx.fees, &tx.currency, tx.date)?;

        let mut matches = Vec::with_capacity(allocations.len());
        let mut allocated = Decimal::ZERO;
        for (i, allocation) in allocations.iter().enumerate() {
            let share = if i + 1 == allocations.len() {
                proceeds - allocated
            } else {
                proceeds * allocation.quantity / quantity
            };
            allocated += share;
            matches.push(MatchedPortion {
                disposal: index,
                rule: allocation.rule,
                quantity: allocation.quantity,
                cost: allocation.cost,
                proceeds: share,
            });
        }

        let allowable_cost: Decimal = matches.iter().map(|m| m.cost).sum();
        let total_proceeds: Decimal = matches.iter().map(|m| m.proceeds).sum();

        Ok(DisposalResult {
            transaction: index,
            date: tx.date,
            symbol: tx.symbol.clone().unwrap_or_default(),
            broker: tx.broker.clone(),
            quantity,
            proceeds: total_proceeds,
            allowable_cost,
            fees,
            gain: total_proceeds - allowable_cost,
            matches,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::currency::{RatePeriod, RateTable};
    use crate::core::transaction::tests::{buy, date, sell, tx};
    use rust_decimal_macros::dec;

    fn usd_converter() -> CurrencyConverter {
        let mut table = RateTable::new();
        table
            .insert("USD", RatePeriod { year: 2020, month: 6 }, dec!(1.25))
            .unwrap();
        CurrencyConverter::new(table)
    }

    #[test]
    fn acquisition_cost_includes_fees() {
        let converter = CurrencyConverter::default();
        let calc = GainCalculator::new(&converter);
        let t = tx("2020-01-01", Action::Buy, "SYM", dec!(100), dec!(10), dec!(1), "GBP");
        assert_eq!(calc.acquisition_cost(&t).unwrap(), dec!(1001));
    }

    #[test]
    fn disposal_proceeds_net_of_fees() {
        let converter = CurrencyConverter::default();
        let calc = GainCalculator::new(&converter);
        let t = tx("2020-01-01", Action::Sell, "SYM", dec!(100), dec!(12), dec!(1), "GBP");
        assert_eq!(calc.disposal_proceeds(&t).unwrap(), dec!(1199));
    }

    #[test]
    fn foreign_values_are_converted_at_transaction_date() {
        let converter = usd_converter();
        let calc = GainCalculator::new(&converter);
        let t = tx("2020-06-10", Action::Buy, "SYM", dec!(10), dec!(12), dec!(5), "USD");
        assert_eq!(calc.acquisition_cost(&t).unwrap(), dec!(100));

        let t = tx("2020-07-10", Action::Buy, "SYM", dec!(10), dec!(12), dec!(5), "USD");
        assert!(calc.acquisition_cost(&t).is_err());
    }

    #[test]
    fn amount_used_when_price_missing() {
        let converter = CurrencyConverter::default();
        let calc = GainCalculator::new(&converter);

        let mut b = buy("2020-01-01", "SYM", dec!(10), dec!(10));
        b.price = None;
        b.amount = Some(dec!(-105));
        assert_eq!(calc.acquisition_cost(&b).unwrap(), dec!(105));

        let mut s = sell("2020-01-01", "SYM", dec!(10), dec!(10));
        s.price = None;
        s.amount = Some(dec!(95));
        assert_eq!(calc.disposal_proceeds(&s).unwrap(), dec!(95));
    }

    #[test]
    fn proceeds_and_fees_spread_by_quantity() {
        let converter = CurrencyConverter::default();
        let calc = GainCalculator::new(&converter);
        // gross 200, fees 10 -> net 190
        let t = tx("2020-01-10", Action::Sell, "SYM", dec!(10), dec!(20), dec!(10), "GBP");
        let allocations = [
            Allocation {
                rule: MatchingRule::SameDay,
                quantity: dec!(4),
                cost: dec!(40),
            },
            Allocation {
                rule: MatchingRule::Pool,
                quantity: dec!(6),
                cost: dec!(30),
            },
        ];
        let result = calc.disposal_result(3, &t, &allocations).unwrap();

        assert_eq!(result.transaction, 3);
        assert_eq!(result.matches[0].proceeds, dec!(76));
        assert_eq!(result.matches[1].proceeds, dec!(114));
        assert_eq!(result.proceeds, dec!(190));
        assert_eq!(result.allowable_cost, dec!(70));
        assert_eq!(result.fees, dec!(10));
        assert_eq!(result.gain, dec!(120));
        assert_eq!(result.matches[0].gain(), dec!(36));
        assert!(result.matches.iter().all(|m| m.disposal == 3));
    }

    #[test]
    fn thirds_sum_exactly_to_proceeds() {
        let converter = CurrencyConverter::default();
        let calc = GainCalculator::new(&converter);
        let t = sell("2020-01-10", "SYM", dec!(3), dec!(100) / dec!(3));
        let rule = MatchingRule::BedAndBreakfast {
            acquired: date("2020-01-20"),
        };
        let allocations = [
            Allocation { rule, quantity: dec!(1), cost: dec!(1) },
            Allocation { rule, quantity: dec!(1), cost: dec!(1) },
            Allocation { rule, quantity: dec!(1), cost: dec!(1) },
        ];
        let result = calc.disposal_result(0, &t, &allocations).unwrap();
        let sum: Decimal = result.matches.iter().map(|m| m.proceeds).sum();
        assert_eq!(sum, calc.disposal_proceeds(&t).unwrap());
        assert_eq!(result.gain, result.proceeds - dec!(3));
    }

    #[test]
    fn rule_display_and_dates() {
        let bnb = MatchingRule::BedAndBreakfast {
            acquired: date("2020-06-15"),
        };
        assert_eq!(bnb.to_string(), "B&B");
        assert_eq!(bnb.matched_date(), Some(date("2020-06-15")));
        assert_eq!(MatchingRule::SameDay.display(), "Same-Day");
        assert_eq!(MatchingRule::Pool.matched_date(), None);
    }
}
