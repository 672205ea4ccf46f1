use chrono::NaiveDate;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::Serialize;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("cannot dispose of {requested} {symbol} from a pool holding {available}")]
    InsufficientPool {
        symbol: String,
        requested: Decimal,
        available: Decimal,
    },
}

/// Section 104 holding for one symbol: a running quantity and the total
/// allowable cost of those shares in GBP.
///
/// Quantity and cost are either both zero or both positive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldingPool {
    symbol: String,
    quantity: Decimal,
    cost: Decimal,
}

impl HoldingPool {
    pub fn new(symbol: impl Into<String>) -> Self {
        HoldingPool {
            symbol: symbol.into(),
            quantity: Decimal::ZERO,
            cost: Decimal::ZERO,
        }
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn cost(&self) -> Decimal {
        self.cost
    }

    /// Average cost per share, zero for an empty pool
    pub fn average_cost(&self) -> Decimal {
        if self.quantity.is_zero() {
            Decimal::ZERO
        } else {
            self.cost / self.quantity
        }
    }

    /// Add shares to the pool
    pub fn acquire(&mut self, quantity: Decimal, cost: Decimal) {
        self.quantity += quantity;
        self.cost += cost;
        log::debug!(
            "Pool {} ADD: qty={}, cost={}. New total: qty={}, cost={}",
            self.symbol,
            quantity,
            cost,
            self.quantity,
            self.cost
        );
    }

    /// Remove shares from the pool, returning the allowable cost that leaves
    /// with them.
    pub fn dispose(&mut self, quantity: Decimal) -> Result<Decimal, PoolError> {
        if quantity > self.quantity {
            return Err(PoolError::InsufficientPool {
                symbol: self.symbol.clone(),
                requested: quantity,
                available: self.quantity,
            });
        }
        // Only reachable with quantity == 0 here.
        if self.quantity.is_zero() {
            return Ok(Decimal::ZERO);
        }

        let cost = if quantity == self.quantity {
            self.cost
        } else {
            self.cost * quantity / self.quantity
        };
        self.quantity -= quantity;
        self.cost -= cost;
        if self.quantity.is_zero() {
            self.cost = Decimal::ZERO;
        }
        log::debug!(
            "Pool {} REMOVE: qty={}, cost={}. Remaining: qty={}, cost={}",
            self.symbol,
            quantity,
            cost,
            self.quantity,
            self.cost
        );
        Ok(cost)
    }
}

/// Point-in-time copy of a pool, as exposed in reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct PoolState {
    pub symbol: String,
    #[schemars(with = "f64")]
    pub quantity: Decimal,
    #[schemars(with = "f64")]
    pub cost: Decimal,
}

impl PoolState {
    pub fn average_cost(&self) -> Decimal {
        if self.quantity.is_zero() {
            Decimal::ZERO
        } else {
            self.cost / self.quantity
        }
    }
}

/// Pool state after a change on `date`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolHistoryEntry {
    pub date: NaiveDate,
    pub symbol: String,
    pub quantity: Decimal,
    pub cost: Decimal,
}

impl PoolHistoryEntry {
    pub fn record(date: NaiveDate, pool: &HoldingPool) -> Self {
        PoolHistoryEntry {
            date,
            symbol: pool.symbol.clone(),
            quantity: pool.quantity,
            cost: pool.cost,
        }
    }

    pub fn state(&self) -> PoolState {
        PoolState {
            symbol: self.symbol.clone(),
            quantity: self.quantity,
            cost: self.cost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn acquire_and_dispose_proportionally() {
        let mut pool = HoldingPool::new("SYM");
        pool.acquire(dec!(10), dec!(1000));
        assert_eq!(pool.quantity(), dec!(10));
        assert_eq!(pool.cost(), dec!(1000));
        assert_eq!(pool.average_cost(), dec!(100));

        let cost = pool.dispose(dec!(5)).unwrap();
        assert_eq!(cost, dec!(500));
        assert_eq!(pool.quantity(), dec!(5));
        assert_eq!(pool.cost(), dec!(500));
    }

    #[test]
    fn pooled_cost_is_averaged() {
        // 1000 shares for £400, 500 more for £300, sell 700
        let mut pool = HoldingPool::new("LOBSTER");
        pool.acquire(dec!(1000), dec!(400));
        pool.acquire(dec!(500), dec!(300));
        let cost = pool.dispose(dec!(700)).unwrap();
        assert_eq!(cost.round_dp(2), dec!(326.67));
        assert_eq!(pool.quantity(), dec!(800));
        assert_eq!((pool.cost() + cost).round_dp(10), dec!(700));
    }

    #[test]
    fn disposing_everything_empties_pool_exactly() {
        let mut pool = HoldingPool::new("SYM");
        pool.acquire(dec!(3), dec!(10));
        pool.dispose(dec!(1)).unwrap();
        let cost = pool.dispose(dec!(2)).unwrap();
        assert_eq!(pool.quantity(), Decimal::ZERO);
        assert_eq!(pool.cost(), Decimal::ZERO);
        assert!(cost > dec!(6.66) && cost < dec!(6.67));
    }

    #[test]
    fn dispose_more_than_held_fails() {
        let mut pool = HoldingPool::new("SYM");
        pool.acquire(dec!(5), dec!(50));
        let err = pool.dispose(dec!(6)).unwrap_err();
        assert_eq!(
            err,
            PoolError::InsufficientPool {
                symbol: "SYM".to_string(),
                requested: dec!(6),
                available: dec!(5),
            }
        );
        // unchanged
        assert_eq!(pool.quantity(), dec!(5));
        assert_eq!(pool.cost(), dec!(50));
    }

    #[test]
    fn zero_disposal_from_empty_pool_costs_nothing() {
        let mut pool = HoldingPool::new("SYM");
        assert_eq!(pool.dispose(Decimal::ZERO).unwrap(), Decimal::ZERO);
        assert_eq!(pool.quantity(), Decimal::ZERO);
        assert_eq!(pool.cost(), Decimal::ZERO);
    }

    #[test]
    fn disposal_from_empty_pool_fails() {
        let mut pool = HoldingPool::new("SYM");
        assert!(pool.dispose(dec!(1)).is_err());
    }

    #[test]
    fn history_entry_snapshots_pool() {
        let mut pool = HoldingPool::new("SYM");
        pool.acquire(dec!(4), dec!(10));
        let entry = PoolHistoryEntry::record(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), &pool);
        pool.acquire(dec!(1), dec!(100));
        let state = entry.state();
        assert_eq!(state.symbol, "SYM");
        assert_eq!(state.quantity, dec!(4));
        assert_eq!(state.average_cost(), dec!(2.5));
    }
}
