use super::transaction::{Action, Transaction};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::HashMap;

/// Largest accepted difference between a stated amount and the one implied
/// by quantity, price and fees, in transaction currency.
pub const AMOUNT_TOLERANCE: Decimal = dec!(0.01);

/// Non-fatal data quality issue found in the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum Warning {
    /// Amount disagrees with quantity × price ± fees.
    AmountMismatch { expected: Decimal, actual: Decimal },
    /// More shares sold at a broker than were recorded as bought there.
    NegativeBrokerHolding { broker: String, balance: Decimal },
    /// Transaction without a symbol; it takes no part in matching.
    CashEventIgnored,
}

impl Warning {
    pub fn name(&self) -> &'static str {
        match self {
            Warning::AmountMismatch { .. } => "AmountMismatch",
            Warning::NegativeBrokerHolding { .. } => "NegativeBrokerHolding",
            Warning::CashEventIgnored => "CashEventIgnored",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Warning::AmountMismatch { expected, actual } => format!(
                "Amount {} does not match quantity, price and fees (expected {})",
                actual, expected
            ),
            Warning::NegativeBrokerHolding { broker, balance } => format!(
                "Holding at {} drops to {}; an acquisition may be missing",
                broker, balance
            ),
            Warning::CashEventIgnored => "No symbol, ignored for capital gains".to_string(),
        }
    }
}

/// A warning tied to the transaction that raised it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionWarning {
    /// Input position
    pub transaction: usize,
    pub date: NaiveDate,
    pub symbol: Option<String>,
    #[serde(flatten)]
    pub warning: Warning,
}

/// Run all consistency checks, returning warnings in date order.
pub fn check_transactions(transactions: &[Transaction]) -> Vec<TransactionWarning> {
    // buys before sells on the same day, otherwise input order
    let mut order: Vec<usize> = (0..transactions.len()).collect();
    order.sort_by_key(|&i| (transactions[i].date, transactions[i].action == Action::Sell));

    let mut balances: HashMap<(&str, &str), Decimal> = HashMap::new();
    let mut warnings = Vec::new();
    for index in order {
        let tx = &transactions[index];
        let mut push = |warning| {
            warnings.push(TransactionWarning {
                transaction: index,
                date: tx.date,
                symbol: tx.symbol.clone(),
                warning,
            })
        };

        let Some(symbol) = tx.symbol.as_deref() else {
            push(Warning::CashEventIgnored);
            continue;
        };

        if let Some(warning) = check_amount(tx) {
            push(warning);
        }

        let balance = balances.entry((tx.broker.as_str(), symbol)).or_default();
        match tx.action {
            Action::Buy => *balance += tx.shares(),
            Action::Sell => {
                *balance -= tx.shares();
                if *balance < Decimal::ZERO {
                    let balance = *balance;
                    push(Warning::NegativeBrokerHolding {
                        broker: tx.broker.clone(),
                        balance,
                    });
                }
            }
        }
    }
    warnings
}

fn check_amount(tx: &Transaction) -> Option<Warning> {
    let (price, actual) = (tx.price?, tx.amount?);
    let gross = price * tx.shares();
    let expected = match tx.action {
        Action::Buy => -(gross + tx.fees),
        Action::Sell => gross - tx.fees,
    };
    if (actual - expected).abs() > AMOUNT_TOLERANCE {
        Some(Warning::AmountMismatch { expected, actual })
    } else {
        None
    }
}
