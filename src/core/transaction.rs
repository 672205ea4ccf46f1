use cgtcalc_derive::CsvSchema;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::io::Read;

/// Column description emitted by `#[derive(CsvSchema)]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvField {
    pub name: &'static str,
    pub required: bool,
    pub description: &'static str,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("unknown action '{0}', expected Buy or Sell")]
    UnknownAction(String),
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("{action} of {symbol} on {date} has no quantity")]
    MissingQuantity {
        action: Action,
        symbol: String,
        date: NaiveDate,
    },
    #[error("{action} of {symbol} on {date} has non-positive quantity {quantity}")]
    NonPositiveQuantity {
        action: Action,
        symbol: String,
        date: NaiveDate,
        quantity: Decimal,
    },
    #[error("{action} of {symbol} on {date} has non-positive price {price}")]
    NonPositivePrice {
        action: Action,
        symbol: String,
        date: NaiveDate,
        price: Decimal,
    },
    #[error("{action} of {symbol} on {date} has negative fees {fees}")]
    NegativeFees {
        action: Action,
        symbol: String,
        date: NaiveDate,
        fees: Decimal,
    },
    #[error("{action} of {symbol} on {date} has neither a price nor an amount")]
    MissingValue {
        action: Action,
        symbol: String,
        date: NaiveDate,
    },
}

/// Direction of a broker transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Action {
    #[serde(alias = "BUY", alias = "buy")]
    Buy,
    #[serde(alias = "SELL", alias = "sell")]
    Sell,
}

impl std::str::FromStr for Action {
    type Err = TransactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(Action::Buy),
            "sell" => Ok(Action::Sell),
            _ => Err(TransactionError::UnknownAction(s.to_string())),
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
        }
    }
}

/// Input root for transaction JSON
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TransactionInput {
    pub transactions: Vec<Transaction>,
}

/// A single broker transaction in canonical form.
///
/// Every broker export is mapped onto this shape before it reaches the
/// engine, which never looks at `broker` for anything but reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Transaction {
    #[schemars(with = "String")]
    pub date: NaiveDate,
    pub action: Action,
    /// Absent for cash-only events
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub quantity: Option<Decimal>,
    /// Price per share in `currency`
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub price: Option<Decimal>,
    #[serde(default)]
    #[schemars(with = "f64")]
    pub fees: Decimal,
    /// Net cash movement: negative for buys, positive for sells, fees included
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub amount: Option<Decimal>,
    pub currency: String,
    pub broker: String,
}

impl Transaction {
    /// Shares involved, zero for cash events
    pub fn shares(&self) -> Decimal {
        self.quantity.unwrap_or(Decimal::ZERO)
    }

    /// Check the constraints a share transaction must satisfy before matching.
    /// Cash events are accepted as-is.
    pub fn validate(&self) -> Result<(), TransactionError> {
        let Some(symbol) = self.symbol.clone() else {
            return Ok(());
        };
        let (action, date) = (self.action, self.date);

        let quantity = self.quantity.ok_or_else(|| TransactionError::MissingQuantity {
            action,
            symbol: symbol.clone(),
            date,
        })?;
        if quantity <= Decimal::ZERO {
            return Err(TransactionError::NonPositiveQuantity {
                action,
                symbol,
                date,
                quantity,
            });
        }
        if let Some(price) = self.price {
            if price <= Decimal::ZERO {
                return Err(TransactionError::NonPositivePrice {
                    action,
                    symbol,
                    date,
                    price,
                });
            }
        }
        if self.fees < Decimal::ZERO {
            return Err(TransactionError::NegativeFees {
                action,
                symbol,
                date,
                fees: self.fees,
            });
        }
        if self.price.is_none() && self.amount.is_none() {
            return Err(TransactionError::MissingValue {
                action,
                symbol,
                date,
            });
        }
        Ok(())
    }
}

/// One row of the canonical CSV format.
///
/// `Date,Action,Symbol,Quantity,Price,Fees,Amount,Currency,Broker`
#[derive(Debug, Deserialize, CsvSchema)]
pub struct TransactionRecord {
    /// Trade date (YYYY-MM-DD)
    #[serde(rename = "Date")]
    pub date: String,
    /// Buy or Sell (case insensitive)
    #[serde(rename = "Action")]
    pub action: String,
    /// Ticker or other share identifier, empty for cash events
    #[serde(rename = "Symbol", deserialize_with = "empty_as_none")]
    pub symbol: Option<String>,
    /// Number of shares, greater than zero
    #[serde(rename = "Quantity", deserialize_with = "empty_as_none")]
    pub quantity: Option<Decimal>,
    /// Price per share in the transaction currency
    #[serde(rename = "Price", deserialize_with = "empty_as_none")]
    pub price: Option<Decimal>,
    /// Sum of fees and commissions in the transaction currency
    #[serde(rename = "Fees", deserialize_with = "empty_as_none")]
    pub fees: Option<Decimal>,
    /// Net cash movement including fees, negative for buys and positive for sells
    #[serde(rename = "Amount", deserialize_with = "empty_as_none")]
    pub amount: Option<Decimal>,
    /// ISO currency code of price, fees and amount
    #[serde(rename = "Currency")]
    pub currency: String,
    /// Name of the broker
    #[serde(rename = "Broker")]
    pub broker: String,
}

impl TryFrom<TransactionRecord> for Transaction {
    type Error = TransactionError;

    fn try_from(record: TransactionRecord) -> Result<Self, Self::Error> {
        let date = NaiveDate::parse_from_str(record.date.trim(), "%Y-%m-%d")
            .map_err(|_| TransactionError::InvalidDate(record.date.clone()))?;
        Ok(Transaction {
            date,
            action: record.action.parse()?,
            symbol: record.symbol,
            quantity: record.quantity,
            price: record.price,
            fees: record.fees.unwrap_or(Decimal::ZERO),
            amount: record.amount,
            currency: record.currency,
            broker: record.broker,
        })
    }
}

/// Read transactions from the canonical CSV format
pub fn read_csv<R: Read>(reader: R) -> anyhow::Result<Vec<Transaction>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut transactions = Vec::new();
    for record in rdr.deserialize::<TransactionRecord>() {
        transactions.push(Transaction::try_from(record?)?);
    }
    normalize_transactions(&mut transactions);
    Ok(transactions)
}

/// Read transactions from JSON
pub fn read_json<R: Read>(reader: R) -> anyhow::Result<Vec<Transaction>> {
    let input: TransactionInput = serde_json::from_reader(reader)?;
    let mut transactions = input.transactions;
    normalize_transactions(&mut transactions);
    Ok(transactions)
}

fn normalize_transactions(transactions: &mut [Transaction]) {
    for tx in transactions {
        tx.symbol = tx
            .symbol
            .as_deref()
            .map(normalize_code)
            .filter(|s| !s.is_empty());
        tx.currency = normalize_code(&tx.currency);
        tx.broker = tx.broker.trim().to_string();
    }
}

pub(crate) fn normalize_code(s: &str) -> String {
    s.trim().to_uppercase()
}

fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let s: Option<String> = Deserialize::deserialize(deserializer)?;
    match s.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    pub fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    pub fn tx(
        d: &str,
        action: Action,
        symbol: &str,
        quantity: Decimal,
        price: Decimal,
        fees: Decimal,
        currency: &str,
    ) -> Transaction {
        let gross = quantity * price;
        let amount = match action {
            Action::Buy => -(gross + fees),
            Action::Sell => gross - fees,
        };
        Transaction {
            date: date(d),
            action,
            symbol: Some(symbol.to_string()),
            quantity: Some(quantity),
            price: Some(price),
            fees,
            amount: Some(amount),
            currency: currency.to_string(),
            broker: "Broker".to_string(),
        }
    }

    pub fn buy(d: &str, symbol: &str, quantity: Decimal, price: Decimal) -> Transaction {
        tx(d, Action::Buy, symbol, quantity, price, Decimal::ZERO, "GBP")
    }

    pub fn sell(d: &str, symbol: &str, quantity: Decimal, price: Decimal) -> Transaction {
        tx(d, Action::Sell, symbol, quantity, price, Decimal::ZERO, "GBP")
    }

    const CSV: &str = "\
Date,Action,Symbol,Quantity,Price,Fees,Amount,Currency,Broker
2020-01-01,Buy,sym,100,10,1,-1001,gbp,Custom
2020-01-01,SELL,SYM,100,12,,1200,GBP,Custom
2020-02-01,sell,,,,,50,USD,Custom
";

    #[test]
    fn csv_rows_parse_and_normalize() {
        let txs = read_csv(CSV.as_bytes()).unwrap();
        assert_eq!(txs.len(), 3);

        assert_eq!(txs[0].action, Action::Buy);
        assert_eq!(txs[0].symbol.as_deref(), Some("SYM"));
        assert_eq!(txs[0].currency, "GBP");
        assert_eq!(txs[0].fees, dec!(1));
        assert_eq!(txs[0].amount, Some(dec!(-1001)));

        assert_eq!(txs[1].action, Action::Sell);
        assert_eq!(txs[1].fees, Decimal::ZERO);

        assert_eq!(txs[2].symbol, None);
        assert_eq!(txs[2].quantity, None);
    }

    #[test]
    fn csv_unknown_action_is_rejected() {
        let csv = "Date,Action,Symbol,Quantity,Price,Fees,Amount,Currency,Broker\n\
                   2020-01-01,Dividend,SYM,1,1,0,1,GBP,Custom\n";
        let err = read_csv(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("unknown action"));
    }

    #[test]
    fn json_input_parses() {
        let json = r#"{"transactions": [
            {"date": "2020-06-01", "action": "Sell", "symbol": " abc ", "quantity": "5",
             "price": "2", "fees": "0", "amount": "10", "currency": "usd", "broker": "X"}
        ]}"#;
        let txs = read_json(json.as_bytes()).unwrap();
        assert_eq!(txs[0].symbol.as_deref(), Some("ABC"));
        assert_eq!(txs[0].currency, "USD");
        assert_eq!(txs[0].quantity, Some(dec!(5)));
    }

    #[test]
    fn validate_rejects_missing_quantity() {
        let mut t = buy("2020-01-01", "A", dec!(1), dec!(1));
        t.quantity = None;
        assert!(matches!(
            t.validate(),
            Err(TransactionError::MissingQuantity { .. })
        ));
    }

    #[test]
    fn validate_rejects_negative_fees_and_bad_price() {
        let mut t = buy("2020-01-01", "A", dec!(1), dec!(1));
        t.fees = dec!(-1);
        assert!(matches!(t.validate(), Err(TransactionError::NegativeFees { .. })));

        let mut t = buy("2020-01-01", "A", dec!(1), dec!(1));
        t.price = Some(Decimal::ZERO);
        assert!(matches!(
            t.validate(),
            Err(TransactionError::NonPositivePrice { .. })
        ));
    }

    #[test]
    fn validate_requires_price_or_amount() {
        let mut t = sell("2020-01-01", "A", dec!(1), dec!(1));
        t.price = None;
        assert!(t.validate().is_ok());
        t.amount = None;
        assert!(matches!(t.validate(), Err(TransactionError::MissingValue { .. })));
    }

    #[test]
    fn cash_events_always_validate() {
        let t = Transaction {
            date: date("2020-01-01"),
            action: Action::Sell,
            symbol: None,
            quantity: None,
            price: None,
            fees: Decimal::ZERO,
            amount: Some(dec!(10)),
            currency: "GBP".to_string(),
            broker: "B".to_string(),
        };
        assert!(t.validate().is_ok());
        assert_eq!(t.shares(), Decimal::ZERO);
    }

    #[test]
    fn csv_schema_lists_columns_in_order() {
        let names: Vec<_> = TransactionRecord::csv_schema()
            .iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(
            names,
            vec!["Date", "Action", "Symbol", "Quantity", "Price", "Fees", "Amount", "Currency", "Broker"]
        );
        assert!(TransactionRecord::csv_schema()[0].required);
        assert!(!TransactionRecord::csv_schema()[2].required);
    }
}
