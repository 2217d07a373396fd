//! Order requests built from trade action parameters.
//!
//! Action parameters are strings. `price` and `plimit` are arithmetic
//! expressions evaluated against the current bar's context; the remaining
//! numeric parameters are plain literals.

use crate::domain::context::EvalContext;
use crate::domain::error::OrderExecutionError;
use crate::domain::evaluator::ExpressionEvaluator;
use crate::domain::trigger::TriggerAction;
use chrono::{Days, NaiveDate};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_TICKER: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Long,
    Short,
}

impl FromStr for Signal {
    type Err = OrderExecutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Long" => Ok(Signal::Long),
            "Short" => Ok(Signal::Short),
            _ => Err(OrderExecutionError::InvalidSignal {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Signal::Long => "Long",
            Signal::Short => "Short",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderType {
    Market,
    Limit,
    StopLimit,
    StopTrail,
    StopTrailLimit,
}

impl OrderType {
    fn name(self) -> &'static str {
        match self {
            OrderType::Market => "Market",
            OrderType::Limit => "Limit",
            OrderType::StopLimit => "StopLimit",
            OrderType::StopTrail => "StopTrail",
            OrderType::StopTrailLimit => "StopTrailLimit",
        }
    }
}

impl FromStr for OrderType {
    type Err = OrderExecutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Market" => Ok(OrderType::Market),
            "Limit" => Ok(OrderType::Limit),
            "StopLimit" => Ok(OrderType::StopLimit),
            "StopTrail" => Ok(OrderType::StopTrail),
            "StopTrailLimit" => Ok(OrderType::StopTrailLimit),
            _ => Err(OrderExecutionError::UnsupportedOrderType {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque identifier the order port hands back for a submitted order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrderHandle(pub u64);

impl fmt::Display for OrderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Terminal non-completion states reported by the order port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderFailure {
    Canceled,
    Rejected,
    Margin,
    Expired,
}

impl fmt::Display for OrderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OrderFailure::Canceled => "Canceled",
            OrderFailure::Rejected => "Rejected",
            OrderFailure::Margin => "Margin",
            OrderFailure::Expired => "Expired",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub action: String,
    pub ticker: String,
    pub signal: Signal,
    pub order_type: OrderType,
    pub price: Option<f64>,
    pub size: Option<i64>,
    pub valid_days: Option<u32>,
    pub trail_percent: Option<f64>,
    pub trail_amount: Option<f64>,
    pub plimit: Option<f64>,
}

impl OrderRequest {
    /// Resolve an action's parameters, applying defaults for `ticker`,
    /// `signal` and `orderType`.
    pub fn from_action(
        action: &TriggerAction,
        expressions: &mut ExpressionEvaluator,
        ctx: &EvalContext,
    ) -> Result<Self, OrderExecutionError> {
        let ticker = action.parameter("ticker").unwrap_or(DEFAULT_TICKER).to_string();
        let signal: Signal = action.parameter("signal").unwrap_or("Long").parse()?;
        let order_type: OrderType = action.parameter("orderType").unwrap_or("Market").parse()?;

        let mut evaluate = |key: &str| -> Result<Option<f64>, OrderExecutionError> {
            action
                .parameter(key)
                .map(|source| {
                    expressions
                        .evaluate(source, ctx)
                        .map_err(|source| OrderExecutionError::Expression {
                            key: key.to_string(),
                            source,
                        })
                })
                .transpose()
        };
        let price = evaluate("price")?;
        let plimit = evaluate("plimit")?;

        Ok(Self {
            action: action.name().to_string(),
            ticker,
            signal,
            order_type,
            price,
            size: literal(action, "size")?,
            valid_days: literal(action, "valid")?,
            trail_percent: literal(action, "trailpercent")?,
            trail_amount: literal(action, "trailamount")?,
            plimit,
        })
    }

    /// Expiry date for a `valid` order submitted on `date`.
    pub fn valid_until(&self, date: NaiveDate) -> Option<NaiveDate> {
        self.valid_days
            .and_then(|days| date.checked_add_days(Days::new(u64::from(days))))
    }

    pub fn is_default_ticker(&self) -> bool {
        self.ticker == DEFAULT_TICKER || self.ticker == "tickers[0]"
    }
}

fn literal<T>(action: &TriggerAction, key: &str) -> Result<Option<T>, OrderExecutionError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    action
        .parameter(key)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|e| OrderExecutionError::InvalidParameter {
                    key: key.to_string(),
                    value: value.to_string(),
                    reason: e.to_string(),
                })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(params: &[(&str, &str)]) -> Result<OrderRequest, OrderExecutionError> {
        let action = TriggerAction::trade("buy", params).unwrap();
        let ctx = EvalContext::new().with("close", 100.0);
        OrderRequest::from_action(&action, &mut ExpressionEvaluator::new(), &ctx)
    }

    #[test]
    fn defaults_apply() {
        let req = request(&[]).unwrap();
        assert_eq!(req.action, "buy");
        assert_eq!(req.ticker, "default");
        assert!(req.is_default_ticker());
        assert_eq!(req.signal, Signal::Long);
        assert_eq!(req.order_type, OrderType::Market);
        assert_eq!(req.price, None);
        assert_eq!(req.size, None);
    }

    #[test]
    fn price_is_an_expression() {
        let req = request(&[
            ("signal", "Short"),
            ("orderType", "StopTrail"),
            ("price", "close * 0.5"),
            ("trailpercent", "0.02"),
        ])
        .unwrap();
        assert_eq!(req.signal, Signal::Short);
        assert_eq!(req.order_type, OrderType::StopTrail);
        assert_eq!(req.price, Some(50.0));
        assert_eq!(req.trail_percent, Some(0.02));
    }

    #[test]
    fn literal_parameters() {
        let req = request(&[
            ("size", "10"),
            ("valid", "5"),
            ("trailamount", "1.5"),
            ("plimit", "close + 2"),
        ])
        .unwrap();
        assert_eq!(req.size, Some(10));
        assert_eq!(req.valid_days, Some(5));
        assert_eq!(req.trail_amount, Some(1.5));
        assert_eq!(req.plimit, Some(102.0));
        let date = NaiveDate::from_ymd_opt(2024, 1, 29).unwrap();
        assert_eq!(req.valid_until(date), NaiveDate::from_ymd_opt(2024, 2, 3));
    }

    #[test]
    fn invalid_signal() {
        assert_eq!(
            request(&[("signal", "Sideways")]).unwrap_err(),
            OrderExecutionError::InvalidSignal {
                value: "Sideways".into()
            }
        );
    }

    #[test]
    fn unsupported_order_type() {
        assert!(matches!(
            request(&[("orderType", "Iceberg")]),
            Err(OrderExecutionError::UnsupportedOrderType { .. })
        ));
    }

    #[test]
    fn non_integer_size() {
        assert!(matches!(
            request(&[("size", "1.5")]),
            Err(OrderExecutionError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn failing_price_expression() {
        match request(&[("price", "indicators.atr * 2")]).unwrap_err() {
            OrderExecutionError::Expression { key, .. } => assert_eq!(key, "price"),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
