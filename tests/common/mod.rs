#![allow(dead_code)]

use chrono::NaiveDate;
use std::collections::HashMap;
use tradetrigger::domain::context::ContextValue;
use tradetrigger::domain::error::OrderExecutionError;
pub use tradetrigger::domain::ohlcv::OhlcvBar;
use tradetrigger::domain::order::{OrderHandle, OrderRequest};
use tradetrigger::ports::market_port::MarketPort;
use tradetrigger::ports::order_port::OrderPort;

/// Scriptable market and order port. Every accepted submission gets the
/// next sequential handle starting at 1.
pub struct MockBroker {
    pub bar: OhlcvBar,
    pub indicators: HashMap<String, f64>,
    pub root: Option<ContextValue>,
    pub submitted: Vec<(OrderHandle, OrderRequest)>,
    pub declined: Vec<OrderRequest>,
    pub decline: bool,
    pub tickers: Vec<String>,
    next_handle: u64,
}

impl MockBroker {
    pub fn new() -> Self {
        Self {
            bar: make_bar("TEST", "2024-01-02", 100.0),
            indicators: HashMap::new(),
            root: None,
            submitted: Vec::new(),
            declined: Vec::new(),
            decline: false,
            tickers: vec!["default".to_string()],
            next_handle: 0,
        }
    }

    pub fn at(mut self, date: &str, close: f64) -> Self {
        self.set_bar(date, close);
        self
    }

    pub fn set_bar(&mut self, date: &str, close: f64) {
        self.bar = make_bar(&self.bar.code, date, close);
    }

    pub fn set_indicator(&mut self, name: &str, value: f64) {
        self.indicators.insert(name.to_string(), value);
    }

    pub fn clear_indicator(&mut self, name: &str) {
        self.indicators.remove(name);
    }

    pub fn last_handle(&self) -> Option<OrderHandle> {
        self.submitted.last().map(|(h, _)| *h)
    }

    pub fn last_request(&self) -> Option<&OrderRequest> {
        self.submitted.last().map(|(_, r)| r)
    }
}

impl MarketPort for MockBroker {
    fn current_bar(&self) -> OhlcvBar {
        self.bar.clone()
    }

    fn indicator_value(&self, name: &str) -> Option<f64> {
        self.indicators.get(name).copied()
    }

    fn object_root(&self) -> Option<ContextValue> {
        self.root.clone()
    }
}

impl OrderPort for MockBroker {
    fn submit_order(
        &mut self,
        request: &OrderRequest,
    ) -> Result<Option<OrderHandle>, OrderExecutionError> {
        if !request.is_default_ticker() && !self.tickers.contains(&request.ticker) {
            return Err(OrderExecutionError::UnknownTicker {
                ticker: request.ticker.clone(),
            });
        }
        if self.decline {
            self.declined.push(request.clone());
            return Ok(None);
        }
        self.next_handle += 1;
        let handle = OrderHandle(self.next_handle);
        self.submitted.push((handle, request.clone()));
        Ok(Some(handle))
    }
}

pub fn make_bar(code: &str, date: &str, close: f64) -> OhlcvBar {
    OhlcvBar {
        code: code.to_string(),
        date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        open: close,
        high: close * 1.01,
        low: close * 0.99,
        close,
        volume: 10_000,
    }
}

pub fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    use std::io::Write;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
