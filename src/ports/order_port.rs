//! Order submission port.

use crate::domain::error::OrderExecutionError;
use crate::domain::order::{OrderHandle, OrderRequest};
use crate::ports::market_port::MarketPort;

pub trait OrderPort {
    /// Submit an order.
    ///
    /// `Ok(None)` means the order was declined synchronously, for example
    /// insufficient cash for a long or no position to close for a short.
    /// `Err` is reserved for requests the port cannot interpret, such as an
    /// unknown ticker.
    fn submit_order(
        &mut self,
        request: &OrderRequest,
    ) -> Result<Option<OrderHandle>, OrderExecutionError>;
}

/// The combined collaborator the execution engine is driven with.
pub trait BrokerPort: MarketPort + OrderPort {}

impl<T: MarketPort + OrderPort + ?Sized> BrokerPort for T {}
