//! Market observation port.

use crate::domain::context::ContextValue;
use crate::domain::ohlcv::OhlcvBar;

/// Per-bar market view supplied by the host backtest or live feed.
pub trait MarketPort {
    fn current_bar(&self) -> OhlcvBar;

    /// Current value of a named indicator. `None` when the indicator has no
    /// value yet (warm-up) or is unknown.
    fn indicator_value(&self, name: &str) -> Option<f64>;

    /// Object graph walked for dotted or bracketed variable paths that are
    /// not flat context keys.
    fn object_root(&self) -> Option<ContextValue> {
        None
    }
}
