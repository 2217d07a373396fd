//! Port traits: the boundary between the domain and its collaborators.

pub mod config_port;
pub mod market_port;
pub mod order_port;
