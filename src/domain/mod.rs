//! Core domain types and logic.

pub mod error;
pub mod token;
pub mod expr;
pub mod context;
pub mod expr_parser;
pub mod evaluator;
pub mod trigger;
pub mod registry;
pub mod order;
pub mod ohlcv;
pub mod strategy;
pub mod settings;
pub mod engine;
