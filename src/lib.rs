// Library module for the deal engine; binaries and tests build on this

pub mod api;
pub mod config;
pub mod deals;
pub mod error;

pub use deals::market::estimate_market_price;
pub use deals::normalize::normalize_listing;
pub use deals::score::score_and_categorize;
