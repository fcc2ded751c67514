//! Guitar deal pipeline - normalize listings, estimate market prices, score and categorize

pub mod categorize;
pub mod engine;
pub mod market;
pub mod normalize;
pub mod postgres;
pub mod reference;
pub mod score;
pub mod store;
pub mod types;
pub mod utils;

pub use types::*;
