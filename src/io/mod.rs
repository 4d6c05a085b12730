//! File input and output: price data loading and trace export.

pub mod export;
pub mod prices;
