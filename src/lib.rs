//! Rolling-horizon dispatch optimizer for a grid-connected battery trading
//! across wholesale energy markets.

pub mod config;
pub mod controller;
pub mod horizon;
pub mod io;
pub mod market;
pub mod opt;
pub mod trace;
