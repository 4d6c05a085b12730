//! Dispatch optimization: variable/constraint assembly, objective, and the
//! solver adapter.

pub mod asset;
pub mod model;
pub mod objective;
pub mod solver;

pub use asset::AssetParameters;
pub use model::DispatchModel;
pub use objective::{MarketFees, TariffSchedule, profit_expression};
pub use solver::{SolveError, SolveOptions, SolvedDispatch, solve};
