//! Shared fixtures for the integration suites.

use chrono::{DateTime, Duration, TimeZone, Utc};

use bess_arb::horizon::{Horizon, PriceWindow};
use bess_arb::market::{Market, PriceSeries};
use bess_arb::opt::{
    AssetParameters, DispatchModel, SolveError, SolveOptions, SolvedDispatch, TariffSchedule,
    profit_expression, solve,
};

pub const TOLERANCE: f64 = 1e-6;

/// Common run start: midnight UTC on a fixed date.
pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

/// A lossless 1 MW / 1 MWh battery with the full soc range usable.
pub fn unit_asset() -> AssetParameters {
    AssetParameters::new(1.0, 1.0, 1.0, 0.0, 1.0)
}

/// A market quoting one constant price from the run start onwards.
pub fn flat_market(name: &str, price: f64) -> Market {
    Market::new(name, PriceSeries::from_points([(start(), price)]))
}

/// A market with one price per half-hour step, starting at the run start.
pub fn stepped_market(name: &str, prices: &[f64]) -> Market {
    let points = prices
        .iter()
        .enumerate()
        .map(|(p, &price)| (start() + Duration::minutes(30 * p as i64), price));
    Market::new(name, PriceSeries::from_points(points))
}

/// Builds and solves one half-hourly window over the given markets.
pub fn solve_window(
    asset: &AssetParameters,
    markets: &[Market],
    tariffs: &TariffSchedule,
    steps: usize,
    start_soc: f64,
    target_soc: f64,
) -> Result<SolvedDispatch, SolveError> {
    let horizon = Horizon::new(start(), steps, Duration::minutes(30));
    let window = PriceWindow::assemble(markets, &horizon).unwrap();
    let model = DispatchModel::build(asset, &window, horizon.dt_hours(), start_soc, target_soc);
    let objective = profit_expression(&model, &window, tariffs);
    solve(model, objective, &SolveOptions::default())
}

pub fn assert_close(actual: f64, expected: f64, what: &str) {
    assert!(
        (actual - expected).abs() < TOLERANCE,
        "{what}: expected {expected}, got {actual}"
    );
}
