//! Horizon timestamps and the per-solve price window.

use chrono::{DateTime, Duration, Utc};

use crate::market::{InputDataError, Market};

/// An ordered sequence of evenly spaced time steps anchored at a start
/// timestamp.
///
/// Regenerated for every solve; never mutated in place.
///
/// # Examples
///
/// ```
/// use bess_arb::horizon::Horizon;
/// use chrono::{Duration, TimeZone, Utc};
///
/// let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
/// let horizon = Horizon::new(start, 48, Duration::minutes(30));
/// assert_eq!(horizon.steps(), 48);
/// assert_eq!(horizon.dt_hours(), 0.5);
/// ```
#[derive(Debug, Clone)]
pub struct Horizon {
    start: DateTime<Utc>,
    steps: usize,
    step: Duration,
}

impl Horizon {
    /// Creates a horizon of `steps` intervals of length `step` from `start`.
    ///
    /// # Panics
    ///
    /// Panics if `steps < 2` (the start and end anchors need distinct steps)
    /// or if `step` is not positive.
    pub fn new(start: DateTime<Utc>, steps: usize, step: Duration) -> Self {
        assert!(steps >= 2, "horizon needs at least 2 steps");
        assert!(step > Duration::zero(), "step duration must be positive");
        Self { start, steps, step }
    }

    /// The horizon's anchor timestamp.
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Number of time steps.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Step duration.
    pub fn step(&self) -> Duration {
        self.step
    }

    /// Step duration in hours, for converting power into an energy delta.
    pub fn dt_hours(&self) -> f64 {
        self.step.num_seconds() as f64 / 3600.0
    }

    /// Timestamp of step `p`.
    pub fn timestamp(&self, p: usize) -> DateTime<Utc> {
        self.start + self.step * p as i32
    }

    /// All step timestamps in order.
    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        (0..self.steps).map(|p| self.timestamp(p)).collect()
    }
}

/// Per-market price and availability values aligned to one horizon.
///
/// Assembled fresh for every solve from the market series, with missing
/// observations filled from the most recent earlier value.
#[derive(Debug, Clone)]
pub struct PriceWindow {
    market_names: Vec<String>,
    /// `prices[m][p]`: price of market `m` at step `p`.
    prices: Vec<Vec<f64>>,
    /// `availability[m][p]`: tradable fraction of capacity.
    availability: Vec<Vec<f64>>,
    steps: usize,
}

impl PriceWindow {
    /// Aligns every market's price and availability series to the horizon.
    ///
    /// # Errors
    ///
    /// Returns an [`InputDataError`] if any market lacks an observation at or
    /// before any horizon timestamp.
    pub fn assemble(markets: &[Market], horizon: &Horizon) -> Result<Self, InputDataError> {
        let mut prices = Vec::with_capacity(markets.len());
        let mut availability = Vec::with_capacity(markets.len());

        for market in markets {
            let mut market_prices = Vec::with_capacity(horizon.steps());
            let mut market_avail = Vec::with_capacity(horizon.steps());
            for p in 0..horizon.steps() {
                let at = horizon.timestamp(p);
                market_prices.push(market.price_at(at)?);
                market_avail.push(market.availability_at(at));
            }
            prices.push(market_prices);
            availability.push(market_avail);
        }

        Ok(Self {
            market_names: markets.iter().map(|m| m.name.clone()).collect(),
            prices,
            availability,
            steps: horizon.steps(),
        })
    }

    /// Market names in window order.
    pub fn market_names(&self) -> &[String] {
        &self.market_names
    }

    /// Number of markets in the window.
    pub fn num_markets(&self) -> usize {
        self.market_names.len()
    }

    /// Number of time steps in the window.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Price of market `m` at step `p`.
    pub fn price(&self, m: usize, p: usize) -> f64 {
        self.prices[m][p]
    }

    /// Availability of market `m` at step `p`.
    pub fn availability(&self, m: usize, p: usize) -> f64 {
        self.availability[m][p]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::PriceSeries;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn timestamps_are_evenly_spaced() {
        let horizon = Horizon::new(start(), 4, Duration::minutes(30));
        let ts = horizon.timestamps();
        assert_eq!(ts.len(), 4);
        for pair in ts.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::minutes(30));
        }
    }

    #[test]
    fn dt_hours_for_half_hour_step() {
        let horizon = Horizon::new(start(), 48, Duration::minutes(30));
        assert_eq!(horizon.dt_hours(), 0.5);
    }

    #[test]
    #[should_panic]
    fn single_step_horizon_panics() {
        Horizon::new(start(), 1, Duration::minutes(30));
    }

    #[test]
    fn window_aligns_sparse_prices() {
        // Hourly observations against a half-hourly horizon: every other step
        // carries the previous hour's price forward.
        let prices = PriceSeries::from_points([
            (start(), 10.0),
            (start() + Duration::hours(1), 20.0),
        ]);
        let market = Market::new("epex_hh", prices);
        let horizon = Horizon::new(start(), 4, Duration::minutes(30));

        let window = PriceWindow::assemble(&[market], &horizon).unwrap();
        assert_eq!(window.price(0, 0), 10.0);
        assert_eq!(window.price(0, 1), 10.0);
        assert_eq!(window.price(0, 2), 20.0);
        assert_eq!(window.price(0, 3), 20.0);
    }

    #[test]
    fn window_fails_before_first_observation() {
        let prices = PriceSeries::from_points([(start() + Duration::hours(1), 20.0)]);
        let market = Market::new("nordpool_hr", prices);
        let horizon = Horizon::new(start(), 4, Duration::minutes(30));

        let err = PriceWindow::assemble(&[market], &horizon).unwrap_err();
        assert_eq!(err.market, "nordpool_hr");
        assert_eq!(err.at, start());
    }

    #[test]
    fn window_covers_all_markets() {
        let a = Market::new("epex_hh", PriceSeries::from_points([(start(), 10.0)]));
        let b = Market::new("nordpool_hr", PriceSeries::from_points([(start(), 30.0)]));
        let horizon = Horizon::new(start(), 3, Duration::minutes(30));

        let window = PriceWindow::assemble(&[a, b], &horizon).unwrap();
        assert_eq!(window.num_markets(), 2);
        assert_eq!(window.market_names(), ["epex_hh", "nordpool_hr"]);
        assert_eq!(window.price(1, 2), 30.0);
        assert_eq!(window.availability(0, 0), 1.0);
    }
}
