//! Rolling-horizon controller: repeated solves chained into a continuous
//! dispatch policy.

use std::error::Error;
use std::fmt;

use chrono::{DateTime, Duration, Utc};

use crate::horizon::{Horizon, PriceWindow};
use crate::market::{InputDataError, Market};
use crate::opt::{
    AssetParameters, DispatchModel, SolveError, SolveOptions, SolvedDispatch, TariffSchedule,
    profit_expression, solve,
};
use crate::trace::{DispatchTrace, TraceRecord};

/// A cycle failure with enough context to diagnose it.
#[derive(Debug, Clone)]
pub struct CycleError {
    /// Index of the failed cycle.
    pub cycle: usize,
    /// Start timestamp of the failed cycle's horizon.
    pub start: DateTime<Utc>,
    /// What went wrong.
    pub kind: CycleFailure,
}

/// The two ways a cycle can fail: before the model exists, or in the solver.
#[derive(Debug, Clone)]
pub enum CycleFailure {
    /// Price data did not cover the requested window.
    Input(InputDataError),
    /// The solver reported no usable assignment.
    Solve(SolveError),
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cycle {} (start {}): ",
            self.cycle,
            self.start.to_rfc3339()
        )?;
        match &self.kind {
            CycleFailure::Input(e) => write!(f, "{e}"),
            CycleFailure::Solve(e) => write!(f, "{e}"),
        }
    }
}

impl Error for CycleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.kind {
            CycleFailure::Input(e) => Some(e),
            CycleFailure::Solve(e) => Some(e),
        }
    }
}

/// Drives the build → solve → extract → anchor loop.
///
/// Owns the asset parameters, the fixed market set, the scalar anchor soc,
/// and the append-only [`DispatchTrace`]; nothing else survives a cycle. Each
/// cycle builds a fresh horizon, model, and objective, solves, appends the
/// step-0 realized dispatch to the trace, anchors the next cycle's start soc
/// to the solved `soc[1]`, and advances the start timestamp by one step. The
/// controller is the only caller of the solver adapter.
///
/// A failed cycle aborts the run without touching the anchor: stale values
/// are never rolled forward.
pub struct RollingHorizonController {
    asset: AssetParameters,
    markets: Vec<Market>,
    tariffs: TariffSchedule,
    horizon_steps: usize,
    step: Duration,
    target_soc: f64,
    options: SolveOptions,
    start_soc: f64,
    trace: DispatchTrace,
    last_solution: Option<SolvedDispatch>,
}

impl RollingHorizonController {
    /// Creates a controller.
    ///
    /// # Arguments
    ///
    /// * `asset` - Battery parameters, fixed for the run
    /// * `markets` - Tradable venues; the set cannot change mid-run
    /// * `tariffs` - Fees and grid tariffs, one fee entry per market
    /// * `horizon_steps` - Look-ahead length H per solve (>= 2)
    /// * `step` - Step duration
    /// * `initial_soc` - Anchor for the first cycle
    /// * `target_soc` - End-anchor reference level for every solve
    /// * `options` - Solver options
    ///
    /// # Panics
    ///
    /// Panics if `markets` is empty or the fee count does not match it.
    #[expect(clippy::too_many_arguments)]
    pub fn new(
        asset: AssetParameters,
        markets: Vec<Market>,
        tariffs: TariffSchedule,
        horizon_steps: usize,
        step: Duration,
        initial_soc: f64,
        target_soc: f64,
        options: SolveOptions,
    ) -> Self {
        assert!(!markets.is_empty(), "at least one market is required");
        assert_eq!(
            tariffs.market_fees.len(),
            markets.len(),
            "one fee entry per market"
        );
        assert!(horizon_steps >= 2, "horizon needs at least 2 steps");

        let market_names = markets.iter().map(|m| m.name.clone()).collect();
        Self {
            asset,
            markets,
            tariffs,
            horizon_steps,
            step,
            target_soc,
            options,
            start_soc: initial_soc,
            trace: DispatchTrace::new(market_names),
            last_solution: None,
        }
    }

    /// Runs `cycles` rolling-horizon cycles from `start`.
    ///
    /// Each cycle fully completes before the next begins; its inputs depend
    /// on the previous cycle's anchor. The first failure aborts the run.
    ///
    /// # Errors
    ///
    /// Returns a [`CycleError`] carrying the failed cycle's index and start
    /// timestamp. Records of cycles completed before the failure remain in
    /// the trace.
    pub fn run(&mut self, start: DateTime<Utc>, cycles: usize) -> Result<(), CycleError> {
        let mut cycle_start = start;
        for cycle in 0..cycles {
            self.run_cycle(cycle, cycle_start)
                .map_err(|kind| CycleError {
                    cycle,
                    start: cycle_start,
                    kind,
                })?;
            cycle_start += self.step;
        }
        Ok(())
    }

    /// One build → solve → extract → anchor cycle.
    fn run_cycle(&mut self, cycle: usize, start: DateTime<Utc>) -> Result<(), CycleFailure> {
        // BUILDING: fresh horizon, window, model, and objective; the previous
        // cycle's model was consumed by its solve.
        let horizon = Horizon::new(start, self.horizon_steps, self.step);
        let window =
            PriceWindow::assemble(&self.markets, &horizon).map_err(CycleFailure::Input)?;
        let model = DispatchModel::build(
            &self.asset,
            &window,
            horizon.dt_hours(),
            self.start_soc,
            self.target_soc,
        );
        let objective = profit_expression(&model, &window, &self.tariffs);

        // SOLVING
        let solved = solve(model, objective, &self.options).map_err(CycleFailure::Solve)?;

        // EXTRACTING: only step 0 is realized.
        let record = self.realized_record(cycle, start, &window, &solved);
        self.trace.push(record);

        // ANCHORED: the solved soc[1] is the state one real step ahead; the
        // p=0→1 transition constraint already enforces the transition law.
        self.start_soc = solved.soc[1];
        self.last_solution = Some(solved);
        Ok(())
    }

    /// Builds the trace record for one cycle's realized first step.
    fn realized_record(
        &self,
        cycle: usize,
        start: DateTime<Utc>,
        window: &PriceWindow,
        solved: &SolvedDispatch,
    ) -> TraceRecord {
        let mut profit = 0.0;
        let mut buy_mw = Vec::with_capacity(window.num_markets());
        let mut sell_mw = Vec::with_capacity(window.num_markets());

        for m in 0..window.num_markets() {
            let buy = solved.buy[m][0];
            let sell = solved.sell[m][0];
            let weight = window.price(m, 0) * window.availability(m, 0);
            let fees = self.tariffs.market_fees[m];
            profit += buy * weight + sell * weight - sell * fees.sell_fee + buy * fees.buy_fee;
            buy_mw.push(buy);
            sell_mw.push(sell);
        }
        profit -= self.tariffs.export_cost * solved.export[0]
            - self.tariffs.import_cost * solved.import[0];

        TraceRecord {
            cycle,
            start,
            start_soc: self.start_soc,
            import_mw: solved.import[0],
            export_mw: solved.export[0],
            buy_mw,
            sell_mw,
            realized_profit: profit,
            planned_objective: solved.objective_value,
        }
    }

    /// The realized dispatch trace accumulated so far.
    pub fn trace(&self) -> &DispatchTrace {
        &self.trace
    }

    /// The most recent cycle's full solved horizon, for inspection or
    /// plotting. `None` until a cycle completes.
    pub fn last_solution(&self) -> Option<&SolvedDispatch> {
        self.last_solution.as_ref()
    }

    /// The anchor state of charge for the next cycle.
    pub fn start_soc(&self) -> f64 {
        self.start_soc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::PriceSeries;
    use crate::opt::MarketFees;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn flat_market(price: f64) -> Market {
        Market::new("epex_hh", PriceSeries::from_points([(start(), price)]))
    }

    fn tariffs() -> TariffSchedule {
        TariffSchedule {
            import_cost: 5.0,
            export_cost: 0.5,
            market_fees: vec![MarketFees {
                buy_fee: 0.001,
                sell_fee: 0.001,
            }],
        }
    }

    fn controller(market: Market, tariffs: TariffSchedule) -> RollingHorizonController {
        RollingHorizonController::new(
            AssetParameters::new(1.0, 1.0, 1.0, 0.0, 1.0),
            vec![market],
            tariffs,
            4,
            Duration::minutes(30),
            0.5,
            0.5,
            SolveOptions::default(),
        )
    }

    #[test]
    #[should_panic]
    fn empty_market_set_panics() {
        RollingHorizonController::new(
            AssetParameters::new(1.0, 1.0, 1.0, 0.0, 1.0),
            Vec::new(),
            TariffSchedule::free(0),
            4,
            Duration::minutes(30),
            0.5,
            0.5,
            SolveOptions::default(),
        );
    }

    #[test]
    fn trace_grows_one_record_per_cycle() {
        let mut c = controller(flat_market(50.0), tariffs());
        c.run(start(), 3).unwrap();
        assert_eq!(c.trace().len(), 3);
        assert!(c.last_solution().is_some());
    }

    #[test]
    fn cycle_starts_advance_by_one_step() {
        let mut c = controller(flat_market(50.0), tariffs());
        c.run(start(), 3).unwrap();
        let records = c.trace().records();
        assert_eq!(records[0].start, start());
        assert_eq!(records[1].start, start() + Duration::minutes(30));
        assert_eq!(records[2].start, start() + Duration::minutes(60));
    }

    #[test]
    fn missing_price_data_fails_cycle_zero_with_context() {
        // Data begins one hour after the requested start.
        let market = Market::new(
            "epex_hh",
            PriceSeries::from_points([(start() + Duration::hours(1), 50.0)]),
        );
        let mut c = controller(market, tariffs());

        let err = c.run(start(), 3).unwrap_err();
        assert_eq!(err.cycle, 0);
        assert_eq!(err.start, start());
        assert!(matches!(err.kind, CycleFailure::Input(_)));
        assert!(c.trace().is_empty());
    }

    #[test]
    fn infeasible_solve_does_not_move_the_anchor() {
        // Target soc outside the soc band makes the end anchor unsatisfiable.
        let mut c = RollingHorizonController::new(
            AssetParameters::new(1.0, 1.0, 1.0, 0.0, 0.4),
            vec![flat_market(50.0)],
            tariffs(),
            4,
            Duration::minutes(30),
            0.3,
            0.9,
            SolveOptions::default(),
        );

        let err = c.run(start(), 2).unwrap_err();
        assert_eq!(err.cycle, 0);
        assert!(matches!(
            err.kind,
            CycleFailure::Solve(SolveError::Infeasible)
        ));
        assert_eq!(c.start_soc(), 0.3);
    }
}
