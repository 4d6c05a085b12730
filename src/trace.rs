//! The realized dispatch trace and its post-hoc summary.

use std::fmt;

use chrono::{DateTime, Utc};

/// The realized first-step dispatch of one rolling-horizon cycle.
///
/// Only step 0 of each solve is realized; the rest of the plan is discarded
/// when the horizon rolls forward.
#[derive(Debug, Clone)]
pub struct TraceRecord {
    /// Cycle index within the run.
    pub cycle: usize,
    /// Start timestamp of the cycle's horizon.
    pub start: DateTime<Utc>,
    /// State of charge anchoring this cycle.
    pub start_soc: f64,
    /// Realized charge power at step 0 (MW, non-positive).
    pub import_mw: f64,
    /// Realized discharge power at step 0 (MW, non-negative).
    pub export_mw: f64,
    /// Realized bought energy per market at step 0 (non-positive).
    pub buy_mw: Vec<f64>,
    /// Realized sold energy per market at step 0 (non-negative).
    pub sell_mw: Vec<f64>,
    /// Profit of the realized step-0 dispatch (fees and tariffs included).
    pub realized_profit: f64,
    /// Objective value of the full solved horizon this step came from.
    pub planned_objective: f64,
}

impl fmt::Display for TraceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cycle={:>3} {} | soc={:>5.1}%  imp={:>6.3} MW  exp={:>6.3} MW | \
             profit={:>8.3} (plan {:>9.3})",
            self.cycle,
            self.start.format("%Y-%m-%d %H:%M"),
            self.start_soc * 100.0,
            self.import_mw,
            self.export_mw,
            self.realized_profit,
            self.planned_objective,
        )
    }
}

/// Ordered, append-only record of realized first-step decisions across all
/// cycles of a run. This is the actual output of the system.
#[derive(Debug, Clone)]
pub struct DispatchTrace {
    /// Market names, fixed at controller construction; `buy_mw`/`sell_mw` in
    /// every record follow this order.
    pub market_names: Vec<String>,
    records: Vec<TraceRecord>,
}

impl DispatchTrace {
    /// Creates an empty trace for the given market set.
    pub fn new(market_names: Vec<String>) -> Self {
        Self {
            market_names,
            records: Vec::new(),
        }
    }

    /// Appends one cycle's realized record.
    pub fn push(&mut self, record: TraceRecord) {
        self.records.push(record);
    }

    /// All records in cycle order.
    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    /// Number of recorded cycles.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no cycle has completed yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Aggregate indicators derived from a complete dispatch trace.
///
/// Computed post-hoc from the records so reported figures always agree with
/// the trace itself.
#[derive(Debug, Clone)]
pub struct TraceSummary {
    /// Number of completed cycles.
    pub cycles: usize,
    /// Total realized profit across all recorded steps.
    pub realized_profit: f64,
    /// Gross traded energy across all markets (MWh, sum of |buy|+|sell| times dt).
    pub traded_mwh: f64,
    /// Battery energy throughput (MWh, sum of |power|·dt).
    pub throughput_mwh: f64,
    /// Equivalent full cycles (throughput / 2·energy capacity).
    pub equivalent_full_cycles: f64,
    /// Lowest anchor state of charge seen.
    pub min_soc: f64,
    /// Highest anchor state of charge seen.
    pub max_soc: f64,
    /// Anchor state of charge after the last recorded cycle.
    pub final_soc: f64,
}

impl TraceSummary {
    /// Computes all indicators from the complete trace.
    ///
    /// # Arguments
    ///
    /// * `trace` - Complete run trace
    /// * `dt_hours` - Step duration in hours
    /// * `energy_capacity_mwh` - Battery energy capacity for cycle counting
    pub fn from_trace(trace: &DispatchTrace, dt_hours: f64, energy_capacity_mwh: f64) -> Self {
        if trace.is_empty() {
            return Self {
                cycles: 0,
                realized_profit: 0.0,
                traded_mwh: 0.0,
                throughput_mwh: 0.0,
                equivalent_full_cycles: 0.0,
                min_soc: 0.0,
                max_soc: 0.0,
                final_soc: 0.0,
            };
        }

        let mut profit = 0.0;
        let mut traded = 0.0;
        let mut throughput = 0.0;
        let mut min_soc = f64::INFINITY;
        let mut max_soc = f64::NEG_INFINITY;

        for r in trace.records() {
            profit += r.realized_profit;
            for m in 0..r.buy_mw.len() {
                traded += (r.buy_mw[m].abs() + r.sell_mw[m].abs()) * dt_hours;
            }
            throughput += (r.export_mw.abs() + r.import_mw.abs()) * dt_hours;
            min_soc = min_soc.min(r.start_soc);
            max_soc = max_soc.max(r.start_soc);
        }

        let equivalent_full_cycles = if energy_capacity_mwh > 0.0 {
            throughput / (2.0 * energy_capacity_mwh)
        } else {
            0.0
        };

        Self {
            cycles: trace.len(),
            realized_profit: profit,
            traded_mwh: traded,
            throughput_mwh: throughput,
            equivalent_full_cycles,
            min_soc,
            max_soc,
            final_soc: trace.records().last().map(|r| r.start_soc).unwrap_or(0.0),
        }
    }
}

impl fmt::Display for TraceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Dispatch Summary ---")?;
        writeln!(f, "Cycles completed:   {}", self.cycles)?;
        writeln!(f, "Realized profit:    {:.3}", self.realized_profit)?;
        writeln!(f, "Energy traded:      {:.3} MWh", self.traded_mwh)?;
        writeln!(
            f,
            "Battery throughput: {:.3} MWh ({:.3} equiv. cycles)",
            self.throughput_mwh, self.equivalent_full_cycles
        )?;
        writeln!(
            f,
            "Anchor soc range:   {:.1}% - {:.1}%",
            self.min_soc * 100.0,
            self.max_soc * 100.0
        )?;
        write!(f, "Final soc:          {:.1}%", self.final_soc * 100.0)
    }
}
