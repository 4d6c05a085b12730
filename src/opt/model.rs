//! Assembly of decision variables and constraints for one horizon instance.

use good_lp::{Constraint, IntoAffineExpression, ProblemVariables, Variable, constraint, variable, variables};

use crate::horizon::PriceWindow;
use crate::opt::asset::AssetParameters;

/// Decision variables and constraints for a single solve.
///
/// Built fresh for every cycle from `(AssetParameters, PriceWindow,
/// start_soc)` and consumed by [`crate::opt::solve`]; nothing is patched
/// incrementally across cycles. The variable handles reference columns of the
/// problem held in `vars` and carry no values until solved.
///
/// Sign conventions: `buy` and `import` are non-positive (energy drawn from a
/// market / into the battery), `sell` and `export` are non-negative. All
/// quantities are continuous.
pub struct DispatchModel {
    pub(crate) vars: ProblemVariables,
    pub(crate) constraints: Vec<Constraint>,
    /// `buy[m][p]`: energy bought from market `m` at step `p`, in
    /// [-availability·capacity, 0].
    pub buy: Vec<Vec<Variable>>,
    /// `sell[m][p]`: energy sold to market `m` at step `p`, in
    /// [0, availability·capacity].
    pub sell: Vec<Vec<Variable>>,
    /// `soc[p]`: state of charge at step `p`, in [min_soc, max_soc].
    pub soc: Vec<Variable>,
    /// `export[p]`: battery discharge power at step `p`, in [0, capacity].
    pub export: Vec<Variable>,
    /// `import[p]`: battery charge power at step `p`, in [-capacity, 0].
    pub import: Vec<Variable>,
    /// Number of horizon steps.
    pub steps: usize,
}

impl DispatchModel {
    /// Builds the variable set and constraint set for one horizon.
    ///
    /// Constraints, in order: start anchor `soc[0] == start_soc`; end anchor
    /// `soc[H-1] == target_soc`; state dynamics
    /// `soc[p+1] == soc[p] - (export[p] + η·import[p])·dt_h / (capacity·ratio)`;
    /// edge no-trade (zero buy/sell at the first and last step, whose
    /// settlement would fall outside the window); and the per-step power
    /// balance `import[p] + export[p] == Σ_m (buy[m][p] + sell[m][p])` summed
    /// over all markets.
    ///
    /// # Arguments
    ///
    /// * `asset` - Battery parameters
    /// * `window` - Aligned per-market prices and availabilities
    /// * `dt_hours` - Step duration in hours
    /// * `start_soc` - Anchor carried from the previous cycle
    /// * `target_soc` - Reference level the battery must return to by horizon
    ///   end, so successive solves stay comparable
    pub fn build(
        asset: &AssetParameters,
        window: &PriceWindow,
        dt_hours: f64,
        start_soc: f64,
        target_soc: f64,
    ) -> Self {
        let steps = window.steps();
        let mut vars = variables!();

        let soc: Vec<Variable> = (0..steps)
            .map(|_| vars.add(variable().min(asset.min_soc).max(asset.max_soc)))
            .collect();
        let export: Vec<Variable> = (0..steps)
            .map(|_| vars.add(variable().min(0.0).max(asset.capacity_mw)))
            .collect();
        let import: Vec<Variable> = (0..steps)
            .map(|_| vars.add(variable().min(-asset.capacity_mw).max(0.0)))
            .collect();

        let mut buy = Vec::with_capacity(window.num_markets());
        let mut sell = Vec::with_capacity(window.num_markets());
        for m in 0..window.num_markets() {
            let mut market_buy = Vec::with_capacity(steps);
            let mut market_sell = Vec::with_capacity(steps);
            for p in 0..steps {
                let tradable = window.availability(m, p) * asset.capacity_mw;
                market_buy.push(vars.add(variable().min(-tradable).max(0.0)));
                market_sell.push(vars.add(variable().min(0.0).max(tradable)));
            }
            buy.push(market_buy);
            sell.push(market_sell);
        }

        let mut constraints = Vec::new();

        // Anchors
        constraints.push(constraint!(soc[0] == start_soc));
        constraints.push(constraint!(soc[steps - 1] == target_soc));

        // State dynamics: power delta scaled into a soc-fraction delta by the
        // step duration and the asset's energy capacity.
        let scale = dt_hours / asset.energy_capacity_mwh();
        for p in 0..steps - 1 {
            let delta = export[p] * scale + import[p] * (asset.efficiency * scale);
            let next = soc[p].into_expression() - delta;
            constraints.push(constraint!(soc[p + 1] == next));
        }

        // Edge no-trade: first and last step settle outside the window.
        for m in 0..window.num_markets() {
            constraints.push(constraint!(buy[m][0] == 0.0));
            constraints.push(constraint!(sell[m][0] == 0.0));
            constraints.push(constraint!(buy[m][steps - 1] == 0.0));
            constraints.push(constraint!(sell[m][steps - 1] == 0.0));
        }

        // Power balance: battery power equals the net traded power summed
        // over every market at each step.
        for p in 0..steps {
            let mut traded = good_lp::Expression::from(0.0);
            for m in 0..window.num_markets() {
                traded = traded + buy[m][p] + sell[m][p];
            }
            let battery = import[p] + export[p];
            constraints.push(constraint!(battery == traded));
        }

        Self {
            vars,
            constraints,
            buy,
            sell,
            soc,
            export,
            import,
            steps,
        }
    }

    /// Number of constraint rows in the model.
    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }
}
