//! The linear profit expression maximized by each solve.

use good_lp::Expression;

use crate::horizon::PriceWindow;
use crate::opt::model::DispatchModel;

/// Per-market transaction fees in currency per MWh traded.
///
/// Small by construction; their role is to make simultaneous buy and sell on
/// the same market/step strictly unprofitable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketFees {
    /// Fee charged on bought energy.
    pub buy_fee: f64,
    /// Fee charged on sold energy.
    pub sell_fee: f64,
}

/// Grid tariffs and per-market fees entering the objective.
///
/// `market_fees` is ordered to match the controller's market list (and hence
/// the price window). Import tariffs typically dominate export tariffs,
/// reflecting asymmetric network charges.
#[derive(Debug, Clone, PartialEq)]
pub struct TariffSchedule {
    /// Grid charge per MW of import at a step.
    pub import_cost: f64,
    /// Grid charge per MW of export at a step.
    pub export_cost: f64,
    /// Transaction fees per market, in window order.
    pub market_fees: Vec<MarketFees>,
}

impl TariffSchedule {
    /// A schedule with no fees or tariffs (useful in tests).
    pub fn free(num_markets: usize) -> Self {
        Self {
            import_cost: 0.0,
            export_cost: 0.0,
            market_fees: vec![
                MarketFees {
                    buy_fee: 0.0,
                    sell_fee: 0.0,
                };
                num_markets
            ],
        }
    }
}

/// Builds the total-profit expression over all steps and markets.
///
/// Per step and market: `buy·price·availability + sell·price·availability
/// - sell·sell_fee + buy·buy_fee`; per step: `-(export_cost·export
/// - import_cost·import)`. Because `buy <= 0`, the price term on `buy` is a
/// cost and the fee term reduces profit; maximization balances revenue
/// against both.
///
/// Rebuilt for every solve, since prices change per window.
///
/// # Panics
///
/// Panics if `tariffs.market_fees` does not match the window's market count.
pub fn profit_expression(
    model: &DispatchModel,
    window: &PriceWindow,
    tariffs: &TariffSchedule,
) -> Expression {
    assert_eq!(
        tariffs.market_fees.len(),
        window.num_markets(),
        "one fee entry per market"
    );

    let mut profit = Expression::from(0.0);

    for m in 0..window.num_markets() {
        let fees = tariffs.market_fees[m];
        for p in 0..model.steps {
            let weight = window.price(m, p) * window.availability(m, p);
            profit = profit + model.buy[m][p] * weight + model.sell[m][p] * weight;
            profit = profit - model.sell[m][p] * fees.sell_fee + model.buy[m][p] * fees.buy_fee;
        }
    }

    for p in 0..model.steps {
        profit = profit - model.export[p] * tariffs.export_cost
            + model.import[p] * tariffs.import_cost;
    }

    profit
}
