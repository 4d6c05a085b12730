/// Physical parameters of the battery asset, fixed for a whole run.
///
/// All power quantities are in MW; state of charge is a fraction of usable
/// energy capacity. The energy capacity is `capacity_mw * storage_ratio` MWh.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetParameters {
    /// Power capacity in MW (charge and discharge).
    pub capacity_mw: f64,

    /// Energy-to-power ratio in hours (MWh of storage per MW of power).
    pub storage_ratio: f64,

    /// Round-trip efficiency in (0, 1], applied once on import.
    pub efficiency: f64,

    /// Minimum state of charge (fraction of energy capacity).
    pub min_soc: f64,

    /// Maximum state of charge (fraction of energy capacity).
    pub max_soc: f64,
}

impl AssetParameters {
    /// Creates asset parameters.
    ///
    /// # Panics
    ///
    /// Panics if capacity or storage ratio is not positive, the efficiency is
    /// outside (0, 1], or the soc bounds are outside [0, 1] or inverted.
    /// Equal min/max soc is allowed here so that contradictory anchor
    /// scenarios reach the solver and report infeasibility; configuration
    /// validation is stricter.
    pub fn new(
        capacity_mw: f64,
        storage_ratio: f64,
        efficiency: f64,
        min_soc: f64,
        max_soc: f64,
    ) -> Self {
        assert!(capacity_mw > 0.0);
        assert!(storage_ratio > 0.0);
        assert!(efficiency > 0.0 && efficiency <= 1.0);
        assert!((0.0..=1.0).contains(&min_soc));
        assert!((0.0..=1.0).contains(&max_soc));
        assert!(min_soc <= max_soc);

        Self {
            capacity_mw,
            storage_ratio,
            efficiency,
            min_soc,
            max_soc,
        }
    }

    /// Usable energy capacity in MWh.
    pub fn energy_capacity_mwh(&self) -> f64 {
        self.capacity_mw * self.storage_ratio
    }
}
