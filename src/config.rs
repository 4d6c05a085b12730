//! Run configuration: TOML sections, defaults, and validation.
//!
//! A [`DispatchConfig`] is deserialized from TOML, checked with
//! [`DispatchConfig::validate`], and then converted into the typed pieces
//! the controller consumes. Unknown keys are rejected so a typo in a config
//! file fails loudly instead of silently falling back to a default.

use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;

use chrono::Duration;
use serde::Deserialize;

use crate::opt::{AssetParameters, MarketFees, SolveOptions, TariffSchedule};

/// A single configuration problem, tied to the field that caused it.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config field `{}`: {}", self.field, self.message)
    }
}

impl Error for ConfigError {}

/// Failure to load a config file at all, as opposed to bad values in it.
#[derive(Debug)]
pub enum ConfigLoadError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigLoadError::Io(e) => write!(f, "failed to read config file: {e}"),
            ConfigLoadError::Parse(e) => write!(f, "failed to parse config: {e}"),
        }
    }
}

impl Error for ConfigLoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigLoadError::Io(e) => Some(e),
            ConfigLoadError::Parse(e) => Some(e),
        }
    }
}

/// Battery asset section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AssetConfig {
    /// Rated power in MW.
    pub capacity_mw: f64,
    /// Hours of storage at rated power.
    pub storage_ratio: f64,
    /// One-way charge efficiency in (0, 1].
    pub efficiency: f64,
    /// Lower state-of-charge bound, fraction of usable capacity.
    pub min_soc: f64,
    /// Upper state-of-charge bound, fraction of usable capacity.
    pub max_soc: f64,
    /// State of charge anchoring the first cycle.
    pub initial_soc: f64,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            capacity_mw: 1.0,
            storage_ratio: 2.0,
            efficiency: 0.9,
            min_soc: 0.0,
            max_soc: 1.0,
            initial_soc: 0.5,
        }
    }
}

/// Look-ahead horizon section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct HorizonConfig {
    /// Number of steps per solve, including the anchored first step.
    pub steps: usize,
    /// Step duration in minutes.
    pub step_minutes: i64,
}

impl Default for HorizonConfig {
    fn default() -> Self {
        Self {
            steps: 48,
            step_minutes: 30,
        }
    }
}

/// Rolling-run section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ControllerConfig {
    /// Number of cycles to run.
    pub cycles: usize,
    /// End-anchor state of charge for every solve.
    pub target_soc: f64,
    /// Per-solve wall-clock limit in seconds. `None` means no limit.
    pub solve_time_limit_secs: Option<u64>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            cycles: 48,
            target_soc: 0.5,
            solve_time_limit_secs: None,
        }
    }
}

/// Grid tariff section, applied to net battery flows across all markets.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TariffConfig {
    /// Cost per MW of grid import.
    pub import_cost: f64,
    /// Cost per MW of grid export.
    pub export_cost: f64,
}

impl Default for TariffConfig {
    fn default() -> Self {
        Self {
            import_cost: 5.0,
            export_cost: 0.5,
        }
    }
}

/// One tradable market and its venue fees.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarketConfig {
    /// Market name, matched against the price data.
    pub name: String,
    /// Fee per MW bought.
    #[serde(default = "default_fee")]
    pub buy_fee: f64,
    /// Fee per MW sold.
    #[serde(default = "default_fee")]
    pub sell_fee: f64,
}

fn default_fee() -> f64 {
    0.001
}

fn default_markets() -> Vec<MarketConfig> {
    vec![MarketConfig {
        name: "epex_hh".to_string(),
        buy_fee: default_fee(),
        sell_fee: default_fee(),
    }]
}

/// Top-level run configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DispatchConfig {
    pub asset: AssetConfig,
    pub horizon: HorizonConfig,
    pub controller: ControllerConfig,
    pub tariffs: TariffConfig,
    pub markets: Vec<MarketConfig>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            asset: AssetConfig::default(),
            horizon: HorizonConfig::default(),
            controller: ControllerConfig::default(),
            tariffs: TariffConfig::default(),
            markets: default_markets(),
        }
    }
}

impl DispatchConfig {
    /// The baseline setup: a 1 MW / 2 MWh battery trading one half-hourly
    /// market over a 24-hour horizon.
    pub fn baseline() -> Self {
        Self::default()
    }

    /// Parses a config from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or contains unknown keys.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigLoadError> {
        toml::from_str(s).map_err(ConfigLoadError::Parse)
    }

    /// Reads and parses a config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigLoadError> {
        let raw = fs::read_to_string(path).map_err(ConfigLoadError::Io)?;
        Self::from_toml_str(&raw)
    }

    /// Checks every field for physical and structural sanity.
    ///
    /// Returns all problems found, not just the first, so a bad config can
    /// be fixed in one pass.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.asset.capacity_mw <= 0.0 {
            errors.push(ConfigError::new("asset.capacity_mw", "must be positive"));
        }
        if self.asset.storage_ratio <= 0.0 {
            errors.push(ConfigError::new("asset.storage_ratio", "must be positive"));
        }
        if self.asset.efficiency <= 0.0 || self.asset.efficiency > 1.0 {
            errors.push(ConfigError::new(
                "asset.efficiency",
                "must be in (0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.asset.min_soc) {
            errors.push(ConfigError::new("asset.min_soc", "must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.asset.max_soc) {
            errors.push(ConfigError::new("asset.max_soc", "must be in [0, 1]"));
        }
        if self.asset.min_soc >= self.asset.max_soc {
            errors.push(ConfigError::new(
                "asset.min_soc",
                "must be strictly below max_soc",
            ));
        }
        if !(self.asset.min_soc..=self.asset.max_soc).contains(&self.asset.initial_soc) {
            errors.push(ConfigError::new(
                "asset.initial_soc",
                "must lie within [min_soc, max_soc]",
            ));
        }

        if self.horizon.steps < 2 {
            errors.push(ConfigError::new("horizon.steps", "must be at least 2"));
        }
        if self.horizon.step_minutes <= 0 {
            errors.push(ConfigError::new("horizon.step_minutes", "must be positive"));
        }

        if self.controller.cycles == 0 {
            errors.push(ConfigError::new("controller.cycles", "must be positive"));
        }
        if !(self.asset.min_soc..=self.asset.max_soc).contains(&self.controller.target_soc) {
            errors.push(ConfigError::new(
                "controller.target_soc",
                "must lie within [min_soc, max_soc]",
            ));
        }

        if self.tariffs.import_cost < 0.0 {
            errors.push(ConfigError::new("tariffs.import_cost", "must not be negative"));
        }
        if self.tariffs.export_cost < 0.0 {
            errors.push(ConfigError::new("tariffs.export_cost", "must not be negative"));
        }

        if self.markets.is_empty() {
            errors.push(ConfigError::new("markets", "at least one market is required"));
        }
        for (i, market) in self.markets.iter().enumerate() {
            if market.name.trim().is_empty() {
                errors.push(ConfigError::new(
                    &format!("markets[{i}].name"),
                    "must not be empty",
                ));
            }
            if market.buy_fee < 0.0 {
                errors.push(ConfigError::new(
                    &format!("markets[{i}].buy_fee"),
                    "must not be negative",
                ));
            }
            if market.sell_fee < 0.0 {
                errors.push(ConfigError::new(
                    &format!("markets[{i}].sell_fee"),
                    "must not be negative",
                ));
            }
        }
        for (i, market) in self.markets.iter().enumerate() {
            if self.markets[..i].iter().any(|m| m.name == market.name) {
                errors.push(ConfigError::new(
                    &format!("markets[{i}].name"),
                    "duplicate market name",
                ));
            }
        }

        errors
    }

    /// The asset parameters described by the `[asset]` section.
    ///
    /// Call [`validate`](Self::validate) first; the constructor asserts.
    pub fn to_asset_parameters(&self) -> AssetParameters {
        AssetParameters::new(
            self.asset.capacity_mw,
            self.asset.storage_ratio,
            self.asset.efficiency,
            self.asset.min_soc,
            self.asset.max_soc,
        )
    }

    /// The tariff schedule: grid tariffs plus one fee entry per market, in
    /// config order.
    pub fn to_tariffs(&self) -> TariffSchedule {
        TariffSchedule {
            import_cost: self.tariffs.import_cost,
            export_cost: self.tariffs.export_cost,
            market_fees: self
                .markets
                .iter()
                .map(|m| MarketFees {
                    buy_fee: m.buy_fee,
                    sell_fee: m.sell_fee,
                })
                .collect(),
        }
    }

    /// The step duration as a [`chrono::Duration`].
    pub fn step(&self) -> Duration {
        Duration::minutes(self.horizon.step_minutes)
    }

    /// Solver options derived from the `[controller]` section.
    pub fn solve_options(&self) -> SolveOptions {
        SolveOptions {
            time_limit: self
                .controller
                .solve_time_limit_secs
                .map(std::time::Duration::from_secs),
        }
    }
}
