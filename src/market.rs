//! Wholesale market price and availability series.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

use chrono::{DateTime, Utc};

/// A time-indexed series of observations, keyed by UTC timestamp.
///
/// Lookups carry the most recent earlier observation forward, so sparse or
/// irregular source data still yields a value for every horizon step. A lookup
/// before the first observation has no fallback and returns `None`.
#[derive(Debug, Clone, Default)]
pub struct PriceSeries {
    points: BTreeMap<DateTime<Utc>, f64>,
}

impl PriceSeries {
    /// Creates an empty series.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a series from `(timestamp, value)` pairs. Duplicate timestamps
    /// keep the last value.
    pub fn from_points(points: impl IntoIterator<Item = (DateTime<Utc>, f64)>) -> Self {
        Self {
            points: points.into_iter().collect(),
        }
    }

    /// Inserts an observation, replacing any existing value at that timestamp.
    pub fn insert(&mut self, at: DateTime<Utc>, value: f64) {
        self.points.insert(at, value);
    }

    /// Returns the value at `at`, or the most recent earlier observation.
    pub fn at_or_before(&self, at: DateTime<Utc>) -> Option<f64> {
        self.points.range(..=at).next_back().map(|(_, v)| *v)
    }

    /// Timestamp of the earliest observation.
    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.points.keys().next().copied()
    }

    /// Number of observations in the series.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the series holds no observations.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// One tradable venue: a name, a price series, and an optional availability
/// series (fraction of asset capacity tradable per step, default 1).
///
/// Markets are read-only inputs owned by the caller; the market set is fixed
/// when the controller is constructed.
#[derive(Debug, Clone)]
pub struct Market {
    /// Venue name, used for trace column headers and error context.
    pub name: String,
    prices: PriceSeries,
    availability: PriceSeries,
}

impl Market {
    /// Creates a market with full availability at every step.
    pub fn new(name: impl Into<String>, prices: PriceSeries) -> Self {
        Self {
            name: name.into(),
            prices,
            availability: PriceSeries::new(),
        }
    }

    /// Attaches an availability series (fractions of capacity in [0, 1]).
    pub fn with_availability(mut self, availability: PriceSeries) -> Self {
        self.availability = availability;
        self
    }

    /// Price at `at`, carrying the most recent earlier observation forward.
    ///
    /// # Errors
    ///
    /// Returns an [`InputDataError`] if the market has no observation at or
    /// before `at`.
    pub fn price_at(&self, at: DateTime<Utc>) -> Result<f64, InputDataError> {
        self.prices.at_or_before(at).ok_or_else(|| InputDataError {
            market: self.name.clone(),
            at,
        })
    }

    /// Availability at `at`. Markets without an availability series (or with
    /// no observation at or before `at`) are fully available.
    pub fn availability_at(&self, at: DateTime<Utc>) -> f64 {
        self.availability.at_or_before(at).unwrap_or(1.0)
    }

    /// Timestamp of the earliest price observation.
    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.prices.first_timestamp()
    }
}

/// Requested horizon extends before the market's available price data.
///
/// Fatal for the cycle that requested the window; surfaced before any model
/// is built.
#[derive(Debug, Clone, PartialEq)]
pub struct InputDataError {
    /// Market whose data was missing.
    pub market: String,
    /// Timestamp with no observation at or before it.
    pub at: DateTime<Utc>,
}

impl fmt::Display for InputDataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "market \"{}\" has no price at or before {}",
            self.market,
            self.at.to_rfc3339()
        )
    }
}

impl Error for InputDataError {}
