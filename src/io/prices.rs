//! Price data loading from long-format CSV.
//!
//! The expected schema is one row per (timestamp, market) observation:
//!
//! ```text
//! time,market,price,availability
//! 2024-06-01T00:00:00Z,epex_hh,42.5,1.0
//! ```
//!
//! The `availability` column is optional and defaults to full availability.
//! Timestamps may be sparse; lookups carry the last known price forward.

use std::error::Error;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::market::{Market, PriceSeries};

/// Failure to load price data, with the offending line where known.
#[derive(Debug)]
pub enum PriceDataError {
    Io(std::io::Error),
    Csv(csv::Error),
    /// A field failed to parse. Line numbers are 1-based and count the
    /// header.
    BadField {
        line: u64,
        field: &'static str,
        value: String,
    },
    /// The file parsed but contained no rows.
    Empty,
}

impl fmt::Display for PriceDataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceDataError::Io(e) => write!(f, "failed to read price data: {e}"),
            PriceDataError::Csv(e) => write!(f, "failed to parse price data: {e}"),
            PriceDataError::BadField { line, field, value } => {
                write!(f, "line {line}: bad {field} value `{value}`")
            }
            PriceDataError::Empty => write!(f, "price data contains no rows"),
        }
    }
}

impl Error for PriceDataError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PriceDataError::Io(e) => Some(e),
            PriceDataError::Csv(e) => Some(e),
            _ => None,
        }
    }
}

/// Loads markets from a long-format price CSV file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or any row fails to parse.
pub fn load_markets(path: &Path) -> Result<Vec<Market>, PriceDataError> {
    let file = File::open(path).map_err(PriceDataError::Io)?;
    read_markets(file)
}

/// Reads markets from any long-format price CSV source.
///
/// Markets come back in first-seen order. Duplicate (timestamp, market)
/// rows keep the last value, matching how a revised data file would be
/// re-appended in practice.
///
/// # Errors
///
/// Returns an error if the source cannot be read, a row fails to parse, or
/// no rows are present.
pub fn read_markets<R: Read>(reader: R) -> Result<Vec<Market>, PriceDataError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    // First-seen order, so market indices match the data file.
    let mut names: Vec<String> = Vec::new();
    let mut prices: Vec<PriceSeries> = Vec::new();
    let mut availability: Vec<PriceSeries> = Vec::new();

    for result in csv_reader.records() {
        let record = result.map_err(PriceDataError::Csv)?;
        let line = record.position().map_or(0, |p| p.line());

        let time_raw = record.get(0).unwrap_or("");
        let time = DateTime::parse_from_rfc3339(time_raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| PriceDataError::BadField {
                line,
                field: "time",
                value: time_raw.to_string(),
            })?;

        let name = record.get(1).unwrap_or("").trim();
        if name.is_empty() {
            return Err(PriceDataError::BadField {
                line,
                field: "market",
                value: String::new(),
            });
        }

        let price_raw = record.get(2).unwrap_or("");
        let price: f64 = price_raw.parse().map_err(|_| PriceDataError::BadField {
            line,
            field: "price",
            value: price_raw.to_string(),
        })?;

        let avail = match record.get(3) {
            Some(raw) if !raw.trim().is_empty() => {
                Some(raw.trim().parse::<f64>().map_err(|_| {
                    PriceDataError::BadField {
                        line,
                        field: "availability",
                        value: raw.to_string(),
                    }
                })?)
            }
            _ => None,
        };

        let index = match names.iter().position(|n| n == name) {
            Some(i) => i,
            None => {
                names.push(name.to_string());
                prices.push(PriceSeries::new());
                availability.push(PriceSeries::new());
                names.len() - 1
            }
        };
        prices[index].insert(time, price);
        if let Some(a) = avail {
            availability[index].insert(time, a);
        }
    }

    if names.is_empty() {
        return Err(PriceDataError::Empty);
    }

    Ok(names
        .into_iter()
        .zip(prices)
        .zip(availability)
        .map(|((name, series), avail)| {
            let market = Market::new(name, series);
            if avail.is_empty() {
                market
            } else {
                market.with_availability(avail)
            }
        })
        .collect())
}
