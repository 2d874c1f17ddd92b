//! Monthly cost estimation for block-storage volumes.
//!
//! The cost model is a pure lookup over a rate table keyed by volume type and
//! region. Pricing gaps never block a scan: unknown keys fall back to the
//! configured default rate, and when no default exists the quote is marked
//! as unpriced with a zero cost.

mod money;
mod rate_file;

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

pub use money::{MonthlyCost, RatePerGib};
pub use rate_file::load_rate_file;

/// Errors raised while building a rate table.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum CostError {
    /// Raised when a rate value is not a valid non-negative decimal.
    #[error("invalid rate `{value}`: {reason}")]
    InvalidRate {
        /// Rate text as supplied.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },
    /// Raised when an inline rate entry is not of the form
    /// `type[@region]=rate`.
    #[error("invalid rate entry `{entry}`: expected type[@region]=rate")]
    InvalidEntry {
        /// Entry text as supplied.
        entry: String,
    },
    /// Raised when a rate file cannot be read.
    #[error("failed to read rate file `{path}`: {message}")]
    FileRead {
        /// Expanded path that failed to read.
        path: String,
        /// Underlying error message.
        message: String,
    },
    /// Raised when a rate file is not valid JSON of the expected shape.
    #[error("failed to parse rate file `{path}`: {message}")]
    FileParse {
        /// Path of the file.
        path: String,
        /// Parser error message.
        message: String,
    },
}

/// Where a quoted price came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PriceSource {
    /// A rate table entry matched the volume type.
    Table,
    /// No entry matched and the default rate was applied.
    DefaultRate,
    /// No rate was available; the cost is reported as zero.
    Unpriced,
}

/// Monthly cost estimate with its provenance.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PriceQuote {
    /// Estimated cost for one month.
    pub monthly: MonthlyCost,
    /// Where the rate came from.
    pub source: PriceSource,
}

#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
struct RateKey {
    volume_type: String,
    region: Option<String>,
}

/// Rates per GiB-month keyed by `(volume type, region)`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RateTable {
    rates: BTreeMap<RateKey, RatePerGib>,
    default_rate: Option<RatePerGib>,
}

impl RateTable {
    /// Creates a table with only a default rate.
    #[must_use]
    pub const fn with_default(default_rate: RatePerGib) -> Self {
        Self {
            rates: BTreeMap::new(),
            default_rate: Some(default_rate),
        }
    }

    /// Creates a table with no rates at all; every quote is unpriced until
    /// entries are added.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            rates: BTreeMap::new(),
            default_rate: None,
        }
    }

    /// Sets a rate for a volume type, optionally restricted to one region.
    #[must_use]
    pub fn rate(
        mut self,
        volume_type: impl Into<String>,
        region: Option<&str>,
        rate: RatePerGib,
    ) -> Self {
        self.insert(volume_type.into(), region.map(str::to_owned), rate);
        self
    }

    fn insert(&mut self, volume_type: String, region: Option<String>, rate: RatePerGib) {
        let key = RateKey {
            volume_type: volume_type.trim().to_owned(),
            region: region
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty()),
        };
        self.rates.insert(key, rate);
    }

    /// Returns the configured default rate, if any.
    #[must_use]
    pub const fn default_rate(&self) -> Option<RatePerGib> {
        self.default_rate
    }

    /// Returns the number of explicit entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    /// Returns `true` when the table has no explicit entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Applies inline overrides of the form `type[@region]=rate`, separated
    /// by commas. Later entries replace earlier ones with the same key.
    ///
    /// # Errors
    ///
    /// Returns [`CostError`] when an entry or its rate is malformed.
    pub fn apply_overrides(&mut self, spec: &str) -> Result<(), CostError> {
        for raw in spec.split(',') {
            let entry = raw.trim();
            if entry.is_empty() {
                continue;
            }
            let invalid = || CostError::InvalidEntry {
                entry: entry.to_owned(),
            };
            let (key, rate_text) = entry.split_once('=').ok_or_else(invalid)?;
            let (volume_type, region) = match key.split_once('@') {
                Some((kind, region)) => (kind.trim(), Some(region.trim())),
                None => (key.trim(), None),
            };
            if volume_type.is_empty() || region.is_some_and(str::is_empty) {
                return Err(invalid());
            }
            let rate = rate_text.parse::<RatePerGib>()?;
            self.insert(volume_type.to_owned(), region.map(str::to_owned), rate);
        }
        Ok(())
    }

    fn lookup(&self, volume_type: &str, region: &str) -> Option<RatePerGib> {
        let regional = RateKey {
            volume_type: volume_type.to_owned(),
            region: Some(region.to_owned()),
        };
        let any_region = RateKey {
            volume_type: volume_type.to_owned(),
            region: None,
        };
        self.rates
            .get(&regional)
            .or_else(|| self.rates.get(&any_region))
            .copied()
    }
}

/// Deterministic cost estimator over a [`RateTable`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CostModel {
    table: RateTable,
}

impl CostModel {
    /// Creates a model over the given rate table.
    #[must_use]
    pub const fn new(table: RateTable) -> Self {
        Self { table }
    }

    /// Returns the underlying rate table.
    #[must_use]
    pub const fn table(&self) -> &RateTable {
        &self.table
    }

    /// Quotes the monthly cost of a volume, reporting which rate was used.
    ///
    /// A missing `volume_type` is priced at the default rate.
    #[must_use]
    pub fn quote(&self, size_gib: u64, volume_type: Option<&str>, region: &str) -> PriceQuote {
        let matched = volume_type.and_then(|kind| self.table.lookup(kind, region));
        match (matched, self.table.default_rate) {
            (Some(rate), _) => PriceQuote {
                monthly: rate.monthly_cost(size_gib),
                source: PriceSource::Table,
            },
            (None, Some(rate)) => PriceQuote {
                monthly: rate.monthly_cost(size_gib),
                source: PriceSource::DefaultRate,
            },
            (None, None) => PriceQuote {
                monthly: MonthlyCost::ZERO,
                source: PriceSource::Unpriced,
            },
        }
    }

    /// Estimates the monthly cost of a volume. Never fails; unpriced volumes
    /// cost zero.
    #[must_use]
    pub fn estimate_monthly_cost(
        &self,
        size_gib: u64,
        volume_type: Option<&str>,
        region: &str,
    ) -> MonthlyCost {
        self.quote(size_gib, volume_type, region).monthly
    }
}
