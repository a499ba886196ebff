//! Dated conversion rates between currency pairs.
//!
//! A series is kept per `(unit, currency)` pair, sorted by date. Lookups
//! between two points interpolate linearly by elapsed days; lookups outside
//! the series clamp to the nearest endpoint. The inverse pair is consulted
//! when the direct one is missing.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use num_rational::BigRational;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};

use tally_core::{Date, LedgerError, LedgerResult};

/// How a conversion rate was obtained, worst first.
///
/// The derived ordering ranks quality, so combining kinds keeps the minimum.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum PriceKind {
    NoData,
    OutOfRange,
    Inferred,
    Trade,
    #[default]
    Exact,
}

impl PriceKind {
    /// The worse of two kinds.
    pub fn merge(self, other: PriceKind) -> PriceKind {
        self.min(other)
    }
}

impl fmt::Display for PriceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PriceKind::NoData => "NoData",
            PriceKind::OutOfRange => "OutOfRange",
            PriceKind::Inferred => "Inferred",
            PriceKind::Trade => "Trade",
            PriceKind::Exact => "Exact",
        };
        f.write_str(label)
    }
}

/// What to do when no rate exists for a pair.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissingPricePolicy {
    /// Treat the currencies as equal in value and report [`PriceKind::NoData`].
    #[default]
    #[serde(rename = "parity")]
    AssumeParity,
    /// Fail the conversion with [`LedgerError::MissingPrice`].
    #[serde(rename = "reject")]
    Reject,
}

impl FromStr for MissingPricePolicy {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "parity" => Ok(Self::AssumeParity),
            "reject" => Ok(Self::Reject),
            other => Err(LedgerError::config(format!(
                "unknown missing-price policy {other:?} (expected parity or reject)"
            ))),
        }
    }
}

/// Ordered `(unit, currency)` key: one `unit` is worth `rate` of `currency`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CurrencyPair {
    pub unit: String,
    pub currency: String,
}

impl CurrencyPair {
    pub fn new(unit: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            currency: currency.into(),
        }
    }

    pub fn inverse(&self) -> CurrencyPair {
        CurrencyPair::new(self.currency.clone(), self.unit.clone())
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.unit, self.currency)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Price {
    date: Date,
    rate: BigRational,
}

impl Price {
    pub fn new(date: Date, rate: BigRational) -> Self {
        Self { date, rate }
    }

    pub fn date(&self) -> Date {
        self.date
    }

    pub fn rate(&self) -> &BigRational {
        &self.rate
    }
}

/// Collects price points in arbitrary order.
#[derive(Debug, Default)]
pub struct PriceBookBuilder {
    series: HashMap<CurrencyPair, Vec<Price>>,
    policy: MissingPricePolicy,
}

impl PriceBookBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn policy(mut self, policy: MissingPricePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn set_policy(&mut self, policy: MissingPricePolicy) {
        self.policy = policy;
    }

    pub fn add_price(&mut self, date: Date, unit: &str, currency: &str, rate: BigRational) {
        self.series
            .entry(CurrencyPair::new(unit, currency))
            .or_default()
            .push(Price::new(date, rate));
    }

    pub fn build(self) -> PriceBook {
        let series = self
            .series
            .into_iter()
            .map(|(pair, points)| {
                let points = normalize_series(&pair, points);
                (pair, points)
            })
            .collect();
        PriceBook {
            series,
            policy: self.policy,
        }
    }
}

/// Sorts by date; when a date repeats, the point added last wins.
fn normalize_series(pair: &CurrencyPair, mut points: Vec<Price>) -> Vec<Price> {
    points.sort_by_key(|p| p.date);
    let mut out: Vec<Price> = Vec::with_capacity(points.len());
    for point in points {
        match out.last_mut() {
            Some(last) if last.date == point.date => {
                tracing::debug!(
                    pair = %pair,
                    date = %point.date,
                    "price overrides earlier point on same date"
                );
                *last = point;
            }
            _ => out.push(point),
        }
    }
    out
}

/// Immutable rate lookup table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceBook {
    series: BTreeMap<CurrencyPair, Vec<Price>>,
    policy: MissingPricePolicy,
}

impl PriceBook {
    pub fn builder() -> PriceBookBuilder {
        PriceBookBuilder::new()
    }

    pub fn policy(&self) -> MissingPricePolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: MissingPricePolicy) {
        self.policy = policy;
    }

    /// Pairs with at least one point, sorted.
    pub fn pairs(&self) -> impl Iterator<Item = &CurrencyPair> + '_ {
        self.series.keys()
    }

    pub fn series(&self, unit: &str, currency: &str) -> Option<&[Price]> {
        self.series
            .get(&CurrencyPair::new(unit, currency))
            .map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Value of one `unit` in `currency` on `date`.
    ///
    /// Falls back to the reciprocal of the inverse series, and to
    /// `(1, NoData)` when neither direction has data.
    pub fn get_price(&self, date: Date, unit: &str, currency: &str) -> (BigRational, PriceKind) {
        if let Some(series) = self.series.get(&CurrencyPair::new(unit, currency)) {
            return lookup(series, date);
        }
        if let Some(series) = self.series.get(&CurrencyPair::new(currency, unit)) {
            let (rate, kind) = lookup(series, date);
            if rate.is_zero() {
                tracing::warn!(unit, currency, date = %date, "zero rate cannot be inverted");
                return (BigRational::one(), PriceKind::NoData);
            }
            return (rate.recip(), kind);
        }
        (BigRational::one(), PriceKind::NoData)
    }

    /// Like [`PriceBook::get_price`], but honours the missing-price policy.
    /// Converting a currency into itself is always exact.
    pub fn convert(
        &self,
        date: Date,
        unit: &str,
        currency: &str,
    ) -> LedgerResult<(BigRational, PriceKind)> {
        if unit == currency {
            return Ok((BigRational::one(), PriceKind::Exact));
        }
        let (rate, kind) = self.get_price(date, unit, currency);
        if kind == PriceKind::NoData && self.policy == MissingPricePolicy::Reject {
            return Err(LedgerError::missing_price(date, unit, currency));
        }
        Ok((rate, kind))
    }

    /// Total value of a multi-currency amount in `currency`, with the worst
    /// price kind used.
    pub fn value(
        &self,
        date: Date,
        amounts: &BTreeMap<String, BigRational>,
        currency: &str,
    ) -> LedgerResult<(BigRational, PriceKind)> {
        let mut total = BigRational::zero();
        let mut kind = PriceKind::Exact;
        for (unit, amount) in amounts {
            let (rate, k) = self.convert(date, unit, currency)?;
            total += amount * rate;
            kind = kind.merge(k);
        }
        Ok((total, kind))
    }

    /// Renames the currencies of every pair. Pairs that collapse onto the
    /// same key have their series merged, later pairs winning on shared dates.
    pub fn rename_currencies<F>(&mut self, mut rename: F)
    where
        F: FnMut(&str) -> String,
    {
        let mut merged: BTreeMap<CurrencyPair, Vec<Price>> = BTreeMap::new();
        for (pair, points) in std::mem::take(&mut self.series) {
            let renamed = CurrencyPair::new(rename(&pair.unit), rename(&pair.currency));
            merged.entry(renamed).or_default().extend(points);
        }
        self.series = merged
            .into_iter()
            .map(|(pair, points)| {
                let points = normalize_series(&pair, points);
                (pair, points)
            })
            .collect();
    }
}

fn lookup(series: &[Price], date: Date) -> (BigRational, PriceKind) {
    let idx = series.partition_point(|p| p.date < date);
    let Some(next) = series.get(idx) else {
        return match series.last() {
            Some(last) => (last.rate.clone(), PriceKind::OutOfRange),
            None => (BigRational::one(), PriceKind::NoData),
        };
    };
    if next.date == date {
        return (next.rate.clone(), PriceKind::Exact);
    }
    if idx == 0 {
        return (next.rate.clone(), PriceKind::OutOfRange);
    }

    let prev = &series[idx - 1];
    let span = next.date.days_since(prev.date);
    if span <= 0 {
        return (next.rate.clone(), PriceKind::Inferred);
    }
    let elapsed = date.days_since(prev.date);
    let fraction = BigRational::new(elapsed.into(), span.into());
    let rate = &prev.rate + (&next.rate - &prev.rate) * fraction;
    (rate, PriceKind::Inferred)
}
