//! Hierarchical roll-up of a book into one target currency.
//!
//! Accumulation turns each transaction into a tree report: every posted
//! account keeps its own line, and every *accumulation point* (an account
//! path that needs a subtotal) gets a synthetic posting carrying the
//! converted sum of its subtree. Lines are then ordered by value, largest
//! first, at every level of the tree.
//!
//! The pipeline:
//!
//! 1. Shape normalization: every transaction gets a posting (zero if absent)
//!    for every `(account, currency)` pair seen anywhere in the book, so all
//!    transactions share one tree shape.
//! 2. Point discovery over the sorted distinct pairs.
//! 3. Per-transaction consolidation, which is independent per transaction.
//! 4. Re-sort into book order and drop the hidden account.

use std::collections::{BTreeMap, BTreeSet};

use num_rational::BigRational;
use num_traits::Zero;
use regex::Regex;

use tally_core::account::{common_prefix, is_descendant_or_self, lineage, split_at_points};
use tally_core::{DEFAULT_DIVIDER, LedgerError, LedgerResult};

use crate::book::Book;
use crate::compact::compact;
use crate::config::LedgerConfig;
use crate::posting::{Posting, SortComponent, SortKey};
use crate::price::{PriceBook, PriceKind};
use crate::transaction::Journal;

#[derive(Debug, Clone)]
pub struct AccumulateOptions {
    currency: String,
    divider: String,
    credit: Option<Regex>,
    hidden_account: Option<String>,
}

impl AccumulateOptions {
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
            divider: DEFAULT_DIVIDER.to_string(),
            credit: None,
            hidden_account: None,
        }
    }

    /// Reads divider, credit pattern and hidden account from `config`. The
    /// target currency comes from the config when it names one, else from
    /// `fallback_currency`.
    pub fn from_config(config: &LedgerConfig, fallback_currency: &str) -> LedgerResult<Self> {
        let currency = config.currency.as_deref().unwrap_or(fallback_currency);
        let mut options = Self::new(currency).divider(config.divider.clone());
        if let Some(pattern) = &config.credit_pattern {
            let credit =
                Regex::new(pattern).map_err(|e| LedgerError::invalid_pattern(e.to_string()))?;
            options = options.credit(credit);
        }
        if let Some(hidden) = &config.hidden_account {
            options = options.hidden_account(hidden.clone());
        }
        Ok(options)
    }

    pub fn divider(mut self, divider: impl Into<String>) -> Self {
        self.divider = divider.into();
        self
    }

    /// Accounts matching `pattern` have their amounts negated before
    /// conversion, so credit-normal accounts read as positive.
    pub fn credit(mut self, pattern: Regex) -> Self {
        self.credit = Some(pattern);
        self
    }

    pub fn hidden_account(mut self, account: impl Into<String>) -> Self {
        self.hidden_account = Some(account.into());
        self
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn divider_str(&self) -> &str {
        &self.divider
    }

    fn is_credit(&self, account: &str) -> bool {
        self.credit.as_ref().is_some_and(|re| re.is_match(account))
    }
}

/// An accumulation point that is itself posted in a currency in which one of
/// its descendants is also posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointConflict {
    pub account: String,
    pub descendant: String,
    pub currency: String,
}

/// Account paths that receive a synthetic subtotal posting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccumulationPoints {
    points: BTreeSet<String>,
    conflicts: Vec<PointConflict>,
}

impl AccumulationPoints {
    pub fn contains(&self, account: &str) -> bool {
        self.points.contains(account)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.points.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn conflicts(&self) -> &[PointConflict] {
        &self.conflicts
    }
}

/// Finds the accumulation points of a set of `(account, currency)` pairs.
///
/// An account is a point when it is posted in a currency other than
/// `currency`, or when it is the longest common prefix of two accounts
/// adjacent in sorted order.
pub fn discover_accumulation_points(
    pairs: &BTreeSet<(String, String)>,
    currency: &str,
    divider: &str,
) -> AccumulationPoints {
    let mut points = BTreeSet::new();
    let mut previous: Option<&str> = None;
    for (account, ccy) in pairs {
        if ccy != currency {
            points.insert(account.clone());
        }
        if let Some(prev) = previous {
            let shared = common_prefix(prev, account, divider);
            if !shared.is_empty() {
                points.insert(shared.to_string());
            }
        }
        previous = Some(account.as_str());
    }

    let mut conflicts = Vec::new();
    for point in &points {
        for (account, ccy) in pairs.iter().filter(|(a, _)| a == point) {
            let descendant = pairs.iter().find(|(other, other_ccy)| {
                other_ccy == ccy
                    && other != account
                    && is_descendant_or_self(other, account, divider)
            });
            if let Some((descendant, _)) = descendant {
                conflicts.push(PointConflict {
                    account: account.clone(),
                    descendant: descendant.clone(),
                    currency: ccy.clone(),
                });
            }
        }
    }

    AccumulationPoints { points, conflicts }
}

/// Consolidates one transaction. Pure: the output depends only on the
/// postings, the points, the price book and the options.
fn consolidate(
    transaction: &[Posting],
    points: &AccumulationPoints,
    prices: &PriceBook,
    options: &AccumulateOptions,
) -> LedgerResult<Vec<Posting>> {
    let Some(head) = transaction.first() else {
        return Ok(Vec::new());
    };
    let divider = options.divider.as_str();
    let target = options.currency.as_str();

    let mut leaves = Vec::with_capacity(transaction.len());
    let mut values: BTreeMap<String, BigRational> = BTreeMap::new();
    let mut totals: BTreeMap<&str, (BigRational, PriceKind)> = points
        .iter()
        .map(|point| (point, (BigRational::zero(), PriceKind::Exact)))
        .collect();

    for posting in transaction {
        let mut leaf = posting.clone();
        if options.is_credit(&leaf.account) {
            leaf.amount = -leaf.amount;
        }
        let (rate, kind) = prices.convert(leaf.date, &leaf.currency, target)?;
        let converted = &leaf.amount * rate;

        for prefix in lineage(&leaf.account, divider) {
            if let Some((sum, worst)) = totals.get_mut(prefix) {
                *sum += &converted;
                *worst = worst.merge(kind);
            }
        }
        values.insert(leaf.account.clone(), converted);
        leaves.push(leaf);
    }
    for (point, (sum, _)) in &totals {
        values.insert(point.to_string(), sum.clone());
    }

    let is_point = |path: &str| points.contains(path);
    let mut out = Vec::with_capacity(leaves.len() + totals.len());
    for mut leaf in leaves {
        let (level, term) = split_at_points(&leaf.account, divider, true, is_point);
        leaf.account_level = level;
        leaf.account_term = term.to_string();
        leaf.sort_key = sort_key(&leaf.account, &values, divider);
        out.push(leaf);
    }
    for (point, (sum, kind)) in totals {
        let (level, term) = split_at_points(point, divider, false, is_point);
        let mut subtotal = Posting::placeholder(head, point, target);
        subtotal.amount = sum;
        subtotal.account_level = level;
        subtotal.account_term = term.to_string();
        subtotal.sort_key = sort_key(point, &values, divider);
        subtotal.price_kind = kind;
        subtotal.subtotal = true;
        out.push(subtotal);
    }
    Ok(out)
}

fn sort_key(account: &str, values: &BTreeMap<String, BigRational>, divider: &str) -> SortKey {
    SortKey::new(
        lineage(account, divider)
            .filter_map(|path| {
                values
                    .get(path)
                    .map(|value| SortComponent::new(value.clone(), path))
            })
            .collect(),
    )
}

/// Pads every transaction with zero postings so all share the same
/// `(account, currency)` pairs.
fn normalize_shape(journal: &Journal) -> (Vec<Posting>, BTreeSet<(String, String)>) {
    let pairs: BTreeSet<(String, String)> = journal
        .postings()
        .iter()
        .map(|p| (p.account.clone(), p.currency.clone()))
        .collect();

    let mut postings = Vec::with_capacity(journal.len() * pairs.len());
    for transaction in journal.transactions() {
        let present: BTreeSet<(&str, &str)> = transaction
            .iter()
            .map(|p| (p.account.as_str(), p.currency.as_str()))
            .collect();
        postings.extend(transaction.iter().cloned());
        let head = &transaction.postings()[0];
        for (account, currency) in &pairs {
            if !present.contains(&(account.as_str(), currency.as_str())) {
                postings.push(Posting::placeholder(head, account, currency));
            }
        }
    }
    postings.sort_by(Posting::book_order);
    (postings, pairs)
}

impl Book {
    /// Rolls the book up into `options.currency()`.
    ///
    /// Fails only when the price book rejects a missing rate. Without a
    /// credit pattern every currency of every output transaction still sums
    /// to zero over its non-subtotal postings.
    pub fn accumulate(&self, options: &AccumulateOptions) -> LedgerResult<Journal> {
        let journal = compact(self.postings().to_vec());
        if journal.is_empty() {
            return Ok(journal);
        }

        let (postings, pairs) = normalize_shape(&journal);
        let points = discover_accumulation_points(&pairs, &options.currency, &options.divider);
        for conflict in points.conflicts() {
            tracing::warn!(
                account = %conflict.account,
                descendant = %conflict.descendant,
                currency = %conflict.currency,
                "accumulation point is also posted to directly"
            );
        }

        let normalized = Journal::from_sorted(postings);
        let mut out = Vec::new();
        for transaction in normalized.transactions() {
            out.extend(consolidate(
                transaction.postings(),
                &points,
                &self.prices,
                options,
            )?);
        }

        out.sort_by(Posting::book_order);
        if let Some(hidden) = &options.hidden_account {
            out.retain(|p| p.account != *hidden);
        }

        tracing::debug!(
            currency = %options.currency,
            transactions = normalized.len(),
            points = points.len(),
            postings = out.len(),
            "accumulated"
        );
        Ok(Journal::from_sorted(out))
    }
}
