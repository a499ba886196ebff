use std::collections::{BTreeMap, BTreeSet};

use num_rational::BigRational;
use num_traits::Zero;
use regex::Regex;

use tally_core::Date;

use crate::compact::compact;
use crate::posting::Posting;
use crate::price::{CurrencyPair, MissingPricePolicy, Price, PriceBook, PriceKind};
use crate::transaction::{Journal, Transaction};

/// A compacted, balanced journal with its price history.
///
/// Built by [`crate::BookBuilder`]. Transformations in [`crate::ops`] act on
/// the book in place and leave it compacted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Book {
    pub(crate) journal: Journal,
    pub(crate) prices: PriceBook,
    currency_decimals: BTreeMap<String, u32>,
}

impl Book {
    pub(crate) fn new(
        journal: Journal,
        prices: PriceBook,
        currency_decimals: BTreeMap<String, u32>,
    ) -> Self {
        Self {
            journal,
            prices,
            currency_decimals,
        }
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn transactions(
        &self,
    ) -> impl ExactSizeIterator<Item = Transaction<'_>> + DoubleEndedIterator + '_ {
        self.journal.transactions()
    }

    pub fn postings(&self) -> &[Posting] {
        self.journal.postings()
    }

    /// Number of transactions.
    pub fn len(&self) -> usize {
        self.journal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.journal.is_empty()
    }

    pub fn prices(&self) -> &PriceBook {
        &self.prices
    }

    pub fn get_price(&self, date: Date, unit: &str, currency: &str) -> (BigRational, PriceKind) {
        self.prices.get_price(date, unit, currency)
    }

    pub fn price_pairs(&self) -> Vec<CurrencyPair> {
        self.prices.pairs().cloned().collect()
    }

    pub fn price_series(&self, unit: &str, currency: &str) -> Option<&[Price]> {
        self.prices.series(unit, currency)
    }

    pub fn set_missing_price_policy(&mut self, policy: MissingPricePolicy) {
        self.prices.set_policy(policy);
    }

    /// Display precision per currency, fixed at build time.
    pub fn currency_decimals(&self) -> &BTreeMap<String, u32> {
        &self.currency_decimals
    }

    pub fn decimals_for(&self, currency: &str) -> u32 {
        self.currency_decimals.get(currency).copied().unwrap_or(0)
    }

    /// Sorted distinct accounts matching `pattern`. With `only_nonzero`,
    /// accounts whose final balance is zero in every currency are skipped.
    pub fn accounts(&self, pattern: &Regex, only_nonzero: bool) -> Vec<String> {
        let mut latest: BTreeMap<(&str, &str), &BigRational> = BTreeMap::new();
        for p in self.postings().iter().filter(|p| pattern.is_match(&p.account)) {
            latest.insert((p.account.as_str(), p.currency.as_str()), &p.balance);
        }

        latest
            .into_iter()
            .filter(|(_, balance)| !only_nonzero || !balance.is_zero())
            .map(|((account, _), _)| account.to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Re-sorts, merges and rebalances the postings.
    pub fn compact(&mut self) {
        let postings = std::mem::take(&mut self.journal).into_postings();
        self.journal = compact(postings);
    }

    pub(crate) fn take_postings(&mut self) -> Vec<Posting> {
        std::mem::take(&mut self.journal).into_postings()
    }

    pub(crate) fn replace_postings(&mut self, postings: Vec<Posting>) {
        self.journal = compact(postings);
    }
}
