use std::collections::BTreeMap;
use std::ops::Range;

use num_rational::BigRational;
use num_traits::{Signed, Zero};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use tally_core::Date;

use crate::posting::Posting;

/// A borrowed run of postings sharing one `(date, payee)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transaction<'a> {
    postings: &'a [Posting],
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(postings: &'a [Posting]) -> Self {
        debug_assert!(!postings.is_empty(), "transactions are never empty");
        Self { postings }
    }

    fn head(&self) -> &'a Posting {
        &self.postings[0]
    }

    pub fn date(&self) -> Date {
        self.head().date
    }

    pub fn payee(&self) -> &'a str {
        &self.head().payee
    }

    pub fn note(&self) -> &'a str {
        &self.head().transaction_note
    }

    pub fn postings(&self) -> &'a [Posting] {
        self.postings
    }

    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'a, Posting> {
        self.postings.iter()
    }

    /// Per-currency sum of the amounts; all zero for a balanced transaction.
    pub fn currency_totals(&self) -> BTreeMap<&'a str, BigRational> {
        let mut totals: BTreeMap<&str, BigRational> = BTreeMap::new();
        for p in self.postings {
            *totals.entry(p.currency.as_str()).or_insert_with(BigRational::zero) += &p.amount;
        }
        totals
    }

    /// Postings of one account that appear as exactly two adjacent,
    /// opposite-signed entries: the shape of a trade.
    fn trades(&self) -> impl Iterator<Item = (&'a Posting, &'a Posting)> + 'a {
        self.postings
            .chunk_by(|a, b| a.account == b.account)
            .filter_map(|run| match run {
                [first, second]
                    if !first.amount.is_zero()
                        && !second.amount.is_zero()
                        && first.amount.is_positive() != second.amount.is_positive() =>
                {
                    Some((first, second))
                }
                _ => None,
            })
    }

    /// Rate of `unit` in `base` implied by a trade inside this transaction.
    pub fn infer_rate(&self, base: &str, unit: &str) -> Option<BigRational> {
        self.trades().find_map(|(first, second)| {
            if first.currency == unit && second.currency == base {
                Some(-(&second.amount / &first.amount))
            } else if first.currency == base && second.currency == unit {
                Some(-(&first.amount / &second.amount))
            } else {
                None
            }
        })
    }

    /// Every rate into `base` implied by trades in this transaction, by unit.
    pub fn infer_rates(&self, base: &str) -> BTreeMap<String, BigRational> {
        let mut rates = BTreeMap::new();
        for (first, second) in self.trades() {
            if second.currency == base && first.currency != base {
                rates.insert(first.currency.clone(), -(&second.amount / &first.amount));
            } else if first.currency == base && second.currency != base {
                rates.insert(second.currency.clone(), -(&first.amount / &second.amount));
            }
        }
        rates
    }

    /// Widest indented account term, for column layout.
    pub fn max_account_term_width(&self, indent_per_level: usize) -> usize {
        self.postings
            .iter()
            .map(|p| p.account_term.chars().count() + indent_per_level * p.account_level as usize)
            .max()
            .unwrap_or(0)
    }
}

impl<'a> IntoIterator for Transaction<'a> {
    type Item = &'a Posting;
    type IntoIter = std::slice::Iter<'a, Posting>;

    fn into_iter(self) -> Self::IntoIter {
        self.postings.iter()
    }
}

impl Serialize for Transaction<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let with_note = !self.note().is_empty();
        let mut state =
            serializer.serialize_struct("Transaction", if with_note { 4 } else { 3 })?;
        state.serialize_field("date", &self.date())?;
        state.serialize_field("payee", self.payee())?;
        if with_note {
            state.serialize_field("note", self.note())?;
        }
        state.serialize_field("postings", self.postings)?;
        state.end()
    }
}

/// Postings in book order, partitioned into transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Journal {
    postings: Vec<Posting>,
    spans: Vec<Range<usize>>,
}

impl Journal {
    /// Partitions postings already in book order by `(date, payee)`.
    pub(crate) fn from_sorted(postings: Vec<Posting>) -> Self {
        let mut spans = Vec::new();
        let mut start = 0;
        for i in 1..=postings.len() {
            if i == postings.len() || !postings[i].same_transaction(&postings[start]) {
                if start < i {
                    spans.push(start..i);
                }
                start = i;
            }
        }
        Self { postings, spans }
    }

    pub fn postings(&self) -> &[Posting] {
        &self.postings
    }

    pub(crate) fn spans(&self) -> &[Range<usize>] {
        &self.spans
    }

    pub(crate) fn into_postings(self) -> Vec<Posting> {
        self.postings
    }

    pub fn transactions(
        &self,
    ) -> impl ExactSizeIterator<Item = Transaction<'_>> + DoubleEndedIterator + '_ {
        self.spans
            .iter()
            .map(|span| Transaction::new(&self.postings[span.clone()]))
    }

    pub fn transaction(&self, index: usize) -> Option<Transaction<'_>> {
        self.spans
            .get(index)
            .map(|span| Transaction::new(&self.postings[span.clone()]))
    }

    /// Number of transactions.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

impl Serialize for Journal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.transactions())
    }
}
