//! Account register: the postings of selected accounts, each paired with
//! the counter accounts it moved money to or from, valued in a base
//! currency.

use std::collections::HashMap;

use num_rational::BigRational;
use num_traits::{Signed, ToPrimitive, Zero};
use regex::Regex;
use serde::Serialize;

use tally_core::{Date, LedgerResult};

use crate::book::Book;
use crate::posting::{Posting, serialize_rational};
use crate::price::PriceKind;
use crate::returns::calculate_irr;
use crate::transaction::Transaction;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterEntry {
    pub date: Date,
    pub account: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub payee: String,
    /// One account, or several joined by `;` when not split.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub counter_account: String,
    #[serde(serialize_with = "serialize_rational")]
    pub amount: BigRational,
    #[serde(rename = "ccy")]
    pub currency: String,
    /// Running total of this currency across all extracted accounts.
    #[serde(serialize_with = "serialize_rational")]
    pub balance: BigRational,
    pub note: String,
    #[serde(rename = "tnote")]
    pub transaction_note: String,
    #[serde(serialize_with = "serialize_rational")]
    pub base_amount: BigRational,
    pub base_source: PriceKind,
    /// Running total of `base_amount` over the whole register.
    #[serde(serialize_with = "serialize_rational")]
    pub base_balance: BigRational,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RegisterReport(Vec<RegisterEntry>);

impl RegisterReport {
    pub fn entries(&self) -> &[RegisterEntry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RegisterEntry> {
        self.0.iter()
    }

    /// Keeps entries dated in `[min, max)`. An unset bound is open.
    pub fn filter_by_date(&mut self, min: Date, max: Date) {
        self.0.retain(|e| {
            (min.is_unset() || e.date >= min) && (max.is_unset() || e.date < max)
        });
    }

    /// Cash flows in the base currency with a running total.
    pub fn summary(&self) -> RegisterSummary {
        let mut balance = 0.0;
        let entries = self
            .0
            .iter()
            .map(|e| {
                let cashflow = e.base_amount.to_f64().unwrap_or(0.0);
                balance += cashflow;
                RegisterSummaryEntry {
                    date: e.date,
                    account: e.account.clone(),
                    payee: e.payee.clone(),
                    counter_account: e.counter_account.clone(),
                    currency: e.currency.clone(),
                    cashflow,
                    balance,
                }
            })
            .collect();
        RegisterSummary(entries)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterSummaryEntry {
    pub date: Date,
    pub account: String,
    pub payee: String,
    pub counter_account: String,
    #[serde(rename = "ccy")]
    pub currency: String,
    pub cashflow: f64,
    pub balance: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RegisterSummary(Vec<RegisterSummaryEntry>);

impl RegisterSummary {
    pub fn entries(&self) -> &[RegisterSummaryEntry] {
        &self.0
    }

    /// Annual return of the tracked accounts, given their market `value` on
    /// `date`. Money paid into the accounts counts as invested.
    pub fn irr(&self, date: Date, value: f64) -> Option<f64> {
        let mut dates: Vec<Date> = self.0.iter().map(|e| e.date).collect();
        let mut flows: Vec<f64> = self.0.iter().map(|e| -e.cashflow).collect();
        dates.push(date);
        flows.push(value);
        calculate_irr(&dates, &flows)
    }
}

impl Book {
    /// Register of the postings on accounts matching `pattern`.
    ///
    /// Counter postings are those of the same transaction and currency on
    /// another account with the opposite sign. With `split`, each counter
    /// gets its own entry carrying a proportional share of the amount;
    /// otherwise several counters share one entry. Base amounts use a rate
    /// implied by a trade in the same transaction when there is one, and
    /// the price book otherwise.
    pub fn extract_register(
        &self,
        base: &str,
        pattern: &Regex,
        split: bool,
    ) -> LedgerResult<RegisterReport> {
        let mut entries = Vec::new();
        let mut balances: HashMap<&str, BigRational> = HashMap::new();
        let mut base_balance = BigRational::zero();

        for transaction in self.transactions() {
            for posting in transaction.iter().filter(|p| pattern.is_match(&p.account)) {
                let (rate, source) = self.base_rate(&transaction, posting, base)?;
                let balance = balances
                    .entry(posting.currency.as_str())
                    .or_insert_with(BigRational::zero);

                for (counter_account, amount) in allocate(&transaction, posting, split) {
                    *balance += &amount;
                    let base_amount = &amount * &rate;
                    base_balance += &base_amount;
                    entries.push(RegisterEntry {
                        date: transaction.date(),
                        account: posting.account.clone(),
                        payee: transaction.payee().to_string(),
                        counter_account,
                        amount,
                        currency: posting.currency.clone(),
                        balance: balance.clone(),
                        note: posting.note.clone(),
                        transaction_note: posting.transaction_note.clone(),
                        base_amount,
                        base_source: source,
                        base_balance: base_balance.clone(),
                    });
                }
            }
        }

        tracing::debug!(base, entries = entries.len(), "register extracted");
        Ok(RegisterReport(entries))
    }

    fn base_rate(
        &self,
        transaction: &Transaction<'_>,
        posting: &Posting,
        base: &str,
    ) -> LedgerResult<(BigRational, PriceKind)> {
        if posting.currency == base {
            return Ok((BigRational::from_integer(1.into()), PriceKind::Exact));
        }
        if let Some(rate) = transaction.infer_rate(base, &posting.currency) {
            return Ok((rate, PriceKind::Trade));
        }
        self.prices.convert(transaction.date(), &posting.currency, base)
    }
}

/// Splits `posting` across its counter postings.
fn allocate(
    transaction: &Transaction<'_>,
    posting: &Posting,
    split: bool,
) -> Vec<(String, BigRational)> {
    let counters: Vec<&Posting> = transaction
        .iter()
        .filter(|c| {
            c.account != posting.account
                && c.currency == posting.currency
                && !c.amount.is_zero()
                && c.amount.is_positive() != posting.amount.is_positive()
        })
        .collect();

    match counters.as_slice() {
        [] => vec![(String::new(), posting.amount.clone())],
        [single] => vec![(single.account.clone(), posting.amount.clone())],
        many if !split => {
            let joined = many
                .iter()
                .map(|c| c.account.as_str())
                .collect::<Vec<_>>()
                .join(";");
            vec![(joined, posting.amount.clone())]
        }
        many => {
            let total = many
                .iter()
                .fold(BigRational::zero(), |acc, c| acc + &c.amount);
            many.iter()
                .map(|c| (c.account.clone(), &c.amount * &posting.amount / &total))
                .collect()
        }
    }
}
