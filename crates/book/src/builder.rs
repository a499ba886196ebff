use std::collections::{BTreeMap, HashMap};

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Zero};

use tally_core::{Date, LedgerError, LedgerResult};

use crate::book::Book;
use crate::compact::compact;
use crate::config::LedgerConfig;
use crate::posting::Posting;
use crate::price::{MissingPricePolicy, PriceBookBuilder};

/// Streaming construction of a [`Book`] from a parser.
///
/// Postings attach to the transaction opened by the most recent
/// [`BookBuilder::new_transaction`]. Every currency of a transaction must sum
/// to zero before the next one opens and before [`BookBuilder::build`].
#[derive(Debug, Default)]
pub struct BookBuilder {
    postings: Vec<Posting>,
    seen: HashMap<(Date, String), u32>,
    open_totals: BTreeMap<String, BigRational>,
    date: Date,
    payee: String,
    note: String,
    prices: PriceBookBuilder,
}

impl BookBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new().missing_price_policy(config.missing_price)
    }

    pub fn missing_price_policy(mut self, policy: MissingPricePolicy) -> Self {
        self.prices.set_policy(policy);
        self
    }

    /// Opens a transaction. A repeated `(date, payee)` gets a ` (n)` suffix
    /// so the two stay distinct.
    pub fn new_transaction(&mut self, date: Date, payee: &str, note: &str) -> LedgerResult<()> {
        self.check_balanced()?;

        let count = self.seen.entry((date, payee.to_string())).or_insert(0);
        *count += 1;
        self.payee = if *count == 1 {
            payee.to_string()
        } else {
            format!("{payee} ({count})")
        };
        self.date = date;
        self.note = note.to_string();
        Ok(())
    }

    pub fn add_posting(&mut self, account: &str, currency: &str, amount: BigRational, note: &str) {
        *self
            .open_totals
            .entry(currency.to_string())
            .or_insert_with(BigRational::zero) += &amount;
        self.postings.push(Posting::new(
            self.date,
            self.payee.clone(),
            self.note.clone(),
            account,
            currency,
            amount,
            note,
        ));
    }

    /// Records that one `unit` was worth `rate` of `currency` on `date`.
    pub fn add_price(&mut self, date: Date, unit: &str, currency: &str, rate: BigRational) {
        self.prices.add_price(date, unit, currency, rate);
    }

    /// Per-currency running sum of the transaction currently open.
    pub fn current_currency_balances(&self) -> &BTreeMap<String, BigRational> {
        &self.open_totals
    }

    pub fn build(mut self) -> LedgerResult<Book> {
        self.check_balanced()?;

        let decimals = currency_decimals(&self.postings)?;
        let journal = compact(self.postings);
        let prices = self.prices.build();
        tracing::debug!(
            transactions = journal.len(),
            currencies = decimals.len(),
            "book built"
        );
        Ok(Book::new(journal, prices, decimals))
    }

    fn check_balanced(&mut self) -> LedgerResult<()> {
        if let Some((currency, residual)) = self.open_totals.iter().find(|(_, v)| !v.is_zero()) {
            tracing::warn!(
                date = %self.date,
                payee = %self.payee,
                currency = %currency,
                residual = %residual,
                "unbalanced transaction"
            );
            return Err(LedgerError::unbalanced(
                self.date,
                self.payee.clone(),
                currency.clone(),
                residual,
            ));
        }
        self.open_totals.clear();
        Ok(())
    }
}

/// Display precision per currency: the smallest `c` with `10^c` at least the
/// largest reduced denominator seen.
fn currency_decimals(postings: &[Posting]) -> LedgerResult<BTreeMap<String, u32>> {
    let mut denominators: BTreeMap<&str, BigInt> = BTreeMap::new();
    for p in postings {
        let denom = denominators
            .entry(p.currency.as_str())
            .or_insert_with(BigInt::one);
        if p.amount.denom() > &*denom {
            *denom = p.amount.denom().clone();
        }
    }

    let ten = BigInt::from(10);
    denominators
        .into_iter()
        .map(|(currency, denom)| -> LedgerResult<(String, u32)> {
            let mut power = BigInt::one();
            let mut places: u32 = 0;
            while power < denom {
                power *= &ten;
                places = places
                    .checked_add(1)
                    .ok_or_else(|| LedgerError::PrecisionOverflow(currency.to_string()))?;
            }
            Ok((currency.to_string(), places))
        })
        .collect()
}
