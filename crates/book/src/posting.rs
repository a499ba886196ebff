use core::borrow::Borrow;
use core::cmp::{Ordering, Reverse};
use core::fmt;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, ToPrimitive, Zero};
use serde::{Serialize, Serializer};

use tally_core::Date;

use crate::price::PriceKind;

/// One step of a value-ordered sort key: an ancestor path and its
/// consolidated value within the transaction.
///
/// Larger values order first; equal values fall back to the path so that a
/// subtree stays contiguous.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SortComponent {
    value: Reverse<BigRational>,
    path: String,
}

impl SortComponent {
    pub fn new(value: BigRational, path: impl Into<String>) -> Self {
        Self {
            value: Reverse(value),
            path: path.into(),
        }
    }

    pub fn value(&self) -> &BigRational {
        &self.value.0
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Root-to-leaf sequence of [`SortComponent`]s, compared lexicographically.
/// Empty on a freshly built book.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct SortKey(Vec<SortComponent>);

impl SortKey {
    pub fn new(components: Vec<SortComponent>) -> Self {
        Self(components)
    }

    pub fn components(&self) -> &[SortComponent] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One account/currency/amount line of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub(crate) date: Date,
    pub(crate) payee: String,
    pub(crate) transaction_note: String,
    pub(crate) account: String,
    pub(crate) currency: String,
    pub(crate) amount: BigRational,
    pub(crate) note: String,
    pub(crate) balance: BigRational,

    // Rendering-only, recomputed by accumulation.
    pub(crate) account_level: u32,
    pub(crate) account_term: String,
    pub(crate) sort_key: SortKey,
    pub(crate) price_kind: PriceKind,
    pub(crate) subtotal: bool,
}

impl Posting {
    pub(crate) fn new(
        date: Date,
        payee: impl Into<String>,
        transaction_note: impl Into<String>,
        account: impl Into<String>,
        currency: impl Into<String>,
        amount: BigRational,
        note: impl Into<String>,
    ) -> Self {
        let account = account.into();
        Self {
            date,
            payee: payee.into(),
            transaction_note: transaction_note.into(),
            account_term: account.clone(),
            account,
            currency: currency.into(),
            amount,
            note: note.into(),
            balance: BigRational::zero(),
            account_level: 0,
            sort_key: SortKey::default(),
            price_kind: PriceKind::Exact,
            subtotal: false,
        }
    }

    /// Zero-valued posting in the same transaction as `head`.
    pub(crate) fn placeholder(head: &Posting, account: &str, currency: &str) -> Self {
        Self::new(
            head.date,
            head.payee.clone(),
            head.transaction_note.clone(),
            account,
            currency,
            BigRational::zero(),
            "",
        )
    }

    pub fn date(&self) -> Date {
        self.date
    }

    pub fn payee(&self) -> &str {
        &self.payee
    }

    pub fn transaction_note(&self) -> &str {
        &self.transaction_note
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn amount(&self) -> &BigRational {
        &self.amount
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    /// Lifetime running balance of this account/currency, as of this posting.
    pub fn balance(&self) -> &BigRational {
        &self.balance
    }

    pub fn account_level(&self) -> u32 {
        self.account_level
    }

    pub fn account_term(&self) -> &str {
        &self.account_term
    }

    pub fn sort_key(&self) -> &SortKey {
        &self.sort_key
    }

    /// Worst price source used to value this posting (subtotals only).
    pub fn price_kind(&self) -> PriceKind {
        self.price_kind
    }

    /// True for postings synthesized by accumulation.
    pub fn is_subtotal(&self) -> bool {
        self.subtotal
    }

    /// Copy with the amount multiplied by `factor`.
    pub(crate) fn scaled(&self, factor: &BigRational) -> Posting {
        self.rebooked(&self.account, self.date, factor)
    }

    /// Copy moved to another account/date with the amount multiplied by
    /// `factor`. Derived fields are reset.
    pub(crate) fn rebooked(&self, account: &str, date: Date, factor: &BigRational) -> Posting {
        let mut posting = Posting::new(
            date,
            self.payee.clone(),
            self.transaction_note.clone(),
            account,
            self.currency.clone(),
            &self.amount * factor,
            self.note.clone(),
        );
        posting.price_kind = self.price_kind;
        posting
    }

    pub(crate) fn set_account(&mut self, account: String) {
        self.account_term = account.clone();
        self.account = account;
        self.account_level = 0;
    }

    /// Book order: `(date, payee, sort key, account, level, currency)`.
    pub fn book_order(&self, other: &Posting) -> Ordering {
        self.date
            .cmp(&other.date)
            .then_with(|| self.payee.cmp(&other.payee))
            .then_with(|| self.sort_key.cmp(&other.sort_key))
            .then_with(|| self.account.cmp(&other.account))
            .then_with(|| self.account_level.cmp(&other.account_level))
            .then_with(|| self.currency.cmp(&other.currency))
    }

    /// Same transaction, account and currency; compaction merges these.
    pub(crate) fn same_slot(&self, other: &Posting) -> bool {
        self.date == other.date
            && self.payee == other.payee
            && self.account == other.account
            && self.currency == other.currency
    }

    /// Same `(date, payee)` transaction key.
    pub(crate) fn same_transaction(&self, other: &Posting) -> bool {
        self.date == other.date && self.payee == other.payee
    }

    /// Amount rendered with `decimals` places, rounding half away from zero.
    pub fn amount_text(&self, decimals: u32) -> String {
        decimal_text(&self.amount, decimals)
    }
}

/// Fixed-point text for a rational, rounding half away from zero.
pub fn decimal_text(value: &BigRational, decimals: u32) -> String {
    let scale = BigInt::from(10).pow(decimals);
    let scaled = (value * BigRational::from_integer(scale)).round().to_integer();
    let digits = scaled.abs().to_string();
    let sign = if scaled.is_negative() { "-" } else { "" };

    if decimals == 0 {
        return format!("{sign}{digits}");
    }

    let width = decimals as usize + 1;
    let padded = format!("{digits:0>width$}");
    let (whole, fraction) = padded.split_at(padded.len() - decimals as usize);
    format!("{sign}{whole}.{fraction}")
}

pub(crate) fn serialize_rational<S, R>(value: &R, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    R: Borrow<BigRational>,
{
    serializer.serialize_f64(value.borrow().to_f64().unwrap_or(f64::NAN))
}

fn is_blank(text: &&str) -> bool {
    text.is_empty()
}

impl Serialize for Posting {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct JsonPosting<'a> {
            account: &'a str,
            ccy: &'a str,
            #[serde(serialize_with = "serialize_rational")]
            amount: &'a BigRational,
            #[serde(skip_serializing_if = "is_blank")]
            note: &'a str,
        }

        JsonPosting {
            account: &self.account,
            ccy: &self.currency,
            amount: &self.amount,
            note: &self.note,
        }
        .serialize(serializer)
    }
}

impl fmt::Display for Posting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Date: {}, Payee: {}, Acct: {}, CCY: {}, Value: {}, Bal: {}, Level: {}, Term: {}",
            self.date,
            self.payee,
            self.account,
            self.currency,
            self.amount,
            self.balance,
            self.account_level,
            self.account_term
        )
    }
}
