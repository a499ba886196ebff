//! In-place transformations of a [`Book`].
//!
//! Filters keep whole transactions. Every operation that rewrites dates,
//! payees, accounts or amounts recompacts the book afterwards.

use std::collections::HashMap;
use std::num::NonZeroU32;

use num_rational::BigRational;
use num_traits::One;
use regex::Regex;

use tally_core::{Date, LedgerError, LedgerResult, Period};

use crate::book::Book;
use crate::posting::Posting;
use crate::transaction::{Journal, Transaction};

impl Book {
    /// Keeps the transactions for which `keep` holds. Running balances are
    /// left as computed over the full history.
    pub fn filter_transactions<F>(&mut self, mut keep: F)
    where
        F: FnMut(&Transaction<'_>) -> bool,
    {
        let journal = std::mem::take(&mut self.journal);
        let kept: Vec<Posting> = journal
            .transactions()
            .filter(|t| keep(t))
            .flat_map(|t| t.postings().iter().cloned())
            .collect();
        let before = journal.len();
        self.journal = Journal::from_sorted(kept);
        tracing::debug!(before, after = self.journal.len(), "filtered transactions");
    }

    /// Keeps transactions dated in `[since, asof)`. An unset bound is open.
    pub fn filter_by_date_range(&mut self, since: Date, asof: Date) {
        self.filter_transactions(|t| {
            (since.is_unset() || t.date() >= since) && (asof.is_unset() || t.date() < asof)
        });
    }

    pub fn filter_by_date_since(&mut self, since: Date) {
        self.filter_by_date_range(since, Date::UNSET);
    }

    pub fn filter_by_date_asof(&mut self, asof: Date) {
        self.filter_by_date_range(Date::UNSET, asof);
    }

    /// Keeps transactions with at least one posting to exactly `account`.
    pub fn filter_by_account(&mut self, account: &str) {
        self.filter_transactions(|t| t.iter().any(|p| p.account == account));
    }

    /// Rewrites each posting's `(date, payee)`.
    pub fn map_transaction<F>(&mut self, mut map: F)
    where
        F: FnMut(Date, &str) -> (Date, String),
    {
        let mut postings = self.take_postings();
        for p in &mut postings {
            let (date, payee) = map(p.date, &p.payee);
            p.date = date;
            p.payee = payee;
        }
        self.replace_postings(postings);
    }

    /// Renames accounts. `map` runs once per distinct account.
    pub fn map_account<F>(&mut self, mut map: F)
    where
        F: FnMut(&str) -> String,
    {
        let mut renamed: HashMap<String, String> = HashMap::new();
        let mut postings = self.take_postings();
        for p in &mut postings {
            let target = renamed
                .entry(p.account.clone())
                .or_insert_with(|| map(&p.account))
                .clone();
            p.set_account(target);
        }
        self.replace_postings(postings);
    }

    /// Multiplies each amount by a factor and relabels its currency. The
    /// factor must depend only on `(date, currency)` to keep transactions
    /// balanced.
    pub fn map_amount<F>(&mut self, mut map: F)
    where
        F: FnMut(Date, &str) -> (BigRational, String),
    {
        let mut postings = self.take_postings();
        for p in &mut postings {
            let (factor, currency) = map(p.date, &p.currency);
            p.amount *= factor;
            p.currency = currency;
        }
        self.replace_postings(postings);
    }

    /// Moves every transaction to the start of its period and blanks the
    /// payee, merging each period into one transaction.
    pub fn split_by_period(&mut self, period: Period) {
        self.map_transaction(|date, _| (date.floor(period), String::new()));
    }

    /// Rescales amounts to an average per `period` over the book's span.
    /// `None` leaves the book as it is.
    pub fn adjust_by(&mut self, period: Option<Period>) -> LedgerResult<()> {
        let Some(period) = period else {
            return Ok(());
        };
        let postings = self.postings();
        let (Some(first), Some(last)) = (
            postings.iter().map(|p| p.date).min(),
            postings.iter().map(|p| p.date).max(),
        ) else {
            return Ok(());
        };

        let days = last.days_since(first);
        if days <= 0 {
            return Err(LedgerError::EmptyDateRange(format!(
                "cannot average by {period} over {first}..{last}"
            )));
        }
        let days = BigRational::from_integer(days.into());
        let year = BigRational::from_integer(365.into());
        let factor = match period {
            Period::Daily => days.recip(),
            Period::Monthly => year / (days * BigRational::from_integer(12.into())),
            Period::Quarterly => year / (days * BigRational::from_integer(4.into())),
            Period::Yearly => year / days,
        };

        let postings: Vec<Posting> = self.postings().iter().map(|p| p.scaled(&factor)).collect();
        self.replace_postings(postings);
        Ok(())
    }

    /// Spreads every posting on an account matching `search` over `periods`
    /// periods. The full amount moves to the account named by `replace`
    /// (regex substitution), then flows back in equal slices, the first on
    /// the original date.
    pub fn depreciate(
        &mut self,
        search: &Regex,
        replace: &str,
        period: Period,
        periods: NonZeroU32,
    ) {
        let slice = BigRational::new(1.into(), periods.get().into());
        let neg_slice = -slice.clone();
        let neg_one = -BigRational::one();
        let one = BigRational::one();

        let mut postings = Vec::with_capacity(self.postings().len());
        for p in self.postings() {
            postings.push(p.clone());
            if !search.is_match(&p.account) {
                continue;
            }
            let target = search.replace_all(&p.account, replace).into_owned();
            postings.push(p.scaled(&neg_one));
            postings.push(p.rebooked(&target, p.date, &one));

            let mut date = p.date;
            for _ in 0..periods.get() {
                postings.push(p.rebooked(&target, date, &neg_slice));
                postings.push(p.rebooked(&p.account, date, &slice));
                date = date.floor_diff(period, 1);
            }
        }
        self.replace_postings(postings);
    }

    /// Moves `factor` of every posting on an account matching `search` to
    /// the account named by `replace`.
    pub fn adjust_post(&mut self, search: &Regex, replace: &str, factor: &BigRational) {
        let neg_factor = -factor.clone();
        let mut postings = Vec::with_capacity(self.postings().len());
        for p in self.postings() {
            postings.push(p.clone());
            if search.is_match(&p.account) {
                let target = search.replace_all(&p.account, replace).into_owned();
                postings.push(p.scaled(&neg_factor));
                postings.push(p.rebooked(&target, p.date, factor));
            }
        }
        self.replace_postings(postings);
    }

    /// Renames accounts matching `search` with the substitution `replace`.
    /// Non-matching accounts become `alt` when given.
    pub fn regex_accounts(&mut self, search: &Regex, replace: Option<&str>, alt: Option<&str>) {
        self.map_account(|account| {
            if search.is_match(account) {
                match replace {
                    Some(replace) => search.replace_all(account, replace).into_owned(),
                    None => account.to_string(),
                }
            } else {
                alt.map_or_else(|| account.to_string(), str::to_string)
            }
        });
    }

    /// Renames currencies matching `search`, in postings and price pairs.
    pub fn regex_currencies(&mut self, search: &Regex, replace: &str) {
        let rename = |currency: &str| search.replace_all(currency, replace).into_owned();
        self.map_amount(|_, currency| (BigRational::one(), rename(currency)));
        self.prices.rename_currencies(rename);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BookBuilder;
    use num_traits::Zero;

    fn rat(n: i64, d: i64) -> BigRational {
        BigRational::new(n.into(), d.into())
    }

    fn book(entries: &[(Date, &str, &str, &str, i64)]) -> Book {
        let mut b = BookBuilder::new();
        for (date, payee, debit, credit, amount) in entries {
            b.new_transaction(*date, payee, "").unwrap();
            b.add_posting(debit, "GBP", rat(*amount, 1), "");
            b.add_posting(credit, "GBP", rat(-*amount, 1), "");
        }
        b.build().unwrap()
    }

    fn year_of_spending() -> Book {
        book(&[
            (Date::new(2020, 1, 15), "Food", "Expenses:Food", "Assets:Bank", 30),
            (Date::new(2020, 2, 10), "Fuel", "Expenses:Car", "Assets:Bank", 40),
            (Date::new(2020, 3, 5), "Food", "Expenses:Food", "Assets:Bank", 20),
            (Date::new(2021, 1, 14), "Pay", "Assets:Bank", "Income:Salary", 500),
        ])
    }

    fn amounts_for(book: &Book, account: &str) -> Vec<(Date, BigRational)> {
        book.postings()
            .iter()
            .filter(|p| p.account() == account)
            .map(|p| (p.date(), p.amount().clone()))
            .collect()
    }

    fn assert_balanced(book: &Book) {
        for t in book.transactions() {
            assert!(t.currency_totals().values().all(Zero::is_zero), "{:?}", t.payee());
        }
    }

    #[test]
    fn date_filters_keep_whole_transactions() {
        let mut b = year_of_spending();
        b.filter_by_date_range(Date::new(2020, 2, 1), Date::new(2020, 3, 6));
        let payees: Vec<&str> = b.transactions().map(|t| t.payee()).collect();
        assert_eq!(payees, ["Fuel", "Food"]);

        let mut since = year_of_spending();
        since.filter_by_date_since(Date::new(2020, 3, 1));
        assert_eq!(since.len(), 2);

        let mut asof = year_of_spending();
        asof.filter_by_date_asof(Date::new(2020, 1, 31));
        assert_eq!(asof.len(), 1);
    }

    #[test]
    fn account_filter_requires_exact_match() {
        let mut b = year_of_spending();
        b.filter_by_account("Expenses:Food");
        assert_eq!(b.len(), 2);

        let mut none = year_of_spending();
        none.filter_by_account("Expenses");
        assert!(none.is_empty());
    }

    #[test]
    fn split_by_month_merges_transactions() {
        let mut b = book(&[
            (Date::new(2020, 1, 3), "A", "Expenses:Food", "Assets:Bank", 10),
            (Date::new(2020, 1, 20), "B", "Expenses:Food", "Assets:Bank", 5),
            (Date::new(2020, 2, 2), "C", "Expenses:Food", "Assets:Bank", 1),
        ]);
        b.split_by_period(Period::Monthly);
        assert_eq!(b.len(), 2);
        let first = b.transactions().next().unwrap();
        assert_eq!(first.date(), Date::new(2020, 1, 1));
        assert_eq!(first.payee(), "");
        assert_eq!(
            amounts_for(&b, "Expenses:Food"),
            [
                (Date::new(2020, 1, 1), rat(15, 1)),
                (Date::new(2020, 2, 1), rat(1, 1))
            ]
        );
    }

    #[test]
    fn map_account_resets_rendering_and_merges() {
        let mut b = year_of_spending();
        b.map_account(|a| {
            if a.starts_with("Expenses") {
                "Expenses".to_string()
            } else {
                a.to_string()
            }
        });
        let expenses = amounts_for(&b, "Expenses");
        assert_eq!(expenses.len(), 3);
        assert!(b.postings().iter().all(|p| p.account_term() == p.account()));
        assert_balanced(&b);
    }

    #[test]
    fn map_amount_converts_and_relabels() {
        let mut b = year_of_spending();
        b.map_amount(|_, _| (rat(2, 1), "USD".to_string()));
        assert!(b.postings().iter().all(|p| p.currency() == "USD"));
        assert_eq!(amounts_for(&b, "Expenses:Car"), [(Date::new(2020, 2, 10), rat(80, 1))]);
        assert_balanced(&b);
    }

    #[test]
    fn adjust_by_scales_to_period_average() {
        let b = book(&[
            (Date::new(2020, 1, 1), "A", "Expenses", "Assets", 730),
            (Date::new(2021, 12, 31), "B", "Expenses", "Assets", 1),
        ]);
        let days = Date::new(2021, 12, 31).days_since(Date::new(2020, 1, 1));
        assert_eq!(days, 730);

        let mut yearly = b.clone();
        yearly.adjust_by(Some(Period::Yearly)).unwrap();
        assert_eq!(amounts_for(&yearly, "Expenses")[0].1, rat(365, 1));

        let mut daily = b.clone();
        daily.adjust_by(Some(Period::Daily)).unwrap();
        assert_eq!(amounts_for(&daily, "Expenses")[0].1, rat(1, 1));

        let mut monthly = b.clone();
        monthly.adjust_by(Some(Period::Monthly)).unwrap();
        assert_eq!(amounts_for(&monthly, "Expenses")[0].1, rat(365, 12));

        let mut quarterly = b.clone();
        quarterly.adjust_by(Some(Period::Quarterly)).unwrap();
        assert_eq!(amounts_for(&quarterly, "Expenses")[0].1, rat(365, 4));

        let mut untouched = b.clone();
        untouched.adjust_by(None).unwrap();
        assert_eq!(untouched, b);
    }

    #[test]
    fn adjust_by_needs_more_than_one_day() {
        let mut b = book(&[(Date::new(2020, 1, 1), "A", "Expenses", "Assets", 10)]);
        assert!(matches!(
            b.adjust_by(Some(Period::Monthly)),
            Err(LedgerError::EmptyDateRange(_))
        ));
    }

    #[test]
    fn depreciation_spreads_cost() {
        let mut b = book(&[(
            Date::new(2020, 1, 10),
            "Laptop",
            "Expenses:Tech",
            "Assets:Bank",
            1200,
        )]);
        let search = Regex::new("^Expenses:Tech$").unwrap();
        b.depreciate(&search, "Assets:Deferred", Period::Monthly, NonZeroU32::new(3).unwrap());

        assert_eq!(
            amounts_for(&b, "Expenses:Tech"),
            [
                (Date::new(2020, 1, 10), rat(400, 1)),
                (Date::new(2020, 2, 1), rat(400, 1)),
                (Date::new(2020, 3, 1), rat(400, 1)),
            ]
        );
        assert_eq!(
            amounts_for(&b, "Assets:Deferred"),
            [
                (Date::new(2020, 1, 10), rat(800, 1)),
                (Date::new(2020, 2, 1), rat(-400, 1)),
                (Date::new(2020, 3, 1), rat(-400, 1)),
            ]
        );
        assert_balanced(&b);
    }

    #[test]
    fn adjust_post_moves_a_share() {
        let mut b = book(&[(Date::new(2020, 1, 1), "Bill", "Expenses:Phone", "Assets:Bank", 100)]);
        let search = Regex::new("^Expenses:Phone$").unwrap();
        b.adjust_post(&search, "Expenses:Business", &rat(1, 4));

        assert_eq!(
            amounts_for(&b, "Expenses:Phone"),
            [(Date::new(2020, 1, 1), rat(75, 1))]
        );
        assert_eq!(
            amounts_for(&b, "Expenses:Business"),
            [(Date::new(2020, 1, 1), rat(25, 1))]
        );
        assert_balanced(&b);
    }

    #[test]
    fn regex_account_rewrites() {
        let mut b = year_of_spending();
        let search = Regex::new("^Expenses:(.*)$").unwrap();
        b.regex_accounts(&search, Some("Spend:$1"), Some("Other"));
        let accounts = b.accounts(&Regex::new(".*").unwrap(), false);
        assert_eq!(accounts, ["Other", "Spend:Car", "Spend:Food"]);
    }

    #[test]
    fn regex_currency_rewrites_postings_and_prices() {
        let mut builder = BookBuilder::new();
        builder.new_transaction(Date::new(2020, 1, 1), "FX", "").unwrap();
        builder.add_posting("A", "UKP", rat(1, 1), "");
        builder.add_posting("B", "UKP", rat(-1, 1), "");
        builder.add_price(Date::new(2020, 1, 1), "UKP", "USD", rat(3, 2));
        let mut b = builder.build().unwrap();

        b.regex_currencies(&Regex::new("^UKP$").unwrap(), "GBP");
        assert!(b.postings().iter().all(|p| p.currency() == "GBP"));
        assert_eq!(
            b.get_price(Date::new(2020, 1, 1), "GBP", "USD").0,
            rat(3, 2)
        );
    }
}
