//! End-to-end accumulation scenarios: build a book, roll it up, and check
//! the value-ordered tree that comes out.

use num_rational::BigRational;
use num_traits::Zero;
use regex::Regex;

use tally_book::{
    AccumulateOptions, Book, BookBuilder, Date, Journal, LedgerError, MissingPricePolicy,
    Posting, PriceKind,
};

fn rat(n: i64) -> BigRational {
    BigRational::from_integer(n.into())
}

fn day(d: u32) -> Date {
    Date::new(2016, 1, d)
}

/// `(account, level, term, amount)` per posting of transaction `index`.
fn rows(journal: &Journal, index: usize) -> Vec<(String, u32, String, BigRational)> {
    journal
        .transaction(index)
        .expect("transaction exists")
        .iter()
        .map(|p: &Posting| {
            (
                p.account().to_string(),
                p.account_level(),
                p.account_term().to_string(),
                p.amount().clone(),
            )
        })
        .collect()
}

fn row(account: &str, level: u32, term: &str, amount: i64) -> (String, u32, String, BigRational) {
    (account.to_string(), level, term.to_string(), rat(amount))
}

fn accounts(journal: &Journal, index: usize) -> Vec<String> {
    rows(journal, index).into_iter().map(|r| r.0).collect()
}

fn simple_book() -> Book {
    let mut b = BookBuilder::new();
    b.new_transaction(day(1), "Salary", "").unwrap();
    b.add_posting("Income:T1:A", "GBP", rat(100), "");
    b.add_posting("Income:T1:B", "GBP", rat(100), "");
    b.add_posting("Income:C", "GBP", rat(100), "");
    b.add_posting("Expense:C", "GBP", rat(-300), "");
    b.build().unwrap()
}

#[test]
fn simple_tree_orders_by_value() {
    tally_observability::init();
    let out = simple_book().accumulate(&AccumulateOptions::new("GBP")).unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(
        rows(&out, 0),
        [
            row("Income", 0, "Income", 300),
            row("Income:T1", 1, "T1", 200),
            row("Income:T1:A", 2, "A", 100),
            row("Income:T1:B", 2, "B", 100),
            row("Income:C", 1, "C", 100),
            row("Expense:C", 0, "Expense:C", -300),
        ]
    );

    let txn = out.transaction(0).unwrap();
    let subtotals: Vec<&str> = txn
        .iter()
        .filter(|p| p.is_subtotal())
        .map(Posting::account)
        .collect();
    assert_eq!(subtotals, ["Income", "Income:T1"]);
}

#[test]
fn foreign_currencies_collapse_into_subtotals() {
    tally_observability::init();
    let mut b = BookBuilder::new();
    b.new_transaction(day(1), "Swap", "").unwrap();
    b.add_posting("Income:T1:A", "AAA", rat(100), "");
    b.add_posting("Income:T1:A", "BBB", rat(100), "");
    b.add_posting("Expense:C", "AAA", rat(-100), "");
    b.add_posting("Expense:C", "BBB", rat(-100), "");
    b.add_price(day(1), "AAA", "GBP", rat(1));
    b.add_price(day(1), "BBB", "GBP", rat(2));
    let book = b.build().unwrap();

    let out = book.accumulate(&AccumulateOptions::new("GBP")).unwrap();
    assert_eq!(
        rows(&out, 0),
        [
            row("Income:T1:A", 0, "Income:T1:A", 300),
            row("Income:T1:A", 1, "", 100),
            row("Income:T1:A", 1, "", 100),
            row("Expense:C", 0, "Expense:C", -300),
            row("Expense:C", 1, "", -100),
            row("Expense:C", 1, "", -100),
        ]
    );

    let txn = out.transaction(0).unwrap();
    let currencies: Vec<&str> = txn.iter().map(Posting::currency).collect();
    assert_eq!(currencies, ["GBP", "AAA", "BBB", "GBP", "AAA", "BBB"]);
    assert!(
        txn.iter()
            .filter(|p| p.is_subtotal())
            .all(|p| p.price_kind() == PriceKind::Exact)
    );
}

#[test]
fn credit_accounts_are_inverted_before_summing() {
    let mut b = BookBuilder::new();
    b.new_transaction(day(1), "Mortgage", "").unwrap();
    b.add_posting("L:T1:H", "GBP", rat(-500), "");
    b.add_posting("L:T1:M", "GBP", rat(14000), "");
    b.add_posting("Other", "GBP", rat(-13500), "");
    let book = b.build().unwrap();

    let options = AccumulateOptions::new("GBP").credit(Regex::new("^L").unwrap());
    let out = book.accumulate(&options).unwrap();

    let amounts: Vec<(String, BigRational)> = rows(&out, 0)
        .into_iter()
        .map(|(account, _, _, amount)| (account, amount))
        .collect();
    assert!(amounts.contains(&("L:T1".to_string(), rat(-13500))));
    assert!(amounts.contains(&("L:T1:H".to_string(), rat(500))));
    assert!(amounts.contains(&("L:T1:M".to_string(), rat(-14000))));
    assert!(amounts.contains(&("Other".to_string(), rat(-13500))));
    assert_eq!(amounts.len(), 4);
    assert_eq!(amounts[0].0, "L:T1");
}

#[test]
fn repeated_transactions_stay_separate() {
    let mut b = BookBuilder::new();
    for _ in 0..2 {
        b.new_transaction(day(1), "Cafe", "").unwrap();
        b.add_posting("Expenses:Food", "GBP", rat(5), "");
        b.add_posting("Assets:Cash", "GBP", rat(-5), "");
    }
    let book = b.build().unwrap();
    let out = book.accumulate(&AccumulateOptions::new("GBP")).unwrap();

    assert_eq!(out.len(), 2);
    let payees: Vec<&str> = out.transactions().map(|t| t.payee()).collect();
    assert_eq!(payees, ["Cafe", "Cafe (2)"]);
}

#[test]
fn children_sorted_by_descending_value() {
    let mut b = BookBuilder::new();
    b.new_transaction(day(1), "Month", "").unwrap();
    b.add_posting("Savings:A", "GBP", rat(50), "");
    b.add_posting("Savings:B", "GBP", rat(50), "");
    b.add_posting("Savings:C", "GBP", rat(50), "");
    b.add_posting("Mortgage", "GBP", rat(-100), "");
    b.add_posting("Equity", "GBP", rat(-50), "");
    let book = b.build().unwrap();

    let out = book.accumulate(&AccumulateOptions::new("GBP")).unwrap();
    assert_eq!(
        accounts(&out, 0),
        ["Savings", "Savings:A", "Savings:B", "Savings:C", "Equity", "Mortgage"]
    );
}

#[test]
fn posted_accumulation_point_keeps_its_own_line() {
    let mut b = BookBuilder::new();
    b.new_transaction(day(1), "Mixed", "").unwrap();
    b.add_posting("Income:T1", "GBP", rat(100), "");
    b.add_posting("Income:T1:A", "GBP", rat(100), "");
    b.add_posting("Expense:C", "GBP", rat(-200), "");
    let book = b.build().unwrap();

    let out = book.accumulate(&AccumulateOptions::new("GBP")).unwrap();
    assert_eq!(
        rows(&out, 0),
        [
            row("Income:T1", 0, "Income:T1", 200),
            row("Income:T1", 1, "", 100),
            row("Income:T1:A", 1, "A", 100),
            row("Expense:C", 0, "Expense:C", -200),
        ]
    );
}

#[test]
fn every_transaction_gets_the_same_shape() {
    let mut b = BookBuilder::new();
    b.new_transaction(day(1), "First", "").unwrap();
    b.add_posting("Income:T1:A", "GBP", rat(100), "");
    b.add_posting("Income:T1:B", "GBP", rat(100), "");
    b.add_posting("Expense:C", "GBP", rat(-200), "");
    b.new_transaction(day(2), "Second", "").unwrap();
    b.add_posting("Income:T1:A", "GBP", rat(100), "");
    b.add_posting("Income:B", "GBP", rat(100), "");
    b.add_posting("Expense:C", "GBP", rat(-200), "");
    let book = b.build().unwrap();

    let out = book.accumulate(&AccumulateOptions::new("GBP")).unwrap();
    assert_eq!(
        rows(&out, 0),
        [
            row("Income", 0, "Income", 200),
            row("Income:T1", 1, "T1", 200),
            row("Income:T1:A", 2, "A", 100),
            row("Income:T1:B", 2, "B", 100),
            row("Income:B", 1, "B", 0),
            row("Expense:C", 0, "Expense:C", -200),
        ]
    );
    assert_eq!(
        rows(&out, 1),
        [
            row("Income", 0, "Income", 200),
            row("Income:B", 1, "B", 100),
            row("Income:T1", 1, "T1", 100),
            row("Income:T1:A", 2, "A", 100),
            row("Income:T1:B", 2, "B", 0),
            row("Expense:C", 0, "Expense:C", -200),
        ]
    );
}

#[test]
fn hidden_account_is_dropped() {
    let options = AccumulateOptions::new("GBP").hidden_account("Income:T1");
    let out = simple_book().accumulate(&options).unwrap();
    let listed = accounts(&out, 0);
    assert!(!listed.iter().any(|a| a == "Income:T1"));
    assert!(listed.iter().any(|a| a == "Income:T1:A"));
    assert_eq!(listed.len(), 5);
}

#[test]
fn hidden_leaf_still_counts_towards_its_parents() {
    let options = AccumulateOptions::new("GBP").hidden_account("Income:T1:A");
    let out = simple_book().accumulate(&options).unwrap();
    let amounts: Vec<(String, BigRational)> = rows(&out, 0)
        .into_iter()
        .map(|(account, _, _, amount)| (account, amount))
        .collect();
    assert_eq!(
        amounts,
        [
            ("Income".to_string(), rat(300)),
            ("Income:T1".to_string(), rat(200)),
            ("Income:T1:B".to_string(), rat(100)),
            ("Income:C".to_string(), rat(100)),
            ("Expense:C".to_string(), rat(-300)),
        ]
    );
}

#[test]
fn accumulation_is_deterministic_and_leaves_the_book_alone() {
    let book = simple_book();
    let before = book.clone();
    let options = AccumulateOptions::new("GBP");
    assert_eq!(
        book.accumulate(&options).unwrap(),
        book.accumulate(&options).unwrap()
    );
    assert_eq!(book, before);
}

#[test]
fn leaves_balance_per_currency() {
    let mut b = BookBuilder::new();
    b.new_transaction(day(3), "Trip", "").unwrap();
    b.add_posting("Expenses:Travel", "EUR", rat(80), "");
    b.add_posting("Assets:Card", "EUR", rat(-80), "");
    b.add_posting("Expenses:Food", "GBP", rat(20), "");
    b.add_posting("Assets:Cash", "GBP", rat(-20), "");
    b.add_price(day(1), "EUR", "GBP", rat(1));
    let book = b.build().unwrap();

    let out = book.accumulate(&AccumulateOptions::new("GBP")).unwrap();
    for t in out.transactions() {
        for currency in t.currency_totals().into_keys() {
            let leaves: BigRational = t
                .iter()
                .filter(|p| !p.is_subtotal() && p.currency() == currency)
                .fold(BigRational::zero(), |acc, p| acc + p.amount());
            assert!(leaves.is_zero(), "{currency} leaves sum to {leaves}");
        }
    }
}

#[test]
fn missing_price_rejection_surfaces_as_error() {
    let mut b = BookBuilder::new().missing_price_policy(MissingPricePolicy::Reject);
    b.new_transaction(day(1), "Unpriced", "").unwrap();
    b.add_posting("Assets:Gold", "XAU", rat(1), "");
    b.add_posting("Equity", "XAU", rat(-1), "");
    let book = b.build().unwrap();

    let err = book.accumulate(&AccumulateOptions::new("GBP")).unwrap_err();
    assert!(matches!(err, LedgerError::MissingPrice { .. }));
}
