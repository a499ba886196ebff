//! `tally-book`: the in-memory ledger engine.
//!
//! - [`BookBuilder`] takes transactions, postings and prices from a parser
//!   and produces a balanced, compacted [`Book`].
//! - [`Book`] answers queries (transactions, accounts, prices) and supports
//!   in-place transformations (filters, renames, period splits, rescaling,
//!   depreciation, reclassification).
//! - [`Book::accumulate`] rolls a book up into a value-ordered tree report in
//!   one currency.
//! - [`Book::extract_register`] produces an account register with base
//!   currency valuations and an IRR summary.
//!
//! Amounts are exact rationals (`BigRational`). Nothing here does IO.

pub mod accumulate;
pub mod book;
pub mod builder;
mod compact;
pub mod config;
pub mod ops;
pub mod posting;
pub mod price;
mod reclassify;
pub mod register;
pub mod returns;
pub mod transaction;

pub use accumulate::{
    AccumulateOptions, AccumulationPoints, PointConflict, discover_accumulation_points,
};
pub use book::Book;
pub use builder::BookBuilder;
pub use config::LedgerConfig;
pub use posting::{Posting, SortComponent, SortKey, decimal_text};
pub use price::{CurrencyPair, MissingPricePolicy, Price, PriceBook, PriceBookBuilder, PriceKind};
pub use register::{RegisterEntry, RegisterReport, RegisterSummary, RegisterSummaryEntry};
pub use returns::calculate_irr;
pub use transaction::{Journal, Transaction};

pub use tally_core::{Date, LedgerError, LedgerResult, Period};
