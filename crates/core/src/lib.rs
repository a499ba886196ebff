//! `tally-core`: ledger foundation building blocks.
//!
//! Dates, account paths and the error model shared by the engine crates. No IO.

pub mod account;
pub mod date;
pub mod error;

pub use account::DEFAULT_DIVIDER;
pub use date::{Date, Period};
pub use error::{LedgerError, LedgerResult};
