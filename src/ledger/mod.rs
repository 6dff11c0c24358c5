//! Ledger module containing the chart of accounts, the journal engine and
//! the facade that runs every operation in one unit of work

pub mod account;
pub mod core;
pub mod journal;

pub use account::*;
pub use core::*;
pub use journal::*;
