//! # Accounting Engine
//!
//! An atomic double-entry ledger with FIFO inventory costing, driven by
//! business documents.
//!
//! ## Features
//!
//! - **Double-entry bookkeeping**: balanced journal entries with draft, posted and void states
//! - **Chart of accounts**: hierarchical group and leaf accounts with category-aware balances
//! - **FIFO inventory**: cost layers, exact consumption records and stock transfers
//! - **Documents**: sales and purchase invoices, receipts, payments, payroll slips,
//!   depreciation and disposals, each bound to exactly one journal entry
//! - **Treasury**: cash and bank registers with reconciliation
//! - **Storage abstraction**: every operation runs in one unit of work of a [`LedgerStore`]
//!
//! ## Quick Start
//!
//! ```rust
//! use accounting_engine::{JournalBuilder, Ledger, MemoryStore};
//! use bigdecimal::BigDecimal;
//! use chrono::NaiveDate;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let ledger = Ledger::new(MemoryStore::new());
//! ledger.setup_standard_chart_of_accounts().await.unwrap();
//!
//! let date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
//! let entry = JournalBuilder::new(date, "Owner investment")
//!     .debit("1150", BigDecimal::from(10_000), None)
//!     .credit("3100", BigDecimal::from(10_000), None)
//!     .build()
//!     .unwrap();
//! ledger.record_journal_entry(entry).await.unwrap();
//!
//! assert_eq!(ledger.account_balance("1000", true).await.unwrap(), BigDecimal::from(10_000));
//! # }
//! ```

pub mod config;
pub mod documents;
pub mod inventory;
pub mod ledger;
pub mod reconciliation;
pub mod traits;
pub mod treasury;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::*;
pub use documents::*;
pub use inventory::*;
pub use ledger::*;
pub use reconciliation::*;
pub use traits::*;
pub use treasury::{CashRegister, RegisterKind, TreasuryKind, TreasuryTransaction};
pub use types::*;
pub use utils::memory_storage::{MemoryStore, MemoryTx};
