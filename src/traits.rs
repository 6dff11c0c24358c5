//! Traits for storage abstraction and extensibility

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::documents::Document;
use crate::inventory::{InventoryItem, InventoryLayer, InventoryTransaction};
use crate::treasury::{CashRegister, TreasuryTransaction};
use crate::types::*;

/// Factory of atomic units of work.
///
/// Every mutating ledger operation runs inside exactly one [`LedgerTx`]
/// obtained from [`LedgerStore::begin`]. A backend must make the unit's
/// effects visible to other units only on a successful `commit`, and must
/// reject (with [`LedgerError::ConcurrencyConflict`]) a commit that would
/// overwrite changes committed by another unit in the meantime.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    type Tx: LedgerTx;

    /// Start a new unit of work
    async fn begin(&self) -> LedgerResult<Self::Tx>;
}

/// One atomic, isolated unit of work over every persisted entity.
///
/// Dropping a unit without committing discards all of its writes.
#[async_trait]
pub trait LedgerTx: Send + Sync {
    /// Next value of a named monotonic sequence, starting at 1
    async fn next_sequence(&mut self, name: &str) -> LedgerResult<u64>;

    // Accounts
    async fn insert_account(&mut self, account: &Account) -> LedgerResult<()>;
    async fn update_account(&mut self, account: &Account) -> LedgerResult<()>;
    async fn get_account(&self, account_id: Uuid) -> LedgerResult<Option<Account>>;
    async fn find_account_by_code(&self, code: &str) -> LedgerResult<Option<Account>>;
    async fn list_accounts(&self) -> LedgerResult<Vec<Account>>;
    async fn child_accounts(&self, parent_id: Uuid) -> LedgerResult<Vec<Account>>;

    // Journal
    async fn insert_journal_entry(&mut self, entry: &JournalEntry) -> LedgerResult<()>;
    async fn update_journal_entry(&mut self, entry: &JournalEntry) -> LedgerResult<()>;
    /// Remove an entry and its lines, remembering that it existed
    async fn delete_journal_entry(&mut self, entry_id: Uuid) -> LedgerResult<()>;
    async fn get_journal_entry(&self, entry_id: Uuid) -> LedgerResult<Option<JournalEntry>>;
    async fn is_journal_entry_deleted(&self, entry_id: Uuid) -> LedgerResult<bool>;
    async fn find_journal_entry_by_source(
        &self,
        source: &SourceRef,
    ) -> LedgerResult<Option<JournalEntry>>;
    /// Entries dated within the inclusive range, ordered by (date, sequence)
    async fn list_journal_entries(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<JournalEntry>>;

    // Inventory
    async fn insert_item(&mut self, item: &InventoryItem) -> LedgerResult<()>;
    async fn update_item(&mut self, item: &InventoryItem) -> LedgerResult<()>;
    async fn get_item(&self, item_id: Uuid) -> LedgerResult<Option<InventoryItem>>;
    async fn find_item_by_code(&self, code: &str) -> LedgerResult<Option<InventoryItem>>;
    async fn insert_layer(&mut self, layer: &InventoryLayer) -> LedgerResult<()>;
    async fn update_layer(&mut self, layer: &InventoryLayer) -> LedgerResult<()>;
    async fn delete_layer(&mut self, layer_id: Uuid) -> LedgerResult<()>;
    async fn get_layer(&self, layer_id: Uuid) -> LedgerResult<Option<InventoryLayer>>;
    /// All layers of an item, oldest first
    async fn layers_for_item(&self, item_id: Uuid) -> LedgerResult<Vec<InventoryLayer>>;
    async fn insert_inventory_transaction(
        &mut self,
        transaction: &InventoryTransaction,
    ) -> LedgerResult<()>;
    async fn delete_inventory_transaction(&mut self, transaction_id: Uuid) -> LedgerResult<()>;
    async fn inventory_transactions_for_source(
        &self,
        source: &SourceRef,
    ) -> LedgerResult<Vec<InventoryTransaction>>;
    async fn inventory_transactions_for_item(
        &self,
        item_id: Uuid,
    ) -> LedgerResult<Vec<InventoryTransaction>>;

    // Documents
    async fn insert_document(&mut self, document: &Document) -> LedgerResult<()>;
    async fn update_document(&mut self, document: &Document) -> LedgerResult<()>;
    async fn delete_document(&mut self, document_id: Uuid) -> LedgerResult<()>;
    async fn get_document(&self, document_id: Uuid) -> LedgerResult<Option<Document>>;

    // Treasury
    async fn insert_register(&mut self, register: &CashRegister) -> LedgerResult<()>;
    async fn update_register(&mut self, register: &CashRegister) -> LedgerResult<()>;
    async fn get_register(&self, register_id: Uuid) -> LedgerResult<Option<CashRegister>>;
    async fn list_registers(&self) -> LedgerResult<Vec<CashRegister>>;
    async fn insert_treasury_transaction(
        &mut self,
        transaction: &TreasuryTransaction,
    ) -> LedgerResult<()>;
    async fn delete_treasury_transaction(&mut self, transaction_id: Uuid) -> LedgerResult<()>;
    async fn treasury_transactions_for_register(
        &self,
        register_id: Uuid,
    ) -> LedgerResult<Vec<TreasuryTransaction>>;
    async fn treasury_transactions_for_source(
        &self,
        source: &SourceRef,
    ) -> LedgerResult<Vec<TreasuryTransaction>>;

    /// Make every write of this unit visible atomically
    async fn commit(self) -> LedgerResult<()>;

    /// Discard every write of this unit
    async fn rollback(self) -> LedgerResult<()>;
}

/// Trait for implementing custom account validation rules
pub trait AccountValidator: Send + Sync {
    /// Validate an account before saving
    fn validate_account(&self, account: &Account) -> LedgerResult<()>;
}

/// Default account validator with basic rules
pub struct DefaultAccountValidator;

impl AccountValidator for DefaultAccountValidator {
    fn validate_account(&self, account: &Account) -> LedgerResult<()> {
        if account.code.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Account code cannot be empty".to_string(),
            ));
        }

        if account.name.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Account name cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
