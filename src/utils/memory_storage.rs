//! In-memory storage implementation for testing and embedding

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::documents::Document;
use crate::inventory::{InventoryItem, InventoryLayer, InventoryTransaction};
use crate::traits::*;
use crate::treasury::{CashRegister, TreasuryTransaction};
use crate::types::*;

#[derive(Debug, Clone, Default)]
struct Tables {
    sequences: HashMap<String, u64>,
    accounts: HashMap<Uuid, Account>,
    entries: HashMap<Uuid, JournalEntry>,
    deleted_entries: HashSet<Uuid>,
    items: HashMap<Uuid, InventoryItem>,
    layers: HashMap<Uuid, InventoryLayer>,
    inventory_transactions: HashMap<Uuid, InventoryTransaction>,
    documents: HashMap<Uuid, Document>,
    registers: HashMap<Uuid, CashRegister>,
    treasury_transactions: HashMap<Uuid, TreasuryTransaction>,
}

#[derive(Debug, Default)]
struct Committed {
    version: u64,
    tables: Tables,
}

/// In-memory store.
///
/// Each unit of work gets a private copy of the committed tables. A commit
/// installs the copy only if nothing else committed since the unit began,
/// which serializes conflicting units; the loser gets
/// [`LedgerError::ConcurrencyConflict`] and may retry.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    committed: Arc<RwLock<Committed>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of commits so far
    pub fn version(&self) -> LedgerResult<u64> {
        let committed = self.committed.read().map_err(poisoned)?;
        Ok(committed.version)
    }
}

fn poisoned<E>(_: E) -> LedgerError {
    LedgerError::Storage("memory store lock poisoned".to_string())
}

#[async_trait]
impl LedgerStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> LedgerResult<MemoryTx> {
        let committed = self.committed.read().map_err(poisoned)?;
        Ok(MemoryTx {
            store: Arc::clone(&self.committed),
            base_version: committed.version,
            tables: committed.tables.clone(),
        })
    }
}

/// Unit of work over a [`MemoryStore`]
#[derive(Debug)]
pub struct MemoryTx {
    store: Arc<RwLock<Committed>>,
    base_version: u64,
    tables: Tables,
}

fn in_range(date: NaiveDate, start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
    start.is_none_or(|s| date >= s) && end.is_none_or(|e| date <= e)
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn next_sequence(&mut self, name: &str) -> LedgerResult<u64> {
        let value = self.tables.sequences.entry(name.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    async fn insert_account(&mut self, account: &Account) -> LedgerResult<()> {
        if self.tables.accounts.contains_key(&account.id) {
            return Err(LedgerError::Storage(format!(
                "Account {} already stored",
                account.id
            )));
        }
        self.tables.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn update_account(&mut self, account: &Account) -> LedgerResult<()> {
        match self.tables.accounts.get_mut(&account.id) {
            Some(stored) => {
                *stored = account.clone();
                Ok(())
            }
            None => Err(LedgerError::AccountNotFound(account.id.to_string())),
        }
    }

    async fn get_account(&self, account_id: Uuid) -> LedgerResult<Option<Account>> {
        Ok(self.tables.accounts.get(&account_id).cloned())
    }

    async fn find_account_by_code(&self, code: &str) -> LedgerResult<Option<Account>> {
        Ok(self
            .tables
            .accounts
            .values()
            .find(|a| a.code == code)
            .cloned())
    }

    async fn list_accounts(&self) -> LedgerResult<Vec<Account>> {
        let mut accounts: Vec<Account> = self.tables.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(accounts)
    }

    async fn child_accounts(&self, parent_id: Uuid) -> LedgerResult<Vec<Account>> {
        let mut children: Vec<Account> = self
            .tables
            .accounts
            .values()
            .filter(|a| a.parent_id == Some(parent_id))
            .cloned()
            .collect();
        children.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(children)
    }

    async fn insert_journal_entry(&mut self, entry: &JournalEntry) -> LedgerResult<()> {
        if self.tables.entries.contains_key(&entry.id) {
            return Err(LedgerError::Storage(format!(
                "Journal entry {} already stored",
                entry.id
            )));
        }
        self.tables.entries.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn update_journal_entry(&mut self, entry: &JournalEntry) -> LedgerResult<()> {
        match self.tables.entries.get_mut(&entry.id) {
            Some(stored) => {
                *stored = entry.clone();
                Ok(())
            }
            None => Err(LedgerError::EntryNotFound(entry.id)),
        }
    }

    async fn delete_journal_entry(&mut self, entry_id: Uuid) -> LedgerResult<()> {
        if self.tables.entries.remove(&entry_id).is_some() {
            self.tables.deleted_entries.insert(entry_id);
            Ok(())
        } else {
            Err(LedgerError::EntryNotFound(entry_id))
        }
    }

    async fn get_journal_entry(&self, entry_id: Uuid) -> LedgerResult<Option<JournalEntry>> {
        Ok(self.tables.entries.get(&entry_id).cloned())
    }

    async fn is_journal_entry_deleted(&self, entry_id: Uuid) -> LedgerResult<bool> {
        Ok(self.tables.deleted_entries.contains(&entry_id))
    }

    async fn find_journal_entry_by_source(
        &self,
        source: &SourceRef,
    ) -> LedgerResult<Option<JournalEntry>> {
        Ok(self
            .tables
            .entries
            .values()
            .find(|e| e.source == *source)
            .cloned())
    }

    async fn list_journal_entries(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<JournalEntry>> {
        let mut entries: Vec<JournalEntry> = self
            .tables
            .entries
            .values()
            .filter(|e| in_range(e.date, start_date, end_date))
            .cloned()
            .collect();
        entries.sort_by_key(|e| (e.date, e.sequence));
        Ok(entries)
    }

    async fn insert_item(&mut self, item: &InventoryItem) -> LedgerResult<()> {
        self.tables.items.insert(item.id, item.clone());
        Ok(())
    }

    async fn update_item(&mut self, item: &InventoryItem) -> LedgerResult<()> {
        match self.tables.items.get_mut(&item.id) {
            Some(stored) => {
                *stored = item.clone();
                Ok(())
            }
            None => Err(LedgerError::ItemNotFound(item.id.to_string())),
        }
    }

    async fn get_item(&self, item_id: Uuid) -> LedgerResult<Option<InventoryItem>> {
        Ok(self.tables.items.get(&item_id).cloned())
    }

    async fn find_item_by_code(&self, code: &str) -> LedgerResult<Option<InventoryItem>> {
        Ok(self
            .tables
            .items
            .values()
            .find(|i| i.code == code)
            .cloned())
    }

    async fn insert_layer(&mut self, layer: &InventoryLayer) -> LedgerResult<()> {
        self.tables.layers.insert(layer.id, layer.clone());
        Ok(())
    }

    async fn update_layer(&mut self, layer: &InventoryLayer) -> LedgerResult<()> {
        match self.tables.layers.get_mut(&layer.id) {
            Some(stored) => {
                *stored = layer.clone();
                Ok(())
            }
            None => Err(LedgerError::Storage(format!("Layer {} not found", layer.id))),
        }
    }

    async fn delete_layer(&mut self, layer_id: Uuid) -> LedgerResult<()> {
        self.tables
            .layers
            .remove(&layer_id)
            .map(|_| ())
            .ok_or_else(|| LedgerError::Storage(format!("Layer {} not found", layer_id)))
    }

    async fn get_layer(&self, layer_id: Uuid) -> LedgerResult<Option<InventoryLayer>> {
        Ok(self.tables.layers.get(&layer_id).cloned())
    }

    async fn layers_for_item(&self, item_id: Uuid) -> LedgerResult<Vec<InventoryLayer>> {
        let mut layers: Vec<InventoryLayer> = self
            .tables
            .layers
            .values()
            .filter(|l| l.item_id == item_id)
            .cloned()
            .collect();
        layers.sort_by_key(|l| l.sequence);
        Ok(layers)
    }

    async fn insert_inventory_transaction(
        &mut self,
        transaction: &InventoryTransaction,
    ) -> LedgerResult<()> {
        self.tables
            .inventory_transactions
            .insert(transaction.id, transaction.clone());
        Ok(())
    }

    async fn delete_inventory_transaction(&mut self, transaction_id: Uuid) -> LedgerResult<()> {
        self.tables
            .inventory_transactions
            .remove(&transaction_id)
            .map(|_| ())
            .ok_or_else(|| {
                LedgerError::Storage(format!(
                    "Inventory transaction {} not found",
                    transaction_id
                ))
            })
    }

    async fn inventory_transactions_for_source(
        &self,
        source: &SourceRef,
    ) -> LedgerResult<Vec<InventoryTransaction>> {
        let mut found: Vec<InventoryTransaction> = self
            .tables
            .inventory_transactions
            .values()
            .filter(|t| t.source == *source)
            .cloned()
            .collect();
        found.sort_by_key(|t| t.created_at);
        Ok(found)
    }

    async fn inventory_transactions_for_item(
        &self,
        item_id: Uuid,
    ) -> LedgerResult<Vec<InventoryTransaction>> {
        let mut found: Vec<InventoryTransaction> = self
            .tables
            .inventory_transactions
            .values()
            .filter(|t| t.item_id == item_id)
            .cloned()
            .collect();
        found.sort_by_key(|t| t.created_at);
        Ok(found)
    }

    async fn insert_document(&mut self, document: &Document) -> LedgerResult<()> {
        self.tables.documents.insert(document.id, document.clone());
        Ok(())
    }

    async fn update_document(&mut self, document: &Document) -> LedgerResult<()> {
        match self.tables.documents.get_mut(&document.id) {
            Some(stored) => {
                *stored = document.clone();
                Ok(())
            }
            None => Err(LedgerError::DocumentNotFound(document.id)),
        }
    }

    async fn delete_document(&mut self, document_id: Uuid) -> LedgerResult<()> {
        self.tables
            .documents
            .remove(&document_id)
            .map(|_| ())
            .ok_or(LedgerError::DocumentNotFound(document_id))
    }

    async fn get_document(&self, document_id: Uuid) -> LedgerResult<Option<Document>> {
        Ok(self.tables.documents.get(&document_id).cloned())
    }

    async fn insert_register(&mut self, register: &CashRegister) -> LedgerResult<()> {
        self.tables.registers.insert(register.id, register.clone());
        Ok(())
    }

    async fn update_register(&mut self, register: &CashRegister) -> LedgerResult<()> {
        match self.tables.registers.get_mut(&register.id) {
            Some(stored) => {
                *stored = register.clone();
                Ok(())
            }
            None => Err(LedgerError::RegisterNotFound(register.id)),
        }
    }

    async fn get_register(&self, register_id: Uuid) -> LedgerResult<Option<CashRegister>> {
        Ok(self.tables.registers.get(&register_id).cloned())
    }

    async fn list_registers(&self) -> LedgerResult<Vec<CashRegister>> {
        let mut registers: Vec<CashRegister> = self.tables.registers.values().cloned().collect();
        registers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(registers)
    }

    async fn insert_treasury_transaction(
        &mut self,
        transaction: &TreasuryTransaction,
    ) -> LedgerResult<()> {
        self.tables
            .treasury_transactions
            .insert(transaction.id, transaction.clone());
        Ok(())
    }

    async fn delete_treasury_transaction(&mut self, transaction_id: Uuid) -> LedgerResult<()> {
        self.tables
            .treasury_transactions
            .remove(&transaction_id)
            .map(|_| ())
            .ok_or_else(|| {
                LedgerError::Storage(format!(
                    "Treasury transaction {} not found",
                    transaction_id
                ))
            })
    }

    async fn treasury_transactions_for_register(
        &self,
        register_id: Uuid,
    ) -> LedgerResult<Vec<TreasuryTransaction>> {
        let mut found: Vec<TreasuryTransaction> = self
            .tables
            .treasury_transactions
            .values()
            .filter(|t| t.register_id == register_id)
            .cloned()
            .collect();
        found.sort_by_key(|t| (t.date, t.created_at));
        Ok(found)
    }

    async fn treasury_transactions_for_source(
        &self,
        source: &SourceRef,
    ) -> LedgerResult<Vec<TreasuryTransaction>> {
        Ok(self
            .tables
            .treasury_transactions
            .values()
            .filter(|t| t.source == *source)
            .cloned()
            .collect())
    }

    async fn commit(self) -> LedgerResult<()> {
        let mut committed = self.store.write().map_err(poisoned)?;
        if committed.version != self.base_version {
            return Err(LedgerError::ConcurrencyConflict(format!(
                "store moved from version {} to {} during this unit of work",
                self.base_version, committed.version
            )));
        }
        committed.tables = self.tables;
        committed.version += 1;
        Ok(())
    }

    async fn rollback(self) -> LedgerResult<()> {
        Ok(())
    }
}
