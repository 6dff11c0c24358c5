//! Main ledger orchestrator that coordinates accounts, journal, inventory,
//! documents and treasury

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::documents::{Document, DocumentBinder, DocumentInput};
use crate::inventory::{
    InventoryCostEngine, InventoryItem, InventoryLayer, InventoryTransaction, StockTransfer,
};
use crate::ledger::{AccountRegistry, JournalEngine, NewEntry};
use crate::reconciliation::{
    AccountDiscrepancy, LedgerIntegrityReport, RegisterReconciliation, TreasuryReconciler,
};
use crate::traits::*;
use crate::treasury::{self, CashRegister, RegisterKind, TreasuryTransaction};
use crate::types::*;

/// Main ledger system that orchestrates all accounting operations.
///
/// Every public method opens exactly one unit of work. Mutations commit
/// only if every step succeeded and roll back otherwise; reads always roll
/// back. The ledger can be shared behind an `Arc` across tasks.
pub struct Ledger<S: LedgerStore> {
    store: S,
    config: EngineConfig,
    accounts: AccountRegistry,
    journal: JournalEngine,
    inventory: InventoryCostEngine,
    documents: DocumentBinder,
    reconciler: TreasuryReconciler,
}

impl<S: LedgerStore> Ledger<S> {
    /// Create a new ledger with the given storage backend and default
    /// configuration
    pub fn new(store: S) -> Self {
        Self::build(store, EngineConfig::default(), AccountRegistry::new())
    }

    /// Create a new ledger with a validated configuration
    pub fn with_config(store: S, config: EngineConfig) -> LedgerResult<Self> {
        config.validate()?;
        Ok(Self::build(store, config, AccountRegistry::new()))
    }

    /// Create a new ledger with a custom account validator
    pub fn with_validator(
        store: S,
        config: EngineConfig,
        validator: Arc<dyn AccountValidator>,
    ) -> LedgerResult<Self> {
        config.validate()?;
        Ok(Self::build(
            store,
            config,
            AccountRegistry::with_validator(validator),
        ))
    }

    fn build(store: S, config: EngineConfig, accounts: AccountRegistry) -> Self {
        let precision = config.precision;
        let journal = JournalEngine::new(precision, accounts.clone());
        let inventory = InventoryCostEngine::new(precision);
        let documents = DocumentBinder::new(
            config.numbering.clone(),
            precision,
            journal.clone(),
            inventory,
        );
        let reconciler = TreasuryReconciler::new(&config.reconciliation, precision);
        Self {
            store,
            config,
            accounts,
            journal,
            inventory,
            documents,
            reconciler,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // Account operations

    /// Setup a standard chart of accounts for a small trading business
    #[instrument(skip(self), err)]
    pub async fn setup_standard_chart_of_accounts(
        &self,
    ) -> LedgerResult<HashMap<String, Account>> {
        let mut tx = self.store.begin().await?;
        let result =
            crate::ledger::account::utils::create_standard_chart(&self.accounts, &mut tx).await;
        let chart = commit_or_rollback(tx, result).await?;
        info!(accounts = chart.len(), "standard chart created");
        Ok(chart)
    }

    /// Create a new postable account
    #[instrument(skip(self), err)]
    pub async fn create_account(
        &self,
        code: &str,
        name: &str,
        category: AccountCategory,
        parent: Option<AccountRef>,
    ) -> LedgerResult<Account> {
        self.insert_account(code, name, category, parent, false).await
    }

    /// Create a new group (header) account
    #[instrument(skip(self), err)]
    pub async fn create_group_account(
        &self,
        code: &str,
        name: &str,
        category: AccountCategory,
        parent: Option<AccountRef>,
    ) -> LedgerResult<Account> {
        self.insert_account(code, name, category, parent, true).await
    }

    async fn insert_account(
        &self,
        code: &str,
        name: &str,
        category: AccountCategory,
        parent: Option<AccountRef>,
        is_group: bool,
    ) -> LedgerResult<Account> {
        let mut tx = self.store.begin().await?;
        let result = self
            .accounts
            .create(&mut tx, code, name, category, parent.as_ref(), is_group)
            .await;
        let account = commit_or_rollback(tx, result).await?;
        info!(account = %account.id, code = %account.code, is_group, "account created");
        Ok(account)
    }

    /// Get an account by id or code
    pub async fn get_account(&self, account: impl Into<AccountRef>) -> LedgerResult<Account> {
        let account = account.into();
        let tx = self.store.begin().await?;
        let result = self.accounts.resolve(&tx, &account).await;
        read_only(tx, result).await
    }

    /// List all accounts ordered by code
    pub async fn list_accounts(&self) -> LedgerResult<Vec<Account>> {
        let tx = self.store.begin().await?;
        let result = tx.list_accounts().await;
        read_only(tx, result).await
    }

    pub async fn child_accounts(
        &self,
        account: impl Into<AccountRef>,
    ) -> LedgerResult<Vec<Account>> {
        let account = account.into();
        let tx = self.store.begin().await?;
        let result = self.accounts.children(&tx, &account).await;
        read_only(tx, result).await
    }

    /// Get an account balance; group accounts aggregate their children
    pub async fn account_balance(
        &self,
        account: impl Into<AccountRef>,
        recursive: bool,
    ) -> LedgerResult<BigDecimal> {
        let account = account.into();
        let tx = self.store.begin().await?;
        let result = self.accounts.balance(&tx, &account, recursive).await;
        read_only(tx, result).await
    }

    /// Stop an account from taking new postings
    #[instrument(skip(self), err)]
    pub async fn deactivate_account(&self, account: AccountRef) -> LedgerResult<Account> {
        let mut tx = self.store.begin().await?;
        let result = self.accounts.deactivate(&mut tx, &account).await;
        let account = commit_or_rollback(tx, result).await?;
        info!(account = %account.id, code = %account.code, "account deactivated");
        Ok(account)
    }

    /// Rebuild an account balance from posted history without storing it
    pub async fn recompute_account_balance(
        &self,
        account: impl Into<AccountRef>,
    ) -> LedgerResult<BigDecimal> {
        let account = account.into();
        let tx = self.store.begin().await?;
        let result = self.accounts.recompute_from_history(&tx, &account).await;
        read_only(tx, result).await
    }

    // Manual journal operations

    /// Store a manual entry as a draft
    #[instrument(skip(self, entry), fields(date = %entry.date), err)]
    pub async fn draft_journal_entry(&self, entry: NewEntry) -> LedgerResult<JournalEntry> {
        require_manual_source(&entry)?;
        let mut tx = self.store.begin().await?;
        let result = self.journal.draft(&mut tx, entry).await;
        let entry = commit_or_rollback(tx, result).await?;
        info!(entry = %entry.id, "journal entry drafted");
        Ok(entry)
    }

    /// Post a manual draft
    #[instrument(skip(self), err)]
    pub async fn post_journal_entry(&self, entry_id: Uuid) -> LedgerResult<JournalEntry> {
        let mut tx = self.store.begin().await?;
        let checked = self.manual_entry(&tx, entry_id).await;
        let result = match checked {
            Ok(_) => self.journal.post(&mut tx, entry_id).await,
            Err(e) => Err(e),
        };
        let entry = commit_or_rollback(tx, result).await?;
        info!(entry = %entry.id, total = %entry.total_debit, "journal entry posted");
        Ok(entry)
    }

    /// Store and post a manual entry
    #[instrument(skip(self, entry), fields(date = %entry.date), err)]
    pub async fn record_journal_entry(&self, entry: NewEntry) -> LedgerResult<JournalEntry> {
        require_manual_source(&entry)?;
        let mut tx = self.store.begin().await?;
        let result = self.journal.record(&mut tx, entry).await;
        let entry = commit_or_rollback(tx, result).await?;
        info!(entry = %entry.id, total = %entry.total_debit, "journal entry posted");
        Ok(entry)
    }

    /// Replace the lines of a manual entry
    #[instrument(skip(self, lines), err)]
    pub async fn edit_journal_entry(
        &self,
        entry_id: Uuid,
        lines: Vec<LineDraft>,
    ) -> LedgerResult<JournalEntry> {
        let mut tx = self.store.begin().await?;
        let checked = self.manual_entry(&tx, entry_id).await;
        let result = match checked {
            Ok(_) => self.journal.edit(&mut tx, entry_id, lines).await,
            Err(e) => Err(e),
        };
        let entry = commit_or_rollback(tx, result).await?;
        info!(entry = %entry.id, total = %entry.total_debit, "journal entry edited");
        Ok(entry)
    }

    /// Void a manual entry
    #[instrument(skip(self), err)]
    pub async fn void_journal_entry(&self, entry_id: Uuid) -> LedgerResult<JournalEntry> {
        let mut tx = self.store.begin().await?;
        let checked = self.manual_entry(&tx, entry_id).await;
        let result = match checked {
            Ok(_) => self.journal.void(&mut tx, entry_id).await,
            Err(e) => Err(e),
        };
        let entry = commit_or_rollback(tx, result).await?;
        info!(entry = %entry.id, "journal entry voided");
        Ok(entry)
    }

    /// Delete a manual draft. Posted entries are voided, not deleted.
    #[instrument(skip(self), err)]
    pub async fn delete_journal_draft(&self, entry_id: Uuid) -> LedgerResult<()> {
        let mut tx = self.store.begin().await?;
        let checked = self.manual_entry(&tx, entry_id).await;
        let result = match checked {
            Ok(entry) if entry.status != JournalStatus::Draft => Err(LedgerError::Validation(
                format!("Journal entry {} is not a draft", entry_id),
            )),
            Ok(_) => self.journal.delete(&mut tx, entry_id).await.map(|_| ()),
            Err(e) => Err(e),
        };
        commit_or_rollback(tx, result).await?;
        info!(entry = %entry_id, "journal draft deleted");
        Ok(())
    }

    pub async fn get_journal_entry(&self, entry_id: Uuid) -> LedgerResult<JournalEntry> {
        let tx = self.store.begin().await?;
        let result = self.journal.load(&tx, entry_id).await;
        read_only(tx, result).await
    }

    /// Entries dated within the inclusive range, ordered by (date, sequence)
    pub async fn journal_entries(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<JournalEntry>> {
        let tx = self.store.begin().await?;
        let result = tx.list_journal_entries(start_date, end_date).await;
        read_only(tx, result).await
    }

    /// Posted lines of one account within an inclusive date range
    pub async fn account_ledger(
        &self,
        account: impl Into<AccountRef>,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<LedgerLine>> {
        let account = account.into();
        let tx = self.store.begin().await?;
        let result = self.journal.ledger(&tx, &account, start_date, end_date).await;
        read_only(tx, result).await
    }

    async fn manual_entry(&self, tx: &S::Tx, entry_id: Uuid) -> LedgerResult<JournalEntry> {
        let entry = self.journal.load(tx, entry_id).await?;
        if !entry.source.is_manual() {
            warn!(
                entry = %entry.id,
                owner = %entry.source,
                "manual change to document entry refused"
            );
            return Err(LedgerError::DocumentOwned {
                entry: entry.id,
                owner: entry.source,
            });
        }
        Ok(entry)
    }

    // Inventory operations

    #[instrument(skip(self), err)]
    pub async fn create_item(&self, code: &str, name: &str) -> LedgerResult<InventoryItem> {
        let mut tx = self.store.begin().await?;
        let result = self.inventory.create_item(&mut tx, code, name).await;
        let item = commit_or_rollback(tx, result).await?;
        info!(item = %item.id, code = %item.code, "inventory item created");
        Ok(item)
    }

    pub async fn get_item(&self, item_id: Uuid) -> LedgerResult<InventoryItem> {
        let tx = self.store.begin().await?;
        let result = self.inventory.item(&tx, item_id).await;
        read_only(tx, result).await
    }

    /// All layers of an item, oldest first, including exhausted ones
    pub async fn item_layers(&self, item_id: Uuid) -> LedgerResult<Vec<InventoryLayer>> {
        let tx = self.store.begin().await?;
        let checked = self.inventory.item(&tx, item_id).await;
        let result = match checked {
            Ok(_) => tx.layers_for_item(item_id).await,
            Err(e) => Err(e),
        };
        read_only(tx, result).await
    }

    pub async fn item_transactions(
        &self,
        item_id: Uuid,
    ) -> LedgerResult<Vec<InventoryTransaction>> {
        let tx = self.store.begin().await?;
        let result = tx.inventory_transactions_for_item(item_id).await;
        read_only(tx, result).await
    }

    /// Remaining stock of an item valued at its layer costs
    pub async fn item_valuation(&self, item_id: Uuid) -> LedgerResult<BigDecimal> {
        let tx = self.store.begin().await?;
        let result = self.inventory.valuation(&tx, item_id).await;
        read_only(tx, result).await
    }

    /// Move stock between items at the weighted-average cost of the layers
    /// drawn. No journal entry is posted.
    #[instrument(skip(self, quantity), fields(quantity = %quantity), err)]
    pub async fn transfer_stock(
        &self,
        source_item: Uuid,
        target_item: Uuid,
        quantity: &BigDecimal,
        date: NaiveDate,
    ) -> LedgerResult<StockTransfer> {
        let mut tx = self.store.begin().await?;
        let result = self
            .inventory
            .transfer_stock(&mut tx, source_item, target_item, quantity, date)
            .await;
        let transfer = commit_or_rollback(tx, result).await?;
        info!(
            transfer = %transfer.id,
            unit_cost = %transfer.unit_cost,
            cost = %transfer.outbound.total_cost,
            "stock transferred"
        );
        Ok(transfer)
    }

    /// Undo a stock transfer while nothing has drawn from its target layer
    #[instrument(skip(self), err)]
    pub async fn reverse_transfer(&self, transfer_id: Uuid) -> LedgerResult<()> {
        let mut tx = self.store.begin().await?;
        let result = self.inventory.reverse_transfer(&mut tx, transfer_id).await;
        commit_or_rollback(tx, result).await?;
        info!(transfer = %transfer_id, "stock transfer reversed");
        Ok(())
    }

    #[instrument(skip(self), err)]
    pub async fn deactivate_item(&self, item_id: Uuid) -> LedgerResult<InventoryItem> {
        let mut tx = self.store.begin().await?;
        let result = self.inventory.deactivate_item(&mut tx, item_id).await;
        let item = commit_or_rollback(tx, result).await?;
        info!(item = %item.code, "item deactivated");
        Ok(item)
    }

    // Treasury operations

    /// Open a cash or bank register posting to a non-group asset account
    #[instrument(skip(self), err)]
    pub async fn open_register(
        &self,
        name: &str,
        kind: RegisterKind,
        account: AccountRef,
    ) -> LedgerResult<CashRegister> {
        let mut tx = self.store.begin().await?;
        let checked = self.accounts.resolve(&tx, &account).await;
        let result = match checked {
            Ok(account) => treasury::open_register(&mut tx, name, kind, account.id).await,
            Err(e) => Err(e),
        };
        let register = commit_or_rollback(tx, result).await?;
        info!(register = %register.id, name = %register.name, "register opened");
        Ok(register)
    }

    pub async fn get_register(&self, register_id: Uuid) -> LedgerResult<CashRegister> {
        let tx = self.store.begin().await?;
        let result = treasury::load_register(&tx, register_id).await;
        read_only(tx, result).await
    }

    pub async fn list_registers(&self) -> LedgerResult<Vec<CashRegister>> {
        let tx = self.store.begin().await?;
        let result = tx.list_registers().await;
        read_only(tx, result).await
    }

    pub async fn register_transactions(
        &self,
        register_id: Uuid,
    ) -> LedgerResult<Vec<TreasuryTransaction>> {
        let tx = self.store.begin().await?;
        let checked = treasury::load_register(&tx, register_id).await;
        let result = match checked {
            Ok(_) => tx.treasury_transactions_for_register(register_id).await,
            Err(e) => Err(e),
        };
        read_only(tx, result).await
    }

    // Document operations

    /// Create a document with its journal entry and stock or treasury
    /// movements, all or nothing
    #[instrument(
        skip(self, input),
        fields(kind = input.body.kind().as_str(), date = %input.date),
        err
    )]
    pub async fn create_document(&self, input: DocumentInput) -> LedgerResult<Document> {
        let mut tx = self.store.begin().await?;
        let result = self.documents.create(&mut tx, input).await;
        let document = commit_or_rollback(tx, result).await?;
        info!(
            document = %document.id,
            number = %document.number,
            entry = ?document.journal_entry_id,
            "document created"
        );
        Ok(document)
    }

    /// Replace a document and every effect it had, all or nothing
    #[instrument(skip(self, input), fields(kind = input.body.kind().as_str()), err)]
    pub async fn update_document(
        &self,
        document_id: Uuid,
        input: DocumentInput,
    ) -> LedgerResult<Document> {
        let mut tx = self.store.begin().await?;
        let result = self.documents.update(&mut tx, document_id, input).await;
        let document = commit_or_rollback(tx, result).await?;
        info!(
            document = %document.id,
            number = %document.number,
            entry = ?document.journal_entry_id,
            "document updated"
        );
        Ok(document)
    }

    /// Delete a document after unwinding its effects
    #[instrument(skip(self), err)]
    pub async fn delete_document(&self, document_id: Uuid) -> LedgerResult<Document> {
        let mut tx = self.store.begin().await?;
        let result = self.documents.delete(&mut tx, document_id).await;
        let document = commit_or_rollback(tx, result).await?;
        info!(document = %document.id, number = %document.number, "document deleted");
        Ok(document)
    }

    pub async fn get_document(&self, document_id: Uuid) -> LedgerResult<Document> {
        let tx = self.store.begin().await?;
        let result = self.documents.get(&tx, document_id).await;
        read_only(tx, result).await
    }

    // Reconciliation and audit

    pub async fn reconcile_register(
        &self,
        register_id: Uuid,
    ) -> LedgerResult<RegisterReconciliation> {
        let tx = self.store.begin().await?;
        let result = self.reconciler.reconcile(&tx, register_id).await;
        read_only(tx, result).await
    }

    pub async fn reconcile_all_registers(&self) -> LedgerResult<Vec<RegisterReconciliation>> {
        let tx = self.store.begin().await?;
        let result = self.reconciler.reconcile_all(&tx).await;
        read_only(tx, result).await
    }

    /// Compare every stored leaf balance with its posted history
    pub async fn audit_account_balances(&self) -> LedgerResult<Vec<AccountDiscrepancy>> {
        let tx = self.store.begin().await?;
        let result = self.reconciler.audit_account_balances(&tx).await;
        read_only(tx, result).await
    }

    /// Validate the integrity of the ledger
    pub async fn validate_integrity(&self) -> LedgerResult<LedgerIntegrityReport> {
        let tx = self.store.begin().await?;
        let result = self.reconciler.validate_integrity(&tx).await;
        read_only(tx, result).await
    }
}

fn require_manual_source(entry: &NewEntry) -> LedgerResult<()> {
    if entry.source.is_manual() {
        Ok(())
    } else {
        Err(LedgerError::Validation(format!(
            "Entries for {} are created through their source, not by hand",
            entry.source
        )))
    }
}

/// Commit on success, roll back on failure, and hand back the result
async fn commit_or_rollback<Tx: LedgerTx, V>(tx: Tx, result: LedgerResult<V>) -> LedgerResult<V> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback_error) = tx.rollback().await {
                warn!(error = %rollback_error, "rollback failed");
            }
            Err(error)
        }
    }
}

/// Close a read-only unit without publishing anything
async fn read_only<Tx: LedgerTx, V>(tx: Tx, result: LedgerResult<V>) -> LedgerResult<V> {
    tx.rollback().await?;
    result
}
