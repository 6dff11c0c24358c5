//! Binding of business documents to their journal entry, stock movements
//! and treasury movements

use bigdecimal::BigDecimal;
use chrono::Datelike;
use tracing::debug;
use uuid::Uuid;

use super::recipes;
use super::*;
use crate::config::{NumberingConfig, Precision};
use crate::inventory::cost::describe_consumers;
use crate::inventory::InventoryCostEngine;
use crate::ledger::{JournalEngine, NewEntry};
use crate::traits::*;
use crate::treasury::{self, TreasuryKind};
use crate::types::*;

/// Document binder.
///
/// Each document owns exactly one journal entry, found by its source
/// reference. Create, update and delete run inside the caller's unit of
/// work; any error leaves the unit to be rolled back as a whole.
#[derive(Debug, Clone)]
pub struct DocumentBinder {
    numbering: NumberingConfig,
    precision: Precision,
    journal: JournalEngine,
    inventory: InventoryCostEngine,
}

impl DocumentBinder {
    pub fn new(
        numbering: NumberingConfig,
        precision: Precision,
        journal: JournalEngine,
        inventory: InventoryCostEngine,
    ) -> Self {
        Self {
            numbering,
            precision,
            journal,
            inventory,
        }
    }

    /// Number, store and post a new document
    pub async fn create<T: LedgerTx + ?Sized>(
        &self,
        tx: &mut T,
        input: DocumentInput,
    ) -> LedgerResult<Document> {
        let kind = input.body.kind();
        let year = input.date.year();
        let prefix = self.numbering.prefix(kind);
        let sequence = tx
            .next_sequence(&format!("doc:{}-{}", prefix, year))
            .await?;

        let now = chrono::Utc::now().naive_utc();
        let mut document = Document {
            id: Uuid::new_v4(),
            number: self.numbering.format(kind, year, sequence),
            date: input.date,
            description: input.description,
            body: input.body,
            journal_entry_id: None,
            created_at: now,
            updated_at: now,
        };
        tx.insert_document(&document).await?;

        let entry = self.apply_effects(tx, &document).await?;
        document.journal_entry_id = entry.as_ref().map(|e| e.id);
        tx.update_document(&document).await?;

        debug!(
            document = %document.id,
            number = %document.number,
            entry = ?document.journal_entry_id,
            "document bound"
        );
        Ok(document)
    }

    /// Replace a document's contents and all of its effects.
    ///
    /// The document keeps its id and number. Its type cannot change.
    pub async fn update<T: LedgerTx + ?Sized>(
        &self,
        tx: &mut T,
        document_id: Uuid,
        input: DocumentInput,
    ) -> LedgerResult<Document> {
        let mut document = self.get(tx, document_id).await?;
        if input.body.kind() != document.kind() {
            return Err(LedgerError::Validation(format!(
                "Document {} is a {} and cannot become a {}",
                document.number,
                document.kind().as_str(),
                input.body.kind().as_str()
            )));
        }

        self.check_dependents(tx, &document).await?;
        self.unwind_effects(tx, &document).await?;

        document.date = input.date;
        document.description = input.description;
        document.body = input.body;
        let entry = self.apply_effects(tx, &document).await?;
        document.journal_entry_id = entry.as_ref().map(|e| e.id);
        document.updated_at = chrono::Utc::now().naive_utc();
        tx.update_document(&document).await?;

        debug!(document = %document.id, entry = ?document.journal_entry_id, "document rebound");
        Ok(document)
    }

    /// Unwind every effect of a document and remove it.
    ///
    /// Order: journal entry, stock movements (newest first), treasury
    /// movements, then the document row.
    pub async fn delete<T: LedgerTx + ?Sized>(
        &self,
        tx: &mut T,
        document_id: Uuid,
    ) -> LedgerResult<Document> {
        let document = self.get(tx, document_id).await?;
        self.check_dependents(tx, &document).await?;
        self.unwind_effects(tx, &document).await?;
        tx.delete_document(document.id).await?;

        debug!(document = %document.id, number = %document.number, "document deleted");
        Ok(document)
    }

    pub async fn get<T: LedgerTx + ?Sized>(
        &self,
        tx: &T,
        document_id: Uuid,
    ) -> LedgerResult<Document> {
        tx.get_document(document_id)
            .await?
            .ok_or(LedgerError::DocumentNotFound(document_id))
    }

    /// Fail with `DependencyExists` if stock this document received has since
    /// been drawn by someone else
    async fn check_dependents<T: LedgerTx + ?Sized>(
        &self,
        tx: &T,
        document: &Document,
    ) -> LedgerResult<()> {
        let source = document.source();
        let mut consumers: Vec<SourceRef> = Vec::new();
        for record in tx.inventory_transactions_for_source(&source).await? {
            let Some(layer_id) = record.layer_id else {
                continue;
            };
            for consumer in self
                .inventory
                .consumers_of(tx, record.item_id, &[layer_id])
                .await?
            {
                if consumer != source && !consumers.contains(&consumer) {
                    consumers.push(consumer);
                }
            }
        }

        if consumers.is_empty() {
            Ok(())
        } else {
            Err(LedgerError::DependencyExists(describe_consumers(
                &source, &consumers,
            )))
        }
    }

    /// Run the document's stock and treasury movements and post its entry.
    ///
    /// A document whose recipe yields no lines posts nothing.
    async fn apply_effects<T: LedgerTx + ?Sized>(
        &self,
        tx: &mut T,
        document: &Document,
    ) -> LedgerResult<Option<JournalEntry>> {
        let source = document.source();
        let date = document.date;

        let lines = match &document.body {
            DocumentBody::SalesInvoice(invoice) => {
                recipes::validate_sales_invoice(invoice)?;
                let mut cost = BigDecimal::from(0);
                for line in &invoice.lines {
                    if let Some(item_id) = line.item_id {
                        let record = self
                            .inventory
                            .consume_stock(tx, item_id, &line.quantity, source, date)
                            .await?;
                        cost += &record.total_cost;
                    }
                }
                recipes::sales_invoice(invoice, &cost, &self.precision)?
            }
            DocumentBody::PurchaseInvoice(invoice) => {
                recipes::validate_purchase_invoice(invoice)?;
                let mut total = BigDecimal::from(0);
                for line in &invoice.lines {
                    let record = self
                        .inventory
                        .receive_stock(
                            tx,
                            line.item_id,
                            &line.quantity,
                            &line.unit_cost,
                            source,
                            date,
                        )
                        .await?;
                    total += &record.total_cost;
                }
                recipes::purchase_invoice(invoice, &total, &self.precision)?
            }
            DocumentBody::Receipt(receipt) => {
                let register = treasury::load_register(tx, receipt.register_id).await?;
                let lines = recipes::receipt(receipt, register.account_id, &self.precision)?;
                let amount = self.precision.money(&receipt.amount);
                treasury::record(tx, register.id, TreasuryKind::Deposit, &amount, source, date)
                    .await?;
                lines
            }
            DocumentBody::Payment(payment) => {
                let register = treasury::load_register(tx, payment.register_id).await?;
                let lines = recipes::payment(payment, register.account_id, &self.precision)?;
                let amount = self.precision.money(&payment.amount);
                treasury::record(tx, register.id, TreasuryKind::Withdrawal, &amount, source, date)
                    .await?;
                lines
            }
            DocumentBody::PayrollSlip(slip) => recipes::payroll_slip(slip, &self.precision)?,
            DocumentBody::Depreciation(entry) => recipes::depreciation(entry, &self.precision)?,
            DocumentBody::Disposal(entry) => recipes::disposal(entry, &self.precision)?,
        };
        if lines.is_empty() {
            return Ok(None);
        }

        let description = if document.description.trim().is_empty() {
            document.number.clone()
        } else {
            format!("{} {}", document.number, document.description)
        };
        self.journal
            .record(
                tx,
                NewEntry {
                    date,
                    description,
                    source,
                    lines,
                },
            )
            .await
            .map(Some)
    }

    async fn unwind_effects<T: LedgerTx + ?Sized>(
        &self,
        tx: &mut T,
        document: &Document,
    ) -> LedgerResult<()> {
        let source = document.source();

        if let Some(entry) = tx.find_journal_entry_by_source(&source).await? {
            self.journal.delete(tx, entry.id).await?;
        }

        let records = tx.inventory_transactions_for_source(&source).await?;
        for record in records.iter().rev() {
            if record.kind.is_inbound() {
                self.inventory.reverse_receipt(tx, record).await?;
            } else {
                self.inventory.reverse_consumption(tx, record).await?;
            }
        }

        treasury::reverse_source(tx, &source).await
    }
}
