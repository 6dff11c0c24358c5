//! Business documents and their binding to the ledger

pub mod binder;
pub mod recipes;

pub use binder::*;

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{AccountRef, DocumentKind, SourceRef};

/// A stored business document.
///
/// Owns at most one journal entry, found through `journal_entry_id` or the
/// `(kind, id)` source reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    /// `PREFIX-YEAR-SEQUENCE`
    pub number: String,
    pub date: NaiveDate,
    pub description: String,
    pub body: DocumentBody,
    pub journal_entry_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Document {
    pub fn kind(&self) -> DocumentKind {
        self.body.kind()
    }

    pub fn source(&self) -> SourceRef {
        SourceRef::document(self.kind(), self.id)
    }
}

/// Caller-supplied fields for creating or replacing a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInput {
    pub date: NaiveDate,
    pub description: String,
    pub body: DocumentBody,
}

impl DocumentInput {
    pub fn new(date: NaiveDate, description: impl Into<String>, body: DocumentBody) -> Self {
        Self {
            date,
            description: description.into(),
            body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocumentBody {
    SalesInvoice(SalesInvoice),
    PurchaseInvoice(PurchaseInvoice),
    Receipt(Receipt),
    Payment(Payment),
    PayrollSlip(PayrollSlip),
    Depreciation(Depreciation),
    Disposal(Disposal),
}

impl DocumentBody {
    pub fn kind(&self) -> DocumentKind {
        match self {
            DocumentBody::SalesInvoice(_) => DocumentKind::SalesInvoice,
            DocumentBody::PurchaseInvoice(_) => DocumentKind::PurchaseInvoice,
            DocumentBody::Receipt(_) => DocumentKind::Receipt,
            DocumentBody::Payment(_) => DocumentKind::Payment,
            DocumentBody::PayrollSlip(_) => DocumentKind::PayrollSlip,
            DocumentBody::Depreciation(_) => DocumentKind::Depreciation,
            DocumentBody::Disposal(_) => DocumentKind::Disposal,
        }
    }
}

/// Sale to a customer on account.
///
/// Lines with an `item_id` consume stock; their FIFO cost is posted to
/// `cogs_account` against `inventory_account`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesInvoice {
    pub customer_account: AccountRef,
    pub revenue_account: AccountRef,
    pub cogs_account: Option<AccountRef>,
    pub inventory_account: Option<AccountRef>,
    pub lines: Vec<SalesLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesLine {
    pub description: String,
    pub item_id: Option<Uuid>,
    pub quantity: BigDecimal,
    pub unit_price: BigDecimal,
}

/// Stock bought from a supplier on account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseInvoice {
    pub supplier_account: AccountRef,
    pub inventory_account: AccountRef,
    pub lines: Vec<PurchaseLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub item_id: Uuid,
    pub quantity: BigDecimal,
    pub unit_cost: BigDecimal,
}

/// Money received into a register from a customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub register_id: Uuid,
    pub customer_account: AccountRef,
    pub amount: BigDecimal,
}

/// Money paid out of a register
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub register_id: Uuid,
    pub payee_account: AccountRef,
    pub amount: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayrollSlip {
    pub employee: String,
    pub expense_account: AccountRef,
    /// Receives the net pay
    pub payable_account: AccountRef,
    pub gross: BigDecimal,
    pub deductions: Vec<PayrollDeduction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayrollDeduction {
    pub label: String,
    pub account: AccountRef,
    pub amount: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Depreciation {
    pub asset: String,
    pub expense_account: AccountRef,
    pub accumulated_account: AccountRef,
    pub amount: BigDecimal,
}

/// Retirement of a fixed asset, with or without sale proceeds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disposal {
    pub asset: String,
    pub asset_account: AccountRef,
    pub accumulated_account: AccountRef,
    pub proceeds_account: AccountRef,
    pub gain_loss_account: AccountRef,
    pub cost: BigDecimal,
    pub accumulated_depreciation: BigDecimal,
    pub proceeds: BigDecimal,
}
