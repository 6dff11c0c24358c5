//! Core types and data structures for the ledger

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Account categories following standard accounting principles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountCategory {
    /// What the business owns (Cash, Inventory, Equipment, etc.)
    Asset,
    /// What the business owes (Loans, Accounts Payable, etc.)
    Liability,
    /// Owner's interest in the business
    Equity,
    /// Money earned by the business
    Revenue,
    /// Costs incurred by the business
    Expense,
}

impl AccountCategory {
    /// Returns the side on which balances of this category increase.
    ///
    /// Assets and Expenses are debit-normal; Liabilities, Equity and Revenue
    /// are credit-normal.
    pub fn normal_balance(&self) -> EntryType {
        match self {
            AccountCategory::Asset | AccountCategory::Expense => EntryType::Debit,
            AccountCategory::Liability | AccountCategory::Equity | AccountCategory::Revenue => {
                EntryType::Credit
            }
        }
    }

    /// Signed effect of a (debit, credit) pair on a balance of this category
    pub fn delta(&self, debit: &BigDecimal, credit: &BigDecimal) -> BigDecimal {
        match self.normal_balance() {
            EntryType::Debit => debit - credit,
            EntryType::Credit => credit - debit,
        }
    }
}

/// Sides of a double-entry posting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryType {
    Debit,
    Credit,
}

/// Chart of accounts node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    /// Hierarchical code, e.g. `1000` for a header and `1100` below it
    pub code: String,
    pub name: String,
    pub category: AccountCategory,
    pub parent_id: Option<Uuid>,
    /// Group accounts aggregate their descendants and never take postings
    pub is_group: bool,
    pub active: bool,
    /// Stored running balance, in the category's normal-balance sense.
    /// Only meaningful for non-group accounts.
    pub balance: BigDecimal,
    pub metadata: HashMap<String, String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Account {
    /// Create a new postable (leaf) account
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        category: AccountCategory,
        parent_id: Option<Uuid>,
    ) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            name: name.into(),
            category,
            parent_id,
            is_group: false,
            active: true,
            balance: BigDecimal::from(0),
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a new group (header) account
    pub fn group(
        code: impl Into<String>,
        name: impl Into<String>,
        category: AccountCategory,
        parent_id: Option<Uuid>,
    ) -> Self {
        Self {
            is_group: true,
            ..Self::new(code, name, category, parent_id)
        }
    }

    /// Apply a debit/credit movement to the stored balance and return the delta.
    ///
    /// Reversal is the same call with negated amounts.
    pub fn apply_movement(&mut self, debit: &BigDecimal, credit: &BigDecimal) -> BigDecimal {
        let delta = self.category.delta(debit, credit);
        self.balance += &delta;
        self.updated_at = chrono::Utc::now().naive_utc();
        delta
    }
}

/// Reference to an account either by id or by chart code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountRef {
    Id(Uuid),
    Code(String),
}

impl From<Uuid> for AccountRef {
    fn from(id: Uuid) -> Self {
        AccountRef::Id(id)
    }
}

impl From<&str> for AccountRef {
    fn from(value: &str) -> Self {
        match Uuid::parse_str(value) {
            Ok(id) => AccountRef::Id(id),
            Err(_) => AccountRef::Code(value.to_string()),
        }
    }
}

impl From<String> for AccountRef {
    fn from(value: String) -> Self {
        AccountRef::from(value.as_str())
    }
}

impl From<&Account> for AccountRef {
    fn from(account: &Account) -> Self {
        AccountRef::Id(account.id)
    }
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountRef::Id(id) => write!(f, "{}", id),
            AccountRef::Code(code) => write!(f, "{}", code),
        }
    }
}

/// Business document families that own a journal entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    SalesInvoice,
    PurchaseInvoice,
    Receipt,
    Payment,
    PayrollSlip,
    Depreciation,
    Disposal,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::SalesInvoice => "sales_invoice",
            DocumentKind::PurchaseInvoice => "purchase_invoice",
            DocumentKind::Receipt => "receipt",
            DocumentKind::Payment => "payment",
            DocumentKind::PayrollSlip => "payroll_slip",
            DocumentKind::Depreciation => "depreciation",
            DocumentKind::Disposal => "disposal",
        }
    }
}

/// What produced a ledger or stock movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Manual,
    Document(DocumentKind),
    StockTransfer,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceType::Manual => f.write_str("manual"),
            SourceType::Document(kind) => f.write_str(kind.as_str()),
            SourceType::StockTransfer => f.write_str("stock_transfer"),
        }
    }
}

/// `(source_type, source_id)` pair identifying the owner of a movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub source_type: SourceType,
    pub source_id: Option<Uuid>,
}

impl SourceRef {
    pub fn manual() -> Self {
        Self {
            source_type: SourceType::Manual,
            source_id: None,
        }
    }

    pub fn document(kind: DocumentKind, id: Uuid) -> Self {
        Self {
            source_type: SourceType::Document(kind),
            source_id: Some(id),
        }
    }

    pub fn transfer(id: Uuid) -> Self {
        Self {
            source_type: SourceType::StockTransfer,
            source_id: Some(id),
        }
    }

    pub fn is_manual(&self) -> bool {
        self.source_type == SourceType::Manual
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source_id {
            Some(id) => write!(f, "{}:{}", self.source_type, id),
            None => write!(f, "{}", self.source_type),
        }
    }
}

/// Journal entry lifecycle: draft -> posted -> void
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalStatus {
    Draft,
    Posted,
    Void,
}

/// Unresolved journal line as supplied by callers and document recipes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineDraft {
    pub account: AccountRef,
    pub debit: BigDecimal,
    pub credit: BigDecimal,
    pub memo: Option<String>,
}

impl LineDraft {
    pub fn debit(account: impl Into<AccountRef>, amount: BigDecimal, memo: Option<String>) -> Self {
        Self {
            account: account.into(),
            debit: amount,
            credit: BigDecimal::from(0),
            memo,
        }
    }

    pub fn credit(
        account: impl Into<AccountRef>,
        amount: BigDecimal,
        memo: Option<String>,
    ) -> Self {
        Self {
            account: account.into(),
            debit: BigDecimal::from(0),
            credit: amount,
            memo,
        }
    }
}

/// Posted or draft journal line, bound to a resolved account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalLine {
    pub id: Uuid,
    pub account_id: Uuid,
    pub debit: BigDecimal,
    pub credit: BigDecimal,
    pub memo: Option<String>,
}

/// Header plus lines of one balanced ledger effect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: Uuid,
    /// Monotonic creation order, used to order lines within a date
    pub sequence: u64,
    pub date: NaiveDate,
    pub description: String,
    pub source: SourceRef,
    pub status: JournalStatus,
    pub lines: Vec<JournalLine>,
    pub total_debit: BigDecimal,
    pub total_credit: BigDecimal,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl JournalEntry {
    pub fn total_debits(&self) -> BigDecimal {
        self.lines.iter().map(|l| &l.debit).sum()
    }

    pub fn total_credits(&self) -> BigDecimal {
        self.lines.iter().map(|l| &l.credit).sum()
    }

    pub fn is_balanced(&self) -> bool {
        self.total_debits() == self.total_credits()
    }
}

/// One line of an account ledger report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerLine {
    pub entry_id: Uuid,
    pub sequence: u64,
    pub date: NaiveDate,
    pub description: String,
    pub source: SourceRef,
    pub debit: BigDecimal,
    pub credit: BigDecimal,
    pub memo: Option<String>,
}

/// Errors that can occur in the ledger system
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Unbalanced entry: debits = {debit}, credits = {credit}")]
    UnbalancedEntry {
        debit: BigDecimal,
        credit: BigDecimal,
    },
    #[error("Account not found: {0}")]
    AccountNotFound(String),
    #[error("Journal entry not found: {0}")]
    EntryNotFound(Uuid),
    #[error("Inventory item not found: {0}")]
    ItemNotFound(String),
    #[error("Document not found: {0}")]
    DocumentNotFound(Uuid),
    #[error("Cash register not found: {0}")]
    RegisterNotFound(Uuid),
    #[error("Invalid account type: {0}")]
    InvalidAccountType(String),
    #[error("Insufficient stock for item {item}: requested {requested}, available {available}")]
    InsufficientStock {
        item: String,
        requested: BigDecimal,
        available: BigDecimal,
    },
    #[error("Dependency exists: {0}")]
    DependencyExists(String),
    #[error("Journal entry already voided or deleted: {0}")]
    AlreadyVoided(Uuid),
    #[error("Journal entry {entry} is owned by {owner} and can only change through its document")]
    DocumentOwned { entry: Uuid, owner: SourceRef },
    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LedgerError::AccountNotFound(_)
                | LedgerError::EntryNotFound(_)
                | LedgerError::ItemNotFound(_)
                | LedgerError::DocumentNotFound(_)
                | LedgerError::RegisterNotFound(_)
        )
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_sign_rule() {
        let hundred = BigDecimal::from(100);
        let zero = BigDecimal::from(0);

        assert_eq!(AccountCategory::Asset.delta(&hundred, &zero), hundred);
        assert_eq!(AccountCategory::Expense.delta(&hundred, &zero), hundred);
        assert_eq!(
            AccountCategory::Revenue.delta(&hundred, &zero),
            BigDecimal::from(-100)
        );
        assert_eq!(AccountCategory::Liability.delta(&zero, &hundred), hundred);
    }

    #[test]
    fn test_apply_movement_and_reverse() {
        let mut payable = Account::new("2100", "Payables", AccountCategory::Liability, None);
        payable.apply_movement(&BigDecimal::from(0), &BigDecimal::from(250));
        assert_eq!(payable.balance, BigDecimal::from(250));

        payable.apply_movement(&BigDecimal::from(0), &BigDecimal::from(-250));
        assert_eq!(payable.balance, BigDecimal::from(0));
    }

    #[test]
    fn test_account_ref_parsing() {
        let id = Uuid::new_v4();
        assert_eq!(AccountRef::from(id.to_string()), AccountRef::Id(id));
        assert_eq!(AccountRef::from("1100"), AccountRef::Code("1100".to_string()));
    }

    #[test]
    fn test_source_ref_display() {
        assert_eq!(SourceRef::manual().to_string(), "manual");
        let id = Uuid::nil();
        assert_eq!(
            SourceRef::document(DocumentKind::SalesInvoice, id).to_string(),
            format!("sales_invoice:{}", id)
        );
    }
}
