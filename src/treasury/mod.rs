//! Cash and bank registers

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::traits::*;
use crate::types::*;
use crate::utils::validation::validate_positive_amount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterKind {
    Cash,
    Bank,
}

/// A till or bank account tracked alongside its ledger account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashRegister {
    pub id: Uuid,
    pub name: String,
    pub kind: RegisterKind,
    /// Non-group asset account the register posts to
    pub account_id: Uuid,
    /// Stored running balance, checked by the reconciler
    pub balance: BigDecimal,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreasuryKind {
    Deposit,
    Withdrawal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreasuryTransaction {
    pub id: Uuid,
    pub register_id: Uuid,
    pub date: NaiveDate,
    pub kind: TreasuryKind,
    /// Always positive; the direction is given by `kind`
    pub amount: BigDecimal,
    pub source: SourceRef,
    pub created_at: NaiveDateTime,
}

impl TreasuryTransaction {
    pub fn signed_amount(&self) -> BigDecimal {
        match self.kind {
            TreasuryKind::Deposit => self.amount.clone(),
            TreasuryKind::Withdrawal => -self.amount.clone(),
        }
    }
}

pub async fn open_register<T: LedgerTx + ?Sized>(
    tx: &mut T,
    name: &str,
    kind: RegisterKind,
    account_id: Uuid,
) -> LedgerResult<CashRegister> {
    if name.trim().is_empty() {
        return Err(LedgerError::validation("Register name cannot be empty"));
    }
    let account = tx
        .get_account(account_id)
        .await?
        .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))?;
    if account.is_group || account.category != AccountCategory::Asset {
        return Err(LedgerError::InvalidAccountType(format!(
            "Register account {} must be a non-group asset account",
            account.code
        )));
    }

    let now = chrono::Utc::now().naive_utc();
    let register = CashRegister {
        id: Uuid::new_v4(),
        name: name.to_string(),
        kind,
        account_id,
        balance: BigDecimal::from(0),
        created_at: now,
        updated_at: now,
    };
    tx.insert_register(&register).await?;
    Ok(register)
}

pub async fn load_register<T: LedgerTx + ?Sized>(
    tx: &T,
    register_id: Uuid,
) -> LedgerResult<CashRegister> {
    tx.get_register(register_id)
        .await?
        .ok_or(LedgerError::RegisterNotFound(register_id))
}

/// Record a movement and apply it to the register's stored balance
pub async fn record<T: LedgerTx + ?Sized>(
    tx: &mut T,
    register_id: Uuid,
    kind: TreasuryKind,
    amount: &BigDecimal,
    source: SourceRef,
    date: NaiveDate,
) -> LedgerResult<TreasuryTransaction> {
    validate_positive_amount(amount)?;
    let mut register = load_register(tx, register_id).await?;
    let now = chrono::Utc::now().naive_utc();
    let transaction = TreasuryTransaction {
        id: Uuid::new_v4(),
        register_id,
        date,
        kind,
        amount: amount.clone(),
        source,
        created_at: now,
    };

    register.balance += transaction.signed_amount();
    register.updated_at = now;
    tx.update_register(&register).await?;
    tx.insert_treasury_transaction(&transaction).await?;
    Ok(transaction)
}

/// Undo every movement recorded for `source`
pub async fn reverse_source<T: LedgerTx + ?Sized>(
    tx: &mut T,
    source: &SourceRef,
) -> LedgerResult<()> {
    for transaction in tx.treasury_transactions_for_source(source).await? {
        let mut register = load_register(tx, transaction.register_id).await?;
        register.balance -= transaction.signed_amount();
        register.updated_at = chrono::Utc::now().naive_utc();
        tx.update_register(&register).await?;
        tx.delete_treasury_transaction(transaction.id).await?;
    }
    Ok(())
}
