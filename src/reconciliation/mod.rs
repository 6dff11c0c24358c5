//! Read-only audits: treasury registers, stored account balances and the
//! trial balance
//!
//! Nothing here corrects data. Discrepancies are reported and logged; fixes
//! go through the journal as explicit manual entries.

use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

use crate::config::{Precision, ReconciliationConfig};
use crate::traits::*;
use crate::treasury;
use crate::types::*;

/// Stored vs. recomputed balance of one cash or bank register
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterReconciliation {
    pub register_id: Uuid,
    pub register_name: String,
    pub stored_balance: BigDecimal,
    pub recomputed_balance: BigDecimal,
    /// stored - recomputed
    pub difference: BigDecimal,
    pub is_reconciled: bool,
}

/// Leaf account whose stored balance disagrees with its posted history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountDiscrepancy {
    pub account_id: Uuid,
    pub code: String,
    pub stored_balance: BigDecimal,
    pub recomputed_balance: BigDecimal,
}

/// Report on ledger integrity and validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerIntegrityReport {
    pub generated_at: NaiveDateTime,
    pub is_valid: bool,
    pub issues: Vec<String>,
    /// Sum of stored balances of debit-normal leaves
    pub total_debit_balances: BigDecimal,
    /// Sum of stored balances of credit-normal leaves
    pub total_credit_balances: BigDecimal,
    pub registers: Vec<RegisterReconciliation>,
    pub account_discrepancies: Vec<AccountDiscrepancy>,
}

#[derive(Debug, Clone)]
pub struct TreasuryReconciler {
    epsilon: BigDecimal,
    precision: Precision,
}

impl TreasuryReconciler {
    pub fn new(config: &ReconciliationConfig, precision: Precision) -> Self {
        Self {
            epsilon: config.epsilon.clone(),
            precision,
        }
    }

    /// Recompute a register from its movements and compare with the stored
    /// balance. Differences above the tolerance are logged, never corrected.
    pub async fn reconcile<T: LedgerTx + ?Sized>(
        &self,
        tx: &T,
        register_id: Uuid,
    ) -> LedgerResult<RegisterReconciliation> {
        let register = treasury::load_register(tx, register_id).await?;
        let recomputed: BigDecimal = tx
            .treasury_transactions_for_register(register_id)
            .await?
            .iter()
            .map(|t| t.signed_amount())
            .sum();
        let recomputed = self.precision.money(&recomputed);
        let difference = &register.balance - &recomputed;
        let is_reconciled = difference.abs() <= self.epsilon;

        if !is_reconciled {
            warn!(
                register = %register.id,
                name = %register.name,
                stored = %register.balance,
                recomputed = %recomputed,
                difference = %difference,
                "register balance does not match its transactions"
            );
        }

        Ok(RegisterReconciliation {
            register_id: register.id,
            register_name: register.name,
            stored_balance: register.balance,
            recomputed_balance: recomputed,
            difference,
            is_reconciled,
        })
    }

    pub async fn reconcile_all<T: LedgerTx + ?Sized>(
        &self,
        tx: &T,
    ) -> LedgerResult<Vec<RegisterReconciliation>> {
        let mut results = Vec::new();
        for register in tx.list_registers().await? {
            results.push(self.reconcile(tx, register.id).await?);
        }
        Ok(results)
    }

    /// Recompute every leaf account from posted journal lines and report
    /// the ones whose stored balance differs
    pub async fn audit_account_balances<T: LedgerTx + ?Sized>(
        &self,
        tx: &T,
    ) -> LedgerResult<Vec<AccountDiscrepancy>> {
        let accounts = tx.list_accounts().await?;
        let categories: HashMap<Uuid, AccountCategory> =
            accounts.iter().map(|a| (a.id, a.category)).collect();

        let mut recomputed: HashMap<Uuid, BigDecimal> = HashMap::new();
        for entry in tx.list_journal_entries(None, None).await? {
            if entry.status != JournalStatus::Posted {
                continue;
            }
            for line in &entry.lines {
                let category = categories
                    .get(&line.account_id)
                    .ok_or_else(|| LedgerError::AccountNotFound(line.account_id.to_string()))?;
                *recomputed.entry(line.account_id).or_default() +=
                    category.delta(&line.debit, &line.credit);
            }
        }

        let mut discrepancies = Vec::new();
        for account in accounts.into_iter().filter(|a| !a.is_group) {
            let history = recomputed.remove(&account.id).unwrap_or_default();
            if history != account.balance {
                warn!(
                    account = %account.code,
                    stored = %account.balance,
                    recomputed = %history,
                    "stored balance differs from ledger history"
                );
                discrepancies.push(AccountDiscrepancy {
                    account_id: account.id,
                    code: account.code,
                    stored_balance: account.balance,
                    recomputed_balance: history,
                });
            }
        }
        Ok(discrepancies)
    }

    /// Trial balance, per-entry balance, account history and register checks
    pub async fn validate_integrity<T: LedgerTx + ?Sized>(
        &self,
        tx: &T,
    ) -> LedgerResult<LedgerIntegrityReport> {
        let mut issues = Vec::new();

        let mut total_debit_balances = BigDecimal::from(0);
        let mut total_credit_balances = BigDecimal::from(0);
        for account in tx.list_accounts().await?.iter().filter(|a| !a.is_group) {
            match account.category.normal_balance() {
                EntryType::Debit => total_debit_balances += &account.balance,
                EntryType::Credit => total_credit_balances += &account.balance,
            }
        }
        if total_debit_balances != total_credit_balances {
            issues.push(format!(
                "Trial balance is not balanced: debits = {}, credits = {}",
                total_debit_balances, total_credit_balances
            ));
        }

        for entry in tx.list_journal_entries(None, None).await? {
            if entry.status == JournalStatus::Posted && !entry.is_balanced() {
                issues.push(format!(
                    "Journal entry {} is not balanced: debits = {}, credits = {}",
                    entry.id,
                    entry.total_debits(),
                    entry.total_credits()
                ));
            }
        }

        let account_discrepancies = self.audit_account_balances(tx).await?;
        for discrepancy in &account_discrepancies {
            issues.push(format!(
                "Account {} stores {} but its history sums to {}",
                discrepancy.code, discrepancy.stored_balance, discrepancy.recomputed_balance
            ));
        }

        let registers = self.reconcile_all(tx).await?;
        for register in registers.iter().filter(|r| !r.is_reconciled) {
            issues.push(format!(
                "Register {} is off by {}",
                register.register_name, register.difference
            ));
        }

        Ok(LedgerIntegrityReport {
            generated_at: chrono::Utc::now().naive_utc(),
            is_valid: issues.is_empty(),
            issues,
            total_debit_balances,
            total_credit_balances,
            registers,
            account_discrepancies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::treasury::{RegisterKind, TreasuryKind};
    use crate::utils::memory_storage::MemoryStore;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
    }

    fn reconciler() -> TreasuryReconciler {
        TreasuryReconciler::new(&ReconciliationConfig::default(), Precision::default())
    }

    #[tokio::test]
    async fn test_register_reconciles_within_epsilon() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let cash = Account::new("1100", "Cash", AccountCategory::Asset, None);
        tx.insert_account(&cash).await.unwrap();
        let till = treasury::open_register(&mut tx, "Till", RegisterKind::Cash, cash.id)
            .await
            .unwrap();

        let manual = SourceRef::manual();
        treasury::record(&mut tx, till.id, TreasuryKind::Deposit, &dec("100"), manual, day())
            .await
            .unwrap();
        treasury::record(&mut tx, till.id, TreasuryKind::Withdrawal, &dec("30.5"), manual, day())
            .await
            .unwrap();

        let result = reconciler().reconcile(&tx, till.id).await.unwrap();
        assert!(result.is_reconciled);
        assert_eq!(result.recomputed_balance, dec("69.5"));

        // a drift of exactly one cent is tolerated, more is not
        let mut drifted = treasury::load_register(&tx, till.id).await.unwrap();
        drifted.balance = dec("69.51");
        tx.update_register(&drifted).await.unwrap();
        assert!(reconciler().reconcile(&tx, till.id).await.unwrap().is_reconciled);

        drifted.balance = dec("70");
        tx.update_register(&drifted).await.unwrap();
        let result = reconciler().reconcile(&tx, till.id).await.unwrap();
        assert!(!result.is_reconciled);
        assert_eq!(result.difference, dec("0.5"));

        // reporting does not correct
        assert_eq!(
            treasury::load_register(&tx, till.id).await.unwrap().balance,
            dec("70")
        );
    }

    #[tokio::test]
    async fn test_audit_finds_tampered_balance() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let mut rent = Account::new("5400", "Rent", AccountCategory::Expense, None);
        rent.balance = dec("10");
        tx.insert_account(&rent).await.unwrap();

        let discrepancies = reconciler().audit_account_balances(&tx).await.unwrap();
        assert_eq!(discrepancies.len(), 1);
        assert_eq!(discrepancies[0].recomputed_balance, dec("0"));

        let report = reconciler().validate_integrity(&tx).await.unwrap();
        assert!(!report.is_valid);
        assert_eq!(report.total_debit_balances, dec("10"));
        assert_eq!(report.issues.len(), 2);
    }
}
