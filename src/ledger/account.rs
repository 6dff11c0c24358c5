//! Chart of accounts and stored balances

use bigdecimal::BigDecimal;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::traits::*;
use crate::types::*;

/// Account registry for chart of accounts operations.
///
/// The only code path that changes a stored balance is
/// [`AccountRegistry::apply_movement`], called by the journal engine.
#[derive(Clone)]
pub struct AccountRegistry {
    validator: Arc<dyn AccountValidator>,
}

impl Default for AccountRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AccountRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountRegistry").finish_non_exhaustive()
    }
}

impl AccountRegistry {
    /// Create a registry with the default validator
    pub fn new() -> Self {
        Self {
            validator: Arc::new(DefaultAccountValidator),
        }
    }

    /// Create a registry with a custom validator
    pub fn with_validator(validator: Arc<dyn AccountValidator>) -> Self {
        Self { validator }
    }

    /// Create a new account.
    ///
    /// A parent must be a group account of the same category.
    pub async fn create<T: LedgerTx + ?Sized>(
        &self,
        tx: &mut T,
        code: &str,
        name: &str,
        category: AccountCategory,
        parent: Option<&AccountRef>,
        is_group: bool,
    ) -> LedgerResult<Account> {
        let parent = match parent {
            Some(reference) => Some(self.resolve(tx, reference).await?),
            None => None,
        };

        let parent_id = parent.as_ref().map(|p| p.id);
        let account = if is_group {
            Account::group(code, name, category, parent_id)
        } else {
            Account::new(code, name, category, parent_id)
        };

        self.validator.validate_account(&account)?;

        if tx.find_account_by_code(&account.code).await?.is_some() {
            return Err(LedgerError::Validation(format!(
                "Account with code '{}' already exists",
                account.code
            )));
        }

        if let Some(parent) = parent {
            if !parent.is_group {
                return Err(LedgerError::InvalidAccountType(format!(
                    "Parent account {} is not a group account",
                    parent.code
                )));
            }
            if parent.category != category {
                return Err(LedgerError::InvalidAccountType(format!(
                    "Account {} must share the {:?} category of its parent {}",
                    account.code, parent.category, parent.code
                )));
            }
        }

        tx.insert_account(&account).await?;
        Ok(account)
    }

    /// Look an account up by id or code
    pub async fn resolve<T: LedgerTx + ?Sized>(
        &self,
        tx: &T,
        reference: &AccountRef,
    ) -> LedgerResult<Account> {
        let found = match reference {
            AccountRef::Id(id) => tx.get_account(*id).await?,
            AccountRef::Code(code) => tx.find_account_by_code(code).await?,
        };
        found.ok_or_else(|| LedgerError::AccountNotFound(reference.to_string()))
    }

    /// Resolve an account that may take new postings: a non-group, active leaf
    pub async fn resolve_postable<T: LedgerTx + ?Sized>(
        &self,
        tx: &T,
        reference: &AccountRef,
    ) -> LedgerResult<Account> {
        let account = self.resolve(tx, reference).await?;
        if account.is_group {
            return Err(LedgerError::InvalidAccountType(format!(
                "Group account {} cannot take postings",
                account.code
            )));
        }
        if !account.active {
            return Err(LedgerError::Validation(format!(
                "Account {} is inactive",
                account.code
            )));
        }
        Ok(account)
    }

    pub async fn children<T: LedgerTx + ?Sized>(
        &self,
        tx: &T,
        reference: &AccountRef,
    ) -> LedgerResult<Vec<Account>> {
        let account = self.resolve(tx, reference).await?;
        tx.child_accounts(account.id).await
    }

    /// Balance of an account in its normal-balance sense.
    ///
    /// A leaf returns its stored balance. A group sums its direct leaf
    /// children, or every leaf below it when `recursive` is set. Never cached.
    pub async fn balance<T: LedgerTx + ?Sized>(
        &self,
        tx: &T,
        reference: &AccountRef,
        recursive: bool,
    ) -> LedgerResult<BigDecimal> {
        let account = self.resolve(tx, reference).await?;
        if !account.is_group {
            return Ok(account.balance);
        }

        let mut total = BigDecimal::from(0);
        let mut pending = vec![account.id];
        while let Some(parent_id) = pending.pop() {
            for child in tx.child_accounts(parent_id).await? {
                if !child.is_group {
                    total += &child.balance;
                } else if recursive {
                    pending.push(child.id);
                }
            }
        }
        Ok(total)
    }

    /// Apply a movement to a leaf's stored balance and return the delta.
    ///
    /// Reversals pass negated amounts. Inactive accounts still accept them.
    pub(crate) async fn apply_movement<T: LedgerTx + ?Sized>(
        &self,
        tx: &mut T,
        account_id: Uuid,
        debit: &BigDecimal,
        credit: &BigDecimal,
    ) -> LedgerResult<BigDecimal> {
        let mut account = tx
            .get_account(account_id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))?;
        if account.is_group {
            return Err(LedgerError::InvalidAccountType(format!(
                "Group account {} cannot take postings",
                account.code
            )));
        }

        let delta = account.apply_movement(debit, credit);
        tx.update_account(&account).await?;
        Ok(delta)
    }

    /// Stop an account from taking new postings
    pub async fn deactivate<T: LedgerTx + ?Sized>(
        &self,
        tx: &mut T,
        reference: &AccountRef,
    ) -> LedgerResult<Account> {
        let mut account = self.resolve(tx, reference).await?;
        if account.is_group {
            let active_children = tx
                .child_accounts(account.id)
                .await?
                .iter()
                .any(|child| child.active);
            if active_children {
                return Err(LedgerError::DependencyExists(format!(
                    "Group account {} still has active children",
                    account.code
                )));
            }
        }

        account.active = false;
        account.updated_at = chrono::Utc::now().naive_utc();
        tx.update_account(&account).await?;
        Ok(account)
    }

    /// Rebuild a leaf's balance from posted journal history
    pub async fn recompute_from_history<T: LedgerTx + ?Sized>(
        &self,
        tx: &T,
        reference: &AccountRef,
    ) -> LedgerResult<BigDecimal> {
        let account = self.resolve(tx, reference).await?;
        if account.is_group {
            return Err(LedgerError::InvalidAccountType(format!(
                "Group account {} has no posting history",
                account.code
            )));
        }

        let mut balance = BigDecimal::from(0);
        for entry in tx.list_journal_entries(None, None).await? {
            if entry.status != JournalStatus::Posted {
                continue;
            }
            for line in entry.lines.iter().filter(|l| l.account_id == account.id) {
                balance += account.category.delta(&line.debit, &line.credit);
            }
        }
        Ok(balance)
    }
}

/// Utility functions for working with accounts
pub mod utils {
    use super::*;

    const GROUPS: &[(&str, &str, &str, AccountCategory)] = &[
        ("assets", "1000", "Assets", AccountCategory::Asset),
        ("liabilities", "2000", "Liabilities", AccountCategory::Liability),
        ("equity", "3000", "Equity", AccountCategory::Equity),
        ("revenue", "4000", "Revenue", AccountCategory::Revenue),
        ("expenses", "5000", "Expenses", AccountCategory::Expense),
    ];

    const LEAVES: &[(&str, &str, &str, &str)] = &[
        ("cash", "1100", "Cash on Hand", "assets"),
        ("bank", "1150", "Bank", "assets"),
        ("accounts_receivable", "1200", "Accounts Receivable", "assets"),
        ("inventory", "1300", "Inventory", "assets"),
        ("equipment", "1500", "Equipment", "assets"),
        ("accumulated_depreciation", "1550", "Accumulated Depreciation", "assets"),
        ("accounts_payable", "2100", "Accounts Payable", "liabilities"),
        ("salaries_payable", "2200", "Salaries Payable", "liabilities"),
        ("payroll_taxes_payable", "2300", "Payroll Taxes Payable", "liabilities"),
        ("owners_equity", "3100", "Owner's Equity", "equity"),
        ("retained_earnings", "3200", "Retained Earnings", "equity"),
        ("sales_revenue", "4100", "Sales Revenue", "revenue"),
        ("disposal_gain_loss", "4200", "Gain/Loss on Disposal", "revenue"),
        ("cost_of_goods_sold", "5100", "Cost of Goods Sold", "expenses"),
        ("salaries_expense", "5200", "Salaries Expense", "expenses"),
        ("depreciation_expense", "5300", "Depreciation Expense", "expenses"),
        ("rent_expense", "5400", "Rent Expense", "expenses"),
    ];

    /// Create a standard chart of accounts for a small trading business.
    ///
    /// Returns every created account keyed by a stable name such as
    /// `"cash"` or `"cost_of_goods_sold"`.
    pub async fn create_standard_chart<T: LedgerTx + ?Sized>(
        registry: &AccountRegistry,
        tx: &mut T,
    ) -> LedgerResult<HashMap<String, Account>> {
        let mut accounts = HashMap::new();

        for (key, code, name, category) in GROUPS {
            let group = registry
                .create(tx, code, name, *category, None, true)
                .await?;
            accounts.insert(key.to_string(), group);
        }

        for (key, code, name, parent_key) in LEAVES {
            let parent = accounts
                .get(*parent_key)
                .ok_or_else(|| LedgerError::Config(format!("Unknown chart group {}", parent_key)))?;
            let parent_ref = AccountRef::from(parent);
            let category = parent.category;
            let leaf = registry
                .create(tx, code, name, category, Some(&parent_ref), false)
                .await?;
            accounts.insert(key.to_string(), leaf);
        }

        Ok(accounts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemoryStore;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[tokio::test]
    async fn test_standard_chart_layout() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let registry = AccountRegistry::new();

        let chart = utils::create_standard_chart(&registry, &mut tx).await.unwrap();
        assert_eq!(chart.len(), 22);
        assert!(chart["assets"].is_group);
        assert_eq!(chart["cash"].parent_id, Some(chart["assets"].id));
        assert_eq!(chart["salaries_payable"].category, AccountCategory::Liability);

        let children = registry
            .children(&tx, &AccountRef::from("1000"))
            .await
            .unwrap();
        assert_eq!(children.len(), 6);
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let registry = AccountRegistry::new();

        registry
            .create(&mut tx, "1100", "Cash", AccountCategory::Asset, None, false)
            .await
            .unwrap();
        let err = registry
            .create(&mut tx, "1100", "Petty Cash", AccountCategory::Asset, None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_parent_must_be_group_of_same_category() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let registry = AccountRegistry::new();

        let assets = registry
            .create(&mut tx, "1000", "Assets", AccountCategory::Asset, None, true)
            .await
            .unwrap();
        let cash = registry
            .create(
                &mut tx,
                "1100",
                "Cash",
                AccountCategory::Asset,
                Some(&AccountRef::from(&assets)),
                false,
            )
            .await
            .unwrap();

        let err = registry
            .create(
                &mut tx,
                "1110",
                "Till",
                AccountCategory::Asset,
                Some(&AccountRef::from(&cash)),
                false,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAccountType(_)));

        let err = registry
            .create(
                &mut tx,
                "2100",
                "Loan",
                AccountCategory::Liability,
                Some(&AccountRef::from(&assets)),
                false,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAccountType(_)));
    }

    #[tokio::test]
    async fn test_group_balance_recursive_and_direct() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let registry = AccountRegistry::new();

        let assets = registry
            .create(&mut tx, "1000", "Assets", AccountCategory::Asset, None, true)
            .await
            .unwrap();
        let current = registry
            .create(
                &mut tx,
                "1100",
                "Current",
                AccountCategory::Asset,
                Some(&AccountRef::from(&assets)),
                true,
            )
            .await
            .unwrap();
        let cash = registry
            .create(
                &mut tx,
                "1110",
                "Cash",
                AccountCategory::Asset,
                Some(&AccountRef::from(&current)),
                false,
            )
            .await
            .unwrap();
        let land = registry
            .create(
                &mut tx,
                "1900",
                "Land",
                AccountCategory::Asset,
                Some(&AccountRef::from(&assets)),
                false,
            )
            .await
            .unwrap();

        registry
            .apply_movement(&mut tx, cash.id, &dec("300"), &dec("0"))
            .await
            .unwrap();
        registry
            .apply_movement(&mut tx, land.id, &dec("1000"), &dec("0"))
            .await
            .unwrap();
        registry
            .apply_movement(&mut tx, cash.id, &dec("0"), &dec("50"))
            .await
            .unwrap();

        let top = AccountRef::from(&assets);
        assert_eq!(registry.balance(&tx, &top, true).await.unwrap(), dec("1250"));
        assert_eq!(registry.balance(&tx, &top, false).await.unwrap(), dec("1000"));
        assert_eq!(
            registry.balance(&tx, &AccountRef::from(&cash), false).await.unwrap(),
            dec("250")
        );
    }

    #[tokio::test]
    async fn test_movement_follows_normal_balance() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let registry = AccountRegistry::new();

        let payable = registry
            .create(&mut tx, "2100", "Payable", AccountCategory::Liability, None, false)
            .await
            .unwrap();

        let delta = registry
            .apply_movement(&mut tx, payable.id, &dec("0"), &dec("400"))
            .await
            .unwrap();
        assert_eq!(delta, dec("400"));

        // reversal is the same movement negated
        registry
            .apply_movement(&mut tx, payable.id, &dec("0"), &dec("-400"))
            .await
            .unwrap();
        assert_eq!(
            registry.balance(&tx, &AccountRef::from(&payable), false).await.unwrap(),
            dec("0")
        );
    }

    #[tokio::test]
    async fn test_group_and_inactive_accounts_are_not_postable() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let registry = AccountRegistry::new();
        let chart = utils::create_standard_chart(&registry, &mut tx).await.unwrap();

        let err = registry
            .apply_movement(&mut tx, chart["assets"].id, &dec("1"), &dec("0"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAccountType(_)));

        registry
            .deactivate(&mut tx, &AccountRef::from("5400"))
            .await
            .unwrap();
        let err = registry
            .resolve_postable(&tx, &AccountRef::from("5400"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let err = registry
            .deactivate(&mut tx, &AccountRef::from("5000"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::DependencyExists(_)));
    }

    #[tokio::test]
    async fn test_unknown_reference() {
        let store = MemoryStore::new();
        let tx = store.begin().await.unwrap();
        let registry = AccountRegistry::new();

        let err = registry
            .resolve(&tx, &AccountRef::from("9999"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
