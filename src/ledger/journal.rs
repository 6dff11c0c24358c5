//! Journal entry processing: draft, post, edit, void and delete

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use tracing::debug;
use uuid::Uuid;

use super::account::AccountRegistry;
use crate::config::Precision;
use crate::traits::*;
use crate::types::*;

const ENTRY_SEQUENCE: &str = "journal_entry";

/// Header and lines of an entry that has not been stored yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub date: NaiveDate,
    pub description: String,
    pub source: SourceRef,
    pub lines: Vec<LineDraft>,
}

/// Builder for journal entries with any number of lines
#[derive(Debug)]
pub struct JournalBuilder {
    entry: NewEntry,
}

impl JournalBuilder {
    /// Start a manual entry
    pub fn new(date: NaiveDate, description: impl Into<String>) -> Self {
        Self {
            entry: NewEntry {
                date,
                description: description.into(),
                source: SourceRef::manual(),
                lines: Vec::new(),
            },
        }
    }

    pub fn source(mut self, source: SourceRef) -> Self {
        self.entry.source = source;
        self
    }

    /// Add a debit line
    pub fn debit(
        mut self,
        account: impl Into<AccountRef>,
        amount: BigDecimal,
        memo: Option<String>,
    ) -> Self {
        self.entry.lines.push(LineDraft::debit(account, amount, memo));
        self
    }

    /// Add a credit line
    pub fn credit(
        mut self,
        account: impl Into<AccountRef>,
        amount: BigDecimal,
        memo: Option<String>,
    ) -> Self {
        self.entry.lines.push(LineDraft::credit(account, amount, memo));
        self
    }

    pub fn line(mut self, line: LineDraft) -> Self {
        self.entry.lines.push(line);
        self
    }

    /// Build the entry, checking its shape and that it balances
    pub fn build(self) -> LedgerResult<NewEntry> {
        if self.entry.lines.len() < 2 {
            return Err(LedgerError::validation(
                "Journal entry must have at least two lines",
            ));
        }
        let debit: BigDecimal = self.entry.lines.iter().map(|l| &l.debit).sum();
        let credit: BigDecimal = self.entry.lines.iter().map(|l| &l.credit).sum();
        if debit != credit {
            return Err(LedgerError::UnbalancedEntry { debit, credit });
        }
        Ok(self.entry)
    }
}

/// Lines checked against the chart, ready to store
struct PreparedLines {
    lines: Vec<JournalLine>,
    total_debit: BigDecimal,
    total_credit: BigDecimal,
}

/// Journal engine.
///
/// Owns the draft -> posted -> void state machine. Every balance change
/// goes through [`AccountRegistry::apply_movement`], and all validation
/// finishes before the first movement is applied.
#[derive(Debug, Clone)]
pub struct JournalEngine {
    precision: Precision,
    registry: AccountRegistry,
}

impl JournalEngine {
    pub fn new(precision: Precision, registry: AccountRegistry) -> Self {
        Self {
            precision,
            registry,
        }
    }

    pub fn registry(&self) -> &AccountRegistry {
        &self.registry
    }

    /// Store an entry as a draft. Drafts may be unbalanced and have no
    /// effect on balances.
    pub async fn draft<T: LedgerTx + ?Sized>(
        &self,
        tx: &mut T,
        entry: NewEntry,
    ) -> LedgerResult<JournalEntry> {
        let prepared = self.prepare(tx, &entry.lines, false).await?;
        let stored = self.store(tx, entry, prepared, JournalStatus::Draft).await?;
        debug!(entry = %stored.id, sequence = stored.sequence, "journal entry drafted");
        Ok(stored)
    }

    /// Post a stored draft
    pub async fn post<T: LedgerTx + ?Sized>(
        &self,
        tx: &mut T,
        entry_id: Uuid,
    ) -> LedgerResult<JournalEntry> {
        let mut entry = self.load(tx, entry_id).await?;
        match entry.status {
            JournalStatus::Draft => {}
            JournalStatus::Posted => {
                return Err(LedgerError::Validation(format!(
                    "Journal entry {} is already posted",
                    entry_id
                )))
            }
            JournalStatus::Void => return Err(LedgerError::AlreadyVoided(entry_id)),
        }

        let drafts = as_drafts(&entry.lines);
        let prepared = self.prepare(tx, &drafts, true).await?;
        self.apply_lines(tx, &prepared.lines, false).await?;

        entry.lines = prepared.lines;
        entry.total_debit = prepared.total_debit;
        entry.total_credit = prepared.total_credit;
        entry.status = JournalStatus::Posted;
        entry.updated_at = chrono::Utc::now().naive_utc();
        tx.update_journal_entry(&entry).await?;

        debug!(entry = %entry.id, "journal entry posted");
        Ok(entry)
    }

    /// Store and post a new entry in one step
    pub async fn record<T: LedgerTx + ?Sized>(
        &self,
        tx: &mut T,
        entry: NewEntry,
    ) -> LedgerResult<JournalEntry> {
        let prepared = self.prepare(tx, &entry.lines, true).await?;
        self.apply_lines(tx, &prepared.lines, false).await?;
        let stored = self.store(tx, entry, prepared, JournalStatus::Posted).await?;

        debug!(
            entry = %stored.id,
            sequence = stored.sequence,
            source = %stored.source,
            total = %stored.total_debit,
            "journal entry posted"
        );
        Ok(stored)
    }

    /// Replace an entry's lines.
    ///
    /// A posted entry has its old movements reversed and the new ones
    /// applied; the new lines are validated before anything is reversed.
    pub async fn edit<T: LedgerTx + ?Sized>(
        &self,
        tx: &mut T,
        entry_id: Uuid,
        lines: Vec<LineDraft>,
    ) -> LedgerResult<JournalEntry> {
        let mut entry = self.load(tx, entry_id).await?;
        let posted = match entry.status {
            JournalStatus::Draft => false,
            JournalStatus::Posted => true,
            JournalStatus::Void => return Err(LedgerError::AlreadyVoided(entry_id)),
        };

        let prepared = self.prepare(tx, &lines, posted).await?;
        if posted {
            self.apply_lines(tx, &entry.lines, true).await?;
            self.apply_lines(tx, &prepared.lines, false).await?;
        }

        entry.lines = prepared.lines;
        entry.total_debit = prepared.total_debit;
        entry.total_credit = prepared.total_credit;
        entry.updated_at = chrono::Utc::now().naive_utc();
        tx.update_journal_entry(&entry).await?;

        debug!(entry = %entry.id, posted, "journal entry edited");
        Ok(entry)
    }

    /// Reverse a posted entry once and mark it void
    pub async fn void<T: LedgerTx + ?Sized>(
        &self,
        tx: &mut T,
        entry_id: Uuid,
    ) -> LedgerResult<JournalEntry> {
        let mut entry = self.load(tx, entry_id).await?;
        match entry.status {
            JournalStatus::Posted => {}
            JournalStatus::Void => return Err(LedgerError::AlreadyVoided(entry_id)),
            JournalStatus::Draft => {
                return Err(LedgerError::Validation(format!(
                    "Draft journal entry {} cannot be voided; delete it instead",
                    entry_id
                )))
            }
        }

        self.apply_lines(tx, &entry.lines, true).await?;
        entry.status = JournalStatus::Void;
        entry.updated_at = chrono::Utc::now().naive_utc();
        tx.update_journal_entry(&entry).await?;

        debug!(entry = %entry.id, "journal entry voided");
        Ok(entry)
    }

    /// Reverse a posted entry if needed, then remove it and its lines
    pub async fn delete<T: LedgerTx + ?Sized>(
        &self,
        tx: &mut T,
        entry_id: Uuid,
    ) -> LedgerResult<JournalEntry> {
        let entry = self.load(tx, entry_id).await?;
        if entry.status == JournalStatus::Posted {
            self.apply_lines(tx, &entry.lines, true).await?;
        }
        tx.delete_journal_entry(entry_id).await?;

        debug!(entry = %entry.id, "journal entry deleted");
        Ok(entry)
    }

    /// Load an entry.
    ///
    /// A deleted entry reports `AlreadyVoided`, one that never existed
    /// `EntryNotFound`.
    pub async fn load<T: LedgerTx + ?Sized>(
        &self,
        tx: &T,
        entry_id: Uuid,
    ) -> LedgerResult<JournalEntry> {
        match tx.get_journal_entry(entry_id).await? {
            Some(entry) => Ok(entry),
            None if tx.is_journal_entry_deleted(entry_id).await? => {
                Err(LedgerError::AlreadyVoided(entry_id))
            }
            None => Err(LedgerError::EntryNotFound(entry_id)),
        }
    }

    /// Posted lines touching an account within an inclusive date range,
    /// ordered by (date, entry sequence, line order)
    pub async fn ledger<T: LedgerTx + ?Sized>(
        &self,
        tx: &T,
        account: &AccountRef,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<LedgerLine>> {
        let account = self.registry.resolve(tx, account).await?;
        let mut ledger = Vec::new();
        for entry in tx.list_journal_entries(start_date, end_date).await? {
            if entry.status != JournalStatus::Posted {
                continue;
            }
            for line in entry.lines.iter().filter(|l| l.account_id == account.id) {
                ledger.push(LedgerLine {
                    entry_id: entry.id,
                    sequence: entry.sequence,
                    date: entry.date,
                    description: entry.description.clone(),
                    source: entry.source,
                    debit: line.debit.clone(),
                    credit: line.credit.clone(),
                    memo: line.memo.clone(),
                });
            }
        }
        Ok(ledger)
    }

    async fn prepare<T: LedgerTx + ?Sized>(
        &self,
        tx: &T,
        drafts: &[LineDraft],
        posting: bool,
    ) -> LedgerResult<PreparedLines> {
        if drafts.len() < 2 {
            return Err(LedgerError::validation(
                "Journal entry must have at least two lines",
            ));
        }

        let zero = BigDecimal::from(0);
        let mut lines = Vec::with_capacity(drafts.len());
        let mut total_debit = BigDecimal::from(0);
        let mut total_credit = BigDecimal::from(0);

        for draft in drafts {
            let debit = self.precision.money(&draft.debit);
            let credit = self.precision.money(&draft.credit);
            if debit < zero || credit < zero {
                return Err(LedgerError::Validation(format!(
                    "Line on {} has a negative amount",
                    draft.account
                )));
            }
            if (debit == zero) == (credit == zero) {
                return Err(LedgerError::Validation(format!(
                    "Line on {} must have exactly one of debit or credit",
                    draft.account
                )));
            }

            let account = if posting {
                self.registry.resolve_postable(tx, &draft.account).await?
            } else {
                let account = self.registry.resolve(tx, &draft.account).await?;
                if account.is_group {
                    return Err(LedgerError::InvalidAccountType(format!(
                        "Group account {} cannot take postings",
                        account.code
                    )));
                }
                account
            };

            total_debit += &debit;
            total_credit += &credit;
            lines.push(JournalLine {
                id: Uuid::new_v4(),
                account_id: account.id,
                debit,
                credit,
                memo: draft.memo.clone(),
            });
        }

        if posting && total_debit != total_credit {
            return Err(LedgerError::UnbalancedEntry {
                debit: total_debit,
                credit: total_credit,
            });
        }

        Ok(PreparedLines {
            lines,
            total_debit,
            total_credit,
        })
    }

    async fn apply_lines<T: LedgerTx + ?Sized>(
        &self,
        tx: &mut T,
        lines: &[JournalLine],
        reverse: bool,
    ) -> LedgerResult<()> {
        for line in lines {
            if reverse {
                let debit = -line.debit.clone();
                let credit = -line.credit.clone();
                self.registry
                    .apply_movement(tx, line.account_id, &debit, &credit)
                    .await?;
            } else {
                self.registry
                    .apply_movement(tx, line.account_id, &line.debit, &line.credit)
                    .await?;
            }
        }
        Ok(())
    }

    async fn store<T: LedgerTx + ?Sized>(
        &self,
        tx: &mut T,
        entry: NewEntry,
        prepared: PreparedLines,
        status: JournalStatus,
    ) -> LedgerResult<JournalEntry> {
        let now = chrono::Utc::now().naive_utc();
        let stored = JournalEntry {
            id: Uuid::new_v4(),
            sequence: tx.next_sequence(ENTRY_SEQUENCE).await?,
            date: entry.date,
            description: entry.description,
            source: entry.source,
            status,
            lines: prepared.lines,
            total_debit: prepared.total_debit,
            total_credit: prepared.total_credit,
            created_at: now,
            updated_at: now,
        };
        tx.insert_journal_entry(&stored).await?;
        Ok(stored)
    }
}

fn as_drafts(lines: &[JournalLine]) -> Vec<LineDraft> {
    lines
        .iter()
        .map(|l| LineDraft {
            account: AccountRef::Id(l.account_id),
            debit: l.debit.clone(),
            credit: l.credit.clone(),
            memo: l.memo.clone(),
        })
        .collect()
}

/// Running balance after each ledger line, oldest first.
///
/// Debit-normal categories accumulate debit - credit, the others
/// credit - debit.
pub fn running_balance(lines: &[LedgerLine], category: AccountCategory) -> Vec<BigDecimal> {
    let mut balance = BigDecimal::from(0);
    lines
        .iter()
        .map(|line| {
            balance += category.delta(&line.debit, &line.credit);
            balance.clone()
        })
        .collect()
}
