use std::collections::{BTreeMap, BTreeSet};

use clearbook_core::{BankTransaction, MatchStatus, Money, Statement, StatementId, TransactionId};
use serde::Serialize;

use crate::error::ReconcileError;

/// Manual reconciliation of one statement: which lines the user has ticked
/// as cleared, and whether they reproduce the statement's ending balance.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    statement_id: Option<StatementId>,
    beginning_balance: Money,
    ending_balance: Money,
    tolerance: Money,
    amounts: BTreeMap<TransactionId, Money>,
    cleared: BTreeSet<TransactionId>,
}

impl Reconciliation {
    pub fn new(beginning_balance: Money, ending_balance: Money) -> Self {
        Self {
            statement_id: None,
            beginning_balance,
            ending_balance,
            tolerance: Money::from_cents(1),
            amounts: BTreeMap::new(),
            cleared: BTreeSet::new(),
        }
    }

    /// Starts from the statement's balances with every already-cleared line ticked.
    pub fn for_statement(statement: &Statement, transactions: &[BankTransaction]) -> Self {
        let mut rec = Self::new(statement.beginning_balance, statement.ending_balance);
        rec.statement_id = Some(statement.id);
        for tx in transactions.iter().filter(|t| t.statement_id == statement.id) {
            rec.track(tx.id, tx.amount, tx.is_cleared);
        }
        rec
    }

    pub fn with_tolerance(mut self, tolerance: Money) -> Self {
        self.tolerance = tolerance.abs();
        self
    }

    /// Makes a line available for clearing.
    pub fn track(&mut self, id: TransactionId, amount: Money, cleared: bool) {
        self.amounts.insert(id, amount);
        if cleared {
            self.cleared.insert(id);
        } else {
            self.cleared.remove(&id);
        }
    }

    pub fn statement_id(&self) -> Option<StatementId> {
        self.statement_id
    }

    /// Flips a line and returns its new cleared state.
    pub fn toggle_cleared(&mut self, id: TransactionId) -> Result<bool, ReconcileError> {
        let now_cleared = !self.is_cleared(id);
        self.set_cleared(id, now_cleared)?;
        Ok(now_cleared)
    }

    pub fn set_cleared(&mut self, id: TransactionId, cleared: bool) -> Result<(), ReconcileError> {
        if !self.amounts.contains_key(&id) {
            return Err(ReconcileError::UnknownTransaction(id));
        }
        if cleared {
            self.cleared.insert(id);
        } else {
            self.cleared.remove(&id);
        }
        Ok(())
    }

    pub fn is_cleared(&self, id: TransactionId) -> bool {
        self.cleared.contains(&id)
    }

    pub fn cleared_ids(&self) -> impl Iterator<Item = TransactionId> + '_ {
        self.cleared.iter().copied()
    }

    pub fn cleared_count(&self) -> usize {
        self.cleared.len()
    }

    fn cleared_amounts(&self) -> impl Iterator<Item = Money> + '_ {
        self.cleared.iter().filter_map(|id| self.amounts.get(id).copied())
    }

    pub fn cleared_deposits(&self) -> Money {
        self.cleared_amounts().filter(|a| a.is_positive()).sum()
    }

    pub fn cleared_withdrawals(&self) -> Money {
        self.cleared_amounts()
            .filter(|a| a.is_negative())
            .map(Money::abs)
            .sum()
    }

    /// Beginning balance plus cleared deposits minus cleared withdrawals.
    pub fn cleared_balance(&self) -> Money {
        self.beginning_balance + self.cleared_deposits() - self.cleared_withdrawals()
    }

    /// Ending balance minus cleared balance.
    pub fn difference(&self) -> Money {
        self.ending_balance - self.cleared_balance()
    }

    pub fn is_balanced(&self) -> bool {
        self.difference().abs() < self.tolerance
    }

    /// Gate before stamping: an unbalanced statement needs explicit confirmation.
    pub fn check_finish(&self, confirm_unbalanced: bool) -> Result<(), ReconcileError> {
        if self.is_balanced() || confirm_unbalanced {
            Ok(())
        } else {
            Err(ReconcileError::Unbalanced {
                difference: self.difference(),
            })
        }
    }
}

/// Per-status tallies for the statement page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationSummary {
    pub matched: usize,
    pub unmatched: usize,
    pub discrepancy: usize,
    pub ignored: usize,
    pub matched_total: Money,
    pub unmatched_total: Money,
    pub discrepancy_total: Money,
    pub deposits: Money,
    pub withdrawals: Money,
}

impl ReconciliationSummary {
    pub fn from_transactions(transactions: &[BankTransaction]) -> Self {
        let mut summary = Self::default();
        for tx in transactions {
            let magnitude = tx.amount.abs();
            match tx.match_status {
                MatchStatus::Matched => {
                    summary.matched += 1;
                    summary.matched_total = summary.matched_total + magnitude;
                }
                MatchStatus::Unmatched => {
                    summary.unmatched += 1;
                    summary.unmatched_total = summary.unmatched_total + magnitude;
                }
                MatchStatus::Discrepancy => {
                    summary.discrepancy += 1;
                    summary.discrepancy_total = summary.discrepancy_total + magnitude;
                }
                MatchStatus::Ignored => summary.ignored += 1,
            }
            if tx.is_deposit() {
                summary.deposits = summary.deposits + magnitude;
            } else if tx.is_withdrawal() {
                summary.withdrawals = summary.withdrawals + magnitude;
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.matched + self.unmatched + self.discrepancy + self.ignored
    }
}
