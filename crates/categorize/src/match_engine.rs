use std::collections::HashSet;

use chrono::NaiveDate;
use clearbook_core::{BankTransaction, MatchStatus, Money, TransactionId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Paid out; pairs with withdrawals.
    Expense,
    /// Paid in; pairs with deposits.
    Invoice,
}

/// A bookkeeping entry a bank line is expected to correspond to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalRecord {
    pub id: i64,
    pub kind: RecordKind,
    pub date: NaiveDate,
    /// Unsigned; direction comes from `kind`.
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub transaction_id: TransactionId,
    pub record_id: Option<i64>,
    pub status: MatchStatus,
    /// Bank amount minus record amount, both unsigned. Zero unless `Discrepancy`.
    pub difference: Money,
}

/// Derives each bank line's match status from expense/invoice records.
///
/// Same date and amount within tolerance is `Matched`; same date with a
/// different amount is `Discrepancy`; anything else is `Unmatched`. A
/// record pairs with at most one bank line. `Ignored` lines are skipped.
pub struct RecordMatcher {
    pub amount_tolerance_cents: i64,
}

impl Default for RecordMatcher {
    fn default() -> Self {
        Self {
            amount_tolerance_cents: 0,
        }
    }
}

impl RecordMatcher {
    pub fn new(amount_tolerance_cents: i64) -> Self {
        Self {
            amount_tolerance_cents,
        }
    }

    pub fn find_matches(
        &self,
        transactions: &[BankTransaction],
        records: &[ExternalRecord],
    ) -> Vec<MatchResult> {
        let mut used: HashSet<i64> = HashSet::new();

        // Exact pairs first so a near-miss never steals a record from a hit.
        let mut results: Vec<Option<MatchResult>> = transactions
            .iter()
            .map(|tx| {
                if tx.match_status == MatchStatus::Ignored {
                    return None;
                }
                let record = records.iter().find(|r| {
                    !used.contains(&r.id) && pairs_with(tx, r) && self.within_tolerance(tx, r)
                })?;
                used.insert(record.id);
                Some(MatchResult {
                    transaction_id: tx.id,
                    record_id: Some(record.id),
                    status: MatchStatus::Matched,
                    difference: Money::zero(),
                })
            })
            .collect();

        for (slot, tx) in results.iter_mut().zip(transactions) {
            if slot.is_some() || tx.match_status == MatchStatus::Ignored {
                continue;
            }
            let near = records
                .iter()
                .find(|r| !used.contains(&r.id) && pairs_with(tx, r));
            *slot = Some(match near {
                Some(record) => {
                    used.insert(record.id);
                    MatchResult {
                        transaction_id: tx.id,
                        record_id: Some(record.id),
                        status: MatchStatus::Discrepancy,
                        difference: tx.amount.abs() - record.amount.abs(),
                    }
                }
                None => MatchResult {
                    transaction_id: tx.id,
                    record_id: None,
                    status: MatchStatus::Unmatched,
                    difference: Money::zero(),
                },
            });
        }

        results.into_iter().flatten().collect()
    }

    fn within_tolerance(&self, tx: &BankTransaction, record: &ExternalRecord) -> bool {
        let diff = (tx.amount.abs().to_cents() - record.amount.abs().to_cents()).abs();
        diff <= self.amount_tolerance_cents
    }
}

fn pairs_with(tx: &BankTransaction, record: &ExternalRecord) -> bool {
    if tx.date != record.date {
        return false;
    }
    match record.kind {
        RecordKind::Expense => tx.amount.is_negative(),
        RecordKind::Invoice => tx.amount.is_positive(),
    }
}
