use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::ids::{PayeeId, ProjectId, StatementId, TransactionId};
use crate::money::Money;

/// Who assigned a transaction's category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategorySource {
    Manual,
    Auto,
    Ai,
}

impl CategorySource {
    pub const fn as_str(self) -> &'static str {
        match self {
            CategorySource::Manual => "manual",
            CategorySource::Auto => "auto",
            CategorySource::Ai => "ai",
        }
    }
}

impl fmt::Display for CategorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategorySource {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(CategorySource::Manual),
            "auto" => Ok(CategorySource::Auto),
            "ai" => Ok(CategorySource::Ai),
            other => Err(CoreError::UnknownCategorySource(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Matched,
    #[default]
    Unmatched,
    /// Same date as an expense/invoice record but a different amount.
    Discrepancy,
    Ignored,
}

impl MatchStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Matched => "matched",
            MatchStatus::Unmatched => "unmatched",
            MatchStatus::Discrepancy => "discrepancy",
            MatchStatus::Ignored => "ignored",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "matched" => Ok(MatchStatus::Matched),
            "unmatched" => Ok(MatchStatus::Unmatched),
            "discrepancy" => Ok(MatchStatus::Discrepancy),
            "ignored" => Ok(MatchStatus::Ignored),
            other => Err(CoreError::UnknownMatchStatus(other.to_string())),
        }
    }
}

/// A single line from a parsed bank statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTransaction {
    pub id: TransactionId,
    pub statement_id: StatementId,
    pub date: NaiveDate,
    pub description: String,
    /// Positive for deposits, negative for withdrawals.
    pub amount: Money,
    pub category: Option<String>,
    pub category_source: Option<CategorySource>,
    pub payee_id: Option<PayeeId>,
    pub project_id: Option<ProjectId>,
    pub match_status: MatchStatus,
    pub is_cleared: bool,
    pub reconciled_at: Option<DateTime<Utc>>,
}

impl BankTransaction {
    pub fn new(
        id: TransactionId,
        statement_id: StatementId,
        date: NaiveDate,
        description: &str,
        amount: Money,
    ) -> Self {
        BankTransaction {
            id,
            statement_id,
            date,
            description: description.to_string(),
            amount,
            category: None,
            category_source: None,
            payee_id: None,
            project_id: None,
            match_status: MatchStatus::Unmatched,
            is_cleared: false,
            reconciled_at: None,
        }
    }

    pub fn is_uncategorized(&self) -> bool {
        self.category.is_none()
    }

    pub fn is_deposit(&self) -> bool {
        self.amount.is_positive()
    }

    pub fn is_withdrawal(&self) -> bool {
        self.amount.is_negative()
    }

    /// Apply a patch in place. Only the touched fields change.
    pub fn apply(&mut self, update: &TransactionUpdate) {
        if let Some(category) = &update.category {
            self.category = category.clone();
        }
        if let Some(source) = update.category_source {
            self.category_source = source;
        }
        if let Some(payee) = update.payee_id {
            self.payee_id = payee;
        }
        if let Some(project) = update.project_id {
            self.project_id = project;
        }
        if let Some(status) = update.match_status {
            self.match_status = status;
        }
        if let Some(cleared) = update.is_cleared {
            self.is_cleared = cleared;
        }
        if let Some(at) = update.reconciled_at {
            self.reconciled_at = at;
        }
    }
}

/// Partial-field patch sent to the transaction store.
///
/// The outer `Option` is "touched or not"; the inner `Option` is the new value,
/// so `Some(None)` clears a field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionUpdate {
    pub category: Option<Option<String>>,
    pub category_source: Option<Option<CategorySource>>,
    pub payee_id: Option<Option<PayeeId>>,
    pub project_id: Option<Option<ProjectId>>,
    pub match_status: Option<MatchStatus>,
    pub is_cleared: Option<bool>,
    pub reconciled_at: Option<Option<DateTime<Utc>>>,
}

impl TransactionUpdate {
    /// Sets a category together with its source so the two never drift apart.
    pub fn category(category: &str, source: CategorySource) -> Self {
        TransactionUpdate {
            category: Some(Some(category.to_string())),
            category_source: Some(Some(source)),
            ..Default::default()
        }
    }

    pub fn clear_category() -> Self {
        TransactionUpdate {
            category: Some(None),
            category_source: Some(None),
            ..Default::default()
        }
    }

    pub fn payee(payee_id: Option<PayeeId>) -> Self {
        TransactionUpdate {
            payee_id: Some(payee_id),
            ..Default::default()
        }
    }

    pub fn project(project_id: Option<ProjectId>) -> Self {
        TransactionUpdate {
            project_id: Some(project_id),
            ..Default::default()
        }
    }

    pub fn match_status(status: MatchStatus) -> Self {
        TransactionUpdate {
            match_status: Some(status),
            ..Default::default()
        }
    }

    /// Stamp applied to every cleared transaction when a reconciliation is finished.
    pub fn reconciled(at: DateTime<Utc>) -> Self {
        TransactionUpdate {
            match_status: Some(MatchStatus::Matched),
            is_cleared: Some(true),
            reconciled_at: Some(Some(at)),
            ..Default::default()
        }
    }

    pub fn with_payee(mut self, payee_id: Option<PayeeId>) -> Self {
        self.payee_id = Some(payee_id);
        self
    }

    pub fn with_project(mut self, project_id: Option<ProjectId>) -> Self {
        self.project_id = Some(project_id);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == TransactionUpdate::default()
    }
}
