use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::ids::{CompanyId, StatementId};
use crate::money::Money;
use crate::period::DateRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementStatus {
    #[default]
    Pending,
    Parsed,
    Error,
    Reconciled,
}

impl StatementStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            StatementStatus::Pending => "pending",
            StatementStatus::Parsed => "parsed",
            StatementStatus::Error => "error",
            StatementStatus::Reconciled => "reconciled",
        }
    }

    /// pending -> parsed | error, error -> pending (re-upload), parsed -> reconciled.
    pub fn can_transition_to(self, next: StatementStatus) -> bool {
        use StatementStatus::*;
        matches!(
            (self, next),
            (Pending, Parsed) | (Pending, Error) | (Error, Pending) | (Parsed, Reconciled)
        )
    }
}

impl fmt::Display for StatementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatementStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(StatementStatus::Pending),
            "parsed" => Ok(StatementStatus::Parsed),
            "error" => Ok(StatementStatus::Error),
            "reconciled" => Ok(StatementStatus::Reconciled),
            other => Err(CoreError::UnknownStatementStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub id: StatementId,
    pub company_id: CompanyId,
    pub beginning_balance: Money,
    pub ending_balance: Money,
    pub period: DateRange,
    pub status: StatementStatus,
}

impl Statement {
    /// Checks the transition without applying it.
    pub fn next_status(&self, next: StatementStatus) -> Result<StatementStatus, CoreError> {
        if self.status.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidStatusTransition {
                from: self.status,
                to: next,
            })
        }
    }
}
