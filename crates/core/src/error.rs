use chrono::NaiveDate;
use thiserror::Error;

use crate::statement::StatementStatus;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("Invalid period: {start} is after {end}")]
    InvalidPeriod { start: NaiveDate, end: NaiveDate },
    #[error("Statement cannot move from {from} to {to}")]
    InvalidStatusTransition {
        from: StatementStatus,
        to: StatementStatus,
    },
    #[error("Unknown category source: '{0}'")]
    UnknownCategorySource(String),
    #[error("Unknown match status: '{0}'")]
    UnknownMatchStatus(String),
    #[error("Unknown statement status: '{0}'")]
    UnknownStatementStatus(String),
}
