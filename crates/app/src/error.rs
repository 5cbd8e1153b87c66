use clearbook_core::{CoreError, Money, StatementStatus, TransactionId};
use clearbook_storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Transaction {0} is not part of this statement")]
    UnknownTransaction(TransactionId),
    #[error("Category '{0}' is not in the company's category list")]
    UnknownCategory(String),
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Statement is out of balance by {difference}")]
    Unbalanced { difference: Money },
    #[error("Statement cannot be reconciled from status '{0}'")]
    NotReconcilable(StatementStatus),
    #[error("Transaction {0} is not part of this statement")]
    UnknownTransaction(TransactionId),
    #[error("{failed} of {total} cleared transactions could not be stamped")]
    Incomplete { failed: usize, total: usize },
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Core(#[from] CoreError),
}
