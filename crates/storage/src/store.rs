use async_trait::async_trait;
use clearbook_core::{
    BankTransaction, CompanyId, LearnedRule, Statement, StatementId, StatementStatus,
    TransactionId, TransactionUpdate,
};

use crate::error::StoreError;

/// Statements and their bank lines.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn get_statement(&self, id: StatementId) -> Result<Statement, StoreError>;

    async fn list_transactions(
        &self,
        statement_id: StatementId,
    ) -> Result<Vec<BankTransaction>, StoreError>;

    /// Writes only the fields `update` touches.
    async fn update_transaction(
        &self,
        id: TransactionId,
        update: &TransactionUpdate,
    ) -> Result<(), StoreError>;

    async fn update_statement_status(
        &self,
        id: StatementId,
        status: StatementStatus,
    ) -> Result<(), StoreError>;
}

/// Learned rules, keyed by company.
#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn list_rules(&self, company_id: CompanyId) -> Result<Vec<LearnedRule>, StoreError>;

    async fn insert_rule(&self, rule: &LearnedRule) -> Result<(), StoreError>;

    /// Writes the whole rule, inserting it if the store has never seen it.
    async fn update_rule(&self, rule: &LearnedRule) -> Result<(), StoreError>;
}

/// The set of category names a company may assign.
#[async_trait]
pub trait CategoryCatalog: Send + Sync {
    async fn categories(&self, company_id: CompanyId) -> Result<Vec<String>, StoreError>;
}
