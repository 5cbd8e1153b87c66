use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use clearbook_core::{
    BankTransaction, CompanyId, LearnedRule, Statement, StatementId, StatementStatus,
    TransactionId, TransactionUpdate,
};

use crate::error::StoreError;
use crate::store::{CategoryCatalog, RuleStore, TransactionStore};

/// Which writes should fail. Reads never fail.
#[derive(Debug, Default, Clone)]
pub struct FailurePlan {
    pub transaction_updates: bool,
    pub failing_transactions: HashSet<TransactionId>,
    pub rule_writes: bool,
    pub statement_updates: bool,
}

#[derive(Default)]
struct Inner {
    statements: HashMap<StatementId, Statement>,
    transactions: BTreeMap<TransactionId, BankTransaction>,
    rules: Vec<LearnedRule>,
    categories: HashMap<CompanyId, Vec<String>>,
    failures: FailurePlan,
    transaction_writes: usize,
    rule_writes: usize,
}

/// In-process store. Backs tests and embedders that keep state elsewhere;
/// its failure plan lets callers watch memory and store drift apart.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert_statement(&self, statement: Statement) {
        self.lock().statements.insert(statement.id, statement);
    }

    pub fn insert_transaction(&self, tx: BankTransaction) {
        self.lock().transactions.insert(tx.id, tx);
    }

    pub fn insert_rules(&self, rules: impl IntoIterator<Item = LearnedRule>) {
        self.lock().rules.extend(rules);
    }

    pub fn set_categories(&self, company_id: CompanyId, categories: &[&str]) {
        self.lock().categories.insert(
            company_id,
            categories.iter().map(|c| c.to_string()).collect(),
        );
    }

    pub fn set_failures(&self, plan: FailurePlan) {
        self.lock().failures = plan;
    }

    pub fn transaction(&self, id: TransactionId) -> Option<BankTransaction> {
        self.lock().transactions.get(&id).cloned()
    }

    pub fn statement(&self, id: StatementId) -> Option<Statement> {
        self.lock().statements.get(&id).cloned()
    }

    pub fn rules(&self) -> Vec<LearnedRule> {
        self.lock().rules.clone()
    }

    /// Successful transaction writes so far.
    pub fn transaction_writes(&self) -> usize {
        self.lock().transaction_writes
    }

    /// Successful rule inserts and updates so far.
    pub fn rule_writes(&self) -> usize {
        self.lock().rule_writes
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn get_statement(&self, id: StatementId) -> Result<Statement, StoreError> {
        self.lock()
            .statements
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("statement {id}")))
    }

    async fn list_transactions(
        &self,
        statement_id: StatementId,
    ) -> Result<Vec<BankTransaction>, StoreError> {
        Ok(self
            .lock()
            .transactions
            .values()
            .filter(|t| t.statement_id == statement_id)
            .cloned()
            .collect())
    }

    async fn update_transaction(
        &self,
        id: TransactionId,
        update: &TransactionUpdate,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.failures.transaction_updates || inner.failures.failing_transactions.contains(&id)
        {
            return Err(StoreError::Unavailable(format!("update of transaction {id}")));
        }
        let tx = inner
            .transactions
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("transaction {id}")))?;
        tx.apply(update);
        inner.transaction_writes += 1;
        Ok(())
    }

    async fn update_statement_status(
        &self,
        id: StatementId,
        status: StatementStatus,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.failures.statement_updates {
            return Err(StoreError::Unavailable(format!("update of statement {id}")));
        }
        let statement = inner
            .statements
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("statement {id}")))?;
        statement.status = status;
        Ok(())
    }
}

#[async_trait]
impl RuleStore for MemoryStore {
    async fn list_rules(&self, company_id: CompanyId) -> Result<Vec<LearnedRule>, StoreError> {
        Ok(self
            .lock()
            .rules
            .iter()
            .filter(|r| r.company_id == company_id)
            .cloned()
            .collect())
    }

    async fn insert_rule(&self, rule: &LearnedRule) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.failures.rule_writes {
            return Err(StoreError::Unavailable(format!("insert of rule {}", rule.id)));
        }
        inner.rules.push(rule.clone());
        inner.rule_writes += 1;
        Ok(())
    }

    async fn update_rule(&self, rule: &LearnedRule) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.failures.rule_writes {
            return Err(StoreError::Unavailable(format!("update of rule {}", rule.id)));
        }
        match inner.rules.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => *existing = rule.clone(),
            None => inner.rules.push(rule.clone()),
        }
        inner.rule_writes += 1;
        Ok(())
    }
}

#[async_trait]
impl CategoryCatalog for MemoryStore {
    async fn categories(&self, company_id: CompanyId) -> Result<Vec<String>, StoreError> {
        Ok(self
            .lock()
            .categories
            .get(&company_id)
            .cloned()
            .unwrap_or_default())
    }
}
