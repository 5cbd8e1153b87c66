use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use clearbook_categorize::{normalize, ExternalRecord, KeywordClassifier, RecordMatcher};
use clearbook_core::{
    BankTransaction, CategorySource, CompanyId, MatchStatus, PayeeId, ProjectId, RuleUpdate,
    Statement, StatementId, StatementStatus, TransactionId, TransactionUpdate,
};
use clearbook_storage::{CategoryCatalog, RuleStore, StoreError, TransactionStore};
use tokio::task::JoinSet;

use crate::config::EngineConfig;
use crate::error::{ReconcileError, SessionError};
use crate::notify::Notifier;
use crate::outcome::{
    AiSuggestionReport, AssignmentOutcome, AutoCategorizeReport, BulkWriteOutcome, SiblingOutcome,
};
use crate::reconcile::{Reconciliation, ReconciliationSummary};
use crate::rules::RuleRepository;

/// The collaborators a session talks to.
#[derive(Clone)]
pub struct SessionStores {
    pub transactions: Arc<dyn TransactionStore>,
    pub rules: Arc<dyn RuleStore>,
    pub catalog: Arc<dyn CategoryCatalog>,
}

impl SessionStores {
    /// One backend serving all three roles.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: TransactionStore + RuleStore + CategoryCatalog + 'static,
    {
        Self {
            transactions: store.clone(),
            rules: store.clone(),
            catalog: store,
        }
    }
}

/// A loaded bank statement and everything the user can do to its lines.
///
/// Owns the in-memory copy of the statement's transactions. Every change is
/// applied here and written through to the store; user-initiated single
/// writes fail loudly, bulk and learning writes are best-effort.
pub struct StatementSession {
    statement: Statement,
    transactions: Vec<BankTransaction>,
    rules: RuleRepository,
    classifier: KeywordClassifier,
    store: Arc<dyn TransactionStore>,
    catalog: Arc<dyn CategoryCatalog>,
    notifier: Arc<dyn Notifier>,
    config: EngineConfig,
}

impl StatementSession {
    pub async fn open(
        statement_id: StatementId,
        stores: SessionStores,
        config: EngineConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, SessionError> {
        let statement = stores.transactions.get_statement(statement_id).await?;
        let transactions = stores.transactions.list_transactions(statement_id).await?;
        let mut rules = RuleRepository::new(statement.company_id, stores.rules, config.matcher());
        rules.load().await?;

        tracing::info!(
            "Opened statement {} ({}) with {} transactions",
            statement.id,
            statement.period,
            transactions.len()
        );

        Ok(Self {
            statement,
            transactions,
            rules,
            classifier: config.classifier(),
            store: stores.transactions,
            catalog: stores.catalog,
            notifier,
            config,
        })
    }

    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    pub fn company_id(&self) -> CompanyId {
        self.statement.company_id
    }

    pub fn transactions(&self) -> &[BankTransaction] {
        &self.transactions
    }

    pub fn transaction(&self, id: TransactionId) -> Option<&BankTransaction> {
        self.transactions.iter().find(|t| t.id == id)
    }

    pub fn rules(&self) -> &RuleRepository {
        &self.rules
    }

    fn position(&self, id: TransactionId) -> Result<usize, SessionError> {
        self.transactions
            .iter()
            .position(|t| t.id == id)
            .ok_or(SessionError::UnknownTransaction(id))
    }

    async fn catalog(&self) -> Result<Vec<String>, StoreError> {
        self.catalog.categories(self.company_id()).await
    }

    /// Categorizes every uncategorized, non-ignored line: learned rules
    /// first, then the keyword table. Only catalog categories are applied.
    pub async fn auto_categorize_all(&mut self) -> Result<AutoCategorizeReport, SessionError> {
        let catalog = self.catalog().await?;
        let mut report = AutoCategorizeReport::default();
        let mut updates = Vec::new();

        for tx in &self.transactions {
            if !tx.is_uncategorized() || tx.match_status == MatchStatus::Ignored {
                continue;
            }

            let mut update = TransactionUpdate::default();
            let mut rejected = false;
            if let Some(hit) = self.rules.find(&tx.description) {
                let rule = hit.rule;
                match rule.category.as_deref().map(|c| resolve_category(&catalog, c)) {
                    Some(Some(category)) => {
                        update = TransactionUpdate::category(category, CategorySource::Auto);
                        report.by_rule += 1;
                    }
                    Some(None) => rejected = true,
                    None => {}
                }
                if let Some(payee) = rule.payee_id {
                    update = update.with_payee(Some(payee));
                }
                if let Some(project) = rule.project_id {
                    update = update.with_project(Some(project));
                }
            }

            if update.category.is_none() {
                match self
                    .classifier
                    .match_category(&tx.description)
                    .map(|c| resolve_category(&catalog, c))
                {
                    Some(Some(category)) => {
                        update.category = Some(Some(category.to_string()));
                        update.category_source = Some(Some(CategorySource::Auto));
                        report.by_keyword += 1;
                        rejected = false;
                    }
                    Some(None) => rejected = true,
                    None => {}
                }
            }

            if rejected {
                report.rejected_categories += 1;
            }
            if update.category.is_none() && !rejected {
                report.unmatched += 1;
            }
            if !update.is_empty() {
                updates.push((tx.id, update));
            }
        }

        report.writes = self.apply_bulk(updates).await;
        tracing::info!(
            "Auto-categorized {} of {} transactions on statement {} ({} by rule, {} by keyword)",
            report.categorized(),
            self.transactions.len(),
            self.statement.id,
            report.by_rule,
            report.by_keyword
        );
        if report.categorized() > 0 {
            self.notifier.success(&format!(
                "Categorized {} transactions",
                report.categorized()
            ));
        }
        Ok(report)
    }

    /// User sets a category. Learns a rule and fills in matching siblings.
    pub async fn set_category(
        &mut self,
        id: TransactionId,
        category: &str,
    ) -> Result<AssignmentOutcome, SessionError> {
        let catalog = self.catalog().await?;
        let Some(category) = resolve_category(&catalog, category).map(str::to_string) else {
            self.notifier
                .error(&format!("'{category}' is not a valid category"));
            return Err(SessionError::UnknownCategory(category.to_string()));
        };
        self.write_one(id, TransactionUpdate::category(&category, CategorySource::Manual))
            .await?;
        Ok(self.learn(id, RuleUpdate::category(&category)).await)
    }

    /// User assigns or clears a payee. Only an assignment is learned.
    pub async fn set_payee(
        &mut self,
        id: TransactionId,
        payee_id: Option<PayeeId>,
    ) -> Result<Option<AssignmentOutcome>, SessionError> {
        self.write_one(id, TransactionUpdate::payee(payee_id)).await?;
        Ok(match payee_id {
            Some(payee) => Some(self.learn(id, RuleUpdate::payee(payee)).await),
            None => None,
        })
    }

    /// User assigns or clears a project. Only an assignment is learned.
    pub async fn set_project(
        &mut self,
        id: TransactionId,
        project_id: Option<ProjectId>,
    ) -> Result<Option<AssignmentOutcome>, SessionError> {
        self.write_one(id, TransactionUpdate::project(project_id)).await?;
        Ok(match project_id {
            Some(project) => Some(self.learn(id, RuleUpdate::project(project)).await),
            None => None,
        })
    }

    pub async fn clear_category(&mut self, id: TransactionId) -> Result<(), SessionError> {
        self.write_one(id, TransactionUpdate::clear_category()).await
    }

    pub async fn update_match_status(
        &mut self,
        id: TransactionId,
        status: MatchStatus,
    ) -> Result<(), SessionError> {
        self.write_one(id, TransactionUpdate::match_status(status))
            .await
    }

    /// Takes category suggestions from an external classifier. Suggestions
    /// for unknown or already categorized lines, or for categories outside
    /// the catalog, are rejected.
    pub async fn apply_ai_suggestions(
        &mut self,
        suggestions: &[(TransactionId, String)],
    ) -> Result<AiSuggestionReport, SessionError> {
        let catalog = self.catalog().await?;
        let mut report = AiSuggestionReport::default();
        let mut updates = Vec::new();

        for (id, suggested) in suggestions {
            let Some(tx) = self.transaction(*id) else {
                report
                    .rejected
                    .push((*id, format!("transaction {id} is not on this statement")));
                continue;
            };
            if let Some(existing) = &tx.category {
                report.rejected.push((
                    *id,
                    format!("transaction {id} is already categorized as '{existing}'"),
                ));
                continue;
            }
            match resolve_category(&catalog, suggested) {
                Some(category) => {
                    updates.push((*id, TransactionUpdate::category(category, CategorySource::Ai)))
                }
                None => {
                    tracing::debug!("Rejected suggestion '{suggested}' for transaction {id}");
                    report
                        .rejected
                        .push((*id, format!("unknown category '{suggested}'")));
                }
            }
        }

        report.writes = self.apply_bulk(updates).await;
        Ok(report)
    }

    /// Gives the user's assignment to every other uncategorized line whose
    /// normalized description fuzzy-matches the source line's, in either
    /// direction. Siblings are tagged `auto`. Best-effort, no rollback.
    pub async fn apply_sibling_rules(
        &mut self,
        source_id: TransactionId,
        description: &str,
        updates: &RuleUpdate,
    ) -> SiblingOutcome {
        let source = normalize(description);
        if source.is_empty() || updates.is_empty() {
            return SiblingOutcome::default();
        }

        let mut patch = match &updates.category {
            Some(category) => TransactionUpdate::category(category, CategorySource::Auto),
            None => TransactionUpdate::default(),
        };
        if let Some(payee) = updates.payee_id {
            patch = patch.with_payee(Some(payee));
        }
        if let Some(project) = updates.project_id {
            patch = patch.with_project(Some(project));
        }

        let matcher = *self.rules.matcher();
        let siblings: Vec<(TransactionId, TransactionUpdate)> = self
            .transactions
            .iter()
            .filter(|t| t.id != source_id && t.is_uncategorized())
            .filter(|t| matcher.fuzzy_match_either(&normalize(&t.description), &source))
            .map(|t| (t.id, patch.clone()))
            .collect();

        if !siblings.is_empty() {
            tracing::debug!(
                "Propagating assignment from transaction {source_id} to {} siblings",
                siblings.len()
            );
        }
        self.apply_bulk(siblings).await
    }

    /// Derives match statuses from bookkeeping records and writes the changes.
    pub async fn apply_record_matches(&mut self, records: &[ExternalRecord]) -> BulkWriteOutcome {
        let results = RecordMatcher::default().find_matches(&self.transactions, records);
        let updates = results
            .into_iter()
            .filter(|r| {
                self.transaction(r.transaction_id)
                    .is_some_and(|t| t.match_status != r.status)
            })
            .map(|r| (r.transaction_id, TransactionUpdate::match_status(r.status)))
            .collect();
        self.apply_bulk(updates).await
    }

    pub fn summary(&self) -> ReconciliationSummary {
        ReconciliationSummary::from_transactions(&self.transactions)
    }

    pub fn reconciliation(&self) -> Reconciliation {
        Reconciliation::for_statement(&self.statement, &self.transactions)
            .with_tolerance(self.config.balance_tolerance())
    }

    /// Stamps every cleared line as reconciled, then closes the statement.
    ///
    /// On any store failure the user is told, the statement keeps its status,
    /// and only the lines that were written carry the stamp in memory.
    pub async fn finish_reconciliation(
        &mut self,
        reconciliation: &Reconciliation,
        confirm_unbalanced: bool,
    ) -> Result<ReconciliationSummary, ReconcileError> {
        if reconciliation
            .statement_id()
            .is_some_and(|id| id != self.statement.id)
        {
            return Err(ReconcileError::NotReconcilable(self.statement.status));
        }
        if !self
            .statement
            .status
            .can_transition_to(StatementStatus::Reconciled)
        {
            return Err(ReconcileError::NotReconcilable(self.statement.status));
        }
        reconciliation.check_finish(confirm_unbalanced)?;

        for id in reconciliation.cleared_ids() {
            if self.transaction(id).is_none() {
                return Err(ReconcileError::UnknownTransaction(id));
            }
        }

        let stamp = TransactionUpdate::reconciled(Utc::now());
        let writes: Vec<_> = reconciliation
            .cleared_ids()
            .map(|id| (id, stamp.clone()))
            .collect();
        let total = writes.len();
        let results = persist_all(&self.store, writes).await;

        let mut failed = 0;
        for (id, result) in results {
            match result {
                Ok(()) => self.apply_in_memory(id, &stamp),
                Err(e) => {
                    tracing::warn!("Failed to stamp transaction {id} as reconciled: {e}");
                    failed += 1;
                }
            }
        }
        if failed > 0 {
            self.notifier.error(&format!(
                "Reconciliation failed: {failed} of {total} cleared transactions could not be saved"
            ));
            return Err(ReconcileError::Incomplete { failed, total });
        }

        let next = self.statement.next_status(StatementStatus::Reconciled)?;
        if let Err(e) = self
            .store
            .update_statement_status(self.statement.id, next)
            .await
        {
            tracing::warn!(
                "Failed to mark statement {} reconciled: {e}",
                self.statement.id
            );
            self.notifier
                .error(&format!("Reconciliation failed: {e}"));
            return Err(e.into());
        }
        self.statement.status = next;

        if reconciliation.is_balanced() {
            self.notifier.success("Statement reconciled");
        } else {
            self.notifier.success(&format!(
                "Statement reconciled with a difference of {}",
                reconciliation.difference()
            ));
        }
        tracing::info!(
            "Reconciled statement {} with {total} cleared transactions",
            self.statement.id
        );
        Ok(self.summary())
    }

    /// Persists a user-initiated change, then mirrors it in memory. A store
    /// failure is toasted and returned; memory is left as it was.
    async fn write_one(
        &mut self,
        id: TransactionId,
        update: TransactionUpdate,
    ) -> Result<(), SessionError> {
        let idx = self.position(id)?;
        if let Err(e) = self.store.update_transaction(id, &update).await {
            tracing::warn!("Update of transaction {id} failed: {e}");
            self.notifier
                .error(&format!("Could not update transaction: {e}"));
            return Err(e.into());
        }
        self.transactions[idx].apply(&update);
        Ok(())
    }

    async fn learn(&mut self, id: TransactionId, update: RuleUpdate) -> AssignmentOutcome {
        let description = self
            .transaction(id)
            .map(|t| t.description.clone())
            .unwrap_or_default();
        let rule = self.rules.save_learned_rule(&description, &update).await;
        let siblings = self.apply_sibling_rules(id, &description, &update).await;
        AssignmentOutcome { rule, siblings }
    }

    fn apply_in_memory(&mut self, id: TransactionId, update: &TransactionUpdate) {
        if let Some(tx) = self.transactions.iter_mut().find(|t| t.id == id) {
            tx.apply(update);
        }
    }

    /// Applies every update in memory, then writes them concurrently.
    async fn apply_bulk(&mut self, updates: Vec<(TransactionId, TransactionUpdate)>) -> BulkWriteOutcome {
        let mut outcome = BulkWriteOutcome::default();
        if updates.is_empty() {
            return outcome;
        }
        for (id, update) in &updates {
            self.apply_in_memory(*id, update);
            outcome.applied.push(*id);
        }

        let total = updates.len();
        for (id, result) in persist_all(&self.store, updates).await {
            if let Err(e) = result {
                outcome.failed.push((id, e.to_string()));
            }
        }
        if outcome.diverged() {
            tracing::warn!(
                "{} of {} transaction writes failed on statement {}",
                outcome.failed.len(),
                total,
                self.statement.id
            );
        }
        outcome
    }
}

/// Case-insensitive lookup returning the catalog's spelling.
fn resolve_category<'a>(catalog: &'a [String], name: &str) -> Option<&'a str> {
    catalog
        .iter()
        .find(|c| c.eq_ignore_ascii_case(name))
        .map(String::as_str)
}

/// Writes every update concurrently. No ordering, rollback or retry.
/// Returns one result per update, sorted by id.
async fn persist_all(
    store: &Arc<dyn TransactionStore>,
    updates: Vec<(TransactionId, TransactionUpdate)>,
) -> Vec<(TransactionId, Result<(), StoreError>)> {
    let mut pending: BTreeSet<TransactionId> = updates.iter().map(|(id, _)| *id).collect();
    let mut set = JoinSet::new();
    for (id, update) in updates {
        let store = Arc::clone(store);
        set.spawn(async move {
            let result = store.update_transaction(id, &update).await;
            (id, result)
        });
    }

    let mut results = Vec::with_capacity(pending.len());
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((id, result)) => {
                pending.remove(&id);
                results.push((id, result));
            }
            Err(e) => tracing::warn!("Transaction write task failed: {e}"),
        }
    }
    // a task that panicked or was cancelled never reported back
    results.extend(pending.into_iter().map(|id| {
        (
            id,
            Err(StoreError::Unavailable(format!(
                "write of transaction {id} did not complete"
            ))),
        )
    }));
    results.sort_by_key(|(id, _)| *id);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use clearbook_categorize::RecordKind;
    use clearbook_core::{DateRange, LearnedRule, Money};
    use clearbook_storage::{FailurePlan, MemoryStore};

    use crate::notify::{RecordingNotifier, Toast};
    use crate::outcome::RuleSaveOutcome;

    const CATEGORIES: &[&str] = &[
        "software", "meals", "travel", "transfer", "fuel", "payroll", "equipment",
    ];

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        notifier: Arc<RecordingNotifier>,
    }

    impl Fixture {
        fn new(beginning: i64, ending: i64, lines: &[(&str, i64)]) -> Self {
            let store = Arc::new(MemoryStore::new());
            store.insert_statement(Statement {
                id: StatementId(1),
                company_id: CompanyId(1),
                beginning_balance: Money::from_cents(beginning),
                ending_balance: Money::from_cents(ending),
                period: DateRange::new(date(1), date(31)).unwrap(),
                status: StatementStatus::Parsed,
            });
            for (i, (desc, cents)) in lines.iter().enumerate() {
                store.insert_transaction(BankTransaction::new(
                    TransactionId(i as i64 + 1),
                    StatementId(1),
                    date(i as u32 + 2),
                    desc,
                    Money::from_cents(*cents),
                ));
            }
            store.set_categories(CompanyId(1), CATEGORIES);
            Self {
                store,
                notifier: Arc::new(RecordingNotifier::new()),
            }
        }

        async fn open(&self) -> StatementSession {
            StatementSession::open(
                StatementId(1),
                SessionStores::shared(self.store.clone()),
                EngineConfig::default(),
                self.notifier.clone(),
            )
            .await
            .unwrap()
        }
    }

    fn category_of(session: &StatementSession, id: i64) -> Option<&str> {
        session.transaction(TransactionId(id))?.category.as_deref()
    }

    #[tokio::test]
    async fn keyword_table_categorizes_statement_samples() {
        let fx = Fixture::new(
            0,
            0,
            &[
                ("STARBUCKS #123", -550),
                ("UBER EATS ORDER 456", -2340),
                ("ACH TRANSFER TO SAVINGS", -50_000),
            ],
        );
        let mut session = fx.open().await;
        let report = session.auto_categorize_all().await.unwrap();

        assert_eq!(report.by_keyword, 3);
        assert_eq!(report.by_rule, 0);
        assert!(!report.writes.diverged());
        let categories: Vec<_> = (1..=3).map(|id| category_of(&session, id)).collect();
        assert_eq!(categories, vec![Some("meals"), Some("meals"), Some("transfer")]);
        for tx in session.transactions() {
            assert_eq!(tx.category_source, Some(CategorySource::Auto));
            assert_eq!(fx.store.transaction(tx.id).unwrap().category, tx.category);
        }
    }

    #[tokio::test]
    async fn learned_rule_beats_keyword_table() {
        let fx = Fixture::new(0, 0, &[("SHELL OIL 57442", -4500)]);
        let mut rule = LearnedRule::new(CompanyId(1), "shell oil");
        rule.category = Some("travel".to_string());
        rule.payee_id = Some(PayeeId(12));
        fx.store.insert_rules([rule]);

        let mut session = fx.open().await;
        let report = session.auto_categorize_all().await.unwrap();

        assert_eq!(report.by_rule, 1);
        let tx = session.transaction(TransactionId(1)).unwrap();
        assert_eq!(tx.category.as_deref(), Some("travel"));
        assert_eq!(tx.payee_id, Some(PayeeId(12)));
    }

    #[tokio::test]
    async fn category_outside_catalog_is_not_applied() {
        let fx = Fixture::new(0, 0, &[("GEICO AUTO PAY", -12_000), ("ZXQV HOLDINGS", -100)]);
        let mut session = fx.open().await;
        let report = session.auto_categorize_all().await.unwrap();
        assert_eq!(report.rejected_categories, 1);
        assert_eq!(report.unmatched, 1);
        assert!(session.transactions().iter().all(|t| t.is_uncategorized()));
        assert_eq!(fx.store.transaction_writes(), 0);
    }

    #[tokio::test]
    async fn already_categorized_and_ignored_lines_are_left_alone() {
        let fx = Fixture::new(0, 0, &[("STARBUCKS", -550), ("STARBUCKS", -650)]);
        let mut session = fx.open().await;
        session.set_category(TransactionId(1), "travel").await.unwrap();
        session
            .update_match_status(TransactionId(2), MatchStatus::Ignored)
            .await
            .unwrap();
        session.clear_category(TransactionId(2)).await.unwrap();

        session.auto_categorize_all().await.unwrap();
        assert_eq!(category_of(&session, 1), Some("travel"));
        assert_eq!(category_of(&session, 2), None);
    }

    #[tokio::test]
    async fn manual_category_propagates_to_siblings() {
        let fx = Fixture::new(
            0,
            0,
            &[
                ("ADOBE CREATIVE CLOUD", -5499),
                ("ADOBE CREATIVE CLOUD MONTHLY", -5499),
                ("STARBUCKS #123", -550),
            ],
        );
        let mut session = fx.open().await;
        let outcome = session
            .set_category(TransactionId(1), "software")
            .await
            .unwrap();

        assert!(matches!(outcome.rule, RuleSaveOutcome::Created { .. }));
        assert_eq!(outcome.siblings.applied, vec![TransactionId(2)]);
        assert!(!outcome.siblings.diverged());

        let source = session.transaction(TransactionId(1)).unwrap();
        assert_eq!(source.category_source, Some(CategorySource::Manual));
        let sibling = session.transaction(TransactionId(2)).unwrap();
        assert_eq!(sibling.category.as_deref(), Some("software"));
        assert_eq!(sibling.category_source, Some(CategorySource::Auto));
        assert_eq!(category_of(&session, 3), None);

        let stored = fx.store.transaction(TransactionId(2)).unwrap();
        assert_eq!(stored.category_source, Some(CategorySource::Auto));
        assert_eq!(fx.store.rules().len(), 1);
        assert_eq!(fx.store.rules()[0].description_pattern, "adobe creative cloud");
    }

    #[tokio::test]
    async fn siblings_never_overwrite_existing_categories() {
        let fx = Fixture::new(0, 0, &[("ADOBE STOCK", -2999), ("ADOBE STOCK", -2999)]);
        let mut session = fx.open().await;
        session.set_category(TransactionId(2), "equipment").await.unwrap();
        let outcome = session
            .set_category(TransactionId(1), "software")
            .await
            .unwrap();
        assert!(outcome.siblings.applied.is_empty());
        assert_eq!(category_of(&session, 2), Some("equipment"));
    }

    #[tokio::test]
    async fn payee_assignment_propagates_without_inventing_a_category() {
        let fx = Fixture::new(0, 0, &[("GUSTO PAYROLL", -90_000), ("GUSTO PAYROLL", -91_000)]);
        let mut session = fx.open().await;
        let outcome = session
            .set_payee(TransactionId(1), Some(PayeeId(4)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.siblings.applied, vec![TransactionId(2)]);
        let sibling = session.transaction(TransactionId(2)).unwrap();
        assert_eq!(sibling.payee_id, Some(PayeeId(4)));
        assert_eq!(sibling.category, None);
        assert_eq!(sibling.category_source, None);

        assert!(session.set_payee(TransactionId(1), None).await.unwrap().is_none());
        assert_eq!(session.transaction(TransactionId(1)).unwrap().payee_id, None);
    }

    #[tokio::test]
    async fn project_assignment_is_learned() {
        let fx = Fixture::new(0, 0, &[("HOME DEPOT 4410", -12_000)]);
        let mut session = fx.open().await;
        session
            .set_project(TransactionId(1), Some(ProjectId(3)))
            .await
            .unwrap();
        assert_eq!(session.rules().rules()[0].project_id, Some(ProjectId(3)));
    }

    #[tokio::test]
    async fn sibling_write_failure_is_reported_not_raised() {
        let fx = Fixture::new(
            0,
            0,
            &[("ADOBE CREATIVE CLOUD", -5499), ("ADOBE CREATIVE CLOUD", -5499)],
        );
        let mut session = fx.open().await;
        fx.store.set_failures(FailurePlan {
            failing_transactions: [TransactionId(2)].into_iter().collect(),
            rule_writes: true,
            ..Default::default()
        });

        let outcome = session
            .set_category(TransactionId(1), "software")
            .await
            .unwrap();

        assert!(outcome.rule.diverged());
        assert!(outcome.siblings.diverged());
        assert_eq!(outcome.siblings.failed[0].0, TransactionId(2));
        // memory moved on, the store did not
        assert_eq!(category_of(&session, 2), Some("software"));
        assert_eq!(fx.store.transaction(TransactionId(2)).unwrap().category, None);
        assert_eq!(session.rules().rules().len(), 1);
        assert!(fx.store.rules().is_empty());
        assert!(fx.notifier.errors().is_empty());
    }

    #[tokio::test]
    async fn failed_manual_update_toasts_and_leaves_memory_alone() {
        let fx = Fixture::new(0, 0, &[("ADOBE", -5499)]);
        let mut session = fx.open().await;
        fx.store.set_failures(FailurePlan {
            transaction_updates: true,
            ..Default::default()
        });

        let err = session
            .set_category(TransactionId(1), "software")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Store(StoreError::Unavailable(_))));
        assert_eq!(category_of(&session, 1), None);
        assert!(session.rules().rules().is_empty());
        assert_eq!(fx.notifier.errors().len(), 1);

        assert!(session
            .update_match_status(TransactionId(1), MatchStatus::Ignored)
            .await
            .is_err());
        assert_eq!(fx.notifier.errors().len(), 2);
    }

    #[tokio::test]
    async fn unknown_category_and_transaction_are_rejected() {
        let fx = Fixture::new(0, 0, &[("ADOBE", -5499)]);
        let mut session = fx.open().await;
        assert!(matches!(
            session.set_category(TransactionId(1), "crypto").await,
            Err(SessionError::UnknownCategory(_))
        ));
        assert!(matches!(
            session.clear_category(TransactionId(9)).await,
            Err(SessionError::UnknownTransaction(TransactionId(9)))
        ));
        // catalog lookup ignores case and keeps the catalog's spelling
        session.set_category(TransactionId(1), "Software").await.unwrap();
        assert_eq!(category_of(&session, 1), Some("software"));
    }

    #[tokio::test]
    async fn ai_suggestions_are_validated_against_catalog() {
        let fx = Fixture::new(0, 0, &[("ZXQV HOLDINGS", -100), ("QRST LLC", -200)]);
        let mut session = fx.open().await;
        let report = session
            .apply_ai_suggestions(&[
                (TransactionId(1), "software".to_string()),
                (TransactionId(2), "crypto".to_string()),
                (TransactionId(7), "meals".to_string()),
            ])
            .await
            .unwrap();

        assert_eq!(report.writes.applied, vec![TransactionId(1)]);
        assert_eq!(report.rejected.len(), 2);
        let tx = session.transaction(TransactionId(1)).unwrap();
        assert_eq!(tx.category_source, Some(CategorySource::Ai));
        assert_eq!(category_of(&session, 2), None);
    }

    #[tokio::test]
    async fn ai_suggestions_never_overwrite_existing_categories() {
        let fx = Fixture::new(0, 0, &[("ADOBE", -5499), ("STARBUCKS #9", -450)]);
        let mut session = fx.open().await;
        session.set_category(TransactionId(1), "software").await.unwrap();
        session.auto_categorize_all().await.unwrap();
        assert_eq!(category_of(&session, 2), Some("meals"));

        let report = session
            .apply_ai_suggestions(&[
                (TransactionId(1), "meals".to_string()),
                (TransactionId(2), "travel".to_string()),
            ])
            .await
            .unwrap();

        assert!(report.writes.applied.is_empty());
        assert_eq!(report.rejected.len(), 2);
        let manual = session.transaction(TransactionId(1)).unwrap();
        assert_eq!(manual.category.as_deref(), Some("software"));
        assert_eq!(manual.category_source, Some(CategorySource::Manual));
        let stored = fx.store.transaction(TransactionId(1)).unwrap();
        assert_eq!(stored.category_source, Some(CategorySource::Manual));
        let auto = session.transaction(TransactionId(2)).unwrap();
        assert_eq!(auto.category.as_deref(), Some("meals"));
        assert_eq!(auto.category_source, Some(CategorySource::Auto));
    }

    #[tokio::test]
    async fn record_matches_update_statuses() {
        let fx = Fixture::new(0, 0, &[("ADOBE", -5499), ("CLIENT PAYMENT", 50_000)]);
        let mut session = fx.open().await;
        let outcome = session
            .apply_record_matches(&[
                ExternalRecord {
                    id: 1,
                    kind: RecordKind::Expense,
                    date: date(2),
                    amount: Money::from_cents(5499),
                },
                ExternalRecord {
                    id: 2,
                    kind: RecordKind::Invoice,
                    date: date(3),
                    amount: Money::from_cents(45_000),
                },
            ])
            .await;
        assert_eq!(outcome.applied.len(), 2);
        let summary = session.summary();
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.discrepancy, 1);
        assert_eq!(
            fx.store.transaction(TransactionId(2)).unwrap().match_status,
            MatchStatus::Discrepancy
        );
    }

    #[tokio::test]
    async fn balanced_reconciliation_stamps_and_closes_statement() {
        let fx = Fixture::new(
            100_000,
            130_000,
            &[("CLIENT PAYMENT", 50_000), ("RENT", -20_000), ("COFFEE", -500)],
        );
        let mut session = fx.open().await;
        let mut rec = session.reconciliation();
        rec.toggle_cleared(TransactionId(1)).unwrap();
        rec.toggle_cleared(TransactionId(2)).unwrap();
        assert!(rec.is_balanced());

        let summary = session.finish_reconciliation(&rec, false).await.unwrap();

        assert_eq!(session.statement().status, StatementStatus::Reconciled);
        assert_eq!(
            fx.store.statement(StatementId(1)).unwrap().status,
            StatementStatus::Reconciled
        );
        assert_eq!(summary.matched, 2);
        for id in [1, 2] {
            let stored = fx.store.transaction(TransactionId(id)).unwrap();
            assert!(stored.is_cleared);
            assert!(stored.reconciled_at.is_some());
            assert_eq!(stored.match_status, MatchStatus::Matched);
        }
        let untouched = fx.store.transaction(TransactionId(3)).unwrap();
        assert!(!untouched.is_cleared);
        assert_eq!(
            fx.notifier.toasts(),
            vec![Toast::Success("Statement reconciled".to_string())]
        );
    }

    #[tokio::test]
    async fn unbalanced_reconciliation_needs_confirmation() {
        let fx = Fixture::new(100_000, 130_500, &[("CLIENT PAYMENT", 50_000), ("RENT", -20_000)]);
        let mut session = fx.open().await;
        let mut rec = session.reconciliation();
        rec.set_cleared(TransactionId(1), true).unwrap();
        rec.set_cleared(TransactionId(2), true).unwrap();
        assert_eq!(rec.difference(), Money::from_cents(500));

        assert!(matches!(
            session.finish_reconciliation(&rec, false).await,
            Err(ReconcileError::Unbalanced { .. })
        ));
        assert_eq!(session.statement().status, StatementStatus::Parsed);
        assert_eq!(fx.store.transaction_writes(), 0);

        session.finish_reconciliation(&rec, true).await.unwrap();
        assert_eq!(session.statement().status, StatementStatus::Reconciled);
    }

    #[tokio::test]
    async fn finish_failure_keeps_statement_status() {
        let fx = Fixture::new(100_000, 150_000, &[("CLIENT PAYMENT", 50_000)]);
        let mut session = fx.open().await;
        let mut rec = session.reconciliation();
        rec.toggle_cleared(TransactionId(1)).unwrap();
        fx.store.set_failures(FailurePlan {
            statement_updates: true,
            ..Default::default()
        });

        let err = session.finish_reconciliation(&rec, false).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Store(_)));
        assert_eq!(session.statement().status, StatementStatus::Parsed);
        assert_eq!(
            fx.store.statement(StatementId(1)).unwrap().status,
            StatementStatus::Parsed
        );
        assert_eq!(fx.notifier.errors().len(), 1);
    }

    #[tokio::test]
    async fn stamp_failure_aborts_before_status_change() {
        let fx = Fixture::new(100_000, 150_000, &[("CLIENT PAYMENT", 50_000)]);
        let mut session = fx.open().await;
        let mut rec = session.reconciliation();
        rec.toggle_cleared(TransactionId(1)).unwrap();
        fx.store.set_failures(FailurePlan {
            transaction_updates: true,
            ..Default::default()
        });

        let err = session.finish_reconciliation(&rec, false).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Incomplete { failed: 1, total: 1 }));
        assert_eq!(
            fx.store.statement(StatementId(1)).unwrap().status,
            StatementStatus::Parsed
        );
        assert!(session.transaction(TransactionId(1)).unwrap().reconciled_at.is_none());
    }

    #[tokio::test]
    async fn reconciled_statement_cannot_be_finished_again() {
        let fx = Fixture::new(0, 0, &[]);
        let mut session = fx.open().await;
        let rec = session.reconciliation();
        session.finish_reconciliation(&rec, false).await.unwrap();
        assert!(matches!(
            session.finish_reconciliation(&rec, false).await,
            Err(ReconcileError::NotReconcilable(StatementStatus::Reconciled))
        ));
    }
}
