use std::sync::Arc;

use clearbook_categorize::{LearnedRuleMatcher, RuleMatch};
use clearbook_core::{CompanyId, LearnedRule, RuleUpdate};
use clearbook_storage::{RuleStore, StoreError};

use crate::outcome::{Persistence, RuleSaveOutcome};

/// A company's learned rules, cached in memory over a [`RuleStore`].
///
/// The cache is authoritative for matching. Writes go to memory first and
/// are then persisted; a failed write is reported, not rolled back. The
/// next merge into that rule sends the whole rule again, so a rule whose
/// insert was lost reaches the store then.
pub struct RuleRepository {
    company_id: CompanyId,
    store: Arc<dyn RuleStore>,
    matcher: LearnedRuleMatcher,
    rules: Vec<LearnedRule>,
}

impl RuleRepository {
    pub fn new(company_id: CompanyId, store: Arc<dyn RuleStore>, matcher: LearnedRuleMatcher) -> Self {
        Self {
            company_id,
            store,
            matcher,
            rules: Vec::new(),
        }
    }

    /// Replaces the cache with what the store holds now.
    pub async fn load(&mut self) -> Result<(), StoreError> {
        self.rules = self.store.list_rules(self.company_id).await?;
        tracing::debug!(
            "Loaded {} learned rules for company {}",
            self.rules.len(),
            self.company_id
        );
        Ok(())
    }

    pub fn company_id(&self) -> CompanyId {
        self.company_id
    }

    pub fn rules(&self) -> &[LearnedRule] {
        &self.rules
    }

    pub fn matcher(&self) -> &LearnedRuleMatcher {
        &self.matcher
    }

    pub fn find(&self, description: &str) -> Option<RuleMatch<'_>> {
        self.matcher.match_learned_rule(description, &self.rules)
    }

    /// Learns from a manual assignment on a transaction with `description`.
    ///
    /// Merges into the first rule whose pattern equals or fuzzy-matches the
    /// new one, else creates a rule. Never fails: store errors are logged
    /// and come back as [`Persistence::Failed`].
    pub async fn save_learned_rule(&mut self, description: &str, update: &RuleUpdate) -> RuleSaveOutcome {
        if update.is_empty() {
            return RuleSaveOutcome::Skipped;
        }
        let Some(pattern) = self.matcher.learnable_pattern(description) else {
            tracing::debug!("Not learning from '{description}': pattern too short");
            return RuleSaveOutcome::Skipped;
        };

        match self.matcher.find_mergeable_rule(&pattern, &self.rules) {
            Some(idx) => {
                let rule = &mut self.rules[idx];
                rule.merge(update);
                let rule = rule.clone();
                let persistence = persisted(self.store.update_rule(&rule).await, "update", &rule);
                RuleSaveOutcome::Updated {
                    rule_id: rule.id,
                    persistence,
                }
            }
            None => {
                let mut rule = LearnedRule::new(self.company_id, &pattern);
                rule.merge(update);
                self.rules.push(rule.clone());
                let persistence = persisted(self.store.insert_rule(&rule).await, "insert", &rule);
                RuleSaveOutcome::Created {
                    rule_id: rule.id,
                    persistence,
                }
            }
        }
    }
}

fn persisted(result: Result<(), StoreError>, action: &str, rule: &LearnedRule) -> Persistence {
    match result {
        Ok(()) => Persistence::Persisted,
        Err(e) => {
            tracing::warn!(
                "Learned rule {action} failed for '{}' ({}): {e}",
                rule.description_pattern,
                rule.id
            );
            Persistence::Failed(e.to_string())
        }
    }
}
