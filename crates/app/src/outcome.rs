use clearbook_core::{RuleId, TransactionId};
use serde::Serialize;

/// Whether a change that is already applied in memory reached the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum Persistence {
    Persisted,
    Failed(String),
}

impl Persistence {
    pub fn is_persisted(&self) -> bool {
        matches!(self, Persistence::Persisted)
    }
}

/// Result of learning from a manual assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleSaveOutcome {
    /// Nothing learned: the pattern was too short or the update carried no fields.
    Skipped,
    Created {
        rule_id: RuleId,
        persistence: Persistence,
    },
    Updated {
        rule_id: RuleId,
        persistence: Persistence,
    },
}

impl RuleSaveOutcome {
    pub fn rule_id(&self) -> Option<RuleId> {
        match self {
            RuleSaveOutcome::Skipped => None,
            RuleSaveOutcome::Created { rule_id, .. } | RuleSaveOutcome::Updated { rule_id, .. } => {
                Some(*rule_id)
            }
        }
    }

    /// True when the in-memory rule set no longer matches the store.
    pub fn diverged(&self) -> bool {
        match self {
            RuleSaveOutcome::Skipped => false,
            RuleSaveOutcome::Created { persistence, .. }
            | RuleSaveOutcome::Updated { persistence, .. } => !persistence.is_persisted(),
        }
    }
}

/// Result of a best-effort bulk write. Every id in `applied` changed in
/// memory; the ones also listed in `failed` never reached the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkWriteOutcome {
    pub applied: Vec<TransactionId>,
    pub failed: Vec<(TransactionId, String)>,
}

impl BulkWriteOutcome {
    pub fn persisted(&self) -> usize {
        self.applied.len() - self.failed.len()
    }

    pub fn diverged(&self) -> bool {
        !self.failed.is_empty()
    }
}

pub type SiblingOutcome = BulkWriteOutcome;

/// What a manual category/payee/project assignment set in motion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentOutcome {
    pub rule: RuleSaveOutcome,
    pub siblings: SiblingOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AutoCategorizeReport {
    pub by_rule: usize,
    pub by_keyword: usize,
    /// A rule or keyword fired but named a category the company does not have.
    pub rejected_categories: usize,
    pub unmatched: usize,
    pub writes: BulkWriteOutcome,
}

impl AutoCategorizeReport {
    pub fn categorized(&self) -> usize {
        self.by_rule + self.by_keyword
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AiSuggestionReport {
    pub rejected: Vec<(TransactionId, String)>,
    pub writes: BulkWriteOutcome,
}
