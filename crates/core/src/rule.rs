use serde::{Deserialize, Serialize};

use crate::ids::{CompanyId, PayeeId, ProjectId, RuleId};

/// A user-confirmed mapping from a normalized description to category/payee/project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedRule {
    pub id: RuleId,
    pub company_id: CompanyId,
    /// Normalized merchant signature, e.g. `"adobe creative cloud"`.
    pub description_pattern: String,
    pub category: Option<String>,
    pub payee_id: Option<PayeeId>,
    pub project_id: Option<ProjectId>,
}

impl LearnedRule {
    pub fn new(company_id: CompanyId, description_pattern: &str) -> Self {
        LearnedRule {
            id: RuleId::new(),
            company_id,
            description_pattern: description_pattern.to_string(),
            category: None,
            payee_id: None,
            project_id: None,
        }
    }

    /// Copies every field the update touches; untouched fields keep their value.
    pub fn merge(&mut self, update: &RuleUpdate) {
        if let Some(category) = &update.category {
            self.category = Some(category.clone());
        }
        if let Some(payee) = update.payee_id {
            self.payee_id = Some(payee);
        }
        if let Some(project) = update.project_id {
            self.project_id = Some(project);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.category.is_none() && self.payee_id.is_none() && self.project_id.is_none()
    }
}

/// Fields a manual assignment contributes to a learned rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleUpdate {
    pub category: Option<String>,
    pub payee_id: Option<PayeeId>,
    pub project_id: Option<ProjectId>,
}

impl RuleUpdate {
    pub fn category(category: &str) -> Self {
        RuleUpdate {
            category: Some(category.to_string()),
            ..Default::default()
        }
    }

    pub fn payee(payee_id: PayeeId) -> Self {
        RuleUpdate {
            payee_id: Some(payee_id),
            ..Default::default()
        }
    }

    pub fn project(project_id: ProjectId) -> Self {
        RuleUpdate {
            project_id: Some(project_id),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.category.is_none() && self.payee_id.is_none() && self.project_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_fields_the_update_leaves_alone() {
        let mut rule = LearnedRule::new(CompanyId(1), "adobe creative cloud");
        rule.merge(&RuleUpdate::category("software"));
        rule.merge(&RuleUpdate::payee(PayeeId(9)));
        assert_eq!(rule.category.as_deref(), Some("software"));
        assert_eq!(rule.payee_id, Some(PayeeId(9)));
        assert_eq!(rule.project_id, None);
    }

    #[test]
    fn merge_overwrites_touched_fields() {
        let mut rule = LearnedRule::new(CompanyId(1), "shell oil");
        rule.merge(&RuleUpdate::category("fuel"));
        rule.merge(&RuleUpdate::category("vehicle"));
        assert_eq!(rule.category.as_deref(), Some("vehicle"));
    }

    #[test]
    fn fresh_rule_is_empty() {
        assert!(LearnedRule::new(CompanyId(1), "x y").is_empty());
        assert!(RuleUpdate::default().is_empty());
        assert!(!RuleUpdate::project(ProjectId(2)).is_empty());
    }
}
