use clearbook_core::LearnedRule;

use crate::normalize::{normalize, tokens};

pub const DEFAULT_FUZZY_THRESHOLD: f32 = 0.6;
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.5;
pub const DEFAULT_MIN_PATTERN_LEN: usize = 2;

/// A learned rule picked for a description, with the score that won.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleMatch<'a> {
    pub rule: &'a LearnedRule,
    pub score: f32,
    pub matched_tokens: usize,
}

/// Token-overlap matching of descriptions against learned rules.
///
/// The two thresholds do not share a denominator: `fuzzy_threshold` divides
/// by the pattern's token count only, `match_threshold` by the larger of the
/// two token counts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearnedRuleMatcher {
    pub fuzzy_threshold: f32,
    pub match_threshold: f32,
    pub min_pattern_len: usize,
}

impl Default for LearnedRuleMatcher {
    fn default() -> Self {
        Self {
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            min_pattern_len: DEFAULT_MIN_PATTERN_LEN,
        }
    }
}

impl LearnedRuleMatcher {
    pub fn new(fuzzy_threshold: f32, match_threshold: f32, min_pattern_len: usize) -> Self {
        Self {
            fuzzy_threshold,
            match_threshold,
            min_pattern_len,
        }
    }

    /// True when at least `fuzzy_threshold` of `pattern`'s tokens appear in
    /// `description`. Not symmetric: check both directions when that matters.
    pub fn fuzzy_match_pattern(&self, description: &str, pattern: &str) -> bool {
        let desc_tokens = tokens(description);
        let pattern_tokens = tokens(pattern);
        if pattern_tokens.is_empty() {
            return false;
        }
        let matches = count_shared(&pattern_tokens, &desc_tokens);
        matches > 0 && matches as f32 / pattern_tokens.len() as f32 >= self.fuzzy_threshold
    }

    pub fn fuzzy_match_either(&self, a: &str, b: &str) -> bool {
        self.fuzzy_match_pattern(a, b) || self.fuzzy_match_pattern(b, a)
    }

    /// Best-scoring rule for a raw description. Rule patterns are
    /// re-normalized here rather than trusted as stored. On a tie the rule
    /// seen first keeps the match.
    pub fn match_learned_rule<'a>(
        &self,
        description: &str,
        rules: &'a [LearnedRule],
    ) -> Option<RuleMatch<'a>> {
        let normalized = normalize(description);
        let desc_tokens = tokens(&normalized);
        if desc_tokens.is_empty() {
            return None;
        }

        let mut best: Option<RuleMatch<'a>> = None;
        for rule in rules {
            let pattern = normalize(&rule.description_pattern);
            let rule_tokens = tokens(&pattern);
            if rule_tokens.is_empty() {
                continue;
            }
            let matched_tokens = count_shared(&rule_tokens, &desc_tokens);
            if matched_tokens == 0 {
                continue;
            }
            let score = matched_tokens as f32 / rule_tokens.len().max(desc_tokens.len()) as f32;
            if score < self.match_threshold {
                continue;
            }
            if best.map_or(true, |b| score > b.score) {
                best = Some(RuleMatch {
                    rule,
                    score,
                    matched_tokens,
                });
            }
        }
        best
    }

    /// Index of the rule a new pattern should be merged into: same
    /// normalized pattern, or a fuzzy match in either direction.
    pub fn find_mergeable_rule(&self, pattern: &str, rules: &[LearnedRule]) -> Option<usize> {
        rules.iter().position(|rule| {
            let existing = normalize(&rule.description_pattern);
            existing == pattern || self.fuzzy_match_either(pattern, &existing)
        })
    }

    /// Normalized pattern for a description, or `None` when it is too short
    /// to be worth learning.
    pub fn learnable_pattern(&self, description: &str) -> Option<String> {
        let pattern = normalize(description);
        (!pattern.is_empty() && pattern.len() >= self.min_pattern_len).then_some(pattern)
    }
}

/// Counts `needles` (with repeats) that occur anywhere in `haystack`.
fn count_shared(needles: &[&str], haystack: &[&str]) -> usize {
    needles.iter().filter(|t| haystack.contains(*t)).count()
}

pub fn fuzzy_match_pattern(description: &str, pattern: &str) -> bool {
    LearnedRuleMatcher::default().fuzzy_match_pattern(description, pattern)
}

pub fn match_learned_rule<'a>(
    description: &str,
    rules: &'a [LearnedRule],
) -> Option<RuleMatch<'a>> {
    LearnedRuleMatcher::default().match_learned_rule(description, rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clearbook_core::{CompanyId, PayeeId};

    fn rule(pattern: &str, category: &str) -> LearnedRule {
        let mut r = LearnedRule::new(CompanyId(1), pattern);
        r.category = Some(category.to_string());
        r
    }

    #[test]
    fn fuzzy_match_at_sixty_percent() {
        // 3 of 5 pattern tokens present = 0.6
        assert!(fuzzy_match_pattern("a b c x y", "a b c d e"));
        // 2 of 5 = 0.4
        assert!(!fuzzy_match_pattern("a b x y z", "a b c d e"));
    }

    #[test]
    fn fuzzy_match_disjoint_is_false() {
        assert!(!fuzzy_match_pattern("shell oil", "adobe creative cloud"));
    }

    #[test]
    fn fuzzy_match_empty_pattern_is_false() {
        assert!(!fuzzy_match_pattern("adobe", ""));
        assert!(!fuzzy_match_pattern("", ""));
    }

    #[test]
    fn fuzzy_match_is_asymmetric() {
        let long = "adobe creative cloud monthly plan";
        let short = "adobe creative";
        // every token of `short` is in `long`
        assert!(fuzzy_match_pattern(long, short));
        // only 2 of 5 tokens of `long` are in `short`
        assert!(!fuzzy_match_pattern(short, long));
        assert!(LearnedRuleMatcher::default().fuzzy_match_either(short, long));
    }

    #[test]
    fn learned_rule_matches_on_token_overlap() {
        let rules = vec![rule("adobe creative cloud", "software")];
        let m = match_learned_rule("CHECKCARD ADOBE CREATIVE CLOUD MONTHLY", &rules).unwrap();
        assert_eq!(m.rule.category.as_deref(), Some("software"));
        assert_eq!(m.matched_tokens, 3);
        assert!((m.score - 0.75).abs() < f32::EPSILON);
    }

    #[test]
    fn learned_rule_needs_half_of_longer_side() {
        // 1 shared token over max(1, 3) = 0.33
        let rules = vec![rule("adobe", "software")];
        assert!(match_learned_rule("ADOBE STOCK IMAGES", &rules).is_none());
        // 1 over max(1, 2) = 0.5
        assert!(match_learned_rule("ADOBE STOCK", &rules).is_some());
    }

    #[test]
    fn learned_rule_picks_highest_score() {
        let rules = vec![rule("shell", "fuel"), rule("shell oil", "vehicle")];
        let m = match_learned_rule("SHELL OIL 57442", &rules).unwrap();
        assert_eq!(m.rule.category.as_deref(), Some("vehicle"));
    }

    #[test]
    fn learned_rule_tie_keeps_first_seen() {
        let rules = vec![rule("acme supply", "first"), rule("acme supply", "second")];
        let m = match_learned_rule("ACME SUPPLY", &rules).unwrap();
        assert_eq!(m.rule.category.as_deref(), Some("first"));
    }

    #[test]
    fn stored_pattern_is_renormalized_at_lookup() {
        let rules = vec![rule("PURCHASE Adobe *XYZ9", "software")];
        assert!(match_learned_rule("adobe", &rules).is_some());
    }

    #[test]
    fn empty_description_matches_nothing() {
        let rules = vec![rule("adobe", "software")];
        assert!(match_learned_rule("#1234 01/02", &rules).is_none());
    }

    #[test]
    fn mergeable_rule_found_by_equality_or_fuzzy() {
        let mut payee_rule = LearnedRule::new(CompanyId(1), "gusto");
        payee_rule.payee_id = Some(PayeeId(4));
        let rules = vec![rule("adobe creative cloud", "software"), payee_rule];
        let matcher = LearnedRuleMatcher::default();
        assert_eq!(matcher.find_mergeable_rule("gusto", &rules), Some(1));
        assert_eq!(matcher.find_mergeable_rule("adobe creative cloud monthly", &rules), Some(0));
        assert_eq!(matcher.find_mergeable_rule("adobe", &rules), Some(0));
        assert_eq!(matcher.find_mergeable_rule("shell oil", &rules), None);
    }

    #[test]
    fn learnable_pattern_rejects_short_keys() {
        let matcher = LearnedRuleMatcher::default();
        assert_eq!(matcher.learnable_pattern("#123 A"), None);
        assert_eq!(matcher.learnable_pattern("$5.00"), None);
        assert_eq!(matcher.learnable_pattern("ADOBE").as_deref(), Some("adobe"));
    }

    #[test]
    fn empty_key_is_never_learnable() {
        let matcher = LearnedRuleMatcher::new(0.6, 0.5, 0);
        assert_eq!(matcher.learnable_pattern("$5.00 01/15/2024"), None);
        assert_eq!(matcher.learnable_pattern("X").as_deref(), Some("x"));
    }
}
