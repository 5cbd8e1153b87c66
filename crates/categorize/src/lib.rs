pub mod keywords;
pub mod learned;
pub mod match_engine;
pub mod normalize;

pub use keywords::{KeywordClassifier, KeywordRule};
pub use learned::{
    fuzzy_match_pattern, match_learned_rule, LearnedRuleMatcher, RuleMatch, DEFAULT_FUZZY_THRESHOLD,
    DEFAULT_MATCH_THRESHOLD, DEFAULT_MIN_PATTERN_LEN,
};
pub use match_engine::{ExternalRecord, MatchResult, RecordKind, RecordMatcher};
pub use normalize::{normalize, tokens};
