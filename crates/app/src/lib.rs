pub mod config;
pub mod error;
pub mod notify;
pub mod outcome;
pub mod reconcile;
pub mod rules;
pub mod session;

pub use config::EngineConfig;
pub use error::{ConfigError, ReconcileError, SessionError};
pub use notify::{Notifier, RecordingNotifier, Toast, TracingNotifier};
pub use outcome::{
    AiSuggestionReport, AssignmentOutcome, AutoCategorizeReport, BulkWriteOutcome, Persistence,
    RuleSaveOutcome, SiblingOutcome,
};
pub use reconcile::{Reconciliation, ReconciliationSummary};
pub use rules::RuleRepository;
pub use session::{SessionStores, StatementSession};
