pub mod error;
pub mod ids;
pub mod money;
pub mod period;
pub mod rule;
pub mod statement;
pub mod transaction;

pub use error::CoreError;
pub use ids::{CompanyId, PayeeId, ProjectId, RuleId, StatementId, TransactionId};
pub use money::Money;
pub use period::DateRange;
pub use rule::{LearnedRule, RuleUpdate};
pub use statement::{Statement, StatementStatus};
pub use transaction::{BankTransaction, CategorySource, MatchStatus, TransactionUpdate};
