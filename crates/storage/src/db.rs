use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use clearbook_core::{
    BankTransaction, CategorySource, CompanyId, DateRange, LearnedRule, MatchStatus, Money,
    PayeeId, ProjectId, RuleId, Statement, StatementId, StatementStatus, TransactionId,
    TransactionUpdate,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, QueryBuilder, Sqlite};
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::{CategoryCatalog, RuleStore, TransactionStore};

pub type DbPool = Pool<Sqlite>;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub async fn create_db(path: &Path) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    tracing::debug!("Opened ledger database at {}", path.display());
    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bank_statements (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            company_id INTEGER NOT NULL,
            beginning_balance_cents INTEGER NOT NULL,
            ending_balance_cents INTEGER NOT NULL,
            period_start TEXT NOT NULL,
            period_end TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bank_transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            statement_id INTEGER NOT NULL,
            date TEXT NOT NULL,
            description TEXT NOT NULL,
            amount_cents INTEGER NOT NULL,
            category TEXT,
            category_source TEXT,
            payee_id INTEGER,
            project_id INTEGER,
            match_status TEXT NOT NULL DEFAULT 'unmatched',
            is_cleared INTEGER NOT NULL DEFAULT 0,
            reconciled_at TEXT,
            FOREIGN KEY (statement_id) REFERENCES bank_statements(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS learned_rules (
            id TEXT PRIMARY KEY,
            company_id INTEGER NOT NULL,
            description_pattern TEXT NOT NULL,
            category TEXT,
            payee_id INTEGER,
            project_id INTEGER,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            company_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            PRIMARY KEY (company_id, name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

type StatementRow = (i64, i64, i64, i64, String, String, String);

type TransactionRow = (
    i64,
    i64,
    String,
    String,
    i64,
    Option<String>,
    Option<String>,
    Option<i64>,
    Option<i64>,
    String,
    i64,
    Option<String>,
);

type RuleRow = (String, i64, String, Option<String>, Option<i64>, Option<i64>);

fn parse_date(s: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| StoreError::Corrupt(format!("date '{s}': {e}")))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("timestamp '{s}': {e}")))
}

fn statement_from_row(r: StatementRow) -> Result<Statement, StoreError> {
    Ok(Statement {
        id: StatementId(r.0),
        company_id: CompanyId(r.1),
        beginning_balance: Money::from_cents(r.2),
        ending_balance: Money::from_cents(r.3),
        period: DateRange::new(parse_date(&r.4)?, parse_date(&r.5)?)?,
        status: r.6.parse()?,
    })
}

fn transaction_from_row(r: TransactionRow) -> Result<BankTransaction, StoreError> {
    Ok(BankTransaction {
        id: TransactionId(r.0),
        statement_id: StatementId(r.1),
        date: parse_date(&r.2)?,
        description: r.3,
        amount: Money::from_cents(r.4),
        category: r.5,
        category_source: r.6.as_deref().map(str::parse::<CategorySource>).transpose()?,
        payee_id: r.7.map(PayeeId),
        project_id: r.8.map(ProjectId),
        match_status: r.9.parse::<MatchStatus>()?,
        is_cleared: r.10 != 0,
        reconciled_at: r.11.as_deref().map(parse_timestamp).transpose()?,
    })
}

fn rule_from_row(r: RuleRow) -> Result<LearnedRule, StoreError> {
    let id = Uuid::parse_str(&r.0).map_err(|e| StoreError::Corrupt(format!("rule id: {e}")))?;
    Ok(LearnedRule {
        id: RuleId(id),
        company_id: CompanyId(r.1),
        description_pattern: r.2,
        category: r.3,
        payee_id: r.4.map(PayeeId),
        project_id: r.5.map(ProjectId),
    })
}

/// SQLite-backed implementation of every store trait.
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self::new(create_db(path).await?))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn insert_statement(
        &self,
        company_id: CompanyId,
        beginning_balance: Money,
        ending_balance: Money,
        period: DateRange,
    ) -> Result<StatementId, StoreError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO bank_statements (company_id, beginning_balance_cents, ending_balance_cents, period_start, period_end) VALUES (?, ?, ?, ?, ?) RETURNING id"
        )
        .bind(company_id.0)
        .bind(beginning_balance.to_cents())
        .bind(ending_balance.to_cents())
        .bind(period.start.format(DATE_FORMAT).to_string())
        .bind(period.end.format(DATE_FORMAT).to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(StatementId(id))
    }

    pub async fn insert_transaction(
        &self,
        statement_id: StatementId,
        date: NaiveDate,
        description: &str,
        amount: Money,
    ) -> Result<TransactionId, StoreError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO bank_transactions (statement_id, date, description, amount_cents) VALUES (?, ?, ?, ?) RETURNING id"
        )
        .bind(statement_id.0)
        .bind(date.format(DATE_FORMAT).to_string())
        .bind(description)
        .bind(amount.to_cents())
        .fetch_one(&self.pool)
        .await?;
        Ok(TransactionId(id))
    }

    pub async fn add_category(&self, company_id: CompanyId, name: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT OR IGNORE INTO categories (company_id, name) VALUES (?, ?)")
            .bind(company_id.0)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TransactionStore for SqliteStore {
    async fn get_statement(&self, id: StatementId) -> Result<Statement, StoreError> {
        let row = sqlx::query_as::<_, StatementRow>(
            "SELECT id, company_id, beginning_balance_cents, ending_balance_cents, period_start, period_end, status FROM bank_statements WHERE id = ?"
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("statement {id}")))?;
        statement_from_row(row)
    }

    async fn list_transactions(
        &self,
        statement_id: StatementId,
    ) -> Result<Vec<BankTransaction>, StoreError> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT id, statement_id, date, description, amount_cents, category, category_source, payee_id, project_id, match_status, is_cleared, reconciled_at FROM bank_transactions WHERE statement_id = ? ORDER BY date, id"
        )
        .bind(statement_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(transaction_from_row).collect()
    }

    async fn update_transaction(
        &self,
        id: TransactionId,
        update: &TransactionUpdate,
    ) -> Result<(), StoreError> {
        if update.is_empty() {
            return Ok(());
        }

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE bank_transactions SET ");
        let mut set = qb.separated(", ");
        if let Some(category) = &update.category {
            set.push("category = ").push_bind_unseparated(category.clone());
        }
        if let Some(source) = update.category_source {
            set.push("category_source = ")
                .push_bind_unseparated(source.map(CategorySource::as_str));
        }
        if let Some(payee) = update.payee_id {
            set.push("payee_id = ").push_bind_unseparated(payee.map(|p| p.0));
        }
        if let Some(project) = update.project_id {
            set.push("project_id = ").push_bind_unseparated(project.map(|p| p.0));
        }
        if let Some(status) = update.match_status {
            set.push("match_status = ").push_bind_unseparated(status.as_str());
        }
        if let Some(cleared) = update.is_cleared {
            set.push("is_cleared = ").push_bind_unseparated(i64::from(cleared));
        }
        if let Some(at) = update.reconciled_at {
            set.push("reconciled_at = ")
                .push_bind_unseparated(at.map(|t| t.to_rfc3339()));
        }
        qb.push(" WHERE id = ").push_bind(id.0);

        let result = qb.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("transaction {id}")));
        }
        Ok(())
    }

    async fn update_statement_status(
        &self,
        id: StatementId,
        status: StatementStatus,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE bank_statements SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("statement {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl RuleStore for SqliteStore {
    async fn list_rules(&self, company_id: CompanyId) -> Result<Vec<LearnedRule>, StoreError> {
        let rows = sqlx::query_as::<_, RuleRow>(
            "SELECT id, company_id, description_pattern, category, payee_id, project_id FROM learned_rules WHERE company_id = ? ORDER BY created_at, rowid"
        )
        .bind(company_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(rule_from_row).collect()
    }

    async fn insert_rule(&self, rule: &LearnedRule) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO learned_rules (id, company_id, description_pattern, category, payee_id, project_id) VALUES (?, ?, ?, ?, ?, ?)"
        )
        .bind(rule.id.0.to_string())
        .bind(rule.company_id.0)
        .bind(&rule.description_pattern)
        .bind(&rule.category)
        .bind(rule.payee_id.map(|p| p.0))
        .bind(rule.project_id.map(|p| p.0))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_rule(&self, rule: &LearnedRule) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO learned_rules (id, company_id, description_pattern, category, payee_id, project_id) VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET description_pattern = excluded.description_pattern, category = excluded.category, payee_id = excluded.payee_id, project_id = excluded.project_id"
        )
        .bind(rule.id.0.to_string())
        .bind(rule.company_id.0)
        .bind(&rule.description_pattern)
        .bind(&rule.category)
        .bind(rule.payee_id.map(|p| p.0))
        .bind(rule.project_id.map(|p| p.0))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CategoryCatalog for SqliteStore {
    async fn categories(&self, company_id: CompanyId) -> Result<Vec<String>, StoreError> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT name FROM categories WHERE company_id = ? ORDER BY name",
        )
        .bind(company_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }
}
