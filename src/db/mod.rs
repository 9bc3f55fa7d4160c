mod schema;

use anyhow::{Context, Result};
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use std::path::Path;
use tracing::debug;

use crate::models::{coerce_amount, parse_date, Transaction, TransactionKind};
use crate::source::TransactionSource;

pub(crate) struct Database {
    conn: Connection,
    label: String,
}

impl Database {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .context("Failed to set database pragmas")?;
        let mut db = Self {
            conn,
            label: path.display().to_string(),
        };
        db.migrate().context("Database migration failed")?;
        Ok(db)
    }

    /// Like `open`, but a missing file is an error instead of a new store.
    pub(crate) fn open_existing(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("No transaction store at {}", path.display());
        }
        Self::open(path)
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let mut db = Self::from_connection(conn);
        db.migrate()?;
        Ok(db)
    }

    /// Wrap a connection whose schema was created elsewhere.
    #[cfg(test)]
    pub(crate) fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            label: ":memory:".into(),
        }
    }

    fn migrate(&mut self) -> Result<()> {
        let has_version_table: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            [],
            |row| row.get(0),
        )?;

        if !has_version_table {
            self.conn.execute_batch(schema::SCHEMA_V1)?;
            self.conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![schema::CURRENT_VERSION],
            )?;
            return Ok(());
        }

        let current: i32 = self
            .conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()?
            .unwrap_or(0);

        for &(from_version, sql) in schema::MIGRATIONS {
            if current <= from_version {
                self.conn.execute_batch(sql)?;
            }
        }

        if current < schema::CURRENT_VERSION {
            self.conn.execute(
                "UPDATE schema_version SET version = ?1",
                params![schema::CURRENT_VERSION],
            )?;
        }

        Ok(())
    }

    // ── Users ─────────────────────────────────────────────────

    pub(crate) fn get_or_create_user(&self, email: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT OR IGNORE INTO users (email, created_at) VALUES (?1, ?2)",
            params![email, chrono::Utc::now().to_rfc3339()],
        )?;
        self.find_user_id(email)?
            .with_context(|| format!("User '{email}' missing after insert"))
    }

    fn find_user_id(&self, email: &str) -> Result<Option<i64>> {
        let columns = self.table_columns("users")?;
        if columns.is_empty() {
            anyhow::bail!("Store has no users table");
        }

        for key in schema::USER_KEY_COLUMNS {
            if !has_column(&columns, key) {
                continue;
            }
            let id: Option<i64> = self
                .conn
                .query_row(
                    &format!("SELECT {key} FROM users WHERE email = ?1"),
                    params![email],
                    |row| row.get(0),
                )
                .optional()
                .with_context(|| format!("Failed to look up user by users.{key}"))?;
            if id.is_some() {
                return Ok(id);
            }
        }
        Ok(None)
    }

    // ── Transactions ──────────────────────────────────────────

    pub(crate) fn insert_transactions_batch(
        &mut self,
        user_id: i64,
        txns: &[Transaction],
    ) -> Result<usize> {
        let now = chrono::Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO transactions (user_id, date, category, amount, type, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for txn in txns {
                stmt.execute(params![
                    user_id,
                    txn.date.map(|d| d.format("%Y-%m-%d").to_string()),
                    txn.category,
                    txn.amount.to_string(),
                    txn.kind.map(|k| k.as_str()),
                    now,
                ])?;
            }
        }
        tx.commit()?;
        Ok(txns.len())
    }

    pub(crate) fn get_user_transaction_count(&self, user_id: i64) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?)
    }

    fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(&format!("PRAGMA table_info({table})"))?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// First candidate table holding rows wins. `user_id: None` reads all users.
    fn query_transactions(&self, user_id: Option<i64>) -> Result<Vec<Transaction>> {
        for table in schema::TRANSACTION_TABLES {
            let columns = self.table_columns(table)?;
            if !has_column(&columns, "category") || !has_column(&columns, "amount") {
                continue;
            }

            let date_col = if has_column(&columns, "date") { "date" } else { "NULL" };
            let kind_col = if has_column(&columns, "type") { "type" } else { "NULL" };
            let select = format!("SELECT {date_col}, category, amount, {kind_col} FROM {table}");

            let txns = match user_id {
                Some(id) => {
                    let Some(user_col) = schema::USER_REF_COLUMNS
                        .iter()
                        .find(|c| has_column(&columns, c))
                    else {
                        continue;
                    };
                    let sql = format!("{select} WHERE {user_col} = ?1 ORDER BY rowid");
                    let mut stmt = self.conn.prepare(&sql)?;
                    let rows = stmt.query_map(params![id], row_to_transaction)?;
                    rows.collect::<std::result::Result<Vec<_>, _>>()
                }
                None => {
                    let mut stmt = self.conn.prepare(&format!("{select} ORDER BY rowid"))?;
                    let rows = stmt.query_map([], row_to_transaction)?;
                    rows.collect::<std::result::Result<Vec<_>, _>>()
                }
            }
            .with_context(|| format!("Failed to read transactions from {table}"))?;

            if !txns.is_empty() {
                debug!(table, rows = txns.len(), "read transactions");
                return Ok(txns);
            }
        }
        Ok(Vec::new())
    }
}

impl TransactionSource for Database {
    fn fetch_user_transactions(&self, email: &str) -> Result<Vec<Transaction>> {
        match self.find_user_id(email)? {
            Some(id) => self.query_transactions(Some(id)),
            None => Ok(Vec::new()),
        }
    }

    fn fetch_all_transactions(&self) -> Result<Vec<Transaction>> {
        self.query_transactions(None)
    }

    fn describe(&self) -> String {
        format!("store {}", self.label)
    }
}

fn has_column(columns: &[String], name: &str) -> bool {
    columns.iter().any(|c| c.eq_ignore_ascii_case(name))
}

fn row_to_transaction(row: &rusqlite::Row<'_>) -> rusqlite::Result<Transaction> {
    let date = match row.get::<_, Value>(0)? {
        Value::Text(s) => parse_date(&s),
        _ => None,
    };
    let category = match row.get::<_, Value>(1)? {
        Value::Text(s) => s,
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        _ => String::new(),
    };
    let amount = amount_from_value(row.get(2)?);
    let kind = match row.get::<_, Value>(3)? {
        Value::Text(s) => Some(TransactionKind::parse(&s)),
        _ => None,
    };

    Ok(Transaction {
        date,
        category,
        amount,
        kind,
    })
}

/// Amount columns may be TEXT, INTEGER or REAL depending on who wrote them.
fn amount_from_value(value: Value) -> Decimal {
    match value {
        Value::Integer(i) => Decimal::from(i),
        Value::Real(f) => Decimal::try_from(f).unwrap_or(Decimal::ZERO),
        Value::Text(s) => coerce_amount(&s),
        Value::Null | Value::Blob(_) => Decimal::ZERO,
    }
}
