pub(crate) const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    email      TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS transactions (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id    INTEGER NOT NULL REFERENCES users(id),
    date       TEXT,
    category   TEXT NOT NULL,
    amount     TEXT NOT NULL,
    type       TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_transactions_user ON transactions(user_id);
CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);
"#;

pub(crate) const CURRENT_VERSION: i32 = 1;

/// Migrations from version N to N+1.
/// Each entry is (from_version, sql).
pub(crate) const MIGRATIONS: &[(i32, &str)] = &[];

/// Key column of `users`, in lookup order.
pub(crate) const USER_KEY_COLUMNS: &[&str] = &["id", "userId", "user_id"];

/// Tables that may hold transaction rows, in lookup order.
pub(crate) const TRANSACTION_TABLES: &[&str] = &["transactions", "expenses"];

/// Column in a transaction table referencing the user, in lookup order.
pub(crate) const USER_REF_COLUMNS: &[&str] = &["user_id", "userId"];
