mod csv_dataset;

use anyhow::Result;

use crate::models::Transaction;

pub(crate) use csv_dataset::CsvDataset;

/// Where transaction history comes from. Implementations own any schema
/// discovery; callers only see `Transaction` rows.
pub(crate) trait TransactionSource {
    /// Rows for one user, oldest first. An unknown user is an empty list,
    /// an unreachable source is an error.
    fn fetch_user_transactions(&self, email: &str) -> Result<Vec<Transaction>>;

    /// Every row across all users.
    fn fetch_all_transactions(&self) -> Result<Vec<Transaction>>;

    fn describe(&self) -> String;
}
