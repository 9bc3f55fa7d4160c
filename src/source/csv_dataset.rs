use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use super::TransactionSource;
use crate::models::{coerce_amount, parse_date, Transaction, TransactionKind};

/// Column positions resolved from the header row.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct DatasetColumns {
    pub(crate) date: Option<usize>,
    pub(crate) category: usize,
    pub(crate) amount: usize,
    pub(crate) kind: Option<usize>,
    pub(crate) email: Option<usize>,
}

impl DatasetColumns {
    /// Header names are matched case-insensitively.
    pub(crate) fn detect(headers: &[String]) -> Result<Self> {
        let h: Vec<String> = headers.iter().map(|s| s.trim().to_lowercase()).collect();
        let find = |name: &str| h.iter().position(|c| c == name);

        Ok(Self {
            date: find("date"),
            category: find("category").context("Dataset has no 'category' column")?,
            amount: find("amount").context("Dataset has no 'amount' column")?,
            kind: find("type"),
            email: find("email"),
        })
    }
}

/// Offline transaction dataset, used for training when the store has nothing.
pub(crate) struct CsvDataset {
    path: PathBuf,
}

impl CsvDataset {
    pub(crate) fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub(crate) fn exists(&self) -> bool {
        self.path.exists()
    }

    fn read(&self) -> Result<(DatasetColumns, Vec<Vec<String>>)> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(true)
            .from_path(&self.path)
            .with_context(|| format!("Failed to open dataset: {}", self.path.display()))?;

        let headers: Vec<String> = rdr
            .headers()
            .context("Failed to read dataset header")?
            .iter()
            .map(|s| s.to_string())
            .collect();
        let columns = DatasetColumns::detect(&headers)?;

        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result.context("Failed to read dataset record")?;
            rows.push(record.iter().map(|s| s.to_string()).collect());
        }
        Ok((columns, rows))
    }
}

/// Turn raw rows into transactions. Rows never fail: bad amounts become zero
/// and bad dates become `None`.
pub(crate) fn parse_rows(rows: &[Vec<String>], columns: &DatasetColumns) -> Vec<Transaction> {
    rows.iter()
        .map(|row| {
            let date = columns.date.and_then(|c| parse_date(field(row, c)));
            let txn = Transaction::new(
                date,
                field(row, columns.category).to_string(),
                coerce_amount(field(row, columns.amount)),
            );
            match columns.kind {
                Some(c) => txn.with_kind(TransactionKind::parse(field(row, c))),
                None => txn,
            }
        })
        .collect()
}

fn field(row: &[String], col: usize) -> &str {
    row.get(col).map(|s| s.trim()).unwrap_or("")
}

impl TransactionSource for CsvDataset {
    fn fetch_user_transactions(&self, email: &str) -> Result<Vec<Transaction>> {
        let (columns, rows) = self.read()?;
        let email_col = columns.email.with_context(|| {
            format!(
                "Dataset {} has no 'email' column to filter by",
                self.path.display()
            )
        })?;
        let wanted = email.trim().to_lowercase();
        let rows: Vec<Vec<String>> = rows
            .into_iter()
            .filter(|r| {
                r.get(email_col)
                    .is_some_and(|e| e.trim().to_lowercase() == wanted)
            })
            .collect();
        Ok(parse_rows(&rows, &columns))
    }

    fn fetch_all_transactions(&self) -> Result<Vec<Transaction>> {
        let (columns, rows) = self.read()?;
        Ok(parse_rows(&rows, &columns))
    }

    fn describe(&self) -> String {
        format!("dataset {}", self.path.display())
    }
}

#[cfg(test)]
#[path = "csv_dataset_tests.rs"]
mod tests;
