use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::models::{Transaction, YearMonth, DEFAULT_SPLIT_PERCENT};

/// One month of spending, laid out along `MonthlyAggregates::categories`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MonthlyRow {
    pub(crate) month: YearMonth,
    pub(crate) amounts: Vec<Decimal>,
    /// Sum of `amounts`; the predictor fed to the regression model.
    pub(crate) total_budget: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct MonthlyAggregates {
    categories: Vec<String>,
    rows: Vec<MonthlyRow>,
}

impl MonthlyAggregates {
    /// Sorted category axis shared by every row.
    pub(crate) fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Rows in ascending month order.
    pub(crate) fn rows(&self) -> &[MonthlyRow] {
        &self.rows
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    #[cfg(test)]
    pub(crate) fn amount(&self, month: YearMonth, category: &str) -> Option<Decimal> {
        let col = self.categories.iter().position(|c| c == category)?;
        self.rows
            .iter()
            .find(|r| r.month == month)
            .and_then(|r| r.amounts.get(col).copied())
    }
}

pub(crate) struct TransactionAggregator {
    default_categories: Vec<String>,
}

impl Default for TransactionAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_SPLIT_PERCENT.iter().map(|(c, _)| (*c).to_string()).collect())
    }
}

impl TransactionAggregator {
    pub(crate) fn new(default_categories: Vec<String>) -> Self {
        Self { default_categories }
    }

    /// Sum expense amounts per (month, category). Returns an empty table when
    /// nothing survives filtering; callers treat that as insufficient data.
    pub(crate) fn aggregate(&self, transactions: &[Transaction]) -> MonthlyAggregates {
        let mut by_month: BTreeMap<YearMonth, BTreeMap<String, Decimal>> = BTreeMap::new();
        let mut undated = 0usize;
        let mut non_expense = 0usize;

        for txn in transactions {
            if !txn.is_expense() {
                non_expense += 1;
                continue;
            }
            let Some(month) = txn.month() else {
                undated += 1;
                continue;
            };
            *by_month
                .entry(month)
                .or_default()
                .entry(txn.normalized_category())
                .or_insert(Decimal::ZERO) += txn.amount;
        }

        if undated > 0 {
            warn!(undated, "skipped transactions without a usable date");
        }
        debug!(
            input = transactions.len(),
            non_expense,
            months = by_month.len(),
            "aggregated transactions"
        );

        if by_month.is_empty() {
            return MonthlyAggregates::default();
        }

        let categories: Vec<String> = by_month
            .values()
            .flat_map(|cats| cats.keys().cloned())
            .chain(self.default_categories.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let rows = by_month
            .into_iter()
            .map(|(month, cats)| {
                let amounts: Vec<Decimal> = categories
                    .iter()
                    .map(|c| cats.get(c).copied().unwrap_or(Decimal::ZERO))
                    .collect();
                let total_budget = amounts.iter().copied().sum();
                MonthlyRow {
                    month,
                    amounts,
                    total_budget,
                }
            })
            .collect();

        MonthlyAggregates { categories, rows }
    }
}
