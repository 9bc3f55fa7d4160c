//! Per-request budget allocation.
//!
//! Tier order is fixed: personal history (when there is enough of it), then
//! the trained model, then the global-ratio artifact, then the static
//! heuristic. Whatever tier answers, the normalization pass makes the limits
//! add up to the requested budget.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::artifacts::Artifacts;
use crate::models::{Allocation, CategoryRatios, Transaction};

pub(crate) const DEFAULT_MIN_TRANSACTIONS: usize = 10;
pub(crate) const DEFAULT_MIN_MONTHS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AllocationTier {
    Personal,
    Model,
    GlobalRatios,
    StaticDefault,
}

impl AllocationTier {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Model => "model",
            Self::GlobalRatios => "global_ratios",
            Self::StaticDefault => "static_default",
        }
    }
}

impl std::fmt::Display for AllocationTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// History needed before a user's own spending pattern is trusted. Either
/// threshold is enough.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AllocationConfig {
    pub(crate) min_transactions: usize,
    pub(crate) min_months: usize,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            min_transactions: DEFAULT_MIN_TRANSACTIONS,
            min_months: DEFAULT_MIN_MONTHS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AllocationOutcome {
    pub(crate) tier: AllocationTier,
    pub(crate) allocations: Vec<Allocation>,
}

/// What the engine needs to know about a user's history.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct HistorySummary {
    /// Sorted by normalized category name.
    pub(crate) category_totals: Vec<(String, Decimal)>,
    pub(crate) total_spent: Decimal,
    pub(crate) transaction_count: usize,
    pub(crate) distinct_months: usize,
}

impl HistorySummary {
    pub(crate) fn from_transactions(transactions: &[Transaction]) -> Self {
        let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();
        for txn in transactions {
            *totals
                .entry(txn.normalized_category())
                .or_insert(Decimal::ZERO) += txn.amount;
        }
        let total_spent = totals.values().copied().sum();

        let months: BTreeSet<_> = transactions.iter().filter_map(Transaction::month).collect();
        // Without any dates the whole history counts as a single month.
        let distinct_months = if transactions.iter().all(|t| t.date.is_none()) {
            1
        } else {
            months.len()
        };

        Self {
            category_totals: totals.into_iter().collect(),
            total_spent,
            transaction_count: transactions.len(),
            distinct_months,
        }
    }

    pub(crate) fn qualifies_for_personal(&self, config: &AllocationConfig) -> bool {
        self.total_spent > Decimal::ZERO
            && (self.transaction_count >= config.min_transactions
                || self.distinct_months >= config.min_months)
    }
}

pub(crate) struct AllocationEngine {
    config: AllocationConfig,
}

impl AllocationEngine {
    pub(crate) fn new(config: AllocationConfig) -> Self {
        Self { config }
    }

    pub(crate) fn allocate(
        &self,
        artifacts: &Artifacts,
        history: &[Transaction],
        total_budget: Decimal,
    ) -> AllocationOutcome {
        let (tier, raw) = if history.is_empty() {
            fallback_chain(artifacts, total_budget)
        } else {
            let summary = HistorySummary::from_transactions(history);
            debug!(
                transactions = summary.transaction_count,
                months = summary.distinct_months,
                total_spent = %summary.total_spent,
                "summarized user history"
            );
            if summary.qualifies_for_personal(&self.config) {
                (
                    AllocationTier::Personal,
                    personal_limits(&summary, total_budget),
                )
            } else {
                fallback_chain(artifacts, total_budget)
            }
        };

        AllocationOutcome {
            tier,
            allocations: normalize(raw, total_budget),
        }
    }
}

fn personal_limits(summary: &HistorySummary, total_budget: Decimal) -> Vec<(String, Decimal)> {
    summary
        .category_totals
        .iter()
        .map(|(category, spent)| {
            (
                category.clone(),
                total_budget * (*spent / summary.total_spent),
            )
        })
        .collect()
}

/// Model, then global ratios, then the static heuristic. The heuristic
/// always answers.
pub(crate) fn fallback_chain(
    artifacts: &Artifacts,
    total_budget: Decimal,
) -> (AllocationTier, Vec<(String, Decimal)>) {
    if let Some(model) = artifacts
        .model()
        .filter(|_| !artifacts.categories().is_empty())
    {
        // Predictions are used as-is, negative ones included.
        let predictions = model.predict(total_budget.to_f64().unwrap_or(0.0));
        let raw = artifacts
            .categories()
            .iter()
            .zip(predictions)
            .map(|(category, amount)| {
                (
                    category.clone(),
                    Decimal::try_from(amount).unwrap_or(Decimal::ZERO),
                )
            })
            .collect();
        return (AllocationTier::Model, raw);
    }

    if let Some(ratios) = artifacts.global_ratios().filter(|r| !r.is_empty()) {
        return (AllocationTier::GlobalRatios, apply_ratios(ratios, total_budget));
    }

    (
        AllocationTier::StaticDefault,
        apply_ratios(&CategoryRatios::static_heuristic(), total_budget),
    )
}

fn apply_ratios(ratios: &CategoryRatios, total_budget: Decimal) -> Vec<(String, Decimal)> {
    ratios
        .iter()
        .map(|r| (r.category.clone(), total_budget * r.ratio))
        .collect()
}

fn round_cents(d: Decimal) -> Decimal {
    d.round_dp(2)
}

/// Round to cents, rescale so the limits sum to `total_budget`, round again
/// and derive percents. A zero budget yields all-zero limits and percents.
pub(crate) fn normalize(raw: Vec<(String, Decimal)>, total_budget: Decimal) -> Vec<Allocation> {
    if total_budget.is_zero() {
        return raw
            .into_iter()
            .map(|(category, _)| Allocation::new(category, Decimal::ZERO, Decimal::ZERO))
            .collect();
    }

    let rounded: Vec<(String, Decimal)> = raw
        .into_iter()
        .map(|(category, limit)| (category, round_cents(limit)))
        .collect();
    // An overflowing sum leaves the limits unscaled.
    let factor = rounded
        .iter()
        .try_fold(Decimal::ZERO, |acc, (_, limit)| acc.checked_add(*limit))
        .filter(|sum| *sum > Decimal::ZERO)
        .and_then(|sum| total_budget.checked_div(sum));

    let hundred = Decimal::ONE_HUNDRED;
    rounded
        .into_iter()
        .map(|(category, limit)| {
            let limit = match factor.and_then(|f| limit.checked_mul(f)) {
                Some(scaled) => round_cents(scaled),
                None => limit,
            };
            let percent = limit
                .checked_div(total_budget)
                .and_then(|share| share.checked_mul(hundred))
                .map_or(Decimal::ZERO, round_cents);
            Allocation::new(category, limit, percent)
        })
        .collect()
}

#[cfg(test)]
mod tests;
