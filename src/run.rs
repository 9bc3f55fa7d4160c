mod cli;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use tracing::info;

use crate::allocate::{AllocationEngine, AllocationTier};
use crate::artifacts::Artifacts;
use crate::models::{RecommendRequest, RecommendResponse};
use crate::source::TransactionSource;

pub(crate) use cli::as_cli;

/// Serve one recommendation. A source that cannot be read is an error, never
/// an empty history.
pub(crate) fn recommend(
    engine: &AllocationEngine,
    artifacts: &Artifacts,
    source: &dyn TransactionSource,
    request: &RecommendRequest,
) -> Result<(AllocationTier, RecommendResponse)> {
    if request.total_budget < Decimal::ZERO {
        anyhow::bail!("totalBudget must not be negative, got {}", request.total_budget);
    }

    let history = source
        .fetch_user_transactions(&request.email)
        .with_context(|| {
            format!(
                "Failed to fetch history for {} from {}",
                request.email,
                source.describe()
            )
        })?;

    let outcome = engine.allocate(artifacts, &history, request.total_budget);
    info!(
        email = %request.email,
        tier = %outcome.tier,
        history = history.len(),
        categories = outcome.allocations.len(),
        "allocation served"
    );

    Ok((
        outcome.tier,
        RecommendResponse {
            monthly_limit: request.total_budget,
            suggested_categories: outcome.allocations,
        },
    ))
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
