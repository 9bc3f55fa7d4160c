#![allow(clippy::unwrap_used)]

use super::*;
use crate::models::CategoryRatios;
use crate::train::BudgetModel;
use chrono::NaiveDate;
use rust_decimal_macros::dec;

fn txn(date: &str, category: &str, amount: Decimal) -> Transaction {
    Transaction::new(
        NaiveDate::parse_from_str(date, "%Y-%m-%d").ok(),
        category.into(),
        amount,
    )
}

fn engine() -> AllocationEngine {
    AllocationEngine::new(AllocationConfig::default())
}

fn no_artifacts() -> Artifacts {
    Artifacts::default()
}

/// Model where food takes 40% and rent 60% of any budget.
fn proportional_model() -> Artifacts {
    let model = BudgetModel::fit(
        &[1000.0, 2000.0],
        &[vec![400.0, 800.0], vec![600.0, 1200.0]],
    );
    Artifacts::new(
        Some(model),
        vec!["food".into(), "rent".into()],
        Some(CategoryRatios::default_split()),
    )
}

fn ratios_only() -> Artifacts {
    Artifacts::new(
        None,
        Vec::new(),
        Some(CategoryRatios::from_percent(&[("food", 50), ("other", 50)])),
    )
}

fn find<'a>(outcome: &'a AllocationOutcome, category: &str) -> &'a Allocation {
    outcome
        .allocations
        .iter()
        .find(|a| a.category == category)
        .unwrap()
}

fn limit_sum(outcome: &AllocationOutcome) -> Decimal {
    outcome.allocations.iter().map(|a| a.limit).sum()
}

fn rich_history() -> Vec<Transaction> {
    let mut history = Vec::new();
    for day in 1..=5 {
        history.push(txn(&format!("2024-01-{day:02}"), "housing", dec!(50)));
        history.push(txn(&format!("2024-01-{day:02}"), "food", dec!(50)));
    }
    history
}

// ── Scenarios ─────────────────────────────────────────────────

#[test]
fn test_empty_history_no_artifacts_uses_static_heuristic() {
    let outcome = engine().allocate(&no_artifacts(), &[], dec!(1000));
    assert_eq!(outcome.tier, AllocationTier::StaticDefault);
    assert_eq!(
        outcome.allocations,
        vec![
            Allocation::new("housing".into(), dec!(300), dec!(30)),
            Allocation::new("food".into(), dec!(200), dec!(20)),
            Allocation::new("transportation".into(), dec!(120), dec!(12)),
            Allocation::new("entertainment".into(), dec!(80), dec!(8)),
            Allocation::new("savings".into(), dec!(300), dec!(30)),
        ]
    );
}

#[test]
fn test_rich_history_uses_personal_ratios() {
    let outcome = engine().allocate(&no_artifacts(), &rich_history(), dec!(1000));
    assert_eq!(outcome.tier, AllocationTier::Personal);
    assert_eq!(outcome.allocations.len(), 2);
    let housing = find(&outcome, "housing");
    assert_eq!(housing.limit, dec!(500));
    assert_eq!(housing.percent, dec!(50));
    let food = find(&outcome, "food");
    assert_eq!(food.limit, dec!(500));
    assert_eq!(food.percent, dec!(50));
}

#[test]
fn test_thin_history_falls_back_to_static_heuristic() {
    let history = vec![
        txn("2024-01-01", "housing", dec!(800)),
        txn("2024-01-02", "food", dec!(100)),
    ];
    let outcome = engine().allocate(&no_artifacts(), &history, dec!(1000));
    assert_eq!(outcome.tier, AllocationTier::StaticDefault);

    let baseline = engine().allocate(&no_artifacts(), &[], dec!(1000));
    assert_eq!(outcome.allocations, baseline.allocations);
}

// ── Branch selection ──────────────────────────────────────────

#[test]
fn test_month_threshold_alone_is_enough() {
    let history = vec![
        txn("2024-01-01", "food", dec!(10)),
        txn("2024-02-01", "food", dec!(10)),
        txn("2024-03-01", "rent", dec!(20)),
    ];
    let outcome = engine().allocate(&no_artifacts(), &history, dec!(100));
    assert_eq!(outcome.tier, AllocationTier::Personal);
    assert_eq!(find(&outcome, "food").limit, dec!(50));
    assert_eq!(find(&outcome, "rent").limit, dec!(50));
}

#[test]
fn test_transaction_threshold_alone_is_enough() {
    let config = AllocationConfig {
        min_transactions: 2,
        min_months: 12,
    };
    let history = vec![
        txn("2024-01-01", "food", dec!(30)),
        txn("2024-01-02", "rent", dec!(70)),
    ];
    let outcome = AllocationEngine::new(config).allocate(&no_artifacts(), &history, dec!(10));
    assert_eq!(outcome.tier, AllocationTier::Personal);
    assert_eq!(find(&outcome, "food").limit, dec!(3));
    assert_eq!(find(&outcome, "rent").limit, dec!(7));
}

#[test]
fn test_zero_spend_history_takes_fallback_chain() {
    let mut history = rich_history();
    history.push(txn("2024-01-10", "refund", dec!(-500)));
    let outcome = engine().allocate(&ratios_only(), &history, dec!(200));
    assert_eq!(outcome.tier, AllocationTier::GlobalRatios);

    let baseline = engine().allocate(&ratios_only(), &[], dec!(200));
    assert_eq!(outcome, baseline);
}

#[test]
fn test_negative_net_spend_takes_fallback_chain() {
    let mut history = rich_history();
    history.push(txn("2024-01-10", "refund", dec!(-900)));
    let outcome = engine().allocate(&no_artifacts(), &history, dec!(200));
    assert_eq!(outcome.tier, AllocationTier::StaticDefault);
}

#[test]
fn test_history_aliases_merge_categories() {
    let config = AllocationConfig {
        min_transactions: 1,
        min_months: 1,
    };
    let history = vec![
        txn("2024-01-01", "Bills", dec!(25)),
        txn("2024-01-02", "bill", dec!(25)),
        txn("2024-01-03", " Food ", dec!(50)),
    ];
    let outcome = AllocationEngine::new(config).allocate(&no_artifacts(), &history, dec!(100));
    assert_eq!(outcome.allocations.len(), 2);
    assert_eq!(find(&outcome, "bills & fees").limit, dec!(50));
    assert_eq!(find(&outcome, "food").limit, dec!(50));
}

// ── HistorySummary ────────────────────────────────────────────

#[test]
fn test_summary_counts_distinct_months() {
    let history = vec![
        txn("2024-01-01", "food", dec!(1)),
        txn("2024-01-20", "food", dec!(1)),
        txn("2024-02-01", "food", dec!(1)),
        Transaction::new(None, "food".into(), dec!(1)),
    ];
    let summary = HistorySummary::from_transactions(&history);
    assert_eq!(summary.distinct_months, 2);
    assert_eq!(summary.transaction_count, 4);
    assert_eq!(summary.total_spent, dec!(4));
}

#[test]
fn test_summary_without_dates_is_one_month() {
    let history = vec![
        Transaction::new(None, "food".into(), dec!(1)),
        Transaction::new(None, "rent".into(), dec!(2)),
    ];
    let summary = HistorySummary::from_transactions(&history);
    assert_eq!(summary.distinct_months, 1);
    assert_eq!(
        summary.category_totals,
        vec![("food".to_string(), dec!(1)), ("rent".to_string(), dec!(2))]
    );
}

#[test]
fn test_summary_with_only_unparseable_dates_is_one_month() {
    let history: Vec<Transaction> = ["not a date", "31/31/2024"]
        .iter()
        .map(|raw| Transaction::new(crate::models::parse_date(raw), "food".into(), dec!(5)))
        .collect();
    let summary = HistorySummary::from_transactions(&history);
    assert_eq!(summary.distinct_months, 1);
}

#[test]
fn test_summary_threshold_rule() {
    let config = AllocationConfig::default();
    let summary = |count: usize, months: usize, spent: Decimal| HistorySummary {
        category_totals: Vec::new(),
        total_spent: spent,
        transaction_count: count,
        distinct_months: months,
    };
    assert!(summary(10, 1, dec!(1)).qualifies_for_personal(&config));
    assert!(summary(1, 3, dec!(1)).qualifies_for_personal(&config));
    assert!(!summary(9, 2, dec!(1)).qualifies_for_personal(&config));
    assert!(!summary(10, 3, dec!(0)).qualifies_for_personal(&config));
    assert!(!summary(10, 3, dec!(-5)).qualifies_for_personal(&config));
}

// ── Fallback tier order ───────────────────────────────────────

#[test]
fn test_model_tier_wins_over_ratios() {
    let outcome = engine().allocate(&proportional_model(), &[], dec!(1000));
    assert_eq!(outcome.tier, AllocationTier::Model);
    assert_eq!(find(&outcome, "food").limit, dec!(400));
    assert_eq!(find(&outcome, "rent").limit, dec!(600));
    assert_eq!(find(&outcome, "rent").percent, dec!(60));
}

#[test]
fn test_model_tier_used_for_thin_history() {
    let history = vec![txn("2024-01-01", "housing", dec!(800))];
    let outcome = engine().allocate(&proportional_model(), &history, dec!(500));
    assert_eq!(outcome.tier, AllocationTier::Model);
    assert_eq!(limit_sum(&outcome), dec!(500));
}

#[test]
fn test_model_without_categories_is_skipped() {
    let model = BudgetModel::fit(&[1.0, 2.0], &[vec![1.0, 2.0]]);
    let artifacts = Artifacts::new(
        Some(model),
        Vec::new(),
        Some(CategoryRatios::from_percent(&[("food", 100)])),
    );
    let outcome = engine().allocate(&artifacts, &[], dec!(100));
    assert_eq!(outcome.tier, AllocationTier::GlobalRatios);
}

#[test]
fn test_global_ratios_tier() {
    let outcome = engine().allocate(&ratios_only(), &[], dec!(200));
    assert_eq!(outcome.tier, AllocationTier::GlobalRatios);
    assert_eq!(
        outcome.allocations,
        vec![
            Allocation::new("food".into(), dec!(100), dec!(50)),
            Allocation::new("other".into(), dec!(100), dec!(50)),
        ]
    );
}

#[test]
fn test_empty_global_ratios_fall_through() {
    let artifacts = Artifacts::new(None, Vec::new(), Some(CategoryRatios::default()));
    let outcome = engine().allocate(&artifacts, &[], dec!(100));
    assert_eq!(outcome.tier, AllocationTier::StaticDefault);
}

#[test]
fn test_negative_model_predictions_are_not_clamped() {
    let model = BudgetModel::fit(
        &[1000.0, 2000.0],
        &[vec![1200.0, 2400.0], vec![-200.0, -400.0]],
    );
    let artifacts = Artifacts::new(Some(model), vec!["food".into(), "refunds".into()], None);
    let outcome = engine().allocate(&artifacts, &[], dec!(1000));
    assert_eq!(find(&outcome, "refunds").limit, dec!(-200));
    assert_eq!(find(&outcome, "refunds").percent, dec!(-20));
    assert_eq!(find(&outcome, "food").limit, dec!(1200));
}

// ── Normalization ─────────────────────────────────────────────

#[test]
fn test_zero_budget_is_all_zero() {
    for artifacts in [no_artifacts(), ratios_only(), proportional_model()] {
        let outcome = engine().allocate(&artifacts, &[], Decimal::ZERO);
        assert!(!outcome.allocations.is_empty());
        for a in &outcome.allocations {
            assert_eq!(a.limit, Decimal::ZERO);
            assert_eq!(a.percent, Decimal::ZERO);
        }
    }
    let outcome = engine().allocate(&no_artifacts(), &rich_history(), Decimal::ZERO);
    assert_eq!(outcome.tier, AllocationTier::Personal);
    assert!(outcome.allocations.iter().all(|a| a.limit.is_zero() && a.percent.is_zero()));
}

#[test]
fn test_limits_sum_to_budget_within_tolerance() {
    let uneven = vec![
        txn("2024-01-01", "a", dec!(1)),
        txn("2024-02-01", "b", dec!(1)),
        txn("2024-03-01", "c", dec!(1)),
        txn("2024-03-02", "d", dec!(7.77)),
    ];
    let budgets = [
        dec!(0.01),
        dec!(1),
        dec!(100),
        dec!(333.33),
        dec!(1000),
        dec!(1234.56),
        dec!(99999.99),
    ];
    for budget in budgets {
        for artifacts in [no_artifacts(), ratios_only(), proportional_model()] {
            for history in [Vec::new(), uneven.clone()] {
                let outcome = engine().allocate(&artifacts, &history, budget);
                let tolerance = dec!(0.01) * Decimal::from(outcome.allocations.len());
                let diff = (limit_sum(&outcome) - budget).abs();
                assert!(
                    diff <= tolerance,
                    "tier {} budget {budget}: off by {diff}",
                    outcome.tier
                );
            }
        }
    }
}

#[test]
fn test_percent_matches_limit() {
    let outcome = engine().allocate(&no_artifacts(), &[], dec!(777.77));
    for a in &outcome.allocations {
        let expected = (a.limit / dec!(777.77) * dec!(100)).round_dp(2);
        assert_eq!(a.percent, expected);
    }
}

#[test]
fn test_normalize_rescales_rounded_limits() {
    let raw = vec![
        ("a".to_string(), dec!(10)),
        ("b".to_string(), dec!(30)),
    ];
    let allocations = normalize(raw, dec!(100));
    assert_eq!(allocations[0].limit, dec!(25));
    assert_eq!(allocations[1].limit, dec!(75));
    assert_eq!(allocations[1].percent, dec!(75));
}

#[test]
fn test_normalize_thirds() {
    let third = dec!(100) / dec!(3);
    let raw = vec![
        ("a".to_string(), third),
        ("b".to_string(), third),
        ("c".to_string(), third),
    ];
    let allocations = normalize(raw, dec!(100));
    for a in &allocations {
        assert_eq!(a.limit, dec!(33.33));
        assert_eq!(a.percent, dec!(33.33));
    }
}

#[test]
fn test_normalize_non_positive_sum_skips_rescale() {
    let raw = vec![("a".to_string(), dec!(-10)), ("b".to_string(), dec!(5))];
    let allocations = normalize(raw, dec!(100));
    assert_eq!(allocations[0].limit, dec!(-10));
    assert_eq!(allocations[1].limit, dec!(5));
    assert_eq!(allocations[1].percent, dec!(5));
}

#[test]
fn test_static_heuristic_independent_of_budget() {
    for budget in [dec!(1), dec!(50), dec!(2500)] {
        let outcome = engine().allocate(&no_artifacts(), &[], budget);
        let percents: Vec<(String, Decimal)> = outcome
            .allocations
            .iter()
            .map(|a| (a.category.clone(), a.percent))
            .collect();
        assert_eq!(
            percents,
            vec![
                ("housing".to_string(), dec!(30)),
                ("food".to_string(), dec!(20)),
                ("transportation".to_string(), dec!(12)),
                ("entertainment".to_string(), dec!(8)),
                ("savings".to_string(), dec!(30)),
            ]
        );
    }
}

#[test]
fn test_very_large_budgets_allocate_without_overflow() {
    for budget in [dec!(1000000000000000), dec!(100000000000000000000)] {
        let outcome = engine().allocate(&no_artifacts(), &[], budget);
        assert_eq!(outcome.tier, AllocationTier::StaticDefault);
        assert_eq!(find(&outcome, "housing").limit, budget * dec!(0.30));
        assert_eq!(find(&outcome, "housing").percent, dec!(30));
        assert_eq!(limit_sum(&outcome), budget);
    }

    let budget = dec!(1000000000000000);
    let personal = engine().allocate(&no_artifacts(), &rich_history(), budget);
    assert_eq!(personal.tier, AllocationTier::Personal);
    assert_eq!(find(&personal, "food").limit, dec!(500000000000000));

    let ratios = engine().allocate(&ratios_only(), &[], budget);
    assert_eq!(find(&ratios, "other").limit, dec!(500000000000000));
}
