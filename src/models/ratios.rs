use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Split persisted as the global-ratio artifact by every training run.
/// Its keys are also the default category axis for monthly aggregates.
pub const DEFAULT_SPLIT_PERCENT: &[(&str, i64)] = &[
    ("food", 25),
    ("transport", 15),
    ("bills & fees", 20),
    ("personal", 15),
    ("shopping", 15),
    ("other", 10),
];

/// Terminal fallback tier. Values are kept exactly as published, including
/// the category set, which differs from `DEFAULT_SPLIT_PERCENT`.
pub const STATIC_HEURISTIC_PERCENT: &[(&str, i64)] = &[
    ("housing", 30),
    ("food", 20),
    ("transportation", 12),
    ("entertainment", 8),
    ("savings", 30),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRatio {
    pub category: String,
    pub ratio: Decimal,
}

/// Ordered category → ratio mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryRatios {
    pub ratios: Vec<CategoryRatio>,
}

impl CategoryRatios {
    pub fn from_percent(table: &[(&str, i64)]) -> Self {
        Self {
            ratios: table
                .iter()
                .map(|(category, pct)| CategoryRatio {
                    category: (*category).to_string(),
                    ratio: Decimal::new(*pct, 2),
                })
                .collect(),
        }
    }

    pub fn default_split() -> Self {
        Self::from_percent(DEFAULT_SPLIT_PERCENT)
    }

    pub fn static_heuristic() -> Self {
        Self::from_percent(STATIC_HEURISTIC_PERCENT)
    }

    pub fn is_empty(&self) -> bool {
        self.ratios.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ratios.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CategoryRatio> {
        self.ratios.iter()
    }

    pub fn total(&self) -> Decimal {
        self.ratios.iter().map(|r| r.ratio).sum()
    }
}
