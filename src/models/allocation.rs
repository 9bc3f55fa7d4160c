use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One suggested category limit. `limit` and `percent` are rounded to cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub category: String,
    pub limit: Decimal,
    pub percent: Decimal,
}

impl Allocation {
    pub fn new(category: String, limit: Decimal, percent: Decimal) -> Self {
        Self {
            category,
            limit,
            percent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendRequest {
    pub email: String,
    #[serde(default)]
    pub total_budget: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendResponse {
    pub monthly_limit: Decimal,
    pub suggested_categories: Vec<Allocation>,
}
