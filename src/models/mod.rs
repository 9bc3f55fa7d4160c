mod allocation;
mod category;
mod ratios;
mod transaction;

pub use allocation::{Allocation, RecommendRequest, RecommendResponse};
pub use ratios::{CategoryRatios, DEFAULT_SPLIT_PERCENT};
pub use transaction::{coerce_amount, parse_date, Transaction, TransactionKind, YearMonth};
