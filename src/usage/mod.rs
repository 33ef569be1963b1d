//! Card usage history: record types and the CSV export decoder.

pub mod decoder;
pub mod types;

pub use decoder::decode;
pub use types::{MonthKey, UsageOptions, UsageRecord};
