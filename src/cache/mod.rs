//! Per-card, per-month usage cache shielding the portal from repeat fetches.

pub mod fetcher;
pub mod month_cache;

pub use fetcher::{FetchedUsage, PortalFetcher, UsageFetcher};
pub use month_cache::{is_settled, MonthCache, PersistPolicy};
