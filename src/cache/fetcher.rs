//! The capability the month cache calls on a miss.

use crate::error::Result;
use crate::portal::{Credentials, PortalConfig, Session};
use crate::usage::{MonthKey, UsageOptions, UsageRecord};

/// A month of usage as returned by the portal: decoded records plus the raw
/// export they were decoded from.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedUsage {
    pub records: Vec<UsageRecord>,
    pub raw: Vec<u8>,
}

/// Fetches one card's usage for one month from upstream.
pub trait UsageFetcher: Send + Sync {
    fn fetch(&self, card: &str, month: MonthKey) -> Result<FetchedUsage>;
}

impl<F> UsageFetcher for F
where
    F: Fn(&str, MonthKey) -> Result<FetchedUsage> + Send + Sync,
{
    fn fetch(&self, card: &str, month: MonthKey) -> Result<FetchedUsage> {
        self(card, month)
    }
}

/// Signs in to the portal afresh for every fetch and downloads the whole month.
pub struct PortalFetcher {
    config: PortalConfig,
    credentials: Credentials,
}

impl PortalFetcher {
    pub fn new(config: PortalConfig, credentials: Credentials) -> Self {
        Self {
            config,
            credentials,
        }
    }
}

impl UsageFetcher for PortalFetcher {
    fn fetch(&self, card: &str, month: MonthKey) -> Result<FetchedUsage> {
        let session = Session::connect(&self.config, &self.credentials)?;
        let (records, raw) = session.usage(card, &UsageOptions::for_month(month))?;
        tracing::info!(card, %month, rows = records.len(), "Fetched usage from portal");
        Ok(FetchedUsage { records, raw })
    }
}
