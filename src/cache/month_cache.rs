//! Two-tier cache of settled months of card usage.
//!
//! Lookups go memory first, then `{dir}/{card}-{YYYY-MM}.csv` on disk, then
//! upstream. A month that is still accruing is never cached, so every entry
//! is final once written.

use super::fetcher::UsageFetcher;
use crate::error::{Error, Result};
use crate::service_log::ServiceLog;
use crate::usage::{decode, MonthKey, UsageRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// What to do when a freshly fetched month cannot be written to disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistPolicy {
    /// Fail the lookup with `Error::CachePersist`.
    Strict,
    /// Log the failure and return the records anyway.
    #[default]
    Warn,
}

type CacheKey = (String, MonthKey);

pub struct MonthCache {
    dir: PathBuf,
    policy: PersistPolicy,
    log: Option<ServiceLog>,
    memory: Mutex<HashMap<CacheKey, Vec<UsageRecord>>>,
    /// Per-key locks so concurrent misses on one key make a single upstream fetch.
    /// An entry lives only while some caller holds or waits on it.
    inflight: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
}

impl MonthCache {
    pub fn new(dir: impl Into<PathBuf>, policy: PersistPolicy) -> Self {
        Self {
            dir: dir.into(),
            policy,
            log: None,
            memory: Mutex::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Also records cache warnings (failed writes, unreadable entries) in `log`.
    pub fn with_log(mut self, log: ServiceLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the disk entry for a card and month.
    pub fn cache_path(&self, card: &str, month: MonthKey) -> Result<PathBuf> {
        validate_card(card)?;
        Ok(self.dir.join(format!("{}-{}.csv", card, month)))
    }

    /// Usage for `card` in `month`, judged against today's local date.
    pub fn get(
        &self,
        card: &str,
        month: MonthKey,
        fetcher: &dyn UsageFetcher,
    ) -> Result<Vec<UsageRecord>> {
        self.get_as_of(card, month, chrono::Local::now().date_naive(), fetcher)
    }

    /// Usage for `card` in `month`, treating `today` as the current date.
    pub fn get_as_of(
        &self,
        card: &str,
        month: MonthKey,
        today: NaiveDate,
        fetcher: &dyn UsageFetcher,
    ) -> Result<Vec<UsageRecord>> {
        let path = self.cache_path(card, month)?;

        if !is_settled(month, today) {
            tracing::debug!(card, %month, "Month still accruing, bypassing cache");
            return fetcher.fetch(card, month).map(|fetched| fetched.records);
        }

        let key = (card.to_string(), month);
        if let Some(records) = self.from_memory(&key) {
            return Ok(records);
        }

        let flight = self.flight_lock(&key);
        let result = {
            let _guard = flight.lock().unwrap_or_else(PoisonError::into_inner);
            self.fill(&key, &path, fetcher)
        };
        self.release_flight(&key, flight);
        result
    }

    /// Memory re-check, disk tier, then upstream. Runs under the key's flight lock.
    fn fill(
        &self,
        key: &CacheKey,
        path: &Path,
        fetcher: &dyn UsageFetcher,
    ) -> Result<Vec<UsageRecord>> {
        let (card, month) = (key.0.as_str(), key.1);

        // Another caller may have filled the entry while we waited.
        if let Some(records) = self.from_memory(key) {
            return Ok(records);
        }

        if let Some(records) = self.read_disk_entry(path) {
            tracing::debug!(card, %month, "Loaded usage from disk cache");
            self.remember(key.clone(), records.clone());
            return Ok(records);
        }

        let fetched = fetcher.fetch(card, month)?;
        self.remember(key.clone(), fetched.records.clone());

        if let Err(e) = self.persist(path, &fetched.raw) {
            match self.policy {
                PersistPolicy::Strict => return Err(e),
                PersistPolicy::Warn => self.warn(&e.to_string()),
            }
        }
        Ok(fetched.records)
    }

    fn from_memory(&self, key: &CacheKey) -> Option<Vec<UsageRecord>> {
        self.memory
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn remember(&self, key: CacheKey, records: Vec<UsageRecord>) {
        self.memory
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, records);
    }

    fn flight_lock(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        self.inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_default()
            .clone()
    }

    /// Drops the key's lock once only the map and this caller still hold it.
    ///
    /// Clones are taken and dropped only under the `inflight` guard, so the
    /// count seen here is exact.
    fn release_flight(&self, key: &CacheKey, flight: Arc<Mutex<()>>) {
        let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        if Arc::strong_count(&flight) <= 2 {
            inflight.remove(key);
        }
        drop(flight);
    }

    fn persist(&self, path: &Path, raw: &[u8]) -> Result<()> {
        let to_error = |e: std::io::Error| Error::CachePersist {
            path: path.to_path_buf(),
            message: e.to_string(),
        };
        std::fs::create_dir_all(&self.dir).map_err(to_error)?;
        std::fs::write(path, raw).map_err(to_error)
    }

    /// Reads and decodes a disk entry. Missing or undecodable entries are misses.
    fn read_disk_entry(&self, path: &Path) -> Option<Vec<UsageRecord>> {
        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                self.warn(&format!(
                    "Failed to read cache file {}: {}",
                    path.display(),
                    e
                ));
                return None;
            }
        };
        match decode(&raw) {
            Ok(records) => Some(records),
            Err(e) => {
                self.warn(&format!(
                    "Ignoring undecodable cache file {}: {}",
                    path.display(),
                    e
                ));
                None
            }
        }
    }

    fn warn(&self, msg: &str) {
        tracing::warn!("{}", msg);
        if let Some(log) = &self.log {
            log.log("cache", msg);
        }
    }
}

/// True once `month` lies entirely before the month containing `today`.
///
/// The current month and any later one can still change upstream.
pub fn is_settled(month: MonthKey, today: NaiveDate) -> bool {
    month < MonthKey::containing(today)
}

/// Card serials become file names, so only ASCII alphanumerics are allowed.
fn validate_card(card: &str) -> Result<()> {
    if card.is_empty() || !card.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(Error::invalid_input(format!(
            "card serial must be ASCII alphanumeric: {:?}",
            card
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/month_cache_tests.rs"]
mod tests;
