//! Cached rephrasings.

use chrono::{DateTime, Utc};
use color_eyre::eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use super::{Storage, Table};

/// Prefix of every cache key.
pub const CACHE_PREFIX: &str = "ai:";

/// A rephrased message.
///
/// Entries with `expires_at` set are session scoped and dropped at the next
/// session start; entries without it persist.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CacheEntry {
    pub generated_message: String,
    pub original_message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    pub fn is_session_scoped(&self) -> bool {
        self.expires_at.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

fn cache_key(fingerprint: &str) -> String {
    format!("{CACHE_PREFIX}{fingerprint}")
}

impl Storage {
    /// Read the entry for a fingerprint, expired or not.
    pub fn cache_entry(&self, fingerprint: &str) -> Result<Option<CacheEntry>> {
        self.get(Table::Cache, &cache_key(fingerprint))
    }

    pub fn put_cache_entry(&self, fingerprint: &str, entry: &CacheEntry) -> Result<()> {
        self.put(Table::Cache, &cache_key(fingerprint), entry)
    }

    /// Delete every session-scoped entry, returning how many were removed.
    ///
    /// Values that do not decode as an entry are left alone.
    #[tracing::instrument(skip(self))]
    pub fn clear_session_entries(&self) -> Result<usize> {
        let tx = self.immediate()?;

        let mut removed = 0;
        let candidates = Storage::scan_prefix(&tx, &self.project_id, Table::Cache, CACHE_PREFIX)?;
        for (key, raw) in candidates {
            let entry = match serde_json::from_str::<CacheEntry>(&raw) {
                Ok(entry) => entry,
                Err(error) => {
                    tracing::debug!(%key, %error, "skipping undecodable cache entry");
                    continue;
                }
            };
            if entry.is_session_scoped() {
                tx.execute(
                    "DELETE FROM cache WHERE project_id = ?1 AND key = ?2",
                    rusqlite::params![self.project_id, key],
                )
                .with_context(|| format!("delete {key}"))?;
                removed += 1;
            }
        }

        tx.commit().context("commit session cache clear")?;
        tracing::debug!(removed, "cleared session cache entries");
        Ok(removed)
    }

    #[cfg(test)]
    fn cache_entry_raw(&self, fingerprint: &str) -> Result<Option<serde_json::Value>> {
        self.get(Table::Cache, &cache_key(fingerprint))
    }
}
